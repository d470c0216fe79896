use crate::cutoff::{
    select_cutoff, select_lod_cutoff, subsample_individuals, CutoffMode, CutoffSource,
};
use crate::error::ErrorKind;
use crate::kde::{fit_kde, quantile_sorted, silverman_bandwidth, DEFAULT_KDE_POINTS};
use crate::model::WindowScoreMatrix;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

fn two_gaussians(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let low = Normal::new(0.0, 1.0).unwrap();
    let high = Normal::new(6.0, 1.0).unwrap();
    let mut sample: Vec<f64> = (0..n).map(|_| low.sample(&mut rng)).collect();
    sample.extend((0..n).map(|_| high.sample(&mut rng)));
    sample
}

/// Evenly spaced values with triangular weights, a smooth single-mode sample.
fn triangle_sample() -> Vec<f64> {
    (-50i32..=50)
        .flat_map(|k| std::iter::repeat(k as f64 * 0.1).take((51 - k.abs()) as usize))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantiles() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(quantile_sorted(&sorted, 0.5), 3.0);
        assert_eq!(quantile_sorted(&sorted, 1.0), 5.0);
        assert!((quantile_sorted(&sorted, 0.125) - 1.5).abs() < 1e-12);
        assert!(quantile_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn test_bandwidth_is_positive_for_constant_sample() {
        assert!(silverman_bandwidth(&[2.0; 10]) > 0.0);
        assert!(silverman_bandwidth(&[0.0; 10]) > 0.0);
        let h = silverman_bandwidth(&two_gaussians(500, 1));
        assert!(h > 0.1 && h < 2.0, "bandwidth {}", h);
    }

    #[test]
    fn test_density_integrates_to_one() {
        let kde = fit_kde(&two_gaussians(1000, 2), DEFAULT_KDE_POINTS).unwrap();
        let area: f64 = kde.density.iter().sum::<f64>() * kde.grid_step();
        assert!((area - 1.0).abs() < 0.01, "area {}", area);
        assert_eq!(kde.len(), DEFAULT_KDE_POINTS);
        assert_eq!(kde.n, 2000);
    }

    #[test]
    fn test_empty_sample_is_degenerate() {
        let err = fit_kde(&[], 64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Degeneracy);
        let err = fit_kde(&[f64::NAN, f64::INFINITY], 64).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(fit_kde(&[1.0], 1).unwrap_err().kind(), ErrorKind::ParameterDomain);
    }

    #[test]
    fn test_bimodal_cutoff_near_midpoint() {
        let kde = fit_kde(&two_gaussians(4000, 7), DEFAULT_KDE_POINTS).unwrap();
        let (low, high) = kde.dominant_modes().unwrap();
        assert!((kde.x[low] - 0.0).abs() < 0.5);
        assert!((kde.x[high] - 6.0).abs() < 0.5);

        let antimode = select_lod_cutoff(&kde);
        assert!(antimode.bimodal);
        assert!((antimode.x - 3.0).abs() < 0.5, "cutoff {}", antimode.x);
    }

    #[test]
    fn test_unimodal_cutoff_uses_upper_tail() {
        let kde = fit_kde(&triangle_sample(), DEFAULT_KDE_POINTS).unwrap();
        assert_eq!(kde.modes().len(), 1);
        let antimode = select_lod_cutoff(&kde);
        assert!(!antimode.bimodal);
        assert!(antimode.x > 0.0, "shoulder at {}", antimode.x);
    }

    #[test]
    fn test_subsample_individuals() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(subsample_individuals(5, 0, &mut rng), vec![0, 1, 2, 3, 4]);
        assert_eq!(subsample_individuals(5, -1, &mut rng), vec![0, 1, 2, 3, 4]);
        assert_eq!(subsample_individuals(5, 9, &mut rng), vec![0, 1, 2, 3, 4]);

        let picked = subsample_individuals(100, 10, &mut rng);
        assert_eq!(picked.len(), 10);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        assert!(picked.iter().all(|&i| i < 100));

        let again = subsample_individuals(100, 10, &mut ChaCha8Rng::seed_from_u64(3));
        let first = subsample_individuals(100, 10, &mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(again, first);
    }

    #[test]
    fn test_select_cutoff_modes() {
        let sample = two_gaussians(2000, 11);
        let half = sample.len() / 2;
        let rows = vec![
            sample[..half].iter().map(|&v| Some(v)).collect(),
            sample[half..].iter().map(|&v| Some(v)).collect(),
        ];
        let matrix = WindowScoreMatrix::from_rows(10, rows).unwrap();

        let fixed = select_cutoff([&matrix], &[0, 1], CutoffMode::Fixed(2.5), 128).unwrap();
        assert_eq!(fixed.cutoff, 2.5);
        assert_eq!(fixed.source, CutoffSource::User);
        assert!(fixed.kde.is_none());

        let auto = select_cutoff([&matrix], &[0, 1], CutoffMode::Auto, DEFAULT_KDE_POINTS).unwrap();
        assert_eq!(auto.source, CutoffSource::Antimode);
        assert!((auto.cutoff - 3.0).abs() < 0.5);

        // only the low component: a single mode
        let low_only = select_cutoff([&matrix], &[0], CutoffMode::Auto, DEFAULT_KDE_POINTS).unwrap();
        assert_eq!(low_only.kde.as_ref().unwrap().n, half);

        let empty = WindowScoreMatrix::new_missing(2, 5, 3);
        let err = select_cutoff([&empty], &[0, 1], CutoffMode::Auto, 64).unwrap_err();
        assert!(err.is_recoverable());
    }
}
