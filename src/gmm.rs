use crate::error::{Result, RohError};

use std::f64::consts::PI;

const MAX_ITER: usize = 1000;

/// EM stops once the log-likelihood moves by less than this share of itself
/// and no parameter moves by more than `PARAM_TOL` of its component's spread.
const REL_TOL: f64 = 1e-8;
const PARAM_TOL: f64 = 1e-6;

/// Component variances never drop below this share of the sample variance.
const VAR_FLOOR_REL: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianComponent {
    pub weight: f64,
    pub mean: f64,
    pub variance: f64,
}

impl GaussianComponent {
    pub fn sd(&self) -> f64 {
        self.variance.sqrt()
    }

    /// `ln(weight * N(x; mean, variance))`.
    pub fn log_weighted_density(&self, x: f64) -> f64 {
        self.weight.ln()
            - 0.5 * (2.0 * PI * self.variance).ln()
            - (x - self.mean).powi(2) / (2.0 * self.variance)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GmmFit {
    /// Sorted by mean.
    pub components: Vec<GaussianComponent>,
    pub loglik: f64,
    pub iterations: usize,
    pub converged: bool,
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Fits `k` components to the finite values of `data`.
///
/// Component `j` starts from the `j`-th of `k` equal-count chunks of the
/// sorted data, taking that chunk's mean, variance and share of the points.
/// A fit whose adjacent components end up with the same mean is returned
/// with `converged == false`.
///
/// # Errors
/// `Parameter` when `k == 0`; `Degenerate` when there are fewer than `k`
/// distinct values.
pub fn fit_gmm(data: &[f64], k: usize) -> Result<GmmFit> {
    if k == 0 {
        return Err(RohError::parameter("a mixture needs at least one component"));
    }
    let mut sorted: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_unstable_by(f64::total_cmp);
    let mut distinct = sorted.clone();
    distinct.dedup();
    if distinct.len() < k {
        return Err(RohError::degenerate(format!(
            "{} distinct values cannot support {} mixture components",
            distinct.len(),
            k
        )));
    }

    let n = sorted.len() as f64;
    let (_, var) = mean_variance(&sorted);
    let floor = (VAR_FLOOR_REL * var).max(f64::MIN_POSITIVE);

    let mut comps: Vec<GaussianComponent> = (0..k)
        .map(|j| {
            let chunk = &sorted[j * sorted.len() / k..(j + 1) * sorted.len() / k];
            let (mu, v) = mean_variance(chunk);
            GaussianComponent {
                weight: chunk.len() as f64 / n,
                mean: mu,
                variance: v.max(floor),
            }
        })
        .collect();

    let mut resp = vec![0.0; sorted.len() * k];
    let mut log_terms = vec![0.0; k];
    let mut prev = f64::NEG_INFINITY;
    let mut loglik = f64::NEG_INFINITY;
    let mut shift = f64::INFINITY;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < MAX_ITER {
        iterations += 1;

        loglik = 0.0;
        for (i, &x) in sorted.iter().enumerate() {
            for (t, c) in log_terms.iter_mut().zip(&comps) {
                *t = c.log_weighted_density(x);
            }
            let total = log_sum_exp(&log_terms);
            loglik += total;
            for (j, t) in log_terms.iter().enumerate() {
                resp[i * k + j] = (t - total).exp();
            }
        }
        if (loglik - prev).abs() <= REL_TOL * loglik.abs() && shift <= PARAM_TOL {
            converged = !collapsed(&comps);
            break;
        }
        prev = loglik;

        shift = 0.0;
        for (j, c) in comps.iter_mut().enumerate() {
            let nj: f64 = (0..sorted.len()).map(|i| resp[i * k + j]).sum();
            if nj <= f64::MIN_POSITIVE {
                c.weight = f64::MIN_POSITIVE;
                continue;
            }
            let mu = sorted
                .iter()
                .enumerate()
                .map(|(i, x)| resp[i * k + j] * x)
                .sum::<f64>()
                / nj;
            let v = sorted
                .iter()
                .enumerate()
                .map(|(i, x)| resp[i * k + j] * (x - mu).powi(2))
                .sum::<f64>()
                / nj;
            let next = GaussianComponent {
                weight: nj / n,
                mean: mu,
                variance: v.max(floor),
            };
            shift = shift.max(parameter_shift(c, &next));
            *c = next;
        }
    }

    comps.sort_by(|a, b| a.mean.total_cmp(&b.mean));
    Ok(GmmFit {
        components: comps,
        loglik,
        iterations,
        converged,
    })
}

fn mean_variance(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var)
}

/// Largest change between two states of a component, relative to its spread.
fn parameter_shift(old: &GaussianComponent, new: &GaussianComponent) -> f64 {
    let mean = (new.mean - old.mean).abs() / new.sd();
    let var = (new.variance - old.variance).abs() / new.variance;
    let weight = (new.weight - old.weight).abs();
    mean.max(var).max(weight)
}

/// True when two components sit on top of each other.
fn collapsed(comps: &[GaussianComponent]) -> bool {
    comps.iter().enumerate().any(|(i, a)| {
        comps[i + 1..].iter().any(|b| {
            (a.mean - b.mean).abs() <= PARAM_TOL * (a.sd() + b.sd())
                && (a.variance - b.variance).abs() <= PARAM_TOL * a.variance.max(b.variance)
        })
    })
}

/// Point where `a` and `b` have equal posterior probability.
///
/// Equating the weighted log densities gives a quadratic in `x`; of its real
/// roots the one between the two means wins, otherwise the one nearest their
/// midpoint. `None` when the curves never cross.
pub fn equal_posterior_point(a: &GaussianComponent, b: &GaussianComponent) -> Option<f64> {
    let qa = 1.0 / (2.0 * b.variance) - 1.0 / (2.0 * a.variance);
    let qb = a.mean / a.variance - b.mean / b.variance;
    let qc = b.mean.powi(2) / (2.0 * b.variance) - a.mean.powi(2) / (2.0 * a.variance)
        + (a.weight / b.weight).ln()
        - 0.5 * (a.variance / b.variance).ln();

    let scale = qb.abs().max(qc.abs()).max(f64::MIN_POSITIVE);
    if qa.abs() <= 1e-12 * scale {
        return if qb != 0.0 { Some(-qc / qb) } else { None };
    }
    let disc = qb * qb - 4.0 * qa * qc;
    if disc < 0.0 {
        return None;
    }
    // numerically stable pair of roots
    let q = -0.5 * (qb + qb.signum() * disc.sqrt());
    let mut roots = vec![q / qa];
    if q != 0.0 {
        roots.push(qc / q);
    }

    let (lo, hi) = (a.mean.min(b.mean), a.mean.max(b.mean));
    let mid = 0.5 * (lo + hi);
    roots
        .iter()
        .copied()
        .filter(|r| r.is_finite())
        .min_by(|x, y| {
            let outside = |r: &f64| !(lo..=hi).contains(r);
            outside(x)
                .cmp(&outside(y))
                .then((x - mid).abs().total_cmp(&(y - mid).abs()))
        })
}

/// Crossing points between each pair of adjacent components.
pub fn gmm_boundaries(fit: &GmmFit) -> Option<Vec<f64>> {
    fit.components
        .windows(2)
        .map(|pair| equal_posterior_point(&pair[0], &pair[1]))
        .collect()
}
