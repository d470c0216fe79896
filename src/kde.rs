use crate::error::{Result, RohError};

pub const DEFAULT_KDE_POINTS: usize = 512;

/// The grid extends this many bandwidths past the sample range.
const GRID_CUT: f64 = 3.0;

/// Kernel mass beyond this many bandwidths is ignored.
const KERNEL_REACH: f64 = 6.0;

/// Local maxima lower than this fraction of the highest one are ignored.
const MODE_MIN_REL: f64 = 1e-3;

/// A mode must rise at least this share of its height above the trough
/// separating it from taller density.
const MODE_MIN_PROMINENCE: f64 = 0.1;

/// A density curve evaluated on an evenly spaced grid.
#[derive(Debug, Clone, PartialEq)]
pub struct KdeResult {
    pub x: Vec<f64>,
    pub density: Vec<f64>,
    pub bandwidth: f64,
    /// Number of sample values the curve was fitted to.
    pub n: usize,
}

/// Quantile with linear interpolation between order statistics of a sorted sample.
pub fn quantile_sorted(sorted: &[f64], prob: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let h = (sorted.len() - 1) as f64 * prob.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

fn mean_and_sd(sample: &[f64]) -> (f64, f64) {
    let n = sample.len() as f64;
    let mean = sample.iter().sum::<f64>() / n;
    if sample.len() < 2 {
        return (mean, 0.0);
    }
    let var = sample.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// Silverman's rule of thumb, `0.9 * min(sd, IQR / 1.34) * n^(-1/5)`.
///
/// When the spread is zero the first non-zero of sd, `|x[0]|` and 1 is used in
/// its place, so the bandwidth is always positive.
pub fn silverman_bandwidth(sample: &[f64]) -> f64 {
    if sample.is_empty() {
        return 1.0;
    }
    let (_, sd) = mean_and_sd(sample);
    let mut sorted = sample.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let iqr = quantile_sorted(&sorted, 0.75) - quantile_sorted(&sorted, 0.25);

    let mut spread = sd.min(iqr / 1.34);
    if !(spread > 0.0) {
        spread = if sd > 0.0 {
            sd
        } else if sample[0].abs() > 0.0 {
            sample[0].abs()
        } else {
            1.0
        };
    }
    0.9 * spread * (sample.len() as f64).powf(-0.2)
}

/// Fits a Gaussian KDE to the finite values of `sample` on `points` grid points.
pub fn fit_kde(sample: &[f64], points: usize) -> Result<KdeResult> {
    if points < 2 {
        return Err(RohError::parameter(format!(
            "KDE needs at least 2 grid points, got {}",
            points
        )));
    }
    let finite: Vec<f64> = sample.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Err(RohError::degenerate("no finite values to estimate a density from"));
    }

    let n = finite.len();
    let bandwidth = silverman_bandwidth(&finite);
    let (min, max) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let lo = min - GRID_CUT * bandwidth;
    let hi = max + GRID_CUT * bandwidth;
    let delta = (hi - lo) / (points - 1) as f64;

    let mut mass = vec![0.0; points];
    for &v in &finite {
        let pos = (v - lo) / delta;
        let j = (pos.floor() as usize).min(points - 1);
        let frac = pos - j as f64;
        if j + 1 < points {
            mass[j] += 1.0 - frac;
            mass[j + 1] += frac;
        } else {
            mass[j] += 1.0;
        }
    }

    let reach = ((KERNEL_REACH * bandwidth / delta).ceil() as usize).min(points - 1);
    let norm = 1.0 / ((2.0 * std::f64::consts::PI).sqrt() * bandwidth * n as f64);
    let kernel: Vec<f64> = (0..=reach)
        .map(|d| {
            let z = d as f64 * delta / bandwidth;
            (-0.5 * z * z).exp() * norm
        })
        .collect();

    let mut density = vec![0.0; points];
    for (j, &m) in mass.iter().enumerate() {
        if m == 0.0 {
            continue;
        }
        let from = j.saturating_sub(reach);
        let to = (j + reach).min(points - 1);
        for (i, d) in density.iter_mut().enumerate().take(to + 1).skip(from) {
            *d += m * kernel[i.abs_diff(j)];
        }
    }

    let x = (0..points).map(|i| lo + i as f64 * delta).collect();
    Ok(KdeResult {
        x,
        density,
        bandwidth,
        n,
    })
}

/// Lowest density met walking from `peak` along `path` before anything taller.
fn trough(y: &[f64], peak: usize, path: impl Iterator<Item = usize>) -> f64 {
    let mut lowest = y[peak];
    for j in path {
        if y[j] > y[peak] {
            break;
        }
        lowest = lowest.min(y[j]);
    }
    lowest
}

impl KdeResult {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn grid_step(&self) -> f64 {
        if self.x.len() < 2 {
            0.0
        } else {
            self.x[1] - self.x[0]
        }
    }

    /// Height of peak `i` above the higher of the two troughs separating it
    /// from taller density (or from the grid ends).
    pub fn prominence(&self, i: usize) -> f64 {
        let y = &self.density;
        let left = trough(y, i, (0..i).rev());
        let right = trough(y, i, i + 1..y.len());
        y[i] - left.max(right)
    }

    /// Indices of interior local maxima, highest density first.
    ///
    /// A plateau counts once, at its left end. Maxima below a tiny fraction of
    /// the global peak, and wiggles whose prominence is a small share of their
    /// own height, are sampling noise and are dropped.
    pub fn modes(&self) -> Vec<usize> {
        let y = &self.density;
        if y.len() < 3 {
            return Vec::new();
        }
        let mut peaks: Vec<usize> = (1..y.len() - 1)
            .filter(|&i| y[i] > y[i - 1] && y[i] >= y[i + 1])
            .collect();
        let top = peaks.iter().map(|&i| y[i]).fold(0.0, f64::max);
        peaks.retain(|&i| {
            y[i] >= MODE_MIN_REL * top && self.prominence(i) >= MODE_MIN_PROMINENCE * y[i]
        });
        peaks.sort_by(|&a, &b| y[b].total_cmp(&y[a]).then(a.cmp(&b)));
        peaks
    }

    /// The two highest modes ordered by position, if the curve has two.
    pub fn dominant_modes(&self) -> Option<(usize, usize)> {
        let modes = self.modes();
        match modes.as_slice() {
            [a, b, ..] => Some(((*a).min(*b), (*a).max(*b))),
            _ => None,
        }
    }

    /// Grid index of the lowest density in the closed index range.
    pub fn argmin_between(&self, from: usize, to: usize) -> usize {
        let (from, to) = (from.min(to), from.max(to).min(self.density.len().saturating_sub(1)));
        (from..=to)
            .min_by(|&a, &b| self.density[a].total_cmp(&self.density[b]))
            .unwrap_or(from)
    }
}
