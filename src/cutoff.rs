use crate::error::Result;
use crate::kde::{fit_kde, KdeResult};
use crate::model::WindowScoreMatrix;

use rand::Rng;

/// The tail search for a unimodal curve stops where density falls below
/// this fraction of the peak.
const TAIL_FLOOR_REL: f64 = 1e-3;

/// How a population's cutoff is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CutoffMode {
    /// Antimode of the KDE of the population's LOD scores.
    Auto,
    /// The given value, used verbatim.
    Fixed(f64),
}

/// Where a cutoff came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoffSource {
    User,
    /// Density minimum between the two dominant modes.
    Antimode,
    /// Flattest point of the descending tail of a single-mode curve.
    Shoulder,
}

/// A location on a density curve used as a cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Antimode {
    pub x: f64,
    pub density: f64,
    pub bimodal: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CutoffSelection {
    pub cutoff: f64,
    pub source: CutoffSource,
    pub kde: Option<KdeResult>,
}

/// Individuals whose scores feed the KDE.
///
/// `subsample <= 0` or at least `nind` keeps everyone; otherwise `subsample`
/// distinct individuals are drawn uniformly. The result is sorted.
pub fn subsample_individuals<R: Rng>(nind: usize, subsample: i64, rng: &mut R) -> Vec<usize> {
    if subsample <= 0 || subsample as usize >= nind {
        return (0..nind).collect();
    }
    let mut picked = rand::seq::index::sample(rng, nind, subsample as usize).into_vec();
    picked.sort_unstable();
    picked
}

/// Non-missing scores of the chosen individuals across all chromosomes.
pub fn pooled_scores<'a, I>(matrices: I, inds: &[usize]) -> Vec<f64>
where
    I: IntoIterator<Item = &'a WindowScoreMatrix>,
{
    matrices
        .into_iter()
        .flat_map(|m| m.valid_scores_for(inds))
        .collect()
}

/// Locates the cutoff on a fitted LOD density.
///
/// With two or more modes this is the lowest point between the two highest
/// ones. A single-mode curve has no antimode, so the flattest point of its
/// upper tail (past the steepest descent, above a density floor) stands in.
pub fn select_lod_cutoff(kde: &KdeResult) -> Antimode {
    if let Some((low, high)) = kde.dominant_modes() {
        let i = kde.argmin_between(low, high);
        return Antimode {
            x: kde.x[i],
            density: kde.density[i],
            bimodal: true,
        };
    }

    let y = &kde.density;
    let n = y.len();
    let peak = kde.modes().first().copied().unwrap_or_else(|| {
        (0..n)
            .max_by(|&a, &b| y[a].total_cmp(&y[b]))
            .unwrap_or(0)
    });
    let at = |i: usize| Antimode {
        x: kde.x[i],
        density: y[i],
        bimodal: false,
    };
    if n < 3 || peak + 2 >= n {
        return at(peak.min(n.saturating_sub(1)));
    }

    let slope = |i: usize| y[i + 1] - y[i - 1];
    let steepest = (peak + 1..n - 1)
        .min_by(|&a, &b| slope(a).total_cmp(&slope(b)))
        .unwrap_or(peak);
    let floor = TAIL_FLOOR_REL * y[peak];
    let flattest = (steepest + 1..n - 1)
        .take_while(|&i| y[i] >= floor)
        .min_by(|&a, &b| slope(a).abs().total_cmp(&slope(b).abs()))
        .unwrap_or(steepest);
    at(flattest)
}

/// Cutoff for one population from its score matrices.
///
/// `inds` selects the individuals (see [`subsample_individuals`]). A fixed
/// cutoff skips density estimation entirely.
pub fn select_cutoff<'a, I>(
    matrices: I,
    inds: &[usize],
    mode: CutoffMode,
    kde_points: usize,
) -> Result<CutoffSelection>
where
    I: IntoIterator<Item = &'a WindowScoreMatrix>,
{
    match mode {
        CutoffMode::Fixed(cutoff) => Ok(CutoffSelection {
            cutoff,
            source: CutoffSource::User,
            kde: None,
        }),
        CutoffMode::Auto => {
            let sample = pooled_scores(matrices, inds);
            let kde = fit_kde(&sample, kde_points)?;
            let antimode = select_lod_cutoff(&kde);
            Ok(CutoffSelection {
                cutoff: antimode.x,
                source: if antimode.bimodal {
                    CutoffSource::Antimode
                } else {
                    CutoffSource::Shoulder
                },
                kde: Some(kde),
            })
        }
    }
}
