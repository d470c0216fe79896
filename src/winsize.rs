use crate::cutoff::{pooled_scores, select_lod_cutoff, Antimode};
use crate::error::{Result, RohError};
use crate::kde::{fit_kde, KdeResult};
use crate::model::WindowScoreMatrix;

use log::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WinsizeMode {
    Fixed(usize),
    /// Score every listed size and report; no size is chosen.
    Explore(Vec<usize>),
    /// Grow from `initial` by `step` until the stability policy is met.
    Auto { initial: usize, step: usize },
}

/// Produces one population's LOD matrices (one per chromosome) at a window size.
pub trait LodSource {
    fn score(&self, winsize: usize) -> Result<Vec<WindowScoreMatrix>>;
}

/// Summary of a LOD density used to judge window sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionShape {
    /// Mode positions, highest density first.
    pub modes: Vec<f64>,
    /// Distance between the two dominant modes.
    pub peak_separation: Option<f64>,
    pub antimode: Antimode,
}

impl DistributionShape {
    pub fn from_kde(kde: &KdeResult) -> Self {
        let modes: Vec<f64> = kde.modes().into_iter().map(|i| kde.x[i]).collect();
        let peak_separation = kde
            .dominant_modes()
            .map(|(low, high)| kde.x[high] - kde.x[low]);
        DistributionShape {
            modes,
            peak_separation,
            antimode: select_lod_cutoff(kde),
        }
    }

    pub fn is_bimodal(&self) -> bool {
        self.peak_separation.is_some()
    }
}

/// The density fitted at one window size. `kde` is `None` when no window of
/// that size could be scored.
#[derive(Debug, Clone, PartialEq)]
pub struct WinsizeKde {
    pub winsize: usize,
    pub kde: Option<KdeResult>,
    pub shape: Option<DistributionShape>,
}

impl WinsizeKde {
    /// Peak separation divided by window size, which is comparable across sizes.
    pub fn separation_per_locus(&self) -> Option<f64> {
        self.shape
            .as_ref()
            .and_then(|s| s.peak_separation)
            .map(|sep| sep / self.winsize as f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KdeWinsizeReport {
    pub entries: Vec<WinsizeKde>,
}

impl KdeWinsizeReport {
    pub fn winsizes(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.winsize).collect()
    }
}

/// Decides when automatic window growth may stop.
pub trait StabilityPolicy: Send + Sync {
    /// Whether the last entry of `history` is an acceptable stopping point.
    fn is_stable(&self, history: &[WinsizeKde]) -> bool;

    /// Upper bound on the number of sizes tried.
    fn max_steps(&self) -> usize;
}

/// Stops once the per-locus separation between the background and ROH
/// modes changes by at most `tolerance` (relative) between two consecutive
/// sizes that are both bimodal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakSeparationStability {
    pub tolerance: f64,
    pub max_steps: usize,
}

impl Default for PeakSeparationStability {
    fn default() -> Self {
        PeakSeparationStability {
            tolerance: 0.05,
            max_steps: 10,
        }
    }
}

impl StabilityPolicy for PeakSeparationStability {
    fn is_stable(&self, history: &[WinsizeKde]) -> bool {
        let [.., prev, last] = history else {
            return false;
        };
        match (prev.separation_per_locus(), last.separation_per_locus()) {
            (Some(a), Some(b)) if a > 0.0 => ((b - a) / a).abs() <= self.tolerance,
            _ => false,
        }
    }

    fn max_steps(&self) -> usize {
        self.max_steps
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WinsizeOutcome {
    Chosen {
        winsize: usize,
        /// One matrix per chromosome at the chosen size.
        scores: Vec<WindowScoreMatrix>,
        report: KdeWinsizeReport,
        /// False when automatic growth ran out of steps.
        stable: bool,
    },
    Explored(KdeWinsizeReport),
}

/// Runs a [`WinsizeMode`] against a [`LodSource`].
pub struct WinsizeSelector<'p> {
    pub kde_points: usize,
    pub policy: &'p dyn StabilityPolicy,
}

impl<'p> WinsizeSelector<'p> {
    pub fn new(kde_points: usize, policy: &'p dyn StabilityPolicy) -> Self {
        WinsizeSelector { kde_points, policy }
    }

    /// Scores `source` as `mode` requires. `inds` are the individuals whose
    /// scores feed each KDE.
    pub fn select<S: LodSource + ?Sized>(
        &self,
        mode: &WinsizeMode,
        source: &S,
        inds: &[usize],
    ) -> Result<WinsizeOutcome> {
        match mode {
            WinsizeMode::Fixed(winsize) => {
                let scores = source.score(*winsize)?;
                let report = KdeWinsizeReport {
                    entries: vec![self.kde_entry(*winsize, &scores, inds)?],
                };
                Ok(WinsizeOutcome::Chosen {
                    winsize: *winsize,
                    scores,
                    report,
                    stable: true,
                })
            }
            WinsizeMode::Explore(sizes) => {
                if sizes.is_empty() {
                    return Err(RohError::parameter("window size list is empty"));
                }
                let mut report = KdeWinsizeReport::default();
                for &winsize in sizes {
                    info!("Scoring LOD windows of {} loci", winsize);
                    let scores = source.score(winsize)?;
                    report.entries.push(self.kde_entry(winsize, &scores, inds)?);
                }
                Ok(WinsizeOutcome::Explored(report))
            }
            WinsizeMode::Auto { initial, step } => self.expand(*initial, *step, source, inds),
        }
    }

    fn expand<S: LodSource + ?Sized>(
        &self,
        initial: usize,
        step: usize,
        source: &S,
        inds: &[usize],
    ) -> Result<WinsizeOutcome> {
        if step == 0 {
            return Err(RohError::parameter("automatic window size step must be positive"));
        }
        let max_steps = self.policy.max_steps().max(1);
        let mut report = KdeWinsizeReport::default();
        let mut winsize = initial;

        loop {
            let scores = source.score(winsize)?;
            let entry = self.kde_entry(winsize, &scores, inds)?;
            info!(
                "Window size {}: per-locus peak separation {}",
                winsize,
                entry
                    .separation_per_locus()
                    .map_or_else(|| "n/a (unimodal)".to_string(), |s| format!("{:.4}", s))
            );
            report.entries.push(entry);

            let stable = self.policy.is_stable(&report.entries);
            if stable || report.entries.len() >= max_steps {
                return Ok(WinsizeOutcome::Chosen {
                    winsize,
                    scores,
                    report,
                    stable,
                });
            }
            winsize += step;
        }
    }

    fn kde_entry(
        &self,
        winsize: usize,
        scores: &[WindowScoreMatrix],
        inds: &[usize],
    ) -> Result<WinsizeKde> {
        let sample = pooled_scores(scores, inds);
        match fit_kde(&sample, self.kde_points) {
            Ok(kde) => {
                let shape = DistributionShape::from_kde(&kde);
                Ok(WinsizeKde {
                    winsize,
                    kde: Some(kde),
                    shape: Some(shape),
                })
            }
            Err(e) if e.is_recoverable() => {
                debug!("No density at window size {}: {}", winsize, e);
                Ok(WinsizeKde {
                    winsize,
                    kde: None,
                    shape: None,
                })
            }
            Err(e) => Err(e),
        }
    }
}
