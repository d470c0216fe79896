use crate::error::{Result, RohError};
use crate::gmm::{fit_gmm, gmm_boundaries, GmmFit};

use log::debug;
use std::fmt;

/// Fewest pooled run lengths for which a mixture fit is attempted.
pub const MIN_GMM_RUNS: usize = 10;

/// Boundaries used when no mixture can be fitted.
pub const DEFAULT_FALLBACK_BOUNDS: (f64, f64) = (100_000.0, 1_000_000.0);

const GMM_COMPONENTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SizeClass {
    Short,
    Medium,
    Long,
}

impl SizeClass {
    pub const ALL: [SizeClass; 3] = [SizeClass::Short, SizeClass::Medium, SizeClass::Long];

    /// Single-letter label used in BED output.
    pub fn label(&self) -> char {
        match self {
            SizeClass::Short => 'A',
            SizeClass::Medium => 'B',
            SizeClass::Long => 'C',
        }
    }

    pub fn index(&self) -> usize {
        match self {
            SizeClass::Short => 0,
            SizeClass::Medium => 1,
            SizeClass::Long => 2,
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SizeClass::Short => "short",
            SizeClass::Medium => "medium",
            SizeClass::Long => "long",
        };
        write!(f, "{}", name)
    }
}

/// Two increasing, positive length thresholds in bp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeBoundaries {
    short_medium: f64,
    medium_long: f64,
}

impl SizeBoundaries {
    /// Accepts the pair in either order.
    pub fn new(a: f64, b: f64) -> Result<Self> {
        if !(a.is_finite() && b.is_finite() && a > 0.0 && b > 0.0) {
            return Err(RohError::parameter(format!(
                "size boundaries must be positive, got {} and {}",
                a, b
            )));
        }
        if a == b {
            return Err(RohError::parameter(format!(
                "size boundaries must differ, got {} twice",
                a
            )));
        }
        Ok(SizeBoundaries {
            short_medium: a.min(b),
            medium_long: a.max(b),
        })
    }

    pub fn short_medium(&self) -> f64 {
        self.short_medium
    }

    pub fn medium_long(&self) -> f64 {
        self.medium_long
    }

    pub fn classify(&self, length: f64) -> SizeClass {
        if length < self.short_medium {
            SizeClass::Short
        } else if length < self.medium_long {
            SizeClass::Medium
        } else {
            SizeClass::Long
        }
    }

    /// Number of lengths in each class, indexed by [`SizeClass::index`].
    pub fn counts(&self, lengths: &[f64]) -> [usize; 3] {
        let mut counts = [0; 3];
        for &len in lengths {
            counts[self.classify(len).index()] += 1;
        }
        counts
    }
}

impl Default for SizeBoundaries {
    fn default() -> Self {
        SizeBoundaries {
            short_medium: DEFAULT_FALLBACK_BOUNDS.0,
            medium_long: DEFAULT_FALLBACK_BOUNDS.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryMode {
    /// Fit a mixture, falling back to the given pair when that fails.
    Auto { fallback: SizeBoundaries },
    Fixed(SizeBoundaries),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundarySource {
    User,
    Gmm,
    /// The mixture could not be used; the reason is kept for the warning.
    Fallback(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizeClassSelection {
    pub boundaries: SizeBoundaries,
    pub source: BoundarySource,
    pub fit: Option<GmmFit>,
}

fn boundaries_from_fit(lengths: &[f64]) -> std::result::Result<(SizeBoundaries, GmmFit), String> {
    if lengths.len() < MIN_GMM_RUNS {
        return Err(format!(
            "{} runs, at least {} needed for a mixture fit",
            lengths.len(),
            MIN_GMM_RUNS
        ));
    }
    let fit = fit_gmm(lengths, GMM_COMPONENTS).map_err(|e| e.to_string())?;
    if !fit.converged {
        return Err(format!(
            "mixture fit did not converge to distinct components after {} iterations",
            fit.iterations
        ));
    }
    let bounds = gmm_boundaries(&fit).ok_or("adjacent mixture components do not cross")?;
    match bounds.as_slice() {
        [b1, b2] if *b1 > 0.0 && b1 < b2 => SizeBoundaries::new(*b1, *b2)
            .map(|b| (b, fit))
            .map_err(|e| e.to_string()),
        _ => Err(format!(
            "mixture boundaries {:?} are not positive and increasing",
            bounds
        )),
    }
}

/// Chooses the size boundaries for a population's pooled run lengths.
pub fn select_size_classes(lengths: &[f64], mode: &BoundaryMode) -> SizeClassSelection {
    match mode {
        BoundaryMode::Fixed(boundaries) => SizeClassSelection {
            boundaries: *boundaries,
            source: BoundarySource::User,
            fit: None,
        },
        BoundaryMode::Auto { fallback } => match boundaries_from_fit(lengths) {
            Ok((boundaries, fit)) => {
                debug!(
                    "GMM converged={} after {} iterations, loglik {:.3}",
                    fit.converged, fit.iterations, fit.loglik
                );
                SizeClassSelection {
                    boundaries,
                    source: BoundarySource::Gmm,
                    fit: Some(fit),
                }
            }
            Err(reason) => SizeClassSelection {
                boundaries: *fallback,
                source: BoundarySource::Fallback(reason),
                fit: None,
            },
        },
    }
}
