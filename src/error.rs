use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RohError {
    /// Dimensions or ordering of genotype, map and frequency data disagree.
    #[error("Input shape error: {0}")]
    InputShape(String),

    /// A configuration value is outside its allowed domain.
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// A numerical routine has nothing well-defined to fit.
    #[error("Statistical degeneracy: {0}")]
    Degenerate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Coarse classification of a [`RohError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputShape,
    ParameterDomain,
    Degeneracy,
    Io,
}

impl RohError {
    pub fn input_shape(message: impl Into<String>) -> Self {
        Self::InputShape(message.into())
    }

    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter(message.into())
    }

    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::Degenerate(message.into())
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RohError::InputShape(_) => ErrorKind::InputShape,
            RohError::Parameter(_) => ErrorKind::ParameterDomain,
            RohError::Degenerate(_) => ErrorKind::Degeneracy,
            RohError::Io(_) | RohError::Parse { .. } | RohError::Csv(_) => ErrorKind::Io,
        }
    }

    /// True for conditions the pipeline may downgrade to a warning.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Degeneracy
    }
}

pub type Result<T> = std::result::Result<T, RohError>;

/// Which fallback a [`Warning`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// The LOD distribution was not bimodal; the best available antimode was used.
    FlatLodDistribution,
    /// No scores were available for a cutoff; no runs were called.
    NoLodScores,
    /// Too few runs (or an unusable fit) for the GMM; fallback boundaries were used.
    SizeClassFallback,
    /// Automatic window sizing hit its step limit without stabilizing.
    WinsizeNotStable,
    /// A parameter is legal but unusual.
    SuspiciousParameter,
    /// A chromosome has no centromere interval, so windows may span it.
    NoCentromeres,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::FlatLodDistribution => "flat_lod_distribution",
            WarningKind::NoLodScores => "no_lod_scores",
            WarningKind::SizeClassFallback => "size_class_fallback",
            WarningKind::WinsizeNotStable => "winsize_not_stable",
            WarningKind::SuspiciousParameter => "suspicious_parameter",
            WarningKind::NoCentromeres => "no_centromeres",
        }
    }
}

/// A degeneracy that did not stop the run but changed how a value was chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub kind: WarningKind,
    pub population: String,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, population: impl Into<String>, message: impl Into<String>) -> Self {
        Warning {
            kind,
            population: population.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.as_str(), self.population, self.message)
    }
}
