use crate::centromeres::GenomeBuild;
use crate::classify::{BoundaryMode, SizeBoundaries, DEFAULT_FALLBACK_BOUNDS};
use crate::cutoff::CutoffMode;
use crate::error::{Result, RohError, Warning, WarningKind};
use crate::kde::DEFAULT_KDE_POINTS;
use crate::lod::check_error_rate;
use crate::winsize::{PeakSeparationStability, WinsizeMode};

use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;

/// Gaps shorter than this are legal but usually a unit mistake.
pub const SUSPICIOUS_MAX_GAP: i64 = 1000;

/// Smallest KDE grid accepted from the command line.
pub const MIN_KDE_POINTS: usize = 16;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Call runs of homozygosity from TPED genotypes",
    long_about = None
)]
pub struct Args {
    /// TPED genotype file (may be gzipped)
    #[arg(long = "tped")]
    pub tped: PathBuf,

    /// TFAM file; the first column names each individual's population
    #[arg(long = "tfam")]
    pub tfam: PathBuf,

    /// Allele frequency file (SNP, ALLELE, one column per population)
    #[arg(long = "freq-file")]
    pub freq_file: Option<PathBuf>,

    /// Genome build whose built-in centromere positions are used
    #[arg(long = "build", value_enum)]
    pub build: Option<GenomeBuild>,

    /// Centromere file: chromosome, start, end (overrides --build)
    #[arg(long = "centromere")]
    pub centromere: Option<PathBuf>,

    /// Allele code marking a missing genotype in the TPED
    #[arg(long = "tped-missing", default_value = "0")]
    pub tped_missing: char,

    /// Output prefix
    #[arg(long = "out", default_value = "out")]
    pub out: String,

    /// Genotyping error rate, strictly between 0 and 1
    #[arg(long = "error")]
    pub error: f64,

    /// Window size in loci
    #[arg(long = "winsize", default_value_t = 10)]
    pub winsize: usize,

    /// Score every listed window size, write the KDEs and stop
    #[arg(long = "winsize-multi", num_args = 1.., conflicts_with = "auto_winsize")]
    pub winsize_multi: Option<Vec<usize>>,

    /// Grow the window from --winsize until the LOD distribution stabilizes
    #[arg(long = "auto-winsize")]
    pub auto_winsize: bool,

    /// Increment used by --auto-winsize
    #[arg(long = "auto-winsize-step", default_value_t = 10)]
    pub auto_winsize_step: usize,

    /// Relative change in peak separation regarded as stable
    #[arg(long = "auto-winsize-tolerance", default_value_t = 0.05)]
    pub auto_winsize_tolerance: f64,

    /// Most window sizes tried by --auto-winsize
    #[arg(long = "auto-winsize-max-steps", default_value_t = 10)]
    pub auto_winsize_max_steps: usize,

    /// Largest gap in bp allowed inside a window or a run
    #[arg(long = "max-gap", default_value_t = 200_000)]
    pub max_gap: i64,

    /// Share of covering windows that must be in a run for a locus to be in one
    #[arg(long = "overlap-frac", default_value_t = 0.25)]
    pub overlap_frac: f64,

    /// Fixed LOD cutoff for every population
    #[arg(long = "lod-cutoff", allow_hyphen_values = true, conflicts_with = "lod_cutoff_file")]
    pub lod_cutoff: Option<f64>,

    /// File of per-population LOD cutoffs: population, cutoff
    #[arg(long = "lod-cutoff-file")]
    pub lod_cutoff_file: Option<PathBuf>,

    /// Fixed size class boundaries in bp
    #[arg(
        long = "size-bounds",
        num_args = 2,
        value_names = ["SHORT_MEDIUM", "MEDIUM_LONG"],
        conflicts_with = "size_bounds_file"
    )]
    pub size_bounds: Option<Vec<f64>>,

    /// File of per-population size boundaries: population, two boundaries
    #[arg(long = "size-bounds-file")]
    pub size_bounds_file: Option<PathBuf>,

    /// Boundaries used when a mixture model cannot be fitted
    #[arg(long = "fallback-bounds", num_args = 2, value_names = ["SHORT_MEDIUM", "MEDIUM_LONG"])]
    pub fallback_bounds: Option<Vec<f64>>,

    /// Individuals per population used for KDEs; 0 or less uses everyone
    #[arg(long = "kde-subsample", default_value_t = 10, allow_hyphen_values = true)]
    pub kde_subsample: i64,

    /// Grid points of each KDE
    #[arg(long = "kde-points", default_value_t = DEFAULT_KDE_POINTS)]
    pub kde_points: usize,

    /// Resample each frequency from this many draws (0 keeps the observed value)
    #[arg(long = "resample", default_value_t = 0)]
    pub resample: usize,

    /// Random seed; drawn at random and logged when absent
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Write raw LOD scores per population and chromosome
    #[arg(long = "raw-lod")]
    pub raw_lod: bool,

    /// Only compute allele frequencies and write them
    #[arg(long = "freq-only")]
    pub freq_only: bool,

    /// Worker threads
    #[arg(long = "threads", default_value_t = num_cpus::get())]
    pub threads: usize,
}

/// Where the LOD cutoff of each population comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CutoffSpec {
    Auto,
    Fixed(f64),
    Table(PathBuf),
}

/// Where the size boundaries of each population come from.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundarySpec {
    Auto,
    Fixed(SizeBoundaries),
    Table(PathBuf),
}

/// Where centromere intervals come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CentromereSource {
    Build(GenomeBuild),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputPaths {
    pub tped: PathBuf,
    pub tfam: PathBuf,
    pub freq_file: Option<PathBuf>,
    pub centromeres: CentromereSource,
    pub tped_missing: char,
}

/// Numeric settings of the analysis itself.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisParams {
    pub winsize_mode: WinsizeMode,
    pub stability: PeakSeparationStability,
    pub error: f64,
    pub max_gap: i64,
    pub overlap_frac: f64,
    pub kde_subsample: i64,
    pub kde_points: usize,
    pub resample: usize,
    pub seed: u64,
    pub fallback_bounds: SizeBoundaries,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        AnalysisParams {
            winsize_mode: WinsizeMode::Fixed(10),
            stability: PeakSeparationStability::default(),
            error: 0.001,
            max_gap: 200_000,
            overlap_frac: 0.25,
            kde_subsample: 10,
            kde_points: DEFAULT_KDE_POINTS,
            resample: 0,
            seed: 0,
            fallback_bounds: SizeBoundaries::default(),
        }
    }
}

impl AnalysisParams {
    pub fn validate(&self) -> Result<()> {
        check_error_rate(self.error)?;
        match &self.winsize_mode {
            WinsizeMode::Fixed(w) => check_winsize(*w)?,
            WinsizeMode::Explore(sizes) => {
                if sizes.is_empty() {
                    return Err(RohError::parameter("window size list is empty"));
                }
                for &w in sizes {
                    check_winsize(w)?;
                }
            }
            WinsizeMode::Auto { initial, step } => {
                check_winsize(*initial)?;
                if *step == 0 {
                    return Err(RohError::parameter(
                        "automatic window size step must be positive",
                    ));
                }
            }
        }
        if !(self.stability.tolerance >= 0.0) || self.stability.max_steps == 0 {
            return Err(RohError::parameter(format!(
                "stability tolerance must be >= 0 and max steps > 0, got {} and {}",
                self.stability.tolerance, self.stability.max_steps
            )));
        }
        if self.max_gap < 0 {
            return Err(RohError::parameter(format!(
                "max gap must be non-negative, got {}",
                self.max_gap
            )));
        }
        if !(self.overlap_frac > 0.0 && self.overlap_frac <= 1.0) {
            return Err(RohError::parameter(format!(
                "overlap fraction must be in (0, 1], got {}",
                self.overlap_frac
            )));
        }
        if self.kde_points < MIN_KDE_POINTS {
            return Err(RohError::parameter(format!(
                "KDE needs at least {} grid points, got {}",
                MIN_KDE_POINTS, self.kde_points
            )));
        }
        Ok(())
    }

    /// Legal settings that are probably mistakes.
    pub fn suspicious(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();
        if self.max_gap < SUSPICIOUS_MAX_GAP {
            warnings.push(Warning::new(
                WarningKind::SuspiciousParameter,
                "*",
                format!(
                    "max gap of {} bp is very small; is it in base pairs?",
                    self.max_gap
                ),
            ));
        }
        warnings
    }
}

fn check_winsize(winsize: usize) -> Result<()> {
    if winsize <= 1 {
        return Err(RohError::parameter(format!(
            "window size must be greater than 1, got {}",
            winsize
        )));
    }
    Ok(())
}

fn boundary_pair(values: &[f64], flag: &str) -> Result<SizeBoundaries> {
    match values {
        [a, b] => SizeBoundaries::new(*a, *b),
        _ => Err(RohError::parameter(format!(
            "{} takes exactly two values, got {}",
            flag,
            values.len()
        ))),
    }
}

/// Everything the binary needs, checked.
#[derive(Debug, Clone, PartialEq)]
pub struct RohConfig {
    pub inputs: InputPaths,
    pub out: String,
    pub analysis: AnalysisParams,
    pub cutoff: CutoffSpec,
    pub bounds: BoundarySpec,
    pub raw_lod: bool,
    pub freq_only: bool,
    pub threads: usize,
}

impl RohConfig {
    /// Validates `args`; `seed` stands in when no seed was given.
    pub fn from_args(args: &Args, seed: u64) -> Result<Self> {
        let winsize_mode = match (&args.winsize_multi, args.auto_winsize) {
            (Some(_), true) => {
                return Err(RohError::parameter(
                    "--winsize-multi and --auto-winsize are mutually exclusive",
                ))
            }
            (Some(sizes), false) => WinsizeMode::Explore(sizes.clone()),
            (None, true) => WinsizeMode::Auto {
                initial: args.winsize,
                step: args.auto_winsize_step,
            },
            (None, false) => WinsizeMode::Fixed(args.winsize),
        };

        let cutoff = match (args.lod_cutoff, &args.lod_cutoff_file) {
            (Some(_), Some(_)) => {
                return Err(RohError::parameter(
                    "--lod-cutoff and --lod-cutoff-file are mutually exclusive",
                ))
            }
            (Some(c), None) if !c.is_finite() => {
                return Err(RohError::parameter(format!("LOD cutoff must be finite, got {}", c)))
            }
            (Some(c), None) => CutoffSpec::Fixed(c),
            (None, Some(path)) => CutoffSpec::Table(path.clone()),
            (None, None) => CutoffSpec::Auto,
        };

        let bounds = match (&args.size_bounds, &args.size_bounds_file) {
            (Some(_), Some(_)) => {
                return Err(RohError::parameter(
                    "--size-bounds and --size-bounds-file are mutually exclusive",
                ))
            }
            (Some(pair), None) => BoundarySpec::Fixed(boundary_pair(pair, "--size-bounds")?),
            (None, Some(path)) => BoundarySpec::Table(path.clone()),
            (None, None) => BoundarySpec::Auto,
        };

        let fallback_bounds = match &args.fallback_bounds {
            Some(pair) => boundary_pair(pair, "--fallback-bounds")?,
            None => SizeBoundaries::new(DEFAULT_FALLBACK_BOUNDS.0, DEFAULT_FALLBACK_BOUNDS.1)?,
        };

        let analysis = AnalysisParams {
            winsize_mode,
            stability: PeakSeparationStability {
                tolerance: args.auto_winsize_tolerance,
                max_steps: args.auto_winsize_max_steps,
            },
            error: args.error,
            max_gap: args.max_gap,
            overlap_frac: args.overlap_frac,
            kde_subsample: args.kde_subsample,
            kde_points: args.kde_points,
            resample: args.resample,
            seed: args.seed.unwrap_or(seed),
            fallback_bounds,
        };
        analysis.validate()?;

        if args.threads == 0 {
            return Err(RohError::parameter("thread count must be positive"));
        }
        if args.out.trim().is_empty() {
            return Err(RohError::parameter("output prefix is empty"));
        }
        if args.freq_only && args.freq_file.is_some() {
            return Err(RohError::parameter(
                "--freq-only with --freq-file accomplishes nothing; drop one of them",
            ));
        }
        let centromeres = match (&args.centromere, args.build) {
            (Some(path), _) => CentromereSource::File(path.clone()),
            (None, Some(build)) => CentromereSource::Build(build),
            (None, None) => {
                return Err(RohError::parameter(
                    "choose --build hg18/hg19/hg38 or provide a --centromere file",
                ))
            }
        };

        Ok(RohConfig {
            inputs: InputPaths {
                tped: args.tped.clone(),
                tfam: args.tfam.clone(),
                freq_file: args.freq_file.clone(),
                centromeres,
                tped_missing: args.tped_missing,
            },
            out: args.out.clone(),
            analysis,
            cutoff,
            bounds,
            raw_lod: args.raw_lod,
            freq_only: args.freq_only,
            threads: args.threads,
        })
    }
}

/// Cutoff and boundary modes resolved per population.
///
/// Populations absent from a loaded table use the automatic mode.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationModes {
    pub default_cutoff: CutoffMode,
    pub cutoffs: HashMap<String, f64>,
    pub default_bounds: BoundaryMode,
    pub bounds: HashMap<String, SizeBoundaries>,
}

impl PopulationModes {
    /// Automatic cutoff and boundaries for everyone.
    pub fn auto(fallback_bounds: SizeBoundaries) -> Self {
        PopulationModes {
            default_cutoff: CutoffMode::Auto,
            cutoffs: HashMap::new(),
            default_bounds: BoundaryMode::Auto {
                fallback: fallback_bounds,
            },
            bounds: HashMap::new(),
        }
    }

    pub fn cutoff_for(&self, population: &str) -> CutoffMode {
        self.cutoffs
            .get(population)
            .map_or(self.default_cutoff, |&c| CutoffMode::Fixed(c))
    }

    pub fn bounds_for(&self, population: &str) -> BoundaryMode {
        self.bounds
            .get(population)
            .map_or(self.default_bounds, |&b| BoundaryMode::Fixed(b))
    }
}
