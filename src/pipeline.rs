use crate::assemble::{run_lengths, RohData};
use crate::classify::{select_size_classes, BoundaryMode, BoundarySource, SizeClassSelection};
use crate::config::{AnalysisParams, PopulationModes};
use crate::cutoff::{select_cutoff, subsample_individuals, CutoffMode, CutoffSelection, CutoffSource};
use crate::error::{Result, RohError, Warning, WarningKind};
use crate::model::{CentromereTable, Dataset, FrequencyTable, Population, UnitKey, WindowScoreMatrix};
use crate::winsize::{KdeWinsizeReport, LodSource, WinsizeOutcome, WinsizeSelector};
use crate::work::WorkOrder;

use indicatif::ProgressBar;
use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

const SUBSAMPLE_STREAM: u64 = 0;
const RESAMPLE_STREAM: u64 = 1;

/// RNG owned by one population, so results do not depend on scheduling.
pub fn population_rng(seed: u64, pop_index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(pop_index as u64));
    rng.set_stream(SUBSAMPLE_STREAM);
    rng
}

/// Independent stream of the same population seed, used for frequency resampling.
pub fn resampling_rng(seed: u64, pop_index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(pop_index as u64));
    rng.set_stream(RESAMPLE_STREAM);
    rng
}

/// Counted-allele frequencies of one population, one table per chromosome.
pub fn estimate_frequencies(
    dataset: &Dataset,
    pop_index: usize,
    resample: usize,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<FrequencyTable>> {
    (0..dataset.nchr())
        .map(|chr| {
            let genotypes = dataset.genotypes.get(UnitKey::new(pop_index, chr))?;
            Ok(FrequencyTable::resampled(genotypes, resample, rng))
        })
        .collect()
}

/// One population's work orders, ordered by chromosome.
#[derive(Debug, Clone)]
pub struct PopulationJob {
    pub pop_index: usize,
    pub population: Population,
    orders: Vec<WorkOrder>,
}

impl PopulationJob {
    pub fn new(pop_index: usize, population: Population, orders: Vec<WorkOrder>) -> Result<Self> {
        for (chr, order) in orders.iter().enumerate() {
            if order.key() != UnitKey::new(pop_index, chr) {
                return Err(RohError::input_shape(format!(
                    "work order {:?} found where population {} chromosome {} was expected",
                    order.key(),
                    pop_index,
                    chr
                )));
            }
            if order.nind() != population.nind() {
                return Err(RohError::input_shape(format!(
                    "population {} has {} individuals but chromosome {} has {}",
                    population.name,
                    population.nind(),
                    order.map().chrom(),
                    order.nind()
                )));
            }
        }
        Ok(PopulationJob {
            pop_index,
            population,
            orders,
        })
    }

    /// Builds the job for `pop_index` from loaded data and its frequencies.
    pub fn from_dataset(
        dataset: &Dataset,
        pop_index: usize,
        freqs: Vec<FrequencyTable>,
        centromeres: &CentromereTable,
        error: f64,
        max_gap: i64,
    ) -> Result<Self> {
        if freqs.len() != dataset.nchr() {
            return Err(RohError::input_shape(format!(
                "{} frequency tables for {} chromosomes",
                freqs.len(),
                dataset.nchr()
            )));
        }
        let population = dataset
            .populations
            .get(pop_index)
            .cloned()
            .ok_or_else(|| RohError::input_shape(format!("no population {}", pop_index)))?;
        let orders = freqs
            .into_iter()
            .enumerate()
            .map(|(chr, f)| {
                let key = UnitKey::new(pop_index, chr);
                let map = &dataset.maps[chr];
                WorkOrder::new(
                    key,
                    dataset.genotypes.get(key)?.clone(),
                    f,
                    map.clone(),
                    centromeres.get(map.chrom()),
                    error,
                    max_gap,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(pop_index, population, orders)
    }

    pub fn name(&self) -> &str {
        &self.population.name
    }

    pub fn nind(&self) -> usize {
        self.population.nind()
    }

    pub fn orders(&self) -> &[WorkOrder] {
        &self.orders
    }
}

impl LodSource for PopulationJob {
    fn score(&self, winsize: usize) -> Result<Vec<WindowScoreMatrix>> {
        self.orders.par_iter().map(|o| o.score(winsize)).collect()
    }
}

/// Results for one population after a full analysis.
#[derive(Debug, Clone)]
pub struct PopulationReport {
    pub name: String,
    pub winsize: usize,
    pub winsize_report: KdeWinsizeReport,
    /// `None` when no score was available to place a cutoff.
    pub cutoff: Option<CutoffSelection>,
    pub size_classes: SizeClassSelection,
    pub roh: Vec<RohData>,
    pub lengths: Vec<f64>,
    /// Kept only when raw LOD output was requested.
    pub scores: Option<Vec<WindowScoreMatrix>>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone)]
pub enum PopulationOutcome {
    Analyzed(PopulationReport),
    /// Window sizes were only explored.
    Explored {
        name: String,
        report: KdeWinsizeReport,
        warnings: Vec<Warning>,
    },
}

impl PopulationOutcome {
    pub fn name(&self) -> &str {
        match self {
            PopulationOutcome::Analyzed(r) => &r.name,
            PopulationOutcome::Explored { name, .. } => name,
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        match self {
            PopulationOutcome::Analyzed(r) => &r.warnings,
            PopulationOutcome::Explored { warnings, .. } => warnings,
        }
    }
}

fn note(warnings: &mut Vec<Warning>, kind: WarningKind, population: &str, message: String) {
    let w = Warning::new(kind, population, message);
    warn!("{}", w);
    warnings.push(w);
}

/// Runs every stage for one population.
///
/// `rng` draws the KDE subsample; it should be the population's own
/// [`population_rng`].
pub fn run_population(
    job: &PopulationJob,
    params: &AnalysisParams,
    cutoff_mode: CutoffMode,
    bounds_mode: &BoundaryMode,
    keep_scores: bool,
    rng: &mut ChaCha8Rng,
) -> Result<PopulationOutcome> {
    let name = job.name().to_string();
    let mut warnings = Vec::new();
    let inds = subsample_individuals(job.nind(), params.kde_subsample, rng);

    let selector = WinsizeSelector::new(params.kde_points, &params.stability);
    let (winsize, scores, winsize_report) =
        match selector.select(&params.winsize_mode, job, &inds)? {
            WinsizeOutcome::Explored(report) => {
                return Ok(PopulationOutcome::Explored {
                    name,
                    report,
                    warnings,
                })
            }
            WinsizeOutcome::Chosen {
                winsize,
                scores,
                report,
                stable,
            } => {
                if !stable {
                    note(
                        &mut warnings,
                        WarningKind::WinsizeNotStable,
                        &name,
                        format!(
                            "LOD distribution did not stabilize after {} window sizes; using {}",
                            report.entries.len(),
                            winsize
                        ),
                    );
                }
                (winsize, scores, report)
            }
        };
    info!("{}: window size {}", name, winsize);

    let cutoff = match select_cutoff(&scores, &inds, cutoff_mode, params.kde_points) {
        Ok(selection) => {
            if selection.source == CutoffSource::Shoulder {
                note(
                    &mut warnings,
                    WarningKind::FlatLodDistribution,
                    &name,
                    format!(
                        "LOD density has a single mode; cutoff {:.4} taken from its upper tail",
                        selection.cutoff
                    ),
                );
            }
            info!("{}: LOD cutoff {:.4}", name, selection.cutoff);
            Some(selection)
        }
        Err(e) if e.is_recoverable() => {
            note(
                &mut warnings,
                WarningKind::NoLodScores,
                &name,
                format!("no LOD cutoff could be chosen ({}); no runs called", e),
            );
            None
        }
        Err(e) => return Err(e),
    };

    let mut roh: Vec<RohData> = job
        .population
        .individuals
        .iter()
        .map(RohData::new)
        .collect();
    if let Some(selection) = &cutoff {
        let per_chr = job
            .orders
            .par_iter()
            .zip(scores.par_iter())
            .map(|(order, s)| order.assemble(s, selection.cutoff, params.overlap_frac))
            .collect::<Result<Vec<_>>>()?;
        for chr_runs in per_chr {
            for (data, runs) in roh.iter_mut().zip(chr_runs) {
                data.runs.extend(runs);
            }
        }
    }

    let maps: Vec<_> = job.orders.iter().map(WorkOrder::shared_map).collect();
    let lengths = run_lengths(&roh, &maps);
    let size_classes = select_size_classes(&lengths, bounds_mode);
    if let BoundarySource::Fallback(reason) = &size_classes.source {
        note(
            &mut warnings,
            WarningKind::SizeClassFallback,
            &name,
            format!(
                "{}; using boundaries {} and {}",
                reason,
                size_classes.boundaries.short_medium(),
                size_classes.boundaries.medium_long()
            ),
        );
    }

    Ok(PopulationOutcome::Analyzed(PopulationReport {
        name,
        winsize,
        winsize_report,
        cutoff,
        size_classes,
        roh,
        lengths,
        scores: keep_scores.then_some(scores),
        warnings,
    }))
}

/// Analyses every population of `dataset`.
///
/// `freqs[pop]` holds that population's per-chromosome frequencies.
/// Populations run one after another; each one's chromosomes are scored in
/// parallel.
pub fn run_dataset(
    dataset: &Dataset,
    freqs: Vec<Vec<FrequencyTable>>,
    centromeres: &CentromereTable,
    params: &AnalysisParams,
    modes: &PopulationModes,
    keep_scores: bool,
    progress: Option<&ProgressBar>,
) -> Result<Vec<PopulationOutcome>> {
    params.validate()?;
    if freqs.len() != dataset.npop() {
        return Err(RohError::input_shape(format!(
            "frequencies for {} populations but {} were loaded",
            freqs.len(),
            dataset.npop()
        )));
    }
    let mut outcomes = Vec::with_capacity(dataset.npop());
    for (pop_index, pop_freqs) in freqs.into_iter().enumerate() {
        let job = PopulationJob::from_dataset(
            dataset,
            pop_index,
            pop_freqs,
            centromeres,
            params.error,
            params.max_gap,
        )?;
        if let Some(pb) = progress {
            pb.set_message(job.name().to_string());
        }
        let mut rng = population_rng(params.seed, pop_index);
        let outcome = run_population(
            &job,
            params,
            modes.cutoff_for(job.name()),
            &modes.bounds_for(job.name()),
            keep_scores,
            &mut rng,
        )?;
        outcomes.push(outcome);
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }
    Ok(outcomes)
}
