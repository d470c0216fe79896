use crate::error::{Result, RohError};
use crate::model::{Centromere, LocusMap, WindowScoreMatrix};

use ndarray::ArrayView1;

/// One run on one chromosome, as inclusive locus indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RohRun {
    pub chr: usize,
    pub start: usize,
    pub stop: usize,
}

impl RohRun {
    /// Physical length, `pos[stop] - pos[start] + 1`.
    pub fn length_bp(&self, map: &LocusMap) -> i64 {
        map.position(self.stop) - map.position(self.start) + 1
    }

    pub fn nloci(&self) -> usize {
        self.stop - self.start + 1
    }
}

/// All runs of one individual, ordered by chromosome then position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RohData {
    pub ind_id: String,
    pub runs: Vec<RohRun>,
}

impl RohData {
    pub fn new(ind_id: impl Into<String>) -> Self {
        RohData {
            ind_id: ind_id.into(),
            runs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyParams {
    /// A window is "in a run" when its score is strictly above this.
    pub cutoff: f64,
    /// Largest distance in bp between consecutive qualifying loci of a run.
    pub max_gap: i64,
    /// Share of covering windows that must be in a run for a locus to qualify.
    pub overlap_frac: f64,
}

impl AssemblyParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.overlap_frac > 0.0 && self.overlap_frac <= 1.0) {
            return Err(RohError::parameter(format!(
                "overlap fraction must be in (0, 1], got {}",
                self.overlap_frac
            )));
        }
        if self.max_gap < 0 {
            return Err(RohError::parameter(format!(
                "max gap must be non-negative, got {}",
                self.max_gap
            )));
        }
        if self.cutoff.is_nan() {
            return Err(RohError::parameter("LOD cutoff is NaN"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Outside,
    InRun { start: usize, last: usize },
}

/// Whether each locus is covered by enough windows scoring above the cutoff.
///
/// The windows covering locus `l` are those anchored in `max(0, l-w+1)..=l`.
/// Missing scores count toward the number of covering windows only.
pub fn qualifying_loci(
    scores: ArrayView1<'_, f64>,
    winsize: usize,
    cutoff: f64,
    overlap_frac: f64,
) -> Vec<bool> {
    let nloci = scores.len();
    let winsize = winsize.max(1);
    let mut above = vec![0usize; nloci + 1];
    for (a, &s) in scores.iter().enumerate() {
        above[a + 1] = above[a] + usize::from(s > cutoff);
    }
    (0..nloci)
        .map(|l| {
            let lo = (l + 1).saturating_sub(winsize);
            let covering = (l + 1 - lo) as f64;
            let hits = (above[l + 1] - above[lo]) as f64;
            hits / covering >= overlap_frac
        })
        .collect()
}

/// Runs of one individual on one chromosome.
pub fn assemble_individual(
    chr: usize,
    scores: &WindowScoreMatrix,
    ind: usize,
    map: &LocusMap,
    centromere: Option<Centromere>,
    params: &AssemblyParams,
) -> Vec<RohRun> {
    let qualifies = qualifying_loci(
        scores.individual(ind),
        scores.winsize(),
        params.cutoff,
        params.overlap_frac,
    );
    let close = |start: usize, last: usize| RohRun {
        chr,
        start,
        stop: last,
    };

    let mut runs = Vec::new();
    let mut state = RunState::Outside;
    for (l, &ok) in qualifies.iter().enumerate() {
        state = match (state, ok) {
            (RunState::Outside, false) => RunState::Outside,
            (RunState::Outside, true) => RunState::InRun { start: l, last: l },
            (RunState::InRun { start, last }, false) => {
                runs.push(close(start, last));
                RunState::Outside
            }
            (RunState::InRun { start, last }, true) => {
                let (from, to) = (map.position(last), map.position(l));
                let straddles = centromere.map_or(false, |c| c.overlaps(from, to));
                if to - from > params.max_gap || straddles {
                    runs.push(close(start, last));
                    RunState::InRun { start: l, last: l }
                } else {
                    RunState::InRun { start, last: l }
                }
            }
        };
    }
    if let RunState::InRun { start, last } = state {
        runs.push(close(start, last));
    }
    runs
}

/// Runs of every individual in `scores` on one chromosome, indexed by individual.
pub fn assemble_roh_windows(
    chr: usize,
    scores: &WindowScoreMatrix,
    map: &LocusMap,
    centromere: Option<Centromere>,
    params: &AssemblyParams,
) -> Result<Vec<Vec<RohRun>>> {
    params.validate()?;
    if scores.nloci() != map.nloci() {
        return Err(RohError::input_shape(format!(
            "chromosome {}: {} scored loci but the map has {}",
            map.chrom(),
            scores.nloci(),
            map.nloci()
        )));
    }
    Ok((0..scores.nind())
        .map(|ind| assemble_individual(chr, scores, ind, map, centromere, params))
        .collect())
}

/// Run lengths in bp pooled across individuals, for size classification.
pub fn run_lengths(data: &[RohData], maps: &[std::sync::Arc<LocusMap>]) -> Vec<f64> {
    data.iter()
        .flat_map(|d| d.runs.iter())
        .filter_map(|run| maps.get(run.chr).map(|m| run.length_bp(m) as f64))
        .collect()
}
