use crate::assemble::{assemble_roh_windows, AssemblyParams};
use crate::classify::{select_size_classes, BoundaryMode, BoundarySource, SizeBoundaries};
use crate::cutoff::select_lod_cutoff;
use crate::error::RohError;
use crate::kde::fit_kde;
use crate::lod::{calc_lod_windows, LodParams};
use crate::model::{Centromere, FrequencyTable, GenotypeMatrix, LocusMap, WindowScoreMatrix};

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn to_py_err(e: RohError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn centromere_from(interval: Option<(i64, i64)>) -> PyResult<Option<Centromere>> {
    interval
        .map(|(start, end)| Centromere::new(start, end))
        .transpose()
        .map_err(to_py_err)
}

/// PyO3 wrapper for calc_lod_windows
///
/// # Arguments
/// * `dosages` - One list per locus of per-individual dosages (0, 1, 2 or None)
/// * `positions` - Physical position of each locus
/// * `freqs` - Counted-allele frequency per locus, or None
/// * `centromere` - Optional (start, end) interval
///
/// # Returns
/// * One list of window scores per individual, None where no window is anchored
#[pyfunction]
#[allow(clippy::too_many_arguments)]
fn lod_windows_py(
    _py: Python,
    dosages: Vec<Vec<Option<u8>>>,
    positions: Vec<i64>,
    freqs: Vec<Option<f64>>,
    winsize: usize,
    error: f64,
    max_gap: i64,
    centromere: Option<(i64, i64)>,
) -> PyResult<Vec<Vec<Option<f64>>>> {
    let genotypes = GenotypeMatrix::from_loci(dosages).map_err(to_py_err)?;
    let map = LocusMap::from_positions("py", &positions).map_err(to_py_err)?;
    let freqs = FrequencyTable::new(freqs).map_err(to_py_err)?;
    let params = LodParams {
        winsize,
        error,
        max_gap,
    };
    let scores = calc_lod_windows(&genotypes, &map, &freqs, centromere_from(centromere)?, &params)
        .map_err(to_py_err)?;
    Ok((0..scores.nind())
        .map(|ind| scores.row_scores(ind).collect())
        .collect())
}

/// PyO3 wrapper for the KDE cutoff
///
/// # Returns
/// * (cutoff, whether the density was bimodal)
#[pyfunction]
fn lod_cutoff_py(scores: Vec<f64>, points: usize) -> PyResult<(f64, bool)> {
    let kde = fit_kde(&scores, points).map_err(to_py_err)?;
    let antimode = select_lod_cutoff(&kde);
    Ok((antimode.x, antimode.bimodal))
}

/// PyO3 wrapper for assemble_roh_windows
///
/// # Returns
/// * Per individual, the (start, stop) locus indices of each run
#[pyfunction]
#[allow(clippy::too_many_arguments)]
fn call_roh_py(
    scores: Vec<Vec<Option<f64>>>,
    positions: Vec<i64>,
    winsize: usize,
    cutoff: f64,
    max_gap: i64,
    overlap_frac: f64,
    centromere: Option<(i64, i64)>,
) -> PyResult<Vec<Vec<(usize, usize)>>> {
    let scores = WindowScoreMatrix::from_rows(winsize, scores).map_err(to_py_err)?;
    let map = LocusMap::from_positions("py", &positions).map_err(to_py_err)?;
    let params = AssemblyParams {
        cutoff,
        max_gap,
        overlap_frac,
    };
    let runs = assemble_roh_windows(0, &scores, &map, centromere_from(centromere)?, &params)
        .map_err(to_py_err)?;
    Ok(runs
        .into_iter()
        .map(|r| r.into_iter().map(|run| (run.start, run.stop)).collect())
        .collect())
}

/// PyO3 wrapper for select_size_classes
///
/// # Returns
/// * (short/medium boundary, medium/long boundary, whether the mixture fit was used)
#[pyfunction]
fn size_boundaries_py(lengths: Vec<f64>) -> PyResult<(f64, f64, bool)> {
    let mode = BoundaryMode::Auto {
        fallback: SizeBoundaries::default(),
    };
    let selection = select_size_classes(&lengths, &mode);
    Ok((
        selection.boundaries.short_medium(),
        selection.boundaries.medium_long(),
        selection.source == BoundarySource::Gmm,
    ))
}

/// PyO3 module definition
#[pymodule]
fn rohkit(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(lod_windows_py, m)?)?;
    m.add_function(wrap_pyfunction!(lod_cutoff_py, m)?)?;
    m.add_function(wrap_pyfunction!(call_roh_py, m)?)?;
    m.add_function(wrap_pyfunction!(size_boundaries_py, m)?)?;

    Ok(())
}
