use crate::assemble::RohData;
use crate::classify::{BoundarySource, SizeClass};
use crate::cutoff::CutoffSource;
use crate::error::{Result, Warning};
use crate::kde::KdeResult;
use crate::model::{normalize_chrom, FrequencyTable, LocusMap, WindowScoreMatrix};
use crate::pipeline::{PopulationOutcome, PopulationReport};

use colored::Colorize;
use csv::WriterBuilder;
use flate2::write::GzEncoder;
use flate2::Compression;
use itertools::Itertools;
use prettytable::{row, Table};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MISSING: &str = "NA";

/// File names derived from the output prefix.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    prefix: String,
}

impl OutputPaths {
    pub fn new(prefix: impl Into<String>) -> Self {
        OutputPaths {
            prefix: prefix.into(),
        }
    }

    fn with(&self, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}.{}", self.prefix, suffix))
    }

    pub fn bed(&self) -> PathBuf {
        self.with("roh.bed")
    }

    pub fn cutoffs(&self) -> PathBuf {
        self.with("lod.cutoffs")
    }

    pub fn bounds(&self) -> PathBuf {
        self.with("size.bounds")
    }

    pub fn kde(&self, population: &str) -> PathBuf {
        self.with(&format!("{}.kde", population))
    }

    pub fn winsize_kde(&self, population: &str, winsize: usize) -> PathBuf {
        self.with(&format!("{}.w{}.kde", population, winsize))
    }

    pub fn raw_lod(&self, population: &str, chrom: &str) -> PathBuf {
        self.with(&format!(
            "{}.chr{}.raw.lod.windows.gz",
            population,
            normalize_chrom(chrom)
        ))
    }

    pub fn freq(&self) -> PathBuf {
        self.with("freq.gz")
    }

    pub fn warnings(&self) -> PathBuf {
        self.with("warnings.tsv")
    }
}

fn tsv_writer<W: Write>(inner: W) -> csv::Writer<W> {
    WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(inner)
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| v.to_string())
}

fn item_rgb(class: SizeClass) -> &'static str {
    match class {
        SizeClass::Short => "102,194,165",
        SizeClass::Medium => "252,141,98",
        SizeClass::Long => "141,160,203",
    }
}

/// One BED track per individual; the name column holds the size class
/// label and the score column the run length in bp.
pub fn write_bed<W: Write>(
    out: &mut W,
    report: &PopulationReport,
    maps: &[Arc<LocusMap>],
) -> Result<()> {
    let bounds = report.size_classes.boundaries;
    for data in &report.roh {
        writeln!(
            out,
            "track name={} description=\"{} {} ROH\" visibility=2 itemRgb=\"On\"",
            data.ind_id, report.name, data.ind_id
        )?;
        for run in &data.runs {
            let Some(map) = maps.get(run.chr) else {
                continue;
            };
            let start = (map.position(run.start) - 1).max(0);
            let end = map.position(run.stop);
            let length = run.length_bp(map);
            let class = bounds.classify(length as f64);
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t.\t{}\t{}\t{}",
                map.chrom(),
                start,
                end,
                class.label(),
                length,
                start,
                end,
                item_rgb(class)
            )?;
        }
    }
    Ok(())
}

pub fn write_bed_file(path: &Path, reports: &[&PopulationReport], maps: &[Arc<LocusMap>]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for report in reports {
        write_bed(&mut out, report, maps)?;
    }
    out.flush()?;
    Ok(())
}

/// Two columns, grid point and density.
pub fn write_kde(path: &Path, kde: &KdeResult) -> Result<()> {
    let mut writer = tsv_writer(BufWriter::new(File::create(path)?));
    writer.write_record(["lod", "density"])?;
    for (x, y) in kde.x.iter().zip(&kde.density) {
        writer.write_record([x.to_string(), y.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// `population cutoff`, readable back as a cutoff table. Populations
/// without a cutoff are listed as comments.
pub fn write_cutoffs(path: &Path, reports: &[&PopulationReport]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for report in reports {
        match &report.cutoff {
            Some(selection) => writeln!(out, "{}\t{}", report.name, selection.cutoff)?,
            None => writeln!(out, "# {}\t{}", report.name, MISSING)?,
        }
    }
    out.flush()?;
    Ok(())
}

/// `population short/medium medium/long`, readable back as a boundary table.
pub fn write_bounds(path: &Path, reports: &[&PopulationReport]) -> Result<()> {
    let mut writer = tsv_writer(BufWriter::new(File::create(path)?));
    for report in reports {
        let b = report.size_classes.boundaries;
        writer.write_record([
            report.name.clone(),
            b.short_medium().to_string(),
            b.medium_long().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Gzipped matrix of window scores: one row per locus, one column per individual.
pub fn write_raw_lod(
    path: &Path,
    map: &LocusMap,
    scores: &WindowScoreMatrix,
    individuals: &[String],
) -> Result<()> {
    let encoder = GzEncoder::new(BufWriter::new(File::create(path)?), Compression::default());
    let mut writer = tsv_writer(encoder);

    let mut header = vec!["SNP".to_string(), "POS".to_string()];
    header.extend(individuals.iter().cloned());
    writer.write_record(&header)?;

    for (locus_idx, locus) in map.loci().iter().enumerate() {
        let mut record = Vec::with_capacity(individuals.len() + 2);
        record.push(locus.id.clone());
        record.push(locus.physical_pos.to_string());
        for ind in 0..scores.nind() {
            record.push(fmt_opt(scores.get(ind, locus_idx)));
        }
        writer.write_record(&record)?;
    }
    let encoder = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Gzipped frequency file with header `SNP ALLELE <pop>...`.
///
/// `freqs[pop][chr]` must line up with `maps[chr]`.
pub fn write_frequencies(
    path: &Path,
    maps: &[Arc<LocusMap>],
    populations: &[String],
    freqs: &[Vec<FrequencyTable>],
) -> Result<()> {
    let encoder = GzEncoder::new(BufWriter::new(File::create(path)?), Compression::default());
    let mut writer = tsv_writer(encoder);

    let mut header = vec!["SNP".to_string(), "ALLELE".to_string()];
    header.extend(populations.iter().cloned());
    writer.write_record(&header)?;

    for (chr, map) in maps.iter().enumerate() {
        for (locus_idx, locus) in map.loci().iter().enumerate() {
            let mut record = vec![locus.id.clone(), locus.allele.to_string()];
            record.extend(
                freqs
                    .iter()
                    .map(|pop| fmt_opt(pop.get(chr).and_then(|t| t.get(locus_idx)))),
            );
            writer.write_record(&record)?;
        }
    }
    let encoder = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    encoder.finish()?.flush()?;
    Ok(())
}

pub fn write_warnings(path: &Path, warnings: &[Warning]) -> Result<()> {
    let mut writer = tsv_writer(BufWriter::new(File::create(path)?));
    writer.write_record(["kind", "population", "message"])?;
    for w in warnings {
        writer.write_record([w.kind.as_str(), w.population.as_str(), w.message.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes every artifact of a finished analysis and returns the paths written.
pub fn write_outcomes(
    paths: &OutputPaths,
    outcomes: &[PopulationOutcome],
    maps: &[Arc<LocusMap>],
    extra_warnings: &[Warning],
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let analyzed: Vec<&PopulationReport> = outcomes
        .iter()
        .filter_map(|o| match o {
            PopulationOutcome::Analyzed(r) => Some(r),
            PopulationOutcome::Explored { .. } => None,
        })
        .collect();

    for outcome in outcomes {
        let (name, winsize_report) = match outcome {
            PopulationOutcome::Analyzed(r) => (&r.name, &r.winsize_report),
            PopulationOutcome::Explored { name, report, .. } => (name, report),
        };
        // a fixed window size yields the same curve as the cutoff KDE
        if winsize_report.entries.len() > 1 || matches!(outcome, PopulationOutcome::Explored { .. }) {
            for entry in &winsize_report.entries {
                if let Some(kde) = &entry.kde {
                    let path = paths.winsize_kde(name, entry.winsize);
                    write_kde(&path, kde)?;
                    written.push(path);
                }
            }
        }
    }

    for report in &analyzed {
        if let Some(kde) = report.cutoff.as_ref().and_then(|c| c.kde.as_ref()) {
            let path = paths.kde(&report.name);
            write_kde(&path, kde)?;
            written.push(path);
        }
        if let Some(scores) = &report.scores {
            let individuals: Vec<String> = report.roh.iter().map(|d| d.ind_id.clone()).collect();
            for (map, matrix) in maps.iter().zip(scores) {
                let path = paths.raw_lod(&report.name, map.chrom());
                write_raw_lod(&path, map, matrix, &individuals)?;
                written.push(path);
            }
        }
    }

    if !analyzed.is_empty() {
        write_bed_file(&paths.bed(), &analyzed, maps)?;
        write_cutoffs(&paths.cutoffs(), &analyzed)?;
        write_bounds(&paths.bounds(), &analyzed)?;
        written.extend([paths.bed(), paths.cutoffs(), paths.bounds()]);
    }

    let warnings: Vec<Warning> = extra_warnings
        .iter()
        .cloned()
        .chain(outcomes.iter().flat_map(|o| o.warnings().iter().cloned()))
        .collect();
    write_warnings(&paths.warnings(), &warnings)?;
    written.push(paths.warnings());
    Ok(written)
}

fn count_runs(roh: &[RohData]) -> usize {
    roh.iter().map(|d| d.runs.len()).sum()
}

/// Per-population summary table on stdout.
pub fn print_summary(outcomes: &[PopulationOutcome]) {
    let mut table = Table::new();
    table.add_row(row![
        "Population",
        "Window",
        "LOD cutoff",
        "Cutoff source",
        "Runs",
        "Short/Medium",
        "Medium/Long",
        "Bounds source",
        "A",
        "B",
        "C",
        "Warnings"
    ]);

    for outcome in outcomes {
        match outcome {
            PopulationOutcome::Analyzed(r) => {
                let (cutoff, source) = match &r.cutoff {
                    Some(c) => (
                        format!("{:.4}", c.cutoff),
                        match c.source {
                            CutoffSource::User => "user",
                            CutoffSource::Antimode => "antimode",
                            CutoffSource::Shoulder => "shoulder",
                        },
                    ),
                    None => (MISSING.to_string(), "-"),
                };
                let b = r.size_classes.boundaries;
                let bounds_source = match r.size_classes.source {
                    BoundarySource::User => "user",
                    BoundarySource::Gmm => "gmm",
                    BoundarySource::Fallback(_) => "fallback",
                };
                let counts = b.counts(&r.lengths);
                table.add_row(row![
                    r.name,
                    r.winsize,
                    cutoff,
                    source,
                    count_runs(&r.roh),
                    format!("{:.0}", b.short_medium()),
                    format!("{:.0}", b.medium_long()),
                    bounds_source,
                    counts[0],
                    counts[1],
                    counts[2],
                    r.warnings.len()
                ]);
            }
            PopulationOutcome::Explored { name, report, warnings } => {
                table.add_row(row![
                    name,
                    report.winsizes().iter().join(","),
                    "-",
                    "explored",
                    "-",
                    "-",
                    "-",
                    "-",
                    "-",
                    "-",
                    "-",
                    warnings.len()
                ]);
            }
        }
    }

    println!("\n{}", "ROH summary:".green().bold());
    table.printstd();
}
