use crate::classify::SizeBoundaries;
use crate::error::{Result, RohError};
use crate::model::{
    Centromere, CentromereTable, Dataset, FrequencyTable, GenotypeMatrix, Locus, LocusMap,
    Population, UnitArena, UnitKey,
};

use colored::Colorize;
use flate2::read::MultiGzDecoder;
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

const TPED_LEADING_COLUMNS: usize = 4;

/// Opens a plain or gzip-compressed text file, judged by the `.gz` extension.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;

    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        let decoder = MultiGzDecoder::new(file);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Non-blank, non-comment lines with their 1-based line numbers.
fn data_lines(reader: Box<dyn BufRead + Send>) -> impl Iterator<Item = Result<(usize, String)>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(i, line)| match line {
            Ok(l) if l.trim().is_empty() || l.trim_start().starts_with('#') => None,
            Ok(l) => Some(Ok((i + 1, l))),
            Err(e) => Some(Err(e.into())),
        })
}

fn parse_field<T: FromStr>(field: Option<&str>, what: &str, line: usize) -> Result<T> {
    let raw = field.ok_or_else(|| RohError::parse(line, format!("missing {}", what)))?;
    raw.parse()
        .map_err(|_| RohError::parse(line, format!("invalid {} '{}'", what, raw)))
}

/// One individual of a TFAM file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TfamRecord {
    pub population: String,
    pub individual: String,
}

/// Reads a TFAM file. The family column is taken as the population label.
pub fn read_tfam(path: &Path) -> Result<Vec<TfamRecord>> {
    let mut records = Vec::new();
    for item in data_lines(open_reader(path)?) {
        let (line_num, line) = item?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(RohError::parse(
                line_num,
                format!("TFAM needs at least 2 columns, found {}", fields.len()),
            ));
        }
        records.push(TfamRecord {
            population: fields[0].to_string(),
            individual: fields[1].to_string(),
        });
    }
    if records.is_empty() {
        return Err(RohError::input_shape(format!(
            "no individuals in {}",
            path.display()
        )));
    }
    Ok(records)
}

/// Groups TFAM records by population in order of first appearance.
///
/// Returns each population with the TPED column indices of its members.
pub fn group_populations(records: &[TfamRecord]) -> Vec<(Population, Vec<usize>)> {
    let mut order: Vec<String> = Vec::new();
    let mut members: HashMap<&str, (Vec<String>, Vec<usize>)> = HashMap::new();
    for (col, rec) in records.iter().enumerate() {
        let entry = members.entry(rec.population.as_str()).or_insert_with(|| {
            order.push(rec.population.clone());
            (Vec::new(), Vec::new())
        });
        entry.0.push(rec.individual.clone());
        entry.1.push(col);
    }
    order
        .into_iter()
        .filter_map(|name| {
            members
                .remove(name.as_str())
                .map(|(ids, cols)| (Population::new(name.clone(), ids), cols))
        })
        .collect()
}

/// Genotypes of one chromosome for every TFAM individual.
#[derive(Debug, Clone)]
pub struct TpedChromosome {
    pub map: LocusMap,
    /// One row per locus, one dosage per individual.
    pub dosages: Vec<Vec<Option<u8>>>,
}

/// Allele symbols seen so far on one TPED line.
#[derive(Default)]
struct AlleleCodes {
    counted: Option<char>,
    other: Option<char>,
}

impl AlleleCodes {
    fn code(&mut self, raw: &str, missing: char, line_num: usize) -> Result<Option<char>> {
        let mut chars = raw.chars();
        let c = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(RohError::parse(line_num, format!("invalid allele '{}'", raw))),
        };
        if c == missing {
            return Ok(None);
        }
        match (self.counted, self.other) {
            (None, _) => self.counted = Some(c),
            (Some(x), _) if x == c => {}
            (Some(_), None) => self.other = Some(c),
            (Some(_), Some(y)) if y == c => {}
            (Some(x), Some(y)) => {
                return Err(RohError::parse(
                    line_num,
                    format!("more than two alleles ({}, {}, {})", x, y, c),
                ))
            }
        }
        Ok(Some(c))
    }
}

/// Turns one line's allele pairs into dosages of the first allele seen.
fn tped_dosages(
    alleles: &[&str],
    missing: char,
    line_num: usize,
) -> Result<(char, char, Vec<Option<u8>>)> {
    let mut codes = AlleleCodes::default();
    let mut pairs = Vec::with_capacity(alleles.len() / 2);
    for pair in alleles.chunks(2) {
        let a = codes.code(pair[0], missing, line_num)?;
        let b = codes.code(pair[1], missing, line_num)?;
        pairs.push((a, b));
    }

    let counted = codes.counted;
    let mut dosages = Vec::with_capacity(pairs.len());
    for (a, b) in pairs {
        dosages.push(match (a, b) {
            (Some(a), Some(b)) => Some(u8::from(Some(a) == counted) + u8::from(Some(b) == counted)),
            _ => None,
        });
    }
    Ok((
        counted.unwrap_or(missing),
        codes.other.unwrap_or(missing),
        dosages,
    ))
}

/// Reads a TPED file with `nind` individuals per line.
///
/// Each chromosome's lines must be contiguous and sorted by position. The
/// dosage counts the first non-missing allele seen on the line; a genotype
/// with either allele missing is missing.
pub fn read_tped(path: &Path, nind: usize, missing: char) -> Result<Vec<TpedChromosome>> {
    let mut chromosomes: Vec<TpedChromosome> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut current: Option<(String, Vec<Locus>, Vec<Vec<Option<u8>>>)> = None;

    let mut finish = |chrom: String, loci: Vec<Locus>, rows: Vec<Vec<Option<u8>>>| -> Result<()> {
        chromosomes.push(TpedChromosome {
            map: LocusMap::new(chrom, loci)?,
            dosages: rows,
        });
        Ok(())
    };

    for item in data_lines(open_reader(path)?) {
        let (line_num, line) = item?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        let expected = TPED_LEADING_COLUMNS + 2 * nind;
        if fields.len() != expected {
            return Err(RohError::parse(
                line_num,
                format!(
                    "expected {} columns for {} individuals, found {}",
                    expected,
                    nind,
                    fields.len()
                ),
            ));
        }
        let chrom = fields[0].to_string();
        let genetic_pos: f64 = parse_field(Some(fields[2]), "genetic position", line_num)?;
        let physical_pos: i64 = parse_field(Some(fields[3]), "physical position", line_num)?;
        let (allele, other_allele, dosages) =
            tped_dosages(&fields[TPED_LEADING_COLUMNS..], missing, line_num)?;
        let locus = Locus {
            id: fields[1].to_string(),
            physical_pos,
            genetic_pos,
            allele,
            other_allele,
        };

        match current.as_mut() {
            Some((name, loci, rows)) if *name == chrom => {
                loci.push(locus);
                rows.push(dosages);
            }
            _ => {
                if seen.contains(&chrom) {
                    return Err(RohError::input_shape(format!(
                        "chromosome {} is split across non-contiguous lines (line {})",
                        chrom, line_num
                    )));
                }
                if let Some((name, loci, rows)) = current.take() {
                    finish(name, loci, rows)?;
                }
                seen.insert(chrom.clone());
                current = Some((chrom, vec![locus], vec![dosages]));
            }
        }
    }
    if let Some((name, loci, rows)) = current.take() {
        finish(name, loci, rows)?;
    }

    if chromosomes.is_empty() {
        return Err(RohError::input_shape(format!("no loci in {}", path.display())));
    }
    Ok(chromosomes)
}

/// Splits genotypes by population into a [`Dataset`].
pub fn build_dataset(chromosomes: Vec<TpedChromosome>, tfam: &[TfamRecord]) -> Result<Dataset> {
    let groups = group_populations(tfam);
    let mut arena = UnitArena::new(groups.len(), chromosomes.len());
    let mut maps = Vec::with_capacity(chromosomes.len());

    for (chr, chromosome) in chromosomes.into_iter().enumerate() {
        for (pop, (_, cols)) in groups.iter().enumerate() {
            let rows = chromosome
                .dosages
                .iter()
                .map(|row| cols.iter().map(|&c| row.get(c).copied().flatten()).collect())
                .collect();
            arena.insert(UnitKey::new(pop, chr), GenotypeMatrix::from_loci(rows)?)?;
        }
        maps.push(Arc::new(chromosome.map));
    }

    let populations = groups.into_iter().map(|(p, _)| p).collect();
    Dataset::new(maps, populations, arena)
}

/// Reads TFAM and TPED and assembles the [`Dataset`].
pub fn load_dataset(tped: &Path, tfam: &Path, missing: char) -> Result<Dataset> {
    let records = read_tfam(tfam)?;
    info!("Read {} individuals from {}", records.len(), tfam.display());
    let chromosomes = read_tped(tped, records.len(), missing)?;
    let dataset = build_dataset(chromosomes, &records)?;
    info!(
        "Read {} loci on {} chromosomes for {} populations",
        dataset.total_loci(),
        dataset.nchr(),
        dataset.npop()
    );
    Ok(dataset)
}

/// Allele frequencies read from a frequency file, keyed by SNP identifier.
#[derive(Debug, Clone, Default)]
pub struct FrequencyFile {
    pub populations: Vec<String>,
    entries: HashMap<String, (char, Vec<Option<f64>>)>,
}

impl FrequencyFile {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Frequencies for one population along `map`.
    ///
    /// A SNP whose listed allele is the other allele of the map has its
    /// frequency flipped. SNPs absent from the file are missing.
    pub fn table_for(&self, map: &LocusMap, population: &str) -> Result<FrequencyTable> {
        let col = self
            .populations
            .iter()
            .position(|p| p == population)
            .ok_or_else(|| {
                RohError::input_shape(format!(
                    "population {} is not in the frequency file",
                    population
                ))
            })?;
        let mut absent = 0usize;
        let freqs = map
            .loci()
            .iter()
            .map(|locus| match self.entries.get(&locus.id) {
                Some((allele, values)) => values[col].map(|f| {
                    if *allele == locus.allele {
                        f
                    } else {
                        1.0 - f
                    }
                }),
                None => {
                    absent += 1;
                    None
                }
            })
            .collect();
        if absent > 0 {
            warn!(
                "{} of {} loci on chromosome {} have no frequency for {}",
                absent,
                map.nloci(),
                map.chrom(),
                population
            );
        }
        FrequencyTable::new(freqs)
    }
}

/// Reads a frequency file: header `SNP ALLELE <pop>...`, then one line per
/// SNP. `NA` marks a missing frequency.
pub fn read_frequency_file(path: &Path) -> Result<FrequencyFile> {
    let mut lines = data_lines(open_reader(path)?);
    let (_, header) = lines
        .next()
        .transpose()?
        .ok_or_else(|| RohError::input_shape(format!("{} is empty", path.display())))?;
    let columns: Vec<&str> = header.split_whitespace().collect();
    if columns.len() < 3 || columns[0] != "SNP" || columns[1] != "ALLELE" {
        return Err(RohError::parse(
            1,
            "frequency header must be SNP, ALLELE, then one column per population",
        ));
    }
    let populations: Vec<String> = columns[2..].iter().map(|s| s.to_string()).collect();

    let mut entries = HashMap::new();
    for item in lines {
        let (line_num, line) = item?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != columns.len() {
            return Err(RohError::parse(
                line_num,
                format!("expected {} columns, found {}", columns.len(), fields.len()),
            ));
        }
        let allele: char = parse_field(Some(fields[1]), "allele", line_num)?;
        let values = fields[2..]
            .iter()
            .map(|&v| {
                if v == "NA" {
                    Ok(None)
                } else {
                    parse_field::<f64>(Some(v), "frequency", line_num).map(Some)
                }
            })
            .collect::<Result<Vec<_>>>()?;
        entries.insert(fields[0].to_string(), (allele, values));
    }
    Ok(FrequencyFile {
        populations,
        entries,
    })
}

/// Reads centromere intervals: chromosome, start, end.
pub fn read_centromere_file(path: &Path) -> Result<CentromereTable> {
    let mut table = CentromereTable::new();
    for item in data_lines(open_reader(path)?) {
        let (line_num, line) = item?;
        let mut fields = line.split_whitespace();
        let chrom = fields
            .next()
            .ok_or_else(|| RohError::parse(line_num, "missing chromosome"))?;
        let start: i64 = parse_field(fields.next(), "start", line_num)?;
        let end: i64 = parse_field(fields.next(), "end", line_num)?;
        if table.insert(chrom, Centromere::new(start, end)?).is_some() {
            eprintln!(
                "{}",
                format!(
                    "Centromere for chromosome {} given twice; keeping line {}",
                    chrom, line_num
                )
                .yellow()
            );
        }
    }
    Ok(table)
}

/// Reads per-population LOD cutoffs: population, cutoff.
pub fn read_cutoff_table(path: &Path) -> Result<HashMap<String, f64>> {
    let mut table = HashMap::new();
    for item in data_lines(open_reader(path)?) {
        let (line_num, line) = item?;
        let mut fields = line.split_whitespace();
        let pop = fields
            .next()
            .ok_or_else(|| RohError::parse(line_num, "missing population"))?;
        let cutoff: f64 = parse_field(fields.next(), "LOD cutoff", line_num)?;
        if !cutoff.is_finite() {
            return Err(RohError::parse(line_num, "LOD cutoff must be finite"));
        }
        table.insert(pop.to_string(), cutoff);
    }
    Ok(table)
}

/// Reads per-population size boundaries: population, two boundaries in bp.
pub fn read_bounds_table(path: &Path) -> Result<HashMap<String, SizeBoundaries>> {
    let mut table = HashMap::new();
    for item in data_lines(open_reader(path)?) {
        let (line_num, line) = item?;
        let mut fields = line.split_whitespace();
        let pop = fields
            .next()
            .ok_or_else(|| RohError::parse(line_num, "missing population"))?;
        let a: f64 = parse_field(fields.next(), "short/medium boundary", line_num)?;
        let b: f64 = parse_field(fields.next(), "medium/long boundary", line_num)?;
        let bounds = SizeBoundaries::new(a, b)
            .map_err(|e| RohError::parse(line_num, e.to_string()))?;
        table.insert(pop.to_string(), bounds);
    }
    Ok(table)
}
