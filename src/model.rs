use crate::error::{Result, RohError};

use ndarray::{Array2, ArrayView1};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// Largest legal genotype dosage (count of the counted allele in a diploid).
pub const MAX_DOSAGE: u8 = 2;

/// Sentinel stored in a [`WindowScoreMatrix`] where no valid window is anchored.
pub const MISSING_SCORE: f64 = f64::NAN;

/// Strips a leading "chr" so that "chr7" and "7" name the same chromosome.
pub fn normalize_chrom(chrom: &str) -> &str {
    chrom.trim().trim_start_matches("chr")
}

/// Genotype dosages for one population on one chromosome.
///
/// Stored locus-major (`nloci x nind`) so that scanning along a chromosome
/// touches contiguous memory per locus. `None` is a missing genotype.
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeMatrix {
    data: Array2<Option<u8>>,
}

impl GenotypeMatrix {
    /// Builds a matrix from one row of dosages per locus.
    pub fn from_loci(rows: Vec<Vec<Option<u8>>>) -> Result<Self> {
        let nloci = rows.len();
        if nloci == 0 {
            return Err(RohError::input_shape("genotype matrix has no loci"));
        }
        let nind = rows[0].len();
        let mut flat = Vec::with_capacity(nloci * nind);
        for (locus, row) in rows.into_iter().enumerate() {
            if row.len() != nind {
                return Err(RohError::input_shape(format!(
                    "locus {} has {} genotypes but locus 0 has {}",
                    locus,
                    row.len(),
                    nind
                )));
            }
            flat.extend(row);
        }
        let data = Array2::from_shape_vec((nloci, nind), flat)
            .map_err(|e| RohError::input_shape(e.to_string()))?;
        Self::from_array(data)
    }

    /// Wraps an existing `nloci x nind` array after validating it.
    pub fn from_array(data: Array2<Option<u8>>) -> Result<Self> {
        if data.nrows() == 0 || data.ncols() == 0 {
            return Err(RohError::input_shape(format!(
                "genotype matrix must be non-empty, got {} loci x {} individuals",
                data.nrows(),
                data.ncols()
            )));
        }
        if let Some(((locus, ind), bad)) = data
            .indexed_iter()
            .find(|(_, d)| matches!(d, Some(v) if *v > MAX_DOSAGE))
        {
            return Err(RohError::input_shape(format!(
                "dosage {:?} at locus {} individual {} is outside 0..=2",
                bad, locus, ind
            )));
        }
        Ok(GenotypeMatrix { data })
    }

    pub fn nloci(&self) -> usize {
        self.data.nrows()
    }

    pub fn nind(&self) -> usize {
        self.data.ncols()
    }

    /// Dosage at (locus, individual); outer `None` when out of bounds.
    pub fn dosage(&self, locus: usize, ind: usize) -> Option<Option<u8>> {
        self.data.get((locus, ind)).copied()
    }

    /// All dosages of one individual along the chromosome.
    pub fn individual(&self, ind: usize) -> Result<ArrayView1<'_, Option<u8>>> {
        if ind >= self.nind() {
            return Err(RohError::input_shape(format!(
                "individual index {} out of range ({} individuals)",
                ind,
                self.nind()
            )));
        }
        Ok(self.data.column(ind))
    }

    /// All dosages at one locus.
    pub fn locus(&self, locus: usize) -> Result<ArrayView1<'_, Option<u8>>> {
        if locus >= self.nloci() {
            return Err(RohError::input_shape(format!(
                "locus index {} out of range ({} loci)",
                locus,
                self.nloci()
            )));
        }
        Ok(self.data.row(locus))
    }
}

/// One marker on a chromosome.
#[derive(Debug, Clone, PartialEq)]
pub struct Locus {
    pub id: String,
    pub physical_pos: i64,
    pub genetic_pos: f64,
    /// Allele whose copies the dosage counts.
    pub allele: char,
    pub other_allele: char,
}

/// Ordered markers of one chromosome. Physical positions never decrease.
#[derive(Debug, Clone, PartialEq)]
pub struct LocusMap {
    chrom: String,
    loci: Vec<Locus>,
}

impl LocusMap {
    pub fn new(chrom: impl Into<String>, loci: Vec<Locus>) -> Result<Self> {
        let chrom = chrom.into();
        if loci.is_empty() {
            return Err(RohError::input_shape(format!("chromosome {} has no loci", chrom)));
        }
        for (i, pair) in loci.windows(2).enumerate() {
            if pair[1].physical_pos < pair[0].physical_pos {
                return Err(RohError::input_shape(format!(
                    "chromosome {}: locus {} ({}) at {} precedes locus {} ({}) at {}",
                    chrom,
                    i + 1,
                    pair[1].id,
                    pair[1].physical_pos,
                    i,
                    pair[0].id,
                    pair[0].physical_pos
                )));
            }
        }
        Ok(LocusMap { chrom, loci })
    }

    /// Map with placeholder identifiers and alleles, for callers that only know positions.
    pub fn from_positions(chrom: impl Into<String>, positions: &[i64]) -> Result<Self> {
        let chrom = chrom.into();
        let loci = positions
            .iter()
            .map(|&pos| Locus {
                id: format!("{}:{}", chrom, pos),
                physical_pos: pos,
                genetic_pos: 0.0,
                allele: '1',
                other_allele: '0',
            })
            .collect();
        Self::new(chrom, loci)
    }

    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn nloci(&self) -> usize {
        self.loci.len()
    }

    pub fn loci(&self) -> &[Locus] {
        &self.loci
    }

    pub fn locus(&self, index: usize) -> Option<&Locus> {
        self.loci.get(index)
    }

    /// Physical position of a locus. Panics if `index` is out of range.
    pub fn position(&self, index: usize) -> i64 {
        self.loci[index].physical_pos
    }

    pub fn set_alleles(&mut self, index: usize, allele: char, other_allele: char) -> Result<()> {
        let nloci = self.loci.len();
        let locus = self.loci.get_mut(index).ok_or_else(|| {
            RohError::input_shape(format!("locus index {} out of range ({} loci)", index, nloci))
        })?;
        locus.allele = allele;
        locus.other_allele = other_allele;
        Ok(())
    }
}

/// Counted-allele frequency per locus for one population on one chromosome.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyTable {
    freqs: Vec<Option<f64>>,
}

impl FrequencyTable {
    pub fn new(freqs: Vec<Option<f64>>) -> Result<Self> {
        if let Some((locus, f)) = freqs
            .iter()
            .enumerate()
            .find_map(|(i, f)| f.filter(|v| !(0.0..=1.0).contains(v)).map(|v| (i, v)))
        {
            return Err(RohError::input_shape(format!(
                "frequency {} at locus {} is outside [0, 1]",
                f, locus
            )));
        }
        Ok(FrequencyTable { freqs })
    }

    /// Mean dosage / 2 at every locus; missing where no genotype was observed.
    pub fn from_genotypes(genotypes: &GenotypeMatrix) -> Self {
        let freqs = genotypes
            .data
            .rows()
            .into_iter()
            .map(|row| {
                let (count, total) = row
                    .iter()
                    .flatten()
                    .fold((0u64, 0u64), |(c, t), &d| (c + d as u64, t + 2));
                if total == 0 {
                    None
                } else {
                    Some(count as f64 / total as f64)
                }
            })
            .collect();
        FrequencyTable { freqs }
    }

    /// Observed frequencies replaced by the success rate of `nresample`
    /// Bernoulli draws at the observed frequency. `nresample == 0` keeps the
    /// observed values.
    pub fn resampled<R: Rng>(
        genotypes: &GenotypeMatrix,
        nresample: usize,
        rng: &mut R,
    ) -> Self {
        let observed = Self::from_genotypes(genotypes);
        if nresample == 0 {
            return observed;
        }
        let freqs = observed
            .freqs
            .iter()
            .map(|f| {
                f.map(|freq| {
                    let hits = (0..nresample).filter(|_| rng.gen::<f64>() <= freq).count();
                    hits as f64 / nresample as f64
                })
            })
            .collect();
        FrequencyTable { freqs }
    }

    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    /// Frequency at a locus; `None` if missing or out of range.
    pub fn get(&self, locus: usize) -> Option<f64> {
        self.freqs.get(locus).copied().flatten()
    }

    pub fn as_slice(&self) -> &[Option<f64>] {
        &self.freqs
    }
}

/// Physical interval around a centromere excluded from window scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Centromere {
    pub start: i64,
    pub end: i64,
}

impl Centromere {
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if start > end {
            return Err(RohError::input_shape(format!(
                "centromere start {} is after end {}",
                start, end
            )));
        }
        Ok(Centromere { start, end })
    }

    /// True if the closed interval [q_start, q_end] touches the centromere.
    pub fn overlaps(&self, q_start: i64, q_end: i64) -> bool {
        q_start <= self.end && q_end >= self.start
    }
}

/// Centromere interval per chromosome, keyed by normalized chromosome name.
#[derive(Debug, Clone, Default)]
pub struct CentromereTable {
    by_chrom: HashMap<String, Centromere>,
}

impl CentromereTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chrom: &str, centromere: Centromere) -> Option<Centromere> {
        self.by_chrom
            .insert(normalize_chrom(chrom).to_string(), centromere)
    }

    pub fn get(&self, chrom: &str) -> Option<Centromere> {
        self.by_chrom.get(normalize_chrom(chrom)).copied()
    }

    pub fn len(&self) -> usize {
        self.by_chrom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_chrom.is_empty()
    }
}

/// A named group of individuals analysed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Population {
    pub name: String,
    pub individuals: Vec<String>,
}

impl Population {
    pub fn new(name: impl Into<String>, individuals: Vec<String>) -> Self {
        Population {
            name: name.into(),
            individuals,
        }
    }

    pub fn nind(&self) -> usize {
        self.individuals.len()
    }
}

/// LOD score per (individual, locus) for one population on one chromosome.
///
/// The score of a window is stored at its anchor (first) locus. Loci where no
/// valid window is anchored hold [`MISSING_SCORE`]; accessors expose them as
/// `None`.
#[derive(Debug, Clone)]
pub struct WindowScoreMatrix {
    winsize: usize,
    data: Array2<f64>,
}

impl WindowScoreMatrix {
    pub fn new_missing(nind: usize, nloci: usize, winsize: usize) -> Self {
        WindowScoreMatrix {
            winsize,
            data: Array2::from_elem((nind, nloci), MISSING_SCORE),
        }
    }

    /// Builds a matrix from one row of scores per individual.
    pub fn from_rows(winsize: usize, rows: Vec<Vec<Option<f64>>>) -> Result<Self> {
        let nind = rows.len();
        let nloci = rows.first().map_or(0, |r| r.len());
        let mut matrix = Self::new_missing(nind, nloci, winsize);
        for (ind, row) in rows.into_iter().enumerate() {
            if row.len() != nloci {
                return Err(RohError::input_shape(format!(
                    "score row {} has {} loci but row 0 has {}",
                    ind,
                    row.len(),
                    nloci
                )));
            }
            for (locus, score) in row.into_iter().enumerate() {
                matrix.set(ind, locus, score);
            }
        }
        Ok(matrix)
    }

    pub fn winsize(&self) -> usize {
        self.winsize
    }

    pub fn nind(&self) -> usize {
        self.data.nrows()
    }

    pub fn nloci(&self) -> usize {
        self.data.ncols()
    }

    pub fn get(&self, ind: usize, locus: usize) -> Option<f64> {
        self.data
            .get((ind, locus))
            .copied()
            .filter(|v| !v.is_nan())
    }

    pub(crate) fn set(&mut self, ind: usize, locus: usize, score: Option<f64>) {
        if let Some(cell) = self.data.get_mut((ind, locus)) {
            *cell = score.unwrap_or(MISSING_SCORE);
        }
    }

    /// Raw scores of one individual, with [`MISSING_SCORE`] for missing windows.
    pub fn individual(&self, ind: usize) -> ArrayView1<'_, f64> {
        self.data.row(ind)
    }

    pub fn row_scores(&self, ind: usize) -> impl Iterator<Item = Option<f64>> + '_ {
        self.data
            .row(ind)
            .into_iter()
            .map(|&v| if v.is_nan() { None } else { Some(v) })
    }

    /// Non-missing scores of the given individuals, in row order.
    pub fn valid_scores_for(&self, inds: &[usize]) -> Vec<f64> {
        inds.iter()
            .filter(|&&ind| ind < self.nind())
            .flat_map(|&ind| self.data.row(ind).into_iter().copied().filter(|v| !v.is_nan()))
            .collect()
    }

    pub fn missing_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }

    /// Exact equality including the position of missing cells.
    pub fn bitwise_eq(&self, other: &WindowScoreMatrix) -> bool {
        self.winsize == other.winsize
            && self.data.dim() == other.data.dim()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl PartialEq for WindowScoreMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.bitwise_eq(other)
    }
}

/// Identifies one (population, chromosome) unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey {
    pub pop: usize,
    pub chr: usize,
}

impl UnitKey {
    pub fn new(pop: usize, chr: usize) -> Self {
        UnitKey { pop, chr }
    }
}

/// Flat storage of one value per (population, chromosome).
#[derive(Debug, Clone)]
pub struct UnitArena<T> {
    npop: usize,
    nchr: usize,
    slots: Vec<Option<T>>,
}

impl<T> UnitArena<T> {
    pub fn new(npop: usize, nchr: usize) -> Self {
        let mut slots = Vec::with_capacity(npop * nchr);
        slots.resize_with(npop * nchr, || None);
        UnitArena { npop, nchr, slots }
    }

    pub fn npop(&self) -> usize {
        self.npop
    }

    pub fn nchr(&self) -> usize {
        self.nchr
    }

    fn index(&self, key: UnitKey) -> Result<usize> {
        if key.pop >= self.npop || key.chr >= self.nchr {
            return Err(RohError::input_shape(format!(
                "unit (pop {}, chr {}) outside arena of {} populations x {} chromosomes",
                key.pop, key.chr, self.npop, self.nchr
            )));
        }
        Ok(key.pop * self.nchr + key.chr)
    }

    pub fn insert(&mut self, key: UnitKey, value: T) -> Result<Option<T>> {
        let i = self.index(key)?;
        Ok(self.slots[i].replace(value))
    }

    pub fn get(&self, key: UnitKey) -> Result<&T> {
        let i = self.index(key)?;
        self.slots[i].as_ref().ok_or_else(|| {
            RohError::input_shape(format!("no data for unit (pop {}, chr {})", key.pop, key.chr))
        })
    }

    pub fn take(&mut self, key: UnitKey) -> Result<T> {
        let i = self.index(key)?;
        self.slots[i].take().ok_or_else(|| {
            RohError::input_shape(format!("no data for unit (pop {}, chr {})", key.pop, key.chr))
        })
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitKey, &T)> + '_ {
        let nchr = self.nchr;
        self.slots.iter().enumerate().filter_map(move |(i, slot)| {
            slot.as_ref()
                .map(|value| (UnitKey::new(i / nchr, i % nchr), value))
        })
    }
}

/// Everything loaded for one analysis: maps, rosters and genotypes.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub maps: Vec<Arc<LocusMap>>,
    pub populations: Vec<Population>,
    pub genotypes: UnitArena<GenotypeMatrix>,
}

impl Dataset {
    /// Checks that every unit is present and agrees with its map and roster.
    pub fn new(
        maps: Vec<Arc<LocusMap>>,
        populations: Vec<Population>,
        genotypes: UnitArena<GenotypeMatrix>,
    ) -> Result<Self> {
        if genotypes.npop() != populations.len() || genotypes.nchr() != maps.len() {
            return Err(RohError::input_shape(format!(
                "genotype arena is {} x {} but there are {} populations and {} chromosomes",
                genotypes.npop(),
                genotypes.nchr(),
                populations.len(),
                maps.len()
            )));
        }
        for (pop_idx, pop) in populations.iter().enumerate() {
            for (chr_idx, map) in maps.iter().enumerate() {
                let matrix = genotypes.get(UnitKey::new(pop_idx, chr_idx))?;
                if matrix.nloci() != map.nloci() || matrix.nind() != pop.nind() {
                    return Err(RohError::input_shape(format!(
                        "population {} chromosome {}: genotypes are {} loci x {} individuals, expected {} x {}",
                        pop.name,
                        map.chrom(),
                        matrix.nloci(),
                        matrix.nind(),
                        map.nloci(),
                        pop.nind()
                    )));
                }
            }
        }
        Ok(Dataset {
            maps,
            populations,
            genotypes,
        })
    }

    pub fn npop(&self) -> usize {
        self.populations.len()
    }

    pub fn nchr(&self) -> usize {
        self.maps.len()
    }

    pub fn total_loci(&self) -> usize {
        self.maps.iter().map(|m| m.nloci()).sum()
    }
}
