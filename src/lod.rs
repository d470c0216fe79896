use crate::error::{Result, RohError};
use crate::model::{Centromere, FrequencyTable, GenotypeMatrix, LocusMap, WindowScoreMatrix};

/// Frequencies are kept this far from 0 and 1 so no likelihood is exactly zero.
pub const FREQ_CLAMP: f64 = 1e-6;

/// Parameters of one scoring pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodParams {
    /// Window length in loci.
    pub winsize: usize,
    /// Assumed genotyping error rate, strictly inside (0, 1).
    pub error: f64,
    /// Largest allowed distance in bp between consecutive loci of a window.
    pub max_gap: i64,
}

impl LodParams {
    pub fn validate(&self) -> Result<()> {
        check_error_rate(self.error)?;
        if self.winsize == 0 {
            return Err(RohError::parameter("window size must be positive"));
        }
        if self.max_gap < 0 {
            return Err(RohError::parameter(format!(
                "max gap must be non-negative, got {}",
                self.max_gap
            )));
        }
        Ok(())
    }
}

pub fn check_error_rate(error: f64) -> Result<()> {
    if !(error > 0.0 && error < 1.0) {
        return Err(RohError::parameter(format!(
            "genotype error rate must be > 0 and < 1, got {}",
            error
        )));
    }
    Ok(())
}

/// LOD contribution of a single genotype.
///
/// `genotype` counts copies of the allele whose frequency is `freq`. Missing
/// genotype or frequency contributes nothing.
pub fn lod(genotype: Option<u8>, freq: Option<f64>, error: f64) -> f64 {
    let (g, p) = match (genotype, freq) {
        (Some(g), Some(p)) => (g, p),
        _ => return 0.0,
    };
    let p = p.clamp(FREQ_CLAMP, 1.0 - FREQ_CLAMP);
    let q = 1.0 - p;
    let (autozygous, not_autozygous) = match g {
        2 => ((1.0 - error) * p + error * p * p, p * p),
        0 => ((1.0 - error) * q + error * q * q, q * q),
        _ => (error * 2.0 * p * q, 2.0 * p * q),
    };
    (autozygous / not_autozygous).log10()
}

/// Sum of LOD contributions over paired dosages and frequencies.
pub fn score_window(dosages: &[Option<u8>], freqs: &[Option<f64>], error: f64) -> f64 {
    dosages
        .iter()
        .zip(freqs)
        .map(|(&g, &p)| lod(g, p, error))
        .sum()
}

/// Which anchors start a scorable window.
///
/// A window anchored at `a` covers loci `a..a + winsize`. It is rejected if
/// it runs off the chromosome end, if two consecutive loci inside it are more
/// than `max_gap` bp apart, or if its span touches the centromere.
pub fn valid_windows(
    map: &LocusMap,
    winsize: usize,
    max_gap: i64,
    centromere: Option<Centromere>,
) -> Vec<bool> {
    let nloci = map.nloci();
    let mut valid = vec![false; nloci];
    if winsize == 0 || winsize > nloci {
        return valid;
    }

    // big_gaps[i] = number of over-long gaps between loci 0..=i
    let mut big_gaps = vec![0usize; nloci];
    for i in 1..nloci {
        let jump = map.position(i) - map.position(i - 1);
        big_gaps[i] = big_gaps[i - 1] + usize::from(jump > max_gap);
    }

    for anchor in 0..=(nloci - winsize) {
        let last = anchor + winsize - 1;
        if big_gaps[last] != big_gaps[anchor] {
            continue;
        }
        if let Some(c) = centromere {
            if c.overlaps(map.position(anchor), map.position(last)) {
                continue;
            }
        }
        valid[anchor] = true;
    }
    valid
}

/// Window sums for one individual, sliding across runs of valid anchors.
fn slide_window_sums(contrib: &[f64], valid: &[bool], winsize: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; contrib.len()];
    let mut running: Option<f64> = None;
    for (anchor, &ok) in valid.iter().enumerate() {
        if !ok {
            running = None;
            continue;
        }
        let sum = match running {
            Some(prev) => prev - contrib[anchor - 1] + contrib[anchor + winsize - 1],
            None => contrib[anchor..anchor + winsize].iter().sum(),
        };
        out[anchor] = Some(sum);
        running = Some(sum);
    }
    out
}

/// Scores every individual at every anchor of one chromosome.
pub fn calc_lod_windows(
    genotypes: &GenotypeMatrix,
    map: &LocusMap,
    freqs: &FrequencyTable,
    centromere: Option<Centromere>,
    params: &LodParams,
) -> Result<WindowScoreMatrix> {
    params.validate()?;
    let nloci = map.nloci();
    if genotypes.nloci() != nloci || freqs.len() != nloci {
        return Err(RohError::input_shape(format!(
            "chromosome {}: map has {} loci, genotypes {}, frequencies {}",
            map.chrom(),
            nloci,
            genotypes.nloci(),
            freqs.len()
        )));
    }

    let valid = valid_windows(map, params.winsize, params.max_gap, centromere);
    let mut scores = WindowScoreMatrix::new_missing(genotypes.nind(), nloci, params.winsize);
    let mut contrib = vec![0.0; nloci];

    for ind in 0..genotypes.nind() {
        let dosages = genotypes.individual(ind)?;
        for (locus, c) in contrib.iter_mut().enumerate() {
            *c = lod(dosages[locus], freqs.get(locus), params.error);
        }
        for (anchor, sum) in slide_window_sums(&contrib, &valid, params.winsize)
            .into_iter()
            .enumerate()
        {
            if sum.is_some() {
                scores.set(ind, anchor, sum);
            }
        }
    }

    Ok(scores)
}
