mod assemble_tests;
mod kde_tests;
mod model_tests;
mod parse_tests;
mod property_tests;
mod report_tests;

use crate::model::{FrequencyTable, GenotypeMatrix, LocusMap};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// One planted run: individual, first locus, last locus.
pub(crate) type Planted = (usize, usize, usize);

/// Random Hardy-Weinberg genotypes with homozygous stretches planted where asked.
///
/// Loci are 1000 bp apart. Frequencies are the generating ones, drawn from
/// U(0.2, 0.8).
pub(crate) fn synthetic_unit(
    nind: usize,
    nloci: usize,
    planted: &[Planted],
    seed: u64,
) -> (GenotypeMatrix, LocusMap, FrequencyTable) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let freqs: Vec<f64> = (0..nloci).map(|_| rng.gen_range(0.2..0.8)).collect();
    let rows = (0..nloci)
        .map(|l| {
            (0..nind)
                .map(|ind| {
                    let p = freqs[l];
                    let in_roh = planted
                        .iter()
                        .any(|&(i, s, e)| i == ind && (s..=e).contains(&l));
                    let a = u8::from(rng.gen::<f64>() < p);
                    let b = if in_roh { a } else { u8::from(rng.gen::<f64>() < p) };
                    Some(a + b)
                })
                .collect()
        })
        .collect();
    let positions: Vec<i64> = (0..nloci as i64).map(|i| i * 1000 + 1).collect();
    (
        GenotypeMatrix::from_loci(rows).unwrap(),
        LocusMap::from_positions("1", &positions).unwrap(),
        FrequencyTable::new(freqs.into_iter().map(Some).collect()).unwrap(),
    )
}
