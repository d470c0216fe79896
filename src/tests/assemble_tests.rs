use crate::assemble::{
    assemble_individual, assemble_roh_windows, qualifying_loci, run_lengths, AssemblyParams,
    RohData, RohRun,
};
use crate::lod::{calc_lod_windows, LodParams};
use crate::model::{Centromere, FrequencyTable, GenotypeMatrix, LocusMap, WindowScoreMatrix};

use ndarray::arr1;
use std::sync::Arc;

fn params(cutoff: f64) -> AssemblyParams {
    AssemblyParams {
        cutoff,
        max_gap: 200_000,
        overlap_frac: 0.25,
    }
}

/// Ten loci 1 kb apart, a 301 kb jump, then ten more.
fn gapped_map() -> LocusMap {
    let mut positions: Vec<i64> = (0..10).map(|i| i * 1000 + 1).collect();
    positions.extend((0..10).map(|i| 310_001 + i * 1000));
    LocusMap::from_positions("1", &positions).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualifying_fraction() {
        // anchors 0..=2 above a cutoff of 0, the rest below or missing
        let scores = arr1(&[1.0, 1.0, 1.0, -1.0, f64::NAN, -1.0]);
        let q = qualifying_loci(scores.view(), 3, 0.0, 0.5);
        // locus 4 is covered by anchors 2, 3, 4: one of three
        assert_eq!(q, vec![true, true, true, true, false, false]);

        let q = qualifying_loci(scores.view(), 3, 0.0, 0.3);
        assert_eq!(q, vec![true, true, true, true, true, false]);

        // strictly above the cutoff
        let q = qualifying_loci(scores.view(), 3, 1.0, 0.1);
        assert!(q.iter().all(|&v| !v));
    }

    #[test]
    fn test_gap_splits_homozygous_individual() {
        let map = gapped_map();
        let genotypes = GenotypeMatrix::from_loci(vec![vec![Some(2)]; 20]).unwrap();
        let freqs = FrequencyTable::new(vec![Some(0.5); 20]).unwrap();
        let lod = LodParams {
            winsize: 4,
            error: 0.001,
            max_gap: 200_000,
        };
        let scores = calc_lod_windows(&genotypes, &map, &freqs, None, &lod).unwrap();
        for anchor in 7..=9 {
            assert_eq!(scores.get(0, anchor), None);
        }

        let runs = assemble_roh_windows(0, &scores, &map, None, &params(0.5)).unwrap();
        assert_eq!(
            runs[0],
            vec![
                RohRun { chr: 0, start: 0, stop: 9 },
                RohRun { chr: 0, start: 10, stop: 19 },
            ]
        );
        assert_eq!(runs[0][0].length_bp(&map), 9001);
        assert_eq!(runs[0][1].nloci(), 10);
    }

    #[test]
    fn test_centromere_splits_run() {
        let positions: Vec<i64> = (0..10).map(|i| i * 10_000 + 1).collect();
        let map = LocusMap::from_positions("2", &positions).unwrap();
        let rows = vec![vec![Some(5.0); 10]];
        let scores = WindowScoreMatrix::from_rows(1, rows).unwrap();
        let centromere = Centromere::new(45_000, 48_000).unwrap();

        let runs = assemble_individual(3, &scores, 0, &map, Some(centromere), &params(0.0));
        assert_eq!(
            runs,
            vec![
                RohRun { chr: 3, start: 0, stop: 4 },
                RohRun { chr: 3, start: 5, stop: 9 },
            ]
        );
        let whole = assemble_individual(3, &scores, 0, &map, None, &params(0.0));
        assert_eq!(whole, vec![RohRun { chr: 3, start: 0, stop: 9 }]);
    }

    #[test]
    fn test_runs_end_at_low_scores() {
        let map = LocusMap::from_positions("1", &(1..=12).map(|i| i * 100).collect::<Vec<_>>()).unwrap();
        let row = vec![
            Some(-5.0),
            Some(3.0),
            Some(3.0),
            Some(3.0),
            Some(-5.0),
            Some(-5.0),
            Some(-5.0),
            Some(-5.0),
            Some(3.0),
            Some(3.0),
            None,
            None,
        ];
        let scores = WindowScoreMatrix::from_rows(2, vec![row]).unwrap();
        let p = AssemblyParams {
            cutoff: 0.0,
            max_gap: 1000,
            overlap_frac: 0.5,
        };
        let runs = assemble_individual(0, &scores, 0, &map, None, &p);
        assert_eq!(
            runs,
            vec![
                RohRun { chr: 0, start: 1, stop: 4 },
                RohRun { chr: 0, start: 8, stop: 10 },
            ]
        );
        for run in &runs {
            assert!(run.stop >= run.start);
        }
        // same input, same output
        assert_eq!(runs, assemble_individual(0, &scores, 0, &map, None, &p));
    }

    #[test]
    fn test_invalid_assembly_params() {
        let map = gapped_map();
        let scores = WindowScoreMatrix::new_missing(1, 20, 4);
        let mut p = params(0.0);
        p.overlap_frac = 0.0;
        assert!(assemble_roh_windows(0, &scores, &map, None, &p).is_err());
        p.overlap_frac = 1.5;
        assert!(assemble_roh_windows(0, &scores, &map, None, &p).is_err());

        let short = WindowScoreMatrix::new_missing(1, 5, 4);
        assert!(assemble_roh_windows(0, &short, &map, None, &params(0.0)).is_err());

        let none = assemble_roh_windows(0, &scores, &map, None, &params(0.0)).unwrap();
        assert!(none[0].is_empty());
    }

    #[test]
    fn test_run_lengths_pool_individuals() {
        let map = Arc::new(gapped_map());
        let mut a = RohData::new("a");
        a.runs.push(RohRun { chr: 0, start: 0, stop: 9 });
        let mut b = RohData::new("b");
        b.runs.push(RohRun { chr: 0, start: 10, stop: 11 });
        b.runs.push(RohRun { chr: 1, start: 0, stop: 1 });

        let lengths = run_lengths(&[a, b], &[map]);
        // the run on an unknown chromosome is skipped
        assert_eq!(lengths, vec![9001.0, 1001.0]);
    }
}
