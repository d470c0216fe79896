use crate::assemble::{assemble_individual, AssemblyParams};
use crate::classify::SizeBoundaries;
use crate::lod::{lod, score_window};
use crate::model::{LocusMap, WindowScoreMatrix};

use proptest::prelude::*;

fn genotype() -> impl Strategy<Value = Option<u8>> {
    prop_oneof![Just(None), (0u8..=2).prop_map(Some)]
}

fn frequency() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![Just(None), (0.0f64..=1.0).prop_map(Some)]
}

/// Scores in [-10, 10] with occasional missing windows.
fn score() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![1 => Just(None), 4 => (-10.0f64..10.0).prop_map(Some)]
}

/// Increasing positions with steps of 1 bp to 5 kb.
fn positions(n: usize) -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::vec(1i64..5000, n).prop_map(|steps| {
        steps
            .iter()
            .scan(0i64, |pos, s| {
                *pos += s;
                Some(*pos)
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn window_score_ignores_locus_order(
            loci in proptest::collection::vec((genotype(), frequency()), 1..40),
            error in 1e-4f64..0.2,
        ) {
            let (g, f): (Vec<_>, Vec<_>) = loci.iter().copied().unzip();
            let forward = score_window(&g, &f, error);
            let (rg, rf): (Vec<_>, Vec<_>) = loci.iter().rev().copied().unzip();
            let backward = score_window(&rg, &rf, error);
            prop_assert!(forward.is_finite());
            prop_assert!((forward - backward).abs() <= 1e-9 * (1.0 + forward.abs()));
        }

        #[test]
        fn homozygous_contribution_is_positive(p in 0.0f64..=1.0, error in 1e-4f64..0.5) {
            prop_assert!(lod(Some(2), Some(p), error) > 0.0);
            prop_assert!(lod(Some(0), Some(p), error) > 0.0);
            prop_assert!(lod(Some(1), Some(p), error) < 0.0);
        }

        #[test]
        fn assembled_runs_are_ordered_and_disjoint(
            (pos, row) in (5usize..80).prop_flat_map(|n| {
                (positions(n), proptest::collection::vec(score(), n))
            }),
            winsize in 2usize..12,
            cutoff in -5.0f64..5.0,
            overlap_frac in 0.05f64..=1.0,
            max_gap in 0i64..6000,
        ) {
            let map = LocusMap::from_positions("1", &pos).unwrap();
            let scores = WindowScoreMatrix::from_rows(winsize, vec![row]).unwrap();
            let params = AssemblyParams { cutoff, max_gap, overlap_frac };

            let runs = assemble_individual(0, &scores, 0, &map, None, &params);
            for run in &runs {
                prop_assert!(run.stop >= run.start);
                prop_assert!(run.stop < map.nloci());
                prop_assert!(run.length_bp(&map) >= 1);
                for l in run.start..run.stop {
                    prop_assert!(map.position(l + 1) - map.position(l) <= max_gap);
                }
            }
            for pair in runs.windows(2) {
                prop_assert!(pair[0].stop < pair[1].start);
            }
            prop_assert_eq!(runs.clone(), assemble_individual(0, &scores, 0, &map, None, &params));
        }

        #[test]
        fn size_boundaries_are_ordered(a in 1.0f64..1e8, b in 1.0f64..1e8) {
            prop_assume!(a != b);
            let bounds = SizeBoundaries::new(a, b).unwrap();
            prop_assert!(bounds.short_medium() < bounds.medium_long());
            prop_assert_eq!(bounds, SizeBoundaries::new(b, a).unwrap());
            let counts = bounds.counts(&[a, b, a.min(b) / 2.0]);
            prop_assert_eq!(counts.iter().sum::<usize>(), 3);
            prop_assert_eq!(counts[0], 1);
        }
    }
}
