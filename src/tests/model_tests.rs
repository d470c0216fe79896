use crate::error::ErrorKind;
use crate::model::{
    normalize_chrom, Centromere, CentromereTable, Dataset, FrequencyTable, GenotypeMatrix,
    LocusMap, Population, UnitArena, UnitKey, WindowScoreMatrix,
};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

fn small_matrix() -> GenotypeMatrix {
    GenotypeMatrix::from_loci(vec![
        vec![Some(0), Some(2), None],
        vec![Some(1), Some(1), Some(2)],
        vec![None, None, None],
    ])
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genotype_matrix_shape_and_access() {
        let g = small_matrix();
        assert_eq!(g.nloci(), 3);
        assert_eq!(g.nind(), 3);
        assert_eq!(g.dosage(0, 1), Some(Some(2)));
        assert_eq!(g.dosage(0, 2), Some(None));
        assert_eq!(g.dosage(5, 0), None);
        assert_eq!(g.individual(1).unwrap().to_vec(), vec![Some(2), Some(1), None]);
        assert_eq!(g.locus(1).unwrap().to_vec(), vec![Some(1), Some(1), Some(2)]);
        assert!(g.individual(3).is_err());
        assert!(g.locus(3).is_err());
    }

    #[test]
    fn test_genotype_matrix_rejects_bad_input() {
        let ragged = GenotypeMatrix::from_loci(vec![vec![Some(0), Some(1)], vec![Some(0)]]);
        assert_eq!(ragged.unwrap_err().kind(), ErrorKind::InputShape);
        assert!(GenotypeMatrix::from_loci(vec![]).is_err());
        assert!(GenotypeMatrix::from_loci(vec![vec![]]).is_err());
        assert!(GenotypeMatrix::from_loci(vec![vec![Some(3)]]).is_err());
    }

    #[test]
    fn test_locus_map_ordering() {
        let map = LocusMap::from_positions("chr3", &[10, 10, 25]).unwrap();
        assert_eq!(map.nloci(), 3);
        assert_eq!(map.position(2), 25);
        assert_eq!(map.chrom(), "chr3");
        assert!(map.locus(3).is_none());
        assert!(LocusMap::from_positions("1", &[10, 5]).is_err());
        assert!(LocusMap::from_positions("1", &[]).is_err());

        let mut map = map;
        map.set_alleles(1, 'A', 'G').unwrap();
        assert_eq!(map.locus(1).unwrap().allele, 'A');
        assert!(map.set_alleles(9, 'A', 'G').is_err());
    }

    #[test]
    fn test_frequencies_from_genotypes() {
        let freqs = FrequencyTable::from_genotypes(&small_matrix());
        assert_eq!(freqs.len(), 3);
        assert_eq!(freqs.get(0), Some(0.5));
        assert_eq!(freqs.get(1), Some(4.0 / 6.0));
        assert_eq!(freqs.get(2), None);
        assert_eq!(freqs.get(7), None);

        assert!(FrequencyTable::new(vec![Some(1.2)]).is_err());
        assert!(FrequencyTable::new(vec![Some(-0.1)]).is_err());
        assert!(FrequencyTable::new(vec![Some(0.0), None, Some(1.0)]).is_ok());
    }

    #[test]
    fn test_resampled_frequencies_are_reproducible() {
        let g = small_matrix();
        let observed = FrequencyTable::resampled(&g, 0, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(observed, FrequencyTable::from_genotypes(&g));

        let a = FrequencyTable::resampled(&g, 50, &mut ChaCha8Rng::seed_from_u64(9));
        let b = FrequencyTable::resampled(&g, 50, &mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);
        assert_eq!(a.get(2), None);
        for f in a.as_slice().iter().flatten() {
            assert!((0.0..=1.0).contains(f));
            // a multiple of 1/50
            assert!(((f * 50.0) - (f * 50.0).round()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_centromere_table_normalizes_names() {
        assert_eq!(normalize_chrom("chr12"), "12");
        assert_eq!(normalize_chrom(" X "), "X");

        let mut table = CentromereTable::new();
        assert!(table.is_empty());
        table.insert("chr1", Centromere::new(100, 200).unwrap());
        assert_eq!(table.get("1"), Some(Centromere { start: 100, end: 200 }));
        assert!(table.insert("1", Centromere::new(150, 250).unwrap()).is_some());
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("2"), None);

        let c = Centromere::new(100, 200).unwrap();
        assert!(c.overlaps(50, 100));
        assert!(c.overlaps(200, 300));
        assert!(c.overlaps(120, 130));
        assert!(!c.overlaps(201, 300));
        assert!(Centromere::new(5, 4).is_err());
    }

    #[test]
    fn test_window_score_matrix_missing_cells() {
        let m = WindowScoreMatrix::from_rows(3, vec![vec![Some(1.0), None], vec![None, Some(-2.0)]])
            .unwrap();
        assert_eq!(m.nind(), 2);
        assert_eq!(m.nloci(), 2);
        assert_eq!(m.winsize(), 3);
        assert_eq!(m.get(0, 1), None);
        assert_eq!(m.get(1, 1), Some(-2.0));
        assert_eq!(m.missing_count(), 2);
        assert_eq!(m.valid_scores_for(&[1, 0, 5]), vec![-2.0, 1.0]);
        assert_eq!(m.row_scores(0).collect::<Vec<_>>(), vec![Some(1.0), None]);
        assert!(m.bitwise_eq(&m.clone()));
        assert!(!m.bitwise_eq(&WindowScoreMatrix::new_missing(2, 2, 3)));

        assert!(WindowScoreMatrix::from_rows(3, vec![vec![None], vec![]]).is_err());
    }

    #[test]
    fn test_unit_arena() {
        let mut arena: UnitArena<u32> = UnitArena::new(2, 3);
        assert!(!arena.is_complete());
        for pop in 0..2 {
            for chr in 0..3 {
                arena.insert(UnitKey::new(pop, chr), (pop * 10 + chr) as u32).unwrap();
            }
        }
        assert!(arena.is_complete());
        assert_eq!(*arena.get(UnitKey::new(1, 2)).unwrap(), 12);
        assert!(arena.get(UnitKey::new(2, 0)).is_err());
        assert_eq!(arena.iter().count(), 6);

        assert_eq!(arena.take(UnitKey::new(0, 1)).unwrap(), 1);
        assert!(arena.get(UnitKey::new(0, 1)).is_err());
        assert!(!arena.is_complete());
    }

    #[test]
    fn test_dataset_checks_unit_shapes() {
        let map = Arc::new(LocusMap::from_positions("1", &[1, 2, 3]).unwrap());
        let pop = Population::new("P", vec!["a".into(), "b".into(), "c".into()]);

        let mut genotypes = UnitArena::new(1, 1);
        genotypes.insert(UnitKey::new(0, 0), small_matrix()).unwrap();
        let dataset = Dataset::new(vec![map.clone()], vec![pop.clone()], genotypes).unwrap();
        assert_eq!(dataset.npop(), 1);
        assert_eq!(dataset.nchr(), 1);
        assert_eq!(dataset.total_loci(), 3);

        let mut wrong = UnitArena::new(1, 1);
        let narrow = GenotypeMatrix::from_loci(vec![vec![Some(0)]; 3]).unwrap();
        wrong.insert(UnitKey::new(0, 0), narrow).unwrap();
        assert!(Dataset::new(vec![map.clone()], vec![pop.clone()], wrong).is_err());

        let empty: UnitArena<GenotypeMatrix> = UnitArena::new(1, 1);
        assert!(Dataset::new(vec![map], vec![pop], empty).is_err());
    }
}
