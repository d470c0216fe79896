use crate::error::ErrorKind;
use crate::model::{Locus, LocusMap, UnitKey};
use crate::parse::{
    build_dataset, group_populations, load_dataset, read_bounds_table, read_centromere_file,
    read_cutoff_table, read_frequency_file, read_tfam, read_tped,
};

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn write_gz(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

const TFAM: &str = "\
POPA a1 0 0 1 -9
POPB b1 0 0 2 -9
POPA a2 0 0 1 -9
";

const TPED: &str = "\
# three individuals
1 rs1 0 100 A A A G G G
1 rs2 0 200 C T 0 0 T T
2 rs3 0.5 50 G G G G A A
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_tfam_and_group() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "x.tfam", TFAM);
        let records = read_tfam(&path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].population, "POPA");
        assert_eq!(records[2].individual, "a2");

        let groups = group_populations(&records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.name, "POPA");
        assert_eq!(groups[0].0.individuals, vec!["a1", "a2"]);
        assert_eq!(groups[0].1, vec![0, 2]);
        assert_eq!(groups[1].1, vec![1]);

        let empty = write_file(dir.path(), "empty.tfam", "\n# nothing\n");
        assert!(read_tfam(&empty).is_err());
        let short = write_file(dir.path(), "short.tfam", "POPA\n");
        assert_eq!(read_tfam(&short).unwrap_err().kind(), ErrorKind::Io);
    }

    #[test]
    fn test_read_tped_dosages() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "x.tped", TPED);
        let chroms = read_tped(&path, 3, '0').unwrap();
        assert_eq!(chroms.len(), 2);

        let first = &chroms[0];
        assert_eq!(first.map.chrom(), "1");
        assert_eq!(first.map.nloci(), 2);
        let rs1 = first.map.locus(0).unwrap();
        assert_eq!((rs1.allele, rs1.other_allele), ('A', 'G'));
        assert_eq!(first.dosages[0], vec![Some(2), Some(1), Some(0)]);
        // counted allele is C, the second individual is missing
        assert_eq!(first.dosages[1], vec![Some(1), None, Some(0)]);

        let second = &chroms[1];
        assert_eq!(second.map.position(0), 50);
        assert_eq!(second.map.locus(0).unwrap().genetic_pos, 0.5);
        assert_eq!(second.dosages[0], vec![Some(2), Some(2), Some(0)]);
    }

    #[test]
    fn test_read_tped_rejects_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let third = write_file(dir.path(), "third.tped", "1 rs1 0 100 A G T T\n");
        let err = read_tped(&third, 2, '0').unwrap_err();
        assert!(err.to_string().contains("more than two alleles"));

        let columns = write_file(dir.path(), "cols.tped", "1 rs1 0 100 A G T\n");
        assert!(read_tped(&columns, 2, '0').is_err());

        let split = write_file(
            dir.path(),
            "split.tped",
            "1 rs1 0 100 A A\n2 rs2 0 100 A A\n1 rs3 0 300 A A\n",
        );
        assert_eq!(read_tped(&split, 1, '0').unwrap_err().kind(), ErrorKind::InputShape);

        let unsorted = write_file(dir.path(), "unsorted.tped", "1 rs1 0 300 A A\n1 rs2 0 100 A A\n");
        assert!(read_tped(&unsorted, 1, '0').is_err());

        let position = write_file(dir.path(), "pos.tped", "1 rs1 0 abc A A\n");
        assert!(read_tped(&position, 1, '0').is_err());
    }

    #[test]
    fn test_gzipped_input_and_missing_code() {
        let dir = TempDir::new().unwrap();
        let path = write_gz(dir.path(), "x.tped.gz", "1 rs1 0 100 N N A A\n");
        let chroms = read_tped(&path, 2, 'N').unwrap();
        assert_eq!(chroms[0].dosages[0], vec![None, Some(2)]);
        assert_eq!(chroms[0].map.locus(0).unwrap().allele, 'A');
    }

    #[test]
    fn test_build_dataset_splits_populations() {
        let dir = TempDir::new().unwrap();
        let tped = write_file(dir.path(), "x.tped", TPED);
        let tfam = write_file(dir.path(), "x.tfam", TFAM);
        let dataset = load_dataset(&tped, &tfam, '0').unwrap();
        assert_eq!(dataset.npop(), 2);
        assert_eq!(dataset.nchr(), 2);
        assert_eq!(dataset.total_loci(), 3);

        let popa = dataset.genotypes.get(UnitKey::new(0, 0)).unwrap();
        assert_eq!(popa.nind(), 2);
        assert_eq!(popa.locus(0).unwrap().to_vec(), vec![Some(2), Some(0)]);
        let popb = dataset.genotypes.get(UnitKey::new(1, 1)).unwrap();
        assert_eq!(popb.locus(0).unwrap().to_vec(), vec![Some(2)]);

        let records = read_tfam(&tfam).unwrap();
        let chroms = read_tped(&tped, 3, '0').unwrap();
        let again = build_dataset(chroms, &records).unwrap();
        assert_eq!(again.populations, dataset.populations);
    }

    #[test]
    fn test_frequency_file_flips_and_missing() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "freq.txt",
            "SNP ALLELE POPA POPB\nrs1 A 0.25 NA\nrs2 G 0.1 0.9\n",
        );
        let file = read_frequency_file(&path).unwrap();
        assert_eq!(file.populations, vec!["POPA", "POPB"]);
        assert_eq!(file.len(), 2);

        let loci = [("rs1", 100), ("rs2", 200), ("rs9", 300)]
            .iter()
            .map(|&(id, pos)| Locus {
                id: id.to_string(),
                physical_pos: pos,
                genetic_pos: 0.0,
                allele: 'A',
                other_allele: 'G',
            })
            .collect();
        let ids = LocusMap::new("1", loci).unwrap();

        let popa = file.table_for(&ids, "POPA").unwrap();
        assert_eq!(popa.get(0), Some(0.25));
        assert!((popa.get(1).unwrap() - 0.9).abs() < 1e-12);
        assert_eq!(popa.get(2), None);

        let popb = file.table_for(&ids, "POPB").unwrap();
        assert_eq!(popb.get(0), None);
        assert!((popb.get(1).unwrap() - 0.1).abs() < 1e-12);

        assert!(file.table_for(&ids, "POPC").is_err());

        let bad = write_file(dir.path(), "bad.txt", "ID A POPA\nrs1 A 0.2\n");
        assert!(read_frequency_file(&bad).is_err());
        let range = write_file(dir.path(), "range.txt", "SNP ALLELE POPA\nrs1 A 1.5\n");
        let file = read_frequency_file(&range).unwrap();
        assert!(file.table_for(&ids, "POPA").is_err());
    }

    #[test]
    fn test_centromere_and_population_tables() {
        let dir = TempDir::new().unwrap();
        let cen = write_file(
            dir.path(),
            "cen.txt",
            "chr1 121500000 125000000\n2 90500000 96800000\n",
        );
        let table = read_centromere_file(&cen).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("1").unwrap().start, 121_500_000);
        assert_eq!(table.get("chr2").unwrap().end, 96_800_000);
        let reversed = write_file(dir.path(), "rev.txt", "1 20 10\n");
        assert!(read_centromere_file(&reversed).is_err());

        let cutoffs = write_file(dir.path(), "cut.txt", "POPA 1.5\nPOPB -0.25\n");
        let cutoffs = read_cutoff_table(&cutoffs).unwrap();
        assert_eq!(cutoffs["POPA"], 1.5);
        assert_eq!(cutoffs["POPB"], -0.25);
        let missing = write_file(dir.path(), "cut2.txt", "POPA\n");
        assert!(read_cutoff_table(&missing).is_err());

        let bounds = write_file(dir.path(), "bounds.txt", "POPA 1000000 100000\n");
        let bounds = read_bounds_table(&bounds).unwrap();
        assert_eq!(bounds["POPA"].short_medium(), 100_000.0);
        assert_eq!(bounds["POPA"].medium_long(), 1_000_000.0);
        let equal = write_file(dir.path(), "bounds2.txt", "POPA 5 5\n");
        assert!(read_bounds_table(&equal).is_err());
    }
}
