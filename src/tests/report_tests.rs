use crate::assemble::{RohData, RohRun};
use crate::classify::{BoundarySource, SizeBoundaries, SizeClassSelection};
use crate::error::{Warning, WarningKind};
use crate::model::LocusMap;
use crate::pipeline::PopulationReport;
use crate::report::{write_bed, write_warnings};
use crate::winsize::KdeWinsizeReport;

use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn report_with_runs(runs: Vec<RohRun>) -> PopulationReport {
    let mut data = RohData::new("ind0");
    data.runs = runs;
    PopulationReport {
        name: "POP".to_string(),
        winsize: 2,
        winsize_report: KdeWinsizeReport::default(),
        cutoff: None,
        size_classes: SizeClassSelection {
            boundaries: SizeBoundaries::new(100.0, 1000.0).unwrap(),
            source: BoundarySource::User,
            fit: None,
        },
        roh: vec![data],
        lengths: vec![],
        scores: None,
        warnings: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bed_start_never_negative() {
        let maps = vec![Arc::new(LocusMap::from_positions("1", &[0, 50, 500, 5000]).unwrap())];
        let report = report_with_runs(vec![
            RohRun { chr: 0, start: 0, stop: 1 },
            RohRun { chr: 0, start: 2, stop: 3 },
        ]);
        let mut out = Vec::new();
        write_bed(&mut out, &report, &maps).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("track name=ind0"));
        let first: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(&first[..5], &["1", "0", "50", "A", "51"]);
        assert_eq!(first[6], "0");
        let second: Vec<&str> = lines[2].split('\t').collect();
        assert_eq!(&second[..5], &["1", "499", "5000", "C", "4501"]);
        assert!(!text.contains("-1"));
    }

    #[test]
    fn test_warnings_file_names_kind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("w.tsv");
        let warnings = vec![Warning::new(WarningKind::NoCentromeres, "*", "no centromere for chromosome(s) MT")];
        write_warnings(&path, &warnings).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("kind\tpopulation\tmessage"));
        assert!(text.contains("no_centromeres\t*\tno centromere"));
    }
}
