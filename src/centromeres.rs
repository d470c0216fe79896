use crate::error::{Result, Warning, WarningKind};
use crate::model::{Centromere, CentromereTable, LocusMap};

use clap::ValueEnum;
use itertools::Itertools;
use std::fmt;
use std::sync::Arc;

/// Human reference assembly whose centromere positions are built in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum GenomeBuild {
    Hg18,
    Hg19,
    Hg38,
}

impl GenomeBuild {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenomeBuild::Hg18 => "hg18",
            GenomeBuild::Hg19 => "hg19",
            GenomeBuild::Hg38 => "hg38",
        }
    }

    fn intervals(&self) -> &'static [(&'static str, i64, i64)] {
        match self {
            GenomeBuild::Hg18 => HG18,
            GenomeBuild::Hg19 => HG19,
            GenomeBuild::Hg38 => HG38,
        }
    }

    /// Centromere table for this build, keyed the same way as a centromere file.
    pub fn centromeres(&self) -> Result<CentromereTable> {
        let mut table = CentromereTable::new();
        for &(chrom, start, end) in self.intervals() {
            table.insert(chrom, Centromere::new(start, end)?);
        }
        Ok(table)
    }
}

impl fmt::Display for GenomeBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One warning naming every chromosome of `maps` that `table` does not cover.
pub fn uncovered_chromosomes(table: &CentromereTable, maps: &[Arc<LocusMap>]) -> Option<Warning> {
    let missing: Vec<&str> = maps
        .iter()
        .map(|m| m.chrom())
        .filter(|chrom| table.get(chrom).is_none())
        .collect();
    if missing.is_empty() {
        return None;
    }
    Some(Warning::new(
        WarningKind::NoCentromeres,
        "*",
        format!(
            "no centromere for chromosome(s) {}; windows and runs there may span it",
            missing.iter().join(",")
        ),
    ))
}

// UCSC gap table, type "centromere"
const HG18: &[(&str, i64, i64)] = &[
    ("1", 121_236_957, 123_476_957),
    ("2", 91_689_898, 94_689_898),
    ("3", 90_587_544, 93_487_544),
    ("4", 49_354_874, 52_354_874),
    ("5", 46_441_398, 49_441_398),
    ("6", 58_938_125, 61_938_125),
    ("7", 58_058_273, 61_058_273),
    ("8", 43_958_052, 46_958_052),
    ("9", 47_107_499, 50_107_499),
    ("10", 39_244_941, 41_624_941),
    ("11", 51_450_781, 54_450_781),
    ("12", 34_747_961, 36_142_961),
    ("13", 16_000_000, 17_868_000),
    ("14", 15_070_000, 18_070_000),
    ("15", 15_260_000, 18_260_000),
    ("16", 35_143_302, 36_943_302),
    ("17", 22_187_133, 22_887_133),
    ("18", 15_400_898, 16_764_896),
    ("19", 26_923_622, 29_923_622),
    ("20", 26_267_569, 28_033_230),
    ("21", 10_260_000, 13_260_000),
    ("22", 11_330_000, 14_330_000),
    ("X", 58_598_737, 61_598_737),
    ("Y", 11_253_954, 12_308_578),
];

// UCSC gap table, type "centromere"
const HG19: &[(&str, i64, i64)] = &[
    ("1", 121_535_434, 124_535_434),
    ("2", 92_326_171, 95_326_171),
    ("3", 90_504_854, 93_504_854),
    ("4", 49_660_117, 52_660_117),
    ("5", 46_405_641, 49_405_641),
    ("6", 58_830_166, 61_830_166),
    ("7", 58_054_331, 61_054_331),
    ("8", 43_838_887, 46_838_887),
    ("9", 47_367_679, 50_367_679),
    ("10", 39_254_935, 42_254_935),
    ("11", 51_644_205, 54_644_205),
    ("12", 34_856_694, 37_856_694),
    ("13", 16_000_000, 19_000_000),
    ("14", 16_000_000, 19_000_000),
    ("15", 17_000_000, 20_000_000),
    ("16", 35_335_801, 38_335_801),
    ("17", 22_263_006, 25_263_006),
    ("18", 15_460_898, 18_460_898),
    ("19", 24_681_782, 27_681_782),
    ("20", 26_369_569, 29_369_569),
    ("21", 11_288_129, 14_288_129),
    ("22", 13_000_000, 16_000_000),
    ("X", 58_632_012, 61_632_012),
    ("Y", 10_104_553, 13_104_553),
];

// UCSC cytoBand, merged "acen" bands
const HG38: &[(&str, i64, i64)] = &[
    ("1", 121_700_000, 125_100_000),
    ("2", 91_800_000, 96_000_000),
    ("3", 87_800_000, 94_000_000),
    ("4", 48_200_000, 51_800_000),
    ("5", 46_100_000, 51_400_000),
    ("6", 58_500_000, 62_600_000),
    ("7", 58_100_000, 62_100_000),
    ("8", 43_200_000, 47_200_000),
    ("9", 42_200_000, 45_500_000),
    ("10", 38_000_000, 41_600_000),
    ("11", 51_000_000, 55_800_000),
    ("12", 33_200_000, 37_800_000),
    ("13", 16_500_000, 18_900_000),
    ("14", 16_100_000, 18_200_000),
    ("15", 17_500_000, 20_500_000),
    ("16", 35_300_000, 38_400_000),
    ("17", 22_700_000, 27_400_000),
    ("18", 15_400_000, 21_500_000),
    ("19", 24_200_000, 28_100_000),
    ("20", 25_700_000, 30_400_000),
    ("21", 10_900_000, 13_000_000),
    ("22", 13_700_000, 17_400_000),
    ("X", 58_100_000, 63_800_000),
    ("Y", 10_300_000, 10_600_000),
];
