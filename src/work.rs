use crate::assemble::{assemble_roh_windows, AssemblyParams, RohRun};
use crate::error::{Result, RohError};
use crate::lod::{calc_lod_windows, check_error_rate, LodParams};
use crate::model::{Centromere, FrequencyTable, GenotypeMatrix, LocusMap, UnitKey, WindowScoreMatrix};

use std::sync::Arc;

/// Everything needed to score and assemble one unit. Owned and immutable, so
/// orders can be handed to any worker thread.
#[derive(Debug, Clone)]
pub struct WorkOrder {
    key: UnitKey,
    genotypes: GenotypeMatrix,
    freqs: FrequencyTable,
    map: Arc<LocusMap>,
    centromere: Option<Centromere>,
    error: f64,
    max_gap: i64,
}

impl WorkOrder {
    pub fn new(
        key: UnitKey,
        genotypes: GenotypeMatrix,
        freqs: FrequencyTable,
        map: Arc<LocusMap>,
        centromere: Option<Centromere>,
        error: f64,
        max_gap: i64,
    ) -> Result<Self> {
        if genotypes.nloci() != map.nloci() || freqs.len() != map.nloci() {
            return Err(RohError::input_shape(format!(
                "chromosome {}: map has {} loci, genotypes {}, frequencies {}",
                map.chrom(),
                map.nloci(),
                genotypes.nloci(),
                freqs.len()
            )));
        }
        check_error_rate(error)?;
        if max_gap < 0 {
            return Err(RohError::parameter(format!(
                "max gap must be non-negative, got {}",
                max_gap
            )));
        }
        Ok(WorkOrder {
            key,
            genotypes,
            freqs,
            map,
            centromere,
            error,
            max_gap,
        })
    }

    pub fn key(&self) -> UnitKey {
        self.key
    }

    pub fn map(&self) -> &LocusMap {
        &self.map
    }

    pub fn shared_map(&self) -> Arc<LocusMap> {
        Arc::clone(&self.map)
    }

    pub fn centromere(&self) -> Option<Centromere> {
        self.centromere
    }

    pub fn genotypes(&self) -> &GenotypeMatrix {
        &self.genotypes
    }

    pub fn freqs(&self) -> &FrequencyTable {
        &self.freqs
    }

    pub fn nind(&self) -> usize {
        self.genotypes.nind()
    }

    pub fn score(&self, winsize: usize) -> Result<WindowScoreMatrix> {
        let params = LodParams {
            winsize,
            error: self.error,
            max_gap: self.max_gap,
        };
        calc_lod_windows(&self.genotypes, &self.map, &self.freqs, self.centromere, &params)
    }

    /// Runs per individual from this unit's scores.
    pub fn assemble(
        &self,
        scores: &WindowScoreMatrix,
        cutoff: f64,
        overlap_frac: f64,
    ) -> Result<Vec<Vec<RohRun>>> {
        if scores.nind() != self.nind() {
            return Err(RohError::input_shape(format!(
                "chromosome {}: {} scored individuals but {} genotyped",
                self.map.chrom(),
                scores.nind(),
                self.nind()
            )));
        }
        let params = AssemblyParams {
            cutoff,
            max_gap: self.max_gap,
            overlap_frac,
        };
        assemble_roh_windows(self.key.chr, scores, &self.map, self.centromere, &params)
    }
}
