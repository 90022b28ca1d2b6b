//! Structural variant records consumed by the clustering model
//!

use serde::Serialize;
use strum::{AsRefStr, EnumString};

use crate::copy_number::{CopyNumberHypothesis, get_sv_allele_combos};
use crate::errors::{Error, Result};

/// Default local copy number of the normal (non-tumor) cell population
pub const DEFAULT_NORMAL_COPY_NUMBER: f64 = 2.0;

#[derive(AsRefStr, Clone, Copy, Debug, EnumString, PartialEq, Serialize)]
pub enum BreakendDirection {
    #[strum(serialize = "+")]
    Forward,
    #[strum(serialize = "-")]
    Reverse,
    #[strum(serialize = "?")]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Breakend {
    pub chrom: String,
    pub pos: i64,
    pub dir: BreakendDirection,
}

/// Breakpoint whose copy-number genotype was used to build the hypothesis set
#[derive(AsRefStr, Clone, Copy, Debug, PartialEq, Serialize)]
pub enum GenotypeSource {
    #[strum(serialize = "bp1")]
    Bp1,
    #[strum(serialize = "bp2")]
    Bp2,
    #[strum(serialize = "none")]
    None,
}

#[derive(Clone, Debug, Serialize)]
pub struct Variant {
    pub id: String,
    pub bp1: Breakend,
    pub bp2: Breakend,
    pub classification: String,

    /// Count of reads supporting the variant allele
    pub support: u32,

    /// Total read depth at the variant
    pub depth: u32,

    /// Copy-number genotype string for the segment flanking each breakpoint
    ///
    /// Each string is either empty, a single `major,minor,fraction` genotype, or two such
    /// genotypes separated by '|' for a subclonal copy-number segment.
    pub gtype1: String,
    pub gtype2: String,

    /// Local copy number of the normal cell population
    pub normal_copy_number: f64,
}

impl Variant {
    /// Check the read count invariant and return the variant
    ///
    pub fn validated(self) -> Result<Self> {
        if self.support > self.depth {
            return Err(Error::DataIntegrity {
                variant_id: self.id,
                msg: format!(
                    "supporting read count ({}) exceeds depth ({})",
                    self.support, self.depth
                ),
            });
        }
        if !(self.normal_copy_number.is_finite() && self.normal_copy_number >= 0.0) {
            return Err(Error::DataIntegrity {
                variant_id: self.id,
                msg: format!("invalid normal copy number: {}", self.normal_copy_number),
            });
        }
        Ok(self)
    }

    /// Get the copy-number hypotheses used to model this variant during clustering
    ///
    /// Hypotheses from the bp1 genotype are used unless bp1 yields none, in which case the bp2
    /// genotype is tried.
    ///
    pub fn copy_number_hypotheses(&self) -> Result<(GenotypeSource, Vec<CopyNumberHypothesis>)> {
        let [bp1_combos, bp2_combos] = get_sv_allele_combos(&self.gtype1, &self.gtype2)
            .map_err(|e| match e {
                Error::MalformedGenotype { genotype, msg } => Error::MalformedGenotype {
                    genotype,
                    msg: format!("{msg} (variant '{}')", self.id),
                },
                e => e,
            })?;
        let x = if !bp1_combos.is_empty() {
            (GenotypeSource::Bp1, bp1_combos)
        } else if !bp2_combos.is_empty() {
            (GenotypeSource::Bp2, bp2_combos)
        } else {
            (GenotypeSource::None, Vec::new())
        };
        Ok(x)
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;

    /// Simple variant builder for tests elsewhere in the crate
    pub fn get_test_variant(id: &str, support: u32, depth: u32, gtype1: &str) -> Variant {
        let bp = |pos| Breakend {
            chrom: "chr1".to_string(),
            pos,
            dir: BreakendDirection::Unknown,
        };
        Variant {
            id: id.to_string(),
            bp1: bp(1000),
            bp2: bp(5000),
            classification: "DEL".to_string(),
            support,
            depth,
            gtype1: gtype1.to_string(),
            gtype2: String::new(),
            normal_copy_number: DEFAULT_NORMAL_COPY_NUMBER,
        }
    }
}
