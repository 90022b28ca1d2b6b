use std::str::FromStr;

use itertools::Itertools;
use serde::Serialize;

use crate::errors::{Error, Result};

/// Separates alternate genotypes of a subclonal copy-number segment
const SUBCLONAL_GENOTYPE_SEPARATOR: char = '|';

/// Allele copy numbers above this value are rejected as malformed
const MAX_ALLELE_COPY_NUMBER: f64 = 1000.0;

/// One copy-number/allele-fraction hypothesis for a variant locus
///
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CopyNumberHypothesis {
    /// Total copy number of the non-variant (reference) population
    pub ref_cn: f64,

    /// Total copy number of the variant-bearing population
    pub var_cn: f64,

    /// Fraction of variant population copies carrying the variant
    pub mu: f64,

    /// Fraction of tumor cells in the variant-bearing copy-number state
    pub fraction: f64,
}

impl CopyNumberHypothesis {
    fn key(&self) -> [u64; 4] {
        [
            self.ref_cn.to_bits(),
            self.var_cn.to_bits(),
            self.mu.to_bits(),
            self.fraction.to_bits(),
        ]
    }
}

/// Local copy-number genotype of a segment, parsed from `major,minor,fraction`
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Genotype {
    pub major: f64,
    pub minor: f64,
    pub fraction: f64,
}

impl Genotype {
    pub fn total(&self) -> f64 {
        self.major + self.minor
    }
}

impl FromStr for Genotype {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = |msg: String| Error::MalformedGenotype {
            genotype: s.to_string(),
            msg,
        };

        let fields = s.split(',').map(|x| x.trim()).collect::<Vec<_>>();
        if fields.len() < 3 {
            return Err(malformed(format!(
                "expected 3 comma-separated fields but found {}",
                fields.len()
            )));
        }

        let mut values = [0f64; 3];
        for (value, field) in values.iter_mut().zip(fields.iter()) {
            *value = field
                .parse::<f64>()
                .map_err(|_| malformed(format!("can't parse field '{field}' as a number")))?;
            if !(value.is_finite() && *value >= 0.0) {
                return Err(malformed(format!(
                    "field '{field}' is not a non-negative number"
                )));
            }
        }

        for (label, value) in [("major", values[0]), ("minor", values[1])] {
            if value > MAX_ALLELE_COPY_NUMBER {
                return Err(malformed(format!(
                    "{label} copy number {value} exceeds the maximum of {MAX_ALLELE_COPY_NUMBER}"
                )));
            }
        }

        Ok(Self {
            major: values[0],
            minor: values[1],
            fraction: values[2],
        })
    }
}

/// Append the hypotheses for one variant-bearing genotype
///
/// The variant may be carried on 1..=major copies of the variant population's total copy
/// number. Nothing is added when the total copy number is zero.
///
fn add_copy_number_combos(
    combos: &mut Vec<CopyNumberHypothesis>,
    var_genotype: &Genotype,
    ref_cn: f64,
) {
    let var_cn = var_genotype.total();
    if var_cn == 0.0 {
        return;
    }
    let max_variant_copies = var_genotype.major as usize;
    for i in 1..=max_variant_copies {
        combos.push(CopyNumberHypothesis {
            ref_cn,
            var_cn,
            mu: i as f64 / var_cn,
            fraction: var_genotype.fraction,
        });
    }
}

/// Drop hypotheses without variant-bearing copies or population weight, and remove duplicates
///
/// Order of the first occurrence of each hypothesis is preserved.
///
fn filter_copy_number_states(combos: Vec<CopyNumberHypothesis>) -> Vec<CopyNumberHypothesis> {
    combos
        .into_iter()
        .filter(|x| x.var_cn != 0.0 && x.mu != 0.0 && x.fraction != 0.0)
        .unique_by(|x| x.key())
        .collect()
}

/// Enumerate all valid copy-number hypotheses for the genotype(s) of one breakpoint
///
/// # Arguments
/// * `genotypes` - Zero, one or two genotype strings. Two genotypes describe a subclonal
///   copy-number segment, in which case each genotype is evaluated as the variant-bearing state
///   with the other genotype providing the reference copy number.
///
pub fn get_allele_combos(genotypes: &[&str]) -> Result<Vec<CopyNumberHypothesis>> {
    let mut combos = Vec::new();

    match genotypes {
        [] => {}
        [gt, ..] if gt.trim().is_empty() => {}
        [gt] => {
            let gt = gt.parse::<Genotype>()?;
            add_copy_number_combos(&mut combos, &gt, gt.total());
        }
        [gt1, gt2] => {
            let gt1 = gt1.parse::<Genotype>()?;
            let gt2 = gt2.parse::<Genotype>()?;
            add_copy_number_combos(&mut combos, &gt1, gt2.total());
            add_copy_number_combos(&mut combos, &gt2, gt1.total());
        }
        _ => {
            return Err(Error::MalformedGenotype {
                genotype: genotypes.join(&SUBCLONAL_GENOTYPE_SEPARATOR.to_string()),
                msg: format!(
                    "expected at most 2 subclonal genotypes but found {}",
                    genotypes.len()
                ),
            });
        }
    }

    Ok(filter_copy_number_states(combos))
}

/// Enumerate copy-number hypotheses for both breakpoints of an SV
///
/// Each genotype field may hold two genotypes separated by '|' to describe a subclonal
/// copy-number segment.
///
pub fn get_sv_allele_combos(
    gtype1: &str,
    gtype2: &str,
) -> Result<[Vec<CopyNumberHypothesis>; 2]> {
    fn split(x: &str) -> Vec<&str> {
        if x.is_empty() {
            Vec::new()
        } else {
            x.split(SUBCLONAL_GENOTYPE_SEPARATOR)
                .map(|s| s.trim())
                .collect()
        }
    }
    let combos_bp1 = get_allele_combos(&split(gtype1))?;
    let combos_bp2 = get_allele_combos(&split(gtype2))?;
    Ok([combos_bp1, combos_bp2])
}
