use statrs::distribution::{Binomial, Discrete};

use super::genotype::CopyNumberHypothesis;
use crate::prob_utils::normalize_ln_distro;

/// Subtracted from every log-likelihood to stay clear of the p=1 singularity
pub const LN_LIKELIHOOD_EPSILON: f64 = 1e-8;

/// Read count evidence for one variant
///
#[derive(Clone, Copy, Debug)]
pub struct ReadEvidence {
    pub support: u32,
    pub depth: u32,

    /// Local copy number of the normal cell population
    pub normal_copy_number: f64,
}

/// Expected variant allele frequency for one hypothesis
///
/// # Arguments
/// * `phi` - Cellular prevalence of the variant
/// * `purity` - Tumor fraction of the sample
/// * `normal_copy_number` - Local copy number of the normal cell population
///
pub fn get_expected_vaf(
    phi: f64,
    combo: &CopyNumberHypothesis,
    purity: f64,
    normal_copy_number: f64,
) -> f64 {
    let normal_read_fraction = (1.0 - purity) * normal_copy_number;
    let reference_read_fraction = if combo.fraction < 1.0 {
        purity * combo.ref_cn * (1.0 - combo.fraction)
    } else {
        0.0
    };
    let variant_read_fraction = purity * combo.var_cn * combo.fraction;
    if variant_read_fraction == 0.0 {
        return 0.0;
    }
    let norm_const = normal_read_fraction + variant_read_fraction + reference_read_fraction;
    phi * (variant_read_fraction / norm_const) * combo.mu
}

/// Binomial log-probability of `support` successes in `depth` trials
///
/// NaN probabilities propagate as NaN, and probabilities outside [0,1] are treated as impossible.
///
pub fn binomial_ln_likelihood(support: u32, depth: u32, p: f64) -> f64 {
    if p.is_nan() {
        return f64::NAN;
    }
    match Binomial::new(p, depth as u64) {
        Ok(x) => x.ln_pmf(support as u64),
        Err(_) => f64::NEG_INFINITY,
    }
}

/// Expected VAF and log-likelihood of each hypothesis for one variant
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LikelihoodTable {
    pub vafs: Vec<f64>,
    pub lls: Vec<f64>,
}

impl LikelihoodTable {
    pub fn is_empty(&self) -> bool {
        self.vafs.is_empty()
    }
}

/// Compute the likelihood table of all hypotheses given cellular prevalence `phi`
///
pub fn calc_lik(
    combos: &[CopyNumberHypothesis],
    evidence: &ReadEvidence,
    phi: f64,
    purity: f64,
) -> LikelihoodTable {
    let vafs = combos
        .iter()
        .map(|c| get_expected_vaf(phi, c, purity, evidence.normal_copy_number))
        .collect::<Vec<_>>();
    let lls = vafs
        .iter()
        .map(|&p| {
            binomial_ln_likelihood(evidence.support, evidence.depth, p) - LN_LIKELIHOOD_EPSILON
        })
        .collect();
    LikelihoodTable { vafs, lls }
}

/// Compute likelihood tables under `phi` and under the clonal assumption (phi = 1)
///
/// Returns a 2-tuple of (phi_table, clonal_table)
///
pub fn calc_lik_with_clonal(
    combos: &[CopyNumberHypothesis],
    evidence: &ReadEvidence,
    phi: f64,
    purity: f64,
) -> (LikelihoodTable, LikelihoodTable) {
    (
        calc_lik(combos, evidence, phi, purity),
        calc_lik(combos, evidence, 1.0, purity),
    )
}

/// Convert hypothesis log-likelihoods into a normalized probability distribution
///
pub fn get_probs_from_llik(lls: &[f64]) -> Vec<f64> {
    if lls.len() > 1 {
        let mut probs = lls.to_vec();
        normalize_ln_distro(&mut probs);
        probs
    } else {
        vec![1.0]
    }
}
