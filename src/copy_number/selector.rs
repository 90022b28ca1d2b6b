use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use super::genotype::CopyNumberHypothesis;
use super::likelihood::{LikelihoodTable, ReadEvidence, calc_lik, calc_lik_with_clonal};

/// Most-likely VAF reported for a variant without any usable likelihood
pub const NO_HYPOTHESIS_VAF: f64 = 1e-7;

/// Result of copy-number state selection for one variant
///
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CopyNumberSelection {
    /// Selected copy-number hypothesis, or None if the variant has no hypotheses
    pub state: Option<CopyNumberHypothesis>,

    /// Expected VAF of the most likely hypothesis under the variant's phi
    pub most_likely_vaf: f64,
}

impl CopyNumberSelection {
    /// Selected state as a `ref_cn,var_cn,mu,fraction` string
    ///
    /// A variant without hypotheses is written as `NaN,NaN,NaN` for compatibility with existing
    /// downstream tables.
    pub fn state_label(&self) -> String {
        match &self.state {
            Some(x) => format!("{},{},{},{}", x.ref_cn, x.var_cn, x.mu, x.fraction),
            None => "NaN,NaN,NaN".to_string(),
        }
    }
}

/// Index of the maximum value, skipping NaN entries
///
/// Ties resolve to the first index. Returns None if there are no non-NaN values.
///
pub fn index_of_max(x: &[f64]) -> Option<usize> {
    let mut max: Option<(usize, f64)> = None;
    for (index, &v) in x.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match max {
            Some((_, max_v)) if v <= max_v => {}
            _ => {
                max = Some((index, v));
            }
        }
    }
    max.map(|(index, _)| index)
}

fn nan_max(x: &[f64]) -> f64 {
    index_of_max(x).map_or(f64::NAN, |i| x[i])
}

/// Chi-squared (1 dof) survival function for the log-likelihood ratio test
///
/// NaN statistics return a p-value of 1.
///
fn llr_pvalue(llr: f64) -> f64 {
    if llr.is_nan() {
        return 1.0;
    }
    match ChiSquared::new(1.0) {
        Ok(x) => x.sf(llr),
        Err(_) => 1.0,
    }
}

/// Select the most likely copy-number state given likelihood tables under phi and phi=1
///
/// The state with the highest likelihood under phi is used, unless the log likelihood ratio
/// test against the most likely clonal state has p < `pval_cutoff`, in which case the state with
/// the highest clonal likelihood is used.
///
pub fn get_most_likely_cn(
    combos: &[CopyNumberHypothesis],
    phi_table: &LikelihoodTable,
    clonal_table: &LikelihoodTable,
    pval_cutoff: f64,
) -> Option<CopyNumberHypothesis> {
    if combos.is_empty() || clonal_table.is_empty() {
        return None;
    }

    let ll_phi = &phi_table.lls;
    let ll_clonal = &clonal_table.lls;

    let argmax = |lls: &[f64]| combos[index_of_max(lls).unwrap_or(0)];

    if ll_phi.iter().zip(ll_clonal.iter()).all(|(a, b)| a == b) {
        return Some(argmax(ll_phi));
    }

    // The null hypothesis is the likelihood under phi
    let llr = 2.0 * (nan_max(ll_clonal) - nan_max(ll_phi));
    let pval = llr_pvalue(llr);

    let x = if ll_phi.iter().all(|x| x.is_nan()) {
        combos[0]
    } else if pval < pval_cutoff {
        argmax(ll_clonal)
    } else {
        argmax(ll_phi)
    };
    Some(x)
}

/// Expected VAF of the most likely hypothesis in the table
///
pub fn get_most_likely_vaf(table: &LikelihoodTable) -> f64 {
    if table.is_empty() || table.vafs.iter().all(|x| x.is_nan()) {
        return NO_HYPOTHESIS_VAF;
    }
    match index_of_max(&table.lls) {
        Some(i) => table.vafs[i],
        None => NO_HYPOTHESIS_VAF,
    }
}

/// Select the copy-number state and most likely expected VAF for one variant
///
/// The state selection and the most likely VAF are derived from separately computed likelihood
/// tables, so the VAF does not depend on the outcome of the clonal likelihood ratio test.
///
pub fn select_copy_number_state(
    combos: &[CopyNumberHypothesis],
    evidence: &ReadEvidence,
    phi: f64,
    purity: f64,
    pval_cutoff: f64,
) -> CopyNumberSelection {
    let (phi_table, clonal_table) = calc_lik_with_clonal(combos, evidence, phi, purity);
    let state = get_most_likely_cn(combos, &phi_table, &clonal_table, pval_cutoff);

    let table = calc_lik(combos, evidence, phi, purity);
    let most_likely_vaf = get_most_likely_vaf(&table);

    CopyNumberSelection {
        state,
        most_likely_vaf,
    }
}

/// Most likely expected VAF for one variant
///
/// This is the subset of [select_copy_number_state] needed by the sampler's likelihood
/// evaluation.
///
pub fn get_most_likely_variant_vaf(
    combos: &[CopyNumberHypothesis],
    evidence: &ReadEvidence,
    phi: f64,
    purity: f64,
) -> f64 {
    get_most_likely_vaf(&calc_lik(combos, evidence, phi, purity))
}
