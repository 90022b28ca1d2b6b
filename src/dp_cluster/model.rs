use log::warn;

use super::params::{ClusterParams, SampleParams};
use crate::copy_number::{
    CopyNumberHypothesis, ReadEvidence, binomial_ln_likelihood, get_most_likely_variant_vaf,
};
use crate::errors::{Error, Result};
use crate::prob_utils::mean;
use crate::variant::{GenotypeSource, Variant};

/// Minimum detectable cellular prevalence given tumor purity, ploidy and mean depth
///
pub fn get_sensitivity_floor(purity: f64, ploidy: f64, depths: &[u32]) -> f64 {
    let depths = depths.iter().map(|&x| x as f64).collect::<Vec<_>>();
    let mean_depth = mean(&depths).unwrap_or(f64::NAN);
    1.0 / ((purity / ploidy) * mean_depth)
}

/// Convert cluster assignments proposed outside of the sampler into valid cluster indices
///
/// Some optimizers probe the assignment space with negative values, these are clamped to
/// cluster 0.
///
pub fn sanitize_assignments(z: &[i64]) -> Vec<usize> {
    z.iter().map(|&x| if x < 0 { 0 } else { x as usize }).collect()
}

/// Return the proposed cluster prevalences, or None if any prevalence is NaN
fn check_cluster_phi(phi_k: &[f64]) -> Option<&[f64]> {
    if phi_k.iter().any(|x| x.is_nan()) {
        None
    } else {
        Some(phi_k)
    }
}

/// Per-variant data used by the clustering model
///
pub struct ModelVariant {
    pub combos: Vec<CopyNumberHypothesis>,
    pub evidence: ReadEvidence,
    pub genotype_source: GenotypeSource,
}

/// Observation model shared by the sampler and the MAP fit
///
pub struct ClusterModel {
    pub variants: Vec<ModelVariant>,
    pub purity: f64,
    pub clonal_cnv_pval: f64,

    /// Lower bound of cluster prevalence
    pub phi_floor: f64,

    /// Upper bound of cluster prevalence
    pub phi_limit: f64,
}

impl ClusterModel {
    pub fn new(
        variants: &[Variant],
        sample_params: &SampleParams,
        cluster_params: &ClusterParams,
    ) -> Result<Self> {
        if variants.is_empty() {
            return Err(Error::InvalidClusterParams {
                msg: "no variants to cluster".to_string(),
            });
        }

        let mut model_variants = Vec::new();
        for variant in variants {
            let (genotype_source, combos) = variant.copy_number_hypotheses()?;
            if combos.is_empty() {
                warn!(
                    "No usable copy-number hypothesis for variant '{}'",
                    variant.id
                );
            }
            model_variants.push(ModelVariant {
                combos,
                evidence: ReadEvidence {
                    support: variant.support,
                    depth: variant.depth,
                    normal_copy_number: variant.normal_copy_number,
                },
                genotype_source,
            });
        }

        let depths = variants.iter().map(|x| x.depth).collect::<Vec<_>>();
        let phi_floor =
            get_sensitivity_floor(sample_params.purity, sample_params.ploidy, &depths);
        if phi_floor.is_nan() || phi_floor >= cluster_params.phi_limit {
            return Err(Error::InvalidClusterParams {
                msg: format!(
                    "phi sensitivity floor ({phi_floor}) is not below the phi limit ({})",
                    cluster_params.phi_limit
                ),
            });
        }

        Ok(Self {
            variants: model_variants,
            purity: sample_params.purity,
            clonal_cnv_pval: cluster_params.clonal_cnv_pval,
            phi_floor,
            phi_limit: cluster_params.phi_limit,
        })
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    pub fn is_phi_in_bounds(&self, phi: f64) -> bool {
        phi >= self.phi_floor && phi <= self.phi_limit
    }

    /// Most likely expected VAF of variant `index` given cellular prevalence `phi`
    pub fn variant_vaf(&self, index: usize, phi: f64) -> f64 {
        let v = &self.variants[index];
        get_most_likely_variant_vaf(&v.combos, &v.evidence, phi, self.purity)
    }

    /// Log-likelihood of the read counts of variant `index` given cellular prevalence `phi`
    pub fn variant_ln_likelihood(&self, index: usize, phi: f64) -> f64 {
        let v = &self.variants[index];
        binomial_ln_likelihood(
            v.evidence.support,
            v.evidence.depth,
            self.variant_vaf(index, phi),
        )
    }

    /// Most likely expected VAF of every variant given the cluster state
    ///
    /// # Arguments
    /// * `z` - Cluster assignment of each variant
    /// * `phi_k` - Proposed prevalence of each cluster
    /// * `phi_init` - Initial prevalence of each cluster, used if `phi_k` contains NaN
    ///
    pub fn get_variant_vafs(&self, z: &[usize], phi_k: &[f64], phi_init: &[f64]) -> Vec<f64> {
        let phi_k = check_cluster_phi(phi_k).unwrap_or(phi_init);
        z.iter()
            .enumerate()
            .map(|(index, &k)| self.variant_vaf(index, phi_k[k]))
            .collect()
    }

    /// Log-likelihood of all observed supporting read counts given the cluster state
    ///
    pub fn ln_likelihood(&self, z: &[usize], phi_k: &[f64], phi_init: &[f64]) -> f64 {
        self.get_variant_vafs(z, phi_k, phi_init)
            .into_iter()
            .zip(self.variants.iter())
            .map(|(p, v)| binomial_ln_likelihood(v.evidence.support, v.evidence.depth, p))
            .sum()
    }
}
