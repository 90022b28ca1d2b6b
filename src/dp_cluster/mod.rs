//! Dirichlet Process mixture clustering of SVs by cellular prevalence
//!

mod map_fit;
mod model;
mod params;
mod sampler;
mod stick_breaking;
mod trace;

use log::info;
use serde::Serialize;

pub use self::map_fit::MapFit;
use self::map_fit::fit_map;
pub use self::model::ClusterModel;
pub use self::params::{ClusterParams, Concentration, ConcentrationSetting, SampleParams};
use self::sampler::DpSampler;
pub use self::trace::{PosteriorSummary, PosteriorTrace, VariantSummary};
use crate::copy_number::{CopyNumberSelection, calc_lik, get_probs_from_llik, select_copy_number_state};
use crate::errors::Result;
use crate::variant::Variant;

/// Results of a complete clustering run
///
pub struct ClusterRun {
    pub model: ClusterModel,
    pub concentration: Concentration,

    /// Retained posterior samples, after burn-in removal and thinning
    pub trace: PosteriorTrace,

    pub map_fit: Option<MapFit>,
}

/// Optionally seed the chain with a MAP fit, then run the MCMC sampler
///
/// Burn-in is not removed from the returned trace.
///
pub fn fit_and_sample(
    model: &ClusterModel,
    concentration: Concentration,
    params: &ClusterParams,
) -> Result<(PosteriorTrace, Option<MapFit>)> {
    let mut sampler = DpSampler::new(model, concentration, params.cluster_limit, params.seed)?;

    let map_fit = if params.use_map {
        info!("Running MAP fit to seed MCMC");
        let fit = fit_map(model, &concentration, sampler.state(), sampler.phi_init());
        sampler.set_state(fit.state.clone());
        Some(fit)
    } else {
        None
    };

    info!("Running MCMC for {} iterations", params.n_iter);
    let trace = sampler.sample(params.n_iter, params.thin, params.burn);
    Ok((trace, map_fit))
}

/// Cluster variants into subclonal populations
///
pub fn cluster(
    variants: &[Variant],
    sample_params: &SampleParams,
    cluster_params: &ClusterParams,
) -> Result<ClusterRun> {
    sample_params.validate()?;
    cluster_params.validate()?;

    let concentration = Concentration::resolve(cluster_params, variants.len())?;
    match concentration {
        Concentration::Fixed(x) => {
            info!("Dirichlet concentration fixed at {x}");
        }
        Concentration::Random { shape, rate } => {
            info!(
                "Dirichlet concentration gamma prior values: shape = {shape}; rate = {rate}; init = {}",
                concentration.initial_value()
            );
        }
    }

    let model = ClusterModel::new(variants, sample_params, cluster_params)?;
    info!(
        "phi lower limit: {}; phi upper limit: {}",
        model.phi_floor, model.phi_limit
    );

    let (trace, map_fit) = fit_and_sample(&model, concentration, cluster_params)?;
    let trace = trace.discard_burn_in(cluster_params.burn);

    Ok(ClusterRun {
        model,
        concentration,
        trace,
        map_fit,
    })
}

/// Copy-number call for one variant at its posterior mean prevalence
///
#[derive(Clone, Debug, Serialize)]
pub struct VariantCopyNumberCall {
    pub phi: f64,
    pub selection: CopyNumberSelection,

    /// Probability of each copy-number hypothesis
    pub hypothesis_probs: Vec<f64>,
}

/// Select each variant's copy-number state at its posterior mean prevalence
///
pub fn get_copy_number_calls(
    model: &ClusterModel,
    summary: &PosteriorSummary,
) -> Vec<VariantCopyNumberCall> {
    model
        .variants
        .iter()
        .zip(summary.variants.iter())
        .map(|(v, s)| {
            let selection = select_copy_number_state(
                &v.combos,
                &v.evidence,
                s.mean_phi,
                model.purity,
                model.clonal_cnv_pval,
            );
            let hypothesis_probs = if v.combos.is_empty() {
                Vec::new()
            } else {
                get_probs_from_llik(&calc_lik(&v.combos, &v.evidence, s.mean_phi, model.purity).lls)
            };
            VariantCopyNumberCall {
                phi: s.mean_phi,
                selection,
                hypothesis_probs,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dp_cluster::params::test_utils::get_test_cluster_params;
    use crate::variant::test_utils::get_test_variant;

    /// Noise-free read counts for a pure diploid sample
    fn get_variants(phis: &[f64], depth: u32) -> Vec<Variant> {
        phis.iter()
            .enumerate()
            .map(|(i, phi)| {
                let support = (depth as f64 * phi * 0.5).round() as u32;
                get_test_variant(&format!("sv{i}"), support, depth, "1,1,1")
            })
            .collect()
    }

    #[test]
    fn test_cluster_recovers_prevalence() {
        let true_phis = [0.3, 0.6, 1.0];
        let variants = get_variants(&true_phis, 1000);
        let sample_params = SampleParams {
            purity: 1.0,
            ploidy: 2.0,
        };
        let params = get_test_cluster_params();

        let run = cluster(&variants, &sample_params, &params).unwrap();
        assert!(run.map_fit.is_some());
        assert_eq!(run.trace.samples.len(), params.n_iter - params.burn);

        let summary = run.trace.summarize().unwrap();
        for (v, expected) in summary.variants.iter().zip(true_phis.iter()) {
            approx::assert_abs_diff_eq!(v.mean_phi, *expected, epsilon = 0.05);
        }

        let calls = get_copy_number_calls(&run.model, &summary);
        assert_eq!(calls.len(), 3);
        for call in calls.iter() {
            assert!(call.selection.state.is_some());
            assert_eq!(call.hypothesis_probs, vec![1.0]);
        }
    }

    #[test]
    fn test_cluster_without_map() {
        let variants = get_variants(&[0.25, 0.25, 0.9, 0.9], 300);
        let sample_params = SampleParams {
            purity: 1.0,
            ploidy: 2.0,
        };
        let mut params = get_test_cluster_params();
        params.use_map = false;
        params.concentration = ConcentrationSetting::Random;
        params.n_iter = 500;
        params.burn = 100;
        params.thin = 4;

        let run = cluster(&variants, &sample_params, &params).unwrap();
        assert!(run.map_fit.is_none());
        assert_eq!(run.trace.samples.len(), 100);
        assert!(run.trace.samples.iter().all(|x| x.iteration >= 100));
    }

    #[test]
    fn test_cluster_with_no_hypothesis_variant() {
        let mut variants = get_variants(&[0.4, 0.4, 0.8], 500);
        variants.push(get_test_variant("sv_no_cn", 100, 500, "0,0,1"));
        let sample_params = SampleParams {
            purity: 1.0,
            ploidy: 2.0,
        };
        let mut params = get_test_cluster_params();
        params.n_iter = 500;
        params.burn = 100;

        let run = cluster(&variants, &sample_params, &params).unwrap();
        assert!(run.model.variants[3].combos.is_empty());

        let summary = run.trace.summarize().unwrap();
        assert_eq!(summary.variants.len(), 4);
        assert!(summary.variants.iter().all(|x| x.mean_phi.is_finite()));

        let calls = get_copy_number_calls(&run.model, &summary);
        let call = &calls[3];
        assert!(call.selection.state.is_none());
        assert_eq!(call.selection.most_likely_vaf, 1e-7);
        assert!(call.hypothesis_probs.is_empty());
        assert_eq!(call.selection.state_label(), "NaN,NaN,NaN");

        for call in calls[..3].iter() {
            assert!(call.selection.state.is_some());
        }
    }

    #[test]
    fn test_cluster_rejects_bad_params() {
        let variants = get_variants(&[0.5], 100);
        let sample_params = SampleParams {
            purity: 1.0,
            ploidy: 2.0,
        };
        let mut params = get_test_cluster_params();
        params.concentration = ConcentrationSetting::Auto;
        assert!(cluster(&variants, &sample_params, &params).is_err());
    }
}
