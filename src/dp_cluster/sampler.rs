//! Metropolis-within-Gibbs sampler for the truncated Dirichlet Process mixture
//!

use log::info;
use rand::distributions::{Open01, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::{Continuous, Gamma};
use thousands::Separable;

use super::model::ClusterModel;
use super::params::Concentration;
use super::stick_breaking::{
    clamp_stick_proportion, get_cluster_counts, get_stick_breaking_weights, ln_assignment_prob,
    ln_stick_prior, ln_stick_proportion_prior,
};
use super::trace::{PosteriorTrace, TraceSample};
use crate::errors::{Error, Result};
use crate::log_utils::debug_msg;
use crate::prob_utils::normalize_ln_distro;

/// Proposal scales are tuned at this iteration interval
const TUNE_INTERVAL: usize = 100;

/// Full parameter state of the mixture model
///
#[derive(Clone, Debug, Serialize)]
pub struct SamplerState {
    /// Dirichlet Process concentration parameter
    pub alpha: f64,

    /// Stick-breaking proportions
    pub h: Vec<f64>,

    /// Cellular prevalence of each cluster
    pub phi_k: Vec<f64>,

    /// Cluster assignment of each variant
    pub z: Vec<usize>,
}

impl SamplerState {
    pub fn cluster_count(&self) -> usize {
        self.h.len()
    }

    pub fn weights(&self) -> Vec<f64> {
        get_stick_breaking_weights(&self.h)
    }

    pub fn cluster_counts(&self) -> Vec<usize> {
        get_cluster_counts(&self.z, self.cluster_count())
    }
}

/// Log density of the concentration parameter under its prior, or 0 if it is fixed
///
pub fn ln_concentration_prior(concentration: &Concentration, alpha: f64) -> f64 {
    match *concentration {
        Concentration::Fixed(_) => 0.0,
        Concentration::Random { shape, rate } => match Gamma::new(shape, rate) {
            Ok(x) => x.ln_pdf(alpha),
            Err(_) => f64::NEG_INFINITY,
        },
    }
}

/// Unnormalized log posterior of the full model state
///
pub fn ln_posterior(
    model: &ClusterModel,
    concentration: &Concentration,
    state: &SamplerState,
    phi_init: &[f64],
) -> f64 {
    let phi_prior = -(state.cluster_count() as f64) * (model.phi_limit - model.phi_floor).ln();
    ln_concentration_prior(concentration, state.alpha)
        + ln_stick_prior(&state.h, state.alpha)
        + ln_assignment_prob(&state.weights(), &state.cluster_counts())
        + phi_prior
        + model.ln_likelihood(&state.z, &state.phi_k, phi_init)
}

/// Random-walk proposal scale with acceptance tracking
///
#[derive(Clone, Debug)]
struct ProposalScale {
    scale: f64,
    accepted: usize,
    proposed: usize,
}

impl ProposalScale {
    fn new(scale: f64) -> Self {
        Self {
            scale,
            accepted: 0,
            proposed: 0,
        }
    }

    fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Rescale the proposal according to the acceptance rate since the last tuning step
    fn tune(&mut self) {
        if self.proposed == 0 {
            return;
        }
        let rate = self.accepted as f64 / self.proposed as f64;
        let factor = if rate < 0.001 {
            0.1
        } else if rate < 0.05 {
            0.5
        } else if rate < 0.2 {
            0.9
        } else if rate > 0.95 {
            10.0
        } else if rate > 0.75 {
            2.0
        } else if rate > 0.5 {
            1.1
        } else {
            1.0
        };
        self.scale *= factor;
        self.accepted = 0;
        self.proposed = 0;
    }
}

fn logit(x: f64) -> f64 {
    (x / (1.0 - x)).ln()
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Single MCMC chain over the mixture model
///
/// Each chain owns its own random number generator and parameter state.
///
pub struct DpSampler<'a> {
    model: &'a ClusterModel,
    concentration: Concentration,

    /// Initial cluster prevalences, used as a fallback for degenerate prevalence proposals
    phi_init: Vec<f64>,

    state: SamplerState,
    rng: Xoshiro256PlusPlus,

    alpha_scale: ProposalScale,
    h_scales: Vec<ProposalScale>,
    phi_scales: Vec<ProposalScale>,
}

impl<'a> DpSampler<'a> {
    /// Initialize the chain with stick proportions drawn from the prior, prevalences drawn
    /// uniformly below the phi limit and all variants assigned to the first cluster
    ///
    pub fn new(
        model: &'a ClusterModel,
        concentration: Concentration,
        cluster_limit: usize,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        let alpha = concentration.initial_value();
        let stick_dist = Beta::new(1.0, alpha).map_err(|e| Error::InvalidClusterParams {
            msg: format!("can't create stick-breaking prior with concentration {alpha}: {e}"),
        })?;
        let h = (0..cluster_limit)
            .map(|_| clamp_stick_proportion(stick_dist.sample(&mut rng)))
            .collect::<Vec<_>>();

        let phi_init = (0..cluster_limit)
            .map(|_| {
                let x = rng.sample::<f64, _>(Open01) * model.phi_limit;
                x.max(model.phi_floor)
            })
            .collect::<Vec<_>>();

        let state = SamplerState {
            alpha,
            h,
            phi_k: phi_init.clone(),
            z: vec![0; model.variant_count()],
        };

        let phi_scale = 0.1 * (model.phi_limit - model.phi_floor);
        Ok(Self {
            model,
            concentration,
            phi_init,
            state,
            rng,
            alpha_scale: ProposalScale::new(0.5),
            h_scales: vec![ProposalScale::new(1.0); cluster_limit],
            phi_scales: vec![ProposalScale::new(phi_scale); cluster_limit],
        })
    }

    pub fn state(&self) -> &SamplerState {
        &self.state
    }

    pub fn phi_init(&self) -> &[f64] {
        &self.phi_init
    }

    /// Replace the chain state, for instance with a MAP estimate
    pub fn set_state(&mut self, state: SamplerState) {
        debug_assert_eq!(state.cluster_count(), self.state.cluster_count());
        debug_assert_eq!(state.z.len(), self.state.z.len());
        self.state = state;
    }

    fn accept(&mut self, ln_ratio: f64) -> bool {
        if ln_ratio.is_nan() {
            return false;
        }
        let u = self.rng.sample::<f64, _>(Open01);
        u.ln() < ln_ratio
    }

    fn update_alpha(&mut self) {
        if self.concentration.is_fixed() {
            return;
        }
        let alpha = self.state.alpha;
        let step = self.rng.sample::<f64, _>(StandardNormal) * self.alpha_scale.scale;
        let proposal = alpha * step.exp();

        let lp = |a: f64| {
            ln_concentration_prior(&self.concentration, a) + ln_stick_prior(&self.state.h, a)
        };
        // Jacobian of the log-scale walk
        let ln_ratio = lp(proposal) - lp(alpha) + proposal.ln() - alpha.ln();

        let accepted = self.accept(ln_ratio);
        if accepted {
            self.state.alpha = proposal;
        }
        self.alpha_scale.record(accepted);
    }

    fn update_h(&mut self) {
        let counts = self.state.cluster_counts();
        for k in 0..self.state.cluster_count() {
            let h = self.state.h[k];
            let step = self.rng.sample::<f64, _>(StandardNormal) * self.h_scales[k].scale;
            let proposal = logistic(logit(h) + step);

            let accepted = if proposal <= 0.0 || proposal >= 1.0 {
                false
            } else {
                let alpha = self.state.alpha;
                let mut h_proposal = self.state.h.clone();
                h_proposal[k] = proposal;
                let lp_current = ln_stick_proportion_prior(h, alpha)
                    + ln_assignment_prob(&self.state.weights(), &counts);
                let lp_proposal = ln_stick_proportion_prior(proposal, alpha)
                    + ln_assignment_prob(&get_stick_breaking_weights(&h_proposal), &counts);
                // Jacobian of the logit-scale walk
                let ln_jacobian = (proposal * (1.0 - proposal)).ln() - (h * (1.0 - h)).ln();
                self.accept(lp_proposal - lp_current + ln_jacobian)
            };
            if accepted {
                self.state.h[k] = proposal;
            }
            self.h_scales[k].record(accepted);
        }
    }

    /// Gibbs update of every variant's cluster assignment
    ///
    /// Per-variant conditional distributions are computed in parallel, and the draws are made
    /// sequentially afterwards so that results do not depend on thread scheduling.
    ///
    fn update_z(&mut self) {
        let ln_weights = self
            .state
            .weights()
            .iter()
            .map(|w| w.ln())
            .collect::<Vec<_>>();
        let model = self.model;
        let phi_k = &self.state.phi_k;
        let ln_conditionals = (0..model.variant_count())
            .into_par_iter()
            .map(|index| {
                phi_k
                    .iter()
                    .zip(ln_weights.iter())
                    .map(|(&phi, &lw)| {
                        let x = lw + model.variant_ln_likelihood(index, phi);
                        if x.is_nan() { f64::NEG_INFINITY } else { x }
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        for (z, mut lp) in self.state.z.iter_mut().zip(ln_conditionals) {
            if !lp.iter().any(|x| x.is_finite()) {
                continue;
            }
            normalize_ln_distro(&mut lp);
            if let Ok(dist) = WeightedIndex::new(&lp) {
                *z = dist.sample(&mut self.rng);
            }
        }
    }

    fn update_phi(&mut self) {
        let model = self.model;
        for k in 0..self.state.cluster_count() {
            let phi = self.state.phi_k[k];
            let step = self.rng.sample::<f64, _>(StandardNormal) * self.phi_scales[k].scale;
            let proposal = phi + step;

            let accepted = if !model.is_phi_in_bounds(proposal) {
                false
            } else {
                let members = self
                    .state
                    .z
                    .iter()
                    .enumerate()
                    .filter(|(_, x)| **x == k)
                    .map(|(index, _)| index)
                    .collect::<Vec<_>>();
                let ll_diffs = members
                    .par_iter()
                    .map(|&index| {
                        model.variant_ln_likelihood(index, proposal)
                            - model.variant_ln_likelihood(index, phi)
                    })
                    .collect::<Vec<_>>();
                self.accept(ll_diffs.iter().sum())
            };
            if accepted {
                self.state.phi_k[k] = proposal;
            }
            self.phi_scales[k].record(accepted);
        }
    }

    fn tune(&mut self) {
        debug_msg!(
            false,
            "Tuning proposal scales, concentration scale: {:.4}",
            self.alpha_scale.scale
        );
        self.alpha_scale.tune();
        for x in self.h_scales.iter_mut().chain(self.phi_scales.iter_mut()) {
            x.tune();
        }
    }

    /// Run one iteration, updating all parameters in model dependency order
    pub fn step(&mut self) {
        self.update_alpha();
        self.update_h();
        self.update_z();
        self.update_phi();
    }

    fn trace_sample(&self, iteration: usize) -> TraceSample {
        TraceSample {
            iteration,
            alpha: self.state.alpha,
            weights: self.state.weights(),
            phi_k: self.state.phi_k.clone(),
            z: self.state.z.clone(),
            ln_likelihood: self
                .model
                .ln_likelihood(&self.state.z, &self.state.phi_k, &self.phi_init),
        }
    }

    /// Run the chain and return the trace of every `thin`-th iteration
    ///
    /// # Arguments
    /// * `tune_iterations` - Proposal scales are tuned during this many leading iterations
    ///
    pub fn sample(&mut self, n_iter: usize, thin: usize, tune_iterations: usize) -> PosteriorTrace {
        assert!(thin > 0);
        let mut trace = PosteriorTrace::new(thin);
        let report_interval = std::cmp::max(n_iter / 10, 1);
        for iteration in 0..n_iter {
            self.step();
            if (iteration + 1) % TUNE_INTERVAL == 0 && iteration < tune_iterations {
                self.tune();
            }
            if iteration % thin == 0 {
                trace.push(self.trace_sample(iteration));
            }
            if (iteration + 1) % report_interval == 0 {
                info!(
                    "Completed {} of {} MCMC iterations",
                    (iteration + 1).separate_with_commas(),
                    n_iter.separate_with_commas()
                );
            }
        }
        trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dp_cluster::model::test_utils::get_test_model;

    #[test]
    fn test_sampler_init() {
        let model = get_test_model(&[0.3, 0.6, 1.0], 200);
        let sampler = DpSampler::new(&model, Concentration::Fixed(1.0), 10, 1).unwrap();
        let state = sampler.state();
        assert_eq!(state.h.len(), 10);
        assert_eq!(state.z, vec![0, 0, 0]);
        assert!(state.phi_k.iter().all(|x| model.is_phi_in_bounds(*x)));
        assert_eq!(state.phi_k, sampler.phi_init());
        approx::assert_abs_diff_eq!(state.weights().iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_set_state() {
        let model = get_test_model(&[0.3, 0.6, 1.0], 200);
        let mut sampler = DpSampler::new(&model, Concentration::Fixed(1.0), 4, 1).unwrap();
        let mut state = sampler.state().clone();
        state.z = vec![0, 1, 2];
        sampler.set_state(state);
        assert_eq!(sampler.state().z, vec![0, 1, 2]);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_set_state_cluster_count_mismatch() {
        let model = get_test_model(&[0.3, 0.6, 1.0], 200);
        let mut sampler = DpSampler::new(&model, Concentration::Fixed(1.0), 4, 1).unwrap();
        let mut state = sampler.state().clone();
        state.h.push(0.5);
        state.phi_k.push(0.5);
        sampler.set_state(state);
    }

    #[test]
    fn test_sampler_is_reproducible() {
        let model = get_test_model(&[0.3, 0.6, 1.0], 200);
        let run = || {
            let mut sampler =
                DpSampler::new(&model, Concentration::Random { shape: 1.0, rate: 1.0 }, 5, 3)
                    .unwrap();
            sampler.sample(50, 5, 0)
        };
        let (a, b) = (run(), run());
        assert_eq!(a.samples.len(), 10);
        for (x, y) in a.samples.iter().zip(b.samples.iter()) {
            assert_eq!(x.z, y.z);
            assert_eq!(x.phi_k, y.phi_k);
            assert_eq!(x.alpha, y.alpha);
        }
    }

    #[test]
    fn test_sampler_stays_in_bounds() {
        let model = get_test_model(&[0.2, 0.9], 100);
        let mut sampler =
            DpSampler::new(&model, Concentration::Random { shape: 1.0, rate: 1.0 }, 6, 11)
                .unwrap();
        let trace = sampler.sample(300, 1, 200);
        for s in trace.samples.iter() {
            assert!(s.alpha > 0.0);
            assert!(s.phi_k.iter().all(|x| model.is_phi_in_bounds(*x)));
            assert!(s.z.iter().all(|&k| k < 6));
            approx::assert_abs_diff_eq!(s.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_proposal_scale_tune() {
        let mut x = ProposalScale::new(1.0);
        for _ in 0..100 {
            x.record(true);
        }
        x.tune();
        approx::assert_ulps_eq!(x.scale, 10.0, max_ulps = 4);

        for i in 0..100 {
            x.record(i < 10);
        }
        x.tune();
        approx::assert_ulps_eq!(x.scale, 9.0, max_ulps = 4);
    }
}
