//! Maximum a posteriori fit used to seed the MCMC chain
//!

use log::info;
use rayon::prelude::*;
use serde::Serialize;

use super::model::{ClusterModel, sanitize_assignments};
use super::params::Concentration;
use super::sampler::{SamplerState, ln_posterior};
use super::stick_breaking::clamp_stick_proportion;
use crate::copy_number::index_of_max;
use crate::log_utils::debug_msg;

const MAX_MAP_ITERATIONS: usize = 200;

/// Coordinate ascent stops when the log posterior changes by less than this amount
const MAP_CONVERGENCE_TOLERANCE: f64 = 1e-6;

/// Number of evenly spaced points used to bracket the prevalence optimum
const PHI_GRID_SIZE: usize = 50;

const GOLDEN_SECTION_ITERATIONS: usize = 60;

#[derive(Clone, Debug, Serialize)]
pub struct MapFit {
    pub state: SamplerState,
    pub ln_posterior: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Find the maximum of `f` on [lo, hi]
///
/// The optimum is first bracketed on a coarse grid, then refined with golden-section search.
///
fn maximize_bounded<F: Fn(f64) -> f64>(f: F, lo: f64, hi: f64) -> f64 {
    let grid_step = (hi - lo) / (PHI_GRID_SIZE - 1) as f64;
    let grid = (0..PHI_GRID_SIZE)
        .map(|i| f(lo + grid_step * i as f64))
        .collect::<Vec<_>>();
    let best = match index_of_max(&grid) {
        Some(x) => x,
        None => return f64::NAN,
    };

    let mut a = lo + grid_step * best.saturating_sub(1) as f64;
    let mut b = (lo + grid_step * (best + 1) as f64).min(hi);
    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);
    for _ in 0..GOLDEN_SECTION_ITERATIONS {
        if fc >= fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = f(d);
        }
    }

    let refined = (a + b) / 2.0;
    let grid_best = lo + grid_step * best as f64;
    if f(refined) >= grid[best] {
        refined
    } else {
        grid_best
    }
}

/// Assign every variant to the cluster maximizing its conditional posterior
///
/// Variants without any finite conditional posterior are returned with index -1.
///
fn get_best_assignments(model: &ClusterModel, state: &SamplerState) -> Vec<i64> {
    let ln_weights = state.weights().iter().map(|w| w.ln()).collect::<Vec<_>>();
    (0..model.variant_count())
        .into_par_iter()
        .map(|index| {
            let lp = state
                .phi_k
                .iter()
                .zip(ln_weights.iter())
                .map(|(&phi, &lw)| lw + model.variant_ln_likelihood(index, phi))
                .map(|x| if x.is_finite() { x } else { f64::NAN })
                .collect::<Vec<_>>();
            index_of_max(&lp).map_or(-1, |x| x as i64)
        })
        .collect()
}

/// Set each stick proportion to its conditional posterior mean given the cluster counts
///
fn update_stick_proportions(state: &mut SamplerState) {
    let counts = state.cluster_counts();
    let mut remaining = counts.iter().sum::<usize>();
    for (h, &n) in state.h.iter_mut().zip(counts.iter()) {
        remaining -= n;
        let a = 1.0 + n as f64;
        let b = state.alpha + remaining as f64;
        *h = clamp_stick_proportion(a / (a + b));
    }
}

/// Fit the model state by coordinate ascent on the log posterior
///
/// Each round updates the assignments, then the prevalence of each occupied cluster, then the
/// stick proportions. The concentration parameter is held at its starting value.
///
pub fn fit_map(
    model: &ClusterModel,
    concentration: &Concentration,
    initial_state: &SamplerState,
    phi_init: &[f64],
) -> MapFit {
    let mut state = initial_state.clone();
    let mut lp = ln_posterior(model, concentration, &state, phi_init);
    let mut converged = false;
    let mut iterations = 0;

    while iterations < MAX_MAP_ITERATIONS {
        iterations += 1;

        state.z = sanitize_assignments(&get_best_assignments(model, &state));

        for k in 0..state.cluster_count() {
            let members = state
                .z
                .iter()
                .enumerate()
                .filter(|(_, x)| **x == k)
                .map(|(index, _)| index)
                .collect::<Vec<_>>();
            if members.is_empty() {
                continue;
            }
            let cluster_ll = |phi: f64| -> f64 {
                members
                    .iter()
                    .map(|&index| model.variant_ln_likelihood(index, phi))
                    .sum()
            };
            let phi = maximize_bounded(&cluster_ll, model.phi_floor, model.phi_limit);
            if cluster_ll(phi) > cluster_ll(state.phi_k[k]) {
                state.phi_k[k] = phi;
            }
        }

        update_stick_proportions(&mut state);

        let new_lp = ln_posterior(model, concentration, &state, phi_init);
        let delta = (new_lp - lp).abs();
        debug_msg!(
            false,
            "MAP iteration {iterations}: log posterior {new_lp:.6}, occupied clusters {}",
            state.cluster_counts().iter().filter(|x| **x > 0).count()
        );
        lp = new_lp;
        if delta < MAP_CONVERGENCE_TOLERANCE {
            converged = true;
            break;
        }
    }

    info!(
        "MAP fit {} after {} iterations, log posterior: {:.4}",
        if converged {
            "converged"
        } else {
            "stopped without convergence"
        },
        iterations,
        lp
    );

    MapFit {
        state,
        ln_posterior: lp,
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dp_cluster::model::test_utils::get_test_model;
    use crate::dp_cluster::sampler::DpSampler;

    #[test]
    fn test_maximize_bounded() {
        let x = maximize_bounded(|x| -(x - 0.37) * (x - 0.37), 0.0, 1.0);
        approx::assert_abs_diff_eq!(x, 0.37, epsilon = 1e-6);

        // Optimum on the boundary:
        let x = maximize_bounded(|x| x, 0.1, 0.9);
        approx::assert_abs_diff_eq!(x, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_update_stick_proportions() {
        let mut state = SamplerState {
            alpha: 1.0,
            h: vec![0.5; 3],
            phi_k: vec![0.5; 3],
            z: vec![0, 0, 1],
        };
        update_stick_proportions(&mut state);
        approx::assert_ulps_eq!(state.h[0], 3.0 / 5.0, max_ulps = 4);
        approx::assert_ulps_eq!(state.h[1], 2.0 / 3.0, max_ulps = 4);
        approx::assert_ulps_eq!(state.h[2], 0.5, max_ulps = 4);
    }

    #[test]
    fn test_fit_map() {
        let model = get_test_model(&[0.2, 0.2, 0.8, 0.8], 500);
        let concentration = Concentration::Fixed(1.0);
        let sampler = DpSampler::new(&model, concentration, 10, 5).unwrap();
        let initial_lp = ln_posterior(&model, &concentration, sampler.state(), sampler.phi_init());
        let fit = fit_map(&model, &concentration, sampler.state(), sampler.phi_init());

        assert!(fit.ln_posterior > initial_lp);
        for (index, &expected) in [0.2, 0.2, 0.8, 0.8].iter().enumerate() {
            let phi = fit.state.phi_k[fit.state.z[index]];
            approx::assert_abs_diff_eq!(phi, expected, epsilon = 0.02);
        }
    }
}
