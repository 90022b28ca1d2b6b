//! Truncated stick-breaking prior over cluster weights
//!

use statrs::distribution::{Beta, Continuous};

/// Stick proportions are kept this far away from 0 and 1
pub const STICK_PROPORTION_EPSILON: f64 = 1e-10;

/// Convert stick-breaking proportions into normalized mixture weights
///
/// Weight `i` is `h[i] * prod_{j<i}(1-h[j])`, and the weights are then renormalized to sum to 1.
///
pub fn get_stick_breaking_weights(h: &[f64]) -> Vec<f64> {
    let mut remaining = 1.0;
    let mut weights = h
        .iter()
        .map(|&x| {
            let w = x * remaining;
            remaining *= 1.0 - x;
            w
        })
        .collect::<Vec<_>>();
    let sum = weights.iter().sum::<f64>();
    for w in weights.iter_mut() {
        *w /= sum;
    }
    weights
}

/// Clamp a stick proportion into the open unit interval
pub fn clamp_stick_proportion(x: f64) -> f64 {
    x.clamp(STICK_PROPORTION_EPSILON, 1.0 - STICK_PROPORTION_EPSILON)
}

/// Log density of one stick proportion under its Beta(1, alpha) prior
///
pub fn ln_stick_proportion_prior(h: f64, alpha: f64) -> f64 {
    match Beta::new(1.0, alpha) {
        Ok(x) => x.ln_pdf(h),
        Err(_) => f64::NEG_INFINITY,
    }
}

/// Log density of all stick proportions under the Beta(1, alpha) prior
pub fn ln_stick_prior(h: &[f64], alpha: f64) -> f64 {
    h.iter().map(|&x| ln_stick_proportion_prior(x, alpha)).sum()
}

/// Number of variants assigned to each cluster
///
pub fn get_cluster_counts(z: &[usize], cluster_count: usize) -> Vec<usize> {
    let mut counts = vec![0; cluster_count];
    for &k in z {
        counts[k] += 1;
    }
    counts
}

/// Log probability of the cluster assignments given the mixture weights
///
pub fn ln_assignment_prob(weights: &[f64], counts: &[usize]) -> f64 {
    weights
        .iter()
        .zip(counts.iter())
        .filter(|(_, n)| **n > 0)
        .map(|(w, &n)| n as f64 * w.ln())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_distr::Distribution;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_stick_breaking_weights() {
        let w = get_stick_breaking_weights(&[0.5, 0.5, 0.5]);
        approx::assert_ulps_eq!(w[0], 0.5 / 0.875, max_ulps = 4);
        approx::assert_ulps_eq!(w[1], 0.25 / 0.875, max_ulps = 4);
        approx::assert_ulps_eq!(w[2], 0.125 / 0.875, max_ulps = 4);
    }

    #[test]
    fn test_stick_breaking_weights_sum() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        for &alpha in &[0.1, 1.0, 5.0] {
            let beta = rand_distr::Beta::new(1.0, alpha).unwrap();
            for _ in 0..100 {
                let h = (0..20)
                    .map(|_| clamp_stick_proportion(beta.sample(&mut rng)))
                    .collect::<Vec<_>>();
                let w = get_stick_breaking_weights(&h);
                approx::assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
                assert!(w.iter().all(|x| *x >= 0.0));
            }
        }
    }

    #[test]
    fn test_ln_stick_proportion_prior() {
        // Beta(1,1) is uniform:
        approx::assert_abs_diff_eq!(ln_stick_proportion_prior(0.3, 1.0), 0.0, epsilon = 1e-12);

        // Beta(1,a) density is a * (1-h)^(a-1)
        let expected = 2f64.ln() + 0.7f64.ln();
        approx::assert_relative_eq!(
            ln_stick_proportion_prior(0.3, 2.0),
            expected,
            epsilon = 1e-12
        );
        assert_eq!(ln_stick_proportion_prior(0.3, -1.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_ln_assignment_prob() {
        let counts = get_cluster_counts(&[0, 0, 2], 3);
        assert_eq!(counts, vec![2, 0, 1]);
        let lp = ln_assignment_prob(&[0.5, 0.0, 0.5], &counts);
        approx::assert_ulps_eq!(lp, 3.0 * 0.5f64.ln(), max_ulps = 4);
    }
}
