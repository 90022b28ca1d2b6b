use serde::Serialize;

use crate::copy_number::index_of_max;

/// Parameter values recorded at one retained MCMC iteration
///
#[derive(Clone, Debug, Serialize)]
pub struct TraceSample {
    pub iteration: usize,
    pub alpha: f64,

    /// Mixture weight of each cluster
    pub weights: Vec<f64>,

    /// Cellular prevalence of each cluster
    pub phi_k: Vec<f64>,

    /// Cluster assignment of each variant
    pub z: Vec<usize>,

    /// Log-likelihood of the observed supporting read counts
    pub ln_likelihood: f64,
}

/// Retained samples from one MCMC chain
///
#[derive(Clone, Debug, Default, Serialize)]
pub struct PosteriorTrace {
    pub thin: usize,
    pub samples: Vec<TraceSample>,
}

/// Posterior summary of one cluster
///
/// Cluster indices refer to the prevalence-ordered labels described in
/// [PosteriorTrace::summarize].
///
#[derive(Clone, Debug, Serialize)]
pub struct ClusterSummary {
    pub cluster_index: usize,

    /// Number of variants with this cluster as their most frequent assignment
    pub variant_count: usize,

    /// Mean number of variants assigned to the cluster per sample
    pub mean_occupancy: f64,

    /// Mean cellular prevalence over samples in which the cluster is occupied, weighted by the
    /// number of assigned variants
    pub mean_phi: f64,
}

/// Posterior summary of one variant
///
#[derive(Clone, Debug, Serialize)]
pub struct VariantSummary {
    /// Most frequent cluster assignment
    pub modal_cluster: usize,

    /// Fraction of samples assigned to the modal cluster
    pub modal_cluster_prob: f64,

    /// Mean prevalence of the assigned cluster over all retained samples
    pub mean_phi: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct PosteriorSummary {
    pub sample_count: usize,
    pub clusters: Vec<ClusterSummary>,
    pub variants: Vec<VariantSummary>,
}

/// Map each cluster of one sample to its rank by prevalence among the occupied clusters
///
/// Unoccupied clusters map to None. Equal prevalences are ordered by cluster index.
///
fn get_prevalence_ranks(sample: &TraceSample) -> Vec<Option<usize>> {
    let cluster_count = sample.phi_k.len();
    let mut occupied = vec![false; cluster_count];
    for &k in sample.z.iter() {
        occupied[k] = true;
    }

    let mut order = (0..cluster_count).filter(|&k| occupied[k]).collect::<Vec<_>>();
    order.sort_by(|&a, &b| sample.phi_k[a].total_cmp(&sample.phi_k[b]).then(a.cmp(&b)));

    let mut ranks = vec![None; cluster_count];
    for (rank, &k) in order.iter().enumerate() {
        ranks[k] = Some(rank);
    }
    ranks
}

impl PosteriorTrace {
    pub fn new(thin: usize) -> Self {
        Self {
            thin,
            samples: Vec::new(),
        }
    }

    pub fn push(&mut self, sample: TraceSample) {
        self.samples.push(sample);
    }

    /// Remove all samples recorded before iteration `burn`
    ///
    pub fn discard_burn_in(mut self, burn: usize) -> Self {
        self.samples.retain(|x| x.iteration >= burn);
        self
    }

    /// Summarize cluster prevalences and variant assignments over all retained samples
    ///
    /// Cluster indices are exchangeable in the mixture, so the sampler may swap them between
    /// iterations. Each sample is relabeled by ranking its occupied clusters in order of
    /// increasing prevalence before assignments and prevalences are accumulated.
    ///
    /// Returns None if the trace is empty.
    ///
    pub fn summarize(&self) -> Option<PosteriorSummary> {
        let first = self.samples.first()?;
        let cluster_count = first.phi_k.len();
        let variant_count = first.z.len();
        let sample_count = self.samples.len() as f64;

        let mut assignment_counts = vec![vec![0usize; cluster_count]; variant_count];
        let mut variant_phi_sum = vec![0.0; variant_count];
        let mut cluster_phi_sum = vec![0.0; cluster_count];
        let mut occupancy_sum = vec![0usize; cluster_count];
        for sample in self.samples.iter() {
            let ranks = get_prevalence_ranks(sample);
            for (i, &k) in sample.z.iter().enumerate() {
                let phi = sample.phi_k[k];
                variant_phi_sum[i] += phi;
                if let Some(label) = ranks[k] {
                    assignment_counts[i][label] += 1;
                    occupancy_sum[label] += 1;
                    cluster_phi_sum[label] += phi;
                }
            }
        }

        let variants = assignment_counts
            .iter()
            .zip(variant_phi_sum.iter())
            .map(|(counts, phi_sum)| {
                let counts = counts.iter().map(|&x| x as f64).collect::<Vec<_>>();
                let modal_cluster = index_of_max(&counts).unwrap_or(0);
                VariantSummary {
                    modal_cluster,
                    modal_cluster_prob: counts[modal_cluster] / sample_count,
                    mean_phi: phi_sum / sample_count,
                }
            })
            .collect::<Vec<_>>();

        let clusters = (0..cluster_count)
            .filter(|&k| occupancy_sum[k] > 0)
            .map(|k| ClusterSummary {
                cluster_index: k,
                variant_count: variants.iter().filter(|x| x.modal_cluster == k).count(),
                mean_occupancy: occupancy_sum[k] as f64 / sample_count,
                mean_phi: cluster_phi_sum[k] / occupancy_sum[k] as f64,
            })
            .collect();

        Some(PosteriorSummary {
            sample_count: self.samples.len(),
            clusters,
            variants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(iteration: usize, phi_k: &[f64], z: &[usize]) -> TraceSample {
        TraceSample {
            iteration,
            alpha: 1.0,
            weights: vec![1.0 / phi_k.len() as f64; phi_k.len()],
            phi_k: phi_k.to_vec(),
            z: z.to_vec(),
            ln_likelihood: -1.0,
        }
    }

    #[test]
    fn test_discard_burn_in() {
        let mut trace = PosteriorTrace::new(2);
        for iteration in (0..10).step_by(2) {
            trace.push(sample(iteration, &[0.5], &[0]));
        }
        let trace = trace.discard_burn_in(5);
        let iterations = trace.samples.iter().map(|x| x.iteration).collect::<Vec<_>>();
        assert_eq!(iterations, vec![6, 8]);
    }

    #[test]
    fn test_summarize() {
        assert!(PosteriorTrace::new(1).summarize().is_none());

        let mut trace = PosteriorTrace::new(1);
        trace.push(sample(0, &[0.2, 0.8], &[0, 1, 1]));
        trace.push(sample(1, &[0.4, 0.6], &[0, 1, 0]));
        trace.push(sample(2, &[0.3, 0.7], &[0, 1, 1]));
        let summary = trace.summarize().unwrap();

        assert_eq!(summary.sample_count, 3);
        assert_eq!(summary.clusters.len(), 2);
        approx::assert_relative_eq!(
            summary.clusters[0].mean_phi,
            (0.2 + 2.0 * 0.4 + 0.3) / 4.0,
            epsilon = 1e-12
        );
        approx::assert_relative_eq!(
            summary.clusters[1].mean_phi,
            (2.0 * 0.8 + 0.6 + 2.0 * 0.7) / 5.0,
            epsilon = 1e-12
        );
        approx::assert_relative_eq!(summary.clusters[0].mean_occupancy, 4.0 / 3.0, epsilon = 1e-12);
        assert_eq!(summary.clusters[0].variant_count, 1);
        assert_eq!(summary.clusters[1].variant_count, 2);

        let v = &summary.variants[2];
        assert_eq!(v.modal_cluster, 1);
        approx::assert_relative_eq!(v.modal_cluster_prob, 2.0 / 3.0, epsilon = 1e-12);
        approx::assert_relative_eq!(v.mean_phi, (0.8 + 0.4 + 0.7) / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_summarize_swapped_cluster_labels() {
        let mut trace = PosteriorTrace::new(1);
        trace.push(sample(0, &[0.3, 0.9, 0.5], &[0, 0, 1, 1]));
        trace.push(sample(1, &[0.88, 0.32, 0.1], &[1, 1, 0, 0]));
        trace.push(sample(2, &[0.9, 0.6, 0.28], &[2, 2, 0, 0]));
        let summary = trace.summarize().unwrap();

        // Empty clusters are not reported, and their prevalences are not averaged in
        assert_eq!(summary.clusters.len(), 2);
        approx::assert_relative_eq!(
            summary.clusters[0].mean_phi,
            (0.3 + 0.32 + 0.28) / 3.0,
            epsilon = 1e-12
        );
        approx::assert_relative_eq!(
            summary.clusters[1].mean_phi,
            (0.9 + 0.88 + 0.9) / 3.0,
            epsilon = 1e-12
        );
        approx::assert_relative_eq!(summary.clusters[0].mean_occupancy, 2.0, epsilon = 1e-12);

        for (i, v) in summary.variants.iter().enumerate() {
            assert_eq!(v.modal_cluster, i / 2);
            approx::assert_relative_eq!(v.modal_cluster_prob, 1.0, epsilon = 1e-12);
        }
        assert_eq!(summary.clusters[0].variant_count, 2);
        assert_eq!(summary.clusters[1].variant_count, 2);
    }

    #[test]
    fn test_modal_cluster_tie() {
        let mut trace = PosteriorTrace::new(1);
        trace.push(sample(0, &[0.2, 0.8], &[0, 1]));
        trace.push(sample(1, &[0.2, 0.8], &[1, 0]));
        let summary = trace.summarize().unwrap();
        assert_eq!(summary.variants[0].modal_cluster, 0);
        approx::assert_relative_eq!(summary.variants[0].modal_cluster_prob, 0.5, epsilon = 1e-12);
    }
}
