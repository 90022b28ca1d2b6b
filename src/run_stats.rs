//! Track stats for the whole svclust run
//!

use std::fs::File;

use camino::Utf8Path;
use log::info;
use serde::Serialize;
use unwrap::unwrap;

use crate::dp_cluster::{ClusterRun, PosteriorSummary};
use crate::variant::GenotypeSource;

pub const RUN_STATS_FILENAME: &str = "run_stats.json";

#[derive(Default, Serialize)]
pub struct VariantStats {
    pub variant_count: usize,

    /// Variants clustered with copy-number hypotheses from the first breakpoint
    pub bp1_genotype_count: usize,

    /// Variants clustered with copy-number hypotheses from the second breakpoint
    pub bp2_genotype_count: usize,

    /// Variants without any usable copy-number hypothesis
    pub no_hypothesis_count: usize,
}

#[derive(Default, Serialize)]
pub struct SamplerStats {
    /// Concentration value, or the initial value if the concentration is sampled
    pub concentration: f64,
    pub concentration_is_fixed: bool,
    pub phi_floor: f64,
    pub phi_limit: f64,
    pub retained_sample_count: usize,
    pub occupied_cluster_count: usize,
    pub map_fit_iterations: Option<usize>,
    pub map_fit_converged: Option<bool>,
    pub total_clustering_time_secs: f64,
}

#[derive(Default, Serialize)]
pub struct ClusterRunStats {
    pub variant_stats: VariantStats,
    pub sampler_stats: SamplerStats,
}

impl ClusterRunStats {
    pub fn new(run: &ClusterRun, summary: &PosteriorSummary, clustering_time_secs: f64) -> Self {
        let genotype_count = |source: GenotypeSource| {
            run.model
                .variants
                .iter()
                .filter(|x| x.genotype_source == source && !x.combos.is_empty())
                .count()
        };
        let variant_stats = VariantStats {
            variant_count: run.model.variant_count(),
            bp1_genotype_count: genotype_count(GenotypeSource::Bp1),
            bp2_genotype_count: genotype_count(GenotypeSource::Bp2),
            no_hypothesis_count: run
                .model
                .variants
                .iter()
                .filter(|x| x.combos.is_empty())
                .count(),
        };

        let sampler_stats = SamplerStats {
            concentration: run.concentration.initial_value(),
            concentration_is_fixed: run.concentration.is_fixed(),
            phi_floor: run.model.phi_floor,
            phi_limit: run.model.phi_limit,
            retained_sample_count: summary.sample_count,
            occupied_cluster_count: summary
                .clusters
                .iter()
                .filter(|x| x.variant_count > 0)
                .count(),
            map_fit_iterations: run.map_fit.as_ref().map(|x| x.iterations),
            map_fit_converged: run.map_fit.as_ref().map(|x| x.converged),
            total_clustering_time_secs: clustering_time_secs,
        };

        Self {
            variant_stats,
            sampler_stats,
        }
    }
}

/// Write run_stats structure out in json format
pub fn write_run_stats(output_dir: &Utf8Path, run_stats: &ClusterRunStats) {
    let filename = output_dir.join(RUN_STATS_FILENAME);

    info!("Writing run statistics to file: '{filename}'");

    let f = unwrap!(
        File::create(&filename),
        "Unable to create run statistics json file: '{}'",
        filename
    );

    serde_json::to_writer_pretty(&f, &run_stats).unwrap();
}
