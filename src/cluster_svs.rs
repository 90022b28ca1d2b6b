use std::error;

use camino::Utf8Path;
use log::info;

use crate::cli;
use crate::cluster_output;
use crate::dp_cluster::{cluster, get_copy_number_calls};
use crate::errors::Error;
use crate::run_stats::{ClusterRunStats, write_run_stats};
use crate::variant_table::read_variant_table;

/// Cluster all variants from the input table and write results to the output directory
///
pub fn run_cluster(settings: &cli::Settings) -> Result<(), Box<dyn error::Error>> {
    let output_dir = settings.get_output_dir();
    let cluster_settings = &settings.cluster;
    cluster_output::write_settings(output_dir, settings);

    let variants = read_variant_table(Utf8Path::new(&cluster_settings.variant_filename))?;

    let sample_params = cluster_settings.sample_params();
    let cluster_params = cluster_settings.cluster_params()?;

    let worker_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.shared.thread_count)
        .build()?;

    info!("Starting SV clustering");
    let start = std::time::Instant::now();
    let run = worker_pool.install(|| cluster(&variants, &sample_params, &cluster_params))?;
    let clustering_time_secs = start.elapsed().as_secs_f64();

    let summary = run
        .trace
        .summarize()
        .ok_or_else(|| Error::InvalidClusterParams {
            msg: "no MCMC samples retained after burn-in and thinning".to_string(),
        })?;
    let calls = worker_pool.install(|| get_copy_number_calls(&run.model, &summary));

    cluster_output::write_trace(output_dir, &run.trace);
    cluster_output::write_assignment_trace(output_dir, &variants, &run.trace);
    if let Some(map_fit) = &run.map_fit {
        cluster_output::write_map_fit(output_dir, map_fit);
    }
    cluster_output::write_cluster_summary(output_dir, &summary);

    let genotype_sources = run
        .model
        .variants
        .iter()
        .map(|x| x.genotype_source)
        .collect::<Vec<_>>();
    cluster_output::write_variant_calls(
        output_dir,
        &variants,
        &genotype_sources,
        &summary,
        &calls,
    );

    let run_stats = ClusterRunStats::new(&run, &summary, clustering_time_secs);
    write_run_stats(output_dir, &run_stats);
    Ok(())
}
