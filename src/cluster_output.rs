//! Writers for clustering results
//!

use std::fs::File;
use std::io::{BufWriter, Write};
use camino::Utf8Path;
use itertools::Itertools;
use log::info;
use unwrap::unwrap;

use crate::cli;
use crate::dp_cluster::{
    MapFit, PosteriorSummary, PosteriorTrace, VariantCopyNumberCall, VariantSummary,
};
use crate::globals::PROGRAM_NAME;
use crate::variant::{GenotypeSource, Variant};

pub const SETTINGS_FILENAME: &str = concat!(env!("CARGO_PKG_NAME"), ".settings.json");
pub const TRACE_FILENAME: &str = "mcmc_trace.tsv";
pub const ASSIGNMENT_TRACE_FILENAME: &str = "mcmc_assignments.tsv";
pub const MAP_FIT_FILENAME: &str = "map_fit.json";
pub const CLUSTER_FILENAME: &str = "clusters.tsv";
pub const VARIANT_FILENAME: &str = "variants.tsv";

fn create_output_file(filename: &Utf8Path, label: &str) -> BufWriter<File> {
    info!("Writing {label} to file: '{filename}'");

    let f = unwrap!(
        File::create(filename),
        "Unable to create {} file: '{}'",
        label,
        filename
    );
    BufWriter::new(f)
}

/// Write all settings to a json file in the output directory
///
pub fn write_settings(output_dir: &Utf8Path, settings: &cli::Settings) {
    let filename = output_dir.join(SETTINGS_FILENAME);
    let f = create_output_file(&filename, &format!("{PROGRAM_NAME} settings"));
    serde_json::to_writer_pretty(f, &settings).unwrap();
}

/// Write the scalar and per-cluster parameter values of each retained MCMC iteration
///
pub fn write_trace(output_dir: &Utf8Path, trace: &PosteriorTrace) {
    let filename = output_dir.join(TRACE_FILENAME);
    let mut f = create_output_file(&filename, "MCMC trace");

    let cluster_count = trace.samples.first().map(|x| x.phi_k.len()).unwrap_or(0);
    let cluster_labels = |prefix: &str| {
        (0..cluster_count)
            .map(|k| format!("{prefix}{k}"))
            .join("\t")
    };
    writeln!(
        f,
        "iteration\talpha\tln_likelihood\t{}\t{}",
        cluster_labels("weight_"),
        cluster_labels("phi_")
    )
    .unwrap();

    for sample in trace.samples.iter() {
        writeln!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            sample.iteration,
            sample.alpha,
            sample.ln_likelihood,
            sample.weights.iter().join("\t"),
            sample.phi_k.iter().join("\t")
        )
        .unwrap();
    }
}

/// Write the cluster assignment of each variant at each retained MCMC iteration
///
pub fn write_assignment_trace(output_dir: &Utf8Path, variants: &[Variant], trace: &PosteriorTrace) {
    let filename = output_dir.join(ASSIGNMENT_TRACE_FILENAME);
    let mut f = create_output_file(&filename, "MCMC assignment trace");

    writeln!(f, "iteration\t{}", variants.iter().map(|x| &x.id).join("\t")).unwrap();
    for sample in trace.samples.iter() {
        writeln!(f, "{}\t{}", sample.iteration, sample.z.iter().join("\t")).unwrap();
    }
}

pub fn write_map_fit(output_dir: &Utf8Path, map_fit: &MapFit) {
    let filename = output_dir.join(MAP_FIT_FILENAME);
    let f = create_output_file(&filename, "MAP fit");
    serde_json::to_writer_pretty(f, map_fit).unwrap();
}

/// Write posterior summary of each cluster
///
/// Clusters which are never occupied in the retained trace are skipped.
///
pub fn write_cluster_summary(output_dir: &Utf8Path, summary: &PosteriorSummary) {
    let filename = output_dir.join(CLUSTER_FILENAME);
    let mut f = create_output_file(&filename, "cluster summary");

    writeln!(f, "cluster\tvariant_count\tmean_occupancy\tmean_phi").unwrap();
    for c in summary.clusters.iter().filter(|x| x.mean_occupancy > 0.0) {
        writeln!(
            f,
            "{}\t{}\t{:.4}\t{:.6}",
            c.cluster_index, c.variant_count, c.mean_occupancy, c.mean_phi
        )
        .unwrap();
    }
}

fn variant_row(
    v: &Variant,
    genotype_source: GenotypeSource,
    s: &VariantSummary,
    call: &VariantCopyNumberCall,
) -> String {
    let hypothesis_probs = if call.hypothesis_probs.is_empty() {
        "NA".to_string()
    } else {
        call.hypothesis_probs
            .iter()
            .map(|x| format!("{x:.6}"))
            .join(",")
    };
    [
        v.id.clone(),
        v.bp1.chrom.clone(),
        v.bp1.pos.to_string(),
        v.bp1.dir.as_ref().to_string(),
        v.bp2.chrom.clone(),
        v.bp2.pos.to_string(),
        v.bp2.dir.as_ref().to_string(),
        v.classification.clone(),
        v.support.to_string(),
        v.depth.to_string(),
        genotype_source.as_ref().to_string(),
        s.modal_cluster.to_string(),
        format!("{:.4}", s.modal_cluster_prob),
        format!("{:.6}", call.phi),
        call.selection.state_label(),
        format!("{:.6}", call.selection.most_likely_vaf),
        hypothesis_probs,
    ]
    .join("\t")
}

/// Write the cluster assignment and selected copy-number state of each variant
///
pub fn write_variant_calls(
    output_dir: &Utf8Path,
    variants: &[Variant],
    genotype_sources: &[GenotypeSource],
    summary: &PosteriorSummary,
    calls: &[VariantCopyNumberCall],
) {
    let filename = output_dir.join(VARIANT_FILENAME);
    let mut f = create_output_file(&filename, "variant cluster and copy-number calls");

    writeln!(
        f,
        "id\tbp1_chr\tbp1_pos\tbp1_dir\tbp2_chr\tbp2_pos\tbp2_dir\tclassification\tsupport\tdepth\t\
gtype_source\tcluster\tcluster_prob\tphi\tcn_state\tmost_likely_vaf\thypothesis_probs"
    )
    .unwrap();

    for (((v, source), s), call) in variants
        .iter()
        .zip(genotype_sources)
        .zip(summary.variants.iter())
        .zip(calls)
    {
        writeln!(f, "{}", variant_row(v, *source, s, call)).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy_number::{CopyNumberHypothesis, CopyNumberSelection};
    use crate::variant::test_utils::get_test_variant;

    #[test]
    fn test_variant_row() {
        let v = get_test_variant("sv1", 10, 50, "1,1,1");
        let s = VariantSummary {
            modal_cluster: 2,
            modal_cluster_prob: 0.75,
            mean_phi: 0.4,
        };
        let call = VariantCopyNumberCall {
            phi: 0.4,
            selection: CopyNumberSelection {
                state: Some(CopyNumberHypothesis {
                    ref_cn: 1.0,
                    var_cn: 1.0,
                    mu: 0.5,
                    fraction: 1.0,
                }),
                most_likely_vaf: 0.2,
            },
            hypothesis_probs: vec![1.0],
        };
        let row = variant_row(&v, GenotypeSource::Bp1, &s, &call);
        let fields = row.split('\t').collect::<Vec<_>>();
        assert_eq!(fields.len(), 17);
        assert_eq!(fields[0], "sv1");
        assert_eq!(fields[10], "bp1");
        assert_eq!(fields[11], "2");
        assert_eq!(fields[16], "1.000000");
    }

    #[test]
    fn test_variant_row_without_hypothesis() {
        let v = get_test_variant("sv2", 10, 50, "0,0,1");
        let s = VariantSummary {
            modal_cluster: 0,
            modal_cluster_prob: 1.0,
            mean_phi: 0.4,
        };
        let call = VariantCopyNumberCall {
            phi: 0.4,
            selection: CopyNumberSelection {
                state: None,
                most_likely_vaf: 1e-7,
            },
            hypothesis_probs: Vec::new(),
        };
        let row = variant_row(&v, GenotypeSource::None, &s, &call);
        let fields = row.split('\t').collect::<Vec<_>>();
        assert_eq!(fields.len(), 17);
        assert_eq!(fields[14], "NaN,NaN,NaN");
        assert_eq!(fields[15], "0.000000");
        assert_eq!(fields[16], "NA");

        let output_dir = camino::Utf8PathBuf::from_path_buf(std::env::temp_dir())
            .unwrap()
            .join(format!("svclust_output_test_{}", std::process::id()));
        std::fs::create_dir_all(&output_dir).unwrap();
        let summary = PosteriorSummary {
            sample_count: 1,
            clusters: Vec::new(),
            variants: vec![s],
        };
        write_variant_calls(
            &output_dir,
            &[v],
            &[GenotypeSource::None],
            &summary,
            &[call],
        );
        let contents = std::fs::read_to_string(output_dir.join(VARIANT_FILENAME)).unwrap();
        std::fs::remove_dir_all(&output_dir).unwrap();

        let lines = contents.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], row);
    }
}
