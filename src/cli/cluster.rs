use camino::Utf8PathBuf;
use clap::Args;
use const_format::concatcp;
use serde::Serialize;
use simple_error::{SimpleResult, bail};

use super::defaults;
use super::utils::check_required_filename;
use crate::dp_cluster::{ClusterParams, ConcentrationSetting, SampleParams};

#[derive(Args, Serialize)]
pub struct ClusterSettings {
    /// Directory for all clustering output (must not already exist)
    #[arg(long, value_name = "DIR", default_value = concatcp!(env!("CARGO_PKG_NAME"), "_output"))]
    pub output_dir: Utf8PathBuf,

    /// Validated SV table in tab-delimited format, including read counts and copy-number
    /// genotypes at each breakpoint
    #[arg(long = "variants", value_name = "FILE")]
    pub variant_filename: String,

    /// Fraction of sequenced cells from the tumor
    #[arg(long)]
    pub purity: f64,

    /// Average tumor copy number
    #[arg(long, default_value_t = defaults::PLOIDY)]
    pub ploidy: f64,

    /// Maximum number of clusters, the truncation level of the Dirichlet Process
    #[arg(long, default_value_t = defaults::MAX_CLUSTERS)]
    pub max_clusters: usize,

    /// Dirichlet Process concentration handling
    ///
    /// Give a number to fix the concentration at that value, 'yes' to fix it at a value derived
    /// from the variant count, or 'no' to sample it under a Gamma prior.
    ///
    #[arg(long, value_name = "VALUE", default_value = defaults::FIXED_ALPHA)]
    pub fixed_alpha: String,

    /// Shape of the Gamma prior on the concentration parameter
    #[arg(long, default_value_t = defaults::GAMMA_SHAPE)]
    pub alpha_prior_shape: f64,

    /// Rate of the Gamma prior on the concentration parameter
    #[arg(long, default_value_t = defaults::GAMMA_RATE)]
    pub alpha_prior_rate: f64,

    /// Number of MCMC iterations
    #[arg(long, default_value_t = defaults::N_ITER)]
    pub iterations: usize,

    /// Number of leading MCMC iterations removed from the trace
    #[arg(long, default_value_t = defaults::BURN)]
    pub burn: usize,

    /// Interval between retained MCMC iterations
    #[arg(long, default_value_t = defaults::THIN)]
    pub thin: usize,

    /// Skip the maximum a posteriori fit used to seed MCMC
    #[arg(long)]
    pub no_map: bool,

    /// Upper bound on cluster cellular prevalence
    #[arg(long, default_value_t = defaults::PHI_LIMIT)]
    pub phi_limit: f64,

    /// p-value cutoff of the likelihood ratio test used to prefer a clonal copy-number state
    #[arg(long, default_value_t = defaults::CLONAL_CNV_PVAL)]
    pub clonal_cnv_pval: f64,

    /// Random seed for the MCMC chain
    #[arg(long, default_value_t = defaults::SEED)]
    pub seed: u64,
}

impl ClusterSettings {
    pub fn sample_params(&self) -> SampleParams {
        SampleParams {
            purity: self.purity,
            ploidy: self.ploidy,
        }
    }

    /// Convert settings into clustering model parameters
    ///
    pub fn cluster_params(&self) -> SimpleResult<ClusterParams> {
        let concentration = match self.fixed_alpha.parse::<ConcentrationSetting>() {
            Ok(x) => x,
            Err(e) => bail!("{e}"),
        };
        Ok(ClusterParams {
            cluster_limit: self.max_clusters,
            concentration,
            gamma_shape: self.alpha_prior_shape,
            gamma_rate: self.alpha_prior_rate,
            n_iter: self.iterations,
            burn: self.burn,
            thin: self.thin,
            use_map: !self.no_map,
            phi_limit: self.phi_limit,
            clonal_cnv_pval: self.clonal_cnv_pval,
            seed: self.seed,
        })
    }
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
/// Assumes that the logger is not setup
///
pub fn validate_and_fix_cluster_settings(
    settings: ClusterSettings,
) -> SimpleResult<ClusterSettings> {
    check_required_filename(&settings.variant_filename, "variant table")?;

    if let Err(e) = settings.sample_params().validate() {
        bail!("{e}");
    }
    if let Err(e) = settings.cluster_params()?.validate() {
        bail!("{e}");
    }

    Ok(settings)
}
