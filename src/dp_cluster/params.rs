use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Requested handling of the Dirichlet Process concentration parameter
///
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum ConcentrationSetting {
    /// Fixed at a value derived from the variant count
    Auto,

    /// Fixed at the given value
    Fixed(f64),

    /// Sampled under a Gamma prior
    Random,
}

impl FromStr for ConcentrationSetting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "yes" | "true" | "t" => Ok(Self::Auto),
            "no" | "false" | "f" => Ok(Self::Random),
            x => match x.parse::<f64>() {
                Ok(v) if v.is_finite() && v > 0.0 => Ok(Self::Fixed(v)),
                _ => Err(Error::InvalidConcentration {
                    token: s.to_string(),
                }),
            },
        }
    }
}

impl fmt::Display for ConcentrationSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "yes"),
            Self::Fixed(x) => write!(f, "{x}"),
            Self::Random => write!(f, "no"),
        }
    }
}

/// Concentration parameter of the model, resolved for a specific variant set
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Concentration {
    Fixed(f64),

    /// Gamma prior given as shape and rate, with the chain initialized at the prior mean
    Random { shape: f64, rate: f64 },
}

impl Concentration {
    pub fn resolve(params: &ClusterParams, variant_count: usize) -> Result<Self> {
        let x = match params.concentration {
            ConcentrationSetting::Auto => {
                if variant_count < 2 {
                    return Err(Error::InvalidClusterParams {
                        msg: "automatic concentration parameter requires at least 2 variants"
                            .to_string(),
                    });
                }
                Self::Fixed(0.75 / (variant_count as f64).log10())
            }
            ConcentrationSetting::Fixed(x) => Self::Fixed(x),
            ConcentrationSetting::Random => Self::Random {
                shape: params.gamma_shape,
                rate: params.gamma_rate,
            },
        };
        Ok(x)
    }

    /// Starting value of the concentration parameter
    pub fn initial_value(&self) -> f64 {
        match *self {
            Self::Fixed(x) => x,
            Self::Random { shape, rate } => shape / rate,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }
}

/// Tumor sample properties used by the likelihood model
///
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct SampleParams {
    /// Fraction of sequenced cells from the tumor
    pub purity: f64,

    /// Average tumor copy number
    pub ploidy: f64,
}

impl SampleParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.purity > 0.0 && self.purity <= 1.0) {
            return Err(Error::InvalidClusterParams {
                msg: format!("purity must be in (0,1], found {}", self.purity),
            });
        }
        if !(self.ploidy.is_finite() && self.ploidy > 0.0) {
            return Err(Error::InvalidClusterParams {
                msg: format!("ploidy must be positive, found {}", self.ploidy),
            });
        }
        Ok(())
    }
}

/// Clustering model and MCMC run parameters
///
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ClusterParams {
    /// Truncation level of the Dirichlet Process, the maximum number of clusters
    pub cluster_limit: usize,

    pub concentration: ConcentrationSetting,

    /// Shape and rate of the Gamma prior on a random concentration parameter
    pub gamma_shape: f64,
    pub gamma_rate: f64,

    /// Total MCMC iterations
    pub n_iter: usize,

    /// Leading iterations removed from the trace after sampling
    pub burn: usize,

    /// Interval between retained iterations
    pub thin: usize,

    /// Seed the chain with a maximum a posteriori fit
    pub use_map: bool,

    /// Upper bound on cluster cellular prevalence
    pub phi_limit: f64,

    /// p-value cutoff of the clonal vs. subclonal copy-number likelihood ratio test
    pub clonal_cnv_pval: f64,

    pub seed: u64,
}

impl ClusterParams {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidClusterParams { msg });
        if self.cluster_limit == 0 {
            return invalid("cluster limit must be greater than 0".to_string());
        }
        if self.n_iter == 0 {
            return invalid("iteration count must be greater than 0".to_string());
        }
        if self.burn >= self.n_iter {
            return invalid(format!(
                "burn-in ({}) must be less than the iteration count ({})",
                self.burn, self.n_iter
            ));
        }
        if self.thin == 0 {
            return invalid("thinning interval must be greater than 0".to_string());
        }
        if !(self.phi_limit > 0.0 && self.phi_limit <= 1.0) {
            return invalid(format!(
                "phi limit must be in (0,1], found {}",
                self.phi_limit
            ));
        }
        if !(0.0..=1.0).contains(&self.clonal_cnv_pval) {
            return invalid(format!(
                "clonal copy-number p-value cutoff must be in [0,1], found {}",
                self.clonal_cnv_pval
            ));
        }
        if self.concentration == ConcentrationSetting::Random
            && !(self.gamma_shape > 0.0 && self.gamma_rate > 0.0)
        {
            return invalid(format!(
                "gamma prior parameters must be positive, found shape {} rate {}",
                self.gamma_shape, self.gamma_rate
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;

    pub fn get_test_cluster_params() -> ClusterParams {
        ClusterParams {
            cluster_limit: 10,
            concentration: ConcentrationSetting::Fixed(1.0),
            gamma_shape: 1.0,
            gamma_rate: 1.0,
            n_iter: 4000,
            burn: 1000,
            thin: 1,
            use_map: true,
            phi_limit: 1.0,
            clonal_cnv_pval: 0.05,
            seed: 42,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::get_test_cluster_params;
    use super::*;

    #[test]
    fn test_concentration_setting_parse() {
        assert_eq!(
            "Yes".parse::<ConcentrationSetting>().unwrap(),
            ConcentrationSetting::Auto
        );
        assert_eq!(
            "t".parse::<ConcentrationSetting>().unwrap(),
            ConcentrationSetting::Auto
        );
        assert_eq!(
            "FALSE".parse::<ConcentrationSetting>().unwrap(),
            ConcentrationSetting::Random
        );
        assert_eq!(
            "0.5".parse::<ConcentrationSetting>().unwrap(),
            ConcentrationSetting::Fixed(0.5)
        );
        assert!(matches!(
            "maybe".parse::<ConcentrationSetting>(),
            Err(Error::InvalidConcentration { .. })
        ));
        assert!("-1".parse::<ConcentrationSetting>().is_err());
    }

    #[test]
    fn test_concentration_resolve() {
        let mut params = get_test_cluster_params();
        params.concentration = ConcentrationSetting::Auto;
        let c = Concentration::resolve(&params, 100).unwrap();
        approx::assert_ulps_eq!(c.initial_value(), 0.375, max_ulps = 4);
        assert!(c.is_fixed());
        assert!(Concentration::resolve(&params, 1).is_err());

        params.concentration = ConcentrationSetting::Random;
        params.gamma_shape = 2.0;
        params.gamma_rate = 4.0;
        let c = Concentration::resolve(&params, 100).unwrap();
        assert!(!c.is_fixed());
        approx::assert_ulps_eq!(c.initial_value(), 0.5, max_ulps = 4);
    }

    #[test]
    fn test_cluster_params_validate() {
        let params = get_test_cluster_params();
        assert!(params.validate().is_ok());

        let mut x = params.clone();
        x.burn = x.n_iter;
        assert!(x.validate().is_err());

        let mut x = params.clone();
        x.phi_limit = 1.5;
        assert!(x.validate().is_err());

        let mut x = params;
        x.thin = 0;
        assert!(x.validate().is_err());
    }

    #[test]
    fn test_sample_params_validate() {
        let sample = SampleParams {
            purity: 0.6,
            ploidy: 2.0,
        };
        assert!(sample.validate().is_ok());
        let sample = SampleParams {
            purity: 0.0,
            ploidy: 2.0,
        };
        assert!(sample.validate().is_err());
    }
}
