pub const MAX_CLUSTERS: usize = 20;
pub const FIXED_ALPHA: &str = "no";
pub const GAMMA_SHAPE: f64 = 0.1;
pub const GAMMA_RATE: f64 = 0.1;
pub const N_ITER: usize = 10000;
pub const BURN: usize = 2000;
pub const THIN: usize = 1;
pub const PHI_LIMIT: f64 = 1.0;
pub const CLONAL_CNV_PVAL: f64 = 0.05;
pub const PLOIDY: f64 = 2.0;
pub const SEED: u64 = 1234;
