use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("malformed copy-number genotype '{genotype}': {msg}")]
    MalformedGenotype { genotype: String, msg: String },
    #[error("data integrity error for variant '{variant_id}': {msg}")]
    DataIntegrity { variant_id: String, msg: String },
    #[error("invalid variant table: {msg}")]
    VariantTable { msg: String },
    #[error(
        "invalid concentration parameter '{token}', must be a number or one of 'yes', 'true', 't', 'no', 'false', 'f'"
    )]
    InvalidConcentration { token: String },
    #[error("invalid clustering parameters: {msg}")]
    InvalidClusterParams { msg: String },
}

pub type Result<T> = std::result::Result<T, Error>;
