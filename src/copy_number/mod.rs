//! Copy-number hypothesis enumeration, likelihood evaluation and state selection for each SV
//!

mod genotype;
mod likelihood;
mod selector;

pub use self::genotype::{CopyNumberHypothesis, get_sv_allele_combos};
pub use self::likelihood::{ReadEvidence, binomial_ln_likelihood, calc_lik, get_probs_from_llik};
pub use self::selector::{
    CopyNumberSelection, get_most_likely_variant_vaf, index_of_max, select_copy_number_state,
};
