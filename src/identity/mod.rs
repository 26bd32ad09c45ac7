//! Stable, human-legible record identifiers derived from filenames

mod date;
mod synth;

pub use date::{
    find_compact_date, find_embedded_date, is_date_token, trailing_suffix, EmbeddedDate,
    MAX_PLAUSIBLE_YEAR, MIN_PLAUSIBLE_YEAR,
};
pub use synth::{
    propose_for_stem, sanitize_id_part, DateSource, IdentityError, IdentityResult,
    IdentitySynthesizer, ProposedIdentity, UniquenessOracle,
};
