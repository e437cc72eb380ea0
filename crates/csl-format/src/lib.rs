//! Canonical CSL printing and diff-based formatting edits.

mod edits;
mod printer;

pub use edits::{compute_edits, TextEdit};
pub use printer::{
    annotations_to_string, expr_to_string, is_bare_identifier, quote_identifier, schema_to_csl,
    schemas_to_csl,
};
