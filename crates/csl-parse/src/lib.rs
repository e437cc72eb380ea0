//! Recursive-descent parser for the Config Schema Language.
//!
//! Consumes a token stream and produces the arena-backed representation,
//! diagnostics, and a token-index → definition map used by editor
//! features. The parser never aborts: every error is recorded and parsing
//! resumes at the next plausible point.

mod parser;

pub use parser::{parse, ParseOutput};
