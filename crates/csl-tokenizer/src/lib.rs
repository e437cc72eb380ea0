//! Tokenizer for the Config Schema Language.
//!
//! This crate provides the position model, the typed token stream, and the
//! lexer that turns CSL source text into tokens plus diagnostics. It is the
//! bottom of the pipeline; `csl-parse` consumes its output.

mod descriptor;
mod diagnostic;
mod lexer;
mod position;
pub mod quoting;
mod token;

pub use descriptor::{DateTimeKind, SpecialNumberKind, StringKind, TypeDescriptor};
pub use diagnostic::{byte_offset, Diagnostic, Severity};
pub use lexer::{lex, lex_with_options, LexOutput};
pub use position::{Position, Region};
pub use token::{Token, TokenKind, TokenList};
