//! Shared foundation types for the Bolt compiler.
//!
//! Every stage of the pipeline (lexer, layout punctuator, parser, scope
//! builder, type checker, evaluator, CLI driver) depends on this crate for:
//!
//! - [`text`]: source positions, ranges, and the per-file line table
//! - [`token`]: the complete token vocabulary, including the virtual
//!   layout tokens injected by the punctuator
//! - [`diagnostics`]: the type-erased diagnostic record, the buffering
//!   store, and the console renderer

pub mod diagnostics;
pub mod text;
pub mod token;
