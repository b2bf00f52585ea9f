//! Bolt parser: recursive descent over the punctuated token stream.
//!
//! Produces an arena CST ([`cst::SourceModule`]) with parent links wired,
//! plus the lexical scope table ([`scope::ScopeTable`]) the type checker
//! resolves references through.

pub mod cst;
mod parser;
pub mod scope;

use bolt_common::diagnostics::Diagnostic;

use crate::cst::SourceModule;
use crate::scope::ScopeTable;

/// The result of parsing one source file.
pub struct Parse {
    pub module: SourceModule,
    pub diagnostics: Vec<Diagnostic>,
}

impl Parse {
    /// Build the scope table for the parsed module.
    pub fn scopes(&self) -> ScopeTable {
        ScopeTable::build(&self.module)
    }
}

/// Lex, punctuate, and parse a source string.
///
/// Parent links are wired before returning, so scope and type checking can
/// start immediately. `additional_syntax` enables the `@` annotation forms
/// used by `bolt verify`.
pub fn parse(source: &str, additional_syntax: bool) -> Parse {
    let (tokens, mut diagnostics) = bolt_lexer::tokenize(source);
    let mut parser = parser::Parser::new(tokens, additional_syntax);
    parser.parse_source_file();
    diagnostics.append(&mut parser.diagnostics);
    let mut module = parser.module;
    module.set_parents();
    Parse {
        module,
        diagnostics,
    }
}
