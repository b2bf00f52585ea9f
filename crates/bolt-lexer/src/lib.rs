// Bolt lexer -- scanner and layout punctuator for the Bolt language.

mod cursor;
mod layout;
mod scanner;

pub use layout::Punctuator;
pub use scanner::Scanner;

use bolt_common::diagnostics::Diagnostic;
use bolt_common::token::Token;

/// Scan a source string into raw tokens (no layout processing).
///
/// The returned vector always ends with an `EndOfFile` token. Lexical
/// problems are reported through the returned diagnostics; the token stream
/// is still produced so later stages can recover.
pub fn tokenize_raw(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut scanner = Scanner::new(source);
    let tokens = scanner.scan_all();
    (tokens, scanner.into_diagnostics())
}

/// Scan a source string and run the layout punctuator over it.
///
/// This is the token stream the parser consumes: raw tokens interleaved
/// with the virtual `BlockStart`, `BlockEnd`, and `LineFoldEnd` tokens,
/// terminated by `EndOfFile`.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let (raw, diagnostics) = tokenize_raw(source);
    (Punctuator::punctuate(raw), diagnostics)
}
