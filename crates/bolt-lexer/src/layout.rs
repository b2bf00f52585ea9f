//! The layout punctuator: an off-side rule over the raw token stream.
//!
//! Two stacks drive the machine. The frame stack holds `Block` and
//! `LineFold` frames (initially one `Block`); the location stack holds the
//! anchor position of each line fold (initially the `(0, 0)` sentinel).
//! Only line-fold frames push anchors -- a block opened inside a fold is
//! measured against that fold's anchor.
//!
//! Every `BlockStart` this pass emits is matched by a later `BlockEnd`, and
//! frames close in LIFO order, so the parser never needs to look at
//! indentation itself.

use bolt_common::text::{TextLoc, TextRange};
use bolt_common::token::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Block,
    LineFold,
}

/// Injects `BlockStart`, `BlockEnd`, and `LineFoldEnd` tokens into a raw
/// token stream.
pub struct Punctuator {
    tokens: Vec<Token>,
    pos: usize,
    frames: Vec<Frame>,
    locations: Vec<TextLoc>,
}

impl Punctuator {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            frames: vec![Frame::Block],
            locations: vec![TextLoc::empty()],
        }
    }

    /// Run the punctuator to completion.
    pub fn punctuate(tokens: Vec<Token>) -> Vec<Token> {
        let mut punctuator = Punctuator::new(tokens);
        let mut out = Vec::new();
        loop {
            let token = punctuator.read();
            let is_eof = token.kind == TokenKind::EndOfFile;
            out.push(token);
            if is_eof {
                break;
            }
        }
        out
    }

    fn peek(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn virtual_token(kind: TokenKind, at: TextLoc) -> Token {
        Token::new(kind, TextRange::new(at, at))
    }

    /// Produce the next punctuated token.
    pub fn read(&mut self) -> Token {
        let t0 = self.peek(0).clone();

        if t0.kind == TokenKind::EndOfFile {
            // Close every remaining frame before handing out the EOF itself.
            if self.frames.len() == 1 {
                return self.bump();
            }
            let frame = self.frames.pop().unwrap();
            return match frame {
                Frame::Block => Self::virtual_token(TokenKind::BlockEnd, t0.range.start),
                Frame::LineFold => Self::virtual_token(TokenKind::LineFoldEnd, t0.range.start),
            };
        }

        let ref_loc = *self.locations.last().unwrap();
        match *self.frames.last().unwrap() {
            Frame::LineFold => {
                if t0.start_line() > ref_loc.line && t0.start_column() <= ref_loc.column {
                    self.frames.pop();
                    self.locations.pop();
                    return Self::virtual_token(TokenKind::LineFoldEnd, t0.range.start);
                }
                if t0.kind == TokenKind::Dot {
                    let t1 = self.peek(1);
                    if t1.start_line() > t0.end_line() {
                        self.bump();
                        self.frames.push(Frame::Block);
                        return Self::virtual_token(TokenKind::BlockStart, t0.range.start);
                    }
                }
                self.bump()
            }
            Frame::Block => {
                if t0.start_column() <= ref_loc.column {
                    self.frames.pop();
                    return Self::virtual_token(TokenKind::BlockEnd, t0.range.start);
                }
                self.frames.push(Frame::LineFold);
                self.locations.push(t0.range.start);
                self.bump()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize;
    use bolt_common::token::TokenKind::*;

    fn layout_kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diagnostics) = tokenize(source);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_source_is_just_eof() {
        assert_eq!(layout_kinds(""), vec![EndOfFile]);
    }

    #[test]
    fn single_statement_gets_a_line_fold() {
        assert_eq!(
            layout_kinds("let a = 1"),
            vec![
                LetKeyword,
                Identifier("a".into()),
                Equals,
                IntegerLiteral(1),
                LineFoldEnd,
                EndOfFile,
            ]
        );
    }

    #[test]
    fn two_statements_are_separate_folds() {
        assert_eq!(
            layout_kinds("let a = 1\nlet b = 2"),
            vec![
                LetKeyword,
                Identifier("a".into()),
                Equals,
                IntegerLiteral(1),
                LineFoldEnd,
                LetKeyword,
                Identifier("b".into()),
                Equals,
                IntegerLiteral(2),
                LineFoldEnd,
                EndOfFile,
            ]
        );
    }

    #[test]
    fn indented_continuation_stays_in_the_fold() {
        assert_eq!(
            layout_kinds("let a = foo\n  bar"),
            vec![
                LetKeyword,
                Identifier("a".into()),
                Equals,
                Identifier("foo".into()),
                Identifier("bar".into()),
                LineFoldEnd,
                EndOfFile,
            ]
        );
    }

    #[test]
    fn trailing_dot_opens_a_block() {
        assert_eq!(
            layout_kinds("let f x.\n  return x"),
            vec![
                LetKeyword,
                Identifier("f".into()),
                Identifier("x".into()),
                BlockStart,
                ReturnKeyword,
                Identifier("x".into()),
                LineFoldEnd,
                BlockEnd,
                LineFoldEnd,
                EndOfFile,
            ]
        );
    }

    #[test]
    fn same_line_dot_is_member_access() {
        assert_eq!(
            layout_kinds("let y = r.x"),
            vec![
                LetKeyword,
                Identifier("y".into()),
                Equals,
                Identifier("r".into()),
                Dot,
                Identifier("x".into()),
                LineFoldEnd,
                EndOfFile,
            ]
        );
    }

    #[test]
    fn nested_blocks_close_in_lifo_order() {
        let kinds = layout_kinds("let f x.\n  let g y.\n    return y\n  return x");
        let starts = kinds.iter().filter(|k| **k == BlockStart).count();
        let ends = kinds.iter().filter(|k| **k == BlockEnd).count();
        assert_eq!(starts, 2);
        assert_eq!(ends, 2);
        // Every BlockStart is matched by a strictly later BlockEnd.
        let mut depth = 0i64;
        for kind in &kinds {
            match kind {
                BlockStart => depth += 1,
                BlockEnd => {
                    depth -= 1;
                    assert!(depth >= 0, "BlockEnd before matching BlockStart");
                }
                _ => {}
            }
        }
        assert_eq!(depth, 0);
    }

    #[test]
    fn dedent_closes_block_and_fold() {
        assert_eq!(
            layout_kinds("let f x.\n  return x\nlet g = 1"),
            vec![
                LetKeyword,
                Identifier("f".into()),
                Identifier("x".into()),
                BlockStart,
                ReturnKeyword,
                Identifier("x".into()),
                LineFoldEnd,
                BlockEnd,
                LineFoldEnd,
                LetKeyword,
                Identifier("g".into()),
                Equals,
                IntegerLiteral(1),
                LineFoldEnd,
                EndOfFile,
            ]
        );
    }
}
