//! Recursive-descent parser over the punctuated token stream.
//!
//! The parser is split by syntactic category:
//!
//! - [`items`]: source files, declarations, statements
//! - [`expressions`]: the Pratt expression grammar
//! - [`patterns`]: narrow and wide (constructor-applying) patterns
//! - [`types`]: type expressions and constraint lists
//!
//! Errors are accumulated as diagnostics; recovery skips to the end of the
//! current line fold (tracking nested blocks), so one bad statement never
//! takes down the rest of the file.

pub(crate) mod expressions;
pub(crate) mod items;
pub(crate) mod patterns;
pub(crate) mod types;

use bolt_common::diagnostics::{codes, Diagnostic};
use bolt_common::text::{TextLoc, TextRange};
use bolt_common::token::{Token, TokenKind};

use crate::cst::{Annotation, AnnotationKind, NodeId, NodeKind, SourceModule};

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// End position of the most recently consumed token.
    prev_end: TextLoc,
    pub(crate) module: SourceModule,
    pub(crate) diagnostics: Vec<Diagnostic>,
    additional_syntax: bool,
    /// Non-zero while parsing the scrutinee of an inline (block-less)
    /// match, where a depth-0 `->` ahead signals the start of a case.
    pub(crate) scrutinee_guard: u32,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>, additional_syntax: bool) -> Self {
        Self {
            tokens,
            pos: 0,
            prev_end: TextLoc::new(1, 1),
            module: SourceModule::new(),
            diagnostics: Vec::new(),
            additional_syntax,
            scrutinee_guard: 0,
        }
    }

    // ── Token access ───────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        self.nth(0)
    }

    pub(crate) fn nth(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    pub(crate) fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        self.prev_end = token.range.end;
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn at(&self, kind: &TokenKind) -> bool {
        self.peek().kind == *kind
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume `kind` or report an unexpected-token diagnostic.
    pub(crate) fn expect(&mut self, kind: &TokenKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.unexpected_token(&[kind.describe()]);
            false
        }
    }

    pub(crate) fn start_loc(&self) -> TextLoc {
        self.peek().range.start
    }

    /// Range from `start` to the end of the last consumed token.
    pub(crate) fn finish_range(&self, start: TextLoc) -> TextRange {
        TextRange::new(start, self.prev_end.max(start))
    }

    // ── Diagnostics and recovery ───────────────────────────────────────

    pub(crate) fn unexpected_token(&mut self, expected: &[String]) {
        let found = self.peek();
        let message = if expected.is_empty() {
            format!("unexpected {}", found.kind.describe())
        } else {
            format!(
                "expected {}, found {}",
                expected.join(" or "),
                found.kind.describe()
            )
        };
        let range = found.range;
        self.diagnostics.push(
            Diagnostic::error(codes::UNEXPECTED_TOKEN, message)
                .with_range(range)
                .with_label(range, "unexpected token here"),
        );
    }

    /// Skip tokens until the end of the current line fold, consuming it.
    /// Nested blocks are skipped whole.
    pub(crate) fn skip_past_line_fold_end(&mut self) {
        let mut depth = 0u32;
        loop {
            match &self.peek().kind {
                TokenKind::EndOfFile => break,
                TokenKind::BlockStart => {
                    depth += 1;
                    self.bump();
                }
                TokenKind::BlockEnd => {
                    if depth == 0 {
                        // The enclosing block's end; leave it for the caller.
                        break;
                    }
                    depth -= 1;
                    self.bump();
                }
                TokenKind::LineFoldEnd => {
                    self.bump();
                    if depth == 0 {
                        break;
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Expect the end of the current line fold; recover by skipping to it.
    pub(crate) fn check_line_fold_end(&mut self) {
        if self.eat(&TokenKind::LineFoldEnd) {
            return;
        }
        self.unexpected_token(&[TokenKind::LineFoldEnd.describe()]);
        self.skip_past_line_fold_end();
    }

    // ── Annotations ────────────────────────────────────────────────────

    /// Parse leading `@` annotations, if any.
    ///
    /// `@: T` asserts the type of the annotated expression; any other
    /// `@expr` form occupies its own line fold and attaches to the next
    /// element.
    pub(crate) fn parse_annotations(&mut self) -> Vec<Annotation> {
        let mut annotations = Vec::new();
        while self.at(&TokenKind::At) {
            if !self.additional_syntax {
                self.unexpected_token(&[]);
            }
            let start = self.start_loc();
            self.bump();
            if self.eat(&TokenKind::Colon) {
                if let Some(ty) = self.parse_primitive_type_expr() {
                    annotations.push(Annotation {
                        range: self.finish_range(start),
                        kind: AnnotationKind::TypeAssert(ty),
                    });
                }
            } else if let Some(expr) = self.parse_expression() {
                self.check_line_fold_end();
                annotations.push(Annotation {
                    range: self.finish_range(start),
                    kind: AnnotationKind::Expr(expr),
                });
            } else {
                self.skip_past_line_fold_end();
            }
        }
        annotations
    }

    // ── Node construction ──────────────────────────────────────────────

    pub(crate) fn alloc(&mut self, kind: NodeKind, start: TextLoc) -> NodeId {
        let range = self.finish_range(start);
        self.module.alloc(kind, range)
    }
}
