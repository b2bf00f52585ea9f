//! Pattern parsing.
//!
//! "Narrow" patterns are atoms (binds, literals, tuples, lists, records,
//! bare constructors); "wide" patterns additionally allow constructor
//! application without parentheses (`Just x`), which is only unambiguous
//! in match cases and similar closed positions.

use bolt_common::token::TokenKind;

use crate::cst::{LitValue, Name, NodeId, NodeKind, RecordPatField};
use crate::parser::Parser;

impl Parser {
    /// Whether the current token can start a (narrow) pattern.
    pub(crate) fn at_pattern_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Identifier(_)
                | TokenKind::IdentifierAlt(_)
                | TokenKind::IntegerLiteral(_)
                | TokenKind::StringLiteral(_)
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
        )
    }

    /// Parse a pattern that may apply a constructor to arguments.
    pub(crate) fn parse_wide_pattern(&mut self) -> Option<NodeId> {
        if let TokenKind::IdentifierAlt(text) = self.peek().kind.clone() {
            let start = self.start_loc();
            let name = Name::new(text, self.peek().range);
            self.bump();
            if self.at(&TokenKind::LBrace) {
                let fields = self.parse_record_pat_fields()?;
                return Some(self.alloc(NodeKind::NamedRecordPat { name, fields }, start));
            }
            let mut args = Vec::new();
            while self.at_pattern_start() {
                args.push(self.parse_narrow_pattern()?);
            }
            return Some(self.alloc(NodeKind::NamedTuplePat { name, args }, start));
        }
        self.parse_narrow_pattern()
    }

    /// Parse a pattern atom.
    pub(crate) fn parse_narrow_pattern(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        match self.peek().kind.clone() {
            TokenKind::Identifier(text) => {
                let name = Name::new(text, self.peek().range);
                self.bump();
                Some(self.alloc(NodeKind::BindPat { name }, start))
            }
            TokenKind::IdentifierAlt(text) => {
                let name = Name::new(text, self.peek().range);
                self.bump();
                if self.at(&TokenKind::LBrace) {
                    let fields = self.parse_record_pat_fields()?;
                    Some(self.alloc(NodeKind::NamedRecordPat { name, fields }, start))
                } else {
                    // A bare constructor: application with zero arguments.
                    Some(self.alloc(
                        NodeKind::NamedTuplePat {
                            name,
                            args: Vec::new(),
                        },
                        start,
                    ))
                }
            }
            TokenKind::IntegerLiteral(value) => {
                self.bump();
                Some(self.alloc(
                    NodeKind::LiteralPat {
                        value: LitValue::Int(value),
                    },
                    start,
                ))
            }
            TokenKind::StringLiteral(text) => {
                self.bump();
                Some(self.alloc(
                    NodeKind::LiteralPat {
                        value: LitValue::Str(text),
                    },
                    start,
                ))
            }
            TokenKind::LParen => self.parse_paren_pattern(),
            TokenKind::LBracket => self.parse_list_pattern(),
            TokenKind::LBrace => {
                let fields = self.parse_record_pat_fields()?;
                Some(self.alloc(NodeKind::RecordPat { fields }, start))
            }
            _ => {
                self.unexpected_token(&["pattern".to_string()]);
                None
            }
        }
    }

    fn parse_paren_pattern(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        self.bump(); // (
        if self.eat(&TokenKind::RParen) {
            return Some(self.alloc(
                NodeKind::TuplePat {
                    elements: Vec::new(),
                },
                start,
            ));
        }
        let mut elements = Vec::new();
        let mut saw_comma = false;
        loop {
            let element = self.parse_wide_pattern()?;
            elements.push(element);
            if self.eat(&TokenKind::Comma) {
                saw_comma = true;
                continue;
            }
            if self.eat(&TokenKind::RParen) {
                break;
            }
            self.unexpected_token(&[
                TokenKind::RParen.describe(),
                TokenKind::Comma.describe(),
            ]);
            return None;
        }
        if elements.len() == 1 && !saw_comma {
            let inner = elements[0];
            Some(self.alloc(NodeKind::NestedPat { inner }, start))
        } else {
            Some(self.alloc(NodeKind::TuplePat { elements }, start))
        }
    }

    fn parse_list_pattern(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        self.bump(); // [
        let mut elements = Vec::new();
        if !self.eat(&TokenKind::RBracket) {
            loop {
                let element = self.parse_wide_pattern()?;
                elements.push(element);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                if self.eat(&TokenKind::RBracket) {
                    break;
                }
                self.unexpected_token(&[
                    TokenKind::RBracket.describe(),
                    TokenKind::Comma.describe(),
                ]);
                return None;
            }
        }
        Some(self.alloc(NodeKind::ListPat { elements }, start))
    }

    /// Parse `{ field, field = pat, .., ..pat }` including the braces.
    fn parse_record_pat_fields(&mut self) -> Option<Vec<RecordPatField>> {
        self.bump(); // {
        let mut fields = Vec::new();
        if self.eat(&TokenKind::RBrace) {
            return Some(fields);
        }
        loop {
            if self.eat(&TokenKind::DotDot) {
                let pattern = if self.at_pattern_start() {
                    Some(self.parse_narrow_pattern()?)
                } else {
                    None
                };
                fields.push(RecordPatField {
                    dotdot: true,
                    name: None,
                    pattern,
                });
            } else {
                let name = self.expect_lower_name()?;
                let pattern = if self.eat(&TokenKind::Equals) {
                    Some(self.parse_wide_pattern()?)
                } else {
                    None
                };
                fields.push(RecordPatField {
                    dotdot: false,
                    name: Some(name),
                    pattern,
                });
            }
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            self.unexpected_token(&[
                TokenKind::RBrace.describe(),
                TokenKind::Comma.describe(),
            ]);
            return None;
        }
        Some(fields)
    }
}
