//! Type expressions and constraint lists.

use bolt_common::token::TokenKind;

use crate::cst::{NodeId, NodeKind, TypedField};
use crate::parser::Parser;

impl Parser {
    /// Whether the current token can start a primitive type expression.
    pub(crate) fn at_type_atom_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Identifier(_)
                | TokenKind::IdentifierAlt(_)
                | TokenKind::LParen
                | TokenKind::LBrace
        )
    }

    /// Parse a full type expression, including an optional qualification
    /// prefix (`constraints => type`).
    pub(crate) fn parse_type_expr(&mut self) -> Option<NodeId> {
        if self.upcoming_qualification() {
            return self.parse_qualified_type_expr();
        }
        self.parse_arrow_type_expr()
    }

    /// True when a depth-0 `=>` lies ahead in this type position.
    fn upcoming_qualification(&self) -> bool {
        let mut depth = 0u32;
        let mut n = 0;
        loop {
            match &self.nth(n).kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if depth == 0 {
                        return false;
                    }
                    depth -= 1;
                }
                TokenKind::RArrowAlt if depth == 0 => return true,
                TokenKind::Comma | TokenKind::VBar | TokenKind::Equals if depth == 0 => {
                    return false
                }
                TokenKind::LineFoldEnd
                | TokenKind::BlockStart
                | TokenKind::BlockEnd
                | TokenKind::EndOfFile => return false,
                _ => {}
            }
            n += 1;
        }
    }

    fn parse_qualified_type_expr(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        let mut constraints = Vec::new();
        if self.at(&TokenKind::LParen) {
            self.bump();
            if !self.eat(&TokenKind::RParen) {
                loop {
                    constraints.push(self.parse_constraint_expr()?);
                    if self.eat(&TokenKind::Comma) {
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
            }
        } else {
            constraints.push(self.parse_constraint_expr()?);
        }
        if !self.expect(&TokenKind::RArrowAlt) {
            return None;
        }
        let body = self.parse_arrow_type_expr()?;
        Some(self.alloc(NodeKind::QualifiedTypeExpr { constraints, body }, start))
    }

    /// Parse a single constraint: `Class a b` or `left ~ right`.
    fn parse_constraint_expr(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        let first = self.parse_app_type_expr()?;
        if self.eat(&TokenKind::Tilde) {
            let right = self.parse_app_type_expr()?;
            return Some(self.alloc(
                NodeKind::EqualityConstraint { left: first, right },
                start,
            ));
        }
        // Reinterpret the parsed application as a class constraint head.
        match self.module.kind(first).clone() {
            NodeKind::AppTypeExpr { op, args } => match self.module.kind(op) {
                NodeKind::RefTypeExpr { name } => {
                    let name = name.clone();
                    Some(self.alloc(NodeKind::ClassConstraint { name, args }, start))
                }
                _ => {
                    self.unexpected_token(&["class constraint".to_string()]);
                    None
                }
            },
            NodeKind::RefTypeExpr { name } => Some(self.alloc(
                NodeKind::ClassConstraint {
                    name,
                    args: Vec::new(),
                },
                start,
            )),
            _ => {
                self.unexpected_token(&["class constraint".to_string()]);
                None
            }
        }
    }

    fn parse_arrow_type_expr(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        let mut types = vec![self.parse_app_type_expr()?];
        while self.eat(&TokenKind::RArrow) {
            types.push(self.parse_app_type_expr()?);
        }
        if types.len() == 1 {
            return Some(types.pop().unwrap());
        }
        let ret = types.pop().unwrap();
        Some(self.alloc(
            NodeKind::ArrowTypeExpr { params: types, ret },
            start,
        ))
    }

    fn parse_app_type_expr(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        let op = self.parse_primitive_type_expr()?;
        let mut args = Vec::new();
        while self.at_type_atom_start() {
            args.push(self.parse_primitive_type_expr()?);
        }
        if args.is_empty() {
            Some(op)
        } else {
            Some(self.alloc(NodeKind::AppTypeExpr { op, args }, start))
        }
    }

    pub(crate) fn parse_primitive_type_expr(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        match self.peek().kind.clone() {
            TokenKind::IdentifierAlt(text) => {
                let name = crate::cst::Name::new(text, self.peek().range);
                self.bump();
                Some(self.alloc(NodeKind::RefTypeExpr { name }, start))
            }
            TokenKind::Identifier(text) => {
                let name = crate::cst::Name::new(text, self.peek().range);
                self.bump();
                Some(self.alloc(NodeKind::VarTypeExpr { name }, start))
            }
            TokenKind::LParen => {
                self.bump();
                if self.eat(&TokenKind::RParen) {
                    return Some(self.alloc(
                        NodeKind::TupleTypeExpr {
                            elements: Vec::new(),
                        },
                        start,
                    ));
                }
                let mut elements = Vec::new();
                let mut saw_comma = false;
                loop {
                    elements.push(self.parse_type_expr()?);
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
                    Some(self.alloc(NodeKind::NestedTypeExpr { inner }, start))
                } else {
                    Some(self.alloc(NodeKind::TupleTypeExpr { elements }, start))
                }
            }
            TokenKind::LBrace => {
                self.bump();
                let mut fields: Vec<TypedField> = Vec::new();
                let mut rest = None;
                if !self.eat(&TokenKind::RBrace) {
                    loop {
                        if self.eat(&TokenKind::VBar) {
                            rest = Some(self.parse_type_expr()?);
                            if !self.expect(&TokenKind::RBrace) {
                                return None;
                            }
                            break;
                        }
                        let name = self.expect_lower_name()?;
                        if !self.expect(&TokenKind::Colon) {
                            return None;
                        }
                        let ty = self.parse_type_expr()?;
                        fields.push(TypedField { name, ty });
                        if self.eat(&TokenKind::Comma) {
                            continue;
                        }
                        if self.eat(&TokenKind::VBar) {
                            rest = Some(self.parse_type_expr()?);
                            if !self.expect(&TokenKind::RBrace) {
                                return None;
                            }
                            break;
                        }
                        if self.eat(&TokenKind::RBrace) {
                            break;
                        }
                        self.unexpected_token(&[
                            TokenKind::RBrace.describe(),
                            TokenKind::Comma.describe(),
                            TokenKind::VBar.describe(),
                        ]);
                        return None;
                    }
                }
                Some(self.alloc(NodeKind::RecordTypeExpr { fields, rest }, start))
            }
            _ => {
                self.unexpected_token(&["type expression".to_string()]);
                None
            }
        }
    }
}
