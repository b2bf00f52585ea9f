//! The expression grammar: a Pratt parser over the built-in operator table,
//! with juxtaposition calls and postfix member access.

use bolt_common::token::TokenKind;

use crate::cst::{
    IfPart, LitValue, Member, Name, NodeId, NodeKind, RecordExprField,
};
use crate::parser::Parser;

/// Left/right binding powers of an infix operator, keyed by its leading
/// character. This is the built-in precedence table; user-defined tables
/// are out of scope.
fn infix_binding_power(op: &str) -> (u8, u8) {
    match op.chars().next() {
        Some('$') => (1, 2),
        Some('&') | Some('|') => (3, 4),
        Some('=') | Some('<') | Some('>') | Some('!') => (5, 6),
        Some('+') | Some('-') => (7, 8),
        Some('*') | Some('/') | Some('%') => (9, 10),
        Some('^') => (11, 12),
        _ => (5, 6),
    }
}

impl Parser {
    /// Whether the current token can start an expression.
    pub(crate) fn at_expression_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Identifier(_)
                | TokenKind::IdentifierAlt(_)
                | TokenKind::IntegerLiteral(_)
                | TokenKind::StringLiteral(_)
                | TokenKind::LParen
                | TokenKind::LBrace
                | TokenKind::MatchKeyword
                | TokenKind::DoKeyword
                | TokenKind::IfKeyword
                | TokenKind::FnKeyword
                | TokenKind::ReturnKeyword
                | TokenKind::CustomOperator(_)
        )
    }

    /// Whether the current token can start a call argument. Tighter than
    /// [`Self::at_expression_start`]: arguments are atoms.
    fn at_argument_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Identifier(_)
                | TokenKind::IdentifierAlt(_)
                | TokenKind::IntegerLiteral(_)
                | TokenKind::StringLiteral(_)
                | TokenKind::LParen
                | TokenKind::LBrace
        )
    }

    pub(crate) fn parse_expression(&mut self) -> Option<NodeId> {
        self.parse_infix_expr(0)
    }

    fn parse_infix_expr(&mut self, min_bp: u8) -> Option<NodeId> {
        let start = self.start_loc();
        let mut lhs = self.parse_unary_expr()?;
        loop {
            let (text, l_bp, r_bp) = match &self.peek().kind {
                TokenKind::CustomOperator(text) => {
                    let (l, r) = infix_binding_power(text);
                    (text.clone(), l, r)
                }
                _ => break,
            };
            if l_bp < min_bp {
                break;
            }
            let op = Name::new(text, self.peek().range);
            self.bump();
            let rhs = self.parse_infix_expr(r_bp)?;
            lhs = self.alloc(
                NodeKind::InfixExpr {
                    left: lhs,
                    op,
                    right: rhs,
                },
                start,
            );
        }
        Some(lhs)
    }

    fn parse_unary_expr(&mut self) -> Option<NodeId> {
        if let TokenKind::CustomOperator(text) = &self.peek().kind {
            let start = self.start_loc();
            let op = Name::new(text.clone(), self.peek().range);
            self.bump();
            let arg = self.parse_unary_expr()?;
            return Some(self.alloc(NodeKind::PrefixExpr { op, arg }, start));
        }
        self.parse_call_expr()
    }

    fn parse_call_expr(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        let callee = self.parse_postfix_expr()?;
        let mut args = Vec::new();
        while self.at_argument_start() {
            if self.scrutinee_guard > 0 && self.upcoming_match_case() {
                break;
            }
            args.push(self.parse_postfix_expr()?);
        }
        if args.is_empty() {
            Some(callee)
        } else {
            Some(self.alloc(NodeKind::CallExpr { callee, args }, start))
        }
    }

    /// True when the tokens ahead form `pattern ->` within the current
    /// fold, i.e. an inline match case rather than further call arguments.
    fn upcoming_match_case(&self) -> bool {
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
                TokenKind::RArrow if depth == 0 => return true,
                TokenKind::LineFoldEnd
                | TokenKind::BlockStart
                | TokenKind::BlockEnd
                | TokenKind::EndOfFile => return false,
                _ => {}
            }
            n += 1;
        }
    }

    fn parse_postfix_expr(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        let mut expr = self.parse_primary_expr()?;
        loop {
            if !self.at(&TokenKind::Dot) {
                break;
            }
            match &self.nth(1).kind {
                TokenKind::Identifier(text) => {
                    let name = Name::new(text.clone(), self.nth(1).range);
                    self.bump();
                    self.bump();
                    expr = self.alloc(
                        NodeKind::MemberExpr {
                            expr,
                            member: Member::Field(name),
                        },
                        start,
                    );
                }
                TokenKind::IntegerLiteral(value) => {
                    let value = *value;
                    let range = self.nth(1).range;
                    self.bump();
                    self.bump();
                    expr = self.alloc(
                        NodeKind::MemberExpr {
                            expr,
                            member: Member::Index(value, range),
                        },
                        start,
                    );
                }
                _ => break,
            }
        }
        Some(expr)
    }

    fn parse_primary_expr(&mut self) -> Option<NodeId> {
        let annotations = self.parse_annotations();
        let start = self.start_loc();
        let expr = match self.peek().kind.clone() {
            TokenKind::Identifier(text) => {
                let name = Name::new(text, self.peek().range);
                self.bump();
                Some(self.alloc(
                    NodeKind::ReferenceExpr {
                        modules: Vec::new(),
                        name,
                    },
                    start,
                ))
            }
            TokenKind::IdentifierAlt(text) => {
                // Leading `A.` pairs form a module path; the final segment
                // is the referenced name.
                let mut modules = Vec::new();
                let mut name = Name::new(text, self.peek().range);
                self.bump();
                while self.at(&TokenKind::Dot) {
                    if let TokenKind::IdentifierAlt(next) = self.nth(1).kind.clone() {
                        modules.push(name);
                        name = Name::new(next, self.nth(1).range);
                        self.bump();
                        self.bump();
                    } else {
                        break;
                    }
                }
                Some(self.alloc(NodeKind::ReferenceExpr { modules, name }, start))
            }
            TokenKind::IntegerLiteral(value) => {
                self.bump();
                Some(self.alloc(
                    NodeKind::LiteralExpr {
                        value: LitValue::Int(value),
                    },
                    start,
                ))
            }
            TokenKind::StringLiteral(text) => {
                self.bump();
                Some(self.alloc(
                    NodeKind::LiteralExpr {
                        value: LitValue::Str(text),
                    },
                    start,
                ))
            }
            TokenKind::LParen => self.parse_paren_expr(),
            TokenKind::LBrace => self.parse_record_expr(),
            TokenKind::MatchKeyword => self.parse_match_expr(),
            TokenKind::DoKeyword => {
                self.bump();
                if !self.expect(&TokenKind::BlockStart) {
                    return None;
                }
                let elements = self.parse_block_elements();
                Some(self.alloc(NodeKind::BlockExpr { elements }, start))
            }
            TokenKind::IfKeyword => self.parse_if_expr(),
            TokenKind::FnKeyword => self.parse_fn_expr(),
            TokenKind::ReturnKeyword => {
                self.bump();
                let value = if self.at_expression_start() {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                Some(self.alloc(NodeKind::ReturnExpr { value }, start))
            }
            _ => {
                self.unexpected_token(&["expression".to_string()]);
                None
            }
        };
        if let Some(expr) = expr {
            self.module.attach_annotations(expr, annotations);
        }
        expr
    }

    fn parse_paren_expr(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        self.bump(); // (
        if self.eat(&TokenKind::RParen) {
            return Some(self.alloc(
                NodeKind::TupleExpr {
                    elements: Vec::new(),
                },
                start,
            ));
        }
        let mut elements = Vec::new();
        let mut saw_comma = false;
        loop {
            let element = self.parse_expression()?;
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
            Some(self.alloc(NodeKind::NestedExpr { inner }, start))
        } else {
            Some(self.alloc(NodeKind::TupleExpr { elements }, start))
        }
    }

    fn parse_record_expr(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        self.bump(); // {
        let mut fields = Vec::new();
        if !self.eat(&TokenKind::RBrace) {
            loop {
                let name = self.expect_lower_name()?;
                if !self.expect(&TokenKind::Equals) {
                    return None;
                }
                let value = self.parse_expression()?;
                fields.push(RecordExprField { name, value });
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
        }
        Some(self.alloc(NodeKind::RecordExpr { fields }, start))
    }

    fn parse_match_expr(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        self.bump(); // match
        let scrutinee = if self.at(&TokenKind::BlockStart) {
            None
        } else {
            self.scrutinee_guard += 1;
            let scrutinee = self.parse_expression();
            self.scrutinee_guard -= 1;
            Some(scrutinee?)
        };
        let mut cases = Vec::new();
        if self.eat(&TokenKind::BlockStart) {
            loop {
                match &self.peek().kind {
                    TokenKind::BlockEnd => {
                        self.bump();
                        break;
                    }
                    TokenKind::EndOfFile => break,
                    TokenKind::LineFoldEnd => {
                        self.bump();
                    }
                    _ => match self.parse_match_case() {
                        Some(case) => {
                            cases.push(case);
                            self.check_line_fold_end();
                        }
                        None => self.skip_past_line_fold_end(),
                    },
                }
            }
        } else {
            // Inline form: a single case in the enclosing fold.
            cases.push(self.parse_match_case()?);
        }
        Some(self.alloc(NodeKind::MatchExpr { scrutinee, cases }, start))
    }

    fn parse_match_case(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        let pattern = self.parse_wide_pattern()?;
        if !self.expect(&TokenKind::RArrow) {
            return None;
        }
        let expr = self.parse_expression()?;
        Some(self.alloc(NodeKind::MatchCase { pattern, expr }, start))
    }

    fn parse_if_expr(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        self.bump(); // if
        let mut parts = Vec::new();
        let test = self.parse_expression()?;
        if !self.expect(&TokenKind::ThenKeyword) {
            return None;
        }
        let body = self.parse_expression()?;
        parts.push(IfPart {
            test: Some(test),
            body,
        });
        while self.eat(&TokenKind::ElifKeyword) {
            let test = self.parse_expression()?;
            if !self.expect(&TokenKind::ThenKeyword) {
                return None;
            }
            let body = self.parse_expression()?;
            parts.push(IfPart {
                test: Some(test),
                body,
            });
        }
        if self.eat(&TokenKind::ElseKeyword) {
            let body = self.parse_expression()?;
            parts.push(IfPart { test: None, body });
        } else {
            self.unexpected_token(&[TokenKind::ElseKeyword.describe()]);
        }
        Some(self.alloc(NodeKind::IfExpr { parts }, start))
    }

    fn parse_fn_expr(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        self.bump(); // fn
        let mut params = Vec::new();
        while self.at_pattern_start() {
            params.push(self.parse_narrow_pattern()?);
        }
        if !self.expect(&TokenKind::RArrow) {
            return None;
        }
        let body = self.parse_expression()?;
        Some(self.alloc(NodeKind::FnExpr { params, body }, start))
    }
}
