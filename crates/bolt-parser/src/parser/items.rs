//! Declarations, statements, and the source file itself.

use bolt_common::token::TokenKind;

use crate::cst::{
    Fixity, LetBody, LetDecl, Name, NodeId, NodeKind, TypedField, VariantMember,
};
use crate::parser::Parser;

impl Parser {
    /// Parse a whole source file into the module arena; returns the root.
    pub(crate) fn parse_source_file(&mut self) -> NodeId {
        let start = self.start_loc();
        let mut elements = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::EndOfFile => break,
                // Stray layout tokens can be left behind by recovery.
                TokenKind::LineFoldEnd | TokenKind::BlockEnd | TokenKind::BlockStart => {
                    self.bump();
                }
                _ => {
                    if let Some(element) = self.parse_element() {
                        elements.push(element);
                    }
                }
            }
        }
        let root = self.alloc(NodeKind::SourceFile { elements }, start);
        self.module.set_root(root);
        root
    }

    /// Parse one statement or declaration (top level or inside a block).
    pub(crate) fn parse_element(&mut self) -> Option<NodeId> {
        let annotations = self.parse_annotations();
        let element = match &self.peek().kind {
            TokenKind::LetKeyword | TokenKind::PubKeyword | TokenKind::ForeignKeyword => {
                self.parse_let_decl()
            }
            TokenKind::StructKeyword => self.parse_record_decl(),
            TokenKind::EnumKeyword => self.parse_variant_decl(),
            TokenKind::ClassKeyword => self.parse_class_decl(),
            TokenKind::InstanceKeyword => self.parse_instance_decl(),
            TokenKind::ReturnKeyword => {
                let start = self.start_loc();
                self.bump();
                let value = if self.at_expression_start() {
                    self.parse_expression()
                } else {
                    None
                };
                let node = self.alloc(NodeKind::ReturnExpr { value }, start);
                self.check_line_fold_end();
                Some(node)
            }
            _ => {
                let expr = self.parse_expression();
                match expr {
                    Some(expr) => {
                        self.check_line_fold_end();
                        Some(expr)
                    }
                    None => {
                        self.skip_past_line_fold_end();
                        None
                    }
                }
            }
        };
        if let Some(element) = element {
            self.module.attach_annotations(element, annotations);
        }
        element
    }

    // ── Let declarations ───────────────────────────────────────────────

    fn parse_let_decl(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        let is_pub = self.eat(&TokenKind::PubKeyword);
        let is_foreign = self.eat(&TokenKind::ForeignKeyword);
        if !self.expect(&TokenKind::LetKeyword) {
            self.skip_past_line_fold_end();
            return None;
        }
        let is_mut = self.eat(&TokenKind::MutKeyword);

        let Some((fixity, pattern, mut params)) = self.parse_let_head() else {
            self.skip_past_line_fold_end();
            return None;
        };

        if fixity == Fixity::Named && matches!(self.module.kind(pattern), NodeKind::BindPat { .. })
        {
            while self.at_pattern_start() {
                match self.parse_narrow_pattern() {
                    Some(param) => params.push(param),
                    None => {
                        self.skip_past_line_fold_end();
                        return None;
                    }
                }
            }
        }

        let type_assert = if self.eat(&TokenKind::Colon) {
            match self.parse_type_expr() {
                Some(ty) => Some(ty),
                None => {
                    self.skip_past_line_fold_end();
                    return None;
                }
            }
        } else {
            None
        };

        let body = if self.eat(&TokenKind::Equals) {
            match self.parse_expression() {
                Some(expr) => Some(LetBody::Expr(expr)),
                None => {
                    self.skip_past_line_fold_end();
                    return None;
                }
            }
        } else if self.eat(&TokenKind::BlockStart) {
            Some(LetBody::Block(self.parse_block_elements()))
        } else {
            None
        };

        let node = self.alloc(
            NodeKind::LetDecl(LetDecl {
                is_pub,
                is_foreign,
                is_mut,
                fixity,
                pattern,
                params,
                type_assert,
                body,
            }),
            start,
        );
        self.check_line_fold_end();
        Some(node)
    }

    /// Parse the head of a `let`: the name slot and any fixity parameters.
    ///
    /// `let ! x`, `let x + y`, and `let x !` declare prefix, infix, and
    /// suffix operators; anything else is a named declaration (or a
    /// variable, decided later from the overall shape).
    fn parse_let_head(&mut self) -> Option<(Fixity, NodeId, Vec<NodeId>)> {
        if let TokenKind::CustomOperator(text) = &self.peek().kind {
            let name = Name::new(text.clone(), self.peek().range);
            let start = self.start_loc();
            self.bump();
            let pattern = self.alloc(NodeKind::BindPat { name }, start);
            let param = self.parse_narrow_pattern()?;
            return Some((Fixity::Prefix, pattern, vec![param]));
        }

        let first = self.parse_narrow_pattern()?;
        if let TokenKind::CustomOperator(text) = &self.peek().kind {
            let name = Name::new(text.clone(), self.peek().range);
            let start = self.start_loc();
            self.bump();
            let pattern = self.alloc(NodeKind::BindPat { name }, start);
            if self.at_pattern_start() {
                let second = self.parse_narrow_pattern()?;
                return Some((Fixity::Infix, pattern, vec![first, second]));
            }
            return Some((Fixity::Suffix, pattern, vec![first]));
        }

        Some((Fixity::Named, first, Vec::new()))
    }

    /// Parse statements until the matching `BlockEnd`.
    pub(crate) fn parse_block_elements(&mut self) -> Vec<NodeId> {
        let mut elements = Vec::new();
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
                _ => {
                    if let Some(element) = self.parse_element() {
                        elements.push(element);
                    }
                }
            }
        }
        elements
    }

    // ── Type declarations ──────────────────────────────────────────────

    fn parse_record_decl(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        self.bump(); // struct
        let name = self.expect_upper_name()?;
        let ty_vars = self.parse_ty_var_names();
        let mut fields = Vec::new();
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
                    _ => match self.parse_typed_field() {
                        Some(field) => {
                            fields.push(field);
                            self.check_line_fold_end();
                        }
                        None => self.skip_past_line_fold_end(),
                    },
                }
            }
        }
        let node = self.alloc(NodeKind::RecordDecl { name, ty_vars, fields }, start);
        self.check_line_fold_end();
        Some(node)
    }

    fn parse_typed_field(&mut self) -> Option<TypedField> {
        let name = self.expect_lower_name()?;
        if !self.expect(&TokenKind::Colon) {
            return None;
        }
        let ty = self.parse_type_expr()?;
        Some(TypedField { name, ty })
    }

    fn parse_variant_decl(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        self.bump(); // enum
        let name = self.expect_upper_name()?;
        let ty_vars = self.parse_ty_var_names();
        let mut members = Vec::new();
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
                    _ => {
                        match self.expect_upper_name() {
                            Some(member_name) => {
                                let mut elements = Vec::new();
                                while self.at_type_atom_start() {
                                    match self.parse_primitive_type_expr() {
                                        Some(ty) => elements.push(ty),
                                        None => break,
                                    }
                                }
                                members.push(VariantMember {
                                    name: member_name,
                                    elements,
                                });
                                self.check_line_fold_end();
                            }
                            None => self.skip_past_line_fold_end(),
                        }
                    }
                }
            }
        }
        let node = self.alloc(NodeKind::VariantDecl { name, ty_vars, members }, start);
        self.check_line_fold_end();
        Some(node)
    }

    fn parse_class_decl(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        self.bump(); // class
        let name = self.expect_upper_name()?;
        let ty_vars = self.parse_ty_var_names();
        let mut elements = Vec::new();
        if self.eat(&TokenKind::BlockStart) {
            elements = self.parse_block_elements();
        }
        let node = self.alloc(NodeKind::ClassDecl { name, ty_vars, elements }, start);
        self.check_line_fold_end();
        Some(node)
    }

    fn parse_instance_decl(&mut self) -> Option<NodeId> {
        let start = self.start_loc();
        self.bump(); // instance
        let name = self.expect_upper_name()?;
        let mut ty_exprs = Vec::new();
        while self.at_type_atom_start() {
            match self.parse_primitive_type_expr() {
                Some(ty) => ty_exprs.push(ty),
                None => break,
            }
        }
        let mut elements = Vec::new();
        if self.eat(&TokenKind::BlockStart) {
            elements = self.parse_block_elements();
        }
        let node = self.alloc(
            NodeKind::InstanceDecl {
                name,
                ty_exprs,
                elements,
            },
            start,
        );
        self.check_line_fold_end();
        Some(node)
    }

    // ── Name helpers ───────────────────────────────────────────────────

    pub(crate) fn parse_ty_var_names(&mut self) -> Vec<Name> {
        let mut names = Vec::new();
        while let TokenKind::Identifier(text) = &self.peek().kind {
            names.push(Name::new(text.clone(), self.peek().range));
            self.bump();
        }
        names
    }

    pub(crate) fn expect_lower_name(&mut self) -> Option<Name> {
        if let TokenKind::Identifier(text) = &self.peek().kind {
            let name = Name::new(text.clone(), self.peek().range);
            self.bump();
            Some(name)
        } else {
            self.unexpected_token(&["identifier".to_string()]);
            None
        }
    }

    pub(crate) fn expect_upper_name(&mut self) -> Option<Name> {
        if let TokenKind::IdentifierAlt(text) = &self.peek().kind {
            let name = Name::new(text.clone(), self.peek().range);
            self.bump();
            Some(name)
        } else {
            self.unexpected_token(&["capitalized identifier".to_string()]);
            None
        }
    }
}
