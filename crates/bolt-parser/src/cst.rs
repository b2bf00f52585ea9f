//! The concrete syntax tree.
//!
//! All nodes of a source file live in one arena ([`SourceModule`]) and refer
//! to each other through [`NodeId`] indices. Parent links are wired by
//! [`SourceModule::set_parents`] after parsing; scopes, inferred types, and
//! diagnostics all key off `NodeId`, so the tree itself stays immutable
//! once built.

use rustc_hash::FxHashMap;

use bolt_common::text::TextRange;

/// Index of a node in its module's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An identifier occurrence: its text and where it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub text: String,
    pub range: TextRange,
}

impl Name {
    pub fn new(text: impl Into<String>, range: TextRange) -> Self {
        Self {
            text: text.into(),
            range,
        }
    }
}

/// A literal value (shared by literal expressions and literal patterns).
#[derive(Debug, Clone, PartialEq)]
pub enum LitValue {
    Int(i64),
    Str(String),
}

/// The member slot of a member expression: `expr.name` or `expr.0`.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field(Name),
    /// Integer tuple index with the range of the index token.
    Index(i64, TextRange),
}

/// Fixity of a function declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixity {
    Named,
    Prefix,
    Infix,
    Suffix,
}

/// Body of a `let` declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum LetBody {
    /// `= expr`
    Expr(NodeId),
    /// An indented block of statements.
    Block(Vec<NodeId>),
}

/// A `let` declaration: a variable binding or a function definition.
///
/// The `pattern` slot is the name slot for functions (always a `BindPat`,
/// with the operator text as the name for operator fixities) and the bound
/// pattern for variables.
#[derive(Debug, Clone, PartialEq)]
pub struct LetDecl {
    pub is_pub: bool,
    pub is_foreign: bool,
    pub is_mut: bool,
    pub fixity: Fixity,
    pub pattern: NodeId,
    pub params: Vec<NodeId>,
    pub type_assert: Option<NodeId>,
    pub body: Option<LetBody>,
}


/// One field of a record expression: `name = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordExprField {
    pub name: Name,
    pub value: NodeId,
}

/// One field of a record pattern.
///
/// `{ x = p }` binds sub-pattern `p` to field `x`; `{ x }` binds `x`
/// directly; `{ .. }` or `{ ..p }` matches the row remainder.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPatField {
    pub dotdot: bool,
    pub name: Option<Name>,
    pub pattern: Option<NodeId>,
}

/// One `if`/`elif`/`else` arm of an if expression. The `else` arm has no
/// test.
#[derive(Debug, Clone, PartialEq)]
pub struct IfPart {
    pub test: Option<NodeId>,
    pub body: NodeId,
}

/// One member of a variant declaration, in tuple form:
/// `Some a` or `Pair a b`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantMember {
    pub name: Name,
    pub elements: Vec<NodeId>,
}

/// A `name: Type` field, used by record declarations and record type
/// expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedField {
    pub name: Name,
    pub ty: NodeId,
}

/// The payload of a CST node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    SourceFile {
        elements: Vec<NodeId>,
    },

    // ── Expressions ────────────────────────────────────────────────────
    ReferenceExpr {
        modules: Vec<Name>,
        name: Name,
    },
    LiteralExpr {
        value: LitValue,
    },
    CallExpr {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    InfixExpr {
        left: NodeId,
        op: Name,
        right: NodeId,
    },
    PrefixExpr {
        op: Name,
        arg: NodeId,
    },
    MemberExpr {
        expr: NodeId,
        member: Member,
    },
    TupleExpr {
        elements: Vec<NodeId>,
    },
    RecordExpr {
        fields: Vec<RecordExprField>,
    },
    MatchExpr {
        scrutinee: Option<NodeId>,
        cases: Vec<NodeId>,
    },
    MatchCase {
        pattern: NodeId,
        expr: NodeId,
    },
    IfExpr {
        parts: Vec<IfPart>,
    },
    NestedExpr {
        inner: NodeId,
    },
    BlockExpr {
        elements: Vec<NodeId>,
    },
    ReturnExpr {
        value: Option<NodeId>,
    },
    FnExpr {
        params: Vec<NodeId>,
        body: NodeId,
    },

    // ── Patterns ───────────────────────────────────────────────────────
    BindPat {
        name: Name,
    },
    LiteralPat {
        value: LitValue,
    },
    TuplePat {
        elements: Vec<NodeId>,
    },
    NestedPat {
        inner: NodeId,
    },
    ListPat {
        elements: Vec<NodeId>,
    },
    NamedTuplePat {
        name: Name,
        args: Vec<NodeId>,
    },
    RecordPat {
        fields: Vec<RecordPatField>,
    },
    NamedRecordPat {
        name: Name,
        fields: Vec<RecordPatField>,
    },

    // ── Declarations ───────────────────────────────────────────────────
    LetDecl(LetDecl),
    RecordDecl {
        name: Name,
        ty_vars: Vec<Name>,
        fields: Vec<TypedField>,
    },
    VariantDecl {
        name: Name,
        ty_vars: Vec<Name>,
        members: Vec<VariantMember>,
    },
    ClassDecl {
        name: Name,
        ty_vars: Vec<Name>,
        elements: Vec<NodeId>,
    },
    InstanceDecl {
        name: Name,
        ty_exprs: Vec<NodeId>,
        elements: Vec<NodeId>,
    },

    // ── Type expressions ───────────────────────────────────────────────
    RefTypeExpr {
        name: Name,
    },
    AppTypeExpr {
        op: NodeId,
        args: Vec<NodeId>,
    },
    ArrowTypeExpr {
        params: Vec<NodeId>,
        ret: NodeId,
    },
    VarTypeExpr {
        name: Name,
    },
    NestedTypeExpr {
        inner: NodeId,
    },
    TupleTypeExpr {
        elements: Vec<NodeId>,
    },
    RecordTypeExpr {
        fields: Vec<TypedField>,
        rest: Option<NodeId>,
    },
    QualifiedTypeExpr {
        constraints: Vec<NodeId>,
        body: NodeId,
    },
    ClassConstraint {
        name: Name,
        args: Vec<NodeId>,
    },
    EqualityConstraint {
        left: NodeId,
        right: NodeId,
    },
}

impl NodeKind {
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::ReferenceExpr { .. }
                | NodeKind::LiteralExpr { .. }
                | NodeKind::CallExpr { .. }
                | NodeKind::InfixExpr { .. }
                | NodeKind::PrefixExpr { .. }
                | NodeKind::MemberExpr { .. }
                | NodeKind::TupleExpr { .. }
                | NodeKind::RecordExpr { .. }
                | NodeKind::MatchExpr { .. }
                | NodeKind::IfExpr { .. }
                | NodeKind::NestedExpr { .. }
                | NodeKind::BlockExpr { .. }
                | NodeKind::ReturnExpr { .. }
                | NodeKind::FnExpr { .. }
        )
    }

    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            NodeKind::BindPat { .. }
                | NodeKind::LiteralPat { .. }
                | NodeKind::TuplePat { .. }
                | NodeKind::NestedPat { .. }
                | NodeKind::ListPat { .. }
                | NodeKind::NamedTuplePat { .. }
                | NodeKind::RecordPat { .. }
                | NodeKind::NamedRecordPat { .. }
        )
    }
}

/// A prefix annotation attached to an expression or statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub range: TextRange,
    pub kind: AnnotationKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationKind {
    /// `@: TypeExpression` -- assert the annotated expression's type.
    TypeAssert(NodeId),
    /// `@expr` -- a free-form expression annotation, interpreted by tools
    /// (`@expect_diagnostic(N)` in verify mode).
    Expr(NodeId),
}

struct Node {
    kind: NodeKind,
    range: TextRange,
}

/// The arena holding one parsed source file.
pub struct SourceModule {
    nodes: Vec<Node>,
    parents: Vec<Option<NodeId>>,
    root: Option<NodeId>,
    annotations: FxHashMap<NodeId, Vec<Annotation>>,
}

impl Default for SourceModule {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceModule {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            parents: Vec::new(),
            root: None,
            annotations: FxHashMap::default(),
        }
    }

    pub fn alloc(&mut self, kind: NodeKind, range: TextRange) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, range });
        self.parents.push(None);
        id
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// The source-file node. Only valid after parsing completed.
    pub fn root(&self) -> NodeId {
        self.root.expect("module root is set when parsing finishes")
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn range(&self, id: NodeId) -> TextRange {
        self.nodes[id.index()].range
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id.index()]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn attach_annotations(&mut self, id: NodeId, annotations: Vec<Annotation>) {
        if !annotations.is_empty() {
            self.annotations.entry(id).or_default().extend(annotations);
        }
    }

    pub fn annotations(&self, id: NodeId) -> &[Annotation] {
        self.annotations.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The `LetDecl` payload of a node, if it is one.
    pub fn let_decl(&self, id: NodeId) -> Option<&LetDecl> {
        match self.kind(id) {
            NodeKind::LetDecl(decl) => Some(decl),
            _ => None,
        }
    }

    /// The name a bind pattern introduces.
    pub fn bind_name(&self, id: NodeId) -> Option<&Name> {
        match self.kind(id) {
            NodeKind::BindPat { name } => Some(name),
            _ => None,
        }
    }

    /// The declared name of a `let`, read from its name slot.
    pub fn let_name(&self, id: NodeId) -> Option<&Name> {
        self.let_decl(id).and_then(|decl| self.bind_name(decl.pattern))
    }

    /// Whether a `let` declaration defines a function.
    ///
    /// Class and instance members are always functions (signatures have no
    /// body but still denote one). Otherwise a `let` is a variable when it
    /// has no parameters and is mutable, bodyless, or bound to a non-bind
    /// pattern.
    pub fn let_is_function(&self, id: NodeId) -> bool {
        let Some(decl) = self.let_decl(id) else {
            return false;
        };
        if let Some(parent) = self.parent(id) {
            if matches!(
                self.kind(parent),
                NodeKind::ClassDecl { .. } | NodeKind::InstanceDecl { .. }
            ) {
                return true;
            }
        }
        let is_variable = decl.params.is_empty()
            && (decl.is_mut
                || decl.body.is_none()
                || !matches!(self.kind(decl.pattern), NodeKind::BindPat { .. }));
        !is_variable
    }

    /// Whether a `let` declaration binds a variable.
    pub fn let_is_variable(&self, id: NodeId) -> bool {
        self.let_decl(id).is_some() && !self.let_is_function(id)
    }

    /// Invoke `f` for every direct child of `id`, in source order.
    pub fn for_each_child(&self, id: NodeId, mut f: impl FnMut(NodeId)) {
        self.each_child(id, &mut f);
    }

    fn each_child(&self, id: NodeId, f: &mut impl FnMut(NodeId)) {
        match self.kind(id) {
            NodeKind::SourceFile { elements }
            | NodeKind::TupleExpr { elements }
            | NodeKind::BlockExpr { elements }
            | NodeKind::TuplePat { elements }
            | NodeKind::ListPat { elements }
            | NodeKind::TupleTypeExpr { elements } => {
                elements.iter().copied().for_each(f);
            }
            NodeKind::ReferenceExpr { .. }
            | NodeKind::LiteralExpr { .. }
            | NodeKind::BindPat { .. }
            | NodeKind::LiteralPat { .. }
            | NodeKind::RefTypeExpr { .. }
            | NodeKind::VarTypeExpr { .. } => {}
            NodeKind::CallExpr { callee, args } => {
                f(*callee);
                args.iter().copied().for_each(f);
            }
            NodeKind::InfixExpr { left, right, .. } => {
                f(*left);
                f(*right);
            }
            NodeKind::PrefixExpr { arg, .. } => f(*arg),
            NodeKind::MemberExpr { expr, .. } => f(*expr),
            NodeKind::RecordExpr { fields } => {
                fields.iter().for_each(|field| f(field.value));
            }
            NodeKind::MatchExpr { scrutinee, cases } => {
                scrutinee.iter().copied().for_each(&mut *f);
                cases.iter().copied().for_each(f);
            }
            NodeKind::MatchCase { pattern, expr } => {
                f(*pattern);
                f(*expr);
            }
            NodeKind::IfExpr { parts } => {
                for part in parts {
                    part.test.iter().copied().for_each(&mut *f);
                    f(part.body);
                }
            }
            NodeKind::NestedExpr { inner } | NodeKind::NestedPat { inner } => f(*inner),
            NodeKind::NestedTypeExpr { inner } => f(*inner),
            NodeKind::ReturnExpr { value } => value.iter().copied().for_each(f),
            NodeKind::FnExpr { params, body } => {
                params.iter().copied().for_each(&mut *f);
                f(*body);
            }
            NodeKind::NamedTuplePat { args, .. } => args.iter().copied().for_each(f),
            NodeKind::RecordPat { fields } | NodeKind::NamedRecordPat { fields, .. } => {
                for field in fields {
                    field.pattern.iter().copied().for_each(&mut *f);
                }
            }
            NodeKind::LetDecl(decl) => {
                f(decl.pattern);
                decl.params.iter().copied().for_each(&mut *f);
                decl.type_assert.iter().copied().for_each(&mut *f);
                match &decl.body {
                    Some(LetBody::Expr(expr)) => f(*expr),
                    Some(LetBody::Block(elements)) => elements.iter().copied().for_each(f),
                    None => {}
                }
            }
            NodeKind::RecordDecl { fields, .. } => {
                fields.iter().for_each(|field| f(field.ty));
            }
            NodeKind::VariantDecl { members, .. } => {
                for member in members {
                    member.elements.iter().copied().for_each(&mut *f);
                }
            }
            NodeKind::ClassDecl { elements, .. } => elements.iter().copied().for_each(f),
            NodeKind::InstanceDecl {
                ty_exprs, elements, ..
            } => {
                ty_exprs.iter().copied().for_each(&mut *f);
                elements.iter().copied().for_each(f);
            }
            NodeKind::AppTypeExpr { op, args } => {
                f(*op);
                args.iter().copied().for_each(f);
            }
            NodeKind::ArrowTypeExpr { params, ret } => {
                params.iter().copied().for_each(&mut *f);
                f(*ret);
            }
            NodeKind::RecordTypeExpr { fields, rest } => {
                fields.iter().for_each(|field| f(field.ty));
                rest.iter().copied().for_each(f);
            }
            NodeKind::QualifiedTypeExpr { constraints, body } => {
                constraints.iter().copied().for_each(&mut *f);
                f(*body);
            }
            NodeKind::ClassConstraint { args, .. } => args.iter().copied().for_each(f),
            NodeKind::EqualityConstraint { left, right } => {
                f(*left);
                f(*right);
            }
        }
    }

    /// Wire parent links for the whole tree, starting at the root.
    ///
    /// Annotation payloads count as children of the annotated node so that
    /// scope lookups work from inside them.
    pub fn set_parents(&mut self) {
        let root = self.root();
        let mut stack = vec![root];
        let mut annotation_children: Vec<(NodeId, NodeId)> = Vec::new();
        for (&node, annotations) in self.annotations.iter() {
            for annotation in annotations {
                match annotation.kind {
                    AnnotationKind::TypeAssert(child) | AnnotationKind::Expr(child) => {
                        annotation_children.push((node, child));
                    }
                }
            }
        }
        while let Some(id) = stack.pop() {
            let mut children = Vec::new();
            self.each_child(id, &mut |child| children.push(child));
            for &(node, child) in &annotation_children {
                if node == id {
                    children.push(child);
                }
            }
            for child in children {
                self.parents[child.index()] = Some(id);
                stack.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolt_common::text::TextRange;

    #[test]
    fn parents_are_wired_from_the_root() {
        let mut module = SourceModule::new();
        let range = TextRange::empty();
        let name = Name::new("x", range);
        let pattern = module.alloc(NodeKind::BindPat { name: name.clone() }, range);
        let value = module.alloc(
            NodeKind::LiteralExpr {
                value: LitValue::Int(1),
            },
            range,
        );
        let decl = module.alloc(
            NodeKind::LetDecl(LetDecl {
                is_pub: false,
                is_foreign: false,
                is_mut: false,
                fixity: Fixity::Named,
                pattern,
                params: Vec::new(),
                type_assert: None,
                body: Some(LetBody::Expr(value)),
            }),
            range,
        );
        let root = module.alloc(
            NodeKind::SourceFile {
                elements: vec![decl],
            },
            range,
        );
        module.set_root(root);
        module.set_parents();

        assert_eq!(module.parent(root), None);
        assert_eq!(module.parent(decl), Some(root));
        assert_eq!(module.parent(pattern), Some(decl));
        assert_eq!(module.parent(value), Some(decl));
    }

    #[test]
    fn let_name_reads_the_bind_slot() {
        let mut module = SourceModule::new();
        let range = TextRange::empty();
        let pattern = module.alloc(
            NodeKind::BindPat {
                name: Name::new("main", range),
            },
            range,
        );
        let decl = module.alloc(
            NodeKind::LetDecl(LetDecl {
                is_pub: false,
                is_foreign: false,
                is_mut: false,
                fixity: Fixity::Named,
                pattern,
                params: Vec::new(),
                type_assert: None,
                body: None,
            }),
            range,
        );
        assert_eq!(module.let_name(decl).unwrap().text, "main");
    }
}
