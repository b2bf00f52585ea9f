//! Lexical scopes over the CST.
//!
//! A scope is attached to the source-file node, to function declarations
//! and function expressions (binding their parameters and, for block
//! bodies, their local declarations), and to match cases (binding pattern
//! variables). Lookup walks outward through the parent chain, so the most
//! local binding wins.

use rustc_hash::FxHashMap;

use crate::cst::{LetBody, NodeId, NodeKind, SourceModule};

/// What kind of thing a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Var,
    Type,
    Class,
    Constructor,
}

/// A reference to a symbol: an optional module path plus the final name.
///
/// Module paths are accepted but currently always empty; cross-module
/// lookup is a planned extension.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolPath {
    pub modules: Vec<String>,
    pub name: String,
}

impl SymbolPath {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            modules: Vec::new(),
            name: name.into(),
        }
    }
}

/// The symbol table of one scope-creating node.
#[derive(Debug, Default)]
pub struct Scope {
    mapping: FxHashMap<(String, SymbolKind), NodeId>,
}

impl Scope {
    fn add_symbol(&mut self, name: &str, decl: NodeId, kind: SymbolKind) {
        // First declaration wins; duplicates shadow nothing.
        self.mapping.entry((name.to_string(), kind)).or_insert(decl);
    }

    pub fn lookup_direct(&self, name: &str, kind: SymbolKind) -> Option<NodeId> {
        self.mapping.get(&(name.to_string(), kind)).copied()
    }
}

/// All scopes of a module, keyed by their scope-creating node.
pub struct ScopeTable {
    scopes: FxHashMap<NodeId, Scope>,
}

impl ScopeTable {
    /// Build every scope of the module. Requires parents to be wired.
    pub fn build(module: &SourceModule) -> Self {
        let mut table = ScopeTable {
            scopes: FxHashMap::default(),
        };
        for id in module.node_ids() {
            if table.creates_scope(module, id) {
                let mut scope = Scope::default();
                scan(module, id, &mut scope);
                table.scopes.insert(id, scope);
            }
        }
        table
    }

    fn creates_scope(&self, module: &SourceModule, id: NodeId) -> bool {
        match module.kind(id) {
            NodeKind::SourceFile { .. }
            | NodeKind::MatchCase { .. }
            | NodeKind::FnExpr { .. }
            | NodeKind::BlockExpr { .. } => true,
            NodeKind::LetDecl(decl) => module.let_is_function(id) && decl.body.is_some(),
            _ => false,
        }
    }

    /// The nearest enclosing scope-creating node of `id` (including `id`).
    pub fn scope_node_of(&self, module: &SourceModule, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.scopes.contains_key(&node) {
                return Some(node);
            }
            current = module.parent(node);
        }
        None
    }

    /// Look up a symbol from the position of `from`, walking outward
    /// through enclosing scopes.
    pub fn lookup_from(
        &self,
        module: &SourceModule,
        from: NodeId,
        path: &SymbolPath,
        kind: SymbolKind,
    ) -> Option<NodeId> {
        debug_assert!(path.modules.is_empty(), "module paths are not resolved yet");
        let mut scope_node = self.scope_node_of(module, from)?;
        loop {
            if let Some(found) = self.scopes[&scope_node].lookup_direct(&path.name, kind) {
                return Some(found);
            }
            let parent = module.parent(scope_node)?;
            scope_node = self.scope_node_of(module, parent)?;
        }
    }

    /// Look up only in the scope attached to `scope_node`.
    pub fn lookup_direct(
        &self,
        scope_node: NodeId,
        path: &SymbolPath,
        kind: SymbolKind,
    ) -> Option<NodeId> {
        debug_assert!(path.modules.is_empty(), "module paths are not resolved yet");
        self.scopes.get(&scope_node)?.lookup_direct(&path.name, kind)
    }
}

/// Populate `scope` with the symbols its node introduces.
fn scan(module: &SourceModule, id: NodeId, scope: &mut Scope) {
    match module.kind(id) {
        NodeKind::SourceFile { elements } => {
            for &element in elements {
                scan_child(module, element, scope);
            }
        }
        NodeKind::MatchCase { pattern, .. } => {
            visit_pattern(module, *pattern, id, scope);
        }
        NodeKind::FnExpr { params, .. } => {
            for &param in params {
                visit_pattern(module, param, param, scope);
            }
        }
        NodeKind::BlockExpr { elements } => {
            for &element in elements {
                scan_child(module, element, scope);
            }
        }
        NodeKind::LetDecl(decl) => {
            for &param in &decl.params {
                visit_pattern(module, param, param, scope);
            }
            if let Some(LetBody::Block(elements)) = &decl.body {
                for &element in elements {
                    scan_child(module, element, scope);
                }
            }
        }
        _ => {}
    }
}

/// Register the names a child element declares into the enclosing scope.
fn scan_child(module: &SourceModule, id: NodeId, scope: &mut Scope) {
    match module.kind(id) {
        NodeKind::LetDecl(decl) => {
            if module.let_is_function(id) {
                if let Some(name) = module.let_name(id) {
                    scope.add_symbol(&name.text, id, SymbolKind::Var);
                }
            } else {
                visit_pattern(module, decl.pattern, id, scope);
            }
        }
        NodeKind::RecordDecl { name, .. } => {
            scope.add_symbol(&name.text, id, SymbolKind::Type);
            scope.add_symbol(&name.text, id, SymbolKind::Constructor);
        }
        NodeKind::VariantDecl { name, members, .. } => {
            scope.add_symbol(&name.text, id, SymbolKind::Type);
            for member in members {
                scope.add_symbol(&member.name.text, id, SymbolKind::Constructor);
            }
        }
        NodeKind::ClassDecl { name, elements, .. } => {
            scope.add_symbol(&name.text, id, SymbolKind::Class);
            for &element in elements {
                scan_child(module, element, scope);
            }
        }
        // Let declarations inside instances mirror the class signatures and
        // do not introduce new top-level names.
        NodeKind::InstanceDecl { .. } => {}
        _ => {}
    }
}

/// Bind every name a pattern introduces to `decl`.
fn visit_pattern(module: &SourceModule, id: NodeId, decl: NodeId, scope: &mut Scope) {
    match module.kind(id) {
        NodeKind::BindPat { name } => {
            scope.add_symbol(&name.text, decl, SymbolKind::Var);
        }
        NodeKind::LiteralPat { .. } => {}
        NodeKind::TuplePat { elements } | NodeKind::ListPat { elements } => {
            for &element in elements {
                visit_pattern(module, element, decl, scope);
            }
        }
        NodeKind::NestedPat { inner } => visit_pattern(module, *inner, decl, scope),
        NodeKind::NamedTuplePat { args, .. } => {
            for &arg in args {
                visit_pattern(module, arg, decl, scope);
            }
        }
        NodeKind::RecordPat { fields } | NodeKind::NamedRecordPat { fields, .. } => {
            for field in fields {
                if let Some(pattern) = field.pattern {
                    visit_pattern(module, pattern, decl, scope);
                } else if let Some(name) = &field.name {
                    scope.add_symbol(&name.text, decl, SymbolKind::Var);
                }
            }
        }
        _ => {}
    }
}
