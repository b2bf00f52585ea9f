//! The inference engine.
//!
//! Checking is two-phase. Phase one walks declarations in reference-graph
//! SCC order and installs provisional schemes (the type assert, or a fresh
//! variable) so mutually recursive definitions see one another. Phase two
//! infers bodies, emitting constraints; [`Checker::add_constraint`] decides
//! per constraint whether to solve it on the spot or defer it to the most
//! local inference context that owns one of its variables, where it becomes
//! part of that declaration's scheme.

use std::collections::VecDeque;

use ena::unify::InPlaceUnificationTable;
use rustc_hash::{FxHashMap, FxHashSet};

use bolt_parser::cst::{
    AnnotationKind, LetBody, LitValue, Member, NodeId, NodeKind, SourceModule,
};
use bolt_parser::scope::{ScopeTable, SymbolKind, SymbolPath};

use crate::constraint::Constraint;
use crate::error::TypeError;
use crate::graph::Graph;
use crate::ty::{Binders, ClassSet, Quant, RigidVar, Scheme, Ty, TyCon, TyVar};

/// Index of an inference context in the checker's context arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CtxId(pub usize);

/// Extra information about a rigid variable.
#[derive(Debug, Clone)]
pub struct RigidInfo {
    pub name: String,
    /// Class obligations accumulated through unification.
    pub context: ClassSet,
    /// Classes declared for this variable by constraint expressions.
    pub provided: ClassSet,
}

/// One inference context: locally introduced variables, deferred
/// constraints, an environment frame, and the return-type slot for
/// `return` expressions. Contexts nest as function bodies and match
/// cases nest.
pub struct InferContext {
    pub parent: Option<CtxId>,
    pub tvs: Vec<Quant>,
    pub constraints: Vec<Constraint>,
    pub env: FxHashMap<(String, SymbolKind), Scheme>,
    pub return_type: Option<Ty>,
}

pub(crate) struct Builtins {
    pub int: Ty,
    pub bool: Ty,
    pub string: Ty,
    pub list: Ty,
}

/// The type checker for one source module.
pub struct Checker<'a> {
    pub(crate) module: &'a SourceModule,
    pub(crate) scopes: &'a ScopeTable,

    pub(crate) table: InPlaceUnificationTable<TyVar>,
    /// Pending class obligations of unification variables, keyed by root.
    pub(crate) var_classes: FxHashMap<TyVar, ClassSet>,
    pub(crate) rigids: Vec<RigidInfo>,
    con_ids: FxHashMap<String, u32>,

    pub(crate) contexts: Vec<InferContext>,
    pub(crate) active: Option<CtxId>,
    node_ctx: FxHashMap<NodeId, CtxId>,

    pub(crate) node_types: FxHashMap<NodeId, Ty>,
    visited: FxHashSet<NodeId>,
    cycle_active: FxHashSet<NodeId>,

    /// Class name -> instance declarations, for class propagation.
    pub(crate) instance_map: FxHashMap<String, Vec<NodeId>>,

    ref_graph: Graph,

    pub(crate) errors: Vec<TypeError>,
    /// Constraints queued while no context is active (during solving).
    pub(crate) queue: VecDeque<Constraint>,

    pub(crate) builtins: Builtins,
}

impl<'a> Checker<'a> {
    pub fn new(module: &'a SourceModule, scopes: &'a ScopeTable) -> Self {
        let mut con_ids = FxHashMap::default();
        let mut next_id = 0u32;
        let mut con = |name: &str| {
            let id = next_id;
            next_id += 1;
            con_ids.insert(name.to_string(), id);
            Ty::Con(TyCon {
                id,
                name: name.to_string(),
            })
        };
        let builtins = Builtins {
            bool: con("Bool"),
            int: con("Int"),
            string: con("String"),
            list: con("List"),
        };
        Self {
            module,
            scopes,
            table: InPlaceUnificationTable::new(),
            var_classes: FxHashMap::default(),
            rigids: Vec::new(),
            con_ids,
            contexts: Vec::new(),
            active: None,
            node_ctx: FxHashMap::default(),
            node_types: FxHashMap::default(),
            visited: FxHashSet::default(),
            cycle_active: FxHashSet::default(),
            instance_map: FxHashMap::default(),
            ref_graph: Graph::new(),
            errors: Vec::new(),
            queue: VecDeque::new(),
            builtins,
        }
    }

    // ── Factory methods ────────────────────────────────────────────────

    pub(crate) fn fresh_var(&mut self) -> Ty {
        let v = self.table.new_key(None);
        if let Some(ctx) = self.active {
            self.contexts[ctx.0].tvs.push(Quant::Var(v));
        }
        Ty::Var(v)
    }

    pub(crate) fn create_rigid(&mut self, name: &str) -> Ty {
        let r = RigidVar(self.rigids.len() as u32);
        self.rigids.push(RigidInfo {
            name: name.to_string(),
            context: ClassSet::default(),
            provided: ClassSet::default(),
        });
        if let Some(ctx) = self.active {
            self.contexts[ctx.0].tvs.push(Quant::Rigid(r));
        }
        Ty::Rigid(r)
    }

    /// Intern a type constructor by name.
    pub(crate) fn con(&mut self, name: &str) -> Ty {
        let next = self.con_ids.len() as u32;
        let id = *self.con_ids.entry(name.to_string()).or_insert(next);
        Ty::Con(TyCon {
            id,
            name: name.to_string(),
        })
    }

    fn create_context(&mut self, parent: Option<CtxId>) -> CtxId {
        let id = CtxId(self.contexts.len());
        self.contexts.push(InferContext {
            parent,
            tvs: Vec::new(),
            constraints: Vec::new(),
            env: FxHashMap::default(),
            return_type: None,
        });
        id
    }

    // ── Environment ────────────────────────────────────────────────────

    pub(crate) fn add_binding(&mut self, name: &str, scheme: Scheme, kind: SymbolKind) {
        let ctx = self.active.expect("bindings require an active context");
        self.contexts[ctx.0]
            .env
            .insert((name.to_string(), kind), scheme);
    }

    fn add_binding_in(&mut self, ctx: CtxId, name: &str, scheme: Scheme, kind: SymbolKind) {
        self.contexts[ctx.0]
            .env
            .insert((name.to_string(), kind), scheme);
    }

    pub(crate) fn lookup(&self, name: &str, kind: SymbolKind) -> Option<Scheme> {
        let mut current = self.active;
        while let Some(ctx) = current {
            let frame = &self.contexts[ctx.0];
            if let Some(scheme) = frame.env.get(&(name.to_string(), kind)) {
                return Some(scheme.clone());
            }
            current = frame.parent;
        }
        None
    }

    /// Look up a name that must be monomorphic (type names, class type
    /// parameters).
    fn lookup_mono(&self, name: &str, kind: SymbolKind) -> Option<Ty> {
        let scheme = self.lookup(name, kind)?;
        debug_assert!(
            matches!(scheme.binders, Binders::Mono),
            "expected a monomorphic binding for {name}"
        );
        Some(scheme.ty)
    }

    /// The return-type slot of the nearest enclosing context that has
    /// one. Outside any function this is the unit tuple.
    fn return_type(&self) -> Ty {
        let mut current = self.active;
        while let Some(ctx) = current {
            let frame = &self.contexts[ctx.0];
            if let Some(ty) = &frame.return_type {
                return ty.clone();
            }
            current = frame.parent;
        }
        Ty::unit()
    }

    /// The context a declaration's bindings belong to: the nearest
    /// context at or above its parent node.
    fn home_ctx(&self, id: NodeId) -> Option<CtxId> {
        let mut current = self.module.parent(id);
        while let Some(node) = current {
            if let Some(ctx) = self.node_ctx.get(&node) {
                return Some(*ctx);
            }
            current = self.module.parent(node);
        }
        None
    }

    fn binding_not_found(&mut self, name: &str, range: bolt_common::text::TextRange) {
        self.errors.push(TypeError::BindingNotFound {
            name: name.to_string(),
            range,
        });
    }

    // ── Constraints ────────────────────────────────────────────────────

    pub(crate) fn make_equal(&mut self, left: Ty, right: Ty, source: NodeId) {
        self.add_constraint(Constraint::Equal {
            left,
            right,
            source,
        });
    }

    /// Route a constraint: solve it immediately when no local variable
    /// participates on either side, otherwise defer it to the most local
    /// context that introduced one of its variables so it can be
    /// generalized over.
    pub(crate) fn add_constraint(&mut self, constraint: Constraint) {
        match constraint {
            Constraint::Empty => {}
            Constraint::Many(elements) => {
                for element in elements {
                    self.add_constraint(element);
                }
            }
            Constraint::Field { .. } => match self.active {
                Some(ctx) => self.contexts[ctx.0].constraints.push(constraint),
                None => self.queue.push_back(constraint),
            },
            Constraint::Equal {
                ref left,
                ref right,
                source,
            } => {
                let Some(active) = self.active else {
                    let (left, right) = (left.clone(), right.clone());
                    self.unify(&left, &right, source);
                    return;
                };

                let mut chain = Vec::new();
                let mut current = Some(active);
                while let Some(ctx) = current {
                    chain.push(ctx);
                    current = self.contexts[ctx.0].parent;
                }
                let global = chain.len() - 1;

                let mut left_free = FxHashSet::default();
                let mut right_free = FxHashSet::default();
                let (left, right) = (left.clone(), right.clone());
                self.free_quants(&left, &mut left_free);
                self.free_quants(&right, &mut right_free);

                let mut max_left = global;
                let mut max_right = global;
                for (i, &ctx) in chain.iter().enumerate().take(global) {
                    if max_left == global && self.ctx_has_any(ctx, &left_free) {
                        max_left = i;
                    }
                    if max_right == global && self.ctx_has_any(ctx, &right_free) {
                        max_right = i;
                    }
                    if max_left != global && max_right != global {
                        break;
                    }
                }

                let upper = max_left.max(max_right);
                let mut lower = upper;
                for i in (0..global).rev() {
                    let ctx = chain[i];
                    if self.ctx_has_any(ctx, &left_free) || self.ctx_has_any(ctx, &right_free) {
                        lower = i;
                        break;
                    }
                }

                if upper == lower || max_left == global || max_right == global {
                    self.unify(&left, &right, source);
                } else {
                    self.contexts[chain[upper].0].constraints.push(Constraint::Equal {
                        left,
                        right,
                        source,
                    });
                }
            }
        }
    }

    /// Whether a context introduced any of the given (resolved) variables.
    fn ctx_has_any(&mut self, ctx: CtxId, vars: &FxHashSet<Quant>) -> bool {
        if vars.is_empty() {
            return false;
        }
        let tvs = self.contexts[ctx.0].tvs.clone();
        for quant in tvs {
            match quant {
                Quant::Var(v) => {
                    if self.table.probe_value(v).is_some() {
                        continue;
                    }
                    if vars.contains(&Quant::Var(self.table.find(v))) {
                        return true;
                    }
                }
                Quant::Rigid(r) => {
                    if vars.contains(&Quant::Rigid(r)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    // ── Instantiation ──────────────────────────────────────────────────

    /// Instantiate a scheme at a use site: freshen each still-unbound
    /// quantified variable (carrying its class context along), re-emit
    /// the scheme's constraints with the use site as their source, and
    /// substitute into the body.
    pub(crate) fn instantiate(&mut self, scheme: &Scheme, source: NodeId) -> Ty {
        let (quants, constraints) = match &scheme.binders {
            Binders::Mono => return scheme.ty.clone(),
            Binders::Explicit(quants) => (quants.clone(), Vec::new()),
            Binders::Context(ctx) => (
                self.contexts[ctx.0].tvs.clone(),
                self.contexts[ctx.0].constraints.clone(),
            ),
        };

        let mut sub: FxHashMap<Quant, Ty> = FxHashMap::default();
        for quant in quants {
            match quant {
                Quant::Var(v) => {
                    // A variable solved during inference keeps its
                    // solution; freshening it would let distinct uses
                    // collide with distinct concrete types.
                    if self.table.probe_value(v).is_some() {
                        continue;
                    }
                    let root = self.table.find(v);
                    if sub.contains_key(&Quant::Var(root)) {
                        continue;
                    }
                    let classes = self.var_classes.get(&root).cloned();
                    let fresh = self.fresh_var();
                    if let (Some(classes), Ty::Var(fv)) = (classes, &fresh) {
                        self.var_classes.insert(*fv, classes);
                    }
                    sub.insert(Quant::Var(root), fresh);
                }
                Quant::Rigid(r) => {
                    let classes = self.rigids[r.0 as usize].context.clone();
                    let fresh = self.fresh_var();
                    if let Ty::Var(fv) = &fresh {
                        if !classes.is_empty() {
                            self.var_classes.insert(*fv, classes);
                        }
                    }
                    sub.insert(Quant::Rigid(r), fresh);
                }
            }
        }

        for constraint in constraints {
            let substituted = self.substitute_constraint(&constraint, &sub, source);
            self.add_constraint(substituted);
        }

        let body = scheme.ty.clone();
        self.substitute(&body, &sub)
    }

    fn substitute_constraint(
        &mut self,
        constraint: &Constraint,
        sub: &FxHashMap<Quant, Ty>,
        source: NodeId,
    ) -> Constraint {
        match constraint {
            Constraint::Empty => Constraint::Empty,
            Constraint::Many(elements) => Constraint::Many(
                elements
                    .iter()
                    .map(|c| self.substitute_constraint(c, sub, source))
                    .collect(),
            ),
            // Re-pointing the source relates failures to the call site
            // rather than the definition.
            Constraint::Equal { left, right, .. } => Constraint::Equal {
                left: self.substitute(&left.clone(), sub),
                right: self.substitute(&right.clone(), sub),
                source,
            },
            Constraint::Field {
                tuple,
                index,
                field,
                ..
            } => Constraint::Field {
                tuple: self.substitute(&tuple.clone(), sub),
                index: *index,
                field: self.substitute(&field.clone(), sub),
                source,
            },
        }
    }

    // ── Initialization ─────────────────────────────────────────────────

    /// Create the inference-context tree: one context for the source
    /// file, and derived contexts for function declarations, match
    /// cases, and type declarations.
    fn initialize(&mut self, root: NodeId) {
        let module = self.module;
        let root_ctx = self.create_context(None);
        self.node_ctx.insert(root, root_ctx);

        let mut stack = vec![(root, root_ctx)];
        while let Some((node, enclosing)) = stack.pop() {
            let mut children = Vec::new();
            module.for_each_child(node, |child| children.push(child));
            for child in children {
                let child_ctx = match module.kind(child) {
                    NodeKind::MatchCase { .. } => {
                        let ctx = self.create_context(Some(enclosing));
                        self.node_ctx.insert(child, ctx);
                        ctx
                    }
                    NodeKind::VariantDecl { .. } | NodeKind::RecordDecl { .. } => {
                        let ctx = self.create_context(Some(enclosing));
                        self.node_ctx.insert(child, ctx);
                        enclosing
                    }
                    NodeKind::LetDecl(_) if module.let_is_function(child) => {
                        let ctx = self.create_context(Some(enclosing));
                        self.node_ctx.insert(child, ctx);
                        ctx
                    }
                    _ => enclosing,
                };
                stack.push((child, child_ctx));
            }
        }
    }

    /// Build the reference graph: vertices are `let` declarations, and an
    /// edge from A to B records that B's body references A.
    fn populate(&mut self, root: NodeId) {
        let module = self.module;
        enum Step {
            Enter(NodeId),
            Exit(NodeId),
        }
        let mut work = vec![Step::Enter(root)];
        let mut decl_stack: Vec<NodeId> = Vec::new();
        while let Some(step) = work.pop() {
            match step {
                Step::Exit(node) => {
                    if matches!(module.kind(node), NodeKind::LetDecl(_)) {
                        decl_stack.pop();
                    }
                }
                Step::Enter(node) => {
                    match module.kind(node) {
                        NodeKind::LetDecl(_) => {
                            self.ref_graph.add_vertex(node);
                            decl_stack.push(node);
                            work.push(Step::Exit(node));
                        }
                        NodeKind::ReferenceExpr { modules, name }
                            if modules.is_empty()
                                && !name.text.starts_with(char::is_uppercase) =>
                        {
                            let target = self.scopes.lookup_from(
                                module,
                                node,
                                &SymbolPath::plain(name.text.clone()),
                                SymbolKind::Var,
                            );
                            // Lookup failures are reported during body
                            // inference, not here.
                            if let Some(target) = target {
                                if matches!(module.kind(target), NodeKind::LetDecl(_)) {
                                    if let Some(&top) = decl_stack.last() {
                                        self.ref_graph.add_edge(target, top);
                                    }
                                } else if let Some(owner) = self.enclosing_let(target) {
                                    // A parameter or pattern binding: the
                                    // edge runs to its owning declaration.
                                    if let Some(&top) = decl_stack.last() {
                                        if top != owner {
                                            self.ref_graph.add_edge(top, owner);
                                        }
                                    }
                                }
                            }
                        }
                        _ => {}
                    }
                    let mut children = Vec::new();
                    module.for_each_child(node, |child| children.push(child));
                    for child in children.into_iter().rev() {
                        work.push(Step::Enter(child));
                    }
                }
            }
        }
    }

    fn enclosing_let(&self, node: NodeId) -> Option<NodeId> {
        let mut current = self.module.parent(node);
        while let Some(n) = current {
            if matches!(self.module.kind(n), NodeKind::LetDecl(_)) {
                return Some(n);
            }
            current = self.module.parent(n);
        }
        None
    }

    // ── Phase 1: forward declaration ───────────────────────────────────

    fn forward_declare(&mut self, node: NodeId) {
        let module = self.module;
        match module.kind(node) {
            NodeKind::SourceFile { elements } => {
                for &element in elements.clone().iter() {
                    self.forward_declare(element);
                }
            }
            NodeKind::ClassDecl { elements, .. } => {
                for &element in elements.clone().iter() {
                    self.forward_declare(element);
                }
            }
            NodeKind::InstanceDecl {
                name,
                ty_exprs,
                elements,
            } => {
                let (name, ty_exprs, elements) =
                    (name.clone(), ty_exprs.clone(), elements.clone());
                if self
                    .scopes
                    .lookup_from(
                        module,
                        node,
                        &SymbolPath::plain(name.text.clone()),
                        SymbolKind::Class,
                    )
                    .is_none()
                {
                    self.errors.push(TypeError::ClassNotFound {
                        name: name.text.clone(),
                        range: name.range,
                    });
                }
                for te in &ty_exprs {
                    self.infer_type_expr(*te, true);
                }
                self.instance_map.entry(name.text).or_default().push(node);
                for element in elements {
                    self.forward_declare(element);
                }
            }
            NodeKind::LetDecl(decl) => {
                // Functions are forward-declared per SCC; only variables
                // receive their provisional type here.
                if module.let_is_function(node) {
                    return;
                }
                let type_assert = decl.type_assert;
                let ty = match type_assert {
                    Some(te) => self.infer_type_expr(te, true),
                    None => self.fresh_var(),
                };
                self.node_types.insert(node, ty);
            }
            NodeKind::VariantDecl {
                name,
                ty_vars,
                members,
            } => {
                let (name, ty_vars, members) = (name.clone(), ty_vars.clone(), members.clone());
                let decl_ctx = self.node_ctx[&node];
                let parent_ctx = self.contexts[decl_ctx.0].parent.expect("derived context");
                let saved = self.active;
                self.active = Some(decl_ctx);

                let mut vars = Vec::new();
                for tv in &ty_vars {
                    let rigid = self.create_rigid(&tv.text);
                    self.add_binding(&tv.text, Scheme::mono(rigid.clone()), SymbolKind::Type);
                    vars.push(rigid);
                }

                let ty = self.con(&name.text);
                let mut ret = ty.clone();
                for var in &vars {
                    ret = Ty::App(Box::new(ret), Box::new(var.clone()));
                }

                // Added to the parent early so members can recurse.
                self.add_binding_in(parent_ctx, &name.text, Scheme::mono(ty), SymbolKind::Type);

                for member in &members {
                    let mut param_types = Vec::new();
                    for &element in &member.elements {
                        param_types.push(self.infer_type_expr(element, false));
                    }
                    let ctor = Ty::build_arrow(param_types, ret.clone());
                    self.add_binding_in(
                        parent_ctx,
                        &member.name.text,
                        Scheme {
                            binders: Binders::Context(decl_ctx),
                            ty: ctor,
                        },
                        SymbolKind::Constructor,
                    );
                }

                self.active = saved;
            }
            NodeKind::RecordDecl {
                name,
                ty_vars,
                fields,
            } => {
                let (name, ty_vars, fields) = (name.clone(), ty_vars.clone(), fields.clone());
                let decl_ctx = self.node_ctx[&node];
                let parent_ctx = self.contexts[decl_ctx.0].parent.expect("derived context");
                let saved = self.active;
                self.active = Some(decl_ctx);

                let mut vars = Vec::new();
                for tv in &ty_vars {
                    let rigid = self.create_rigid(&tv.text);
                    self.add_binding(&tv.text, Scheme::mono(rigid.clone()), SymbolKind::Type);
                    vars.push(rigid);
                }

                let ty = self.con(&name.text);
                self.add_binding_in(
                    parent_ctx,
                    &name.text,
                    Scheme::mono(ty.clone()),
                    SymbolKind::Type,
                );

                let mut ret = ty;
                for var in &vars {
                    ret = Ty::App(Box::new(ret), Box::new(var.clone()));
                }

                let mut row = Ty::Nil;
                for field in &fields {
                    let field_ty = self.infer_type_expr(field.ty, false);
                    row = Ty::Field(
                        field.name.text.clone(),
                        Box::new(Ty::Present(Box::new(field_ty))),
                        Box::new(row),
                    );
                }
                let ctor = Ty::Arrow(Box::new(row), Box::new(ret));
                self.add_binding_in(
                    parent_ctx,
                    &name.text,
                    Scheme {
                        binders: Binders::Context(decl_ctx),
                        ty: ctor,
                    },
                    SymbolKind::Constructor,
                );

                self.active = saved;
            }
            // Statements have nothing to forward-declare.
            _ => {}
        }
    }

    /// Install the provisional scheme of one function declaration.
    fn forward_declare_function(&mut self, node: NodeId) {
        let module = self.module;
        if !module.let_is_function(node) {
            return;
        }
        let decl = module.let_decl(node).expect("checked above").clone();
        let decl_ctx = self.node_ctx[&node];
        let saved = self.active;
        self.active = Some(decl_ctx);

        let parent_kind = module.parent(node).map(|p| module.kind(p));
        let in_class = matches!(parent_kind, Some(NodeKind::ClassDecl { .. }));
        let in_instance = matches!(parent_kind, Some(NodeKind::InstanceDecl { .. }));

        // Inside a class declaration, the class type parameters are rigid
        // and carry the class as both obligation and provision, so that
        // instantiated uses of a method propagate the class while the
        // signature itself stays well-formed.
        if in_class {
            if let Some(NodeKind::ClassDecl { name, ty_vars, .. }) =
                module.parent(node).map(|p| module.kind(p))
            {
                let class_name = name.text.clone();
                for tv in ty_vars.clone() {
                    let rigid = self.create_rigid(&tv.text);
                    if let Ty::Rigid(r) = &rigid {
                        let info = &mut self.rigids[r.0 as usize];
                        info.context.insert(class_name.clone());
                        info.provided.insert(class_name.clone());
                    }
                    self.add_binding(&tv.text, Scheme::mono(rigid), SymbolKind::Type);
                }
            }
        }

        let ty = match decl.type_assert {
            Some(te) => self.infer_type_expr(te, true),
            None => self.fresh_var(),
        };
        self.node_types.insert(node, ty.clone());

        // Instance members must agree with the corresponding class
        // signature, re-generated here so the class type parameters
        // unify with the instance head types.
        if in_instance {
            self.forward_declare_instance_member(node, &ty);
        }

        if let Some(LetBody::Block(elements)) = &decl.body {
            let ret = self.fresh_var();
            self.contexts[decl_ctx.0].return_type = Some(ret);
            for &element in elements {
                self.forward_declare(element);
            }
        }

        if !in_instance {
            if let Some(name) = module.let_name(node) {
                let name = name.text.clone();
                let parent_ctx = self.contexts[decl_ctx.0].parent.expect("derived context");
                self.add_binding_in(
                    parent_ctx,
                    &name,
                    Scheme {
                        binders: Binders::Context(decl_ctx),
                        ty,
                    },
                    SymbolKind::Var,
                );
            }
        }

        self.active = saved;
    }

    fn forward_declare_instance_member(&mut self, node: NodeId, ty: &Ty) {
        let module = self.module;
        let Some(instance) = module.parent(node) else {
            return;
        };
        let NodeKind::InstanceDecl { name, ty_exprs, .. } = module.kind(instance) else {
            return;
        };
        let (class_name, ty_exprs) = (name.text.clone(), ty_exprs.clone());
        let Some(class_decl) = self.scopes.lookup_from(
            module,
            instance,
            &SymbolPath::plain(class_name.clone()),
            SymbolKind::Class,
        ) else {
            return;
        };
        let NodeKind::ClassDecl {
            ty_vars, elements, ..
        } = module.kind(class_decl)
        else {
            return;
        };
        let (ty_vars, class_elements) = (ty_vars.clone(), elements.clone());

        // Unification variables standing for the class type parameters;
        // unifying them with the instance head types collapses the class
        // signature to this instance's concrete types.
        let mut params = Vec::new();
        for tv in &ty_vars {
            let param = self.fresh_var();
            if let Ty::Var(v) = &param {
                let mut classes = ClassSet::default();
                classes.insert(class_name.clone());
                self.var_classes.insert(*v, classes);
            }
            self.add_binding(&tv.text, Scheme::mono(param.clone()), SymbolKind::Type);
            params.push(param);
        }
        for (param, te) in params.into_iter().zip(ty_exprs) {
            if let Some(head) = self.node_types.get(&te).cloned() {
                self.make_equal(param, head, te);
            }
        }

        let member_name = module.let_name(node).map(|n| n.text.clone());
        let sig = class_elements.iter().copied().find(|&el| {
            module.let_name(el).map(|n| n.text.clone()) == member_name
        });
        if let Some(sig) = sig {
            if let Some(assert) = module.let_decl(sig).and_then(|d| d.type_assert) {
                let sig_ty = self.infer_type_expr(assert, true);
                self.make_equal(ty.clone(), sig_ty, node);
            }
        }
    }

    // ── Phase 2: inference ─────────────────────────────────────────────

    fn infer(&mut self, node: NodeId) {
        let module = self.module;
        match module.kind(node) {
            NodeKind::SourceFile { elements }
            | NodeKind::ClassDecl { elements, .. }
            | NodeKind::InstanceDecl { elements, .. } => {
                for element in elements.clone() {
                    self.infer(element);
                }
            }
            NodeKind::VariantDecl { .. } | NodeKind::RecordDecl { .. } => {}
            NodeKind::LetDecl(decl) => {
                if self.visited.contains(&node) {
                    return;
                }
                self.visited.insert(node);
                if module.let_is_function(node) {
                    self.cycle_active.insert(node);
                    self.infer_function_declaration(node);
                    self.cycle_active.remove(&node);
                } else {
                    let decl = decl.clone();
                    let saved = self.active;
                    if let Some(home) = self.home_ctx(node) {
                        self.active = Some(home);
                    }
                    // Variables in nested expression blocks are not seen by
                    // the forward-declaration walk; give them their
                    // provisional type here.
                    let ty = match self.node_types.get(&node) {
                        Some(ty) => ty.clone(),
                        None => {
                            let ty = match decl.type_assert {
                                Some(te) => self.infer_type_expr(te, true),
                                None => self.fresh_var(),
                            };
                            self.node_types.insert(node, ty.clone());
                            ty
                        }
                    };
                    if let Some(LetBody::Expr(expr)) = decl.body {
                        let body_ty = self.infer_expression(expr);
                        self.make_equal(ty.clone(), body_ty, node);
                    }
                    let pattern_ty = self.infer_pattern(decl.pattern);
                    self.make_equal(ty, pattern_ty, node);
                    self.active = saved;
                }
            }
            // Anything else is an expression statement.
            _ => {
                self.infer_expression(node);
            }
        }
    }

    fn infer_function_declaration(&mut self, node: NodeId) {
        let module = self.module;
        let decl = module.let_decl(node).expect("function declaration").clone();
        let decl_ctx = self.node_ctx[&node];
        let saved = self.active;
        self.active = Some(decl_ctx);

        let mut param_types = Vec::new();
        for &param in &decl.params {
            param_types.push(self.infer_pattern(param));
        }

        let ret = match &decl.body {
            Some(LetBody::Expr(expr)) => self.infer_expression(*expr),
            Some(LetBody::Block(elements)) => {
                let ret = self.contexts[decl_ctx.0]
                    .return_type
                    .clone()
                    .expect("block bodies allocate a return type");
                for &element in elements {
                    self.infer(element);
                }
                ret
            }
            None => self.fresh_var(),
        };

        let declared = self.node_types[&node].clone();
        let arrow = Ty::build_arrow(param_types, ret);
        self.make_equal(declared, arrow, node);

        self.active = saved;
    }

    pub(crate) fn infer_expression(&mut self, x: NodeId) -> Ty {
        let module = self.module;

        for annotation in module.annotations(x) {
            if let AnnotationKind::TypeAssert(te) = annotation.kind {
                self.infer_type_expr(te, true);
            }
        }

        let ty = match module.kind(x) {
            NodeKind::LiteralExpr { value } => self.infer_literal(value.clone()),

            NodeKind::ReferenceExpr { name, .. } => {
                let name = name.clone();
                if name.text.starts_with(char::is_uppercase) {
                    let scheme = self
                        .lookup(&name.text, SymbolKind::Constructor)
                        .or_else(|| self.lookup(&name.text, SymbolKind::Var));
                    match scheme {
                        Some(scheme) => self.instantiate(&scheme, x),
                        None => {
                            self.binding_not_found(&name.text, name.range);
                            self.fresh_var()
                        }
                    }
                } else {
                    let target = self.scopes.lookup_from(
                        module,
                        x,
                        &SymbolPath::plain(name.text.clone()),
                        SymbolKind::Var,
                    );
                    match target {
                        None => {
                            self.binding_not_found(&name.text, name.range);
                            self.fresh_var()
                        }
                        Some(target) => {
                            if matches!(module.kind(target), NodeKind::LetDecl(_)) {
                                if self.cycle_active.contains(&target) {
                                    // Within an active cycle, use the
                                    // provisional type directly instead of
                                    // instantiating it over and over.
                                    return self.finish_expr(x, self.node_types[&target].clone());
                                }
                                if !self.visited.contains(&target) {
                                    self.infer(target);
                                }
                            }
                            match self.lookup(&name.text, SymbolKind::Var) {
                                Some(scheme) => self.instantiate(&scheme, x),
                                None => {
                                    self.binding_not_found(&name.text, name.range);
                                    self.fresh_var()
                                }
                            }
                        }
                    }
                }
            }

            NodeKind::CallExpr { callee, args } => {
                let (callee, args) = (*callee, args.clone());
                let op_ty = self.infer_expression(callee);
                let result = self.fresh_var();
                let mut arg_types = Vec::new();
                for arg in args {
                    arg_types.push(self.infer_expression(arg));
                }
                let arrow = Ty::build_arrow(arg_types, result.clone());
                self.make_equal(op_ty, arrow, x);
                result
            }

            NodeKind::InfixExpr { left, op, right } => {
                let (left, op, right) = (*left, op.clone(), *right);
                let scheme = self.lookup(&op.text, SymbolKind::Var);
                match scheme {
                    None => {
                        self.binding_not_found(&op.text, op.range);
                        self.fresh_var()
                    }
                    Some(scheme) => {
                        let op_ty = self.instantiate(&scheme, x);
                        let result = self.fresh_var();
                        let left_ty = self.infer_expression(left);
                        let right_ty = self.infer_expression(right);
                        let arrow = Ty::build_arrow(vec![left_ty, right_ty], result.clone());
                        self.make_equal(arrow, op_ty, x);
                        result
                    }
                }
            }

            NodeKind::PrefixExpr { op, arg } => {
                let (op, arg) = (op.clone(), *arg);
                let scheme = self.lookup(&op.text, SymbolKind::Var);
                match scheme {
                    None => {
                        self.binding_not_found(&op.text, op.range);
                        self.fresh_var()
                    }
                    Some(scheme) => {
                        let op_ty = self.instantiate(&scheme, x);
                        let result = self.fresh_var();
                        let arg_ty = self.infer_expression(arg);
                        let arrow = Ty::build_arrow(vec![arg_ty], result.clone());
                        self.make_equal(arrow, op_ty, x);
                        result
                    }
                }
            }

            NodeKind::TupleExpr { elements } => {
                let elements = elements.clone();
                let mut types = Vec::new();
                for element in elements {
                    types.push(self.infer_expression(element));
                }
                Ty::Tuple(types)
            }

            NodeKind::RecordExpr { fields } => {
                let fields = fields.clone();
                let mut typed: Vec<(String, Ty)> = Vec::new();
                for field in &fields {
                    let value_ty = self.infer_expression(field.value);
                    typed.push((field.name.text.clone(), value_ty));
                }
                // Normalize field order so row unification starts from a
                // canonical shape.
                typed.sort_by(|a, b| a.0.cmp(&b.0));
                let mut row = Ty::Nil;
                for (name, ty) in typed {
                    row = Ty::Field(name, Box::new(Ty::Present(Box::new(ty))), Box::new(row));
                }
                row
            }

            NodeKind::MemberExpr { expr, member } => {
                let (expr, member) = (*expr, member.clone());
                let expr_ty = self.infer_expression(expr);
                match member {
                    Member::Index(index, _) => {
                        let field_ty = self.fresh_var();
                        self.add_constraint(Constraint::Field {
                            tuple: expr_ty,
                            index: index.max(0) as usize,
                            field: field_ty.clone(),
                            source: x,
                        });
                        field_ty
                    }
                    Member::Field(name) => {
                        let field_ty = self.fresh_var();
                        let rest = self.fresh_var();
                        let row = Ty::Field(
                            name.text.clone(),
                            Box::new(field_ty.clone()),
                            Box::new(rest),
                        );
                        self.make_equal(row, expr_ty, x);
                        field_ty
                    }
                }
            }

            NodeKind::MatchExpr { scrutinee, cases } => {
                let (scrutinee, cases) = (*scrutinee, cases.clone());
                let value_ty = match scrutinee {
                    Some(value) => self.infer_expression(value),
                    None => self.fresh_var(),
                };
                let result = self.fresh_var();
                for case in cases {
                    let NodeKind::MatchCase { pattern, expr } = module.kind(case) else {
                        continue;
                    };
                    let (pattern, expr) = (*pattern, *expr);
                    let saved = self.active;
                    let case_ctx = self.node_ctx[&case];
                    self.active = Some(case_ctx);
                    let pattern_ty = self.infer_pattern(pattern);
                    self.make_equal(pattern_ty, value_ty.clone(), case);
                    let expr_ty = self.infer_expression(expr);
                    self.make_equal(expr_ty, result.clone(), expr);
                    self.active = saved;
                    // The case's variables and leftover constraints belong
                    // to the enclosing declaration's generalization unit.
                    if let Some(parent) = self.contexts[case_ctx.0].parent {
                        let tvs = std::mem::take(&mut self.contexts[case_ctx.0].tvs);
                        let constraints =
                            std::mem::take(&mut self.contexts[case_ctx.0].constraints);
                        self.contexts[parent.0].tvs.extend(tvs);
                        self.contexts[parent.0].constraints.extend(constraints);
                    }
                }
                if scrutinee.is_none() {
                    Ty::Arrow(Box::new(value_ty), Box::new(result))
                } else {
                    result
                }
            }

            NodeKind::IfExpr { parts } => {
                let parts = parts.clone();
                let result = self.fresh_var();
                for part in parts {
                    if let Some(test) = part.test {
                        let test_ty = self.infer_expression(test);
                        self.make_equal(self.builtins.bool.clone(), test_ty, test);
                    }
                    let body_ty = self.infer_expression(part.body);
                    self.make_equal(body_ty, result.clone(), part.body);
                }
                result
            }

            NodeKind::NestedExpr { inner } => {
                let inner = *inner;
                self.infer_expression(inner)
            }

            NodeKind::BlockExpr { elements } => {
                let elements = elements.clone();
                let mut last_ty = None;
                for &element in &elements {
                    if module.kind(element).is_expression() {
                        last_ty = Some(self.infer_expression(element));
                    } else {
                        self.infer(element);
                        last_ty = None;
                    }
                }
                last_ty.unwrap_or_else(Ty::unit)
            }

            NodeKind::ReturnExpr { value } => {
                let value = *value;
                let value_ty = match value {
                    Some(expr) => self.infer_expression(expr),
                    None => Ty::unit(),
                };
                let ret = self.return_type();
                self.make_equal(value_ty, ret, x);
                // A return never produces a value in place.
                self.fresh_var()
            }

            NodeKind::FnExpr { params, body } => {
                let (params, body) = (params.clone(), *body);
                let mut param_types = Vec::new();
                for param in params {
                    param_types.push(self.infer_pattern(param));
                }
                let body_ty = self.infer_expression(body);
                Ty::build_arrow(param_types, body_ty)
            }

            other => {
                debug_assert!(false, "not an expression: {other:?}");
                self.fresh_var()
            }
        };

        self.finish_expr(x, ty)
    }

    fn finish_expr(&mut self, x: NodeId, ty: Ty) -> Ty {
        self.node_types.insert(x, ty.clone());
        ty
    }

    fn infer_literal(&mut self, value: LitValue) -> Ty {
        match value {
            LitValue::Int(_) => self.builtins.int.clone(),
            LitValue::Str(_) => self.builtins.string.clone(),
        }
    }

    // ── Patterns ───────────────────────────────────────────────────────

    pub(crate) fn infer_pattern(&mut self, pattern: NodeId) -> Ty {
        let module = self.module;
        match module.kind(pattern) {
            NodeKind::BindPat { name } => {
                let name = name.clone();
                let ty = self.fresh_var();
                self.add_binding(&name.text, Scheme::mono(ty.clone()), SymbolKind::Var);
                ty
            }
            NodeKind::LiteralPat { value } => self.infer_literal(value.clone()),
            NodeKind::NamedTuplePat { name, args } => {
                let (name, args) = (name.clone(), args.clone());
                let scheme = self
                    .lookup(&name.text, SymbolKind::Constructor)
                    .or_else(|| self.lookup(&name.text, SymbolKind::Var));
                let mut arg_types = Vec::new();
                for arg in args {
                    arg_types.push(self.infer_pattern(arg));
                }
                let Some(scheme) = scheme else {
                    self.binding_not_found(&name.text, name.range);
                    return self.fresh_var();
                };
                let ctor_ty = self.instantiate(&scheme, pattern);
                let result = self.fresh_var();
                let arrow = Ty::build_arrow(arg_types, result.clone());
                self.make_equal(ctor_ty, arrow, pattern);
                result
            }
            NodeKind::RecordPat { fields } => {
                let fields = fields.clone();
                self.infer_record_pattern_fields(&fields)
            }
            NodeKind::NamedRecordPat { name, fields } => {
                let (name, fields) = (name.clone(), fields.clone());
                let scheme = self
                    .lookup(&name.text, SymbolKind::Constructor)
                    .or_else(|| self.lookup(&name.text, SymbolKind::Var));
                let Some(scheme) = scheme else {
                    self.binding_not_found(&name.text, name.range);
                    return self.fresh_var();
                };
                let row = self.infer_record_pattern_fields(&fields);
                let ctor_ty = self.instantiate(&scheme, pattern);
                let result = self.fresh_var();
                let arrow = Ty::Arrow(Box::new(row), Box::new(result.clone()));
                self.make_equal(ctor_ty, arrow, pattern);
                result
            }
            NodeKind::TuplePat { elements } => {
                let elements = elements.clone();
                let mut types = Vec::new();
                for element in elements {
                    types.push(self.infer_pattern(element));
                }
                Ty::Tuple(types)
            }
            NodeKind::ListPat { elements } => {
                let elements = elements.clone();
                let element_ty = self.fresh_var();
                for element in elements {
                    let ty = self.infer_pattern(element);
                    self.make_equal(element_ty.clone(), ty, pattern);
                }
                Ty::App(
                    Box::new(self.builtins.list.clone()),
                    Box::new(element_ty),
                )
            }
            NodeKind::NestedPat { inner } => {
                let inner = *inner;
                self.infer_pattern(inner)
            }
            other => {
                debug_assert!(false, "not a pattern: {other:?}");
                self.fresh_var()
            }
        }
    }

    fn infer_record_pattern_fields(
        &mut self,
        fields: &[bolt_parser::cst::RecordPatField],
    ) -> Ty {
        // The `..` field decides the tail: a sub-pattern constrains it, a
        // bare `..` leaves the row open, and no `..` closes it.
        let rest_field = fields.iter().find(|f| f.dotdot);
        let mut row = match rest_field {
            None => Ty::Nil,
            Some(field) => match field.pattern {
                Some(pattern) => self.infer_pattern(pattern),
                None => self.fresh_var(),
            },
        };
        for field in fields {
            if field.dotdot {
                continue;
            }
            let Some(name) = &field.name else {
                continue;
            };
            let field_ty = match field.pattern {
                Some(pattern) => self.infer_pattern(pattern),
                None => {
                    let ty = self.fresh_var();
                    self.add_binding(&name.text, Scheme::mono(ty.clone()), SymbolKind::Var);
                    ty
                }
            };
            row = Ty::Field(
                name.text.clone(),
                Box::new(Ty::Present(Box::new(field_ty))),
                Box::new(row),
            );
        }
        row
    }

    // ── Type expressions ───────────────────────────────────────────────

    pub(crate) fn infer_type_expr(&mut self, te: NodeId, auto_vars: bool) -> Ty {
        let module = self.module;
        let ty = match module.kind(te) {
            NodeKind::RefTypeExpr { name } => {
                let name = name.clone();
                match self.lookup(&name.text, SymbolKind::Type) {
                    Some(scheme) => self.instantiate(&scheme, te),
                    None => {
                        self.binding_not_found(&name.text, name.range);
                        self.fresh_var()
                    }
                }
            }
            NodeKind::AppTypeExpr { op, args } => {
                let (op, args) = (*op, args.clone());
                let mut ty = self.infer_type_expr(op, auto_vars);
                for arg in args {
                    let arg_ty = self.infer_type_expr(arg, auto_vars);
                    ty = Ty::App(Box::new(ty), Box::new(arg_ty));
                }
                ty
            }
            NodeKind::VarTypeExpr { name } => {
                let name = name.clone();
                match self.lookup_mono(&name.text, SymbolKind::Type) {
                    Some(ty) => ty,
                    None => {
                        if !auto_vars {
                            self.binding_not_found(&name.text, name.range);
                        }
                        let rigid = self.create_rigid(&name.text);
                        self.add_binding(
                            &name.text,
                            Scheme::mono(rigid.clone()),
                            SymbolKind::Type,
                        );
                        rigid
                    }
                }
            }
            NodeKind::RecordTypeExpr { fields, rest } => {
                let (fields, rest) = (fields.clone(), *rest);
                let mut row = match rest {
                    Some(rest) => self.infer_type_expr(rest, auto_vars),
                    None => Ty::Nil,
                };
                for field in &fields {
                    let field_ty = self.infer_type_expr(field.ty, auto_vars);
                    row = Ty::Field(
                        field.name.text.clone(),
                        Box::new(Ty::Present(Box::new(field_ty))),
                        Box::new(row),
                    );
                }
                row
            }
            NodeKind::TupleTypeExpr { elements } => {
                let elements = elements.clone();
                let mut types = Vec::new();
                for element in elements {
                    types.push(self.infer_type_expr(element, auto_vars));
                }
                Ty::Tuple(types)
            }
            NodeKind::NestedTypeExpr { inner } => {
                let inner = *inner;
                self.infer_type_expr(inner, auto_vars)
            }
            NodeKind::ArrowTypeExpr { params, ret } => {
                let (params, ret) = (params.clone(), *ret);
                let mut param_types = Vec::new();
                for param in params {
                    param_types.push(self.infer_type_expr(param, auto_vars));
                }
                let ret_ty = self.infer_type_expr(ret, auto_vars);
                Ty::build_arrow(param_types, ret_ty)
            }
            NodeKind::QualifiedTypeExpr { constraints, body } => {
                let (constraints, body) = (constraints.clone(), *body);
                for constraint in constraints {
                    self.infer_constraint_expr(constraint);
                }
                self.infer_type_expr(body, auto_vars)
            }
            other => {
                debug_assert!(false, "not a type expression: {other:?}");
                self.fresh_var()
            }
        };
        self.node_types.insert(te, ty.clone());
        ty
    }

    fn infer_constraint_expr(&mut self, constraint: NodeId) {
        let module = self.module;
        match module.kind(constraint) {
            NodeKind::ClassConstraint { name, args } => {
                let (name, args) = (name.clone(), args.clone());
                if self
                    .scopes
                    .lookup_from(
                        module,
                        constraint,
                        &SymbolPath::plain(name.text.clone()),
                        SymbolKind::Class,
                    )
                    .is_none()
                {
                    self.errors.push(TypeError::ClassNotFound {
                        name: name.text.clone(),
                        range: name.range,
                    });
                }
                for arg in args {
                    let ty = self.infer_type_expr(arg, true);
                    if let Ty::Rigid(r) = ty {
                        self.rigids[r.0 as usize].provided.insert(name.text.clone());
                    }
                }
            }
            NodeKind::EqualityConstraint { left, right } => {
                let (left, right) = (*left, *right);
                let left_ty = self.infer_type_expr(left, true);
                let right_ty = self.infer_type_expr(right, true);
                self.make_equal(left_ty, right_ty, constraint);
            }
            other => debug_assert!(false, "not a constraint expression: {other:?}"),
        }
    }

    // ── Entry point ────────────────────────────────────────────────────

    /// Check the whole module.
    pub fn check(&mut self) {
        let root = self.module.root();
        self.initialize(root);
        let root_ctx = self.node_ctx[&root];
        self.active = Some(root_ctx);
        self.install_builtins();

        self.populate(root);
        self.forward_declare(root);

        let sccs = self.ref_graph.strong_connect();
        for scc in sccs {
            for node in scc {
                if self.module.let_decl(node).is_some() {
                    self.forward_declare_function(node);
                }
            }
        }

        self.active = Some(root_ctx);
        self.infer(root);

        // Eager-solving shortcuts must not fire while draining the final
        // queue.
        self.active = None;
        let constraints = std::mem::take(&mut self.contexts[root_ctx.0].constraints);
        self.solve(Constraint::Many(constraints));

        // Replace every recorded type by its most-solved form.
        let ids: Vec<NodeId> = self.node_types.keys().copied().collect();
        for id in ids {
            let ty = self.node_types[&id].clone();
            let solved = self.resolve_deep(&ty);
            self.node_types.insert(id, solved);
        }
        let errors = std::mem::take(&mut self.errors);
        self.errors = errors
            .into_iter()
            .map(|e| self.resolve_error(e))
            .collect();
    }

    fn resolve_error(&mut self, error: TypeError) -> TypeError {
        match error {
            TypeError::UnificationError {
                left,
                right,
                left_path,
                right_path,
                source,
            } => TypeError::UnificationError {
                left: self.resolve_deep(&left),
                right: self.resolve_deep(&right),
                left_path,
                right_path,
                source,
            },
            TypeError::FieldNotFound {
                field,
                ty,
                path,
                source,
            } => TypeError::FieldNotFound {
                field,
                ty: self.resolve_deep(&ty),
                path,
                source,
            },
            TypeError::InstanceNotFound { class, ty, source } => TypeError::InstanceNotFound {
                class,
                ty: self.resolve_deep(&ty),
                source,
            },
            TypeError::TupleIndexOutOfRange { ty, index, source } => {
                TypeError::TupleIndexOutOfRange {
                    ty: self.resolve_deep(&ty),
                    index,
                    source,
                }
            }
            TypeError::InvalidTypeForTypeclass {
                ty,
                classes,
                source,
            } => TypeError::InvalidTypeForTypeclass {
                ty: self.resolve_deep(&ty),
                classes,
                source,
            },
            TypeError::NotATuple { ty, source } => TypeError::NotATuple {
                ty: self.resolve_deep(&ty),
                source,
            },
            other => other,
        }
    }

    /// The inferred head type of an instance declaration.
    pub(crate) fn instance_head_type(&self, instance: NodeId) -> Option<Ty> {
        let NodeKind::InstanceDecl { ty_exprs, .. } = self.module.kind(instance) else {
            return None;
        };
        let first = ty_exprs.first()?;
        self.node_types.get(first).cloned()
    }
}
