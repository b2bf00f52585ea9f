//! Resolution, substitution, and the unifier.
//!
//! The union-find table over unification variables lives on the
//! [`Checker`]; this module adds the operations that read and mutate it:
//! shallow/deep resolution, the occurs check, scheme substitution, and
//! the structural unifier with row rewriting and class propagation.
//!
//! The unifier tracks a [`TypePath`] per side so a failure deep inside a
//! compound type can be attributed to the exact failing sub-term.

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use bolt_parser::cst::NodeId;

use crate::error::TypeError;
use crate::infer::Checker;
use crate::ty::{ClassSet, Quant, Ty, TyVar, TypeIndex, TypePath};

impl Checker<'_> {
    /// Follow the union-find one level: bound variables resolve to their
    /// value, unbound variables normalize to their root key.
    pub(crate) fn shallow_resolve(&mut self, ty: Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(v) {
                Some(inner) => self.shallow_resolve(inner),
                None => Ty::Var(self.table.find(v)),
            },
            other => other,
        }
    }

    /// Fully resolve a type, rebuilding compound types over resolved
    /// children. Unbound variables normalize to their roots.
    pub(crate) fn resolve_deep(&mut self, ty: &Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(*v) {
                Some(inner) => self.resolve_deep(&inner),
                None => Ty::Var(self.table.find(*v)),
            },
            Ty::Rigid(_) | Ty::Con(_) | Ty::Nil | Ty::Absent => ty.clone(),
            Ty::App(op, arg) => Ty::App(
                Box::new(self.resolve_deep(op)),
                Box::new(self.resolve_deep(arg)),
            ),
            Ty::Arrow(param, ret) => Ty::Arrow(
                Box::new(self.resolve_deep(param)),
                Box::new(self.resolve_deep(ret)),
            ),
            Ty::Tuple(elements) => {
                Ty::Tuple(elements.iter().map(|e| self.resolve_deep(e)).collect())
            }
            Ty::Present(inner) => Ty::Present(Box::new(self.resolve_deep(inner))),
            Ty::Field(name, inner, rest) => Ty::Field(
                name.clone(),
                Box::new(self.resolve_deep(inner)),
                Box::new(self.resolve_deep(rest)),
            ),
        }
    }

    /// Whether `root` occurs anywhere beneath `ty`, following bindings.
    pub(crate) fn occurs_in(&mut self, root: TyVar, ty: &Ty) -> bool {
        match ty {
            Ty::Var(v) => match self.table.probe_value(*v) {
                Some(inner) => self.occurs_in(root, &inner),
                None => self.table.find(*v) == root,
            },
            Ty::Rigid(_) | Ty::Con(_) | Ty::Nil | Ty::Absent => false,
            Ty::App(op, arg) => self.occurs_in(root, op) || self.occurs_in(root, arg),
            Ty::Arrow(param, ret) => self.occurs_in(root, param) || self.occurs_in(root, ret),
            Ty::Tuple(elements) => {
                for element in elements {
                    if self.occurs_in(root, element) {
                        return true;
                    }
                }
                false
            }
            Ty::Present(inner) => self.occurs_in(root, inner),
            Ty::Field(_, inner, rest) => self.occurs_in(root, inner) || self.occurs_in(root, rest),
        }
    }

    /// Collect the free quantifiable variables of `ty` (resolved roots).
    pub(crate) fn free_quants(&mut self, ty: &Ty, out: &mut FxHashSet<Quant>) {
        match ty {
            Ty::Var(v) => match self.table.probe_value(*v) {
                Some(inner) => self.free_quants(&inner, out),
                None => {
                    out.insert(Quant::Var(self.table.find(*v)));
                }
            },
            Ty::Rigid(r) => {
                out.insert(Quant::Rigid(*r));
            }
            Ty::Con(_) | Ty::Nil | Ty::Absent => {}
            Ty::App(op, arg) => {
                self.free_quants(op, out);
                self.free_quants(arg, out);
            }
            Ty::Arrow(param, ret) => {
                self.free_quants(param, out);
                self.free_quants(ret, out);
            }
            Ty::Tuple(elements) => {
                for element in elements {
                    self.free_quants(element, out);
                }
            }
            Ty::Present(inner) => self.free_quants(inner, out),
            Ty::Field(_, inner, rest) => {
                self.free_quants(inner, out);
                self.free_quants(rest, out);
            }
        }
    }

    /// Rewrite `ty`, replacing quantified variables found in `sub` with
    /// their substitutes. Bound variables are resolved first, so a
    /// variable that was unified away is never freshened.
    pub(crate) fn substitute(&mut self, ty: &Ty, sub: &FxHashMap<Quant, Ty>) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(*v) {
                Some(inner) => self.substitute(&inner, sub),
                None => {
                    let root = self.table.find(*v);
                    sub.get(&Quant::Var(root))
                        .cloned()
                        .unwrap_or(Ty::Var(root))
                }
            },
            Ty::Rigid(r) => sub.get(&Quant::Rigid(*r)).cloned().unwrap_or(ty.clone()),
            Ty::Con(_) | Ty::Nil | Ty::Absent => ty.clone(),
            Ty::App(op, arg) => Ty::App(
                Box::new(self.substitute(op, sub)),
                Box::new(self.substitute(arg, sub)),
            ),
            Ty::Arrow(param, ret) => Ty::Arrow(
                Box::new(self.substitute(param, sub)),
                Box::new(self.substitute(ret, sub)),
            ),
            Ty::Tuple(elements) => {
                let mut out = Vec::with_capacity(elements.len());
                for element in elements {
                    out.push(self.substitute(element, sub));
                }
                Ty::Tuple(out)
            }
            Ty::Present(inner) => Ty::Present(Box::new(self.substitute(inner, sub))),
            Ty::Field(name, inner, rest) => Ty::Field(
                name.clone(),
                Box::new(self.substitute(inner, sub)),
                Box::new(self.substitute(rest, sub)),
            ),
        }
    }

    /// Unify two types. Returns whether any variable was assigned, which
    /// drives the solver's fixed-point loop.
    pub(crate) fn unify(&mut self, left: &Ty, right: &Ty, source: NodeId) -> bool {
        let mut unifier = Unifier {
            ck: self,
            left: left.clone(),
            right: right.clone(),
            source,
            left_path: Vec::new(),
            right_path: Vec::new(),
            current_field: None,
            did_join: false,
        };
        let (a, b) = (left.clone(), right.clone());
        unifier.unify_tys(a, b, false);
        unifier.did_join
    }
}

/// One unification run: the two top-level types, the source node for
/// error attribution, and the path stacks addressing the sub-terms
/// currently being compared.
struct Unifier<'c, 'a> {
    ck: &'c mut Checker<'a>,
    left: Ty,
    right: Ty,
    source: NodeId,
    left_path: TypePath,
    right_path: TypePath,
    current_field: Option<String>,
    did_join: bool,
}

impl Unifier<'_, '_> {
    fn unify_error(&mut self) {
        self.ck.errors.push(TypeError::UnificationError {
            left: self.left.clone(),
            right: self.right.clone(),
            left_path: self.left_path.clone(),
            right_path: self.right_path.clone(),
            source: self.source,
        });
    }

    fn push_both(&mut self, index: TypeIndex) {
        self.left_path.push(index);
        self.right_path.push(index);
    }

    fn pop_both(&mut self) {
        self.left_path.pop();
        self.right_path.pop();
    }

    fn push_left(&mut self, index: TypeIndex, did_swap: bool) {
        if did_swap {
            self.right_path.push(index);
        } else {
            self.left_path.push(index);
        }
    }

    fn pop_left(&mut self, did_swap: bool) {
        if did_swap {
            self.right_path.pop();
        } else {
            self.left_path.pop();
        }
    }

    fn push_right(&mut self, index: TypeIndex, did_swap: bool) {
        self.push_left(index, !did_swap);
    }

    fn pop_right(&mut self, did_swap: bool) {
        self.pop_left(!did_swap);
    }

    /// Assign `ty` to the unification variable `v` (already a root) and
    /// discharge the variable's class obligations against it.
    fn join(&mut self, v: TyVar, ty: Ty) {
        self.ck
            .table
            .unify_var_value(v, Some(ty.clone()))
            .expect("assigning into an unbound root cannot conflict");
        self.did_join = true;
        let classes = self.ck.var_classes.remove(&v).unwrap_or_default();
        self.propagate_classes(classes, &ty);
    }

    /// Unify the payload slots of two same-named fields, where each side
    /// is `Present`, `Absent`, or a variable standing for either.
    fn unify_field(&mut self, a: Ty, b: Ty, mut did_swap: bool) -> bool {
        let mut a = self.ck.shallow_resolve(a);
        let mut b = self.ck.shallow_resolve(b);
        if a == Ty::Absent && b == Ty::Absent {
            return true;
        }
        if b == Ty::Absent {
            std::mem::swap(&mut a, &mut b);
            did_swap = !did_swap;
        }
        if a == Ty::Absent {
            let field = self.current_field.clone().unwrap_or_default();
            let ty = self.ck.resolve_deep(&self.left.clone());
            self.ck.errors.push(TypeError::FieldNotFound {
                field,
                ty,
                path: self.left_path.clone(),
                source: self.source,
            });
            return false;
        }
        match (a, b) {
            (Ty::Present(a), Ty::Present(b)) => {
                self.push_both(TypeIndex::PresentType);
                let ok = self.unify_tys(*a, *b, did_swap);
                self.pop_both();
                ok
            }
            (a, b) => self.unify_tys(a, b, did_swap),
        }
    }

    fn unify_tys(&mut self, a: Ty, b: Ty, mut did_swap: bool) -> bool {
        let mut a = self.ck.shallow_resolve(a);
        let mut b = self.ck.shallow_resolve(b);

        // Two unification variables: union their equivalence classes and
        // merge the pending class obligations into the new root.
        if let (Ty::Var(va), Ty::Var(vb)) = (&a, &b) {
            let (va, vb) = (*va, *vb);
            if va == vb {
                return true;
            }
            let classes_a = self.ck.var_classes.remove(&va).unwrap_or_default();
            let classes_b = self.ck.var_classes.remove(&vb).unwrap_or_default();
            self.ck
                .table
                .unify_var_var(va, vb)
                .expect("two unbound roots cannot conflict");
            let root = self.ck.table.find(va);
            let mut merged = classes_a;
            merged.extend(classes_b);
            if !merged.is_empty() {
                self.ck.var_classes.insert(root, merged);
            }
            self.did_join = true;
            return true;
        }

        if matches!(b, Ty::Var(_)) {
            std::mem::swap(&mut a, &mut b);
            did_swap = !did_swap;
        }

        if let Ty::Var(v) = &a {
            let v = *v;
            if self.ck.occurs_in(v, &b) {
                // Reported as a plain mismatch, as GHC does: "a cannot
                // match [a]" reads better than an occurs-check reference.
                self.unify_error();
                return false;
            }
            self.join(v, b);
            return true;
        }

        // Rigid variables unify only with themselves.
        if let (Ty::Rigid(ra), Ty::Rigid(rb)) = (&a, &b) {
            if ra == rb {
                return true;
            }
            self.unify_error();
            return false;
        }
        if matches!(a, Ty::Rigid(_)) || matches!(b, Ty::Rigid(_)) {
            self.unify_error();
            return false;
        }

        match (a, b) {
            (Ty::Arrow(pa, ra), Ty::Arrow(pb, rb)) => {
                let mut ok = true;
                self.push_both(TypeIndex::ArrowParam);
                ok &= self.unify_tys(*pa, *pb, did_swap);
                self.pop_both();
                self.push_both(TypeIndex::ArrowReturn);
                ok &= self.unify_tys(*ra, *rb, did_swap);
                self.pop_both();
                ok
            }
            (Ty::App(opa, arga), Ty::App(opb, argb)) => {
                let mut ok = true;
                self.push_both(TypeIndex::AppOp);
                ok &= self.unify_tys(*opa, *opb, did_swap);
                self.pop_both();
                self.push_both(TypeIndex::AppArg);
                ok &= self.unify_tys(*arga, *argb, did_swap);
                self.pop_both();
                ok
            }
            (Ty::Tuple(ea), Ty::Tuple(eb)) => {
                if ea.len() != eb.len() {
                    self.unify_error();
                    return false;
                }
                let mut ok = true;
                for (i, (x, y)) in ea.into_iter().zip(eb).enumerate() {
                    self.push_both(TypeIndex::TupleElement(i));
                    ok &= self.unify_tys(x, y, did_swap);
                    self.pop_both();
                }
                ok
            }
            (Ty::Con(ca), Ty::Con(cb)) => {
                if ca.id == cb.id {
                    true
                } else {
                    self.unify_error();
                    false
                }
            }
            (Ty::Nil, Ty::Nil) => true,
            (Ty::Field(na, ta, resta), Ty::Field(nb, tb, restb)) => {
                if na == nb {
                    let mut ok = true;
                    self.push_both(TypeIndex::FieldType);
                    self.current_field = Some(na);
                    ok &= self.unify_field(*ta, *tb, did_swap);
                    self.pop_both();
                    self.push_both(TypeIndex::FieldRest);
                    ok &= self.unify_tys(*resta, *restb, did_swap);
                    self.pop_both();
                    return ok;
                }
                // Row permutation: rewrite each side so the other's head
                // field appears behind a fresh shared rest.
                let fresh_rest = self.ck.fresh_var();
                let mut ok = true;
                self.push_left(TypeIndex::FieldRest, did_swap);
                let rewritten = Ty::Field(nb, tb, Box::new(fresh_rest.clone()));
                ok &= self.unify_tys(*resta, rewritten, did_swap);
                self.pop_left(did_swap);
                self.push_right(TypeIndex::FieldRest, did_swap);
                let rewritten = Ty::Field(na, ta, Box::new(fresh_rest));
                ok &= self.unify_tys(rewritten, *restb, did_swap);
                self.pop_right(did_swap);
                ok
            }
            (Ty::Nil, b @ Ty::Field(..)) => {
                did_swap = !did_swap;
                self.unify_field_against_nil(b, did_swap)
            }
            (a @ Ty::Field(..), Ty::Nil) => self.unify_field_against_nil(a, did_swap),
            _ => {
                self.unify_error();
                false
            }
        }
    }

    /// A field required on one side while the other row is closed: the
    /// field must be absent, and the rest must also be empty.
    fn unify_field_against_nil(&mut self, field_ty: Ty, did_swap: bool) -> bool {
        let Ty::Field(name, ty, rest) = field_ty else {
            unreachable!("caller matched a field");
        };
        let mut ok = true;
        self.push_left(TypeIndex::FieldType, did_swap);
        self.current_field = Some(name);
        ok &= self.unify_field(*ty, Ty::Absent, did_swap);
        self.pop_left(did_swap);
        self.push_left(TypeIndex::FieldRest, did_swap);
        ok &= self.unify_tys(*rest, Ty::Nil, did_swap);
        self.pop_left(did_swap);
        ok
    }

    // ── Type-class propagation ─────────────────────────────────────────

    /// Discharge a set of class obligations against an assigned type.
    fn propagate_classes(&mut self, classes: ClassSet, ty: &Ty) {
        match ty {
            Ty::Var(v) => {
                let root = self.ck.table.find(*v);
                if !classes.is_empty() {
                    self.ck
                        .var_classes
                        .entry(root)
                        .or_default()
                        .extend(classes);
                }
            }
            Ty::Rigid(r) => {
                let info = &mut self.ck.rigids[r.0 as usize];
                info.context.extend(classes);
                let mut missing: Vec<String> = info
                    .context
                    .iter()
                    .filter(|class| !info.provided.contains(*class))
                    .cloned()
                    .collect();
                missing.sort();
                for class in missing {
                    self.ck.errors.push(TypeError::TypeclassMissing {
                        class,
                        var: ty.clone(),
                        source: self.source,
                    });
                }
            }
            Ty::Con(_) | Ty::App(..) => {
                let (op, args) = type_sig(ty);
                let mut classes: Vec<String> = classes.into_iter().collect();
                classes.sort();
                for class in classes {
                    self.propagate_class_con(&class, ty, &op, &args);
                }
            }
            _ => {
                if !classes.is_empty() {
                    let mut classes: Vec<String> = classes.into_iter().collect();
                    classes.sort();
                    self.ck.errors.push(TypeError::InvalidTypeForTypeclass {
                        ty: ty.clone(),
                        classes,
                        source: self.source,
                    });
                }
            }
        }
    }

    /// Match a class obligation against the instance map by head
    /// constructor, then push the instance's argument contexts down into
    /// the type arguments.
    fn propagate_class_con(&mut self, class: &str, orig: &Ty, op: &Ty, args: &[Ty]) {
        let contexts = self.find_instance_context(class, orig, op, args.len());
        for (classes, arg) in contexts.into_iter().zip(args) {
            self.propagate_classes(classes, arg);
        }
    }

    /// Argument class contexts of the matching instance, or empty
    /// contexts (plus a diagnostic) when no instance matches.
    fn find_instance_context(
        &mut self,
        class: &str,
        orig: &Ty,
        op: &Ty,
        arg_count: usize,
    ) -> Vec<ClassSet> {
        let instances = self
            .ck
            .instance_map
            .get(class)
            .cloned()
            .unwrap_or_default();
        for instance in instances {
            let Some(head) = self.ck.instance_head_type(instance) else {
                continue;
            };
            let head = self.ck.shallow_resolve(head);
            if con_head_id(&head) == con_head_id(op) && con_head_id(op).is_some() {
                return vec![ClassSet::default(); arg_count];
            }
        }
        self.ck.errors.push(TypeError::InstanceNotFound {
            class: class.to_string(),
            ty: orig.clone(),
            source: self.source,
        });
        vec![ClassSet::default(); arg_count]
    }
}

/// Split a left-associated application spine into its head and arguments.
fn type_sig(ty: &Ty) -> (Ty, Vec<Ty>) {
    let mut args = Vec::new();
    let mut current = ty;
    while let Ty::App(op, arg) = current {
        args.push((**arg).clone());
        current = op;
    }
    args.reverse();
    (current.clone(), args)
}

/// The constructor id at the head of an application spine, if any.
fn con_head_id(ty: &Ty) -> Option<u32> {
    match ty {
        Ty::Con(con) => Some(con.id),
        Ty::App(op, _) => con_head_id(op),
        _ => None,
    }
}
