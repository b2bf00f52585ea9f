//! Bolt type checker: Hindley-Milner inference with type classes,
//! row-polymorphic records, and equality constraints.
//!
//! # Architecture
//!
//! - [`ty`]: type representation (`Ty`, schemes, type paths)
//! - [`graph`]: the reference graph and its SCCs (generalization units)
//! - [`constraint`]: constraints as data
//! - [`infer`]: two-phase constraint generation over the CST
//! - [`unify`]: union-find resolution, the row-rewriting unifier, and
//!   type-class propagation
//! - [`solver`]: the fixed-point constraint queue
//! - [`error`] / [`render`]: accumulated type errors and their lowering
//!   into shared diagnostics

pub mod builtins;
pub mod constraint;
pub mod error;
pub mod graph;
pub mod infer;
pub mod render;
pub mod solver;
pub mod ty;
pub mod unify;

use rustc_hash::FxHashMap;

use bolt_common::diagnostics::Diagnostic;
use bolt_parser::cst::NodeId;
use bolt_parser::scope::ScopeTable;
use bolt_parser::Parse;

use crate::error::TypeError;
use crate::infer::Checker;
use crate::ty::Ty;

pub use crate::render::display_ty;

/// The result of checking one source module.
pub struct TypeckResult {
    /// Fully solved types, keyed by CST node.
    pub types: FxHashMap<NodeId, Ty>,
    /// The raw accumulated type errors.
    pub errors: Vec<TypeError>,
    /// The same errors, lowered for rendering.
    pub diagnostics: Vec<Diagnostic>,
    /// Display names of rigid variables, indexed by `RigidVar`.
    pub rigid_names: Vec<String>,
}

impl TypeckResult {
    pub fn type_of(&self, node: NodeId) -> Option<&Ty> {
        self.types.get(&node)
    }

    /// Render a type from this check run for display.
    pub fn display(&self, ty: &Ty) -> String {
        render::display_ty(ty, &self.rigid_names)
    }
}

/// Type-check a parsed module.
///
/// A single call is atomic from the caller's point of view: all types and
/// diagnostics refer to the returned result, and errors are accumulated,
/// never thrown.
pub fn check(parse: &Parse, scopes: &ScopeTable) -> TypeckResult {
    let mut checker = Checker::new(&parse.module, scopes);
    checker.check();
    checker.into_result(&parse.module)
}

impl Checker<'_> {
    fn into_result(self, module: &bolt_parser::cst::SourceModule) -> TypeckResult {
        let rigid_names: Vec<String> = self.rigids.iter().map(|r| r.name.clone()).collect();
        let diagnostics = render::lower_errors(&self.errors, module, &rigid_names);
        TypeckResult {
            types: self.node_types,
            errors: self.errors,
            diagnostics,
            rigid_names,
        }
    }
}
