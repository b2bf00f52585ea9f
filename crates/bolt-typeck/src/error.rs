//! Type errors, accumulated during checking and lowered into shared
//! diagnostics afterwards.
//!
//! Errors carry live types and type paths; the final rendering resolves
//! them against the union-find state, so an error reported early still
//! displays the most-solved form of its types.

use bolt_common::text::TextRange;
use bolt_parser::cst::NodeId;

use crate::ty::{Ty, TypePath};

#[derive(Clone, Debug)]
pub enum TypeError {
    /// A name could not be resolved.
    BindingNotFound { name: String, range: TextRange },
    /// Two types failed to unify. Carries both top-level types and the
    /// paths to the failing sub-terms.
    UnificationError {
        left: Ty,
        right: Ty,
        left_path: TypePath,
        right_path: TypePath,
        source: NodeId,
    },
    /// Row unification required a field the other row lacks.
    FieldNotFound {
        field: String,
        ty: Ty,
        path: TypePath,
        source: NodeId,
    },
    /// A rigid variable picked up a class obligation its annotation does
    /// not declare.
    TypeclassMissing {
        class: String,
        var: Ty,
        source: NodeId,
    },
    /// No instance declaration matches a class/type pair.
    InstanceNotFound {
        class: String,
        ty: Ty,
        source: NodeId,
    },
    /// Reference to an undeclared class.
    ClassNotFound { name: String, range: TextRange },
    /// `.i` access with `i` past the end of the tuple.
    TupleIndexOutOfRange {
        ty: Ty,
        index: usize,
        source: NodeId,
    },
    /// A class constraint applied to a structurally unsuitable type.
    InvalidTypeForTypeclass {
        ty: Ty,
        classes: Vec<String>,
        source: NodeId,
    },
    /// `.i` access on something that never resolves to a tuple.
    NotATuple { ty: Ty, source: NodeId },
}
