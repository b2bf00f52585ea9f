//! Constraints as data.
//!
//! Inference emits constraints rather than unifying on the spot (except
//! where constraint placement decides solving eagerly is safe); the solver
//! consumes them as a queue. Keeping constraints first-class is what
//! enables the placement optimization and deferred tuple-index lookups.

use bolt_parser::cst::NodeId;

use crate::ty::Ty;

#[derive(Clone, Debug)]
pub enum Constraint {
    /// The two types must unify; `source` attributes failures.
    Equal {
        left: Ty,
        right: Ty,
        source: NodeId,
    },
    /// Deferred tuple-index lookup: once `tuple` resolves to a tuple, its
    /// `index`th element must equal `field`.
    Field {
        tuple: Ty,
        index: usize,
        field: Ty,
        source: NodeId,
    },
    /// An aggregate; solving recurses into each element.
    Many(Vec<Constraint>),
    /// The identity constraint.
    Empty,
}
