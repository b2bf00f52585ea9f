//! The fixed-point constraint solver.
//!
//! A FIFO queue drains one constraint at a time. `Field` constraints whose
//! tuple side is still an unresolved variable park in a secondary queue;
//! when the main queue empties, the secondary queue swaps back in if any
//! unification assigned a variable since the last swap. When no progress
//! was made, the parked constraints can never resolve and are reported.
//! Termination follows because every join strictly reduces the number of
//! free variables.

use std::collections::VecDeque;

use crate::constraint::Constraint;
use crate::error::TypeError;
use crate::infer::Checker;
use crate::ty::Ty;

impl Checker<'_> {
    pub(crate) fn solve(&mut self, constraint: Constraint) {
        let mut queue = std::mem::take(&mut self.queue);
        queue.push_back(constraint);
        let mut next_queue: VecDeque<Constraint> = VecDeque::new();
        let mut did_join = false;

        loop {
            let Some(constraint) = queue.pop_front() else {
                if next_queue.is_empty() {
                    break;
                }
                if !did_join {
                    // No assignment since the last swap: the parked
                    // constraints are unsolvable.
                    for parked in next_queue.drain(..) {
                        if let Constraint::Field { tuple, source, .. } = parked {
                            let ty = self.shallow_resolve(tuple);
                            self.errors.push(TypeError::NotATuple { ty, source });
                        }
                    }
                    break;
                }
                did_join = false;
                std::mem::swap(&mut queue, &mut next_queue);
                continue;
            };

            match constraint {
                Constraint::Empty => {}
                Constraint::Many(elements) => queue.extend(elements),
                Constraint::Equal {
                    left,
                    right,
                    source,
                } => {
                    if self.unify(&left, &right, source) {
                        did_join = true;
                    }
                }
                Constraint::Field {
                    tuple,
                    index,
                    field,
                    source,
                } => {
                    let resolved = self.shallow_resolve(tuple.clone());
                    match resolved {
                        Ty::Tuple(elements) => {
                            if index >= elements.len() {
                                self.errors.push(TypeError::TupleIndexOutOfRange {
                                    ty: Ty::Tuple(elements),
                                    index,
                                    source,
                                });
                            } else {
                                self.unify(&elements[index], &field, source);
                            }
                        }
                        Ty::Var(_) => next_queue.push_back(Constraint::Field {
                            tuple,
                            index,
                            field,
                            source,
                        }),
                        other => {
                            self.errors.push(TypeError::NotATuple { ty: other, source });
                        }
                    }
                }
            }
        }
    }
}
