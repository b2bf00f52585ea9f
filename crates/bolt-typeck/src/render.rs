//! Type display and the lowering of type errors into shared diagnostics.

use bolt_common::diagnostics::{codes, Diagnostic};
use bolt_common::text::TextRange;
use bolt_parser::cst::SourceModule;

use crate::error::TypeError;
use crate::ty::{resolve_path, Ty, TypePath};

/// Render a type for human consumption. Unbound unification variables
/// print as `?N`; rigid variables print under their declared name.
pub fn display_ty(ty: &Ty, rigid_names: &[String]) -> String {
    match ty {
        Ty::Var(v) => format!("?{}", v.0),
        Ty::Rigid(r) => rigid_names
            .get(r.0 as usize)
            .cloned()
            .unwrap_or_else(|| format!("'r{}", r.0)),
        Ty::Con(con) => con.name.clone(),
        Ty::App(op, arg) => {
            let arg_str = match **arg {
                Ty::App(..) | Ty::Arrow(..) => format!("({})", display_ty(arg, rigid_names)),
                _ => display_ty(arg, rigid_names),
            };
            format!("{} {}", display_ty(op, rigid_names), arg_str)
        }
        Ty::Arrow(param, ret) => {
            let param_str = match **param {
                Ty::Arrow(..) => format!("({})", display_ty(param, rigid_names)),
                _ => display_ty(param, rigid_names),
            };
            format!("{} -> {}", param_str, display_ty(ret, rigid_names))
        }
        Ty::Tuple(elements) => {
            let inner: Vec<String> = elements
                .iter()
                .map(|e| display_ty(e, rigid_names))
                .collect();
            format!("({})", inner.join(", "))
        }
        Ty::Nil => "{}".to_string(),
        Ty::Absent => "<absent>".to_string(),
        Ty::Present(inner) => display_ty(inner, rigid_names),
        Ty::Field(..) => display_row(ty, rigid_names),
    }
}

/// Render a row type: `{ x: Int, y: Bool }`, `{ x: Int | ?3 }`.
fn display_row(ty: &Ty, rigid_names: &[String]) -> String {
    let mut fields = Vec::new();
    let mut current = ty;
    loop {
        match current {
            Ty::Field(name, payload, rest) => {
                fields.push(format!("{}: {}", name, display_ty(payload, rigid_names)));
                current = rest;
            }
            Ty::Nil => return format!("{{ {} }}", fields.join(", ")),
            tail => {
                return format!(
                    "{{ {} | {} }}",
                    fields.join(", "),
                    display_ty(tail, rigid_names)
                )
            }
        }
    }
}

fn path_note(
    label: &str,
    ty: &Ty,
    path: &TypePath,
    rigid_names: &[String],
) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    let sub = resolve_path(ty, path)?;
    Some(format!(
        "the {label} side fails at `{}` inside `{}`",
        display_ty(sub, rigid_names),
        display_ty(ty, rigid_names)
    ))
}

/// Lower accumulated type errors into shared diagnostic records.
pub(crate) fn lower_errors(
    errors: &[TypeError],
    module: &SourceModule,
    rigid_names: &[String],
) -> Vec<Diagnostic> {
    errors
        .iter()
        .map(|error| lower_error(error, module, rigid_names))
        .collect()
}

fn lower_error(error: &TypeError, module: &SourceModule, rigid_names: &[String]) -> Diagnostic {
    let node_range = |node| -> TextRange { module.range(node) };
    match error {
        TypeError::BindingNotFound { name, range } => {
            Diagnostic::error(codes::BINDING_NOT_FOUND, format!("binding '{name}' not found"))
                .with_range(*range)
                .with_label(*range, "not found in this scope")
        }
        TypeError::UnificationError {
            left,
            right,
            left_path,
            right_path,
            source,
        } => {
            let range = node_range(*source);
            let mut diagnostic = Diagnostic::error(
                codes::TYPE_MISMATCH,
                format!(
                    "type mismatch: expected {}, found {}",
                    display_ty(left, rigid_names),
                    display_ty(right, rigid_names)
                ),
            )
            .with_range(range)
            .with_label(range, "the types disagree here");
            if let Some(note) = path_note("expected", left, left_path, rigid_names) {
                diagnostic = diagnostic.with_note(note);
            }
            if let Some(note) = path_note("found", right, right_path, rigid_names) {
                diagnostic = diagnostic.with_note(note);
            }
            diagnostic
        }
        TypeError::FieldNotFound { field, ty, source, .. } => {
            let range = node_range(*source);
            Diagnostic::error(
                codes::FIELD_NOT_FOUND,
                format!(
                    "field '{field}' is required but `{}` does not have it",
                    display_ty(ty, rigid_names)
                ),
            )
            .with_range(range)
            .with_label(range, format!("field '{field}' is missing"))
        }
        TypeError::TypeclassMissing { class, var, source } => {
            let range = node_range(*source);
            Diagnostic::error(
                codes::TYPECLASS_MISSING,
                format!(
                    "type variable `{}` requires class '{class}' which its annotation does not declare",
                    display_ty(var, rigid_names)
                ),
            )
            .with_range(range)
            .with_label(range, format!("'{class}' obligation arises here"))
        }
        TypeError::InstanceNotFound { class, ty, source } => {
            let range = node_range(*source);
            Diagnostic::error(
                codes::INSTANCE_NOT_FOUND,
                format!(
                    "no instance of '{class}' for `{}`",
                    display_ty(ty, rigid_names)
                ),
            )
            .with_range(range)
            .with_label(range, format!("'{class}' is required here"))
        }
        TypeError::ClassNotFound { name, range } => {
            Diagnostic::error(codes::CLASS_NOT_FOUND, format!("class '{name}' not found"))
                .with_range(*range)
                .with_label(*range, "unknown class")
        }
        TypeError::TupleIndexOutOfRange { ty, index, source } => {
            let range = node_range(*source);
            Diagnostic::error(
                codes::TUPLE_INDEX_OUT_OF_RANGE,
                format!(
                    "tuple index {index} is out of range for `{}`",
                    display_ty(ty, rigid_names)
                ),
            )
            .with_range(range)
            .with_label(range, "index past the end of the tuple")
        }
        TypeError::InvalidTypeForTypeclass { ty, classes, source } => {
            let range = node_range(*source);
            Diagnostic::error(
                codes::INVALID_TYPE_FOR_TYPECLASS,
                format!(
                    "`{}` cannot be an instance of {}",
                    display_ty(ty, rigid_names),
                    classes
                        .iter()
                        .map(|c| format!("'{c}'"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )
            .with_range(range)
            .with_label(range, "not a class-compatible type")
        }
        TypeError::NotATuple { ty, source } => {
            let range = node_range(*source);
            Diagnostic::error(
                codes::NOT_A_TUPLE,
                format!("`{}` is not a tuple", display_ty(ty, rigid_names)),
            )
            .with_range(range)
            .with_label(range, "indexed access needs a tuple")
        }
    }
}
