//! Type classes: declarations, instances, and constraint propagation.

use bolt_common::diagnostics::codes;
use bolt_parser::cst::NodeId;
use bolt_parser::Parse;
use bolt_typeck::TypeckResult;

fn check(source: &str) -> (Parse, TypeckResult) {
    let parse = bolt_parser::parse(source, false);
    assert!(
        parse.diagnostics.is_empty(),
        "unexpected parse diagnostics: {:#?}",
        parse.diagnostics
    );
    let scopes = parse.scopes();
    let typeck = bolt_typeck::check(&parse, &scopes);
    (parse, typeck)
}

fn let_node(parse: &Parse, name: &str) -> NodeId {
    parse
        .module
        .node_ids()
        .find(|&id| {
            parse.module.let_decl(id).is_some()
                && parse.module.let_name(id).map(|n| n.text.as_str()) == Some(name)
        })
        .unwrap_or_else(|| panic!("no let named {name}"))
}

const EQ_CLASS: &str = "\
class Eq a.
  let eq: a -> a -> Bool
instance Eq Bool.
  let eq x y = True
";

#[test]
fn method_dispatches_through_an_instance() {
    let source = format!("{EQ_CLASS}let main = eq True False");
    let (parse, typeck) = check(&source);
    assert!(
        typeck.errors.is_empty(),
        "unexpected errors: {:#?}",
        typeck.errors
    );
    let main = let_node(&parse, "main");
    assert_eq!(typeck.display(typeck.type_of(main).unwrap()), "Bool");
}

#[test]
fn missing_instance_is_reported() {
    let source = format!("{EQ_CLASS}let main = eq 1 2");
    let (_, typeck) = check(&source);
    assert!(
        typeck
            .diagnostics
            .iter()
            .any(|d| d.code == codes::INSTANCE_NOT_FOUND),
        "expected instance-not-found, got {:#?}",
        typeck.diagnostics
    );
}

#[test]
fn unknown_class_on_instance_is_reported() {
    let source = "instance Ord Bool.\n  let cmp x y = True";
    let (_, typeck) = check(source);
    assert!(
        typeck
            .diagnostics
            .iter()
            .any(|d| d.code == codes::CLASS_NOT_FOUND),
        "expected class-not-found, got {:#?}",
        typeck.diagnostics
    );
}

#[test]
fn qualified_signatures_declare_their_obligations() {
    // The rigid variable carries `Eq` through the qualification, so using
    // `eq` on it is fine.
    let source = format!(
        "{EQ_CLASS}let same: Eq a => a -> a -> Bool\nlet same x y = eq x y"
    );
    // The second `let same` shadows the signature-only declaration; what
    // matters is that the qualified signature checks without complaints.
    let (_, typeck) = check(&source);
    assert!(
        typeck.errors.is_empty(),
        "unexpected errors: {:#?}",
        typeck.errors
    );
}

#[test]
fn unqualified_rigid_variable_rejects_class_obligations() {
    // `a` promises no classes, but the body needs `Eq a`.
    let source = format!("{EQ_CLASS}let same: a -> a -> Bool = fn x y -> eq x y");
    let (_, typeck) = check(&source);
    assert!(
        typeck
            .diagnostics
            .iter()
            .any(|d| d.code == codes::TYPECLASS_MISSING),
        "expected typeclass-missing, got {:#?}",
        typeck.diagnostics
    );
}

#[test]
fn instances_register_per_head_constructor() {
    let source = "\
class Show a.
  let show: a -> String
instance Show Bool.
  let show b = \"bool\"
instance Show Int.
  let show n = \"int\"
let a = show True
let b = show 3";
    let (_, typeck) = check(source);
    assert!(
        typeck.errors.is_empty(),
        "unexpected errors: {:#?}",
        typeck.errors
    );
}
