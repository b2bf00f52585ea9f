//! Record declarations, row unification, and record patterns.

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

fn display_of(parse: &Parse, typeck: &TypeckResult, name: &str) -> String {
    typeck.display(typeck.type_of(let_node(parse, name)).expect("typed"))
}

#[test]
fn record_construction_and_matching() {
    let source = "\
struct Point.
  x: Int
  y: Int
let norm p = match p.
  Point { y = yy, x = xx } -> xx + yy
let main = norm (Point { x = 1, y = 2 })";
    let (parse, typeck) = check(source);
    assert!(
        typeck.errors.is_empty(),
        "unexpected errors: {:#?}",
        typeck.errors
    );
    assert_eq!(display_of(&parse, &typeck, "main"), "Int");
    assert_eq!(display_of(&parse, &typeck, "norm"), "Point -> Int");
}

#[test]
fn rows_unify_under_permutation() {
    // The same accessor applied to records written in both orders.
    let source = "\
let get_x r = r.x
let a = get_x { x = 1, y = \"s\" }
let b = get_x { y = \"s\", x = 1 }";
    let (parse, typeck) = check(source);
    assert!(
        typeck.errors.is_empty(),
        "unexpected errors: {:#?}",
        typeck.errors
    );
    assert_eq!(display_of(&parse, &typeck, "a"), "Int");
    assert_eq!(display_of(&parse, &typeck, "b"), "Int");
}

#[test]
fn missing_field_is_reported() {
    let source = "let get_x r = r.x\nlet main = get_x { y = 1 }";
    let (_, typeck) = check(source);
    assert!(
        typeck
            .diagnostics
            .iter()
            .any(|d| d.code == bolt_common::diagnostics::codes::FIELD_NOT_FOUND),
        "expected a field-not-found diagnostic, got {:#?}",
        typeck.diagnostics
    );
}

#[test]
fn record_pattern_with_rest_stays_open() {
    let source = "\
let first { x, .. } = x
let main = first { x = 1, y = 2, z = 3 }";
    let (parse, typeck) = check(source);
    assert!(
        typeck.errors.is_empty(),
        "unexpected errors: {:#?}",
        typeck.errors
    );
    assert_eq!(display_of(&parse, &typeck, "main"), "Int");
}

#[test]
fn parametric_record_constructors_generalize() {
    let source = "\
struct Wrap a.
  value: a
let w1 = Wrap { value = 1 }
let w2 = Wrap { value = \"s\" }";
    let (parse, typeck) = check(source);
    assert!(
        typeck.errors.is_empty(),
        "unexpected errors: {:#?}",
        typeck.errors
    );
    assert_eq!(display_of(&parse, &typeck, "w1"), "Wrap Int");
    assert_eq!(display_of(&parse, &typeck, "w2"), "Wrap String");
}
