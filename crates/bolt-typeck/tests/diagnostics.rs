//! Diagnostic codes and accumulation behavior.

use bolt_common::diagnostics::codes;
use bolt_typeck::error::TypeError;
use bolt_typeck::ty::Ty;
use bolt_typeck::TypeckResult;

fn check(source: &str) -> TypeckResult {
    let parse = bolt_parser::parse(source, false);
    assert!(
        parse.diagnostics.is_empty(),
        "unexpected parse diagnostics: {:#?}",
        parse.diagnostics
    );
    let scopes = parse.scopes();
    bolt_typeck::check(&parse, &scopes)
}

fn codes_of(typeck: &TypeckResult) -> Vec<u32> {
    typeck.diagnostics.iter().map(|d| d.code).collect()
}

#[test]
fn annotated_mismatch_reports_both_types() {
    let typeck = check("let a: Int = \"foo\"");
    assert_eq!(codes_of(&typeck), vec![codes::TYPE_MISMATCH]);
    match &typeck.errors[0] {
        TypeError::UnificationError { left, right, .. } => {
            assert_eq!(typeck.display(left), "Int");
            assert_eq!(typeck.display(right), "String");
        }
        other => panic!("expected a unification error, got {other:?}"),
    }
}

#[test]
fn unknown_binding_is_reported_and_recovered() {
    let typeck = check("let a = missing");
    assert_eq!(codes_of(&typeck), vec![codes::BINDING_NOT_FOUND]);
}

#[test]
fn occurs_check_reports_a_mismatch() {
    let typeck = check("let apply_self f = f f");
    assert_eq!(codes_of(&typeck), vec![codes::TYPE_MISMATCH]);
}

#[test]
fn branch_test_must_be_bool() {
    let typeck = check("let x = if 1 then 2 else 3");
    assert_eq!(codes_of(&typeck), vec![codes::TYPE_MISMATCH]);
}

#[test]
fn tuple_index_out_of_range() {
    let typeck = check("let p = (1, 2)\np.5");
    assert_eq!(codes_of(&typeck), vec![codes::TUPLE_INDEX_OUT_OF_RANGE]);
}

#[test]
fn indexing_a_non_tuple_is_reported() {
    let typeck = check("let n = 1\nn.0");
    assert_eq!(codes_of(&typeck), vec![codes::NOT_A_TUPLE]);
}

#[test]
fn errors_accumulate_across_statements() {
    let typeck = check("let a: Int = \"one\"\nlet b: Int = \"two\"");
    assert_eq!(
        codes_of(&typeck),
        vec![codes::TYPE_MISMATCH, codes::TYPE_MISMATCH]
    );
}

#[test]
fn solver_recovers_after_a_failure() {
    // The first statement fails; the second must still get a type.
    let typeck = check("let a: Int = \"one\"\nlet b = 1 + 2");
    assert_eq!(codes_of(&typeck), vec![codes::TYPE_MISMATCH]);
    let int_count = typeck
        .types
        .values()
        .filter(|ty| matches!(ty, Ty::Con(con) if con.name == "Int"))
        .count();
    assert!(int_count > 0, "later statements still receive types");
}
