//! End-to-end inference tests over small programs.

use bolt_parser::cst::{NodeId, NodeKind};
use bolt_parser::Parse;
use bolt_typeck::ty::Ty;
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

fn assert_clean(typeck: &TypeckResult) {
    assert!(
        typeck.errors.is_empty(),
        "unexpected type errors: {:#?}",
        typeck.errors
    );
}

/// The declaration node of the top-level `let` with the given name.
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

fn type_of_let(parse: &Parse, typeck: &TypeckResult, name: &str) -> Ty {
    typeck
        .type_of(let_node(parse, name))
        .unwrap_or_else(|| panic!("no type recorded for {name}"))
        .clone()
}

/// The type of the last top-level expression statement.
fn last_statement_type(parse: &Parse, typeck: &TypeckResult) -> Ty {
    let root = parse.module.root();
    let NodeKind::SourceFile { elements } = parse.module.kind(root) else {
        panic!("missing source file root");
    };
    let last = *elements
        .iter()
        .rev()
        .find(|&&el| parse.module.kind(el).is_expression())
        .expect("no expression statement");
    typeck.type_of(last).expect("statement has a type").clone()
}

#[test]
fn empty_source_checks_cleanly() {
    let (_, typeck) = check("");
    assert_clean(&typeck);
}

#[test]
fn integer_statement_is_int() {
    let (parse, typeck) = check("1");
    assert_clean(&typeck);
    assert_eq!(typeck.display(&last_statement_type(&parse, &typeck)), "Int");
}

#[test]
fn identity_is_polymorphic() {
    let source = "let id x = x\nlet main = id 42";
    let (parse, typeck) = check(source);
    assert_clean(&typeck);

    // id : a -> a, with both sides the same variable.
    match type_of_let(&parse, &typeck, "id") {
        Ty::Arrow(param, ret) => {
            assert!(matches!(*param, Ty::Var(_)), "param should stay generic");
            assert_eq!(*param, *ret, "identity must return its argument type");
        }
        other => panic!("expected an arrow for id, got {other:?}"),
    }

    assert_eq!(
        typeck.display(&type_of_let(&parse, &typeck, "main")),
        "Int"
    );
}

#[test]
fn swap_infers_tuple_rotation() {
    let source = "let swap p = match p\n  (x, y) -> (y, x)";
    let (parse, typeck) = check(source);
    assert_clean(&typeck);

    match type_of_let(&parse, &typeck, "swap") {
        Ty::Arrow(param, ret) => {
            let Ty::Tuple(input) = *param else {
                panic!("expected a tuple parameter");
            };
            let Ty::Tuple(output) = *ret else {
                panic!("expected a tuple result");
            };
            assert_eq!(input.len(), 2);
            assert_eq!(output.len(), 2);
            assert!(matches!(input[0], Ty::Var(_)));
            assert!(matches!(input[1], Ty::Var(_)));
            assert_ne!(input[0], input[1], "the two elements are independent");
            assert_eq!(input[0], output[1]);
            assert_eq!(input[1], output[0]);
        }
        other => panic!("expected an arrow for swap, got {other:?}"),
    }
}

#[test]
fn swap_instantiates_freshly_per_use() {
    let source = "let swap p = match p\n  (x, y) -> (y, x)\nlet a = swap (1, \"s\")\nlet b = swap (\"t\", 2)";
    let (parse, typeck) = check(source);
    assert_clean(&typeck);
    assert_eq!(
        typeck.display(&type_of_let(&parse, &typeck, "a")),
        "(String, Int)"
    );
    assert_eq!(
        typeck.display(&type_of_let(&parse, &typeck, "b")),
        "(Int, String)"
    );
}

#[test]
fn field_access_is_row_polymorphic() {
    let source = "let get_x r = r.x";
    let (parse, typeck) = check(source);
    assert_clean(&typeck);

    match type_of_let(&parse, &typeck, "get_x") {
        Ty::Arrow(param, ret) => {
            let Ty::Field(name, payload, rest) = *param else {
                panic!("expected a row parameter");
            };
            assert_eq!(name, "x");
            assert_eq!(*payload, *ret, "the field type is the result type");
            assert!(
                matches!(*rest, Ty::Var(_)),
                "the row tail must stay open: {rest:?}"
            );
        }
        other => panic!("expected an arrow for get_x, got {other:?}"),
    }
}

#[test]
fn row_access_on_a_literal_record() {
    let source = "let get_x r = r.x\nlet main = get_x { x = 1, y = 2 }";
    let (parse, typeck) = check(source);
    assert_clean(&typeck);
    assert_eq!(
        typeck.display(&type_of_let(&parse, &typeck, "main")),
        "Int"
    );
}

#[test]
fn mutual_recursion_shares_a_component() {
    let source = "let even n = if n == 0 then True else odd (n - 1)\n\
                  let odd n = if n == 0 then False else even (n - 1)";
    let (parse, typeck) = check(source);
    assert_clean(&typeck);
    assert_eq!(
        typeck.display(&type_of_let(&parse, &typeck, "even")),
        "Int -> Bool"
    );
    assert_eq!(
        typeck.display(&type_of_let(&parse, &typeck, "odd")),
        "Int -> Bool"
    );
}

#[test]
fn block_bodies_type_through_return() {
    let source = "let f x.\n  return x + 1\nlet main = f 2";
    let (parse, typeck) = check(source);
    assert_clean(&typeck);
    assert_eq!(
        typeck.display(&type_of_let(&parse, &typeck, "f")),
        "Int -> Int"
    );
    assert_eq!(
        typeck.display(&type_of_let(&parse, &typeck, "main")),
        "Int"
    );
}

#[test]
fn return_outside_a_function_is_unit() {
    let (_, typeck) = check("return");
    assert_clean(&typeck);
}

#[test]
fn tuple_index_resolves_at_top_level() {
    let source = "let p = (1, \"a\")\np.0";
    let (parse, typeck) = check(source);
    assert_clean(&typeck);
    assert_eq!(typeck.display(&last_statement_type(&parse, &typeck)), "Int");
}

#[test]
fn curried_application_works() {
    let source = "let add x y = x + y\nlet inc = add 1\nlet main = inc 2";
    let (parse, typeck) = check(source);
    assert_clean(&typeck);
    assert_eq!(
        typeck.display(&type_of_let(&parse, &typeck, "inc")),
        "Int -> Int"
    );
    assert_eq!(
        typeck.display(&type_of_let(&parse, &typeck, "main")),
        "Int"
    );
}

#[test]
fn fn_expressions_are_functions() {
    let source = "let twice f x = f (f x)\nlet main = twice (fn n -> n + 1) 0";
    let (parse, typeck) = check(source);
    assert_clean(&typeck);
    assert_eq!(
        typeck.display(&type_of_let(&parse, &typeck, "main")),
        "Int"
    );
}

#[test]
fn variable_declarations_are_monomorphic_bindings() {
    let source = "let mut counter = 0\nlet bump = counter + 1";
    let (parse, typeck) = check(source);
    assert_clean(&typeck);
    assert_eq!(
        typeck.display(&type_of_let(&parse, &typeck, "bump")),
        "Int"
    );
}
