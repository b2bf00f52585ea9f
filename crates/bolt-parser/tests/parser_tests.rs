//! Parser and scope-builder integration tests.

use bolt_parser::cst::{Fixity, LetBody, Member, NodeId, NodeKind};
use bolt_parser::scope::{SymbolKind, SymbolPath};
use bolt_parser::Parse;

fn parse_clean(source: &str) -> Parse {
    let parse = bolt_parser::parse(source, false);
    assert!(
        parse.diagnostics.is_empty(),
        "unexpected diagnostics: {:#?}",
        parse.diagnostics
    );
    parse
}

fn top_elements(parse: &Parse) -> Vec<NodeId> {
    match parse.module.kind(parse.module.root()) {
        NodeKind::SourceFile { elements } => elements.clone(),
        other => panic!("expected a source file root, got {other:?}"),
    }
}

#[test]
fn empty_file_parses_to_an_empty_root() {
    let parse = parse_clean("");
    assert!(top_elements(&parse).is_empty());
}

#[test]
fn named_function_with_params() {
    let parse = parse_clean("let add x y = x");
    let elements = top_elements(&parse);
    assert_eq!(elements.len(), 1);
    let decl = parse.module.let_decl(elements[0]).expect("a let");
    assert_eq!(decl.fixity, Fixity::Named);
    assert_eq!(decl.params.len(), 2);
    assert!(matches!(decl.body, Some(LetBody::Expr(_))));
    assert_eq!(parse.module.let_name(elements[0]).unwrap().text, "add");
    assert!(parse.module.let_is_function(elements[0]));
}

#[test]
fn mut_let_is_a_variable() {
    let parse = parse_clean("let mut x = 1");
    let elements = top_elements(&parse);
    assert!(parse.module.let_is_variable(elements[0]));
}

#[test]
fn infix_operator_declaration() {
    let parse = parse_clean("let x <> y = x");
    let elements = top_elements(&parse);
    let decl = parse.module.let_decl(elements[0]).expect("a let");
    assert_eq!(decl.fixity, Fixity::Infix);
    assert_eq!(decl.params.len(), 2);
    assert_eq!(parse.module.let_name(elements[0]).unwrap().text, "<>");
}

#[test]
fn block_bodies_parse_their_statements() {
    let parse = parse_clean("let f x.\n  let y = x\n  return y");
    let elements = top_elements(&parse);
    let decl = parse.module.let_decl(elements[0]).expect("a let");
    let Some(LetBody::Block(statements)) = &decl.body else {
        panic!("expected a block body");
    };
    assert_eq!(statements.len(), 2);
    assert!(matches!(
        parse.module.kind(statements[1]),
        NodeKind::ReturnExpr { value: Some(_) }
    ));
}

#[test]
fn match_block_form_collects_cases() {
    let parse = parse_clean("let f p = match p.\n  (x, y) -> x\n  other -> other");
    let elements = top_elements(&parse);
    let decl = parse.module.let_decl(elements[0]).expect("a let");
    let Some(LetBody::Expr(body)) = decl.body else {
        panic!("expected an expression body");
    };
    let NodeKind::MatchExpr { scrutinee, cases } = parse.module.kind(body) else {
        panic!("expected a match");
    };
    assert!(scrutinee.is_some());
    assert_eq!(cases.len(), 2);
}

#[test]
fn match_inline_form_parses_one_case() {
    let parse = parse_clean("let swap p = match p\n  (x, y) -> (y, x)");
    let elements = top_elements(&parse);
    let decl = parse.module.let_decl(elements[0]).expect("a let");
    let Some(LetBody::Expr(body)) = decl.body else {
        panic!("expected an expression body");
    };
    let NodeKind::MatchExpr { scrutinee, cases } = parse.module.kind(body) else {
        panic!("expected a match, got {:?}", parse.module.kind(body));
    };
    assert!(scrutinee.is_some());
    assert_eq!(cases.len(), 1);
}

#[test]
fn member_access_binds_tighter_than_calls() {
    let parse = parse_clean("let v = f r.x");
    let elements = top_elements(&parse);
    let decl = parse.module.let_decl(elements[0]).expect("a let");
    let Some(LetBody::Expr(body)) = decl.body else {
        panic!("expected an expression body");
    };
    let NodeKind::CallExpr { args, .. } = parse.module.kind(body) else {
        panic!("expected a call");
    };
    assert_eq!(args.len(), 1);
    assert!(matches!(
        parse.module.kind(args[0]),
        NodeKind::MemberExpr {
            member: Member::Field(_),
            ..
        }
    ));
}

#[test]
fn operator_precedence_nests_correctly() {
    // 1 + 2 * 3 parses as 1 + (2 * 3).
    let parse = parse_clean("let v = 1 + 2 * 3");
    let elements = top_elements(&parse);
    let decl = parse.module.let_decl(elements[0]).expect("a let");
    let Some(LetBody::Expr(body)) = decl.body else {
        panic!("expected an expression body");
    };
    let NodeKind::InfixExpr { op, right, .. } = parse.module.kind(body) else {
        panic!("expected an infix expression");
    };
    assert_eq!(op.text, "+");
    let NodeKind::InfixExpr { op: inner, .. } = parse.module.kind(*right) else {
        panic!("expected a nested infix expression");
    };
    assert_eq!(inner.text, "*");
}

#[test]
fn enum_and_struct_declarations() {
    let parse = parse_clean(
        "enum Maybe a.\n  Just a\n  Nothing\nstruct Point.\n  x: Int\n  y: Int",
    );
    let elements = top_elements(&parse);
    assert_eq!(elements.len(), 2);
    let NodeKind::VariantDecl { name, members, .. } = parse.module.kind(elements[0]) else {
        panic!("expected an enum");
    };
    assert_eq!(name.text, "Maybe");
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].elements.len(), 1);
    let NodeKind::RecordDecl { fields, .. } = parse.module.kind(elements[1]) else {
        panic!("expected a struct");
    };
    assert_eq!(fields.len(), 2);
}

#[test]
fn qualified_type_expressions() {
    let parse = parse_clean("let eq2: Eq a => a -> a -> Bool");
    let elements = top_elements(&parse);
    let decl = parse.module.let_decl(elements[0]).expect("a let");
    let assert_te = decl.type_assert.expect("a type assert");
    let NodeKind::QualifiedTypeExpr { constraints, .. } = parse.module.kind(assert_te) else {
        panic!(
            "expected a qualified type, got {:?}",
            parse.module.kind(assert_te)
        );
    };
    assert_eq!(constraints.len(), 1);
    assert!(matches!(
        parse.module.kind(constraints[0]),
        NodeKind::ClassConstraint { .. }
    ));
}

#[test]
fn record_type_with_rest_row() {
    let parse = parse_clean("let f: { x: Int | r } -> Int");
    let elements = top_elements(&parse);
    let decl = parse.module.let_decl(elements[0]).expect("a let");
    let assert_te = decl.type_assert.expect("a type assert");
    let NodeKind::ArrowTypeExpr { params, .. } = parse.module.kind(assert_te) else {
        panic!("expected an arrow type");
    };
    let NodeKind::RecordTypeExpr { fields, rest } = parse.module.kind(params[0]) else {
        panic!("expected a record type");
    };
    assert_eq!(fields.len(), 1);
    assert!(rest.is_some());
}

#[test]
fn parents_are_wired_for_every_node() {
    let parse = parse_clean("let f x = (x, 1)");
    let root = parse.module.root();
    assert!(parse.module.parent(root).is_none());
    let mut reachable = vec![root];
    let mut index = 0;
    while index < reachable.len() {
        let node = reachable[index];
        index += 1;
        parse
            .module
            .for_each_child(node, |child| reachable.push(child));
    }
    for &node in &reachable[1..] {
        assert!(
            parse.module.parent(node).is_some(),
            "node {node:?} has no parent"
        );
    }
}

#[test]
fn scopes_resolve_params_and_shadowing() {
    let parse = parse_clean("let x = 1\nlet f x = x");
    let scopes = parse.scopes();
    let elements = top_elements(&parse);
    let f = elements[1];
    let decl = parse.module.let_decl(f).expect("a let");
    let Some(LetBody::Expr(body)) = decl.body else {
        panic!("expected an expression body");
    };
    // From inside f, `x` resolves to the parameter, not the top-level let.
    let target = scopes
        .lookup_from(&parse.module, body, &SymbolPath::plain("x"), SymbolKind::Var)
        .expect("x resolves");
    assert_eq!(target, decl.params[0]);
    // From the top level, `x` resolves to the declaration itself.
    let top = scopes
        .lookup_from(
            &parse.module,
            elements[0],
            &SymbolPath::plain("x"),
            SymbolKind::Var,
        )
        .expect("x resolves at top level");
    assert_eq!(top, elements[0]);
}

#[test]
fn constructors_resolve_through_scopes() {
    let parse = parse_clean("enum Maybe a.\n  Just a\n  Nothing");
    let scopes = parse.scopes();
    let root = parse.module.root();
    let target = scopes.lookup_from(
        &parse.module,
        root,
        &SymbolPath::plain("Just"),
        SymbolKind::Constructor,
    );
    assert!(target.is_some());
    let as_type = scopes.lookup_from(
        &parse.module,
        root,
        &SymbolPath::plain("Maybe"),
        SymbolKind::Type,
    );
    assert!(as_type.is_some());
}

#[test]
fn parse_errors_recover_to_the_next_statement() {
    let parse = bolt_parser::parse("let = 1\nlet ok = 2", false);
    assert!(
        !parse.diagnostics.is_empty(),
        "the malformed let must be reported"
    );
    let elements = top_elements(&parse);
    // The second statement survives recovery.
    assert!(elements
        .iter()
        .any(|&el| parse.module.let_name(el).map(|n| n.text.as_str()) == Some("ok")));
}
