//! Evaluator integration tests: parse, then run, then inspect bindings.

use bolt_eval::{Env, Evaluator, Value};

fn run(source: &str) -> Env {
    let parse = bolt_parser::parse(source, false);
    assert!(
        parse.diagnostics.is_empty(),
        "unexpected parse diagnostics: {:#?}",
        parse.diagnostics
    );
    let env = bolt_eval::global_env();
    Evaluator::new(&parse.module)
        .evaluate(&env)
        .expect("evaluation succeeds");
    env
}

fn int_of(env: &Env, name: &str) -> i64 {
    match env.lookup(name) {
        Some(Value::Int(v)) => v,
        other => panic!("expected an integer for {name}, got {other:?}"),
    }
}

#[test]
fn arithmetic_and_variables() {
    let env = run("let mut a = 2\nlet mut b = a + 3 * 4");
    assert_eq!(int_of(&env, "b"), 14);
}

#[test]
fn function_application() {
    let env = run("let add x y = x + y\nlet mut r = add 1 2");
    assert_eq!(int_of(&env, "r"), 3);
}

#[test]
fn currying_partial_application() {
    let env = run("let add x y = x + y\nlet mut inc = add 1\nlet mut r = inc 41");
    assert_eq!(int_of(&env, "r"), 42);
}

#[test]
fn recursion_terminates() {
    let env = run(
        "let fact n = if n == 0 then 1 else n * fact (n - 1)\nlet mut r = fact 5",
    );
    assert_eq!(int_of(&env, "r"), 120);
}

#[test]
fn match_destructures_tuples() {
    let env = run("let swap p = match p\n  (x, y) -> (y, x)\nlet mut r = swap (1, 2)");
    match env.lookup("r") {
        Some(Value::Tuple(elements)) => {
            assert_eq!(elements.len(), 2);
            assert!(matches!(elements[0], Value::Int(2)));
            assert!(matches!(elements[1], Value::Int(1)));
        }
        _ => panic!("expected a tuple"),
    }
}

#[test]
fn variant_constructors_and_matching() {
    let env = run(
        "enum Maybe a.\n  Just a\n  Nothing\nlet from_just d m = match m.\n  Just x -> x\n  Nothing -> d\nlet mut r = from_just 0 (Just 7)\nlet mut s = from_just 3 Nothing",
    );
    assert_eq!(int_of(&env, "r"), 7);
    assert_eq!(int_of(&env, "s"), 3);
}

#[test]
fn records_and_member_access() {
    let env = run("let mut p = { x = 10, y = 20 }\nlet mut r = p.x + p.y");
    assert_eq!(int_of(&env, "r"), 30);
}

#[test]
fn block_bodies_return() {
    let env = run("let f x.\n  return x + 1\nlet mut r = f 9");
    assert_eq!(int_of(&env, "r"), 10);
}

#[test]
fn runtime_division_by_zero_is_an_error() {
    let parse = bolt_parser::parse("let mut r = 1 / 0", false);
    let env = bolt_eval::global_env();
    let error = Evaluator::new(&parse.module)
        .evaluate(&env)
        .expect_err("division by zero fails");
    assert!(error.message.contains("division by zero"));
}
