//! Tree-walking evaluator for checked Bolt programs.
//!
//! Runs directly over the CST. Closures capture their environment by
//! reference, and declarations bind into the environment they were
//! declared in, so (mutual) recursion needs no special machinery: the
//! body looks its callees up at call time.
//!
//! Evaluation assumes the program type-checked; shape mismatches that the
//! checker rules out surface here as [`EvalError`]s rather than panics.

mod value;

pub use value::{Env, Value};

use bolt_common::text::TextRange;
use bolt_parser::cst::{
    LetBody, LitValue, Member, NodeId, NodeKind, SourceModule,
};

/// A runtime error with the source range it arose at.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
    pub range: TextRange,
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Non-local control flow during evaluation.
enum Signal {
    Return(Value),
    Error(EvalError),
}

type Eval = Result<Value, Signal>;

pub struct Evaluator<'a> {
    module: &'a SourceModule,
}

impl<'a> Evaluator<'a> {
    pub fn new(module: &'a SourceModule) -> Self {
        Self { module }
    }

    fn error(&self, node: NodeId, message: impl Into<String>) -> Signal {
        Signal::Error(EvalError {
            message: message.into(),
            range: self.module.range(node),
        })
    }

    /// Evaluate a whole module in the given global environment.
    pub fn evaluate(&self, env: &Env) -> Result<(), EvalError> {
        let root = self.module.root();
        let NodeKind::SourceFile { elements } = self.module.kind(root) else {
            return Ok(());
        };
        for &element in elements {
            match self.evaluate_element(element, env) {
                Ok(_) => {}
                Err(Signal::Return(_)) => {}
                Err(Signal::Error(error)) => return Err(error),
            }
        }
        Ok(())
    }

    fn evaluate_element(&self, element: NodeId, env: &Env) -> Eval {
        match self.module.kind(element) {
            NodeKind::LetDecl(decl) => {
                // Foreign declarations are satisfied by host bindings
                // already present in the environment.
                if decl.is_foreign {
                    return Ok(Value::unit());
                }
                if self.module.let_is_function(element) {
                    if let Some(name) = self.module.let_name(element) {
                        env.define(
                            &name.text,
                            Value::Closure {
                                decl: element,
                                env: env.clone(),
                                bound: Vec::new(),
                            },
                        );
                    }
                } else {
                    let value = match &decl.body {
                        Some(LetBody::Expr(expr)) => self.evaluate_expression(*expr, env)?,
                        _ => Value::unit(),
                    };
                    self.bind_pattern(decl.pattern, &value, env)?;
                }
                Ok(Value::unit())
            }
            NodeKind::VariantDecl { members, .. } => {
                for member in members {
                    env.define(
                        &member.name.text,
                        Value::Ctor {
                            name: member.name.text.clone(),
                            arity: member.elements.len(),
                            args: Vec::new(),
                        },
                    );
                }
                Ok(Value::unit())
            }
            NodeKind::RecordDecl { name, .. } => {
                env.define(
                    &name.text,
                    Value::Ctor {
                        name: name.text.clone(),
                        arity: 1,
                        args: Vec::new(),
                    },
                );
                Ok(Value::unit())
            }
            NodeKind::ClassDecl { elements, .. } | NodeKind::InstanceDecl { elements, .. } => {
                for &inner in elements {
                    self.evaluate_element(inner, env)?;
                }
                Ok(Value::unit())
            }
            _ => self.evaluate_expression(element, env),
        }
    }

    fn evaluate_expression(&self, x: NodeId, env: &Env) -> Eval {
        match self.module.kind(x) {
            NodeKind::LiteralExpr { value } => Ok(match value {
                LitValue::Int(v) => Value::Int(*v),
                LitValue::Str(s) => Value::Str(s.clone()),
            }),

            NodeKind::ReferenceExpr { name, .. } => match name.text.as_str() {
                "True" => Ok(Value::Bool(true)),
                "False" => Ok(Value::Bool(false)),
                text => env
                    .lookup(text)
                    .ok_or_else(|| self.error(x, format!("'{text}' is not bound"))),
            },

            NodeKind::CallExpr { callee, args } => {
                let op = self.evaluate_expression(*callee, env)?;
                let mut values = Vec::new();
                for &arg in args {
                    values.push(self.evaluate_expression(arg, env)?);
                }
                self.apply(x, op, values)
            }

            NodeKind::InfixExpr { left, op, right } => {
                let lhs = self.evaluate_expression(*left, env)?;
                let rhs = self.evaluate_expression(*right, env)?;
                if let Some(user) = env.lookup(&op.text) {
                    return self.apply(x, user, vec![lhs, rhs]);
                }
                self.builtin_infix(x, &op.text, lhs, rhs)
            }

            NodeKind::PrefixExpr { op, arg } => {
                let value = self.evaluate_expression(*arg, env)?;
                match env.lookup(&op.text) {
                    Some(user) => self.apply(x, user, vec![value]),
                    None => Err(self.error(x, format!("operator '{}' is not bound", op.text))),
                }
            }

            NodeKind::MemberExpr { expr, member } => {
                let value = self.evaluate_expression(*expr, env)?;
                match member {
                    Member::Field(name) => match value {
                        Value::Record(fields) => fields
                            .get(&name.text)
                            .cloned()
                            .ok_or_else(|| {
                                self.error(x, format!("record has no field '{}'", name.text))
                            }),
                        other => {
                            Err(self.error(x, format!("{} has no fields", other.describe())))
                        }
                    },
                    Member::Index(index, _) => match value {
                        Value::Tuple(elements) => elements
                            .get(*index as usize)
                            .cloned()
                            .ok_or_else(|| self.error(x, "tuple index out of range")),
                        other => {
                            Err(self.error(x, format!("{} is not a tuple", other.describe())))
                        }
                    },
                }
            }

            NodeKind::TupleExpr { elements } => {
                let mut values = Vec::new();
                for &element in elements {
                    values.push(self.evaluate_expression(element, env)?);
                }
                Ok(Value::Tuple(values))
            }

            NodeKind::RecordExpr { fields } => {
                let mut record = rustc_hash::FxHashMap::default();
                for field in fields {
                    let value = self.evaluate_expression(field.value, env)?;
                    record.insert(field.name.text.clone(), value);
                }
                Ok(Value::Record(record))
            }

            NodeKind::NestedExpr { inner } => self.evaluate_expression(*inner, env),

            NodeKind::IfExpr { parts } => {
                for part in parts {
                    let taken = match part.test {
                        None => true,
                        Some(test) => match self.evaluate_expression(test, env)? {
                            Value::Bool(b) => b,
                            other => {
                                return Err(self.error(
                                    test,
                                    format!("condition is {}, not a boolean", other.describe()),
                                ))
                            }
                        },
                    };
                    if taken {
                        return self.evaluate_expression(part.body, env);
                    }
                }
                Ok(Value::unit())
            }

            NodeKind::MatchExpr { scrutinee, cases } => match scrutinee {
                Some(value) => {
                    let value = self.evaluate_expression(*value, env)?;
                    self.run_match(x, cases, &value, env)
                }
                None => Ok(Value::MatchClosure {
                    node: x,
                    env: env.clone(),
                }),
            },

            NodeKind::BlockExpr { elements } => self.run_block(elements, env),

            NodeKind::ReturnExpr { value } => {
                let value = match value {
                    Some(expr) => self.evaluate_expression(*expr, env)?,
                    None => Value::unit(),
                };
                Err(Signal::Return(value))
            }

            NodeKind::FnExpr { .. } => Ok(Value::Closure {
                decl: x,
                env: env.clone(),
                bound: Vec::new(),
            }),

            other => Err(self.error(x, format!("cannot evaluate {other:?}"))),
        }
    }

    fn run_block(&self, elements: &[NodeId], env: &Env) -> Eval {
        let local = Env::child(env);
        let mut last = Value::unit();
        for &element in elements {
            last = self.evaluate_element(element, &local)?;
            if !self.module.kind(element).is_expression() {
                last = Value::unit();
            }
        }
        Ok(last)
    }

    fn run_match(&self, node: NodeId, cases: &[NodeId], value: &Value, env: &Env) -> Eval {
        for &case in cases {
            let NodeKind::MatchCase { pattern, expr } = self.module.kind(case) else {
                continue;
            };
            let local = Env::child(env);
            if self.match_pattern(*pattern, value, &local)? {
                return self.evaluate_expression(*expr, &local);
            }
        }
        Err(self.error(node, "no pattern matched the value"))
    }

    /// Apply a value to arguments, currying under-application and
    /// re-applying over-application to the result.
    fn apply(&self, at: NodeId, op: Value, mut args: Vec<Value>) -> Eval {
        match op {
            Value::Closure {
                decl,
                env,
                mut bound,
            } => {
                let (params, body) = self.closure_parts(decl);
                bound.append(&mut args);
                if bound.len() < params.len() {
                    return Ok(Value::Closure { decl, env, bound });
                }
                let rest = bound.split_off(params.len());
                let local = Env::child(&env);
                for (&param, value) in params.iter().zip(&bound) {
                    self.bind_pattern(param, value, &local)?;
                }
                let result = match body {
                    ClosureBody::Expr(expr) => self.evaluate_expression(expr, &local),
                    ClosureBody::Block(elements) => self.run_block(&elements, &local),
                    ClosureBody::None => Ok(Value::unit()),
                };
                // A `return` unwinds to the nearest call boundary.
                let result = match result {
                    Err(Signal::Return(value)) => Ok(value),
                    other => other,
                }?;
                if rest.is_empty() {
                    Ok(result)
                } else {
                    self.apply(at, result, rest)
                }
            }
            Value::Ctor {
                name,
                arity,
                args: mut existing,
            } => {
                existing.append(&mut args);
                if existing.len() > arity {
                    return Err(self.error(at, format!("too many arguments to '{name}'")));
                }
                Ok(Value::Ctor {
                    name,
                    arity,
                    args: existing,
                })
            }
            Value::MatchClosure { node, env } => {
                let NodeKind::MatchExpr { cases, .. } = self.module.kind(node) else {
                    return Err(self.error(at, "malformed match closure"));
                };
                let value = args
                    .first()
                    .cloned()
                    .ok_or_else(|| self.error(at, "match closure needs an argument"))?;
                let result = self.run_match(node, cases, &value, &env)?;
                let rest = args.split_off(1);
                if rest.is_empty() {
                    Ok(result)
                } else {
                    self.apply(at, result, rest)
                }
            }
            Value::Native(native) => native.call(args).map_err(|message| {
                self.error(at, message)
            }),
            other => Err(self.error(at, format!("{} is not callable", other.describe()))),
        }
    }

    fn closure_parts(&self, decl: NodeId) -> (Vec<NodeId>, ClosureBody) {
        match self.module.kind(decl) {
            NodeKind::LetDecl(let_decl) => {
                let body = match &let_decl.body {
                    Some(LetBody::Expr(expr)) => ClosureBody::Expr(*expr),
                    Some(LetBody::Block(elements)) => ClosureBody::Block(elements.clone()),
                    None => ClosureBody::None,
                };
                (let_decl.params.clone(), body)
            }
            NodeKind::FnExpr { params, body } => (params.clone(), ClosureBody::Expr(*body)),
            _ => (Vec::new(), ClosureBody::None),
        }
    }

    fn builtin_infix(&self, at: NodeId, op: &str, lhs: Value, rhs: Value) -> Eval {
        match (op, lhs, rhs) {
            ("+", Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(b))),
            ("-", Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(b))),
            ("*", Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(b))),
            ("/", Value::Int(a), Value::Int(b)) => {
                if b == 0 {
                    Err(self.error(at, "division by zero"))
                } else {
                    Ok(Value::Int(a / b))
                }
            }
            ("%", Value::Int(a), Value::Int(b)) => {
                if b == 0 {
                    Err(self.error(at, "division by zero"))
                } else {
                    Ok(Value::Int(a % b))
                }
            }
            ("<", Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
            (">", Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
            ("==", a, b) => Ok(Value::Bool(a == b)),
            (op, a, b) => Err(self.error(
                at,
                format!(
                    "operator '{op}' is not defined for {} and {}",
                    a.describe(),
                    b.describe()
                ),
            )),
        }
    }

    // ── Patterns ───────────────────────────────────────────────────────

    /// Bind a pattern unconditionally (declaration positions).
    fn bind_pattern(&self, pattern: NodeId, value: &Value, env: &Env) -> Result<(), Signal> {
        if self.match_pattern(pattern, value, env)? {
            Ok(())
        } else {
            Err(self.error(pattern, "value does not match the pattern"))
        }
    }

    /// Try to match `value` against `pattern`, binding into `env`.
    fn match_pattern(
        &self,
        pattern: NodeId,
        value: &Value,
        env: &Env,
    ) -> Result<bool, Signal> {
        match self.module.kind(pattern) {
            NodeKind::BindPat { name } => {
                env.define(&name.text, value.clone());
                Ok(true)
            }
            NodeKind::LiteralPat { value: expected } => Ok(match (expected, value) {
                (LitValue::Int(a), Value::Int(b)) => a == b,
                (LitValue::Str(a), Value::Str(b)) => a == b,
                _ => false,
            }),
            NodeKind::NestedPat { inner } => self.match_pattern(*inner, value, env),
            NodeKind::TuplePat { elements } => match value {
                Value::Tuple(values) if values.len() == elements.len() => {
                    for (&element, v) in elements.iter().zip(values) {
                        if !self.match_pattern(element, v, env)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                _ => Ok(false),
            },
            NodeKind::NamedTuplePat { name, args } => match (name.text.as_str(), value) {
                ("True", Value::Bool(b)) => Ok(*b),
                ("False", Value::Bool(b)) => Ok(!*b),
                (_, Value::Ctor {
                    name: ctor_name,
                    args: values,
                    ..
                }) if *ctor_name == name.text && values.len() == args.len() => {
                    for (&arg, v) in args.iter().zip(values) {
                        if !self.match_pattern(arg, v, env)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                _ => Ok(false),
            },
            NodeKind::RecordPat { fields } => {
                let Value::Record(values) = value else {
                    return Ok(false);
                };
                for field in fields {
                    if field.dotdot {
                        if let Some(rest) = field.pattern {
                            // The remainder as a record of unnamed fields.
                            let mut remaining = values.clone();
                            for named in fields.iter().filter_map(|f| f.name.as_ref()) {
                                remaining.remove(&named.text);
                            }
                            if !self.match_pattern(rest, &Value::Record(remaining), env)? {
                                return Ok(false);
                            }
                        }
                        continue;
                    }
                    let Some(name) = &field.name else { continue };
                    let Some(v) = values.get(&name.text) else {
                        return Ok(false);
                    };
                    match field.pattern {
                        Some(sub) => {
                            if !self.match_pattern(sub, v, env)? {
                                return Ok(false);
                            }
                        }
                        None => env.define(&name.text, v.clone()),
                    }
                }
                Ok(true)
            }
            NodeKind::NamedRecordPat { name, fields } => match value {
                Value::Ctor {
                    name: ctor_name,
                    args,
                    ..
                } if *ctor_name == name.text && args.len() == 1 => {
                    // Delegate to the anonymous record logic on the payload.
                    self.match_record_fields(fields, &args[0].clone(), env)
                }
                _ => Ok(false),
            },
            NodeKind::ListPat { elements } => {
                // Lists are ordinary variant values: a chain of `Cons`
                // cells ending in `Nil`.
                let mut current = value.clone();
                for &element in elements {
                    match current {
                        Value::Ctor { ref name, ref args, .. }
                            if name == "Cons" && args.len() == 2 =>
                        {
                            let head = args[0].clone();
                            let tail = args[1].clone();
                            if !self.match_pattern(element, &head, env)? {
                                return Ok(false);
                            }
                            current = tail;
                        }
                        _ => return Ok(false),
                    }
                }
                Ok(matches!(current, Value::Ctor { ref name, .. } if name == "Nil"))
            }
            _ => Ok(false),
        }
    }

    fn match_record_fields(
        &self,
        fields: &[bolt_parser::cst::RecordPatField],
        value: &Value,
        env: &Env,
    ) -> Result<bool, Signal> {
        let Value::Record(values) = value else {
            return Ok(false);
        };
        for field in fields {
            if field.dotdot {
                continue;
            }
            let Some(name) = &field.name else { continue };
            let Some(v) = values.get(&name.text) else {
                return Ok(false);
            };
            match field.pattern {
                Some(sub) => {
                    if !self.match_pattern(sub, v, env)? {
                        return Ok(false);
                    }
                }
                None => env.define(&name.text, v.clone()),
            }
        }
        Ok(true)
    }
}

enum ClosureBody {
    Expr(NodeId),
    Block(Vec<NodeId>),
    None,
}

/// A global environment with the standard bindings (`print`).
pub fn global_env() -> Env {
    let env = Env::new();
    env.define(
        "print",
        Value::Native(value::NativeFn::new("print", |args| {
            for arg in &args {
                eprintln!("{arg}");
            }
            Ok(Value::unit())
        })),
    );
    env
}
