//! Runtime values and environments.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use bolt_parser::cst::NodeId;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Int(i64),
    Str(String),
    Bool(bool),
    Tuple(Vec<Value>),
    Record(FxHashMap<String, Value>),
    /// A function value: the declaring node (a `let` or `fn` expression),
    /// its captured environment, and any already-bound arguments.
    Closure {
        decl: NodeId,
        env: Env,
        bound: Vec<Value>,
    },
    /// A (possibly partially applied) variant or record constructor.
    Ctor {
        name: String,
        arity: usize,
        args: Vec<Value>,
    },
    /// A scrutinee-less `match`, which is a function of its scrutinee.
    MatchClosure {
        node: NodeId,
        env: Env,
    },
    Native(NativeFn),
}

impl Value {
    pub fn unit() -> Value {
        Value::Tuple(Vec::new())
    }

    /// A short description for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Value::Int(_) => "an integer",
            Value::Str(_) => "a string",
            Value::Bool(_) => "a boolean",
            Value::Tuple(elements) if elements.is_empty() => "unit",
            Value::Tuple(_) => "a tuple",
            Value::Record(_) => "a record",
            Value::Closure { .. } | Value::MatchClosure { .. } | Value::Native(_) => "a function",
            Value::Ctor { .. } => "a constructor",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (
                Value::Ctor {
                    name: na, args: aa, ..
                },
                Value::Ctor {
                    name: nb, args: ab, ..
                },
            ) => na == nb && aa == ab,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Tuple(elements) => {
                write!(f, "(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, ")")
            }
            Value::Record(fields) => {
                let mut names: Vec<_> = fields.keys().collect();
                names.sort();
                write!(f, "{{ ")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name} = {}", fields[*name])?;
                }
                write!(f, " }}")
            }
            Value::Ctor { name, args, .. } => {
                write!(f, "{name}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
            Value::Closure { .. } | Value::MatchClosure { .. } => write!(f, "<function>"),
            Value::Native(native) => write!(f, "<native {}>", native.name),
        }
    }
}

/// A built-in function exposed to Bolt programs.
#[derive(Clone)]
pub struct NativeFn {
    pub name: &'static str,
    func: fn(Vec<Value>) -> Result<Value, String>,
}

impl NativeFn {
    pub fn new(name: &'static str, func: fn(Vec<Value>) -> Result<Value, String>) -> Self {
        Self { name, func }
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Value, String> {
        (self.func)(args)
    }
}

/// An environment frame with a parent link, shared by reference so that
/// closures observe later bindings in the same frame (mutual recursion).
#[derive(Clone)]
pub struct Env(Rc<RefCell<EnvData>>);

struct EnvData {
    vars: FxHashMap<String, Value>,
    parent: Option<Env>,
}

impl Env {
    pub fn new() -> Self {
        Env(Rc::new(RefCell::new(EnvData {
            vars: FxHashMap::default(),
            parent: None,
        })))
    }

    pub fn child(parent: &Env) -> Self {
        Env(Rc::new(RefCell::new(EnvData {
            vars: FxHashMap::default(),
            parent: Some(parent.clone()),
        })))
    }

    pub fn define(&self, name: &str, value: Value) {
        self.0.borrow_mut().vars.insert(name.to_string(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let data = self.0.borrow();
        if let Some(value) = data.vars.get(name) {
            return Some(value.clone());
        }
        data.parent.as_ref().and_then(|p| p.lookup(name))
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
