use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use super::ensure_sufficient_stack;
use super::ops::Op;

/// Runtime data. A value's variant never changes after construction; composite
/// payloads sit behind `Rc` so `Dup` shares them instead of copying.
#[derive(Debug, Clone, Serialize)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Char(char),
    Quotation(Quotation),
    Block(Rc<[Value]>),
}

/// Code as data: a named operation, a literal sequence of values, or a list
/// literal whose body runs on a fresh stack and becomes a [`Value::Block`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Quotation {
    Op(Op),
    Seq(Rc<[Value]>),
    List(Rc<[Value]>),
}

impl Value {
    pub fn op(op: Op) -> Self {
        Value::Quotation(Quotation::Op(op))
    }

    pub fn quote(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Quotation(Quotation::Seq(items.into_iter().collect()))
    }

    pub fn block(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Block(items.into_iter().collect())
    }

    /// Short name of the variant, used in type errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Quotation(_) => "quotation",
            Value::Block(_) => "block",
        }
    }

    pub fn is_invocable(&self) -> bool {
        matches!(self, Value::Quotation(_))
    }

    /// True when both values point at the same shared block or quotation body.
    pub fn shares_with(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Block(a), Value::Block(b))
            | (Value::Quotation(Quotation::Seq(a)), Value::Quotation(Quotation::Seq(b)))
            | (Value::Quotation(Quotation::List(a)), Value::Quotation(Quotation::List(b))) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }

    fn children_mut(&mut self) -> Option<&mut Rc<[Value]>> {
        match self {
            Value::Block(items)
            | Value::Quotation(Quotation::Seq(items) | Quotation::List(items)) => Some(items),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Quotation(a), Value::Quotation(b)) => ensure_sufficient_stack(|| a == b),
            (Value::Block(a), Value::Block(b)) => {
                Rc::ptr_eq(a, b) || ensure_sufficient_stack(|| a[..] == b[..])
            }
            _ => false,
        }
    }
}

/// Nested blocks can be arbitrarily deep (`[] {True} {[] <:} while`), so
/// uniquely owned children are unlinked onto a worklist instead of being
/// dropped recursively.
impl Drop for Value {
    fn drop(&mut self) {
        let mut pending: Vec<Rc<[Value]>> = Vec::new();
        detach(self, &mut pending);
        while let Some(mut items) = pending.pop() {
            if let Some(children) = Rc::get_mut(&mut items) {
                for child in children.iter_mut() {
                    detach(child, &mut pending);
                }
            }
        }
    }
}

fn detach(value: &mut Value, pending: &mut Vec<Rc<[Value]>>) {
    if let Some(items) = value.children_mut() {
        if !items.is_empty() && Rc::strong_count(items) == 1 {
            pending.push(std::mem::replace(items, Rc::from(Vec::new())));
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: char, items: &[Value], close: char) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        ensure_sufficient_stack(|| write!(f, "{item}"))?;
    }
    write!(f, "{close}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Quotation(q) => write!(f, "{q}"),
            Value::Block(items) => write_seq(f, '[', items, ']'),
        }
    }
}

impl fmt::Display for Quotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quotation::Op(op) => write!(f, "{op}"),
            Quotation::Seq(items) => write_seq(f, '{', items, '}'),
            Quotation::List(items) => write_seq(f, '[', items, ']'),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<Op> for Value {
    fn from(op: Op) -> Self {
        Value::op(op)
    }
}
