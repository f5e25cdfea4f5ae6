use std::fmt;

use crate::ast::{Program, Span};
use crate::diagnostic::Severity;
use crate::vm::{Op, Quotation, Value};

/// Verifier's view of a stack slot. `Unknown` is compatible with anything.
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Int,
    Bool,
    Char,
    Block,
    /// A quotation, with its body when it is statically known.
    Quote(Option<Quotation>),
    Unknown,
}

impl Ty {
    fn of(value: &Value) -> Ty {
        match value {
            Value::Int(_) => Ty::Int,
            Value::Bool(_) => Ty::Bool,
            Value::Char(_) => Ty::Char,
            Value::Block(_) => Ty::Block,
            Value::Quotation(q) => Ty::Quote(Some(q.clone())),
        }
    }

    fn merge(self, other: Ty) -> Ty {
        if self == other {
            return self;
        }
        match (self, other) {
            (Ty::Quote(_), Ty::Quote(_)) => Ty::Quote(None),
            _ => Ty::Unknown,
        }
    }

    fn is_invocable(&self) -> bool {
        matches!(self, Ty::Quote(_) | Ty::Unknown)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Ty::Int => "int",
            Ty::Bool => "bool",
            Ty::Char => "char",
            Ty::Block => "block",
            Ty::Quote(_) => "quotation",
            Ty::Unknown => "?",
        })
    }
}

#[derive(Debug, Clone)]
pub struct VerifyError {
    pub code: &'static str,
    /// Top-level program item the problem was found at.
    pub index: usize,
    pub span: Span,
    pub severity: Severity,
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "verify: {} at item {}", self.message, self.index)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}

/// How many statically known quotations may nest before the checker gives up
/// and treats the call as an unknown effect.
const MAX_FOLLOW: usize = 32;

/// Abstract stack. Once `opaque`, values below `known` are unknown in number
/// and kind, so popping past `known` yields `Unknown` instead of underflowing.
#[derive(Debug, Clone, PartialEq, Default)]
struct TyStack {
    known: Vec<Ty>,
    opaque: bool,
}

impl TyStack {
    fn push(&mut self, ty: Ty) {
        self.known.push(ty);
    }

    fn pop_n(&mut self, op: Op, n: usize) -> Result<Vec<Ty>, Problem> {
        if !self.opaque && self.known.len() < n {
            return Err(Problem {
                code: "HSK-V001",
                message: format!(
                    "'{op}' needs {n} value(s) but the stack holds {}",
                    self.known.len()
                ),
                hint: None,
            });
        }
        let missing = n.saturating_sub(self.known.len());
        let mut taken = vec![Ty::Unknown; missing];
        let keep = self.known.len().saturating_sub(n);
        taken.extend(self.known.drain(keep..));
        Ok(taken)
    }

    /// Forget everything: an effect we cannot follow happened.
    fn lose_track(&mut self) {
        self.known.clear();
        self.opaque = true;
    }

    fn join(self, other: TyStack) -> TyStack {
        if self.opaque != other.opaque || self.known.len() != other.known.len() {
            return TyStack { known: Vec::new(), opaque: true };
        }
        TyStack {
            known: self.known.into_iter().zip(other.known).map(|(a, b)| a.merge(b)).collect(),
            opaque: self.opaque,
        }
    }
}

/// A finding before it is pinned to a program item.
struct Problem {
    code: &'static str,
    message: String,
    hint: Option<String>,
}

fn expect(op: Op, expected: Ty, found: &Ty) -> Result<(), Problem> {
    if *found == expected || *found == Ty::Unknown {
        return Ok(());
    }
    Err(Problem {
        code: "HSK-V002",
        message: format!("'{op}' expects {expected}, found {found}"),
        hint: None,
    })
}

fn expect_invocable(op: Op, found: &Ty) -> Result<(), Problem> {
    if found.is_invocable() {
        return Ok(());
    }
    Err(Problem {
        code: "HSK-V002",
        message: format!("'{op}' expects a quotation, found {found}"),
        hint: Some("wrap code in braces to quote it: { ... }".to_string()),
    })
}

struct Checker {
    follow_depth: usize,
}

impl Checker {
    fn run(&mut self, items: &[Value], stack: &mut TyStack) -> Result<(), Problem> {
        items.iter().try_for_each(|item| self.item(item, stack))
    }

    fn item(&mut self, item: &Value, stack: &mut TyStack) -> Result<(), Problem> {
        match item {
            Value::Quotation(Quotation::Op(op)) => self.op(*op, stack),
            Value::Quotation(Quotation::List(body)) => self.list(body, stack),
            literal => {
                stack.push(Ty::of(literal));
                Ok(())
            }
        }
    }

    /// A list body starts from an empty stack, so underflow inside it is certain.
    fn list(&mut self, body: &[Value], stack: &mut TyStack) -> Result<(), Problem> {
        self.run(body, &mut TyStack::default())?;
        stack.push(Ty::Block);
        Ok(())
    }

    fn op(&mut self, op: Op, stack: &mut TyStack) -> Result<(), Problem> {
        let args = stack.pop_n(op, op.arity())?;
        match (op, args.as_slice()) {
            (Op::Add | Op::Sub | Op::Mul | Op::Div, [a, b]) => {
                expect(op, Ty::Int, a)?;
                expect(op, Ty::Int, b)?;
                stack.push(Ty::Int);
            }
            (Op::Lt | Op::Gt | Op::Lte | Op::Gte, [a, b]) => {
                expect(op, Ty::Int, a)?;
                expect(op, Ty::Int, b)?;
                stack.push(Ty::Bool);
            }
            (Op::Eq, [_, _]) => stack.push(Ty::Bool),
            (Op::Not, [a]) => {
                expect(op, Ty::Bool, a)?;
                stack.push(Ty::Bool);
            }
            (Op::Dup, [a]) => {
                stack.push(a.clone());
                stack.push(a.clone());
            }
            (Op::Cons, [_, list]) => {
                expect(op, Ty::Block, list)?;
                stack.push(Ty::Block);
            }
            (Op::Print, [_]) => {}
            (Op::TypeOf, [a]) => stack.push(a.clone()),
            (Op::Eval, [quote]) => {
                expect_invocable(op, quote)?;
                self.invoke(quote, stack)?;
            }
            (Op::If, [cond, then, otherwise]) => {
                expect(op, Ty::Bool, cond)?;
                expect_invocable(op, then)?;
                expect_invocable(op, otherwise)?;
                let mut taken = stack.clone();
                self.invoke(then, &mut taken)?;
                self.invoke(otherwise, stack)?;
                *stack = std::mem::take(stack).join(taken);
            }
            (Op::While, [cond, body]) => {
                expect_invocable(op, cond)?;
                expect_invocable(op, body)?;
                self.repeat(cond, body, stack)?;
            }
            _ => unreachable!("pop_n returns exactly arity values"),
        }
        Ok(())
    }

    fn invoke(&mut self, quote: &Ty, stack: &mut TyStack) -> Result<(), Problem> {
        let Ty::Quote(Some(body)) = quote else {
            stack.lose_track();
            return Ok(());
        };
        if self.follow_depth >= MAX_FOLLOW {
            stack.lose_track();
            return Ok(());
        }
        self.follow_depth += 1;
        let result = match body {
            Quotation::Op(op) => self.op(*op, stack),
            Quotation::Seq(items) => self.run(items, stack),
            Quotation::List(items) => self.list(items, stack),
        };
        self.follow_depth -= 1;
        result
    }

    /// A loop is followed only when one pass of condition-then-body leaves
    /// the stack as it found it; otherwise its effect depends on the trip count.
    fn repeat(&mut self, cond: &Ty, body: &Ty, stack: &mut TyStack) -> Result<(), Problem> {
        let entry = stack.clone();
        self.invoke(cond, stack)?;
        let flag = stack.pop_n(Op::While, 1)?;
        if !matches!(flag[0], Ty::Bool | Ty::Unknown) {
            return Err(Problem {
                code: "HSK-V003",
                message: format!("'while' condition must leave a bool, found {}", flag[0]),
                hint: Some("end the condition with a comparison such as '<' or '='".to_string()),
            });
        }
        if *stack != entry {
            stack.lose_track();
            return Ok(());
        }
        self.invoke(body, stack)?;
        if *stack != entry {
            stack.lose_track();
        }
        Ok(())
    }
}

/// Check stack effects across the whole program. Returns every finding: at
/// most one error (checking stops there) plus a warning for values left over
/// at the end.
pub fn verify(program: &Program) -> Vec<VerifyError> {
    let mut checker = Checker { follow_depth: 0 };
    let mut stack = TyStack::default();
    let mut findings = Vec::new();

    for (index, item) in program.items.iter().enumerate() {
        if let Err(problem) = checker.item(item, &mut stack) {
            findings.push(VerifyError {
                code: problem.code,
                index,
                span: program.span_of(index),
                severity: Severity::Error,
                message: problem.message,
                hint: problem.hint,
            });
            tracing::debug!(index, "verification stopped at first error");
            return findings;
        }
    }

    if !stack.known.is_empty() {
        let n = stack.known.len();
        let index = program.len().saturating_sub(1);
        findings.push(VerifyError {
            code: "HSK-V004",
            index,
            span: program.span_of(index),
            severity: Severity::Warning,
            message: format!(
                "program finished with {n} unhandled value{} on the stack",
                if n == 1 { "" } else { "s" }
            ),
            hint: Some("print the result, or drop it from the program".to_string()),
        });
    }
    findings
}
