use std::io::Write;
use std::iter;

use super::{mismatch, Op, Value, Vm, VmResult};

impl<W: Write> Vm<W> {
    /// Pops `b` then `a`; both must be integers.
    fn pop_ints(&mut self, op: Op) -> VmResult<(i64, i64)> {
        self.stack.require(2)?;
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        match (a, b) {
            (Value::Int(a), Value::Int(b)) => Ok((a, b)),
            (Value::Int(_), other) | (other, _) => Err(mismatch(op, "int", &other)),
        }
    }

    pub(super) fn int_binop(
        &mut self,
        op: Op,
        f: impl FnOnce(i64, i64) -> VmResult<i64>,
    ) -> VmResult<()> {
        let (a, b) = self.pop_ints(op)?;
        self.stack.push(Value::Int(f(a, b)?));
        Ok(())
    }

    pub(super) fn int_compare(&mut self, op: Op, f: impl FnOnce(i64, i64) -> bool) -> VmResult<()> {
        let (a, b) = self.pop_ints(op)?;
        self.stack.push(Value::Bool(f(a, b)));
        Ok(())
    }

    /// Structural equality; values of different variants are unequal.
    pub(super) fn equals(&mut self) -> VmResult<()> {
        self.stack.require(2)?;
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        self.stack.push(Value::Bool(a == b));
        Ok(())
    }

    pub(super) fn not(&mut self) -> VmResult<()> {
        self.stack.require(1)?;
        match self.stack.pop()? {
            Value::Bool(b) => {
                self.stack.push(Value::Bool(!b));
                Ok(())
            }
            other => Err(mismatch(Op::Not, "bool", &other)),
        }
    }

    pub(super) fn dup(&mut self) -> VmResult<()> {
        self.stack.require(1)?;
        let a = self.stack.pop()?;
        self.stack.push(a.clone());
        self.stack.push(a);
        Ok(())
    }

    /// `[.. head block] <:` → `[.. [head block...]]`.
    pub(super) fn cons(&mut self) -> VmResult<()> {
        self.stack.require(2)?;
        let tail = self.stack.pop()?;
        let head = self.stack.pop()?;
        match &tail {
            Value::Block(items) => {
                let joined = iter::once(head).chain(items.iter().cloned()).collect();
                self.stack.push(Value::Block(joined));
                Ok(())
            }
            other => Err(mismatch(Op::Cons, "block", other)),
        }
    }

    pub(super) fn print(&mut self) -> VmResult<()> {
        self.stack.require(1)?;
        let a = self.stack.pop()?;
        self.sink.write_line(&a.to_string())?;
        Ok(())
    }

    /// `type?`: print the kind of the top value, leaving it in place.
    pub(super) fn type_of(&mut self) -> VmResult<()> {
        self.stack.require(1)?;
        if let Some(top) = self.stack.values().last() {
            self.sink.write_line(top.kind())?;
        }
        Ok(())
    }
}
