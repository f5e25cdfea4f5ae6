use std::io::Write;

use super::{ensure_sufficient_stack, mismatch, Op, Quotation, Value, Vm, VmError, VmResult};

impl<W: Write> Vm<W> {
    /// `~`: pop a quotation and run it against the rest of the stack.
    pub(super) fn eval(&mut self) -> VmResult<()> {
        self.stack.require(1)?;
        let value = self.stack.pop()?;
        match &value {
            Value::Quotation(quotation) => self.invoke(quotation),
            other => Err(mismatch(Op::Eval, "quotation", other)),
        }
    }

    fn invoke(&mut self, quotation: &Quotation) -> VmResult<()> {
        match quotation {
            Quotation::Op(op) => self.dispatch(*op),
            Quotation::Seq(body) => self.run_body(body),
            Quotation::List(body) => self.build_list(body),
        }
    }

    fn run_body(&mut self, body: &[Value]) -> VmResult<()> {
        self.enter()?;
        let result = ensure_sufficient_stack(|| body.iter().try_for_each(|item| self.step(item)));
        self.depth -= 1;
        result
    }

    /// `[ ... ]`: run the body on an empty stack and push what it leaves as one
    /// block. The outer stack is out of reach while the body runs.
    pub(super) fn build_list(&mut self, body: &[Value]) -> VmResult<()> {
        let outer = std::mem::take(&mut self.stack);
        let result = self.run_body(body);
        let mut scratch = std::mem::replace(&mut self.stack, outer);
        self.stack.absorb_traffic(scratch.take_traffic());
        result?;
        self.stack.push(Value::Block(scratch.into_values().into()));
        Ok(())
    }

    fn enter(&mut self) -> VmResult<()> {
        if let Some(limit) = self.config.max_depth {
            if self.depth >= limit {
                return Err(VmError::DepthExceeded { limit });
            }
        }
        self.depth += 1;
        Ok(())
    }

    /// `if`: `[.. cond then else]`. Only the chosen branch runs.
    pub(super) fn branch(&mut self) -> VmResult<()> {
        self.stack.require(3)?;
        let otherwise = self.stack.pop()?;
        let then = self.stack.pop()?;
        let cond = match self.stack.pop()? {
            Value::Bool(b) => b,
            other => return Err(mismatch(Op::If, "bool", &other)),
        };
        for branch in [&then, &otherwise] {
            if !branch.is_invocable() {
                return Err(mismatch(Op::If, "quotation", branch));
            }
        }
        self.stack.push(if cond { then } else { otherwise });
        self.eval()
    }

    /// `while`: `[.. cond body]`. The condition runs before every pass and
    /// must leave a bool on top.
    pub(super) fn repeat(&mut self) -> VmResult<()> {
        self.stack.require(2)?;
        let body = self.stack.pop()?;
        let cond = self.stack.pop()?;
        for part in [&cond, &body] {
            if !part.is_invocable() {
                return Err(mismatch(Op::While, "quotation", part));
            }
        }
        let mut passes: u64 = 0;
        loop {
            self.stack.push(cond.clone());
            self.eval()?;
            match self.stack.pop()? {
                Value::Bool(true) => {}
                Value::Bool(false) => break,
                other => return Err(mismatch(Op::While, "bool", &other)),
            }
            self.stack.push(body.clone());
            self.eval()?;
            passes += 1;
        }
        tracing::trace!(passes, "while finished");
        Ok(())
    }
}
