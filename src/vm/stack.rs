use super::value::Value;
use super::VmError;

/// Running totals of stack traffic, reported by the REPL after each line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Traffic {
    pub popped: u64,
    pub pushed: u64,
}

/// LIFO operand stack. Operations only ever `push` and `pop`; the read-only
/// accessors exist for drivers and tests.
#[derive(Debug, Default, Clone)]
pub struct Stack {
    values: Vec<Value>,
    traffic: Traffic,
}

impl Stack {
    pub fn new() -> Self {
        Stack::default()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
        self.traffic.pushed += 1;
    }

    pub fn pop(&mut self) -> Result<Value, VmError> {
        let value = self
            .values
            .pop()
            .ok_or(VmError::StackUnderflow { needed: 1, found: 0 })?;
        self.traffic.popped += 1;
        Ok(value)
    }

    /// Fails with `StackUnderflow` unless at least `n` values are present.
    /// Checked up front so an underflowing operation consumes nothing.
    pub fn require(&self, n: usize) -> Result<(), VmError> {
        if self.values.len() < n {
            return Err(VmError::StackUnderflow {
                needed: n,
                found: self.values.len(),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bottom first.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Drops every value without counting it as traffic.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn traffic(&self) -> Traffic {
        self.traffic
    }

    pub fn take_traffic(&mut self) -> Traffic {
        std::mem::take(&mut self.traffic)
    }

    /// Fold in traffic recorded on another stack, e.g. a list literal's scratch stack.
    pub fn absorb_traffic(&mut self, other: Traffic) {
        self.traffic.popped += other.popped;
        self.traffic.pushed += other.pushed;
    }

    /// ASCII picture of the stack, top value first.
    pub fn render(&self) -> String {
        const PADDING: usize = 3;

        let mut reprs: Vec<String> = self.values.iter().rev().map(ToString::to_string).collect();
        if reprs.is_empty() {
            reprs.push(String::new());
        }
        let width = reprs.iter().map(|r| r.chars().count()).max().unwrap_or(0) + PADDING;
        let rule = format!("  {}\n", "-".repeat(width + 4));

        let mut out = String::new();
        for repr in &reprs {
            out.push_str(&rule);
            out.push_str(&format!("  | {repr:^width$} |\n"));
        }
        out.push_str(&rule);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_is_lifo() {
        let mut stack = Stack::new();
        stack.push(Value::Int(1));
        stack.push(Value::Int(2));
        assert_eq!(stack.pop().unwrap(), Value::Int(2));
        assert_eq!(stack.pop().unwrap(), Value::Int(1));
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_empty_underflows() {
        let mut stack = Stack::new();
        assert!(matches!(
            stack.pop(),
            Err(VmError::StackUnderflow { needed: 1, found: 0 })
        ));
    }

    #[test]
    fn require_reports_depth() {
        let mut stack = Stack::new();
        stack.push(Value::Bool(true));
        assert!(stack.require(1).is_ok());
        match stack.require(3) {
            Err(VmError::StackUnderflow { needed, found }) => {
                assert_eq!((needed, found), (3, 1));
            }
            other => panic!("expected underflow, got {other:?}"),
        }
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn traffic_counts_and_resets() {
        let mut stack = Stack::new();
        stack.push(Value::Int(1));
        stack.push(Value::Int(2));
        stack.pop().unwrap();
        assert_eq!(stack.take_traffic(), Traffic { popped: 1, pushed: 2 });
        assert_eq!(stack.traffic(), Traffic::default());
        stack.clear();
        assert_eq!(stack.traffic(), Traffic::default());

        stack.push(Value::Int(3));
        stack.absorb_traffic(Traffic { popped: 2, pushed: 1 });
        assert_eq!(stack.traffic(), Traffic { popped: 2, pushed: 2 });
    }

    #[test]
    fn render_puts_top_first() {
        let mut stack = Stack::new();
        stack.push(Value::Int(1));
        stack.push(Value::Int(22));
        let picture = stack.render();
        let rows: Vec<&str> = picture.lines().filter(|l| l.contains('|')).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains("22"));
        assert!(rows[1].contains('1'));
        assert_eq!(picture.lines().next().unwrap(), format!("  {}", "-".repeat(9)));
    }

    #[test]
    fn render_empty_stack_draws_one_box() {
        let picture = Stack::new().render();
        assert_eq!(picture, "  -------\n  |     |\n  -------\n");
    }
}
