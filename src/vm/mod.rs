use std::io::{self, Write};

pub mod ops;
pub mod sink;
pub mod stack;
pub mod value;

mod control;
mod primitives;

pub use ops::Op;
pub use sink::{CaptureBuffer, OutputSink, DEFAULT_FLUSH_EVERY};
pub use stack::{Stack, Traffic};
pub use value::{Quotation, Value};

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("stack underflow: needed {needed} value(s), found {found}")]
    StackUnderflow { needed: usize, found: usize },
    #[error("type mismatch in '{op}': expected {expected}, found {found}")]
    TypeMismatch {
        op: Op,
        expected: &'static str,
        found: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("fuel exhausted after {limit} steps")]
    FuelExhausted { limit: u64 },
    #[error("eval nesting exceeded the limit of {limit}")]
    DepthExceeded { limit: usize },
    #[error("output error: {0}")]
    Output(#[from] io::Error),
}

impl VmError {
    pub fn code(&self) -> &'static str {
        match self {
            VmError::StackUnderflow { .. } => "HSK-R001",
            VmError::TypeMismatch { .. } => "HSK-R002",
            VmError::DivisionByZero => "HSK-R003",
            VmError::FuelExhausted { .. } => "HSK-R004",
            VmError::DepthExceeded { .. } => "HSK-R005",
            VmError::Output(_) => "HSK-R006",
        }
    }
}

pub type VmResult<T> = Result<T, VmError>;

fn mismatch(op: Op, expected: &'static str, found: &Value) -> VmError {
    VmError::TypeMismatch {
        op,
        expected,
        found: found.kind(),
    }
}

/// Knobs for one VM. Fuel and depth are unbounded unless set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    pub flush_every: usize,
    pub fuel: Option<u64>,
    pub max_depth: Option<usize>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            flush_every: DEFAULT_FLUSH_EVERY,
            fuel: None,
            max_depth: None,
        }
    }
}

impl VmConfig {
    pub fn flush_every(mut self, lines: usize) -> Self {
        self.flush_every = lines;
        self
    }

    pub fn fuel(mut self, steps: u64) -> Self {
        self.fuel = Some(steps);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// Grow the native stack before recursing into a quotation body.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    const RED_ZONE: usize = 100 * 1024;
    const STACK_PER_RECURSION: usize = 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// One execution context: the operand stack, the print sink, and the
/// step/depth accounting behind the optional limits.
pub struct Vm<W: Write> {
    stack: Stack,
    sink: OutputSink<W>,
    config: VmConfig,
    steps: u64,
    depth: usize,
}

impl Vm<io::Stdout> {
    pub fn stdout(config: VmConfig) -> Self {
        Vm::new(io::stdout(), config)
    }
}

impl<W: Write> Vm<W> {
    pub fn new(writer: W, config: VmConfig) -> Self {
        Vm {
            stack: Stack::new(),
            sink: OutputSink::with_flush_every(writer, config.flush_every),
            config,
            steps: 0,
            depth: 0,
        }
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    pub fn sink_mut(&mut self) -> &mut OutputSink<W> {
        &mut self.sink
    }

    /// Items executed by the latest run, counted against the fuel budget.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.stack.push(value.into());
    }

    /// Execute a program: operation references dispatch, list literals are
    /// built, everything else is pushed. Each run gets the full fuel budget.
    pub fn run(&mut self, items: &[Value]) -> VmResult<()> {
        self.run_with(items, |_, _| {})
    }

    /// Like [`Vm::run`], calling `after_item` with the stack after each top-level item.
    pub fn run_with(
        &mut self,
        items: &[Value],
        mut after_item: impl FnMut(&Value, &Stack),
    ) -> VmResult<()> {
        tracing::debug!(items = items.len(), "run");
        self.steps = 0;
        for item in items {
            self.step(item)?;
            after_item(item, &self.stack);
        }
        tracing::debug!(steps = self.steps, depth = self.stack.len(), "run finished");
        Ok(())
    }

    /// Execute a single program item.
    pub fn step(&mut self, item: &Value) -> VmResult<()> {
        match item {
            Value::Quotation(Quotation::Op(op)) => self.dispatch(*op),
            Value::Quotation(Quotation::List(body)) => {
                self.consume_fuel()?;
                self.build_list(body)
            }
            literal => {
                self.consume_fuel()?;
                self.stack.push(literal.clone());
                Ok(())
            }
        }
    }

    pub fn dispatch(&mut self, op: Op) -> VmResult<()> {
        self.consume_fuel()?;
        tracing::trace!(op = %op, stack = self.stack.len(), depth = self.depth, "dispatch");
        match op {
            Op::Add => self.int_binop(op, |a, b| Ok(a.wrapping_add(b))),
            Op::Sub => self.int_binop(op, |a, b| Ok(a.wrapping_sub(b))),
            Op::Mul => self.int_binop(op, |a, b| Ok(a.wrapping_mul(b))),
            Op::Div => self.int_binop(op, |a, b| {
                if b == 0 {
                    Err(VmError::DivisionByZero)
                } else {
                    Ok(a.wrapping_div(b))
                }
            }),
            Op::Lt => self.int_compare(op, |a, b| a < b),
            Op::Gt => self.int_compare(op, |a, b| a > b),
            Op::Lte => self.int_compare(op, |a, b| a <= b),
            Op::Gte => self.int_compare(op, |a, b| a >= b),
            Op::Eq => self.equals(),
            Op::Not => self.not(),
            Op::Dup => self.dup(),
            Op::Cons => self.cons(),
            Op::Print => self.print(),
            Op::TypeOf => self.type_of(),
            Op::Eval => self.eval(),
            Op::If => self.branch(),
            Op::While => self.repeat(),
        }
    }

    /// Flush buffered output. Dropping the VM flushes as well.
    pub fn finish(&mut self) -> VmResult<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// Consume the VM, flushing output, and hand back the final stack.
    pub fn into_stack(self) -> Stack {
        self.stack
    }

    fn consume_fuel(&mut self) -> VmResult<()> {
        self.steps += 1;
        match self.config.fuel {
            Some(limit) if self.steps > limit => Err(VmError::FuelExhausted { limit }),
            _ => Ok(()),
        }
    }
}
