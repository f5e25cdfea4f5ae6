//! hastack: a small concatenative stack machine.
//!
//! Source text is lexed ([`lexer`]), parsed with macro expansion into a flat
//! [`ast::Program`] ([`parser`]), optionally checked for stack effects
//! ([`verify`]) and executed by the [`vm`]. The [`repl`] drives the same
//! pipeline one line at a time.

use std::io::Write;
use std::sync::Once;

pub mod ast;
pub mod diagnostic;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod verify;
pub mod vm;

use ast::Program;
use parser::Macros;
use vm::{Stack, Vm, VmConfig, VmError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] lexer::LexError),
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Runtime(#[from] VmError),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::Lex(_) => "HSK-L001",
            Error::Parse(e) => e.code,
            Error::Runtime(e) => e.code(),
        }
    }
}

/// Lex and parse `source` with a fresh macro table.
pub fn compile(source: &str) -> Result<Program, Error> {
    compile_with_macros(source, &mut Macros::new())
}

/// Lex and parse `source`, resolving and recording `define`s in `macros`.
pub fn compile_with_macros(source: &str, macros: &mut Macros) -> Result<Program, Error> {
    let tokens = lexer::lex(source)?;
    Ok(parser::parse_with_macros(tokens, macros)?)
}

/// Compile and run `source`, printing to `writer`. Output is flushed before
/// returning, whether or not the run failed.
pub fn run_source<W: Write>(source: &str, writer: W, config: VmConfig) -> Result<Stack, Error> {
    let program = compile(source)?;
    let mut vm = Vm::new(writer, config);
    vm.run(&program.items)?;
    vm.finish()?;
    Ok(vm.into_stack())
}

static TRACING_INIT: Once = Once::new();

/// Install a stderr `tracing` subscriber. Does nothing unless `RUST_LOG` is
/// set, e.g. `RUST_LOG=hastack=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{CaptureBuffer, Value};

    fn run(source: &str) -> (Result<Stack, Error>, String) {
        let out = CaptureBuffer::new();
        let result = run_source(source, out.clone(), VmConfig::default());
        (result, out.contents())
    }

    #[test]
    fn end_to_end_arithmetic() {
        let (result, out) = run("1 2 + print");
        assert!(result.unwrap().is_empty());
        assert_eq!(out, "3\n");
    }

    #[test]
    fn final_stack_is_returned() {
        let (result, _) = run("define sq . * end 9 sq");
        assert_eq!(result.unwrap().values(), &[Value::Int(81)]);
    }

    #[test]
    fn output_before_a_runtime_error_is_kept() {
        let (result, out) = run("1 print 2 print 0 0 /");
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Runtime(VmError::DivisionByZero)));
        assert_eq!(out, "1\n2\n");
    }

    #[test]
    fn front_end_errors_run_nothing() {
        let (result, out) = run("1 print }");
        assert_eq!(result.unwrap_err().code(), "HSK-P001");
        assert!(out.is_empty());

        let (result, _) = run("'xy'");
        assert!(matches!(result, Err(Error::Lex(_))));
    }

    #[test]
    fn list_literal_body_is_evaluated() {
        let (result, out) = run("[1 2 +] print [0 [1 1 +] <:] print");
        assert!(result.unwrap().is_empty());
        assert_eq!(out, "[3]\n[0 2]\n");
    }

    #[test]
    fn countdown_loop() {
        let (_, out) = run("3 {. 0 >} {. print 1 -} while");
        assert_eq!(out, "3\n2\n1\n");
    }
}
