//! Interactive shell over one persistent VM.
//!
//! Every line is compiled against the session's macro table and run on the
//! same stack. Prompts, reports and `print` output all go through the VM's
//! sink so they interleave in order.

use std::io::{self, BufRead, Write};

use crate::diagnostic::ansi::AnsiRenderer;
use crate::diagnostic::Diagnostic;
use crate::parser::Macros;
use crate::vm::{Vm, VmConfig};

pub const PROMPT: &str = "hastack> ";

const HELP: &str = "\
HELP: Commands: `stack`, `quit`, `help`
    :stack      Prints an ascii representation of the Stack.
    :quit       Exits the shell.
    :help       Opens this menu.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Repl<W: Write> {
    vm: Vm<W>,
    macros: Macros,
}

impl Repl<io::Stdout> {
    pub fn stdout(config: VmConfig) -> Self {
        Repl::new(Vm::stdout(config))
    }
}

impl<W: Write> Repl<W> {
    pub fn new(vm: Vm<W>) -> Self {
        Repl { vm, macros: Macros::new() }
    }

    pub fn vm(&self) -> &Vm<W> {
        &self.vm
    }

    /// Read lines until `:quit` or end of input.
    pub fn run<R: BufRead>(&mut self, mut input: R) -> io::Result<()> {
        let mut line = String::new();
        loop {
            self.vm.sink_mut().write_str(PROMPT);
            self.vm.sink_mut().flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                // Leave the terminal on a fresh line after ^D.
                self.vm.sink_mut().write_line("")?;
                break;
            }
            if self.handle_line(line.trim_end_matches(['\n', '\r']))? == Flow::Quit {
                break;
            }
        }
        self.vm.sink_mut().flush()
    }

    pub fn handle_line(&mut self, line: &str) -> io::Result<Flow> {
        match line.trim() {
            "" => {}
            ":stack" | ":s" => {
                let picture = self.vm.stack().render();
                self.vm.sink_mut().write_str(&picture);
            }
            ":help" | ":h" | "help" => self.vm.sink_mut().write_line(HELP)?,
            ":quit" | ":q" => {
                self.vm.sink_mut().write_line("Quitting hastack shell")?;
                return Ok(Flow::Quit);
            }
            _ => self.evaluate(line)?,
        }
        self.vm.sink_mut().flush()?;
        Ok(Flow::Continue)
    }

    fn evaluate(&mut self, line: &str) -> io::Result<()> {
        let program = match crate::compile_with_macros(line, &mut self.macros) {
            Ok(program) => program,
            Err(e) => return self.report(Diagnostic::from(&e).with_source(line)),
        };

        // Traffic is reported per line; `run` also restarts the fuel budget.
        self.vm.stack_mut().take_traffic();
        if let Err(e) = self.vm.run(&program.items) {
            tracing::debug!(error = %e, "resetting stack after runtime error");
            self.vm.stack_mut().clear();
            return self.report(Diagnostic::from(&e));
        }

        let traffic = self.vm.stack().traffic();
        let summary = self.vm.stack().values().last().map(|top| format!("{top} : {}", top.kind()));
        if let Some(summary) = summary {
            self.vm.sink_mut().write_line(&summary)?;
        }
        self.vm.sink_mut().write_line(&format!(
            "Popped {} elements, pushed {}.",
            traffic.popped, traffic.pushed
        ))
    }

    fn report(&mut self, diagnostic: Diagnostic) -> io::Result<()> {
        let text = AnsiRenderer { use_color: false }.render(&diagnostic);
        self.vm.sink_mut().write_str(&text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{CaptureBuffer, Value};

    fn session(input: &str) -> (String, Vec<Value>) {
        session_with(VmConfig::default(), input)
    }

    fn session_with(config: VmConfig, input: &str) -> (String, Vec<Value>) {
        let out = CaptureBuffer::new();
        let mut repl = Repl::new(Vm::new(out.clone(), config));
        repl.run(input.as_bytes()).unwrap();
        let stack = repl.vm().stack().values().to_vec();
        (out.contents(), stack)
    }

    #[test]
    fn reports_top_and_traffic() {
        let (out, stack) = session("1 2 +\n");
        assert!(out.contains("3 : int\n"), "{out}");
        assert!(out.contains("Popped 2 elements, pushed 3.\n"), "{out}");
        assert_eq!(stack, vec![Value::Int(3)]);
    }

    #[test]
    fn stack_persists_between_lines() {
        let (out, stack) = session("1\n2\n+ print\n");
        assert!(out.contains("3\nPopped 3 elements, pushed 1.\n"), "{out}");
        assert!(stack.is_empty());
    }

    #[test]
    fn traffic_is_per_line() {
        let (out, _) = session("1 2\n3\n");
        assert!(out.contains("Popped 0 elements, pushed 2."), "{out}");
        assert!(out.contains("Popped 0 elements, pushed 1."), "{out}");
    }

    #[test]
    fn macros_persist_between_lines() {
        let (_, stack) = session("define sq . * end\n7 sq\n");
        assert_eq!(stack, vec![Value::Int(49)]);
    }

    #[test]
    fn runtime_error_resets_stack() {
        let (out, stack) = session("5 6 0 /\n");
        assert!(out.contains("error[HSK-R003]: division by zero"), "{out}");
        assert!(stack.is_empty());
    }

    #[test]
    fn fuel_is_budgeted_per_line() {
        let config = VmConfig::default().fuel(10);
        let (out, stack) = session_with(
            config,
            "1 2 + print\n1 2 + print\n1 2 + print\nTrue {True} {} while\n1 print\n",
        );
        assert_eq!(out.matches("3\nPopped 3 elements, pushed 3.\n").count(), 3, "{out}");
        assert_eq!(out.matches("error[HSK-R004]").count(), 1, "{out}");
        assert!(out.contains("1\nPopped 1 elements, pushed 1.\n"), "{out}");
        assert!(stack.is_empty());
    }

    #[test]
    fn list_literal_runs_on_its_own_stack() {
        let (out, stack) = session("5\n[1 2 +] type? print\n");
        assert!(out.contains("block\n[3]\n"), "{out}");
        assert_eq!(stack, vec![Value::Int(5)]);
    }

    #[test]
    fn parse_error_keeps_stack() {
        let (out, stack) = session("4\n1 swap\n");
        assert!(out.contains("error[HSK-P006]: unknown word: 'swap'"), "{out}");
        assert!(out.contains("1 | 1 swap"), "{out}");
        assert_eq!(stack, vec![Value::Int(4)]);
    }

    #[test]
    fn stack_command_draws_boxes() {
        let (out, _) = session("1 22\n:s\n");
        assert!(out.contains("  |  22   |\n"), "{out}");
        assert!(out.contains("  |   1   |\n"), "{out}");
    }

    #[test]
    fn help_and_quit() {
        let (out, stack) = session(":help\n:q\n1\n");
        assert!(out.contains(":stack      Prints an ascii representation"), "{out}");
        assert!(out.ends_with("Quitting hastack shell\n"), "{out}");
        assert!(stack.is_empty());
    }

    #[test]
    fn prompt_before_every_line() {
        let (out, _) = session("\n\n");
        assert_eq!(out.matches(PROMPT).count(), 3);
    }
}
