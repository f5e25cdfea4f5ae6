use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use hastack::diagnostic::ansi::AnsiRenderer;
use hastack::diagnostic::{json, Diagnostic, Severity};
use hastack::repl::Repl;
use hastack::vm::{Vm, VmConfig, DEFAULT_FLUSH_EVERY};

#[derive(Parser, Debug)]
#[command(name = "hastack", version)]
#[command(about = "Run hastack programs, or start the interactive shell when no input is given")]
struct Cli {
    /// Program file to run
    file: Option<PathBuf>,

    /// Run inline code instead of a file
    #[arg(short, long, conflicts_with = "file")]
    eval: Option<String>,

    /// Flush printed output after this many lines
    #[arg(long, default_value_t = DEFAULT_FLUSH_EVERY)]
    flush_every: usize,

    /// Abort after executing this many items
    #[arg(long)]
    fuel: Option<u64>,

    /// Abort when quotation calls nest deeper than this
    #[arg(long)]
    max_depth: Option<usize>,

    /// Check stack effects first and refuse to run on errors
    #[arg(long)]
    check: bool,

    /// Draw the stack on stderr after every top-level item
    #[arg(long)]
    trace: bool,

    /// Print the parsed program instead of running it
    #[arg(long, value_enum)]
    emit: Option<Emit>,

    /// Report errors as JSON lines on stderr
    #[arg(long)]
    json_errors: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Emit {
    Json,
}

struct Reporter<'a> {
    json: bool,
    color: bool,
    source: &'a str,
}

impl Reporter<'_> {
    fn report(&self, diagnostic: Diagnostic) {
        let diagnostic = diagnostic.with_source(self.source);
        if self.json {
            eprintln!("{}", json::render(&diagnostic));
        } else {
            eprint!("{}", AnsiRenderer { use_color: self.color }.render(&diagnostic));
        }
    }
}

fn main() -> ExitCode {
    hastack::init_tracing();
    let cli = Cli::parse();

    let config = VmConfig {
        flush_every: cli.flush_every,
        fuel: cli.fuel,
        max_depth: cli.max_depth,
    };

    let source = match (&cli.file, &cli.eval) {
        (Some(path), _) => match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        (None, Some(code)) => code.clone(),
        (None, None) => return repl(config),
    };

    let reporter = Reporter {
        json: cli.json_errors,
        color: !cli.json_errors && io::stderr().is_terminal(),
        source: &source,
    };

    let program = match hastack::compile(&source) {
        Ok(program) => program,
        Err(e) => {
            reporter.report(Diagnostic::from(&e));
            return ExitCode::FAILURE;
        }
    };

    if let Some(Emit::Json) = cli.emit {
        return match serde_json::to_string_pretty(&program) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Serialization error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    if cli.check {
        let findings = hastack::verify::verify(&program);
        let failed = findings.iter().any(|f| f.severity == Severity::Error);
        for finding in &findings {
            reporter.report(Diagnostic::from(finding));
        }
        if failed {
            return ExitCode::FAILURE;
        }
    }

    let mut vm = Vm::stdout(config);
    let ran = if cli.trace {
        vm.run_with(&program.items, |item, stack| {
            eprint!("after {item}:\n{}", stack.render());
        })
    } else {
        vm.run(&program.items)
    };
    let outcome = ran.and_then(|()| vm.finish());
    // Dropping the VM flushes anything printed before a failure.
    drop(vm);

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            reporter.report(Diagnostic::from(&e));
            ExitCode::FAILURE
        }
    }
}

fn repl(config: VmConfig) -> ExitCode {
    let mut repl = Repl::stdout(config);
    match repl.run(io::stdin().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
