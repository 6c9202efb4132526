//! cook CLI entry point.
//!
//! Usage:
//!   cook [flags] [TARGET ...]     # interpret Cookfile (or -c PATH)
//!   cook @FUNC [args ...]         # invoke a built-in function directly
//!   cook help [@FUNC]             # top-level or per-function help

mod args;
mod format;

use std::io::Write;
use std::process::ExitCode;

use cook_kernel::functions::Registry;
use cook_kernel::{help, Interpreter, Parser};
use cook_types::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::args::Action;

fn main() -> ExitCode {
    // interpreter tracing lands on stderr; enable with COOK_LOG=debug
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_env("COOK_LOG"))
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let opts = match args::parse(&raw) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match opts.action {
        Action::Help { function } => run_help(function.as_deref()),
        Action::Function { name, args } => run_function(&name, args),
        Action::Run => run_cookfile(opts),
    }
}

fn run_help(function: Option<&str>) -> ExitCode {
    let registry = Registry::with_builtins();
    match function {
        None => {
            print!("{}", help::general(&registry));
            ExitCode::SUCCESS
        }
        Some(name) => match registry.get(name) {
            Some(f) => {
                print!("{}", help::function(f.as_ref()));
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("function @{name} does not exist");
                ExitCode::FAILURE
            }
        },
    }
}

/// `cook @FUNC args…`: apply the function and print its result.
fn run_function(name: &str, raw_args: Vec<String>) -> ExitCode {
    let registry = Registry::with_builtins();
    let Some(f) = registry.get(name) else {
        eprintln!("function @{name} does not exist");
        return ExitCode::FAILURE;
    };
    let args: Vec<Value> = raw_args.into_iter().map(Value::String).collect();
    match f.call(args) {
        Ok(Value::Nil) => ExitCode::SUCCESS,
        Ok(value) => {
            let stdout = std::io::stdout();
            let mut w = stdout.lock();
            if let Err(e) = format::print_value(&mut w, &value) {
                eprintln!("error while writing @{name} output: {e}");
                return ExitCode::FAILURE;
            }
            let _ = writeln!(w);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error while executing @{name}: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_cookfile(opts: args::MainOptions) -> ExitCode {
    let program = match Parser::parse(&opts.cookfile) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let mut interp = Interpreter::new(&program);
    match interp.execute(&opts.targets, opts.vars) {
        0 => ExitCode::SUCCESS,
        code => ExitCode::from(code.clamp(1, 255) as u8),
    }
}
