//! The evaluator core.
//!
//! [`Interpreter`] walks a parsed [`Program`]: it owns the scope stack,
//! the per-target loop-control machines, the built-in function registry
//! and the position register used to locate errors. Execution is
//! single-threaded and synchronous; the only suspension points are
//! blocking system calls (process spawn, file and network I/O).
//!
//! Error flow: evaluation returns `Result`; the first error that reaches
//! the orchestration layer is printed as `file:line:column MESSAGE` and
//! cancels the remaining statements. `finalize` still runs, including
//! when target execution panics. A `??` fallback catches recoverable
//! errors before they reach that layer.

pub(crate) mod coerce;
mod eval;
mod exec;
mod invoke;
mod loops;
mod scope;

pub use invoke::OutputMode;
pub use loops::LoopMachine;
pub use scope::{Origin, Scope};

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use cook_types::Value;
use tracing::debug;

use crate::ast::{Pos, Program, Target, TargetKind};
use crate::error::{ErrorKind, EvalError};
use crate::functions::Registry;
use crate::source::Position;

pub struct Interpreter<'p> {
    program: &'p Program,
    registry: Registry,
    scope: Scope,
    /// One loop machine per active target run, innermost last.
    machines: Vec<LoopMachine>,
    /// Position register: the most recently visited node.
    pos: Option<Pos>,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            registry: Registry::with_builtins(),
            scope: Scope::new(),
            machines: Vec::new(),
            pos: None,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub(crate) fn set_pos(&mut self, pos: &Pos) {
        self.pos = Some(pos.clone());
    }

    pub(crate) fn position(&self) -> Position {
        self.pos
            .as_ref()
            .map(Pos::position)
            .unwrap_or_else(Position::none)
    }

    pub(crate) fn err(&self, kind: ErrorKind) -> EvalError {
        EvalError::new(self.position(), kind)
    }

    pub(crate) fn machine(&self) -> Option<&LoopMachine> {
        self.machines.last()
    }

    pub(crate) fn machine_mut(&mut self) -> Option<&mut LoopMachine> {
        self.machines.last_mut()
    }

    /// Run the program: merge CLI variables, execute top-level statements,
    /// then `initialize`, the requested targets (default `all`), and
    /// `finalize` — the latter unconditionally, even when a target
    /// cancels or panics. Returns the process exit code.
    pub fn execute(&mut self, names: &[String], vars: HashMap<String, Value>) -> i32 {
        for (name, value) in vars {
            self.scope.insert_global(name, value);
        }

        let program = self.program;
        for stmt in &program.statements {
            if let Err(e) = self.exec_stmt(stmt) {
                return self.report(e);
            }
        }

        let mut code = 0;
        if let Some(init) = program.target("initialize") {
            debug!("running initialize");
            if let Err(e) = self.run_target(init, &[]) {
                code = self.report(e);
            }
        }

        if code == 0 {
            let run = panic::catch_unwind(AssertUnwindSafe(|| self.run_requested(names)));
            match run {
                Ok(Ok(())) => {}
                Ok(Err(e)) => code = self.report(e),
                Err(payload) => {
                    self.run_finalize();
                    panic::resume_unwind(payload);
                }
            }
        }

        self.run_finalize();
        code
    }

    fn run_requested(&mut self, names: &[String]) -> Result<(), EvalError> {
        let program = self.program;
        if names.is_empty() {
            match program.target("all") {
                Some(all) => {
                    self.run_target(all, &[])?;
                }
                None => {
                    return Err(self.err(ErrorKind::UnknownTarget("all".into())));
                }
            }
            return Ok(());
        }
        for name in names {
            // lifecycle targets are skipped when named explicitly
            if name == "initialize" || name == "finalize" {
                continue;
            }
            match program.target(name) {
                Some(t) => {
                    self.run_target(t, &[])?;
                }
                None => return Err(self.err(ErrorKind::UnknownTarget(name.clone()))),
            }
        }
        Ok(())
    }

    fn run_finalize(&mut self) {
        let program = self.program;
        if let Some(fin) = program.target("finalize") {
            debug!("running finalize");
            if let Err(e) = self.run_target(fin, &[]) {
                self.report(e);
            }
        }
    }

    fn report(&self, e: EvalError) -> i32 {
        match e.kind {
            ErrorKind::Exit(code) => code,
            _ => {
                eprintln!("{e}");
                1
            }
        }
    }

    /// Run one target: save and restore the working directory, open a
    /// scope frame carrying the positional argument bindings, and install
    /// a fresh loop machine so nested loops cannot break out of the
    /// target. Returns the target's `return` value, if any.
    pub(crate) fn run_target(
        &mut self,
        target: &'p Target,
        args: &[String],
    ) -> Result<Option<Value>, EvalError> {
        debug!(target = %target.name, args = args.len(), "entering target");
        let saved_dir = std::env::current_dir()
            .map_err(|e| self.err(ErrorKind::io("cannot read working directory", e)))?;

        self.scope.push_frame();
        self.machines.push(LoopMachine::new());
        self.scope
            .insert_local("0", Value::Int(args.len() as i64));
        for (i, arg) in args.iter().enumerate() {
            self.scope
                .insert_local((i + 1).to_string(), Value::String(arg.clone()));
        }

        let result = self.run_target_body(target, args);

        self.machines.pop();
        self.scope.pop_frame();
        if let Err(e) = std::env::set_current_dir(&saved_dir) {
            debug!(error = %e, "could not restore working directory");
        }
        result
    }

    fn run_target_body(
        &mut self,
        target: &'p Target,
        args: &[String],
    ) -> Result<Option<Value>, EvalError> {
        let program = self.program;
        if target.kind == TargetKind::All && target.body.is_empty() {
            // the universal dispatcher: every non-lifecycle target in
            // declaration order
            for t in &program.targets {
                if t.kind.is_lifecycle() {
                    continue;
                }
                self.run_target(t, args)?;
            }
            return Ok(None);
        }
        match self.exec_block(&target.body)? {
            exec::Flow::Return(v) => Ok(Some(v)),
            exec::Flow::Normal => Ok(None),
        }
    }
}
