//! The invocation router.
//!
//! `#name` spawns an external process; `@name` resolves to a declared
//! target first, then to a built-in function (built-ins can shadow
//! undeclared targets, never declared ones). Pipe chains connect stage
//! stdout to stage stdin: all-external chains use OS-level pipes, while a
//! leading target/built-in stage is buffered into the next stage's stdin.
//! Targets and built-ins cannot consume piped input.
//!
//! The capture mode is decided by the statement that contains the call:
//! a bare invocation streams, an assignment or redirection captures.

use std::io::{Read, Write};
use std::process::{Child, ChildStdout, Command, Stdio};

use cook_types::Value;
use tracing::debug;

use crate::ast::{Call, CallKind, Expr, ExprKind};
use crate::error::{ErrorKind, EvalError};

use super::coerce;
use super::Interpreter;

/// What happens to an invocation's stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Stdout flows to the interpreter's stdout.
    Stream,
    /// Stdout is captured and becomes the call's string result.
    Capture,
}

/// Data flowing into the next pipeline stage.
enum Carry {
    Start,
    Buffer(String),
    Pipe(ChildStdout),
}

impl<'p> Interpreter<'p> {
    pub(crate) fn eval_pipeline(
        &mut self,
        calls: &[Call],
        mode: OutputMode,
    ) -> Result<Value, EvalError> {
        if calls.len() == 1 {
            return self.eval_call(&calls[0], mode);
        }

        let mut children: Vec<(String, Child)> = Vec::new();
        let mut carry = Carry::Start;
        let mut result = Value::String(String::new());
        for (i, call) in calls.iter().enumerate() {
            self.set_pos(&call.pos);
            let last = i + 1 == calls.len();
            match call.kind {
                CallKind::At => {
                    if i > 0 {
                        return Err(self.err(ErrorKind::Argument(format!(
                            "target or function @{} cannot consume piped input",
                            call.name
                        ))));
                    }
                    let v = self.eval_call(call, OutputMode::Capture)?;
                    let text = match v {
                        Value::Reader(r) => r
                            .read_to_string()
                            .map_err(|e| self.err(ErrorKind::io("read piped value", e)))?,
                        other => coerce::to_string(&other).map_err(|k| self.err(k))?,
                    };
                    carry = Carry::Buffer(text);
                }
                CallKind::Hash => {
                    let args = self.eval_args_strings(&call.args)?;
                    let mut cmd = Command::new(&call.name);
                    cmd.args(&args);
                    let feed = match std::mem::replace(&mut carry, Carry::Start) {
                        Carry::Start => {
                            cmd.stdin(Stdio::inherit());
                            None
                        }
                        Carry::Pipe(out) => {
                            cmd.stdin(Stdio::from(out));
                            None
                        }
                        Carry::Buffer(text) => {
                            cmd.stdin(Stdio::piped());
                            Some(text)
                        }
                    };
                    if last && mode == OutputMode::Stream {
                        cmd.stdout(Stdio::inherit());
                    } else {
                        cmd.stdout(Stdio::piped());
                    }
                    debug!(command = %call.name, stage = i, "spawning pipeline stage");
                    let mut child = cmd.spawn().map_err(|e| {
                        self.err(ErrorKind::Process {
                            name: call.name.clone(),
                            message: e.to_string(),
                        })
                    })?;
                    if let Some(text) = feed {
                        let mut stdin = child.stdin.take().expect("stdin was piped");
                        // write from a helper thread so a large buffer
                        // cannot deadlock against the child's stdout
                        std::thread::spawn(move || {
                            let _ = stdin.write_all(text.as_bytes());
                        });
                    }
                    if last {
                        if mode == OutputMode::Capture {
                            let mut captured = String::new();
                            if let Some(mut out) = child.stdout.take() {
                                out.read_to_string(&mut captured).map_err(|e| {
                                    self.err(ErrorKind::io("read command output", e))
                                })?;
                            }
                            result = Value::String(captured);
                        }
                        children.push((call.name.clone(), child));
                    } else {
                        let out = child.stdout.take().expect("stdout was piped");
                        carry = Carry::Pipe(out);
                        children.push((call.name.clone(), child));
                    }
                }
            }
        }

        for (name, mut child) in children {
            let status = child.wait().map_err(|e| {
                self.err(ErrorKind::Process {
                    name: name.clone(),
                    message: e.to_string(),
                })
            })?;
            if !status.success() {
                return Err(self.err(ErrorKind::Process {
                    name,
                    message: status.to_string(),
                }));
            }
        }
        Ok(result)
    }

    pub(crate) fn eval_call(&mut self, call: &Call, mode: OutputMode) -> Result<Value, EvalError> {
        self.set_pos(&call.pos);
        match call.kind {
            CallKind::Hash => self.run_external(call, mode),
            CallKind::At => {
                let v = self.eval_at_call(call)?;
                if mode == OutputMode::Stream {
                    self.stream_result(v)
                } else {
                    Ok(v)
                }
            }
        }
    }

    /// In statement position, a target or built-in result that carries
    /// text is written to stdout; other values are discarded.
    fn stream_result(&mut self, v: Value) -> Result<Value, EvalError> {
        match v {
            Value::String(s) => {
                print!("{s}");
                let _ = std::io::stdout().flush();
                Ok(Value::String(String::new()))
            }
            Value::Reader(r) => {
                let mut stdout = std::io::stdout();
                r.copy_to(&mut stdout)
                    .map_err(|e| self.err(ErrorKind::io("stream output", e)))?;
                Ok(Value::String(String::new()))
            }
            other => Ok(other),
        }
    }

    fn eval_at_call(&mut self, call: &Call) -> Result<Value, EvalError> {
        let program = self.program;
        if let Some(target) = program.target(&call.name) {
            let args = self.eval_args_strings(&call.args)?;
            let returned = self.run_target(target, &args)?;
            return Ok(returned.unwrap_or(Value::Nil));
        }
        let Some(func) = self.registry.get(&call.name) else {
            return Err(self.err(ErrorKind::UnknownTarget(call.name.clone())));
        };
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.eval(arg)?);
        }
        debug!(function = %call.name, args = args.len(), "applying built-in");
        func.call(args).map_err(|k| self.err(k))
    }

    fn run_external(&mut self, call: &Call, mode: OutputMode) -> Result<Value, EvalError> {
        let args = self.eval_args_strings(&call.args)?;
        debug!(command = %call.name, ?mode, "spawning external command");
        let process_err = |name: &str, message: String| ErrorKind::Process {
            name: name.to_string(),
            message,
        };
        let mut cmd = Command::new(&call.name);
        cmd.args(&args).stdin(Stdio::inherit());
        match mode {
            OutputMode::Stream => {
                let status = cmd
                    .status()
                    .map_err(|e| self.err(process_err(&call.name, e.to_string())))?;
                if !status.success() {
                    return Err(self.err(process_err(&call.name, status.to_string())));
                }
                Ok(Value::String(String::new()))
            }
            OutputMode::Capture => {
                let output = cmd
                    .output()
                    .map_err(|e| self.err(process_err(&call.name, e.to_string())))?;
                if !output.status.success() {
                    let mut message = output.status.to_string();
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let stderr = stderr.trim();
                    if !stderr.is_empty() {
                        message = format!("{message}: {stderr}");
                    }
                    return Err(self.err(process_err(&call.name, message)));
                }
                Ok(Value::String(
                    String::from_utf8_lossy(&output.stdout).into_owned(),
                ))
            }
        }
    }

    /// Evaluate invocation arguments for an external command or a target:
    /// sequences flatten recursively, everything else stringifies.
    pub(crate) fn eval_args_strings(&mut self, args: &[Expr]) -> Result<Vec<String>, EvalError> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            let v = self.eval(arg)?;
            self.flatten_arg(v, &mut out)?;
        }
        Ok(out)
    }

    fn flatten_arg(&self, v: Value, out: &mut Vec<String>) -> Result<(), EvalError> {
        match v {
            Value::List(items) => {
                for item in items {
                    self.flatten_arg(item, out)?;
                }
                Ok(())
            }
            Value::Reader(r) => {
                let s = r
                    .read_to_string()
                    .map_err(|e| self.err(ErrorKind::io("read argument", e)))?;
                out.push(s);
                Ok(())
            }
            other => {
                out.push(coerce::to_string(&other).map_err(|k| self.err(k))?);
                Ok(())
            }
        }
    }

    /// `call > files…` / `call >> files…`: capture the call's output and
    /// stream it to every file. All files open before the first byte is
    /// written; append mode adds `O_APPEND`, overwrite mode `O_TRUNC`.
    pub(crate) fn exec_redirect(
        &mut self,
        call: &Expr,
        files: &[Expr],
        append: bool,
    ) -> Result<(), EvalError> {
        let value = match &call.kind {
            ExprKind::Pipeline(calls) => self.eval_pipeline(calls, OutputMode::Capture)?,
            _ => self.eval(call)?,
        };
        let reader = coerce::to_reader(value).map_err(|k| self.err(k))?;

        let mut paths = Vec::new();
        for file in files {
            let v = self.eval(file)?;
            match v {
                Value::List(items) => {
                    for item in items {
                        match item {
                            Value::String(s) => paths.push(s),
                            other => {
                                return Err(self.err(ErrorKind::BadPath(other.to_string())))
                            }
                        }
                    }
                }
                Value::String(s) => paths.push(s),
                other => return Err(self.err(ErrorKind::BadPath(other.to_string()))),
            }
        }

        let mut outs = Vec::with_capacity(paths.len());
        for path in &paths {
            let mut opts = std::fs::OpenOptions::new();
            opts.create(true).write(true);
            if append {
                opts.append(true);
            } else {
                opts.truncate(true);
            }
            debug!(path = %path, append, "opening redirect file");
            let f = opts
                .open(path)
                .map_err(|e| self.err(ErrorKind::io(format!("open {path}"), e)))?;
            outs.push(f);
        }

        let Some(mut src) = reader.take() else {
            return Ok(());
        };
        let mut buf = [0u8; 8192];
        loop {
            let n = src
                .read(&mut buf)
                .map_err(|e| self.err(ErrorKind::io("read redirect source", e)))?;
            if n == 0 {
                break;
            }
            for out in &mut outs {
                out.write_all(&buf[..n])
                    .map_err(|e| self.err(ErrorKind::io("write redirect target", e)))?;
            }
        }
        Ok(())
    }
}
