//! Error taxonomy of the interpreter.
//!
//! Evaluation errors carry the source position captured from the position
//! register at the time they are raised; the statement loop prints them as
//! `file:line:column MESSAGE` on stderr and raises the cancellation flag.
//! `exit` travels through the same channel but is control flow, not a
//! fault: `??` never swallows it.

use cook_types::Kind;
use thiserror::Error;

use crate::source::Position;

/// A positioned evaluation error.
#[derive(Debug, Error)]
#[error("{pos} {kind}")]
pub struct EvalError {
    pub pos: Position,
    pub kind: ErrorKind,
}

impl EvalError {
    pub fn new(pos: Position, kind: ErrorKind) -> Self {
        Self { pos, kind }
    }

    /// Whether a `??` fallback may swallow this error.
    pub fn recoverable(&self) -> bool {
        !matches!(self.kind, ErrorKind::Exit(_))
    }
}

/// The abstract error kinds of the runtime.
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("variable {0} has not been bound")]
    UnboundVariable(String),
    #[error("variable {0} is not defined")]
    UndefinedVariable(String),
    #[error("{0}")]
    TypeMismatch(String),
    #[error("variable \"{name}\" must keep its origin type {kind}")]
    TypeRestriction { name: String, kind: Kind },
    #[error("cannot cast {value} to type {to}")]
    Cast { value: String, to: &'static str },
    #[error("index {index} out of range 0, {max}")]
    OutOfRange { index: i64, max: i64 },
    #[error("cannot loop value {0}, only map or array is allowed")]
    NotIterable(String),
    #[error("loop label {0} not found")]
    UnknownLabel(String),
    #[error("{0} is allowed inside a target only")]
    NotInLoop(&'static str),
    #[error("target or function {0} does not exist")]
    UnknownTarget(String),
    #[error("command {name}: {message}")]
    Process { name: String, message: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("value {0} is not a file path")]
    BadPath(String),
    #[error("variable {0} is a read only environment variable")]
    ReadOnly(String),
    #[error("{0}")]
    Argument(String),
    /// `exit CODE`; terminates the program with the given code.
    #[error("exit {0}")]
    Exit(i32),
}

impl ErrorKind {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ErrorKind::Io {
            context: context.into(),
            source,
        }
    }

    pub fn at(self, pos: Position) -> EvalError {
        EvalError::new(pos, self)
    }
}

/// A parse failure. Individual syntax errors are printed as they are
/// found; this summarizes the run.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    Include(String),
    #[error("parse encountered {0} error(s)")]
    Syntax(usize),
}
