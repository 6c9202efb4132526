//! AST type definitions.
//!
//! Nodes are plain data; evaluation lives in [`crate::interpreter`]. Every
//! expression and statement records the byte offset of its first token so
//! the evaluator can load the position register before visiting it.

use std::sync::Arc;

use cook_types::Kind;
use indexmap::IndexMap;

use crate::source::{Position, SourceFile};
use crate::token::Token;

/// A source anchor: the owning file plus a byte offset.
#[derive(Debug, Clone)]
pub struct Pos {
    pub file: Arc<SourceFile>,
    pub offset: usize,
}

impl Pos {
    pub fn new(file: Arc<SourceFile>, offset: usize) -> Self {
        Self { file, offset }
    }

    pub fn position(&self) -> Position {
        self.file.position(self.offset)
    }
}

/// An expression node.
#[derive(Debug, Clone)]
pub struct Expr {
    pub pos: Pos,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(pos: Pos, kind: ExprKind) -> Self {
        Self { pos, kind }
    }
}

/// A literal in parsed form; materialized verbatim on evaluation.
#[derive(Debug, Clone)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// The quote mark (`'` or `"`, `None` for bare argument words)
    /// affects only re-serialization.
    Str {
        value: String,
        quote: Option<char>,
    },
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    /// A `"…"` literal with `$NAME` / `${EXPR}` inserts: raw segments
    /// interleaved with stringified sub-values at the recorded positions.
    StringInterp {
        raw: String,
        inserts: Vec<(usize, Expr)>,
    },
    List(Vec<Expr>),
    MapLit(Vec<(Expr, Expr)>),
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// `[a..b]`, `(a..b]`, `[a..b)`, `(a..b)`; only valid inside `for`.
    Interval {
        a: Box<Expr>,
        b: Box<Expr>,
        incl_a: bool,
        incl_b: bool,
    },
    Unary {
        op: Token,
        x: Box<Expr>,
    },
    /// `name++` / `name--`; updates the binding in place.
    IncDec {
        op: Token,
        name: String,
    },
    Binary {
        op: Token,
        l: Box<Expr>,
        r: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Fallback {
        primary: Box<Expr>,
        secondary: Box<Expr>,
    },
    SizeOf(Box<Expr>),
    IsType {
        x: Box<Expr>,
        bits: u8,
        types: Vec<Token>,
    },
    Cast {
        to: Kind,
        x: Box<Expr>,
    },
    /// A pipe chain of one or more invocations; a single-element chain is
    /// a plain call.
    Pipeline(Vec<Call>),
    /// `< path` in argument position: whole file contents as a string.
    ReadFrom(Box<Expr>),
    /// `~path`: a lazily-opened reader over the file.
    ReadFd(Box<Expr>),
    Paren(Box<Expr>),
}

/// Invocation prefix: `@` targets/built-ins, `#` external processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    At,
    Hash,
}

/// One `@name args…` or `#name args…` invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub pos: Pos,
    pub kind: CallKind,
    pub name: String,
    pub args: Vec<Expr>,
}

/// A statement node.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub pos: Pos,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(pos: Pos, kind: StmtKind) -> Self {
        Self { pos, kind }
    }
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// An expression in statement position (invocation, `x++`).
    Expr(Expr),
    Assign {
        name: String,
        op: Token,
        value: Expr,
    },
    If(IfStmt),
    For(ForStmt),
    Break {
        label: Option<String>,
    },
    Continue {
        label: Option<String>,
    },
    Return(Option<Expr>),
    Exit(Expr),
    /// `delete X[i, j]` or `delete X[a..b]`.
    Delete {
        name: String,
        indexes: Vec<Expr>,
        end: Option<Expr>,
    },
    /// `call > files…` / `call >> files…`.
    Redirect {
        call: Expr,
        files: Vec<Expr>,
        append: bool,
    },
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub body: Block,
    pub otherwise: Option<ElseArm>,
}

#[derive(Debug, Clone)]
pub enum ElseArm {
    If(Box<IfStmt>),
    Block(Block),
}

#[derive(Debug, Clone)]
pub struct ForStmt {
    pub label: Option<String>,
    pub kind: ForKind,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub enum ForKind {
    /// `for { … }`: loops until a break targets it.
    Loop,
    /// `for i in [a..b]`: integer endpoints, direction inferred.
    Range { var: String, interval: Expr },
    /// `for k in X` / `for k, v in X` over a list or map.
    Collection {
        key: String,
        value: Option<String>,
        expr: Expr,
    },
}

/// Target classification; lifecycle targets have fixed names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Normal,
    Initialize,
    Finalize,
    All,
}

impl TargetKind {
    pub fn of(name: &str) -> TargetKind {
        match name {
            "initialize" => TargetKind::Initialize,
            "finalize" => TargetKind::Finalize,
            "all" => TargetKind::All,
            _ => TargetKind::Normal,
        }
    }

    pub fn is_lifecycle(self) -> bool {
        !matches!(self, TargetKind::Normal)
    }
}

/// A named, callable block of statements.
#[derive(Debug, Clone)]
pub struct Target {
    pub pos: Pos,
    pub name: String,
    pub kind: TargetKind,
    pub body: Block,
}

/// A parsed program: top-level statements plus the target table in
/// declaration order.
#[derive(Debug, Default)]
pub struct Program {
    pub statements: Block,
    pub targets: Vec<Target>,
    index: IndexMap<String, usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target, rejecting duplicates.
    pub fn add_target(&mut self, target: Target) -> Result<(), String> {
        if self.index.contains_key(&target.name) {
            return Err(format!("target {} already exists", target.name));
        }
        self.index.insert(target.name.clone(), self.targets.len());
        self.targets.push(target);
        Ok(())
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.index.get(name).map(|&i| &self.targets[i])
    }
}
