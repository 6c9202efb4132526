//! Built-in function registry.
//!
//! Every built-in implements the [`Function`] trait: a name with optional
//! aliases, a flag schema, and an apply body over typed arguments. The
//! evaluator hands arguments over as [`Value`]s, preserving their kinds,
//! so a built-in can accept a map or an integer directly. Flag parsing
//! against the schema happens in [`args`], shared by all functions.
//!
//! Built-ins never write to stdout themselves: they return their output
//! (string or reader) and the invocation router streams or captures it
//! depending on the calling statement.

pub mod args;
mod fs;
mod http;
mod log;
mod path;
mod strings;

use std::rc::Rc;

use cook_types::Value;
use indexmap::IndexMap;

use crate::error::ErrorKind;

pub use args::{FlagSpec, FunctionArgs};

/// A registered built-in function.
pub trait Function {
    fn name(&self) -> &'static str;

    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// One-line description for help output.
    fn summary(&self) -> &'static str;

    fn flags(&self) -> &'static [FlagSpec] {
        &[]
    }

    /// Apply over parsed arguments.
    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind>;

    /// Parse raw argument values against the flag schema, then apply.
    fn call(&self, raw: Vec<Value>) -> Result<Value, ErrorKind> {
        let parsed = args::parse(self.flags(), raw)?;
        self.apply(parsed)
    }
}

/// Function store; aliases resolve to the same function.
#[derive(Default)]
pub struct Registry {
    by_name: IndexMap<String, Rc<dyn Function>>,
    canonical: Vec<Rc<dyn Function>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every shipped built-in.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        log::register(&mut r);
        fs::register(&mut r);
        path::register(&mut r);
        strings::register(&mut r);
        http::register(&mut r);
        r
    }

    pub fn register(&mut self, f: Rc<dyn Function>) {
        self.by_name.insert(f.name().to_string(), f.clone());
        for alias in f.aliases() {
            self.by_name.insert(alias.to_string(), f.clone());
        }
        self.canonical.push(f);
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Function>> {
        self.by_name.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Canonical functions in registration order (for help output).
    pub fn functions(&self) -> impl Iterator<Item = &Rc<dyn Function>> {
        self.canonical.iter()
    }
}
