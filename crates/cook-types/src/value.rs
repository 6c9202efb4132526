//! Value and kind types for the cook runtime.

use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;

use crate::reader::Reader;

/// Map values keep insertion order so iteration and rendering are stable.
pub type ValueMap = IndexMap<Key, Value>;

/// A runtime value.
///
/// Values are dynamically typed; all arithmetic and comparison goes through
/// the coercion rules at operator boundaries. An integer is never silently
/// widened to a float: widening happens explicitly when an operator mixes
/// numeric kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value / invalid. Unbound variables evaluate to this.
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Ordered sequence of dynamically typed elements.
    List(Vec<Value>),
    /// Keyed collection; keys are restricted to scalar kinds (see [`Key`]).
    Map(ValueMap),
    /// Lazy byte source (file contents, captured output, HTTP body).
    Reader(Reader),
}

/// Type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Invalid,
    Bool,
    Int,
    Float,
    String,
    List,
    Map,
    Reader,
}

impl Kind {
    /// The name used in error messages and help text.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Invalid => "invalid",
            Kind::Bool => "boolean",
            Kind::Int => "integer",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::List => "array",
            Kind::Map => "map",
            Kind::Reader => "object",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Nil => Kind::Invalid,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::String(_) => Kind::String,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
            Value::Reader(_) => Kind::Reader,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Truthiness: numbers nonzero, bool identity, string non-empty,
    /// list/map non-empty, nil false, reader always true.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Reader(_) => true,
        }
    }
}

/// Floats render in Go's `%g`-like shortest form: `{}` on f64 already prints
/// the shortest representation that round-trips, but whole floats need the
/// trailing `.0` stripped to match the language's output (`20.2`, not `20.2`;
/// `4` for `4.0`).
pub fn format_float(f: f64) -> String {
    if f == f.trunc() && f.is_finite() && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{f}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Reader(_) => f.write_str("<reader>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// A map key. Keys are one of int64/float64/bool/string; float keys compare
/// and hash by bit pattern.
#[derive(Debug, Clone)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Key {
    /// Build a key from a value, refusing non-scalar kinds.
    pub fn from_value(v: &Value) -> Option<Key> {
        match v {
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::Int(i) => Some(Key::Int(*i)),
            Value::Float(f) => Some(Key::Float(*f)),
            Value::String(s) => Some(Key::String(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::Int(*i),
            Key::Float(f) => Value::Float(*f),
            Key::String(s) => Value::String(s.clone()),
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Bool(a), Key::Bool(b)) => a == b,
            (Key::Int(a), Key::Int(b)) => a == b,
            (Key::Float(a), Key::Float(b)) => a.to_bits() == b.to_bits(),
            (Key::String(a), Key::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Key::Bool(b) => {
                state.write_u8(0);
                b.hash(state);
            }
            Key::Int(i) => {
                state.write_u8(1);
                i.hash(state);
            }
            Key::Float(f) => {
                state.write_u8(2);
                f.to_bits().hash(state);
            }
            Key::String(s) => {
                state.write_u8(3);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Bool(b) => write!(f, "{b}"),
            Key::Int(i) => write!(f, "{i}"),
            Key::Float(x) => f.write_str(&format_float(*x)),
            Key::String(s) => f.write_str(s),
        }
    }
}
