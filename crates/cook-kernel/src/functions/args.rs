//! Flag parsing for built-in functions.
//!
//! Arguments arrive as typed values. String arguments beginning with `-`
//! or `--` match the function's flag schema; everything else is
//! positional. A boolean flag is presence-only; a map flag accumulates
//! repeated `key:value` entries; other kinds consume the next argument
//! and coerce it to the declared kind.

use std::collections::HashMap;

use cook_types::{Key, Kind, Value, ValueMap};

use crate::error::ErrorKind;
use crate::interpreter::coerce as coercion;

/// One declared flag of a built-in function.
pub struct FlagSpec {
    /// Single-character form, used as `-x`.
    pub short: Option<&'static str>,
    /// Long form, used as `--name`.
    pub long: &'static str,
    pub kind: Kind,
    pub desc: &'static str,
}

impl FlagSpec {
    pub const fn new(
        short: Option<&'static str>,
        long: &'static str,
        kind: Kind,
        desc: &'static str,
    ) -> Self {
        Self {
            short,
            long,
            kind,
            desc,
        }
    }
}

/// Parsed arguments handed to a function body.
#[derive(Debug, Default)]
pub struct FunctionArgs {
    /// Flag values keyed by the flag's long name.
    pub flags: HashMap<String, Value>,
    pub positional: Vec<Value>,
}

impl FunctionArgs {
    pub fn has_flag(&self, long: &str) -> bool {
        self.flags.contains_key(long)
    }

    pub fn flag(&self, long: &str) -> Option<&Value> {
        self.flags.get(long)
    }

    pub fn flag_int(&self, long: &str) -> Option<i64> {
        match self.flags.get(long) {
            Some(Value::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn flag_str(&self, long: &str) -> Option<&str> {
        match self.flags.get(long) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The positional arguments stringified, sequences flattened.
    pub fn strings(&self) -> Result<Vec<String>, ErrorKind> {
        let mut out = Vec::with_capacity(self.positional.len());
        for v in &self.positional {
            flatten(v, &mut out)?;
        }
        Ok(out)
    }

    /// Require at least `n` positional arguments.
    pub fn require(&self, n: usize, usage: &str) -> Result<(), ErrorKind> {
        if self.positional.len() < n {
            return Err(ErrorKind::Argument(format!(
                "not enough arguments, usage: {usage}"
            )));
        }
        Ok(())
    }

    pub fn string_at(&self, i: usize, what: &str) -> Result<String, ErrorKind> {
        match self.positional.get(i) {
            Some(v) => coercion::to_string(v),
            None => Err(ErrorKind::Argument(format!("missing argument {what}"))),
        }
    }
}

fn flatten(v: &Value, out: &mut Vec<String>) -> Result<(), ErrorKind> {
    match v {
        Value::List(items) => {
            for item in items {
                flatten(item, out)?;
            }
            Ok(())
        }
        other => {
            out.push(coercion::to_string(other)?);
            Ok(())
        }
    }
}

fn find<'a>(specs: &'a [FlagSpec], name: &str, short: bool) -> Option<&'a FlagSpec> {
    specs
        .iter()
        .find(|s| if short { s.short == Some(name) } else { s.long == name })
}

/// Coerce a flag's value to its declared kind.
fn coerce_flag(spec: &FlagSpec, v: Value) -> Result<Value, ErrorKind> {
    match spec.kind {
        Kind::Int => coercion::to_int(&v).map(Value::Int),
        Kind::Float => coercion::to_float(&v).map(Value::Float),
        Kind::Bool => Ok(Value::Bool(v.truthy())),
        Kind::String => coercion::to_string(&v).map(Value::String),
        _ => Ok(v),
    }
}

/// Split a `key:value` map-flag entry.
fn map_entry(raw: &str) -> Result<(Key, Value), ErrorKind> {
    match raw.split_once(':') {
        Some((k, v)) if !k.is_empty() => Ok((
            Key::String(k.to_string()),
            Value::String(v.to_string()),
        )),
        _ => Err(ErrorKind::Argument(format!(
            "invalid map entry {raw}, must be key:value"
        ))),
    }
}

pub fn parse(specs: &[FlagSpec], raw: Vec<Value>) -> Result<FunctionArgs, ErrorKind> {
    let mut out = FunctionArgs::default();
    let mut iter = raw.into_iter().peekable();
    while let Some(v) = iter.next() {
        let word = match &v {
            Value::String(s) if s.starts_with('-') && s.len() > 1 => s.clone(),
            _ => {
                out.positional.push(v);
                continue;
            }
        };
        let (name, inline_value, short) = if let Some(rest) = word.strip_prefix("--") {
            match rest.split_once('=') {
                Some((n, val)) => (n.to_string(), Some(val.to_string()), false),
                None => (rest.to_string(), None, false),
            }
        } else {
            (word[1..].to_string(), None, true)
        };
        let Some(spec) = find(specs, &name, short) else {
            return Err(ErrorKind::Argument(format!("unrecognized flag {word}")));
        };

        match spec.kind {
            Kind::Bool => {
                out.flags.insert(spec.long.to_string(), Value::Bool(true));
            }
            Kind::Map => {
                let entry = match inline_value {
                    Some(s) => Value::String(s),
                    None => iter.next().ok_or_else(|| {
                        ErrorKind::Argument(format!("missing value for flag {word}"))
                    })?,
                };
                let (k, v) = match entry {
                    Value::String(s) => map_entry(&s)?,
                    Value::Map(m) => {
                        // a whole map argument merges in
                        merge_map(&mut out, spec, m);
                        continue;
                    }
                    other => {
                        return Err(ErrorKind::Argument(format!(
                            "invalid map entry {other} for flag {word}"
                        )))
                    }
                };
                match out
                    .flags
                    .entry(spec.long.to_string())
                    .or_insert_with(|| Value::Map(ValueMap::new()))
                {
                    Value::Map(m) => {
                        m.insert(k, v);
                    }
                    _ => unreachable!("map flag always holds a map"),
                }
            }
            _ => {
                let value = match inline_value {
                    Some(s) => Value::String(s),
                    None => iter.next().ok_or_else(|| {
                        ErrorKind::Argument(format!("missing value for flag {word}"))
                    })?,
                };
                let value = coerce_flag(spec, value)?;
                out.flags.insert(spec.long.to_string(), value);
            }
        }
    }
    Ok(out)
}

fn merge_map(out: &mut FunctionArgs, spec: &FlagSpec, m: ValueMap) {
    match out
        .flags
        .entry(spec.long.to_string())
        .or_insert_with(|| Value::Map(ValueMap::new()))
    {
        Value::Map(existing) => existing.extend(m),
        _ => unreachable!("map flag always holds a map"),
    }
}
