//! Command-line argument parsing.
//!
//! `cook [flags] [TARGET ...]` runs targets; `cook @FUNC [args…]` invokes
//! a built-in directly; `cook help [@FUNC]` prints usage. Dynamic
//! variables use `--name VALUE`, `--name=VALUE`, `--name:TYPE VALUE` or
//! `--name:KEYTYPE:VALUETYPE KEY:VALUE`, with the type codes `i` (int64),
//! `f` (float64), `s` (string), `b` (bool) and `a` (auto-detect).
//! Repeating a scalar flag promotes its binding to a sequence; repeating
//! a map flag accumulates entries.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use cook_types::{Key, Value, ValueMap};

/// What the invocation asks for.
#[derive(Debug, PartialEq)]
pub enum Action {
    /// Interpret the Cookfile and run targets (or `all`).
    Run,
    /// Invoke one built-in function with raw string arguments.
    Function { name: String, args: Vec<String> },
    /// Print top-level help or a function's help.
    Help { function: Option<String> },
}

#[derive(Debug)]
pub struct MainOptions {
    pub cookfile: PathBuf,
    pub targets: Vec<String>,
    pub vars: HashMap<String, Value>,
    pub action: Action,
}

impl Default for MainOptions {
    fn default() -> Self {
        Self {
            cookfile: PathBuf::from("Cookfile"),
            targets: Vec::new(),
            vars: HashMap::new(),
            action: Action::Run,
        }
    }
}

/// A variable type code from the flag syntax.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TypeCode {
    Int,
    Float,
    Str,
    Bool,
    Auto,
}

impl TypeCode {
    fn parse(code: &str) -> Result<Self> {
        match code {
            "i" => Ok(TypeCode::Int),
            "f" => Ok(TypeCode::Float),
            "s" => Ok(TypeCode::Str),
            "b" => Ok(TypeCode::Bool),
            "a" => Ok(TypeCode::Auto),
            other => bail!("only i, f, s, b, a type codes are allowed, got {other}"),
        }
    }

    fn value(self, raw: &str) -> Result<Value> {
        match self {
            TypeCode::Int => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| anyhow!("{raw} is not an integer")),
            TypeCode::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| anyhow!("{raw} is not a float")),
            TypeCode::Bool => raw
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|_| anyhow!("{raw} is not a boolean")),
            TypeCode::Str => Ok(Value::String(raw.to_string())),
            TypeCode::Auto => Ok(if let Ok(i) = raw.parse::<i64>() {
                Value::Int(i)
            } else if let Ok(f) = raw.parse::<f64>() {
                Value::Float(f)
            } else if let Ok(b) = raw.parse::<bool>() {
                Value::Bool(b)
            } else {
                Value::String(raw.to_string())
            }),
        }
    }
}

/// `name`, `name:T` or `name:K:V` from a `--flag`.
fn parse_flag_format(spec: &str) -> Result<(&str, TypeCode, Option<TypeCode>)> {
    let mut parts = spec.split(':');
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        bail!("invalid flag format, expect --name, --name:T or --name:K:V");
    }
    match (parts.next(), parts.next(), parts.next()) {
        (None, _, _) => Ok((name, TypeCode::Auto, None)),
        (Some(t), None, _) => Ok((name, TypeCode::parse(t)?, None)),
        (Some(k), Some(v), None) => Ok((name, TypeCode::parse(k)?, Some(TypeCode::parse(v)?))),
        _ => bail!("invalid flag format, expect --name, --name:T or --name:K:V"),
    }
}

fn is_target_word(word: &str) -> bool {
    word.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

pub fn parse(args: &[String]) -> Result<MainOptions> {
    let mut opts = MainOptions::default();
    let mut iter = args.iter().enumerate();
    while let Some((i, arg)) = iter.next() {
        if i == 0 {
            if arg == "help" {
                let function = args
                    .get(1)
                    .map(|f| f.trim_start_matches('@').to_string());
                opts.action = Action::Help { function };
                return Ok(opts);
            }
            if let Some(name) = arg.strip_prefix('@') {
                opts.action = Action::Function {
                    name: name.to_string(),
                    args: args[1..].to_vec(),
                };
                return Ok(opts);
            }
        }
        if let Some(spec) = arg.strip_prefix("--") {
            let (spec, inline) = match spec.split_once('=') {
                Some((s, v)) => (s, Some(v.to_string())),
                None => (spec, None),
            };
            let (name, first, second) = parse_flag_format(spec)?;
            let raw = match inline {
                Some(v) => v,
                None => iter
                    .next()
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| anyhow!("missing value for variable --{name}"))?,
            };
            match second {
                Some(value_code) => {
                    let (rk, rv) = raw.split_once(':').ok_or_else(|| {
                        anyhow!("invalid map value {raw}, must be KEY:VALUE")
                    })?;
                    let key = Key::from_value(&first.value(rk)?)
                        .ok_or_else(|| anyhow!("{rk} cannot be a map key"))?;
                    let value = value_code.value(rv)?;
                    match opts.vars.entry(name.to_string()).or_insert_with(|| {
                        Value::Map(ValueMap::new())
                    }) {
                        Value::Map(m) => {
                            m.insert(key, value);
                        }
                        other => {
                            bail!("variable {name} value {other} is not a map")
                        }
                    }
                }
                None => {
                    let value = first.value(&raw)?;
                    match opts.vars.remove(name) {
                        // repeating a scalar flag promotes it to a sequence
                        None => {
                            opts.vars.insert(name.to_string(), value);
                        }
                        Some(Value::List(mut items)) => {
                            items.push(value);
                            opts.vars.insert(name.to_string(), Value::List(items));
                        }
                        Some(existing) => {
                            opts.vars
                                .insert(name.to_string(), Value::List(vec![existing, value]));
                        }
                    }
                }
            }
        } else if arg == "-c" {
            let path = iter
                .next()
                .map(|(_, v)| v.clone())
                .ok_or_else(|| anyhow!("missing path after -c"))?;
            opts.cookfile = PathBuf::from(path);
        } else if arg.starts_with('-') {
            bail!("variable flags must start with --, got {arg}");
        } else {
            if !is_target_word(arg) {
                bail!("invalid target name {arg}");
            }
            opts.targets.push(arg.clone());
        }
    }
    Ok(opts)
}
