//! String manipulation built-ins.

use std::rc::Rc;

use cook_types::{Kind, Value};
use regex::Regex;

use crate::error::ErrorKind;

use super::{FlagSpec, Function, FunctionArgs, Registry};

pub(super) fn register(r: &mut Registry) {
    r.register(Rc::new(Supper));
    r.register(Rc::new(Slower));
    r.register(Rc::new(Strim));
    r.register(Rc::new(Spad));
    r.register(Rc::new(Ssplit));
    r.register(Rc::new(Sreplace));
}

struct Supper;

impl Function for Supper {
    fn name(&self) -> &'static str {
        "supper"
    }

    fn summary(&self) -> &'static str {
        "Uppercase a string"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        Ok(Value::String(args.string_at(0, "TEXT")?.to_uppercase()))
    }
}

struct Slower;

impl Function for Slower {
    fn name(&self) -> &'static str {
        "slower"
    }

    fn summary(&self) -> &'static str {
        "Lowercase a string"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        Ok(Value::String(args.string_at(0, "TEXT")?.to_lowercase()))
    }
}

struct Strim;

impl Function for Strim {
    fn name(&self) -> &'static str {
        "strim"
    }

    fn summary(&self) -> &'static str {
        "Trim surrounding whitespace"
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        Ok(Value::String(args.string_at(0, "TEXT")?.trim().to_string()))
    }
}

struct Spad;

const SPAD_FLAGS: &[FlagSpec] = &[
    FlagSpec::new(Some("l"), "left", Kind::Int, "pad on the left to WIDTH"),
    FlagSpec::new(Some("r"), "right", Kind::Int, "pad on the right to WIDTH"),
];

impl Function for Spad {
    fn name(&self) -> &'static str {
        "spad"
    }

    fn summary(&self) -> &'static str {
        "Pad a string to a width"
    }

    fn flags(&self) -> &'static [FlagSpec] {
        SPAD_FLAGS
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let mut s = args.string_at(0, "TEXT")?;
        if let Some(width) = args.flag_int("left") {
            let width = width.max(0) as usize;
            while s.chars().count() < width {
                s.insert(0, ' ');
            }
        }
        if let Some(width) = args.flag_int("right") {
            let width = width.max(0) as usize;
            while s.chars().count() < width {
                s.push(' ');
            }
        }
        Ok(Value::String(s))
    }
}

struct Ssplit;

const SSPLIT_FLAGS: &[FlagSpec] = &[FlagSpec::new(
    None,
    "by",
    Kind::String,
    "separator, defaults to whitespace",
)];

impl Function for Ssplit {
    fn name(&self) -> &'static str {
        "ssplit"
    }

    fn summary(&self) -> &'static str {
        "Split a string into an array"
    }

    fn flags(&self) -> &'static [FlagSpec] {
        SSPLIT_FLAGS
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let text = args.string_at(0, "TEXT")?;
        let parts: Vec<Value> = match args.flag_str("by") {
            Some(sep) if !sep.is_empty() => {
                text.split(sep).map(Value::from).collect()
            }
            _ => text.split_whitespace().map(Value::from).collect(),
        };
        Ok(Value::List(parts))
    }
}

struct Sreplace;

const SREPLACE_FLAGS: &[FlagSpec] = &[FlagSpec::new(
    Some("r"),
    "regexp",
    Kind::Bool,
    "treat PATTERN as a regular expression",
)];

impl Function for Sreplace {
    fn name(&self) -> &'static str {
        "sreplace"
    }

    fn summary(&self) -> &'static str {
        "Replace occurrences of a pattern"
    }

    fn flags(&self) -> &'static [FlagSpec] {
        SREPLACE_FLAGS
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        args.require(3, "@sreplace [-r] PATTERN REPLACEMENT TEXT")?;
        let pattern = args.string_at(0, "PATTERN")?;
        let replacement = args.string_at(1, "REPLACEMENT")?;
        let text = args.string_at(2, "TEXT")?;
        let out = if args.has_flag("regexp") {
            let re = Regex::new(&pattern)
                .map_err(|e| ErrorKind::Argument(format!("invalid pattern {pattern}: {e}")))?;
            re.replace_all(&text, replacement.as_str()).into_owned()
        } else {
            text.replace(&pattern, &replacement)
        };
        Ok(Value::String(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::Function;

    #[test]
    fn case_and_trim() {
        assert_eq!(
            Supper.call(vec![Value::from("abc")]).unwrap(),
            Value::from("ABC")
        );
        assert_eq!(
            Slower.call(vec![Value::from("ABC")]).unwrap(),
            Value::from("abc")
        );
        assert_eq!(
            Strim.call(vec![Value::from("  x ")]).unwrap(),
            Value::from("x")
        );
    }

    #[test]
    fn spad_pads_left_and_right() {
        assert_eq!(
            Spad.call(vec![Value::from("-l"), Value::Int(5), Value::from("ab")])
                .unwrap(),
            Value::from("   ab")
        );
        assert_eq!(
            Spad.call(vec![Value::from("-r"), Value::Int(4), Value::from("ab")])
                .unwrap(),
            Value::from("ab  ")
        );
    }

    #[test]
    fn ssplit_by_separator_and_whitespace() {
        assert_eq!(
            Ssplit
                .call(vec![Value::from("--by"), Value::from(","), Value::from("a,b,c")])
                .unwrap(),
            Value::List(vec![Value::from("a"), Value::from("b"), Value::from("c")])
        );
        assert_eq!(
            Ssplit.call(vec![Value::from("a b  c")]).unwrap(),
            Value::List(vec![Value::from("a"), Value::from("b"), Value::from("c")])
        );
    }

    #[test]
    fn sreplace_plain_and_regex() {
        assert_eq!(
            Sreplace
                .call(vec![
                    Value::from("o"),
                    Value::from("0"),
                    Value::from("foo")
                ])
                .unwrap(),
            Value::from("f00")
        );
        assert_eq!(
            Sreplace
                .call(vec![
                    Value::from("-r"),
                    Value::from("[0-9]+"),
                    Value::from("N"),
                    Value::from("a1b22c")
                ])
                .unwrap(),
            Value::from("aNbNc")
        );
    }

    #[test]
    fn sreplace_rejects_bad_regex() {
        assert!(Sreplace
            .call(vec![
                Value::from("-r"),
                Value::from("["),
                Value::from("x"),
                Value::from("y")
            ])
            .is_err());
    }
}
