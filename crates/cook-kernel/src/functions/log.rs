//! Output helpers.

use std::rc::Rc;

use cook_types::{Kind, Value};

use crate::error::ErrorKind;

use super::{FlagSpec, Function, FunctionArgs, Registry};

pub(super) fn register(r: &mut Registry) {
    r.register(Rc::new(Print));
}

/// `print` joins its arguments with spaces and terminates with a newline.
/// The text is the function's result; a bare `@print` statement streams
/// it to stdout, a redirect or assignment captures it.
struct Print;

const PRINT_FLAGS: &[FlagSpec] = &[
    FlagSpec::new(
        Some("n"),
        "no-newline",
        Kind::Bool,
        "do not add a newline after the printed arguments",
    ),
    FlagSpec::new(
        Some("s"),
        "strip",
        Kind::Bool,
        "strip surrounding whitespace from each argument before printing",
    ),
];

impl Function for Print {
    fn name(&self) -> &'static str {
        "print"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["echo"]
    }

    fn summary(&self) -> &'static str {
        "Print arguments separated by spaces"
    }

    fn flags(&self) -> &'static [FlagSpec] {
        PRINT_FLAGS
    }

    fn apply(&self, args: FunctionArgs) -> Result<Value, ErrorKind> {
        let strip = args.has_flag("strip");
        let mut parts = Vec::with_capacity(args.positional.len());
        for v in &args.positional {
            let s = match v {
                Value::Reader(r) => r
                    .read_to_string()
                    .map_err(|e| ErrorKind::io("read print argument", e))?,
                other => other.to_string(),
            };
            parts.push(if strip { s.trim().to_string() } else { s });
        }
        let mut text = parts.join(" ");
        if !args.has_flag("no-newline") {
            text.push('\n');
        }
        Ok(Value::String(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::Function;

    #[test]
    fn print_joins_with_spaces_and_newline() {
        let out = Print
            .call(vec![Value::from("hello"), Value::from("world")])
            .unwrap();
        assert_eq!(out, Value::from("hello world\n"));
    }

    #[test]
    fn print_no_newline_flag() {
        let out = Print
            .call(vec![Value::from("-n"), Value::from("x")])
            .unwrap();
        assert_eq!(out, Value::from("x"));
    }

    #[test]
    fn print_strips_when_asked() {
        let out = Print
            .call(vec![Value::from("-s"), Value::from("  padded  ")])
            .unwrap();
        assert_eq!(out, Value::from("padded\n"));
    }

    #[test]
    fn print_renders_non_string_values() {
        let out = Print
            .call(vec![Value::Int(42), Value::Bool(true)])
            .unwrap();
        assert_eq!(out, Value::from("42 true\n"));
    }
}
