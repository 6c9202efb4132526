//! Rendering of function results for direct `cook @FUNC` invocations.

use std::io::{self, Write};

use cook_types::Value;

/// Print a value: scalars as text, sequences as `[v v v]`, maps as
/// `{k: v, …}`, readers streamed to the output.
pub fn print_value(w: &mut dyn Write, value: &Value) -> io::Result<()> {
    match value {
        Value::Reader(r) => {
            r.copy_to(w)?;
            Ok(())
        }
        other => write!(w, "{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cook_types::{Key, Reader, ValueMap};

    fn rendered(v: &Value) -> String {
        let mut buf = Vec::new();
        print_value(&mut buf, v).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn scalars_render_as_text() {
        assert_eq!(rendered(&Value::Int(42)), "42");
        assert_eq!(rendered(&Value::from("hi")), "hi");
        assert_eq!(rendered(&Value::Bool(true)), "true");
    }

    #[test]
    fn sequences_and_maps() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(rendered(&list), "[1 2]");
        let mut m = ValueMap::new();
        m.insert(Key::String("k".into()), Value::Int(1));
        assert_eq!(rendered(&Value::Map(m)), "{k: 1}");
    }

    #[test]
    fn readers_stream() {
        let v = Value::Reader(Reader::from_string("streamed".into()));
        assert_eq!(rendered(&v), "streamed");
    }
}
