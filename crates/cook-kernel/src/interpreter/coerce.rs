//! The central coercion table.
//!
//! All operator semantics route through here so conversions live in one
//! place: numeric widening, string promotion for `+`, the sequence forms
//! of `+`, integer-only bitwise operators, and comparison rules.

use cook_types::{Reader, Value};

use crate::error::ErrorKind;
use crate::token::Token;

pub fn to_float(v: &Value) -> Result<f64, ErrorKind> {
    match v {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| ErrorKind::Cast {
                value: s.clone(),
                to: "float",
            }),
        other => Err(ErrorKind::Cast {
            value: other.to_string(),
            to: "float",
        }),
    }
}

/// Integer coercion. A float is refused: truncation must be requested
/// explicitly with the `integer(…)` cast.
pub fn to_int(v: &Value) -> Result<i64, ErrorKind> {
    match v {
        Value::Int(i) => Ok(*i),
        Value::String(s) => s.parse::<i64>().map_err(|_| ErrorKind::Cast {
            value: s.clone(),
            to: "integer",
        }),
        other => Err(ErrorKind::Cast {
            value: other.to_string(),
            to: "integer",
        }),
    }
}

/// Stringify a scalar. Collections refuse; flattening them is the
/// invocation router's job.
pub fn to_string(v: &Value) -> Result<String, ErrorKind> {
    match v {
        Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::String(_) => Ok(v.to_string()),
        other => Err(ErrorKind::Cast {
            value: other.to_string(),
            to: "string",
        }),
    }
}

/// Turn a value into a byte stream for redirection and piping.
pub fn to_reader(v: Value) -> Result<Reader, ErrorKind> {
    match v {
        Value::Reader(r) => Ok(r),
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => Ok(Reader::from_string(v.to_string())),
        Value::String(s) => Ok(Reader::from_string(s)),
        other => Err(ErrorKind::Cast {
            value: other.to_string(),
            to: "string",
        }),
    }
}

/// Parse a string into the narrowest numeric value, integers first.
pub fn string_to_num(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Int(i));
    }
    s.parse::<f64>().ok().map(Value::Float)
}

/// The `+` operator: sequence prepend/append/concat, else promotion to
/// the widest of string, float, int.
pub fn add(l: Value, r: Value) -> Result<Value, ErrorKind> {
    match (l, r) {
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (Value::List(mut a), b) => {
            a.push(b);
            Ok(Value::List(a))
        }
        (a, Value::List(b)) => {
            let mut out = Vec::with_capacity(b.len() + 1);
            out.push(a);
            out.extend(b);
            Ok(Value::List(out))
        }
        (a @ Value::String(_), b) | (a, b @ Value::String(_)) => {
            Ok(Value::String(format!("{}{}", to_string(&a)?, to_string(&b)?)))
        }
        (a @ Value::Float(_), b) | (a, b @ Value::Float(_)) => {
            Ok(Value::Float(to_float(&a)? + to_float(&b)?))
        }
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(b))),
        (a, b) => Err(ErrorKind::TypeMismatch(format!(
            "operator + is not supported for value {a} and {b}"
        ))),
    }
}

/// `- * / % & | ^ << >>`: float arithmetic when either side is a float
/// (except `%` and the bitwise family, which are integer-only).
pub fn arithmetic(op: Token, l: Value, r: Value) -> Result<Value, ErrorKind> {
    let unsupported = |l: &Value, r: &Value| {
        ErrorKind::TypeMismatch(format!(
            "operator {op} is not supported for value {l} and {r}"
        ))
    };
    let float_side = matches!(l, Value::Float(_)) || matches!(r, Value::Float(_));
    if float_side {
        if !matches!(op, Token::Sub | Token::Mul | Token::Quo) {
            return Err(unsupported(&l, &r));
        }
        let a = to_float(&l)?;
        let b = to_float(&r)?;
        return Ok(Value::Float(match op {
            Token::Sub => a - b,
            Token::Mul => a * b,
            Token::Quo => a / b,
            _ => unreachable!(),
        }));
    }
    if !matches!(l, Value::Int(_)) && !matches!(r, Value::Int(_)) {
        return Err(unsupported(&l, &r));
    }
    let a = to_int(&l)?;
    let b = to_int(&r)?;
    if b == 0 && matches!(op, Token::Quo | Token::Rem) {
        return Err(ErrorKind::TypeMismatch("integer division by zero".into()));
    }
    Ok(Value::Int(match op {
        Token::Sub => a.wrapping_sub(b),
        Token::Mul => a.wrapping_mul(b),
        Token::Quo => a / b,
        Token::Rem => a % b,
        Token::And => a & b,
        Token::Or => a | b,
        Token::Xor => a ^ b,
        Token::Shl => ((a as u64) << (b as u32 & 63)) as i64,
        Token::Shr => a >> (b as u32 & 63),
        _ => return Err(unsupported(&l, &r)),
    }))
}

/// `== != < <= > >=`: numeric sides promote to float; same-kind scalars
/// compare by value; booleans, maps and sequences support equality only.
pub fn compare(op: Token, l: &Value, r: &Value) -> Result<Value, ErrorKind> {
    let unsupported = || {
        ErrorKind::TypeMismatch(format!(
            "operator {op} is not supported for value {l} and {r}"
        ))
    };
    if l.is_numeric() && r.is_numeric() {
        let a = to_float(l)?;
        let b = to_float(r)?;
        let res = match op {
            Token::Eql => a == b,
            Token::Neq => a != b,
            Token::Lss => a < b,
            Token::Leq => a <= b,
            Token::Gtr => a > b,
            Token::Geq => a >= b,
            _ => return Err(unsupported()),
        };
        return Ok(Value::Bool(res));
    }
    if l.kind() != r.kind() {
        return Err(unsupported());
    }
    match (l, r) {
        (Value::String(a), Value::String(b)) => {
            let ord = a.cmp(b);
            let res = match op {
                Token::Eql => ord.is_eq(),
                Token::Neq => ord.is_ne(),
                Token::Lss => ord.is_lt(),
                Token::Leq => ord.is_le(),
                Token::Gtr => ord.is_gt(),
                Token::Geq => ord.is_ge(),
                _ => return Err(unsupported()),
            };
            Ok(Value::Bool(res))
        }
        _ => match op {
            Token::Eql => Ok(Value::Bool(l == r)),
            Token::Neq => Ok(Value::Bool(l != r)),
            _ => Err(unsupported()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(vals: &[i64]) -> Value {
        Value::List(vals.iter().map(|&i| Value::Int(i)).collect())
    }

    #[test]
    fn add_promotes_to_widest() {
        assert_eq!(add(Value::Int(1), Value::Int(2)).unwrap(), Value::Int(3));
        assert_eq!(
            add(Value::Int(12), Value::Float(8.2)).unwrap(),
            Value::Float(20.2)
        );
        assert_eq!(
            add(Value::from("a"), Value::Int(1)).unwrap(),
            Value::from("a1")
        );
        assert_eq!(
            add(Value::Int(1), Value::from("a")).unwrap(),
            Value::from("1a")
        );
    }

    #[test]
    fn add_sequence_forms() {
        // x + [a,b] == [x,a,b]
        assert_eq!(add(Value::Int(0), list(&[1, 2])).unwrap(), list(&[0, 1, 2]));
        // [a,b] + x == [a,b,x]
        assert_eq!(add(list(&[1, 2]), Value::Int(3)).unwrap(), list(&[1, 2, 3]));
        // [a] + [b] == [a,b]
        assert_eq!(add(list(&[1]), list(&[2])).unwrap(), list(&[1, 2]));
    }

    #[test]
    fn add_rejects_bool_pairs() {
        assert!(add(Value::Bool(true), Value::Bool(false)).is_err());
    }

    #[test]
    fn arithmetic_int_and_float_paths() {
        assert_eq!(
            arithmetic(Token::Mul, Value::Int(6), Value::Int(7)).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            arithmetic(Token::Sub, Value::Float(1.5), Value::Int(1)).unwrap(),
            Value::Float(0.5)
        );
        assert_eq!(
            arithmetic(Token::Quo, Value::Int(7), Value::Int(2)).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn modulo_is_integer_only() {
        assert!(arithmetic(Token::Rem, Value::Float(7.0), Value::Int(2)).is_err());
        assert_eq!(
            arithmetic(Token::Rem, Value::Int(7), Value::Int(2)).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn bitwise_is_integer_only() {
        assert_eq!(
            arithmetic(Token::Shl, Value::Int(1), Value::Int(4)).unwrap(),
            Value::Int(16)
        );
        assert!(arithmetic(Token::And, Value::Float(1.0), Value::Int(1)).is_err());
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(arithmetic(Token::Quo, Value::Int(1), Value::Int(0)).is_err());
        assert!(arithmetic(Token::Rem, Value::Int(1), Value::Int(0)).is_err());
    }

    #[test]
    fn numeric_strings_participate_in_arithmetic() {
        assert_eq!(
            arithmetic(Token::Sub, Value::from("10"), Value::Int(4)).unwrap(),
            Value::Int(6)
        );
    }

    #[test]
    fn compare_promotes_numerics() {
        assert_eq!(
            compare(Token::Lss, &Value::Int(1), &Value::Float(1.5)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            compare(Token::Eql, &Value::Int(2), &Value::Float(2.0)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn compare_strings_lexicographically() {
        assert_eq!(
            compare(Token::Lss, &Value::from("abc"), &Value::from("abd")).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn collections_support_equality_only() {
        let a = Value::List(vec![Value::Int(1)]);
        let b = Value::List(vec![Value::Int(1)]);
        assert_eq!(compare(Token::Eql, &a, &b).unwrap(), Value::Bool(true));
        assert!(compare(Token::Lss, &a, &b).is_err());
    }

    #[test]
    fn mixed_kinds_refuse_comparison() {
        assert!(compare(Token::Eql, &Value::from("1"), &Value::Bool(true)).is_err());
    }

    #[test]
    fn int_coercion_refuses_floats() {
        assert!(to_int(&Value::Float(1.5)).is_err());
        assert_eq!(to_int(&Value::from("42")).unwrap(), 42);
    }

    #[test]
    fn string_to_num_prefers_integers() {
        assert_eq!(string_to_num("42"), Some(Value::Int(42)));
        assert_eq!(string_to_num("4.5"), Some(Value::Float(4.5)));
        assert_eq!(string_to_num("x"), None);
    }
}
