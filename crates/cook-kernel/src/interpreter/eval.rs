//! Expression evaluation.
//!
//! Every node pushes its source position to the position register before
//! evaluating, so an error raised anywhere below carries the location of
//! the node that caused it.

use cook_types::{Key, Kind, Value, ValueMap};

use crate::ast::{Expr, ExprKind, Literal};
use crate::error::{ErrorKind, EvalError};
use crate::token::Token;

use super::coerce;
use super::invoke::OutputMode;
use super::Interpreter;

/// A short description of an expression for error messages.
fn describe(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Index { base, .. } => format!("{}[…]", describe(base)),
        _ => "expression".to_string(),
    }
}

impl<'p> Interpreter<'p> {
    pub fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        self.set_pos(&expr.pos);
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(match lit {
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Str { value, .. } => Value::String(value.clone()),
            }),

            ExprKind::Ident(name) => Ok(self
                .scope
                .lookup(name)
                .map(|(v, _)| v)
                .unwrap_or(Value::Nil)),

            ExprKind::StringInterp { raw, inserts } => self.eval_interp(raw, inserts),

            ExprKind::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?);
                }
                Ok(Value::List(out))
            }

            ExprKind::MapLit(entries) => {
                let mut map = ValueMap::new();
                for (kx, vx) in entries {
                    let kv = self.eval(kx)?;
                    let key = Key::from_value(&kv).ok_or_else(|| {
                        self.err(ErrorKind::TypeMismatch(format!(
                            "value {kv} cannot be used as a map key"
                        )))
                    })?;
                    let value = self.eval(vx)?;
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }

            ExprKind::Index { base, index } => self.eval_index(base, index),

            ExprKind::Interval { .. } => Err(self.err(ErrorKind::TypeMismatch(
                "an interval is only valid in a for loop".into(),
            ))),

            ExprKind::Unary { op, x } => self.eval_unary(*op, x),

            ExprKind::IncDec { op, name } => self.eval_incdec(*op, name),

            ExprKind::Binary { op, l, r } => self.eval_binary(*op, l, r),

            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let c = self.eval(cond)?;
                match c {
                    Value::Bool(true) => self.eval(then),
                    Value::Bool(false) => self.eval(otherwise),
                    other => Err(self.err(ErrorKind::TypeMismatch(format!(
                        "{} does not produce a boolean value",
                        other
                    )))),
                }
            }

            ExprKind::Fallback { primary, secondary } => {
                match self.eval(primary) {
                    Ok(Value::Nil) => self.eval(secondary),
                    Ok(v) => Ok(v),
                    Err(e) if e.recoverable() => self.eval(secondary),
                    Err(e) => Err(e),
                }
            }

            ExprKind::SizeOf(x) => {
                let v = self.eval(x)?;
                let size = match &v {
                    Value::List(l) => l.len() as i64,
                    Value::Map(m) => m.len() as i64,
                    Value::String(s) => s.len() as i64,
                    Value::Int(_) | Value::Float(_) => 8,
                    Value::Bool(_) => 1,
                    other => {
                        return Err(self.err(ErrorKind::TypeMismatch(format!(
                            "sizeof is not supported for value {other}"
                        ))))
                    }
                };
                Ok(Value::Int(size))
            }

            ExprKind::IsType { x, bits, .. } => {
                let v = self.eval(x)?;
                let bit = kind_type_bit(v.kind());
                Ok(Value::Bool((bits & bit) == bit))
            }

            ExprKind::Cast { to, x } => self.eval_cast(*to, x),

            ExprKind::Pipeline(calls) => self.eval_pipeline(calls, OutputMode::Capture),

            ExprKind::ReadFrom(path) => {
                let pv = self.eval(path)?;
                match pv {
                    Value::String(p) => std::fs::read_to_string(&p)
                        .map(Value::String)
                        .map_err(|e| self.err(ErrorKind::io(format!("read {p}"), e))),
                    other => Err(self.err(ErrorKind::BadPath(other.to_string()))),
                }
            }

            ExprKind::ReadFd(path) => {
                let pv = self.eval(path)?;
                match pv {
                    Value::String(p) => std::fs::File::open(&p)
                        .map(|f| Value::Reader(cook_types::Reader::new(Box::new(f))))
                        .map_err(|e| self.err(ErrorKind::io(format!("open {p}"), e))),
                    other => Err(self.err(ErrorKind::BadPath(other.to_string()))),
                }
            }

            ExprKind::Paren(inner) => self.eval(inner),
        }
    }

    fn eval_interp(&mut self, raw: &str, inserts: &[(usize, Expr)]) -> Result<Value, EvalError> {
        let mut out = String::new();
        let mut offs = 0;
        for (pos, expr) in inserts {
            out.push_str(&raw[offs..*pos]);
            offs = *pos;
            let v = self.eval(expr)?;
            if v.is_nil() {
                return Err(self.err(ErrorKind::UndefinedVariable(describe(expr))));
            }
            let s = coerce::to_string(&v).map_err(|k| self.err(k))?;
            out.push_str(&s);
        }
        out.push_str(&raw[offs..]);
        Ok(Value::String(out))
    }

    fn eval_index(&mut self, base: &Expr, index: &Expr) -> Result<Value, EvalError> {
        let bv = self.eval(base)?;
        let list = match bv {
            Value::List(l) => l,
            other => {
                return Err(self.err(ErrorKind::TypeMismatch(format!(
                    "variable {} is not an array, got {}",
                    describe(base),
                    other.kind()
                ))))
            }
        };
        let iv = self.eval(index)?;
        let i = match iv {
            Value::Int(i) => i,
            Value::Float(f) if f.trunc() == f => f as i64,
            other => {
                return Err(self.err(ErrorKind::TypeMismatch(format!(
                    "index expression {other} is not an integer"
                ))))
            }
        };
        if i < 0 || i as usize >= list.len() {
            return Err(self.err(ErrorKind::OutOfRange {
                index: i,
                max: list.len() as i64 - 1,
            }));
        }
        Ok(list[i as usize].clone())
    }

    fn eval_unary(&mut self, op: Token, x: &Expr) -> Result<Value, EvalError> {
        let v = self.eval(x)?;
        match op {
            Token::Add | Token::Sub => {
                let num = match &v {
                    Value::String(s) => coerce::string_to_num(s),
                    Value::Int(_) | Value::Float(_) => Some(v.clone()),
                    _ => None,
                };
                match (op, num) {
                    (Token::Add, Some(n)) => Ok(n),
                    (Token::Sub, Some(Value::Int(i))) => Ok(Value::Int(-i)),
                    (Token::Sub, Some(Value::Float(f))) => Ok(Value::Float(-f)),
                    _ => Err(self.err(ErrorKind::TypeMismatch(format!(
                        "unary operator {op} is not supported on value {v}"
                    )))),
                }
            }
            Token::Xor => match v {
                Value::Int(i) => Ok(Value::Int(!i)),
                other => Err(self.err(ErrorKind::TypeMismatch(format!(
                    "unary operator ^ is not supported on value {other}"
                )))),
            },
            Token::Not => Ok(Value::Bool(!v.truthy())),
            _ => Err(self.err(ErrorKind::TypeMismatch(format!(
                "unsupported unary operator {op}"
            )))),
        }
    }

    fn eval_incdec(&mut self, op: Token, name: &str) -> Result<Value, EvalError> {
        let (v, origin) = self
            .scope
            .lookup(name)
            .ok_or_else(|| self.err(ErrorKind::UnboundVariable(name.to_string())))?;
        if origin == super::Origin::Env {
            return Err(self.err(ErrorKind::ReadOnly(name.to_string())));
        }
        let step = if op == Token::Inc { 1 } else { -1 };
        let numeric = match &v {
            Value::String(s) => coerce::string_to_num(s),
            Value::Int(_) | Value::Float(_) => Some(v.clone()),
            _ => None,
        };
        let updated = match numeric {
            Some(Value::Int(i)) => Value::Int(i + step),
            Some(Value::Float(f)) => Value::Float(f + step as f64),
            _ => {
                return Err(self.err(ErrorKind::TypeMismatch(format!(
                    "unsupported operator {op} on variable {name} of kind {}",
                    v.kind()
                ))))
            }
        };
        self.scope
            .assign(name, updated.clone())
            .map_err(|k| self.err(k))?;
        Ok(updated)
    }

    fn eval_binary(&mut self, op: Token, l: &Expr, r: &Expr) -> Result<Value, EvalError> {
        if matches!(op, Token::Land | Token::Lor) {
            let lv = self.eval(l)?;
            let lb = match lv {
                Value::Bool(b) => b,
                other => {
                    return Err(self.err(ErrorKind::TypeMismatch(format!(
                        "operator {op} requires boolean operands, got {other}"
                    ))))
                }
            };
            // short-circuit: the unchosen side never evaluates
            if (op == Token::Land && !lb) || (op == Token::Lor && lb) {
                return Ok(Value::Bool(lb));
            }
            let rv = self.eval(r)?;
            return match rv {
                Value::Bool(b) => Ok(Value::Bool(b)),
                other => Err(self.err(ErrorKind::TypeMismatch(format!(
                    "operator {op} requires boolean operands, got {other}"
                )))),
            };
        }

        let lv = self.eval(l)?;
        let rv = self.eval(r)?;
        // a nil operand poisons the result instead of cancelling, so a
        // surrounding fallback can still pick its secondary branch
        if lv.is_nil() || rv.is_nil() {
            return Ok(Value::Nil);
        }
        let result = match op {
            Token::Add => coerce::add(lv, rv),
            Token::Sub
            | Token::Mul
            | Token::Quo
            | Token::Rem
            | Token::And
            | Token::Or
            | Token::Xor
            | Token::Shl
            | Token::Shr => coerce::arithmetic(op, lv, rv),
            Token::Eql | Token::Neq | Token::Lss | Token::Leq | Token::Gtr | Token::Geq => {
                coerce::compare(op, &lv, &rv)
            }
            _ => Err(ErrorKind::TypeMismatch(format!(
                "unsupported operator {op} on value {lv} and {rv}"
            ))),
        };
        result.map_err(|k| self.err(k))
    }

    fn eval_cast(&mut self, to: Kind, x: &Expr) -> Result<Value, EvalError> {
        let v = self.eval(x)?;
        if v.kind() == to {
            return Ok(v);
        }
        let cast_err = |v: &Value, to: Kind| ErrorKind::Cast {
            value: v.to_string(),
            to: to.name(),
        };
        let out = match (to, &v) {
            (Kind::Int, Value::Float(f)) => Some(Value::Int(*f as i64)),
            (Kind::Int, Value::String(s)) => s.parse::<i64>().ok().map(Value::Int),
            (Kind::Float, Value::Int(i)) => Some(Value::Float(*i as f64)),
            (Kind::Float, Value::String(s)) => s.parse::<f64>().ok().map(Value::Float),
            (Kind::Bool, Value::String(s)) => s.parse::<bool>().ok().map(Value::Bool),
            (Kind::String, Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
                Some(Value::String(v.to_string()))
            }
            _ => None,
        };
        out.ok_or_else(|| self.err(cast_err(&v, to)))
    }
}

/// The `is`-expression bit for a value kind; nil and readers fall into
/// the `object` bucket.
fn kind_type_bit(kind: Kind) -> u8 {
    match kind {
        Kind::Int => Token::TInteger.type_bit(),
        Kind::Float => Token::TFloat.type_bit(),
        Kind::String => Token::TString.type_bit(),
        Kind::Bool => Token::TBoolean.type_bit(),
        Kind::List => Token::TArray.type_bit(),
        Kind::Map => Token::TMap.type_bit(),
        Kind::Reader | Kind::Invalid => Token::TObject.type_bit(),
    }
}
