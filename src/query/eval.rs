//! Client-side evaluation of parameter-free subtrees.
//!
//! The compiler folds a subtree here when no structural or template mapping
//! exists for it. Parameters are bound on the server, so reaching one is a
//! [`Error::ServerVariableLeak`]; members, methods and constructors without a
//! client implementation are untranslatable.

use super::expr::{BinaryOp, Expr, UnaryOp};
use crate::error::{Error, Result};
use crate::native::{RecordValue, Type, Value};
use std::cmp::Ordering;

/// Evaluate `expr` in process.
pub fn evaluate(expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Constant { value, .. } => Ok(value.clone()),
        Expr::Parameter(p) => Err(Error::ServerVariableLeak(p.name.clone())),
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, &expr.ty()),
        Expr::Unary { op, operand } => eval_unary(*op, &evaluate(operand)?),
        Expr::Member { target, member } => {
            let target = target.as_deref().map(evaluate).transpose()?;
            match (&member.getter, target) {
                (Some(getter), target) => getter(target.as_ref()),
                (None, Some(Value::Record(record))) => record
                    .get(&member.name)
                    .cloned()
                    .ok_or_else(|| no_member(&member.owner, &member.name)),
                (None, Some(Value::Map(entries))) => entries
                    .get(&member.name)
                    .cloned()
                    .ok_or_else(|| Error::Evaluation(format!("key '{}' not found", member.name))),
                (None, Some(Value::Null)) => Err(Error::Evaluation(format!(
                    "member '{}' accessed on null",
                    member.name
                ))),
                (None, _) => Err(no_member(&member.owner, &member.name)),
            }
        }
        Expr::Call {
            method,
            target,
            args,
        } => {
            let invoke = method.invoke.as_ref().ok_or_else(|| {
                Error::TranslationUnsupported(format!(
                    "method {}::{} has no mapping and no client implementation",
                    method.owner, method.name
                ))
            })?;
            let target = target.as_deref().map(evaluate).transpose()?;
            let args = args.iter().map(evaluate).collect::<Result<Vec<_>>>()?;
            invoke(target.as_ref(), &args)
        }
        Expr::New { ctor, args } => {
            let invoke = ctor.invoke.as_ref().ok_or_else(|| {
                Error::TranslationUnsupported(format!(
                    "constructor {}::{} has no mapping and no client implementation",
                    ctor.ty, ctor.name
                ))
            })?;
            let args = args.iter().map(evaluate).collect::<Result<Vec<_>>>()?;
            invoke(None, &args)
        }
        Expr::MemberInit { ty, bindings } => {
            let mut record = RecordValue::new(ty.clone());
            for (name, value) in bindings {
                record.set(name, evaluate(value)?)?;
            }
            Ok(Value::Record(record))
        }
        Expr::NewArray { items, .. } => items
            .iter()
            .map(evaluate)
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        Expr::Conditional {
            test,
            if_true,
            if_false,
        } => match evaluate(test)? {
            Value::Bool(true) => evaluate(if_true),
            Value::Bool(false) => evaluate(if_false),
            other => Err(Error::mismatch("bool", other.kind_name())),
        },
        Expr::Convert { operand, ty } => convert_value(evaluate(operand)?, ty),
        Expr::Lambda(_) => Err(Error::TranslationUnsupported(
            "a lambda cannot be evaluated on the client".to_string(),
        )),
    }
}

fn no_member(owner: &Type, name: &str) -> Error {
    Error::TranslationUnsupported(format!(
        "member {}.{} has no mapping and no client implementation",
        owner, name
    ))
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, ty: &Type) -> Result<Value> {
    match op {
        BinaryOp::And | BinaryOp::Or => {
            let l = expect_bool(evaluate(left)?)?;
            if (op == BinaryOp::And && !l) || (op == BinaryOp::Or && l) {
                return Ok(Value::Bool(l));
            }
            Ok(Value::Bool(expect_bool(evaluate(right)?)?))
        }
        BinaryOp::Coalesce => match evaluate(left)? {
            Value::Null => evaluate(right),
            value => Ok(value),
        },
        _ => {
            let l = evaluate(left)?;
            let r = evaluate(right)?;
            match op {
                BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
                BinaryOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
                BinaryOp::Lt => Ok(Value::Bool(compare(&l, &r)? == Ordering::Less)),
                BinaryOp::Le => Ok(Value::Bool(compare(&l, &r)? != Ordering::Greater)),
                BinaryOp::Gt => Ok(Value::Bool(compare(&l, &r)? == Ordering::Greater)),
                BinaryOp::Ge => Ok(Value::Bool(compare(&l, &r)? != Ordering::Less)),
                BinaryOp::Index => index(l, &r),
                _ => arithmetic(op, &l, &r, ty),
            }
        }
    }
}

fn expect_bool(value: Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::mismatch("bool", value.kind_name()))
}

/// Equality with numeric values compared by magnitude across widths.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_i128(), b.as_i128()) {
        (Some(x), Some(y)) => x == y,
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

pub fn compare(a: &Value, b: &Value) -> Result<Ordering> {
    let ordering = match (a, b) {
        _ if a.as_i128().is_some() && b.as_i128().is_some() => a.as_i128().cmp(&b.as_i128()),
        _ if a.as_f64().is_some() && b.as_f64().is_some() => {
            let (x, y) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            x.partial_cmp(&y)
                .ok_or_else(|| Error::Evaluation(format!("cannot order {} and {}", x, y)))?
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Char(x), Value::Char(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::DateTimeOffset(x), Value::DateTimeOffset(y)) => x.cmp(y),
        (Value::Duration(x), Value::Duration(y)) => x.cmp(y),
        (Value::Uuid(x), Value::Uuid(y)) => x.cmp(y),
        _ => {
            return Err(Error::Evaluation(format!(
                "cannot order {} and {}",
                a.kind_name(),
                b.kind_name()
            )))
        }
    };
    Ok(ordering)
}

fn index(target: Value, key: &Value) -> Result<Value> {
    match (target, key) {
        (Value::List(items), key) => {
            let i = key
                .as_i128()
                .ok_or_else(|| Error::mismatch("integer index", key.kind_name()))?;
            let len = items.len() as i128;
            let i = if i < 0 { len + i } else { i };
            usize::try_from(i)
                .ok()
                .and_then(|i| items.into_iter().nth(i))
                .ok_or_else(|| Error::Evaluation(format!("index {} out of bounds", i)))
        }
        (Value::Map(mut entries), Value::String(key)) => entries
            .remove(key)
            .ok_or_else(|| Error::Evaluation(format!("key '{}' not found", key))),
        (Value::Record(record), Value::String(key)) => record
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Evaluation(format!("field '{}' not found", key))),
        (target, key) => Err(Error::Evaluation(format!(
            "cannot index {} with {}",
            target.kind_name(),
            key.kind_name()
        ))),
    }
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value, ty: &Type) -> Result<Value> {
    match (l, r) {
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            return Ok(Value::String(format!("{}{}", a, b)))
        }
        (Value::Duration(a), Value::Duration(b)) => {
            let n = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                _ => return Err(unsupported(op, l, r)),
            };
            return n.map(Value::Duration).ok_or_else(|| time_overflow(op));
        }
        (Value::DateTime(t), Value::Duration(d)) => {
            let n = match op {
                BinaryOp::Add => t.checked_add_signed(*d),
                BinaryOp::Sub => t.checked_sub_signed(*d),
                _ => return Err(unsupported(op, l, r)),
            };
            return n.map(Value::DateTime).ok_or_else(|| time_overflow(op));
        }
        (Value::DateTimeOffset(t), Value::Duration(d)) => {
            let n = match op {
                BinaryOp::Add => t.checked_add_signed(*d),
                BinaryOp::Sub => t.checked_sub_signed(*d),
                _ => return Err(unsupported(op, l, r)),
            };
            return n.map(Value::DateTimeOffset).ok_or_else(|| time_overflow(op));
        }
        _ => {}
    }

    if let (Some(a), Some(b), true) = (l.as_i128(), r.as_i128(), ty.is_integer()) {
        let n = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div if b == 0 => return Err(Error::Evaluation("division by zero".into())),
            BinaryOp::Div => a.checked_div(b),
            BinaryOp::Rem if b == 0 => return Err(Error::Evaluation("division by zero".into())),
            BinaryOp::Rem => a.checked_rem(b),
            _ => return Err(unsupported(op, l, r)),
        }
        .ok_or_else(|| Error::Evaluation(format!("integer overflow in {}", op.symbol())))?;
        return Value::integer(ty, n);
    }

    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => {
            let n = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                _ => return Err(unsupported(op, l, r)),
            };
            Ok(match ty {
                Type::F32 => Value::F32(n as f32),
                _ => Value::F64(n),
            })
        }
        _ => Err(unsupported(op, l, r)),
    }
}

fn time_overflow(op: BinaryOp) -> Error {
    Error::Evaluation(format!("time out of range in {}", op.symbol()))
}

fn unsupported(op: BinaryOp, l: &Value, r: &Value) -> Error {
    Error::Evaluation(format!(
        "operator {} is not defined for {} and {}",
        op.symbol(),
        l.kind_name(),
        r.kind_name()
    ))
}

fn eval_unary(op: UnaryOp, value: &Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Negate, Value::F32(n)) => Ok(Value::F32(-n)),
        (UnaryOp::Negate, Value::F64(n)) => Ok(Value::F64(-n)),
        (UnaryOp::Negate, Value::Duration(d)) => Ok(Value::Duration(-*d)),
        (UnaryOp::Negate, v) if v.as_i128().is_some() => {
            Value::integer(&v.runtime_type(), -v.as_i128().unwrap_or_default())
        }
        (UnaryOp::Length, Value::String(s)) => Ok(Value::I64(s.chars().count() as i64)),
        (UnaryOp::Length, Value::List(items)) => Ok(Value::I64(items.len() as i64)),
        (UnaryOp::Length, Value::Map(entries)) => Ok(Value::I64(entries.len() as i64)),
        (op, v) => Err(Error::Evaluation(format!(
            "{:?} is not defined for {}",
            op,
            v.kind_name()
        ))),
    }
}

/// Explicit conversion: numeric casts are range-checked, everything else
/// must already have the target's shape.
pub fn convert_value(value: Value, ty: &Type) -> Result<Value> {
    match ty {
        Type::Dynamic => Ok(value),
        Type::Option(_) if value.is_null() => Ok(Value::Null),
        Type::Option(inner) => convert_value(value, inner),
        t if t.is_integer() => {
            let n = match (value.as_i128(), value.as_f64()) {
                (Some(n), _) => n,
                (None, Some(f)) if f.is_finite() => f.trunc() as i128,
                _ => return Err(Error::mismatch(t.to_string(), value.kind_name())),
            };
            Value::integer(t, n)
        }
        Type::F32 | Type::F64 => {
            let n = value
                .as_f64()
                .ok_or_else(|| Error::mismatch(ty.to_string(), value.kind_name()))?;
            Ok(if *ty == Type::F32 {
                Value::F32(n as f32)
            } else {
                Value::F64(n)
            })
        }
        Type::DateTimeOffset => match value {
            Value::DateTime(dt) => Ok(Value::DateTimeOffset(dt.fixed_offset())),
            other => same_shape(other, ty),
        },
        _ => same_shape(value, ty),
    }
}

fn same_shape(value: Value, ty: &Type) -> Result<Value> {
    if value.is_null() && ty.is_nullable() {
        return Ok(value);
    }
    let actual = value.runtime_type();
    if actual.key() == ty.key() {
        Ok(value)
    } else {
        Err(Error::mismatch(ty.to_string(), actual.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::expr::{Method, Parameter};

    #[test]
    fn test_integer_arithmetic_keeps_type() {
        let sum = Expr::add(Expr::constant(40i32), Expr::constant(2i32));
        assert_eq!(evaluate(&sum).unwrap(), Value::I32(42));

        let overflow = Expr::add(Expr::constant(250u8), Expr::constant(10u8));
        assert!(evaluate(&overflow).is_err());

        let div = Expr::binary(BinaryOp::Div, Expr::constant(1i32), Expr::constant(0i32));
        assert!(matches!(evaluate(&div), Err(Error::Evaluation(_))));
    }

    #[test]
    fn test_time_arithmetic_out_of_range() {
        use chrono::{DateTime, TimeDelta, Utc};

        let past_end = Expr::add(
            Expr::constant(DateTime::<Utc>::MAX_UTC),
            Expr::constant(TimeDelta::days(1)),
        );
        assert!(matches!(evaluate(&past_end), Err(Error::Evaluation(_))));

        let before_start = Expr::sub(
            Expr::constant(DateTime::<Utc>::MIN_UTC),
            Expr::constant(TimeDelta::days(1)),
        );
        assert!(matches!(evaluate(&before_start), Err(Error::Evaluation(_))));

        let spans = Expr::add(Expr::constant(TimeDelta::MAX), Expr::constant(TimeDelta::MAX));
        assert!(matches!(evaluate(&spans), Err(Error::Evaluation(_))));

        let start = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        let later = Expr::add(Expr::constant(start), Expr::constant(TimeDelta::hours(2)));
        assert_eq!(
            evaluate(&later).unwrap(),
            Value::DateTime(start + TimeDelta::hours(2))
        );
    }

    #[test]
    fn test_mixed_numeric_comparison() {
        let cmp = Expr::gt(Expr::constant(3i64), Expr::constant(2.5f64));
        assert_eq!(evaluate(&cmp).unwrap(), Value::Bool(true));
        let eq = Expr::eq(Expr::constant(2u8), Expr::constant(2i64));
        assert_eq!(evaluate(&eq).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_parameter_leaks() {
        let p = Parameter::new("row", Type::I32);
        let expr = Expr::add(Expr::param(&p), Expr::constant(1i32));
        assert!(matches!(
            evaluate(&expr),
            Err(Error::ServerVariableLeak(name)) if name == "row"
        ));
    }

    #[test]
    fn test_method_without_implementation() {
        let method = Method::new(Type::String, "trim", Type::String);
        let expr = Expr::call(method, Some(Expr::constant(" x ".to_string())), vec![]);
        assert!(matches!(evaluate(&expr), Err(Error::TranslationUnsupported(_))));

        let method = Method::new(Type::String, "trim", Type::String).with_invoke(|target, _| {
            Ok(Value::from(target.and_then(Value::as_str).unwrap_or_default().trim()))
        });
        let expr = Expr::call(method, Some(Expr::constant(" x ".to_string())), vec![]);
        assert_eq!(evaluate(&expr).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_convert() {
        assert_eq!(convert_value(Value::F64(3.9), &Type::I32).unwrap(), Value::I32(3));
        assert!(convert_value(Value::I64(300), &Type::U8).is_err());
        assert_eq!(
            convert_value(Value::Null, &Type::option(Type::I32)).unwrap(),
            Value::Null
        );
        assert!(convert_value(Value::from("x"), &Type::I32).is_err());
    }

    #[test]
    fn test_short_circuit() {
        let p = Parameter::new("row", Type::Bool);
        let expr = Expr::or(Expr::constant(true), Expr::param(&p));
        assert_eq!(evaluate(&expr).unwrap(), Value::Bool(true));
    }
}
