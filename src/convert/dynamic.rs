//! Values without a static type.
//!
//! Decoding infers the best native type from the datum's shape and resolves
//! that type through the root chain; encoding resolves the value's own
//! runtime type.

use super::primitive::MAX_SAFE_INTEGER;
use super::{resolve, DatumConverter, DatumConverterFactory};
use crate::error::{Error, Result};
use crate::native::{Type, Value};
use crate::reql::{Datum, PSEUDO_BINARY, PSEUDO_GROUPED_DATA, PSEUDO_TIME};
use std::sync::{Arc, Weak};

/// Infer the native type a datum decodes to when nothing else is known.
///
/// - integral Numbers within ±2^53 infer to `i64`, every other Number to `f64`
/// - Arrays take the union of their non-null element types; mixed `i64`/`f64`
///   widens to `f64`, anything else mixed is rejected
/// - Objects use their `$reql_type$` tag, plain Objects become maps of `Value`
pub fn infer_type(datum: &Datum) -> Result<Type> {
    match datum {
        Datum::Null => Ok(Type::Dynamic),
        Datum::Boolean(_) => Ok(Type::Bool),
        Datum::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => Ok(Type::I64),
        Datum::Number(_) => Ok(Type::F64),
        Datum::String(_) => Ok(Type::String),
        Datum::Array(items) => infer_array(items),
        Datum::Object(_) => match datum.reql_type() {
            Some(PSEUDO_TIME) => Ok(Type::DateTimeOffset),
            Some(PSEUDO_BINARY) => Ok(Type::Binary),
            Some(PSEUDO_GROUPED_DATA) => Ok(Type::grouping(Type::Dynamic, Type::Dynamic)),
            Some(other) => Err(Error::UnrecognizedExtendedType(other.to_string())),
            None => Ok(Type::map(Type::Dynamic)),
        },
    }
}

fn infer_array(items: &[Datum]) -> Result<Type> {
    let mut element: Option<Type> = None;
    let mut saw_null = false;
    for item in items {
        if item.is_null() {
            saw_null = true;
            continue;
        }
        let ty = infer_type(item)?;
        element = Some(match element {
            None => ty,
            Some(current) => unify(&current, &ty).ok_or_else(|| {
                Error::HeterogeneousArray(format!("{} and {}", current, ty))
            })?,
        });
    }

    let element = match element {
        // Keeps the nulls visible when this array is unified with a sibling.
        None if saw_null => Type::option(Type::Dynamic),
        None => Type::Dynamic,
        Some(ty) if saw_null && !ty.is_nullable() => Type::option(ty),
        Some(ty) => ty,
    };
    Ok(Type::list(element))
}

/// Common type of two inferred element types, if there is one.
fn unify(a: &Type, b: &Type) -> Option<Type> {
    match (a, b) {
        _ if a == b => Some(a.clone()),
        (Type::Dynamic, other) | (other, Type::Dynamic) => Some(other.clone()),
        (Type::I64, Type::F64) | (Type::F64, Type::I64) => Some(Type::F64),
        (Type::List(x), Type::List(y)) => unify(x, y).map(Type::list),
        (Type::Option(x), Type::Option(y)) => unify(x, y).map(Type::option),
        (Type::Option(x), other) | (other, Type::Option(x)) => unify(x, other).map(Type::option),
        _ => None,
    }
}

/// Decodes by shape and encodes by runtime type.
///
/// Holds the root weakly: the root's cache owns this converter.
pub struct DynamicDatumConverter {
    root: Weak<dyn DatumConverterFactory>,
}

impl std::fmt::Debug for DynamicDatumConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicDatumConverter").finish_non_exhaustive()
    }
}

impl DynamicDatumConverter {
    fn root(&self) -> Result<Arc<dyn DatumConverterFactory>> {
        self.root
            .upgrade()
            .ok_or_else(|| Error::ConversionNotSupported("Value (engine dropped)".to_string()))
    }
}

impl DatumConverter for DynamicDatumConverter {
    fn native_type(&self) -> &Type {
        static TYPE: Type = Type::Dynamic;
        &TYPE
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        match value {
            Value::Null => Ok(Datum::Null),
            other => resolve(&self.root()?, &other.runtime_type())?.to_datum(other),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        let ty = infer_type(datum)?;
        if ty == Type::Dynamic {
            return Ok(Value::Null);
        }
        tracing::trace!(inferred = %ty, "decoding dynamic datum");
        resolve(&self.root()?, &ty)?.from_datum(datum)
    }
}

/// Last link of the default chain.
#[derive(Debug, Default)]
pub struct DynamicDatumConverterFactory;

impl DatumConverterFactory for DynamicDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        match ty {
            Type::Dynamic => Ok(Some(Arc::new(DynamicDatumConverter {
                root: Arc::downgrade(root),
            }))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::DatumEngine;
    use crate::reql::REQL_TYPE_KEY;

    fn numbers(values: &[f64]) -> Datum {
        Datum::Array(values.iter().map(|n| Datum::Number(*n)).collect())
    }

    #[test]
    fn test_infer_primitives() {
        assert_eq!(infer_type(&Datum::Number(3.0)).unwrap(), Type::I64);
        assert_eq!(infer_type(&Datum::Number(3.5)).unwrap(), Type::F64);
        assert_eq!(infer_type(&Datum::Number(1e300)).unwrap(), Type::F64);
        assert_eq!(infer_type(&Datum::from("x")).unwrap(), Type::String);
        assert_eq!(infer_type(&Datum::Null).unwrap(), Type::Dynamic);
    }

    #[test]
    fn test_infer_arrays() {
        assert_eq!(infer_type(&numbers(&[1.0, 2.0])).unwrap(), Type::list(Type::I64));
        assert_eq!(infer_type(&numbers(&[1.0, 2.5])).unwrap(), Type::list(Type::F64));
        assert_eq!(infer_type(&Datum::Array(vec![])).unwrap(), Type::list(Type::Dynamic));
        assert_eq!(
            infer_type(&Datum::Array(vec![Datum::Null, Datum::from("a")])).unwrap(),
            Type::list(Type::option(Type::String))
        );
        assert_eq!(
            infer_type(&Datum::Array(vec![numbers(&[1.0]), numbers(&[2.5])])).unwrap(),
            Type::list(Type::list(Type::F64))
        );
        assert_eq!(
            infer_type(&Datum::Array(vec![Datum::Null, Datum::Null])).unwrap(),
            Type::list(Type::option(Type::Dynamic))
        );
        let sparse = Datum::Array(vec![Datum::Array(vec![Datum::Null]), numbers(&[1.0])]);
        assert_eq!(
            infer_type(&sparse).unwrap(),
            Type::list(Type::list(Type::option(Type::I64)))
        );
    }

    #[test]
    fn test_dynamic_decode_nested_nulls() {
        let engine = DatumEngine::default();
        let sparse = Datum::Array(vec![Datum::Array(vec![Datum::Null]), numbers(&[1.0])]);
        let value = engine.decode_value(&Type::Dynamic, &sparse).unwrap();
        assert_eq!(
            value,
            Value::List(vec![
                Value::List(vec![Value::Null]),
                Value::List(vec![Value::I64(1)]),
            ])
        );
    }

    #[test]
    fn test_heterogeneous_array_rejected() {
        let mixed = Datum::Array(vec![Datum::Number(1.0), Datum::from("a")]);
        assert!(matches!(infer_type(&mixed), Err(Error::HeterogeneousArray(_))));
    }

    #[test]
    fn test_infer_extended_types() {
        let tagged = |tag: &str| Datum::object([(REQL_TYPE_KEY, Datum::from(tag))]);
        assert_eq!(infer_type(&tagged("TIME")).unwrap(), Type::DateTimeOffset);
        assert_eq!(infer_type(&tagged("BINARY")).unwrap(), Type::Binary);
        assert!(matches!(
            infer_type(&tagged("GEOMETRY")),
            Err(Error::UnrecognizedExtendedType(tag)) if tag == "GEOMETRY"
        ));
        assert_eq!(
            infer_type(&Datum::object([("a", Datum::Number(1.0))])).unwrap(),
            Type::map(Type::Dynamic)
        );
    }

    #[test]
    fn test_dynamic_decode_nested_object() {
        let engine = DatumEngine::default();
        let datum = Datum::object([
            ("n", Datum::Number(2.0)),
            ("xs", numbers(&[1.0, 1.5])),
            ("none", Datum::Null),
        ]);
        let value = engine.decode_value(&Type::Dynamic, &datum).unwrap();
        let Value::Map(entries) = &value else {
            panic!("expected a map, got {:?}", value);
        };
        assert_eq!(entries["n"], Value::I64(2));
        assert_eq!(entries["xs"], Value::List(vec![Value::F64(1.0), Value::F64(1.5)]));
        assert_eq!(entries["none"], Value::Null);

        let back = engine.encode_value(&Type::Dynamic, &value).unwrap();
        assert_eq!(back.get("xs"), Some(&numbers(&[1.0, 1.5])));
    }
}
