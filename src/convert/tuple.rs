//! Fixed-arity tuples.
//!
//! Decoding accepts a positional Array of matching length. Two-element
//! tuples also decode from the Objects the server produces for joins
//! (`left`/`right`) and group reductions (`group`/`reduction`). Encoding is
//! opt-in through [`crate::EngineConfig::tuple_encoding`].

use super::{resolve, value_mismatch, DatumConverter, DatumConverterFactory};
use crate::error::{Error, Result};
use crate::native::{Type, Value};
use crate::reql::Datum;
use std::sync::Arc;

/// Object key pairs a 2-tuple can be read from.
const PAIR_KEYS: [(&str, &str); 2] = [("left", "right"), ("group", "reduction")];

#[derive(Debug)]
pub struct TupleDatumConverter {
    ty: Type,
    items: Vec<Arc<dyn DatumConverter>>,
    encode: bool,
}

impl TupleDatumConverter {
    fn from_pair_object(&self, datum: &Datum) -> Result<Value> {
        for (first, second) in PAIR_KEYS {
            match (datum.get(first), datum.get(second)) {
                (Some(a), Some(b)) => {
                    return Ok(Value::Tuple(vec![
                        self.items[0].from_datum(a)?,
                        self.items[1].from_datum(b)?,
                    ]))
                }
                (Some(_), None) | (None, Some(_)) => {
                    return Err(Error::mismatch(
                        format!("OBJECT with both '{}' and '{}'", first, second),
                        datum.to_string(),
                    ))
                }
                (None, None) => {}
            }
        }
        Err(Error::mismatch(
            "OBJECT with left/right or group/reduction",
            datum.to_string(),
        ))
    }
}

impl DatumConverter for TupleDatumConverter {
    fn native_type(&self) -> &Type {
        &self.ty
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        if !self.encode {
            return Err(Error::ConversionNotSupported(format!(
                "{} (tuple encoding is disabled)",
                self.ty
            )));
        }
        match value {
            Value::Tuple(items) if items.len() == self.items.len() => items
                .iter()
                .zip(&self.items)
                .map(|(item, converter)| converter.to_datum(item))
                .collect::<Result<Vec<_>>>()
                .map(Datum::Array),
            other => Err(value_mismatch(&self.ty, other)),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        match datum {
            Datum::Array(items) if items.len() == self.items.len() => items
                .iter()
                .zip(&self.items)
                .map(|(item, converter)| converter.from_datum(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Tuple),
            Datum::Array(items) => Err(Error::mismatch(
                format!("ARRAY of length {}", self.items.len()),
                format!("ARRAY of length {}", items.len()),
            )),
            Datum::Object(_) if self.items.len() == 2 => self.from_pair_object(datum),
            Datum::Null => Err(super::null_not_allowed(&self.ty)),
            other => Err(Error::mismatch("ARRAY", other.type_name())),
        }
    }
}

#[derive(Debug, Default)]
pub struct TupleDatumConverterFactory {
    encode: bool,
}

impl TupleDatumConverterFactory {
    pub fn new(encode: bool) -> Self {
        Self { encode }
    }
}

impl DatumConverterFactory for TupleDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        let Type::Tuple(items) = ty else {
            return Ok(None);
        };
        if items.is_empty() {
            return Ok(None);
        }
        let items = items
            .iter()
            .map(|item| resolve(root, item))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Arc::new(TupleDatumConverter {
            ty: ty.clone(),
            items,
            encode: self.encode,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::convert::DatumEngine;

    fn pair(encode: bool) -> Arc<dyn DatumConverter> {
        let config = EngineConfig::default().with_tuple_encoding(encode);
        DatumEngine::new(config)
            .resolve(&Type::Tuple(vec![Type::String, Type::I32]))
            .unwrap()
    }

    #[test]
    fn test_decode_array_and_objects() {
        let expected = Value::Tuple(vec![Value::from("a"), Value::I32(1)]);
        let converter = pair(false);
        assert_eq!(
            converter
                .from_datum(&Datum::Array(vec![Datum::from("a"), Datum::Number(1.0)]))
                .unwrap(),
            expected
        );
        for (first, second) in PAIR_KEYS {
            let object = Datum::object([(first, Datum::from("a")), (second, Datum::Number(1.0))]);
            assert_eq!(converter.from_datum(&object).unwrap(), expected);
        }
    }

    #[test]
    fn test_decode_requires_both_keys() {
        let object = Datum::object([("left", Datum::from("a"))]);
        assert!(matches!(
            pair(false).from_datum(&object),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_arity_mismatch() {
        assert!(pair(false)
            .from_datum(&Datum::Array(vec![Datum::from("a")]))
            .is_err());
    }

    #[test]
    fn test_encoding_is_opt_in() {
        let value = Value::Tuple(vec![Value::from("a"), Value::I32(1)]);
        assert!(matches!(
            pair(false).to_datum(&value),
            Err(Error::ConversionNotSupported(_))
        ));
        assert_eq!(
            pair(true).to_datum(&value).unwrap(),
            Datum::Array(vec![Datum::from("a"), Datum::Number(1.0)])
        );
    }
}
