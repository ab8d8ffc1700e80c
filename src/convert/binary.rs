//! BINARY pseudo type: `{"$reql_type$":"BINARY","data":"<base64>"}`.

use super::{datum_mismatch, DatumConverter, DatumConverterFactory};
use crate::error::{Error, Result};
use crate::native::{Type, Value};
use crate::reql::{Datum, PSEUDO_BINARY, REQL_TYPE_KEY};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use std::sync::Arc;

pub fn binary_to_datum(data: &[u8]) -> Datum {
    Datum::object([
        (REQL_TYPE_KEY, Datum::from(PSEUDO_BINARY)),
        ("data", Datum::String(STANDARD.encode(data))),
    ])
}

pub fn datum_to_binary(datum: &Datum) -> Result<Bytes> {
    if datum.reql_type() != Some(PSEUDO_BINARY) {
        return Err(datum_mismatch(&Type::Binary, "PTYPE<BINARY>", datum));
    }
    let data = datum
        .get("data")
        .and_then(Datum::as_string)
        .ok_or_else(|| Error::mismatch("BINARY with string data", datum.to_string()))?;
    STANDARD
        .decode(data)
        .map(Bytes::from)
        .map_err(|e| Error::InvalidArgument(format!("invalid base64 in BINARY: {}", e)))
}

/// Byte buffers. A null buffer is a reference type, so `Null` maps both ways.
#[derive(Debug)]
pub struct BinaryDatumConverter;

impl DatumConverter for BinaryDatumConverter {
    fn native_type(&self) -> &Type {
        static TYPE: Type = Type::Binary;
        &TYPE
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        match value {
            Value::Binary(bytes) => Ok(binary_to_datum(bytes)),
            Value::Null => Ok(Datum::Null),
            other => Err(Error::mismatch(Type::Binary.to_string(), other.kind_name())),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        match datum {
            Datum::Null => Ok(Value::Null),
            other => datum_to_binary(other).map(Value::Binary),
        }
    }
}

#[derive(Debug, Default)]
pub struct BinaryDatumConverterFactory;

impl DatumConverterFactory for BinaryDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        _root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        match ty {
            Type::Binary => Ok(Some(Arc::new(BinaryDatumConverter))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_shape() {
        let datum = BinaryDatumConverter
            .to_datum(&Value::Binary(Bytes::from_static(b"hi!")))
            .unwrap();
        assert_eq!(
            serde_json::to_string(&datum).unwrap(),
            r#"{"$reql_type$":"BINARY","data":"aGkh"}"#
        );
        assert_eq!(
            BinaryDatumConverter.from_datum(&datum).unwrap(),
            Value::Binary(Bytes::from_static(b"hi!"))
        );
    }

    #[test]
    fn test_binary_null_and_errors() {
        assert_eq!(BinaryDatumConverter.from_datum(&Datum::Null).unwrap(), Value::Null);
        assert!(BinaryDatumConverter.from_datum(&Datum::from("aGkh")).is_err());

        let bad = Datum::object([
            (REQL_TYPE_KEY, Datum::from(PSEUDO_BINARY)),
            ("data", Datum::from("not base64!")),
        ]);
        assert!(matches!(
            BinaryDatumConverter.from_datum(&bad),
            Err(Error::InvalidArgument(_))
        ));
    }
}
