//! Leaf converters: booleans, characters, strings, numbers, enums, UUIDs and URLs.
//!
//! Every numeric width encodes to the same wire `Number`. Decoding into an
//! integer type checks both range and fractional part; nothing is truncated.

use super::{datum_mismatch, value_mismatch, DatumConverter, DatumConverterFactory};
use crate::config::EnumEncoding;
use crate::error::{Error, RangeViolation, Result};
use crate::native::{EnumType, Type, Value};
use crate::reql::Datum;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

pub use crate::reql::datum::MAX_SAFE_INTEGER;

/// [`MAX_SAFE_INTEGER`] as an integer, for checks before any f64 rounding.
const MAX_SAFE_MAGNITUDE: u128 = 1 << 53;

fn range_error(value: f64, ty: &Type, violation: RangeViolation) -> Error {
    Error::RangeOrPrecision {
        value,
        target: ty.to_string(),
        violation,
    }
}

/// Narrow a wire number into integer type `ty`.
pub fn number_to_integer(n: f64, ty: &Type) -> Result<Value> {
    let (min, max) = ty
        .integer_bounds()
        .ok_or_else(|| Error::mismatch("integer type", ty.to_string()))?;
    if !n.is_finite() {
        return Err(range_error(n, ty, RangeViolation::OutOfRange));
    }
    if n.fract() != 0.0 {
        return Err(range_error(n, ty, RangeViolation::Fractional));
    }
    let (min, max) = (
        (min as f64).max(-MAX_SAFE_INTEGER),
        (max as f64).min(MAX_SAFE_INTEGER),
    );
    if n < min || n > max {
        return Err(range_error(n, ty, RangeViolation::OutOfRange));
    }
    Value::integer(ty, n as i128)
}

#[derive(Debug)]
pub struct BoolDatumConverter;

impl DatumConverter for BoolDatumConverter {
    fn native_type(&self) -> &Type {
        static TYPE: Type = Type::Bool;
        &TYPE
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        match value {
            Value::Bool(b) => Ok(Datum::Boolean(*b)),
            other => Err(value_mismatch(&Type::Bool, other)),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        match datum {
            Datum::Boolean(b) => Ok(Value::Bool(*b)),
            other => Err(datum_mismatch(&Type::Bool, "BOOL", other)),
        }
    }
}

#[derive(Debug)]
pub struct StringDatumConverter;

impl DatumConverter for StringDatumConverter {
    fn native_type(&self) -> &Type {
        static TYPE: Type = Type::String;
        &TYPE
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        match value {
            Value::String(s) => Ok(Datum::String(s.clone())),
            other => Err(value_mismatch(&Type::String, other)),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        match datum {
            Datum::String(s) => Ok(Value::String(s.clone())),
            other => Err(datum_mismatch(&Type::String, "STRING", other)),
        }
    }
}

/// A `char` travels as a one-character string.
#[derive(Debug)]
pub struct CharDatumConverter;

impl DatumConverter for CharDatumConverter {
    fn native_type(&self) -> &Type {
        static TYPE: Type = Type::Char;
        &TYPE
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        match value {
            Value::Char(c) => Ok(Datum::String(c.to_string())),
            other => Err(value_mismatch(&Type::Char, other)),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        let s = match datum {
            Datum::String(s) => s,
            other => return Err(datum_mismatch(&Type::Char, "STRING", other)),
        };
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Value::Char(c)),
            _ => Err(Error::mismatch(
                "single-character STRING",
                format!("STRING of length {}", s.chars().count()),
            )),
        }
    }
}

#[derive(Debug)]
pub struct IntegerDatumConverter {
    ty: Type,
}

impl IntegerDatumConverter {
    pub fn new(ty: Type) -> Result<Self> {
        if !ty.is_integer() {
            return Err(Error::InvalidArgument(format!("{} is not an integer type", ty)));
        }
        Ok(Self { ty })
    }
}

impl DatumConverter for IntegerDatumConverter {
    fn native_type(&self) -> &Type {
        &self.ty
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        if value.runtime_type() != self.ty {
            return Err(value_mismatch(&self.ty, value));
        }
        let n = value
            .as_i128()
            .ok_or_else(|| value_mismatch(&self.ty, value))?;
        if n.unsigned_abs() > MAX_SAFE_MAGNITUDE {
            return Err(range_error(n as f64, &self.ty, RangeViolation::OutOfRange));
        }
        Ok(Datum::Number(n as f64))
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        match datum {
            Datum::Number(n) => number_to_integer(*n, &self.ty),
            other => Err(datum_mismatch(&self.ty, "NUMBER", other)),
        }
    }
}

#[derive(Debug)]
pub struct FloatDatumConverter {
    ty: Type,
}

impl DatumConverter for FloatDatumConverter {
    fn native_type(&self) -> &Type {
        &self.ty
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        let n = match (&self.ty, value) {
            (Type::F32, Value::F32(v)) => *v as f64,
            (Type::F64, Value::F64(v)) => *v,
            (_, other) => return Err(value_mismatch(&self.ty, other)),
        };
        if !n.is_finite() {
            return Err(range_error(n, &self.ty, RangeViolation::OutOfRange));
        }
        Ok(Datum::Number(n))
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        let n = match datum {
            Datum::Number(n) => *n,
            other => return Err(datum_mismatch(&self.ty, "NUMBER", other)),
        };
        match self.ty {
            Type::F32 if n.abs() > f32::MAX as f64 => {
                Err(range_error(n, &self.ty, RangeViolation::OutOfRange))
            }
            Type::F32 => Ok(Value::F32(n as f32)),
            _ => Ok(Value::F64(n)),
        }
    }
}

/// Enums travel as their discriminant, or as their variant name.
#[derive(Debug)]
pub struct EnumDatumConverter {
    ty: Type,
    enum_type: Arc<EnumType>,
    encoding: EnumEncoding,
}

impl DatumConverter for EnumDatumConverter {
    fn native_type(&self) -> &Type {
        &self.ty
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        let discriminant = match value {
            Value::Enum(ty, d) if **ty == *self.enum_type => *d,
            other => return Err(value_mismatch(&self.ty, other)),
        };
        match self.encoding {
            EnumEncoding::Numeric => Ok(Datum::Number(discriminant as f64)),
            EnumEncoding::Name => self
                .enum_type
                .name_of(discriminant)
                .map(|name| Datum::String(name.to_string()))
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "{} is not a {} discriminant",
                        discriminant, self.enum_type.name
                    ))
                }),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        let discriminant = match (self.encoding, datum) {
            (EnumEncoding::Numeric, Datum::Number(n)) => {
                let d = number_to_integer(*n, &Type::I64)?;
                let d = d.as_i128().unwrap_or_default() as i64;
                self.enum_type.name_of(d).map(|_| d)
            }
            (EnumEncoding::Name, Datum::String(s)) => self.enum_type.discriminant_of(s),
            (EnumEncoding::Numeric, other) => {
                return Err(datum_mismatch(&self.ty, "NUMBER", other))
            }
            (EnumEncoding::Name, other) => return Err(datum_mismatch(&self.ty, "STRING", other)),
        };
        discriminant
            .map(|d| Value::Enum(self.enum_type.clone(), d))
            .ok_or_else(|| {
                Error::InvalidArgument(format!("{} is not a {} variant", datum, self.enum_type.name))
            })
    }
}

/// UUIDs travel as their hyphenated lowercase string.
#[derive(Debug)]
pub struct UuidDatumConverter;

impl DatumConverter for UuidDatumConverter {
    fn native_type(&self) -> &Type {
        static TYPE: Type = Type::Uuid;
        &TYPE
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        match value {
            Value::Uuid(id) => Ok(Datum::String(id.hyphenated().to_string())),
            other => Err(value_mismatch(&Type::Uuid, other)),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        match datum {
            Datum::String(s) => Uuid::parse_str(s)
                .map(Value::Uuid)
                .map_err(|e| Error::mismatch("UUID string", format!("{:?} ({})", s, e))),
            other => Err(datum_mismatch(&Type::Uuid, "STRING", other)),
        }
    }
}

#[derive(Debug)]
pub struct UrlDatumConverter;

impl DatumConverter for UrlDatumConverter {
    fn native_type(&self) -> &Type {
        static TYPE: Type = Type::Url;
        &TYPE
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        match value {
            Value::Url(url) => Ok(Datum::String(url.as_str().to_string())),
            other => Err(value_mismatch(&Type::Url, other)),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        match datum {
            Datum::String(s) => Url::parse(s)
                .map(Value::Url)
                .map_err(|e| Error::mismatch("URL string", format!("{:?} ({})", s, e))),
            other => Err(datum_mismatch(&Type::Url, "STRING", other)),
        }
    }
}

/// Handles bool, char, String and every numeric width.
#[derive(Debug, Default)]
pub struct PrimitiveDatumConverterFactory;

impl DatumConverterFactory for PrimitiveDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        _root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        let converter: Arc<dyn DatumConverter> = match ty {
            Type::Bool => Arc::new(BoolDatumConverter),
            Type::Char => Arc::new(CharDatumConverter),
            Type::String => Arc::new(StringDatumConverter),
            Type::F32 | Type::F64 => Arc::new(FloatDatumConverter { ty: ty.clone() }),
            t if t.is_integer() => Arc::new(IntegerDatumConverter::new(t.clone())?),
            _ => return Ok(None),
        };
        Ok(Some(converter))
    }
}

#[derive(Debug, Default)]
pub struct EnumDatumConverterFactory {
    encoding: EnumEncoding,
}

impl EnumDatumConverterFactory {
    pub fn new(encoding: EnumEncoding) -> Self {
        Self { encoding }
    }
}

impl DatumConverterFactory for EnumDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        _root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        match ty {
            Type::Enum(enum_type) => Ok(Some(Arc::new(EnumDatumConverter {
                ty: ty.clone(),
                enum_type: enum_type.clone(),
                encoding: self.encoding,
            }))),
            _ => Ok(None),
        }
    }
}

/// Handles `Uuid` and `Url`.
#[derive(Debug, Default)]
pub struct IdentifierDatumConverterFactory;

impl DatumConverterFactory for IdentifierDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        _root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        match ty {
            Type::Uuid => Ok(Some(Arc::new(UuidDatumConverter))),
            Type::Url => Ok(Some(Arc::new(UrlDatumConverter))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(ty: Type) -> IntegerDatumConverter {
        IntegerDatumConverter::new(ty).unwrap()
    }

    #[test]
    fn test_integer_range_and_fraction() {
        assert!(matches!(
            int(Type::I32).from_datum(&Datum::Number(2.5)),
            Err(Error::RangeOrPrecision {
                violation: RangeViolation::Fractional,
                ..
            })
        ));
        assert!(matches!(
            int(Type::U8).from_datum(&Datum::Number(300.0)),
            Err(Error::RangeOrPrecision {
                violation: RangeViolation::OutOfRange,
                ..
            })
        ));
        assert_eq!(
            int(Type::I16).from_datum(&Datum::Number(300.0)).unwrap(),
            Value::I16(300)
        );
        assert!(int(Type::U32).from_datum(&Datum::Number(-1.0)).is_err());
    }

    #[test]
    fn test_integer_encodes_same_number_for_every_width() {
        assert_eq!(int(Type::U8).to_datum(&Value::U8(7)).unwrap(), Datum::Number(7.0));
        assert_eq!(int(Type::I64).to_datum(&Value::I64(7)).unwrap(), Datum::Number(7.0));
        assert!(int(Type::I64).to_datum(&Value::I32(7)).is_err());
    }

    #[test]
    fn test_unsafe_integers_rejected() {
        assert!(int(Type::I64).to_datum(&Value::I64(i64::MAX)).is_err());
        assert!(matches!(
            int(Type::I64).to_datum(&Value::I64(9_007_199_254_740_993)),
            Err(Error::RangeOrPrecision {
                violation: RangeViolation::OutOfRange,
                ..
            })
        ));
        assert!(int(Type::U64).to_datum(&Value::U64(9_007_199_254_740_993)).is_err());
        assert!(int(Type::I64).to_datum(&Value::I64(-9_007_199_254_740_993)).is_err());
        assert_eq!(
            int(Type::I64).to_datum(&Value::I64(9_007_199_254_740_992)).unwrap(),
            Datum::Number(MAX_SAFE_INTEGER)
        );
        assert!(int(Type::U64).from_datum(&Datum::Number(1e19)).is_err());
    }

    #[test]
    fn test_null_rejected_by_value_types() {
        assert!(matches!(
            int(Type::I32).from_datum(&Datum::Null),
            Err(Error::NullNotAllowed(_))
        ));
        assert!(matches!(
            BoolDatumConverter.from_datum(&Datum::Null),
            Err(Error::NullNotAllowed(_))
        ));
    }

    #[test]
    fn test_no_coercion_between_tags() {
        assert!(matches!(
            StringDatumConverter.from_datum(&Datum::Number(1.0)),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            BoolDatumConverter.from_datum(&Datum::String("true".into())),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_char_requires_single_character() {
        assert_eq!(
            CharDatumConverter.from_datum(&Datum::from("é")).unwrap(),
            Value::Char('é')
        );
        assert!(CharDatumConverter.from_datum(&Datum::from("ab")).is_err());
    }

    #[test]
    fn test_enum_encodings() {
        let enum_type = EnumType::new("Color", vec![("Red".into(), 1), ("Blue".into(), 4)]);
        let numeric = EnumDatumConverter {
            ty: Type::Enum(enum_type.clone()),
            enum_type: enum_type.clone(),
            encoding: EnumEncoding::Numeric,
        };
        let named = EnumDatumConverter {
            ty: Type::Enum(enum_type.clone()),
            enum_type: enum_type.clone(),
            encoding: EnumEncoding::Name,
        };
        let blue = Value::Enum(enum_type, 4);
        assert_eq!(numeric.to_datum(&blue).unwrap(), Datum::Number(4.0));
        assert_eq!(named.to_datum(&blue).unwrap(), Datum::from("Blue"));
        assert_eq!(named.from_datum(&Datum::from("Blue")).unwrap(), blue);
        assert!(numeric.from_datum(&Datum::Number(2.0)).is_err());
    }

    #[test]
    fn test_uuid_roundtrip() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let datum = UuidDatumConverter.to_datum(&Value::Uuid(id)).unwrap();
        assert_eq!(datum, Datum::from("550e8400-e29b-41d4-a716-446655440000"));
        assert_eq!(UuidDatumConverter.from_datum(&datum).unwrap(), Value::Uuid(id));
        assert!(UuidDatumConverter.from_datum(&Datum::from("nope")).is_err());
    }

    #[test]
    fn test_url_null_is_rejected_both_ways() {
        assert!(matches!(
            UrlDatumConverter.to_datum(&Value::Null),
            Err(Error::NullNotAllowed(_))
        ));
        assert!(matches!(
            UrlDatumConverter.from_datum(&Datum::Null),
            Err(Error::NullNotAllowed(_))
        ));
        let url = Url::parse("https://rethinkdb.com/api").unwrap();
        let datum = UrlDatumConverter.to_datum(&Value::Url(url.clone())).unwrap();
        assert_eq!(UrlDatumConverter.from_datum(&datum).unwrap(), Value::Url(url));
    }
}
