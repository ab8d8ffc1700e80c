//! Dynamic native values.
//!
//! `Value` is the in-process side of every conversion: typed Rust values
//! are lowered into it through [`super::Native`], converters translate it to
//! and from [`crate::reql::Datum`], and the client-side evaluator computes
//! with it. `Option<T>` has no wrapper: absence is `Value::Null`.

use super::types::{EnumType, RecordType, Type};
use crate::error::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Char(char),
    String(String),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Uuid(Uuid),
    Url(Url),
    Binary(Bytes),
    DateTime(DateTime<Utc>),
    DateTimeOffset(DateTime<FixedOffset>),
    Duration(TimeDelta),
    Enum(Arc<EnumType>, i64),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Tuple(Vec<Value>),
    Grouping(Vec<(Value, Value)>),
    Record(RecordValue),
}

impl Value {
    /// Rust's `Default` for each type; used for record fields nobody set.
    pub fn default_for(ty: &Type) -> Value {
        match ty {
            Type::Bool => Value::Bool(false),
            Type::Char => Value::Char('\0'),
            Type::String => Value::String(String::new()),
            Type::I8 => Value::I8(0),
            Type::I16 => Value::I16(0),
            Type::I32 => Value::I32(0),
            Type::I64 => Value::I64(0),
            Type::U8 => Value::U8(0),
            Type::U16 => Value::U16(0),
            Type::U32 => Value::U32(0),
            Type::U64 => Value::U64(0),
            Type::F32 => Value::F32(0.0),
            Type::F64 => Value::F64(0.0),
            Type::Uuid => Value::Uuid(Uuid::nil()),
            Type::Binary => Value::Binary(Bytes::new()),
            Type::DateTime => Value::DateTime(DateTime::<Utc>::default()),
            Type::DateTimeOffset => Value::DateTimeOffset(DateTime::<FixedOffset>::default()),
            Type::Duration => Value::Duration(TimeDelta::zero()),
            Type::Enum(e) => Value::Enum(e.clone(), e.variants.first().map_or(0, |(_, d)| *d)),
            Type::List(_) => Value::List(Vec::new()),
            Type::Map(_) => Value::Map(BTreeMap::new()),
            Type::Tuple(items) => Value::Tuple(items.iter().map(Value::default_for).collect()),
            Type::Grouping(..) => Value::Grouping(Vec::new()),
            Type::Url | Type::Option(_) | Type::Record(_) | Type::Dynamic => Value::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value's variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::String(_) => "String",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Uuid(_) => "Uuid",
            Value::Url(_) => "Url",
            Value::Binary(_) => "Binary",
            Value::DateTime(_) => "DateTime<Utc>",
            Value::DateTimeOffset(_) => "DateTime<FixedOffset>",
            Value::Duration(_) => "TimeDelta",
            Value::Enum(..) => "enum",
            Value::List(_) => "Vec",
            Value::Map(_) => "BTreeMap",
            Value::Tuple(_) => "tuple",
            Value::Grouping(_) => "Grouping",
            Value::Record(_) => "record",
        }
    }

    /// The type this value would be encoded as when its static type is
    /// unknown. Containers report dynamic element types.
    pub fn runtime_type(&self) -> Type {
        match self {
            Value::Null => Type::Dynamic,
            Value::Bool(_) => Type::Bool,
            Value::Char(_) => Type::Char,
            Value::String(_) => Type::String,
            Value::I8(_) => Type::I8,
            Value::I16(_) => Type::I16,
            Value::I32(_) => Type::I32,
            Value::I64(_) => Type::I64,
            Value::U8(_) => Type::U8,
            Value::U16(_) => Type::U16,
            Value::U32(_) => Type::U32,
            Value::U64(_) => Type::U64,
            Value::F32(_) => Type::F32,
            Value::F64(_) => Type::F64,
            Value::Uuid(_) => Type::Uuid,
            Value::Url(_) => Type::Url,
            Value::Binary(_) => Type::Binary,
            Value::DateTime(_) => Type::DateTime,
            Value::DateTimeOffset(_) => Type::DateTimeOffset,
            Value::Duration(_) => Type::Duration,
            Value::Enum(e, _) => Type::Enum(e.clone()),
            Value::List(_) => Type::list(Type::Dynamic),
            Value::Map(_) => Type::map(Type::Dynamic),
            Value::Tuple(items) => Type::Tuple(items.iter().map(Value::runtime_type).collect()),
            Value::Grouping(_) => Type::grouping(Type::Dynamic, Type::Dynamic),
            Value::Record(r) => Type::Record(r.record_type().clone()),
        }
    }

    /// Numeric view used by arithmetic and comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I8(v) => Some(*v as f64),
            Value::I16(v) => Some(*v as f64),
            Value::I32(v) => Some(*v as f64),
            Value::I64(v) => Some(*v as f64),
            Value::U8(v) => Some(*v as f64),
            Value::U16(v) => Some(*v as f64),
            Value::U32(v) => Some(*v as f64),
            Value::U64(v) => Some(*v as f64),
            Value::F32(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Exact integer view; `None` for floats and non-numbers.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::I8(v) => Some(*v as i128),
            Value::I16(v) => Some(*v as i128),
            Value::I32(v) => Some(*v as i128),
            Value::I64(v) => Some(*v as i128),
            Value::U8(v) => Some(*v as i128),
            Value::U16(v) => Some(*v as i128),
            Value::U32(v) => Some(*v as i128),
            Value::U64(v) => Some(*v as i128),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Build an integer value of the given type, failing when `n` does not fit.
    pub fn integer(ty: &Type, n: i128) -> Result<Value> {
        let out_of_range = || Error::RangeOrPrecision {
            value: n as f64,
            target: ty.to_string(),
            violation: crate::error::RangeViolation::OutOfRange,
        };
        let value = match ty {
            Type::I8 => Value::I8(i8::try_from(n).map_err(|_| out_of_range())?),
            Type::I16 => Value::I16(i16::try_from(n).map_err(|_| out_of_range())?),
            Type::I32 => Value::I32(i32::try_from(n).map_err(|_| out_of_range())?),
            Type::I64 => Value::I64(i64::try_from(n).map_err(|_| out_of_range())?),
            Type::U8 => Value::U8(u8::try_from(n).map_err(|_| out_of_range())?),
            Type::U16 => Value::U16(u16::try_from(n).map_err(|_| out_of_range())?),
            Type::U32 => Value::U32(u32::try_from(n).map_err(|_| out_of_range())?),
            Type::U64 => Value::U64(u64::try_from(n).map_err(|_| out_of_range())?),
            other => return Err(Error::mismatch("integer type", other.to_string())),
        };
        Ok(value)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::I32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::I64(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::F64(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Uuid(id) => write!(f, "{}", id),
            Value::Url(url) => write!(f, "{}", url),
            Value::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::DateTimeOffset(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Duration(d) => write!(f, "{}", d),
            Value::Enum(e, d) => match e.name_of(*d) {
                Some(name) => write!(f, "{}::{}", e.name, name),
                None => write!(f, "{}({})", e.name, d),
            },
            Value::List(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_list(f, items)?;
                write!(f, ")")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Grouping(groups) => {
                write!(f, "group[")?;
                for (i, (k, v)) in groups.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} => {}", k, v)?;
                }
                write!(f, "]")
            }
            Value::Record(record) => {
                write!(f, "{} {{ ", record.ty.name)?;
                for (i, (field, v)) in record.ty.fields.iter().zip(&record.fields).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, v)?;
                }
                write!(f, " }}")
            }
            number => match number.as_i128() {
                Some(n) => write!(f, "{}", n),
                None => write!(f, "{}", number.as_f64().unwrap_or(f64::NAN)),
            },
        }
    }
}

/// An instance of a [`RecordType`]; field values are stored in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    ty: Arc<RecordType>,
    fields: Vec<Value>,
}

impl RecordValue {
    /// A record with every field at its declared default.
    pub fn new(ty: Arc<RecordType>) -> Self {
        let fields = ty.fields.iter().map(|f| f.default.clone()).collect();
        Self { ty, fields }
    }

    /// Values must be given in field declaration order.
    pub fn from_fields(ty: Arc<RecordType>, fields: Vec<Value>) -> Result<Self> {
        if fields.len() != ty.fields.len() {
            return Err(Error::InvalidArgument(format!(
                "{} has {} fields, got {} values",
                ty.name,
                ty.fields.len(),
                fields.len()
            )));
        }
        Ok(Self { ty, fields })
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.ty.field_index(field).map(|i| &self.fields[i])
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    pub fn set(&mut self, field: &str, value: Value) -> Result<()> {
        let index = self.ty.field_index(field).ok_or_else(|| {
            Error::InvalidArgument(format!("{} has no field '{}'", self.ty.name, field))
        })?;
        self.fields[index] = value;
        Ok(())
    }

    pub fn set_index(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.fields.get_mut(index) {
            *slot = value;
        }
    }

    /// Move a field's value out, leaving `Null` behind.
    pub fn take(&mut self, field: &str) -> Result<Value> {
        let index = self.ty.field_index(field).ok_or_else(|| {
            Error::InvalidArgument(format!("{} has no field '{}'", self.ty.name, field))
        })?;
        Ok(std::mem::take(&mut self.fields[index]))
    }

    pub fn values(&self) -> &[Value] {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::types::FieldDescriptor;

    #[test]
    fn test_record_defaults_and_set() {
        let ty = RecordType::declared(
            "Point",
            vec![
                FieldDescriptor::new("x", Type::I32),
                FieldDescriptor::new("label", Type::option(Type::String)),
            ],
        );
        let mut point = RecordValue::new(ty);
        assert_eq!(point.get("x"), Some(&Value::I32(0)));
        assert_eq!(point.get("label"), Some(&Value::Null));

        point.set("x", Value::I32(7)).unwrap();
        assert_eq!(point.take("x").unwrap(), Value::I32(7));
        assert!(point.set("z", Value::Null).is_err());
    }

    #[test]
    fn test_integer_construction_checks_range() {
        assert_eq!(Value::integer(&Type::I16, 300).unwrap(), Value::I16(300));
        assert!(Value::integer(&Type::U8, 300).is_err());
        assert!(Value::integer(&Type::U32, -1).is_err());
    }

    #[test]
    fn test_runtime_type_of_containers() {
        let value = Value::List(vec![Value::I32(1)]);
        assert_eq!(value.runtime_type(), Type::list(Type::Dynamic));
        assert_eq!(
            Value::Tuple(vec![Value::Bool(true), Value::from("x")]).runtime_type(),
            Type::Tuple(vec![Type::Bool, Type::String])
        );
    }
}
