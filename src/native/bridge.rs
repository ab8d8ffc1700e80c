//! `Native` implementations for the Rust types the default chain supports.

use super::types::Type;
use super::value::Value;
use super::Native;
use crate::error::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use std::collections::BTreeMap;
use url::Url;
use uuid::Uuid;

/// Grouped results: `(group key, reduction)` pairs in server order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grouping<K, V>(pub Vec<(K, V)>);

pub(crate) fn unexpected<T: Native>(value: &Value) -> Error {
    match value {
        Value::Null => Error::NullNotAllowed(T::native_type().to_string()),
        other => Error::mismatch(T::native_type().to_string(), other.kind_name()),
    }
}

macro_rules! native_scalar {
    ($($rust:ty => $variant:ident,)*) => {
        $(
            impl Native for $rust {
                fn native_type() -> Type {
                    Type::$variant
                }

                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(unexpected::<Self>(&other)),
                    }
                }
            }
        )*
    };
}

native_scalar! {
    bool => Bool,
    char => Char,
    String => String,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Uuid => Uuid,
    Url => Url,
    Bytes => Binary,
    DateTime<Utc> => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    TimeDelta => Duration,
}

impl Native for Value {
    fn native_type() -> Type {
        Type::Dynamic
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: Native> Native for Option<T> {
    fn native_type() -> Type {
        Type::option(T::native_type())
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Native> Native for Vec<T> {
    fn native_type() -> Type {
        Type::list(T::native_type())
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(Native::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

impl<T: Native> Native for BTreeMap<String, T> {
    fn native_type() -> Type {
        Type::map(T::native_type())
    }

    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

impl<K: Native, V: Native> Native for Grouping<K, V> {
    fn native_type() -> Type {
        Type::grouping(K::native_type(), V::native_type())
    }

    fn to_value(&self) -> Value {
        Value::Grouping(
            self.0
                .iter()
                .map(|(k, v)| (k.to_value(), v.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Grouping(groups) => groups
                .into_iter()
                .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
                .collect::<Result<Vec<_>>>()
                .map(Grouping),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}

macro_rules! native_tuple {
    ($len:literal; $($name:ident $idx:tt),+) => {
        impl<$($name: Native),+> Native for ($($name,)+) {
            fn native_type() -> Type {
                Type::Tuple(vec![$($name::native_type()),+])
            }

            fn to_value(&self) -> Value {
                Value::Tuple(vec![$(self.$idx.to_value()),+])
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Tuple(items) if items.len() == $len => {
                        let mut items = items.into_iter();
                        Ok(($($name::from_value(items.next().unwrap_or_default())?,)+))
                    }
                    other => Err(unexpected::<Self>(&other)),
                }
            }
        }
    };
}

native_tuple!(2; A 0, B 1);
native_tuple!(3; A 0, B 1, C 2);
native_tuple!(4; A 0, B 1, C 2, D 3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_uses_null_for_none() {
        assert_eq!(None::<i32>.to_value(), Value::Null);
        assert_eq!(Option::<i32>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::from_value(Value::I32(4)).unwrap(), Some(4));
    }

    #[test]
    fn test_non_option_rejects_null() {
        assert!(matches!(
            i32::from_value(Value::Null),
            Err(Error::NullNotAllowed(_))
        ));
        assert!(matches!(
            Vec::<String>::from_value(Value::Null),
            Err(Error::NullNotAllowed(_))
        ));
    }

    #[test]
    fn test_tuple_bridge() {
        let pair = (1u8, "x".to_string());
        assert_eq!(<(u8, String)>::native_type(), Type::Tuple(vec![Type::U8, Type::String]));
        let back = <(u8, String)>::from_value(pair.to_value()).unwrap();
        assert_eq!(back, pair);
        assert!(<(u8, String, bool)>::from_value(pair.to_value()).is_err());
    }
}
