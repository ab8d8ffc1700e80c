//! Nullable wrappers, lists, string-keyed maps and grouped data.
//!
//! Every composite resolves its element converters through the root factory
//! when it is built, so user factories in front of the chain apply to
//! elements too.

use super::{datum_mismatch, resolve, value_mismatch, DatumConverter, DatumConverterFactory};
use crate::error::{Error, Result};
use crate::native::{Type, Value};
use crate::reql::{Datum, PSEUDO_GROUPED_DATA, REQL_TYPE_KEY};
use std::collections::BTreeMap;
use std::sync::Arc;

/// `Option<T>`: `Null` is absence, anything else goes to the inner converter.
#[derive(Debug)]
pub struct NullableDatumConverter {
    ty: Type,
    inner: Arc<dyn DatumConverter>,
}

impl DatumConverter for NullableDatumConverter {
    fn native_type(&self) -> &Type {
        &self.ty
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        match value {
            Value::Null => Ok(Datum::Null),
            other => self.inner.to_datum(other),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        match datum {
            Datum::Null => Ok(Value::Null),
            other => self.inner.from_datum(other),
        }
    }
}

#[derive(Debug)]
pub struct ListDatumConverter {
    ty: Type,
    element: Arc<dyn DatumConverter>,
}

impl DatumConverter for ListDatumConverter {
    fn native_type(&self) -> &Type {
        &self.ty
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        match value {
            Value::List(items) => items
                .iter()
                .map(|item| self.element.to_datum(item))
                .collect::<Result<Vec<_>>>()
                .map(Datum::Array),
            Value::Null => Ok(Datum::Null),
            other => Err(value_mismatch(&self.ty, other)),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        match datum {
            Datum::Array(items) => items
                .iter()
                .map(|item| self.element.from_datum(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Datum::Null => Ok(Value::Null),
            other => Err(Error::mismatch("ARRAY", other.type_name())),
        }
    }
}

/// String-keyed maps travel as plain Objects.
#[derive(Debug)]
pub struct MapDatumConverter {
    ty: Type,
    value: Arc<dyn DatumConverter>,
}

impl DatumConverter for MapDatumConverter {
    fn native_type(&self) -> &Type {
        &self.ty
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        match value {
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.value.to_datum(v)?)))
                .collect::<Result<Vec<_>>>()
                .map(Datum::Object),
            Value::Null => Ok(Datum::Null),
            other => Err(value_mismatch(&self.ty, other)),
        }
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        let entries = match datum {
            Datum::Null => return Ok(Value::Null),
            Datum::Object(_) if datum.reql_type().is_some() => {
                return Err(Error::mismatch("OBJECT", datum.type_name()))
            }
            Datum::Object(entries) => entries,
            other => return Err(Error::mismatch("OBJECT", other.type_name())),
        };

        let mut map = BTreeMap::new();
        for (key, item) in entries {
            if map.insert(key.clone(), self.value.from_datum(item)?).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "duplicate key '{}' in object",
                    key
                )));
            }
        }
        Ok(Value::Map(map))
    }
}

/// GROUPED_DATA: `{"$reql_type$":"GROUPED_DATA","data":[[key, reduction], ...]}`.
#[derive(Debug)]
pub struct GroupingDatumConverter {
    ty: Type,
    key: Arc<dyn DatumConverter>,
    value: Arc<dyn DatumConverter>,
}

impl GroupingDatumConverter {
    fn decode_pair(&self, pair: &Datum) -> Result<(Value, Value)> {
        match pair.as_array() {
            Some([key, value]) => Ok((self.key.from_datum(key)?, self.value.from_datum(value)?)),
            _ => Err(Error::mismatch("[group, reduction] pair", pair.to_string())),
        }
    }
}

impl DatumConverter for GroupingDatumConverter {
    fn native_type(&self) -> &Type {
        &self.ty
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        let groups = match value {
            Value::Grouping(groups) => groups,
            Value::Null => return Ok(Datum::Null),
            other => return Err(value_mismatch(&self.ty, other)),
        };
        let data = groups
            .iter()
            .map(|(k, v)| Ok(Datum::Array(vec![self.key.to_datum(k)?, self.value.to_datum(v)?])))
            .collect::<Result<Vec<_>>>()?;
        Ok(Datum::object([
            (REQL_TYPE_KEY, Datum::from(PSEUDO_GROUPED_DATA)),
            ("data", Datum::Array(data)),
        ]))
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        if datum.is_null() {
            return Ok(Value::Null);
        }
        if datum.reql_type() != Some(PSEUDO_GROUPED_DATA) {
            return Err(datum_mismatch(&self.ty, "PTYPE<GROUPED_DATA>", datum));
        }
        let pairs = datum
            .get("data")
            .and_then(Datum::as_array)
            .ok_or_else(|| Error::mismatch("GROUPED_DATA with array data", datum.to_string()))?;
        pairs
            .iter()
            .map(|pair| self.decode_pair(pair))
            .collect::<Result<Vec<_>>>()
            .map(Value::Grouping)
    }
}

#[derive(Debug, Default)]
pub struct NullableDatumConverterFactory;

impl DatumConverterFactory for NullableDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        match ty {
            Type::Option(inner) => Ok(Some(Arc::new(NullableDatumConverter {
                ty: ty.clone(),
                inner: resolve(root, inner)?,
            }))),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
pub struct ListDatumConverterFactory;

impl DatumConverterFactory for ListDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        match ty {
            Type::List(element) => Ok(Some(Arc::new(ListDatumConverter {
                ty: ty.clone(),
                element: resolve(root, element)?,
            }))),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
pub struct MapDatumConverterFactory;

impl DatumConverterFactory for MapDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        match ty {
            Type::Map(value) => Ok(Some(Arc::new(MapDatumConverter {
                ty: ty.clone(),
                value: resolve(root, value)?,
            }))),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Default)]
pub struct GroupingDatumConverterFactory;

impl DatumConverterFactory for GroupingDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        match ty {
            Type::Grouping(key, value) => Ok(Some(Arc::new(GroupingDatumConverter {
                ty: ty.clone(),
                key: resolve(root, key)?,
                value: resolve(root, value)?,
            }))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::DatumEngine;

    fn converter(ty: Type) -> Arc<dyn DatumConverter> {
        DatumEngine::default().resolve(&ty).unwrap()
    }

    #[test]
    fn test_list_of_nullable() {
        let list = converter(Type::list(Type::option(Type::I32)));
        let datum = Datum::Array(vec![Datum::Number(1.0), Datum::Null]);
        let value = list.from_datum(&datum).unwrap();
        assert_eq!(value, Value::List(vec![Value::I32(1), Value::Null]));
        assert_eq!(list.to_datum(&value).unwrap(), datum);
    }

    #[test]
    fn test_list_rejects_null_element() {
        let list = converter(Type::list(Type::I32));
        assert!(matches!(
            list.from_datum(&Datum::Array(vec![Datum::Null])),
            Err(Error::NullNotAllowed(_))
        ));
        assert_eq!(list.from_datum(&Datum::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_map_from_object() {
        let map = converter(Type::map(Type::String));
        let datum = Datum::object([("b", Datum::from("2")), ("a", Datum::from("1"))]);
        let Value::Map(entries) = map.from_datum(&datum).unwrap() else {
            panic!("expected a map");
        };
        assert_eq!(entries.keys().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn test_map_rejects_duplicates_and_pseudo_types() {
        let map = converter(Type::map(Type::I32));
        let dup = Datum::Object(vec![
            ("a".into(), Datum::Number(1.0)),
            ("a".into(), Datum::Number(2.0)),
        ]);
        assert!(matches!(map.from_datum(&dup), Err(Error::InvalidArgument(_))));

        let time = Datum::object([
            (REQL_TYPE_KEY, Datum::from("TIME")),
            ("epoch_time", Datum::Number(0.0)),
        ]);
        assert!(matches!(map.from_datum(&time), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_grouped_data() {
        let grouping = converter(Type::grouping(Type::String, Type::I64));
        let datum = Datum::object([
            (REQL_TYPE_KEY, Datum::from(PSEUDO_GROUPED_DATA)),
            (
                "data",
                Datum::Array(vec![
                    Datum::Array(vec![Datum::from("a"), Datum::Number(3.0)]),
                    Datum::Array(vec![Datum::from("b"), Datum::Number(5.0)]),
                ]),
            ),
        ]);
        let value = grouping.from_datum(&datum).unwrap();
        assert_eq!(
            value,
            Value::Grouping(vec![
                (Value::from("a"), Value::I64(3)),
                (Value::from("b"), Value::I64(5)),
            ])
        );
        assert_eq!(grouping.to_datum(&value).unwrap(), datum);
    }

    #[test]
    fn test_grouped_data_rejects_bad_pairs() {
        let grouping = converter(Type::grouping(Type::String, Type::I64));
        let datum = Datum::object([
            (REQL_TYPE_KEY, Datum::from(PSEUDO_GROUPED_DATA)),
            ("data", Datum::Array(vec![Datum::Array(vec![Datum::from("a")])])),
        ]);
        assert!(grouping.from_datum(&datum).is_err());
    }
}
