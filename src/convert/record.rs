//! Records: declared structs and anonymous shapes, both as Objects.
//!
//! Declared records carry explicit wire names and per-field emit policies.
//! Anonymous records use member names verbatim and always emit every field.
//! Unknown Object keys are ignored on decode; missing ones keep the field's
//! default.

use super::{resolve, value_mismatch, DatumConverter, DatumConverterFactory, FieldNameMapping};
use crate::error::{Error, Result};
use crate::native::{FieldDescriptor, RecordKind, RecordType, RecordValue, Type, Value};
use crate::reql::Datum;
use std::sync::Arc;

#[derive(Debug)]
pub struct RecordDatumConverter {
    ty: Type,
    record: Arc<RecordType>,
    fields: Vec<Arc<dyn DatumConverter>>,
}

impl RecordDatumConverter {
    fn build(ty: &Type, record: &Arc<RecordType>, root: &Arc<dyn DatumConverterFactory>) -> Result<Self> {
        let fields = record
            .fields
            .iter()
            .map(|field| resolve(root, &field.ty))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            ty: ty.clone(),
            record: record.clone(),
            fields,
        })
    }

    fn emits(field: &FieldDescriptor, value: &Value) -> bool {
        field.emit_default || *value != field.default
    }
}

impl DatumConverter for RecordDatumConverter {
    fn native_type(&self) -> &Type {
        &self.ty
    }

    fn to_datum(&self, value: &Value) -> Result<Datum> {
        let record = match value {
            Value::Record(record) if **record.record_type() == *self.record => record,
            Value::Null => return Ok(Datum::Null),
            other => return Err(value_mismatch(&self.ty, other)),
        };

        let mut members = Vec::with_capacity(self.fields.len());
        for ((field, converter), value) in self
            .record
            .fields
            .iter()
            .zip(&self.fields)
            .zip(record.values())
        {
            if Self::emits(field, value) {
                members.push((field.wire_name.clone(), converter.to_datum(value)?));
            }
        }
        Ok(Datum::Object(members))
    }

    fn from_datum(&self, datum: &Datum) -> Result<Value> {
        let members = match datum {
            Datum::Null => return Ok(Value::Null),
            Datum::Object(_) if datum.reql_type().is_some() => {
                return Err(Error::mismatch(
                    format!("OBJECT for {}", self.record.name),
                    datum.type_name(),
                ))
            }
            Datum::Object(members) => members,
            other => return Err(Error::mismatch("OBJECT", other.type_name())),
        };

        let mut record = RecordValue::new(self.record.clone());
        for (key, item) in members {
            if let Some((index, _)) = self.record.field_by_wire_name(key) {
                record.set_index(index, self.fields[index].from_datum(item)?);
            }
        }
        Ok(Value::Record(record))
    }

    fn field_names(&self) -> Option<&dyn FieldNameMapping> {
        Some(self)
    }
}

impl FieldNameMapping for RecordDatumConverter {
    fn datum_field_name(&self, member: &str) -> Option<&str> {
        self.record.field(member).map(|f| f.wire_name.as_str())
    }
}

/// Records declared with [`crate::datum_record!`] or [`RecordType::declared`].
#[derive(Debug, Default)]
pub struct DeclaredRecordDatumConverterFactory;

impl DatumConverterFactory for DeclaredRecordDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        match ty {
            Type::Record(record) if record.kind == RecordKind::Declared => {
                Ok(Some(Arc::new(RecordDatumConverter::build(ty, record, root)?)))
            }
            _ => Ok(None),
        }
    }
}

/// Shapes built by [`RecordType::anonymous`], typically from projections.
#[derive(Debug, Default)]
pub struct AnonymousRecordDatumConverterFactory;

impl DatumConverterFactory for AnonymousRecordDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        match ty {
            Type::Record(record) if record.kind == RecordKind::Anonymous => {
                Ok(Some(Arc::new(RecordDatumConverter::build(ty, record, root)?)))
            }
            _ => Ok(None),
        }
    }
}
