//! Datum Conversion Engine.
//!
//! A chain of factories resolves a native [`Type`] into a bidirectional
//! [`DatumConverter`]. Resolution always carries the *root* factory so that
//! composite converters (lists, maps, records, ...) resolve their children
//! through the full chain, including any user factories placed in front of
//! the defaults.
//!
//! # Architecture
//!
//! 1. **Leaf converters** (`primitive.rs`, `time.rs`, `binary.rs`)
//! 2. **Composite converters** (`collection.rs`, `tuple.rs`, `record.rs`)
//! 3. **Dynamic inference** (`dynamic.rs`) for values with no static type
//! 4. **Chain + cache** (`factory.rs`) and the [`DatumEngine`] façade
//!
//! # Example
//!
//! ```rust
//! use reql_core::{DatumEngine, Datum};
//!
//! let engine = DatumEngine::default();
//! assert_eq!(engine.encode(&42u16).unwrap(), Datum::Number(42.0));
//! assert!(engine.decode::<u8>(&Datum::Number(300.0)).is_err());
//! ```

pub mod binary;
pub mod collection;
pub mod dynamic;
pub mod engine;
pub mod factory;
pub mod primitive;
pub mod record;
pub mod time;
pub mod tuple;

pub use dynamic::infer_type;
pub use engine::{DatumEngine, DatumEngineBuilder};
pub use factory::{AggregateDatumConverterFactory, CachedDatumConverterFactory};

use crate::error::{Error, Result};
use crate::native::{Type, Value};
use crate::reql::Datum;
use std::fmt;
use std::sync::Arc;

/// Paired encode/decode functions for exactly one native type.
///
/// Converters are immutable once built and shared through the engine cache.
pub trait DatumConverter: Send + Sync + fmt::Debug {
    /// The native type this converter handles.
    fn native_type(&self) -> &Type;

    fn to_datum(&self, value: &Value) -> Result<Datum>;

    fn from_datum(&self, datum: &Datum) -> Result<Value>;

    /// Member-to-wire-name translation, for structural converters only.
    fn field_names(&self) -> Option<&dyn FieldNameMapping> {
        None
    }
}

/// Translates a native member name into the wire field it is stored under.
pub trait FieldNameMapping {
    fn datum_field_name(&self, member: &str) -> Option<&str>;
}

/// One link of the resolution chain.
pub trait DatumConverterFactory: Send + Sync {
    /// Produce a converter for `ty`, or `Ok(None)` when this factory does not
    /// handle it. Child types must be resolved through `root`.
    fn try_get(
        &self,
        ty: &Type,
        root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>>;
}

/// Resolve `ty` through `root`, failing with `ConversionNotSupported`.
pub fn resolve(
    root: &Arc<dyn DatumConverterFactory>,
    ty: &Type,
) -> Result<Arc<dyn DatumConverter>> {
    root.try_get(ty, root)?
        .ok_or_else(|| Error::ConversionNotSupported(ty.to_string()))
}

/// Shared rejection for a `Null` datum or value on a non-nullable converter.
pub(crate) fn null_not_allowed(ty: &Type) -> Error {
    Error::NullNotAllowed(ty.to_string())
}

/// Shared rejection for a value of the wrong native variant.
pub(crate) fn value_mismatch(ty: &Type, value: &Value) -> Error {
    match value {
        Value::Null => null_not_allowed(ty),
        other => Error::mismatch(ty.to_string(), other.kind_name()),
    }
}

/// Shared rejection for a datum with the wrong wire tag.
pub(crate) fn datum_mismatch(ty: &Type, expected: &str, datum: &Datum) -> Error {
    match datum {
        Datum::Null => null_not_allowed(ty),
        other => Error::mismatch(expected, other.type_name()),
    }
}
