//! The conversion façade: a cached root chain plus its configuration.

use super::factory::{default_chain, AggregateDatumConverterFactory, CachedDatumConverterFactory};
use super::{resolve, DatumConverter, DatumConverterFactory};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::native::{Native, Type, Value};
use crate::reql::Datum;
use std::sync::Arc;
use tracing::instrument;

/// Encodes native values to datums and back.
///
/// Cheap to clone; clones share one converter cache.
#[derive(Clone)]
pub struct DatumEngine {
    root: Arc<dyn DatumConverterFactory>,
    config: Arc<EngineConfig>,
}

impl DatumEngine {
    /// The default chain configured from `config`.
    pub fn new(config: EngineConfig) -> Self {
        Self::builder().with_config(config).build()
    }

    pub fn builder() -> DatumEngineBuilder {
        DatumEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The root factory every converter resolves its children through.
    pub fn root(&self) -> &Arc<dyn DatumConverterFactory> {
        &self.root
    }

    #[instrument(level = "trace", skip_all, fields(native_type = %ty))]
    pub fn resolve(&self, ty: &Type) -> Result<Arc<dyn DatumConverter>> {
        resolve(&self.root, ty)
    }

    pub fn encode<T: Native>(&self, value: &T) -> Result<Datum> {
        self.encode_value(&T::native_type(), &value.to_value())
    }

    pub fn decode<T: Native>(&self, datum: &Datum) -> Result<T> {
        T::from_value(self.decode_value(&T::native_type(), datum)?)
    }

    #[instrument(level = "trace", skip(self, value), fields(native_type = %ty))]
    pub fn encode_value(&self, ty: &Type, value: &Value) -> Result<Datum> {
        self.resolve(ty)?.to_datum(value)
    }

    #[instrument(level = "trace", skip(self, datum), fields(native_type = %ty))]
    pub fn decode_value(&self, ty: &Type, datum: &Datum) -> Result<Value> {
        self.resolve(ty)?.from_datum(datum)
    }

    /// Wire name of `member` on record type `T`.
    pub fn field_name<T: Native>(&self, member: &str) -> Result<String> {
        self.field_name_of(&T::native_type(), member)
    }

    /// Wire name of `member` on `ty`; fails when `ty` has no field mapping or
    /// no such member.
    pub fn field_name_of(&self, ty: &Type, member: &str) -> Result<String> {
        let converter = self.resolve(ty)?;
        let names = converter.field_names().ok_or_else(|| {
            Error::InvalidArgument(format!("{} has no field name mapping", ty))
        })?;
        names
            .datum_field_name(member)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidArgument(format!("{} has no member '{}'", ty, member)))
    }
}

impl Default for DatumEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for DatumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatumEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`DatumEngine`]. User factories are consulted before the
/// chain, in the order they were added.
#[derive(Default)]
pub struct DatumEngineBuilder {
    config: EngineConfig,
    front: Vec<Arc<dyn DatumConverterFactory>>,
    chain: Option<Vec<Arc<dyn DatumConverterFactory>>>,
}

impl DatumEngineBuilder {
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a factory ahead of the chain.
    pub fn with_factory(mut self, factory: Arc<dyn DatumConverterFactory>) -> Self {
        self.front.push(factory);
        self
    }

    /// Replace the default chain entirely.
    pub fn with_chain(mut self, chain: Vec<Arc<dyn DatumConverterFactory>>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn build(self) -> DatumEngine {
        let chain = self.chain.unwrap_or_else(|| default_chain(&self.config));
        let mut factories = self.front;
        factories.extend(chain);

        let aggregate = AggregateDatumConverterFactory::new(factories);
        DatumEngine {
            root: Arc::new(CachedDatumConverterFactory::new(Arc::new(aggregate))),
            config: Arc::new(self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnumEncoding;
    use crate::native::{FieldDescriptor, RecordType};
    use chrono::{DateTime, Utc};
    use std::collections::BTreeMap;

    crate::datum_enum! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Color {
            Red = 1,
            Green = 2,
        }
    }

    #[test]
    fn test_typed_roundtrip() {
        let engine = DatumEngine::default();
        let mut scores = BTreeMap::new();
        scores.insert("a".to_string(), vec![Some(1u32), None]);
        let datum = engine.encode(&scores).unwrap();
        assert_eq!(engine.decode::<BTreeMap<String, Vec<Option<u32>>>>(&datum).unwrap(), scores);
    }

    #[test]
    fn test_enum_encoding_follows_config() {
        let numeric = DatumEngine::default();
        assert_eq!(numeric.encode(&Color::Green).unwrap(), Datum::Number(2.0));

        let named = DatumEngine::new(EngineConfig::default().with_enum_encoding(EnumEncoding::Name));
        assert_eq!(named.encode(&Color::Green).unwrap(), Datum::from("Green"));
        assert_eq!(named.decode::<Color>(&Datum::from("Red")).unwrap(), Color::Red);
    }

    #[test]
    fn test_time_roundtrip_through_engine() {
        let engine = DatumEngine::default();
        let now = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap();
        let datum = engine.encode(&now).unwrap();
        assert_eq!(datum.reql_type(), Some("TIME"));
        assert_eq!(engine.decode::<DateTime<Utc>>(&datum).unwrap(), now);
    }

    #[test]
    fn test_field_name_of() {
        let engine = DatumEngine::default();
        let ty = Type::Record(RecordType::declared(
            "Doc",
            vec![FieldDescriptor::new("id", Type::String).wire_name("_id")],
        ));
        assert_eq!(engine.field_name_of(&ty, "id").unwrap(), "_id");
        assert!(engine.field_name_of(&ty, "other").is_err());
        assert!(engine.field_name_of(&Type::I32, "id").is_err());
    }

    #[test]
    fn test_empty_chain_supports_nothing() {
        let engine = DatumEngine::builder().with_chain(vec![]).build();
        assert!(matches!(
            engine.encode(&true),
            Err(Error::ConversionNotSupported(_))
        ));
    }
}
