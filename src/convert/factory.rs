//! Chain composition and the per-type converter cache.

use super::binary::BinaryDatumConverterFactory;
use super::collection::{
    GroupingDatumConverterFactory, ListDatumConverterFactory, MapDatumConverterFactory,
    NullableDatumConverterFactory,
};
use super::dynamic::DynamicDatumConverterFactory;
use super::primitive::{
    EnumDatumConverterFactory, IdentifierDatumConverterFactory, PrimitiveDatumConverterFactory,
};
use super::record::{AnonymousRecordDatumConverterFactory, DeclaredRecordDatumConverterFactory};
use super::time::TimeDatumConverterFactory;
use super::tuple::TupleDatumConverterFactory;
use super::{DatumConverter, DatumConverterFactory};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::native::Type;
use dashmap::DashMap;
use std::sync::Arc;

/// Consults its members in order; the first one that answers wins.
#[derive(Default)]
pub struct AggregateDatumConverterFactory {
    factories: Vec<Arc<dyn DatumConverterFactory>>,
}

impl AggregateDatumConverterFactory {
    pub fn new(factories: Vec<Arc<dyn DatumConverterFactory>>) -> Self {
        Self { factories }
    }

    /// The default chain, configured from `config`.
    pub fn defaults(config: &EngineConfig) -> Self {
        Self::new(default_chain(config))
    }

    /// Put `factory` in front of every existing member.
    pub fn prepend(&mut self, factory: Arc<dyn DatumConverterFactory>) {
        self.factories.insert(0, factory);
    }

    pub fn push(&mut self, factory: Arc<dyn DatumConverterFactory>) {
        self.factories.push(factory);
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl DatumConverterFactory for AggregateDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        for factory in &self.factories {
            if let Some(converter) = factory.try_get(ty, root)? {
                return Ok(Some(converter));
            }
        }
        Ok(None)
    }
}

/// Memoizes converters per type.
///
/// Converters are built outside the map's locks, so a composite resolving its
/// children through this same cache never deadlocks. Two threads racing on
/// the same type may both build; the first insert wins and both callers get
/// that converter.
pub struct CachedDatumConverterFactory {
    inner: Arc<dyn DatumConverterFactory>,
    cache: DashMap<Type, Arc<dyn DatumConverter>>,
}

impl CachedDatumConverterFactory {
    pub fn new(inner: Arc<dyn DatumConverterFactory>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

impl DatumConverterFactory for CachedDatumConverterFactory {
    fn try_get(
        &self,
        ty: &Type,
        root: &Arc<dyn DatumConverterFactory>,
    ) -> Result<Option<Arc<dyn DatumConverter>>> {
        if let Some(hit) = self.cache.get(ty) {
            tracing::trace!(native_type = %ty, "datum converter cache hit");
            return Ok(Some(hit.value().clone()));
        }

        let Some(built) = self.inner.try_get(ty, root)? else {
            return Ok(None);
        };
        tracing::debug!(native_type = %ty, "built datum converter");
        let converter = self.cache.entry(ty.clone()).or_insert(built).value().clone();
        Ok(Some(converter))
    }
}

/// The default factories in resolution order.
pub fn default_chain(config: &EngineConfig) -> Vec<Arc<dyn DatumConverterFactory>> {
    vec![
        Arc::new(PrimitiveDatumConverterFactory),
        Arc::new(EnumDatumConverterFactory::new(config.enum_encoding)),
        Arc::new(IdentifierDatumConverterFactory),
        Arc::new(TimeDatumConverterFactory::new(config.time_precision_millis)),
        Arc::new(BinaryDatumConverterFactory),
        Arc::new(NullableDatumConverterFactory),
        Arc::new(ListDatumConverterFactory),
        Arc::new(MapDatumConverterFactory),
        Arc::new(GroupingDatumConverterFactory),
        Arc::new(TupleDatumConverterFactory::new(config.tuple_encoding)),
        Arc::new(AnonymousRecordDatumConverterFactory),
        Arc::new(DeclaredRecordDatumConverterFactory),
        Arc::new(DynamicDatumConverterFactory),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::resolve;
    use crate::reql::Datum;
    use crate::native::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Shouting;

    impl DatumConverter for Shouting {
        fn native_type(&self) -> &Type {
            static TYPE: Type = Type::String;
            &TYPE
        }

        fn to_datum(&self, value: &Value) -> Result<Datum> {
            Ok(Datum::String(value.as_str().unwrap_or_default().to_uppercase()))
        }

        fn from_datum(&self, datum: &Datum) -> Result<Value> {
            Ok(Value::from(datum.as_string().unwrap_or_default().to_lowercase()))
        }
    }

    #[derive(Default)]
    struct CountingStrings {
        calls: AtomicUsize,
    }

    impl DatumConverterFactory for CountingStrings {
        fn try_get(
            &self,
            ty: &Type,
            _root: &Arc<dyn DatumConverterFactory>,
        ) -> Result<Option<Arc<dyn DatumConverter>>> {
            if *ty != Type::String {
                return Ok(None);
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Arc::new(Shouting)))
        }
    }

    fn root_with(front: Arc<dyn DatumConverterFactory>) -> Arc<dyn DatumConverterFactory> {
        let mut chain = AggregateDatumConverterFactory::defaults(&EngineConfig::default());
        chain.prepend(front);
        Arc::new(CachedDatumConverterFactory::new(Arc::new(chain)))
    }

    #[test]
    fn test_first_match_wins_and_children_use_root() {
        let root = root_with(Arc::new(CountingStrings::default()));
        let list = resolve(&root, &Type::list(Type::String)).unwrap();
        let datum = list
            .to_datum(&Value::List(vec![Value::from("hi")]))
            .unwrap();
        assert_eq!(datum, Datum::Array(vec![Datum::from("HI")]));
    }

    #[test]
    fn test_cache_builds_once() {
        let counting = Arc::new(CountingStrings::default());
        let root = root_with(counting.clone());
        let a = resolve(&root, &Type::String).unwrap();
        let b = resolve(&root, &Type::String).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_resolution_shares_one_converter() {
        let root = root_with(Arc::new(CountingStrings::default()));
        let ty = Type::list(Type::map(Type::String));

        let resolved: Vec<Arc<dyn DatumConverter>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| resolve(&root, &ty).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let first = &resolved[0];
        assert!(resolved.iter().all(|c| Arc::ptr_eq(c, first)));
        assert!(Arc::ptr_eq(&resolve(&root, &ty).unwrap(), first));

        let value = Value::List(vec![Value::Map(
            [("k".to_string(), Value::from("v"))].into_iter().collect(),
        )]);
        assert_eq!(
            first.to_datum(&value).unwrap(),
            Datum::Array(vec![Datum::object([("k", Datum::from("V"))])])
        );
    }

    #[test]
    fn test_unresolvable_type() {
        let root: Arc<dyn DatumConverterFactory> =
            Arc::new(AggregateDatumConverterFactory::new(vec![]));
        assert!(matches!(
            resolve(&root, &Type::Bool),
            Err(crate::error::Error::ConversionNotSupported(_))
        ));
    }
}
