// ReQL driver core - Rust Implementation
// Datum conversion and query-expression compilation for a RethinkDB client

#![warn(rust_2018_idioms)]

pub mod config;
pub mod convert;
pub mod native;
pub mod query;
pub mod reql;

// Re-exports for convenience
pub use config::EngineConfig;
pub use convert::{DatumConverter, DatumConverterFactory, DatumEngine, FieldNameMapping};
pub use native::{Native, Type, TypeKey, Value};
pub use query::{Expr, Lambda, Parameter, QueryCompiler};
pub use reql::{Datum, Term, TermType};

/// Driver core error types
pub mod error {
    use thiserror::Error;

    /// Why a number could not be narrowed into its target type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RangeViolation {
        OutOfRange,
        Fractional,
    }

    impl std::fmt::Display for RangeViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                RangeViolation::OutOfRange => write!(f, "out of range"),
                RangeViolation::Fractional => write!(f, "has a fractional part"),
            }
        }
    }

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("No datum converter available for type {0}")]
        ConversionNotSupported(String),

        #[error("Type mismatch: expected {expected}, got {actual}")]
        TypeMismatch { expected: String, actual: String },

        #[error("Number {value} {violation} for {target}")]
        RangeOrPrecision {
            value: f64,
            target: String,
            violation: RangeViolation,
        },

        #[error("Null is not allowed for {0}")]
        NullNotAllowed(String),

        #[error("Heterogeneous array not supported: element types {0}")]
        HeterogeneousArray(String),

        #[error("Unrecognized $reql_type$: {0}")]
        UnrecognizedExtendedType(String),

        #[error("Cannot translate expression: {0}")]
        TranslationUnsupported(String),

        #[error("Cannot translate: expression references a server-bound variable ({0})")]
        ServerVariableLeak(String),

        #[error("Evaluation error: {0}")]
        Evaluation(String),

        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        #[error("Wire format error: {0}")]
        Wire(String),

        #[error("Configuration error: {0}")]
        Config(String),
    }

    impl Error {
        pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
            Error::TypeMismatch {
                expected: expected.into(),
                actual: actual.into(),
            }
        }

        /// Schema/programming errors that must abort query construction.
        pub fn is_fatal(&self) -> bool {
            matches!(
                self,
                Error::ConversionNotSupported(_) | Error::TranslationUnsupported(_)
            )
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::error::{Error, RangeViolation};

    #[test]
    fn test_fatal_errors() {
        assert!(Error::ConversionNotSupported("Foo".into()).is_fatal());
        assert!(Error::TranslationUnsupported("x".into()).is_fatal());
        assert!(!Error::NullNotAllowed("i32".into()).is_fatal());
    }

    #[test]
    fn test_range_error_message() {
        let err = Error::RangeOrPrecision {
            value: 300.0,
            target: "u8".into(),
            violation: RangeViolation::OutOfRange,
        };
        assert_eq!(err.to_string(), "Number 300 out of range for u8");
    }
}
