//! Engine configuration.
//!
//! Settings are read from an optional TOML file and then overridden by
//! `REQL_*` environment variables, e.g. `REQL_ENUM_ENCODING=name`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How enum values travel on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumEncoding {
    /// The variant's discriminant as a Number
    #[default]
    Numeric,
    /// The variant's name as a String
    Name,
}

/// Conversion and compilation settings shared by a [`crate::DatumEngine`]
/// and every compiler built on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub enum_encoding: EnumEncoding,
    /// Encode tuples as positional arrays. Decoding from arrays is always on.
    pub tuple_encoding: bool,
    /// Fold parameter-free subtrees on the client when no translation exists.
    pub client_side_evaluation: bool,
    /// Round TIME values to whole milliseconds.
    pub time_precision_millis: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enum_encoding: EnumEncoding::Numeric,
            tuple_encoding: false,
            client_side_evaluation: true,
            time_precision_millis: true,
        }
    }
}

impl EngineConfig {
    /// Environment variable prefix.
    pub const ENV_PREFIX: &'static str = "REQL";

    /// Load from `path` (if given and present) layered under the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let loaded: Self = settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;
        tracing::debug!(?loaded, "engine configuration loaded");
        Ok(loaded)
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_enum_encoding(mut self, encoding: EnumEncoding) -> Self {
        self.enum_encoding = encoding;
        self
    }

    pub fn with_tuple_encoding(mut self, enabled: bool) -> Self {
        self.tuple_encoding = enabled;
        self
    }

    pub fn with_client_side_evaluation(mut self, enabled: bool) -> Self {
        self.client_side_evaluation = enabled;
        self
    }

    pub fn with_time_precision_millis(mut self, enabled: bool) -> Self {
        self.time_precision_millis = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.enum_encoding, EnumEncoding::Numeric);
        assert!(!config.tuple_encoding);
        assert!(config.client_side_evaluation);
        assert!(config.time_precision_millis);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml("enum_encoding = \"name\"\n").unwrap();
        assert_eq!(config.enum_encoding, EnumEncoding::Name);
        assert!(config.client_side_evaluation);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = EngineConfig::default()
            .with_tuple_encoding(true)
            .with_enum_encoding(EnumEncoding::Name);
        let text = config.to_toml().unwrap();
        assert!(text.contains("tuple_encoding = true"));
        assert_eq!(EngineConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            EngineConfig::from_toml("enum_encoding = \"roman\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let config = EngineConfig::load(Some(Path::new("/nonexistent/reql.toml"))).unwrap();
        assert_eq!(config.enum_encoding, EnumEncoding::Numeric);
    }
}
