//! Compiler configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sql::DialectKind;

/// Configuration for the search compiler.
///
/// # Examples
///
/// ```
/// use helios_search_sql::config::SearchConfig;
/// use helios_search_sql::sql::DialectKind;
///
/// let config = SearchConfig::from_json(r#"{"dialect": "postgres", "max_page_size": 500}"#).unwrap();
/// assert_eq!(config.dialect, DialectKind::Postgres);
/// assert_eq!(config.max_page_size, 500);
/// assert_eq!(config.default_page_size, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// SQL dialect to render.
    pub dialect: DialectKind,

    /// Page size when the request does not give one.
    pub default_page_size: u32,

    /// Largest page size honored.
    pub max_page_size: u32,

    /// Row limit for `_include` and `_revinclude` queries.
    pub max_include_count: u32,

    /// Longest forward or reverse chain accepted.
    pub max_chain_depth: usize,

    /// Opaque optimizer hint, emitted by dialects that support hints.
    pub optimizer_hint: Option<String>,

    /// Resource types searched by whole-system queries; empty means all
    /// registered types.
    pub whole_system_types: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::Derby,
            default_page_size: 10,
            max_page_size: 1000,
            max_include_count: 1000,
            max_chain_depth: 5,
            optimizer_hint: None,
            whole_system_types: Vec::new(),
        }
    }
}

impl SearchConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SearchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the dialect.
    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, message: &str| ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.to_string(),
        };

        if self.default_page_size == 0 {
            return Err(invalid("default_page_size", "must be greater than zero"));
        }
        if self.max_page_size == 0 {
            return Err(invalid("max_page_size", "must be greater than zero"));
        }
        if self.default_page_size > self.max_page_size {
            return Err(invalid(
                "default_page_size",
                "must not exceed max_page_size",
            ));
        }
        if self.max_include_count == 0 {
            return Err(invalid("max_include_count", "must be greater than zero"));
        }
        if self.max_chain_depth == 0 {
            return Err(invalid("max_chain_depth", "must be greater than zero"));
        }
        Ok(())
    }
}
