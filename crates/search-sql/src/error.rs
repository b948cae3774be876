//! Error types for the search compiler.
//!
//! This module defines the error hierarchy used while compiling a FHIR search
//! into SQL: search errors for requests that cannot be expressed, cache errors
//! raised by the cache-miss resolver, unit-of-work errors, and configuration
//! errors.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::types::{SearchModifier, SearchParamType, SearchPrefix};

/// The primary error type for all compile operations.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The search request cannot be expressed as SQL.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// The identity cache could not resolve an identifier.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The unit of work is in an unexpected state.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// The compiler configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while translating search parameters into SQL.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The parameter type has no SQL translation in this position.
    #[error("unsupported parameter type '{param_type}' for parameter '{param}'")]
    UnsupportedParameterType {
        param: String,
        param_type: SearchParamType,
    },

    /// The modifier is not supported for the parameter type.
    #[error("unsupported modifier '{modifier}' for parameter type '{param_type}'")]
    UnsupportedModifier {
        modifier: SearchModifier,
        param_type: SearchParamType,
    },

    /// The prefix is not supported for the parameter type.
    #[error("unsupported prefix '{prefix}' for parameter '{param}': {reason}")]
    UnsupportedPrefix {
        prefix: SearchPrefix,
        param: String,
        reason: String,
    },

    /// The parameter cannot be used for sorting.
    #[error("unsupported sort parameter '{param}' of type '{param_type}'")]
    UnsupportedSort {
        param: String,
        param_type: SearchParamType,
    },

    /// A value could not be parsed for its parameter type.
    #[error("invalid value '{value}' for parameter '{param}': {message}")]
    InvalidValue {
        param: String,
        value: String,
        message: String,
    },

    /// A canonical value is malformed.
    #[error("invalid canonical value '{value}': {message}")]
    InvalidCanonical { value: String, message: String },

    /// A composite value does not match the parameter's components.
    #[error("invalid composite value for '{param}': {message}")]
    InvalidComposite { param: String, message: String },

    /// An inclusion criterion carries no values.
    #[error("inclusion criterion '{param}' has no values")]
    EmptyInclusionCriterion { param: String },

    /// The target type of a chained reference could not be determined.
    #[error("cannot resolve target type for chained parameter '{param}' on '{resource_type}'")]
    UnresolvedChainTarget { param: String, resource_type: String },

    /// A wildcard target type appears before the final reference link.
    #[error("wildcard target type is only allowed on the last reference in chain '{chain}'")]
    MisplacedWildcard { chain: String },

    /// The chain is longer than the configured maximum.
    #[error("chain depth {depth} exceeds maximum of {max}")]
    ChainTooDeep { depth: usize, max: usize },

    /// A chain link is not a reference parameter.
    #[error("chained parameter '{param}' must be a reference, found '{param_type}'")]
    NonReferenceChainLink {
        param: String,
        param_type: SearchParamType,
    },

    /// The parameter is not known for the resource type.
    #[error("unknown search parameter '{param}' for resource type '{resource_type}'")]
    UnknownParameter { param: String, resource_type: String },

    /// The request itself is malformed.
    #[error("invalid search request: {message}")]
    InvalidRequest { message: String },

    /// A `:in` or `:not-in` value names a value set the expander does not know.
    #[error("unknown value set '{url}' for parameter '{param}'")]
    UnknownValueSet { param: String, url: String },

    /// The value set expander failed.
    #[error("value set expansion failed for '{url}': {message}")]
    CodeSetExpansionFailed { url: String, message: String },
}

/// Errors raised by the identity cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache-miss resolver failed.
    #[error("cache-miss resolver failed for {key}: {message}")]
    ResolverFailed {
        key: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Errors related to the unit of work collaborator.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// The unit of work has already completed.
    #[error("unit of work {id} has already completed")]
    AlreadyCompleted { id: String },
}

/// Errors in compiler configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration value is out of range.
    #[error("invalid configuration value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// Result type for search translation.
pub type SearchResult<T> = Result<T, SearchError>;

/// Result type for identity cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

impl SearchError {
    /// Builds an [`SearchError::InvalidValue`].
    pub(crate) fn invalid_value(
        param: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SearchError::InvalidValue {
            param: param.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}
