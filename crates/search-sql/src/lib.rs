//! Helios FHIR Search SQL Compiler
//!
//! This crate compiles FHIR search requests into parameterized SQL over the
//! normalized relational schema: one `<Type>_LOGICAL_RESOURCES` and
//! `<Type>_RESOURCES` table per resource type plus one table per kind of
//! indexed value (`_STR_VALUES`, `_DATE_VALUES`, `_TOKEN_VALUES_V`, ...).
//! It performs no I/O of its own; surrogate ids for parameter names, code
//! systems and the like come from an identity cache backed by a caller
//! supplied resolver.
//!
//! # Features
//!
//! - **All parameter types**: string, uri, number, date, token, quantity,
//!   reference, composite and `near`, with their modifiers and prefixes
//! - **Chaining**: forward chains (including `*` targets) and `_has`
//! - **Compartments**: inclusion criteria ORed into one group
//! - **Sorting, includes and whole-system search**
//! - **Dialects**: Derby, DB2 and PostgreSQL
//! - **Multitenancy**: identity caches partitioned by tenant and datastore
//!
//! # Architecture
//!
//! - [`types`] - The parsed search request and pagination
//! - [`registry`] - Search parameter definitions
//! - [`range`] - Prefix comparisons over half-open intervals
//! - [`domain`] - Typed search nodes built from a request
//! - [`render`] - SQL generation for a domain
//! - [`sql`] - Statement builder, fragments and dialects
//! - [`cache`] - The identity cache and its unit-of-work protocol
//! - [`terminology`] - Value set expansion for `:in` and `:not-in`
//! - [`orchestrator`] - The entry points tying these together
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use helios_search_sql::cache::{IdentityCacheService, IdentityKey, LocalUnitOfWork};
//! use helios_search_sql::error::CacheResult;
//! use helios_search_sql::registry::{SearchParameterDefinition, SearchParameterRegistry};
//! use helios_search_sql::types::{SearchParamType, SearchParameter, SearchQuery, SearchValue};
//! use helios_search_sql::{QueryOrchestrator, SearchConfig, SearchContext, TenantContext};
//! use parking_lot::RwLock;
//!
//! let mut registry = SearchParameterRegistry::new();
//! registry
//!     .register(
//!         SearchParameterDefinition::new(
//!             "http://hl7.org/fhir/SearchParameter/individual-birthdate",
//!             "birthdate",
//!             SearchParamType::Date,
//!             "Patient.birthDate",
//!         )
//!         .with_base(["Patient"]),
//!     )
//!     .unwrap();
//!
//! let orchestrator = QueryOrchestrator::new(
//!     SearchConfig::default(),
//!     Arc::new(RwLock::new(registry)),
//!     IdentityCacheService::new(),
//! )
//! .unwrap();
//!
//! // Ids come from the database on a cache miss
//! let resolver = |_: &IdentityKey| -> CacheResult<Option<i64>> { Ok(Some(2)) };
//! let tenant = TenantContext::default();
//! let uow = LocalUnitOfWork::new();
//! let ctx = SearchContext::new(&tenant, &resolver, &uow);
//!
//! let query = SearchQuery::new("Patient").with_parameter(
//!     SearchParameter::new("birthdate", SearchParamType::Date)
//!         .with_value(SearchValue::parse("ge2020-01-01")),
//! );
//! let rendered = orchestrator.build_data_query(&ctx, &query).unwrap().unwrap();
//! assert!(rendered.sql.contains("p1.DATE_END >= ?"));
//!
//! uow.commit().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod orchestrator;
pub mod range;
pub mod registry;
pub mod render;
pub mod schema;
pub mod sql;
pub mod tenant;
pub mod terminology;
pub mod types;

// Re-export commonly used types at crate root
pub use config::SearchConfig;
pub use error::{CompileError, CompileResult};
pub use orchestrator::{QueryOrchestrator, SearchContext};
pub use sql::RenderedQuery;
pub use tenant::TenantContext;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
