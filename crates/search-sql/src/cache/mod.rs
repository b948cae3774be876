//! Identity cache for surrogate ids.
//!
//! Generated SQL refers to parameter names, code systems, resource types,
//! common token values and canonical URLs by their integer surrogate ids.
//! This module keeps those ids in memory per `(tenant, datastore)` so that
//! compiling a search rarely touches the database.
//!
//! # Lifecycle of an id
//!
//! ```text
//! lookup(key)
//!   ├── committed map hit ──────────────────────────────► id
//!   ├── candidate of this unit of work ─────────────────► id
//!   └── CacheMissResolver::resolve
//!         ├── None ─────────────────────────────────────► ABSENT_ID (-1)
//!         └── Some(id) → candidate of this unit of work ─► id
//!
//! unit of work completes
//!   ├── Committed  → candidates promoted to the committed map
//!   └── RolledBack → candidates discarded
//! ```
//!
//! # Example
//!
//! ```
//! use helios_search_sql::cache::{
//!     IdentityCacheService, IdentityKey, LocalUnitOfWork,
//! };
//! use helios_search_sql::error::CacheResult;
//! use helios_search_sql::tenant::TenantContext;
//!
//! let cache = IdentityCacheService::new();
//! let tenant = TenantContext::default();
//! let resolver = |key: &IdentityKey| -> CacheResult<Option<i64>> {
//!     Ok(matches!(key, IdentityKey::ParameterName(n) if n == "family").then_some(42))
//! };
//!
//! let uow = LocalUnitOfWork::new();
//! let session = cache.session(&tenant, &resolver, &uow);
//! assert_eq!(session.parameter_name_id("family").unwrap(), 42);
//! assert_eq!(session.parameter_name_id("unknown").unwrap(), -1);
//!
//! uow.commit().unwrap();
//! let key = IdentityKey::ParameterName("family".to_string());
//! assert_eq!(cache.get_committed(&tenant, &key), Some(42));
//! ```

mod key;
mod resolver;
mod service;
mod transaction;

pub use key::{IdentityKey, IdentityKind};
pub use resolver::CacheMissResolver;
pub use service::{CacheSession, DEFAULT_TOKEN_SYSTEM, IdentityCacheService};
pub use transaction::{CompletionCallback, LocalUnitOfWork, TransactionOutcome, UnitOfWork};

/// Id used in generated SQL for identifiers that do not exist.
pub const ABSENT_ID: i64 = -1;
