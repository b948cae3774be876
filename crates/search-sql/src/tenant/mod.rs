//! Tenant scoping for compiled searches.
//!
//! Each tenant may own several datastores, and each datastore is a separate
//! physical schema with its own surrogate ids. Compilation always happens for
//! exactly one `(tenant, datastore)` pair, carried by [`TenantContext`].
//!
//! # Core Types
//!
//! - [`TenantId`] - Opaque tenant identifier
//! - [`DatastoreId`] - Opaque datastore identifier within a tenant
//! - [`TenantContext`] - The pair, and the identity cache key derived from it

mod context;
mod id;

pub use context::{CACHE_KEY_SEPARATOR, TenantContext};
pub use id::{DEFAULT_DATASTORE, DEFAULT_TENANT, DatastoreId, TenantId};
