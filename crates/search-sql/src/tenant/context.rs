//! Tenant context for compilation.

use serde::{Deserialize, Serialize};

use super::id::{DatastoreId, TenantId};

/// Separator between tenant and datastore in a cache key.
pub const CACHE_KEY_SEPARATOR: char = '~';

/// The tenant and datastore a search is compiled for.
///
/// Surrogate ids are only meaningful inside one physical schema, so every
/// identity cache lookup is scoped by [`TenantContext::cache_key`].
///
/// # Examples
///
/// ```
/// use helios_search_sql::tenant::{DatastoreId, TenantContext, TenantId};
///
/// let ctx = TenantContext::new(TenantId::new("acme"), DatastoreId::new("east"));
/// assert_eq!(ctx.cache_key(), "acme~east");
///
/// assert_eq!(TenantContext::default().cache_key(), "default~default");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
    tenant_id: TenantId,
    datastore_id: DatastoreId,
}

impl TenantContext {
    /// Creates a context for the given tenant and datastore.
    pub fn new(tenant_id: TenantId, datastore_id: DatastoreId) -> Self {
        Self {
            tenant_id,
            datastore_id,
        }
    }

    /// Creates a context for the tenant's default datastore.
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self::new(TenantId::new(tenant_id), DatastoreId::default())
    }

    /// Returns the tenant ID.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the datastore ID.
    pub fn datastore_id(&self) -> &DatastoreId {
        &self.datastore_id
    }

    /// Returns the key `"<tenantId>~<datastoreId>"` that scopes cached ids.
    pub fn cache_key(&self) -> String {
        format!(
            "{}{}{}",
            self.tenant_id, CACHE_KEY_SEPARATOR, self.datastore_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_differs_by_datastore() {
        let east = TenantContext::new(TenantId::new("acme"), DatastoreId::new("east"));
        let west = TenantContext::new(TenantId::new("acme"), DatastoreId::new("west"));
        assert_ne!(east.cache_key(), west.cache_key());
    }

    #[test]
    fn test_for_tenant_uses_default_datastore() {
        let ctx = TenantContext::for_tenant("acme");
        assert_eq!(ctx.cache_key(), "acme~default");
        assert_eq!(ctx.tenant_id().as_str(), "acme");
    }
}
