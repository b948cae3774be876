//! The shared identity cache and its per-compilation session.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;

use crate::error::CompileResult;
use crate::tenant::TenantContext;

use super::key::{IdentityKey, IdentityKind};
use super::resolver::CacheMissResolver;
use super::transaction::{TransactionOutcome, UnitOfWork};
use super::ABSENT_ID;

/// Code system used for tokens searched without a system (`|code`).
pub const DEFAULT_TOKEN_SYSTEM: &str = "default-token-system";

/// Ids resolved inside one unit of work, keyed by tenant cache key.
#[derive(Default)]
struct CandidateSet {
    entries: Mutex<HashMap<String, HashMap<IdentityKey, i64>>>,
}

impl CandidateSet {
    fn get(&self, tenant_key: &str, key: &IdentityKey) -> Option<i64> {
        self.entries
            .lock()
            .get(tenant_key)
            .and_then(|m| m.get(key))
            .copied()
    }

    fn insert(&self, tenant_key: &str, key: IdentityKey, id: i64) {
        self.entries
            .lock()
            .entry(tenant_key.to_string())
            .or_default()
            .insert(key, id);
    }

    fn take(&self) -> HashMap<String, HashMap<IdentityKey, i64>> {
        std::mem::take(&mut *self.entries.lock())
    }
}

#[derive(Default)]
struct CacheInner {
    /// Committed ids per `"<tenant>~<datastore>"`.
    tenants: DashMap<String, Arc<DashMap<IdentityKey, i64>>>,
    /// Candidates per unit-of-work id.
    pending: DashMap<String, Arc<CandidateSet>>,
}

impl CacheInner {
    fn tenant(&self, tenant_key: &str) -> Arc<DashMap<IdentityKey, i64>> {
        if let Some(map) = self.tenants.get(tenant_key) {
            return Arc::clone(map.value());
        }
        Arc::clone(
            self.tenants
                .entry(tenant_key.to_string())
                .or_default()
                .value(),
        )
    }

    fn complete(&self, uow_id: &str, outcome: TransactionOutcome) {
        let Some((_, candidates)) = self.pending.remove(uow_id) else {
            return;
        };
        let entries = candidates.take();
        let count: usize = entries.values().map(HashMap::len).sum();

        match outcome {
            TransactionOutcome::Committed => {
                for (tenant_key, ids) in entries {
                    let shared = self.tenant(&tenant_key);
                    for (key, id) in ids {
                        shared.insert(key, id);
                    }
                }
                tracing::debug!(
                    "Promoted {} identity cache candidates from unit of work {}",
                    count,
                    uow_id
                );
            }
            TransactionOutcome::RolledBack => {
                if count > 0 {
                    tracing::warn!(
                        "Discarded {} identity cache candidates from rolled back unit of work {}",
                        count,
                        uow_id
                    );
                }
            }
        }
    }
}

/// Process-wide cache of surrogate ids, partitioned by tenant and datastore.
///
/// Shared reads never block each other. Ids read from the database during a
/// unit of work are kept as candidates private to that unit of work and only
/// become visible to other units of work after it commits; a rollback
/// discards them.
///
/// The service is cheap to clone; clones share the same maps.
#[derive(Clone, Default)]
pub struct IdentityCacheService {
    inner: Arc<CacheInner>,
}

impl IdentityCacheService {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the committed id for `key`, if any.
    pub fn get_committed(&self, tenant: &TenantContext, key: &IdentityKey) -> Option<i64> {
        self.inner
            .tenants
            .get(&tenant.cache_key())
            .and_then(|map| map.get(key).map(|id| *id))
    }

    /// Seeds a committed id, e.g. from a startup preload.
    pub fn insert_committed(&self, tenant: &TenantContext, key: IdentityKey, id: i64) {
        self.inner.tenant(&tenant.cache_key()).insert(key, id);
    }

    /// Number of committed ids of `kind` for the tenant.
    pub fn committed_count(&self, tenant: &TenantContext, kind: IdentityKind) -> usize {
        self.inner
            .tenants
            .get(&tenant.cache_key())
            .map(|map| map.iter().filter(|e| e.key().kind() == kind).count())
            .unwrap_or(0)
    }

    /// Number of units of work that currently hold candidates.
    pub fn pending_units(&self) -> usize {
        self.inner.pending.len()
    }

    /// Drops every committed id of the tenant.
    pub fn clear_tenant(&self, tenant: &TenantContext) {
        self.inner.tenants.remove(&tenant.cache_key());
    }

    /// Opens a lookup session for one compilation.
    pub fn session<'a>(
        &'a self,
        tenant: &TenantContext,
        resolver: &'a dyn CacheMissResolver,
        unit_of_work: &'a dyn UnitOfWork,
    ) -> CacheSession<'a> {
        CacheSession {
            service: self,
            tenant_key: tenant.cache_key(),
            resolver,
            unit_of_work,
        }
    }

    /// Looks up `key`: committed ids first, then this unit of work's
    /// candidates, then the resolver. Resolved ids become candidates.
    pub fn lookup(
        &self,
        tenant_key: &str,
        key: &IdentityKey,
        resolver: &dyn CacheMissResolver,
        unit_of_work: &dyn UnitOfWork,
    ) -> CompileResult<Option<i64>> {
        if let Some(id) = self
            .inner
            .tenants
            .get(tenant_key)
            .and_then(|map| map.get(key).map(|id| *id))
        {
            return Ok(Some(id));
        }

        if let Some(candidates) = self.inner.pending.get(unit_of_work.id()) {
            if let Some(id) = candidates.get(tenant_key, key) {
                return Ok(Some(id));
            }
        }

        tracing::debug!("Identity cache miss for {} in {}", key, tenant_key);
        let Some(id) = resolver.resolve(key)? else {
            return Ok(None);
        };

        self.candidates_for(unit_of_work)?
            .insert(tenant_key, key.clone(), id);
        Ok(Some(id))
    }

    /// Returns the candidate set of the unit of work, registering the
    /// promotion callback when the set is first created.
    fn candidates_for(&self, unit_of_work: &dyn UnitOfWork) -> CompileResult<Arc<CandidateSet>> {
        let uow_id = unit_of_work.id().to_string();
        let (candidates, created) = match self.inner.pending.entry(uow_id.clone()) {
            Entry::Occupied(e) => (Arc::clone(e.get()), false),
            Entry::Vacant(e) => {
                let set = Arc::new(CandidateSet::default());
                e.insert(Arc::clone(&set));
                (set, true)
            }
        };

        if created {
            let inner = Arc::clone(&self.inner);
            let id = uow_id.clone();
            let registered = unit_of_work
                .register_completion(Box::new(move |outcome| inner.complete(&id, outcome)));
            if let Err(e) = registered {
                self.inner.pending.remove(&uow_id);
                return Err(e.into());
            }
        }

        Ok(candidates)
    }
}

impl std::fmt::Debug for IdentityCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCacheService")
            .field("tenants", &self.inner.tenants.len())
            .field("pending_units", &self.inner.pending.len())
            .finish()
    }
}

/// Identity lookups for one compilation: one tenant, one resolver, one unit
/// of work.
///
/// Typed helpers substitute [`ABSENT_ID`] for identifiers that do not exist,
/// so the generated SQL simply matches nothing.
pub struct CacheSession<'a> {
    service: &'a IdentityCacheService,
    tenant_key: String,
    resolver: &'a dyn CacheMissResolver,
    unit_of_work: &'a dyn UnitOfWork,
}

impl<'a> CacheSession<'a> {
    /// Looks up `key`, returning `None` if it does not exist.
    pub fn lookup(&self, key: &IdentityKey) -> CompileResult<Option<i64>> {
        self.service
            .lookup(&self.tenant_key, key, self.resolver, self.unit_of_work)
    }

    fn id_or_absent(&self, key: IdentityKey) -> CompileResult<i64> {
        match self.lookup(&key)? {
            Some(id) => Ok(id),
            None => {
                tracing::debug!(
                    "No id for {} in {}, using {}",
                    key,
                    self.tenant_key,
                    ABSENT_ID
                );
                Ok(ABSENT_ID)
            }
        }
    }

    /// Surrogate id of a parameter name.
    pub fn parameter_name_id(&self, name: &str) -> CompileResult<i64> {
        self.id_or_absent(IdentityKey::ParameterName(name.to_string()))
    }

    /// Surrogate id of a code system.
    pub fn code_system_id(&self, system: &str) -> CompileResult<i64> {
        self.id_or_absent(IdentityKey::CodeSystem(system.to_string()))
    }

    /// Surrogate id of a resource type.
    pub fn resource_type_id(&self, resource_type: &str) -> CompileResult<i64> {
        self.id_or_absent(IdentityKey::ResourceType(resource_type.to_string()))
    }

    /// Surrogate id of a `(system, code)` token.
    ///
    /// An unknown system makes the whole token unknown.
    pub fn common_token_value_id(&self, system: &str, code: &str) -> CompileResult<i64> {
        let code_system_id = self.code_system_id(system)?;
        if code_system_id == ABSENT_ID {
            return Ok(ABSENT_ID);
        }
        self.id_or_absent(IdentityKey::CommonTokenValue {
            code_system_id,
            token_value: code.to_string(),
        })
    }

    /// Surrogate id of a canonical URL.
    pub fn canonical_id(&self, url: &str) -> CompileResult<i64> {
        self.id_or_absent(IdentityKey::CanonicalValue(url.to_string()))
    }

    /// Surrogate id of a logical resource, if it exists.
    pub fn logical_resource_id(
        &self,
        resource_type: &str,
        logical_id: &str,
    ) -> CompileResult<Option<i64>> {
        self.lookup(&IdentityKey::LogicalResource {
            resource_type: resource_type.to_string(),
            logical_id: logical_id.to_string(),
        })
    }
}
