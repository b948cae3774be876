//! The cache-miss resolver seam.

use crate::error::CacheResult;

use super::key::IdentityKey;

/// Reads surrogate ids from the database when the cache has no entry.
///
/// Implementations run inside the caller's transaction, which is why the
/// ids they return are only promoted to the shared cache once that
/// transaction commits. An identifier that does not exist is `Ok(None)`, not
/// an error; errors are reserved for failed reads.
pub trait CacheMissResolver: Send + Sync {
    /// Looks up the surrogate id for `key`.
    fn resolve(&self, key: &IdentityKey) -> CacheResult<Option<i64>>;
}

impl<F> CacheMissResolver for F
where
    F: Fn(&IdentityKey) -> CacheResult<Option<i64>> + Send + Sync,
{
    fn resolve(&self, key: &IdentityKey) -> CacheResult<Option<i64>> {
        self(key)
    }
}
