//! Tenant and datastore identifier types.
//!
//! This module defines [`TenantId`] and [`DatastoreId`], the two opaque
//! identifiers that together select one physical schema.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier used when a deployment does not configure tenants.
pub const DEFAULT_TENANT: &str = "default";

/// Identifier used when a tenant has a single datastore.
pub const DEFAULT_DATASTORE: &str = "default";

/// An opaque tenant identifier.
///
/// # Examples
///
/// ```
/// use helios_search_sql::tenant::TenantId;
///
/// let tenant = TenantId::new("acme");
/// assert_eq!(tenant.as_str(), "acme");
/// assert!(TenantId::default().is_default());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a new tenant ID from the given string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the default tenant.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_TENANT
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new(DEFAULT_TENANT)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({:?})", self.0)
    }
}

impl FromStr for TenantId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An opaque datastore identifier within a tenant.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatastoreId(String);

impl DatastoreId {
    /// Creates a new datastore ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the datastore ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DatastoreId {
    fn default() -> Self {
        Self::new(DEFAULT_DATASTORE)
    }
}

impl fmt::Display for DatastoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DatastoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatastoreId({:?})", self.0)
    }
}

impl From<&str> for DatastoreId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
