//! Keys of the identity cache.

use std::fmt;

/// The kinds of surrogate id the cache holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    /// `PARAMETER_NAMES.PARAMETER_NAME_ID`
    ParameterName,
    /// `CODE_SYSTEMS.CODE_SYSTEM_ID`
    CodeSystem,
    /// `RESOURCE_TYPES.RESOURCE_TYPE_ID`
    ResourceType,
    /// `COMMON_TOKEN_VALUES.COMMON_TOKEN_VALUE_ID`
    CommonTokenValue,
    /// `COMMON_CANONICAL_VALUES.CANONICAL_ID`
    CanonicalValue,
    /// `LOGICAL_RESOURCES.LOGICAL_RESOURCE_ID`
    LogicalResource,
}

/// A natural key whose surrogate id can be cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// A search parameter name, including suffixed names like `code:text`.
    ParameterName(String),
    /// A code system URI.
    CodeSystem(String),
    /// A resource type name.
    ResourceType(String),
    /// A token value within a code system.
    CommonTokenValue {
        /// Surrogate id of the code system.
        code_system_id: i64,
        /// The code.
        token_value: String,
    },
    /// A canonical URL (without version or fragment).
    CanonicalValue(String),
    /// A logical resource.
    LogicalResource {
        /// The resource type.
        resource_type: String,
        /// The logical id.
        logical_id: String,
    },
}

impl IdentityKey {
    /// Returns the kind of id this key resolves to.
    pub fn kind(&self) -> IdentityKind {
        match self {
            IdentityKey::ParameterName(_) => IdentityKind::ParameterName,
            IdentityKey::CodeSystem(_) => IdentityKind::CodeSystem,
            IdentityKey::ResourceType(_) => IdentityKind::ResourceType,
            IdentityKey::CommonTokenValue { .. } => IdentityKind::CommonTokenValue,
            IdentityKey::CanonicalValue(_) => IdentityKind::CanonicalValue,
            IdentityKey::LogicalResource { .. } => IdentityKind::LogicalResource,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::ParameterName(name) => write!(f, "parameter name '{}'", name),
            IdentityKey::CodeSystem(system) => write!(f, "code system '{}'", system),
            IdentityKey::ResourceType(name) => write!(f, "resource type '{}'", name),
            IdentityKey::CommonTokenValue {
                code_system_id,
                token_value,
            } => write!(f, "token value '{}' in code system {}", token_value, code_system_id),
            IdentityKey::CanonicalValue(url) => write!(f, "canonical value '{}'", url),
            IdentityKey::LogicalResource {
                resource_type,
                logical_id,
            } => write!(f, "logical resource '{}/{}'", resource_type, logical_id),
        }
    }
}
