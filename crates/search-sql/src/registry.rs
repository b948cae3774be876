//! SearchParameter Registry.
//!
//! The registry holds the search parameter definitions the compiler consults
//! for reference targets, declared value types and composite components,
//! indexed by both (resource_type, param_code) and canonical URL. It also
//! tracks the set of resource types known to the schema, which drives
//! wildcard chains and whole-system search.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::SearchParamType;

/// Status of a SearchParameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchParameterStatus {
    /// Active - can be used in searches.
    #[default]
    Active,
    /// Draft - informational, not yet active.
    Draft,
    /// Retired - disabled, not usable.
    Retired,
}

impl SearchParameterStatus {
    /// Returns true if this status allows the parameter to be used in searches.
    pub fn is_usable(&self) -> bool {
        *self == SearchParameterStatus::Active
    }
}

/// The element type a parameter's expression selects.
///
/// Range comparisons (`sa`, `eb`) on NUMBER parameters and low/high column
/// selection for NUMBER and QUANTITY parameters depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    /// integer, positiveInt, unsignedInt
    Integer,
    /// decimal
    Decimal,
    /// Range (low and high quantities)
    Range,
    /// Quantity and its profiles
    Quantity,
    /// date, dateTime, instant
    Date,
    /// Period (start and end)
    Period,
    /// Anything else
    Other,
}

impl ValueType {
    /// Returns true if stored values have distinct low and high bounds.
    pub fn is_range(&self) -> bool {
        matches!(self, ValueType::Range | ValueType::Period)
    }
}

/// Component of a composite search parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeComponentDef {
    /// Definition URL of the component parameter.
    pub definition: String,
    /// FHIRPath expression for extracting this component.
    pub expression: String,
}

/// Definition of a SearchParameter as far as SQL generation needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParameterDefinition {
    /// Canonical URL (unique identifier).
    pub url: String,

    /// Parameter code (the URL param name, e.g., "name", "identifier").
    pub code: String,

    /// The parameter type.
    pub param_type: SearchParamType,

    /// FHIRPath expression for extracting values.
    pub expression: String,

    /// Resource types this parameter applies to.
    pub base: Vec<String>,

    /// Target resource types (for reference parameters).
    pub target: Option<Vec<String>>,

    /// Components (for composite parameters).
    pub component: Option<Vec<CompositeComponentDef>>,

    /// Current status.
    pub status: SearchParameterStatus,

    /// Declared element type of the indexed value.
    pub value_type: Option<ValueType>,
}

impl SearchParameterDefinition {
    /// Creates a new SearchParameter definition.
    pub fn new(
        url: impl Into<String>,
        code: impl Into<String>,
        param_type: SearchParamType,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            code: code.into(),
            param_type,
            expression: expression.into(),
            base: Vec::new(),
            target: None,
            component: None,
            status: SearchParameterStatus::Active,
            value_type: None,
        }
    }

    /// Sets the base resource types.
    pub fn with_base<I, S>(mut self, base: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base = base.into_iter().map(Into::into).collect();
        self
    }

    /// Sets target types for reference parameters.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the components of a composite parameter.
    pub fn with_components(mut self, components: Vec<CompositeComponentDef>) -> Self {
        self.component = Some(components);
        self
    }

    /// Sets the declared value type.
    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: SearchParameterStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns the reference targets, or an empty slice.
    pub fn targets(&self) -> &[String] {
        self.target.as_deref().unwrap_or(&[])
    }

    /// Returns whether this parameter applies to the given resource type.
    pub fn applies_to(&self, resource_type: &str) -> bool {
        self.base
            .iter()
            .any(|b| b == resource_type || b == "Resource" || b == "DomainResource")
    }
}

/// Errors raised by registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Parameter with this URL already exists.
    DuplicateUrl {
        /// The duplicate URL.
        url: String,
    },

    /// Invalid parameter definition.
    InvalidDefinition {
        /// Description of the problem.
        message: String,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateUrl { url } => {
                write!(f, "SearchParameter with URL '{}' already exists", url)
            }
            RegistryError::InvalidDefinition { message } => {
                write!(f, "Invalid SearchParameter definition: {}", message)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// In-memory registry of SearchParameter definitions.
#[derive(Debug, Default)]
pub struct SearchParameterRegistry {
    /// Parameters indexed by (resource_type, param_code).
    params_by_type: HashMap<String, HashMap<String, Arc<SearchParameterDefinition>>>,

    /// Parameters indexed by canonical URL.
    params_by_url: HashMap<String, Arc<SearchParameterDefinition>>,

    /// Concrete resource types present in the schema.
    resource_types: BTreeSet<String>,
}

impl SearchParameterRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered parameters.
    pub fn len(&self) -> usize {
        self.params_by_url.len()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.params_by_url.is_empty()
    }

    /// Registers a concrete resource type.
    pub fn register_resource_type(&mut self, resource_type: impl Into<String>) {
        self.resource_types.insert(resource_type.into());
    }

    /// Returns the registered resource types in name order.
    pub fn resource_types(&self) -> Vec<String> {
        self.resource_types.iter().cloned().collect()
    }

    /// Returns true if the resource type is registered.
    pub fn has_resource_type(&self, resource_type: &str) -> bool {
        self.resource_types.contains(resource_type)
    }

    /// Registers a new parameter.
    ///
    /// Concrete base types are registered as resource types as well.
    pub fn register(&mut self, param: SearchParameterDefinition) -> Result<(), RegistryError> {
        if self.params_by_url.contains_key(&param.url) {
            return Err(RegistryError::DuplicateUrl { url: param.url });
        }
        if param.base.is_empty() {
            return Err(RegistryError::InvalidDefinition {
                message: format!("'{}' has no base resource type", param.code),
            });
        }

        let param = Arc::new(param);
        self.params_by_url
            .insert(param.url.clone(), Arc::clone(&param));

        for base in &param.base {
            if base != "Resource" && base != "DomainResource" {
                self.resource_types.insert(base.clone());
            }
            self.params_by_type
                .entry(base.clone())
                .or_default()
                .insert(param.code.clone(), Arc::clone(&param));
        }

        Ok(())
    }

    /// Gets an active parameter by resource type and code.
    ///
    /// Falls back to parameters declared on `Resource` and `DomainResource`.
    pub fn get_param(
        &self,
        resource_type: &str,
        code: &str,
    ) -> Option<Arc<SearchParameterDefinition>> {
        [resource_type, "DomainResource", "Resource"]
            .iter()
            .filter_map(|t| self.params_by_type.get(*t).and_then(|p| p.get(code)))
            .find(|p| p.status.is_usable())
            .cloned()
    }

    /// Gets a parameter by its canonical URL.
    pub fn get_by_url(&self, url: &str) -> Option<Arc<SearchParameterDefinition>> {
        self.params_by_url.get(url).cloned()
    }

    /// Resolves the component definitions of a composite parameter.
    pub fn components(
        &self,
        resource_type: &str,
        code: &str,
    ) -> Vec<Arc<SearchParameterDefinition>> {
        self.get_param(resource_type, code)
            .and_then(|p| p.component.clone())
            .unwrap_or_default()
            .iter()
            .filter_map(|c| self.get_by_url(&c.definition))
            .collect()
    }
}
