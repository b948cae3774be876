//! Registry, resolver and orchestrator fixtures.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use helios_search_sql::cache::{CacheMissResolver, IdentityCacheService, IdentityKey};
use helios_search_sql::error::CacheResult;
use helios_search_sql::registry::{
    CompositeComponentDef, SearchParameterDefinition, SearchParameterRegistry, ValueType,
};
use helios_search_sql::types::SearchParamType;
use helios_search_sql::{QueryOrchestrator, SearchConfig};
use parking_lot::RwLock;

/// Parameter name ids known to [`CountingResolver`].
pub const PARAMETER_NAMES: &[(&str, i64)] = &[
    ("family", 1),
    ("birthdate", 2),
    ("code", 3),
    ("value-quantity", 4),
    ("general-practitioner", 5),
    ("name", 6),
    ("near", 7),
    ("organization", 8),
    ("subject", 9),
    ("url", 10),
    ("patient", 11),
    ("probability", 12),
    ("code-value-quantity", 13),
    ("identifier", 14),
];

/// Resolves ids from fixed tables, standing in for the database.
///
/// Every call is counted so tests can tell cache hits from misses.
pub struct CountingResolver {
    calls: AtomicUsize,
    ids: HashMap<IdentityKey, i64>,
}

impl CountingResolver {
    /// Creates a resolver knowing the standard parameter names, two code
    /// systems and a few common token values.
    pub fn new() -> Self {
        let mut ids: HashMap<IdentityKey, i64> = PARAMETER_NAMES
            .iter()
            .map(|(name, id)| (IdentityKey::ParameterName(name.to_string()), *id))
            .collect();
        ids.insert(IdentityKey::CodeSystem("http://loinc.org".to_string()), 20);
        ids.insert(
            IdentityKey::CodeSystem("http://unitsofmeasure.org".to_string()),
            21,
        );
        ids.insert(
            IdentityKey::CommonTokenValue {
                code_system_id: 20,
                token_value: "8480-6".to_string(),
            },
            300,
        );
        for (index, resource_type) in ["Observation", "Organization", "Patient", "Practitioner"]
            .iter()
            .enumerate()
        {
            ids.insert(
                IdentityKey::ResourceType(resource_type.to_string()),
                100 + index as i64,
            );
        }
        Self {
            calls: AtomicUsize::new(0),
            ids,
        }
    }

    /// Number of lookups that reached this resolver.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CacheMissResolver for CountingResolver {
    fn resolve(&self, key: &IdentityKey) -> CacheResult<Option<i64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ids.get(key).copied())
    }
}

/// A definition at `http://hl7.org/fhir/SearchParameter/{name}` on `base`.
pub fn definition(
    name: &str,
    code: &str,
    param_type: SearchParamType,
    base: &str,
) -> SearchParameterDefinition {
    SearchParameterDefinition::new(
        format!("http://hl7.org/fhir/SearchParameter/{}", name),
        code,
        param_type,
        format!("{}.{}", base, code),
    )
    .with_base([base])
}

/// A registry covering Patient, Practitioner, Organization and Observation.
pub fn seeded_registry() -> SearchParameterRegistry {
    let mut registry = SearchParameterRegistry::new();
    let defs = vec![
        definition("individual-family", "family", SearchParamType::String, "Patient"),
        definition("individual-birthdate", "birthdate", SearchParamType::Date, "Patient")
            .with_value_type(ValueType::Date),
        definition(
            "Patient-general-practitioner",
            "general-practitioner",
            SearchParamType::Reference,
            "Patient",
        )
        .with_targets(["Practitioner", "Organization", "PractitionerRole"]),
        definition("Patient-organization", "organization", SearchParamType::Reference, "Patient")
            .with_targets(["Organization"]),
        definition("Practitioner-name", "name", SearchParamType::String, "Practitioner"),
        definition("Organization-name", "name", SearchParamType::String, "Organization"),
        definition("clinical-code", "code", SearchParamType::Token, "Observation"),
        definition(
            "Observation-value-quantity",
            "value-quantity",
            SearchParamType::Quantity,
            "Observation",
        )
        .with_value_type(ValueType::Quantity),
        definition("Observation-subject", "subject", SearchParamType::Reference, "Observation")
            .with_targets(["Patient", "Practitioner", "Organization"]),
        definition("clinical-patient", "patient", SearchParamType::Reference, "Observation")
            .with_targets(["Patient"]),
        definition(
            "Observation-code-value-quantity",
            "code-value-quantity",
            SearchParamType::Composite,
            "Observation",
        )
        .with_components(vec![
            CompositeComponentDef {
                definition: "http://hl7.org/fhir/SearchParameter/clinical-code".to_string(),
                expression: "code".to_string(),
            },
            CompositeComponentDef {
                definition: "http://hl7.org/fhir/SearchParameter/Observation-value-quantity"
                    .to_string(),
                expression: "value".to_string(),
            },
        ]),
    ];
    for def in defs {
        registry.register(def).unwrap();
    }
    registry
}

/// An orchestrator over the seeded registry and a fresh cache.
pub fn create_orchestrator(config: SearchConfig) -> QueryOrchestrator {
    create_orchestrator_with_cache(config, IdentityCacheService::new())
}

/// An orchestrator over the seeded registry and the given cache.
pub fn create_orchestrator_with_cache(
    config: SearchConfig,
    cache: IdentityCacheService,
) -> QueryOrchestrator {
    QueryOrchestrator::new(config, Arc::new(RwLock::new(seeded_registry())), cache)
        .expect("valid configuration")
}
