//! Well-formedness across parameter types, modifiers and prefixes.
//!
//! Every case is compiled as a data, count and sort query; each statement
//! must have balanced parentheses and one bind per placeholder.

mod common;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use common::*;
use helios_search_sql::cache::{IdentityCacheService, LocalUnitOfWork};
use helios_search_sql::error::{SearchError, SearchResult};
use helios_search_sql::registry::{SearchParameterRegistry, ValueType};
use helios_search_sql::terminology::CodeSets;
use helios_search_sql::types::{
    ReverseChainedParameter, SearchModifier, SearchParamType, SearchParameter, SearchPrefix,
    SearchQuery, SearchValue, SortDirective,
};
use helios_search_sql::{CompileError, QueryOrchestrator, SearchConfig, SearchContext, TenantContext};
use parking_lot::RwLock;

const ALL_PREFIXES: [SearchPrefix; 9] = [
    SearchPrefix::Eq,
    SearchPrefix::Ne,
    SearchPrefix::Gt,
    SearchPrefix::Lt,
    SearchPrefix::Ge,
    SearchPrefix::Le,
    SearchPrefix::Sa,
    SearchPrefix::Eb,
    SearchPrefix::Ap,
];

/// The seeded registry plus number, uri, period, location and untargeted
/// reference parameters.
fn grid_registry() -> SearchParameterRegistry {
    let mut registry = seeded_registry();
    let extra = vec![
        definition("ChargeItem-factor", "factor", SearchParamType::Number, "ChargeItem")
            .with_value_type(ValueType::Decimal),
        definition(
            "RiskAssessment-probability",
            "probability",
            SearchParamType::Number,
            "RiskAssessment",
        )
        .with_value_type(ValueType::Range),
        definition(
            "MolecularSequence-window-start",
            "window-start",
            SearchParamType::Number,
            "MolecularSequence",
        )
        .with_value_type(ValueType::Integer),
        definition("Encounter-date", "date", SearchParamType::Date, "Encounter")
            .with_value_type(ValueType::Period),
        definition("ValueSet-url", "url", SearchParamType::Uri, "ValueSet"),
        definition("Location-near", "near", SearchParamType::Special, "Location"),
        definition("Observation-focus", "focus", SearchParamType::Reference, "Observation"),
    ];
    for def in extra {
        registry.register(def).unwrap();
    }
    registry
}

fn vital_signs(url: &str) -> SearchResult<Option<CodeSets>> {
    Ok((url == "http://acme.org/ValueSet/vitals").then(|| {
        BTreeMap::from([(
            "http://loinc.org".to_string(),
            BTreeSet::from(["8462-4".to_string(), "8480-6".to_string()]),
        )])
    }))
}

/// One request to compile, with the key its sort query orders by.
struct Case {
    label: String,
    query: SearchQuery,
    sort: &'static str,
}

impl Case {
    fn new(label: impl Into<String>, query: SearchQuery, sort: &'static str) -> Self {
        Self {
            label: label.into(),
            query,
            sort,
        }
    }

    fn param(label: impl Into<String>, resource_type: &str, param: SearchParameter) -> Self {
        Self::new(
            label,
            SearchQuery::new(resource_type).with_parameter(param),
            "_lastUpdated",
        )
    }
}

struct Grid {
    orchestrator: QueryOrchestrator,
    resolver: CountingResolver,
    tenant: TenantContext,
    uow: LocalUnitOfWork,
}

impl Grid {
    fn new() -> Self {
        Self {
            orchestrator: QueryOrchestrator::new(
                SearchConfig::default(),
                Arc::new(RwLock::new(grid_registry())),
                IdentityCacheService::new(),
            )
            .unwrap(),
            resolver: CountingResolver::new(),
            tenant: TenantContext::default(),
            uow: LocalUnitOfWork::new(),
        }
    }

    fn context(&self) -> SearchContext<'_> {
        SearchContext::new(&self.tenant, &self.resolver, &self.uow).with_code_sets(&vital_signs)
    }

    /// Compiles `case` as data, count and sort queries and checks each one.
    fn check(&self, case: &Case) {
        let ctx = self.context();
        let compile = |kind: &str, result: Result<_, CompileError>| match result {
            Ok(Some(rendered)) => rendered,
            Ok(None) => panic!("{} {}: no statement", case.label, kind),
            Err(err) => panic!("{} {}: {}", case.label, kind, err),
        };

        let data = compile("data", self.orchestrator.build_data_query(&ctx, &case.query));
        assert_well_formed(&data);
        let count = compile("count", self.orchestrator.build_count_query(&ctx, &case.query));
        assert_well_formed(&count);
        assert_eq!(data.binds, count.binds, "{}: data and count binds differ", case.label);

        let sorted = case.query.clone().with_sort(SortDirective::parse(case.sort));
        let sort = compile("sort", self.orchestrator.build_sort_query(&ctx, &sorted));
        assert_well_formed(&sort);
    }
}

fn with_prefix(
    name: &str,
    param_type: SearchParamType,
    prefix: SearchPrefix,
    value: &str,
) -> SearchParameter {
    SearchParameter::new(name, param_type).with_value(SearchValue::new(prefix, value))
}

fn prefix_cases() -> Vec<Case> {
    let mut cases = Vec::new();
    for prefix in ALL_PREFIXES {
        let number = |resource_type: &str, name: &str, value: &str| {
            Case::new(
                format!("{}.{} {}", resource_type, name, prefix),
                SearchQuery::new(resource_type).with_parameter(with_prefix(
                    name,
                    SearchParamType::Number,
                    prefix,
                    value,
                )),
                "-_lastUpdated",
            )
        };
        cases.push(number("ChargeItem", "factor", "0.75"));
        cases.push(number("RiskAssessment", "probability", "0.5"));
        if !prefix.is_range_only() {
            cases.push(number("MolecularSequence", "window-start", "100"));
        }

        for value in ["2020", "2020-03", "2020-03-04", "2020-03-04T10:15:00Z"] {
            cases.push(Case::new(
                format!("birthdate {}{}", prefix, value),
                SearchQuery::new("Patient").with_parameter(with_prefix(
                    "birthdate",
                    SearchParamType::Date,
                    prefix,
                    value,
                )),
                "birthdate",
            ));
        }
        cases.push(Case::param(
            format!("Encounter.date {}", prefix),
            "Encounter",
            with_prefix("date", SearchParamType::Date, prefix, "2021-06-01T10:00:00Z"),
        ));

        for value in ["5.4", "5.4|http://unitsofmeasure.org|mg", "5.4||mg"] {
            cases.push(Case::new(
                format!("value-quantity {}{}", prefix, value),
                SearchQuery::new("Observation").with_parameter(with_prefix(
                    "value-quantity",
                    SearchParamType::Quantity,
                    prefix,
                    value,
                )),
                "value-quantity",
            ));
        }

        cases.push(Case::param(
            format!("_lastUpdated {}", prefix),
            "Patient",
            with_prefix("_lastUpdated", SearchParamType::Date, prefix, "2024-01-01T00:00:00Z"),
        ));
    }
    cases
}

fn modifier_cases() -> Vec<Case> {
    let family = || SearchParameter::new("family", SearchParamType::String).with_eq("Müller");
    let url = || {
        SearchParameter::new("url", SearchParamType::Uri)
            .with_eq("http://acme.org/fhir/ValueSet/vitals")
    };
    let code = |value: &str| SearchParameter::new("code", SearchParamType::Token).with_eq(value);
    let subject = |value: &str| {
        SearchParameter::new("subject", SearchParamType::Reference).with_eq(value)
    };
    let profile =
        |value: &str| SearchParameter::new("_profile", SearchParamType::Uri).with_eq(value);
    let tag = |name: &str, value: &str| {
        SearchParameter::new(name, SearchParamType::Token).with_eq(value)
    };

    vec![
        Case::new("family", SearchQuery::new("Patient").with_parameter(family()), "family"),
        Case::param("family:exact", "Patient", family().with_modifier(SearchModifier::Exact)),
        Case::param(
            "family:contains",
            "Patient",
            family().with_modifier(SearchModifier::Contains),
        ),
        Case::new("url", SearchQuery::new("ValueSet").with_parameter(url()), "url"),
        Case::param("url:above", "ValueSet", url().with_modifier(SearchModifier::Above)),
        Case::param("url:below", "ValueSet", url().with_modifier(SearchModifier::Below)),
        Case::new(
            "code",
            SearchQuery::new("Observation").with_parameter(code("8480-6").with_eq("Bp-Sys")),
            "code",
        ),
        Case::param("code system|code", "Observation", code("http://loinc.org|8480-6")),
        Case::param("code |code", "Observation", code("|8480-6")),
        Case::param("code system|", "Observation", code("http://loinc.org|")),
        Case::param(
            "code:not",
            "Observation",
            code("http://loinc.org|8480-6").with_modifier(SearchModifier::Not),
        ),
        Case::param(
            "code:text",
            "Observation",
            code("Blood pressure").with_modifier(SearchModifier::Text),
        ),
        Case::param(
            "code:in",
            "Observation",
            code("http://acme.org/ValueSet/vitals").with_modifier(SearchModifier::In),
        ),
        Case::param(
            "code:not-in",
            "Observation",
            code("http://acme.org/ValueSet/vitals").with_modifier(SearchModifier::NotIn),
        ),
        Case::new(
            "subject Type/id",
            SearchQuery::new("Observation").with_parameter(subject("Patient/123")),
            "subject",
        ),
        Case::param("subject id", "Observation", subject("123")),
        Case::param("subject versioned", "Observation", subject("Patient/123/_history/2")),
        Case::param(
            "subject absolute",
            "Observation",
            subject("http://acme.org/fhir/Patient/123"),
        ),
        Case::param(
            "subject:Patient",
            "Observation",
            subject("123").with_modifier(SearchModifier::Type("Patient".to_string())),
        ),
        Case::param(
            "subject:identifier",
            "Observation",
            subject("http://acme.org/mrn|12345").with_modifier(SearchModifier::Identifier),
        ),
        Case::param(
            "focus suffix",
            "Observation",
            SearchParameter::new("focus", SearchParamType::Reference).with_eq("abc"),
        ),
        Case::param("_tag", "Patient", tag("_tag", "http://acme.org/tags|vip")),
        Case::param("_tag code", "Patient", tag("_tag", "vip")),
        Case::param(
            "_tag:not",
            "Patient",
            tag("_tag", "http://acme.org/tags|vip").with_modifier(SearchModifier::Not),
        ),
        Case::param("_security system|", "Patient", tag("_security", "http://acme.org/labels|")),
        Case::param("_profile", "Patient", profile("http://acme.org/Profile")),
        Case::param(
            "_profile version and fragment",
            "Patient",
            profile("http://acme.org/Profile|1.0#part"),
        ),
        Case::param(
            "_profile:above",
            "Patient",
            profile("http://acme.org/Profile|1.0").with_modifier(SearchModifier::Above),
        ),
        Case::param(
            "_profile:below",
            "Patient",
            profile("http://acme.org/Profile|1").with_modifier(SearchModifier::Below),
        ),
        Case::param(
            "near",
            "Location",
            SearchParameter::new("near", SearchParamType::Special).with_eq("42.25|-83.1|10|km"),
        ),
        Case::param(
            "code:missing",
            "Observation",
            SearchParameter::new("code", SearchParamType::Token)
                .with_modifier(SearchModifier::Missing)
                .with_eq("true"),
        ),
        Case::param(
            "composite",
            "Observation",
            SearchParameter::new("code-value-quantity", SearchParamType::Composite)
                .with_eq("http://loinc.org|8480-6$gt100|http://unitsofmeasure.org|mm[Hg]"),
        ),
        Case::param(
            "chain",
            "Observation",
            SearchParameter::new("patient", SearchParamType::Reference).with_chain(
                SearchParameter::new("birthdate", SearchParamType::Date)
                    .with_value(SearchValue::parse("sa2000")),
            ),
        ),
        Case::new(
            "_has",
            SearchQuery::new("Patient").with_reverse_chain(ReverseChainedParameter::new(
                "Observation",
                "patient",
                code("http://loinc.org|8480-6"),
            )),
            "_id",
        ),
        Case::new(
            "inclusion criteria",
            SearchQuery::new("Observation")
                .with_parameter(subject("Patient/123").as_inclusion_criterion())
                .with_parameter(
                    SearchParameter::new("patient", SearchParamType::Reference)
                        .with_eq("Patient/123")
                        .as_inclusion_criterion(),
                )
                .with_parameter(code("http://loinc.org|8480-6")),
            "code",
        ),
    ]
}

// ============================================================================
// Grid Tests
// ============================================================================

/// Test every prefix on number, date, quantity and `_lastUpdated` values.
#[test]
fn test_prefix_grid_is_well_formed() {
    let grid = Grid::new();
    for case in prefix_cases() {
        grid.check(&case);
    }
}

/// Test every supported modifier and value form.
#[test]
fn test_modifier_grid_is_well_formed() {
    let grid = Grid::new();
    for case in modifier_cases() {
        grid.check(&case);
    }
}

/// Test pairs of cases combined in one request.
#[test]
fn test_pairwise_combinations_are_well_formed() {
    let grid = Grid::new();
    let cases: Vec<Case> = modifier_cases()
        .into_iter()
        .filter(|case| case.query.resource_type == "Observation")
        .collect();

    for (i, first) in cases.iter().enumerate() {
        for second in &cases[i + 1..] {
            let mut query = first.query.clone();
            query.parameters.extend(second.query.parameters.iter().cloned());
            query.reverse_chains.extend(second.query.reverse_chains.iter().cloned());
            grid.check(&Case::new(
                format!("{} + {}", first.label, second.label),
                query,
                first.sort,
            ));
        }
    }
}

/// Test integer parameters reject the range-only prefixes.
#[test]
fn test_integer_rejects_range_prefixes() {
    let grid = Grid::new();
    let ctx = grid.context();
    for prefix in [SearchPrefix::Sa, SearchPrefix::Eb] {
        let query = SearchQuery::new("MolecularSequence").with_parameter(with_prefix(
            "window-start",
            SearchParamType::Number,
            prefix,
            "100",
        ));
        let err = grid.orchestrator.build_data_query(&ctx, &query).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Search(SearchError::UnsupportedPrefix { .. })
        ));
    }
}
