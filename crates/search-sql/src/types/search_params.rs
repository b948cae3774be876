//! FHIR search parameter types.
//!
//! This module defines the parsed form of a FHIR search request as it arrives
//! at the compiler: parameter types, modifiers, prefixes, chained and reverse
//! chained parameters, include directives and sort directives.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Resource type name used for whole-system searches.
pub const WHOLE_SYSTEM_TYPE: &str = "Resource";

/// Target type marker for a chained reference that may point at any resource type.
pub const WILDCARD_TYPE: &str = "*";

/// FHIR search parameter types.
///
/// See: https://build.fhir.org/search.html#ptypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    /// A simple string, like a name or description.
    String,
    /// A search against a URI.
    Uri,
    /// A search for a number.
    Number,
    /// A search for a date, dateTime, or period.
    Date,
    /// A quantity, with a number and units.
    Quantity,
    /// A code from a code system or value set.
    Token,
    /// A reference to another resource.
    Reference,
    /// A composite search parameter that combines others.
    Composite,
    /// Special search parameters (near).
    Special,
}

impl fmt::Display for SearchParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchParamType::String => write!(f, "string"),
            SearchParamType::Uri => write!(f, "uri"),
            SearchParamType::Number => write!(f, "number"),
            SearchParamType::Date => write!(f, "date"),
            SearchParamType::Quantity => write!(f, "quantity"),
            SearchParamType::Token => write!(f, "token"),
            SearchParamType::Reference => write!(f, "reference"),
            SearchParamType::Composite => write!(f, "composite"),
            SearchParamType::Special => write!(f, "special"),
        }
    }
}

impl FromStr for SearchParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(SearchParamType::String),
            "uri" => Ok(SearchParamType::Uri),
            "number" => Ok(SearchParamType::Number),
            "date" => Ok(SearchParamType::Date),
            "quantity" => Ok(SearchParamType::Quantity),
            "token" => Ok(SearchParamType::Token),
            "reference" => Ok(SearchParamType::Reference),
            "composite" => Ok(SearchParamType::Composite),
            "special" => Ok(SearchParamType::Special),
            _ => Err(format!("unknown search parameter type: {}", s)),
        }
    }
}

/// Search modifiers that can be applied to search parameters.
///
/// See: https://build.fhir.org/search.html#modifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchModifier {
    /// Exact string match (string parameters).
    Exact,
    /// Contains substring (string parameters).
    Contains,
    /// Text search (token parameters).
    Text,
    /// Negation - exclude matches.
    Not,
    /// Match if value is missing.
    Missing,
    /// Match above in hierarchy (uri and canonical parameters).
    Above,
    /// Match below in hierarchy (uri and canonical parameters).
    Below,
    /// Match codes in a value set (token parameters).
    In,
    /// Match codes not in a value set (token parameters).
    NotIn,
    /// Match on identifier (reference parameters).
    Identifier,
    /// Specify reference type (reference parameters).
    Type(String),
    /// Match on type (token parameters for identifiers).
    OfType,
    /// Match on code only (token parameters).
    CodeOnly,
    /// Iterate through results (_include modifier).
    Iterate,
}

impl fmt::Display for SearchModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchModifier::Exact => write!(f, "exact"),
            SearchModifier::Contains => write!(f, "contains"),
            SearchModifier::Text => write!(f, "text"),
            SearchModifier::Not => write!(f, "not"),
            SearchModifier::Missing => write!(f, "missing"),
            SearchModifier::Above => write!(f, "above"),
            SearchModifier::Below => write!(f, "below"),
            SearchModifier::In => write!(f, "in"),
            SearchModifier::NotIn => write!(f, "not-in"),
            SearchModifier::Identifier => write!(f, "identifier"),
            SearchModifier::Type(t) => write!(f, "{}", t),
            SearchModifier::OfType => write!(f, "of-type"),
            SearchModifier::CodeOnly => write!(f, "code"),
            SearchModifier::Iterate => write!(f, "iterate"),
        }
    }
}

impl SearchModifier {
    /// Parses a modifier string, returning None for unknown modifiers.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "exact" => Some(SearchModifier::Exact),
            "contains" => Some(SearchModifier::Contains),
            "text" => Some(SearchModifier::Text),
            "not" => Some(SearchModifier::Not),
            "missing" => Some(SearchModifier::Missing),
            "above" => Some(SearchModifier::Above),
            "below" => Some(SearchModifier::Below),
            "in" => Some(SearchModifier::In),
            "not-in" => Some(SearchModifier::NotIn),
            "identifier" => Some(SearchModifier::Identifier),
            "of-type" | "oftype" => Some(SearchModifier::OfType),
            "code" => Some(SearchModifier::CodeOnly),
            "iterate" => Some(SearchModifier::Iterate),
            _ => {
                // Resource type modifiers start with an uppercase letter
                if s.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
                    Some(SearchModifier::Type(s.to_string()))
                } else {
                    None
                }
            }
        }
    }
}

/// Comparison prefixes for search parameters.
///
/// See: https://build.fhir.org/search.html#prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchPrefix {
    /// Equal (default).
    #[default]
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Ge,
    /// Less than or equal.
    Le,
    /// Starts after.
    Sa,
    /// Ends before.
    Eb,
    /// Approximately equal.
    Ap,
}

impl fmt::Display for SearchPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchPrefix::Eq => write!(f, "eq"),
            SearchPrefix::Ne => write!(f, "ne"),
            SearchPrefix::Gt => write!(f, "gt"),
            SearchPrefix::Lt => write!(f, "lt"),
            SearchPrefix::Ge => write!(f, "ge"),
            SearchPrefix::Le => write!(f, "le"),
            SearchPrefix::Sa => write!(f, "sa"),
            SearchPrefix::Eb => write!(f, "eb"),
            SearchPrefix::Ap => write!(f, "ap"),
        }
    }
}

impl FromStr for SearchPrefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eq" => Ok(SearchPrefix::Eq),
            "ne" => Ok(SearchPrefix::Ne),
            "gt" => Ok(SearchPrefix::Gt),
            "lt" => Ok(SearchPrefix::Lt),
            "ge" => Ok(SearchPrefix::Ge),
            "le" => Ok(SearchPrefix::Le),
            "sa" => Ok(SearchPrefix::Sa),
            "eb" => Ok(SearchPrefix::Eb),
            "ap" => Ok(SearchPrefix::Ap),
            _ => Err(format!("unknown search prefix: {}", s)),
        }
    }
}

impl SearchPrefix {
    /// Extracts a prefix from the beginning of a value string.
    ///
    /// Returns the prefix and the remaining value.
    pub fn extract(value: &str) -> (Self, &str) {
        if value.len() > 2 && value.is_char_boundary(2) {
            let prefix = &value[..2];
            if let Ok(p) = prefix.parse() {
                return (p, &value[2..]);
            }
        }
        (SearchPrefix::Eq, value)
    }

    /// Returns true if this prefix compares ranges (starts-after / ends-before).
    pub fn is_range_only(&self) -> bool {
        matches!(self, SearchPrefix::Sa | SearchPrefix::Eb)
    }
}

/// A parsed search parameter with its value.
///
/// Chained parameters keep the links after the first reference in `chain`,
/// in order; the last element is the terminal parameter and carries the
/// values. For `general-practitioner:Practitioner.name=Jones` the outer
/// parameter is `general-practitioner` with a `Practitioner` type modifier and
/// `chain` holds a single `name` string parameter with the value `Jones`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParameter {
    /// The parameter name (e.g., "name", "identifier").
    pub name: String,

    /// The parameter type.
    pub param_type: SearchParamType,

    /// Modifier, if any.
    pub modifier: Option<SearchModifier>,

    /// The search value(s). Multiple values are ORed.
    pub values: Vec<SearchValue>,

    /// Chained parameters (e.g., subject:Patient.name=Smith).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<SearchParameter>,

    /// Whether this parameter is a compartment inclusion criterion.
    #[serde(default)]
    pub inclusion_criterion: bool,
}

impl SearchParameter {
    /// Creates a parameter with no modifier and no values.
    pub fn new(name: impl Into<String>, param_type: SearchParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            modifier: None,
            values: Vec::new(),
            chain: Vec::new(),
            inclusion_criterion: false,
        }
    }

    /// Sets the modifier.
    pub fn with_modifier(mut self, modifier: SearchModifier) -> Self {
        self.modifier = Some(modifier);
        self
    }

    /// Adds a value.
    pub fn with_value(mut self, value: SearchValue) -> Self {
        self.values.push(value);
        self
    }

    /// Adds an unprefixed value.
    pub fn with_eq(self, value: impl Into<String>) -> Self {
        self.with_value(SearchValue::eq(value))
    }

    /// Appends a chain link.
    pub fn with_chain(mut self, link: SearchParameter) -> Self {
        self.chain.push(link);
        self
    }

    /// Marks the parameter as a compartment inclusion criterion.
    pub fn as_inclusion_criterion(mut self) -> Self {
        self.inclusion_criterion = true;
        self
    }

    /// Returns true if this parameter chains into another resource type.
    pub fn is_chained(&self) -> bool {
        !self.chain.is_empty()
    }

    /// Returns the reference type modifier, if present.
    pub fn type_modifier(&self) -> Option<&str> {
        match &self.modifier {
            Some(SearchModifier::Type(t)) => Some(t.as_str()),
            _ => None,
        }
    }

    /// Returns the values of the terminal chain link, or this parameter's values.
    pub fn terminal_values(&self) -> &[SearchValue] {
        match self.chain.last() {
            Some(last) => last.terminal_values(),
            None => &self.values,
        }
    }

    /// Renders the chain in request syntax, e.g. `subject:Patient.organization.name`.
    pub fn chain_display(&self) -> String {
        let mut out = self.name.clone();
        if let Some(t) = self.type_modifier() {
            out.push(':');
            out.push_str(t);
        }
        for link in &self.chain {
            out.push('.');
            out.push_str(&link.name);
            if let Some(t) = link.type_modifier() {
                out.push(':');
                out.push_str(t);
            }
        }
        out
    }
}

/// A single search value with optional prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchValue {
    /// The comparison prefix.
    pub prefix: SearchPrefix,

    /// The value to search for.
    pub value: String,

    /// Component parameters of a composite value, in definition order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<SearchParameter>,
}

impl SearchValue {
    /// Creates a new search value with the given prefix and value.
    pub fn new(prefix: SearchPrefix, value: impl Into<String>) -> Self {
        Self {
            prefix,
            value: value.into(),
            components: Vec::new(),
        }
    }

    /// Creates a search value with the default (eq) prefix.
    pub fn eq(value: impl Into<String>) -> Self {
        Self::new(SearchPrefix::Eq, value)
    }

    /// Parses a value string, extracting any prefix.
    pub fn parse(s: &str) -> Self {
        let (prefix, value) = SearchPrefix::extract(s);
        Self::new(prefix, value)
    }

    /// Creates a composite value from its component parameters.
    pub fn composite(components: Vec<SearchParameter>) -> Self {
        let value = components
            .iter()
            .map(|c| {
                c.values
                    .first()
                    .map(|v| v.value.clone())
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join("$");
        Self {
            prefix: SearchPrefix::Eq,
            value,
            components,
        }
    }
}

/// A reverse chained parameter (_has).
///
/// `Patient?_has:Observation:patient:code=1234` selects patients referenced by
/// an Observation's `patient` parameter where that Observation has `code=1234`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseChainedParameter {
    /// The resource type that references this resource.
    pub source_type: String,

    /// The reference parameter on the source type.
    pub reference_param: String,

    /// What the referencing resources must match.
    pub target: ReverseChainTarget,
}

/// The filter applied to the referencing resources of a reverse chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReverseChainTarget {
    /// A search parameter on the source type.
    Parameter(Box<SearchParameter>),
    /// A further `_has` nested under the source type.
    Nested(Box<ReverseChainedParameter>),
}

impl ReverseChainedParameter {
    /// Creates a reverse chain ending in a search parameter.
    pub fn new(
        source_type: impl Into<String>,
        reference_param: impl Into<String>,
        parameter: SearchParameter,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            reference_param: reference_param.into(),
            target: ReverseChainTarget::Parameter(Box::new(parameter)),
        }
    }

    /// Creates a reverse chain that continues with another `_has`.
    pub fn nested(
        source_type: impl Into<String>,
        reference_param: impl Into<String>,
        inner: ReverseChainedParameter,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            reference_param: reference_param.into(),
            target: ReverseChainTarget::Nested(Box::new(inner)),
        }
    }

    /// Number of `_has` levels, counting this one.
    pub fn depth(&self) -> usize {
        match &self.target {
            ReverseChainTarget::Parameter(_) => 1,
            ReverseChainTarget::Nested(inner) => 1 + inner.depth(),
        }
    }
}

/// Include directive for _include and _revinclude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeDirective {
    /// The type of include.
    pub include_type: IncludeType,

    /// The source resource type (the type that holds the reference).
    pub source_type: String,

    /// The search parameter (reference) to follow.
    pub search_param: String,

    /// Optional target resource type filter.
    pub target_type: Option<String>,

    /// Whether to iterate (follow includes of included resources).
    pub iterate: bool,
}

impl IncludeDirective {
    /// Creates an `_include` directive.
    pub fn include(
        source_type: impl Into<String>,
        search_param: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        Self {
            include_type: IncludeType::Include,
            source_type: source_type.into(),
            search_param: search_param.into(),
            target_type: Some(target_type.into()),
            iterate: false,
        }
    }

    /// Creates a `_revinclude` directive.
    pub fn revinclude(source_type: impl Into<String>, search_param: impl Into<String>) -> Self {
        Self {
            include_type: IncludeType::Revinclude,
            source_type: source_type.into(),
            search_param: search_param.into(),
            target_type: None,
            iterate: false,
        }
    }
}

/// Type of include operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncludeType {
    /// Forward include (_include).
    Include,
    /// Reverse include (_revinclude).
    Revinclude,
}

/// Sort direction for _sort parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Ascending,
    /// Descending order.
    Descending,
}

/// A sort directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortDirective {
    /// The parameter to sort by.
    pub parameter: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl SortDirective {
    /// Parses a sort parameter value (e.g., "-date" for descending).
    pub fn parse(s: &str) -> Self {
        if let Some(stripped) = s.strip_prefix('-') {
            Self {
                parameter: stripped.to_string(),
                direction: SortDirection::Descending,
            }
        } else {
            Self {
                parameter: s.to_string(),
                direction: SortDirection::Ascending,
            }
        }
    }
}

/// A complete search query with all parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The resource type being searched, or `Resource` for whole-system search.
    pub resource_type: String,

    /// Standard search parameters. Parameters are ANDed.
    pub parameters: Vec<SearchParameter>,

    /// Reverse chain parameters (_has).
    pub reverse_chains: Vec<ReverseChainedParameter>,

    /// Include directives.
    pub includes: Vec<IncludeDirective>,

    /// Sort directives.
    pub sort: Vec<SortDirective>,
}

impl SearchQuery {
    /// Creates a new search query for the given resource type.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Default::default()
        }
    }

    /// Creates a whole-system search query.
    pub fn whole_system() -> Self {
        Self::new(WHOLE_SYSTEM_TYPE)
    }

    /// Adds a search parameter.
    pub fn with_parameter(mut self, param: SearchParameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Adds a reverse chain.
    pub fn with_reverse_chain(mut self, has: ReverseChainedParameter) -> Self {
        self.reverse_chains.push(has);
        self
    }

    /// Adds an include directive.
    pub fn with_include(mut self, include: IncludeDirective) -> Self {
        self.includes.push(include);
        self
    }

    /// Adds a sort directive.
    pub fn with_sort(mut self, sort: SortDirective) -> Self {
        self.sort.push(sort);
        self
    }

    /// Returns true if the query spans every resource type.
    pub fn is_whole_system(&self) -> bool {
        self.resource_type.is_empty() || self.resource_type == WHOLE_SYSTEM_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_param_type_parse() {
        assert_eq!(
            "TOKEN".parse::<SearchParamType>().unwrap(),
            SearchParamType::Token
        );
        assert!("geo".parse::<SearchParamType>().is_err());
    }

    #[test]
    fn test_search_modifier_parse() {
        assert_eq!(SearchModifier::parse("exact"), Some(SearchModifier::Exact));
        assert_eq!(SearchModifier::parse("not-in"), Some(SearchModifier::NotIn));
        assert_eq!(
            SearchModifier::parse("Practitioner"),
            Some(SearchModifier::Type("Practitioner".to_string()))
        );
        assert_eq!(SearchModifier::parse("unknown"), None);
    }

    #[test]
    fn test_search_prefix_extract() {
        assert_eq!(
            SearchPrefix::extract("ge2020-01-01"),
            (SearchPrefix::Ge, "2020-01-01")
        );
        assert_eq!(
            SearchPrefix::extract("2020-01-01"),
            (SearchPrefix::Eq, "2020-01-01")
        );
        // A bare prefix is a value, not a prefix
        assert_eq!(SearchPrefix::extract("ne"), (SearchPrefix::Eq, "ne"));
        assert!(SearchPrefix::Sa.is_range_only());
        assert!(!SearchPrefix::Ge.is_range_only());
    }

    #[test]
    fn test_chain_display() {
        let param = SearchParameter::new("subject", SearchParamType::Reference)
            .with_modifier(SearchModifier::Type("Patient".to_string()))
            .with_chain(
                SearchParameter::new("organization", SearchParamType::Reference)
                    .with_modifier(SearchModifier::Type("Organization".to_string())),
            )
            .with_chain(SearchParameter::new("name", SearchParamType::String).with_eq("Acme"));

        assert_eq!(
            param.chain_display(),
            "subject:Patient.organization:Organization.name"
        );
        assert!(param.is_chained());
        assert_eq!(param.terminal_values()[0].value, "Acme");
    }

    #[test]
    fn test_composite_value() {
        let value = SearchValue::composite(vec![
            SearchParameter::new("code", SearchParamType::Token).with_eq("http://loinc.org|1234"),
            SearchParameter::new("value-quantity", SearchParamType::Quantity)
                .with_value(SearchValue::parse("gt5.4")),
        ]);
        assert_eq!(value.components.len(), 2);
        assert_eq!(value.value, "http://loinc.org|1234$5.4");
    }

    #[test]
    fn test_reverse_chain_depth() {
        let inner = ReverseChainedParameter::new(
            "AuditEvent",
            "entity",
            SearchParameter::new("agent", SearchParamType::Reference).with_eq("Practitioner/1"),
        );
        let outer = ReverseChainedParameter::nested("Observation", "patient", inner);
        assert_eq!(outer.depth(), 2);
    }

    #[test]
    fn test_whole_system_query() {
        assert!(SearchQuery::whole_system().is_whole_system());
        assert!(!SearchQuery::new("Patient").is_whole_system());
    }

    #[test]
    fn test_sort_directive_parse() {
        let desc = SortDirective::parse("-birthdate");
        assert_eq!(desc.parameter, "birthdate");
        assert_eq!(desc.direction, SortDirection::Descending);
    }
}
