//! Typed nodes of a compiled search.
//!
//! Nodes hold values already parsed and validated for their parameter
//! category (date bounds, decimal bounds, token forms, bounding boxes), so the
//! renderer only decides table names, aliases and predicate text.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::range::BoundPair;
use crate::schema::ValueTable;
use crate::types::{CanonicalValue, IncludeType, SearchPrefix, SortDirection};

/// One node of the search domain.
#[derive(Debug, Clone)]
pub enum SearchNode {
    /// String and URI parameters.
    String(StringNode),
    /// Number parameters.
    Number(NumberNode),
    /// Date parameters.
    Date(DateNode),
    /// Token parameters.
    Token(TokenNode),
    /// Quantity parameters.
    Quantity(QuantityNode),
    /// Plain reference parameters.
    Reference(ReferenceNode),
    /// Forward chained references.
    Chained(ChainedNode),
    /// Reverse chained references (`_has`).
    ReverseChained(ReverseChainNode),
    /// Composite parameters.
    Composite(CompositeNode),
    /// The `:missing` modifier on any parameter.
    Missing(MissingNode),
    /// `near` on Location.
    Location(LocationNode),
    /// `_id`.
    Id(IdNode),
    /// `_lastUpdated`.
    LastUpdated(LastUpdatedNode),
    /// `_profile`.
    Canonical(CanonicalNode),
    /// `_tag` and `_security`.
    Tag(TagNode),
    /// Compartment inclusion criteria.
    Inclusion(InclusionNode),
    /// `_sort` keys.
    Sort(SortNode),
}

impl SearchNode {
    /// Short category name used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchNode::String(_) => "string",
            SearchNode::Number(_) => "number",
            SearchNode::Date(_) => "date",
            SearchNode::Token(_) => "token",
            SearchNode::Quantity(_) => "quantity",
            SearchNode::Reference(_) => "reference",
            SearchNode::Chained(_) => "chained",
            SearchNode::ReverseChained(_) => "reverse-chained",
            SearchNode::Composite(_) => "composite",
            SearchNode::Missing(_) => "missing",
            SearchNode::Location(_) => "location",
            SearchNode::Id(_) => "id",
            SearchNode::LastUpdated(_) => "last-updated",
            SearchNode::Canonical(_) => "canonical",
            SearchNode::Tag(_) => "tag",
            SearchNode::Inclusion(_) => "inclusion",
            SearchNode::Sort(_) => "sort",
        }
    }

    /// Returns true for nodes that belong to the compartment group.
    pub fn is_inclusion(&self) -> bool {
        match self {
            SearchNode::Inclusion(_) => true,
            SearchNode::Chained(chain) => chain.inclusion,
            _ => false,
        }
    }
}

/// A prefix with the search interval it compares against.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeValue<T> {
    /// Comparison prefix.
    pub prefix: SearchPrefix,
    /// Half-open search interval.
    pub bounds: BoundPair<T>,
}

/// How string values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMatch {
    /// Case-insensitive prefix match on the normalized column.
    StartsWith,
    /// Case-insensitive substring match on the normalized column.
    Contains,
    /// Exact match on the original column.
    Exact,
    /// URI equal to the value or one of its ancestor paths.
    Above,
    /// URI equal to the value or nested below it.
    Below,
}

/// String or URI parameter.
#[derive(Debug, Clone)]
pub struct StringNode {
    /// Parameter name whose id keys the join.
    pub code: String,
    /// Comparison mode.
    pub match_kind: StringMatch,
    /// Values, ORed.
    pub values: Vec<String>,
}

/// Number parameter.
#[derive(Debug, Clone)]
pub struct NumberNode {
    /// Parameter name.
    pub code: String,
    /// True when stored values have low and high columns.
    pub range: bool,
    /// Values, ORed.
    pub values: Vec<RangeValue<Decimal>>,
}

/// Date parameter.
#[derive(Debug, Clone)]
pub struct DateNode {
    /// Parameter name.
    pub code: String,
    /// Values, ORed.
    pub values: Vec<RangeValue<NaiveDateTime>>,
}

/// The forms a token value can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenMatch {
    /// `code`: any system.
    Code(String),
    /// `system|code`, and `|code` with the default token system.
    SystemCode {
        /// Code system URI.
        system: String,
        /// Code.
        code: String,
    },
    /// `system|`: any code in the system.
    System(String),
    /// The codes of one system in an expanded value set.
    CodeSet {
        /// Code system URI, without version.
        system: String,
        /// Codes; an empty list matches nothing.
        codes: Vec<String>,
    },
}

/// Token parameter.
#[derive(Debug, Clone)]
pub struct TokenNode {
    /// Parameter name.
    pub code: String,
    /// `:not`
    pub negated: bool,
    /// Values, ORed.
    pub values: Vec<TokenMatch>,
}

/// Quantity value with optional unit filters.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityValue {
    /// The numeric comparison.
    pub range: RangeValue<Decimal>,
    /// Unit system URI.
    pub system: Option<String>,
    /// Unit code.
    pub unit: Option<String>,
}

/// Quantity parameter.
#[derive(Debug, Clone)]
pub struct QuantityNode {
    /// Parameter name.
    pub code: String,
    /// True when the target element is a Range.
    pub range: bool,
    /// Values, ORed.
    pub values: Vec<QuantityValue>,
}

/// How a reference value is matched against the stored `Type/id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceMatch {
    /// Any of these references, verbatim.
    Exact(Vec<String>),
    /// A bare id with no known target type: any `*/id`.
    Suffix(String),
    /// A specific version of a reference.
    Versioned {
        /// `Type/id`
        reference: String,
        /// Version id.
        version: i64,
    },
}

/// Plain reference parameter.
#[derive(Debug, Clone)]
pub struct ReferenceNode {
    /// Parameter name.
    pub code: String,
    /// Values, ORed.
    pub values: Vec<ReferenceMatch>,
}

/// Resource types a chain hop can point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainTarget {
    /// One resource type.
    Type(String),
    /// Every listed resource type (`*`).
    Wildcard(Vec<String>),
}

/// A reference followed from one resource type to the next.
#[derive(Debug, Clone)]
pub struct ChainHop {
    /// Reference parameter name on the source side.
    pub code: String,
    /// Where the reference points.
    pub target: ChainTarget,
}

/// Forward chain such as `general-practitioner:Practitioner.name=Jones`.
///
/// `hops[0]` is the reference on the searched type. The terminal node is
/// evaluated on the target of the last hop.
#[derive(Debug, Clone)]
pub struct ChainedNode {
    /// The chain in request syntax.
    pub display: String,
    /// Reference hops, outermost first.
    pub hops: Vec<ChainHop>,
    /// Filter on the final target type.
    pub terminal: Box<SearchNode>,
    /// True for compartment inclusion criteria.
    pub inclusion: bool,
}

/// What the referencing resources of a `_has` must match.
#[derive(Debug, Clone)]
pub enum ReverseChainFilter {
    /// A parameter on the referencing type.
    Node(Box<SearchNode>),
    /// A further `_has` on the referencing type.
    Nested(Box<ReverseChainNode>),
}

/// Reverse chain (`_has:Source:reference:...`).
#[derive(Debug, Clone)]
pub struct ReverseChainNode {
    /// Resource type holding the reference.
    pub source_type: String,
    /// Reference parameter on the source type.
    pub reference_code: String,
    /// Filter applied to the source resources.
    pub filter: ReverseChainFilter,
}

/// One component of a composite value.
#[derive(Debug, Clone)]
pub struct CompositeComponent {
    /// The component, built as an ordinary parameter node.
    pub node: SearchNode,
}

/// Composite parameter. Each value lists its components in definition order.
#[derive(Debug, Clone)]
pub struct CompositeNode {
    /// Parameter name.
    pub code: String,
    /// Values, ORed.
    pub values: Vec<Vec<CompositeComponent>>,
}

/// `:missing=true|false`
#[derive(Debug, Clone)]
pub struct MissingNode {
    /// Parameter name checked for presence.
    pub code: String,
    /// Table checked.
    pub table: ValueTable,
    /// True when the parameter must be absent.
    pub missing: bool,
}

/// Latitude and longitude limits, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Southern edge.
    pub min_lat: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Western edge.
    pub min_lng: f64,
    /// Eastern edge.
    pub max_lng: f64,
}

/// `near` on Location.
#[derive(Debug, Clone)]
pub struct LocationNode {
    /// Parameter name.
    pub code: String,
    /// Boxes, ORed.
    pub boxes: Vec<BoundingBox>,
}

/// `_id`
#[derive(Debug, Clone)]
pub struct IdNode {
    /// Logical ids, ORed.
    pub ids: Vec<String>,
}

/// `_lastUpdated`
#[derive(Debug, Clone)]
pub struct LastUpdatedNode {
    /// Values, ORed.
    pub values: Vec<RangeValue<NaiveDateTime>>,
}

/// Version comparison applied to a canonical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalMatch {
    /// Same version.
    Exact,
    /// Version at or above.
    Above,
    /// Version below.
    Below,
}

/// `_profile`
#[derive(Debug, Clone)]
pub struct CanonicalNode {
    /// Parameter name.
    pub code: String,
    /// Version comparison.
    pub match_kind: CanonicalMatch,
    /// Values, ORed.
    pub values: Vec<CanonicalValue>,
}

/// `_tag` or `_security`
#[derive(Debug, Clone)]
pub struct TagNode {
    /// Parameter name.
    pub code: String,
    /// `_TAGS` or `_SECURITY`.
    pub table: ValueTable,
    /// `:not`
    pub negated: bool,
    /// Values, ORed.
    pub values: Vec<TokenMatch>,
}

/// Compartment inclusion criterion: the reference must be one of the values.
#[derive(Debug, Clone)]
pub struct InclusionNode {
    /// Reference parameter name.
    pub code: String,
    /// `Type/id` references.
    pub references: Vec<String>,
}

/// Column a sort key aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortColumn {
    /// `LOGICAL_RESOURCES.LOGICAL_ID`
    LogicalId,
    /// `LOGICAL_RESOURCES.LAST_UPDATED`
    LastUpdated,
    /// A parameter value table. Ascending sorts aggregate `ascending` with
    /// `MIN`, descending sorts aggregate `descending` with `MAX`.
    Value {
        /// Joined table.
        table: ValueTable,
        /// Column for ascending order.
        ascending: &'static str,
        /// Column for descending order.
        descending: &'static str,
    },
}

/// One `_sort` key.
#[derive(Debug, Clone)]
pub struct SortNode {
    /// Parameter name.
    pub code: String,
    /// Direction.
    pub direction: SortDirection,
    /// Aggregated column.
    pub column: SortColumn,
}

/// A resolved `_include` or `_revinclude` for one target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeNode {
    /// Include or revinclude.
    pub include_type: IncludeType,
    /// Type holding the reference.
    pub source_type: String,
    /// Reference parameter on the source type.
    pub code: String,
    /// Type the reference points at.
    pub target_type: String,
}
