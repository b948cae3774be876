//! The search domain: a typed tree of filter, sort and include nodes.
//!
//! [`DomainBuilder`] classifies every parameter of a [`SearchQuery`] into
//! exactly one [`SearchNode`]. Values are parsed and validated here, so
//! everything that can fail on user input fails before any SQL is written.
//!
//! # Example
//!
//! ```
//! use helios_search_sql::config::SearchConfig;
//! use helios_search_sql::domain::{DomainBuilder, SearchNode};
//! use helios_search_sql::registry::SearchParameterRegistry;
//! use helios_search_sql::types::{SearchParamType, SearchParameter, SearchQuery};
//!
//! let registry = SearchParameterRegistry::new();
//! let config = SearchConfig::default();
//! let query = SearchQuery::new("Patient")
//!     .with_parameter(SearchParameter::new("family", SearchParamType::String).with_eq("Smith"));
//!
//! let domain = DomainBuilder::new(&registry, &config).build(&query).unwrap().unwrap();
//! assert!(matches!(domain.nodes[0], SearchNode::String(_)));
//! ```
//!
//! [`SearchQuery`]: crate::types::SearchQuery

mod builder;
mod node;
mod values;

pub use builder::DomainBuilder;
pub use node::{
    BoundingBox, CanonicalMatch, CanonicalNode, ChainHop, ChainTarget, ChainedNode,
    CompositeComponent, CompositeNode, DateNode, IdNode, IncludeNode, InclusionNode,
    LastUpdatedNode, LocationNode, MissingNode, NumberNode, QuantityNode, QuantityValue,
    RangeValue, ReferenceMatch, ReferenceNode, ReverseChainFilter, ReverseChainNode, SearchNode,
    SortColumn, SortNode, StringMatch, StringNode, TagNode, TokenMatch, TokenNode,
};

pub(crate) use values::{uri_ancestors, validate_type_name};

/// The resource types a search runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainScope {
    /// A single resource type.
    Type(String),
    /// Every listed type, in name order.
    WholeSystem(Vec<String>),
}

/// A compiled search: its scope and its nodes in request order.
///
/// Filter nodes are ANDed, except that inclusion nodes form one OR group.
/// Sort nodes follow the filters in `_sort` order.
#[derive(Debug, Clone)]
pub struct SearchDomain {
    /// Resource types searched.
    pub scope: DomainScope,
    /// Filter and sort nodes.
    pub nodes: Vec<SearchNode>,
}

impl SearchDomain {
    /// Filter nodes, skipping sort keys.
    pub fn filters(&self) -> impl Iterator<Item = &SearchNode> {
        self.nodes
            .iter()
            .filter(|n| !matches!(n, SearchNode::Sort(_)))
    }

    /// Sort keys in order.
    pub fn sorts(&self) -> impl Iterator<Item = &SortNode> {
        self.nodes.iter().filter_map(|n| match n {
            SearchNode::Sort(sort) => Some(sort),
            _ => None,
        })
    }

    /// Returns true if the search has `_sort` keys.
    pub fn is_sorted(&self) -> bool {
        self.sorts().next().is_some()
    }
}
