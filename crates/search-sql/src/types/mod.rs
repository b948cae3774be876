//! Core types for the search compiler.
//!
//! - [`SearchParameter`], [`SearchQuery`] - the parsed search request
//! - [`CanonicalValue`] - `uri|version#fragment` values
//! - [`Pagination`] - page selection
//!
//! # Building a Search Query
//!
//! ```
//! use helios_search_sql::types::{
//!     SearchModifier, SearchParamType, SearchParameter, SearchQuery, SortDirective,
//! };
//!
//! let query = SearchQuery::new("Patient")
//!     .with_parameter(SearchParameter::new("family", SearchParamType::String).with_eq("Smith"))
//!     .with_parameter(
//!         SearchParameter::new("general-practitioner", SearchParamType::Reference)
//!             .with_modifier(SearchModifier::Type("Practitioner".to_string()))
//!             .with_chain(SearchParameter::new("name", SearchParamType::String).with_eq("Jones")),
//!     )
//!     .with_sort(SortDirective::parse("-birthdate"));
//!
//! assert_eq!(query.parameters.len(), 2);
//! assert!(query.parameters[1].is_chained());
//! ```

mod canonical;
mod pagination;
mod search_params;

pub use canonical::CanonicalValue;
pub use pagination::Pagination;
pub use search_params::{
    IncludeDirective, IncludeType, ReverseChainTarget, ReverseChainedParameter,
    SearchModifier, SearchParamType, SearchParameter, SearchPrefix, SearchQuery, SearchValue,
    SortDirection, SortDirective, WHOLE_SYSTEM_TYPE, WILDCARD_TYPE,
};
