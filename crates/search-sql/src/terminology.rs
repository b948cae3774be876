//! Value set expansion for the token `:in` and `:not-in` modifiers.
//!
//! The compiler holds no terminology content. A host that supports these
//! modifiers supplies a [`CodeSetExpander`] through
//! [`SearchContext::with_code_sets`](crate::SearchContext::with_code_sets);
//! each value set is expanded while the domain is built and rendered as
//! `TOKEN_VALUE IN (...) AND CODE_SYSTEM_ID = n` per code system.
//!
//! # Example
//!
//! ```
//! use std::collections::{BTreeMap, BTreeSet};
//!
//! use helios_search_sql::error::SearchResult;
//! use helios_search_sql::terminology::{CodeSetExpander, CodeSets};
//!
//! let expander = |url: &str| -> SearchResult<Option<CodeSets>> {
//!     if url != "http://acme.org/ValueSet/bp" {
//!         return Ok(None);
//!     }
//!     let codes = BTreeSet::from(["8480-6".to_string(), "8462-4".to_string()]);
//!     Ok(Some(BTreeMap::from([("http://loinc.org".to_string(), codes)])))
//! };
//!
//! let sets = expander.expand("http://acme.org/ValueSet/bp").unwrap().unwrap();
//! assert_eq!(sets["http://loinc.org"].len(), 2);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SearchResult;

/// Codes of an expanded value set, keyed by code system URI.
pub type CodeSets = BTreeMap<String, BTreeSet<String>>;

/// Expands value sets named by `:in` and `:not-in` token values.
///
/// An unknown value set is `Ok(None)`. Failed lookups are reported as
/// [`SearchError::CodeSetExpansionFailed`](crate::error::SearchError::CodeSetExpansionFailed).
pub trait CodeSetExpander: Send + Sync {
    /// Expands the value set with canonical URL `url`.
    fn expand(&self, url: &str) -> SearchResult<Option<CodeSets>>;
}

impl<F> CodeSetExpander for F
where
    F: Fn(&str) -> SearchResult<Option<CodeSets>> + Send + Sync,
{
    fn expand(&self, url: &str) -> SearchResult<Option<CodeSets>> {
        self(url)
    }
}

/// Strips a `|version` suffix; token values are stored without it.
pub(crate) fn unversioned(system: &str) -> &str {
    match system.rfind('|') {
        Some(index) => &system[..index],
        None => system,
    }
}
