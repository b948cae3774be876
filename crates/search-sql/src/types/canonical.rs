//! Canonical URL values of the form `uri|version#fragment`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SearchError, SearchResult};

/// A parsed canonical reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalValue {
    /// The canonical URL.
    pub uri: String,
    /// Business version, after `|`.
    pub version: Option<String>,
    /// Fragment, after `#`.
    pub fragment: Option<String>,
}

impl CanonicalValue {
    /// Parses `uri`, `uri|version`, `uri#fragment` or `uri|version#fragment`.
    ///
    /// A `|` at the very start, or a `#` that comes before the `|`, is rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use helios_search_sql::types::CanonicalValue;
    ///
    /// let c = CanonicalValue::parse("http://example.org/Profile|2.0#part").unwrap();
    /// assert_eq!(c.uri, "http://example.org/Profile");
    /// assert_eq!(c.version.as_deref(), Some("2.0"));
    /// assert_eq!(c.fragment.as_deref(), Some("part"));
    ///
    /// assert!(CanonicalValue::parse("|2.0").is_err());
    /// ```
    pub fn parse(value: &str) -> SearchResult<Self> {
        let invalid = |message: &str| SearchError::InvalidCanonical {
            value: value.to_string(),
            message: message.to_string(),
        };

        let pipe = value.find('|');
        let hash = value.find('#');

        if pipe == Some(0) {
            return Err(invalid("missing uri before version separator"));
        }
        if let (Some(p), Some(h)) = (pipe, hash) {
            if h < p {
                return Err(invalid("fragment appears before version"));
            }
        }

        let (rest, fragment) = match hash {
            Some(h) => (&value[..h], Some(value[h + 1..].to_string())),
            None => (value, None),
        };
        let (uri, version) = match rest.find('|') {
            Some(p) => (&rest[..p], Some(rest[p + 1..].to_string())),
            None => (rest, None),
        };

        if uri.is_empty() {
            return Err(invalid("missing uri"));
        }

        Ok(Self {
            uri: uri.to_string(),
            version: version.filter(|v| !v.is_empty()),
            fragment: fragment.filter(|f| !f.is_empty()),
        })
    }
}

impl fmt::Display for CanonicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)?;
        if let Some(v) = &self.version {
            write!(f, "|{}", v)?;
        }
        if let Some(frag) = &self.fragment {
            write!(f, "#{}", frag)?;
        }
        Ok(())
    }
}
