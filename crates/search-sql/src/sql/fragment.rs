//! SQL fragments with bound parameters.
//!
//! Fragments are written with the neutral placeholder `?`. Placeholders are
//! numbered by the dialect only once the whole statement is assembled, so
//! fragments can be composed in any order without offset bookkeeping; the
//! bind list always follows the textual order of the placeholders.

use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Neutral placeholder used while a statement is being composed.
pub const PLACEHOLDER: &str = "?";

/// A fragment of SQL with bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    /// The SQL clause.
    pub sql: String,
    /// Bound parameter values, in placeholder order.
    pub params: Vec<SqlParam>,
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Text parameter.
    Text(String),
    /// Integer parameter.
    Integer(i64),
    /// Exact decimal parameter.
    Decimal(Decimal),
    /// Floating point parameter.
    Float(f64),
    /// Timestamp parameter, always UTC.
    Timestamp(NaiveDateTime),
    /// Null parameter.
    Null,
}

impl SqlParam {
    /// Creates a text parameter.
    pub fn text(s: impl Into<String>) -> Self {
        SqlParam::Text(s.into())
    }

    /// Creates an integer parameter.
    pub fn integer(i: i64) -> Self {
        SqlParam::Integer(i)
    }

    /// Creates a float parameter.
    pub fn float(f: f64) -> Self {
        SqlParam::Float(f)
    }

    /// Renders the value as a SQL literal, for logging only.
    pub fn to_literal(&self) -> String {
        match self {
            SqlParam::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlParam::Integer(i) => i.to_string(),
            SqlParam::Decimal(d) => d.to_string(),
            SqlParam::Float(f) => f.to_string(),
            SqlParam::Timestamp(ts) => format!("'{}'", ts.format("%Y-%m-%dT%H:%M:%S%.f")),
            SqlParam::Null => "NULL".to_string(),
        }
    }
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

impl From<Decimal> for SqlParam {
    fn from(value: Decimal) -> Self {
        SqlParam::Decimal(value)
    }
}

impl From<NaiveDateTime> for SqlParam {
    fn from(value: NaiveDateTime) -> Self {
        SqlParam::Timestamp(value)
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        SqlParam::Float(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl SqlFragment {
    /// Creates a new SQL fragment.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a fragment with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Adds a parameter and returns its placeholder.
    pub fn add_param(&mut self, param: impl Into<SqlParam>) -> &'static str {
        self.params.push(param.into());
        PLACEHOLDER
    }

    /// Appends raw SQL text.
    pub fn push_str(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Appends a bound value as a placeholder.
    pub fn push_bind(&mut self, param: impl Into<SqlParam>) -> &mut Self {
        let placeholder = self.add_param(param);
        self.sql.push_str(placeholder);
        self
    }

    /// Appends another fragment, keeping its parameters.
    pub fn push_fragment(&mut self, other: SqlFragment) -> &mut Self {
        self.sql.push_str(&other.sql);
        self.params.extend(other.params);
        self
    }

    /// Combines with another fragment using AND.
    pub fn and(mut self, other: SqlFragment) -> Self {
        if !self.sql.is_empty() && !other.sql.is_empty() {
            self.sql = format!("{} AND {}", self.sql, other.sql);
        } else if !other.sql.is_empty() {
            self.sql = other.sql;
        }
        self.params.extend(other.params);
        self
    }

    /// Joins fragments with `separator`, skipping empty ones.
    pub fn join(fragments: impl IntoIterator<Item = SqlFragment>, separator: &str) -> Self {
        let mut out = SqlFragment::default();
        for fragment in fragments.into_iter().filter(|f| !f.is_empty()) {
            if !out.sql.is_empty() {
                out.sql.push_str(separator);
            }
            out.push_fragment(fragment);
        }
        out
    }

    /// ANDs all fragments together.
    pub fn and_all(fragments: impl IntoIterator<Item = SqlFragment>) -> Self {
        Self::join(fragments, " AND ")
    }

    /// ORs all fragments together, parenthesizing when there is more than one.
    pub fn or_all(fragments: impl IntoIterator<Item = SqlFragment>) -> Self {
        let parts: Vec<SqlFragment> = fragments.into_iter().filter(|f| !f.is_empty()).collect();
        let several = parts.len() > 1;
        let joined = Self::join(parts, " OR ");
        if several { joined.parenthesized() } else { joined }
    }

    /// Wraps the fragment in parentheses.
    pub fn parenthesized(mut self) -> Self {
        self.sql = format!("({})", self.sql);
        self
    }

    /// Returns true if this fragment is empty.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Counts neutral placeholders outside of quoted literals.
    pub fn placeholder_count(&self) -> usize {
        let mut in_quote = false;
        let mut count = 0;
        for c in self.sql.chars() {
            match c {
                '\'' => in_quote = !in_quote,
                '?' if !in_quote => count += 1,
                _ => {}
            }
        }
        count
    }
}

/// Escapes LIKE metacharacters with `+`, the escape character used by every
/// generated LIKE clause.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '+' | '%' | '_') {
            out.push('+');
        }
        out.push(c);
    }
    out
}

/// The escape clause appended to every generated LIKE.
pub const LIKE_ESCAPE: &str = " ESCAPE '+'";
