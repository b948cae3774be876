//! Database dialects.
//!
//! The compiler emits one logical statement; a [`RenderDialect`] decides how
//! placeholders are numbered, how a page of rows is requested, and whether an
//! optimizer hint can be attached.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Translates dialect-specific pieces of a statement.
pub trait RenderDialect: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns the placeholder for the 1-based bind position `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Returns the clause that skips `offset` rows and returns at most `limit`.
    fn pagination(&self, offset: u64, limit: u64) -> String;

    /// Returns the text to append for an opaque optimizer hint, if supported.
    fn optimizer_hint(&self, _hint: &str) -> Option<String> {
        None
    }

    /// Returns the string concatenation of two SQL expressions.
    fn concat(&self, left: &str, right: &str) -> String {
        format!("{} || {}", left, right)
    }
}

/// Apache Derby (embedded deployments and tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct DerbyDialect;

impl RenderDialect for DerbyDialect {
    fn name(&self) -> &'static str {
        "derby"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn pagination(&self, offset: u64, limit: u64) -> String {
        format!("OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, limit)
    }
}

/// IBM Db2.
#[derive(Debug, Clone, Copy, Default)]
pub struct Db2Dialect;

impl RenderDialect for Db2Dialect {
    fn name(&self) -> &'static str {
        "db2"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn pagination(&self, offset: u64, limit: u64) -> String {
        format!("OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, limit)
    }

    fn optimizer_hint(&self, hint: &str) -> Option<String> {
        let hint = hint.trim();
        if hint.is_empty() {
            None
        } else {
            Some(format!("/* {} */", hint.replace("*/", "* /")))
        }
    }
}

/// PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl RenderDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn pagination(&self, offset: u64, limit: u64) -> String {
        format!("LIMIT {} OFFSET {}", limit, offset)
    }
}

/// Selects a built-in dialect from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// [`DerbyDialect`]
    #[default]
    Derby,
    /// [`Db2Dialect`]
    Db2,
    /// [`PostgresDialect`]
    Postgres,
}

impl DialectKind {
    /// Creates the dialect implementation.
    pub fn create(&self) -> Box<dyn RenderDialect> {
        match self {
            DialectKind::Derby => Box::new(DerbyDialect),
            DialectKind::Db2 => Box::new(Db2Dialect),
            DialectKind::Postgres => Box::new(PostgresDialect),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialectKind::Derby => write!(f, "derby"),
            DialectKind::Db2 => write!(f, "db2"),
            DialectKind::Postgres => write!(f, "postgres"),
        }
    }
}
