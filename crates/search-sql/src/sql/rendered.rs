//! Final statement form handed to the caller.

use super::dialect::RenderDialect;
use super::fragment::{SqlFragment, SqlParam};

/// A complete SQL statement with its ordered binds.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    /// SQL text with dialect placeholders.
    pub sql: String,
    /// Bind values in placeholder order.
    pub binds: Vec<SqlParam>,
    template: String,
}

impl RenderedQuery {
    /// Numbers the neutral placeholders of `fragment` for `dialect`.
    pub fn finalize(fragment: SqlFragment, dialect: &dyn RenderDialect) -> Self {
        let mut sql = String::with_capacity(fragment.sql.len() + fragment.params.len() * 2);
        let mut in_quote = false;
        let mut index = 0;
        for c in fragment.sql.chars() {
            match c {
                '\'' => {
                    in_quote = !in_quote;
                    sql.push(c);
                }
                '?' if !in_quote => {
                    index += 1;
                    sql.push_str(&dialect.placeholder(index));
                }
                _ => sql.push(c),
            }
        }
        Self {
            sql,
            binds: fragment.params,
            template: fragment.sql,
        }
    }

    /// Appends text after the statement, e.g. an optimizer hint.
    pub(crate) fn append(&mut self, suffix: &str) {
        self.sql.push(' ');
        self.sql.push_str(suffix);
        self.template.push(' ');
        self.template.push_str(suffix);
    }

    /// Number of placeholders in the statement.
    pub fn placeholder_count(&self) -> usize {
        SqlFragment::new(self.template.clone()).placeholder_count()
    }

    /// Returns the statement with binds inlined as literals, for logging.
    pub fn to_debug_sql(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut binds = self.binds.iter();
        let mut in_quote = false;
        for c in self.template.chars() {
            match c {
                '\'' => {
                    in_quote = !in_quote;
                    out.push(c);
                }
                '?' if !in_quote => match binds.next() {
                    Some(bind) => out.push_str(&bind.to_literal()),
                    None => out.push('?'),
                },
                _ => out.push(c),
            }
        }
        out
    }
}
