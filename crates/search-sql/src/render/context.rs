//! State shared by the node handlers while one statement is rendered.

use crate::cache::CacheSession;
use crate::schema::{self, PARAMETER_NAME_ID};
use crate::sql::{AliasAllocator, RenderDialect, SqlFragment};

/// Identity lookups, dialect and alias counters for one statement.
pub(crate) struct RenderContext<'a> {
    pub session: &'a CacheSession<'a>,
    pub dialect: &'a dyn RenderDialect,
    pub aliases: AliasAllocator,
}

impl<'a> RenderContext<'a> {
    pub fn new(session: &'a CacheSession<'a>, dialect: &'a dyn RenderDialect) -> Self {
        Self {
            session,
            dialect,
            aliases: AliasAllocator::new(),
        }
    }

    /// `'<Type>' || '/' || <column>`, the form references are indexed in.
    pub fn reference_expr(&self, resource_type: &str, logical_id_column: &str) -> String {
        let prefix = self
            .dialect
            .concat(&format!("'{}'", resource_type), "'/'");
        self.dialect.concat(&prefix, logical_id_column)
    }
}

/// Where a node is evaluated.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Target<'t> {
    /// Resource type owning the value tables.
    pub resource_type: &'t str,
    /// Alias of the logical-resources row being filtered.
    pub lr_alias: &'t str,
    /// Alias reserved for the node's value table.
    pub alias: &'t str,
}

/// What a node contributes to a statement.
#[derive(Debug, Clone)]
pub(crate) enum NodeSql {
    /// A value table joined on the logical resource id (and the parameter
    /// name id, when given) plus a filter on the joined row.
    Join {
        table: String,
        parameter_name_id: Option<i64>,
        filter: SqlFragment,
    },
    /// A self-contained predicate on the logical resource.
    Predicate(SqlFragment),
}

impl NodeSql {
    /// Join condition for the value table aliased `alias`.
    pub fn join_condition(alias: &str, lr_alias: &str, parameter_name_id: Option<i64>) -> String {
        let mut on = schema::correlate(alias, lr_alias);
        if let Some(id) = parameter_name_id {
            on.push_str(&format!(" AND {}.{} = {}", alias, PARAMETER_NAME_ID, id));
        }
        on
    }

    /// Rewrites the node as a single predicate; joins become `EXISTS`.
    pub fn into_predicate(self, alias: &str, lr_alias: &str) -> SqlFragment {
        match self {
            NodeSql::Predicate(predicate) => predicate,
            NodeSql::Join {
                table,
                parameter_name_id,
                filter,
            } => {
                let mut out = SqlFragment::new(format!(
                    "EXISTS (SELECT 1 FROM {} {} WHERE {}",
                    table,
                    alias,
                    Self::join_condition(alias, lr_alias, parameter_name_id)
                ));
                if !filter.is_empty() {
                    out.push_str(" AND ");
                    out.push_fragment(filter);
                }
                out.push_str(")");
                out
            }
        }
    }
}
