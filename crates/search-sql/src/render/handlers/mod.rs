//! Per-node SQL generation.
//!
//! Each handler turns one node into a [`NodeSql`]: either a value-table join
//! with a filter on the joined row, or a standalone predicate on the logical
//! resource. Handlers never decide where the result goes; the renderer and the
//! chain resolver place it.

mod canonical;
mod composite;
mod location;
mod missing;
mod range;
mod reference;
mod string;
mod token;

pub(crate) use canonical::{CanonicalHandler, TagHandler};
pub(crate) use composite::CompositeHandler;
pub(crate) use location::LocationHandler;
pub(crate) use missing::MissingHandler;
pub(crate) use range::{DateHandler, LastUpdatedHandler, NumberHandler, QuantityHandler};
pub(crate) use reference::{IdHandler, InclusionHandler, ReferenceHandler};
pub(crate) use string::StringHandler;
pub(crate) use token::TokenHandler;

use crate::domain::SearchNode;
use crate::error::{CompileResult, SearchError};
use crate::sql::{SqlFragment, SqlParam};

use super::chain::ChainResolver;
use super::context::{NodeSql, RenderContext, Target};

/// Renders any filter node.
pub(crate) fn render_node(
    node: &SearchNode,
    target: Target<'_>,
    ctx: &mut RenderContext<'_>,
) -> CompileResult<NodeSql> {
    match node {
        SearchNode::String(n) => StringHandler::build_sql(n, target, ctx),
        SearchNode::Number(n) => NumberHandler::build_sql(n, target, ctx),
        SearchNode::Date(n) => DateHandler::build_sql(n, target, ctx),
        SearchNode::Token(n) => TokenHandler::build_sql(n, target, ctx),
        SearchNode::Quantity(n) => QuantityHandler::build_sql(n, target, ctx),
        SearchNode::Reference(n) => ReferenceHandler::build_sql(n, target, ctx),
        SearchNode::Chained(n) => ChainResolver::build_forward(n, target, ctx),
        SearchNode::ReverseChained(n) => ChainResolver::build_reverse(n, target, ctx),
        SearchNode::Composite(n) => CompositeHandler::build_sql(n, target, ctx),
        SearchNode::Missing(n) => MissingHandler::build_sql(n, target, ctx),
        SearchNode::Location(n) => LocationHandler::build_sql(n, target, ctx),
        SearchNode::Id(n) => IdHandler::build_sql(n, target),
        SearchNode::LastUpdated(n) => LastUpdatedHandler::build_sql(n, target),
        SearchNode::Canonical(n) => CanonicalHandler::build_sql(n, target, ctx),
        SearchNode::Tag(n) => TagHandler::build_sql(n, target, ctx),
        SearchNode::Inclusion(n) => InclusionHandler::build_sql(n, target, ctx),
        SearchNode::Sort(sort) => Err(SearchError::InvalidRequest {
            message: format!("sort key '{}' cannot be used as a filter", sort.code),
        }
        .into()),
    }
}

/// `col = ?` for one value, `col IN (?, ?)` for several.
pub(crate) fn in_list(column: &str, values: Vec<SqlParam>) -> SqlFragment {
    if values.len() == 1 {
        return SqlFragment::with_params(format!("{} = ?", column), values);
    }
    let placeholders = vec!["?"; values.len()].join(", ");
    SqlFragment::with_params(format!("{} IN ({})", column, placeholders), values)
}

/// `col = id` for one surrogate id, `col IN (id, id)` for several.
pub(crate) fn id_list(column: &str, ids: &[i64]) -> SqlFragment {
    match ids {
        [single] => SqlFragment::new(format!("{} = {}", column, single)),
        _ => SqlFragment::new(format!(
            "{} IN ({})",
            column,
            ids.iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}
