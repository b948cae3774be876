//! Reference, `_id` and compartment inclusion SQL handlers.

use crate::domain::{IdNode, InclusionNode, ReferenceMatch, ReferenceNode};
use crate::error::CompileResult;
use crate::render::context::{NodeSql, RenderContext, Target};
use crate::schema::ValueTable;
use crate::sql::{LIKE_ESCAPE, SqlFragment, SqlParam, escape_like};

use super::in_list;

/// Handles reference parameter SQL generation.
///
/// References are indexed in the token view with `TOKEN_VALUE` holding the
/// relative reference `Type/id`.
pub(crate) struct ReferenceHandler;

impl ReferenceHandler {
    pub fn build_sql(
        node: &ReferenceNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let a = target.alias;
        let filter = SqlFragment::or_all(node.values.iter().map(|value| match value {
            ReferenceMatch::Exact(references) => in_list(
                &format!("{}.TOKEN_VALUE", a),
                references.iter().map(SqlParam::text).collect(),
            ),
            ReferenceMatch::Suffix(id) => SqlFragment::with_params(
                format!("{}.TOKEN_VALUE LIKE ?{}", a, LIKE_ESCAPE),
                vec![SqlParam::text(format!("%/{}", escape_like(id)))],
            ),
            ReferenceMatch::Versioned { reference, version } => SqlFragment::with_params(
                format!("({a}.TOKEN_VALUE = ? AND {a}.REF_VERSION_ID = ?)", a = a),
                vec![SqlParam::text(reference), SqlParam::integer(*version)],
            ),
        }));

        Ok(NodeSql::Join {
            table: ValueTable::TokenValues.table(target.resource_type),
            parameter_name_id: Some(ctx.session.parameter_name_id(&node.code)?),
            filter,
        })
    }
}

/// Handles compartment inclusion criteria: the reference must be one of
/// the compartment owners.
pub(crate) struct InclusionHandler;

impl InclusionHandler {
    pub fn build_sql(
        node: &InclusionNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        Ok(NodeSql::Join {
            table: ValueTable::TokenValues.table(target.resource_type),
            parameter_name_id: Some(ctx.session.parameter_name_id(&node.code)?),
            filter: in_list(
                &format!("{}.TOKEN_VALUE", target.alias),
                node.references.iter().map(SqlParam::text).collect(),
            ),
        })
    }
}

/// Handles `_id` on the logical resource.
pub(crate) struct IdHandler;

impl IdHandler {
    pub fn build_sql(node: &IdNode, target: Target<'_>) -> CompileResult<NodeSql> {
        Ok(NodeSql::Predicate(in_list(
            &format!("{}.LOGICAL_ID", target.lr_alias),
            node.ids.iter().map(SqlParam::text).collect(),
        )))
    }
}
