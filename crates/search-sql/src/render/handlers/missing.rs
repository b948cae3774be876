//! `:missing` SQL handler.

use crate::domain::MissingNode;
use crate::error::CompileResult;
use crate::render::context::{NodeSql, RenderContext, Target};
use crate::sql::SqlFragment;

/// Renders `:missing` as `EXISTS` / `NOT EXISTS`, since it tests absence.
pub(crate) struct MissingHandler;

impl MissingHandler {
    pub fn build_sql(
        node: &MissingNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let parameter_name_id = if node.table.has_parameter_name() {
            Some(ctx.session.parameter_name_id(&node.code)?)
        } else {
            None
        };

        let exists = NodeSql::Join {
            table: node.table.table(target.resource_type),
            parameter_name_id,
            filter: SqlFragment::default(),
        }
        .into_predicate(target.alias, target.lr_alias);

        if !node.missing {
            return Ok(NodeSql::Predicate(exists));
        }
        let mut predicate = SqlFragment::new("NOT ");
        predicate.push_fragment(exists);
        Ok(NodeSql::Predicate(predicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::handlers::test_support::{TARGET, render_context};
    use crate::schema::ValueTable;

    fn predicate(node: &MissingNode) -> String {
        render_context!(ctx);
        match MissingHandler::build_sql(node, TARGET, &mut ctx).unwrap() {
            NodeSql::Predicate(p) => p.sql,
            other => panic!("expected a predicate, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_true_is_not_exists() {
        let sql = predicate(&MissingNode {
            code: "family".to_string(),
            table: ValueTable::Strings,
            missing: true,
        });
        assert_eq!(
            sql,
            "NOT EXISTS (SELECT 1 FROM Patient_STR_VALUES p1 WHERE \
             p1.LOGICAL_RESOURCE_ID = LR0.LOGICAL_RESOURCE_ID AND p1.PARAMETER_NAME_ID = 1)"
        );
    }

    #[test]
    fn test_missing_false_is_exists() {
        let sql = predicate(&MissingNode {
            code: "_tag".to_string(),
            table: ValueTable::Tags,
            missing: false,
        });
        assert_eq!(
            sql,
            "EXISTS (SELECT 1 FROM Patient_TAGS p1 WHERE \
             p1.LOGICAL_RESOURCE_ID = LR0.LOGICAL_RESOURCE_ID)"
        );
    }
}
