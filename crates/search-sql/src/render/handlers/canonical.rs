//! `_profile`, `_tag` and `_security` SQL handlers.
//!
//! These parameters live in dedicated per-type tables without a
//! `PARAMETER_NAME_ID` column.

use crate::domain::{CanonicalMatch, CanonicalNode, TagNode, TokenMatch};
use crate::error::CompileResult;
use crate::render::context::{NodeSql, RenderContext, Target};
use crate::schema::ValueTable;
use crate::sql::{SqlFragment, SqlParam};

use super::id_list;
use super::token::code_set_filter;

/// Handles `_profile` on `_PROFILES`.
pub(crate) struct CanonicalHandler;

impl CanonicalHandler {
    pub fn build_sql(
        node: &CanonicalNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let a = target.alias;
        let mut filters = Vec::with_capacity(node.values.len());
        for value in &node.values {
            let mut parts = vec![SqlFragment::new(format!(
                "{}.CANONICAL_ID = {}",
                a,
                ctx.session.canonical_id(&value.uri)?
            ))];
            if let Some(version) = &value.version {
                let op = match node.match_kind {
                    CanonicalMatch::Exact => "=",
                    CanonicalMatch::Above => ">=",
                    CanonicalMatch::Below => "<",
                };
                parts.push(SqlFragment::with_params(
                    format!("{}.VERSION {} ?", a, op),
                    vec![SqlParam::text(version)],
                ));
            }
            if let Some(fragment) = &value.fragment {
                parts.push(SqlFragment::with_params(
                    format!("{}.FRAGMENT = ?", a),
                    vec![SqlParam::text(fragment)],
                ));
            }
            let several = parts.len() > 1;
            let conjunction = SqlFragment::and_all(parts);
            filters.push(if several {
                conjunction.parenthesized()
            } else {
                conjunction
            });
        }

        Ok(NodeSql::Join {
            table: ValueTable::Profiles.table(target.resource_type),
            parameter_name_id: None,
            filter: SqlFragment::or_all(filters),
        })
    }
}

/// Handles `_tag` and `_security`.
pub(crate) struct TagHandler;

impl TagHandler {
    /// Builds SQL for a tag node. Codes without a system and systems without
    /// a code are matched through `COMMON_TOKEN_VALUES`.
    pub fn build_sql(
        node: &TagNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let a = target.alias;
        let column = format!("{}.COMMON_TOKEN_VALUE_ID", a);

        let mut ids = Vec::new();
        let mut others = Vec::new();
        for value in &node.values {
            match value {
                TokenMatch::SystemCode { system, code } => {
                    ids.push(ctx.session.common_token_value_id(system, code)?);
                }
                TokenMatch::Code(code) => others.push(SqlFragment::with_params(
                    format!(
                        "{} IN (SELECT CTV.COMMON_TOKEN_VALUE_ID FROM COMMON_TOKEN_VALUES CTV \
                         WHERE CTV.TOKEN_VALUE = ?)",
                        column
                    ),
                    vec![SqlParam::text(code)],
                )),
                TokenMatch::System(system) => others.push(SqlFragment::new(format!(
                    "{} IN (SELECT CTV.COMMON_TOKEN_VALUE_ID FROM COMMON_TOKEN_VALUES CTV \
                     WHERE CTV.CODE_SYSTEM_ID = {})",
                    column,
                    ctx.session.code_system_id(system)?
                ))),
                TokenMatch::CodeSet { system, codes } => {
                    let mut subquery = SqlFragment::new(format!(
                        "{} IN (SELECT CTV.COMMON_TOKEN_VALUE_ID FROM COMMON_TOKEN_VALUES CTV \
                         WHERE ",
                        column
                    ));
                    subquery
                        .push_fragment(code_set_filter(
                            "CTV.TOKEN_VALUE",
                            "CTV.CODE_SYSTEM_ID",
                            system,
                            codes,
                            ctx,
                        )?)
                        .push_str(")");
                    others.push(subquery);
                }
            }
        }

        let mut parts = Vec::with_capacity(others.len() + 1);
        if !ids.is_empty() {
            parts.push(id_list(&column, &ids));
        }
        parts.extend(others);
        let filter = SqlFragment::or_all(parts);
        let table = node.table.table(target.resource_type);

        if !node.negated {
            return Ok(NodeSql::Join {
                table,
                parameter_name_id: None,
                filter,
            });
        }

        let exists = NodeSql::Join {
            table,
            parameter_name_id: None,
            filter,
        }
        .into_predicate(a, target.lr_alias);
        let mut predicate = SqlFragment::new("NOT ");
        predicate.push_fragment(exists);
        Ok(NodeSql::Predicate(predicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::handlers::test_support::{TARGET, render_context};
    use crate::types::CanonicalValue;

    #[test]
    fn test_profile_with_version_and_fragment() {
        render_context!(ctx);
        let node = CanonicalNode {
            code: "_profile".to_string(),
            match_kind: CanonicalMatch::Above,
            values: vec![CanonicalValue::parse("http://acme.org/Profile|2.0#part").unwrap()],
        };
        match CanonicalHandler::build_sql(&node, TARGET, &mut ctx).unwrap() {
            NodeSql::Join {
                table,
                parameter_name_id,
                filter,
            } => {
                assert_eq!(table, "Patient_PROFILES");
                assert_eq!(parameter_name_id, None);
                assert_eq!(
                    filter.sql,
                    "(p1.CANONICAL_ID = 40 AND p1.VERSION >= ? AND p1.FRAGMENT = ?)"
                );
                assert_eq!(filter.params.len(), 2);
            }
            other => panic!("expected a join, got {:?}", other),
        }
    }

    #[test]
    fn test_tag_forms() {
        render_context!(ctx);
        let node = TagNode {
            code: "_tag".to_string(),
            table: ValueTable::Tags,
            negated: false,
            values: vec![
                TokenMatch::SystemCode {
                    system: "http://loinc.org".to_string(),
                    code: "8480-6".to_string(),
                },
                TokenMatch::Code("urgent".to_string()),
            ],
        };
        match TagHandler::build_sql(&node, TARGET, &mut ctx).unwrap() {
            NodeSql::Join { table, filter, .. } => {
                assert_eq!(table, "Patient_TAGS");
                assert!(filter.sql.starts_with("(p1.COMMON_TOKEN_VALUE_ID = 300 OR "));
                assert!(filter.sql.contains("WHERE CTV.TOKEN_VALUE = ?"));
                assert_eq!(filter.params, vec![SqlParam::text("urgent")]);
            }
            other => panic!("expected a join, got {:?}", other),
        }
    }

    #[test]
    fn test_security_not() {
        render_context!(ctx);
        let node = TagNode {
            code: "_security".to_string(),
            table: ValueTable::Security,
            negated: true,
            values: vec![TokenMatch::System("http://loinc.org".to_string())],
        };
        match TagHandler::build_sql(&node, TARGET, &mut ctx).unwrap() {
            NodeSql::Predicate(p) => {
                assert!(p.sql.starts_with("NOT EXISTS (SELECT 1 FROM Patient_SECURITY p1 WHERE"));
                assert!(p.sql.contains("CTV.CODE_SYSTEM_ID = 20"));
                assert!(!p.sql.contains("PARAMETER_NAME_ID"));
            }
            other => panic!("expected a predicate, got {:?}", other),
        }
    }
}
