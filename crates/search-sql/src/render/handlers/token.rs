//! Token parameter SQL handler.

use crate::domain::{TokenMatch, TokenNode};
use crate::error::CompileResult;
use crate::render::context::{NodeSql, RenderContext, Target};
use crate::schema::{PARAMETER_NAME_ID, ValueTable, correlate};
use crate::sql::{SqlFragment, SqlParam};

use super::string::normalize_for_search;
use super::{id_list, in_list};

/// Handles token parameter SQL generation.
pub(crate) struct TokenHandler;

impl TokenHandler {
    /// Builds SQL for a token node.
    ///
    /// `system|code` values go through the common token value id. When no
    /// value needs `TOKEN_VALUE` or `CODE_SYSTEM_ID`, the plain reference
    /// table is used instead of the view.
    pub fn build_sql(
        node: &TokenNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let (table, filter) = token_filter(&node.values, target.alias, ctx)?;
        let table = table.table(target.resource_type);
        let parameter_name_id = ctx.session.parameter_name_id(&node.code)?;

        if !node.negated {
            return Ok(NodeSql::Join {
                table,
                parameter_name_id: Some(parameter_name_id),
                filter,
            });
        }

        let mut predicate = SqlFragment::new(format!(
            "NOT EXISTS (SELECT 1 FROM {table} {a} WHERE {on} AND {a}.{pn} = {id} AND ",
            table = table,
            a = target.alias,
            on = correlate(target.alias, target.lr_alias),
            pn = PARAMETER_NAME_ID,
            id = parameter_name_id
        ));
        predicate.push_fragment(filter).push_str(")");
        Ok(NodeSql::Predicate(predicate))
    }
}

/// The ORed filter over token values and the table it needs.
///
/// Shared with the tag handler, whose tables hold the same common token
/// value ids.
pub(crate) fn token_filter(
    values: &[TokenMatch],
    alias: &str,
    ctx: &RenderContext<'_>,
) -> CompileResult<(ValueTable, SqlFragment)> {
    let mut ids = Vec::new();
    let mut others = Vec::new();
    let mut needs_values = false;

    for value in values {
        match value {
            TokenMatch::SystemCode { system, code } => {
                ids.push(ctx.session.common_token_value_id(system, code)?);
            }
            TokenMatch::Code(code) => {
                needs_values = true;
                // Case-insensitive systems store the folded code
                let mut candidates = vec![SqlParam::text(code)];
                let folded = normalize_for_search(code);
                if folded != *code {
                    candidates.push(SqlParam::Text(folded));
                }
                others.push(in_list(&format!("{}.TOKEN_VALUE", alias), candidates));
            }
            TokenMatch::CodeSet { system, codes } => {
                needs_values = true;
                others.push(code_set_filter(
                    &format!("{}.TOKEN_VALUE", alias),
                    &format!("{}.CODE_SYSTEM_ID", alias),
                    system,
                    codes,
                    ctx,
                )?);
            }
            TokenMatch::System(system) => {
                needs_values = true;
                others.push(SqlFragment::new(format!(
                    "{}.CODE_SYSTEM_ID = {}",
                    alias,
                    ctx.session.code_system_id(system)?
                )));
            }
        }
    }

    let mut parts = Vec::with_capacity(others.len() + 1);
    if !ids.is_empty() {
        parts.push(id_list(&format!("{}.COMMON_TOKEN_VALUE_ID", alias), &ids));
    }
    parts.extend(others);

    let table = if needs_values {
        ValueTable::TokenValues
    } else {
        ValueTable::TokenRefs
    };
    Ok((table, SqlFragment::or_all(parts)))
}

/// `(value IN (codes) AND system = id)` for one system of an expanded value
/// set. An empty code list matches nothing.
pub(crate) fn code_set_filter(
    value_column: &str,
    system_column: &str,
    system: &str,
    codes: &[String],
    ctx: &RenderContext<'_>,
) -> CompileResult<SqlFragment> {
    if codes.is_empty() {
        return Ok(SqlFragment::new("1 = 0"));
    }
    let mut filter = in_list(value_column, codes.iter().map(SqlParam::text).collect());
    filter.push_str(&format!(
        " AND {} = {}",
        system_column,
        ctx.session.code_system_id(system)?
    ));
    Ok(filter.parenthesized())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_TOKEN_SYSTEM;
    use crate::render::handlers::test_support::{TARGET, render_context};

    fn node(negated: bool, values: Vec<TokenMatch>) -> TokenNode {
        TokenNode {
            code: "code".to_string(),
            negated,
            values,
        }
    }

    fn loinc(code: &str) -> TokenMatch {
        TokenMatch::SystemCode {
            system: "http://loinc.org".to_string(),
            code: code.to_string(),
        }
    }

    #[test]
    fn test_system_code_uses_common_token_ids() {
        render_context!(ctx);
        let result = TokenHandler::build_sql(
            &node(false, vec![loinc("8480-6"), loinc("8462-4")]),
            TARGET,
            &mut ctx,
        )
        .unwrap();
        match result {
            NodeSql::Join {
                table,
                parameter_name_id,
                filter,
            } => {
                assert_eq!(table, "Patient_RESOURCE_TOKEN_REFS");
                assert_eq!(parameter_name_id, Some(3));
                assert_eq!(filter.sql, "p1.COMMON_TOKEN_VALUE_ID IN (300, 301)");
                assert!(filter.params.is_empty());
            }
            other => panic!("expected a join, got {:?}", other),
        }
    }

    #[test]
    fn test_code_only_needs_view() {
        render_context!(ctx);
        let result = TokenHandler::build_sql(
            &node(
                false,
                vec![TokenMatch::Code("8480-6".to_string()), loinc("8462-4")],
            ),
            TARGET,
            &mut ctx,
        )
        .unwrap();
        match result {
            NodeSql::Join { table, filter, .. } => {
                assert_eq!(table, "Patient_TOKEN_VALUES_V");
                assert_eq!(
                    filter.sql,
                    "(p1.COMMON_TOKEN_VALUE_ID = 301 OR p1.TOKEN_VALUE = ?)"
                );
                assert_eq!(filter.params, vec![SqlParam::text("8480-6")]);
            }
            other => panic!("expected a join, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_system_matches_nothing() {
        render_context!(ctx);
        let result = TokenHandler::build_sql(
            &node(
                false,
                vec![TokenMatch::SystemCode {
                    system: DEFAULT_TOKEN_SYSTEM.to_string(),
                    code: "x".to_string(),
                }],
            ),
            TARGET,
            &mut ctx,
        )
        .unwrap();
        match result {
            NodeSql::Join { filter, .. } => {
                assert_eq!(filter.sql, "p1.COMMON_TOKEN_VALUE_ID = -1")
            }
            other => panic!("expected a join, got {:?}", other),
        }
    }

    #[test]
    fn test_not_modifier_is_not_exists() {
        render_context!(ctx);
        let result = TokenHandler::build_sql(
            &node(true, vec![TokenMatch::System("http://loinc.org".to_string())]),
            TARGET,
            &mut ctx,
        )
        .unwrap();
        match result {
            NodeSql::Predicate(p) => {
                assert!(p.sql.starts_with("NOT EXISTS (SELECT 1 FROM Patient_TOKEN_VALUES_V p1"));
                assert!(p.sql.contains("p1.LOGICAL_RESOURCE_ID = LR0.LOGICAL_RESOURCE_ID"));
                assert!(p.sql.contains("p1.PARAMETER_NAME_ID = 3"));
                assert!(p.sql.ends_with("p1.CODE_SYSTEM_ID = 20)"));
            }
            other => panic!("expected a predicate, got {:?}", other),
        }
    }

    #[test]
    fn test_code_only_also_matches_folded_code() {
        render_context!(ctx);
        let result = TokenHandler::build_sql(
            &node(false, vec![TokenMatch::Code("Étape-A".to_string())]),
            TARGET,
            &mut ctx,
        )
        .unwrap();
        match result {
            NodeSql::Join { filter, .. } => {
                assert_eq!(filter.sql, "p1.TOKEN_VALUE IN (?, ?)");
                assert_eq!(
                    filter.params,
                    vec![SqlParam::text("Étape-A"), SqlParam::text("etape-a")]
                );
            }
            other => panic!("expected a join, got {:?}", other),
        }
    }

    fn code_set(system: &str, codes: &[&str]) -> TokenMatch {
        TokenMatch::CodeSet {
            system: system.to_string(),
            codes: codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_code_set_filters_per_system() {
        render_context!(ctx);
        let result = TokenHandler::build_sql(
            &node(
                false,
                vec![
                    code_set("http://loinc.org", &["8462-4", "8480-6"]),
                    code_set("http://unitsofmeasure.org", &["mm[Hg]"]),
                ],
            ),
            TARGET,
            &mut ctx,
        )
        .unwrap();
        match result {
            NodeSql::Join { table, filter, .. } => {
                assert_eq!(table, "Patient_TOKEN_VALUES_V");
                assert_eq!(
                    filter.sql,
                    "((p1.TOKEN_VALUE IN (?, ?) AND p1.CODE_SYSTEM_ID = 20) OR \
                     (p1.TOKEN_VALUE = ? AND p1.CODE_SYSTEM_ID = 21))"
                );
                assert_eq!(filter.params.len(), 3);
            }
            other => panic!("expected a join, got {:?}", other),
        }
    }

    #[test]
    fn test_not_in_code_set_is_not_exists() {
        render_context!(ctx);
        let result = TokenHandler::build_sql(
            &node(true, vec![code_set("http://loinc.org", &["8480-6"])]),
            TARGET,
            &mut ctx,
        )
        .unwrap();
        match result {
            NodeSql::Predicate(p) => {
                assert!(p.sql.starts_with("NOT EXISTS (SELECT 1 FROM Patient_TOKEN_VALUES_V p1"));
                assert!(p.sql.ends_with("(p1.TOKEN_VALUE = ? AND p1.CODE_SYSTEM_ID = 20))"));
                assert_eq!(p.params, vec![SqlParam::text("8480-6")]);
            }
            other => panic!("expected a predicate, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_code_set_matches_nothing() {
        render_context!(ctx);
        let result =
            TokenHandler::build_sql(&node(false, vec![code_set("", &[])]), TARGET, &mut ctx)
                .unwrap();
        match result {
            NodeSql::Join { filter, .. } => assert_eq!(filter.sql, "1 = 0"),
            other => panic!("expected a join, got {:?}", other),
        }
    }
}
