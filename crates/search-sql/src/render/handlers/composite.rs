//! Composite parameter SQL handler.

use crate::domain::{CompositeComponent, CompositeNode};
use crate::error::{CompileResult, SearchError};
use crate::render::context::{NodeSql, RenderContext, Target};
use crate::schema::{LOGICAL_RESOURCE_ID, PARAMETER_NAME_ID, correlate};
use crate::sql::{Select, SqlFragment, component_alias};

use super::render_node;

/// Handles composite parameters.
///
/// Each value becomes an `EXISTS` sub-select joining one value table per
/// component on `COMPOSITE_ID`, so that all components match the same
/// composite element. Values are ORed.
pub(crate) struct CompositeHandler;

impl CompositeHandler {
    pub fn build_sql(
        node: &CompositeNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let mut filters = Vec::with_capacity(node.values.len());
        for components in &node.values {
            filters.push(Self::value_exists(node, components, target, ctx)?);
        }
        Ok(NodeSql::Predicate(SqlFragment::or_all(filters)))
    }

    fn value_exists(
        node: &CompositeNode,
        components: &[CompositeComponent],
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<SqlFragment> {
        let composite = ctx.aliases.next_composite();
        let first = component_alias(&composite, 1);
        let mut select = Select::new(["1"]);

        for (index, component) in components.iter().enumerate() {
            let alias = component_alias(&composite, index + 1);
            let component_target = Target {
                resource_type: target.resource_type,
                lr_alias: target.lr_alias,
                alias: &alias,
            };

            let NodeSql::Join {
                table,
                parameter_name_id,
                filter,
            } = render_node(&component.node, component_target, ctx)?
            else {
                return Err(SearchError::InvalidComposite {
                    param: node.code.clone(),
                    message: format!(
                        "component {} does not resolve to a value table",
                        index + 1
                    ),
                }
                .into());
            };

            if index == 0 {
                select
                    .from_table(table, alias.as_str())
                    .filter(SqlFragment::new(correlate(&alias, target.lr_alias)));
            } else {
                select.inner_join(
                    table,
                    alias.as_str(),
                    SqlFragment::new(format!(
                        "{a}.{lr} = {f}.{lr} AND {a}.COMPOSITE_ID = {f}.COMPOSITE_ID",
                        a = alias,
                        f = first,
                        lr = LOGICAL_RESOURCE_ID
                    )),
                );
            }
            if let Some(id) = parameter_name_id {
                select.filter(SqlFragment::new(format!(
                    "{}.{} = {}",
                    alias, PARAMETER_NAME_ID, id
                )));
            }
            select.filter(filter);
        }

        let mut exists = SqlFragment::new("EXISTS (");
        exists.push_fragment(select.render(ctx.dialect)).push_str(")");
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        QuantityNode, QuantityValue, RangeValue, SearchNode, StringMatch, StringNode, TokenMatch,
        TokenNode,
    };
    use crate::range::decimal_bounds;
    use crate::render::handlers::test_support::{TARGET, render_context};
    use crate::types::SearchPrefix;

    fn component_value(code: &str, amount: &str) -> Vec<CompositeComponent> {
        vec![
            CompositeComponent {
                node: SearchNode::Token(TokenNode {
                    code: "code".to_string(),
                    negated: false,
                    values: vec![TokenMatch::SystemCode {
                        system: "http://loinc.org".to_string(),
                        code: code.to_string(),
                    }],
                }),
            },
            CompositeComponent {
                node: SearchNode::Quantity(QuantityNode {
                    code: "value-quantity".to_string(),
                    range: false,
                    values: vec![QuantityValue {
                        range: RangeValue {
                            prefix: SearchPrefix::Lt,
                            bounds: decimal_bounds("value-quantity", amount).unwrap(),
                        },
                        system: None,
                        unit: None,
                    }],
                }),
            },
        ]
    }

    #[test]
    fn test_components_join_on_composite_id() {
        render_context!(ctx);
        let node = CompositeNode {
            code: "code-value-quantity".to_string(),
            values: vec![component_value("8480-6", "60")],
        };
        let NodeSql::Predicate(p) = CompositeHandler::build_sql(&node, TARGET, &mut ctx).unwrap()
        else {
            panic!("expected a predicate");
        };
        assert_eq!(
            p.sql,
            "EXISTS (SELECT 1 FROM Patient_RESOURCE_TOKEN_REFS comp1_p1 \
             INNER JOIN Patient_QUANTITY_VALUES comp1_p2 \
             ON comp1_p2.LOGICAL_RESOURCE_ID = comp1_p1.LOGICAL_RESOURCE_ID \
             AND comp1_p2.COMPOSITE_ID = comp1_p1.COMPOSITE_ID \
             WHERE comp1_p1.LOGICAL_RESOURCE_ID = LR0.LOGICAL_RESOURCE_ID \
             AND comp1_p1.PARAMETER_NAME_ID = 3 AND comp1_p1.COMMON_TOKEN_VALUE_ID = 300 \
             AND comp1_p2.PARAMETER_NAME_ID = 4 AND comp1_p2.QUANTITY_VALUE < ?)"
        );
        assert_eq!(p.params.len(), 1);
    }

    #[test]
    fn test_values_are_ored_with_fresh_aliases() {
        render_context!(ctx);
        let node = CompositeNode {
            code: "code-value-quantity".to_string(),
            values: vec![
                component_value("8480-6", "60"),
                component_value("8462-4", "90"),
            ],
        };
        let NodeSql::Predicate(p) = CompositeHandler::build_sql(&node, TARGET, &mut ctx).unwrap()
        else {
            panic!("expected a predicate");
        };
        assert!(p.sql.starts_with("(EXISTS (SELECT 1 FROM"));
        assert!(p.sql.contains(") OR EXISTS ("));
        assert!(p.sql.contains("comp2_p2.QUANTITY_VALUE < ?"));
        assert_eq!(p.placeholder_count(), p.params.len());
    }

    #[test]
    fn test_predicate_component_is_rejected() {
        render_context!(ctx);
        let node = CompositeNode {
            code: "broken".to_string(),
            values: vec![vec![CompositeComponent {
                node: SearchNode::Token(TokenNode {
                    code: "code".to_string(),
                    negated: true,
                    values: vec![TokenMatch::Code("x".to_string())],
                }),
            }]],
        };
        assert!(CompositeHandler::build_sql(&node, TARGET, &mut ctx).is_err());

        let string_only = CompositeNode {
            code: "name-only".to_string(),
            values: vec![vec![CompositeComponent {
                node: SearchNode::String(StringNode {
                    code: "name".to_string(),
                    match_kind: StringMatch::Exact,
                    values: vec!["x".to_string()],
                }),
            }]],
        };
        assert!(CompositeHandler::build_sql(&string_only, TARGET, &mut ctx).is_ok());
    }
}
