//! Number, date, quantity and `_lastUpdated` SQL handlers.
//!
//! All four compare a stored interval against the search interval of each
//! value through [`range_predicate`].

use crate::domain::{DateNode, LastUpdatedNode, NumberNode, QuantityNode};
use crate::error::CompileResult;
use crate::range::{RangeColumns, range_predicate};
use crate::render::context::{NodeSql, RenderContext, Target};
use crate::schema::ValueTable;
use crate::sql::{SqlFragment, SqlParam};

/// Handles number parameter SQL generation.
pub(crate) struct NumberHandler;

impl NumberHandler {
    pub fn build_sql(
        node: &NumberNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let columns = if node.range {
            RangeColumns::new(target.alias, "NUMBER_VALUE_LOW", "NUMBER_VALUE_HIGH")
        } else {
            RangeColumns::point(target.alias, "NUMBER_VALUE")
        };
        Ok(NodeSql::Join {
            table: ValueTable::Numbers.table(target.resource_type),
            parameter_name_id: Some(ctx.session.parameter_name_id(&node.code)?),
            filter: SqlFragment::or_all(
                node.values
                    .iter()
                    .map(|v| range_predicate(v.prefix, &v.bounds, &columns)),
            ),
        })
    }
}

/// Handles date parameter SQL generation.
///
/// Stored dates are always intervals (`DATE_START`, `DATE_END`).
pub(crate) struct DateHandler;

impl DateHandler {
    pub fn build_sql(
        node: &DateNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let columns = RangeColumns::new(target.alias, "DATE_START", "DATE_END");
        Ok(NodeSql::Join {
            table: ValueTable::Dates.table(target.resource_type),
            parameter_name_id: Some(ctx.session.parameter_name_id(&node.code)?),
            filter: SqlFragment::or_all(
                node.values
                    .iter()
                    .map(|v| range_predicate(v.prefix, &v.bounds, &columns)),
            ),
        })
    }
}

/// Handles quantity parameter SQL generation.
pub(crate) struct QuantityHandler;

impl QuantityHandler {
    /// Builds SQL for a quantity node: the numeric comparison, plus the unit
    /// code and unit system when the value gives them.
    pub fn build_sql(
        node: &QuantityNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let a = target.alias;
        let columns = if node.range {
            RangeColumns::new(a, "QUANTITY_VALUE_LOW", "QUANTITY_VALUE_HIGH")
        } else {
            RangeColumns::point(a, "QUANTITY_VALUE")
        };

        let mut filters = Vec::with_capacity(node.values.len());
        for value in &node.values {
            let mut parts = vec![range_predicate(
                value.range.prefix,
                &value.range.bounds,
                &columns,
            )];
            if let Some(unit) = &value.unit {
                parts.push(SqlFragment::with_params(
                    format!("{}.CODE = ?", a),
                    vec![SqlParam::text(unit)],
                ));
            }
            if let Some(system) = &value.system {
                parts.push(SqlFragment::new(format!(
                    "{}.CODE_SYSTEM_ID = {}",
                    a,
                    ctx.session.code_system_id(system)?
                )));
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
            table: ValueTable::Quantities.table(target.resource_type),
            parameter_name_id: Some(ctx.session.parameter_name_id(&node.code)?),
            filter: SqlFragment::or_all(filters),
        })
    }
}

/// Handles `_lastUpdated`, a point value on the logical resource itself.
pub(crate) struct LastUpdatedHandler;

impl LastUpdatedHandler {
    pub fn build_sql(node: &LastUpdatedNode, target: Target<'_>) -> CompileResult<NodeSql> {
        let columns = RangeColumns::point(target.lr_alias, "LAST_UPDATED");
        Ok(NodeSql::Predicate(SqlFragment::or_all(
            node.values
                .iter()
                .map(|v| range_predicate(v.prefix, &v.bounds, &columns)),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QuantityValue, RangeValue};
    use crate::range::{date_bounds, decimal_bounds};
    use crate::render::handlers::test_support::{TARGET, render_context};
    use crate::types::SearchPrefix;
    use chrono::NaiveDateTime;

    fn join_filter(result: NodeSql) -> (String, SqlFragment) {
        match result {
            NodeSql::Join { table, filter, .. } => (table, filter),
            NodeSql::Predicate(p) => panic!("expected a join, got predicate {}", p.sql),
        }
    }

    #[test]
    fn test_date_ge_partial_day() {
        render_context!(ctx);
        let node = DateNode {
            code: "birthdate".to_string(),
            values: vec![RangeValue {
                prefix: SearchPrefix::Ge,
                bounds: date_bounds("birthdate", "2020-01-01").unwrap(),
            }],
        };
        let (table, filter) = join_filter(DateHandler::build_sql(&node, TARGET, &mut ctx).unwrap());
        assert_eq!(table, "Patient_DATE_VALUES");
        assert_eq!(filter.sql, "p1.DATE_END >= ?");
        let expected =
            NaiveDateTime::parse_from_str("2020-01-01T00:00:00", "%Y-%m-%dT%H:%M:%S").unwrap();
        assert_eq!(filter.params, vec![SqlParam::Timestamp(expected)]);
    }

    #[test]
    fn test_number_point_and_range_columns() {
        render_context!(ctx);
        let mut node = NumberNode {
            code: "probability".to_string(),
            range: false,
            values: vec![RangeValue {
                prefix: SearchPrefix::Eq,
                bounds: decimal_bounds("probability", "0.8").unwrap(),
            }],
        };
        let (_, point) = join_filter(NumberHandler::build_sql(&node, TARGET, &mut ctx).unwrap());
        assert_eq!(point.sql, "(p1.NUMBER_VALUE >= ? AND p1.NUMBER_VALUE < ?)");

        node.range = true;
        let (_, range) = join_filter(NumberHandler::build_sql(&node, TARGET, &mut ctx).unwrap());
        assert_eq!(
            range.sql,
            "(p1.NUMBER_VALUE_LOW >= ? AND p1.NUMBER_VALUE_HIGH < ?)"
        );
    }

    #[test]
    fn test_quantity_with_unit_filters() {
        render_context!(ctx);
        let node = QuantityNode {
            code: "value-quantity".to_string(),
            range: false,
            values: vec![QuantityValue {
                range: RangeValue {
                    prefix: SearchPrefix::Lt,
                    bounds: decimal_bounds("value-quantity", "5.4").unwrap(),
                },
                system: Some("http://unitsofmeasure.org".to_string()),
                unit: Some("mg".to_string()),
            }],
        };
        let (table, filter) =
            join_filter(QuantityHandler::build_sql(&node, TARGET, &mut ctx).unwrap());
        assert_eq!(table, "Patient_QUANTITY_VALUES");
        assert_eq!(
            filter.sql,
            "(p1.QUANTITY_VALUE < ? AND p1.CODE = ? AND p1.CODE_SYSTEM_ID = 21)"
        );
        assert_eq!(filter.placeholder_count(), filter.params.len());
    }

    #[test]
    fn test_last_updated_is_predicate_on_logical_resource() {
        let node = LastUpdatedNode {
            values: vec![
                RangeValue {
                    prefix: SearchPrefix::Gt,
                    bounds: date_bounds("_lastUpdated", "2021").unwrap(),
                },
                RangeValue {
                    prefix: SearchPrefix::Lt,
                    bounds: date_bounds("_lastUpdated", "2019").unwrap(),
                },
            ],
        };
        match LastUpdatedHandler::build_sql(&node, TARGET).unwrap() {
            NodeSql::Predicate(p) => {
                assert_eq!(p.sql, "(LR0.LAST_UPDATED > ? OR LR0.LAST_UPDATED < ?)")
            }
            other => panic!("expected a predicate, got {:?}", other),
        }
    }
}
