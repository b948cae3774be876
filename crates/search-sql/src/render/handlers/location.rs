//! Location `near` SQL handler.

use crate::domain::LocationNode;
use crate::error::CompileResult;
use crate::render::context::{NodeSql, RenderContext, Target};
use crate::schema::ValueTable;
use crate::sql::{SqlFragment, SqlParam};

/// Handles `near` as a bounding-box filter over `_LATLNG_VALUES`.
pub(crate) struct LocationHandler;

impl LocationHandler {
    pub fn build_sql(
        node: &LocationNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let a = target.alias;
        let filter = SqlFragment::or_all(node.boxes.iter().map(|b| {
            SqlFragment::with_params(
                format!(
                    "({a}.LATITUDE_VALUE >= ? AND {a}.LATITUDE_VALUE <= ? \
                     AND {a}.LONGITUDE_VALUE >= ? AND {a}.LONGITUDE_VALUE <= ?)",
                    a = a
                ),
                vec![
                    SqlParam::float(b.min_lat),
                    SqlParam::float(b.max_lat),
                    SqlParam::float(b.min_lng),
                    SqlParam::float(b.max_lng),
                ],
            )
        }));

        Ok(NodeSql::Join {
            table: ValueTable::LatLng.table(target.resource_type),
            parameter_name_id: Some(ctx.session.parameter_name_id(&node.code)?),
            filter,
        })
    }
}
