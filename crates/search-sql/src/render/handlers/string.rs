//! String and URI parameter SQL handler.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::domain::{StringMatch, StringNode, uri_ancestors};
use crate::error::CompileResult;
use crate::render::context::{NodeSql, RenderContext, Target};
use crate::schema::ValueTable;
use crate::sql::{LIKE_ESCAPE, SqlFragment, SqlParam, escape_like};

use super::in_list;

/// Handles string parameter SQL generation.
pub(crate) struct StringHandler;

impl StringHandler {
    /// Builds the `_STR_VALUES` join for a string node.
    ///
    /// Default behavior is a case-insensitive prefix match on the normalized
    /// column.
    pub fn build_sql(
        node: &StringNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let filter = SqlFragment::or_all(
            node.values
                .iter()
                .map(|value| Self::value_filter(target.alias, node.match_kind, value)),
        );
        Ok(NodeSql::Join {
            table: ValueTable::Strings.table(target.resource_type),
            parameter_name_id: Some(ctx.session.parameter_name_id(&node.code)?),
            filter,
        })
    }

    fn value_filter(alias: &str, match_kind: StringMatch, value: &str) -> SqlFragment {
        match match_kind {
            StringMatch::StartsWith => SqlFragment::with_params(
                format!("{}.STR_VALUE_LCASE LIKE ?{}", alias, LIKE_ESCAPE),
                vec![SqlParam::text(format!(
                    "{}%",
                    escape_like(&normalize_for_search(value))
                ))],
            ),
            StringMatch::Contains => SqlFragment::with_params(
                format!("{}.STR_VALUE_LCASE LIKE ?{}", alias, LIKE_ESCAPE),
                vec![SqlParam::text(format!(
                    "%{}%",
                    escape_like(&normalize_for_search(value))
                ))],
            ),
            StringMatch::Exact => SqlFragment::with_params(
                format!("{}.STR_VALUE = ?", alias),
                vec![SqlParam::text(value)],
            ),
            StringMatch::Below => {
                let stem = value.trim_end_matches('/');
                SqlFragment::with_params(
                    format!(
                        "({a}.STR_VALUE = ? OR {a}.STR_VALUE LIKE ?{e})",
                        a = alias,
                        e = LIKE_ESCAPE
                    ),
                    vec![
                        SqlParam::text(value),
                        SqlParam::text(format!("{}/%", escape_like(stem))),
                    ],
                )
            }
            StringMatch::Above => {
                let mut candidates = vec![SqlParam::text(value)];
                candidates.extend(uri_ancestors(value).into_iter().map(SqlParam::Text));
                in_list(&format!("{}.STR_VALUE", alias), candidates)
            }
        }
    }
}

/// Folds a value the way `STR_VALUE_LCASE` is written: canonical
/// decomposition, combining marks removed, then lower-cased.
pub(crate) fn normalize_for_search(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
