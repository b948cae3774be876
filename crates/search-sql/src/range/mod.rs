//! Range comparison helpers.
//!
//! A stored value is an interval `[S, E]` (for point values both columns are
//! the same column) and a search value is a half-open interval `[s, e)` (see
//! [`BoundPair`]). Each prefix maps to a fixed predicate over those four
//! quantities:
//!
//! | prefix | predicate |
//! |--------|-----------|
//! | `eq` | `S >= s AND E < e` |
//! | `ne` | `S < s OR E >= e` |
//! | `gt` | `E > s` |
//! | `ge` | `E >= s` |
//! | `lt` | `S < e` |
//! | `le` | `S <= e` |
//! | `sa` | `S > e` |
//! | `eb` | `E < s` |
//! | `ap` | `(S >= s AND E < e) OR (S <= s AND E >= s) OR (S < e AND E >= e)` |

mod bounds;

pub use bounds::{
    BoundPair, DatePrecision, DateValue, date_bounds, decimal_bounds, is_integer_literal,
    parse_decimal,
};

use crate::sql::{SqlFragment, SqlParam};
use crate::types::SearchPrefix;

/// The stored start (`S`) and end (`E`) columns of a range comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeColumns {
    /// Qualified start column.
    pub start: String,
    /// Qualified end column.
    pub end: String,
}

impl RangeColumns {
    /// Columns `alias.start` and `alias.end`.
    pub fn new(alias: &str, start: &str, end: &str) -> Self {
        Self {
            start: format!("{}.{}", alias, start),
            end: format!("{}.{}", alias, end),
        }
    }

    /// A point value stored in a single column.
    pub fn point(alias: &str, column: &str) -> Self {
        Self::new(alias, column, column)
    }
}

/// Builds the predicate comparing stored columns against a search interval.
pub fn range_predicate<T>(
    prefix: SearchPrefix,
    bounds: &BoundPair<T>,
    columns: &RangeColumns,
) -> SqlFragment
where
    T: Clone + Into<SqlParam>,
{
    let s = || bounds.lower.clone().into();
    let e = || bounds.upper.clone().into();
    let (start, end) = (&columns.start, &columns.end);

    match prefix {
        SearchPrefix::Eq => SqlFragment::with_params(
            format!("({} >= ? AND {} < ?)", start, end),
            vec![s(), e()],
        ),
        SearchPrefix::Ne => SqlFragment::with_params(
            format!("({} < ? OR {} >= ?)", start, end),
            vec![s(), e()],
        ),
        SearchPrefix::Gt => SqlFragment::with_params(format!("{} > ?", end), vec![s()]),
        SearchPrefix::Ge => SqlFragment::with_params(format!("{} >= ?", end), vec![s()]),
        SearchPrefix::Lt => SqlFragment::with_params(format!("{} < ?", start), vec![e()]),
        SearchPrefix::Le => SqlFragment::with_params(format!("{} <= ?", start), vec![e()]),
        SearchPrefix::Sa => SqlFragment::with_params(format!("{} > ?", start), vec![e()]),
        SearchPrefix::Eb => SqlFragment::with_params(format!("{} < ?", end), vec![s()]),
        SearchPrefix::Ap => SqlFragment::with_params(
            format!(
                "(({s} >= ? AND {e} < ?) OR ({s} <= ? AND {e} >= ?) OR ({s} < ? AND {e} >= ?))",
                s = start,
                e = end
            ),
            vec![s(), e(), s(), s(), e(), e()],
        ),
    }
}
