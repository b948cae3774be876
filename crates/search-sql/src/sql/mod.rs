//! SQL building blocks: fragments, the structured statement builder,
//! dialects and alias allocation.

mod alias;
mod dialect;
mod fragment;
mod rendered;
mod select;

pub use alias::{AliasAllocator, component_alias};
pub use dialect::{Db2Dialect, DerbyDialect, DialectKind, PostgresDialect, RenderDialect};
pub use fragment::{LIKE_ESCAPE, PLACEHOLDER, SqlFragment, SqlParam, escape_like};
pub use rendered::RenderedQuery;
pub use select::{Join, JoinKind, Select, TableSource, union_all};
