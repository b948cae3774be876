//! Structured SELECT statement builder.
//!
//! Statements are assembled from typed parts and rendered once, so the join
//! order, predicate order and bind order always agree.

use super::dialect::RenderDialect;
use super::fragment::SqlFragment;

/// Kind of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `INNER JOIN`
    Inner,
    /// `LEFT OUTER JOIN`
    LeftOuter,
}

impl JoinKind {
    fn keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
        }
    }
}

/// A table or derived table in a FROM or JOIN clause.
#[derive(Debug, Clone)]
pub enum TableSource {
    /// A named table with an alias.
    Table {
        /// Table name.
        name: String,
        /// Alias.
        alias: String,
    },
    /// A parenthesized sub-query with an alias.
    SubQuery {
        /// The inner statement.
        query: SqlFragment,
        /// Alias.
        alias: String,
    },
}

impl TableSource {
    /// Creates a named table source.
    pub fn table(name: impl Into<String>, alias: impl Into<String>) -> Self {
        TableSource::Table {
            name: name.into(),
            alias: alias.into(),
        }
    }

    fn render(&self) -> SqlFragment {
        match self {
            TableSource::Table { name, alias } => SqlFragment::new(format!("{} {}", name, alias)),
            TableSource::SubQuery { query, alias } => {
                let mut out = SqlFragment::new("(");
                out.push_fragment(query.clone());
                out.push_str(") ").push_str(alias);
                out
            }
        }
    }
}

/// A join with its ON condition.
#[derive(Debug, Clone)]
pub struct Join {
    /// The join kind.
    pub kind: JoinKind,
    /// The joined source.
    pub source: TableSource,
    /// The ON condition.
    pub on: SqlFragment,
}

/// A SELECT statement under construction.
#[derive(Debug, Clone, Default)]
pub struct Select {
    distinct: bool,
    columns: Vec<String>,
    from: Option<TableSource>,
    joins: Vec<Join>,
    predicates: Vec<SqlFragment>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    page: Option<(u64, u64)>,
}

impl Select {
    /// Creates a SELECT of the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Requests `SELECT DISTINCT`.
    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    /// Sets the FROM source.
    pub fn from(&mut self, source: TableSource) -> &mut Self {
        self.from = Some(source);
        self
    }

    /// Sets a named FROM table.
    pub fn from_table(&mut self, name: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        self.from(TableSource::table(name, alias))
    }

    /// Sets a derived FROM table.
    pub fn from_subquery(&mut self, query: SqlFragment, alias: impl Into<String>) -> &mut Self {
        self.from(TableSource::SubQuery {
            query,
            alias: alias.into(),
        })
    }

    /// Adds a join.
    pub fn join(&mut self, kind: JoinKind, source: TableSource, on: SqlFragment) -> &mut Self {
        self.joins.push(Join { kind, source, on });
        self
    }

    /// Adds an inner join on a named table.
    pub fn inner_join(
        &mut self,
        name: impl Into<String>,
        alias: impl Into<String>,
        on: SqlFragment,
    ) -> &mut Self {
        self.join(JoinKind::Inner, TableSource::table(name, alias), on)
    }

    /// Adds a left outer join on a named table.
    pub fn left_join(
        &mut self,
        name: impl Into<String>,
        alias: impl Into<String>,
        on: SqlFragment,
    ) -> &mut Self {
        self.join(JoinKind::LeftOuter, TableSource::table(name, alias), on)
    }

    /// Adds a WHERE predicate; predicates are ANDed.
    pub fn filter(&mut self, predicate: SqlFragment) -> &mut Self {
        if !predicate.is_empty() {
            self.predicates.push(predicate);
        }
        self
    }

    /// Adds a column.
    pub fn column(&mut self, column: impl Into<String>) -> &mut Self {
        self.columns.push(column.into());
        self
    }

    /// Adds a GROUP BY expression.
    pub fn group_by(&mut self, expr: impl Into<String>) -> &mut Self {
        self.group_by.push(expr.into());
        self
    }

    /// Adds an ORDER BY expression.
    pub fn order_by(&mut self, expr: impl Into<String>) -> &mut Self {
        self.order_by.push(expr.into());
        self
    }

    /// Limits the result to one page.
    pub fn paginate(&mut self, offset: u64, limit: u64) -> &mut Self {
        self.page = Some((offset, limit));
        self
    }

    /// Renders the statement.
    pub fn render(&self, dialect: &dyn RenderDialect) -> SqlFragment {
        let mut out = SqlFragment::new(if self.distinct {
            "SELECT DISTINCT "
        } else {
            "SELECT "
        });
        out.push_str(&self.columns.join(", "));

        if let Some(from) = &self.from {
            out.push_str(" FROM ");
            out.push_fragment(from.render());
        }

        for join in &self.joins {
            out.push_str(" ").push_str(join.kind.keyword()).push_str(" ");
            out.push_fragment(join.source.render());
            if !join.on.is_empty() {
                out.push_str(" ON ");
                out.push_fragment(join.on.clone());
            }
        }

        if !self.predicates.is_empty() {
            out.push_str(" WHERE ");
            out.push_fragment(SqlFragment::and_all(self.predicates.iter().cloned()));
        }

        if !self.group_by.is_empty() {
            out.push_str(" GROUP BY ").push_str(&self.group_by.join(", "));
        }

        if !self.order_by.is_empty() {
            out.push_str(" ORDER BY ").push_str(&self.order_by.join(", "));
        }

        if let Some((offset, limit)) = self.page {
            out.push_str(" ").push_str(&dialect.pagination(offset, limit));
        }

        out
    }
}

/// Combines sub-selects with `UNION ALL`.
pub fn union_all(branches: impl IntoIterator<Item = SqlFragment>) -> SqlFragment {
    SqlFragment::join(branches, " UNION ALL ")
}
