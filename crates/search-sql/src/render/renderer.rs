//! Statement assembly.

use tracing::trace;

use crate::cache::CacheSession;
use crate::domain::{DomainScope, IncludeNode, SearchDomain, SortColumn, SortNode};
use crate::error::{CompileResult, SearchError};
use crate::schema::{self, NOT_DELETED, PARAMETER_NAME_ID, RESOURCE_COLUMNS, ValueTable, correlate};
use crate::sql::{RenderDialect, Select, SqlFragment, union_all};
use crate::types::{IncludeType, Pagination, SortDirection};

use super::context::{NodeSql, RenderContext, Target};
use super::handlers::{id_list, render_node};

/// Alias of the searched logical-resources table.
const ROOT: &str = "LR0";

/// Renders search domains into SQL fragments.
///
/// Every statement is rooted at `<T>_LOGICAL_RESOURCES LR0`. Filter nodes
/// become inner joins or WHERE predicates and are ANDed; inclusion nodes are
/// ORed into a single predicate. Rendering never touches the database except
/// through the identity lookups of the session.
pub struct SqlRenderer<'a> {
    session: &'a CacheSession<'a>,
    dialect: &'a dyn RenderDialect,
}

impl<'a> SqlRenderer<'a> {
    /// Creates a renderer over a cache session and a dialect.
    pub fn new(session: &'a CacheSession<'a>, dialect: &'a dyn RenderDialect) -> Self {
        Self { session, dialect }
    }

    fn context(&self) -> RenderContext<'a> {
        RenderContext::new(self.session, self.dialect)
    }

    /// Page of matching resources with their payloads, in surrogate id order.
    ///
    /// Sort keys are ignored here; see [`SqlRenderer::sort_query`].
    pub fn data_query(
        &self,
        domain: &SearchDomain,
        pagination: &Pagination,
    ) -> CompileResult<SqlFragment> {
        let resource_type = match &domain.scope {
            DomainScope::Type(t) => t.as_str(),
            DomainScope::WholeSystem(types) => {
                return self.whole_system_query(domain, types, pagination);
            }
        };

        let mut ctx = self.context();
        let mut inner = Select::new([
            "LR0.LOGICAL_RESOURCE_ID",
            "LR0.LOGICAL_ID",
            "LR0.CURRENT_RESOURCE_ID",
        ]);
        inner.distinct();
        Self::root(&mut inner, resource_type);
        Self::apply_filters(&mut inner, resource_type, domain, &mut ctx)?;
        inner
            .order_by("LR0.LOGICAL_RESOURCE_ID")
            .paginate(pagination.offset(), u64::from(pagination.page_size));

        let mut columns: Vec<String> = RESOURCE_COLUMNS.iter().map(|c| format!("R.{}", c)).collect();
        columns.push("LR.LOGICAL_ID".to_string());
        let mut outer = Select::new(columns);
        outer
            .from_subquery(inner.render(self.dialect), "LR")
            .inner_join(
                schema::resources(resource_type),
                "R",
                SqlFragment::new("LR.CURRENT_RESOURCE_ID = R.RESOURCE_ID"),
            )
            .order_by("LR.LOGICAL_RESOURCE_ID");
        Ok(outer.render(self.dialect))
    }

    /// Number of matching resources.
    pub fn count_query(&self, domain: &SearchDomain) -> CompileResult<SqlFragment> {
        match &domain.scope {
            DomainScope::Type(resource_type) => {
                let mut ctx = self.context();
                let mut select = Select::new(["COUNT(DISTINCT LR0.LOGICAL_RESOURCE_ID)"]);
                Self::root(&mut select, resource_type);
                Self::apply_filters(&mut select, resource_type, domain, &mut ctx)?;
                Ok(select.render(self.dialect))
            }
            DomainScope::WholeSystem(types) => {
                let mut branches = Vec::with_capacity(types.len());
                for resource_type in types {
                    let mut ctx = self.context();
                    let mut branch =
                        Select::new(["COUNT(DISTINCT LR0.LOGICAL_RESOURCE_ID) AS CNT"]);
                    Self::root(&mut branch, resource_type);
                    Self::apply_filters(&mut branch, resource_type, domain, &mut ctx)?;
                    branches.push(branch.render(self.dialect));
                }
                let mut total = Select::new(["SUM(CNT)"]);
                total.from_subquery(union_all(branches), "COUNTS");
                Ok(total.render(self.dialect))
            }
        }
    }

    /// Page of current resource ids ordered by the domain's sort keys.
    ///
    /// Each key left-joins its value table and aggregates it per resource:
    /// `MIN` for ascending keys and `MAX` for descending ones, with missing
    /// values last. Whole-system searches sort the combined id list instead.
    pub fn sort_query(
        &self,
        domain: &SearchDomain,
        pagination: &Pagination,
    ) -> CompileResult<SqlFragment> {
        let resource_type = match &domain.scope {
            DomainScope::Type(t) => t.as_str(),
            DomainScope::WholeSystem(types) => {
                return self.whole_system_query(domain, types, pagination);
            }
        };

        let mut ctx = self.context();
        let mut select = Select::new(["LR0.CURRENT_RESOURCE_ID"]);
        Self::root(&mut select, resource_type);
        Self::apply_filters(&mut select, resource_type, domain, &mut ctx)?;

        for sort in domain.sorts() {
            let aggregate = Self::sort_aggregate(sort, resource_type, &mut select, &mut ctx)?;
            let order = match (&sort.column, sort.direction) {
                (SortColumn::Value { .. }, SortDirection::Ascending) => "ASC NULLS LAST",
                (SortColumn::Value { .. }, SortDirection::Descending) => "DESC NULLS LAST",
                (_, SortDirection::Ascending) => "ASC",
                (_, SortDirection::Descending) => "DESC",
            };
            select
                .column(aggregate.clone())
                .order_by(format!("{} {}", aggregate, order));
        }

        select
            .group_by("LR0.CURRENT_RESOURCE_ID")
            .order_by("LR0.CURRENT_RESOURCE_ID")
            .paginate(pagination.offset(), u64::from(pagination.page_size));
        Ok(select.render(self.dialect))
    }

    fn sort_aggregate(
        sort: &SortNode,
        resource_type: &str,
        select: &mut Select,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<String> {
        let function = match sort.direction {
            SortDirection::Ascending => "MIN",
            SortDirection::Descending => "MAX",
        };
        Ok(match &sort.column {
            SortColumn::LogicalId => format!("{}(LR0.LOGICAL_ID)", function),
            SortColumn::LastUpdated => format!("{}(LR0.LAST_UPDATED)", function),
            SortColumn::Value {
                table,
                ascending,
                descending,
            } => {
                let alias = ctx.aliases.next_sort();
                let column = match sort.direction {
                    SortDirection::Ascending => ascending,
                    SortDirection::Descending => descending,
                };
                select.left_join(
                    table.table(resource_type),
                    alias.as_str(),
                    SqlFragment::new(format!(
                        "{} AND {}.{} = {}",
                        correlate(&alias, ROOT),
                        alias,
                        PARAMETER_NAME_ID,
                        ctx.session.parameter_name_id(&sort.code)?
                    )),
                );
                format!("{}({}.{})", function, alias, column)
            }
        })
    }

    /// Resources referenced by, or referencing, the given logical resources.
    ///
    /// For `_include`, `logical_resource_ids` are the source resources; for
    /// `_revinclude` they are the targets. Returns `None` when there is
    /// nothing to look up.
    pub fn include_query(
        &self,
        nodes: &[IncludeNode],
        logical_resource_ids: &[i64],
        pagination: &Pagination,
    ) -> CompileResult<Option<SqlFragment>> {
        if nodes.is_empty() || logical_resource_ids.is_empty() {
            return Ok(None);
        }

        let mut branches = Vec::with_capacity(nodes.len());
        for node in nodes {
            branches.push(self.include_branch(node, logical_resource_ids)?);
        }

        let offset = pagination.offset();
        let limit = u64::from(pagination.page_size);
        if let [single] = branches.as_mut_slice() {
            single.order_by("R0.RESOURCE_ID").paginate(offset, limit);
            return Ok(Some(single.render(self.dialect)));
        }

        let mut combined = Select::new(["*"]);
        combined
            .from_subquery(
                union_all(branches.iter().map(|b| b.render(self.dialect))),
                "INCLUDED",
            )
            .order_by("RESOURCE_ID")
            .paginate(offset, limit);
        Ok(Some(combined.render(self.dialect)))
    }

    fn include_branch(
        &self,
        node: &IncludeNode,
        logical_resource_ids: &[i64],
    ) -> CompileResult<Select> {
        let (returned_type, lr_on, r_on, id_column) = match node.include_type {
            IncludeType::Include => (
                node.target_type.as_str(),
                format!(
                    "{} = p1.TOKEN_VALUE AND LR0.IS_DELETED = {}",
                    self.reference_expr(&node.target_type, "LR0.LOGICAL_ID"),
                    NOT_DELETED
                ),
                "R0.LOGICAL_RESOURCE_ID = LR0.LOGICAL_RESOURCE_ID \
                 AND COALESCE(p1.REF_VERSION_ID, LR0.VERSION_ID) = R0.VERSION_ID",
                "p1.LOGICAL_RESOURCE_ID",
            ),
            IncludeType::Revinclude => (
                node.source_type.as_str(),
                format!(
                    "LR0.LOGICAL_RESOURCE_ID = p1.LOGICAL_RESOURCE_ID AND LR0.IS_DELETED = {}",
                    NOT_DELETED
                ),
                "R0.RESOURCE_ID = LR0.CURRENT_RESOURCE_ID",
                "PLR.LOGICAL_RESOURCE_ID",
            ),
        };

        let mut columns: Vec<String> = RESOURCE_COLUMNS.iter().map(|c| format!("R0.{}", c)).collect();
        columns.push("LR0.LOGICAL_ID".to_string());
        columns.push(format!("'{}' AS RESOURCE_TYPE", returned_type));

        let mut select = Select::new(columns);
        select
            .distinct()
            .from_table(ValueTable::TokenValues.table(&node.source_type), "p1");
        if node.include_type == IncludeType::Revinclude {
            select.inner_join(
                schema::logical_resources(&node.target_type),
                "PLR",
                SqlFragment::new(format!(
                    "p1.TOKEN_VALUE = {}",
                    self.reference_expr(&node.target_type, "PLR.LOGICAL_ID")
                )),
            );
        }
        select
            .inner_join(
                schema::logical_resources(returned_type),
                ROOT,
                SqlFragment::new(lr_on),
            )
            .inner_join(schema::resources(returned_type), "R0", SqlFragment::new(r_on))
            .filter(SqlFragment::new(format!(
                "p1.{} = {}",
                PARAMETER_NAME_ID,
                self.session.parameter_name_id(&node.code)?
            )))
            .filter(id_list(id_column, logical_resource_ids));
        Ok(select)
    }

    /// Payloads of the given resource versions, by `RESOURCE_ID`.
    pub fn fetch_query(&self, resource_type: &str, resource_ids: &[i64]) -> Option<SqlFragment> {
        if resource_ids.is_empty() {
            return None;
        }
        let mut columns: Vec<String> = RESOURCE_COLUMNS.iter().map(|c| format!("R.{}", c)).collect();
        columns.push("LR.LOGICAL_ID".to_string());

        let mut select = Select::new(columns);
        select
            .from_table(schema::resources(resource_type), "R")
            .inner_join(
                schema::logical_resources(resource_type),
                "LR",
                SqlFragment::new("LR.LOGICAL_RESOURCE_ID = R.LOGICAL_RESOURCE_ID"),
            )
            .filter(id_list("R.RESOURCE_ID", resource_ids));
        Some(select.render(self.dialect))
    }

    /// One page of `(type, logical resource)` rows across every type in scope.
    fn whole_system_query(
        &self,
        domain: &SearchDomain,
        types: &[String],
        pagination: &Pagination,
    ) -> CompileResult<SqlFragment> {
        let mut branches = Vec::with_capacity(types.len());
        for resource_type in types {
            let mut ctx = self.context();
            let mut branch = Select::new([
                format!(
                    "{} AS RESOURCE_TYPE_ID",
                    self.session.resource_type_id(resource_type)?
                ),
                "LR0.LOGICAL_RESOURCE_ID".to_string(),
                "LR0.LOGICAL_ID".to_string(),
                "LR0.CURRENT_RESOURCE_ID".to_string(),
                "LR0.LAST_UPDATED".to_string(),
            ]);
            branch.distinct();
            Self::root(&mut branch, resource_type);
            Self::apply_filters(&mut branch, resource_type, domain, &mut ctx)?;
            branches.push(branch.render(self.dialect));
        }

        let mut combined = Select::new([
            "RESOURCE_TYPE_ID",
            "LOGICAL_RESOURCE_ID",
            "LOGICAL_ID",
            "CURRENT_RESOURCE_ID",
            "LAST_UPDATED",
        ]);
        combined.from_subquery(union_all(branches), "COMBINED_RESULTS");
        for sort in domain.sorts() {
            let column = match sort.column {
                SortColumn::LogicalId => "LOGICAL_ID",
                SortColumn::LastUpdated => "LAST_UPDATED",
                SortColumn::Value { .. } => {
                    return Err(SearchError::InvalidRequest {
                        message: format!(
                            "_sort={} is not available for whole-system search",
                            sort.code
                        ),
                    }
                    .into());
                }
            };
            let direction = match sort.direction {
                SortDirection::Ascending => "ASC",
                SortDirection::Descending => "DESC",
            };
            combined.order_by(format!("{} {}", column, direction));
        }
        combined
            .order_by("RESOURCE_TYPE_ID")
            .order_by("LOGICAL_RESOURCE_ID")
            .paginate(pagination.offset(), u64::from(pagination.page_size));
        Ok(combined.render(self.dialect))
    }

    fn reference_expr(&self, resource_type: &str, column: &str) -> String {
        self.context().reference_expr(resource_type, column)
    }

    fn root(select: &mut Select, resource_type: &str) {
        select
            .from_table(schema::logical_resources(resource_type), ROOT)
            .filter(SqlFragment::new(format!("LR0.IS_DELETED = {}", NOT_DELETED)));
    }

    /// Adds the domain's filter nodes, evaluated on `resource_type`.
    fn apply_filters(
        select: &mut Select,
        resource_type: &str,
        domain: &SearchDomain,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<()> {
        let mut inclusion = Vec::new();
        for node in domain.filters() {
            let alias = ctx.aliases.next_param();
            let target = Target {
                resource_type,
                lr_alias: ROOT,
                alias: &alias,
            };
            let rendered = render_node(node, target, ctx)?;
            trace!("Rendered {} node as {}", node.kind(), alias);

            if node.is_inclusion() {
                inclusion.push(rendered.into_predicate(&alias, ROOT));
                continue;
            }
            Self::place(select, &alias, rendered);
        }
        if !inclusion.is_empty() {
            select.filter(SqlFragment::or_all(inclusion));
        }
        Ok(())
    }

    fn place(select: &mut Select, alias: &str, rendered: NodeSql) {
        match rendered {
            NodeSql::Join {
                table,
                parameter_name_id,
                filter,
            } => {
                select
                    .inner_join(
                        table,
                        alias,
                        SqlFragment::new(NodeSql::join_condition(alias, ROOT, parameter_name_id)),
                    )
                    .filter(filter);
            }
            NodeSql::Predicate(predicate) => {
                select.filter(predicate);
            }
        }
    }
}
