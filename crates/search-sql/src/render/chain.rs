//! Forward and reverse chain resolution.
//!
//! A forward chain `hop0.hop1...terminal` becomes nested `IN` sub-selects
//! over reference strings:
//!
//! ```text
//! (p1.PARAMETER_NAME_ID = <hop0> AND (p1.TOKEN_VALUE IN (
//!     SELECT 'T1' || '/' || CLR1.LOGICAL_ID FROM T1_RESOURCES CR1, T1_LOGICAL_RESOURCES CLR1,
//!            T1_TOKEN_VALUES_V CP1
//!      WHERE ... AND CP1.PARAMETER_NAME_ID = <hop1> AND CP1.TOKEN_VALUE IN (
//!         SELECT 'T2' || '/' || CLR2.LOGICAL_ID FROM T2_RESOURCES CR2, T2_LOGICAL_RESOURCES CLR2,
//!                T2_<KIND> CP2
//!          WHERE ... AND <terminal filter on CP2>))))
//! ```
//!
//! The outer reference opens three parentheses and every intermediate hop one
//! more, so a chain of `n` hops always closes `n + 2`. A wildcard target on
//! the last hop repeats the terminal sub-select once per resource type,
//! joined with `UNION`.

use crate::domain::{ChainTarget, ChainedNode, ReverseChainFilter, ReverseChainNode, SearchNode};
use crate::error::{CompileResult, SearchError};
use crate::schema::{self, NOT_DELETED, PARAMETER_NAME_ID, ValueTable, correlate};
use crate::sql::SqlFragment;

use super::context::{NodeSql, RenderContext, Target};
use super::handlers::render_node;

/// A rendered forward chain and the number of parentheses it closed.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedChain {
    pub fragment: SqlFragment,
    pub closing_parens: usize,
}

/// Builds chain predicates.
pub(crate) struct ChainResolver;

impl ChainResolver {
    /// Renders a forward chain as a join on the searched type's reference
    /// view.
    pub fn build_forward(
        node: &ChainedNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let resolved = Self::resolve(node, target.alias, ctx)?;
        Ok(NodeSql::Join {
            table: ValueTable::TokenValues.table(target.resource_type),
            parameter_name_id: None,
            filter: resolved.fragment,
        })
    }

    /// Renders the chain filter on the reference view aliased `alias`.
    pub fn resolve(
        node: &ChainedNode,
        alias: &str,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<ResolvedChain> {
        let (Some(first), Some((last, intermediate))) = (node.hops.first(), node.hops.split_last())
        else {
            return Err(SearchError::InvalidRequest {
                message: format!("chain '{}' has no reference hops", node.display),
            }
            .into());
        };

        let mut out = SqlFragment::new(format!(
            "({a}.{pn} = {id} AND ({a}.TOKEN_VALUE IN (",
            a = alias,
            pn = PARAMETER_NAME_ID,
            id = ctx.session.parameter_name_id(&first.code)?
        ));
        let mut open = 3;

        // Each intermediate sub-select filters on the reference of the next hop.
        for (index, hop) in intermediate.iter().enumerate() {
            let ChainTarget::Type(resource_type) = &hop.target else {
                return Err(SearchError::MisplacedWildcard {
                    chain: node.display.clone(),
                }
                .into());
            };
            let next = &node.hops[index + 1];
            let k = ctx.aliases.next_chain();
            let (lr, cp) = (format!("CLR{}", k), format!("CP{}", k));

            out.push_str(&Self::sub_select_head(resource_type, k, ctx));
            out.push_str(&format!(
                ", {table} {cp} WHERE {base} AND {on} AND {cp}.{pn} = {id} AND {cp}.TOKEN_VALUE IN (",
                table = ValueTable::TokenValues.table(resource_type),
                cp = cp,
                base = Self::sub_select_base(k),
                on = correlate(&cp, &lr),
                pn = PARAMETER_NAME_ID,
                id = ctx.session.parameter_name_id(&next.code)?
            ));
            open += 1;
        }

        let terminal_types: Vec<&str> = match &last.target {
            ChainTarget::Type(t) => vec![t.as_str()],
            ChainTarget::Wildcard(types) => types.iter().map(String::as_str).collect(),
        };
        let branches = terminal_types
            .into_iter()
            .map(|resource_type| Self::terminal_select(&node.terminal, resource_type, ctx))
            .collect::<CompileResult<Vec<_>>>()?;
        out.push_fragment(SqlFragment::join(branches, " UNION "));

        out.push_str(&")".repeat(open));
        Ok(ResolvedChain {
            fragment: out,
            closing_parens: open,
        })
    }

    /// `SELECT 'T' || '/' || CLRk.LOGICAL_ID FROM T_RESOURCES CRk, T_LOGICAL_RESOURCES CLRk`
    fn sub_select_head(resource_type: &str, k: usize, ctx: &RenderContext<'_>) -> String {
        format!(
            "SELECT {reference} FROM {resources} CR{k}, {logical} CLR{k}",
            reference = ctx.reference_expr(resource_type, &format!("CLR{}.LOGICAL_ID", k)),
            resources = schema::resources(resource_type),
            logical = schema::logical_resources(resource_type),
            k = k
        )
    }

    /// Current, non-deleted version of the chained resource.
    fn sub_select_base(k: usize) -> String {
        format!(
            "CR{k}.RESOURCE_ID = CLR{k}.CURRENT_RESOURCE_ID AND CR{k}.IS_DELETED = {nd}",
            k = k,
            nd = NOT_DELETED
        )
    }

    fn terminal_select(
        terminal: &SearchNode,
        resource_type: &str,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<SqlFragment> {
        let k = ctx.aliases.next_chain();
        let (lr, cp) = (format!("CLR{}", k), format!("CP{}", k));
        let mut out = SqlFragment::new(Self::sub_select_head(resource_type, k, ctx));

        let target = Target {
            resource_type,
            lr_alias: &lr,
            alias: &cp,
        };
        match render_node(terminal, target, ctx)? {
            NodeSql::Join {
                table,
                parameter_name_id,
                filter,
            } => {
                out.push_str(&format!(
                    ", {} {} WHERE {} AND {}",
                    table,
                    cp,
                    Self::sub_select_base(k),
                    NodeSql::join_condition(&cp, &lr, parameter_name_id)
                ));
                if !filter.is_empty() {
                    out.push_str(" AND ");
                    out.push_fragment(filter);
                }
            }
            NodeSql::Predicate(predicate) => {
                out.push_str(&format!(" WHERE {}", Self::sub_select_base(k)));
                if !predicate.is_empty() {
                    out.push_str(" AND ");
                    out.push_fragment(predicate);
                }
            }
        }
        Ok(out)
    }

    /// Renders `_has` as a predicate on the searched resource: its reference
    /// string must appear among the references of matching source resources.
    pub fn build_reverse(
        node: &ReverseChainNode,
        target: Target<'_>,
        ctx: &mut RenderContext<'_>,
    ) -> CompileResult<NodeSql> {
        let k = ctx.aliases.next_chain();
        let (lr, cp, cv) = (
            format!("CLR{}", k),
            format!("CP{}", k),
            format!("CV{}", k),
        );
        let source = node.source_type.as_str();

        let filter = match &node.filter {
            ReverseChainFilter::Node(inner) => {
                let inner_target = Target {
                    resource_type: source,
                    lr_alias: &lr,
                    alias: &cv,
                };
                render_node(inner, inner_target, ctx)?
            }
            ReverseChainFilter::Nested(inner) => {
                let inner_target = Target {
                    resource_type: source,
                    lr_alias: &lr,
                    alias: &cv,
                };
                Self::build_reverse(inner, inner_target, ctx)?
            }
        };

        let mut from = format!(
            "{} {}, {} {}",
            schema::logical_resources(source),
            lr,
            ValueTable::TokenValues.table(source),
            cp
        );
        let mut conditions = vec![
            SqlFragment::new(format!("{}.IS_DELETED = {}", lr, NOT_DELETED)),
            SqlFragment::new(format!(
                "{} AND {}.{} = {}",
                correlate(&cp, &lr),
                cp,
                PARAMETER_NAME_ID,
                ctx.session.parameter_name_id(&node.reference_code)?
            )),
        ];
        match filter {
            NodeSql::Join {
                table,
                parameter_name_id,
                filter,
            } => {
                from.push_str(&format!(", {} {}", table, cv));
                conditions.push(SqlFragment::new(NodeSql::join_condition(
                    &cv,
                    &lr,
                    parameter_name_id,
                )));
                conditions.push(filter);
            }
            NodeSql::Predicate(predicate) => conditions.push(predicate),
        }

        let mut out = SqlFragment::new(format!(
            "{} IN (SELECT {}.TOKEN_VALUE FROM {} WHERE ",
            ctx.reference_expr(target.resource_type, &format!("{}.LOGICAL_ID", target.lr_alias)),
            cp,
            from
        ));
        out.push_fragment(SqlFragment::and_all(conditions)).push_str(")");
        Ok(NodeSql::Predicate(out))
    }
}
