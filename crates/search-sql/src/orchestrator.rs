//! The public entry points: one method per statement kind.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use helios_search_sql::cache::{IdentityCacheService, IdentityKey, LocalUnitOfWork};
//! use helios_search_sql::config::SearchConfig;
//! use helios_search_sql::error::CacheResult;
//! use helios_search_sql::orchestrator::{QueryOrchestrator, SearchContext};
//! use helios_search_sql::registry::{SearchParameterDefinition, SearchParameterRegistry};
//! use helios_search_sql::tenant::TenantContext;
//! use helios_search_sql::types::{SearchParamType, SearchParameter, SearchQuery};
//! use parking_lot::RwLock;
//!
//! let mut registry = SearchParameterRegistry::new();
//! registry
//!     .register(
//!         SearchParameterDefinition::new(
//!             "http://hl7.org/fhir/SearchParameter/individual-family",
//!             "family",
//!             SearchParamType::String,
//!             "Patient.name.family",
//!         )
//!         .with_base(["Patient"]),
//!     )
//!     .unwrap();
//!
//! let orchestrator = QueryOrchestrator::new(
//!     SearchConfig::default(),
//!     Arc::new(RwLock::new(registry)),
//!     IdentityCacheService::new(),
//! )
//! .unwrap();
//!
//! let tenant = TenantContext::default();
//! let resolver = |_: &IdentityKey| -> CacheResult<Option<i64>> { Ok(Some(1)) };
//! let uow = LocalUnitOfWork::new();
//! let ctx = SearchContext::new(&tenant, &resolver, &uow);
//!
//! let query = SearchQuery::new("Patient")
//!     .with_parameter(SearchParameter::new("family", SearchParamType::String).with_eq("Smith"));
//! let rendered = orchestrator.build_count_query(&ctx, &query).unwrap().unwrap();
//! assert!(rendered.sql.contains("p1.STR_VALUE_LCASE LIKE ?"));
//! assert_eq!(rendered.binds.len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::cache::{CacheMissResolver, IdentityCacheService, UnitOfWork};
use crate::config::SearchConfig;
use crate::domain::{DomainBuilder, SearchDomain, validate_type_name};
use crate::error::{CompileResult, SearchError};
use crate::registry::SearchParameterRegistry;
use crate::render::SqlRenderer;
use crate::sql::{RenderDialect, RenderedQuery, SqlFragment};
use crate::tenant::TenantContext;
use crate::terminology::CodeSetExpander;
use crate::types::{IncludeDirective, Pagination, SearchQuery};

/// Per-request inputs: tenant, identity resolution and paging.
pub struct SearchContext<'a> {
    /// Tenant and datastore searched.
    pub tenant: &'a TenantContext,
    /// Reads ids missing from the identity cache.
    pub resolver: &'a dyn CacheMissResolver,
    /// Transaction the compilation runs in.
    pub unit_of_work: &'a dyn UnitOfWork,
    /// Requested page.
    pub pagination: Pagination,
    /// Expands value sets for `:in` and `:not-in`; those modifiers are
    /// rejected without one.
    pub code_sets: Option<&'a dyn CodeSetExpander>,
}

impl<'a> SearchContext<'a> {
    /// Creates a context for the first page at the default size.
    pub fn new(
        tenant: &'a TenantContext,
        resolver: &'a dyn CacheMissResolver,
        unit_of_work: &'a dyn UnitOfWork,
    ) -> Self {
        Self {
            tenant,
            resolver,
            unit_of_work,
            pagination: Pagination::default(),
            code_sets: None,
        }
    }

    /// Sets the requested page.
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Sets the value set expander.
    pub fn with_code_sets(mut self, code_sets: &'a dyn CodeSetExpander) -> Self {
        self.code_sets = Some(code_sets);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryKind {
    Data,
    Count,
    Sort,
    Include,
    Fetch,
}

impl QueryKind {
    /// Whether the optimizer hint is attached to this kind of statement.
    fn hinted(&self) -> bool {
        matches!(self, QueryKind::Data | QueryKind::Count | QueryKind::Sort)
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryKind::Data => "data",
            QueryKind::Count => "count",
            QueryKind::Sort => "sort",
            QueryKind::Include => "include",
            QueryKind::Fetch => "fetch",
        };
        write!(f, "{}", name)
    }
}

/// Compiles search requests into executable statements.
///
/// The orchestrator owns the configuration and the dialect, and shares the
/// parameter registry and identity cache with the rest of the host. Every
/// `build_*` method returns `Ok(None)` when the request can match nothing
/// and no statement needs to run.
pub struct QueryOrchestrator {
    config: SearchConfig,
    registry: Arc<RwLock<SearchParameterRegistry>>,
    cache: IdentityCacheService,
    dialect: Box<dyn RenderDialect>,
}

impl QueryOrchestrator {
    /// Creates an orchestrator rendering for the configured dialect.
    pub fn new(
        config: SearchConfig,
        registry: Arc<RwLock<SearchParameterRegistry>>,
        cache: IdentityCacheService,
    ) -> CompileResult<Self> {
        config.validate()?;
        let dialect = config.dialect.create();
        Ok(Self {
            config,
            registry,
            cache,
            dialect,
        })
    }

    /// Replaces the dialect.
    pub fn with_dialect(mut self, dialect: Box<dyn RenderDialect>) -> Self {
        self.dialect = dialect;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Returns the identity cache.
    pub fn cache(&self) -> &IdentityCacheService {
        &self.cache
    }

    /// One page of matching resources with their payloads.
    ///
    /// Whole-system searches return `(RESOURCE_TYPE_ID, LOGICAL_RESOURCE_ID,
    /// LOGICAL_ID, CURRENT_RESOURCE_ID, LAST_UPDATED)` rows instead; payloads
    /// are then read per type with [`QueryOrchestrator::build_fetch_query`].
    pub fn build_data_query(
        &self,
        ctx: &SearchContext<'_>,
        query: &SearchQuery,
    ) -> CompileResult<Option<RenderedQuery>> {
        self.compile(ctx, query, QueryKind::Data, |renderer, domain, page| {
            renderer.data_query(domain, page)
        })
    }

    /// Total number of matching resources.
    pub fn build_count_query(
        &self,
        ctx: &SearchContext<'_>,
        query: &SearchQuery,
    ) -> CompileResult<Option<RenderedQuery>> {
        self.compile(ctx, query, QueryKind::Count, |renderer, domain, _| {
            renderer.count_query(domain)
        })
    }

    /// One page of current resource ids in `_sort` order.
    pub fn build_sort_query(
        &self,
        ctx: &SearchContext<'_>,
        query: &SearchQuery,
    ) -> CompileResult<Option<RenderedQuery>> {
        if query.sort.is_empty() {
            return Err(SearchError::InvalidRequest {
                message: "a sort query needs at least one _sort key".to_string(),
            }
            .into());
        }
        self.compile(ctx, query, QueryKind::Sort, |renderer, domain, page| {
            renderer.sort_query(domain, page)
        })
    }

    /// Resources reached through one `_include` or `_revinclude` directive
    /// from the given logical resources.
    ///
    /// The context's pagination is replaced by the include limit while the
    /// statement is built and restored afterwards, whether or not building
    /// succeeds.
    pub fn build_include_query(
        &self,
        ctx: &mut SearchContext<'_>,
        query: &SearchQuery,
        directive: &IncludeDirective,
        logical_resource_ids: &[i64],
    ) -> CompileResult<Option<RenderedQuery>> {
        if logical_resource_ids.is_empty() {
            return Ok(None);
        }

        let include_page = ctx.pagination.for_includes(self.config.max_include_count);
        let saved = std::mem::replace(&mut ctx.pagination, include_page);
        let result = self.compile_include(ctx, query, directive, logical_resource_ids);
        ctx.pagination = saved;
        result
    }

    fn compile_include(
        &self,
        ctx: &SearchContext<'_>,
        query: &SearchQuery,
        directive: &IncludeDirective,
        logical_resource_ids: &[i64],
    ) -> CompileResult<Option<RenderedQuery>> {
        let nodes = {
            let registry = self.registry.read();
            DomainBuilder::new(&registry, &self.config)
                .with_code_sets(ctx.code_sets)
                .build_include(query, directive)?
        };
        if nodes.is_empty() {
            debug!(
                "Include of {}:{} reaches no searched type",
                directive.source_type, directive.search_param
            );
            return Ok(None);
        }

        let session = self.cache.session(ctx.tenant, ctx.resolver, ctx.unit_of_work);
        let renderer = SqlRenderer::new(&session, self.dialect.as_ref());
        Ok(renderer
            .include_query(&nodes, logical_resource_ids, &ctx.pagination)?
            .map(|fragment| self.finish(fragment, &directive.source_type, QueryKind::Include)))
    }

    /// Payloads of specific resource versions, by `RESOURCE_ID`.
    pub fn build_fetch_query(
        &self,
        ctx: &SearchContext<'_>,
        resource_type: &str,
        resource_ids: &[i64],
    ) -> CompileResult<Option<RenderedQuery>> {
        validate_type_name(resource_type)?;
        let session = self.cache.session(ctx.tenant, ctx.resolver, ctx.unit_of_work);
        let renderer = SqlRenderer::new(&session, self.dialect.as_ref());
        Ok(renderer
            .fetch_query(resource_type, resource_ids)
            .map(|fragment| self.finish(fragment, resource_type, QueryKind::Fetch)))
    }

    fn compile<F>(
        &self,
        ctx: &SearchContext<'_>,
        query: &SearchQuery,
        kind: QueryKind,
        render: F,
    ) -> CompileResult<Option<RenderedQuery>>
    where
        F: FnOnce(&SqlRenderer<'_>, &SearchDomain, &Pagination) -> CompileResult<SqlFragment>,
    {
        let domain = {
            let registry = self.registry.read();
            DomainBuilder::new(&registry, &self.config)
                .with_code_sets(ctx.code_sets)
                .build(query)?
        };
        let Some(domain) = domain else {
            debug!(
                "No {} query for {}: the search matches nothing",
                kind, query.resource_type
            );
            return Ok(None);
        };

        let session = self.cache.session(ctx.tenant, ctx.resolver, ctx.unit_of_work);
        let renderer = SqlRenderer::new(&session, self.dialect.as_ref());
        let page = ctx
            .pagination
            .clamped(self.config.default_page_size, self.config.max_page_size);
        let fragment = render(&renderer, &domain, &page)?;
        Ok(Some(self.finish(fragment, &query.resource_type, kind)))
    }

    fn finish(&self, fragment: SqlFragment, resource_type: &str, kind: QueryKind) -> RenderedQuery {
        let mut rendered = RenderedQuery::finalize(fragment, self.dialect.as_ref());
        if kind.hinted() {
            if let Some(hint) = self
                .config
                .optimizer_hint
                .as_deref()
                .and_then(|hint| self.dialect.optimizer_hint(hint))
            {
                rendered.append(&hint);
            }
        }

        debug!(
            "Compiled {} query for {} ({} dialect, {} binds)",
            kind,
            resource_type,
            self.dialect.name(),
            rendered.binds.len()
        );
        trace!("{}", rendered.to_debug_sql());
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{IdentityKey, LocalUnitOfWork};
    use crate::error::{CacheResult, CompileError};
    use crate::registry::SearchParameterDefinition;
    use crate::sql::{DialectKind, PostgresDialect};
    use crate::types::{SearchModifier, SearchParamType, SearchParameter, SortDirective};

    fn registry() -> Arc<RwLock<SearchParameterRegistry>> {
        let mut registry = SearchParameterRegistry::new();
        registry
            .register(
                SearchParameterDefinition::new(
                    "http://hl7.org/fhir/SearchParameter/individual-family",
                    "family",
                    SearchParamType::String,
                    "Patient.name.family",
                )
                .with_base(["Patient"]),
            )
            .unwrap();
        registry
            .register(
                SearchParameterDefinition::new(
                    "http://hl7.org/fhir/SearchParameter/Patient-general-practitioner",
                    "general-practitioner",
                    SearchParamType::Reference,
                    "Patient.generalPractitioner",
                )
                .with_base(["Patient"])
                .with_targets(["Practitioner"]),
            )
            .unwrap();
        Arc::new(RwLock::new(registry))
    }

    fn resolve(_: &IdentityKey) -> CacheResult<Option<i64>> {
        Ok(Some(5))
    }

    fn orchestrator(config: SearchConfig) -> QueryOrchestrator {
        QueryOrchestrator::new(config, registry(), IdentityCacheService::new()).unwrap()
    }

    fn family_smith() -> SearchQuery {
        SearchQuery::new("Patient")
            .with_parameter(SearchParameter::new("family", SearchParamType::String).with_eq("Smith"))
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SearchConfig {
            max_page_size: 0,
            ..Default::default()
        };
        let result = QueryOrchestrator::new(config, registry(), IdentityCacheService::new());
        assert!(matches!(result, Err(CompileError::Config(_))));
    }

    #[test]
    fn test_page_size_defaults_and_limits() {
        let orchestrator = orchestrator(SearchConfig {
            default_page_size: 20,
            max_page_size: 50,
            ..Default::default()
        });
        let tenant = TenantContext::default();
        let uow = LocalUnitOfWork::new();

        let ctx = SearchContext::new(&tenant, &resolve, &uow).with_pagination(Pagination::new(1, 0));
        let sql = orchestrator
            .build_data_query(&ctx, &family_smith())
            .unwrap()
            .unwrap()
            .sql;
        assert!(sql.contains("OFFSET 0 ROWS FETCH NEXT 20 ROWS ONLY"));

        let ctx =
            SearchContext::new(&tenant, &resolve, &uow).with_pagination(Pagination::new(3, 500));
        let sql = orchestrator
            .build_data_query(&ctx, &family_smith())
            .unwrap()
            .unwrap()
            .sql;
        assert!(sql.contains("OFFSET 100 ROWS FETCH NEXT 50 ROWS ONLY"));
    }

    #[test]
    fn test_postgres_placeholders() {
        let orchestrator = orchestrator(SearchConfig::default().with_dialect(DialectKind::Postgres));
        let tenant = TenantContext::default();
        let uow = LocalUnitOfWork::new();
        let ctx = SearchContext::new(&tenant, &resolve, &uow);

        let query = family_smith().with_parameter(
            SearchParameter::new("family", SearchParamType::String)
                .with_modifier(SearchModifier::Exact)
                .with_eq("Jones"),
        );
        let rendered = orchestrator.build_count_query(&ctx, &query).unwrap().unwrap();
        assert!(rendered.sql.contains("p1.STR_VALUE_LCASE LIKE $1"));
        assert!(rendered.sql.contains("p2.STR_VALUE = $2"));
        assert_eq!(rendered.placeholder_count(), rendered.binds.len());
    }

    #[test]
    fn test_optimizer_hint_only_where_supported() {
        let config = SearchConfig {
            optimizer_hint: Some("OPT_HINT".to_string()),
            ..Default::default()
        };
        let tenant = TenantContext::default();
        let uow = LocalUnitOfWork::new();
        let ctx = SearchContext::new(&tenant, &resolve, &uow);

        let derby = orchestrator(config.clone());
        let sql = derby.build_count_query(&ctx, &family_smith()).unwrap().unwrap().sql;
        assert!(!sql.contains("OPT_HINT"));

        let db2 = orchestrator(config.with_dialect(DialectKind::Db2));
        let sql = db2.build_count_query(&ctx, &family_smith()).unwrap().unwrap().sql;
        assert!(sql.contains("OPT_HINT"));
        let fetch = db2.build_fetch_query(&ctx, "Patient", &[1]).unwrap().unwrap().sql;
        assert!(!fetch.contains("OPT_HINT"));
    }

    #[test]
    fn test_sort_query_requires_sort_keys() {
        let orchestrator = orchestrator(SearchConfig::default());
        let tenant = TenantContext::default();
        let uow = LocalUnitOfWork::new();
        let ctx = SearchContext::new(&tenant, &resolve, &uow);

        assert!(orchestrator.build_sort_query(&ctx, &family_smith()).is_err());
        let sorted = family_smith().with_sort(SortDirective::parse("family"));
        let sql = orchestrator
            .build_sort_query(&ctx, &sorted)
            .unwrap()
            .unwrap()
            .sql;
        assert!(sql.contains("ORDER BY MIN(S1.STR_VALUE) ASC NULLS LAST"));
    }

    #[test]
    fn test_include_restores_pagination() {
        let orchestrator = orchestrator(SearchConfig {
            max_include_count: 200,
            ..Default::default()
        });
        let tenant = TenantContext::default();
        let uow = LocalUnitOfWork::new();
        let original = Pagination::new(4, 25);
        let mut ctx = SearchContext::new(&tenant, &resolve, &uow).with_pagination(original);

        let query = SearchQuery::new("Patient");
        let directive = IncludeDirective::include("Patient", "general-practitioner", "Practitioner");
        let rendered = orchestrator
            .build_include_query(&mut ctx, &query, &directive, &[10, 11])
            .unwrap()
            .unwrap();
        assert!(rendered.sql.contains("OFFSET 0 ROWS FETCH NEXT 200 ROWS ONLY"));
        assert_eq!(ctx.pagination, original);

        let unknown = IncludeDirective::include("Patient", "nope", "Practitioner");
        assert!(
            orchestrator
                .build_include_query(&mut ctx, &query, &unknown, &[10])
                .is_err()
        );
        assert_eq!(ctx.pagination, original);

        assert!(
            orchestrator
                .build_include_query(&mut ctx, &query, &directive, &[])
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_fetch_rejects_bad_type_names() {
        let orchestrator =
            orchestrator(SearchConfig::default()).with_dialect(Box::new(PostgresDialect));
        let tenant = TenantContext::default();
        let uow = LocalUnitOfWork::new();
        let ctx = SearchContext::new(&tenant, &resolve, &uow);

        assert!(orchestrator.build_fetch_query(&ctx, "Patient; DROP", &[1]).is_err());
        assert!(orchestrator.build_fetch_query(&ctx, "Patient", &[]).unwrap().is_none());
    }
}
