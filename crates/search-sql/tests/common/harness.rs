//! Per-dialect test harness.
//!
//! [`dialect_test!`] expands one test body into a test function per built-in
//! dialect, so every statement shape is checked against Derby, DB2 and
//! PostgreSQL rendering.

use helios_search_sql::cache::LocalUnitOfWork;
use helios_search_sql::sql::DialectKind;
use helios_search_sql::types::SearchQuery;
use helios_search_sql::{QueryOrchestrator, RenderedQuery, SearchConfig, SearchContext, TenantContext};

use super::fixtures::{CountingResolver, create_orchestrator};

/// Optimizer hint configured for every harness orchestrator.
pub const TEST_HINT: &str = "OPTIMIZE FOR 10 ROWS";

/// Everything a single-dialect test needs.
pub struct DialectContext {
    pub dialect: DialectKind,
    pub orchestrator: QueryOrchestrator,
    pub resolver: CountingResolver,
    pub tenant: TenantContext,
    pub uow: LocalUnitOfWork,
}

impl DialectContext {
    /// Creates a context over the seeded registry for `dialect`.
    pub fn new(dialect: DialectKind) -> Self {
        let config = SearchConfig {
            optimizer_hint: Some(TEST_HINT.to_string()),
            ..SearchConfig::default().with_dialect(dialect)
        };
        Self {
            dialect,
            orchestrator: create_orchestrator(config),
            resolver: CountingResolver::new(),
            tenant: TenantContext::default(),
            uow: LocalUnitOfWork::new(),
        }
    }

    /// A search context over this harness's tenant, resolver and unit of work.
    pub fn search_context(&self) -> SearchContext<'_> {
        SearchContext::new(&self.tenant, &self.resolver, &self.uow)
    }

    /// Compiles the data query, failing the test if it does not compile.
    pub fn data(&self, query: &SearchQuery) -> RenderedQuery {
        self.orchestrator
            .build_data_query(&self.search_context(), query)
            .expect("query compiles")
            .expect("query is satisfiable")
    }

    /// Compiles the count query, failing the test if it does not compile.
    pub fn count(&self, query: &SearchQuery) -> RenderedQuery {
        self.orchestrator
            .build_count_query(&self.search_context(), query)
            .expect("query compiles")
            .expect("query is satisfiable")
    }

    /// The placeholder the dialect renders at 1-based `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self.dialect {
            DialectKind::Postgres => format!("${}", index),
            DialectKind::Derby | DialectKind::Db2 => "?".to_string(),
        }
    }

    /// The pagination clause the dialect renders.
    pub fn pagination(&self, offset: u64, limit: u64) -> String {
        match self.dialect {
            DialectKind::Postgres => format!("LIMIT {} OFFSET {}", limit, offset),
            DialectKind::Derby | DialectKind::Db2 => {
                format!("OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, limit)
            }
        }
    }

    /// Whether the dialect attaches optimizer hints.
    pub fn supports_hints(&self) -> bool {
        self.dialect == DialectKind::Db2
    }
}

/// Runs `test_fn` against a fresh context for `dialect`.
pub fn run_with_dialect(dialect: DialectKind, test_fn: fn(&DialectContext)) {
    let ctx = DialectContext::new(dialect);
    test_fn(&ctx);
}

/// Macro to define a test that runs against every dialect.
///
/// # Example
///
/// ```ignore
/// dialect_test!(family_search, |ctx: &DialectContext| {
///     let rendered = ctx.data(&SearchQuery::new("Patient"));
///     assert_well_formed(&rendered);
/// });
/// ```
#[macro_export]
macro_rules! dialect_test {
    ($test_name:ident, $test_fn:expr) => {
        paste::paste! {
            #[test]
            fn [<derby_ $test_name>]() {
                $crate::common::harness::run_with_dialect(
                    helios_search_sql::sql::DialectKind::Derby,
                    $test_fn,
                );
            }

            #[test]
            fn [<db2_ $test_name>]() {
                $crate::common::harness::run_with_dialect(
                    helios_search_sql::sql::DialectKind::Db2,
                    $test_fn,
                );
            }

            #[test]
            fn [<postgres_ $test_name>]() {
                $crate::common::harness::run_with_dialect(
                    helios_search_sql::sql::DialectKind::Postgres,
                    $test_fn,
                );
            }
        }
    };
}
