//! Alias allocation for generated statements.

/// Hands out collision-free table aliases for one statement.
///
/// Parameter joins are `p1`, `p2`, ...; composite sub-selects are `comp1`
/// with component tables `comp1_p1`, `comp1_p2`; sort joins are `S1`, ...;
/// chain sub-selects use the numeric suffix from [`AliasAllocator::next_chain`].
#[derive(Debug, Default)]
pub struct AliasAllocator {
    params: usize,
    composites: usize,
    sorts: usize,
    chains: usize,
}

impl AliasAllocator {
    /// Creates an allocator with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next parameter alias.
    pub fn next_param(&mut self) -> String {
        self.params += 1;
        format!("p{}", self.params)
    }

    /// Next composite alias.
    pub fn next_composite(&mut self) -> String {
        self.composites += 1;
        format!("comp{}", self.composites)
    }

    /// Next sort alias.
    pub fn next_sort(&mut self) -> String {
        self.sorts += 1;
        format!("S{}", self.sorts)
    }

    /// Next chain sub-select index.
    pub fn next_chain(&mut self) -> usize {
        self.chains += 1;
        self.chains
    }
}

/// Alias of component `index` (1-based) inside composite `composite`.
pub fn component_alias(composite: &str, index: usize) -> String {
    format!("{}_p{}", composite, index)
}
