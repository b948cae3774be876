//! Structural assertions over rendered statements.

use helios_search_sql::RenderedQuery;

/// Returns true if every parenthesis outside quoted literals is matched.
pub fn parens_balanced(sql: &str) -> bool {
    let mut depth: i64 = 0;
    let mut in_quote = false;
    for c in sql.chars() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && !in_quote
}

/// Asserts the statement is well formed: balanced parentheses and exactly
/// one bind per placeholder.
pub fn assert_well_formed(rendered: &RenderedQuery) {
    assert!(
        parens_balanced(&rendered.sql),
        "unbalanced parentheses in: {}",
        rendered.sql
    );
    assert_eq!(
        rendered.placeholder_count(),
        rendered.binds.len(),
        "placeholder/bind mismatch in: {}",
        rendered.sql
    );
}

/// Asserts `needle` occurs in the statement, printing it otherwise.
pub fn assert_sql_contains(rendered: &RenderedQuery, needle: &str) {
    assert!(
        rendered.sql.contains(needle),
        "expected `{}` in: {}",
        needle,
        rendered.sql
    );
}
