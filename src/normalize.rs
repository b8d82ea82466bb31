//! SQL label normalization
//!
//! Metric labels must stay bounded in cardinality: two structurally
//! identical statements that differ only in their literal data have to
//! map to the same label value, or every insert creates a fresh time
//! series.
//!
//! [`strip_values`] collapses the variable part of a statement (the
//! literal list following a `values` clause) into a fixed placeholder:
//!
//! ```
//! use tollgate::strip_values;
//!
//! let q = "insert into Member (id, name, email) values (0, 'John Smith', 'js@example.com')";
//! assert_eq!(strip_values(q), "insert into Member (id, name, email) values (...)");
//! ```
//!
//! The function is total over arbitrary input: text without a `values`
//! clause passes through unchanged, and malformed statements are never an
//! error. Queries are labels here, not something to parse.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Matches `values (...)` literal lists, case-insensitively. Non-greedy,
/// so each parenthesized group is collapsed independently.
fn values_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)values\s*\(.*?\)").expect("values pattern is a valid regex")
    })
}

/// Replace every `values (...)` literal list in `query` with the
/// placeholder text `values (...)`.
///
/// Deterministic and side-effect-free; allocates only when a clause
/// actually matched.
pub fn strip_values(query: &str) -> Cow<'_, str> {
    values_pattern().replace_all(query, "values (...)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_collapsed() {
        let q = "insert into Member (id, name, email, phone_number) \
                 values (0, 'John Smith', 'john.smith@mailinator.com', '2125551212')";
        assert_eq!(
            strip_values(q),
            "insert into Member (id, name, email, phone_number) values (...)"
        );
    }

    #[test]
    fn test_no_values_clause_unchanged() {
        let q = "select * from Member where id = ?";
        assert_eq!(strip_values(q), q);
        // Borrowed, no allocation on the pass-through path
        assert!(matches!(strip_values(q), Cow::Borrowed(_)));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            strip_values("INSERT INTO t (a) VALUES (1)"),
            "INSERT INTO t (a) values (...)"
        );
        assert_eq!(
            strip_values("insert into t (a) Values(1)"),
            "insert into t (a) values (...)"
        );
    }

    #[test]
    fn test_whitespace_before_parenthesis() {
        assert_eq!(
            strip_values("insert into t (a) values   (1, 2)"),
            "insert into t (a) values (...)"
        );
        assert_eq!(
            strip_values("insert into t (a) values(1, 2)"),
            "insert into t (a) values (...)"
        );
    }

    #[test]
    fn test_multiple_clauses_collapsed_independently() {
        let q = "insert into a (x) values (1); insert into b (y) values ('two')";
        assert_eq!(
            strip_values(q),
            "insert into a (x) values (...); insert into b (y) values (...)"
        );
    }

    #[test]
    fn test_non_greedy_single_group() {
        // The match stops at the first closing parenthesis; trailing text
        // stays intact.
        assert_eq!(
            strip_values("insert into t (a) values (1) returning id"),
            "insert into t (a) values (...) returning id"
        );
    }

    #[test]
    fn test_total_over_arbitrary_text() {
        assert_eq!(strip_values(""), "");
        assert_eq!(strip_values("values ("), "values (");
        assert_eq!(strip_values("not sql at all )( "), "not sql at all )( ");
    }
}
