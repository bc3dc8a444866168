//! Lexical read-only check for ad-hoc queries.
//!
//! [`check_read_only`] accepts a statement only when it starts with
//! `SELECT`, `WITH`, or `EXPLAIN`, holds a single statement, and contains
//! none of the mutating keywords below outside string literals, quoted
//! identifiers, and comments. It is a keyword scan, not a parser: obscure
//! SQL can get past it. Open the container with
//! [`Container::open_read_only`](crate::Container::open_read_only) when a
//! hard guarantee is required.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ContainerError, Result};

/// Keywords rejected anywhere in a guarded query.
pub const DISALLOWED_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "replace", "drop", "create", "alter", "attach", "detach",
    "pragma", "vacuum", "reindex",
];

static DISALLOWED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", DISALLOWED_KEYWORDS.join("|")))
        .expect("static regex must compile")
});

static LEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(select|with|explain)\b").expect("static regex must compile")
});

/// Rejects anything that is not lexically a single read-only statement.
///
/// # Examples
///
/// ```
/// use sdif_sqlite::check_read_only;
///
/// assert!(check_read_only("SELECT * FROM t").is_ok());
/// assert!(check_read_only("DROP TABLE t").is_err());
/// assert!(check_read_only("select * from t; DELETE FROM t").is_err());
/// ```
pub fn check_read_only(sql: &str) -> Result<()> {
    let stripped = strip_literals_and_comments(sql);
    let statement = stripped.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());

    if !LEADING_RE.is_match(statement) {
        return Err(ContainerError::PermissionDenied(
            "only SELECT, WITH ... SELECT, or EXPLAIN queries are allowed".to_string(),
        ));
    }
    if statement.contains(';') {
        return Err(ContainerError::PermissionDenied(
            "multiple statements are not allowed".to_string(),
        ));
    }
    if let Some(found) = DISALLOWED_RE.find(statement) {
        return Err(ContainerError::PermissionDenied(format!(
            "query contains disallowed keyword '{}'",
            found.as_str().to_ascii_lowercase()
        )));
    }
    Ok(())
}

/// Replaces quoted text with a space and removes comments.
fn strip_literals_and_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                // Doubled quotes escape the delimiter.
                while let Some(inner) = chars.next() {
                    if inner == c {
                        if chars.peek() == Some(&c) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                out.push(' ');
            }
            '[' => {
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                }
                out.push(' ');
            }
            '-' if chars.peek() == Some(&'-') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
                out.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for inner in chars.by_ref() {
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied(sql: &str) -> bool {
        matches!(check_read_only(sql), Err(ContainerError::PermissionDenied(_)))
    }

    #[test]
    fn test_plain_reads_pass() {
        assert!(check_read_only("SELECT * FROM t").is_ok());
        assert!(check_read_only("  select a from t;  ").is_ok());
        assert!(check_read_only("WITH x AS (SELECT 1) SELECT * FROM x").is_ok());
        assert!(check_read_only("EXPLAIN QUERY PLAN SELECT * FROM t").is_ok());
    }

    #[test]
    fn test_mutations_denied() {
        assert!(denied("DROP TABLE t"));
        assert!(denied("insert into t values (1)"));
        assert!(denied("PRAGMA foreign_keys = OFF"));
        assert!(denied("WITH x AS (SELECT 1) DELETE FROM t"));
        assert!(denied("SELECT * FROM t WHERE 1; ATTACH 'x.db' AS x"));
    }

    #[test]
    fn test_compound_statement_denied() {
        assert!(denied("select * from t; DELETE FROM t"));
        assert!(denied("select 1; select 2"));
    }

    #[test]
    fn test_keywords_in_literals_and_identifiers_ignored() {
        assert!(check_read_only("SELECT * FROM t WHERE note = 'drop table; update'").is_ok());
        assert!(check_read_only("SELECT \"update\" FROM t").is_ok());
        assert!(check_read_only("SELECT created_at, updated_by FROM t").is_ok());
        assert!(check_read_only("SELECT 1 -- delete later\n").is_ok());
        assert!(check_read_only("SELECT /* drop */ 1").is_ok());
    }

    #[test]
    fn test_escaped_quotes() {
        assert!(check_read_only("SELECT 'it''s; fine' FROM t").is_ok());
        assert!(denied("SELECT 'it''s' ; DROP TABLE t"));
    }

    #[test]
    fn test_strip() {
        assert_eq!(strip_literals_and_comments("a 'b' c"), "a   c");
        assert_eq!(strip_literals_and_comments("a -- x\nb"), "a  b");
    }
}
