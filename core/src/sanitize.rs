//! Identifier sanitizing for names coming from untrusted sources.
//!
//! Headers, sheet names, and file stems become table and column names. They
//! are normalized to lowercase snake case with [`sanitize_identifier`] and
//! made unique with a [`NameAllocator`].
//!
//! # Examples
//!
//! ```
//! use sdif_core::{NameAllocator, sanitize_identifier};
//!
//! assert_eq!(sanitize_identifier("  Unit Price ($) ", "column_0"), "unit_price");
//! assert_eq!(sanitize_identifier("order", "column_1"), "order_");
//! assert_eq!(sanitize_identifier("???", "column_2"), "column_2");
//!
//! let mut names = NameAllocator::new();
//! assert_eq!(names.allocate("id"), "id");
//! assert_eq!(names.allocate("id"), "id_1");
//! assert_eq!(names.allocate("id"), "id_2");
//! ```

use std::collections::HashSet;

use crate::types::RESERVED_PREFIX;

/// SQL keywords that get a trailing underscore when used as a name.
const SQL_KEYWORDS: &[&str] = &[
    "table", "select", "insert", "update", "delete", "from", "where", "group", "order", "by",
    "index", "alter", "create", "drop", "values",
];

/// Returns `true` if `name` collides with a keyword in [`SQL_KEYWORDS`].
pub fn is_sql_keyword(name: &str) -> bool {
    SQL_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(name))
}

/// Normalizes `raw` into a lowercase identifier made of alphanumerics and
/// underscores.
///
/// Punctuation is dropped, runs of whitespace or `-` become a single `_`,
/// and reserved keywords get a trailing `_`. Names that would start with the
/// system prefix [`RESERVED_PREFIX`] get a leading `t_`. When nothing usable
/// remains the `fallback` is returned unchanged.
pub fn sanitize_identifier(raw: &str, fallback: &str) -> String {
    let lowered = raw.trim().to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut in_separator = false;
    for c in lowered.chars() {
        if c.is_whitespace() || c == '-' {
            in_separator = true;
            continue;
        }
        if !(c.is_alphanumeric() || c == '_') {
            continue;
        }
        if in_separator {
            out.push('_');
            in_separator = false;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    if is_sql_keyword(trimmed) {
        return format!("{trimmed}_");
    }
    if trimmed.starts_with(RESERVED_PREFIX) {
        return format!("t_{trimmed}");
    }
    trimmed.to_string()
}

/// Hands out collision-free names.
///
/// The first request for a name returns it unchanged; later requests get
/// `name_1`, `name_2`, and so on, skipping any suffix already taken.
/// Comparison is case-insensitive, matching how SQLite resolves identifiers.
#[derive(Debug, Clone, Default)]
pub struct NameAllocator {
    used: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator that treats `taken` as already used.
    pub fn with_taken<I, S>(taken: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            used: taken.into_iter().map(|s| s.as_ref().to_lowercase()).collect(),
        }
    }

    /// Returns `true` if `name` was already handed out or reserved.
    pub fn is_taken(&self, name: &str) -> bool {
        self.used.contains(&name.to_lowercase())
    }

    /// Reserves and returns a unique name derived from `candidate`.
    pub fn allocate(&mut self, candidate: &str) -> String {
        if self.used.insert(candidate.to_lowercase()) {
            return candidate.to_string();
        }
        let mut suffix = 1usize;
        loop {
            let name = format!("{candidate}_{suffix}");
            if self.used.insert(name.to_lowercase()) {
                return name;
            }
            suffix += 1;
        }
    }
}
