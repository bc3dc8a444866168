//! Symmetric difference between two canonical schemas.
//!
//! Tables are paired by name or, when table names are not enforced, by a
//! greedy two-pass matching: first every table takes the first unclaimed
//! partner with identical structure, then remaining tables take the
//! unclaimed partner with the highest [`similarity`](TableShape::similarity).
//! Anything left unpaired is reported as added or removed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::canonical::{
    CanonicalSchema, ColumnShape, LinksShape, MediaShape, ObjectShape, TableShape,
};
use super::config::ComparisonConfig;

/// Kind of a single difference, seen from the left schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Present only on the right.
    Added,
    /// Present only on the left.
    Removed,
    /// Present on both sides with different values.
    Changed,
}

/// One difference at a dotted path such as `tables.orders.columns.id.sql_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    pub path: String,
    pub kind: ChangeKind,
    pub left: Option<String>,
    pub right: Option<String>,
}

impl Difference {
    fn added(path: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Added,
            left: None,
            right: Some(right.into()),
        }
    }

    fn removed(path: impl Into<String>, left: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Removed,
            left: Some(left.into()),
            right: None,
        }
    }

    fn changed(path: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Changed,
            left: Some(left.into()),
            right: Some(right.into()),
        }
    }

    /// Top-level category of the path (`tables`, `objects`, ...).
    pub fn category(&self) -> &str {
        self.path.split('.').next().unwrap_or(&self.path)
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let left = self.left.as_deref().unwrap_or("");
        let right = self.right.as_deref().unwrap_or("");
        match self.kind {
            ChangeKind::Added => write!(f, "+ Added {}: {right}", self.path),
            ChangeKind::Removed => write!(f, "- Removed {}: {left}", self.path),
            ChangeKind::Changed => write!(f, "~ Changed {}: {left} -> {right}", self.path),
        }
    }
}

/// Amount of detail in a comparison report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// One human-readable line per difference.
    #[default]
    Summary,
    /// Differences grouped by category.
    Tree,
    /// Differences plus both canonical projections.
    Full,
}

/// Comparison output at the requested [`Verbosity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffReport {
    Summary(Vec<String>),
    Tree(BTreeMap<String, Vec<Difference>>),
    Full {
        differences: Vec<Difference>,
        left: Box<CanonicalSchema>,
        right: Box<CanonicalSchema>,
    },
}

impl DiffReport {
    /// Returns `true` when the report lists no differences.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Summary(lines) => lines.is_empty(),
            Self::Tree(groups) => groups.is_empty(),
            Self::Full { differences, .. } => differences.is_empty(),
        }
    }

    pub(crate) fn build(
        differences: Vec<Difference>,
        verbosity: Verbosity,
        left: &CanonicalSchema,
        right: &CanonicalSchema,
    ) -> Self {
        match verbosity {
            Verbosity::Summary => Self::Summary(differences.iter().map(|d| d.to_string()).collect()),
            Verbosity::Tree => {
                let mut groups: BTreeMap<String, Vec<Difference>> = BTreeMap::new();
                for difference in differences {
                    groups
                        .entry(difference.category().to_string())
                        .or_default()
                        .push(difference);
                }
                Self::Tree(groups)
            }
            Verbosity::Full => Self::Full {
                differences,
                left: Box::new(left.clone()),
                right: Box::new(right.clone()),
            },
        }
    }
}

/// Verdict and report of a symmetric comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub equivalent: bool,
    pub report: DiffReport,
}

/// Tables paired across the two sides.
pub(crate) struct TablePairing<'a> {
    pub pairs: Vec<(&'a TableShape, &'a TableShape)>,
    pub left_only: Vec<&'a TableShape>,
    pub right_only: Vec<&'a TableShape>,
}

pub(crate) fn pair_tables<'a>(
    left: &'a [TableShape],
    right: &'a [TableShape],
    by_name: bool,
) -> TablePairing<'a> {
    let mut claimed = vec![false; right.len()];
    let mut partner: Vec<Option<usize>> = vec![None; left.len()];

    if by_name {
        for (i, table) in left.iter().enumerate() {
            partner[i] = right.iter().position(|r| r.name == table.name);
            if let Some(j) = partner[i] {
                claimed[j] = true;
            }
        }
    } else {
        for (i, table) in left.iter().enumerate() {
            let found = (0..right.len()).find(|&j| !claimed[j] && table.same_structure(&right[j]));
            if let Some(j) = found {
                claimed[j] = true;
                partner[i] = Some(j);
            }
        }
        for (i, table) in left.iter().enumerate() {
            if partner[i].is_some() {
                continue;
            }
            let mut best: Option<(usize, usize)> = None;
            for j in (0..right.len()).filter(|&j| !claimed[j]) {
                let score = table.similarity(&right[j]);
                if score > 0 && best.is_none_or(|(_, s)| score > s) {
                    best = Some((j, score));
                }
            }
            if let Some((j, _)) = best {
                claimed[j] = true;
                partner[i] = Some(j);
            }
        }
    }

    let mut pairing = TablePairing {
        pairs: Vec::new(),
        left_only: Vec::new(),
        right_only: Vec::new(),
    };
    for (i, table) in left.iter().enumerate() {
        match partner[i] {
            Some(j) => pairing.pairs.push((table, &right[j])),
            None => pairing.left_only.push(table),
        }
    }
    pairing.right_only = right
        .iter()
        .enumerate()
        .filter(|(j, _)| !claimed[*j])
        .map(|(_, t)| t)
        .collect();
    pairing
}

/// Lists every difference between two projections built with `config`.
pub(crate) fn diff_schemas(
    left: &CanonicalSchema,
    right: &CanonicalSchema,
    config: &ComparisonConfig,
) -> Vec<Difference> {
    let mut out = Vec::new();

    if left.format_version != right.format_version {
        out.push(Difference::changed(
            "properties.format_version",
            display_opt(left.format_version.as_ref().and_then(|v| v.as_deref())),
            display_opt(right.format_version.as_ref().and_then(|v| v.as_deref())),
        ));
    }

    let pairing = pair_tables(&left.tables, &right.tables, config.enforce_table_names);
    for table in &pairing.left_only {
        out.push(Difference::removed(
            format!("tables.{}", table.name),
            describe_table(table),
        ));
    }
    for table in &pairing.right_only {
        out.push(Difference::added(
            format!("tables.{}", table.name),
            describe_table(table),
        ));
    }
    for (a, b) in &pairing.pairs {
        let path = if a.name == b.name {
            format!("tables.{}", a.name)
        } else {
            format!("tables.{}~{}", a.name, b.name)
        };
        diff_table(&path, a, b, config, &mut out);
    }

    if let (Some(a), Some(b)) = (&left.objects, &right.objects) {
        diff_objects(a, b, &mut out);
    }
    if let (Some(a), Some(b)) = (&left.media, &right.media) {
        diff_media(a, b, &mut out);
    }
    diff_links(&left.semantic_links, &right.semantic_links, &mut out);

    out
}

fn diff_table(
    path: &str,
    a: &TableShape,
    b: &TableShape,
    config: &ComparisonConfig,
    out: &mut Vec<Difference>,
) {
    if config.enforce_column_names {
        diff_columns_by_name(path, a, b, config.enforce_column_order, out);
    } else if config.enforce_column_order {
        let len = a.columns.len().max(b.columns.len());
        for i in 0..len {
            let col_path = format!("{path}.columns[{i}]");
            match (a.columns.get(i), b.columns.get(i)) {
                (Some(x), Some(y)) => diff_column(&col_path, x, y, out),
                (Some(x), None) => out.push(Difference::removed(col_path, x.to_string())),
                (None, Some(y)) => out.push(Difference::added(col_path, y.to_string())),
                (None, None) => {}
            }
        }
    } else {
        let (only_a, only_b) = multiset_difference(&a.columns, &b.columns);
        for column in only_a {
            out.push(Difference::removed(format!("{path}.columns"), column.to_string()));
        }
        for column in only_b {
            out.push(Difference::added(format!("{path}.columns"), column.to_string()));
        }
    }

    if a.primary_key != b.primary_key {
        out.push(Difference::changed(
            format!("{path}.primary_key"),
            display_key(a.primary_key.as_deref()),
            display_key(b.primary_key.as_deref()),
        ));
    }

    if let (Some(fa), Some(fb)) = (&a.foreign_keys, &b.foreign_keys) {
        let (only_a, only_b) = multiset_difference(fa, fb);
        for fk in only_a {
            out.push(Difference::removed(format!("{path}.foreign_keys"), fk.to_string()));
        }
        for fk in only_b {
            out.push(Difference::added(format!("{path}.foreign_keys"), fk.to_string()));
        }
    }
}

fn diff_columns_by_name(
    path: &str,
    a: &TableShape,
    b: &TableShape,
    check_order: bool,
    out: &mut Vec<Difference>,
) {
    let name_of = |c: &ColumnShape| c.name.clone().unwrap_or_default();

    for x in &a.columns {
        let name = name_of(x);
        match b.columns.iter().find(|y| y.name == x.name) {
            Some(y) => diff_column(&format!("{path}.columns.{name}"), x, y, out),
            None => out.push(Difference::removed(
                format!("{path}.columns.{name}"),
                x.to_string(),
            )),
        }
    }
    for y in &b.columns {
        if !a.columns.iter().any(|x| x.name == y.name) {
            out.push(Difference::added(
                format!("{path}.columns.{}", name_of(y)),
                y.to_string(),
            ));
        }
    }

    if check_order {
        let shared_a: Vec<String> = a
            .columns
            .iter()
            .filter(|x| b.columns.iter().any(|y| y.name == x.name))
            .map(name_of)
            .collect();
        let shared_b: Vec<String> = b
            .columns
            .iter()
            .filter(|y| a.columns.iter().any(|x| x.name == y.name))
            .map(name_of)
            .collect();
        if shared_a != shared_b {
            out.push(Difference::changed(
                format!("{path}.column_order"),
                shared_a.join(", "),
                shared_b.join(", "),
            ));
        }
    }
}

fn diff_column(path: &str, a: &ColumnShape, b: &ColumnShape, out: &mut Vec<Difference>) {
    if a.sql_type != b.sql_type {
        out.push(Difference::changed(
            format!("{path}.sql_type"),
            display_opt(a.sql_type.as_deref()),
            display_opt(b.sql_type.as_deref()),
        ));
    }
    if a.not_null != b.not_null {
        out.push(Difference::changed(
            format!("{path}.not_null"),
            format!("{:?}", a.not_null.unwrap_or(false)),
            format!("{:?}", b.not_null.unwrap_or(false)),
        ));
    }
    if a.default_value != b.default_value {
        out.push(Difference::changed(
            format!("{path}.default_value"),
            display_opt(a.default_value.as_ref().and_then(|v| v.as_deref())),
            display_opt(b.default_value.as_ref().and_then(|v| v.as_deref())),
        ));
    }
}

fn diff_objects(
    a: &BTreeMap<String, ObjectShape>,
    b: &BTreeMap<String, ObjectShape>,
    out: &mut Vec<Difference>,
) {
    for (name, x) in a {
        match b.get(name) {
            None => out.push(Difference::removed(format!("objects.{name}"), name.clone())),
            Some(y) if x.schema_hint != y.schema_hint => out.push(Difference::changed(
                format!("objects.{name}.schema_hint"),
                display_opt(x.schema_hint.as_ref().and_then(|h| h.as_deref())),
                display_opt(y.schema_hint.as_ref().and_then(|h| h.as_deref())),
            )),
            Some(_) => {}
        }
    }
    for name in b.keys().filter(|n| !a.contains_key(*n)) {
        out.push(Difference::added(format!("objects.{name}"), name.clone()));
    }
}

fn diff_media(
    a: &BTreeMap<String, MediaShape>,
    b: &BTreeMap<String, MediaShape>,
    out: &mut Vec<Difference>,
) {
    for (name, x) in a {
        let Some(y) = b.get(name) else {
            out.push(Difference::removed(format!("media.{name}"), name.clone()));
            continue;
        };
        if x.media_type != y.media_type {
            out.push(Difference::changed(
                format!("media.{name}.media_type"),
                display_opt(x.media_type.as_deref()),
                display_opt(y.media_type.as_deref()),
            ));
        }
        if x.original_format != y.original_format {
            out.push(Difference::changed(
                format!("media.{name}.original_format"),
                display_opt(x.original_format.as_ref().and_then(|v| v.as_deref())),
                display_opt(y.original_format.as_ref().and_then(|v| v.as_deref())),
            ));
        }
        if x.technical_metadata != y.technical_metadata {
            out.push(Difference::changed(
                format!("media.{name}.technical_metadata"),
                display_opt(x.technical_metadata.as_ref().and_then(|v| v.as_deref())),
                display_opt(y.technical_metadata.as_ref().and_then(|v| v.as_deref())),
            ));
        }
    }
    for name in b.keys().filter(|n| !a.contains_key(*n)) {
        out.push(Difference::added(format!("media.{name}"), name.clone()));
    }
}

fn diff_links(a: &LinksShape, b: &LinksShape, out: &mut Vec<Difference>) {
    match (a, b) {
        (LinksShape::Types(x), LinksShape::Types(y)) => {
            for link_type in x.difference(y) {
                out.push(Difference::removed("semantic_links.types", link_type.clone()));
            }
            for link_type in y.difference(x) {
                out.push(Difference::added("semantic_links.types", link_type.clone()));
            }
        }
        (LinksShape::Full(x), LinksShape::Full(y)) => {
            let (only_a, only_b) = multiset_difference(x, y);
            for link in only_a {
                out.push(Difference::removed("semantic_links", link.to_string()));
            }
            for link in only_b {
                out.push(Difference::added("semantic_links", link.to_string()));
            }
        }
        _ => {}
    }
}

/// Splits two lists into the elements unmatched on each side, treating them
/// as multisets.
fn multiset_difference<'a, T: PartialEq>(a: &'a [T], b: &'a [T]) -> (Vec<&'a T>, Vec<&'a T>) {
    let mut remaining: Vec<&T> = b.iter().collect();
    let mut only_a = Vec::new();
    for item in a {
        match remaining.iter().position(|r| *r == item) {
            Some(pos) => {
                remaining.remove(pos);
            }
            None => only_a.push(item),
        }
    }
    (only_a, remaining)
}

fn describe_table(table: &TableShape) -> String {
    let columns: Vec<String> = table.columns.iter().map(|c| c.to_string()).collect();
    format!("{} ({})", table.name, columns.join(", "))
}

fn display_key(key: Option<&[String]>) -> String {
    match key {
        Some(columns) if !columns.is_empty() => columns.join(", "),
        Some(_) => "<none>".to_string(),
        None => "<not compared>".to_string(),
    }
}

fn display_opt(value: Option<&str>) -> String {
    value.unwrap_or("<none>").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: Option<&str>, ty: &str) -> ColumnShape {
        ColumnShape {
            name: name.map(str::to_string),
            sql_type: Some(ty.to_string()),
            not_null: Some(false),
            default_value: Some(None),
        }
    }

    fn table(name: &str, columns: Vec<ColumnShape>) -> TableShape {
        TableShape {
            name: name.into(),
            columns,
            primary_key: Some(vec![]),
            foreign_keys: Some(vec![]),
        }
    }

    #[test]
    fn test_structural_pairing_prefers_exact_match() {
        let left = vec![
            table("a", vec![column(None, "INTEGER"), column(None, "TEXT")]),
            table("b", vec![column(None, "REAL")]),
        ];
        let right = vec![
            table("x", vec![column(None, "REAL")]),
            table("y", vec![column(None, "INTEGER"), column(None, "TEXT")]),
        ];
        let pairing = pair_tables(&left, &right, false);
        assert!(pairing.left_only.is_empty());
        assert!(pairing.right_only.is_empty());
        let names: Vec<(&str, &str)> = pairing
            .pairs
            .iter()
            .map(|(a, b)| (a.name.as_str(), b.name.as_str()))
            .collect();
        assert_eq!(names, vec![("a", "y"), ("b", "x")]);
    }

    #[test]
    fn test_structural_pairing_falls_back_to_best_score() {
        let left = vec![table("a", vec![column(None, "INTEGER"), column(None, "TEXT")])];
        let right = vec![
            table("x", vec![column(None, "BLOB")]),
            table("y", vec![column(None, "INTEGER"), column(None, "REAL")]),
        ];
        let pairing = pair_tables(&left, &right, false);
        assert_eq!(pairing.pairs.len(), 1);
        assert_eq!(pairing.pairs[0].1.name, "y");
        assert_eq!(pairing.right_only.len(), 1);
        assert_eq!(pairing.right_only[0].name, "x");
    }

    #[test]
    fn test_column_order_difference() {
        let a = table("t", vec![column(Some("id"), "INTEGER"), column(Some("v"), "TEXT")]);
        let b = table("t", vec![column(Some("v"), "TEXT"), column(Some("id"), "INTEGER")]);
        let mut out = Vec::new();
        diff_columns_by_name("tables.t", &a, &b, true, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, "tables.t.column_order");
        assert_eq!(out[0].kind, ChangeKind::Changed);

        out.clear();
        diff_columns_by_name("tables.t", &a, &b, false, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_multiset_difference_counts_duplicates() {
        let (only_a, only_b) = multiset_difference(&[1, 1, 2], &[1, 3]);
        assert_eq!(only_a, vec![&1, &2]);
        assert_eq!(only_b, vec![&3]);
    }

    #[test]
    fn test_summary_line_format() {
        let d = Difference::changed("tables.t.columns.id.sql_type", "INTEGER", "TEXT");
        assert_eq!(d.to_string(), "~ Changed tables.t.columns.id.sql_type: INTEGER -> TEXT");
        assert_eq!(d.category(), "tables");
    }
}
