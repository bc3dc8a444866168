//! Content-level comparison of two containers.
//!
//! [`SchemaComparator`](sdif_core::SchemaComparator) looks at structure
//! only. [`ContentComparator`] also reads the data: table rows, object
//! payloads and media bytes. Sources are paired first, by file name and
//! type, and every matched table, object, and media entry must then come
//! from paired sources.
//!
//! Rows compare as multisets unless row order is requested. Real values
//! can be rounded to a fixed number of decimal places first, and a real
//! with no fractional part equals the matching integer.
//!
//! # Examples
//!
//! ```
//! use sdif_sqlite::{Container, ContentComparator};
//!
//! let left = Container::open_in_memory().unwrap();
//! let right = Container::open_in_memory().unwrap();
//!
//! let result = ContentComparator::default().compare(&left, &right).unwrap();
//! assert!(result.equivalent);
//! assert_eq!(result.summary()[0], "containers are equivalent");
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rusqlite::types::Value;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sdif_core::{
    ColumnSchema, ContainerSchema, FORMAT_VERSION, ForeignKeySchema, MediaRecord, ObjectRecord,
    Properties, Source, SourceId, TableSchema,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::container::Container;
use crate::error::Result;

/// Options for [`ContentComparator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentComparisonOptions {
    /// Pair tables by original identifier, then by column layout.
    pub ignore_table_names: bool,
    /// Pair columns by original column name, then by position.
    pub ignore_column_names: bool,
    /// Require rows in the same order.
    pub compare_row_order: bool,
    /// Pair sources by file type alone.
    pub ignore_source_file_names: bool,
    /// Pair objects by payload instead of by name.
    pub ignore_object_names: bool,
    /// Pair media by content instead of by name.
    pub ignore_media_names: bool,
    /// Round real values half away from zero before comparing.
    pub decimal_places: Option<u32>,
    /// Example rows listed per kind of row difference.
    pub max_examples: usize,
}

impl Default for ContentComparisonOptions {
    fn default() -> Self {
        Self {
            ignore_table_names: false,
            ignore_column_names: false,
            compare_row_order: false,
            ignore_source_file_names: false,
            ignore_object_names: false,
            ignore_media_names: false,
            decimal_places: None,
            max_examples: 5,
        }
    }
}

/// Outcome of one comparison area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionReport {
    pub equivalent: bool,
    pub differences: Vec<String>,
}

impl SectionReport {
    fn new() -> Self {
        Self {
            equivalent: true,
            differences: Vec::new(),
        }
    }

    fn differ(&mut self, detail: impl Into<String>) {
        self.equivalent = false;
        self.differences.push(detail.into());
    }
}

/// Result of [`ContentComparator::compare`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentComparison {
    pub equivalent: bool,
    pub version: SectionReport,
    pub sources: SectionReport,
    pub tables: SectionReport,
    pub objects: SectionReport,
    pub media: SectionReport,
    /// Left source id to the paired right source id.
    pub source_map: BTreeMap<SourceId, SourceId>,
    /// Left table name to the paired right table name.
    pub table_map: BTreeMap<String, String>,
}

impl ContentComparison {
    /// The overall verdict followed by one line per differing area.
    pub fn summary(&self) -> Vec<String> {
        let verdict = if self.equivalent {
            "containers are equivalent"
        } else {
            "containers differ"
        };
        let mut lines = vec![verdict.to_string()];
        for (area, section) in [
            ("format version", &self.version),
            ("sources", &self.sources),
            ("tables", &self.tables),
            ("objects", &self.objects),
            ("media", &self.media),
        ] {
            if !section.equivalent {
                lines.push(format!(
                    "{area}: {} difference(s)",
                    section.differences.len()
                ));
            }
        }
        lines
    }
}

/// Compares the contents of two containers.
#[derive(Debug, Clone, Default)]
pub struct ContentComparator {
    options: ContentComparisonOptions,
}

impl ContentComparator {
    pub fn new(options: ContentComparisonOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ContentComparisonOptions {
        &self.options
    }

    /// Opens both files read-only and compares them.
    pub fn compare_files(
        &self,
        left: impl AsRef<Path>,
        right: impl AsRef<Path>,
    ) -> Result<ContentComparison> {
        let left = Container::open_read_only(left)?;
        let right = Container::open_read_only(right)?;
        self.compare(&left, &right)
    }

    /// Compares version, sources, tables, objects, and media.
    ///
    /// Differences are reported, not raised. Errors come only from reading
    /// either container.
    pub fn compare(&self, left: &Container, right: &Container) -> Result<ContentComparison> {
        let left_schema = left.schema()?;
        let right_schema = right.schema()?;

        let version = compare_versions(
            left_schema.properties.as_ref(),
            right_schema.properties.as_ref(),
        );
        let (sources, source_map) =
            self.compare_sources(&left_schema.sources, &right_schema.sources);
        let (tables, table_map) =
            self.compare_tables(left, right, &left_schema, &right_schema, &source_map)?;
        let objects = self.compare_objects(left, right, &left_schema, &right_schema, &source_map)?;
        let media = self.compare_media(left, right, &left_schema, &right_schema, &source_map)?;

        let equivalent = [&version, &sources, &tables, &objects, &media]
            .iter()
            .all(|section| section.equivalent);
        info!(
            equivalent,
            tables = table_map.len(),
            "Compared container contents"
        );
        Ok(ContentComparison {
            equivalent,
            version,
            sources,
            tables,
            objects,
            media,
            source_map,
            table_map,
        })
    }

    fn compare_sources(
        &self,
        left: &[Source],
        right: &[Source],
    ) -> (SectionReport, BTreeMap<SourceId, SourceId>) {
        let key = |source: &Source| {
            let name = (!self.options.ignore_source_file_names).then(|| source.file_name.clone());
            (name, source.file_type.clone())
        };

        let mut report = SectionReport::new();
        let mut map = BTreeMap::new();
        let mut claimed = vec![false; right.len()];
        for source in left {
            let wanted = key(source);
            match (0..right.len()).find(|&j| !claimed[j] && key(&right[j]) == wanted) {
                Some(j) => {
                    claimed[j] = true;
                    map.insert(source.id, right[j].id);
                }
                None => report.differ(format!(
                    "source {} ('{}', {}) only in the left container",
                    source.id, source.file_name, source.file_type
                )),
            }
        }
        for (source, _) in right.iter().zip(&claimed).filter(|(_, taken)| !**taken) {
            report.differ(format!(
                "source {} ('{}', {}) only in the right container",
                source.id, source.file_name, source.file_type
            ));
        }
        debug!(paired = map.len(), "Paired sources");
        (report, map)
    }

    fn compare_tables(
        &self,
        left: &Container,
        right: &Container,
        left_schema: &ContainerSchema,
        right_schema: &ContainerSchema,
        source_map: &BTreeMap<SourceId, SourceId>,
    ) -> Result<(SectionReport, BTreeMap<String, String>)> {
        let mut report = SectionReport::new();
        let pairing = self.pair_tables(&left_schema.tables, &right_schema.tables);

        for name in &pairing.left_only {
            report.differ(format!("table '{name}' only in the left container"));
        }
        for name in &pairing.right_only {
            report.differ(format!("table '{name}' only in the right container"));
        }

        let mut table_map = BTreeMap::new();
        for (left_name, right_name) in pairing.pairs {
            let label = if left_name == right_name {
                format!("table '{left_name}'")
            } else {
                format!("table '{left_name}' (right: '{right_name}')")
            };
            let left_table = &left_schema.tables[&left_name];
            let right_table = &right_schema.tables[&right_name];

            match (&left_table.metadata, &right_table.metadata) {
                (Some(l), Some(r)) => {
                    check_source(&mut report, &label, l.source_id, r.source_id, source_map)
                }
                _ => report.differ(format!("{label}: metadata missing on one side")),
            }

            let differences =
                self.compare_table(left, right, &left_name, &right_name, left_table, right_table)?;
            for detail in differences {
                report.differ(format!("{label}: {detail}"));
            }
            table_map.insert(left_name, right_name);
        }
        Ok((report, table_map))
    }

    fn pair_tables(
        &self,
        left: &BTreeMap<String, TableSchema>,
        right: &BTreeMap<String, TableSchema>,
    ) -> TablePairing {
        let mut pairs = Vec::new();
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut unpaired: Vec<&str> = Vec::new();

        if !self.options.ignore_table_names {
            for name in left.keys() {
                if right.contains_key(name) {
                    claimed.insert(name);
                    pairs.push((name.clone(), name.clone()));
                } else {
                    unpaired.push(name);
                }
            }
        } else {
            let original = |t: &TableSchema| {
                t.metadata
                    .as_ref()
                    .and_then(|m| m.original_identifier.clone())
            };
            let mut pending: Vec<&str> = Vec::new();
            for (name, table) in left {
                let found = original(table).and_then(|id| {
                    right
                        .iter()
                        .find(|(r, t)| {
                            !claimed.contains(r.as_str()) && original(*t).as_ref() == Some(&id)
                        })
                        .map(|(r, _)| r.as_str())
                });
                match found {
                    Some(r) => {
                        claimed.insert(r);
                        pairs.push((name.clone(), r.to_string()));
                    }
                    None => pending.push(name),
                }
            }
            for name in pending {
                let wanted = layout(&left[name]);
                let found = right
                    .iter()
                    .find(|(r, t)| !claimed.contains(r.as_str()) && layout(*t) == wanted)
                    .map(|(r, _)| r.as_str());
                match found {
                    Some(r) => {
                        claimed.insert(r);
                        pairs.push((name.to_string(), r.to_string()));
                    }
                    None => unpaired.push(name),
                }
            }
        }

        TablePairing {
            left_only: unpaired.into_iter().map(str::to_string).collect(),
            right_only: right
                .keys()
                .filter(|r| !claimed.contains(r.as_str()))
                .cloned()
                .collect(),
            pairs,
        }
    }

    /// Differences between two paired tables: columns first, then foreign
    /// keys, then rows. Rows are skipped when the columns do not line up.
    fn compare_table(
        &self,
        left: &Container,
        right: &Container,
        left_name: &str,
        right_name: &str,
        left_table: &TableSchema,
        right_table: &TableSchema,
    ) -> Result<Vec<String>> {
        let mapping = match self.map_columns(&left_table.columns, &right_table.columns) {
            Ok(mapping) => mapping,
            Err(mut differences) => {
                differences.push("rows not compared because the columns differ".to_string());
                return Ok(differences);
            }
        };

        let mut differences = Vec::new();
        if self.options.ignore_table_names || self.options.ignore_column_names {
            if left_table.foreign_keys.len() != right_table.foreign_keys.len() {
                differences.push(format!(
                    "foreign key count differs ({} vs {})",
                    left_table.foreign_keys.len(),
                    right_table.foreign_keys.len()
                ));
            }
        } else {
            let left_keys = foreign_key_lines(&left_table.foreign_keys);
            let right_keys = foreign_key_lines(&right_table.foreign_keys);
            for key in left_keys.iter().filter(|k| !right_keys.contains(k)) {
                differences.push(format!("foreign key {key} only on the left"));
            }
            for key in right_keys.iter().filter(|k| !left_keys.contains(k)) {
                differences.push(format!("foreign key {key} only on the right"));
            }
        }

        let places = self.options.decimal_places;
        let left_rows: Vec<Vec<Cell>> = left
            .read_table(left_name)?
            .rows
            .iter()
            .map(|row| row.iter().map(|v| Cell::normalize(v, places)).collect())
            .collect();
        let right_rows: Vec<Vec<Cell>> = right
            .read_table(right_name)?
            .rows
            .iter()
            .map(|row| mapping.iter().map(|&j| Cell::normalize(&row[j], places)).collect())
            .collect();

        if self.options.compare_row_order {
            differences.extend(ordered_row_differences(&left_rows, &right_rows));
        } else {
            differences.extend(unordered_row_differences(
                &left_rows,
                &right_rows,
                self.options.max_examples,
            ));
        }
        Ok(differences)
    }

    /// For each left column, the index of its right partner.
    fn map_columns(
        &self,
        left: &[ColumnSchema],
        right: &[ColumnSchema],
    ) -> std::result::Result<Vec<usize>, Vec<String>> {
        if left.len() != right.len() {
            return Err(vec![format!(
                "column count differs ({} vs {})",
                left.len(),
                right.len()
            )]);
        }

        let mut differences = Vec::new();
        let mut partner: Vec<Option<usize>> = vec![None; left.len()];
        let mut claimed = vec![false; right.len()];

        if self.options.ignore_column_names {
            for (i, column) in left.iter().enumerate() {
                let by_original = column.original_column_name.as_ref().and_then(|original| {
                    (0..right.len()).find(|&j| {
                        !claimed[j] && right[j].original_column_name.as_ref() == Some(original)
                    })
                });
                if let Some(j) = by_original {
                    claimed[j] = true;
                    partner[i] = Some(j);
                }
            }
            for i in 0..left.len() {
                if partner[i].is_some() {
                    continue;
                }
                let j = if claimed[i] {
                    (0..right.len()).find(|&j| !claimed[j])
                } else {
                    Some(i)
                };
                if let Some(j) = j {
                    claimed[j] = true;
                    partner[i] = Some(j);
                }
            }
        } else {
            for (i, column) in left.iter().enumerate() {
                match right.iter().position(|r| r.name == column.name) {
                    Some(j) => {
                        claimed[j] = true;
                        partner[i] = Some(j);
                    }
                    None => differences.push(format!("column '{}' only on the left", column.name)),
                }
            }
            for (column, _) in right.iter().zip(&claimed).filter(|(_, taken)| !**taken) {
                differences.push(format!("column '{}' only on the right", column.name));
            }
        }

        for (i, j) in partner.iter().enumerate() {
            let Some(j) = *j else { continue };
            let (l, r) = (&left[i], &right[j]);
            if !l.sql_type.eq_ignore_ascii_case(&r.sql_type) {
                differences.push(format!(
                    "column '{}': type {} vs {}",
                    l.name, l.sql_type, r.sql_type
                ));
            }
            if l.not_null != r.not_null {
                differences.push(format!("column '{}': nullability differs", l.name));
            }
            if (l.primary_key_position > 0) != (r.primary_key_position > 0) {
                differences.push(format!("column '{}': primary key membership differs", l.name));
            }
        }

        if differences.is_empty() {
            Ok(partner.into_iter().flatten().collect())
        } else {
            Err(differences)
        }
    }

    fn compare_objects(
        &self,
        left: &Container,
        right: &Container,
        left_schema: &ContainerSchema,
        right_schema: &ContainerSchema,
        source_map: &BTreeMap<SourceId, SourceId>,
    ) -> Result<SectionReport> {
        let left_objects = left_schema
            .objects
            .keys()
            .map(|name| left.get_object(name))
            .collect::<Result<Vec<ObjectRecord>>>()?;
        let right_objects = right_schema
            .objects
            .keys()
            .map(|name| right.get_object(name))
            .collect::<Result<Vec<ObjectRecord>>>()?;

        let mut report = SectionReport::new();
        compare_named(
            &mut report,
            "object",
            &left_objects,
            &right_objects,
            self.options.ignore_object_names,
            |o| &o.name,
            |o| o.source_id,
            |l, r| l.data == r.data,
            |report, l, r| {
                if l.data != r.data {
                    report.differ(format!("object '{}': JSON content differs", l.name));
                }
            },
            source_map,
        );
        Ok(report)
    }

    fn compare_media(
        &self,
        left: &Container,
        right: &Container,
        left_schema: &ContainerSchema,
        right_schema: &ContainerSchema,
        source_map: &BTreeMap<SourceId, SourceId>,
    ) -> Result<SectionReport> {
        let left_media = left_schema
            .media
            .keys()
            .map(|name| left.get_media(name))
            .collect::<Result<Vec<MediaRecord>>>()?;
        let right_media = right_schema
            .media
            .keys()
            .map(|name| right.get_media(name))
            .collect::<Result<Vec<MediaRecord>>>()?;

        let mut report = SectionReport::new();
        compare_named(
            &mut report,
            "media",
            &left_media,
            &right_media,
            self.options.ignore_media_names,
            |m| &m.name,
            |m| m.source_id,
            same_media,
            |report, l, r| media_differences(report, l, r),
            source_map,
        );
        Ok(report)
    }
}

struct TablePairing {
    pairs: Vec<(String, String)>,
    left_only: Vec<String>,
    right_only: Vec<String>,
}

/// Column types, nullability, and key membership in column order.
fn layout(table: &TableSchema) -> Vec<(String, bool, bool)> {
    table
        .columns
        .iter()
        .map(|c| (c.sql_type.to_uppercase(), c.not_null, c.primary_key_position > 0))
        .collect()
}

fn foreign_key_lines(keys: &[ForeignKeySchema]) -> Vec<String> {
    let mut lines: Vec<String> = keys
        .iter()
        .map(|fk| {
            format!(
                "({}) -> {}({}) on update {} on delete {}",
                fk.from_columns.join(", "),
                fk.target_table,
                fk.target_columns.join(", "),
                fk.on_update,
                fk.on_delete
            )
        })
        .collect();
    lines.sort();
    lines
}

fn compare_versions(left: Option<&Properties>, right: Option<&Properties>) -> SectionReport {
    let mut report = SectionReport::new();
    match (left, right) {
        (Some(l), Some(r)) => {
            if l.format_version != r.format_version {
                report.differ(format!(
                    "format versions differ ({} vs {})",
                    l.format_version, r.format_version
                ));
            } else if l.format_version != FORMAT_VERSION {
                warn!(
                    version = %l.format_version,
                    expected = FORMAT_VERSION,
                    "Comparing containers with an unexpected format version"
                );
            }
        }
        (None, _) => report.differ("properties missing in the left container"),
        (_, None) => report.differ("properties missing in the right container"),
    }
    report
}

fn check_source(
    report: &mut SectionReport,
    label: &str,
    left: SourceId,
    right: SourceId,
    source_map: &BTreeMap<SourceId, SourceId>,
) {
    match source_map.get(&left) {
        Some(&mapped) if mapped == right => {}
        Some(&mapped) => report.differ(format!(
            "{label}: left source {left} pairs with {mapped}, but the right side uses {right}"
        )),
        None => report.differ(format!("{label}: left source {left} has no counterpart")),
    }
}

/// Pairs named entries by name, or by content when `by_content` is set,
/// reports the unpaired ones, checks sources, and hands each pair to
/// `details` for attribute checks.
#[allow(clippy::too_many_arguments)]
fn compare_named<T>(
    report: &mut SectionReport,
    kind: &str,
    left: &[T],
    right: &[T],
    by_content: bool,
    name: impl Fn(&T) -> &String,
    source: impl Fn(&T) -> SourceId,
    same_content: impl Fn(&T, &T) -> bool,
    details: impl Fn(&mut SectionReport, &T, &T),
    source_map: &BTreeMap<SourceId, SourceId>,
) {
    let mut claimed = vec![false; right.len()];
    let mut pairs = Vec::new();
    for l in left {
        let found = (0..right.len()).find(|&j| {
            !claimed[j]
                && if by_content {
                    same_content(l, &right[j])
                } else {
                    name(&right[j]) == name(l)
                }
        });
        match found {
            Some(j) => {
                claimed[j] = true;
                pairs.push((l, &right[j]));
            }
            None if by_content => report.differ(format!(
                "{kind} '{}' has no counterpart with equal content",
                name(l)
            )),
            None => report.differ(format!("{kind} '{}' only in the left container", name(l))),
        }
    }
    for (r, _) in right.iter().zip(&claimed).filter(|(_, taken)| !**taken) {
        report.differ(format!("{kind} '{}' only in the right container", name(r)));
    }

    for (l, r) in pairs {
        let label = format!("{kind} '{}'", name(l));
        check_source(report, &label, source(l), source(r), source_map);
        details(report, l, r);
    }
}

fn same_media(left: &MediaRecord, right: &MediaRecord) -> bool {
    left.data == right.data
}

fn media_differences(report: &mut SectionReport, left: &MediaRecord, right: &MediaRecord) {
    if left.media_type != right.media_type {
        report.differ(format!(
            "media '{}': type {} vs {}",
            left.name, left.media_type, right.media_type
        ));
    }
    if left.original_format != right.original_format {
        report.differ(format!(
            "media '{}': original format {:?} vs {:?}",
            left.name, left.original_format, right.original_format
        ));
    }
    if left.data != right.data {
        report.differ(format!(
            "media '{}': content differs ({} vs {} bytes)",
            left.name,
            left.data.len(),
            right.data.len()
        ));
    }
}

/// A stored value normalized for comparison.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Cell {
    Null,
    Integer(i64),
    /// Bit pattern of a finite or infinite non-integral real.
    Real(u64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    fn normalize(value: &Value, decimal_places: Option<u32>) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Integer(i) => Self::Integer(*i),
            Value::Real(r) => Self::from_real(*r, decimal_places),
            Value::Text(s) => Self::Text(s.clone()),
            Value::Blob(b) => Self::Blob(b.clone()),
        }
    }

    fn from_real(value: f64, decimal_places: Option<u32>) -> Self {
        if value.is_nan() {
            return Self::Null;
        }
        let value = match decimal_places {
            Some(places) => round_half_away(value, places),
            None => value,
        };
        // Covers -0.0 as well.
        if value.fract() == 0.0 && value.abs() < 9.0e15 {
            return Self::Integer(value as i64);
        }
        Self::Real(value.to_bits())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Rounds through the shortest decimal rendering of `value`, so `2.675`
/// becomes `2.68` rather than the binary neighbour `2.67`.
fn round_half_away(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .and_then(|d| {
            d.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
                .to_f64()
        })
        .unwrap_or(value)
}

fn render_row(row: &[Cell]) -> String {
    let cells: Vec<String> = row.iter().map(Cell::to_string).collect();
    format!("({})", cells.join(", "))
}

fn ordered_row_differences(left: &[Vec<Cell>], right: &[Vec<Cell>]) -> Vec<String> {
    let mut differences = Vec::new();
    if let Some(index) = left.iter().zip(right).position(|(l, r)| l != r) {
        differences.push(format!(
            "first differing row at index {index}: {} vs {}",
            render_row(&left[index]),
            render_row(&right[index])
        ));
    }
    if left.len() != right.len() {
        differences.push(format!(
            "row counts differ ({} vs {})",
            left.len(),
            right.len()
        ));
    }
    differences
}

fn unordered_row_differences(
    left: &[Vec<Cell>],
    right: &[Vec<Cell>],
    max_examples: usize,
) -> Vec<String> {
    let count = |rows: &[Vec<Cell>]| {
        let mut counts: BTreeMap<Vec<Cell>, usize> = BTreeMap::new();
        for row in rows {
            *counts.entry(row.clone()).or_default() += 1;
        }
        counts
    };
    let left_counts = count(left);
    let right_counts = count(right);
    if left_counts == right_counts {
        return Vec::new();
    }

    let only_left: Vec<&Vec<Cell>> = left_counts
        .keys()
        .filter(|row| !right_counts.contains_key(*row))
        .collect();
    let only_right: Vec<&Vec<Cell>> = right_counts
        .keys()
        .filter(|row| !left_counts.contains_key(*row))
        .collect();
    let recounted: Vec<(&Vec<Cell>, usize, usize)> = left_counts
        .iter()
        .filter_map(|(row, &l)| {
            right_counts
                .get(row)
                .filter(|&&r| r != l)
                .map(|&r| (row, l, r))
        })
        .collect();

    let mut differences = vec!["row content differs (order ignored)".to_string()];
    for row in only_left.iter().take(max_examples) {
        differences.push(format!("row only on the left: {}", render_row(row)));
    }
    for row in only_right.iter().take(max_examples) {
        differences.push(format!("row only on the right: {}", render_row(row)));
    }
    for (row, l, r) in recounted.iter().take(max_examples) {
        differences.push(format!(
            "row {} occurs {l} time(s) on the left, {r} on the right",
            render_row(row)
        ));
    }
    differences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[Value]) -> Vec<Cell> {
        values.iter().map(|v| Cell::normalize(v, None)).collect()
    }

    #[test]
    fn test_rounding_uses_decimal_rendering() {
        assert_eq!(round_half_away(2.675, 2), 2.68);
        assert_eq!(round_half_away(-2.5, 0), -3.0);
        assert_eq!(round_half_away(1.23456, 3), 1.235);
        assert!(round_half_away(f64::INFINITY, 2).is_infinite());
    }

    #[test]
    fn test_cell_normalization() {
        assert_eq!(Cell::normalize(&Value::Real(4.0), None), Cell::Integer(4));
        assert_eq!(Cell::normalize(&Value::Real(-0.0), None), Cell::Integer(0));
        assert_eq!(Cell::normalize(&Value::Real(f64::NAN), None), Cell::Null);
        assert_eq!(
            Cell::normalize(&Value::Real(0.1 + 0.2), Some(2)),
            Cell::normalize(&Value::Real(0.3), None)
        );
        assert_ne!(
            Cell::normalize(&Value::Real(0.1 + 0.2), None),
            Cell::normalize(&Value::Real(0.3), None)
        );
    }

    #[test]
    fn test_unordered_rows_report_examples() {
        let left = vec![
            cells(&[Value::Integer(1)]),
            cells(&[Value::Integer(2)]),
            cells(&[Value::Integer(2)]),
        ];
        let right = vec![
            cells(&[Value::Integer(2)]),
            cells(&[Value::Integer(3)]),
        ];
        let differences = unordered_row_differences(&left, &right, 5);
        assert_eq!(
            differences,
            [
                "row content differs (order ignored)",
                "row only on the left: (1)",
                "row only on the right: (3)",
                "row (2) occurs 2 time(s) on the left, 1 on the right",
            ]
        );

        let reversed: Vec<Vec<Cell>> = left.iter().rev().cloned().collect();
        assert!(unordered_row_differences(&left, &reversed, 5).is_empty());
        assert_eq!(unordered_row_differences(&left, &right, 0).len(), 1);
    }

    #[test]
    fn test_ordered_rows() {
        let left = vec![
            cells(&[Value::Text("a".into())]),
            cells(&[Value::Text("b".into())]),
        ];
        let right: Vec<Vec<Cell>> = left.iter().rev().cloned().collect();
        assert_eq!(
            ordered_row_differences(&left, &right),
            [r#"first differing row at index 0: ("a") vs ("b")"#]
        );
        assert_eq!(
            ordered_row_differences(&left, &left[..1]),
            ["row counts differ (2 vs 1)"]
        );
    }
}
