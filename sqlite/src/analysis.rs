//! Sampled content analysis.
//!
//! [`Container::sample_analysis`] gives a quick look at what the tables
//! hold beyond their declared shape: a few sample rows, null ratios,
//! distinct counts, the most common values, and a numeric summary for
//! columns whose non-null values are all numbers.

use std::collections::BTreeMap;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use sdif_core::{MediaType, SourceId};
use tracing::{debug, info};

use crate::container::Container;
use crate::convert::value_to_json;
use crate::error::Result;
use crate::schema::quote_ident;

/// Knobs for [`Container::sample_analysis`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Sample rows reported per table.
    pub sample_size: usize,
    /// Most common values reported per column.
    pub top_values: usize,
    pub include_objects: bool,
    pub include_media: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            sample_size: 5,
            top_values: 5,
            include_objects: false,
            include_media: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleAnalysis {
    pub tables: BTreeMap<String, TableAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<ObjectDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaDescriptor>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableAnalysis {
    pub row_count: usize,
    pub sample_rows: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Per-column analysis in column order.
    pub columns: Vec<ColumnAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnAnalysis {
    pub name: String,
    pub sql_type: String,
    /// Share of NULL cells from 0 to 100, rounded to two decimals.
    pub null_percentage: f64,
    pub distinct_count: usize,
    /// `(value, occurrences)`, most frequent first.
    pub most_common_values: Vec<(serde_json::Value, usize)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_summary: Option<NumericSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; absent for a single value.
    pub std_dev: Option<f64>,
    pub q25: f64,
    pub q75: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDescriptor {
    pub name: String,
    pub source_id: SourceId,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaDescriptor {
    pub name: String,
    pub source_id: SourceId,
    pub media_type: MediaType,
    pub description: Option<String>,
}

impl Container {
    /// Samples and summarizes every registered table.
    ///
    /// Counts, distinct values and top values are computed by SQLite; only
    /// the sample rows and, for numeric columns, the non-null values are
    /// read back.
    pub fn sample_analysis(&self, options: &AnalysisOptions) -> Result<SampleAnalysis> {
        info!(
            sample_size = options.sample_size,
            top_values = options.top_values,
            "Starting sample analysis"
        );
        let schema = self.schema()?;
        let conn = self.connection()?;

        let mut tables = BTreeMap::new();
        for name in self.list_tables()? {
            let Some(table) = schema.tables.get(&name) else {
                continue;
            };
            let columns: Vec<(&str, &str)> = table
                .columns
                .iter()
                .map(|c| (c.name.as_str(), c.sql_type.as_str()))
                .collect();
            let analysis = analyze_table(conn, &name, &columns, options)?;
            debug!(table = %name, rows = analysis.row_count, "Analyzed table");
            tables.insert(name, analysis);
        }

        let objects = options.include_objects.then(|| {
            schema
                .objects
                .iter()
                .map(|(name, object)| ObjectDescriptor {
                    name: name.clone(),
                    source_id: object.source_id,
                    description: object.description.clone(),
                })
                .collect()
        });
        let media = options.include_media.then(|| {
            schema
                .media
                .iter()
                .map(|(name, media)| MediaDescriptor {
                    name: name.clone(),
                    source_id: media.source_id,
                    media_type: media.media_type,
                    description: media.description.clone(),
                })
                .collect()
        });

        Ok(SampleAnalysis {
            tables,
            objects,
            media,
        })
    }
}

fn analyze_table(
    conn: &Connection,
    name: &str,
    columns: &[(&str, &str)],
    options: &AnalysisOptions,
) -> Result<TableAnalysis> {
    let table = quote_ident(name);
    let row_count: i64 =
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    let row_count = to_count(row_count);

    let mut sample_rows = Vec::new();
    if !columns.is_empty() {
        let list: Vec<String> = columns.iter().map(|(c, _)| quote_ident(c)).collect();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {table} LIMIT 1 OFFSET ?1",
            list.join(", ")
        ))?;
        for offset in evenly_spaced(row_count, options.sample_size) {
            let values = stmt
                .query_row(params![to_sql_count(offset)], |row| {
                    (0..columns.len())
                        .map(|i| row.get::<_, Value>(i))
                        .collect::<rusqlite::Result<Vec<_>>>()
                })
                .optional()?;
            if let Some(values) = values {
                sample_rows.push(
                    columns
                        .iter()
                        .map(|(c, _)| c.to_string())
                        .zip(values.iter().map(value_to_json))
                        .collect(),
                );
            }
        }
    }

    let columns = columns
        .iter()
        .map(|(column, sql_type)| {
            analyze_column(conn, &table, column, sql_type, row_count, options.top_values)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TableAnalysis {
        row_count,
        sample_rows,
        columns,
    })
}

/// Up to `count` row indices spread evenly over `len` rows.
fn evenly_spaced(len: usize, count: usize) -> Vec<usize> {
    let count = count.min(len);
    (0..count).map(|i| i * len / count).collect()
}

/// Summarizes one column; `table` is already quoted.
fn analyze_column(
    conn: &Connection,
    table: &str,
    name: &str,
    sql_type: &str,
    row_count: usize,
    top_values: usize,
) -> Result<ColumnAnalysis> {
    let column = quote_ident(name);
    let (non_null, distinct, non_numeric): (i64, i64, i64) = conn.query_row(
        &format!(
            "SELECT COUNT({column}), COUNT(DISTINCT {column}), \
                    COUNT(CASE WHEN typeof({column}) IN ('text', 'blob') THEN 1 END) \
             FROM {table}"
        ),
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    let non_null = to_count(non_null);

    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) AS occurrences FROM {table} \
         WHERE {column} IS NOT NULL \
         GROUP BY {column} ORDER BY occurrences DESC, {column} LIMIT ?1"
    ))?;
    let most_common_values = stmt
        .query_map(params![to_sql_count(top_values)], |row| {
            Ok((value_to_json(&row.get::<_, Value>(0)?), to_count(row.get(1)?)))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let numeric_summary = if non_null > 0 && non_numeric == 0 {
        let mut stmt = conn.prepare(&format!(
            "SELECT {column} FROM {table} WHERE {column} IS NOT NULL"
        ))?;
        let values = stmt
            .query_map([], |row| row.get::<_, f64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if values.iter().all(|v| v.is_finite()) {
            numeric_summary(values)
        } else {
            None
        }
    } else {
        None
    };

    Ok(ColumnAnalysis {
        name: name.to_string(),
        sql_type: sql_type.to_string(),
        null_percentage: null_percentage(row_count.saturating_sub(non_null), row_count),
        distinct_count: to_count(distinct),
        most_common_values,
        numeric_summary,
    })
}

/// Share of `nulls` in `total` from 0 to 100, rounded to two decimals.
fn null_percentage(nulls: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (nulls as f64 / total as f64 * 10_000.0).round() / 100.0
}

fn to_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn to_sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn numeric_summary(mut values: Vec<f64>) -> Option<NumericSummary> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let std_dev = (n > 1).then(|| {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    });
    Some(NumericSummary {
        min: values[0],
        max: values[n - 1],
        mean,
        median: percentile(&values, 0.5),
        std_dev,
        q25: percentile(&values, 0.25),
        q75: percentile(&values, 0.75),
    })
}

/// Linear-interpolated percentile of sorted values.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdif_core::{ColumnSpec, SqlType, TableOptions};
    use serde_json::json;

    #[test]
    fn test_evenly_spaced() {
        assert_eq!(evenly_spaced(10, 5), [0, 2, 4, 6, 8]);
        assert_eq!(evenly_spaced(3, 5), [0, 1, 2]);
        assert!(evenly_spaced(0, 5).is_empty());
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.5), 2.5);
        assert_eq!(percentile(&values, 0.25), 1.75);
        assert_eq!(percentile(&values, 0.75), 3.25);
    }

    fn container_with(sql_type: SqlType, cells: Vec<Value>) -> Container {
        let mut container = Container::open_in_memory().unwrap();
        let source = container.add_source("t.csv", "csv", None).unwrap();
        container
            .create_table(
                "t",
                &[ColumnSpec::new("n", sql_type)],
                source,
                &TableOptions::default(),
            )
            .unwrap();
        let rows: Vec<Vec<Value>> = cells.into_iter().map(|v| vec![v]).collect();
        container.insert_rows("t", &["n"], &rows).unwrap();
        container
    }

    #[test]
    fn test_numeric_column() {
        let container = container_with(
            SqlType::Integer,
            vec![
                Value::Integer(2),
                Value::Integer(4),
                Value::Null,
                Value::Integer(4),
                Value::Real(6.0),
            ],
        );
        let options = AnalysisOptions {
            top_values: 1,
            sample_size: 2,
            ..AnalysisOptions::default()
        };
        let analysis = &container.sample_analysis(&options).unwrap().tables["t"];
        assert_eq!(analysis.row_count, 5);
        assert_eq!(analysis.sample_rows.len(), 2);
        assert_eq!(analysis.sample_rows[0]["n"], json!(2));
        assert_eq!(analysis.sample_rows[1]["n"], json!(null));

        let column = &analysis.columns[0];
        assert_eq!(column.null_percentage, 20.0);
        assert_eq!(column.distinct_count, 3);
        assert_eq!(column.most_common_values, [(json!(4), 2)]);
        let summary = column.numeric_summary.as_ref().unwrap();
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 6.0);
        assert_eq!(summary.mean, 4.0);
        assert_eq!(summary.median, 4.0);
        assert!((summary.std_dev.unwrap() - 1.632_993).abs() < 1e-5);
    }

    #[test]
    fn test_mixed_column_has_no_summary() {
        let container = container_with(
            SqlType::Blob,
            vec![Value::Integer(1), Value::Text("x".into())],
        );
        let analysis = container.sample_analysis(&AnalysisOptions::default()).unwrap();
        let column = &analysis.tables["t"].columns[0];
        assert_eq!(column.distinct_count, 2);
        assert!(column.numeric_summary.is_none());
    }

    #[test]
    fn test_empty_table() {
        let container = container_with(SqlType::Text, vec![]);
        let analysis = container.sample_analysis(&AnalysisOptions::default()).unwrap();
        let table = &analysis.tables["t"];
        assert_eq!(table.row_count, 0);
        assert!(table.sample_rows.is_empty());
        assert_eq!(table.columns[0].null_percentage, 0.0);
        assert!(table.columns[0].most_common_values.is_empty());
    }
}
