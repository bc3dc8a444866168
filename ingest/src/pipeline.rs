//! CSV ingestion into a container.
//!
//! One file becomes one source and one table. The steps, in order:
//!
//! 1. Decode the bytes with the configured or detected encoding.
//! 2. Split records with the configured or detected delimiter.
//! 3. Drop skipped and blank records; the first remaining one is the header
//!    when `has_header` is set.
//! 4. Drop skipped columns, then sanitize and de-duplicate the rest of the
//!    header (or name columns `column_{j}` by raw position).
//! 5. Infer a type per column from a sample and convert every cell.
//! 6. Register the source, create the table, insert the rows. If any write
//!    fails, the source (and a half-filled table) is removed again.
//!
//! A file whose records yield no columns at all is kept as a JSON object
//! holding its raw text, so nothing the caller handed in is silently lost.

use std::path::{Path, PathBuf};

use sdif_core::{
    ColumnSpec, ConflictPolicy, NameAllocator, ObjectRecord, SourceId, SqlType, TableOptions,
    sanitize_identifier,
};
use sdif_sqlite::{Container, Value};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ColumnDefinition, FileOptions, IngestConfig};
use crate::detect::{decode, detect_delimiter, detect_encoding, encoding_for_label};
use crate::error::{IngestError, Result};
use crate::infer::{DEFAULT_SAMPLE_SIZE, convert_value, infer_column_types};
use crate::skip::resolve_column_skips;

/// Source type recorded for every ingested file.
pub const CSV_SOURCE_TYPE: &str = "csv";

/// What one ingested file turned into.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub path: PathBuf,
    pub source_id: SourceId,
    /// Table holding the rows, if the file had any columns.
    pub table_name: Option<String>,
    /// Object holding the raw text, for files without columns.
    pub object_name: Option<String>,
    pub encoding: String,
    pub delimiter: char,
    pub rows_inserted: usize,
    /// Final column names, in table order.
    pub columns: Vec<String>,
}

/// Writes CSV files into a container.
///
/// # Examples
///
/// ```
/// use sdif_ingest::{CsvIngestor, FileOptions};
/// use sdif_sqlite::Container;
///
/// let mut container = Container::open_in_memory().unwrap();
/// let mut ingestor = CsvIngestor::new(&mut container);
///
/// let report = ingestor
///     .ingest_bytes("Sales Q1.csv", b"Id;Amount\n1;9.5\n2;3\n", &FileOptions::default())
///     .unwrap();
///
/// assert_eq!(report.table_name.as_deref(), Some("sales_q1"));
/// assert_eq!(report.delimiter, ';');
/// assert_eq!(report.columns, ["id", "amount"]);
/// assert_eq!(report.rows_inserted, 2);
/// ```
pub struct CsvIngestor<'a> {
    container: &'a mut Container,
    defaults: FileOptions,
}

impl<'a> CsvIngestor<'a> {
    pub fn new(container: &'a mut Container) -> Self {
        Self {
            container,
            defaults: FileOptions::default(),
        }
    }

    /// Options applied under every file's own options.
    pub fn with_defaults(mut self, defaults: FileOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Ingests every file listed in `config`, in order.
    ///
    /// Stops at the first failing file; files already ingested stay in the
    /// container.
    pub fn ingest_config(&mut self, config: &IngestConfig) -> Result<Vec<IngestReport>> {
        let mut reports = Vec::with_capacity(config.files.len());
        for entry in &config.files {
            let options = config.options_for(entry);
            reports.push(self.ingest_file(&entry.path, &options)?);
        }
        Ok(reports)
    }

    /// Reads and ingests one file.
    pub fn ingest_file(
        &mut self,
        path: impl AsRef<Path>,
        options: &FileOptions,
    ) -> Result<IngestReport> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut report = self.ingest_bytes(&file_name, &bytes, options)?;
        report.path = path.to_path_buf();
        Ok(report)
    }

    /// Ingests in-memory CSV content recorded under `file_name`.
    pub fn ingest_bytes(
        &mut self,
        file_name: &str,
        bytes: &[u8],
        options: &FileOptions,
    ) -> Result<IngestReport> {
        let options = options.merged_over(&self.defaults);

        let encoding = match options.encoding.as_deref() {
            Some(label) => encoding_for_label(label)?,
            None => detect_encoding(bytes),
        };
        let text = decode(bytes, encoding);

        let delimiter = match options.delimiter {
            Some(c) if c.is_ascii() => c as u8,
            Some(c) => {
                return Err(IngestError::InvalidOption(format!(
                    "delimiter '{c}' is not a single-byte character"
                )));
            }
            None => detect_delimiter(&text),
        };
        debug!(
            file = file_name,
            encoding = encoding.name(),
            delimiter = %char::from(delimiter).escape_default(),
            "Reading CSV"
        );

        let records = read_records(&text, delimiter)?;
        let skip_rows = options.skip_rows.clone().unwrap_or_default();
        let total = skip_rows.needs_total().then_some(records.len());
        let exclusion = skip_rows.resolve(total)?;

        let mut kept = records
            .into_iter()
            .enumerate()
            .filter(|(index, record)| !exclusion.excludes(*index) && !is_blank(record))
            .map(|(_, record)| record);

        let has_header = options.has_header.unwrap_or(true);
        let header = if has_header { kept.next() } else { None };
        let data: Vec<Vec<String>> = kept.collect();

        let width = match &header {
            Some(header) => header.len(),
            None => data.iter().map(Vec::len).max().unwrap_or(0),
        };
        let skipped = resolve_column_skips(
            options.skip_columns.as_deref().unwrap_or_default(),
            header.as_deref(),
            width,
        )?;
        let kept_columns: Vec<usize> = (0..width).filter(|j| !skipped.contains(j)).collect();
        let parsed = ParsedCsv {
            header,
            data,
            kept_columns,
            width,
        };

        let source_id = self
            .container
            .add_source(file_name, CSV_SOURCE_TYPE, None)?;
        let mut report = IngestReport {
            path: PathBuf::from(file_name),
            source_id,
            table_name: None,
            object_name: None,
            encoding: encoding.name().to_string(),
            delimiter: char::from(delimiter),
            rows_inserted: 0,
            columns: Vec::new(),
        };

        if let Err(e) = self.store_parsed(file_name, &text, &parsed, &options, &mut report) {
            if let Err(cleanup) = self.container.drop_source(source_id) {
                warn!(
                    file = file_name,
                    source_id = %source_id,
                    error = %cleanup,
                    "Could not remove source after failed ingest"
                );
            }
            return Err(e);
        }
        Ok(report)
    }

    /// Writes the parsed records under an already registered source.
    fn store_parsed(
        &mut self,
        file_name: &str,
        text: &str,
        parsed: &ParsedCsv,
        options: &FileOptions,
        report: &mut IngestReport,
    ) -> Result<()> {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        let table_candidate = sanitize_identifier(
            options.table_name.as_deref().unwrap_or(&stem),
            "data",
        );

        if parsed.kept_columns.is_empty() {
            if !text.trim().is_empty() {
                report.object_name =
                    Some(self.store_raw(&table_candidate, text, report.source_id, options)?);
            } else {
                info!(file = file_name, "Empty file, nothing to store");
            }
            return Ok(());
        }

        let columns = column_specs(
            parsed.header.as_deref(),
            &parsed.kept_columns,
            options.columns.as_deref().unwrap_or_default(),
        );
        let projected = project_rows(&parsed.data, &parsed.kept_columns, parsed.width);
        let sample_size = options.sample_size.unwrap_or(DEFAULT_SAMPLE_SIZE);
        let types = infer_column_types(&projected, columns.len(), sample_size);
        let columns: Vec<ColumnSpec> = columns
            .into_iter()
            .zip(types)
            .map(|(mut spec, sql_type)| {
                spec.sql_type = sql_type;
                spec
            })
            .collect();

        let table_options = TableOptions {
            description: options.description.clone(),
            original_identifier: Some(file_name.to_string()),
            policy: options.if_exists.unwrap_or(ConflictPolicy::Add),
        };
        let table_name = self.container.create_table(
            &table_candidate,
            &columns,
            report.source_id,
            &table_options,
        )?;

        let rows: Vec<Vec<Value>> = projected
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&columns)
                    .map(|(raw, spec)| convert_value(raw, &spec.sql_type))
                    .collect()
            })
            .collect();
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let inserted = match self.container.insert_rows(&table_name, &names, &rows) {
            Ok(inserted) => inserted,
            Err(e) => {
                if let Err(cleanup) = self.container.drop_table(&table_name) {
                    warn!(table = %table_name, error = %cleanup, "Could not remove table after failed insert");
                }
                return Err(e.into());
            }
        };

        info!(
            file = file_name,
            table = %table_name,
            rows = inserted,
            columns = names.len(),
            "Ingested CSV"
        );
        report.table_name = Some(table_name);
        report.rows_inserted = inserted;
        report.columns = names;
        Ok(())
    }

    fn store_raw(
        &mut self,
        candidate: &str,
        text: &str,
        source_id: SourceId,
        options: &FileOptions,
    ) -> Result<String> {
        let mut names = NameAllocator::with_taken(self.container.list_objects()?);
        let name = names.allocate(&format!("{candidate}_raw"));
        warn!(object = %name, "No columns found, storing raw content as an object");
        self.container.add_object(&ObjectRecord {
            name: name.clone(),
            source_id,
            data: serde_json::json!({ "raw_content": text }),
            description: options.description.clone(),
            schema_hint: None,
        })?;
        Ok(name)
    }
}

/// Records left after row and column skips.
struct ParsedCsv {
    header: Option<Vec<String>>,
    data: Vec<Vec<String>>,
    kept_columns: Vec<usize>,
    width: usize,
}

fn read_records(text: &str, delimiter: u8) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(str::to_string).collect());
    }
    Ok(records)
}

fn is_blank(record: &[String]) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

/// Builds named but untyped column specs for the kept raw columns.
fn column_specs(
    header: Option<&[String]>,
    kept_columns: &[usize],
    definitions: &[ColumnDefinition],
) -> Vec<ColumnSpec> {
    let mut names = NameAllocator::new();
    kept_columns
        .iter()
        .enumerate()
        .map(|(position, &raw_index)| {
            let fallback = format!("column_{raw_index}");
            let original = header.and_then(|h| h.get(raw_index));
            let definition = match original {
                Some(original) => {
                    let wanted = original.trim().to_lowercase();
                    definitions
                        .iter()
                        .find(|d| d.original_identifier.trim().to_lowercase() == wanted)
                }
                None if header.is_none() => definitions.get(position),
                None => None,
            };

            let candidate = match (definition, original) {
                (Some(d), _) => sanitize_identifier(&d.final_column_name, &fallback),
                (None, Some(original)) => sanitize_identifier(original, &fallback),
                (None, None) => fallback,
            };
            let name = names.allocate(&candidate);

            let mut spec = ColumnSpec::new(name, SqlType::Text);
            match (original, definition) {
                (Some(original), _) => spec = spec.with_original_name(original.clone()),
                (None, Some(d)) => spec = spec.with_original_name(d.original_identifier.clone()),
                (None, None) => {}
            }
            if let Some(description) = definition.and_then(|d| d.description.clone()) {
                spec = spec.with_description(description);
            }
            spec
        })
        .collect()
}

/// Picks the kept columns out of every row, padding short rows with empty
/// cells and cutting long ones.
fn project_rows(data: &[Vec<String>], kept_columns: &[usize], width: usize) -> Vec<Vec<String>> {
    let mut padded = 0usize;
    let mut truncated = 0usize;
    let rows = data
        .iter()
        .map(|row| {
            if row.len() < width {
                padded += 1;
            } else if row.len() > width {
                truncated += 1;
            }
            kept_columns
                .iter()
                .map(|&j| row.get(j).cloned().unwrap_or_default())
                .collect()
        })
        .collect();
    if padded > 0 || truncated > 0 {
        warn!(
            padded,
            truncated, width, "Rows did not match the column count"
        );
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_column_specs_from_header() {
        let header = strings(&["Order ID", "order id", "Notes"]);
        let specs = column_specs(Some(&header), &[0, 1], &[]);
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["order_id", "order_id_1"]);
        assert_eq!(specs[1].original_name.as_deref(), Some("order id"));
    }

    #[test]
    fn test_column_specs_with_definitions() {
        let header = strings(&["Order Date", "Total"]);
        let definitions = [ColumnDefinition {
            original_identifier: "order date".into(),
            final_column_name: "ordered_on".into(),
            description: Some("Date the order was placed".into()),
        }];
        let specs = column_specs(Some(&header), &[0, 1], &definitions);
        assert_eq!(specs[0].name, "ordered_on");
        assert_eq!(
            specs[0].description.as_deref(),
            Some("Date the order was placed")
        );
        assert_eq!(specs[1].name, "total");
    }

    #[test]
    fn test_headerless_specs() {
        let specs = column_specs(None, &[0, 2], &[]);
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["column_0", "column_2"]);

        let definitions = [ColumnDefinition {
            original_identifier: "first".into(),
            final_column_name: "code".into(),
            description: None,
        }];
        let specs = column_specs(None, &[0, 2], &definitions);
        assert_eq!(specs[0].name, "code");
        assert_eq!(specs[1].name, "column_2");
    }

    #[test]
    fn test_project_rows_pads_and_truncates() {
        let data = vec![strings(&["1"]), strings(&["2", "b", "extra"])];
        let rows = project_rows(&data, &[0, 1], 2);
        assert_eq!(rows, vec![strings(&["1", ""]), strings(&["2", "b"])]);
    }

    #[test]
    fn test_blank_records() {
        assert!(is_blank(&strings(&["", "  "])));
        assert!(!is_blank(&strings(&["", "x"])));
    }
}
