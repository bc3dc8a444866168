//! YAML configuration for CSV ingestion runs.
//!
//! A config holds shared `defaults` and a list of `files`, each of which may
//! override any default. Options left unset everywhere fall back to
//! detection or to the pipeline's built-in defaults.
//!
//! # Example YAML
//!
//! ```yaml
//! defaults:
//!   has_header: true
//!   if_exists: add
//! files:
//!   - path: data/orders.csv
//!     delimiter: ";"
//!     encoding: latin1
//!     skip_rows: [0, -1]
//!     skip_columns: [internal_notes]
//!     table_name: orders
//!     columns:
//!       - original_identifier: Order Date
//!         final_column_name: ordered_on
//!         description: Date the order was placed
//!   - path: data/customers.csv
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use sdif_core::ConflictPolicy;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::skip::{ColumnRef, RowSkip};

/// Renames and documents one column.
///
/// Matched against the raw header case-insensitively. Without a header,
/// definitions apply by position among the kept columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub original_identifier: String,
    pub final_column_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Per-file ingestion options. Every field is optional so files can
/// override only what differs from the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    /// Field delimiter; detected when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    /// Encoding label such as `utf-8` or `latin1`; detected when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Whether the first kept record is a header. Defaults to `true`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_header: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_rows: Option<RowSkip>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_columns: Option<Vec<ColumnRef>>,
    /// Table name; the sanitized file stem when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Conflict policy for the table name. Defaults to `add`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_exists: Option<ConflictPolicy>,
    /// Rows sampled for type inference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnDefinition>>,
}

impl FileOptions {
    /// Returns these options with unset fields filled from `base`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sdif_ingest::FileOptions;
    ///
    /// let defaults = FileOptions { delimiter: Some(';'), has_header: Some(false), ..Default::default() };
    /// let file = FileOptions { has_header: Some(true), ..Default::default() };
    ///
    /// let merged = file.merged_over(&defaults);
    /// assert_eq!(merged.delimiter, Some(';'));
    /// assert_eq!(merged.has_header, Some(true));
    /// ```
    pub fn merged_over(&self, base: &FileOptions) -> FileOptions {
        FileOptions {
            delimiter: self.delimiter.or(base.delimiter),
            encoding: self.encoding.clone().or_else(|| base.encoding.clone()),
            has_header: self.has_header.or(base.has_header),
            skip_rows: self.skip_rows.clone().or_else(|| base.skip_rows.clone()),
            skip_columns: self
                .skip_columns
                .clone()
                .or_else(|| base.skip_columns.clone()),
            table_name: self.table_name.clone().or_else(|| base.table_name.clone()),
            description: self
                .description
                .clone()
                .or_else(|| base.description.clone()),
            if_exists: self.if_exists.or(base.if_exists),
            sample_size: self.sample_size.or(base.sample_size),
            columns: self.columns.clone().or_else(|| base.columns.clone()),
        }
    }
}

/// One input file and its overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    #[serde(flatten)]
    pub options: FileOptions,
}

/// Top-level ingestion configuration.
///
/// # Examples
///
/// ```no_run
/// use sdif_ingest::IngestConfig;
///
/// let config = IngestConfig::load("ingest.yml").unwrap();
/// for file in &config.files {
///     let options = config.options_for(file);
///     println!("{}: header={:?}", file.path.display(), options.has_header);
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub defaults: FileOptions,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

impl IngestConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::IngestError::Io) if the file cannot be read, or
    /// [`Yaml`](crate::IngestError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::IngestError::Io) if the file cannot be written,
    /// or [`Yaml`](crate::IngestError::Yaml) if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Effective options for `entry`: its overrides over the defaults.
    pub fn options_for(&self, entry: &FileEntry) -> FileOptions {
        entry.options.merged_over(&self.defaults)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
defaults:
  has_header: true
  if_exists: replace
  sample_size: 50
files:
  - path: data/orders.csv
    delimiter: ";"
    encoding: latin1
    skip_rows: [0, -1]
    skip_columns: [internal_notes, 4]
    table_name: orders
    if_exists: fail
    columns:
      - original_identifier: Order Date
        final_column_name: ordered_on
        description: Date the order was placed
  - path: data/customers.csv
    delimiter: "\t"
    skip_rows: 2
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: IngestConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.files.len(), 2);

        let orders = &config.files[0];
        assert_eq!(orders.path, PathBuf::from("data/orders.csv"));
        assert_eq!(orders.options.delimiter, Some(';'));
        assert_eq!(orders.options.encoding.as_deref(), Some("latin1"));
        assert_eq!(
            orders.options.skip_rows,
            Some(RowSkip::Indices(BTreeSet::from([-1, 0])))
        );
        assert_eq!(
            orders.options.skip_columns,
            Some(vec![
                ColumnRef::Name("internal_notes".into()),
                ColumnRef::Index(4)
            ])
        );
        let columns = orders.options.columns.as_ref().unwrap();
        assert_eq!(columns[0].final_column_name, "ordered_on");

        let customers = &config.files[1];
        assert_eq!(customers.options.delimiter, Some('\t'));
        assert_eq!(customers.options.skip_rows, Some(RowSkip::Count(2)));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let config: IngestConfig = serde_yaml::from_str(sample_yaml()).unwrap();

        let orders = config.options_for(&config.files[0]);
        assert_eq!(orders.if_exists, Some(ConflictPolicy::Fail));
        assert_eq!(orders.has_header, Some(true));
        assert_eq!(orders.sample_size, Some(50));

        let customers = config.options_for(&config.files[1]);
        assert_eq!(customers.if_exists, Some(ConflictPolicy::Replace));
        assert_eq!(customers.table_name, None);
    }

    #[test]
    fn test_minimal_config() {
        let config: IngestConfig = serde_yaml::from_str("files:\n  - path: a.csv\n").unwrap();
        assert_eq!(config.defaults, FileOptions::default());
        assert_eq!(config.files[0].options, FileOptions::default());
    }

    #[test]
    fn test_save_and_load() {
        let config: IngestConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.yml");

        config.save(&path).unwrap();
        let loaded = IngestConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err = IngestConfig::load("/nonexistent/ingest.yml").unwrap_err();
        assert!(matches!(err, crate::IngestError::Io(_)));
    }
}
