//! Tabular ingestion into SDIF containers.
//!
//! Turns delimited text files into registered sources and typed tables:
//!
//! - [`detect_encoding`] and [`detect_delimiter`] guess how to read a file
//!   from a bounded prefix, falling back to UTF-8 and `,`.
//! - [`RowSkip`] and [`resolve_column_skips`] decide which raw records and
//!   columns to leave out.
//! - [`infer_column_type`] picks `INTEGER`, `REAL`, or `TEXT` per column
//!   from a sample of values.
//! - [`CsvIngestor`] ties these together and writes through
//!   [`sdif_sqlite::Container`], driven by per-file [`FileOptions`] or a
//!   whole YAML [`IngestConfig`].
//!
//! # Example
//!
//! ```
//! use sdif_core::SqlType;
//! use sdif_ingest::{CsvIngestor, FileOptions, RowSkip, infer_column_type};
//! use sdif_sqlite::Container;
//!
//! assert_eq!(infer_column_type(["3", "4.25"]), SqlType::Real);
//!
//! let mut container = Container::open_in_memory().unwrap();
//! let csv = b"exported 2024-05-01\nsku,qty\nA-1,4\nB-2,7\n";
//! let options = FileOptions {
//!     skip_rows: Some(RowSkip::Count(1)),
//!     ..Default::default()
//! };
//! let report = CsvIngestor::new(&mut container)
//!     .ingest_bytes("stock.csv", csv, &options)
//!     .unwrap();
//!
//! let table = container.read_table(report.table_name.as_deref().unwrap()).unwrap();
//! assert_eq!(table.columns, ["sku", "qty"]);
//! assert_eq!(table.rows.len(), 2);
//! ```

mod config;
mod detect;
mod error;
mod infer;
mod pipeline;
mod skip;

pub use config::{ColumnDefinition, FileEntry, FileOptions, IngestConfig};
pub use detect::{
    CANDIDATE_DELIMITERS, DELIMITER_SAMPLE_SIZE, ENCODING_SAMPLE_SIZE, decode, detect_delimiter,
    detect_encoding, encoding_for_label,
};
pub use error::{IngestError, Result};
pub use infer::{DEFAULT_SAMPLE_SIZE, convert_value, infer_column_type, infer_column_types};
pub use pipeline::{CSV_SOURCE_TYPE, CsvIngestor, IngestReport};
pub use skip::{ColumnRef, RowExclusion, RowSkip, resolve_column_skips};
