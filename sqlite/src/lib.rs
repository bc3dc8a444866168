//! SQLite storage engine for SDIF containers.
//!
//! A container is one SQLite file with seven reserved `sdif_` system tables
//! next to the user's data tables. This crate opens and initializes such
//! files and enforces the format's rules on every write.
//!
//! # Architecture
//!
//! - **`container`**: opening modes, close, properties, and sources
//! - **`table`**: table registration with conflict policies, row insertion,
//!   reads and drops
//! - **`records`**: objects, media, and semantic links
//! - **`guard`** / **`query`**: lexically guarded read-only queries
//! - **`extract`**: structural schema extraction for the comparator
//! - **`compare`**: content comparison of rows, objects, and media
//! - **`analysis`**: sampled content analysis
//! - **`merge`**: combining several containers into one
//! - **`schema`** / **`convert`**: DDL generation and row mapping
//!
//! # Quick start
//!
//! ```
//! use sdif_core::{ColumnSpec, ConflictPolicy, SqlType, TableOptions};
//! use sdif_sqlite::{Container, Value};
//!
//! let mut container = Container::open_in_memory().unwrap();
//! let source = container.add_source("orders.csv", "csv", None).unwrap();
//!
//! let columns = [
//!     ColumnSpec::new("id", SqlType::Integer).primary_key(),
//!     ColumnSpec::new("total", SqlType::Real).not_null(),
//! ];
//! let opts = TableOptions::with_policy(ConflictPolicy::Add);
//! let name = container.create_table("orders", &columns, source, &opts).unwrap();
//! assert_eq!(name, "orders");
//!
//! container
//!     .insert_rows(&name, &["id", "total"], &[vec![Value::Integer(1), Value::Real(9.5)]])
//!     .unwrap();
//!
//! let again = container.create_table("orders", &columns, source, &opts).unwrap();
//! assert_eq!(again, "orders_1");
//!
//! let schema = container.schema().unwrap();
//! assert_eq!(schema.tables["orders"].columns.len(), 2);
//! ```
//!
//! # Read-only access
//!
//! [`Container::open_read_only`] uses SQLite's own read-only flag, and every
//! mutating method checks the mode before touching storage. The keyword
//! guard behind [`Container::query`] is an extra layer on top of that, not
//! a replacement for it.

mod analysis;
mod compare;
mod container;
mod convert;
mod error;
mod extract;
mod guard;
mod merge;
mod query;
mod records;
mod schema;
mod table;

pub use analysis::{
    AnalysisOptions, ColumnAnalysis, MediaDescriptor, NumericSummary, ObjectDescriptor,
    SampleAnalysis, TableAnalysis,
};
pub use compare::{
    ContentComparator, ContentComparison, ContentComparisonOptions, SectionReport,
};
pub use container::{Container, OpenOptions};
pub use convert::{json_to_value, value_to_json};
pub use error::{ContainerError, EntityKind, Result};
pub use guard::{DISALLOWED_KEYWORDS, check_read_only};
pub use merge::{MergeReport, RenamedEntity, merge_containers};
pub use query::QueryResult;
pub use rusqlite::types::Value;
pub use table::{MAX_SUFFIX_ATTEMPTS, TableData};
