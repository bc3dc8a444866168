//! Core types and schema comparison for SDIF containers.
//!
//! An SDIF container is a single SQLite file holding tabular data, JSON
//! objects, binary media, and the provenance metadata that ties them to
//! their original sources. This crate holds everything that does not need
//! the storage engine:
//!
//! - Entity and value types such as [`ColumnSpec`], [`Source`],
//!   [`ObjectRecord`], [`MediaRecord`], and [`SemanticLink`].
//! - Validation of table names and column lists ([`validate_table_name`],
//!   [`validate_columns`]).
//! - Identifier sanitizing ([`sanitize_identifier`], [`NameAllocator`]).
//! - The structural description of a container ([`ContainerSchema`]) and
//!   the [`SchemaComparator`] that checks two of them for equivalence or
//!   one-directional compatibility.
//!
//! # Example
//!
//! ```
//! use sdif_core::*;
//!
//! let columns = vec![
//!     ColumnSpec::new("id", SqlType::Integer).primary_key(),
//!     ColumnSpec::new("label", SqlType::Text).not_null(),
//! ];
//! assert!(validate_columns(&columns).is_empty());
//! assert_eq!(sanitize_identifier("Order Date", "column_0"), "order_date");
//!
//! let comparator = SchemaComparator::new(ComparisonConfig {
//!     enforce_table_names: false,
//!     ..ComparisonConfig::default()
//! });
//! let empty = ContainerSchema::default();
//! assert!(comparator.compare(&empty, &empty, Verbosity::Tree).equivalent);
//! ```

mod compare;
mod sanitize;
mod schema;
mod types;
mod validate;

pub use compare::*;
pub use sanitize::{NameAllocator, is_sql_keyword, sanitize_identifier};
pub use schema::{
    ColumnSchema, ContainerSchema, ForeignKeySchema, MediaSchema, ObjectSchema, TableSchema,
};
pub use types::*;
pub use validate::{ValidationError, validate_columns, validate_table_name};
