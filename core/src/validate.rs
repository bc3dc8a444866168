//! Validation of table names and column specifications.
//!
//! Registration calls run these checks before opening a transaction, so a
//! rejected table never reaches storage.
//!
//! # Examples
//!
//! ```
//! use sdif_core::*;
//!
//! let columns = vec![
//!     ColumnSpec::new("id", SqlType::Integer).primary_key(),
//!     ColumnSpec::new("name", SqlType::Text),
//! ];
//! assert!(validate_columns(&columns).is_empty());
//!
//! let duplicated = vec![
//!     ColumnSpec::new("id", SqlType::Integer),
//!     ColumnSpec::new("ID", SqlType::Text),
//! ];
//! assert!(!validate_columns(&duplicated).is_empty());
//! assert!(validate_table_name("sdif_sources").is_err());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{ColumnSpec, RESERVED_PREFIX, SqlType};

/// Table-name and column-spec validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Table name is empty or whitespace-only.
    #[error("table name cannot be empty")]
    EmptyTableName,
    /// Table name starts with the system prefix.
    #[error("table name '{0}' uses the reserved prefix 'sdif_'")]
    ReservedPrefix(String),
    /// A table must declare at least one column.
    #[error("table must declare at least one column")]
    NoColumns,
    /// Column name is empty or whitespace-only.
    #[error("column name cannot be empty (position {0})")]
    EmptyColumnName(usize),
    /// Two columns share a name (compared case-insensitively, like SQLite).
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
    /// Foreign key target has an empty table or column.
    #[error("column '{0}' declares a foreign key with an empty target")]
    EmptyForeignKeyTarget(String),
    /// Custom declared type contains characters outside `[A-Za-z0-9_ (),.]`.
    #[error("column '{column}' has an invalid declared type '{sql_type}'")]
    InvalidType { column: String, sql_type: String },
}

/// Checks a user table name.
pub fn validate_table_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyTableName);
    }
    if name.starts_with(RESERVED_PREFIX) {
        return Err(ValidationError::ReservedPrefix(name.to_string()));
    }
    Ok(())
}

/// Checks a column list, returning every problem found.
pub fn validate_columns(columns: &[ColumnSpec]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if columns.is_empty() {
        errors.push(ValidationError::NoColumns);
        return errors;
    }

    let mut seen = HashSet::new();
    for (position, column) in columns.iter().enumerate() {
        if column.name.trim().is_empty() {
            errors.push(ValidationError::EmptyColumnName(position));
            continue;
        }
        if !seen.insert(column.name.to_lowercase()) {
            errors.push(ValidationError::DuplicateColumn(column.name.clone()));
        }
        if let SqlType::Other(raw) = &column.sql_type {
            if !is_safe_type_name(raw) {
                errors.push(ValidationError::InvalidType {
                    column: column.name.clone(),
                    sql_type: raw.clone(),
                });
            }
        }
        if let Some(fk) = &column.foreign_key {
            if fk.table.trim().is_empty() || fk.column.trim().is_empty() {
                errors.push(ValidationError::EmptyForeignKeyTarget(column.name.clone()));
            }
        }
    }
    errors
}

fn is_safe_type_name(raw: &str) -> bool {
    !raw.trim().is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '(' | ')' | ',' | '.'))
}
