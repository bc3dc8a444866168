//! Table registration, row insertion, and table removal.
//!
//! A table "exists" when it is recorded in `sdif_tables_metadata` or is
//! physically present in the SQLite catalog as a table or view, compared
//! case-insensitively. Conflict policies, inserts, reads, and drops all
//! resolve names the same way.

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use sdif_core::{
    ColumnMetadata, ColumnSpec, ConflictPolicy, SourceId, TableMetadata, TableOptions,
    validate_columns, validate_table_name,
};
use tracing::{debug, info, warn};

use crate::container::{Container, ensure_source_exists};
use crate::convert::{TABLE_METADATA_COLUMNS, row_to_column_metadata, row_to_table_metadata};
use crate::error::{ContainerError, EntityKind, Result};
use crate::schema::{create_table_sql, quote_ident};

/// Highest suffix probed by [`ConflictPolicy::Add`].
pub const MAX_SUFFIX_ATTEMPTS: u32 = 1000;

/// Column names and rows of a user table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Container {
    /// Creates a user table, mirrors its columns into column metadata, and
    /// returns the name actually used.
    ///
    /// The table, its metadata row, and its column metadata rows are written
    /// in one transaction. Under [`ConflictPolicy::Replace`] the old table
    /// is dropped in that same transaction.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::InvalidName`] for empty or reserved names
    /// - [`ContainerError::InvalidSpec`] for malformed column lists
    /// - [`ContainerError::NotFound`] for an unknown source
    /// - [`ContainerError::NameConflict`] under `Fail` when the name is taken,
    ///   or under `Add` when no free suffix exists
    pub fn create_table(
        &mut self,
        name: &str,
        columns: &[ColumnSpec],
        source_id: SourceId,
        options: &TableOptions,
    ) -> Result<String> {
        let conn = self.writable_connection("create table")?;

        validate_table_name(name).map_err(|e| ContainerError::InvalidName {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let problems = validate_columns(columns);
        if !problems.is_empty() {
            let messages: Vec<String> = problems.iter().map(|p| p.to_string()).collect();
            return Err(ContainerError::InvalidSpec(format!(
                "table '{name}': {}",
                messages.join("; ")
            )));
        }
        for column in columns.iter().filter(|c| !c.sql_type.is_standard()) {
            warn!(
                table = name,
                column = %column.name,
                sql_type = column.sql_type.as_sql(),
                "Non-standard column type"
            );
        }

        let tx = conn.transaction()?;
        ensure_source_exists(&tx, source_id)?;

        let actual_name = if table_exists(&tx, name)? {
            match options.policy {
                ConflictPolicy::Fail => {
                    return Err(ContainerError::NameConflict {
                        name: name.to_string(),
                        detail: format!("table already exists (policy: {})", options.policy),
                    });
                }
                ConflictPolicy::Replace => {
                    drop_table_in(&tx, name)?;
                    info!(table = name, "Replaced existing table");
                    name.to_string()
                }
                ConflictPolicy::Add => unique_table_name(&tx, name)?,
            }
        } else {
            name.to_string()
        };

        tx.execute_batch(&create_table_sql(&actual_name, columns))
            .map_err(|e| ContainerError::from_write(e, &format!("create table '{actual_name}'")))?;
        tx.execute(
            "INSERT INTO sdif_tables_metadata \
             (table_name, source_id, description, original_identifier, row_count) \
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![
                actual_name,
                source_id.0,
                options.description,
                options.original_identifier
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sdif_columns_metadata \
                 (table_name, column_name, description, original_column_name) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for column in columns {
                stmt.execute(params![
                    actual_name,
                    column.name,
                    column.description,
                    column.original_name
                ])?;
            }
        }
        tx.commit()?;

        info!(
            table = %actual_name,
            requested = name,
            columns = columns.len(),
            source_id = %source_id,
            "Created table"
        );
        Ok(actual_name)
    }

    /// Inserts rows into a registered table and bumps its row count.
    ///
    /// All rows are written in one transaction. Returns the number of rows
    /// inserted.
    pub fn insert_rows<S: AsRef<str>>(
        &mut self,
        table: &str,
        columns: &[S],
        rows: &[Vec<Value>],
    ) -> Result<usize> {
        let conn = self.writable_connection("insert rows")?;

        let registered: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sdif_tables_metadata WHERE table_name = ?1 COLLATE NOCASE)",
            params![table],
            |row| row.get(0),
        )?;
        if !registered {
            return Err(ContainerError::not_found(EntityKind::Table, table));
        }
        if rows.is_empty() {
            debug!(table, "No rows to insert");
            return Ok(0);
        }
        if columns.is_empty() {
            return Err(ContainerError::InvalidSpec(format!(
                "insert into '{table}' names no columns"
            )));
        }
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(ContainerError::InvalidSpec(format!(
                "row {index} of '{table}' has {} values, expected {}",
                row.len(),
                columns.len()
            )));
        }

        let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c.as_ref())).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            column_list.join(", "),
            placeholders.join(", ")
        );

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))
                    .map_err(|e| ContainerError::from_write(e, &format!("insert into '{table}'")))?;
            }
        }
        let inserted = i64::try_from(rows.len()).unwrap_or(i64::MAX);
        tx.execute(
            "UPDATE sdif_tables_metadata SET row_count = COALESCE(row_count, 0) + ?1 \
             WHERE table_name = ?2 COLLATE NOCASE",
            params![inserted, table],
        )?;
        tx.commit()?;

        debug!(table, rows = rows.len(), "Inserted rows");
        Ok(rows.len())
    }

    /// Reads every row of a table in storage order.
    pub fn read_table(&self, name: &str) -> Result<TableData> {
        let conn = self.connection()?;
        if !physical_table_exists(conn, name)? {
            return Err(ContainerError::not_found(EntityKind::Table, name));
        }
        let has_metadata: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sdif_tables_metadata WHERE table_name = ?1 COLLATE NOCASE)",
            params![name],
            |row| row.get(0),
        )?;
        if !has_metadata {
            warn!(table = name, "Reading table without metadata");
        }

        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(name)))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(TableData { columns, rows })
    }

    /// Drops a table together with its metadata rows.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let conn = self.writable_connection("drop table")?;
        let tx = conn.transaction()?;
        if !table_exists(&tx, name)? {
            return Err(ContainerError::not_found(EntityKind::Table, name));
        }
        drop_table_in(&tx, name)?;
        tx.commit()?;
        info!(table = name, "Dropped table");
        Ok(())
    }

    /// Returns `true` when the name is registered or physically present.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        table_exists(self.connection()?, name)
    }

    /// Lists registered user tables by name.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT table_name FROM sdif_tables_metadata ORDER BY table_name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Metadata row of one table.
    pub fn table_metadata(&self, name: &str) -> Result<TableMetadata> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("SELECT {TABLE_METADATA_COLUMNS} FROM sdif_tables_metadata WHERE table_name = ?1"),
            params![name],
            row_to_table_metadata,
        )
        .optional()?
        .ok_or_else(|| ContainerError::not_found(EntityKind::Table, name))
    }

    /// Column metadata rows of one table, in creation order.
    pub fn column_metadata(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT table_name, column_name, description, original_column_name \
             FROM sdif_columns_metadata WHERE table_name = ?1 ORDER BY rowid",
        )?;
        let columns = stmt
            .query_map(params![table], row_to_column_metadata)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sdif_tables_metadata WHERE table_name = ?1 COLLATE NOCASE) \
             OR EXISTS(SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') \
                       AND name = ?1 COLLATE NOCASE)",
        params![name],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn physical_table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(stored_object(conn, name)?.is_some())
}

/// Catalog name and kind (`table` or `view`) of `name`, matched
/// case-insensitively the way SQLite resolves identifiers.
fn stored_object(conn: &Connection, name: &str) -> Result<Option<(String, String)>> {
    let found = conn
        .query_row(
            "SELECT name, type FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE",
            params![name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(found)
}

/// First `name_N` that is not taken, probing up to [`MAX_SUFFIX_ATTEMPTS`].
fn unique_table_name(conn: &Connection, name: &str) -> Result<String> {
    for suffix in 1..=MAX_SUFFIX_ATTEMPTS {
        let candidate = format!("{name}_{suffix}");
        if !table_exists(conn, &candidate)? {
            debug!(requested = name, actual = %candidate, "Resolved name conflict with suffix");
            return Ok(candidate);
        }
    }
    Err(ContainerError::NameConflict {
        name: name.to_string(),
        detail: format!("no free suffix within {MAX_SUFFIX_ATTEMPTS} attempts (policy: add)"),
    })
}

/// Deletes column metadata, then table metadata, then the table itself.
///
/// Names match case-insensitively, so the stored spelling is removed
/// whichever case the caller used.
fn drop_table_in(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM sdif_columns_metadata WHERE table_name = ?1 COLLATE NOCASE",
        params![name],
    )?;
    conn.execute(
        "DELETE FROM sdif_tables_metadata WHERE table_name = ?1 COLLATE NOCASE",
        params![name],
    )?;
    if let Some((stored, kind)) = stored_object(conn, name)? {
        let statement = if kind == "view" { "DROP VIEW" } else { "DROP TABLE" };
        conn.execute_batch(&format!("{statement} {}", quote_ident(&stored)))
            .map_err(|e| ContainerError::from_write(e, &format!("drop table '{stored}'")))?;
    }
    Ok(())
}
