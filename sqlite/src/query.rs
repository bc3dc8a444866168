//! Guarded ad-hoc queries.

use rusqlite::types::Value;
use tracing::{debug, warn};

use crate::container::Container;
use crate::convert::value_to_json;
use crate::error::Result;
use crate::guard::check_read_only;

/// Rows returned by [`Container::query`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Rows as JSON objects keyed by column name.
    pub fn to_json_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(value_to_json))
                    .collect()
            })
            .collect()
    }
}

impl Container {
    /// Runs a read-only SQL statement after the lexical guard accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionDenied`](crate::ContainerError::PermissionDenied)
    /// when the guard rejects the statement.
    ///
    /// # Examples
    ///
    /// ```
    /// use sdif_sqlite::Container;
    ///
    /// let container = Container::open_in_memory().unwrap();
    /// let result = container.query("SELECT sdif_version FROM sdif_properties").unwrap();
    /// assert_eq!(result.columns, ["sdif_version"]);
    /// assert!(container.query("DELETE FROM sdif_sources").is_err());
    /// ```
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        check_read_only(sql)?;
        let conn = self.connection()?;
        if !self.is_read_only() {
            warn!("Executing guarded query on a writable container");
        }

        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(rows = rows.len(), columns = width, "Query returned");
        Ok(QueryResult { columns, rows })
    }
}
