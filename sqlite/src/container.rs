//! Opening, closing, and source registration for containers.
//!
//! A [`Container`] owns one SQLite connection for its whole lifetime. It is
//! opened read-write (creating the system tables on first use) or with
//! SQLite's hard read-only flag, in which case every mutating call fails
//! with [`PermissionDenied`](ContainerError::PermissionDenied) before any
//! statement runs.
//!
//! # Example
//!
//! ```no_run
//! use sdif_sqlite::Container;
//!
//! let mut container = Container::create("output.sdif").unwrap();
//! let source = container.add_source("sales.csv", "csv", Some("Q1 export")).unwrap();
//! println!("registered source {source}");
//! container.close().unwrap();
//!
//! let reader = Container::open_read_only("output.sdif").unwrap();
//! assert_eq!(reader.list_sources().unwrap().len(), 1);
//! ```

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use sdif_core::{FORMAT_VERSION, Properties, Source, SourceId};
use tracing::{debug, info};

use crate::convert::{SOURCE_COLUMNS, row_to_source};
use crate::error::{ContainerError, EntityKind, Result};
use crate::schema::{PROPERTIES_TABLE, system_schema_sql};

/// How a container file is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Open with SQLite's read-only flag. The file must exist.
    pub read_only: bool,
    /// Delete an existing file before opening read-write.
    pub overwrite: bool,
}

/// An open SDIF container.
///
/// The connection is released on [`close`](Self::close) or when the value
/// is dropped. Closing twice is a no-op; any other call on a closed
/// container fails with [`ContainerError::Closed`].
#[derive(Debug)]
pub struct Container {
    conn: Option<Connection>,
    path: Option<PathBuf>,
    read_only: bool,
}

impl Container {
    /// Opens `path` read-write, creating the file and system tables if
    /// needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, OpenOptions::default())
    }

    /// Opens an existing container with SQLite's hard read-only flag.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(
            path,
            OpenOptions {
                read_only: true,
                overwrite: false,
            },
        )
    }

    /// Opens a container with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::NotFound`] when a read-only target does not
    /// exist and [`ContainerError::InvalidSpec`] when `overwrite` is combined
    /// with `read_only`.
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();

        if options.read_only {
            if options.overwrite {
                return Err(ContainerError::InvalidSpec(
                    "cannot overwrite a container opened read-only".to_string(),
                ));
            }
            if !path.exists() {
                return Err(ContainerError::not_found(
                    EntityKind::Container,
                    path.display(),
                ));
            }
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            debug!(path = %path.display(), "Opened container read-only");
            return Ok(Self {
                conn: Some(conn),
                path: Some(path.to_path_buf()),
                read_only: true,
            });
        }

        if options.overwrite && path.exists() {
            std::fs::remove_file(path)?;
            info!(path = %path.display(), "Removed existing container");
        }
        let conn = Connection::open(path)?;
        let container = Self::initialize(conn, Some(path.to_path_buf()))?;
        debug!(path = %path.display(), "Opened container read-write");
        Ok(container)
    }

    /// Creates a scratch container in memory.
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?, None)
    }

    fn initialize(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let initialized: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![PROPERTIES_TABLE],
            |row| row.get(0),
        )?;
        if !initialized {
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(&system_schema_sql())?;
            tx.execute(
                "INSERT INTO sdif_properties (sdif_version, creation_timestamp) VALUES (?1, ?2)",
                params![FORMAT_VERSION, utc_timestamp()],
            )?;
            tx.commit()?;
            info!(version = FORMAT_VERSION, "Initialized container system tables");
        }

        Ok(Self {
            conn: Some(conn),
            path,
            read_only: false,
        })
    }

    /// Closes the connection. Calling it again does nothing.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| ContainerError::Database(e))?;
            debug!("Closed container");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// File backing the container; `None` for in-memory containers.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(ContainerError::Closed)
    }

    /// Returns the connection for a mutating call, rejecting read-only
    /// containers first.
    pub(crate) fn writable_connection(&mut self, operation: &str) -> Result<&mut Connection> {
        if self.read_only {
            return Err(ContainerError::PermissionDenied(format!(
                "cannot {operation}: container is open read-only"
            )));
        }
        self.conn.as_mut().ok_or(ContainerError::Closed)
    }

    /// Reads the properties record.
    pub fn properties(&self) -> Result<Option<Properties>> {
        let conn = self.connection()?;
        let properties = conn
            .query_row(
                "SELECT sdif_version, creation_timestamp FROM sdif_properties LIMIT 1",
                [],
                |row| {
                    Ok(Properties {
                        format_version: row.get(0)?,
                        creation_timestamp: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(properties)
    }

    // -----------------------------------------------------------------------
    // Sources
    // -----------------------------------------------------------------------

    /// Registers an original input and returns its identity.
    pub fn add_source(
        &mut self,
        file_name: &str,
        file_type: &str,
        description: Option<&str>,
    ) -> Result<SourceId> {
        let conn = self.writable_connection("add source")?;
        if file_name.trim().is_empty() {
            return Err(ContainerError::InvalidName {
                name: file_name.to_string(),
                reason: "source name cannot be empty".to_string(),
            });
        }
        conn.execute(
            "INSERT INTO sdif_sources (original_file_name, original_file_type, \
             source_description, processing_timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![file_name, file_type, description, utc_timestamp()],
        )?;
        let id = SourceId(conn.last_insert_rowid());
        debug!(source_id = %id, file_name, file_type, "Added source");
        Ok(id)
    }

    /// Lists sources in registration order.
    pub fn list_sources(&self) -> Result<Vec<Source>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SOURCE_COLUMNS} FROM sdif_sources ORDER BY source_id"
        ))?;
        let sources = stmt
            .query_map([], row_to_source)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    /// Looks up one source.
    pub fn get_source(&self, id: SourceId) -> Result<Source> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("SELECT {SOURCE_COLUMNS} FROM sdif_sources WHERE source_id = ?1"),
            params![id.0],
            row_to_source,
        )
        .optional()?
        .ok_or_else(|| ContainerError::not_found(EntityKind::Source, id))
    }

    /// Removes a source nothing refers to.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::ReferentialIntegrity`] while any table,
    /// object, or media entry still references the source.
    pub fn drop_source(&mut self, id: SourceId) -> Result<()> {
        let conn = self.writable_connection("drop source")?;
        let tx = conn.transaction()?;
        let references: i64 = tx.query_row(
            "SELECT (SELECT COUNT(*) FROM sdif_tables_metadata WHERE source_id = ?1) \
                  + (SELECT COUNT(*) FROM sdif_objects WHERE source_id = ?1) \
                  + (SELECT COUNT(*) FROM sdif_media WHERE source_id = ?1)",
            params![id.0],
            |row| row.get(0),
        )?;
        if references > 0 {
            return Err(ContainerError::ReferentialIntegrity(format!(
                "source {id} is still referenced by {references} entities"
            )));
        }
        let deleted = tx.execute("DELETE FROM sdif_sources WHERE source_id = ?1", params![id.0])?;
        if deleted == 0 {
            return Err(ContainerError::not_found(EntityKind::Source, id));
        }
        tx.commit()?;
        Ok(())
    }
}

/// Checks that a source exists, for use inside a transaction.
pub(crate) fn ensure_source_exists(conn: &Connection, id: SourceId) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sdif_sources WHERE source_id = ?1)",
        params![id.0],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(ContainerError::not_found(EntityKind::Source, id))
    }
}

/// Current UTC time in the container's timestamp format.
pub(crate) fn utc_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
