//! Error types for container operations.
//!
//! Every failure surfaces as a [`ContainerError`] carrying the offending
//! name and the context needed to act on it.

use std::fmt;

use thiserror::Error;

/// Kind of entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Container,
    Source,
    Table,
    Object,
    Media,
    SemanticLink,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Container => "container",
            Self::Source => "source",
            Self::Table => "table",
            Self::Object => "object",
            Self::Media => "media",
            Self::SemanticLink => "semantic link",
        })
    }
}

/// Errors that can occur while reading or writing a container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// A name is already taken, or no free suffix was found.
    #[error("name conflict for '{name}': {detail}")]
    NameConflict { name: String, detail: String },

    /// A name uses the reserved prefix or is otherwise unusable.
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Column specifications, row shapes, or options are malformed.
    #[error("invalid specification: {0}")]
    InvalidSpec(String),

    /// Mutation on a read-only container, or a rejected query.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A foreign-key or cascade invariant would be broken.
    #[error("referential integrity violation: {0}")]
    ReferentialIntegrity(String),

    /// Stored metadata could not be parsed.
    #[error("malformed metadata in {location}: {reason}")]
    MalformedMetadata { location: String, reason: String },

    /// A referenced entity does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: EntityKind, name: String },

    /// The container was already closed.
    #[error("container is closed")]
    Closed,

    /// SQLite operation failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContainerError {
    pub(crate) fn not_found(kind: EntityKind, name: impl ToString) -> Self {
        Self::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    pub(crate) fn malformed(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedMetadata {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Maps a failed write, turning foreign-key constraint failures into
    /// [`ReferentialIntegrity`](Self::ReferentialIntegrity).
    pub(crate) fn from_write(err: rusqlite::Error, context: &str) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &err {
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                let detail = message.as_deref().unwrap_or("FOREIGN KEY constraint failed");
                return Self::ReferentialIntegrity(format!("{context}: {detail}"));
            }
        }
        Self::Database(err)
    }
}

/// Convenience alias for results with [`ContainerError`].
pub type Result<T> = std::result::Result<T, ContainerError>;
