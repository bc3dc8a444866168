//! Entity and value types for SDIF containers.
//!
//! This module defines the data model shared by the storage engine, the
//! ingestion pipeline, and the schema comparator. The types carry no storage
//! logic and serialize with [`serde`], so they can be logged, diffed, or
//! written to JSON reports unchanged.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Container format version written to the properties record.
///
/// Containers declaring any other version are rejected by the merge
/// operation and flagged by the comparator when version enforcement is on.
pub const FORMAT_VERSION: &str = "1.0";

/// Prefix reserved for system tables.
///
/// User tables may not start with this prefix.
pub const RESERVED_PREFIX: &str = "sdif_";

/// Error returned when a textual tag does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseTagError {
    /// What was being parsed (e.g. `"media type"`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseTagError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Identity of a registered source, assigned by the container on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub i64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The single properties record of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    /// Declared format version (normally [`FORMAT_VERSION`]).
    pub format_version: String,
    /// UTC creation time, `%Y-%m-%dT%H:%M:%SZ`.
    pub creation_timestamp: Option<String>,
}

/// An original input registered in a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    /// File or stream name as it was ingested.
    pub file_name: String,
    /// Type tag such as `csv`, `xlsx`, or `json`.
    pub file_type: String,
    pub description: Option<String>,
    pub processing_timestamp: Option<String>,
}

/// Declared storage type of a column.
///
/// The seven standard tags round-trip through their uppercase SQL spelling.
/// Anything else is kept verbatim in [`SqlType::Other`] and accepted by the
/// store with a warning.
///
/// # Examples
///
/// ```
/// use sdif_core::SqlType;
///
/// assert_eq!(SqlType::parse("integer"), SqlType::Integer);
/// assert_eq!(SqlType::Real.to_string(), "REAL");
/// assert!(!SqlType::parse("VARCHAR(20)").is_standard());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SqlType {
    #[default]
    Text,
    Integer,
    Real,
    Blob,
    Numeric,
    Date,
    DateTime,
    /// Non-standard declared type, kept as written.
    Other(String),
}

impl SqlType {
    /// Parses a declared type, case-insensitively for the standard tags.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Self::Text,
            "INTEGER" => Self::Integer,
            "REAL" => Self::Real,
            "BLOB" => Self::Blob,
            "NUMERIC" => Self::Numeric,
            "DATE" => Self::Date,
            "DATETIME" => Self::DateTime,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    /// Returns `true` for the seven standard storage tags.
    pub fn is_standard(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// SQL spelling used in `CREATE TABLE`.
    pub fn as_sql(&self) -> &str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
            Self::Numeric => "NUMERIC",
            Self::Date => "DATE",
            Self::DateTime => "DATETIME",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Literal default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl DefaultValue {
    /// Renders the value as an SQL literal, quoting and escaping text.
    ///
    /// # Examples
    ///
    /// ```
    /// use sdif_core::DefaultValue;
    ///
    /// assert_eq!(DefaultValue::Text("it's".into()).to_sql_literal(), "'it''s'");
    /// assert_eq!(DefaultValue::Integer(0).to_sql_literal(), "0");
    /// ```
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Integer(v) => v.to_string(),
            Self::Real(v) if v.is_finite() => format!("{v:?}"),
            Self::Real(_) => "NULL".to_string(),
            Self::Text(v) => format!("'{}'", v.replace('\'', "''")),
        }
    }

    /// Parses a default expression as SQLite reports it. Unquoted text that
    /// is not a number is kept verbatim.
    ///
    /// ```
    /// use sdif_core::DefaultValue;
    ///
    /// assert_eq!(DefaultValue::from_sql_literal("'n/a'"), DefaultValue::Text("n/a".into()));
    /// assert_eq!(DefaultValue::from_sql_literal("-3"), DefaultValue::Integer(-3));
    /// ```
    pub fn from_sql_literal(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("null") {
            return Self::Null;
        }
        if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
            return Self::Text(raw[1..raw.len() - 1].replace("''", "'"));
        }
        if let Ok(v) = raw.parse::<i64>() {
            return Self::Integer(v);
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Real(v),
            _ => Self::Text(raw.to_string()),
        }
    }
}

/// Action taken on a referencing row when the referenced row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl ReferentialAction {
    /// SQL spelling, e.g. `SET NULL`.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::Cascade => "CASCADE",
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for ReferentialAction {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('_', " ");
        match normalized.as_str() {
            "NO ACTION" => Ok(Self::NoAction),
            "RESTRICT" => Ok(Self::Restrict),
            "SET NULL" => Ok(Self::SetNull),
            "SET DEFAULT" => Ok(Self::SetDefault),
            "CASCADE" => Ok(Self::Cascade),
            _ => Err(ParseTagError::new("referential action", s)),
        }
    }
}

/// Target of a column-level foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
    pub on_update: Option<ReferentialAction>,
    pub on_delete: Option<ReferentialAction>,
}

impl ForeignKeyRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            on_update: None,
            on_delete: None,
        }
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

/// Definition of one column passed to table creation.
///
/// Construct with [`ColumnSpec::new`] and chain the builder methods. The
/// whole column list is checked by
/// [`validate_columns`](crate::validate_columns) before any storage is
/// touched.
///
/// # Examples
///
/// ```
/// use sdif_core::{ColumnSpec, ForeignKeyRef, ReferentialAction, SqlType};
///
/// let id = ColumnSpec::new("id", SqlType::Integer).primary_key();
/// let owner = ColumnSpec::new("owner_id", SqlType::Integer)
///     .not_null()
///     .references(ForeignKeyRef::new("owners", "id").on_delete(ReferentialAction::Cascade))
///     .with_original_name("Owner ID");
///
/// assert!(id.primary_key);
/// assert!(owner.not_null);
/// assert_eq!(owner.foreign_key.as_ref().unwrap().table, "owners");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: SqlType,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default_value: Option<DefaultValue>,
    pub foreign_key: Option<ForeignKeyRef>,
    pub description: Option<String>,
    /// Column name as it appeared in the original source.
    pub original_name: Option<String>,
}

impl ColumnSpec {
    /// Creates a nullable, unconstrained column.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            not_null: false,
            primary_key: false,
            unique: false,
            default_value: None,
            foreign_key: None,
            description: None,
            original_name: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_default(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn references(mut self, target: ForeignKeyRef) -> Self {
        self.foreign_key = Some(target);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_original_name(mut self, original: impl Into<String>) -> Self {
        self.original_name = Some(original.into());
        self
    }
}

/// Strategy applied when a table name is already taken.
///
/// # Examples
///
/// ```
/// use sdif_core::ConflictPolicy;
///
/// assert_eq!(ConflictPolicy::default(), ConflictPolicy::Fail);
/// assert_eq!("add".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Add);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Reject the registration.
    #[default]
    Fail,
    /// Drop the existing table and its metadata, then create the new one.
    Replace,
    /// Create the table under the first free `name_N`.
    Add,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fail => "fail",
            Self::Replace => "replace",
            Self::Add => "add",
        })
    }
}

impl FromStr for ConflictPolicy {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "replace" => Ok(Self::Replace),
            "add" => Ok(Self::Add),
            _ => Err(ParseTagError::new("conflict policy", s)),
        }
    }
}

/// Broad category of a media blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Audio,
    Video,
    Binary,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            "binary" => Ok(Self::Binary),
            _ => Err(ParseTagError::new("media type", s)),
        }
    }
}

/// Kind of element a semantic link endpoint addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Table,
    Column,
    Object,
    Media,
    JsonPath,
    Source,
}

impl ElementType {
    /// Every element type, in declaration order.
    pub const ALL: [ElementType; 6] = [
        Self::Table,
        Self::Column,
        Self::Object,
        Self::Media,
        Self::JsonPath,
        Self::Source,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Column => "column",
            Self::Object => "object",
            Self::Media => "media",
            Self::JsonPath => "json_path",
            Self::Source => "source",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseTagError::new("element type", s))
    }
}

/// One endpoint of a semantic link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRef {
    pub element_type: ElementType,
    /// Free-form JSON addressing the element, e.g.
    /// `{"table_name": "orders", "column_name": "id"}`.
    pub spec: serde_json::Value,
}

impl ElementRef {
    pub fn new(element_type: ElementType, spec: serde_json::Value) -> Self {
        Self { element_type, spec }
    }
}

/// Registry entry of a user table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table_name: String,
    pub source_id: SourceId,
    pub description: Option<String>,
    /// Identifier in the original source, such as a sheet name.
    pub original_identifier: Option<String>,
    pub row_count: Option<i64>,
}

/// Registry entry of one column of a user table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub table_name: String,
    pub column_name: String,
    pub description: Option<String>,
    pub original_column_name: Option<String>,
}

/// Optional attributes of a table registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    pub description: Option<String>,
    pub original_identifier: Option<String>,
    pub policy: ConflictPolicy,
}

impl TableOptions {
    pub fn with_policy(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }
}

/// A named JSON value stored in a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub name: String,
    pub source_id: SourceId,
    pub data: serde_json::Value,
    pub description: Option<String>,
    pub schema_hint: Option<serde_json::Value>,
}

/// A named binary blob stored in a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub name: String,
    pub source_id: SourceId,
    pub media_type: MediaType,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub data: Vec<u8>,
    pub description: Option<String>,
    /// Original encoding such as `png` or `mp3`.
    pub original_format: Option<String>,
    pub technical_metadata: Option<serde_json::Value>,
}

/// A directed relationship between two addressable elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticLink {
    pub id: i64,
    pub link_type: String,
    pub description: Option<String>,
    pub from: ElementRef,
    pub to: ElementRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_type_roundtrips_standard_tags() {
        for tag in ["TEXT", "INTEGER", "REAL", "BLOB", "NUMERIC", "DATE", "DATETIME"] {
            let parsed = SqlType::parse(tag);
            assert!(parsed.is_standard(), "{tag} should be standard");
            assert_eq!(parsed.to_string(), tag);
        }
    }

    #[test]
    fn test_sql_type_keeps_custom_spelling() {
        let parsed = SqlType::parse(" varchar(10) ");
        assert_eq!(parsed, SqlType::Other("varchar(10)".into()));
        assert_eq!(parsed.as_sql(), "varchar(10)");
    }

    #[test]
    fn test_referential_action_parsing() {
        assert_eq!(
            "set null".parse::<ReferentialAction>().unwrap(),
            ReferentialAction::SetNull
        );
        assert_eq!(
            "NO_ACTION".parse::<ReferentialAction>().unwrap(),
            ReferentialAction::NoAction
        );
        assert!("explode".parse::<ReferentialAction>().is_err());
    }

    #[test]
    fn test_element_type_tags() {
        assert_eq!(ElementType::JsonPath.as_str(), "json_path");
        assert_eq!("json_path".parse::<ElementType>().unwrap(), ElementType::JsonPath);
        assert!("row".parse::<ElementType>().is_err());
    }

    #[test]
    fn test_default_value_literals() {
        assert_eq!(DefaultValue::Null.to_sql_literal(), "NULL");
        assert_eq!(DefaultValue::Real(1.5).to_sql_literal(), "1.5");
        assert_eq!(DefaultValue::Real(2.0).to_sql_literal(), "2.0");
        assert_eq!(DefaultValue::Text("a'b".into()).to_sql_literal(), "'a''b'");

        assert_eq!(DefaultValue::from_sql_literal("NULL"), DefaultValue::Null);
        assert_eq!(DefaultValue::from_sql_literal("2.0"), DefaultValue::Real(2.0));
        assert_eq!(
            DefaultValue::from_sql_literal("'a''b'"),
            DefaultValue::Text("a'b".into())
        );
        assert_eq!(
            DefaultValue::from_sql_literal("CURRENT_TIMESTAMP"),
            DefaultValue::Text("CURRENT_TIMESTAMP".into())
        );
    }

    #[test]
    fn test_media_type_serde() {
        let json = serde_json::to_string(&MediaType::Image).unwrap();
        assert_eq!(json, "\"image\"");
        assert_eq!("AUDIO".parse::<MediaType>().unwrap(), MediaType::Audio);
    }
}
