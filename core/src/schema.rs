//! Storage-independent description of a container's structure.
//!
//! A [`ContainerSchema`] is produced by the extractor in `sdif-sqlite` and is
//! the only input the [`SchemaComparator`](crate::SchemaComparator) accepts.
//! It holds shapes, not data: table rows, object payloads, and media bytes
//! are left out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{MediaType, Properties, SemanticLink, Source, SourceId, TableMetadata};

/// Full structural description of one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContainerSchema {
    pub properties: Option<Properties>,
    pub sources: Vec<Source>,
    pub tables: BTreeMap<String, TableSchema>,
    pub objects: BTreeMap<String, ObjectSchema>,
    pub media: BTreeMap<String, MediaSchema>,
    pub semantic_links: Vec<SemanticLink>,
}

impl ContainerSchema {
    /// Declared format version, if the properties record exists.
    pub fn format_version(&self) -> Option<&str> {
        self.properties.as_ref().map(|p| p.format_version.as_str())
    }
}

/// Structure of one user table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Registry entry; `None` for a physical table that was never registered.
    pub metadata: Option<TableMetadata>,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSchema>,
    pub foreign_keys: Vec<ForeignKeySchema>,
}

impl TableSchema {
    /// Primary-key column names in key order.
    pub fn primary_key(&self) -> Vec<String> {
        let mut keyed: Vec<&ColumnSchema> =
            self.columns.iter().filter(|c| c.primary_key_position > 0).collect();
        keyed.sort_by_key(|c| c.primary_key_position);
        keyed.into_iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Structure of one column as reported by storage, merged with its registry
/// annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Declared type exactly as stored.
    pub sql_type: String,
    pub not_null: bool,
    /// Default expression as written in the DDL, e.g. `0` or `'n/a'`.
    pub default_value: Option<String>,
    /// 1-based position within the primary key, 0 when not part of it.
    pub primary_key_position: u32,
    pub description: Option<String>,
    pub original_column_name: Option<String>,
}

/// One (possibly composite) foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySchema {
    pub from_columns: Vec<String>,
    pub target_table: String,
    pub target_columns: Vec<String>,
    pub on_update: String,
    pub on_delete: String,
}

/// Structure of a stored object: everything but its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub source_id: SourceId,
    pub description: Option<String>,
    pub schema_hint: Option<serde_json::Value>,
}

/// Structure of a stored media blob: everything but its bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSchema {
    pub source_id: SourceId,
    pub media_type: MediaType,
    pub description: Option<String>,
    pub original_format: Option<String>,
    pub technical_metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, pk: u32) -> ColumnSchema {
        ColumnSchema {
            name: name.into(),
            sql_type: "INTEGER".into(),
            not_null: false,
            default_value: None,
            primary_key_position: pk,
            description: None,
            original_column_name: None,
        }
    }

    #[test]
    fn test_primary_key_follows_key_order() {
        let table = TableSchema {
            metadata: None,
            columns: vec![column("a", 2), column("b", 0), column("c", 1)],
            foreign_keys: vec![],
        };
        assert_eq!(table.primary_key(), vec!["c".to_string(), "a".to_string()]);
        assert!(table.column("b").is_some());
        assert!(table.column("z").is_none());
    }
}
