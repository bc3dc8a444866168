//! Projection of a [`ContainerSchema`] onto the parts a configuration
//! enforces.
//!
//! Fields a configuration switches off become `None`, so two projections
//! can be compared with plain equality. JSON payloads are rendered with
//! sorted keys so that key order in storage never produces a difference.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use super::config::{
    ComparisonConfig, LinksMode, MediaMode, ObjectsMode, TechnicalMetadataMode,
};
use crate::schema::{ColumnSchema, ContainerSchema, ForeignKeySchema, TableSchema};

/// Comparable projection of a whole container schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalSchema {
    /// `None` when the format version is not enforced.
    pub format_version: Option<Option<String>>,
    /// Tables ordered by name.
    pub tables: Vec<TableShape>,
    /// `None` when objects are ignored.
    pub objects: Option<BTreeMap<String, ObjectShape>>,
    /// `None` when media is ignored.
    pub media: Option<BTreeMap<String, MediaShape>>,
    pub semantic_links: LinksShape,
}

/// Comparable projection of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableShape {
    /// Always kept for reporting, even when names are not enforced.
    pub name: String,
    pub columns: Vec<ColumnShape>,
    pub primary_key: Option<Vec<String>>,
    pub foreign_keys: Option<Vec<ForeignKeyShape>>,
}

impl TableShape {
    /// Structural equality, ignoring the table name.
    pub fn same_structure(&self, other: &TableShape) -> bool {
        self.columns == other.columns
            && self.primary_key == other.primary_key
            && self.foreign_keys == other.foreign_keys
    }

    /// Rough overlap score used to pair tables that differ.
    pub fn similarity(&self, other: &TableShape) -> usize {
        let mut remaining: Vec<&ColumnShape> = other.columns.iter().collect();
        let mut score = 0;
        for column in &self.columns {
            if let Some(pos) = remaining.iter().position(|c| *c == column) {
                remaining.swap_remove(pos);
                score += 1;
            }
        }
        if self.primary_key.is_some() && self.primary_key == other.primary_key {
            score += 1;
        }
        if self.foreign_keys.is_some() && self.foreign_keys == other.foreign_keys {
            score += 1;
        }
        score
    }
}

/// Comparable projection of one column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ColumnShape {
    pub name: Option<String>,
    pub sql_type: Option<String>,
    pub not_null: Option<bool>,
    pub default_value: Option<Option<String>>,
}

impl fmt::Display for ColumnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            parts.push(name.clone());
        }
        if let Some(sql_type) = &self.sql_type {
            parts.push(sql_type.clone());
        }
        if self.not_null == Some(true) {
            parts.push("NOT NULL".to_string());
        }
        if let Some(Some(default)) = &self.default_value {
            parts.push(format!("DEFAULT {default}"));
        }
        if parts.is_empty() {
            parts.push("<column>".to_string());
        }
        f.write_str(&parts.join(" "))
    }
}

/// Comparable projection of one foreign key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ForeignKeyShape {
    pub from_columns: Vec<String>,
    pub target_table: String,
    pub target_columns: Vec<String>,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
}

impl fmt::Display for ForeignKeyShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) -> {}({})",
            self.from_columns.join(", "),
            self.target_table,
            self.target_columns.join(", ")
        )?;
        if let Some(action) = &self.on_update {
            write!(f, " ON UPDATE {action}")?;
        }
        if let Some(action) = &self.on_delete {
            write!(f, " ON DELETE {action}")?;
        }
        Ok(())
    }
}

/// Comparable projection of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectShape {
    /// `None` when hints are not compared; `Some(None)` when there is no hint.
    pub schema_hint: Option<Option<String>>,
}

/// Comparable projection of one media entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaShape {
    pub media_type: Option<String>,
    pub original_format: Option<Option<String>>,
    pub technical_metadata: Option<Option<String>>,
}

/// Comparable projection of the semantic links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinksShape {
    Ignored,
    Types(BTreeSet<String>),
    /// Sorted, so link insertion order never matters.
    Full(Vec<LinkShape>),
}

/// A semantic link without its id and description.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LinkShape {
    pub link_type: String,
    pub from_type: String,
    pub from_spec: String,
    pub to_type: String,
    pub to_spec: String,
}

impl fmt::Display for LinkShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} -> {} {}",
            self.link_type, self.from_type, self.from_spec, self.to_type, self.to_spec
        )
    }
}

/// Renders JSON with object keys sorted at every level.
pub fn canonical_json(value: &serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| {
                    let key = Value::String(k.clone()).to_string();
                    format!("{key}:{}", canonical_json(v))
                })
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

/// Builds the projection of `schema` under `config`.
pub fn canonicalize(schema: &ContainerSchema, config: &ComparisonConfig) -> CanonicalSchema {
    let format_version = config
        .enforce_format_version
        .then(|| schema.format_version().map(str::to_string));

    let tables = schema
        .tables
        .iter()
        .map(|(name, table)| table_shape(name, table, config))
        .collect();

    let objects = (config.objects != ObjectsMode::Ignore).then(|| {
        schema
            .objects
            .iter()
            .map(|(name, object)| {
                let schema_hint = (config.objects == ObjectsMode::NamesAndSchemaHint)
                    .then(|| object.schema_hint.as_ref().map(canonical_json));
                (name.clone(), ObjectShape { schema_hint })
            })
            .collect()
    });

    let media = (config.media != MediaMode::Ignore).then(|| {
        schema
            .media
            .iter()
            .map(|(name, media)| {
                let media_type = matches!(
                    config.media,
                    MediaMode::NamesAndType | MediaMode::NamesTypeAndOriginalFormat
                )
                .then(|| media.media_type.to_string());
                let original_format = (config.media == MediaMode::NamesTypeAndOriginalFormat)
                    .then(|| media.original_format.clone());
                let technical_metadata = (config.media_technical_metadata
                    == TechnicalMetadataMode::ContentComparison)
                    .then(|| media.technical_metadata.as_ref().map(canonical_json));
                (
                    name.clone(),
                    MediaShape {
                        media_type,
                        original_format,
                        technical_metadata,
                    },
                )
            })
            .collect()
    });

    let semantic_links = match config.semantic_links {
        LinksMode::Ignore => LinksShape::Ignored,
        LinksMode::LinkTypesOnly => LinksShape::Types(
            schema
                .semantic_links
                .iter()
                .map(|l| l.link_type.clone())
                .collect(),
        ),
        LinksMode::FullStructure => {
            let mut links: Vec<LinkShape> = schema
                .semantic_links
                .iter()
                .map(|l| LinkShape {
                    link_type: l.link_type.clone(),
                    from_type: l.from.element_type.to_string(),
                    from_spec: canonical_json(&l.from.spec),
                    to_type: l.to.element_type.to_string(),
                    to_spec: canonical_json(&l.to.spec),
                })
                .collect();
            links.sort();
            LinksShape::Full(links)
        }
    };

    CanonicalSchema {
        format_version,
        tables,
        objects,
        media,
        semantic_links,
    }
}

fn table_shape(name: &str, table: &TableSchema, config: &ComparisonConfig) -> TableShape {
    let mut columns: Vec<ColumnShape> = table
        .columns
        .iter()
        .map(|c| column_shape(c, config))
        .collect();
    if !config.enforce_column_order {
        columns.sort();
    }

    let primary_key = config.enforce_primary_keys.then(|| table.primary_key());

    let foreign_keys = config.enforce_foreign_keys.then(|| {
        let mut keys: Vec<ForeignKeyShape> = table
            .foreign_keys
            .iter()
            .map(|fk| foreign_key_shape(fk, config))
            .collect();
        keys.sort();
        keys
    });

    TableShape {
        name: name.to_string(),
        columns,
        primary_key,
        foreign_keys,
    }
}

fn column_shape(column: &ColumnSchema, config: &ComparisonConfig) -> ColumnShape {
    ColumnShape {
        name: config.enforce_column_names.then(|| column.name.clone()),
        sql_type: config
            .enforce_column_types
            .then(|| column.sql_type.trim().to_ascii_uppercase()),
        not_null: config.enforce_column_not_null.then_some(column.not_null),
        default_value: config
            .enforce_column_defaults
            .then(|| column.default_value.clone()),
    }
}

fn foreign_key_shape(fk: &ForeignKeySchema, config: &ComparisonConfig) -> ForeignKeyShape {
    let actions = config.enforce_foreign_key_actions;
    ForeignKeyShape {
        from_columns: fk.from_columns.clone(),
        target_table: fk.target_table.clone(),
        target_columns: fk.target_columns.clone(),
        on_update: actions.then(|| fk.on_update.to_ascii_uppercase()),
        on_delete: actions.then(|| fk.on_delete.to_ascii_uppercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let a = json!({"b": 1, "a": {"d": [1, 2], "c": null}});
        assert_eq!(canonical_json(&a), r#"{"a":{"c":null,"d":[1,2]},"b":1}"#);
    }

    #[test]
    fn test_column_display() {
        let column = ColumnShape {
            name: Some("qty".into()),
            sql_type: Some("INTEGER".into()),
            not_null: Some(true),
            default_value: Some(Some("0".into())),
        };
        assert_eq!(column.to_string(), "qty INTEGER NOT NULL DEFAULT 0");
    }

    #[test]
    fn test_similarity_counts_shared_columns() {
        let col = |n: &str| ColumnShape {
            name: None,
            sql_type: Some(n.into()),
            not_null: None,
            default_value: None,
        };
        let a = TableShape {
            name: "a".into(),
            columns: vec![col("INTEGER"), col("TEXT"), col("TEXT")],
            primary_key: None,
            foreign_keys: None,
        };
        let b = TableShape {
            name: "b".into(),
            columns: vec![col("TEXT"), col("REAL")],
            primary_key: None,
            foreign_keys: None,
        };
        assert_eq!(a.similarity(&b), 1);
        assert!(!a.same_structure(&b));
    }
}
