//! Structural schema extraction.
//!
//! [`Container::schema`] reads the storage catalog and the system tables
//! into a [`ContainerSchema`]. Stored JSON is parsed strictly: a schema hint
//! or technical-metadata value that is not valid JSON fails the extraction
//! with [`ContainerError::MalformedMetadata`].

use std::collections::{BTreeMap, HashMap};

use rusqlite::{Connection, params};
use sdif_core::{
    ColumnMetadata, ColumnSchema, ContainerSchema, ForeignKeySchema, MediaSchema, ObjectSchema,
    SourceId, TableMetadata, TableSchema,
};
use tracing::debug;

use crate::container::Container;
use crate::convert::{
    TABLE_METADATA_COLUMNS, parse_optional_json, row_to_column_metadata, row_to_table_metadata,
};
use crate::error::{ContainerError, EntityKind, Result};
use crate::records::parse_media_type;

impl Container {
    /// Extracts the full structural description of the container.
    pub fn schema(&self) -> Result<ContainerSchema> {
        let conn = self.connection()?;

        let mut schema = ContainerSchema {
            properties: self.properties()?,
            sources: self.list_sources()?,
            semantic_links: self.list_semantic_links()?,
            ..ContainerSchema::default()
        };

        let metadata = table_metadata_by_name(conn)?;
        for name in user_table_names(conn)? {
            let table = extract_table(conn, &name, metadata.get(&name).cloned())?;
            schema.tables.insert(name, table);
        }
        schema.objects = extract_objects(conn)?;
        schema.media = extract_media(conn)?;

        debug!(
            tables = schema.tables.len(),
            objects = schema.objects.len(),
            media = schema.media.len(),
            links = schema.semantic_links.len(),
            "Extracted container schema"
        );
        Ok(schema)
    }

    /// Structure of a single table.
    pub fn table_schema(&self, name: &str) -> Result<TableSchema> {
        let conn = self.connection()?;
        if !user_table_names(conn)?.iter().any(|n| n == name) {
            return Err(ContainerError::not_found(EntityKind::Table, name));
        }
        let metadata = table_metadata_by_name(conn)?.remove(name);
        extract_table(conn, name, metadata)
    }
}

/// Physical tables outside the reserved namespace, sorted by name.
pub(crate) fn user_table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' \
         AND substr(name, 1, 5) != 'sdif_' AND substr(name, 1, 7) != 'sqlite_' \
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

fn table_metadata_by_name(conn: &Connection) -> Result<HashMap<String, TableMetadata>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TABLE_METADATA_COLUMNS} FROM sdif_tables_metadata"
    ))?;
    let rows = stmt
        .query_map([], row_to_table_metadata)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows
        .into_iter()
        .map(|m| (m.table_name.clone(), m))
        .collect())
}

fn extract_table(
    conn: &Connection,
    name: &str,
    metadata: Option<TableMetadata>,
) -> Result<TableSchema> {
    let annotations: HashMap<String, ColumnMetadata> = {
        let mut stmt = conn.prepare(
            "SELECT table_name, column_name, description, original_column_name \
             FROM sdif_columns_metadata WHERE table_name = ?1",
        )?;
        stmt.query_map(params![name], row_to_column_metadata)?
            .map(|r| r.map(|m| (m.column_name.clone(), m)))
            .collect::<std::result::Result<_, _>>()?
    };

    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let columns = stmt
        .query_map(params![name], |row| {
            Ok(ColumnSchema {
                name: row.get(0)?,
                sql_type: row.get(1)?,
                not_null: row.get(2)?,
                default_value: row.get(3)?,
                primary_key_position: row.get(4)?,
                description: None,
                original_column_name: None,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .map(|mut column| {
            if let Some(meta) = annotations.get(&column.name) {
                column.description = meta.description.clone();
                column.original_column_name = meta.original_column_name.clone();
            }
            column
        })
        .collect();

    Ok(TableSchema {
        metadata,
        columns,
        foreign_keys: extract_foreign_keys(conn, name)?,
    })
}

fn extract_foreign_keys(conn: &Connection, name: &str) -> Result<Vec<ForeignKeySchema>> {
    let mut stmt = conn.prepare(
        "SELECT id, seq, \"table\", \"from\", \"to\", on_update, on_delete \
         FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
    )?;
    let rows = stmt
        .query_map(params![name], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // Composite keys span several rows sharing an id.
    let mut grouped: BTreeMap<i64, ForeignKeySchema> = BTreeMap::new();
    for (id, target, from, to, on_update, on_delete) in rows {
        let fk = grouped.entry(id).or_insert_with(|| ForeignKeySchema {
            from_columns: Vec::new(),
            target_table: target,
            target_columns: Vec::new(),
            on_update,
            on_delete,
        });
        fk.from_columns.push(from);
        fk.target_columns.push(to.unwrap_or_default());
    }
    Ok(grouped.into_values().collect())
}

fn extract_objects(conn: &Connection) -> Result<BTreeMap<String, ObjectSchema>> {
    let mut stmt = conn.prepare(
        "SELECT object_name, source_id, description, schema_hint FROM sdif_objects",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(name, source_id, description, hint)| {
            let schema_hint = parse_optional_json(hint, format!("sdif_objects.{name}.schema_hint"))?;
            Ok((
                name,
                ObjectSchema {
                    source_id: SourceId(source_id),
                    description,
                    schema_hint,
                },
            ))
        })
        .collect()
}

fn extract_media(conn: &Connection) -> Result<BTreeMap<String, MediaSchema>> {
    let mut stmt = conn.prepare(
        "SELECT media_name, source_id, media_type, description, original_format, \
         technical_metadata FROM sdif_media",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(name, source_id, media_type, description, original_format, technical)| {
            let media = MediaSchema {
                source_id: SourceId(source_id),
                media_type: parse_media_type(&name, &media_type)?,
                description,
                original_format,
                technical_metadata: parse_optional_json(
                    technical,
                    format!("sdif_media.{name}.technical_metadata"),
                )?,
            };
            Ok((name, media))
        })
        .collect()
}
