//! Objects, media, and semantic links.

use rusqlite::{Connection, OptionalExtension, params};
use sdif_core::{ElementRef, ElementType, MediaRecord, MediaType, ObjectRecord, SemanticLink, SourceId};
use tracing::debug;

use crate::container::{Container, ensure_source_exists};
use crate::convert::{parse_json, parse_optional_json, to_json_text};
use crate::error::{ContainerError, EntityKind, Result};

impl Container {
    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    /// Stores a named JSON value.
    pub fn add_object(&mut self, object: &ObjectRecord) -> Result<()> {
        let conn = self.writable_connection("add object")?;
        check_record_name(&object.name)?;
        let tx = conn.transaction()?;
        ensure_source_exists(&tx, object.source_id)?;
        if record_exists(&tx, "sdif_objects", "object_name", &object.name)? {
            return Err(ContainerError::NameConflict {
                name: object.name.clone(),
                detail: "object already exists".to_string(),
            });
        }
        tx.execute(
            "INSERT INTO sdif_objects (object_name, source_id, json_data, description, schema_hint) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                object.name,
                object.source_id.0,
                to_json_text(&object.data),
                object.description,
                object.schema_hint.as_ref().map(to_json_text)
            ],
        )
        .map_err(|e| ContainerError::from_write(e, &format!("add object '{}'", object.name)))?;
        tx.commit()?;
        debug!(object = %object.name, source_id = %object.source_id, "Added object");
        Ok(())
    }

    /// Loads an object, parsing its payload and schema hint.
    pub fn get_object(&self, name: &str) -> Result<ObjectRecord> {
        let conn = self.connection()?;
        let raw = conn
            .query_row(
                "SELECT object_name, source_id, json_data, description, schema_hint \
                 FROM sdif_objects WHERE object_name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| ContainerError::not_found(EntityKind::Object, name))?;
        let (name, source_id, data, description, hint) = raw;
        Ok(ObjectRecord {
            data: parse_json(&data, format!("sdif_objects.{name}.json_data"))?,
            schema_hint: parse_optional_json(hint, format!("sdif_objects.{name}.schema_hint"))?,
            name,
            source_id: SourceId(source_id),
            description,
        })
    }

    /// Object names in sorted order.
    pub fn list_objects(&self) -> Result<Vec<String>> {
        list_names(self.connection()?, "SELECT object_name FROM sdif_objects ORDER BY object_name")
    }

    pub fn drop_object(&mut self, name: &str) -> Result<()> {
        let conn = self.writable_connection("drop object")?;
        let deleted = conn.execute("DELETE FROM sdif_objects WHERE object_name = ?1", params![name])?;
        if deleted == 0 {
            return Err(ContainerError::not_found(EntityKind::Object, name));
        }
        debug!(object = name, "Dropped object");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Media
    // -----------------------------------------------------------------------

    /// Stores a named binary blob.
    pub fn add_media(&mut self, media: &MediaRecord) -> Result<()> {
        let conn = self.writable_connection("add media")?;
        check_record_name(&media.name)?;
        let tx = conn.transaction()?;
        ensure_source_exists(&tx, media.source_id)?;
        if record_exists(&tx, "sdif_media", "media_name", &media.name)? {
            return Err(ContainerError::NameConflict {
                name: media.name.clone(),
                detail: "media already exists".to_string(),
            });
        }
        tx.execute(
            "INSERT INTO sdif_media (media_name, source_id, media_type, media_data, description, \
             original_format, technical_metadata) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                media.name,
                media.source_id.0,
                media.media_type.as_str(),
                media.data,
                media.description,
                media.original_format,
                media.technical_metadata.as_ref().map(to_json_text)
            ],
        )
        .map_err(|e| ContainerError::from_write(e, &format!("add media '{}'", media.name)))?;
        tx.commit()?;
        debug!(
            media = %media.name,
            bytes = media.data.len(),
            media_type = media.media_type.as_str(),
            "Added media"
        );
        Ok(())
    }

    /// Loads a media entry including its payload.
    pub fn get_media(&self, name: &str) -> Result<MediaRecord> {
        let conn = self.connection()?;
        let raw = conn
            .query_row(
                "SELECT media_name, source_id, media_type, media_data, description, \
                 original_format, technical_metadata FROM sdif_media WHERE media_name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| ContainerError::not_found(EntityKind::Media, name))?;
        let (name, source_id, media_type, data, description, original_format, technical) = raw;
        Ok(MediaRecord {
            media_type: parse_media_type(&name, &media_type)?,
            technical_metadata: parse_optional_json(
                technical,
                format!("sdif_media.{name}.technical_metadata"),
            )?,
            name,
            source_id: SourceId(source_id),
            data,
            description,
            original_format,
        })
    }

    /// Media names in sorted order.
    pub fn list_media(&self) -> Result<Vec<String>> {
        list_names(self.connection()?, "SELECT media_name FROM sdif_media ORDER BY media_name")
    }

    pub fn drop_media(&mut self, name: &str) -> Result<()> {
        let conn = self.writable_connection("drop media")?;
        let deleted = conn.execute("DELETE FROM sdif_media WHERE media_name = ?1", params![name])?;
        if deleted == 0 {
            return Err(ContainerError::not_found(EntityKind::Media, name));
        }
        debug!(media = name, "Dropped media");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Semantic links
    // -----------------------------------------------------------------------

    /// Records a typed relationship between two elements and returns its id.
    pub fn add_semantic_link(
        &mut self,
        link_type: &str,
        from: &ElementRef,
        to: &ElementRef,
        description: Option<&str>,
    ) -> Result<i64> {
        let conn = self.writable_connection("add semantic link")?;
        if link_type.trim().is_empty() {
            return Err(ContainerError::InvalidSpec("link type cannot be empty".to_string()));
        }
        conn.execute(
            "INSERT INTO sdif_semantic_links (link_type, description, from_element_type, \
             from_element_spec, to_element_type, to_element_spec) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                link_type,
                description,
                from.element_type.as_str(),
                to_json_text(&from.spec),
                to.element_type.as_str(),
                to_json_text(&to.spec)
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(link_id = id, link_type, "Added semantic link");
        Ok(id)
    }

    /// All semantic links ordered by id.
    pub fn list_semantic_links(&self) -> Result<Vec<SemanticLink>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT link_id, link_type, description, from_element_type, from_element_spec, \
             to_element_type, to_element_spec FROM sdif_semantic_links ORDER BY link_id",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(id, link_type, description, from_type, from_spec, to_type, to_spec)| {
                let location = format!("sdif_semantic_links.{id}");
                Ok(SemanticLink {
                    id,
                    link_type,
                    description,
                    from: element_ref(&from_type, &from_spec, &location)?,
                    to: element_ref(&to_type, &to_spec, &location)?,
                })
            })
            .collect()
    }

    pub fn drop_semantic_link(&mut self, id: i64) -> Result<()> {
        let conn = self.writable_connection("drop semantic link")?;
        let deleted = conn.execute("DELETE FROM sdif_semantic_links WHERE link_id = ?1", params![id])?;
        if deleted == 0 {
            return Err(ContainerError::not_found(EntityKind::SemanticLink, id));
        }
        Ok(())
    }
}

fn check_record_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ContainerError::InvalidName {
            name: name.to_string(),
            reason: "name cannot be empty".to_string(),
        });
    }
    Ok(())
}

fn record_exists(conn: &Connection, table: &str, key: &str, name: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {key} = ?1)"),
        params![name],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn list_names(conn: &Connection, sql: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

pub(crate) fn parse_media_type(name: &str, raw: &str) -> Result<MediaType> {
    raw.parse()
        .map_err(|e| ContainerError::malformed(format!("sdif_media.{name}.media_type"), e))
}

pub(crate) fn element_ref(raw_type: &str, raw_spec: &str, location: &str) -> Result<ElementRef> {
    let element_type: ElementType = raw_type
        .parse()
        .map_err(|e| ContainerError::malformed(location, e))?;
    let spec = parse_json(raw_spec, location)?;
    Ok(ElementRef::new(element_type, spec))
}
