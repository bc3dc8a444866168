//! Merging several containers into one.
//!
//! Every input is opened read-only and replayed into a fresh output
//! container. Sources get new ids; tables, objects, and media keep their
//! names unless the output already holds that name, in which case they
//! receive a `_N` suffix. Table names are settled before any table is
//! created so foreign keys and semantic links can follow renames.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use sdif_core::{
    ColumnSpec, ConflictPolicy, DefaultValue, ElementRef, ElementType, FORMAT_VERSION,
    ForeignKeyRef, NameAllocator, SourceId, SqlType, TableOptions, TableSchema,
};
use tracing::{debug, info, warn};

use crate::container::{Container, OpenOptions};
use crate::error::{ContainerError, EntityKind, Result};

/// An entity stored under a different name in the merged container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedEntity {
    /// Position of the input in the list passed to [`merge_containers`].
    pub input: usize,
    pub kind: EntityKind,
    pub from: String,
    pub to: String,
}

/// Outcome of [`merge_containers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub output: PathBuf,
    pub inputs: usize,
    pub renamed: Vec<RenamedEntity>,
}

/// Per-input translation of ids and names.
#[derive(Debug, Default)]
struct InputMapping {
    sources: HashMap<i64, SourceId>,
    tables: HashMap<String, String>,
    objects: HashMap<String, String>,
    media: HashMap<String, String>,
}

impl InputMapping {
    fn source(&self, old: SourceId) -> Result<SourceId> {
        self.sources
            .get(&old.0)
            .copied()
            .ok_or_else(|| ContainerError::not_found(EntityKind::Source, old))
    }
}

/// Combines `inputs` into a new container at `output`.
///
/// A single input is copied as-is. An existing file at `output` is
/// replaced.
///
/// # Errors
///
/// - [`ContainerError::InvalidSpec`] for an empty input list, an output
///   path that is a directory or one of the inputs, or an input whose
///   format version is not the supported one
/// - [`ContainerError::NotFound`] for a missing input
pub fn merge_containers<P: AsRef<Path>>(inputs: &[P], output: impl AsRef<Path>) -> Result<MergeReport> {
    let output = output.as_ref();
    if inputs.is_empty() {
        return Err(ContainerError::InvalidSpec("no containers to merge".to_string()));
    }
    if output.is_dir() {
        return Err(ContainerError::InvalidSpec(format!(
            "output '{}' is a directory",
            output.display()
        )));
    }

    let mut readers = Vec::with_capacity(inputs.len());
    for input in inputs {
        let reader = Container::open_read_only(input)?;
        let version = reader.properties()?.map(|p| p.format_version);
        if version.as_deref() != Some(FORMAT_VERSION) {
            return Err(ContainerError::InvalidSpec(format!(
                "'{}' has unsupported format version {:?}, expected {FORMAT_VERSION}",
                input.as_ref().display(),
                version
            )));
        }
        readers.push(reader);
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    if inputs.len() == 1 {
        let input = inputs[0].as_ref();
        if !same_file(input, output) {
            std::fs::copy(input, output)?;
        }
        info!(output = %output.display(), "Copied single container");
        return Ok(MergeReport {
            output: output.to_path_buf(),
            inputs: 1,
            renamed: Vec::new(),
        });
    }

    if inputs.iter().any(|input| same_file(input.as_ref(), output)) {
        return Err(ContainerError::InvalidSpec(format!(
            "output '{}' is also an input",
            output.display()
        )));
    }

    let mut target = Container::open(
        output,
        OpenOptions {
            read_only: false,
            overwrite: true,
        },
    )?;
    let mut renamed = Vec::new();
    for (index, reader) in readers.iter().enumerate() {
        info!(input = index, total = inputs.len(), "Merging container");
        merge_one(reader, &mut target, index, &mut renamed)?;
    }
    target.close()?;

    info!(output = %output.display(), inputs = inputs.len(), renamed = renamed.len(), "Merged containers");
    Ok(MergeReport {
        output: output.to_path_buf(),
        inputs: inputs.len(),
        renamed,
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn merge_one(
    reader: &Container,
    target: &mut Container,
    index: usize,
    renamed: &mut Vec<RenamedEntity>,
) -> Result<()> {
    let mut mapping = InputMapping::default();

    for source in reader.list_sources()? {
        let new_id = target.add_source(
            &source.file_name,
            &source.file_type,
            source.description.as_deref(),
        )?;
        mapping.sources.insert(source.id.0, new_id);
    }

    let schema = reader.schema()?;
    let mut names = NameAllocator::with_taken(target.list_tables()?);
    for name in schema.tables.keys() {
        let new_name = names.allocate(name);
        record_rename(renamed, index, EntityKind::Table, name, &new_name);
        mapping.tables.insert(name.clone(), new_name);
    }

    for name in creation_order(&schema.tables) {
        let table = &schema.tables[name];
        let Some(metadata) = &table.metadata else {
            warn!(table = name, "Skipping table without metadata");
            continue;
        };
        let new_name = &mapping.tables[name];
        let options = TableOptions {
            description: metadata.description.clone(),
            original_identifier: metadata.original_identifier.clone(),
            policy: ConflictPolicy::Fail,
        };
        let specs = column_specs(table, &mapping.tables);
        target.create_table(new_name, &specs, mapping.source(metadata.source_id)?, &options)?;

        let data = reader.read_table(name)?;
        target.insert_rows(new_name, &data.columns, &data.rows)?;
        debug!(table = name, target = %new_name, rows = data.rows.len(), "Copied table");
    }

    let mut names = NameAllocator::with_taken(target.list_objects()?);
    for name in reader.list_objects()? {
        let mut object = reader.get_object(&name)?;
        object.name = names.allocate(&name);
        object.source_id = mapping.source(object.source_id)?;
        target.add_object(&object)?;
        record_rename(renamed, index, EntityKind::Object, &name, &object.name);
        mapping.objects.insert(name, object.name);
    }

    let mut names = NameAllocator::with_taken(target.list_media()?);
    for name in reader.list_media()? {
        let mut media = reader.get_media(&name)?;
        media.name = names.allocate(&name);
        media.source_id = mapping.source(media.source_id)?;
        target.add_media(&media)?;
        record_rename(renamed, index, EntityKind::Media, &name, &media.name);
        mapping.media.insert(name, media.name);
    }

    for link in reader.list_semantic_links()? {
        let from = remap_element(&link.from, &mapping);
        let to = remap_element(&link.to, &mapping);
        target.add_semantic_link(&link.link_type, &from, &to, link.description.as_deref())?;
    }
    Ok(())
}

fn record_rename(renamed: &mut Vec<RenamedEntity>, input: usize, kind: EntityKind, from: &str, to: &str) {
    if from != to {
        debug!(input, %kind, from, to, "Renamed during merge");
        renamed.push(RenamedEntity {
            input,
            kind,
            from: from.to_string(),
            to: to.to_string(),
        });
    }
}

/// Orders tables so that referenced tables come before their referrers.
/// Cycles are appended in name order.
fn creation_order(tables: &BTreeMap<String, TableSchema>) -> Vec<&str> {
    let mut ordered: Vec<&str> = Vec::with_capacity(tables.len());
    let mut pending: Vec<&str> = tables.keys().map(String::as_str).collect();
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|name| {
            let ready = tables[*name].foreign_keys.iter().all(|fk| {
                fk.target_table == *name
                    || !tables.contains_key(&fk.target_table)
                    || ordered.contains(&fk.target_table.as_str())
            });
            if ready {
                ordered.push(*name);
            }
            !ready
        });
        if pending.len() == before {
            ordered.append(&mut pending);
        }
    }
    ordered
}

/// Rebuilds column specs from an extracted table, pointing foreign keys at
/// renamed targets.
fn column_specs(table: &TableSchema, table_names: &HashMap<String, String>) -> Vec<ColumnSpec> {
    let mut specs: Vec<ColumnSpec> = table
        .columns
        .iter()
        .map(|column| {
            let mut spec = ColumnSpec::new(column.name.clone(), SqlType::parse(&column.sql_type));
            spec.not_null = column.not_null;
            spec.primary_key = column.primary_key_position > 0;
            spec.default_value = column.default_value.as_deref().map(DefaultValue::from_sql_literal);
            spec.description = column.description.clone();
            spec.original_name = column.original_column_name.clone();
            spec
        })
        .collect();

    for fk in &table.foreign_keys {
        let ([from], [to]) = (fk.from_columns.as_slice(), fk.target_columns.as_slice()) else {
            warn!(
                columns = ?fk.from_columns,
                target = %fk.target_table,
                "Composite foreign key not carried over"
            );
            continue;
        };
        if let Some(spec) = specs.iter_mut().find(|s| &s.name == from) {
            spec.foreign_key = Some(ForeignKeyRef {
                table: table_names
                    .get(&fk.target_table)
                    .cloned()
                    .unwrap_or_else(|| fk.target_table.clone()),
                column: to.clone(),
                on_update: fk.on_update.parse().ok(),
                on_delete: fk.on_delete.parse().ok(),
            });
        }
    }
    specs
}

/// Rewrites the names and source id inside an element spec.
fn remap_element(element: &ElementRef, mapping: &InputMapping) -> ElementRef {
    let mut spec = element.spec.clone();
    if let Some(fields) = spec.as_object_mut() {
        if let Some(old) = fields.get("source_id").and_then(|v| v.as_i64()) {
            if let Some(new_id) = mapping.sources.get(&old) {
                fields.insert("source_id".to_string(), new_id.0.into());
            }
        }
        let (key, names) = match element.element_type {
            ElementType::Table | ElementType::Column => ("table_name", &mapping.tables),
            ElementType::Object | ElementType::JsonPath => ("object_name", &mapping.objects),
            ElementType::Media => ("media_name", &mapping.media),
            ElementType::Source => return ElementRef::new(element.element_type, spec),
        };
        let renamed = fields
            .get(key)
            .and_then(|v| v.as_str())
            .and_then(|old| names.get(old))
            .cloned();
        if let Some(new_name) = renamed {
            fields.insert(key.to_string(), new_name.into());
        }
    }
    ElementRef::new(element.element_type, spec)
}
