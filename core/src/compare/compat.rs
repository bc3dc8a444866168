//! One-directional compatibility between a consumer and a producer schema.
//!
//! Every requirement the consumer projection carries must be met by the
//! producer, which may offer more. Each category stops at its first unmet
//! requirement, but all categories are always evaluated so the report names
//! every failing area.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use super::canonical::{
    CanonicalSchema, ColumnShape, LinksShape, MediaShape, ObjectShape, TableShape,
};
use super::config::ComparisonConfig;

/// Area of the schema a requirement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementCategory {
    FormatVersion,
    Tables,
    Objects,
    Media,
    SemanticLinks,
}

/// First unmet requirement of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmetRequirement {
    pub category: RequirementCategory,
    pub detail: String,
}

/// Outcome of a compatibility check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompatibilityReport {
    pub unmet: Vec<UnmetRequirement>,
}

impl CompatibilityReport {
    pub fn is_compatible(&self) -> bool {
        self.unmet.is_empty()
    }
}

type Check = std::result::Result<(), String>;

pub(crate) fn check(
    consumer: &CanonicalSchema,
    producer: &CanonicalSchema,
    config: &ComparisonConfig,
) -> CompatibilityReport {
    let checks = [
        (
            RequirementCategory::FormatVersion,
            check_version(consumer, producer),
        ),
        (
            RequirementCategory::Tables,
            check_tables(&consumer.tables, &producer.tables, config),
        ),
        (
            RequirementCategory::Objects,
            check_objects(consumer.objects.as_ref(), producer.objects.as_ref()),
        ),
        (
            RequirementCategory::Media,
            check_media(consumer.media.as_ref(), producer.media.as_ref()),
        ),
        (
            RequirementCategory::SemanticLinks,
            check_links(&consumer.semantic_links, &producer.semantic_links),
        ),
    ];

    let mut report = CompatibilityReport::default();
    for (category, outcome) in checks {
        if let Err(detail) = outcome {
            debug!(?category, %detail, "Compatibility requirement not met");
            report.unmet.push(UnmetRequirement { category, detail });
        }
    }
    report
}

fn check_version(consumer: &CanonicalSchema, producer: &CanonicalSchema) -> Check {
    match (&consumer.format_version, &producer.format_version) {
        (Some(c), Some(p)) if c != p => Err(format!(
            "format version {} required, producer declares {}",
            c.as_deref().unwrap_or("<none>"),
            p.as_deref().unwrap_or("<none>")
        )),
        _ => Ok(()),
    }
}

fn check_tables(consumer: &[TableShape], producer: &[TableShape], config: &ComparisonConfig) -> Check {
    if config.enforce_table_names {
        for required in consumer {
            let offered = producer
                .iter()
                .find(|p| p.name == required.name)
                .ok_or_else(|| format!("table '{}' is missing", required.name))?;
            table_satisfied(required, offered, config)
                .map_err(|detail| format!("table '{}': {detail}", required.name))?;
        }
        return Ok(());
    }

    assign(consumer.len(), producer.len(), |i, j| {
        table_satisfied(&consumer[i], &producer[j], config).is_ok()
    })
    .map_err(|i| format!("no producer table satisfies '{}'", consumer[i].name))
}

/// Assigns every required item a distinct offered item it fits, using
/// augmenting paths so an early claim never blocks a later item that has
/// no other candidate. Returns the index of the first required item left
/// without a partner.
fn assign(
    required: usize,
    offered: usize,
    fits: impl Fn(usize, usize) -> bool,
) -> std::result::Result<(), usize> {
    let candidates: Vec<Vec<usize>> = (0..required)
        .map(|i| (0..offered).filter(|&j| fits(i, j)).collect())
        .collect();
    let mut owner: Vec<Option<usize>> = vec![None; offered];
    for i in 0..required {
        let mut visited = vec![false; offered];
        if !augment(i, &candidates, &mut owner, &mut visited) {
            return Err(i);
        }
    }
    Ok(())
}

fn augment(
    i: usize,
    candidates: &[Vec<usize>],
    owner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &j in &candidates[i] {
        if visited[j] {
            continue;
        }
        visited[j] = true;
        let free = match owner[j] {
            None => true,
            Some(k) => augment(k, candidates, owner, visited),
        };
        if free {
            owner[j] = Some(i);
            return true;
        }
    }
    false
}

fn table_satisfied(required: &TableShape, offered: &TableShape, config: &ComparisonConfig) -> Check {
    if config.enforce_column_names {
        let mut last_position: Option<usize> = None;
        for column in &required.columns {
            let name = column.name.as_deref().unwrap_or_default();
            let (position, candidate) = offered
                .columns
                .iter()
                .enumerate()
                .find(|(_, c)| c.name == column.name)
                .ok_or_else(|| format!("column '{name}' is missing"))?;
            column_satisfied(column, candidate).map_err(|d| format!("column '{name}': {d}"))?;
            if config.enforce_column_order {
                if last_position.is_some_and(|prev| position <= prev) {
                    return Err(format!("column '{name}' is out of order"));
                }
                last_position = Some(position);
            }
        }
    } else if config.enforce_column_order {
        if offered.columns.len() < required.columns.len() {
            return Err(format!(
                "{} columns required, {} offered",
                required.columns.len(),
                offered.columns.len()
            ));
        }
        for (i, (column, candidate)) in required.columns.iter().zip(&offered.columns).enumerate() {
            column_satisfied(column, candidate).map_err(|d| format!("column {i}: {d}"))?;
        }
    } else {
        assign(required.columns.len(), offered.columns.len(), |i, j| {
            column_satisfied(&required.columns[i], &offered.columns[j]).is_ok()
        })
        .map_err(|i| format!("no column satisfies {}", required.columns[i]))?;
    }

    if let (Some(required_key), Some(offered_key)) = (&required.primary_key, &offered.primary_key) {
        if !required_key.is_empty() && required_key != offered_key {
            return Err(format!(
                "primary key ({}) required, producer has ({})",
                required_key.join(", "),
                offered_key.join(", ")
            ));
        }
    }

    if let (Some(required_fks), Some(offered_fks)) =
        (&required.foreign_keys, &offered.foreign_keys)
    {
        let mut claimed = vec![false; offered_fks.len()];
        for fk in required_fks {
            let found = (0..offered_fks.len())
                .find(|&j| !claimed[j] && offered_fks[j] == *fk)
                .ok_or_else(|| format!("foreign key {fk} is missing"))?;
            claimed[found] = true;
        }
    }
    Ok(())
}

/// A producer column satisfies a consumer column when every compared
/// attribute matches, except that a NOT NULL producer may stand in for a
/// nullable consumer.
fn column_satisfied(required: &ColumnShape, offered: &ColumnShape) -> Check {
    if required.sql_type != offered.sql_type {
        return Err(format!(
            "type {} required, {} offered",
            required.sql_type.as_deref().unwrap_or("<none>"),
            offered.sql_type.as_deref().unwrap_or("<none>")
        ));
    }
    if required.not_null == Some(true) && offered.not_null != Some(true) {
        return Err("NOT NULL required".to_string());
    }
    if required.default_value != offered.default_value {
        return Err("default value differs".to_string());
    }
    Ok(())
}

fn check_objects(
    consumer: Option<&BTreeMap<String, ObjectShape>>,
    producer: Option<&BTreeMap<String, ObjectShape>>,
) -> Check {
    let (Some(consumer), Some(producer)) = (consumer, producer) else {
        return Ok(());
    };
    for (name, required) in consumer {
        let offered = producer
            .get(name)
            .ok_or_else(|| format!("object '{name}' is missing"))?;
        if let Some(Some(hint)) = &required.schema_hint {
            if offered.schema_hint.as_ref().and_then(|h| h.as_ref()) != Some(hint) {
                return Err(format!("object '{name}' has a different schema hint"));
            }
        }
    }
    Ok(())
}

fn check_media(
    consumer: Option<&BTreeMap<String, MediaShape>>,
    producer: Option<&BTreeMap<String, MediaShape>>,
) -> Check {
    let (Some(consumer), Some(producer)) = (consumer, producer) else {
        return Ok(());
    };
    for (name, required) in consumer {
        let offered = producer
            .get(name)
            .ok_or_else(|| format!("media '{name}' is missing"))?;
        if required.media_type.is_some() && required.media_type != offered.media_type {
            return Err(format!("media '{name}' has a different type"));
        }
        if let Some(Some(format)) = &required.original_format {
            if offered.original_format.as_ref().and_then(|f| f.as_ref()) != Some(format) {
                return Err(format!("media '{name}' has a different original format"));
            }
        }
        if let Some(Some(metadata)) = &required.technical_metadata {
            if offered.technical_metadata.as_ref().and_then(|m| m.as_ref()) != Some(metadata) {
                return Err(format!("media '{name}' has different technical metadata"));
            }
        }
    }
    Ok(())
}

fn check_links(consumer: &LinksShape, producer: &LinksShape) -> Check {
    match (consumer, producer) {
        (LinksShape::Types(required), LinksShape::Types(offered)) => {
            match required.difference(offered).next() {
                Some(missing) => Err(format!("semantic link type '{missing}' is missing")),
                None => Ok(()),
            }
        }
        (LinksShape::Full(required), LinksShape::Full(offered)) => {
            let mut claimed = vec![false; offered.len()];
            for link in required {
                let found = (0..offered.len())
                    .find(|&j| !claimed[j] && offered[j] == *link)
                    .ok_or_else(|| format!("semantic link {link} is missing"))?;
                claimed[found] = true;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
