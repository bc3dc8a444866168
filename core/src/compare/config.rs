//! Rule configuration for the schema comparator.
//!
//! Every switch is independent. The defaults enforce everything, so two
//! schemas are equivalent only if they match in full, except for media
//! technical metadata which is ignored unless requested.
//!
//! # Example YAML
//!
//! ```yaml
//! enforce_table_names: false
//! enforce_column_order: false
//! objects: names_only
//! semantic_links: link_types_only
//! ```

use serde::{Deserialize, Serialize};

/// How objects take part in a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ObjectsMode {
    Ignore,
    NamesOnly,
    /// Names plus the parsed schema hint.
    #[default]
    NamesAndSchemaHint,
}

/// How media entries take part in a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaMode {
    Ignore,
    NamesOnly,
    NamesAndType,
    #[default]
    NamesTypeAndOriginalFormat,
}

/// Whether media technical metadata is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TechnicalMetadataMode {
    #[default]
    Ignore,
    ContentComparison,
}

/// How semantic links take part in a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinksMode {
    Ignore,
    /// Only the set of link types.
    LinkTypesOnly,
    /// Type plus both endpoints. Link ids and descriptions never count.
    #[default]
    FullStructure,
}

/// Switches controlling which parts of two schemas must agree.
///
/// Partial YAML or JSON documents deserialize onto the defaults.
///
/// # Examples
///
/// ```
/// use sdif_core::{ComparisonConfig, ObjectsMode};
///
/// let config: ComparisonConfig =
///     serde_json::from_str(r#"{"enforce_column_order": false, "objects": "names_only"}"#).unwrap();
/// assert!(!config.enforce_column_order);
/// assert!(config.enforce_table_names);
/// assert_eq!(config.objects, ObjectsMode::NamesOnly);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Require equal declared format versions.
    pub enforce_format_version: bool,
    /// Match tables by name; when off, tables are paired by structure.
    pub enforce_table_names: bool,
    /// Require columns in the same order.
    pub enforce_column_order: bool,
    /// Match columns by name; when off, columns are compared by position or
    /// as a multiset, depending on `enforce_column_order`.
    pub enforce_column_names: bool,
    pub enforce_column_types: bool,
    pub enforce_column_not_null: bool,
    pub enforce_column_defaults: bool,
    pub enforce_primary_keys: bool,
    pub enforce_foreign_keys: bool,
    /// Only meaningful while `enforce_foreign_keys` is on.
    pub enforce_foreign_key_actions: bool,
    pub objects: ObjectsMode,
    pub media: MediaMode,
    pub media_technical_metadata: TechnicalMetadataMode,
    pub semantic_links: LinksMode,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            enforce_format_version: true,
            enforce_table_names: true,
            enforce_column_order: true,
            enforce_column_names: true,
            enforce_column_types: true,
            enforce_column_not_null: true,
            enforce_column_defaults: true,
            enforce_primary_keys: true,
            enforce_foreign_keys: true,
            enforce_foreign_key_actions: true,
            objects: ObjectsMode::default(),
            media: MediaMode::default(),
            media_technical_metadata: TechnicalMetadataMode::default(),
            semantic_links: LinksMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enforce_everything() {
        let config = ComparisonConfig::default();
        assert!(config.enforce_format_version);
        assert!(config.enforce_foreign_key_actions);
        assert_eq!(config.media, MediaMode::NamesTypeAndOriginalFormat);
        assert_eq!(config.media_technical_metadata, TechnicalMetadataMode::Ignore);
        assert_eq!(config.semantic_links, LinksMode::FullStructure);
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let config: ComparisonConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ComparisonConfig::default());
    }

    #[test]
    fn test_mode_tags() {
        let config: ComparisonConfig = serde_json::from_str(
            r#"{"media": "names_and_type", "media_technical_metadata": "content_comparison", "semantic_links": "ignore"}"#,
        )
        .unwrap();
        assert_eq!(config.media, MediaMode::NamesAndType);
        assert_eq!(
            config.media_technical_metadata,
            TechnicalMetadataMode::ContentComparison
        );
        assert_eq!(config.semantic_links, LinksMode::Ignore);
    }
}
