//! SQL generation for system tables and user tables.
//!
//! # System tables
//!
//! Every container holds seven tables under the reserved `sdif_` prefix:
//!
//! - `sdif_properties`: single row with the format version and creation time
//! - `sdif_sources`: registered original inputs
//! - `sdif_tables_metadata`: one row per user table
//! - `sdif_columns_metadata`: one row per user column
//! - `sdif_objects`: named JSON values
//! - `sdif_media`: named binary blobs
//! - `sdif_semantic_links`: typed relationships between elements
//!
//! User tables are generated from [`ColumnSpec`] lists with every identifier
//! double-quoted.

use sdif_core::ColumnSpec;

/// Name of the table whose presence marks an initialized container.
pub(crate) const PROPERTIES_TABLE: &str = "sdif_properties";

/// Generates the DDL for all system tables.
pub(crate) fn system_schema_sql() -> String {
    r#"
CREATE TABLE IF NOT EXISTS sdif_properties (
    sdif_version TEXT NOT NULL,
    creation_timestamp TEXT
);

CREATE TABLE IF NOT EXISTS sdif_sources (
    source_id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_file_name TEXT NOT NULL,
    original_file_type TEXT NOT NULL,
    source_description TEXT,
    processing_timestamp TEXT
);

CREATE TABLE IF NOT EXISTS sdif_tables_metadata (
    table_name TEXT PRIMARY KEY,
    source_id INTEGER NOT NULL,
    description TEXT,
    original_identifier TEXT,
    row_count INTEGER,
    FOREIGN KEY (source_id) REFERENCES sdif_sources(source_id) ON DELETE RESTRICT
);

CREATE TABLE IF NOT EXISTS sdif_columns_metadata (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    description TEXT,
    original_column_name TEXT,
    PRIMARY KEY (table_name, column_name),
    FOREIGN KEY (table_name) REFERENCES sdif_tables_metadata(table_name) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS sdif_objects (
    object_name TEXT PRIMARY KEY,
    source_id INTEGER NOT NULL,
    json_data TEXT NOT NULL,
    description TEXT,
    schema_hint TEXT,
    FOREIGN KEY (source_id) REFERENCES sdif_sources(source_id) ON DELETE RESTRICT
);

CREATE TABLE IF NOT EXISTS sdif_media (
    media_name TEXT PRIMARY KEY,
    source_id INTEGER NOT NULL,
    media_type TEXT NOT NULL,
    media_data BLOB NOT NULL,
    description TEXT,
    original_format TEXT,
    technical_metadata TEXT,
    FOREIGN KEY (source_id) REFERENCES sdif_sources(source_id) ON DELETE RESTRICT
);

CREATE TABLE IF NOT EXISTS sdif_semantic_links (
    link_id INTEGER PRIMARY KEY AUTOINCREMENT,
    link_type TEXT NOT NULL,
    description TEXT,
    from_element_type TEXT NOT NULL CHECK(from_element_type IN ('table', 'column', 'object', 'media', 'json_path', 'source')),
    from_element_spec TEXT NOT NULL,
    to_element_type TEXT NOT NULL CHECK(to_element_type IN ('table', 'column', 'object', 'media', 'json_path', 'source')),
    to_element_spec TEXT NOT NULL
);
"#
    .to_string()
}

/// Double-quotes an identifier, escaping embedded quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Generates `CREATE TABLE` for a user table.
///
/// A single primary-key column gets an inline `PRIMARY KEY`; several become
/// a table-level composite key. Foreign keys are emitted as table
/// constraints after the columns.
pub(crate) fn create_table_sql(name: &str, columns: &[ColumnSpec]) -> String {
    let key_columns: Vec<&ColumnSpec> = columns.iter().filter(|c| c.primary_key).collect();
    let composite_key = key_columns.len() > 1;

    let mut definitions: Vec<String> = columns
        .iter()
        .map(|column| {
            let mut def = format!("{} {}", quote_ident(&column.name), column.sql_type.as_sql());
            if column.primary_key && !composite_key {
                def.push_str(" PRIMARY KEY");
            }
            if column.not_null {
                def.push_str(" NOT NULL");
            }
            if column.unique {
                def.push_str(" UNIQUE");
            }
            if let Some(default) = &column.default_value {
                def.push_str(" DEFAULT ");
                def.push_str(&default.to_sql_literal());
            }
            def
        })
        .collect();

    if composite_key {
        let names: Vec<String> = key_columns.iter().map(|c| quote_ident(&c.name)).collect();
        definitions.push(format!("PRIMARY KEY ({})", names.join(", ")));
    }

    for column in columns {
        let Some(fk) = &column.foreign_key else {
            continue;
        };
        let mut constraint = format!(
            "FOREIGN KEY ({}) REFERENCES {}({})",
            quote_ident(&column.name),
            quote_ident(&fk.table),
            quote_ident(&fk.column)
        );
        if let Some(action) = fk.on_delete {
            constraint.push_str(" ON DELETE ");
            constraint.push_str(action.as_sql());
        }
        if let Some(action) = fk.on_update {
            constraint.push_str(" ON UPDATE ");
            constraint.push_str(action.as_sql());
        }
        definitions.push(constraint);
    }

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        quote_ident(name),
        definitions.join(",\n    ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdif_core::{DefaultValue, ForeignKeyRef, ReferentialAction, SqlType};

    #[test]
    fn test_system_schema_has_all_tables() {
        let sql = system_schema_sql();
        for table in [
            "sdif_properties",
            "sdif_sources",
            "sdif_tables_metadata",
            "sdif_columns_metadata",
            "sdif_objects",
            "sdif_media",
            "sdif_semantic_links",
        ] {
            assert!(
                sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "missing {table}"
            );
        }
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_single_primary_key_inline() {
        let sql = create_table_sql(
            "items",
            &[
                ColumnSpec::new("id", SqlType::Integer).primary_key(),
                ColumnSpec::new("qty", SqlType::Integer)
                    .not_null()
                    .with_default(DefaultValue::Integer(0)),
            ],
        );
        assert_eq!(
            sql,
            "CREATE TABLE \"items\" (\n    \"id\" INTEGER PRIMARY KEY,\n    \"qty\" INTEGER NOT NULL DEFAULT 0\n)"
        );
    }

    #[test]
    fn test_composite_key_and_foreign_key() {
        let sql = create_table_sql(
            "lines",
            &[
                ColumnSpec::new("order_id", SqlType::Integer)
                    .primary_key()
                    .references(
                        ForeignKeyRef::new("orders", "id")
                            .on_delete(ReferentialAction::Cascade)
                            .on_update(ReferentialAction::NoAction),
                    ),
                ColumnSpec::new("line", SqlType::Integer).primary_key(),
                ColumnSpec::new("sku", SqlType::Text).unique(),
            ],
        );
        assert!(sql.contains("\"order_id\" INTEGER,"));
        assert!(sql.contains("\"sku\" TEXT UNIQUE"));
        assert!(sql.contains("PRIMARY KEY (\"order_id\", \"line\")"));
        assert!(sql.contains(
            "FOREIGN KEY (\"order_id\") REFERENCES \"orders\"(\"id\") ON DELETE CASCADE ON UPDATE NO ACTION"
        ));
    }
}
