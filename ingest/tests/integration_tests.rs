//! Integration tests for the sdif-ingest crate.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use sdif_core::ConflictPolicy;
use sdif_ingest::{
    ColumnDefinition, ColumnRef, CsvIngestor, FileOptions, IngestConfig, IngestError, IngestReport,
    RowSkip,
};
use sdif_sqlite::{Container, ContainerError, Value};
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn ingest(container: &mut Container, name: &str, csv: &str, options: &FileOptions) -> IngestReport {
    CsvIngestor::new(container)
        .ingest_bytes(name, csv.as_bytes(), options)
        .unwrap()
}

fn column_types(container: &Container, table: &str) -> Vec<(String, String)> {
    container
        .table_schema(table)
        .unwrap()
        .columns
        .into_iter()
        .map(|c| (c.name, c.sql_type))
        .collect()
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// End-to-end file ingestion
// ---------------------------------------------------------------------------

#[test]
fn test_ingest_file_registers_source_and_typed_table() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "Orders 2024.csv",
        b"Order ID,Customer,Total,Paid\n1,Ann,19.99,yes\n2,Bob,5,no\n3,Cy,,yes\n",
    );
    let mut container = Container::create(dir.path().join("out.sdif")).unwrap();

    let report = CsvIngestor::new(&mut container)
        .ingest_file(&path, &FileOptions::default())
        .unwrap();

    assert_eq!(report.path, path);
    assert_eq!(report.table_name.as_deref(), Some("orders_2024"));
    assert_eq!(report.encoding, "UTF-8");
    assert_eq!(report.delimiter, ',');
    assert_eq!(report.rows_inserted, 3);

    let sources = container.list_sources().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].file_name, "Orders 2024.csv");
    assert_eq!(sources[0].file_type, "csv");

    assert_eq!(
        column_types(&container, "orders_2024"),
        pairs(&[
            ("order_id", "INTEGER"),
            ("customer", "TEXT"),
            ("total", "REAL"),
            ("paid", "TEXT"),
        ])
    );

    let metadata = container.table_metadata("orders_2024").unwrap();
    assert_eq!(metadata.row_count, Some(3));
    let columns = container.column_metadata("orders_2024").unwrap();
    assert_eq!(columns[0].original_column_name.as_deref(), Some("Order ID"));

    let table = container.read_table("orders_2024").unwrap();
    assert_eq!(table.rows[0][2], Value::Real(19.99));
    assert_eq!(table.rows[2][2], Value::Null);
}

#[test]
fn test_ingest_latin1_file_with_explicit_options() {
    let dir = TempDir::new().unwrap();
    let (bytes, _, _) =
        encoding_rs::WINDOWS_1252.encode("ville;pop\nOrléans;116000\nBesançon;117000\n");
    let path = write_file(&dir, "villes.csv", &bytes);
    let mut container = Container::open_in_memory().unwrap();

    let options = FileOptions {
        encoding: Some("latin1".into()),
        delimiter: Some(';'),
        table_name: Some("Cities".into()),
        description: Some("French cities".into()),
        ..Default::default()
    };
    let report = CsvIngestor::new(&mut container)
        .ingest_file(&path, &options)
        .unwrap();

    assert_eq!(report.encoding, "windows-1252");
    assert_eq!(report.table_name.as_deref(), Some("cities"));
    let table = container.read_table("cities").unwrap();
    assert_eq!(table.rows[1][0], Value::Text("Besançon".into()));
    assert_eq!(table.rows[1][1], Value::Integer(117000));
    assert_eq!(
        container.table_metadata("cities").unwrap().description.as_deref(),
        Some("French cities")
    );
}

#[test]
fn test_ingest_config_runs_every_file() {
    let dir = TempDir::new().unwrap();
    let a = write_file(&dir, "a.csv", b"x,y\n1,2\n");
    let b = write_file(&dir, "b.csv", b"x|y\n3|4\n5|6\n");
    let yaml = format!(
        "defaults:\n  if_exists: fail\nfiles:\n  - path: {}\n  - path: {}\n    table_name: second\n",
        a.display(),
        b.display()
    );
    let config_path = write_file(&dir, "ingest.yml", yaml.as_bytes());
    let config = IngestConfig::load(&config_path).unwrap();

    let mut container = Container::open_in_memory().unwrap();
    let reports = CsvIngestor::new(&mut container)
        .ingest_config(&config)
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1].delimiter, '|');
    assert_eq!(container.list_tables().unwrap(), ["a", "second"]);
    assert_eq!(container.read_table("second").unwrap().rows.len(), 2);
}

// ---------------------------------------------------------------------------
// Row and column skips
// ---------------------------------------------------------------------------

#[test]
fn test_negative_row_skip_drops_trailer() {
    let mut container = Container::open_in_memory().unwrap();
    let csv = "id,amount\n1,10\n2,20\nTOTAL,30\n";
    let options = FileOptions {
        skip_rows: Some(RowSkip::Indices(BTreeSet::from([-1]))),
        ..Default::default()
    };
    let report = ingest(&mut container, "sales.csv", csv, &options);

    assert_eq!(report.rows_inserted, 2);
    assert_eq!(
        column_types(&container, "sales"),
        pairs(&[("id", "INTEGER"), ("amount", "INTEGER")])
    );
}

#[test]
fn test_row_skip_indices_before_header() {
    let mut container = Container::open_in_memory().unwrap();
    let csv = "# exported\n# by hand\nid,name\n1,a\n";
    let options = FileOptions {
        skip_rows: Some(RowSkip::Indices(BTreeSet::from([0, 1]))),
        ..Default::default()
    };
    let report = ingest(&mut container, "people.csv", csv, &options);
    assert_eq!(report.columns, ["id", "name"]);
    assert_eq!(report.rows_inserted, 1);
}

#[test]
fn test_column_skip_by_name_and_index() {
    let mut container = Container::open_in_memory().unwrap();
    let csv = "id,Secret,name,extra\n1,s,a,x\n2,t,b,y\n";
    let options = FileOptions {
        skip_columns: Some(vec![ColumnRef::Name("secret".into()), ColumnRef::Index(3)]),
        ..Default::default()
    };
    let report = ingest(&mut container, "users.csv", csv, &options);

    assert_eq!(report.columns, ["id", "name"]);
    let table = container.read_table("users").unwrap();
    assert_eq!(table.rows[1], vec![Value::Integer(2), Value::Text("b".into())]);
}

#[test]
fn test_skip_errors_leave_container_untouched() {
    let mut container = Container::open_in_memory().unwrap();
    let mut ingestor = CsvIngestor::new(&mut container);

    let headerless = FileOptions {
        has_header: Some(false),
        skip_columns: Some(vec![ColumnRef::Name("id".into())]),
        ..Default::default()
    };
    let err = ingestor
        .ingest_bytes("a.csv", b"1,2\n", &headerless)
        .unwrap_err();
    assert!(matches!(err, IngestError::InvalidSkipSpec(_)));

    let missing = FileOptions {
        skip_columns: Some(vec![ColumnRef::Name("nope".into())]),
        ..Default::default()
    };
    let err = ingestor
        .ingest_bytes("a.csv", b"id,name\n1,2\n", &missing)
        .unwrap_err();
    assert!(matches!(err, IngestError::ColumnNotFound { .. }));

    assert!(container.list_sources().unwrap().is_empty());
    assert!(container.list_tables().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Naming and conflicts
// ---------------------------------------------------------------------------

#[test]
fn test_headerless_and_definitions() {
    let mut container = Container::open_in_memory().unwrap();
    let options = FileOptions {
        has_header: Some(false),
        columns: Some(vec![ColumnDefinition {
            original_identifier: "first column".into(),
            final_column_name: "Code".into(),
            description: Some("Product code".into()),
        }]),
        ..Default::default()
    };
    let report = ingest(&mut container, "raw.csv", "A,1,x\nB,2,y\n", &options);

    assert_eq!(report.columns, ["code", "column_1", "column_2"]);
    let columns = container.column_metadata("raw").unwrap();
    assert_eq!(columns[0].description.as_deref(), Some("Product code"));
    assert_eq!(columns[0].original_column_name.as_deref(), Some("first column"));
}

#[test]
fn test_duplicate_headers_are_suffixed() {
    let mut container = Container::open_in_memory().unwrap();
    let report = ingest(
        &mut container,
        "dup.csv",
        "Name,name,NAME!,\n1,2,3,4\n",
        &FileOptions::default(),
    );
    assert_eq!(report.columns, ["name", "name_1", "name_2", "column_3"]);
}

#[test]
fn test_default_policy_adds_suffix() {
    let mut container = Container::open_in_memory().unwrap();
    let first = ingest(&mut container, "t.csv", "a\n1\n", &FileOptions::default());
    let second = ingest(&mut container, "t.csv", "a\n2\n", &FileOptions::default());

    assert_eq!(first.table_name.as_deref(), Some("t"));
    assert_eq!(second.table_name.as_deref(), Some("t_1"));
    assert_eq!(container.list_sources().unwrap().len(), 2);
}

#[test]
fn test_fail_policy_surfaces_name_conflict() {
    let mut container = Container::open_in_memory().unwrap();
    ingest(&mut container, "t.csv", "a\n1\n", &FileOptions::default());

    let options = FileOptions {
        if_exists: Some(ConflictPolicy::Fail),
        ..Default::default()
    };
    let err = CsvIngestor::new(&mut container)
        .ingest_bytes("t.csv", b"a\n2\n", &options)
        .unwrap_err();
    assert!(matches!(
        err,
        IngestError::Container(ContainerError::NameConflict { .. })
    ));
    assert_eq!(container.list_sources().unwrap().len(), 1);
    assert_eq!(container.list_tables().unwrap(), ["t"]);
}

#[test]
fn test_file_named_like_system_table_is_renamed() {
    let mut container = Container::open_in_memory().unwrap();
    let report = ingest(&mut container, "sdif_export.csv", "a\n1\n", &FileOptions::default());

    assert_eq!(report.table_name.as_deref(), Some("t_sdif_export"));
    assert_eq!(report.rows_inserted, 1);
    assert_eq!(container.list_tables().unwrap(), ["t_sdif_export"]);
}

#[test]
fn test_replace_policy_from_defaults() {
    let mut container = Container::open_in_memory().unwrap();
    let defaults = FileOptions {
        if_exists: Some(ConflictPolicy::Replace),
        ..Default::default()
    };
    let mut ingestor = CsvIngestor::new(&mut container).with_defaults(defaults);
    ingestor
        .ingest_bytes("t.csv", b"a\n1\n", &FileOptions::default())
        .unwrap();
    ingestor
        .ingest_bytes("t.csv", b"b,c\nx,y\n", &FileOptions::default())
        .unwrap();

    assert_eq!(container.list_tables().unwrap(), ["t"]);
    assert_eq!(container.read_table("t").unwrap().columns, ["b", "c"]);
}

// ---------------------------------------------------------------------------
// Irregular content
// ---------------------------------------------------------------------------

#[test]
fn test_ragged_rows_padded_and_truncated() {
    let mut container = Container::open_in_memory().unwrap();
    let csv = "a,b\n1\n2,3,4\n";
    ingest(&mut container, "ragged.csv", csv, &FileOptions::default());

    let table = container.read_table("ragged").unwrap();
    assert_eq!(table.rows[0], vec![Value::Integer(1), Value::Null]);
    assert_eq!(table.rows[1], vec![Value::Integer(2), Value::Integer(3)]);
}

#[test]
fn test_values_past_sample_kept_as_text() {
    let mut container = Container::open_in_memory().unwrap();
    let csv = "n\n1\n2\nthree\n";
    let options = FileOptions {
        sample_size: Some(2),
        ..Default::default()
    };
    ingest(&mut container, "nums.csv", csv, &options);

    assert_eq!(column_types(&container, "nums"), pairs(&[("n", "INTEGER")]));
    let table = container.read_table("nums").unwrap();
    assert_eq!(table.rows[2][0], Value::Text("three".into()));
}

#[test]
fn test_no_columns_stored_as_object() {
    let mut container = Container::open_in_memory().unwrap();
    let options = FileOptions {
        skip_columns: Some(vec![ColumnRef::Index(0)]),
        ..Default::default()
    };
    let report = ingest(&mut container, "notes.csv", "note\nhello\n", &options);

    assert_eq!(report.table_name, None);
    let name = report.object_name.unwrap();
    assert_eq!(name, "notes_raw");
    let object = container.get_object(&name).unwrap();
    assert_eq!(object.data["raw_content"], "note\nhello\n");
}

#[test]
fn test_empty_file_stores_nothing() {
    let mut container = Container::open_in_memory().unwrap();
    let report = ingest(&mut container, "empty.csv", "", &FileOptions::default());

    assert_eq!(report.table_name, None);
    assert_eq!(report.object_name, None);
    assert!(container.list_tables().unwrap().is_empty());
    assert_eq!(container.list_sources().unwrap().len(), 1);
}

#[test]
fn test_read_only_container_rejected() {
    let dir = TempDir::new().unwrap();
    let path: &Path = &dir.path().join("ro.sdif");
    Container::create(path).unwrap().close().unwrap();
    let mut container = Container::open_read_only(path).unwrap();

    let err = CsvIngestor::new(&mut container)
        .ingest_bytes("t.csv", b"a\n1\n", &FileOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        IngestError::Container(ContainerError::PermissionDenied(_))
    ));
}

#[test]
fn test_unknown_encoding_and_bad_delimiter() {
    let mut container = Container::open_in_memory().unwrap();
    let mut ingestor = CsvIngestor::new(&mut container);

    let encoding = FileOptions {
        encoding: Some("klingon".into()),
        ..Default::default()
    };
    assert!(matches!(
        ingestor.ingest_bytes("t.csv", b"a\n", &encoding),
        Err(IngestError::UnknownEncoding(_))
    ));

    let delimiter = FileOptions {
        delimiter: Some('§'),
        ..Default::default()
    };
    assert!(matches!(
        ingestor.ingest_bytes("t.csv", b"a\n", &delimiter),
        Err(IngestError::InvalidOption(_))
    ));
}
