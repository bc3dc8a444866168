//! Integration tests for the schema comparator.

use std::collections::BTreeMap;

use sdif_core::*;
use serde_json::json;

fn column(name: &str, ty: &str, not_null: bool, pk: u32) -> ColumnSchema {
    ColumnSchema {
        name: name.into(),
        sql_type: ty.into(),
        not_null,
        default_value: None,
        primary_key_position: pk,
        description: None,
        original_column_name: None,
    }
}

fn table(columns: Vec<ColumnSchema>, foreign_keys: Vec<ForeignKeySchema>) -> TableSchema {
    TableSchema {
        metadata: None,
        columns,
        foreign_keys,
    }
}

/// A schema with two related tables, an object, a media entry, and a link.
fn sample_schema() -> ContainerSchema {
    let mut tables = BTreeMap::new();
    tables.insert(
        "customers".to_string(),
        table(
            vec![
                column("id", "INTEGER", false, 1),
                column("name", "TEXT", true, 0),
            ],
            vec![],
        ),
    );
    tables.insert(
        "orders".to_string(),
        table(
            vec![
                column("id", "INTEGER", false, 1),
                column("customer_id", "INTEGER", true, 0),
                column("total", "REAL", false, 0),
            ],
            vec![ForeignKeySchema {
                from_columns: vec!["customer_id".into()],
                target_table: "customers".into(),
                target_columns: vec!["id".into()],
                on_update: "NO ACTION".into(),
                on_delete: "CASCADE".into(),
            }],
        ),
    );

    let mut objects = BTreeMap::new();
    objects.insert(
        "settings".to_string(),
        ObjectSchema {
            source_id: SourceId(1),
            description: None,
            schema_hint: Some(json!({"type": "object", "properties": {"a": {"type": "string"}}})),
        },
    );

    let mut media = BTreeMap::new();
    media.insert(
        "logo".to_string(),
        MediaSchema {
            source_id: SourceId(1),
            media_type: MediaType::Image,
            description: None,
            original_format: Some("png".into()),
            technical_metadata: Some(json!({"width": 10})),
        },
    );

    ContainerSchema {
        properties: Some(Properties {
            format_version: FORMAT_VERSION.into(),
            creation_timestamp: Some("2024-01-01T00:00:00Z".into()),
        }),
        sources: vec![],
        tables,
        objects,
        media,
        semantic_links: vec![SemanticLink {
            id: 1,
            link_type: "annotation".into(),
            description: Some("logo of the customer list".into()),
            from: ElementRef::new(ElementType::Media, json!({"media_name": "logo"})),
            to: ElementRef::new(ElementType::Table, json!({"table_name": "customers"})),
        }],
    }
}

// ---------------------------------------------------------------------------
// compare
// ---------------------------------------------------------------------------

#[test]
fn test_compare_is_reflexive_at_every_verbosity() {
    let schema = sample_schema();
    let comparator = SchemaComparator::default();
    for verbosity in [Verbosity::Summary, Verbosity::Tree, Verbosity::Full] {
        let result = comparator.compare(&schema, &schema, verbosity);
        assert!(result.equivalent);
        assert!(result.report.is_empty());
    }
    assert_eq!(
        comparator.compare(&schema, &schema, Verbosity::Summary).report,
        DiffReport::Summary(vec![])
    );
}

#[test]
fn test_compare_ignores_descriptions_ids_and_key_order() {
    let a = sample_schema();
    let mut b = sample_schema();
    b.semantic_links[0].id = 42;
    b.semantic_links[0].description = None;
    b.objects.get_mut("settings").unwrap().schema_hint =
        Some(json!({"properties": {"a": {"type": "string"}}, "type": "object"}));
    b.properties.as_mut().unwrap().creation_timestamp = None;

    let result = SchemaComparator::default().compare(&a, &b, Verbosity::Summary);
    assert!(result.equivalent, "{:?}", result.report);
}

#[test]
fn test_compare_reports_type_change() {
    let a = sample_schema();
    let mut b = sample_schema();
    b.tables.get_mut("orders").unwrap().columns[2].sql_type = "TEXT".into();

    let result = SchemaComparator::default().compare(&a, &b, Verbosity::Summary);
    assert!(!result.equivalent);
    let DiffReport::Summary(lines) = result.report else {
        panic!("expected summary report");
    };
    assert_eq!(
        lines,
        vec!["~ Changed tables.orders.columns.total.sql_type: REAL -> TEXT".to_string()]
    );
}

#[test]
fn test_compare_tree_groups_by_category() {
    let a = sample_schema();
    let mut b = sample_schema();
    b.tables.remove("customers");
    b.objects.clear();

    let result = SchemaComparator::default().compare(&a, &b, Verbosity::Tree);
    assert!(!result.equivalent);
    let DiffReport::Tree(groups) = result.report else {
        panic!("expected tree report");
    };
    assert_eq!(groups["tables"].len(), 1);
    assert_eq!(groups["tables"][0].kind, ChangeKind::Removed);
    assert_eq!(groups["objects"][0].path, "objects.settings");
}

#[test]
fn test_compare_full_includes_projections() {
    let a = sample_schema();
    let mut b = sample_schema();
    b.media.get_mut("logo").unwrap().original_format = Some("jpeg".into());

    let result = SchemaComparator::default().compare(&a, &b, Verbosity::Full);
    let DiffReport::Full {
        differences,
        left,
        right,
    } = result.report
    else {
        panic!("expected full report");
    };
    assert_eq!(differences.len(), 1);
    assert_eq!(differences[0].path, "media.logo.original_format");
    assert_eq!(left.tables.len(), 2);
    assert_ne!(left.media, right.media);
}

#[test]
fn test_renamed_table_matches_structurally() {
    let a = sample_schema();
    let mut b = sample_schema();
    let customers = b.tables.remove("customers").unwrap();
    b.tables.insert("clients".into(), customers);

    let strict = SchemaComparator::default();
    assert!(!strict.compare(&a, &b, Verbosity::Summary).equivalent);

    let relaxed = SchemaComparator::new(ComparisonConfig {
        enforce_table_names: false,
        enforce_foreign_keys: false,
        semantic_links: LinksMode::LinkTypesOnly,
        ..ComparisonConfig::default()
    });
    let result = relaxed.compare(&a, &b, Verbosity::Summary);
    assert!(result.equivalent, "{:?}", result.report);
}

#[test]
fn test_column_order_switch() {
    let a = sample_schema();
    let mut b = sample_schema();
    b.tables.get_mut("orders").unwrap().columns.swap(1, 2);

    assert!(
        !SchemaComparator::default()
            .compare(&a, &b, Verbosity::Summary)
            .equivalent
    );
    let relaxed = SchemaComparator::new(ComparisonConfig {
        enforce_column_order: false,
        ..ComparisonConfig::default()
    });
    assert!(relaxed.compare(&a, &b, Verbosity::Summary).equivalent);
}

#[test]
fn test_positional_columns_without_names() {
    let a = sample_schema();
    let mut b = sample_schema();
    b.tables.get_mut("orders").unwrap().columns[2].name = "amount".into();

    let config = ComparisonConfig {
        enforce_column_names: false,
        enforce_primary_keys: false,
        enforce_foreign_keys: false,
        ..ComparisonConfig::default()
    };
    assert!(
        SchemaComparator::new(config)
            .compare(&a, &b, Verbosity::Summary)
            .equivalent
    );
}

#[test]
fn test_referential_actions_switch() {
    let a = sample_schema();
    let mut b = sample_schema();
    b.tables.get_mut("orders").unwrap().foreign_keys[0].on_delete = "restrict".into();

    assert!(
        !SchemaComparator::default()
            .compare(&a, &b, Verbosity::Summary)
            .equivalent
    );
    let relaxed = SchemaComparator::new(ComparisonConfig {
        enforce_foreign_key_actions: false,
        ..ComparisonConfig::default()
    });
    assert!(relaxed.compare(&a, &b, Verbosity::Summary).equivalent);
}

#[test]
fn test_technical_metadata_only_compared_on_request() {
    let a = sample_schema();
    let mut b = sample_schema();
    b.media.get_mut("logo").unwrap().technical_metadata = Some(json!({"width": 20}));

    assert!(
        SchemaComparator::default()
            .compare(&a, &b, Verbosity::Summary)
            .equivalent
    );
    let strict = SchemaComparator::new(ComparisonConfig {
        media_technical_metadata: TechnicalMetadataMode::ContentComparison,
        ..ComparisonConfig::default()
    });
    assert!(!strict.compare(&a, &b, Verbosity::Summary).equivalent);
}

// ---------------------------------------------------------------------------
// is_compatible_with
// ---------------------------------------------------------------------------

/// The sample schema plus extra elements in every category.
fn superset_schema() -> ContainerSchema {
    let mut schema = sample_schema();
    schema
        .tables
        .get_mut("orders")
        .unwrap()
        .columns
        .push(column("note", "TEXT", false, 0));
    schema.tables.insert(
        "audit".into(),
        table(vec![column("event", "TEXT", false, 0)], vec![]),
    );
    schema.objects.insert(
        "extra".into(),
        ObjectSchema {
            source_id: SourceId(1),
            description: None,
            schema_hint: None,
        },
    );
    schema.semantic_links.push(SemanticLink {
        id: 2,
        link_type: "reference".into(),
        description: None,
        from: ElementRef::new(ElementType::Object, json!({"object_name": "extra"})),
        to: ElementRef::new(ElementType::Table, json!({"table_name": "audit"})),
    });
    schema
}

#[test]
fn test_compatible_with_itself_and_superset() {
    let comparator = SchemaComparator::default();
    let schema = sample_schema();
    assert!(comparator.is_compatible_with(&schema, &schema));
    assert!(comparator.is_compatible_with(&schema, &superset_schema()));
    assert!(!comparator.is_compatible_with(&superset_schema(), &schema));
}

#[test]
fn test_removing_any_required_element_breaks_compatibility() {
    let comparator = SchemaComparator::default();
    let consumer = sample_schema();

    let mutations: Vec<(&str, Box<dyn Fn(&mut ContainerSchema)>)> = vec![
        (
            "table",
            Box::new(|s: &mut ContainerSchema| {
                s.tables.remove("customers");
            }),
        ),
        (
            "column",
            Box::new(|s: &mut ContainerSchema| {
                s.tables.get_mut("orders").unwrap().columns.remove(2);
            }),
        ),
        (
            "foreign key",
            Box::new(|s: &mut ContainerSchema| s.tables.get_mut("orders").unwrap().foreign_keys.clear()),
        ),
        (
            "object",
            Box::new(|s: &mut ContainerSchema| {
                s.objects.remove("settings");
            }),
        ),
        (
            "media",
            Box::new(|s: &mut ContainerSchema| {
                s.media.remove("logo");
            }),
        ),
        (
            "semantic link",
            Box::new(|s: &mut ContainerSchema| {
                s.semantic_links.remove(0);
            }),
        ),
    ];

    for (label, mutate) in mutations {
        let mut producer = superset_schema();
        mutate(&mut producer);
        assert!(
            !comparator.is_compatible_with(&consumer, &producer),
            "removing the {label} should break compatibility"
        );
    }
}

#[test]
fn test_compatibility_checks_every_category() {
    let comparator = SchemaComparator::default();
    let consumer = sample_schema();
    let mut producer = superset_schema();
    producer.tables.remove("orders");
    producer.media.clear();

    let report = comparator.check_compatibility(&consumer, &producer);
    let categories: Vec<RequirementCategory> = report.unmet.iter().map(|u| u.category).collect();
    assert_eq!(
        categories,
        vec![RequirementCategory::Tables, RequirementCategory::Media]
    );
}

#[test]
fn test_compatibility_without_table_names() {
    let comparator = SchemaComparator::new(ComparisonConfig {
        enforce_table_names: false,
        enforce_foreign_keys: false,
        semantic_links: LinksMode::Ignore,
        ..ComparisonConfig::default()
    });
    let consumer = sample_schema();
    let mut producer = superset_schema();
    let orders = producer.tables.remove("orders").unwrap();
    producer.tables.insert("purchases".into(), orders);

    assert!(comparator.is_compatible_with(&consumer, &producer));
}

#[test]
fn test_nullable_consumer_accepts_not_null_producer() {
    let comparator = SchemaComparator::default();
    let consumer = sample_schema();
    let mut producer = sample_schema();
    producer.tables.get_mut("orders").unwrap().columns[2].not_null = true;

    assert!(comparator.is_compatible_with(&consumer, &producer));
    assert!(!comparator.is_compatible_with(&producer, &consumer));
}

#[test]
fn test_renamed_tables_with_overlapping_shapes_are_compatible() {
    let comparator = SchemaComparator::new(ComparisonConfig {
        enforce_table_names: false,
        ..ComparisonConfig::default()
    });
    let narrow = || table(vec![column("x", "INTEGER", false, 0)], vec![]);
    let wide = || {
        table(
            vec![column("x", "INTEGER", false, 0), column("y", "TEXT", false, 0)],
            vec![],
        )
    };

    let mut consumer = ContainerSchema::default();
    consumer.tables.insert("a".into(), narrow());
    consumer.tables.insert("b".into(), wide());
    let mut producer = ContainerSchema::default();
    producer.tables.insert("p".into(), wide());
    producer.tables.insert("q".into(), narrow());

    assert!(comparator.compare(&consumer, &producer, Verbosity::Summary).equivalent);
    assert!(comparator.is_compatible_with(&consumer, &producer));
    assert!(comparator.check_compatibility(&consumer, &producer).is_compatible());
}
