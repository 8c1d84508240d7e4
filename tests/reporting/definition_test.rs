//! Tests for loading and validating reporting definitions.

use std::fs;

use insta::assert_snapshot;
use reportql::reporting::{
    ColumnDef, ColumnType, DefinitionError, JoinResolutionError, ReportingDefinition, TableDef,
};

const SALES: &str = r#"
[[tables]]
name = "regions"
join = "JOIN regions ON regions.id = offices.region_id"
depends_on = ["offices"]

[[tables]]
name = "offices"
join = "JOIN offices ON offices.id = sales.office_id"

[[columns]]
name = "amount"
type = "number"
label = "Amount"
sql = true

[[columns]]
name = "region"
type = "string"
sql = { table = "regions", column = "name" }

[[columns]]
name = "office"
type = "string"
sql = { table = "offices", column = "name" }

[[columns]]
name = "growth"
type = "number"
"#;

#[test]
fn test_load_from_file() {
    let dir = std::env::temp_dir().join(format!("reportql-definition-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("sales.toml");
    fs::write(&path, SALES).unwrap();

    let def = ReportingDefinition::from_file(&path).unwrap();
    assert_eq!(def.tables().len(), 2);
    assert_eq!(def.sql_columns(), vec!["amount", "region", "office"]);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_dependencies_are_joined_first() {
    let def = ReportingDefinition::from_toml_str(SALES).unwrap();
    assert_eq!(
        def.sql_joins(["region"]).unwrap(),
        "JOIN offices ON offices.id = sales.office_id JOIN regions ON regions.id = offices.region_id"
    );
    assert_eq!(
        def.sql_joins(["office", "amount", "growth"]).unwrap(),
        "JOIN offices ON offices.id = sales.office_id"
    );
}

#[test]
fn test_columns_description() {
    let def = ReportingDefinition::from_toml_str(SALES).unwrap();
    let json = serde_json::to_string(&def.columns()).unwrap();
    assert_snapshot!(
        json,
        @r#"[{"id":"amount","type":"number","label":"Amount"},{"id":"region","type":"string"},{"id":"office","type":"string"},{"id":"growth","type":"number"}]"#
    );
}

#[test]
fn test_unknown_dependency_rejected() {
    let result = ReportingDefinition::from_toml_str(
        r#"
        [[tables]]
        name = "buildings"
        join = "JOIN buildings"
        depends_on = ["companies"]
        "#,
    );
    match result {
        Err(DefinitionError::Join(JoinResolutionError::UnknownTable {
            table,
            referenced_by,
        })) => {
            assert_eq!(table, "companies");
            assert_eq!(referenced_by, "buildings");
        }
        other => panic!("expected unknown table, got {:?}", other),
    }
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let result = ReportingDefinition::builder()
        .with_table(TableDef::new("a", "JOIN a").depends_on(["a"]))
        .build();
    assert!(matches!(
        result,
        Err(DefinitionError::Join(JoinResolutionError::Cycle { table })) if table == "a"
    ));
}

#[test]
fn test_unknown_column_key_rejected() {
    let result = ReportingDefinition::from_toml_str(
        r#"
        [[columns]]
        name = "a"
        type = "number"
        sqll = true
        "#,
    );
    assert!(matches!(result, Err(DefinitionError::Parse(_))));
}

#[test]
fn test_unknown_sql_mapping_key_rejected() {
    let result = ReportingDefinition::from_toml_str(
        r#"
        [[tables]]
        name = "companies"
        join = "JOIN companies"

        [[columns]]
        name = "company_name"
        type = "string"
        sql = { tabel = "companies" }
        "#,
    );
    assert!(matches!(result, Err(DefinitionError::Parse(_))));

    let def = ReportingDefinition::from_toml_str(
        r#"
        [[columns]]
        name = "firstname"
        type = "string"
        sql = {}
        "#,
    )
    .unwrap();
    assert_eq!(def.sql_columns(), vec!["firstname"]);
}

#[test]
fn test_definition_is_shareable_across_threads() {
    let def = ReportingDefinition::builder()
        .with_table(TableDef::new("t", "JOIN t"))
        .with_column(ColumnDef::new("a", ColumnType::Number).sql_same_name())
        .build()
        .unwrap();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| assert_eq!(def.sql_joins(["a"]).unwrap(), ""));
        }
    });
}
