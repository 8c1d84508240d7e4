//! End-to-end tests: query string → simple query → resolver fragments.

use reportql::query::simple_parse;
use reportql::reporting::{
    ColumnDef, ColumnType, NameMapping, ReportingDefinition, Resolver, SqlMapping, TableDef,
};

fn definition() -> ReportingDefinition {
    ReportingDefinition::builder()
        .with_table(TableDef::new("notneeded", "JOIN notneeded"))
        .with_table(TableDef::new("buildings", "JOIN buildings").depends_on(["companies"]))
        .with_table(TableDef::new("companies", "JOIN companies"))
        .with_column(ColumnDef::new("firstname", ColumnType::String).sql_same_name())
        .with_column(ColumnDef::new("lastname", ColumnType::String).sql(SqlMapping::new("name")))
        .with_column(
            ColumnDef::new("company_name", ColumnType::String)
                .sql(SqlMapping::qualified("companies", "name")),
        )
        .with_column(ColumnDef::new("fullname", ColumnType::String))
        .with_column(
            ColumnDef::new("building_no", ColumnType::Number)
                .sql(SqlMapping::qualified("buildings", "number")),
        )
        .build()
        .expect("definition should be valid")
}

fn resolver_from_query<'d>(definition: &'d ReportingDefinition, query: &str) -> Resolver<'d> {
    let parsed = simple_parse(query).expect("query should parse in simple mode");
    Resolver::from_simple_query(definition, &parsed)
}

fn mapping(pairs: &[(&str, &str)]) -> NameMapping {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_select_considers_mapping() {
    let def = definition();
    let mut resolver = Resolver::new(&def);
    resolver.set_select(["firstname"]);
    assert_eq!(
        resolver.sql_select_with(&[], &mapping(&[("firstname", "christian_name")])),
        "christian_name firstname"
    );
}

#[test]
fn test_group_by_considers_mapping() {
    let def = definition();
    let mut resolver = Resolver::new(&def);
    resolver.set_group_by(["firstname"]);
    assert_eq!(
        resolver
            .sql_group_by_with(&[], &mapping(&[("firstname", "christian_name")]))
            .as_deref(),
        Some("christian_name")
    );
}

#[test]
fn test_select_some_sql_and_some_computed_columns() {
    let def = definition();
    let mut resolver = resolver_from_query(&def, "select firstname, fullname");
    assert_eq!(resolver.sql_select(), "firstname");
}

#[test]
fn test_select_uses_qualified_names() {
    let def = definition();
    let mut resolver = resolver_from_query(&def, "select company_name, fullname");
    assert_eq!(resolver.sql_select(), "companies.name company_name");
}

#[test]
fn test_select_wildcard() {
    let def = definition();
    let mut resolver = resolver_from_query(&def, "select *");
    let expected: Vec<String> = def
        .sql_columns()
        .into_iter()
        .filter_map(|c| def.sql_column_name(c, true))
        .collect();
    assert_eq!(resolver.sql_select(), expected.join(", "));
    assert_eq!(
        resolver.sql_select(),
        "firstname, name lastname, companies.name company_name, buildings.number building_no"
    );
}

#[test]
fn test_group_by() {
    let def = definition();
    let mut resolver = resolver_from_query(&def, "group by firstname, fullname");
    assert_eq!(resolver.sql_group_by().as_deref(), Some("firstname"));

    let mut resolver = resolver_from_query(&def, "group by firstname, lastname, fullname");
    assert_eq!(resolver.sql_group_by().as_deref(), Some("firstname, name"));
}

#[test]
fn test_group_by_absent_without_grouping() {
    let def = definition();
    let mut resolver = resolver_from_query(&def, "");
    assert_eq!(resolver.sql_group_by(), None);
}

#[test]
fn test_order_by() {
    let def = definition();
    let resolver = resolver_from_query(&def, "order by firstname");
    assert_eq!(resolver.sql_order_by().as_deref(), Some("firstname ASC"));
    assert_eq!(
        resolver
            .sql_order_by_with(&mapping(&[("firstname", "name")]))
            .as_deref(),
        Some("name ASC")
    );

    let resolver = resolver_from_query(&def, "order by company_name desc");
    assert_eq!(
        resolver.sql_order_by().as_deref(),
        Some("companies.name DESC")
    );
}

#[test]
fn test_order_by_absent_without_ordering() {
    let def = definition();
    let resolver = resolver_from_query(&def, "");
    assert_eq!(resolver.sql_order_by(), None);
}

#[test]
fn test_joins_follow_used_columns() {
    let def = definition();
    let resolver = resolver_from_query(&def, "select firstname");
    assert_eq!(resolver.sql_joins().unwrap(), "");

    let mut resolver = resolver_from_query(&def, "select company_name");
    resolver.sql_select();
    assert_eq!(resolver.sql_joins().unwrap(), "JOIN companies");
}

#[test]
fn test_condition_columns_add_joins() {
    let def = definition();
    let resolver = resolver_from_query(&def, "select firstname where building_no > 3");
    assert_eq!(
        resolver.sql_joins().unwrap(),
        "JOIN companies JOIN buildings"
    );
}

#[test]
fn test_mark_as_used_adds_joins() {
    let def = definition();
    let mut resolver = resolver_from_query(&def, "select firstname");
    assert_eq!(resolver.sql_joins().unwrap(), "");
    resolver.mark_as_used(["company_name"]);
    assert_eq!(resolver.sql_joins().unwrap(), "JOIN companies");
}

#[test]
fn test_replacing_select_keeps_earlier_joins() {
    let def = definition();
    let mut resolver = Resolver::new(&def);
    resolver.set_select(["company_name"]);
    assert_eq!(resolver.sql_joins().unwrap(), "JOIN companies");

    resolver.set_select(["firstname"]);
    assert_eq!(resolver.sql_select(), "firstname");
    assert_eq!(resolver.sql_joins().unwrap(), "JOIN companies");
    assert!(resolver.used_columns().contains(&"company_name"));
}

#[test]
fn test_required_columns_are_selected() {
    let def = definition();
    let mut resolver = resolver_from_query(&def, "select firstname");
    resolver.set_required_columns("firstname", ["company_name"]);
    let select = resolver.sql_select();
    let parts: Vec<&str> = select.split(", ").collect();
    assert_eq!(parts.len(), 2);
    assert!(parts.contains(&"firstname"));
    assert!(parts.contains(&"companies.name company_name"));
}

#[test]
fn test_required_columns_add_joins() {
    let def = definition();
    let mut resolver = resolver_from_query(&def, "select firstname");
    resolver.set_required_columns("firstname", ["company_name"]);
    assert_eq!(resolver.sql_joins().unwrap(), "JOIN companies");
}

#[test]
fn test_explicit_join_requests() {
    let def = definition();
    let resolver = Resolver::new(&def);
    assert_eq!(resolver.sql_joins_for(["firstname"]).unwrap(), "");
    assert_eq!(
        resolver.sql_joins_for(["company_name"]).unwrap(),
        "JOIN companies"
    );
    assert_eq!(
        resolver
            .sql_joins_for(["building_no", "company_name"])
            .unwrap(),
        "JOIN companies JOIN buildings"
    );
}

#[test]
fn test_resolver_from_full_relation() {
    let def = definition();
    let relation = reportql::query::parse(
        "select firstname where firstname in (select fullname where building_no = 1)",
    )
    .unwrap();
    let mut resolver = Resolver::from_relation(&def, &relation);
    assert_eq!(resolver.sql_select(), "firstname");
    assert_eq!(
        resolver.sql_joins().unwrap(),
        "JOIN companies JOIN buildings"
    );
}
