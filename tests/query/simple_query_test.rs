//! Integration tests for the restricted query form.

use insta::assert_snapshot;
use reportql::query::{
    simple_parse, simple_parse_with, Condition, ConditionOperator, ConditionValue, ParseError,
    ParseOptions, QueryError, SimpleQueryError, SortDirection,
};

fn conditions_of(input: &str) -> std::collections::BTreeMap<String, Condition> {
    simple_parse(input)
        .expect("query should parse in simple mode")
        .conditions
}

#[test]
fn test_simple_parser() {
    let result = simple_parse(
        "select id,name where age = 18 group by attr1, attr2 order by age asc limit 10 offset 5",
    )
    .unwrap();
    assert_eq!(result.select, vec!["id", "name"]);
    assert_eq!(result.limit, Some(10));
    assert_eq!(result.offset, Some(5));
    assert_eq!(result.group_by, vec!["attr1", "attr2"]);
    let order = result.order_by.as_ref().unwrap();
    assert_eq!(order.column, "age");
    assert!(order.is_ascending());
    assert_eq!(result.conditions.len(), 1);
    assert_eq!(result.conditions["age"].as_equals(), Some("18"));
}

#[test]
fn test_only_a_single_ordering_is_accepted() {
    assert!(matches!(
        simple_parse("order by name,date"),
        Err(QueryError::Simple(SimpleQueryError::MultipleOrderElements))
    ));
}

#[test]
fn test_empty_query_defaults() {
    let result = simple_parse("").unwrap();
    assert!(result.select.is_empty());
    assert!(result.group_by.is_empty());
    assert_eq!(result.order_by, None);
    assert_eq!(result.limit, None);
    assert_eq!(result.offset, None);
}

#[test]
fn test_where_equalities() {
    let conditions = conditions_of("where id = 1 and name = `foo bar` and `foo bar` = 123");
    assert_eq!(conditions["id"].as_equals(), Some("1"));
    assert_eq!(conditions["name"].as_equals(), Some("foo bar"));
    assert_eq!(conditions["foo bar"].as_equals(), Some("123"));
}

#[test]
fn test_only_and_is_accepted() {
    assert!(matches!(
        simple_parse("where id = 1 or name = `foo bar`"),
        Err(QueryError::Simple(SimpleQueryError::DisallowedConnective(_)))
    ));
}

#[test]
fn test_other_operators_become_lists() {
    let conditions = conditions_of("where date > '2010-01-01' and date < '2010-02-01'");
    let ops = conditions["date"].as_operators().unwrap();
    assert_eq!(ops.first().unwrap().op.as_str(), ">");
    assert_eq!(
        ops.first().unwrap().value,
        ConditionValue::Single("2010-01-01".to_string())
    );
    assert_eq!(ops.last().unwrap().op.as_str(), "<");
    assert_eq!(
        ops.last().unwrap().value,
        ConditionValue::Single("2010-02-01".to_string())
    );
}

#[test]
fn test_equality_mixed_with_other_operators_is_rejected() {
    assert!(matches!(
        simple_parse("where foo = '1' and foo >= 2"),
        Err(QueryError::Simple(SimpleQueryError::MixedOperators { column })) if column == "foo"
    ));
}

#[test]
fn test_in_conditions() {
    let conditions = conditions_of("where foo in ('1','2')");
    let ops = conditions["foo"].as_operators().unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].op, ConditionOperator::In);
    assert_eq!(
        ops[0].value,
        ConditionValue::List(vec!["1".to_string(), "2".to_string()])
    );
}

#[test]
fn test_restrictions_are_reported_as_simple_errors() {
    let cases = [
        ("where not a = 1", "NOT"),
        ("where (a = 1)", "nested"),
        ("where a between 1 and 2", "between"),
        ("where exists (select a)", "exists"),
        ("select a + 1", "expression select"),
        ("group by a having a > 1", "having"),
        ("order by a * 2", "expression order"),
        ("where a = b + 1", "expression value"),
        ("where a in (select b)", "sub-relation"),
    ];
    for (query, label) in cases {
        assert!(
            matches!(simple_parse(query), Err(QueryError::Simple(_))),
            "{} ({}) should be a restriction error, got {:?}",
            query,
            label,
            simple_parse(query)
        );
    }
}

#[test]
fn test_invalid_input_is_reported_as_parse_error() {
    for query in ["where", "select a,", "order by", "where a = 'open", "limit 1.5"] {
        assert!(
            matches!(simple_parse(query), Err(QueryError::Parse(_))),
            "{} should be a parse error, got {:?}",
            query,
            simple_parse(query)
        );
    }
}

#[test]
fn test_bounds_apply_in_simple_mode() {
    let options = ParseOptions {
        max_query_length: 8,
        max_depth: 64,
    };
    assert!(matches!(
        simple_parse_with("where a = 1", &options),
        Err(QueryError::Parse(ParseError::TooLong { .. }))
    ));
}

#[test]
fn test_descending_order() {
    let result = simple_parse("order by created desc").unwrap();
    assert_eq!(result.order_by.unwrap().direction, SortDirection::Desc);
}

#[test]
fn test_json_shape() {
    let result =
        simple_parse("select id where age = 18 and date > '2010' order by id desc limit 5")
            .unwrap();
    let json = serde_json::to_string_pretty(&result).unwrap();
    assert_snapshot!(json, @r#"
    {
      "select": [
        "id"
      ],
      "group_by": [],
      "order_by": {
        "column": "id",
        "direction": "desc"
      },
      "conditions": {
        "age": "18",
        "date": [
          {
            "op": ">",
            "value": "2010"
          }
        ]
      },
      "limit": 5,
      "offset": null
    }
    "#);
}
