//! Integration tests for the full query grammar.
//!
//! These tests run query strings through the public `parse` entry point and
//! check the resulting relation.

use std::time::{Duration, Instant};

use insta::assert_snapshot;
use reportql::query::{
    parse, parse_with, simple_parse_with, CompareOperator, Expr, LogicalOperator, ParseError,
    ParseOptions, Predicate, QueryError, Relation, SortDirection,
};

fn where_of(input: &str) -> Predicate {
    parse(input)
        .expect("query should parse")
        .where_clause
        .expect("query should have a where clause")
}

fn compare_sides(predicate: Predicate) -> (Expr, Expr) {
    match predicate {
        Predicate::Compare { left, right, .. } => (left, right),
        other => panic!("expected comparison, got {:?}", other),
    }
}

// ============================================================================
// Quoting and escapes
// ============================================================================

#[test]
fn test_quoting_with_backticks() {
    let (left, _) = compare_sides(where_of("where `foo bar`=3"));
    assert_eq!(left.to_string(), "foo bar");
}

#[test]
fn test_quoting_with_single_quotes() {
    let (_, right) = compare_sides(where_of("where bar='foo bar'"));
    assert_eq!(right.to_string(), "foo bar");
}

#[test]
fn test_escaped_quote_in_string() {
    let (_, right) = compare_sides(where_of(r"where bar='test\''"));
    assert_eq!(right.to_string(), "test'");
}

#[test]
fn test_escaped_backslash_in_string() {
    let (_, right) = compare_sides(where_of(r"where bar='te\\st'"));
    assert_eq!(right.to_string(), r"te\st");
}

#[test]
fn test_escaped_backslash_as_last_character() {
    let (_, right) = compare_sides(where_of(r"where bar='test\\'"));
    assert_eq!(right.to_string(), r"test\");
}

#[test]
fn test_empty_string_literal() {
    let (_, right) = compare_sides(where_of("where foo=''"));
    assert_eq!(right, Expr::string(""));
    assert_eq!(right.to_string(), "");
}

#[test]
fn test_keywords_are_case_insensitive() {
    let lower = parse("select a where b = 1 order by a desc").unwrap();
    let upper = parse("SELECT a WHERE b = 1 ORDER BY a DESC").unwrap();
    assert_eq!(lower, upper);
}

// ============================================================================
// Predicates
// ============================================================================

#[test]
fn test_in_list() {
    match where_of("where foo in ('1','2')") {
        Predicate::In { expr, values } => {
            assert_eq!(expr.to_string(), "foo");
            assert_eq!(values.len(), 2);
            assert_eq!(values[0].to_string(), "1");
            assert_eq!(values[1].to_string(), "2");
        }
        other => panic!("expected IN, got {:?}", other),
    }
}

#[test]
fn test_every_comparison_operator() {
    let cases = [
        ("=", CompareOperator::Eq),
        (">", CompareOperator::Gt),
        ("<", CompareOperator::Lt),
        (">=", CompareOperator::GtEq),
        ("<=", CompareOperator::LtEq),
        ("<>", CompareOperator::NotEq),
        ("!=", CompareOperator::BangEq),
    ];
    for (token, expected) in cases {
        match where_of(&format!("where a {} 1", token)) {
            Predicate::Compare { op, .. } => assert_eq!(op, expected, "operator {}", token),
            other => panic!("expected comparison for {}, got {:?}", token, other),
        }
    }
}

#[test]
fn test_connective_precedence() {
    let predicate = where_of("where a = 1 or not b = 2 and c = 3");
    assert_snapshot!(predicate.to_string(), @"a = 1 OR (NOT b = 2 AND c = 3)");
    match predicate {
        Predicate::Compound { op, right, .. } => {
            assert_eq!(op, LogicalOperator::Or);
            match *right {
                Predicate::Compound { op, left, .. } => {
                    assert_eq!(op, LogicalOperator::And);
                    assert!(matches!(*left, Predicate::Not { .. }));
                }
                other => panic!("expected AND, got {:?}", other),
            }
        }
        other => panic!("expected OR, got {:?}", other),
    }
}

#[test]
fn test_nested_relations() {
    let relation = parse(
        "select name where id in (select owner where exists (select id where kind = 'x')) \
         and region not in (select region where closed = 1)",
    )
    .unwrap();
    assert_snapshot!(
        relation.to_string(),
        @"SELECT name WHERE id IN (SELECT owner WHERE EXISTS (SELECT id WHERE kind = x)) AND region NOT IN (SELECT region WHERE closed = 1)"
    );
    assert_eq!(
        relation.referenced_columns(),
        vec!["name", "id", "owner", "kind", "region", "closed"]
    );
}

#[test]
fn test_between_forms() {
    assert_eq!(
        where_of("where d between '2010-01-01' and '2010-12-31'"),
        where_of("where d between ('2010-01-01', '2010-12-31')")
    );
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_expression_rendering() {
    let relation = parse("select -price * qty + tax / 2 % 3, $user, `order`").unwrap();
    let rendered: Vec<String> = relation.select.iter().map(|e| e.to_string()).collect();
    assert_eq!(
        rendered,
        vec!["((-price) * qty) + ((tax / 2) % 3)", "$user", "order"]
    );
}

#[test]
fn test_case_forms() {
    let relation = parse(
        "select case kind when 'a' then 1 when 'b' then 2 else 0 end, \
         case when total > 100 then 'big' else 'small' end",
    )
    .unwrap();
    assert_snapshot!(
        relation.to_string(),
        @"SELECT CASE kind WHEN a THEN 1 WHEN b THEN 2 ELSE 0 END, CASE WHEN total > 100 THEN big ELSE small END"
    );
    assert!(matches!(relation.select[0], Expr::SimpleCase { .. }));
    assert!(matches!(relation.select[1], Expr::Case { .. }));
}

// ============================================================================
// Relation clauses
// ============================================================================

#[test]
fn test_missing_select_defaults_to_wildcard() {
    let relation = parse("where a = 1").unwrap();
    assert_eq!(relation.select, vec![Expr::Wildcard]);
    assert_eq!(parse("").unwrap(), Relation::default());
}

#[test]
fn test_full_relation() {
    let relation = parse(
        "select region, sum where year >= 2010 group by region having region <> 'x' \
         order by region desc, sum limit 20 offset 40",
    )
    .unwrap();
    assert_snapshot!(
        relation.to_string(),
        @"SELECT region, sum WHERE year >= 2010 GROUP BY region HAVING region <> x ORDER BY region DESC, sum ASC LIMIT 20 OFFSET 40"
    );
    let order_by = relation.order_by.unwrap();
    assert_eq!(order_by[0].direction, SortDirection::Desc);
    assert!(order_by[1].is_ascending());
}

#[test]
fn test_json_shape() {
    let relation = parse("select a where b = 1 limit 2").unwrap();
    let json = serde_json::to_string_pretty(&relation).unwrap();
    assert_snapshot!(json, @r#"
    {
      "select": [
        {
          "kind": "column",
          "value": "a"
        }
      ],
      "where": {
        "kind": "compare",
        "left": {
          "kind": "column",
          "value": "b"
        },
        "op": "=",
        "right": {
          "kind": "literal",
          "value": {
            "type": "number",
            "value": "1"
          }
        }
      },
      "group_by": null,
      "order_by": null,
      "limit": 2,
      "offset": null
    }
    "#);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_syntax_error_reports_position_and_expectations() {
    let err = parse("select a where").unwrap_err();
    match &err {
        ParseError::Syntax {
            position, found, ..
        } => {
            assert_eq!(*position, 14);
            assert_eq!(found, "end of input");
        }
        other => panic!("expected syntax error, got {:?}", other),
    }
    assert_eq!(err.position(), 14);
}

#[test]
fn test_leftover_input_is_error() {
    assert!(matches!(
        parse("select a limit 1 2"),
        Err(ParseError::Syntax { .. })
    ));
}

#[test]
fn test_lex_errors() {
    assert!(matches!(parse("where a = 'open"), Err(ParseError::Lex { .. })));
    assert!(matches!(parse("where a ; b"), Err(ParseError::Lex { .. })));
}

#[test]
fn test_adversarial_nesting_is_bounded() {
    let deep = format!("select {}1{}", "(".repeat(5000), ")".repeat(5000));
    assert!(matches!(parse(&deep), Err(ParseError::TooDeep { .. })));

    let negations = format!("select {}1", "-".repeat(5000));
    assert!(matches!(parse(&negations), Err(ParseError::TooDeep { .. })));

    let nots = format!("where {}a = 1", "not ".repeat(1000));
    assert!(matches!(parse(&nots), Err(ParseError::TooDeep { .. })));
}

/// `where (case when (case when ... then 1 end = 1) then 1 end = 1)`
fn nested_case_conditions(levels: usize) -> String {
    let mut condition = "a = 1".to_string();
    for _ in 0..levels {
        condition = format!("(case when {} then 1 end = 1)", condition);
    }
    format!("where {}", condition)
}

#[test]
fn test_nested_parenthesized_conditions_parse_in_linear_time() {
    let query = nested_case_conditions(20);
    let options = ParseOptions {
        max_depth: 256,
        ..ParseOptions::default()
    };

    let started = Instant::now();
    let relation = parse_with(&query, &options).expect("nested conditions should parse");
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "full parse took {:?}",
        started.elapsed()
    );
    assert_eq!(relation.referenced_columns(), vec!["a"]);

    let started = Instant::now();
    assert!(matches!(
        simple_parse_with(&query, &options),
        Err(QueryError::Simple(_))
    ));
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "simple parse took {:?}",
        started.elapsed()
    );
}

#[test]
fn test_nested_parenthesized_conditions_within_default_bounds() {
    let query = nested_case_conditions(20);
    let started = Instant::now();
    let result = parse(&query);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(matches!(result, Ok(_) | Err(ParseError::TooDeep { .. })));
}

#[test]
fn test_length_bound() {
    let options = ParseOptions {
        max_query_length: 16,
        max_depth: 64,
    };
    assert!(parse_with("select a", &options).is_ok());
    assert!(matches!(
        parse_with("select a, b, c, d, e", &options),
        Err(ParseError::TooLong { .. })
    ));
}

#[test]
fn test_parse_is_deterministic() {
    let query = "select a, b where a in (1, 2) and (b > 3 or not c between 1 and 2) order by a";
    assert_eq!(parse(query), parse(query));
}
