//! Tests for summing report rows.

use insta::assert_snapshot;
use reportql::reporting::{Entry, EntrySchema, FieldValue};

fn schema() -> EntrySchema {
    EntrySchema::new()
        .integer_fields("int|another_value")
        .expect("integer pattern should compile")
        .float_fields("float")
        .expect("float pattern should compile")
        .virtual_field("reduced", |entry| {
            FieldValue::Integer(entry.integer("int").unwrap_or(0) - 1)
        })
        .virtual_field("another_value", |_| FieldValue::Integer(1))
}

fn row<'s>(schema: &'s EntrySchema, int: i64, float: f64) -> Entry<'s> {
    Entry::from_row(
        schema,
        [
            ("int", FieldValue::from(int)),
            ("float", FieldValue::from(float)),
            ("foo", FieldValue::from("bar")),
        ],
    )
    .expect("row should cast")
}

#[test]
fn test_plain_field_access() {
    let schema = schema();
    let entry = Entry::from_row(&schema, [("foo", "bar")]).unwrap();
    assert_eq!(entry.get("foo"), Some(FieldValue::from("bar")));
}

#[test]
fn test_unset_plain_field_is_absent() {
    let schema = schema();
    let entry = Entry::new(&schema);
    assert_eq!(entry.get("foo"), None);
}

#[test]
fn test_integer_values_are_cast() {
    let schema = schema();
    let entry = Entry::from_row(&schema, [("int", "1")]).unwrap();
    assert_eq!(entry.get("int"), Some(FieldValue::Integer(1)));
}

#[test]
fn test_float_values_are_cast() {
    let schema = schema();
    let entry = Entry::from_row(&schema, [("float", "1.5")]).unwrap();
    assert_eq!(entry.get("float"), Some(FieldValue::Float(1.5)));
}

#[test]
fn test_unset_numeric_fields_read_as_zero() {
    let schema = schema();
    let entry = Entry::new(&schema);
    assert_eq!(entry.get("int"), Some(FieldValue::Integer(0)));
    assert_eq!(entry.get("float"), Some(FieldValue::Float(0.0)));
}

#[test]
fn test_adding_sums_numbers_and_merges_the_rest() {
    let schema = schema();
    let sum = row(&schema, 1, 1.5) + row(&schema, 2, 2.5);
    assert_eq!(sum.integer("int"), Some(3));
    assert_eq!(sum.float("float"), Some(4.0));
    assert_eq!(sum.get("foo"), Some(FieldValue::from("bar")));
}

#[test]
fn test_combined_entries_keep_adding() {
    let schema = schema();
    let sum = row(&schema, 1, 1.5) + row(&schema, 2, 2.5) + row(&schema, 3, 3.5);
    assert_eq!(sum.integer("int"), Some(6));
    assert_eq!(sum.float("float"), Some(7.5));
}

#[test]
fn test_virtual_fields_see_combined_values() {
    let schema = schema();
    let first = row(&schema, 1, 1.5);
    assert_eq!(first.integer("reduced"), Some(0));
    let sum = first + row(&schema, 2, 2.5);
    assert_eq!(sum.integer("reduced"), Some(2));
}

#[test]
fn test_summable_virtual_fields_are_summed_per_row() {
    let schema = schema();
    let first = Entry::new(&schema);
    assert_eq!(first.integer("another_value"), Some(1));
    let sum = first + Entry::new(&schema);
    assert_eq!(sum.integer("another_value"), Some(2));
}

#[test]
fn test_sum_entry_keeps_numbers_only() {
    let schema = schema();
    let sum_entry = row(&schema, 1, 1.5).to_sum_entry();
    assert_eq!(sum_entry.get("foo"), None);
    assert_eq!(sum_entry.integer("int"), Some(1));
    assert_eq!(sum_entry.float("float"), Some(1.5));
}

#[test]
fn test_sum_entry_of_combined_entries() {
    let schema = schema();
    let sum = (row(&schema, 1, 1.5) + row(&schema, 2, 2.5)).to_sum_entry();
    assert_eq!(sum.get("foo"), None);
    assert_eq!(sum.integer("int"), Some(3));
    assert_snapshot!(
        serde_json::to_string(&sum).unwrap(),
        @r#"{"another_value":2,"float":4.0,"int":3}"#
    );
}
