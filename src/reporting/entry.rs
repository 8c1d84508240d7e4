//! Aggregation of result rows.
//!
//! An [`Entry`] is one report row keyed by logical column name. Fields whose
//! names match the schema's integer or float pattern are summable: they are
//! cast when the row is read, read as zero when absent, and added when two
//! entries are combined with `+`. Any other field is merged, with the
//! right-hand side winning.
//!
//! Virtual fields are computed from the entry on every read. A summable
//! virtual field on a combined entry is the sum of its value over the rows
//! the entry was built from; any other virtual field sees the combined
//! values.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Add;

use regex::Regex;
use serde::Serialize;

use super::EntryError;

/// A single field value of a report row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(value) => Some(*value as f64),
            FieldValue::Float(value) => Some(*value),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    fn sum(&self, other: &FieldValue) -> FieldValue {
        match (self, other) {
            (FieldValue::Integer(a), FieldValue::Integer(b)) => {
                FieldValue::Integer(a.saturating_add(*b))
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => FieldValue::Float(a + b),
                _ => other.clone(),
            },
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(value) => write!(f, "{}", value),
            FieldValue::Float(value) => write!(f, "{}", value),
            FieldValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Summable {
    Integer,
    Float,
}

impl Summable {
    fn zero(self) -> FieldValue {
        match self {
            Summable::Integer => FieldValue::Integer(0),
            Summable::Float => FieldValue::Float(0.0),
        }
    }
}

type VirtualField = Box<dyn Fn(&Entry<'_>) -> FieldValue + Send + Sync>;

/// Which fields of a report row are summable, and which are computed.
///
/// Patterns match anywhere in the field name. A name matching both patterns
/// is an integer field.
#[derive(Default)]
pub struct EntrySchema {
    integer_fields: Option<Regex>,
    float_fields: Option<Regex>,
    virtual_fields: BTreeMap<String, VirtualField>,
}

impl fmt::Debug for EntrySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntrySchema")
            .field("integer_fields", &self.integer_fields.as_ref().map(Regex::as_str))
            .field("float_fields", &self.float_fields.as_ref().map(Regex::as_str))
            .field("virtual_fields", &self.virtual_fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EntrySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn integer_fields(mut self, pattern: &str) -> Result<Self, EntryError> {
        self.integer_fields = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn float_fields(mut self, pattern: &str) -> Result<Self, EntryError> {
        self.float_fields = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Declare a computed field. It shadows a stored field of the same name.
    pub fn virtual_field(
        mut self,
        name: impl Into<String>,
        compute: impl Fn(&Entry<'_>) -> FieldValue + Send + Sync + 'static,
    ) -> Self {
        self.virtual_fields.insert(name.into(), Box::new(compute));
        self
    }

    pub fn is_summable(&self, name: &str) -> bool {
        self.summable(name).is_some()
    }

    fn summable(&self, name: &str) -> Option<Summable> {
        let hit = |pattern: &Option<Regex>| pattern.as_ref().is_some_and(|re| re.is_match(name));
        if hit(&self.integer_fields) {
            Some(Summable::Integer)
        } else if hit(&self.float_fields) {
            Some(Summable::Float)
        } else {
            None
        }
    }

    fn cast(&self, name: &str, value: FieldValue) -> Result<FieldValue, EntryError> {
        let invalid = |text: &str| EntryError::InvalidNumber {
            field: name.to_string(),
            value: text.to_string(),
        };
        match (self.summable(name), value) {
            (Some(Summable::Integer), FieldValue::Text(text)) => text
                .trim()
                .parse()
                .map(FieldValue::Integer)
                .map_err(|_| invalid(&text)),
            (Some(Summable::Integer), FieldValue::Float(value)) => {
                Ok(FieldValue::Integer(value.trunc() as i64))
            }
            (Some(Summable::Float), FieldValue::Text(text)) => text
                .trim()
                .parse()
                .map(FieldValue::Float)
                .map_err(|_| invalid(&text)),
            (Some(Summable::Float), FieldValue::Integer(value)) => {
                Ok(FieldValue::Float(value as f64))
            }
            (_, value) => Ok(value),
        }
    }
}

/// One report row, or the sum of several.
#[derive(Debug, Clone)]
pub struct Entry<'s> {
    schema: &'s EntrySchema,
    fields: BTreeMap<String, FieldValue>,
    /// Stored fields of each row this entry was summed from; empty for a
    /// single row.
    rows: Vec<BTreeMap<String, FieldValue>>,
}

impl<'s> Entry<'s> {
    /// An entry with no stored fields.
    pub fn new(schema: &'s EntrySchema) -> Self {
        Self {
            schema,
            fields: BTreeMap::new(),
            rows: Vec::new(),
        }
    }

    /// Read a row, casting summable fields to their numeric type.
    pub fn from_row<K, V>(
        schema: &'s EntrySchema,
        row: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, EntryError>
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut entry = Self::new(schema);
        for (name, value) in row {
            let name = name.into();
            let value = schema.cast(&name, value.into())?;
            entry.fields.insert(name, value);
        }
        Ok(entry)
    }

    pub fn schema(&self) -> &'s EntrySchema {
        self.schema
    }

    /// Number of rows summed into this entry.
    pub fn row_count(&self) -> usize {
        self.rows.len().max(1)
    }

    /// Stored fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// A field's value. Absent summable fields read as zero; other absent
    /// fields are `None`.
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        if let Some(compute) = self.schema.virtual_fields.get(name) {
            if self.schema.is_summable(name) && !self.rows.is_empty() {
                return self
                    .rows
                    .iter()
                    .map(|fields| compute(&self.single(fields.clone())))
                    .reduce(|total, value| total.sum(&value));
            }
            return Some(compute(self));
        }
        if let Some(value) = self.fields.get(name) {
            return Some(value.clone());
        }
        self.schema.summable(name).map(Summable::zero)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|value| value.as_i64())
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|value| value.as_f64())
    }

    /// The numeric part of the entry: stored summable fields and summable
    /// virtual fields.
    pub fn to_sum_entry(&self) -> SumEntry {
        let mut values: BTreeMap<String, FieldValue> = self
            .fields
            .iter()
            .filter(|(name, _)| self.schema.is_summable(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        for name in self.schema.virtual_fields.keys() {
            if self.schema.is_summable(name) {
                if let Some(value) = self.get(name) {
                    values.insert(name.clone(), value);
                }
            }
        }
        SumEntry { values }
    }

    fn single(&self, fields: BTreeMap<String, FieldValue>) -> Entry<'s> {
        Entry {
            schema: self.schema,
            fields,
            rows: Vec::new(),
        }
    }
}

impl<'s> Add for Entry<'s> {
    type Output = Entry<'s>;

    fn add(mut self, other: Entry<'s>) -> Entry<'s> {
        let mut rows = std::mem::take(&mut self.rows);
        if rows.is_empty() {
            rows.push(self.fields.clone());
        }

        let Entry {
            fields: other_fields,
            rows: other_rows,
            ..
        } = other;
        for (name, value) in &other_fields {
            let merged = match self.fields.get(name) {
                Some(current) if self.schema.is_summable(name) => current.sum(value),
                _ => value.clone(),
            };
            self.fields.insert(name.clone(), merged);
        }

        if other_rows.is_empty() {
            rows.push(other_fields);
        } else {
            rows.extend(other_rows);
        }
        self.rows = rows;
        self
    }
}

/// The numeric totals of an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SumEntry {
    values: BTreeMap<String, FieldValue>,
}

impl SumEntry {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_i64)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}
