//! The restricted ("simple") query form.
//!
//! Hosts that can only filter on flat `column op value` conditions use this
//! form instead of the predicate tree. The grammar runs over the same tokens
//! as the full parser but accepts only:
//!
//! - `SELECT` and `GROUP BY` lists of plain column names,
//! - a `WHERE` clause made of `column op value` and `column IN (values)` terms
//!   joined by `AND`,
//! - a single `ORDER BY` column,
//! - `LIMIT` / `OFFSET` counts.
//!
//! Conditions are accumulated per column. A lone `=` collapses to its value;
//! any other operator (or several comparisons on one column) keeps the
//! ordered list of `(operator, value)` pairs.

use std::collections::BTreeMap;

use chumsky::span::SimpleSpan;
use serde::Serialize;

use super::ast::{CompareOperator, SortDirection};
use super::error::SimpleQueryError;
use super::lexer::{Keyword, Operator, Token};
use super::parser::{parse_count, Cursor};

// ============================================================================
// Result types
// ============================================================================

/// Operator of a non-equality condition, serialised as its source token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConditionOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = "<>")]
    NotEq,
    #[serde(rename = "!=")]
    BangEq,
    #[serde(rename = "in")]
    In,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Eq => "=",
            ConditionOperator::Gt => ">",
            ConditionOperator::Lt => "<",
            ConditionOperator::GtEq => ">=",
            ConditionOperator::LtEq => "<=",
            ConditionOperator::NotEq => "<>",
            ConditionOperator::BangEq => "!=",
            ConditionOperator::In => "in",
        }
    }
}

impl From<CompareOperator> for ConditionOperator {
    fn from(op: CompareOperator) -> Self {
        match op {
            CompareOperator::Eq => ConditionOperator::Eq,
            CompareOperator::Gt => ConditionOperator::Gt,
            CompareOperator::Lt => ConditionOperator::Lt,
            CompareOperator::GtEq => ConditionOperator::GtEq,
            CompareOperator::LtEq => ConditionOperator::LtEq,
            CompareOperator::NotEq => ConditionOperator::NotEq,
            CompareOperator::BangEq => ConditionOperator::BangEq,
        }
    }
}

impl std::fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a condition: one value, or the list of an `IN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Single(String),
    List(Vec<String>),
}

/// One `(operator, value)` pair of a column's condition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorCondition {
    pub op: ConditionOperator,
    pub value: ConditionValue,
}

/// All conditions placed on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Condition {
    /// `column = value`, the only comparison on the column.
    Equals(String),
    /// Every other comparison, in source order.
    Operators(Vec<OperatorCondition>),
}

impl Condition {
    /// The equality value, if this is a bare `=` condition.
    pub fn as_equals(&self) -> Option<&str> {
        match self {
            Condition::Equals(value) => Some(value),
            Condition::Operators(_) => None,
        }
    }

    /// The operator list, if this is not a bare `=` condition.
    pub fn as_operators(&self) -> Option<&[OperatorCondition]> {
        match self {
            Condition::Equals(_) => None,
            Condition::Operators(ops) => Some(ops),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimpleOrder {
    pub column: String,
    pub direction: SortDirection,
}

impl SimpleOrder {
    pub fn is_ascending(&self) -> bool {
        self.direction.is_ascending()
    }
}

/// The flat result of a simple-mode parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimpleQuery {
    /// Selected column names; `*` is kept as written.
    pub select: Vec<String>,
    pub group_by: Vec<String>,
    pub order_by: Option<SimpleOrder>,
    pub conditions: BTreeMap<String, Condition>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SimpleQuery {
    /// Record a condition on `column`, enforcing that `=` stands alone.
    pub fn add_condition(
        &mut self,
        column: &str,
        op: ConditionOperator,
        value: ConditionValue,
    ) -> Result<(), SimpleQueryError> {
        match self.conditions.get_mut(column) {
            None => {
                let condition = match (op, value) {
                    (ConditionOperator::Eq, ConditionValue::Single(value)) => {
                        Condition::Equals(value)
                    }
                    (op, value) => Condition::Operators(vec![OperatorCondition { op, value }]),
                };
                self.conditions.insert(column.to_string(), condition);
            }
            Some(Condition::Operators(ops)) if op != ConditionOperator::Eq => {
                ops.push(OperatorCondition { op, value });
            }
            Some(_) => {
                return Err(SimpleQueryError::MixedOperators {
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Every column the query mentions: selected, grouped, ordered and
    /// filtered, in that order and without duplicates.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        let order = self.order_by.as_ref().map(|order| order.column.as_str());
        let names = self
            .select
            .iter()
            .chain(&self.group_by)
            .map(String::as_str)
            .chain(order)
            .chain(self.conditions.keys().map(String::as_str));
        for name in names {
            if name != "*" && !columns.contains(&name) {
                columns.push(name);
            }
        }
        columns
    }
}

// ============================================================================
// Restricted grammar
// ============================================================================

const AFTER_SELECT: [Keyword; 5] = [
    Keyword::Where,
    Keyword::Group,
    Keyword::Order,
    Keyword::Limit,
    Keyword::Offset,
];
const AFTER_WHERE: [Keyword; 4] = [
    Keyword::Group,
    Keyword::Order,
    Keyword::Limit,
    Keyword::Offset,
];
const AFTER_GROUP: [Keyword; 4] = [
    Keyword::Having,
    Keyword::Order,
    Keyword::Limit,
    Keyword::Offset,
];
const AFTER_ORDER: [Keyword; 2] = [Keyword::Limit, Keyword::Offset];

/// Parse lexed tokens with the restricted grammar.
///
/// Inputs the full grammar would also reject come back as
/// [`SimpleQueryError::Unsupported`]; telling the two apart is up to the
/// caller (see [`simple_parse`](super::simple_parse)).
pub fn parse_simple(
    tokens: &[(Token<'_>, SimpleSpan)],
    eoi: usize,
) -> Result<SimpleQuery, SimpleQueryError> {
    SimpleParser {
        cursor: Cursor::new(tokens, eoi),
        query: SimpleQuery::default(),
    }
    .run()
}

struct SimpleParser<'t, 'src> {
    cursor: Cursor<'t, 'src>,
    query: SimpleQuery,
}

impl<'t, 'src> SimpleParser<'t, 'src> {
    fn run(mut self) -> Result<SimpleQuery, SimpleQueryError> {
        if self.cursor.eat_keyword(Keyword::Select) {
            self.query.select =
                self.name_list(true, &AFTER_SELECT, SimpleQueryError::NonColumnSelect)?;
        }
        if self.cursor.eat_keyword(Keyword::Where) {
            self.where_clause()?;
        }
        if self.cursor.eat_keyword(Keyword::Group) {
            self.expect_by()?;
            self.query.group_by =
                self.name_list(false, &AFTER_GROUP, SimpleQueryError::NonColumnGroupBy)?;
            if self.cursor.at_keyword(Keyword::Having) {
                return Err(SimpleQueryError::HavingNotSupported);
            }
        }
        if self.cursor.eat_keyword(Keyword::Order) {
            self.expect_by()?;
            self.order_clause()?;
        }
        self.query.limit = self.count_clause(Keyword::Limit)?;
        self.query.offset = self.count_clause(Keyword::Offset)?;

        if !self.cursor.is_at_end() {
            return Err(self.unsupported());
        }
        Ok(self.query)
    }

    fn unsupported(&self) -> SimpleQueryError {
        SimpleQueryError::Unsupported {
            position: self.cursor.position(),
            found: self.cursor.found(),
        }
    }

    fn unsupported_condition(&self) -> SimpleQueryError {
        SimpleQueryError::UnsupportedCondition {
            position: self.cursor.position(),
            found: self.cursor.found(),
        }
    }

    fn expect_by(&mut self) -> Result<(), SimpleQueryError> {
        if self.cursor.eat_keyword(Keyword::By) {
            Ok(())
        } else {
            Err(self.unsupported())
        }
    }

    /// Column names separated by commas, ending at one of `boundary`.
    fn name_list(
        &mut self,
        allow_wildcard: bool,
        boundary: &[Keyword],
        non_column: SimpleQueryError,
    ) -> Result<Vec<String>, SimpleQueryError> {
        let mut names = Vec::new();
        loop {
            let name = match self.cursor.peek() {
                Some(Token::Operator(Operator::Star)) if allow_wildcard => "*",
                Some(tok) => match tok.as_name() {
                    Some(name) => name,
                    None => return Err(non_column),
                },
                None => return Err(non_column),
            };
            self.cursor.advance();
            names.push(name.to_string());

            if self.cursor.eat_op(Operator::Comma) {
                continue;
            }
            if self.cursor.at_clause_boundary(boundary) {
                return Ok(names);
            }
            return Err(non_column);
        }
    }

    fn where_clause(&mut self) -> Result<(), SimpleQueryError> {
        loop {
            self.condition()?;
            match self.cursor.peek() {
                Some(Token::Keyword(Keyword::And)) => {
                    self.cursor.advance();
                }
                Some(Token::Keyword(Keyword::Or)) => {
                    return Err(SimpleQueryError::DisallowedConnective("OR".to_string()));
                }
                _ if self.cursor.at_clause_boundary(&AFTER_WHERE) => return Ok(()),
                _ => return Err(self.unsupported_condition()),
            }
        }
    }

    /// `column op value` or `column IN (value, ...)`.
    fn condition(&mut self) -> Result<(), SimpleQueryError> {
        match self.cursor.peek() {
            Some(Token::Operator(Operator::LParen)) => {
                return Err(SimpleQueryError::NestedCondition);
            }
            Some(Token::Keyword(Keyword::Not)) => {
                return Err(SimpleQueryError::DisallowedConnective("NOT".to_string()));
            }
            _ => {}
        }

        let Some(column) = self.cursor.peek().and_then(Token::as_name) else {
            return Err(self.unsupported_condition());
        };
        self.cursor.advance();

        if let Some(op) = self.cursor.eat_comparator() {
            let value = self.value()?;
            return self.query.add_condition(
                column,
                op.into(),
                ConditionValue::Single(value),
            );
        }

        if self.cursor.eat_keyword(Keyword::In) {
            if !self.cursor.eat_op(Operator::LParen) {
                return Err(self.unsupported_condition());
            }
            let mut values = vec![self.value()?];
            while self.cursor.eat_op(Operator::Comma) {
                values.push(self.value()?);
            }
            if !self.cursor.eat_op(Operator::RParen) {
                return Err(self.unsupported_condition());
            }
            return self.query.add_condition(
                column,
                ConditionOperator::In,
                ConditionValue::List(values),
            );
        }

        Err(self.unsupported_condition())
    }

    /// A literal, a (possibly negated) number, or a plain word.
    fn value(&mut self) -> Result<String, SimpleQueryError> {
        let value = match self.cursor.peek() {
            Some(Token::Number(text)) => text.to_string(),
            Some(Token::StringLit(text)) => text.clone(),
            Some(Token::Ident(name)) | Some(Token::QuotedIdent(name)) => name.to_string(),
            Some(Token::Operator(Operator::Minus)) => match self.cursor.peek_nth(1) {
                Some(Token::Number(text)) => {
                    self.cursor.advance();
                    format!("-{}", text)
                }
                _ => return Err(self.unsupported_condition()),
            },
            _ => return Err(self.unsupported_condition()),
        };
        self.cursor.advance();
        Ok(value)
    }

    fn order_clause(&mut self) -> Result<(), SimpleQueryError> {
        let Some(column) = self.cursor.peek().and_then(Token::as_name) else {
            return Err(SimpleQueryError::NonColumnOrderBy);
        };
        self.cursor.advance();
        let direction = self.cursor.sort_direction();

        if self.cursor.at_op(Operator::Comma) {
            return Err(SimpleQueryError::MultipleOrderElements);
        }
        if !self.cursor.at_clause_boundary(&AFTER_ORDER) {
            return Err(SimpleQueryError::NonColumnOrderBy);
        }
        self.query.order_by = Some(SimpleOrder {
            column: column.to_string(),
            direction,
        });
        Ok(())
    }

    fn count_clause(&mut self, kw: Keyword) -> Result<Option<u64>, SimpleQueryError> {
        if !self.cursor.eat_keyword(kw) {
            return Ok(None);
        }
        match self.cursor.peek() {
            Some(Token::Number(text)) => match parse_count(text) {
                Some(count) => {
                    self.cursor.advance();
                    Ok(Some(count))
                }
                None => Err(self.unsupported()),
            },
            _ => Err(self.unsupported()),
        }
    }
}
