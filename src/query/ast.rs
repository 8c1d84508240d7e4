//! AST node types for reporting queries.
//!
//! A parsed query is a [`Relation`]: a select list, an optional `WHERE`
//! [`Predicate`], grouping, ordering and paging. Expressions and predicates
//! are closed sum types; every consumer matches them exhaustively.

use std::fmt;

use serde::Serialize;

// ============================================================================
// Operators
// ============================================================================

/// Arithmetic operator of a binary expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
        }
    }
}

/// Comparison operator, kept in the spelling it was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompareOperator {
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
    /// `<>`
    #[serde(rename = "<>")]
    NotEq,
    /// `!=`
    #[serde(rename = "!=")]
    BangEq,
}

impl CompareOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOperator::Eq => "=",
            CompareOperator::Gt => ">",
            CompareOperator::Lt => "<",
            CompareOperator::GtEq => ">=",
            CompareOperator::LtEq => "<=",
            CompareOperator::NotEq => "<>",
            CompareOperator::BangEq => "!=",
        }
    }
}

/// Boolean connective of a compound predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

/// Sort direction of an `ORDER BY` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn is_ascending(&self) -> bool {
        matches!(self, SortDirection::Asc)
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// A literal value as written in the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    /// A number, kept in its source spelling.
    Number(String),
    /// A string with escapes decoded.
    String(String),
}

impl Literal {
    /// The plain text of the value.
    pub fn as_str(&self) -> &str {
        match self {
            Literal::Number(s) | Literal::String(s) => s,
        }
    }
}

/// A value expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Expr {
    Literal(Literal),
    /// `$name`
    Variable(String),
    /// A bare or back-quoted column name.
    Column(String),
    /// `*`
    Wildcard,
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary minus.
    Negate(Box<Expr>),
    /// `CASE subject WHEN value THEN result ... [ELSE default] END`
    SimpleCase {
        subject: Box<Expr>,
        branches: Vec<(Expr, Expr)>,
        default: Option<Box<Expr>>,
    },
    /// `CASE WHEN condition THEN result ... [ELSE default] END`
    Case {
        branches: Vec<(Predicate, Expr)>,
        default: Option<Box<Expr>>,
    },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn number(text: impl Into<String>) -> Self {
        Expr::Literal(Literal::Number(text.into()))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(text.into()))
    }

    /// The column name if this is a plain column reference.
    pub fn as_column(&self) -> Option<&str> {
        match self {
            Expr::Column(name) => Some(name),
            _ => None,
        }
    }

    /// Column names referenced by this expression, in first-occurrence order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    pub(crate) fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => push_unique(out, name),
            Expr::Literal(_) | Expr::Variable(_) | Expr::Wildcard => {}
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Negate(operand) => operand.collect_columns(out),
            Expr::SimpleCase {
                subject,
                branches,
                default,
            } => {
                subject.collect_columns(out);
                for (when, then) in branches {
                    when.collect_columns(out);
                    then.collect_columns(out);
                }
                if let Some(default) = default {
                    default.collect_columns(out);
                }
            }
            Expr::Case { branches, default } => {
                for (condition, then) in branches {
                    condition.collect_columns(out);
                    then.collect_columns(out);
                }
                if let Some(default) = default {
                    default.collect_columns(out);
                }
            }
        }
    }
}

fn push_unique<'a>(out: &mut Vec<&'a str>, name: &'a str) {
    if !out.contains(&name) {
        out.push(name);
    }
}

// ============================================================================
// Predicates
// ============================================================================

/// A boolean expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// `TRUE` / `FALSE`
    Constant { value: bool },
    Compare {
        left: Expr,
        op: CompareOperator,
        right: Expr,
    },
    /// `(a, b) = (1, 2)`
    GroupCompare {
        left: Vec<Expr>,
        op: CompareOperator,
        right: Vec<Expr>,
    },
    In {
        expr: Expr,
        values: Vec<Expr>,
    },
    NotIn {
        expr: Expr,
        values: Vec<Expr>,
    },
    InRelation {
        expr: Expr,
        relation: Box<Relation>,
    },
    NotInRelation {
        expr: Expr,
        relation: Box<Relation>,
    },
    Between {
        expr: Expr,
        low: Expr,
        high: Expr,
    },
    NotBetween {
        expr: Expr,
        low: Expr,
        high: Expr,
    },
    Exists {
        relation: Box<Relation>,
    },
    NotExists {
        relation: Box<Relation>,
    },
    Not {
        predicate: Box<Predicate>,
    },
    Compound {
        left: Box<Predicate>,
        op: LogicalOperator,
        right: Box<Predicate>,
    },
}

impl Predicate {
    /// Column names referenced by this predicate, sub-relations included.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    pub(crate) fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Constant { .. } => {}
            Predicate::Compare { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Predicate::GroupCompare { left, right, .. } => {
                for expr in left.iter().chain(right) {
                    expr.collect_columns(out);
                }
            }
            Predicate::In { expr, values } | Predicate::NotIn { expr, values } => {
                expr.collect_columns(out);
                for value in values {
                    value.collect_columns(out);
                }
            }
            Predicate::InRelation { expr, relation }
            | Predicate::NotInRelation { expr, relation } => {
                expr.collect_columns(out);
                relation.collect_columns(out);
            }
            Predicate::Between { expr, low, high } | Predicate::NotBetween { expr, low, high } => {
                expr.collect_columns(out);
                low.collect_columns(out);
                high.collect_columns(out);
            }
            Predicate::Exists { relation } | Predicate::NotExists { relation } => {
                relation.collect_columns(out);
            }
            Predicate::Not { predicate } => predicate.collect_columns(out),
            Predicate::Compound { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
        }
    }
}

// ============================================================================
// Relation
// ============================================================================

/// One `ORDER BY` element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderElement {
    pub expr: Expr,
    pub direction: SortDirection,
}

impl OrderElement {
    pub fn is_ascending(&self) -> bool {
        self.direction.is_ascending()
    }
}

/// `GROUP BY` expressions with an optional `HAVING` predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupByClause {
    pub exprs: Vec<Expr>,
    pub having: Option<Predicate>,
}

/// A fully parsed query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relation {
    /// Select list; `[Wildcard]` when the query has no `SELECT`.
    pub select: Vec<Expr>,
    #[serde(rename = "where")]
    pub where_clause: Option<Predicate>,
    pub group_by: Option<GroupByClause>,
    pub order_by: Option<Vec<OrderElement>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Default for Relation {
    fn default() -> Self {
        Self {
            select: vec![Expr::Wildcard],
            where_clause: None,
            group_by: None,
            order_by: None,
            limit: None,
            offset: None,
        }
    }
}

impl Relation {
    /// Every column name referenced anywhere in the relation, in
    /// first-occurrence order.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    pub(crate) fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        for expr in &self.select {
            expr.collect_columns(out);
        }
        if let Some(predicate) = &self.where_clause {
            predicate.collect_columns(out);
        }
        if let Some(group_by) = &self.group_by {
            for expr in &group_by.exprs {
                expr.collect_columns(out);
            }
            if let Some(having) = &group_by.having {
                having.collect_columns(out);
            }
        }
        for element in self.order_by.iter().flatten() {
            element.expr.collect_columns(out);
        }
    }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write a list of items separated by `, `.
fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Operands that are themselves operations are parenthesized.
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Binary { .. } | Expr::Negate(_) => write!(f, "({})", expr),
        _ => write!(f, "{}", expr),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(literal) => write!(f, "{}", literal),
            Expr::Variable(name) => write!(f, "${}", name),
            Expr::Column(name) => f.write_str(name),
            Expr::Wildcard => f.write_str("*"),
            Expr::Binary { op, left, right } => {
                write_operand(f, left)?;
                write!(f, " {} ", op.as_str())?;
                write_operand(f, right)
            }
            Expr::Negate(operand) => {
                f.write_str("-")?;
                write_operand(f, operand)
            }
            Expr::SimpleCase {
                subject,
                branches,
                default,
            } => {
                write!(f, "CASE {}", subject)?;
                for (when, then) in branches {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(default) = default {
                    write!(f, " ELSE {}", default)?;
                }
                f.write_str(" END")
            }
            Expr::Case { branches, default } => {
                f.write_str("CASE")?;
                for (condition, then) in branches {
                    write!(f, " WHEN {} THEN {}", condition, then)?;
                }
                if let Some(default) = default {
                    write!(f, " ELSE {}", default)?;
                }
                f.write_str(" END")
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Constant { value } => f.write_str(if *value { "TRUE" } else { "FALSE" }),
            Predicate::Compare { left, op, right } => {
                write!(f, "{} {} {}", left, op.as_str(), right)
            }
            Predicate::GroupCompare { left, op, right } => {
                f.write_str("(")?;
                write_list(f, left)?;
                write!(f, ") {} (", op.as_str())?;
                write_list(f, right)?;
                f.write_str(")")
            }
            Predicate::In { expr, values } => {
                write!(f, "{} IN (", expr)?;
                write_list(f, values)?;
                f.write_str(")")
            }
            Predicate::NotIn { expr, values } => {
                write!(f, "{} NOT IN (", expr)?;
                write_list(f, values)?;
                f.write_str(")")
            }
            Predicate::InRelation { expr, relation } => write!(f, "{} IN ({})", expr, relation),
            Predicate::NotInRelation { expr, relation } => {
                write!(f, "{} NOT IN ({})", expr, relation)
            }
            Predicate::Between { expr, low, high } => {
                write!(f, "{} BETWEEN {} AND {}", expr, low, high)
            }
            Predicate::NotBetween { expr, low, high } => {
                write!(f, "{} NOT BETWEEN {} AND {}", expr, low, high)
            }
            Predicate::Exists { relation } => write!(f, "EXISTS ({})", relation),
            Predicate::NotExists { relation } => write!(f, "NOT EXISTS ({})", relation),
            Predicate::Not { predicate } => match predicate.as_ref() {
                Predicate::Compound { .. } => write!(f, "NOT ({})", predicate),
                _ => write!(f, "NOT {}", predicate),
            },
            Predicate::Compound { left, op, right } => {
                write_connected(f, left, *op, false)?;
                write!(f, " {} ", op.as_str())?;
                write_connected(f, right, *op, true)
            }
        }
    }
}

/// Parenthesize a compound operand whenever dropping the parentheses would
/// re-associate it differently.
fn write_connected(
    f: &mut fmt::Formatter<'_>,
    operand: &Predicate,
    parent: LogicalOperator,
    is_right: bool,
) -> fmt::Result {
    match operand {
        Predicate::Compound { op, .. } if *op != parent || is_right => {
            write!(f, "({})", operand)
        }
        _ => write!(f, "{}", operand),
    }
}

impl fmt::Display for OrderElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expr, self.direction.as_sql())
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        write_list(f, &self.select)?;
        if let Some(predicate) = &self.where_clause {
            write!(f, " WHERE {}", predicate)?;
        }
        if let Some(group_by) = &self.group_by {
            f.write_str(" GROUP BY ")?;
            write_list(f, &group_by.exprs)?;
            if let Some(having) = &group_by.having {
                write!(f, " HAVING {}", having)?;
            }
        }
        if let Some(order_by) = &self.order_by {
            f.write_str(" ORDER BY ")?;
            write_list(f, order_by)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}
