//! Parser for the full query grammar.
//!
//! Expressions, predicates and relations are mutually recursive: a predicate
//! contains expressions, `CASE WHEN` expressions contain predicates, and
//! `EXISTS (...)` / `IN (...)` predicates contain relations. All three are
//! methods on one [`Parser`], so the recursion is resolved at compile time.
//!
//! Infix operators are driven by the precedence tables below using
//! precedence climbing. Every operator is left-associative; changing a level
//! never touches the grammar code.
//!
//! The parser never backtracks. A parenthesized operand in a condition may
//! be a nested predicate, an expression or the left side of a group
//! comparison; it is parsed once and classified by what follows it. Parse
//! time is therefore linear in the number of tokens.

use chumsky::span::SimpleSpan;

use super::ast::*;
use super::error::{ParseError, ParseResult};
use super::lexer::{Keyword, Operator, Token};

// ============================================================================
// Precedence tables
// ============================================================================

/// A left-associative infix operator: the token that spells it, its level
/// and the operator it builds.
#[derive(Debug, Clone, Copy)]
pub struct InfixRule<T, O> {
    pub token: T,
    pub level: u8,
    pub op: O,
}

impl<T, O> InfixRule<T, O> {
    /// Minimum level for the right-hand operand.
    fn right_level(&self) -> u8 {
        self.level + 1
    }
}

const fn rule<T, O>(token: T, level: u8, op: O) -> InfixRule<T, O> {
    InfixRule { token, level, op }
}

/// Arithmetic operators: `+ -` below `* / %`.
pub static EXPR_OPERATORS: [InfixRule<Operator, BinaryOperator>; 5] = [
    rule(Operator::Plus, 20, BinaryOperator::Add),
    rule(Operator::Minus, 20, BinaryOperator::Subtract),
    rule(Operator::Star, 30, BinaryOperator::Multiply),
    rule(Operator::Slash, 30, BinaryOperator::Divide),
    rule(Operator::Percent, 30, BinaryOperator::Modulo),
];

/// Level of prefix `-`.
pub const NEGATE_LEVEL: u8 = 50;

/// Boolean connectives: `OR` below `AND`.
pub static PREDICATE_OPERATORS: [InfixRule<Keyword, LogicalOperator>; 2] = [
    rule(Keyword::Or, 20, LogicalOperator::Or),
    rule(Keyword::And, 30, LogicalOperator::And),
];

/// Level of prefix `NOT`.
pub const NOT_LEVEL: u8 = 40;

/// Comparison operator tokens.
pub static COMPARATORS: [(Operator, CompareOperator); 7] = [
    (Operator::Eq, CompareOperator::Eq),
    (Operator::Gt, CompareOperator::Gt),
    (Operator::Lt, CompareOperator::Lt),
    (Operator::GtEq, CompareOperator::GtEq),
    (Operator::LtEq, CompareOperator::LtEq),
    (Operator::LtGt, CompareOperator::NotEq),
    (Operator::BangEq, CompareOperator::BangEq),
];

/// Keywords that can open a relation clause.
const RELATION_CLAUSES: [Keyword; 6] = [
    Keyword::Select,
    Keyword::Where,
    Keyword::Group,
    Keyword::Order,
    Keyword::Limit,
    Keyword::Offset,
];

// ============================================================================
// Token cursor
// ============================================================================

/// Read position over a lexed token slice.
#[derive(Debug, Clone)]
pub(crate) struct Cursor<'t, 'src> {
    tokens: &'t [(Token<'src>, SimpleSpan)],
    pos: usize,
    /// Byte offset reported for the end of input.
    eoi: usize,
}

impl<'t, 'src> Cursor<'t, 'src> {
    pub(crate) fn new(tokens: &'t [(Token<'src>, SimpleSpan)], eoi: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            eoi,
        }
    }

    pub(crate) fn peek(&self) -> Option<&'t Token<'src>> {
        self.peek_nth(0)
    }

    pub(crate) fn peek_nth(&self, n: usize) -> Option<&'t Token<'src>> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    pub(crate) fn advance(&mut self) -> Option<&'t Token<'src>> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Byte offset of the current token.
    pub(crate) fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.eoi)
    }

    /// Description of the current token for diagnostics.
    pub(crate) fn found(&self) -> String {
        match self.peek() {
            Some(tok) => format!("'{}'", tok),
            None => "end of input".to_string(),
        }
    }

    pub(crate) fn at_keyword(&self, kw: Keyword) -> bool {
        self.keyword_at(0, kw)
    }

    pub(crate) fn keyword_at(&self, n: usize, kw: Keyword) -> bool {
        matches!(self.peek_nth(n), Some(Token::Keyword(k)) if *k == kw)
    }

    pub(crate) fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.at_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn at_op(&self, op: Operator) -> bool {
        matches!(self.peek(), Some(Token::Operator(o)) if *o == op)
    }

    pub(crate) fn eat_op(&mut self, op: Operator) -> bool {
        if self.at_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume a comparison operator if one is next.
    pub(crate) fn eat_comparator(&mut self) -> Option<CompareOperator> {
        let Some(Token::Operator(op)) = self.peek() else {
            return None;
        };
        let (_, cmp) = COMPARATORS.iter().find(|(tok, _)| tok == op)?;
        self.pos += 1;
        Some(*cmp)
    }

    /// Consume an optional `ASC` / `DESC`.
    pub(crate) fn sort_direction(&mut self) -> SortDirection {
        if self.eat_keyword(Keyword::Desc) {
            SortDirection::Desc
        } else {
            self.eat_keyword(Keyword::Asc);
            SortDirection::Asc
        }
    }

    /// Whether the next token opens one of the given clauses or ends input.
    pub(crate) fn at_clause_boundary(&self, clauses: &[Keyword]) -> bool {
        match self.peek() {
            None => true,
            Some(Token::Keyword(kw)) => clauses.contains(kw),
            _ => false,
        }
    }
}

/// Parse the count of a `LIMIT` / `OFFSET` clause.
pub(crate) fn parse_count(text: &str) -> Option<u64> {
    if text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

// ============================================================================
// Parser
// ============================================================================

/// A condition operand whose role is settled by the tokens after it.
#[derive(Debug)]
enum Operand {
    Predicate(Predicate),
    /// An expression not (yet) followed by a comparison.
    Expr(Expr),
}

/// Recursive-descent parser for the full query grammar.
pub struct Parser<'t, 'src> {
    cursor: Cursor<'t, 'src>,
    depth: usize,
    max_depth: usize,
}

impl<'t, 'src> Parser<'t, 'src> {
    /// Create a parser over lexed tokens. `eoi` is the byte length of the
    /// source, reported as the position of errors at end of input.
    pub fn new(tokens: &'t [(Token<'src>, SimpleSpan)], eoi: usize, max_depth: usize) -> Self {
        Self {
            cursor: Cursor::new(tokens, eoi),
            depth: 0,
            max_depth,
        }
    }

    /// Parse a complete query; every token must be consumed.
    pub fn parse_query(mut self) -> ParseResult<Relation> {
        let relation = self.parse_relation()?;
        if !self.cursor.is_at_end() {
            return self.fail("end of input");
        }
        Ok(relation)
    }

    /// A syntax error at the current token.
    fn fail<T>(&self, expected: &str) -> ParseResult<T> {
        Err(ParseError::Syntax {
            position: self.cursor.position(),
            expected: vec![expected.to_string()],
            found: self.cursor.found(),
        })
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= self.max_depth {
            return Err(ParseError::TooDeep {
                position: self.cursor.position(),
                max_depth: self.max_depth,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expect_keyword(&mut self, kw: Keyword) -> ParseResult<()> {
        if self.cursor.eat_keyword(kw) {
            Ok(())
        } else {
            self.fail(&kw.as_str().to_uppercase())
        }
    }

    fn expect_op(&mut self, op: Operator) -> ParseResult<()> {
        if self.cursor.eat_op(op) {
            Ok(())
        } else {
            self.fail(&format!("'{}'", op))
        }
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    /// `[SELECT ...] [WHERE ...] [GROUP BY ... [HAVING ...]] [ORDER BY ...]
    /// [LIMIT n] [OFFSET n]`
    pub fn parse_relation(&mut self) -> ParseResult<Relation> {
        self.nested(|p| {
            let select = if p.cursor.eat_keyword(Keyword::Select) {
                p.expr_list()?
            } else {
                vec![Expr::Wildcard]
            };

            let where_clause = if p.cursor.eat_keyword(Keyword::Where) {
                Some(p.parse_predicate()?)
            } else {
                None
            };

            let group_by = if p.cursor.eat_keyword(Keyword::Group) {
                p.expect_keyword(Keyword::By)?;
                let exprs = p.expr_list()?;
                let having = if p.cursor.eat_keyword(Keyword::Having) {
                    Some(p.parse_predicate()?)
                } else {
                    None
                };
                Some(GroupByClause { exprs, having })
            } else {
                None
            };

            let order_by = if p.cursor.eat_keyword(Keyword::Order) {
                p.expect_keyword(Keyword::By)?;
                let mut elements = vec![p.order_element()?];
                while p.cursor.eat_op(Operator::Comma) {
                    elements.push(p.order_element()?);
                }
                Some(elements)
            } else {
                None
            };

            let limit = p.count_clause(Keyword::Limit)?;
            let offset = p.count_clause(Keyword::Offset)?;

            Ok(Relation {
                select,
                where_clause,
                group_by,
                order_by,
                limit,
                offset,
            })
        })
    }

    fn order_element(&mut self) -> ParseResult<OrderElement> {
        let expr = self.parse_expr()?;
        let direction = self.cursor.sort_direction();
        Ok(OrderElement { expr, direction })
    }

    fn count_clause(&mut self, kw: Keyword) -> ParseResult<Option<u64>> {
        if !self.cursor.eat_keyword(kw) {
            return Ok(None);
        }
        match self.cursor.peek() {
            Some(Token::Number(text)) => match parse_count(text) {
                Some(count) => {
                    self.cursor.advance();
                    Ok(Some(count))
                }
                None => self.fail("non-negative integer"),
            },
            _ => self.fail("non-negative integer"),
        }
    }

    /// `( relation )`
    fn sub_relation(&mut self) -> ParseResult<Relation> {
        self.expect_op(Operator::LParen)?;
        let relation = self.parse_relation()?;
        self.expect_op(Operator::RParen)?;
        Ok(relation)
    }

    // ------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------

    pub fn parse_predicate(&mut self) -> ParseResult<Predicate> {
        let operand = self.condition(0)?;
        self.into_predicate(operand)
    }

    /// A bare expression where a predicate is required is an error at the
    /// token after it.
    fn into_predicate(&self, operand: Operand) -> ParseResult<Predicate> {
        match operand {
            Operand::Predicate(predicate) => Ok(predicate),
            Operand::Expr(_) => self.fail("comparison operator"),
        }
    }

    fn condition(&mut self, min_level: u8) -> ParseResult<Operand> {
        self.nested(|p| {
            let mut lhs = if p.cursor.at_keyword(Keyword::Not)
                && !p.cursor.keyword_at(1, Keyword::Exists)
            {
                p.cursor.advance();
                let operand = p.condition(NOT_LEVEL)?;
                Operand::Predicate(Predicate::Not {
                    predicate: Box::new(p.into_predicate(operand)?),
                })
            } else {
                p.condition_term()?
            };

            while let Some(rule) = p.peek_logical_operator() {
                if rule.level < min_level {
                    break;
                }
                let left = p.into_predicate(lhs)?;
                p.cursor.advance();
                let right = p.condition(rule.right_level())?;
                let right = p.into_predicate(right)?;
                lhs = Operand::Predicate(Predicate::Compound {
                    left: Box::new(left),
                    op: rule.op,
                    right: Box::new(right),
                });
            }
            Ok(lhs)
        })
    }

    fn peek_logical_operator(&self) -> Option<&'static InfixRule<Keyword, LogicalOperator>> {
        let Some(Token::Keyword(kw)) = self.cursor.peek() else {
            return None;
        };
        PREDICATE_OPERATORS.iter().find(|rule| rule.token == *kw)
    }

    fn condition_term(&mut self) -> ParseResult<Operand> {
        if self.cursor.eat_keyword(Keyword::True) {
            return Ok(Operand::Predicate(Predicate::Constant { value: true }));
        }
        if self.cursor.eat_keyword(Keyword::False) {
            return Ok(Operand::Predicate(Predicate::Constant { value: false }));
        }
        if self.cursor.eat_keyword(Keyword::Exists) {
            let relation = self.sub_relation()?;
            return Ok(Operand::Predicate(Predicate::Exists {
                relation: Box::new(relation),
            }));
        }
        if self.cursor.at_keyword(Keyword::Not) && self.cursor.keyword_at(1, Keyword::Exists) {
            self.cursor.advance();
            self.cursor.advance();
            let relation = self.sub_relation()?;
            return Ok(Operand::Predicate(Predicate::NotExists {
                relation: Box::new(relation),
            }));
        }
        if self.cursor.eat_op(Operator::LParen) {
            return self.parenthesized_term();
        }
        let left = self.parse_expr()?;
        self.comparison_tail(left)
    }

    /// The rest of a condition term opened by `(`: a nested predicate, a
    /// parenthesized expression continuing into a comparison, or the left
    /// list of a group comparison.
    fn parenthesized_term(&mut self) -> ParseResult<Operand> {
        match self.condition(0)? {
            Operand::Predicate(predicate) => {
                self.expect_op(Operator::RParen)?;
                Ok(Operand::Predicate(predicate))
            }
            Operand::Expr(first) if self.cursor.eat_op(Operator::Comma) => {
                let mut left = vec![first];
                left.extend(self.expr_list()?);
                self.expect_op(Operator::RParen)?;
                self.group_comparison(left)
            }
            Operand::Expr(inner) => {
                self.expect_op(Operator::RParen)?;
                let left = self.expr_infix(inner, 0)?;
                self.comparison_tail(left)
            }
        }
    }

    /// `op expr`, `[NOT] IN (...)` or `[NOT] BETWEEN ...` after `left`; with
    /// none of these, `left` stays an expression.
    fn comparison_tail(&mut self, left: Expr) -> ParseResult<Operand> {
        if let Some(op) = self.cursor.eat_comparator() {
            let right = self.parse_expr()?;
            return Ok(Operand::Predicate(Predicate::Compare { left, op, right }));
        }
        if self.cursor.eat_keyword(Keyword::In) {
            return self.in_tail(left, false).map(Operand::Predicate);
        }
        if self.cursor.eat_keyword(Keyword::Between) {
            return self.between_tail(left, false).map(Operand::Predicate);
        }
        if self.cursor.at_keyword(Keyword::Not) {
            if self.cursor.keyword_at(1, Keyword::In) {
                self.cursor.advance();
                self.cursor.advance();
                return self.in_tail(left, true).map(Operand::Predicate);
            }
            if self.cursor.keyword_at(1, Keyword::Between) {
                self.cursor.advance();
                self.cursor.advance();
                return self.between_tail(left, true).map(Operand::Predicate);
            }
        }
        Ok(Operand::Expr(left))
    }

    fn in_tail(&mut self, expr: Expr, negated: bool) -> ParseResult<Predicate> {
        self.expect_op(Operator::LParen)?;
        let is_relation = matches!(
            self.cursor.peek(),
            Some(Token::Keyword(kw)) if RELATION_CLAUSES.contains(kw)
        );
        if is_relation {
            let relation = Box::new(self.parse_relation()?);
            self.expect_op(Operator::RParen)?;
            return Ok(if negated {
                Predicate::NotInRelation { expr, relation }
            } else {
                Predicate::InRelation { expr, relation }
            });
        }
        let values = self.expr_list()?;
        self.expect_op(Operator::RParen)?;
        Ok(if negated {
            Predicate::NotIn { expr, values }
        } else {
            Predicate::In { expr, values }
        })
    }

    /// `BETWEEN low AND high` or `BETWEEN (low, high)`.
    fn between_tail(&mut self, expr: Expr, negated: bool) -> ParseResult<Predicate> {
        let (low, high) = if self.cursor.eat_op(Operator::LParen) {
            let first = self.parse_expr()?;
            if self.cursor.eat_op(Operator::Comma) {
                let high = self.parse_expr()?;
                self.expect_op(Operator::RParen)?;
                (first, high)
            } else {
                // `BETWEEN (low) ... AND high`
                self.expect_op(Operator::RParen)?;
                let low = self.expr_infix(first, 0)?;
                self.expect_keyword(Keyword::And)?;
                (low, self.parse_expr()?)
            }
        } else {
            let low = self.parse_expr()?;
            self.expect_keyword(Keyword::And)?;
            (low, self.parse_expr()?)
        };
        Ok(if negated {
            Predicate::NotBetween { expr, low, high }
        } else {
            Predicate::Between { expr, low, high }
        })
    }

    /// `(e1, e2, ...) op (f1, f2, ...)`, with the left list already read.
    fn group_comparison(&mut self, left: Vec<Expr>) -> ParseResult<Operand> {
        let Some(op) = self.cursor.eat_comparator() else {
            return self.fail("comparison operator");
        };
        self.expect_op(Operator::LParen)?;
        let right = self.expr_list()?;
        self.expect_op(Operator::RParen)?;
        Ok(Operand::Predicate(Predicate::GroupCompare { left, op, right }))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.expr_with_level(0)
    }

    fn expr_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.cursor.eat_op(Operator::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn expr_with_level(&mut self, min_level: u8) -> ParseResult<Expr> {
        self.nested(|p| {
            let lhs = if p.cursor.eat_op(Operator::Minus) {
                let operand = p.expr_with_level(NEGATE_LEVEL)?;
                Expr::Negate(Box::new(operand))
            } else {
                p.expr_atom()?
            };
            p.expr_infix(lhs, min_level)
        })
    }

    /// Fold infix operators of at least `min_level` onto `lhs`.
    fn expr_infix(&mut self, mut lhs: Expr, min_level: u8) -> ParseResult<Expr> {
        while let Some(rule) = self.peek_binary_operator() {
            if rule.level < min_level {
                break;
            }
            self.cursor.advance();
            let rhs = self.expr_with_level(rule.right_level())?;
            lhs = Expr::Binary {
                op: rule.op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn peek_binary_operator(&self) -> Option<&'static InfixRule<Operator, BinaryOperator>> {
        let Some(Token::Operator(op)) = self.cursor.peek() else {
            return None;
        };
        EXPR_OPERATORS.iter().find(|rule| rule.token == *op)
    }

    fn expr_atom(&mut self) -> ParseResult<Expr> {
        let expr = match self.cursor.peek() {
            Some(Token::Number(text)) => Expr::number(*text),
            Some(Token::StringLit(text)) => Expr::string(text.clone()),
            Some(Token::Variable(name)) => Expr::Variable(name.to_string()),
            Some(Token::Ident(name)) | Some(Token::QuotedIdent(name)) => Expr::column(*name),
            Some(Token::Operator(Operator::Star)) => Expr::Wildcard,
            Some(Token::Operator(Operator::LParen)) => {
                self.cursor.advance();
                let inner = self.parse_expr()?;
                self.expect_op(Operator::RParen)?;
                return Ok(inner);
            }
            Some(Token::Keyword(Keyword::Case)) => {
                self.cursor.advance();
                return self.case_expr();
            }
            _ => return self.fail("expression"),
        };
        self.cursor.advance();
        Ok(expr)
    }

    /// The part of a `CASE` expression after the `CASE` keyword.
    fn case_expr(&mut self) -> ParseResult<Expr> {
        let expr = if self.cursor.at_keyword(Keyword::When) {
            let mut branches = Vec::new();
            while self.cursor.eat_keyword(Keyword::When) {
                let condition = self.parse_predicate()?;
                self.expect_then()?;
                branches.push((condition, self.parse_expr()?));
            }
            let default = self.case_default()?;
            Expr::Case { branches, default }
        } else {
            let subject = Box::new(self.parse_expr()?);
            self.expect_keyword(Keyword::When)?;
            let mut branches = Vec::new();
            loop {
                let when = self.parse_expr()?;
                self.expect_then()?;
                branches.push((when, self.parse_expr()?));
                if !self.cursor.eat_keyword(Keyword::When) {
                    break;
                }
            }
            let default = self.case_default()?;
            Expr::SimpleCase {
                subject,
                branches,
                default,
            }
        };
        self.expect_keyword(Keyword::End)?;
        Ok(expr)
    }

    fn case_default(&mut self) -> ParseResult<Option<Box<Expr>>> {
        if self.cursor.eat_keyword(Keyword::Else) {
            Ok(Some(Box::new(self.parse_expr()?)))
        } else {
            Ok(None)
        }
    }

    /// `THEN` is not reserved; it is recognised as a bare word here.
    fn expect_then(&mut self) -> ParseResult<()> {
        match self.cursor.peek() {
            Some(Token::Ident(word)) if word.eq_ignore_ascii_case("then") => {
                self.cursor.advance();
                Ok(())
            }
            _ => self.fail("THEN"),
        }
    }
}
