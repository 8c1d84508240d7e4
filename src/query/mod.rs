//! Query language front end.
//!
//! Two entry points share one lexer:
//!
//! - [`parse`] runs the full grammar and returns a [`Relation`] whose `WHERE`
//!   and `HAVING` clauses are predicate trees.
//! - [`simple_parse`] runs the restricted grammar and returns a flat
//!   [`SimpleQuery`], refusing anything it cannot represent.
//!
//! Both are pure functions of their input and safe to call from any number of
//! threads at once.
//!
//! ```
//! use reportql::query::{parse, simple_parse};
//!
//! let relation = parse("select id where age > 18 order by id desc").unwrap();
//! assert_eq!(relation.select.len(), 1);
//!
//! let simple = simple_parse("select id where age = 18").unwrap();
//! assert_eq!(simple.conditions["age"].as_equals(), Some("18"));
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod simple;

pub use ast::*;
pub use error::{ParseError, ParseResult, QueryError, SimpleQueryError};
pub use lexer::{Keyword, Operator, Token, TokenKind};
pub use simple::{
    Condition, ConditionOperator, ConditionValue, OperatorCondition, SimpleOrder, SimpleQuery,
};

use chumsky::span::SimpleSpan;

/// Resource bounds applied to every parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Longest accepted query string, in bytes.
    pub max_query_length: usize,
    /// Deepest accepted nesting of expressions, predicates and sub-relations.
    pub max_depth: usize,
}

impl ParseOptions {
    pub const DEFAULT_MAX_QUERY_LENGTH: usize = 8192;
    pub const DEFAULT_MAX_DEPTH: usize = 64;
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_query_length: Self::DEFAULT_MAX_QUERY_LENGTH,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Lex `source`, enforcing the length bound first.
pub fn tokenize<'src>(
    source: &'src str,
    options: &ParseOptions,
) -> ParseResult<Vec<(Token<'src>, SimpleSpan)>> {
    if source.len() > options.max_query_length {
        return Err(ParseError::TooLong {
            length: source.len(),
            max_length: options.max_query_length,
        });
    }
    lexer::lex(source).map_err(|errs| {
        // The lexer stops at the first bad character, so the first error is
        // the one to report.
        match errs.into_iter().next() {
            Some(err) => ParseError::Lex {
                position: err.span().start,
                message: err.to_string(),
            },
            None => ParseError::Lex {
                position: 0,
                message: "invalid input".to_string(),
            },
        }
    })
}

/// Parse a query with the full grammar and default bounds.
pub fn parse(source: &str) -> ParseResult<Relation> {
    parse_with(source, &ParseOptions::default())
}

/// Parse a query with the full grammar.
pub fn parse_with(source: &str, options: &ParseOptions) -> ParseResult<Relation> {
    let tokens = tokenize(source, options)?;
    let relation = parser::Parser::new(&tokens, source.len(), options.max_depth).parse_query()?;
    tracing::debug!(
        target: "reportql::query",
        tokens = tokens.len(),
        mode = "full",
        "query.parsed"
    );
    Ok(relation)
}

/// Parse a query with the restricted grammar and default bounds.
pub fn simple_parse(source: &str) -> Result<SimpleQuery, QueryError> {
    simple_parse_with(source, &ParseOptions::default())
}

/// Parse a query with the restricted grammar.
///
/// Input the full grammar rejects fails with [`QueryError::Parse`]; valid
/// input the restricted grammar cannot represent fails with
/// [`QueryError::Simple`].
pub fn simple_parse_with(source: &str, options: &ParseOptions) -> Result<SimpleQuery, QueryError> {
    let tokens = tokenize(source, options)?;
    match simple::parse_simple(&tokens, source.len()) {
        Ok(query) => {
            tracing::debug!(
                target: "reportql::query",
                tokens = tokens.len(),
                mode = "simple",
                "query.parsed"
            );
            Ok(query)
        }
        Err(reason) => {
            parser::Parser::new(&tokens, source.len(), options.max_depth).parse_query()?;
            tracing::debug!(
                target: "reportql::query",
                reason = %reason,
                "query.simple_rejected"
            );
            Err(QueryError::Simple(reason))
        }
    }
}
