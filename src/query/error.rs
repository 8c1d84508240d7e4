//! Error types for query parsing.

use thiserror::Error;

/// Errors raised while turning a query string into a [`Relation`](super::Relation).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A character that starts no token, or an unterminated string.
    #[error("lexical error at {position}: {message}")]
    Lex { position: usize, message: String },

    /// The grammar could not consume a construct, or input was left over.
    #[error("syntax error at {position}: expected {}, found {found}", .expected.join(" or "))]
    Syntax {
        position: usize,
        expected: Vec<String>,
        found: String,
    },

    /// Nesting went deeper than the configured bound.
    #[error("query nesting exceeds the maximum depth of {max_depth} (at {position})")]
    TooDeep { position: usize, max_depth: usize },

    /// The query string is longer than the configured bound.
    #[error("query is {length} bytes long, the maximum is {max_length}")]
    TooLong { length: usize, max_length: usize },
}

impl ParseError {
    /// Byte offset in the query string the error refers to.
    pub fn position(&self) -> usize {
        match self {
            ParseError::Lex { position, .. }
            | ParseError::Syntax { position, .. }
            | ParseError::TooDeep { position, .. } => *position,
            ParseError::TooLong { max_length, .. } => *max_length,
        }
    }
}

/// A valid query that the simple (flat conditions) form cannot represent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimpleQueryError {
    #[error("only a single ORDER BY element is supported")]
    MultipleOrderElements,

    #[error("only AND may combine conditions, found {0}")]
    DisallowedConnective(String),

    #[error("parenthesized conditions are not supported")]
    NestedCondition,

    #[error("unsupported condition at {position}: found {found}")]
    UnsupportedCondition { position: usize, found: String },

    #[error("SELECT may only list column names")]
    NonColumnSelect,

    #[error("GROUP BY may only list column names")]
    NonColumnGroupBy,

    #[error("ORDER BY may only name a column")]
    NonColumnOrderBy,

    #[error("HAVING is not supported")]
    HavingNotSupported,

    #[error("column '{column}' mixes = with other comparisons")]
    MixedOperators { column: String },

    #[error("unsupported input at {position}: found {found}")]
    Unsupported { position: usize, found: String },
}

/// Error returned by [`simple_parse`](super::simple_parse).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("query too complex for this view: {0}")]
    Simple(#[from] SimpleQueryError),
}

pub type ParseResult<T> = Result<T, ParseError>;
