//! Lexer for the reporting query language.
//!
//! This module turns a raw query string (the `tq` parameter of a reporting
//! request) into a sequence of tokens with span information. Whitespace and
//! `#` line comments are skipped between tokens.

use chumsky::prelude::*;

// ============================================================================
// Keyword and operator tables
// ============================================================================

/// A reserved word of the query language.
///
/// Keywords are matched case-insensitively; a word that matches one can only
/// be used as a column name when quoted with backticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Select,
    From,
    Where,
    Group,
    By,
    Having,
    Order,
    Desc,
    Asc,
    Inner,
    Left,
    Right,
    Full,
    Outer,
    Join,
    On,
    Cross,
    Union,
    All,
    Distinct,
    As,
    Exists,
    In,
    Between,
    Limit,
    Offset,
    Case,
    When,
    Else,
    End,
    And,
    Or,
    Not,
    True,
    False,
}

impl Keyword {
    /// Every keyword, in the order they are documented.
    pub const ALL: [Keyword; 35] = [
        Keyword::Select,
        Keyword::From,
        Keyword::Where,
        Keyword::Group,
        Keyword::By,
        Keyword::Having,
        Keyword::Order,
        Keyword::Desc,
        Keyword::Asc,
        Keyword::Inner,
        Keyword::Left,
        Keyword::Right,
        Keyword::Full,
        Keyword::Outer,
        Keyword::Join,
        Keyword::On,
        Keyword::Cross,
        Keyword::Union,
        Keyword::All,
        Keyword::Distinct,
        Keyword::As,
        Keyword::Exists,
        Keyword::In,
        Keyword::Between,
        Keyword::Limit,
        Keyword::Offset,
        Keyword::Case,
        Keyword::When,
        Keyword::Else,
        Keyword::End,
        Keyword::And,
        Keyword::Or,
        Keyword::Not,
        Keyword::True,
        Keyword::False,
    ];

    /// The canonical (lowercase) spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Select => "select",
            Keyword::From => "from",
            Keyword::Where => "where",
            Keyword::Group => "group",
            Keyword::By => "by",
            Keyword::Having => "having",
            Keyword::Order => "order",
            Keyword::Desc => "desc",
            Keyword::Asc => "asc",
            Keyword::Inner => "inner",
            Keyword::Left => "left",
            Keyword::Right => "right",
            Keyword::Full => "full",
            Keyword::Outer => "outer",
            Keyword::Join => "join",
            Keyword::On => "on",
            Keyword::Cross => "cross",
            Keyword::Union => "union",
            Keyword::All => "all",
            Keyword::Distinct => "distinct",
            Keyword::As => "as",
            Keyword::Exists => "exists",
            Keyword::In => "in",
            Keyword::Between => "between",
            Keyword::Limit => "limit",
            Keyword::Offset => "offset",
            Keyword::Case => "case",
            Keyword::When => "when",
            Keyword::Else => "else",
            Keyword::End => "end",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
            Keyword::True => "true",
            Keyword::False => "false",
        }
    }

    /// Look up a bare word in the keyword table, ignoring case.
    pub fn from_word(word: &str) -> Option<Keyword> {
        Keyword::ALL
            .iter()
            .copied()
            .find(|kw| kw.as_str().eq_ignore_ascii_case(word))
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operator or punctuation symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    /// `<>`
    LtGt,
    /// `!=`
    BangEq,
    Colon,
    LParen,
    RParen,
    Dot,
    Comma,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::Percent => "%",
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::GtEq => ">=",
            Operator::LtEq => "<=",
            Operator::LtGt => "<>",
            Operator::BangEq => "!=",
            Operator::Colon => ":",
            Operator::LParen => "(",
            Operator::RParen => ")",
            Operator::Dot => ".",
            Operator::Comma => ",",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// A token of the query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    /// A reserved word.
    Keyword(Keyword),
    /// An operator or punctuation symbol.
    Operator(Operator),
    /// A bare word that is not a keyword.
    Ident(&'src str),
    /// A back-quoted name (contents taken verbatim).
    QuotedIdent(&'src str),
    /// A `$`-prefixed variable (name without the `$`).
    Variable(&'src str),
    /// A number literal, as written.
    Number(&'src str),
    /// A single-quoted string literal with escapes already decoded.
    StringLit(String),
}

/// The coarse classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    String,
    Identifier,
    Variable,
    Keyword,
    Operator,
}

impl<'src> Token<'src> {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Keyword(_) => TokenKind::Keyword,
            Token::Operator(_) => TokenKind::Operator,
            Token::Ident(_) | Token::QuotedIdent(_) => TokenKind::Identifier,
            Token::Variable(_) => TokenKind::Variable,
            Token::Number(_) => TokenKind::Number,
            Token::StringLit(_) => TokenKind::String,
        }
    }

    /// The column name carried by an identifier token, quoted or not.
    pub fn as_name(&self) -> Option<&'src str> {
        match self {
            Token::Ident(name) | Token::QuotedIdent(name) => Some(name),
            _ => None,
        }
    }
}

impl<'src> std::fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Keyword(kw) => write!(f, "{}", kw),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Ident(s) => write!(f, "{}", s),
            Token::QuotedIdent(s) => write!(f, "`{}`", s),
            Token::Variable(s) => write!(f, "${}", s),
            Token::Number(s) => write!(f, "{}", s),
            Token::StringLit(s) => {
                write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
            }
        }
    }
}

// ============================================================================
// Lexer
// ============================================================================

/// Map a bare word to a keyword token or return Ident.
fn keyword_or_ident(s: &str) -> Token<'_> {
    match Keyword::from_word(s) {
        Some(kw) => Token::Keyword(kw),
        None => Token::Ident(s),
    }
}

/// Create a lexer for the query language.
///
/// Returns a parser that tokenizes the input string into a sequence of
/// tokens with span information, skipping whitespace and comments.
pub fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    // Numbers: integers and decimals, kept as written
    let number = text::digits(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .map(Token::Number);

    // String literals: '...' where \' and \\ are the only escapes
    let escape = choice((just("\\\\").to('\\'), just("\\'").to('\'')));
    let string_lit = just('\'')
        .ignore_then(escape.or(none_of('\'')).repeated().collect::<String>())
        .then_ignore(just('\''))
        .map(Token::StringLit)
        .labelled("string literal");

    // Quoted names: `...`, no escaping
    let quoted_ident = just('`')
        .ignore_then(none_of('`').repeated().to_slice())
        .then_ignore(just('`'))
        .map(Token::QuotedIdent)
        .labelled("quoted name");

    let variable = just('$')
        .ignore_then(text::ident())
        .map(Token::Variable)
        .labelled("variable");

    let word = text::ident().map(keyword_or_ident);

    // Operators (multi-char first, then single-char)
    let operator = choice((
        just(">=").to(Operator::GtEq),
        just("<=").to(Operator::LtEq),
        just("<>").to(Operator::LtGt),
        just("!=").to(Operator::BangEq),
        just('+').to(Operator::Plus),
        just('-').to(Operator::Minus),
        just('*').to(Operator::Star),
        just('/').to(Operator::Slash),
        just('%').to(Operator::Percent),
        just('=').to(Operator::Eq),
        just('>').to(Operator::Gt),
        just('<').to(Operator::Lt),
        just(':').to(Operator::Colon),
        just('(').to(Operator::LParen),
        just(')').to(Operator::RParen),
        just('.').to(Operator::Dot),
        just(',').to(Operator::Comma),
    ))
    .map(Token::Operator);

    // Line comments: # ... until newline
    let comment = just('#')
        .then(any().and_is(just('\n').not()).repeated())
        .ignored();

    let token = choice((number, string_lit, quoted_ident, variable, word, operator))
        .map_with(|tok, e| (tok, e.span()));

    // Tokens separated by whitespace and comments, then expect end of input
    token
        .padded_by(comment.clone().padded().repeated())
        .padded()
        .repeated()
        .collect()
        .padded_by(comment.padded().repeated())
        .padded()
        .then_ignore(end())
}

/// Lex a source string into tokens.
///
/// Returns Ok with the token list on success, or Err with the lexer errors.
pub fn lex(source: &str) -> Result<Vec<(Token<'_>, SimpleSpan)>, Vec<Rich<'_, char>>> {
    let (tokens, errs) = lexer().parse(source).into_output_errors();
    if errs.is_empty() {
        Ok(tokens.unwrap_or_default())
    } else {
        Err(errs)
    }
}
