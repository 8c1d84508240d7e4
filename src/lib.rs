//! # reportql
//!
//! Parser and join resolver for SQL-flavored reporting queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                query string (`tq` param)                 │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [lexer]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  tokens with spans                       │
//! └─────────────────────────────────────────────────────────┘
//!              │                              │
//!              ▼ [parser]                     ▼ [simple]
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │  Relation (predicate     │   │  SimpleQuery (flat       │
//! │  and expression trees)   │   │  column → condition)     │
//! └──────────────────────────┘   └──────────────────────────┘
//!              │                              │
//!              └──────────────┬───────────────┘
//!                             ▼ [reporting]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Resolver: used columns → select / group / order / joins │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The host splices the resolver's fragments into the SQL statement it
//! builds; this crate never assembles or runs a full statement.
//! Result rows can be totalled with [`reporting::Entry`].

pub mod config;
pub mod query;
pub mod reporting;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{Settings, SettingsError};
    pub use crate::query::{
        parse, parse_with, simple_parse, simple_parse_with, Condition, ConditionOperator,
        ConditionValue, Expr, ParseError, ParseOptions, Predicate, QueryError, Relation,
        SimpleQuery, SimpleQueryError, SortDirection,
    };
    pub use crate::reporting::{
        ColumnDef, ColumnType, DefinitionError, Entry, EntryError, EntrySchema, FieldValue,
        JoinResolutionError, NameMapping, ReportingDefinition, Resolver, SqlMapping, SumEntry,
        TableDef,
    };
}
