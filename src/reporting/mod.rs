//! Reporting definitions and join/column resolution.
//!
//! A [`ReportingDefinition`] declares the tables a report can join (each with
//! its join fragment and the tables it depends on) and the logical columns it
//! exposes, optionally mapped to a physical SQL column. Definitions are built
//! once, validated, and then shared read-only; each request gets its own
//! [`Resolver`] that tracks which columns the request uses. Result rows are
//! aggregated with [`Entry`] under an [`EntrySchema`].
//!
//! Definitions can be assembled in code or loaded from TOML:
//!
//! ```toml
//! [[tables]]
//! name = "companies"
//! join = "JOIN companies"
//!
//! [[tables]]
//! name = "buildings"
//! join = "JOIN buildings"
//! depends_on = ["companies"]
//!
//! [[columns]]
//! name = "firstname"
//! type = "string"
//! sql = true
//!
//! [[columns]]
//! name = "company_name"
//! type = "string"
//! sql = { table = "companies", column = "name" }
//! ```

mod entry;
mod error;
mod graph;
mod resolver;

pub use entry::{Entry, EntrySchema, FieldValue, SumEntry};
pub use error::{DefinitionError, EntryError, JoinResolutionError};
pub use graph::TableGraph;
pub use resolver::{NameMapping, Resolver};

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

// ============================================================================
// Declarations
// ============================================================================

/// A joinable table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    /// SQL fragment emitted when the table is needed, e.g. `JOIN companies`.
    pub join: String,
    /// Tables whose joins must precede this one.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl TableDef {
    pub fn new(name: impl Into<String>, join: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            join: join.into(),
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on<S: Into<String>>(mut self, tables: impl IntoIterator<Item = S>) -> Self {
        self.depends_on.extend(tables.into_iter().map(Into::into));
        self
    }
}

/// Value type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Boolean,
    Number,
    String,
    Date,
    DateTime,
    TimeOfDay,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Number => "number",
            ColumnType::String => "string",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::TimeOfDay => "timeofday",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a logical column lives in SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlMapping {
    /// Owning table; `None` for columns of the base relation.
    pub table: Option<String>,
    pub column: String,
}

impl SqlMapping {
    /// A column of the base relation.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    /// A column of a joined table.
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    /// The physical identifier, `table.column` or just `column`.
    pub fn qualified_name(&self) -> String {
        match &self.table {
            Some(table) => format!("{}.{}", table, self.column),
            None => self.column.clone(),
        }
    }
}

/// A logical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub label: Option<String>,
    /// `None` for columns computed outside SQL.
    pub sql: Option<SqlMapping>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            label: None,
            sql: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn sql(mut self, mapping: SqlMapping) -> Self {
        self.sql = Some(mapping);
        self
    }

    /// Map to a physical column of the same name in the base relation.
    pub fn sql_same_name(self) -> Self {
        let mapping = SqlMapping::new(self.name.clone());
        self.sql(mapping)
    }
}

/// Public description of a column, without its SQL mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescription {
    pub id: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

// ============================================================================
// Definition
// ============================================================================

/// Collects declarations; [`build`](DefinitionBuilder::build) validates them.
#[derive(Debug, Clone, Default)]
pub struct DefinitionBuilder {
    tables: Vec<TableDef>,
    columns: Vec<ColumnDef>,
}

impl DefinitionBuilder {
    pub fn with_table(mut self, table: TableDef) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Validate the declarations.
    ///
    /// Fails on duplicate names, on dependencies or column mappings naming
    /// undeclared tables, and on dependency cycles.
    pub fn build(self) -> Result<ReportingDefinition, DefinitionError> {
        let mut seen = HashSet::new();
        for table in &self.tables {
            if !seen.insert(table.name.as_str()) {
                return Err(DefinitionError::DuplicateTable(table.name.clone()));
            }
        }

        let mut column_index = HashMap::new();
        for (position, column) in self.columns.iter().enumerate() {
            if column_index.insert(column.name.clone(), position).is_some() {
                return Err(DefinitionError::DuplicateColumn(column.name.clone()));
            }
        }

        let graph = TableGraph::build(&self.tables)?;
        for column in &self.columns {
            if let Some(table) = column.sql.as_ref().and_then(|sql| sql.table.as_ref()) {
                if !graph.contains(table) {
                    return Err(JoinResolutionError::UnknownTable {
                        table: table.clone(),
                        referenced_by: column.name.clone(),
                    }
                    .into());
                }
            }
        }
        if let Err(err) = graph.check_acyclic() {
            tracing::warn!(
                target: "reportql::reporting",
                error = %err,
                "reporting.definition_rejected"
            );
            return Err(err.into());
        }

        Ok(ReportingDefinition {
            tables: self.tables,
            columns: self.columns,
            column_index,
            graph,
        })
    }
}

/// Validated, immutable table and column declarations.
#[derive(Debug, Clone)]
pub struct ReportingDefinition {
    tables: Vec<TableDef>,
    columns: Vec<ColumnDef>,
    column_index: HashMap<String, usize>,
    graph: TableGraph,
}

impl ReportingDefinition {
    pub fn builder() -> DefinitionBuilder {
        DefinitionBuilder::default()
    }

    /// Parse and validate a TOML definition.
    pub fn from_toml_str(content: &str) -> Result<Self, DefinitionError> {
        let file: DefinitionFile = toml::from_str(content)?;
        let builder = DefinitionBuilder {
            tables: file.tables,
            columns: file.columns.into_iter().map(ColumnSpec::into_def).collect(),
        };
        builder.build()
    }

    /// Load and validate a TOML definition file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DefinitionError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.column_index.get(name).map(|&i| &self.columns[i])
    }

    pub fn is_sql_column(&self, name: &str) -> bool {
        self.column(name).is_some_and(|column| column.sql.is_some())
    }

    /// The SQL spelling of a column, `None` for non-SQL columns.
    ///
    /// With `with_alias`, the logical name is appended when it differs from
    /// the physical identifier.
    pub fn sql_column_name(&self, name: &str, with_alias: bool) -> Option<String> {
        let mapping = self.column(name)?.sql.as_ref()?;
        let physical = mapping.qualified_name();
        Some(aliased(physical, name, with_alias))
    }

    /// Names of the SQL-backed columns, in declaration order.
    pub fn sql_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|column| column.sql.is_some())
            .map(|column| column.name.as_str())
            .collect()
    }

    /// Every declared column as shown to clients.
    pub fn columns(&self) -> Vec<ColumnDescription> {
        self.columns
            .iter()
            .map(|column| ColumnDescription {
                id: column.name.clone(),
                column_type: column.column_type,
                label: column.label.clone(),
            })
            .collect()
    }

    /// The join clause needed to reach `columns`.
    ///
    /// Columns without an owning table contribute nothing; unknown names are
    /// ignored.
    pub fn sql_joins<'a>(
        &self,
        columns: impl IntoIterator<Item = &'a str>,
    ) -> Result<String, JoinResolutionError> {
        let roots: Vec<(&str, &str)> = columns
            .into_iter()
            .filter_map(|name| {
                let table = self.column(name)?.sql.as_ref()?.table.as_deref()?;
                Some((table, name))
            })
            .collect();

        let order = self.graph.join_order(roots)?;
        let joins: Vec<&str> = order
            .iter()
            .map(|&i| self.tables[i].join.as_str())
            .collect();
        tracing::debug!(
            target: "reportql::reporting",
            tables = ?order.iter().map(|&i| &self.tables[i].name).collect::<Vec<_>>(),
            "reporting.joins_resolved"
        );
        Ok(joins.join(" "))
    }
}

/// `physical name` when aliasing and the two differ, else `physical`.
pub(crate) fn aliased(physical: String, name: &str, with_alias: bool) -> String {
    if with_alias && physical != name {
        format!("{} {}", physical, name)
    } else {
        physical
    }
}

// ============================================================================
// TOML format
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefinitionFile {
    #[serde(default)]
    tables: Vec<TableDef>,
    #[serde(default)]
    columns: Vec<ColumnSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnSpec {
    name: String,
    #[serde(rename = "type")]
    column_type: ColumnType,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    sql: Option<SqlSpec>,
}

/// `sql = true`, or a table with an optional column name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SqlSpec {
    Flag(bool),
    Mapping(SqlMappingSpec),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SqlMappingSpec {
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    column: Option<String>,
}

impl ColumnSpec {
    fn into_def(self) -> ColumnDef {
        let sql = match self.sql {
            None | Some(SqlSpec::Flag(false)) => None,
            Some(SqlSpec::Flag(true)) => Some(SqlMapping::new(self.name.clone())),
            Some(SqlSpec::Mapping(SqlMappingSpec { table, column })) => Some(SqlMapping {
                table,
                column: column.unwrap_or_else(|| self.name.clone()),
            }),
        };
        ColumnDef {
            name: self.name,
            column_type: self.column_type,
            label: self.label,
            sql,
        }
    }
}
