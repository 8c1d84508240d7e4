//! Per-request column resolution.
//!
//! A [`Resolver`] borrows a shared [`ReportingDefinition`] and records what one
//! request selects, groups, orders and otherwise uses. The used set only
//! grows: replacing the select, group-by or order-by list changes what is
//! emitted for that clause but never drops a column, or its joins, from the
//! request. Resolvers are cheap; create one per request and never share it.

use std::collections::HashMap;

use super::{aliased, JoinResolutionError, ReportingDefinition};
use crate::query::{Expr, Relation, SimpleQuery, SortDirection};

/// Per-call override of a column's physical spelling, keyed by logical name.
pub type NameMapping = HashMap<String, String>;

#[derive(Debug, Clone)]
pub struct Resolver<'d> {
    definition: &'d ReportingDefinition,
    select: Vec<String>,
    group_by: Vec<String>,
    order_by: Vec<(String, SortDirection)>,
    /// Every column named so far, in first-use order; `*` is kept as written.
    used: Vec<String>,
    required: HashMap<String, Vec<String>>,
}

impl<'d> Resolver<'d> {
    pub fn new(definition: &'d ReportingDefinition) -> Self {
        Self {
            definition,
            select: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            used: Vec::new(),
            required: HashMap::new(),
        }
    }

    /// Adopt the select, group-by and order-by of a simple query. Condition
    /// columns are marked as used.
    pub fn from_simple_query(definition: &'d ReportingDefinition, query: &SimpleQuery) -> Self {
        let mut resolver = Self::new(definition);
        resolver.set_select(query.select.iter().cloned());
        resolver.set_group_by(query.group_by.iter().cloned());
        if let Some(order) = &query.order_by {
            resolver.set_order_by([(order.column.clone(), order.direction)]);
        }
        resolver.mark_as_used(query.conditions.keys().cloned());
        resolver
    }

    /// Adopt the plain column references of a relation's select list,
    /// group-by and order-by. Every column the relation mentions, nested
    /// relations included, is marked as used.
    pub fn from_relation(definition: &'d ReportingDefinition, relation: &Relation) -> Self {
        let mut resolver = Self::new(definition);
        resolver.set_select(relation.select.iter().filter_map(|expr| match expr {
            Expr::Wildcard => Some("*".to_string()),
            other => other.as_column().map(str::to_string),
        }));
        if let Some(group_by) = &relation.group_by {
            resolver.set_group_by(
                group_by
                    .exprs
                    .iter()
                    .filter_map(|expr| expr.as_column().map(str::to_string)),
            );
        }
        if let Some(order_by) = &relation.order_by {
            resolver.set_order_by(order_by.iter().filter_map(|element| {
                element
                    .expr
                    .as_column()
                    .map(|name| (name.to_string(), element.direction))
            }));
        }
        resolver.mark_as_used(relation.referenced_columns());
        resolver
    }

    /// Selected column names; `*` selects every SQL column.
    pub fn set_select<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) {
        self.select = columns.into_iter().map(Into::into).collect();
        self.mark_as_used(self.select.clone());
    }

    pub fn set_group_by<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) {
        self.group_by = columns.into_iter().map(Into::into).collect();
        self.mark_as_used(self.group_by.clone());
    }

    pub fn set_order_by(&mut self, elements: impl IntoIterator<Item = (String, SortDirection)>) {
        self.order_by = elements.into_iter().collect();
        let columns: Vec<String> = self.order_by.iter().map(|(name, _)| name.clone()).collect();
        self.mark_as_used(columns);
    }

    pub fn mark_as_used<S: Into<String>>(&mut self, columns: impl IntoIterator<Item = S>) {
        for column in columns {
            push_unique(&mut self.used, column.into());
        }
    }

    /// Declare that using `trigger` also requires `implied`.
    pub fn set_required_columns<S: Into<String>>(
        &mut self,
        trigger: impl Into<String>,
        implied: impl IntoIterator<Item = S>,
    ) {
        let entry = self.required.entry(trigger.into()).or_default();
        for column in implied {
            push_unique(entry, column.into());
        }
    }

    pub fn is_sql_column(&self, name: &str) -> bool {
        self.definition.is_sql_column(name)
    }

    pub fn sql_column_name(&self, name: &str, with_alias: bool) -> Option<String> {
        self.definition.sql_column_name(name, with_alias)
    }

    // ------------------------------------------------------------------
    // Column sets
    // ------------------------------------------------------------------

    /// Add `columns` and everything they imply to `out`, in order.
    fn extend_with_implied<'a>(&'a self, out: &mut Vec<&'a str>, columns: &[&'a str]) {
        let mut stack: Vec<&str> = columns.iter().rev().copied().collect();
        while let Some(column) = stack.pop() {
            if out.contains(&column) {
                continue;
            }
            out.push(column);
            if let Some(implied) = self.required.get(column) {
                stack.extend(implied.iter().rev().map(String::as_str));
            }
        }
    }

    fn expand_wildcard<'a>(&'a self, columns: &'a [String]) -> Vec<&'a str> {
        let mut expanded = Vec::new();
        for column in columns {
            if column == "*" {
                expanded.extend(self.definition.sql_columns());
            } else {
                expanded.push(column.as_str());
            }
        }
        expanded
    }

    /// The columns `sql_select` emits, before dropping non-SQL ones.
    pub fn selected_columns<'a>(&'a self, extra: &[&'a str]) -> Vec<&'a str> {
        let mut roots = self.expand_wildcard(&self.select);
        roots.extend_from_slice(extra);
        let mut out = Vec::new();
        self.extend_with_implied(&mut out, &roots);
        out
    }

    /// Every column the request has used so far, with the columns they
    /// imply.
    pub fn used_columns(&self) -> Vec<&str> {
        let roots = self.expand_wildcard(&self.used);
        let mut out = Vec::new();
        self.extend_with_implied(&mut out, &roots);
        out
    }

    // ------------------------------------------------------------------
    // SQL fragments
    // ------------------------------------------------------------------

    fn resolve(&self, name: &str, mapping: &NameMapping, with_alias: bool) -> Option<String> {
        match mapping.get(name) {
            Some(physical) => Some(aliased(physical.clone(), name, with_alias)),
            None => self.sql_column_name(name, with_alias),
        }
    }

    /// The select list, aliased.
    pub fn sql_select(&mut self) -> String {
        self.sql_select_with(&[], &NameMapping::new())
    }

    /// The select list with `extra` columns appended; they are marked used.
    pub fn sql_select_with(&mut self, extra: &[&str], mapping: &NameMapping) -> String {
        self.mark_as_used(extra.iter().copied());
        self.selected_columns(extra)
            .into_iter()
            .filter_map(|name| self.resolve(name, mapping, true))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn sql_group_by(&mut self) -> Option<String> {
        self.sql_group_by_with(&[], &NameMapping::new())
    }

    /// The group-by list with `extra` columns appended; they are marked used.
    /// `None` when no SQL column remains.
    pub fn sql_group_by_with(&mut self, extra: &[&str], mapping: &NameMapping) -> Option<String> {
        self.mark_as_used(extra.iter().copied());
        let mut columns: Vec<&str> = Vec::new();
        for name in self.group_by.iter().map(String::as_str).chain(extra.iter().copied()) {
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
        let parts: Vec<String> = columns
            .into_iter()
            .filter_map(|name| self.resolve(name, mapping, false))
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }

    pub fn sql_order_by(&self) -> Option<String> {
        self.sql_order_by_with(&NameMapping::new())
    }

    pub fn sql_order_by_with(&self, mapping: &NameMapping) -> Option<String> {
        let parts: Vec<String> = self
            .order_by
            .iter()
            .filter_map(|(name, direction)| {
                let resolved = self.resolve(name, mapping, false)?;
                Some(format!("{} {}", resolved, direction.as_sql()))
            })
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }

    /// Joins for every used column.
    pub fn sql_joins(&self) -> Result<String, JoinResolutionError> {
        self.definition.sql_joins(self.used_columns())
    }

    /// Joins for the given columns only.
    pub fn sql_joins_for<'a>(
        &self,
        columns: impl IntoIterator<Item = &'a str>,
    ) -> Result<String, JoinResolutionError> {
        self.definition.sql_joins(columns)
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
