//! Table dependency graph.
//!
//! Nodes are tables, added in declaration order so a node's index is its
//! declaration position. An edge runs from a table to each table that
//! depends on it, so a topological order lists dependencies first.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use super::error::JoinResolutionError;
use super::TableDef;

#[derive(Debug, Clone, Default)]
pub struct TableGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl TableGraph {
    /// Build the graph, rejecting dependencies on undeclared tables.
    pub fn build(tables: &[TableDef]) -> Result<Self, JoinResolutionError> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for table in tables {
            let idx = graph.add_node(table.name.clone());
            index.insert(table.name.clone(), idx);
        }

        for table in tables {
            let dependent = index[&table.name];
            for dependency in &table.depends_on {
                let Some(&dep_idx) = index.get(dependency) else {
                    return Err(JoinResolutionError::UnknownTable {
                        table: dependency.clone(),
                        referenced_by: table.name.clone(),
                    });
                };
                graph.update_edge(dep_idx, dependent, ());
            }
        }

        Ok(Self { graph, index })
    }

    pub fn contains(&self, table: &str) -> bool {
        self.index.contains_key(table)
    }

    /// Fail if the declared dependencies contain a cycle.
    pub fn check_acyclic(&self) -> Result<(), JoinResolutionError> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(JoinResolutionError::Cycle {
                table: self.graph[cycle.node_id()].clone(),
            }),
        }
    }

    /// Order the given tables and their transitive dependencies so every
    /// table follows the tables it depends on. Independent tables keep their
    /// declaration order.
    ///
    /// Each root is `(table, referenced_by)`; the second element only
    /// appears in the error for an undeclared table.
    ///
    /// Returns declaration indices.
    pub fn join_order<'a>(
        &self,
        roots: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Vec<usize>, JoinResolutionError> {
        // Dependency closure of the roots
        let mut members: HashSet<NodeIndex> = HashSet::new();
        let mut stack = Vec::new();
        for (table, referenced_by) in roots {
            let Some(&idx) = self.index.get(table) else {
                return Err(JoinResolutionError::UnknownTable {
                    table: table.to_string(),
                    referenced_by: referenced_by.to_string(),
                });
            };
            stack.push(idx);
        }
        while let Some(idx) = stack.pop() {
            if members.insert(idx) {
                stack.extend(self.graph.neighbors_directed(idx, Direction::Incoming));
            }
        }

        // Kahn's algorithm over the closure, smallest declaration index first
        let mut pending: HashMap<NodeIndex, usize> = members
            .iter()
            .map(|&idx| {
                let deps = self
                    .graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .count();
                (idx, deps)
            })
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .filter(|(_, deps)| **deps == 0)
            .map(|(idx, _)| Reverse(idx.index()))
            .collect();

        let mut order = Vec::with_capacity(members.len());
        while let Some(Reverse(position)) = ready.pop() {
            let idx = NodeIndex::new(position);
            pending.remove(&idx);
            order.push(position);
            for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if let Some(deps) = pending.get_mut(&dependent) {
                    *deps -= 1;
                    if *deps == 0 {
                        ready.push(Reverse(dependent.index()));
                    }
                }
            }
        }

        if let Some(stuck) = pending.keys().min() {
            return Err(JoinResolutionError::Cycle {
                table: self.graph[*stuck].clone(),
            });
        }
        Ok(order)
    }
}
