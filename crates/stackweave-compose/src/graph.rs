//! Unit dependency graph using `petgraph`.
//!
//! Nodes are unit paths. An edge points from a dependency to its
//! dependent so that a topological sort yields dependencies first.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use stackweave_common::error::{Result, TopologyError};

/// Why one unit depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeKind {
    /// Declared ordering constraint.
    Explicit,
    /// Implied by a consumed cross-unit reference.
    Reference,
}

/// A directed dependency between two units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Dependency {
    /// Unit that waits.
    pub dependent: String,
    /// Unit that must finish first.
    pub dependency: String,
    /// Origin of the edge.
    pub kind: EdgeKind,
}

/// A dependency graph of units.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, EdgeKind>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit node, returning the existing one if already present.
    pub fn add_unit(&mut self, path: impl Into<String>) -> NodeIndex {
        let path = path.into();
        if let Some(&idx) = self.index.get(&path) {
            return idx;
        }
        let idx = self.graph.add_node(path.clone());
        let _ = self.index.insert(path, idx);
        idx
    }

    fn lookup(&self, path: &str) -> Result<NodeIndex> {
        self.index
            .get(path)
            .copied()
            .ok_or_else(|| TopologyError::NotFound {
                kind: "unit",
                id: path.to_string(),
            })
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// Re-adding an existing edge of the same kind is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::CyclicDependency`] if the edge would close a
    /// cycle (including a self-edge), or [`TopologyError::NotFound`] if
    /// either unit is unknown.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str, kind: EdgeKind) -> Result<()> {
        let from = self.lookup(dependency)?;
        let to = self.lookup(dependent)?;
        if from == to || petgraph::algo::has_path_connecting(&self.graph, to, from, None) {
            return Err(TopologyError::CyclicDependency {
                dependent: dependent.to_string(),
                dependency: dependency.to_string(),
            });
        }
        if self
            .graph
            .edges_connecting(from, to)
            .any(|e| *e.weight() == kind)
        {
            return Ok(());
        }
        let _ = self.graph.add_edge(from, to, kind);
        Ok(())
    }

    /// Returns a topological ordering of units for deployment.
    ///
    /// Dependencies appear before the units that depend on them.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => {
                let at = self
                    .graph
                    .node_weight(cycle.node_id())
                    .cloned()
                    .unwrap_or_default();
                Err(TopologyError::CyclicDependency {
                    dependent: at.clone(),
                    dependency: at,
                })
            }
        }
    }

    /// Direct dependencies of `unit`, in insertion order.
    #[must_use]
    pub fn dependencies_of(&self, unit: &str) -> Vec<(String, EdgeKind)> {
        let Some(&idx) = self.index.get(unit) else {
            return Vec::new();
        };
        let mut deps: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.id(), self.graph[e.source()].clone(), *e.weight()))
            .collect();
        deps.sort_by_key(|(id, _, _)| *id);
        deps.into_iter().map(|(_, path, kind)| (path, kind)).collect()
    }

    /// Number of units that depend on `unit`.
    #[must_use]
    pub fn dependent_count(&self, unit: &str) -> usize {
        self.index.get(unit).map_or(0, |&idx| {
            self.graph
                .edges_directed(idx, Direction::Outgoing)
                .count()
        })
    }

    /// Whether `dependent` is ordered after `dependency` through explicit
    /// edges alone, directly or transitively.
    #[must_use]
    pub fn is_explicitly_ordered(&self, dependent: &str, dependency: &str) -> bool {
        let (Some(&to), Some(&from)) = (self.index.get(dependent), self.index.get(dependency))
        else {
            return false;
        };
        let explicit = petgraph::visit::EdgeFiltered::from_fn(&self.graph, |e| {
            *e.weight() == EdgeKind::Explicit
        });
        petgraph::algo::has_path_connecting(&explicit, from, to, None)
    }

    /// Every edge, in insertion order.
    #[must_use]
    pub fn edges(&self) -> Vec<Dependency> {
        self.graph
            .edge_references()
            .map(|e| Dependency {
                dependent: self.graph[e.target()].clone(),
                dependency: self.graph[e.source()].clone(),
                kind: *e.weight(),
            })
            .collect()
    }

    /// Number of units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.graph.node_count()
    }
}
