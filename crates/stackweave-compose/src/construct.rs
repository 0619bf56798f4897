//! The construct tree.
//!
//! Every declared thing is a node with an id unique among its siblings.
//! Units (the root stack and nested stacks) own every node below them up
//! to the next unit.

use std::collections::BTreeMap;

use serde_json::Value;
use stackweave_common::error::{Result, TopologyError};
use stackweave_common::types::{ConstructId, Environment, LogicalId};

use crate::resource::ResourceKind;

/// Index of a node in the construct tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// A resource declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDecl {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Template properties, references already rendered as tokens.
    pub properties: BTreeMap<String, Value>,
    /// Same-unit resources that must be created first.
    pub depends_on: Vec<NodeId>,
}

/// What a node stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The root unit, bound to an environment.
    Stack {
        /// Deployment environment.
        environment: Environment,
    },
    /// A unit nested in another unit.
    NestedStack,
    /// A grouping construct with no template presence of its own.
    Group,
    /// A declared resource.
    Resource(ResourceDecl),
}

impl NodeKind {
    /// Whether the node is a deployable unit.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self, Self::Stack { .. } | Self::NestedStack)
    }
}

/// A node in the construct tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructNode {
    /// Id unique among siblings.
    pub id: ConstructId,
    /// Parent node; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Children in declaration order.
    pub children: Vec<NodeId>,
    /// Node kind.
    pub kind: NodeKind,
}

/// Arena of construct nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstructTree {
    nodes: Vec<ConstructNode>,
}

impl ConstructTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the root node. A tree has exactly one root.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::DuplicateId`] if a root already exists.
    pub fn add_root(&mut self, id: ConstructId, kind: NodeKind) -> Result<NodeId> {
        if let Some(root) = self.nodes.first() {
            return Err(TopologyError::DuplicateId {
                scope: "<app>".into(),
                id: format!("{id} (root \"{}\" already exists)", root.id),
            });
        }
        self.nodes.push(ConstructNode {
            id,
            parent: None,
            children: Vec::new(),
            kind,
        });
        Ok(NodeId(0))
    }

    /// Adds a child under `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` does not exist, is a resource, or
    /// already has a child with the same id.
    pub fn add_child(&mut self, parent: NodeId, id: ConstructId, kind: NodeKind) -> Result<NodeId> {
        let parent_node = self.get(parent)?;
        if matches!(parent_node.kind, NodeKind::Resource(_)) {
            return Err(TopologyError::config(format!(
                "resource {} cannot have children",
                self.path(parent)
            )));
        }
        if parent_node.children.iter().any(|&c| self.nodes[c.0].id == id) {
            return Err(TopologyError::DuplicateId {
                scope: self.path(parent),
                id: id.to_string(),
            });
        }
        let node = NodeId(self.nodes.len());
        self.nodes.push(ConstructNode {
            id,
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(node);
        Ok(node)
    }

    /// Looks up a node.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::NotFound`] for an index from another tree.
    pub fn get(&self, node: NodeId) -> Result<&ConstructNode> {
        self.nodes.get(node.0).ok_or_else(|| TopologyError::NotFound {
            kind: "construct",
            id: format!("#{}", node.0),
        })
    }

    /// The root node, if one was added.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    /// All nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ConstructNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids from the root down to `node`, inclusive.
    #[must_use]
    pub fn segments(&self, node: NodeId) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut current = self.nodes.get(node.0);
        while let Some(n) = current {
            segments.push(n.id.as_str());
            current = n.parent.and_then(|p| self.nodes.get(p.0));
        }
        segments.reverse();
        segments
    }

    /// `/`-joined construct path of `node`.
    #[must_use]
    pub fn path(&self, node: NodeId) -> String {
        self.segments(node).join("/")
    }

    /// The unit owning `node`: the nearest strict ancestor that is a unit,
    /// or the node itself when it is the root.
    #[must_use]
    pub fn owning_unit(&self, node: NodeId) -> Option<NodeId> {
        let mut current = self.nodes.get(node.0)?.parent;
        while let Some(p) = current {
            let n = self.nodes.get(p.0)?;
            if n.kind.is_unit() {
                return Some(p);
            }
            current = n.parent;
        }
        self.nodes
            .get(node.0)
            .filter(|n| n.parent.is_none())
            .map(|_| node)
    }

    /// Nearest ancestor-or-self that is a unit.
    #[must_use]
    pub fn enclosing_unit(&self, node: NodeId) -> Option<NodeId> {
        if self.nodes.get(node.0)?.kind.is_unit() {
            Some(node)
        } else {
            self.owning_unit(node)
        }
    }

    /// Logical id of `node` inside its owning unit.
    #[must_use]
    pub fn logical_id(&self, node: NodeId) -> LogicalId {
        let segments = self.segments(node);
        let depth = self
            .owning_unit(node)
            .filter(|&u| u != node)
            .map_or(0, |u| self.segments(u).len());
        LogicalId::from_path(&segments[depth..])
    }

    /// Whether `ancestor` is a strict ancestor of `node`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes.get(node.0).and_then(|n| n.parent);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.nodes.get(p.0).and_then(|n| n.parent);
        }
        false
    }

    /// Units from the root down to the unit enclosing `node`, inclusive.
    #[must_use]
    pub fn unit_chain(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.enclosing_unit(node);
        while let Some(unit) = current {
            chain.push(unit);
            current = self
                .nodes
                .get(unit.0)
                .and_then(|n| n.parent)
                .and_then(|p| self.enclosing_unit(p));
        }
        chain.reverse();
        chain
    }

    /// Lifts an edge between two units to the sibling units that contain
    /// them directly under their closest common ancestor unit.
    ///
    /// Returns `(ancestor, dependent side, dependency side)`, or `None` when
    /// one unit contains the other or they share no ancestor.
    #[must_use]
    pub fn lift(&self, dependent: NodeId, dependency: NodeId) -> Option<(NodeId, NodeId, NodeId)> {
        let a = self.unit_chain(dependent);
        let b = self.unit_chain(dependency);
        let shared = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
        let ancestor = *a.get(shared.checked_sub(1)?)?;
        Some((ancestor, *a.get(shared)?, *b.get(shared)?))
    }

    /// Resource nodes owned by `unit`, in creation order.
    #[must_use]
    pub fn resources_of(&self, unit: NodeId) -> Vec<(NodeId, &ResourceDecl)> {
        self.iter()
            .filter_map(|(id, n)| match &n.kind {
                NodeKind::Resource(decl) if self.owning_unit(id) == Some(unit) => Some((id, decl)),
                _ => None,
            })
            .collect()
    }

    /// Units nested directly in `unit`, in creation order.
    #[must_use]
    pub fn nested_units_of(&self, unit: NodeId) -> Vec<NodeId> {
        self.iter()
            .filter(|(id, n)| {
                matches!(n.kind, NodeKind::NestedStack) && self.owning_unit(*id) == Some(unit)
            })
            .map(|(id, _)| id)
            .collect()
    }

    pub(crate) fn resource_mut(&mut self, node: NodeId) -> Option<&mut ResourceDecl> {
        match &mut self.nodes.get_mut(node.0)?.kind {
            NodeKind::Resource(decl) => Some(decl),
            _ => None,
        }
    }
}
