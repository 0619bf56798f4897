//! The one-shot composition context.
//!
//! [`App`] owns the construct tree, the unit dependency graph, and the
//! parameter wiring between units. It is threaded explicitly through every
//! constructor by `&mut` reference; nothing here is global.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value, json};
use stackweave_common::config::TopologyConfig;
use stackweave_common::error::{Result, TopologyError};
use stackweave_common::types::{AvailabilityZone, ConstructId, Environment};

use crate::assembly::{self, CloudAssembly};
use crate::construct::{ConstructTree, NodeId, NodeKind, ResourceDecl};
use crate::graph::{DependencyGraph, EdgeKind};
use crate::resource::{ResourceKind, ResourceRef};

/// Handle to a node new constructs can be added under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope(NodeId);

impl Scope {
    /// Node this scope stands for.
    #[must_use]
    pub const fn node(self) -> NodeId {
        self.0
    }
}

/// Value passed to a nested unit's parameter by its parent.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParameterBinding {
    pub(crate) value: Value,
}

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// The composition context of one description pass.
#[derive(Debug)]
pub struct App {
    /// Distinguishes references minted by different contexts.
    id: u64,
    config: TopologyConfig,
    tree: ConstructTree,
    graph: DependencyGraph,
    /// Outputs per producing unit.
    outputs: BTreeMap<NodeId, BTreeMap<String, Value>>,
    /// Parameters per consuming unit.
    parameters: BTreeMap<NodeId, BTreeMap<String, ParameterBinding>>,
}

impl App {
    /// Creates an empty context.
    #[must_use]
    pub fn new(config: TopologyConfig) -> Self {
        Self {
            id: NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed),
            config,
            tree: ConstructTree::new(),
            graph: DependencyGraph::new(),
            outputs: BTreeMap::new(),
            parameters: BTreeMap::new(),
        }
    }

    /// Configuration this context was created with.
    #[must_use]
    pub const fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// Environment the root unit is bound to.
    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.config.environment
    }

    /// Zones available to networks in this environment.
    #[must_use]
    pub fn availability_zones(&self) -> Vec<AvailabilityZone> {
        self.config.zones()
    }

    /// The construct tree.
    #[must_use]
    pub const fn tree(&self) -> &ConstructTree {
        &self.tree
    }

    /// The unit dependency graph.
    #[must_use]
    pub const fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Construct path of a scope.
    #[must_use]
    pub fn path(&self, scope: Scope) -> String {
        self.tree.path(scope.0)
    }

    /// Adds the root unit, bound to the configured environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid or a root already exists.
    pub fn add_stack(&mut self, id: &str) -> Result<Scope> {
        let id = ConstructId::new(id)?;
        let environment = self.config.environment.clone();
        tracing::info!(stack = %id, env = %environment, "describing root unit");
        let node = self.tree.add_root(id, NodeKind::Stack { environment })?;
        let _ = self.graph.add_unit(self.tree.path(node));
        Ok(Scope(node))
    }

    /// Adds a unit nested directly in the unit `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid or taken, or `parent` is not a unit.
    pub fn add_nested_stack(&mut self, parent: Scope, id: &str) -> Result<Scope> {
        if !self.tree.get(parent.0)?.kind.is_unit() {
            return Err(TopologyError::config(format!(
                "nested unit \"{id}\" must be added directly under a unit, not {}",
                self.path(parent)
            )));
        }
        let id = ConstructId::new(id)?;
        let node = self.tree.add_child(parent.0, id, NodeKind::NestedStack)?;
        let path = self.tree.path(node);
        tracing::info!(unit = %path, "describing nested unit");
        let _ = self.graph.add_unit(path);
        Ok(Scope(node))
    }

    /// Adds a grouping construct that only contributes to paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid or taken.
    pub fn add_group(&mut self, parent: Scope, id: &str) -> Result<Scope> {
        let id = ConstructId::new(id)?;
        Ok(Scope(self.tree.add_child(parent.0, id, NodeKind::Group)?))
    }

    /// Declares a resource and mints its reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid or taken.
    pub fn add_resource(
        &mut self,
        parent: Scope,
        id: &str,
        kind: ResourceKind,
        properties: Map<String, Value>,
    ) -> Result<ResourceRef> {
        let id = ConstructId::new(id)?;
        let decl = ResourceDecl {
            kind,
            properties: properties.into_iter().collect(),
            depends_on: Vec::new(),
        };
        let node = self.tree.add_child(parent.0, id, NodeKind::Resource(decl))?;
        let unit = self
            .tree
            .owning_unit(node)
            .ok_or_else(|| TopologyError::NotFound {
                kind: "unit",
                id: self.tree.path(node),
            })?;
        let reference = ResourceRef {
            context: self.id,
            node,
            unit,
            kind,
            logical_id: self.tree.logical_id(node),
            path: self.tree.path(node),
        };
        tracing::debug!(resource = %reference, logical_id = %reference.logical_id, "declared resource");
        Ok(reference)
    }

    /// Orders `resource` after `on` inside their shared unit.
    ///
    /// # Errors
    ///
    /// Returns an error if either reference is foreign or they live in
    /// different units.
    pub fn add_resource_dependency(&mut self, resource: &ResourceRef, on: &ResourceRef) -> Result<()> {
        self.check_owned(resource)?;
        self.check_owned(on)?;
        if resource.unit != on.unit {
            return Err(TopologyError::config(format!(
                "{} and {} live in different units; order the units instead",
                resource.path, on.path
            )));
        }
        if let Some(decl) = self.tree.resource_mut(resource.node) {
            if !decl.depends_on.contains(&on.node) {
                decl.depends_on.push(on.node);
            }
        }
        Ok(())
    }

    /// Whether `reference` was minted by this context.
    #[must_use]
    pub fn owns(&self, reference: &ResourceRef) -> bool {
        reference.context == self.id
            && self.tree.get(reference.node).is_ok_and(|n| {
                matches!(&n.kind, NodeKind::Resource(d) if d.kind == reference.kind)
                    && self.tree.owning_unit(reference.node) == Some(reference.unit)
            })
    }

    fn check_owned(&self, reference: &ResourceRef) -> Result<()> {
        if self.owns(reference) {
            Ok(())
        } else {
            Err(TopologyError::NotFound {
                kind: "resource",
                id: reference.path.clone(),
            })
        }
    }

    /// Unit that owns a scope, or the scope itself if it is a unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the scope is not part of this context.
    pub fn unit_of(&self, scope: Scope) -> Result<Scope> {
        self.tree
            .enclosing_unit(scope.0)
            .map(Scope)
            .ok_or_else(|| TopologyError::NotFound {
                kind: "unit",
                id: format!("{:?}", scope.0),
            })
    }

    /// Makes `reference` usable inside the unit enclosing `consumer` and
    /// returns the token to embed in properties.
    ///
    /// Within the same unit this is a plain `Ref`. Between sibling units the
    /// producer gains an output, the consumer a parameter, and the common
    /// parent the wiring between them; an implicit reference edge is recorded
    /// so the consumer is never provisioned before the producer. A nested unit
    /// reading from its parent gets a parameter bound to a plain `Ref`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference is foreign, the units are not
    /// siblings (or parent and child), or the edge would close a cycle.
    pub fn import(&mut self, consumer: Scope, reference: &ResourceRef) -> Result<Value> {
        self.import_value(consumer, reference, None)
    }

    /// Like [`App::import`] but for a `Fn::GetAtt` attribute.
    ///
    /// # Errors
    ///
    /// See [`App::import`].
    pub fn import_attribute(
        &mut self,
        consumer: Scope,
        reference: &ResourceRef,
        attribute: &str,
    ) -> Result<Value> {
        self.import_value(consumer, reference, Some(attribute))
    }

    fn import_value(
        &mut self,
        consumer: Scope,
        reference: &ResourceRef,
        attribute: Option<&str>,
    ) -> Result<Value> {
        self.check_owned(reference)?;
        let consumer_unit = self.unit_of(consumer)?.0;
        let producer_unit = reference.unit;
        let local = || {
            attribute.map_or_else(|| reference.ref_token(), |a| reference.get_att(a))
        };
        if consumer_unit == producer_unit {
            return Ok(local());
        }

        let consumer_parent = self.tree.get(consumer_unit)?.parent;
        let producer_parent = self.tree.get(producer_unit)?.parent;
        let suffix = attribute.map_or_else(|| "Ref".to_string(), |a| a.replace('.', ""));
        let output_name = format!("{}{suffix}", reference.logical_id);

        let siblings = consumer_parent.is_some() && consumer_parent == producer_parent;
        let binding = if siblings {
            let producer_logical = self.tree.logical_id(producer_unit);
            json!({ "Fn::GetAtt": [producer_logical, format!("Outputs.{output_name}")] })
        } else if consumer_parent == Some(producer_unit) {
            local()
        } else {
            return Err(TopologyError::config(format!(
                "{} cannot reference {}: only sibling units or a parent unit can be referenced",
                self.tree.path(consumer_unit),
                reference.path
            )));
        };

        let producer_path = self.tree.path(producer_unit);
        let consumer_path = self.tree.path(consumer_unit);
        if siblings {
            self.graph
                .add_dependency(&consumer_path, &producer_path, EdgeKind::Reference)?;
            let _ = self
                .outputs
                .entry(producer_unit)
                .or_default()
                .insert(output_name.clone(), json!({ "Value": local() }));
        }

        let parameter = format!(
            "referenceto{}{output_name}",
            self.tree.logical_id(producer_unit)
        );
        tracing::debug!(
            consumer = %consumer_path,
            producer = %producer_path,
            %parameter,
            "wired cross-unit reference"
        );
        let _ = self
            .parameters
            .entry(consumer_unit)
            .or_default()
            .insert(parameter.clone(), ParameterBinding { value: binding });
        Ok(json!({ "Ref": parameter }))
    }

    /// Declares that unit `dependent` is provisioned only after unit
    /// `dependency` has completed.
    ///
    /// # Errors
    ///
    /// Returns an error if either scope is not a unit, the units are
    /// nested in one another (which includes the root), or the edge would
    /// close a cycle.
    pub fn add_dependency(&mut self, dependent: Scope, dependency: Scope) -> Result<()> {
        for scope in [dependent, dependency] {
            if !self.tree.get(scope.0)?.kind.is_unit() {
                return Err(TopologyError::config(format!(
                    "{} is not a unit",
                    self.path(scope)
                )));
            }
        }
        if self.tree.is_ancestor(dependent.0, dependency.0)
            || self.tree.is_ancestor(dependency.0, dependent.0)
        {
            return Err(TopologyError::config(format!(
                "{} and {} are nested in one another and cannot be ordered",
                self.path(dependent),
                self.path(dependency)
            )));
        }
        let dependent_path = self.path(dependent);
        let dependency_path = self.path(dependency);
        tracing::info!(
            dependent = %dependent_path,
            dependency = %dependency_path,
            "recorded unit dependency"
        );
        self.graph
            .add_dependency(&dependent_path, &dependency_path, EdgeKind::Explicit)
    }

    /// Every unit, root first, in creation order.
    #[must_use]
    pub fn units(&self) -> Vec<Scope> {
        self.tree
            .iter()
            .filter(|(_, n)| n.kind.is_unit())
            .map(|(id, _)| Scope(id))
            .collect()
    }

    /// Explicit unit edges lifted to sibling units under their closest
    /// common ancestor unit, as `(ancestor, dependent, dependency)`.
    ///
    /// This is how an edge between units in different branches of the tree
    /// becomes a `DependsOn` in the ancestor's template.
    pub(crate) fn sibling_dependencies(&self) -> Vec<(NodeId, NodeId, NodeId)> {
        let by_path: HashMap<String, NodeId> = self
            .units()
            .into_iter()
            .map(|s| (self.path(s), s.node()))
            .collect();
        let mut lifted: Vec<(NodeId, NodeId, NodeId)> = self
            .graph
            .edges()
            .into_iter()
            .filter(|e| e.kind == EdgeKind::Explicit)
            .filter_map(|e| Some((*by_path.get(&e.dependent)?, *by_path.get(&e.dependency)?)))
            .filter_map(|(dependent, dependency)| self.tree.lift(dependent, dependency))
            .collect();
        lifted.sort();
        lifted.dedup();
        lifted
    }

    /// Outputs declared by a unit.
    pub(crate) fn outputs_of(&self, unit: NodeId) -> Option<&BTreeMap<String, Value>> {
        self.outputs.get(&unit)
    }

    /// Parameters consumed by a unit.
    pub(crate) fn parameters_of(&self, unit: NodeId) -> Option<&BTreeMap<String, ParameterBinding>> {
        self.parameters.get(&unit)
    }

    /// Validates the topology and synthesizes the assembly.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn synth(&self) -> Result<CloudAssembly> {
        crate::validator::validate(self)?;
        assembly::synthesize(self)
    }
}
