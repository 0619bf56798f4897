//! Static checks over a described topology.
//!
//! Run before synthesis so that an assembly is never produced for a graph
//! the engine could provision in the wrong order.

use stackweave_common::error::{Result, TopologyError};

use crate::construct::NodeKind;
use crate::context::App;
use crate::graph::{DependencyGraph, EdgeKind};

/// Validates a described topology.
///
/// # Checks performed
///
/// 1. A root unit bound to an environment exists.
/// 2. No unit depends on the root and the root depends on nothing.
/// 3. Every consumed cross-unit reference is backed by an explicit
///    ordering constraint, directly or transitively.
/// 4. The unit dependency graph is acyclic.
/// 5. Edges lifted to sibling units under a common ancestor stay acyclic.
///
/// # Errors
///
/// Returns an error if any check fails.
pub fn validate(app: &App) -> Result<()> {
    tracing::info!("validating topology");
    let root = check_root(app)?;
    check_root_is_entry_point(app, &root)?;
    check_references_are_ordered(app)?;
    let _ = app.graph().resolve_order()?;
    check_lifted_edges_are_acyclic(app)?;
    Ok(())
}

fn check_root(app: &App) -> Result<String> {
    let root = app.tree().root().ok_or_else(|| TopologyError::NotFound {
        kind: "unit",
        id: "root unit has not been described".into(),
    })?;
    match app.tree().get(root)?.kind {
        NodeKind::Stack { .. } => Ok(app.tree().path(root)),
        _ => Err(TopologyError::config("tree root is not a stack")),
    }
}

fn check_root_is_entry_point(app: &App, root: &str) -> Result<()> {
    if app.graph().dependent_count(root) > 0 || !app.graph().dependencies_of(root).is_empty() {
        return Err(TopologyError::config(format!(
            "root unit {root} must not take part in unit dependencies"
        )));
    }
    Ok(())
}

fn check_references_are_ordered(app: &App) -> Result<()> {
    for edge in app.graph().edges() {
        if edge.kind == EdgeKind::Reference
            && !app
                .graph()
                .is_explicitly_ordered(&edge.dependent, &edge.dependency)
        {
            return Err(TopologyError::contract(
                edge.dependent.clone(),
                format!(
                    "consumes outputs of {} without depending on it",
                    edge.dependency
                ),
            ));
        }
    }
    Ok(())
}

fn check_lifted_edges_are_acyclic(app: &App) -> Result<()> {
    let mut lifted = DependencyGraph::new();
    for (_, dependent, dependency) in app.sibling_dependencies() {
        let dependent = app.tree().path(dependent);
        let dependency = app.tree().path(dependency);
        let _ = lifted.add_unit(dependent.as_str());
        let _ = lifted.add_unit(dependency.as_str());
        lifted.add_dependency(&dependent, &dependency, EdgeKind::Explicit)?;
    }
    Ok(())
}
