//! The root unit: composes the network and application units and orders
//! them.

use stackweave_common::config::TopologyConfig;
use stackweave_common::constants::{APPLICATION_UNIT_ID, NETWORK_UNIT_ID, ROOT_STACK_ID};
use stackweave_common::error::Result;
use stackweave_compose::{App, Scope};

use crate::application::{ApplicationBody, ApplicationInputs, ApplicationUnit, EmptyBody};
use crate::network::NetworkUnit;

/// A described root unit.
#[derive(Debug, Clone)]
pub struct RootUnit {
    scope: Scope,
    network: NetworkUnit,
    application: ApplicationUnit,
}

impl RootUnit {
    /// Describes the root unit with an empty application body.
    ///
    /// # Errors
    ///
    /// See [`RootUnit::with_body`].
    pub fn new(app: &mut App, id: &str) -> Result<Self> {
        Self::with_body(app, id, &EmptyBody)
    }

    /// Describes the root unit, running `body` inside the application unit.
    ///
    /// The network unit is described first, its handles are passed to the
    /// application unit, and the application unit is then ordered after the
    /// network unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the context already has a root, the network
    /// configuration is invalid, or the application unit rejects its inputs.
    pub fn with_body(app: &mut App, id: &str, body: &dyn ApplicationBody) -> Result<Self> {
        let scope = app.add_stack(id)?;
        let network = NetworkUnit::new(app, scope, NETWORK_UNIT_ID)?;
        let inputs = ApplicationInputs {
            network: network.vpc(),
            application_security_group: network.application_sg(),
        };
        let application = ApplicationUnit::with_body(app, scope, APPLICATION_UNIT_ID, &inputs, body)?;
        app.add_dependency(application.scope(), network.scope())?;
        tracing::info!(
            root = %app.path(scope),
            environment = %app.environment(),
            "described root unit"
        );
        Ok(Self {
            scope,
            network,
            application,
        })
    }

    /// Scope of the unit.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// The network unit.
    #[must_use]
    pub const fn network(&self) -> &NetworkUnit {
        &self.network
    }

    /// The application unit.
    #[must_use]
    pub const fn application(&self) -> &ApplicationUnit {
        &self.application
    }
}

/// Describes the full topology under [`ROOT_STACK_ID`] with an empty
/// application body.
///
/// # Errors
///
/// See [`RootUnit::with_body`].
pub fn describe(config: TopologyConfig) -> Result<(App, RootUnit)> {
    describe_with(config, &EmptyBody)
}

/// Like [`describe`] with a caller-supplied application body.
///
/// # Errors
///
/// See [`RootUnit::with_body`].
pub fn describe_with(config: TopologyConfig, body: &dyn ApplicationBody) -> Result<(App, RootUnit)> {
    let mut app = App::new(config);
    let root = RootUnit::with_body(&mut app, ROOT_STACK_ID, body)?;
    Ok((app, root))
}

#[cfg(test)]
mod tests {
    use stackweave_compose::graph::EdgeKind;

    use super::*;

    #[test]
    fn describes_two_units_with_edge() {
        let (app, root) = describe(TopologyConfig::default()).expect("describe");
        assert_eq!(app.units().len(), 3);
        assert_eq!(app.path(root.network().scope()), "root-stack/base-resources");
        assert_eq!(app.path(root.application().scope()), "root-stack/app-resources");

        let deps = app.graph().dependencies_of("root-stack/app-resources");
        assert!(deps.contains(&("root-stack/base-resources".to_string(), EdgeKind::Explicit)));
        assert!(deps.contains(&("root-stack/base-resources".to_string(), EdgeKind::Reference)));
        assert!(app.graph().dependencies_of("root-stack").is_empty());
    }

    #[test]
    fn second_root_is_rejected() {
        let (mut app, _) = describe(TopologyConfig::default()).expect("describe");
        assert!(RootUnit::new(&mut app, "again").is_err());
    }

    #[test]
    fn described_topology_synthesizes() {
        let (app, _) = describe(TopologyConfig::default()).expect("describe");
        let assembly = app.synth().expect("synth");
        let order = &assembly.manifest.deployment_order;
        let position = |unit: &str| order.iter().position(|u| u == unit).expect("ordered");
        assert_eq!(order.len(), 3);
        assert!(position("root-stack/base-resources") < position("root-stack/app-resources"));
    }
}
