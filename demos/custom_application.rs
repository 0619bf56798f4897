//! Custom application body deployed into the standard network.
//!
//! Demonstrates plugging an [`ApplicationBody`] into the root unit: the body
//! receives the network and security-group handles, imports what it needs,
//! and declares a load balancer in the application unit. The assembly is
//! written to a temporary directory.
//!
//! Run with:
//! ```bash
//! cargo run --example custom_application
//! ```

use serde_json::{Map, json};
use stackweave_common::config::TopologyConfig;
use stackweave_common::error::Result;
use stackweave_compose::{App, ResourceKind, Scope};
use stackweave_units::application::{ApplicationBody, ApplicationInputs, ImportedInputs};

/// An internet-facing load balancer across the public subnets.
struct LoadBalancer;

impl ApplicationBody for LoadBalancer {
    fn describe(
        &self,
        app: &mut App,
        unit: Scope,
        inputs: &ApplicationInputs<'_>,
        imported: &ImportedInputs,
    ) -> Result<()> {
        let mut subnets = Vec::new();
        for subnet in inputs.network.public_subnets() {
            subnets.push(app.import(unit, subnet)?);
        }
        let mut props = Map::new();
        let _ = props.insert("Scheme".into(), json!("internet-facing"));
        let _ = props.insert("Subnets".into(), json!(subnets));
        let _ = props.insert(
            "SecurityGroups".into(),
            json!([imported.application_security_group]),
        );
        let lb = app.add_resource(
            unit,
            "web-lb",
            ResourceKind::Other("AWS::ElasticLoadBalancingV2::LoadBalancer"),
            props,
        )?;
        tracing::info!(resource = %lb, subnets = subnets.len(), "Declared load balancer");
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    tracing::info!("=== stackweave: custom application body ===");

    let (app, root) = stackweave_units::root::describe_with(TopologyConfig::default(), &LoadBalancer)?;
    tracing::info!(
        network = %app.path(root.network().scope()),
        application = %app.path(root.application().scope()),
        "Described topology"
    );

    let assembly = app.synth()?;
    for (step, unit) in assembly.manifest.deployment_order.iter().enumerate() {
        tracing::info!(step = step + 1, unit, "Deployment order");
    }

    let dir = tempfile::tempdir()?;
    let written = assembly.write_to(dir.path())?;
    for path in &written {
        tracing::info!(path = %path.display(), "Wrote assembly file");
    }

    tracing::info!("=== Done ===");
    Ok(())
}
