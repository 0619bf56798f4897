//! `stackweave plan`: display units in deployment order before synthesis.

use clap::Args;
use stackweave_common::config::TopologyConfig;
use stackweave_compose::graph::EdgeKind;

use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Also list every resource in each unit.
    #[arg(short, long)]
    pub resources: bool,
}

/// Executes the `plan` command.
///
/// Describes the topology, validates the unit dependency graph, resolves
/// the deployment order, and displays it with each unit's edges.
///
/// # Errors
///
/// Returns an error if description, validation, or ordering fails.
#[allow(clippy::print_stdout)]
pub fn execute(args: PlanArgs, config: TopologyConfig) -> anyhow::Result<()> {
    let environment = config.environment.clone();
    let (app, _root) = stackweave_units::root::describe(config)?;
    let assembly = app.synth()?;
    let manifest = &assembly.manifest;

    println!("Deployment Plan for: {environment}");
    println!("{}", output::rule(35));
    println!();

    for path in &manifest.deployment_order {
        println!("  + {path}");
        if let Some(template) = assembly.template(path) {
            println!(
                "      resources: {}",
                output::plural(template.resources.len(), "resource")
            );
            if !template.parameters.is_empty() {
                println!("      parameters: {}", template.parameters.len());
            }
            if !template.outputs.is_empty() {
                println!("      outputs: {}", template.outputs.len());
            }
            if args.resources {
                for (logical_id, resource) in &template.resources {
                    println!(
                        "        {logical_id:<40} {}",
                        resource["Type"].as_str().unwrap_or("-")
                    );
                }
            }
        }
    }

    println!();
    println!(
        "  {} will be deployed.",
        output::plural(manifest.deployment_order.len(), "unit")
    );

    if !manifest.dependencies.is_empty() {
        println!();
        println!("  Dependencies:");
        for dep in &manifest.dependencies {
            let kind = match dep.kind {
                EdgeKind::Explicit => "explicit",
                EdgeKind::Reference => "reference",
            };
            println!("    {} -> {} ({kind})", dep.dependent, dep.dependency);
        }
    }

    Ok(())
}
