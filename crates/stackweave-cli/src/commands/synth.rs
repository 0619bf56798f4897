//! `stackweave synth`: describe the topology and write the cloud assembly.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use stackweave_common::config::TopologyConfig;

use crate::output;

/// Arguments for the `synth` command.
#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Directory to write the assembly into. Defaults to `CDK_OUTDIR`, or
    /// `stackweave.out` when unset.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Executes the `synth` command.
///
/// Describes the root unit, validates and synthesizes it, then writes the
/// manifest and one template per unit.
///
/// # Errors
///
/// Returns an error if description, validation, or writing fails.
#[allow(clippy::print_stdout)]
pub fn execute(args: SynthArgs, config: TopologyConfig) -> anyhow::Result<()> {
    let outdir = args.output.unwrap_or_else(|| config.outdir.clone());
    tracing::info!(environment = %config.environment, outdir = %outdir.display(), "synthesizing");

    let (app, _root) =
        stackweave_units::root::describe(config).context("failed to describe topology")?;
    let assembly = app.synth().context("failed to synthesize topology")?;
    let written = assembly
        .write_to(&outdir)
        .with_context(|| format!("failed to write assembly to {}", outdir.display()))?;

    for unit in &assembly.manifest.units {
        println!(
            "  {:<32} {} ({})",
            unit.path,
            unit.template_file,
            output::short_digest(&unit.template_digest)
        );
    }
    println!();
    println!(
        "  {} written to {}",
        output::plural(written.len(), "file"),
        outdir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_assembly_to_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("cdk.out");
        execute(
            SynthArgs {
                output: Some(out.clone()),
            },
            TopologyConfig::default(),
        )
        .unwrap();
        assert!(out.join("manifest.json").is_file());
        assert!(out.join("root-stack.base-resources.template.json").is_file());
    }
}
