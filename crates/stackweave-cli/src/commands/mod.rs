//! CLI command definitions and dispatch.

pub mod plan;
pub mod synth;

use clap::{Parser, Subcommand};
use stackweave_common::config::TopologyConfig;

/// Declarative network and application topology.
#[derive(Parser, Debug)]
#[command(name = "stackweave", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Explicit availability zones (comma separated) instead of
    /// engine-resolved ones.
    #[arg(long, global = true, value_delimiter = ',')]
    pub availability_zones: Vec<String>,
}

impl Cli {
    /// Configuration from the process environment and global flags.
    fn config(&self) -> TopologyConfig {
        let mut config = TopologyConfig::from_env();
        if !self.availability_zones.is_empty() {
            config.availability_zones = Some(self.availability_zones.clone());
        }
        config
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Describe the topology and write the cloud assembly.
    Synth(synth::SynthArgs),
    /// Display units in deployment order with their dependencies.
    Plan(plan::PlanArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config();
    match cli.command {
        Command::Synth(args) => synth::execute(args, config),
        Command::Plan(args) => plan::execute(args, config),
    }
}
