// file: src/cli/args.rs
// version: 2.0.0
// guid: f6g7h8i9-j0k1-2345-6789-012345fghijk

//! Command line argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "smartos-fleet-agent")]
#[command(about = "Manage zones and VMs across a fleet of SmartOS nodes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Provider configuration (YAML or TOML)
    #[arg(short, long, global = true, env = "SMARTOS_FLEET_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a machine from a declaration file
    Create {
        declaration: PathBuf,
    },

    /// Show a machine as the node reports it
    Get {
        /// Machine reference, `<node>/<uuid>`
        id: String,
    },

    /// Apply in-place changes between two declarations
    Update {
        id: String,

        #[arg(long)]
        previous: PathBuf,

        #[arg(long)]
        desired: PathBuf,
    },

    /// Delete a machine
    Delete {
        id: String,
    },

    /// Resolve an image by name and version on a node
    Image {
        node: String,
        name: String,
        version: String,

        /// Only look the image up, never import it
        #[arg(long)]
        no_import: bool,
    },

    /// Show the update that two declarations would produce
    Plan {
        #[arg(long)]
        previous: PathBuf,

        #[arg(long)]
        desired: PathBuf,
    },

    /// Print the machine attribute table
    Schema,
}

impl Commands {
    /// Whether the command needs node connections
    pub fn is_remote(&self) -> bool {
        !matches!(self, Commands::Plan { .. } | Commands::Schema)
    }
}
