// file: src/main.rs
// version: 2.0.0
// guid: h8i9j0k1-l2m3-4567-8901-234567hijklm

//! SmartOS fleet agent - main entry point

use clap::Parser;
use smartos_fleet_agent::{
    cli::{
        args::{Cli, Commands},
        commands::*,
    },
    logging::logger,
    Result,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging = if cli.json_logs {
        logger::init_json_logger()
    } else {
        logger::init_logger(cli.verbose, cli.quiet)
    };

    if let Err(e) = logging {
        eprintln!("{}", e);
        std::process::exit(2);
    }

    if let Err(e) = run(cli).await {
        error!("{}", e);
        // 2 when no node was contacted
        std::process::exit(if e.is_local() { 2 } else { 1 });
    }
}

async fn run(cli: Cli) -> Result<()> {
    if !cli.command.is_remote() {
        return match &cli.command {
            Commands::Plan { previous, desired } => plan_command(previous, desired),
            _ => schema_command(),
        };
    }

    let ctx = Arc::new(FleetContext::open(cli.config)?);

    let command_future = {
        let ctx = Arc::clone(&ctx);
        async move {
            match cli.command {
                Commands::Create { declaration } => create_command(&ctx, &declaration).await,
                Commands::Get { id } => get_command(&ctx, &id).await,
                Commands::Update {
                    id,
                    previous,
                    desired,
                } => update_command(&ctx, &id, &previous, &desired).await,
                Commands::Delete { id } => delete_command(&ctx, &id).await,
                Commands::Image {
                    node,
                    name,
                    version,
                    no_import,
                } => image_command(&ctx, &node, &name, &version, no_import).await,
                Commands::Plan { .. } | Commands::Schema => Ok(()),
            }
        }
    };

    // Run command with signal handling
    let result = tokio::select! {
        result = command_future => result,
        _ = signal::ctrl_c() => {
            warn!("Received Ctrl+C, closing node connections...");
            ctx.pool.shutdown().await;
            std::process::exit(130); // Standard exit code for Ctrl+C
        }
    };

    ctx.pool.shutdown().await;
    info!("Done");
    result
}
