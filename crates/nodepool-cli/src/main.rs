use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

mod commands;

#[derive(Parser)]
#[command(
    name = "nodepool",
    about = "Right-size and roll the node pool behind a container cluster",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Fleet snapshot (JSON) to run against
    #[arg(long, global = true)]
    fleet: Option<PathBuf>,
    /// nodepool.toml with timings, retry policy and extra instance types
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Size the cluster's scaling group to fit its services.
    ///
    /// Sums the memory and cpu of every service with a desired count above
    /// zero, adds room for one extra copy of the largest task, and sets the
    /// group's desired and minimum size to the node count that fits.
    RightSize {
        #[arg(short, long)]
        cluster: String,
        /// Never go below the largest desired count of any single service
        #[arg(long)]
        at_least_service_desired_count: bool,
        /// Compute and print the plan without resizing
        #[arg(long)]
        dry_run: bool,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace every node of the cluster's scaling group, one at a time.
    ReplaceInstances {
        #[arg(short, long)]
        cluster: String,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the private addresses of the cluster's nodes
    Addresses {
        #[arg(short, long)]
        cluster: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nodepool=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let ctx = commands::build_context(cli.fleet.as_deref(), cli.config.as_deref(), shutdown_rx)?;

    match cli.command {
        Commands::RightSize {
            cluster,
            at_least_service_desired_count,
            dry_run,
            json,
        } => {
            commands::right_size::right_size(ctx, &cluster, at_least_service_desired_count, dry_run, json).await
        }
        Commands::ReplaceInstances { cluster, json } => {
            commands::replace::replace_instances(ctx, &cluster, json).await
        }
        Commands::Addresses { cluster } => {
            commands::addresses::addresses(ctx, &cluster).await
        }
    }
}
