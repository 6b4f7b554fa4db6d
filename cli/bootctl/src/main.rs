//! bootctl
//!
//! Operator CLI for a single-master Kubernetes cluster on AWS:
//! - `create`: provision the network, identities, bucket and master instance
//! - `destroy`: delete everything recorded in an inventory file
//! - `boot`: first-boot setup on the master (runs from its user data)
//! - `join`: join a worker to the cluster (runs from its user data)

mod boot;
mod cli;
mod create;
mod destroy;
mod join;
mod shell;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the inventory JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Create(args) => create::run(args).await,
        Commands::Destroy(args) => destroy::run(args).await,
        Commands::Boot(args) => boot::run(args).await,
        Commands::Join(args) => join::run(args).await,
    }
}
