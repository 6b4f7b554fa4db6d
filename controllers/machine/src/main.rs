//! Machine Controller
//!
//! Keeps every worker pool at its desired replica count:
//! - Machine: desired pool size, image and key for one machine type
//! - Cluster: name and region the pool belongs to
//! - Inventory: network, bucket and profile ids new workers are launched with
//!
//! Scale-down is not performed; a pool with too many instances is reported
//! in its status and left alone.

mod backoff;
mod controller;
mod error;
mod reconciler;
mod watcher;

use crate::error::ControllerError;
use controller::{Controller, ControllerSettings};
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting Machine Controller");

    // Load configuration from environment variables
    let namespace = env::var("WATCH_NAMESPACE").ok();
    let inventory_namespace =
        env::var("INVENTORY_NAMESPACE").unwrap_or_else(|_| crds::SYSTEM_NAMESPACE.to_string());
    let concurrency = match env::var("RECONCILE_CONCURRENCY") {
        Ok(raw) => raw.parse::<u16>().map_err(|e| {
            ControllerError::InvalidConfig(format!("RECONCILE_CONCURRENCY={raw} is not a number: {e}"))
        })?,
        Err(_) => 3,
    };

    info!("Configuration:");
    info!("  Namespace: {}", namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Inventory namespace: {}", inventory_namespace);
    info!("  Concurrency: {}", concurrency);

    // Initialize and run controller
    let controller = Controller::new(ControllerSettings {
        namespace,
        inventory_namespace,
        concurrency,
    })
    .await?;
    controller.run().await?;

    Ok(())
}
