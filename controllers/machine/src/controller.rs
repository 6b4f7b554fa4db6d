//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the Kubernetes
//! client, the reconciler and the Machine watcher together.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crds::Machine;
use kube::{Api, Client};
use provisioner::ProvisionSettings;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Runtime configuration read from the environment
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Namespace to watch; all namespaces when unset
    pub namespace: Option<String>,
    /// Namespace holding the cluster Inventory objects
    pub inventory_namespace: String,
    /// Maximum concurrent reconciliations
    pub concurrency: u16,
}

/// Main controller for worker pool management.
pub struct Controller {
    machine_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(settings: ControllerSettings) -> Result<Self, ControllerError> {
        info!("Initializing Machine Controller");

        // Create Kubernetes client
        let kube_client = Client::try_default().await?;

        let machine_api: Api<Machine> = match settings.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let reconciler = Arc::new(Reconciler::new(
            kube_client,
            settings.inventory_namespace,
            ProvisionSettings::default(),
        ));
        let watcher = Watcher::new(reconciler, machine_api, settings.concurrency);

        // Start watcher in background task
        let machine_watcher = tokio::spawn(async move { watcher.watch_machines().await });

        Ok(Self { machine_watcher })
    }

    /// Runs the controller until the watcher exits or a shutdown signal arrives.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Machine Controller running");

        tokio::select! {
            result = &mut self.machine_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Machine watcher panicked: {e}")))??;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping Machine Controller");
                self.machine_watcher.abort();
            }
        }

        Ok(())
    }
}
