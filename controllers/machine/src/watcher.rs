//! Kubernetes resource watchers.
//!
//! Machine events are fed through `kube_runtime::Controller`, which
//! reconnects the watch, debounces bursts of events and never runs two
//! reconciliations of the same object at once.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crds::Machine;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{Controller, watcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Watches Machine resources and drives reconciliation.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    machine_api: Api<Machine>,
    concurrency: u16,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, machine_api: Api<Machine>, concurrency: u16) -> Self {
        Self {
            reconciler,
            machine_api,
            concurrency,
        }
    }

    /// Watch Machines until the stream ends.
    pub async fn watch_machines(&self) -> Result<(), ControllerError> {
        info!("Starting Machine watcher");

        // Kubernetes errors requeue with a per-object Fibonacci backoff
        let error_policy = |machine: Arc<Machine>, error: &ControllerError, ctx: Arc<Reconciler>| {
            let key = format!("{}/{}", machine.namespace().unwrap_or_default(), machine.name_any());
            let (delay, attempts) = ctx.backoff_for_failure(&key);
            error!(
                "Reconciliation error for Machine {} (attempt {}), retrying in {:?}: {}",
                key, attempts, delay, error
            );
            Action::requeue(delay)
        };

        let reconcile = |machine: Arc<Machine>, ctx: Arc<Reconciler>| async move {
            debug!("Reconciling Machine {}", machine.name_any());
            ctx.reconcile_machine(&machine).await
        };

        // Debounce waits 5 seconds after the last event before reconciling
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(5))
            .concurrency(self.concurrency);

        Controller::new(self.machine_api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .run(reconcile, error_policy, Arc::clone(&self.reconciler))
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled Machine {}", obj.name),
                    Err(e) => error!("Controller error for Machine: {}", e),
                }
            })
            .await;

        Ok(())
    }
}
