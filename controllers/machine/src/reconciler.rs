//! Reconciliation logic for Machine resources.
//!
//! One pass per Machine event: resolve the Cluster and its Inventory, count
//! the pool's live instances, launch the missing ones and record the outcome
//! in the Machine status.

use crate::backoff::BackoffState;
use crate::error::ControllerError;
use aws_client::AwsProvider;
use chrono::{DateTime, Utc};
use crds::{Cluster, Inventory, Machine, MachineStatus, PoolState};
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::Action;
use provisioner::{PoolOutcome, PoolTarget, ProvisionSettings, reconcile_pool};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reconciles Machine resources.
pub struct Reconciler {
    client: Client,
    inventory_namespace: String,
    settings: ProvisionSettings,
    /// One provider per region, built on first use
    providers: tokio::sync::Mutex<HashMap<String, Arc<AwsProvider>>>,
    /// Error count tracking per resource (namespace/name -> BackoffState)
    backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl Reconciler {
    /// Creates a new reconciler.
    pub fn new(client: Client, inventory_namespace: String, settings: ProvisionSettings) -> Self {
        Self {
            client,
            inventory_namespace,
            settings,
            providers: tokio::sync::Mutex::new(HashMap::new()),
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Reconcile one Machine.
    pub async fn reconcile_machine(&self, machine: &Machine) -> Result<Action, ControllerError> {
        let name = machine.name_any();
        let namespace = machine
            .namespace()
            .ok_or_else(|| ControllerError::InvalidObject(format!("Machine {name} has no namespace")))?;
        let resource_key = format!("{namespace}/{name}");

        if machine.spec.is_master() {
            debug!("Machine {} is the master pool, skipping", resource_key);
            return Ok(Action::await_change());
        }

        let cluster = self.resolve_cluster(&namespace).await?;
        let cluster_name = cluster.cluster_name().to_string();
        let inventory_api: Api<Inventory> = Api::namespaced(self.client.clone(), &self.inventory_namespace);
        let inventory = inventory_api.get(&Inventory::object_name(&cluster_name)).await?;

        let provider = self.provider(&cluster.spec.region).await;
        let target = PoolTarget::from_machine(&cluster_name, &machine.spec);
        info!(
            "Reconciling Machine {} (pool {}, desired {})",
            resource_key, target.selector, target.desired
        );
        let outcome = reconcile_pool(
            provider.as_ref(),
            provider.as_ref(),
            &inventory.spec,
            &target,
            self.settings.termination,
        )
        .await;

        if let Some(status) = next_status(machine.status.as_ref(), &outcome, machine.spec.replicas, Utc::now()) {
            let machine_api: Api<Machine> = Api::namespaced(self.client.clone(), &namespace);
            let patch = serde_json::json!({ "status": status });
            machine_api
                .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
            info!("Updated Machine {} status: {}", resource_key, status.state);
        } else {
            debug!("Machine {} status unchanged, skipping update", resource_key);
        }

        self.reset_error(&resource_key);
        Ok(Action::await_change())
    }

    /// The Cluster a Machine belongs to: the one Cluster object in its namespace
    async fn resolve_cluster(&self, namespace: &str) -> Result<Cluster, ControllerError> {
        let api: Api<Cluster> = Api::namespaced(self.client.clone(), namespace);
        let clusters = api.list(&ListParams::default()).await?;
        let mut items = clusters.items.into_iter();
        let cluster = items
            .next()
            .ok_or_else(|| ControllerError::ClusterNotFound(namespace.to_string()))?;
        if items.next().is_some() {
            warn!(
                "More than one Cluster in namespace {}, using {}",
                namespace,
                cluster.cluster_name()
            );
        }
        Ok(cluster)
    }

    async fn provider(&self, region: &str) -> Arc<AwsProvider> {
        let mut providers = self.providers.lock().await;
        if let Some(provider) = providers.get(region) {
            return Arc::clone(provider);
        }
        info!("Creating AWS provider for region {}", region);
        let provider = Arc::new(AwsProvider::new(region).await);
        providers.insert(region.to_string(), Arc::clone(&provider));
        provider
    }

    /// Record a failure for a resource and return the delay before its retry
    pub fn backoff_for_failure(&self, resource_key: &str) -> (Duration, u32) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(resource_key.to_string())
            .or_default()
            .record_failure()
    }

    /// Reset error count for a resource (on successful reconciliation)
    pub fn reset_error(&self, resource_key: &str) {
        if let Some(state) = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(resource_key)
        {
            state.reset();
        }
    }
}

/// Status to write after a pass, or `None` when nothing but the timestamp would change.
///
/// A failure following a failure with the same counts keeps the recorded
/// error: provider messages differ between attempts, and every status patch
/// is itself a Machine event that would start another pass.
pub fn next_status(
    previous: Option<&MachineStatus>,
    outcome: &PoolOutcome,
    desired: u32,
    now: DateTime<Utc>,
) -> Option<MachineStatus> {
    let mut status = MachineStatus {
        observed_replicas: outcome
            .observed_replicas()
            .or_else(|| previous.map(|s| s.observed_replicas))
            .unwrap_or_default(),
        desired_replicas: desired,
        state: outcome.state(),
        error: outcome.error().map(str::to_string),
        last_reconciled: previous.and_then(|s| s.last_reconciled),
    };
    if let Some(previous) = previous.filter(|p| p.state == PoolState::Failed && status.state == PoolState::Failed) {
        status.error.clone_from(&previous.error);
    }
    if previous == Some(&status) {
        return None;
    }
    status.last_reconciled = Some(now);
    Some(status)
}
