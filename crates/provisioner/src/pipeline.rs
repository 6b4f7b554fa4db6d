//! Create pipeline
//!
//! A stack-based saga executor. Steps run strictly in order; every resource
//! that is created is pushed onto a rollback stack. When a step fails the
//! stack is unwound (most recent first) deleting each resource, individual
//! rollback failures are logged without stopping the unwind, and the
//! original failure is returned to the caller.

use crate::error::ProvisionError;
use crate::wait::{WaitConfig, wait_until_terminated};
use aws_client::{AccessKey, CloudError, CloudProvider, Created, ResourceRef, ResourceSpec};
use crds::{InventorySpec, ResourceRole};
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

/// Builds a step's spec from the results of the steps before it
pub type SpecBuilder = Box<dyn Fn(&PipelineState) -> Result<ResourceSpec, ProvisionError> + Send + Sync>;

/// Results accumulated while a pipeline runs
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    /// Identifiers recorded so far
    pub inventory: InventorySpec,
    /// Credentials issued by an earlier step; threaded to later builders, never persisted
    pub credentials: Option<AccessKey>,
}

impl PipelineState {
    /// Initial state for a run in `region`
    #[must_use]
    pub fn for_region(region: impl Into<String>) -> Self {
        Self {
            inventory: InventorySpec::for_region(region),
            credentials: None,
        }
    }

    /// Start from an existing inventory (e.g. to add instances to a provisioned cluster)
    #[must_use]
    pub fn from_inventory(inventory: InventorySpec) -> Self {
        Self {
            inventory,
            credentials: None,
        }
    }

    /// Identifier produced by an earlier step
    pub fn id(&self, role: ResourceRole) -> Result<String, ProvisionError> {
        Ok(self.inventory.require(role)?.to_string())
    }

    fn record(&mut self, role: ResourceRole, resource: &ResourceRef) {
        self.inventory.set(role, resource.id());
        if let ResourceRef::IamUser {
            access_key_id: Some(key_id),
            ..
        } = resource
        {
            self.inventory.access_key_id.clone_from(key_id);
        }
    }
}

/// One pipeline step
pub enum Step {
    /// Create a resource; it becomes a rollback candidate once created
    Create { role: ResourceRole, build: SpecBuilder },
    /// Resolve a resource created implicitly by an earlier one; never rolled back
    Lookup { role: ResourceRole, build: SpecBuilder },
    /// Fixed settling delay before dependents may reference earlier resources
    Wait { label: String, delay: Duration },
}

impl Step {
    /// Create step
    pub fn create<F>(role: ResourceRole, build: F) -> Self
    where
        F: Fn(&PipelineState) -> Result<ResourceSpec, ProvisionError> + Send + Sync + 'static,
    {
        Step::Create {
            role,
            build: Box::new(build),
        }
    }

    /// Lookup step
    pub fn lookup<F>(role: ResourceRole, build: F) -> Self
    where
        F: Fn(&PipelineState) -> Result<ResourceSpec, ProvisionError> + Send + Sync + 'static,
    {
        Step::Lookup {
            role,
            build: Box::new(build),
        }
    }

    /// Wait step
    pub fn wait(label: impl Into<String>, delay: Duration) -> Self {
        Step::Wait {
            label: label.into(),
            delay,
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Create { role, .. } => write!(f, "Create({role})"),
            Step::Lookup { role, .. } => write!(f, "Lookup({role})"),
            Step::Wait { label, delay } => write!(f, "Wait({label}, {delay:?})"),
        }
    }
}

/// Output of a successful run
#[derive(Debug, Clone)]
pub struct Provisioned {
    /// Every identifier recorded by the run
    pub inventory: InventorySpec,
    /// Credentials issued during the run
    pub credentials: Option<AccessKey>,
    /// Created resources, in creation order
    pub created: Vec<(ResourceRole, ResourceRef)>,
}

/// Failure of one step, before compensation
enum StepFailure {
    Cloud(CloudError),
    Build(ProvisionError),
}

/// Ordered list of steps with reverse compensation on failure
#[derive(Debug)]
pub struct CreatePipeline {
    steps: Vec<Step>,
    termination: WaitConfig,
}

impl CreatePipeline {
    /// Empty pipeline; `termination` bounds the wait when an instance is rolled back
    #[must_use]
    pub fn new(termination: WaitConfig) -> Self {
        Self {
            steps: Vec::new(),
            termination,
        }
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step in order starting from `state`
    pub async fn run<P>(&self, provider: &P, mut state: PipelineState) -> Result<Provisioned, ProvisionError>
    where
        P: CloudProvider + ?Sized,
    {
        let mut rollback: Vec<(ResourceRole, ResourceRef)> = Vec::new();

        for step in &self.steps {
            let outcome = match step {
                Step::Wait { label, delay } => {
                    info!(step = %label, delay = ?delay, "Waiting before next step");
                    tokio::time::sleep(*delay).await;
                    continue;
                }
                Step::Lookup { role, build } => match build(&state) {
                    Ok(spec) => provider
                        .lookup(&spec)
                        .await
                        .map(|found| (*role, Created::new(found), false))
                        .map_err(|e| (*role, StepFailure::Cloud(e))),
                    Err(e) => Err((*role, StepFailure::Build(e))),
                },
                Step::Create { role, build } => match build(&state) {
                    Ok(spec) => {
                        info!(role = %role, kind = %spec.kind(), "Creating");
                        provider
                            .create(&spec)
                            .await
                            .map(|created| (*role, created, true))
                            .map_err(|e| (*role, StepFailure::Cloud(e)))
                    }
                    Err(e) => Err((*role, StepFailure::Build(e))),
                },
            };

            match outcome {
                Ok((role, created, compensable)) => {
                    info!(role = %role, id = %created.id(), "Recorded");
                    state.record(role, &created.resource);
                    if created.credentials.is_some() {
                        state.credentials = created.credentials;
                    }
                    if compensable {
                        rollback.push((role, created.resource));
                    }
                }
                Err((role, failure)) => {
                    match &failure {
                        StepFailure::Cloud(e) => error!(role = %role, error = %e, "Step failed"),
                        StepFailure::Build(e) => error!(role = %role, error = %e, "Step could not be built"),
                    }
                    let (rolled_back, rollback_failures) = self.compensate(provider, rollback).await;
                    return Err(match failure {
                        StepFailure::Cloud(source) => ProvisionError::Create {
                            role,
                            source,
                            rolled_back,
                            rollback_failures,
                        },
                        StepFailure::Build(source) => ProvisionError::Build {
                            role,
                            source: Box::new(source),
                            rolled_back,
                            rollback_failures,
                        },
                    });
                }
            }
        }

        Ok(Provisioned {
            inventory: state.inventory,
            credentials: state.credentials,
            created: rollback,
        })
    }

    /// Delete every created resource, most recent first. Returns
    /// (rolled back, failed).
    async fn compensate<P>(&self, provider: &P, rollback: Vec<(ResourceRole, ResourceRef)>) -> (usize, usize)
    where
        P: CloudProvider + ?Sized,
    {
        let mut rolled_back = 0;
        let mut failures = 0;

        for (role, resource) in rollback.into_iter().rev() {
            warn!(role = %role, resource = %resource, "Rolling back");
            let result = match provider.delete(&resource).await {
                Ok(()) if matches!(resource, ResourceRef::Instance { .. }) => {
                    wait_until_terminated(provider, &resource, self.termination).await
                }
                Ok(()) => Ok(()),
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(()) => rolled_back += 1,
                Err(e) => {
                    error!(role = %role, resource = %resource, error = %e, "Rollback failed, continuing");
                    failures += 1;
                }
            }
        }

        (rolled_back, failures)
    }
}

#[path = "pipeline_test.rs"]
mod pipeline_test;
