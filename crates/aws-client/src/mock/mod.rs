//! Mock cloud provider for unit testing
//!
//! Keeps every resource in memory, records each call in order, and can be
//! told to fail specific operations so pipelines can be exercised without
//! an AWS account.

mod helpers;

use crate::error::CloudError;
use crate::models::{
    AccessKey, Created, InstanceSpec, InstanceState, InstanceSummary, PoolSelector, ResourceKind,
    ResourceRef, ResourceSpec, ResourceStatus,
};
use crate::provider_trait::{ArtifactStore, CloudProvider};
use helpers::{dependency_violation, injected_failure, not_found};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Create(ResourceKind),
    Lookup(ResourceKind),
    Describe(ResourceRef),
    Delete(ResourceRef),
    ListInstances(PoolSelector),
    ListClusterInstances(String),
    PutArtifact { bucket: String, key: String },
    GetArtifact { bucket: String, key: String },
}

#[derive(Debug, Clone)]
pub(crate) struct MockInstance {
    pub(crate) spec: InstanceSpec,
    pub(crate) state: InstanceState,
    /// Describe calls left before a shutting-down instance reports terminated
    pub(crate) polls_left: u32,
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub(crate) calls: Vec<MockCall>,
    pub(crate) live: HashMap<String, ResourceRef>,
    /// VPC each subnet, gateway and security group was created in
    pub(crate) parents: HashMap<String, String>,
    pub(crate) instances: HashMap<String, MockInstance>,
    pub(crate) artifacts: HashMap<(String, String), String>,
    pub(crate) next_id: u64,
    pub(crate) create_count: usize,
    pub(crate) fail_create_at: Option<usize>,
    pub(crate) fail_create_kinds: HashSet<ResourceKind>,
    pub(crate) fail_delete_kinds: HashSet<ResourceKind>,
    pub(crate) fail_listing: bool,
    pub(crate) polls_until_terminated: u32,
}

/// Mock cloud provider for testing
#[derive(Debug, Clone)]
pub struct MockCloudProvider {
    region: String,
    pub(crate) state: Arc<Mutex<MockState>>,
}

impl MockCloudProvider {
    /// Create an empty mock provider
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the n-th `create` call (1-based, counted across all kinds)
    #[must_use]
    pub fn fail_nth_create(self, n: usize) -> Self {
        self.lock().fail_create_at = Some(n);
        self
    }

    /// Fail every `create` of the given kind
    #[must_use]
    pub fn fail_create_of(self, kind: ResourceKind) -> Self {
        self.lock().fail_create_kinds.insert(kind);
        self
    }

    /// Fail every `delete` of the given kind
    #[must_use]
    pub fn fail_delete_of(self, kind: ResourceKind) -> Self {
        self.lock().fail_delete_kinds.insert(kind);
        self
    }

    /// Fail every pool and cluster listing
    #[must_use]
    pub fn fail_listing(self) -> Self {
        self.lock().fail_listing = true;
        self
    }

    /// Number of describe polls a terminating instance spends shutting down
    #[must_use]
    pub fn terminate_after_polls(self, polls: u32) -> Self {
        self.lock().polls_until_terminated = polls;
        self
    }

    /// Add an already-running instance to a pool
    pub fn seed_instance(&self, selector: &PoolSelector, state: InstanceState) -> String {
        let mut st = self.lock();
        let id = helpers::next_id(&mut st, "i");
        let spec = helpers::seeded_instance_spec(selector);
        if state.is_live() {
            st.live.insert(id.clone(), ResourceRef::Instance { id: id.clone() });
        }
        st.instances.insert(
            id.clone(),
            MockInstance {
                spec,
                state,
                polls_left: 0,
            },
        );
        id
    }

    /// Store an artifact directly
    pub fn seed_artifact(&self, bucket: &str, key: &str, body: &str) {
        self.lock()
            .artifacts
            .insert((bucket.to_string(), key.to_string()), body.to_string());
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Kinds passed to `create`, in order
    pub fn created_kinds(&self) -> Vec<ResourceKind> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Create(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    /// Resources passed to `delete`, in order
    pub fn deleted(&self) -> Vec<ResourceRef> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Delete(resource) => Some(resource.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of live resources the mock still holds
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// Launch spec of an instance created through the mock
    pub fn instance_spec(&self, id: &str) -> Option<InstanceSpec> {
        self.lock().instances.get(id).map(|instance| instance.spec.clone())
    }

    /// Ids of live instances in a pool
    pub fn live_instances(&self, selector: &PoolSelector) -> Vec<String> {
        let st = self.lock();
        let mut ids: Vec<String> = st
            .instances
            .iter()
            .filter(|(_, instance)| instance.spec.selector() == *selector && instance.state.is_live())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Artifact stored under `key`, if any
    pub fn artifact(&self, bucket: &str, key: &str) -> Option<String> {
        self.lock()
            .artifacts
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait::async_trait]
impl CloudProvider for MockCloudProvider {
    fn region(&self) -> &str {
        &self.region
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<Created, CloudError> {
        let mut st = self.lock();
        let kind = spec.kind();
        st.calls.push(MockCall::Create(kind));
        st.create_count += 1;

        if st.fail_create_at == Some(st.create_count) || st.fail_create_kinds.contains(&kind) {
            return Err(injected_failure("create", kind));
        }

        let created = match spec {
            ResourceSpec::Vpc { .. } => Created::new(ResourceRef::Vpc {
                id: helpers::next_id(&mut st, "vpc"),
            }),
            ResourceSpec::RouteTable { .. } => {
                return Err(CloudError::Unsupported {
                    operation: "create",
                    kind,
                });
            }
            ResourceSpec::Subnet { vpc_id, .. } => {
                helpers::require_live(&st, vpc_id)?;
                let id = helpers::next_id(&mut st, "subnet");
                st.parents.insert(id.clone(), vpc_id.clone());
                Created::new(ResourceRef::Subnet { id })
            }
            ResourceSpec::InternetGateway { vpc_id, .. } => {
                helpers::require_live(&st, vpc_id)?;
                let id = helpers::next_id(&mut st, "igw");
                st.parents.insert(id.clone(), vpc_id.clone());
                Created::new(ResourceRef::InternetGateway {
                    id,
                    vpc_id: vpc_id.clone(),
                })
            }
            ResourceSpec::SecurityGroup { vpc_id, .. } => {
                helpers::require_live(&st, vpc_id)?;
                let id = helpers::next_id(&mut st, "sg");
                st.parents.insert(id.clone(), vpc_id.clone());
                Created::new(ResourceRef::SecurityGroup { id })
            }
            ResourceSpec::Bucket { name } => Created::new(ResourceRef::Bucket { name: name.clone() }),
            ResourceSpec::IamPolicy { name, .. } => Created::new(ResourceRef::IamPolicy {
                arn: format!("arn:aws:iam::000000000000:policy/{name}"),
            }),
            ResourceSpec::IamRole { name, policy_arn } => Created::new(ResourceRef::IamRole {
                name: name.clone(),
                policy_arn: policy_arn.clone(),
            }),
            ResourceSpec::InstanceProfile { name, role_name } => {
                Created::new(ResourceRef::InstanceProfile {
                    name: name.clone(),
                    role_name: role_name.clone(),
                })
            }
            ResourceSpec::IamGroup { name, policy_arn } => Created::new(ResourceRef::IamGroup {
                name: name.clone(),
                policy_arn: policy_arn.clone(),
            }),
            ResourceSpec::IamUser { name, group_name } => {
                let key_id = helpers::next_id(&mut st, "AKIA");
                Created {
                    resource: ResourceRef::IamUser {
                        name: name.clone(),
                        group_name: group_name.clone(),
                        access_key_id: Some(key_id.clone()),
                    },
                    credentials: Some(AccessKey {
                        access_key_id: key_id,
                        secret_access_key: format!("secret-for-{name}"),
                    }),
                }
            }
            ResourceSpec::Instance(instance) => {
                let id = helpers::next_id(&mut st, "i");
                st.instances.insert(
                    id.clone(),
                    MockInstance {
                        spec: (**instance).clone(),
                        state: InstanceState::Pending,
                        polls_left: 0,
                    },
                );
                Created::new(ResourceRef::Instance { id })
            }
        };

        st.live
            .insert(created.id().to_string(), created.resource.clone());
        Ok(created)
    }

    async fn lookup(&self, spec: &ResourceSpec) -> Result<ResourceRef, CloudError> {
        let mut st = self.lock();
        st.calls.push(MockCall::Lookup(spec.kind()));
        match spec {
            ResourceSpec::RouteTable { vpc_id } => {
                helpers::require_live(&st, vpc_id)?;
                Ok(ResourceRef::RouteTable {
                    id: format!("rtb-for-{vpc_id}"),
                })
            }
            _ => Err(CloudError::Unsupported {
                operation: "lookup",
                kind: spec.kind(),
            }),
        }
    }

    async fn describe(&self, resource: &ResourceRef) -> Result<ResourceStatus, CloudError> {
        let mut st = self.lock();
        st.calls.push(MockCall::Describe(resource.clone()));
        if let ResourceRef::Instance { id } = resource {
            let instance = st
                .instances
                .get_mut(id)
                .ok_or_else(|| not_found("describe", resource))?;
            if instance.state == InstanceState::ShuttingDown {
                if instance.polls_left == 0 {
                    instance.state = InstanceState::Terminated;
                } else {
                    instance.polls_left -= 1;
                }
            }
            return Ok(ResourceStatus::Instance(instance.state));
        }
        if st.live.contains_key(resource.id()) {
            Ok(ResourceStatus::Available)
        } else {
            Err(not_found("describe", resource))
        }
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<(), CloudError> {
        let mut st = self.lock();
        st.calls.push(MockCall::Delete(resource.clone()));
        if st.fail_delete_kinds.contains(&resource.kind()) {
            return Err(injected_failure("delete", resource.kind()));
        }
        if !st.live.contains_key(resource.id()) {
            return Err(not_found("delete", resource));
        }
        if let Some(dependent) = helpers::dependent_of(&st, resource) {
            return Err(dependency_violation(resource, &dependent));
        }
        st.live.remove(resource.id());
        if let ResourceRef::Instance { id } = resource {
            let polls = st.polls_until_terminated;
            if let Some(instance) = st.instances.get_mut(id) {
                instance.state = InstanceState::ShuttingDown;
                instance.polls_left = polls;
            }
        }
        Ok(())
    }

    async fn list_instances(&self, selector: &PoolSelector) -> Result<Vec<InstanceSummary>, CloudError> {
        let mut st = self.lock();
        st.calls.push(MockCall::ListInstances(selector.clone()));
        if st.fail_listing {
            return Err(injected_failure("list_instances", ResourceKind::Instance));
        }
        let mut instances: Vec<InstanceSummary> = st
            .instances
            .iter()
            .filter(|(_, instance)| instance.spec.selector() == *selector)
            .map(|(id, instance)| InstanceSummary {
                id: id.clone(),
                state: instance.state,
            })
            .collect();
        instances.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(instances)
    }

    async fn list_cluster_instances(&self, cluster: &str) -> Result<Vec<InstanceSummary>, CloudError> {
        let mut st = self.lock();
        st.calls.push(MockCall::ListClusterInstances(cluster.to_string()));
        if st.fail_listing {
            return Err(injected_failure("list_cluster_instances", ResourceKind::Instance));
        }
        let mut instances: Vec<InstanceSummary> = st
            .instances
            .iter()
            .filter(|(_, instance)| instance.spec.cluster == cluster)
            .map(|(id, instance)| InstanceSummary {
                id: id.clone(),
                state: instance.state,
            })
            .collect();
        instances.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(instances)
    }
}

#[async_trait::async_trait]
impl ArtifactStore for MockCloudProvider {
    async fn put_artifact(&self, bucket: &str, key: &str, body: &str) -> Result<(), CloudError> {
        let mut st = self.lock();
        st.calls.push(MockCall::PutArtifact {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        st.artifacts
            .insert((bucket.to_string(), key.to_string()), body.to_string());
        Ok(())
    }

    async fn get_artifact(&self, bucket: &str, key: &str) -> Result<String, CloudError> {
        let mut st = self.lock();
        st.calls.push(MockCall::GetArtifact {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        st.artifacts
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| CloudError::NotFound {
                operation: "get_artifact",
                code: "NoSuchKey".to_string(),
                message: format!("{bucket}/{key}"),
            })
    }
}
