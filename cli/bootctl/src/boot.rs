//! `bootctl boot`
//!
//! First-boot sequence on the master: initialise the control plane, install
//! the pod network, publish the objects the machine controller needs,
//! deploy the controller and leave the join command in the artifact bucket.

use crate::cli::BootArgs;
use crate::shell;
use anyhow::Context;
use aws_client::{ArtifactStore, AwsProvider, JOIN_ARTIFACT_KEY};
use crds::{Cluster, Inventory, Machine, SYSTEM_NAMESPACE};
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::info;

const POD_NETWORK_CIDR: &str = "192.168.0.0/16";
const ADMIN_KUBECONFIG: &str = "/etc/kubernetes/admin.conf";
const USER_KUBE_DIR: &str = "/home/ubuntu/.kube";
const USER_KUBECONFIG: &str = "/home/ubuntu/.kube/config";
const NETWORK_MANIFEST: &str = "/etc/kubernetes/network/network.yaml";
const INFRA_MANIFEST: &str = "/etc/kubernetes/infra/infra.yaml";
const FIELD_MANAGER: &str = "bootctl";

/// Objects decoded from the boot arguments
struct BootObjects {
    cluster: Cluster,
    machine: Machine,
    secret: Secret,
    inventory: Option<Inventory>,
}

impl BootObjects {
    fn decode(args: &BootArgs) -> anyhow::Result<Self> {
        Ok(Self {
            cluster: serde_json::from_str(&args.cluster).context("invalid Cluster object")?,
            machine: serde_json::from_str(&args.machine).context("invalid Machine object")?,
            secret: serde_json::from_str(&args.secret).context("invalid Secret object")?,
            inventory: args
                .inventory
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("invalid Inventory object")?,
        })
    }
}

pub async fn run(args: BootArgs) -> anyhow::Result<()> {
    let objects = BootObjects::decode(&args)?;

    shell::run(
        "kubeadm",
        &["init", &format!("--pod-network-cidr={POD_NETWORK_CIDR}")],
    )
    .await?;
    install_user_kubeconfig().await?;
    shell::run("kubectl", &["--kubeconfig", ADMIN_KUBECONFIG, "apply", "-f", NETWORK_MANIFEST]).await?;

    let client = admin_client().await?;
    apply(&client, &objects.secret, SYSTEM_NAMESPACE).await?;
    apply(&client, &objects.cluster, "default").await?;
    apply(&client, &objects.machine, "default").await?;
    if let Some(inventory) = &objects.inventory {
        apply(&client, inventory, SYSTEM_NAMESPACE).await?;
    }

    shell::run("kubectl", &["--kubeconfig", ADMIN_KUBECONFIG, "apply", "-f", INFRA_MANIFEST]).await?;

    let join = shell::output("kubeadm", &["token", "create", "--print-join-command"]).await?;
    let provider = AwsProvider::new(&args.region).await;
    provider
        .put_artifact(&args.bucket, JOIN_ARTIFACT_KEY, join.trim())
        .await
        .context("failed to store join command")?;

    info!(bucket = %args.bucket, "Master ready, join command published");
    Ok(())
}

async fn install_user_kubeconfig() -> anyhow::Result<()> {
    tokio::fs::create_dir_all(USER_KUBE_DIR)
        .await
        .with_context(|| format!("failed to create {USER_KUBE_DIR}"))?;
    tokio::fs::copy(ADMIN_KUBECONFIG, USER_KUBECONFIG)
        .await
        .with_context(|| format!("failed to copy {ADMIN_KUBECONFIG}"))?;
    shell::run("chown", &["-R", "ubuntu:ubuntu", USER_KUBE_DIR]).await
}

async fn admin_client() -> anyhow::Result<Client> {
    let kubeconfig = Kubeconfig::read_from(ADMIN_KUBECONFIG)?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
    Ok(Client::try_from(config)?)
}

/// Server-side apply of a namespaced object, so a repeated boot converges
async fn apply<K>(client: &Client, object: &K, default_namespace: &str) -> anyhow::Result<()>
where
    K: Resource<Scope = NamespaceResourceScope> + Clone + Debug + Serialize + DeserializeOwned,
    K::DynamicType: Default,
{
    let name = object.name_any();
    let namespace = target_namespace(object.namespace(), default_namespace);
    let api: Api<K> = Api::namespaced(client.clone(), &namespace);
    api.patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(object))
        .await
        .with_context(|| format!("failed to apply {} {namespace}/{name}", K::kind(&K::DynamicType::default())))?;
    info!(kind = %K::kind(&K::DynamicType::default()), namespace = %namespace, name = %name, "Applied");
    Ok(())
}

fn target_namespace(declared: Option<String>, default_namespace: &str) -> String {
    declared.unwrap_or_else(|| default_namespace.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_client::AccessKey;
    use crds::{ClusterSpec, InventorySpec, MachineSpec};
    use provisioner::bootstrap::aws_credentials_secret;

    fn args(inventory: Option<String>) -> BootArgs {
        let cluster = Cluster::new("demo", ClusterSpec {
            region: "us-east-2".to_string(),
        });
        let machine = Machine::new("demo-master", MachineSpec {
            machine_type: "boot-master".to_string(),
            replicas: 1,
            ami: "ami-1".to_string(),
            key_name: "ops".to_string(),
            instance_type: None,
        });
        let secret = aws_credentials_secret(&AccessKey {
            access_key_id: "AKIA1".to_string(),
            secret_access_key: "s".to_string(),
        });
        BootArgs {
            bucket: "demo-artifacts".to_string(),
            region: "us-east-2".to_string(),
            cluster: serde_json::to_string(&cluster).unwrap(),
            machine: serde_json::to_string(&machine).unwrap(),
            secret: serde_json::to_string(&secret).unwrap(),
            inventory,
        }
    }

    #[test]
    fn test_decodes_objects_from_user_data() {
        let inventory = Inventory::for_cluster("demo", InventorySpec::for_region("us-east-2"));
        let objects = BootObjects::decode(&args(Some(serde_json::to_string(&inventory).unwrap()))).unwrap();
        assert_eq!(objects.cluster.cluster_name(), "demo");
        assert!(objects.machine.spec.is_master());
        assert_eq!(objects.secret.name_any(), "aws-creds");
        assert_eq!(objects.inventory.unwrap().name_any(), "demo-inventory");
    }

    #[test]
    fn test_inventory_is_optional() {
        assert!(BootObjects::decode(&args(None)).unwrap().inventory.is_none());
    }

    #[test]
    fn test_bad_object_is_reported() {
        let mut bad = args(None);
        bad.machine = "{".to_string();
        let err = BootObjects::decode(&bad).err().unwrap();
        assert_eq!(err.to_string(), "invalid Machine object");
    }

    #[test]
    fn test_declared_namespace_wins() {
        assert_eq!(target_namespace(Some("infra".to_string()), "default"), "infra");
        assert_eq!(target_namespace(None, "default"), "default");
    }
}
