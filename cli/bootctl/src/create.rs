//! `bootctl create`

use crate::cli::CreateArgs;
use anyhow::Context;
use aws_client::AwsProvider;
use provisioner::inventory::save_inventory;
use provisioner::{ClusterRequest, ProvisionSettings, provision_cluster};
use std::time::Duration;
use tracing::info;

pub async fn run(args: CreateArgs) -> anyhow::Result<()> {
    let request = ClusterRequest::load(&args.cluster, &args.machine).context("failed to read manifests")?;
    let settings = ProvisionSettings {
        profile_settle: Duration::from_secs(args.settle_secs),
        ..ProvisionSettings::default()
    };

    let provider = AwsProvider::new(request.region()).await;
    let provisioned = provision_cluster(&provider, &request, &settings).await?;

    save_inventory(&provisioned.inventory, args.output.as_deref())?;
    if let Some(path) = &args.output {
        info!(path = %path.display(), "Inventory written");
    }
    Ok(())
}
