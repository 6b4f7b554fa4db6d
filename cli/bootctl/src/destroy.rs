//! `bootctl destroy`

use crate::cli::DestroyArgs;
use anyhow::{Context, bail};
use aws_client::AwsProvider;
use provisioner::inventory::load_inventory;
use provisioner::{TeardownPipeline, WaitConfig};
use std::time::Duration;
use tracing::info;

pub async fn run(args: DestroyArgs) -> anyhow::Result<()> {
    let inventory = load_inventory(&args.inventory).context("failed to read inventory")?;
    if inventory.region.is_empty() {
        bail!("inventory {} has no region", args.inventory.display());
    }

    let provider = AwsProvider::new(&inventory.region).await;
    let termination = WaitConfig {
        interval: Duration::from_secs(args.poll_secs),
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let report = TeardownPipeline::new(termination).run(&provider, &inventory).await?;

    info!(
        drained = report.drained.len(),
        deleted = report.deleted.len(),
        already_gone = report.already_gone.len(),
        "Cluster destroyed"
    );
    Ok(())
}
