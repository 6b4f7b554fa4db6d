//! `bootctl join`

use crate::cli::JoinArgs;
use crate::shell;
use aws_client::{ArtifactStore, AwsProvider, JOIN_ARTIFACT_KEY};
use provisioner::bootstrap::decode_payload;
use tracing::info;

pub async fn run(args: JoinArgs) -> anyhow::Result<()> {
    let command = match &args.command_b64 {
        Some(encoded) => decode_payload(encoded)?,
        None => {
            info!(bucket = %args.bucket, "Fetching join command");
            let provider = AwsProvider::new(&args.region).await;
            provider.get_artifact(&args.bucket, JOIN_ARTIFACT_KEY).await?
        }
    };

    shell::run("/bin/bash", &["-c", &join_command_line(&command)]).await?;
    info!("Node joined the cluster");
    Ok(())
}

/// Shell line running the join command from `/usr/bin`
fn join_command_line(command: &str) -> String {
    let command = command.trim();
    if command.starts_with('/') {
        command.to_string()
    } else {
        format!("/usr/bin/{command}")
    }
}
