//! Command-line surface

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bootctl",
    version,
    about = "Bootstrap and tear down a single-master Kubernetes cluster on AWS"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision the cluster infrastructure and master node
    Create(CreateArgs),

    /// Delete every resource recorded in an inventory file
    Destroy(DestroyArgs),

    /// Initialise the master node (run on the master)
    Boot(BootArgs),

    /// Join this node to the cluster (run on a worker)
    Join(JoinArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Path to the Cluster manifest
    #[arg(short, long)]
    pub cluster: PathBuf,

    /// Path to the master Machine manifest
    #[arg(short, long)]
    pub machine: PathBuf,

    /// Write the inventory here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seconds to let the instance profile propagate before launching the master
    #[arg(long, default_value_t = 15)]
    pub settle_secs: u64,
}

#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Path to the inventory written by `create`
    #[arg(short, long)]
    pub inventory: PathBuf,

    /// Seconds between instance termination checks
    #[arg(long, default_value_t = 5)]
    pub poll_secs: u64,

    /// Give up waiting for the instance to terminate after this many seconds
    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,
}

#[derive(Args, Debug)]
pub struct BootArgs {
    /// Artifact bucket
    #[arg(short = 'a', long)]
    pub bucket: String,

    /// Region
    #[arg(short, long)]
    pub region: String,

    /// Cluster object (JSON)
    #[arg(short, long)]
    pub cluster: String,

    /// Machine object (JSON)
    #[arg(short, long)]
    pub machine: String,

    /// Credentials Secret (JSON)
    #[arg(short, long)]
    pub secret: String,

    /// Inventory object (JSON)
    #[arg(short, long)]
    pub inventory: Option<String>,
}

#[derive(Args, Debug)]
pub struct JoinArgs {
    /// Artifact bucket
    #[arg(short = 'a', long)]
    pub bucket: String,

    /// Region
    #[arg(short, long)]
    pub region: String,

    /// Join command, base64-encoded; fetched from the bucket when absent
    #[arg(long)]
    pub command_b64: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_create_defaults() {
        let cli = Cli::try_parse_from(["bootctl", "create", "-c", "cluster.yaml", "-m", "machine.yaml"]).unwrap();
        let Commands::Create(args) = cli.command else {
            panic!("expected create");
        };
        assert_eq!(args.cluster, PathBuf::from("cluster.yaml"));
        assert!(args.output.is_none());
        assert_eq!(args.settle_secs, 15);
    }

    #[test]
    fn test_boot_flags_match_user_data() {
        let cli = Cli::try_parse_from([
            "bootctl", "boot", "-a", "bucket", "-r", "us-east-2", "-c", "{}", "-m", "{}", "-s", "{}", "-i", "{}",
        ])
        .unwrap();
        let Commands::Boot(args) = cli.command else {
            panic!("expected boot");
        };
        assert_eq!(args.bucket, "bucket");
        assert_eq!(args.inventory.as_deref(), Some("{}"));
    }

    #[test]
    fn test_join_accepts_embedded_command() {
        let cli = Cli::try_parse_from(["bootctl", "join", "-a", "bucket", "-r", "us-east-2", "--command-b64", "a2"])
            .unwrap();
        let Commands::Join(args) = cli.command else {
            panic!("expected join");
        };
        assert_eq!(args.command_b64.as_deref(), Some("a2"));
    }
}
