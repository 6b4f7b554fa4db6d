//! Instance bootstrap payloads
//!
//! The master receives a script that runs `bootctl boot` with every object
//! the in-cluster controller will need; workers receive a script that runs
//! `bootctl join` with the join command fetched for the current pass.

use crate::error::ProvisionError;
use aws_client::AccessKey;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crds::{Cluster, Inventory, Machine, SYSTEM_NAMESPACE};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

/// Name of the secret holding the controller user's credentials
pub const CREDENTIALS_SECRET_NAME: &str = "aws-creds";

/// Secret key holding the access key id
pub const ACCESS_KEY_ID_KEY: &str = "aws_access_key_id";

/// Secret key holding the secret access key
pub const SECRET_ACCESS_KEY_KEY: &str = "aws_secret_access_key";

/// Credentials secret created in-cluster by `bootctl boot`
#[must_use]
pub fn aws_credentials_secret(key: &AccessKey) -> Secret {
    let mut data = BTreeMap::new();
    data.insert(
        ACCESS_KEY_ID_KEY.to_string(),
        ByteString(key.access_key_id.clone().into_bytes()),
    );
    data.insert(
        SECRET_ACCESS_KEY_KEY.to_string(),
        ByteString(key.secret_access_key.clone().into_bytes()),
    );
    Secret {
        metadata: ObjectMeta {
            name: Some(CREDENTIALS_SECRET_NAME.to_string()),
            namespace: Some(SYSTEM_NAMESPACE.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(data),
        type_: Some("Opaque".to_string()),
        ..Secret::default()
    }
}

/// Wrap `value` in single quotes for a POSIX shell
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Objects handed to the master on first boot
#[derive(Debug)]
pub struct MasterBoot<'a> {
    /// Artifact bucket the join command is published to
    pub bucket: &'a str,
    /// Region of the bucket
    pub region: &'a str,
    /// Cluster object applied once the control plane is up
    pub cluster: &'a Cluster,
    /// Master machine object
    pub machine: &'a Machine,
    /// Controller user key, stored as the `aws-creds` secret
    pub credentials: &'a AccessKey,
    /// Inventory object for the machine controller
    pub inventory: &'a Inventory,
}

/// Script that runs `bootctl boot` on the master
pub fn master_boot_script(boot: &MasterBoot<'_>) -> Result<String, ProvisionError> {
    let cluster = serde_json::to_string(boot.cluster)?;
    let machine = serde_json::to_string(boot.machine)?;
    let secret = serde_json::to_string(&aws_credentials_secret(boot.credentials))?;
    let inventory = serde_json::to_string(boot.inventory)?;
    Ok(format!(
        "#!/bin/bash\nbootctl boot -a {} -r {} -c {} -m {} -s {} -i {}\n",
        shell_quote(boot.bucket),
        shell_quote(boot.region),
        shell_quote(&cluster),
        shell_quote(&machine),
        shell_quote(&secret),
        shell_quote(&inventory),
    ))
}

/// Script that runs `bootctl join` on a worker, embedding the join command
#[must_use]
pub fn worker_join_script(bucket: &str, region: &str, join_command: &str) -> String {
    format!(
        "#!/bin/bash\nbootctl join -a {} -r {} --command-b64 {}\n",
        shell_quote(bucket),
        shell_quote(region),
        STANDARD.encode(join_command.trim()),
    )
}

/// Encode a script as instance user data
#[must_use]
pub fn encode_user_data(script: &str) -> String {
    STANDARD.encode(script)
}

/// Decode a base64 payload produced by [`encode_user_data`] or [`worker_join_script`]
pub fn decode_payload(encoded: &str) -> Result<String, ProvisionError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ProvisionError::InvalidConfig(format!("invalid base64 payload: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| ProvisionError::InvalidConfig(format!("payload is not UTF-8: {e}")))
}
