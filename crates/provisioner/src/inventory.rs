//! Inventory file persistence
//!
//! The inventory is written once at the end of a create run and read back
//! verbatim by teardown. The format is the flat camelCase JSON of
//! [`InventorySpec`].

use crate::error::ProvisionError;
use crds::InventorySpec;
use std::io::Write;
use std::path::Path;

/// Read an inventory file
pub fn load_inventory(path: &Path) -> Result<InventorySpec, ProvisionError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ProvisionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write an inventory as pretty JSON to `path`, or to stdout when `path` is `None`
pub fn save_inventory(inventory: &InventorySpec, path: Option<&Path>) -> Result<(), ProvisionError> {
    let mut json = serde_json::to_string_pretty(inventory)?;
    json.push('\n');
    match path {
        Some(path) => std::fs::write(path, json).map_err(|source| ProvisionError::Io {
            path: path.to_path_buf(),
            source,
        }),
        None => std::io::stdout()
            .lock()
            .write_all(json.as_bytes())
            .map_err(|source| ProvisionError::Io {
                path: "<stdout>".into(),
                source,
            }),
    }
}
