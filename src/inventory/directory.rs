//! Directory-based inventory.
//!
//! One JSON file per gateway. Only files whose name contains `gw` are read,
//! so notes and other files can live next to the inventory.

use std::fs;
use std::path::{Path, PathBuf};

use gateway_check_types::GatewayDescriptor;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{InventoryLoad, InventoryLoadError, InventorySource};

/// Marker a file name must contain to be treated as a gateway entry.
const ENTRY_MARKER: &str = "gw";

/// An inventory read from a directory of JSON files.
///
/// Each entry looks like:
///
/// ```json
/// { "name": "rooftop", "ttn_id": "B827EBFFFE000001" }
/// ```
///
/// Extra keys are ignored. Entries are returned in directory listing order.
#[derive(Debug)]
pub struct DirectoryInventory {
    dir: PathBuf,
    description: String,
}

/// Raw shape of an entry; presence is checked after parsing so a missing key
/// can be reported by name.
#[derive(Debug, Deserialize)]
struct RawEntry {
    name: Option<String>,
    ttn_id: Option<String>,
}

impl DirectoryInventory {
    /// Create an inventory bound to the given directory.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let description = format!("directory: {}", dir.display());
        Self { dir, description }
    }

    /// Returns the directory being read.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read and validate a single entry.
    fn read_entry(path: &Path) -> Result<GatewayDescriptor, InventoryLoadError> {
        let content = fs::read_to_string(path).map_err(|source| InventoryLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let raw: RawEntry =
            serde_json::from_str(&content).map_err(|source| InventoryLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let name = required(raw.name, path, "name")?;
        let remote_id = required(raw.ttn_id, path, "ttn_id")?;
        Ok(GatewayDescriptor::new(name, remote_id))
    }
}

fn required(
    value: Option<String>,
    path: &Path,
    field: &'static str,
) -> Result<String, InventoryLoadError> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| InventoryLoadError::MissingField {
            path: path.to_path_buf(),
            field,
        })?;

    // Names end up as tag values; a line break would split a metric write.
    if value.chars().any(char::is_control) {
        return Err(InventoryLoadError::InvalidField {
            path: path.to_path_buf(),
            field,
        });
    }
    Ok(value)
}

impl InventorySource for DirectoryInventory {
    fn load(&self) -> InventoryLoad {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                return InventoryLoad::LoadFailed(format!(
                    "cannot list {}: {}",
                    self.dir.display(),
                    e
                ))
            }
        };

        let mut gateways = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            if !entry.file_name().to_string_lossy().contains(ENTRY_MARKER) {
                continue;
            }

            let path = entry.path();
            if !path.is_file() {
                debug!(path = %path.display(), "Skipping non-file inventory entry");
                continue;
            }

            match Self::read_entry(&path) {
                Ok(gateway) => {
                    debug!(path = %path.display(), gateway = %gateway, "Loaded inventory entry");
                    gateways.push(gateway);
                }
                Err(e) => warn!(path = %e.path().display(), error = %e, "Skipping inventory entry"),
            }
        }

        InventoryLoad::from_gateways(gateways)
    }

    fn description(&self) -> &str {
        &self.description
    }
}
