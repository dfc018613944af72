//! Gateway inventory.
//!
//! The inventory is the list of gateways a pass should check. It is read
//! fresh at the start of every pass and never modified.

mod directory;

pub use directory::DirectoryInventory;

use std::fmt::Debug;
use std::path::PathBuf;

use gateway_check_types::GatewayDescriptor;
use thiserror::Error;

/// Trait for anything that can list the gateways to check.
///
/// # Example
///
/// ```no_run
/// use gateway_check::inventory::{DirectoryInventory, InventoryLoad, InventorySource};
///
/// let source = DirectoryInventory::new("/etc/gateways");
/// match source.load() {
///     InventoryLoad::Loaded(gateways) => println!("{} gateways", gateways.len()),
///     InventoryLoad::Empty => println!("nothing to check"),
///     InventoryLoad::LoadFailed(reason) => eprintln!("{}", reason),
/// }
/// ```
pub trait InventorySource: Send + Sync + Debug {
    /// Enumerate the gateways. Entries that cannot be read are skipped.
    fn load(&self) -> InventoryLoad;

    /// Returns a human-readable description of the source.
    fn description(&self) -> &str;
}

/// Result of loading the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryLoad {
    /// At least one gateway was found.
    Loaded(Vec<GatewayDescriptor>),
    /// The inventory was readable but listed no valid gateway.
    Empty,
    /// The inventory itself could not be read.
    LoadFailed(String),
}

impl InventoryLoad {
    pub(crate) fn from_gateways(gateways: Vec<GatewayDescriptor>) -> Self {
        if gateways.is_empty() {
            InventoryLoad::Empty
        } else {
            InventoryLoad::Loaded(gateways)
        }
    }

    /// The gateways found, treating a failed load as an empty one.
    pub fn into_gateways(self) -> Vec<GatewayDescriptor> {
        match self {
            InventoryLoad::Loaded(gateways) => gateways,
            InventoryLoad::Empty | InventoryLoad::LoadFailed(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            InventoryLoad::Loaded(gateways) => gateways.len(),
            InventoryLoad::Empty | InventoryLoad::LoadFailed(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, InventoryLoad::LoadFailed(_))
    }
}

/// Why a single inventory entry was skipped.
#[derive(Debug, Error)]
pub enum InventoryLoadError {
    #[error("Read error in {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} has no usable `{field}`", path.display())]
    MissingField { path: PathBuf, field: &'static str },

    #[error("{} has an invalid `{field}`: contains a control character", path.display())]
    InvalidField { path: PathBuf, field: &'static str },
}

impl InventoryLoadError {
    /// The entry the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            InventoryLoadError::Read { path, .. }
            | InventoryLoadError::Parse { path, .. }
            | InventoryLoadError::MissingField { path, .. }
            | InventoryLoadError::InvalidField { path, .. } => path,
        }
    }
}
