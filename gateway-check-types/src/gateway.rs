//! Gateway descriptors and remote status records.

use chrono::{DateTime, Utc};

/// A gateway listed in the local inventory.
///
/// Descriptors are loaded once per run and never change while the run is in
/// progress.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GatewayDescriptor {
    /// Human-readable gateway name. Also used as the `device_id` tag when
    /// recording metrics.
    pub name: String,

    /// Opaque identifier understood by the remote lookup service.
    pub remote_id: String,
}

impl GatewayDescriptor {
    /// Create a new descriptor.
    pub fn new(name: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote_id: remote_id.into(),
        }
    }
}

impl std::fmt::Display for GatewayDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.remote_id)
    }
}

/// What the remote lookup service reported for one gateway.
///
/// A record only exists when the service returned a usable timestamp; there
/// is no "empty" record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusRecord {
    /// When the service last heard from the gateway.
    pub remote_timestamp: DateTime<Utc>,

    /// Packets received by the gateway.
    pub rx_count: u64,
}

impl StatusRecord {
    /// Create a new status record.
    pub fn new(remote_timestamp: DateTime<Utc>, rx_count: u64) -> Self {
        Self {
            remote_timestamp,
            rx_count,
        }
    }
}
