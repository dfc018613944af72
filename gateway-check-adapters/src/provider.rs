//! The status lookup seam.

use async_trait::async_trait;
use gateway_check_types::StatusRecord;

use crate::LookupError;

/// Resolves a gateway's last-seen timestamp and receive counter.
///
/// Implementations must be safe to call from many tasks at once; the check
/// runner shares one provider across its worker pool.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Look up the gateway known to the remote service as `remote_id`.
    async fn fetch(&self, remote_id: &str) -> Result<StatusRecord, LookupError>;
}

/// Identifier used by the older registration format: `eui-` followed by the
/// lowercased identifier.
pub fn legacy_id(remote_id: &str) -> String {
    format!("eui-{}", remote_id.to_lowercase())
}
