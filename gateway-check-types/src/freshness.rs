//! Freshness classification.
//!
//! A gateway is online when its last-seen timestamp falls inside the
//! freshness window ending at `now`. The boundary is inclusive: a timestamp
//! exactly one window old still counts as online.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Default freshness window: ten minutes.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Maximum age of a last-seen timestamp for a gateway to count as online.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FreshnessWindow(Duration);

impl FreshnessWindow {
    /// Create a window of the given length.
    pub const fn new(window: Duration) -> Self {
        Self(window)
    }

    /// Create a window from whole minutes.
    pub const fn from_mins(mins: u64) -> Self {
        Self(Duration::from_secs(mins * 60))
    }

    /// The window length.
    pub const fn as_duration(&self) -> Duration {
        self.0
    }
}

impl Default for FreshnessWindow {
    fn default() -> Self {
        Self(DEFAULT_FRESHNESS_WINDOW)
    }
}

impl From<Duration> for FreshnessWindow {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

/// Result of classifying a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Freshness {
    Online,
    Offline,
}

impl Freshness {
    /// Whether the gateway is online.
    pub fn is_online(&self) -> bool {
        matches!(self, Freshness::Online)
    }

    /// Value written to the status field: 1 for online, 0 for offline.
    pub fn status_value(&self) -> i64 {
        match self {
            Freshness::Online => 1,
            Freshness::Offline => 0,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Freshness::Online => "online",
            Freshness::Offline => "offline",
        }
    }
}

/// Classify a last-seen timestamp against `now`.
///
/// Returns [`Freshness::Online`] iff `remote_timestamp >= now - window`.
/// A window too large to subtract from `now` covers every representable
/// instant, so the gateway is online.
pub fn classify(
    remote_timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
    window: FreshnessWindow,
) -> Freshness {
    let cutoff = chrono::Duration::from_std(window.as_duration())
        .ok()
        .and_then(|w| now.checked_sub_signed(w));

    match cutoff {
        Some(cutoff) if remote_timestamp < cutoff => Freshness::Offline,
        _ => Freshness::Online,
    }
}
