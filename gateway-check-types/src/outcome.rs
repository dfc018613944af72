//! Per-gateway check outcomes and the report of a whole pass.

use chrono::{DateTime, Utc};

use crate::{Freshness, GatewayDescriptor};

/// Progress of a single gateway check.
///
/// ```text
/// Pending ──▶ LookedUp ──▶ Classified ──▶ Recorded
///    │           │              │
///    └───────────┴──────────────┴──────▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CheckState {
    Pending,
    LookedUp,
    Classified,
    Recorded,
    Failed,
}

impl CheckState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckState::Recorded | CheckState::Failed)
    }
}

/// Which step of a check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FailureKind {
    /// The remote lookup could not resolve the gateway.
    Lookup,
    /// Writing the status sample failed.
    StatusWrite,
    /// Writing the packet-count sample failed. The status sample may already
    /// be stored.
    PacketCountWrite,
    /// The pass was cancelled before this check finished.
    Cancelled,
    /// The per-run deadline passed before this check finished.
    DeadlineExceeded,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Lookup => "lookup",
            FailureKind::StatusWrite => "status_write",
            FailureKind::PacketCountWrite => "packet_count_write",
            FailureKind::Cancelled => "cancelled",
            FailureKind::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CheckFailure {
    pub kind: FailureKind,
    /// Last state the check reached before failing.
    pub reached: CheckState,
    pub message: String,
}

impl CheckFailure {
    pub fn new(kind: FailureKind, reached: CheckState, message: impl Into<String>) -> Self {
        Self {
            kind,
            reached,
            message: message.into(),
        }
    }
}

/// Result of checking one gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "result", rename_all = "snake_case"))]
pub enum CheckOutcome {
    /// Both samples were written.
    Recorded {
        gateway: GatewayDescriptor,
        freshness: Freshness,
        rx_count: u64,
    },
    /// Some step failed; nothing after it was attempted.
    Failed {
        gateway: GatewayDescriptor,
        failure: CheckFailure,
    },
}

impl CheckOutcome {
    pub fn recorded(gateway: GatewayDescriptor, freshness: Freshness, rx_count: u64) -> Self {
        CheckOutcome::Recorded {
            gateway,
            freshness,
            rx_count,
        }
    }

    pub fn failed(gateway: GatewayDescriptor, failure: CheckFailure) -> Self {
        CheckOutcome::Failed { gateway, failure }
    }

    /// The gateway this outcome belongs to.
    pub fn gateway(&self) -> &GatewayDescriptor {
        match self {
            CheckOutcome::Recorded { gateway, .. } | CheckOutcome::Failed { gateway, .. } => gateway,
        }
    }

    /// Terminal state of the check.
    pub fn state(&self) -> CheckState {
        match self {
            CheckOutcome::Recorded { .. } => CheckState::Recorded,
            CheckOutcome::Failed { .. } => CheckState::Failed,
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, CheckOutcome::Recorded { .. })
    }

    pub fn freshness(&self) -> Option<Freshness> {
        match self {
            CheckOutcome::Recorded { freshness, .. } => Some(*freshness),
            CheckOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&CheckFailure> {
        match self {
            CheckOutcome::Recorded { .. } => None,
            CheckOutcome::Failed { failure, .. } => Some(failure),
        }
    }
}

/// Outcomes of one pass over the inventory, in inventory order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<CheckOutcome>,
}

impl RunReport {
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        outcomes: Vec<CheckOutcome>,
    ) -> Self {
        Self {
            started_at,
            finished_at,
            outcomes,
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of gateways whose samples were both written.
    pub fn recorded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_recorded()).count()
    }

    /// Number of gateways whose check failed at any step.
    pub fn failed(&self) -> usize {
        self.len() - self.recorded()
    }

    pub fn online(&self) -> usize {
        self.count_freshness(Freshness::Online)
    }

    pub fn offline(&self) -> usize {
        self.count_freshness(Freshness::Offline)
    }

    /// Whether every gateway was recorded.
    pub fn all_recorded(&self) -> bool {
        self.failed() == 0
    }

    fn count_freshness(&self, freshness: Freshness) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.freshness() == Some(freshness))
            .count()
    }
}
