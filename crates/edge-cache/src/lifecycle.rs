//! Proxy lifecycle state and reports.

use serde::{Deserialize, Serialize};

/// Lifecycle state of the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Created, nothing run yet.
    #[default]
    Parsed,
    /// Precaching.
    Installing,
    /// Precache finished (possibly with failures).
    Installed,
    /// Sweeping old generations.
    Activating,
    /// Active and controlling clients.
    Activated,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parsed => write!(f, "parsed"),
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    pub(crate) state: WorkerState,
    pub(crate) claimed: bool,
}

impl Lifecycle {
    pub(crate) fn transition(&mut self, to: WorkerState) {
        tracing::debug!(from = %self.state, to = %to, "lifecycle transition");
        self.state = to;
        if to != WorkerState::Activated {
            self.claimed = false;
        }
    }

    pub(crate) fn claim(&mut self) {
        self.transition(WorkerState::Activated);
        self.claimed = true;
    }
}

/// Outcome of `install`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    /// URLs stored in the precache partition.
    pub cached: Vec<String>,
    /// URLs that could not be precached, with the reason.
    pub failed: Vec<PrecacheFailure>,
}

/// A URL that failed to precache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecacheFailure {
    /// The URL.
    pub url: String,
    /// Why it failed.
    pub reason: String,
}

impl InstallReport {
    /// Whether every URL was cached.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of `activate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateReport {
    /// Partitions of older generations that were deleted.
    pub deleted: Vec<String>,
    /// Whether clients were claimed.
    pub claimed: bool,
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Live partitions checked against their bound.
    pub partitions: usize,
    /// Entries evicted.
    pub evicted: usize,
}

/// Entry count of one cache partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStats {
    /// Full store partition name.
    pub name: String,
    /// Whether the partition belongs to the current generation.
    pub current: bool,
    /// Number of entries.
    pub entries: usize,
    /// Configured bound, if a rule uses the partition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_activates() {
        let mut lifecycle = Lifecycle::default();
        assert_eq!(lifecycle.state, WorkerState::Parsed);

        lifecycle.transition(WorkerState::Installing);
        lifecycle.transition(WorkerState::Installed);
        lifecycle.transition(WorkerState::Activating);
        assert!(!lifecycle.claimed);

        lifecycle.claim();
        assert_eq!(lifecycle.state, WorkerState::Activated);
        assert!(lifecycle.claimed);
    }

    #[test]
    fn test_reinstall_releases_claim() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.claim();
        lifecycle.transition(WorkerState::Installing);
        assert!(!lifecycle.claimed);
    }

    #[test]
    fn test_install_report_completeness() {
        let mut report = InstallReport::default();
        assert!(report.is_complete());
        report.failed.push(PrecacheFailure {
            url: "/cart".to_string(),
            reason: "HTTP 500".to_string(),
        });
        assert!(!report.is_complete());
    }
}
