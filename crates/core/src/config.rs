use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-run verification settings. Every field has a default so partial
/// tables deserialize.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VerifyConfig {
    /// How long a target may take to report ready before the disruption.
    pub initial_ready_timeout_secs: u64,
    /// How long a target may take to leave ready after the disruption.
    pub not_ready_timeout_secs: u64,
    /// How long a target may take to return to ready once it went not-ready.
    pub ready_again_timeout_secs: u64,
    /// How long workloads may take to be running and ready before the disruption.
    pub before_workloads_timeout_secs: u64,
    /// How long workloads may take to be running and ready after the target recovered.
    pub after_workloads_timeout_secs: u64,
    /// Pause between health queries.
    pub poll_interval_secs: u64,
    /// Command issued over the remote channel.
    pub disruptive_command: String,
    /// Maximum targets verified at the same time. `None` is unbounded.
    pub concurrency_limit: Option<usize>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            initial_ready_timeout_secs: 20,
            not_ready_timeout_secs: 120,
            ready_again_timeout_secs: 300,
            before_workloads_timeout_secs: 20,
            after_workloads_timeout_secs: 300,
            poll_interval_secs: 5,
            disruptive_command: "reboot".to_string(),
            concurrency_limit: None,
        }
    }
}

impl VerifyConfig {
    /// `initial_ready_timeout_secs` as a [`Duration`].
    pub fn initial_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.initial_ready_timeout_secs)
    }

    /// `not_ready_timeout_secs` as a [`Duration`].
    pub fn not_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.not_ready_timeout_secs)
    }

    /// `ready_again_timeout_secs` as a [`Duration`].
    pub fn ready_again_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_again_timeout_secs)
    }

    /// `before_workloads_timeout_secs` as a [`Duration`].
    pub fn before_workloads_timeout(&self) -> Duration {
        Duration::from_secs(self.before_workloads_timeout_secs)
    }

    /// `after_workloads_timeout_secs` as a [`Duration`].
    pub fn after_workloads_timeout(&self) -> Duration {
        Duration::from_secs(self.after_workloads_timeout_secs)
    }

    /// `poll_interval_secs` as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Upper bound on how long one target can take, ignoring query latency.
    pub fn worst_case(&self) -> Duration {
        self.initial_ready_timeout()
            + self.before_workloads_timeout()
            + self.not_ready_timeout()
            + self.ready_again_timeout()
            + self.after_workloads_timeout()
    }
}
