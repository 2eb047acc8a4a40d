use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Condition kind carrying readiness for both targets and workloads.
pub const READY_CONDITION: &str = "Ready";

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wraps any string-like identifier.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Borrowed view of the identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

id_newtype!(
    /// Identifier of a verifiable target (e.g. a cluster node name).
    TargetId
);
id_newtype!(
    /// Identifier of a workload (e.g. a pod name).
    WorkloadId
);

/// Tri-state status of a single condition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionStatus {
    /// The condition holds.
    True,
    /// The condition does not hold.
    False,
    /// The reporter could not tell.
    Unknown,
}

/// One observed condition on a target or workload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    /// Condition type, e.g. `"Ready"`.
    pub kind: String,
    /// Reported status.
    pub status: ConditionStatus,
    /// When the condition was observed (unix ms).
    #[serde(default)]
    pub observed_at_ms: i64,
}

impl Condition {
    /// Convenience constructor for a `Ready` condition.
    pub fn ready(status: ConditionStatus, observed_at_ms: i64) -> Self {
        Self {
            kind: READY_CONDITION.to_string(),
            status,
            observed_at_ms,
        }
    }
}

fn find_ready(conditions: &[Condition]) -> Option<&Condition> {
    conditions.iter().find(|c| c.kind == READY_CONDITION)
}

/// Readiness of a target derived from its `Ready` condition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// `Ready == True`.
    Ready,
    /// `Ready == False`.
    NotReady,
    /// `Ready == Unknown`, or no `Ready` condition at all.
    Unknown,
}

/// Address type as reported by the cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    /// Reachable from outside the cluster network.
    ExternalIp,
    /// Cluster-internal IP.
    InternalIp,
    /// Host name as registered by the target.
    Hostname,
}

/// One address a target can be reached at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    /// Address type.
    pub kind: AddressKind,
    /// IP or host name.
    pub address: String,
}

/// Snapshot of a target as last seen by the health query client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Target identifier.
    pub id: TargetId,
    /// Known addresses, in reported order.
    #[serde(default)]
    pub addresses: Vec<Address>,
    /// Conditions, in reported order.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// When this snapshot was taken (unix ms).
    pub observed_at_ms: i64,
}

impl Target {
    /// The `Ready` condition, if the target reports one.
    pub fn ready_condition(&self) -> Option<&Condition> {
        find_ready(&self.conditions)
    }

    /// Readiness as a tri-state. A missing `Ready` condition is `Unknown`.
    pub fn readiness(&self) -> Readiness {
        match self.ready_condition().map(|c| c.status) {
            Some(ConditionStatus::True) => Readiness::Ready,
            Some(ConditionStatus::False) => Readiness::NotReady,
            Some(ConditionStatus::Unknown) | None => Readiness::Unknown,
        }
    }

    /// First externally reachable address.
    pub fn external_address(&self) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.kind == AddressKind::ExternalIp)
            .map(|a| a.address.as_str())
    }
}

/// Lifecycle phase of a workload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadPhase {
    /// Accepted but not started.
    Pending,
    /// At least one container is running.
    Running,
    /// Terminated successfully.
    Succeeded,
    /// Terminated with a failure.
    Failed,
    /// Phase not reported or not recognized.
    Unknown,
}

/// Snapshot of a workload scheduled on a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    /// Workload identifier.
    pub id: WorkloadId,
    /// Target the workload is scheduled on.
    pub target: TargetId,
    /// Current phase.
    pub phase: WorkloadPhase,
    /// Conditions, in reported order.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Workload {
    /// Ok when the workload is `Running` with `Ready == True`, otherwise the
    /// reason it is not.
    pub fn running_ready(&self) -> Result<(), String> {
        if self.phase != WorkloadPhase::Running {
            return Err(format!(
                "want workload {} on {} to be Running but was {:?}",
                self.id, self.target, self.phase
            ));
        }
        match find_ready(&self.conditions) {
            Some(c) if c.status == ConditionStatus::True => Ok(()),
            _ => Err(format!(
                "workload {} on {} has no {} condition with status True; conditions: {:?}",
                self.id, self.target, READY_CONDITION, self.conditions
            )),
        }
    }
}

/// Sequential stages of a single target's verification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fetch the target snapshot.
    Fetch,
    /// Wait for the target to be ready before disrupting it.
    PreCheckReady,
    /// Record the workloads scheduled on the target.
    SnapshotWorkloads,
    /// Wait for those workloads to be running and ready.
    PreCheckWorkloadsReady,
    /// Run the disruptive command.
    Disrupt,
    /// Wait for the target to leave ready.
    WaitNotReady,
    /// Wait for the target to come back ready.
    WaitReadyAgain,
    /// Wait for the recorded workloads to be running and ready again.
    PostCheckWorkloadsReady,
}

impl Stage {
    /// Fixed failure reason recorded when this stage fails.
    pub fn failure_reason(self) -> &'static str {
        match self {
            Self::Fetch => "fetch failed",
            Self::PreCheckReady => "not initially ready",
            Self::SnapshotWorkloads => "workload listing failed",
            Self::PreCheckWorkloadsReady => "workloads not ready before disruption",
            Self::Disrupt => "disruption command failed",
            Self::WaitNotReady => "did not become not-ready",
            Self::WaitReadyAgain => "did not return to ready",
            Self::PostCheckWorkloadsReady => "workloads not ready after disruption",
        }
    }
}

/// A failed stage with its fixed reason and optional detail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageFailure {
    /// Stage that failed.
    pub stage: Stage,
    /// Verbatim failure reason of the stage.
    pub reason: String,
    /// Underlying error text, if any.
    #[serde(default)]
    pub detail: Option<String>,
}

impl StageFailure {
    /// Failure of `stage` carrying that stage's fixed reason.
    pub fn new(stage: Stage, detail: Option<String>) -> Self {
        Self {
            stage,
            reason: stage.failure_reason().to_string(),
            detail,
        }
    }
}

/// Final verdict for one target in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Verified target.
    pub target: TargetId,
    /// True only if every stage passed.
    pub success: bool,
    /// Stage failures in the order they occurred.
    pub failures: Vec<StageFailure>,
    /// Human-readable summary.
    pub diagnostic: String,
    /// Verification start (unix ms).
    pub started_at_ms: i64,
    /// Verification end (unix ms).
    pub finished_at_ms: i64,
}

impl VerificationOutcome {
    /// Reason of the first recorded failure.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failures.first().map(|f| f.reason.as_str())
    }
}

/// Aggregate of every target's outcome for one fleet run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// ULID of the run.
    pub run_id: String,
    /// True only if every outcome succeeded.
    pub success: bool,
    /// Exactly one outcome per distinct target.
    pub outcomes: BTreeMap<TargetId, VerificationOutcome>,
}

impl RunResult {
    /// Builds a result whose `success` is the conjunction of every outcome.
    pub fn from_outcomes(
        run_id: impl Into<String>,
        outcomes: BTreeMap<TargetId, VerificationOutcome>,
    ) -> Self {
        let success = outcomes.values().all(|o| o.success);
        Self {
            run_id: run_id.into(),
            success,
            outcomes,
        }
    }

    /// Targets whose verification failed, in id order.
    pub fn failed_targets(&self) -> impl Iterator<Item = &TargetId> {
        self.outcomes
            .values()
            .filter(|o| !o.success)
            .map(|o| &o.target)
    }
}
