//! Narrow interfaces to the systems a verification run observes and acts on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Target, TargetId, Workload, WorkloadId};

/// Supplies the targets a run should verify.
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Lists every target id. Fails with `InventoryUnavailable`.
    async fn list_targets(&self) -> Result<Vec<TargetId>>;
}

/// Read-only view of target and workload health.
#[async_trait]
pub trait HealthClient: Send + Sync {
    /// Current snapshot of a target. Fails with `NotFound` or `TransientQuery`.
    async fn get_target(&self, id: &TargetId) -> Result<Target>;

    /// Workloads currently scheduled on a target.
    async fn list_workloads(&self, target: &TargetId) -> Result<Vec<Workload>>;

    /// Current snapshot of one workload.
    async fn get_workload(&self, id: &WorkloadId) -> Result<Workload>;
}

/// Captured result of a remote command.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code of the remote command.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Out-of-band command channel to a target (e.g. SSH).
#[async_trait]
pub trait RemoteChannel: Send + Sync {
    /// Runs `command` on `address` once. Channel failures are
    /// `ActionExecution` errors; a completed command returns its exit code.
    async fn exec(&self, address: &str, command: &str) -> Result<ExecOutput>;
}
