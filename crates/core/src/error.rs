use std::time::Duration;

use thiserror::Error;

use crate::model::{TargetId, WorkloadId};

/// Errors raised by collaborators and verification stages.
///
/// Only [`Error::InventoryUnavailable`] is fatal to a whole run; everything
/// else is folded into the affected target's outcome.
#[derive(Debug, Error)]
pub enum Error {
    /// A query failed in a way that may succeed on the next poll.
    #[error("transient query error: {0}")]
    TransientQuery(String),

    /// The target is unknown to the health query client.
    #[error("target {0} not found")]
    NotFound(TargetId),

    /// The workload is unknown to the health query client.
    #[error("workload {0} not found")]
    WorkloadNotFound(WorkloadId),

    /// A bounded wait expired.
    #[error("timed out after {0:?}")]
    TimeoutExceeded(Duration),

    /// The remote command could not run or exited non-zero.
    #[error("action execution failed (exit={exit_code:?}): {message}")]
    ActionExecution {
        /// Exit code, if the command ran to completion.
        exit_code: Option<i32>,
        /// Channel error or captured stderr.
        message: String,
    },

    /// The target exposes no externally reachable address.
    #[error("no external address for target {0}")]
    AddressNotFound(TargetId),

    /// Targets could not be listed at all.
    #[error("inventory unavailable: {0}")]
    InventoryUnavailable(String),
}

impl Error {
    /// Whether polling loops should absorb this error and keep going.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientQuery(_))
    }
}

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
