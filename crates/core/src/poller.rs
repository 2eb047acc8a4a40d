//! Bounded polling loops over the health query client.
//!
//! Query failures never end a loop early; only the timeout does. A query
//! that hangs is cut off at the remaining budget.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::client::HealthClient;
use crate::model::{ConditionStatus, Target, TargetId, WorkloadId, READY_CONDITION};

/// Waits for a single target's readiness to reach a desired value.
#[derive(Clone)]
pub struct ReadinessPoller {
    client: Arc<dyn HealthClient>,
    poll_interval: Duration,
}

impl ReadinessPoller {
    /// Poller querying `client` every `poll_interval`.
    pub fn new(client: Arc<dyn HealthClient>, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }

    /// Returns true as soon as a poll observes the target's `Ready` condition
    /// matching `want_ready`, false once `timeout` has elapsed without that.
    ///
    /// `want_ready == false` is satisfied by both `False` and `Unknown`.
    pub async fn wait_for_readiness(
        &self,
        id: &TargetId,
        want_ready: bool,
        timeout: Duration,
    ) -> bool {
        info!("waiting up to {timeout:?} for target {id} readiness to be {want_ready}");
        let start = Instant::now();
        while start.elapsed() < timeout {
            let remaining = timeout.saturating_sub(start.elapsed());
            match tokio::time::timeout(remaining, self.client.get_target(id)).await {
                Ok(Ok(target)) => {
                    if readiness_matches(&target, want_ready) {
                        info!("found target {id} readiness to be {want_ready}");
                        return true;
                    }
                }
                Ok(Err(e)) => warn!(target = %id, error = %e, "couldn't get target"),
                Err(_) => warn!(target = %id, "target query did not answer within {remaining:?}"),
            }
            sleep(self.poll_interval).await;
        }
        info!("target {id} didn't reach desired readiness ({want_ready}) within {timeout:?}");
        false
    }
}

/// Scans every condition, logging each. A target without a `Ready`
/// condition never matches.
fn readiness_matches(target: &Target, want_ready: bool) -> bool {
    let total = target.conditions.len();
    for (i, cond) in target.conditions.iter().enumerate() {
        debug!(
            "target {} condition {}/{}: type: {}, status: {:?}",
            target.id,
            i + 1,
            total,
            cond.kind,
            cond.status
        );
        if cond.kind == READY_CONDITION && (cond.status == ConditionStatus::True) == want_ready {
            return true;
        }
    }
    false
}

/// Waits for a set of workloads to be running and ready, one task per workload.
#[derive(Clone)]
pub struct WorkloadPoller {
    client: Arc<dyn HealthClient>,
    poll_interval: Duration,
}

impl WorkloadPoller {
    /// Poller querying `client` every `poll_interval` per workload.
    pub fn new(client: Arc<dyn HealthClient>, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }

    /// True only if every workload is observed running and ready within
    /// `timeout`. Each workload gets its own `timeout`; all run concurrently.
    /// An empty set is trivially ready.
    pub async fn wait_for_all_ready(&self, workloads: &[WorkloadId], timeout: Duration) -> bool {
        info!(
            "waiting up to {timeout:?} for {} workloads to be running and ready: {:?}",
            workloads.len(),
            workloads
        );

        let mut checks = JoinSet::new();
        for id in workloads.iter().cloned() {
            let client = Arc::clone(&self.client);
            let poll_interval = self.poll_interval;
            checks.spawn(async move {
                let res = wait_for_workload(client.as_ref(), &id, poll_interval, timeout).await;
                (id, res)
            });
        }

        let mut success = true;
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((id, Err(reason))) => {
                    warn!(workload = %id, %reason, "workload failed to be running and ready");
                    success = false;
                }
                Err(e) => {
                    warn!(error = %e, "workload readiness check aborted");
                    success = false;
                }
            }
        }

        info!("wanted all workloads to be running and ready; result: {success}");
        success
    }
}

async fn wait_for_workload(
    client: &dyn HealthClient,
    id: &WorkloadId,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<(), String> {
    let start = Instant::now();
    let mut last = format!("workload {id} was not observed within {timeout:?}");
    while start.elapsed() < timeout {
        let remaining = timeout.saturating_sub(start.elapsed());
        match tokio::time::timeout(remaining, client.get_workload(id)).await {
            Ok(Ok(w)) => match w.running_ready() {
                Ok(()) => return Ok(()),
                Err(reason) => last = reason,
            },
            Ok(Err(e)) => last = e.to_string(),
            Err(_) => last = format!("workload {id} query did not answer within {remaining:?}"),
        }
        sleep(poll_interval).await;
    }
    Err(last)
}
