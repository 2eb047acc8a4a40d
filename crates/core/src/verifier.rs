use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span, warn, Instrument};

use crate::client::{HealthClient, RemoteChannel};
use crate::config::VerifyConfig;
use crate::error::Error;
use crate::model::{Stage, StageFailure, TargetId, VerificationOutcome, WorkloadId};
use crate::poller::{ReadinessPoller, WorkloadPoller};
use crate::now_ms;
use crate::trigger::RemoteActionTrigger;

/// Runs the full disrupt-and-recover sequence against one target.
///
/// Stages run strictly in order and stop at the first failure:
/// fetch, ready pre-check, workload snapshot, workload pre-check, disruption,
/// wait for not-ready, wait for ready, workload post-check.
#[derive(Clone)]
pub struct NodeLifecycleVerifier {
    client: Arc<dyn HealthClient>,
    readiness: ReadinessPoller,
    workloads: WorkloadPoller,
    trigger: RemoteActionTrigger,
    config: VerifyConfig,
}

impl NodeLifecycleVerifier {
    /// Verifier with pollers and trigger built from `config`.
    pub fn new(
        client: Arc<dyn HealthClient>,
        channel: Arc<dyn RemoteChannel>,
        config: VerifyConfig,
    ) -> Self {
        let poll_interval = config.poll_interval();
        Self {
            readiness: ReadinessPoller::new(Arc::clone(&client), poll_interval),
            workloads: WorkloadPoller::new(Arc::clone(&client), poll_interval),
            trigger: RemoteActionTrigger::new(channel),
            client,
            config,
        }
    }

    /// Verifies one target and returns its immutable outcome. Never fails:
    /// every stage error is recorded in the outcome.
    pub async fn verify(&self, id: TargetId) -> VerificationOutcome {
        let span = info_span!("verify", target = %id);
        async move {
            let started_at_ms = now_ms();
            let result = self.run_stages(&id).await;
            let finished_at_ms = now_ms();

            match result {
                Ok(workload_count) => {
                    info!("disruption successful on target {id}");
                    VerificationOutcome {
                        target: id,
                        success: true,
                        failures: vec![],
                        diagnostic: format!(
                            "recovered from {:?} with {workload_count} workloads ready",
                            self.config.disruptive_command
                        ),
                        started_at_ms,
                        finished_at_ms,
                    }
                }
                Err(failure) => {
                    let diagnostic = match &failure.detail {
                        Some(detail) => format!("{}: {detail}", failure.reason),
                        None => failure.reason.clone(),
                    };
                    warn!(stage = ?failure.stage, "target {id} failed: {diagnostic}");
                    VerificationOutcome {
                        target: id,
                        success: false,
                        failures: vec![failure],
                        diagnostic,
                        started_at_ms,
                        finished_at_ms,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stages(&self, id: &TargetId) -> Result<usize, StageFailure> {
        let cfg = &self.config;

        info!("getting target {id}");
        let target = self
            .client
            .get_target(id)
            .await
            .map_err(|e| StageFailure::new(Stage::Fetch, Some(e.to_string())))?;

        if !self
            .readiness
            .wait_for_readiness(id, true, cfg.initial_ready_timeout())
            .await
        {
            return Err(timed_out(Stage::PreCheckReady, cfg.initial_ready_timeout()));
        }

        let snapshot: Vec<WorkloadId> = self
            .client
            .list_workloads(id)
            .await
            .map_err(|e| StageFailure::new(Stage::SnapshotWorkloads, Some(e.to_string())))?
            .into_iter()
            .map(|w| w.id)
            .collect();
        info!("target {id} has {} workloads: {:?}", snapshot.len(), snapshot);

        if !self
            .workloads
            .wait_for_all_ready(&snapshot, cfg.before_workloads_timeout())
            .await
        {
            return Err(timed_out(
                Stage::PreCheckWorkloadsReady,
                cfg.before_workloads_timeout(),
            ));
        }

        self.trigger
            .trigger(&target, &cfg.disruptive_command)
            .await
            .map_err(|e| StageFailure::new(Stage::Disrupt, Some(e.to_string())))?;

        if !self
            .readiness
            .wait_for_readiness(id, false, cfg.not_ready_timeout())
            .await
        {
            return Err(timed_out(Stage::WaitNotReady, cfg.not_ready_timeout()));
        }

        if !self
            .readiness
            .wait_for_readiness(id, true, cfg.ready_again_timeout())
            .await
        {
            return Err(timed_out(Stage::WaitReadyAgain, cfg.ready_again_timeout()));
        }

        if !self
            .workloads
            .wait_for_all_ready(&snapshot, cfg.after_workloads_timeout())
            .await
        {
            return Err(timed_out(
                Stage::PostCheckWorkloadsReady,
                cfg.after_workloads_timeout(),
            ));
        }

        Ok(snapshot.len())
    }
}

fn timed_out(stage: Stage, timeout: Duration) -> StageFailure {
    StageFailure::new(stage, Some(Error::TimeoutExceeded(timeout).to_string()))
}
