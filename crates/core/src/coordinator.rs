use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::client::{HealthClient, InventorySource, RemoteChannel};
use crate::config::VerifyConfig;
use crate::error::{Error, Result};
use crate::model::{RunResult, TargetId, VerificationOutcome};
use crate::verifier::NodeLifecycleVerifier;
use crate::{new_ulid, now_ms};

/// Fans node lifecycle verification out across a fleet and aggregates the
/// outcomes into a [`RunResult`].
pub struct FleetCoordinator {
    client: Arc<dyn HealthClient>,
    channel: Arc<dyn RemoteChannel>,
}

impl FleetCoordinator {
    /// Coordinator verifying targets through `client` and `channel`.
    pub fn new(client: Arc<dyn HealthClient>, channel: Arc<dyn RemoteChannel>) -> Self {
        Self { client, channel }
    }

    /// Lists targets from `inventory` and verifies all of them.
    ///
    /// Inventory failure is the only error that aborts a run.
    pub async fn run_inventory(
        &self,
        inventory: &dyn InventorySource,
        config: &VerifyConfig,
    ) -> Result<RunResult> {
        let targets = inventory.list_targets().await.map_err(|e| match e {
            Error::InventoryUnavailable(_) => e,
            other => Error::InventoryUnavailable(other.to_string()),
        })?;
        info!("inventory returned {} targets", targets.len());
        Ok(self.run_all(targets, config).await)
    }

    /// Verifies every target concurrently and waits for all of them.
    ///
    /// A failing target never cancels its siblings. The result holds exactly
    /// one outcome per distinct target id; duplicates are verified once.
    pub async fn run_all(&self, targets: Vec<TargetId>, config: &VerifyConfig) -> RunResult {
        let run_id = new_ulid().to_string();

        let mut seen = BTreeSet::new();
        let mut unique = Vec::with_capacity(targets.len());
        for id in targets {
            if seen.insert(id.clone()) {
                unique.push(id);
            } else {
                warn!("target {id} listed more than once; verifying it once");
            }
        }

        if unique.is_empty() {
            info!(run_id = %run_id, "no targets to verify");
            return RunResult::from_outcomes(run_id, BTreeMap::new());
        }

        info!(
            run_id = %run_id,
            targets = unique.len(),
            concurrency = ?config.concurrency_limit,
            "starting verification run"
        );

        let verifier = Arc::new(NodeLifecycleVerifier::new(
            Arc::clone(&self.client),
            Arc::clone(&self.channel),
            config.clone(),
        ));
        let limit = config
            .concurrency_limit
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        let mut tasks = JoinSet::new();
        for id in unique.iter().cloned() {
            let verifier = Arc::clone(&verifier);
            let limit = limit.clone();
            tasks.spawn(async move {
                // Held until the verifier finishes.
                let _permit = match limit {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                verifier.verify(id).await
            });
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    info!(
                        "target {} finished: {}",
                        outcome.target,
                        if outcome.success { "pass" } else { "fail" }
                    );
                    outcomes.entry(outcome.target.clone()).or_insert(outcome);
                }
                Err(e) => warn!(error = %e, "verifier task did not complete"),
            }
        }

        for id in unique {
            outcomes
                .entry(id.clone())
                .or_insert_with(|| aborted_outcome(id));
        }

        let result = RunResult::from_outcomes(run_id, outcomes);
        if result.success {
            info!(run_id = %result.run_id, "all targets passed");
        } else {
            for id in result.failed_targets() {
                warn!(run_id = %result.run_id, "target {id} failed verification");
            }
        }
        result
    }
}

fn aborted_outcome(target: TargetId) -> VerificationOutcome {
    let now = now_ms();
    VerificationOutcome {
        target,
        success: false,
        failures: vec![],
        diagnostic: "verifier task did not complete".to_string(),
        started_at_ms: now,
        finished_at_ms: now,
    }
}
