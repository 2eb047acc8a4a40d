#![forbid(unsafe_code)]

//! Node verifier: reboots every target node and checks it comes back healthy.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verifier_cluster::{HttpClusterClient, SshChannel};
use verifier_core::model::TargetId;
use verifier_core::{render_report, FleetCoordinator};

mod config;

use crate::config::{FileConfig, VerifyOverrides};

#[derive(Parser, Debug)]
#[command(name = "node-verifier", version, about = "Reboot-resilience verifier for cluster nodes")]
struct Args {
    /// TOML config file with [cluster], [ssh] and [verify] tables.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cluster API base URL.
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token for the cluster API.
    #[arg(long)]
    token: Option<String>,

    /// Namespace workloads are listed in.
    #[arg(long)]
    namespace: Option<String>,

    /// Verify only these targets instead of the whole inventory.
    #[arg(long = "target")]
    targets: Vec<String>,

    /// SSH user for the disruptive command.
    #[arg(long)]
    ssh_user: Option<String>,

    #[arg(long)]
    initial_ready_timeout_secs: Option<u64>,

    #[arg(long)]
    not_ready_timeout_secs: Option<u64>,

    #[arg(long)]
    ready_again_timeout_secs: Option<u64>,

    #[arg(long)]
    before_workloads_timeout_secs: Option<u64>,

    #[arg(long)]
    after_workloads_timeout_secs: Option<u64>,

    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Disruptive command run on each target.
    #[arg(long)]
    command: Option<String>,

    /// Maximum targets verified at once (default: all).
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write the full run result as JSON.
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Log level (env-filter syntax).
    #[arg(long, default_value = "info")]
    log: String,
}

impl Args {
    fn overrides(&self) -> VerifyOverrides {
        VerifyOverrides {
            initial_ready_timeout_secs: self.initial_ready_timeout_secs,
            not_ready_timeout_secs: self.not_ready_timeout_secs,
            ready_again_timeout_secs: self.ready_again_timeout_secs,
            before_workloads_timeout_secs: self.before_workloads_timeout_secs,
            after_workloads_timeout_secs: self.after_workloads_timeout_secs,
            poll_interval_secs: self.poll_interval_secs,
            disruptive_command: self.command.clone(),
            concurrency_limit: self.concurrency,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&args.log))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut cfg = match &args.config {
        Some(path) => FileConfig::load_from(path)?,
        None => FileConfig::default(),
    };
    if let Some(url) = &args.api_url {
        cfg.cluster.api_url = url.clone();
    }
    if let Some(token) = &args.token {
        cfg.cluster.token = Some(token.clone());
    }
    if let Some(ns) = &args.namespace {
        cfg.cluster.namespace = ns.clone();
    }
    if let Some(user) = &args.ssh_user {
        cfg.ssh.user = Some(user.clone());
    }
    args.overrides().apply(&mut cfg.verify);

    tracing::info!(
        api_url = %cfg.cluster.api_url,
        command = %cfg.verify.disruptive_command,
        worst_case = ?cfg.verify.worst_case(),
        "node verifier starting"
    );

    let cluster = Arc::new(
        HttpClusterClient::new(cfg.cluster.clone()).context("build cluster API client")?,
    );
    let channel = Arc::new(SshChannel::new(cfg.ssh.clone()));
    let coordinator = FleetCoordinator::new(cluster.clone(), channel);

    let result = if args.targets.is_empty() {
        coordinator
            .run_inventory(cluster.as_ref(), &cfg.verify)
            .await
            .context("list targets")?
    } else {
        let targets = args.targets.iter().map(|t| TargetId::new(t.as_str())).collect();
        coordinator.run_all(targets, &cfg.verify).await
    };

    print!("{}", render_report(&result));

    if let Some(path) = &args.report_json {
        let json = serde_json::to_vec_pretty(&result)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("write {}", path.display()))?;
    }

    if result.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_become_verify_overrides() {
        let args = Args::try_parse_from([
            "node-verifier",
            "--target",
            "node-a",
            "--target",
            "node-b",
            "--command",
            "sudo reboot",
            "--not-ready-timeout-secs",
            "30",
            "--concurrency",
            "2",
        ])
        .unwrap();
        assert_eq!(args.targets, vec!["node-a", "node-b"]);

        let mut verify = verifier_core::VerifyConfig::default();
        args.overrides().apply(&mut verify);
        assert_eq!(verify.disruptive_command, "sudo reboot");
        assert_eq!(verify.not_ready_timeout_secs, 30);
        assert_eq!(verify.concurrency_limit, Some(2));
        assert_eq!(verify.ready_again_timeout_secs, 300);
    }
}
