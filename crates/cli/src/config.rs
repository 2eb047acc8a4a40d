use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use verifier_cluster::{ClusterConfig, SshConfig};
use verifier_core::VerifyConfig;

/// On-disk configuration (TOML). Every section is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub cluster: ClusterConfig,
    pub ssh: SshConfig,
    pub verify: VerifyConfig,
}

impl FileConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: FileConfig =
            toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }
}

/// Command-line overrides for the `[verify]` table.
#[derive(Clone, Debug, Default)]
pub struct VerifyOverrides {
    pub initial_ready_timeout_secs: Option<u64>,
    pub not_ready_timeout_secs: Option<u64>,
    pub ready_again_timeout_secs: Option<u64>,
    pub before_workloads_timeout_secs: Option<u64>,
    pub after_workloads_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub disruptive_command: Option<String>,
    pub concurrency_limit: Option<usize>,
}

impl VerifyOverrides {
    pub fn apply(self, cfg: &mut VerifyConfig) {
        if let Some(v) = self.initial_ready_timeout_secs {
            cfg.initial_ready_timeout_secs = v;
        }
        if let Some(v) = self.not_ready_timeout_secs {
            cfg.not_ready_timeout_secs = v;
        }
        if let Some(v) = self.ready_again_timeout_secs {
            cfg.ready_again_timeout_secs = v;
        }
        if let Some(v) = self.before_workloads_timeout_secs {
            cfg.before_workloads_timeout_secs = v;
        }
        if let Some(v) = self.after_workloads_timeout_secs {
            cfg.after_workloads_timeout_secs = v;
        }
        if let Some(v) = self.poll_interval_secs {
            cfg.poll_interval_secs = v;
        }
        if let Some(v) = self.disruptive_command {
            cfg.disruptive_command = v;
        }
        if let Some(v) = self.concurrency_limit {
            cfg.concurrency_limit = Some(v);
        }
    }
}
