use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use verifier_core::{Error, ExecOutput, RemoteChannel, Result};

/// How to reach targets over SSH.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SshConfig {
    /// SSH client binary.
    pub program: String,
    pub user: Option<String>,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    /// Kill the client if the command has not finished by then.
    pub exec_timeout_secs: Option<u64>,
    /// Extra `-o` options, e.g. `UserKnownHostsFile=/dev/null`.
    pub options: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            user: None,
            port: 22,
            identity_file: None,
            connect_timeout_secs: 10,
            exec_timeout_secs: Some(60),
            options: vec![],
        }
    }
}

/// Runs commands on targets through the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshChannel {
    cfg: SshConfig,
}

impl SshChannel {
    pub fn new(cfg: SshConfig) -> Self {
        Self { cfg }
    }

    /// Arguments passed to the ssh client for one command. No implicit
    /// local shell is involved; `command` is handed to the remote side as one
    /// argument.
    pub fn command_args(&self, address: &str, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.cfg.connect_timeout_secs),
            "-p".to_string(),
            self.cfg.port.to_string(),
        ];
        if let Some(key) = &self.cfg.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        for opt in &self.cfg.options {
            args.push("-o".to_string());
            args.push(opt.clone());
        }
        let host = match &self.cfg.user {
            Some(user) => format!("{user}@{address}"),
            None => address.to_string(),
        };
        args.push(host);
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl RemoteChannel for SshChannel {
    async fn exec(&self, address: &str, command: &str) -> Result<ExecOutput> {
        let args = self.command_args(address, command);
        debug!("{} {:?}", self.cfg.program, args);

        let output = tokio::process::Command::new(&self.cfg.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let res = match self.cfg.exec_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), output)
                .await
                .map_err(|_| Error::ActionExecution {
                    exit_code: None,
                    message: format!("{command:?} on {address} did not finish within {secs}s"),
                })?,
            None => output.await,
        };
        let out = res.map_err(|e| Error::ActionExecution {
            exit_code: None,
            message: format!("failed to run {}: {e}", self.cfg.program),
        })?;

        let exit_code = exit_code_of(out.status, &self.cfg.program)?;
        info!("{command:?} on {address} exited with {exit_code}");

        Ok(ExecOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        })
    }
}

/// Exit code of a finished client; a signal death is a channel failure.
fn exit_code_of(status: ExitStatus, program: &str) -> Result<i32> {
    status.code().ok_or_else(|| Error::ActionExecution {
        exit_code: None,
        message: format!("{program} terminated by signal"),
    })
}
