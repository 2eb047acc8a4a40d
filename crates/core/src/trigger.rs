use std::sync::Arc;

use tracing::info;

use crate::client::{ExecOutput, RemoteChannel};
use crate::error::{Error, Result};
use crate::model::Target;

/// Issues a disruptive command against a target through the remote channel.
///
/// Exactly one attempt is made per call. A disruption that may already have
/// taken effect must not be repeated.
#[derive(Clone)]
pub struct RemoteActionTrigger {
    channel: Arc<dyn RemoteChannel>,
}

impl RemoteActionTrigger {
    /// Trigger issuing commands over `channel`.
    pub fn new(channel: Arc<dyn RemoteChannel>) -> Self {
        Self { channel }
    }

    /// Runs `command` on the target's external address. A non-zero exit
    /// code is returned as [`Error::ActionExecution`].
    pub async fn trigger(&self, target: &Target, command: &str) -> Result<ExecOutput> {
        info!("getting external address for {}", target.id);
        let address = target
            .external_address()
            .ok_or_else(|| Error::AddressNotFound(target.id.clone()))?;

        info!("calling {command:?} on {} ({address})", target.id);
        let out = self.channel.exec(address, command).await?;
        if out.exit_code != 0 {
            return Err(Error::ActionExecution {
                exit_code: Some(out.exit_code),
                message: format!(
                    "expected 0 exit code running {command:?} on {}, got {}: {}",
                    target.id,
                    out.exit_code,
                    out.stderr.trim()
                ),
            });
        }
        Ok(out)
    }
}
