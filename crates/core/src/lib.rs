#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Node lifecycle verification: readiness polling, disruptive remote actions
//! and fleet-wide fan-out with per-target outcomes.

pub mod client;
/// Verification timeouts, poll interval and disruptive command.
pub mod config;
/// Fleet-wide fan-out of per-target verification.
pub mod coordinator;
/// Error taxonomy shared by collaborators and stages.
pub mod error;
/// Targets, workloads, conditions and verification outcomes.
pub mod model;
pub mod poller;
/// Plain-text run report.
pub mod report;
/// One-shot disruptive remote action.
pub mod trigger;
/// Per-target disrupt-and-recover sequence.
pub mod verifier;

mod util;

pub use client::{ExecOutput, HealthClient, InventorySource, RemoteChannel};
pub use config::VerifyConfig;
pub use coordinator::FleetCoordinator;
pub use error::{Error, Result};
pub use report::render_report;
pub use util::{new_ulid, now_ms};
