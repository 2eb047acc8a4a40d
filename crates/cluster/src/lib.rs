#![forbid(unsafe_code)]

//! Concrete collaborators for node verification: a Kubernetes-style HTTP
//! health client and an SSH remote channel.

pub mod http;
pub mod ssh;

pub use http::{ClusterConfig, HttpClusterClient};
pub use ssh::{SshChannel, SshConfig};
