use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use verifier_core::model::{
    Address, AddressKind, Condition, ConditionStatus, Target, TargetId, Workload, WorkloadId,
    WorkloadPhase,
};
use verifier_core::{now_ms, Error, HealthClient, InventorySource, Result};

/// Connection settings for the cluster API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClusterConfig {
    /// API base URL, e.g. the address of `kubectl proxy`.
    pub api_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Namespace workloads are listed in.
    pub namespace: String,
    pub request_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8001".to_string(),
            token: None,
            namespace: "default".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Reads nodes and pods from a Kubernetes-style REST API.
#[derive(Clone)]
pub struct HttpClusterClient {
    http: Client,
    cfg: ClusterConfig,
}

enum FetchError {
    NotFound,
    Failed(String),
}

impl HttpClusterClient {
    pub fn new(cfg: ClusterConfig) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self { http, cfg })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = join_url(&self.cfg.api_url, path);
        debug!("GET {url}");
        let mut req = self.http.get(&url);
        if let Some(token) = &self.cfg.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| FetchError::Failed(format!("GET {url}: {e}")))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| FetchError::Failed(format!("GET {url}: {e}")))?;
        resp.json::<T>()
            .await
            .map_err(|e| FetchError::Failed(format!("decode {url}: {e}")))
    }
}

#[async_trait]
impl InventorySource for HttpClusterClient {
    async fn list_targets(&self) -> Result<Vec<TargetId>> {
        let list: ItemList<NodeDto> = self
            .get_json("/api/v1/nodes")
            .await
            .map_err(|e| match e {
                FetchError::NotFound => Error::InventoryUnavailable("node list not found".into()),
                FetchError::Failed(msg) => Error::InventoryUnavailable(msg),
            })?;
        Ok(list
            .items
            .into_iter()
            .map(|n| TargetId::new(n.metadata.name))
            .collect())
    }
}

#[async_trait]
impl HealthClient for HttpClusterClient {
    async fn get_target(&self, id: &TargetId) -> Result<Target> {
        let node: NodeDto = self
            .get_json(&format!("/api/v1/nodes/{id}"))
            .await
            .map_err(|e| match e {
                FetchError::NotFound => Error::NotFound(id.clone()),
                FetchError::Failed(msg) => Error::TransientQuery(msg),
            })?;
        Ok(node.into_target(now_ms()))
    }

    async fn list_workloads(&self, target: &TargetId) -> Result<Vec<Workload>> {
        let path = format!(
            "/api/v1/namespaces/{}/pods?fieldSelector=spec.nodeName%3D{target}",
            self.cfg.namespace
        );
        let list: ItemList<PodDto> = self.get_json(&path).await.map_err(|e| match e {
            FetchError::NotFound => Error::TransientQuery(format!("pod list for {target} not found")),
            FetchError::Failed(msg) => Error::TransientQuery(msg),
        })?;
        Ok(list.items.into_iter().map(PodDto::into_workload).collect())
    }

    async fn get_workload(&self, id: &WorkloadId) -> Result<Workload> {
        let path = format!("/api/v1/namespaces/{}/pods/{id}", self.cfg.namespace);
        let pod: PodDto = self.get_json(&path).await.map_err(|e| match e {
            FetchError::NotFound => Error::WorkloadNotFound(id.clone()),
            FetchError::Failed(msg) => Error::TransientQuery(msg),
        })?;
        Ok(pod.into_workload())
    }
}

// Wire shapes: only the fields verification reads.

#[derive(Debug, Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ConditionDto {
    #[serde(rename = "type")]
    kind: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct AddressDto {
    #[serde(rename = "type")]
    kind: String,
    address: String,
}

#[derive(Debug, Default, Deserialize)]
struct NodeStatusDto {
    #[serde(default)]
    addresses: Vec<AddressDto>,
    #[serde(default)]
    conditions: Vec<ConditionDto>,
}

#[derive(Debug, Deserialize)]
struct NodeDto {
    metadata: ObjectMeta,
    #[serde(default)]
    status: NodeStatusDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodSpecDto {
    #[serde(default)]
    node_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PodStatusDto {
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    conditions: Vec<ConditionDto>,
}

#[derive(Debug, Deserialize)]
struct PodDto {
    metadata: ObjectMeta,
    #[serde(default)]
    spec: PodSpecDto,
    #[serde(default)]
    status: PodStatusDto,
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn condition_status(s: &str) -> ConditionStatus {
    match s {
        "True" => ConditionStatus::True,
        "False" => ConditionStatus::False,
        _ => ConditionStatus::Unknown,
    }
}

fn into_conditions(conditions: Vec<ConditionDto>, observed_at_ms: i64) -> Vec<Condition> {
    conditions
        .into_iter()
        .map(|c| Condition {
            status: condition_status(&c.status),
            kind: c.kind,
            observed_at_ms,
        })
        .collect()
}

impl NodeDto {
    fn into_target(self, observed_at_ms: i64) -> Target {
        let addresses = self
            .status
            .addresses
            .into_iter()
            .filter_map(|a| {
                let kind = match a.kind.as_str() {
                    "ExternalIP" => AddressKind::ExternalIp,
                    "InternalIP" => AddressKind::InternalIp,
                    "Hostname" => AddressKind::Hostname,
                    _ => return None,
                };
                Some(Address {
                    kind,
                    address: a.address,
                })
            })
            .collect();
        Target {
            id: TargetId::new(self.metadata.name),
            addresses,
            conditions: into_conditions(self.status.conditions, observed_at_ms),
            observed_at_ms,
        }
    }
}

impl PodDto {
    fn into_workload(self) -> Workload {
        let phase = match self.status.phase.as_deref() {
            Some("Pending") => WorkloadPhase::Pending,
            Some("Running") => WorkloadPhase::Running,
            Some("Succeeded") => WorkloadPhase::Succeeded,
            Some("Failed") => WorkloadPhase::Failed,
            _ => WorkloadPhase::Unknown,
        };
        Workload {
            id: WorkloadId::new(self.metadata.name),
            target: TargetId::new(self.spec.node_name.unwrap_or_default()),
            phase,
            conditions: into_conditions(self.status.conditions, now_ms()),
        }
    }
}
