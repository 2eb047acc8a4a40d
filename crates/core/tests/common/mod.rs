//! In-memory cluster simulation implementing every collaborator trait.
//!
//! A successful disruptive command marks the node as rebooted; subsequent
//! health queries then follow the node's `AfterReboot` script.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use verifier_core::model::{
    Address, AddressKind, Condition, ConditionStatus, Target, TargetId, Workload, WorkloadId,
    WorkloadPhase,
};
use verifier_core::{Error, ExecOutput, HealthClient, InventorySource, RemoteChannel, Result};

#[derive(Clone, Copy, Debug)]
pub enum AfterReboot {
    /// Not ready for `down_polls` queries, then ready.
    Recovers { down_polls: u32 },
    /// Never leaves ready.
    StaysReady,
    /// Goes not ready and stays there.
    NeverRecovers,
}

#[derive(Clone, Debug)]
pub struct WorkloadSpec {
    pub id: WorkloadId,
    pub ready_before: bool,
    pub ready_after: bool,
}

#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub ready_initially: bool,
    pub has_ready_condition: bool,
    pub external_ip: Option<String>,
    pub after_reboot: AfterReboot,
    pub exit_code: i32,
    pub exec_error: bool,
    pub transient_errors: u32,
    pub missing: bool,
    pub list_fails: bool,
    pub workloads: Vec<WorkloadSpec>,
}

impl NodeSpec {
    pub fn healthy(ip: &str) -> Self {
        Self {
            ready_initially: true,
            has_ready_condition: true,
            external_ip: Some(ip.to_string()),
            after_reboot: AfterReboot::Recovers { down_polls: 2 },
            exit_code: 0,
            exec_error: false,
            transient_errors: 0,
            missing: false,
            list_fails: false,
            workloads: vec![],
        }
    }

    pub fn with_workload(mut self, id: &str, ready_before: bool, ready_after: bool) -> Self {
        self.workloads.push(WorkloadSpec {
            id: id.into(),
            ready_before,
            ready_after,
        });
        self
    }
}

struct NodeState {
    spec: NodeSpec,
    rebooted: bool,
    polls_since_reboot: u32,
    transient_left: u32,
    get_calls: u32,
    polls_after_trigger: u32,
    triggers: u32,
    last_command: Option<String>,
}

#[derive(Default)]
struct SimState {
    nodes: HashMap<TargetId, NodeState>,
    order: Vec<TargetId>,
    workload_calls: u32,
}

#[derive(Default)]
pub struct SimCluster {
    state: Mutex<SimState>,
    inventory_fails: bool,
}

impl SimCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_inventory() -> Self {
        Self {
            state: Mutex::new(SimState::default()),
            inventory_fails: true,
        }
    }

    pub fn with_node(self, id: &str, spec: NodeSpec) -> Self {
        {
            let mut st = self.state.lock().unwrap();
            st.order.push(id.into());
            st.nodes.insert(
                id.into(),
                NodeState {
                    transient_left: spec.transient_errors,
                    spec,
                    rebooted: false,
                    polls_since_reboot: 0,
                    get_calls: 0,
                    polls_after_trigger: 0,
                    triggers: 0,
                    last_command: None,
                },
            );
        }
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn trigger_calls(&self, id: &str) -> u32 {
        self.node(id, |n| n.triggers)
    }

    pub fn last_command(&self, id: &str) -> Option<String> {
        self.node(id, |n| n.last_command.clone())
    }

    pub fn get_calls(&self, id: &str) -> u32 {
        self.node(id, |n| n.get_calls)
    }

    /// Target queries made after the disruptive command was issued.
    pub fn polls_after_trigger(&self, id: &str) -> u32 {
        self.node(id, |n| n.polls_after_trigger)
    }

    pub fn rebooted(&self, id: &str) -> bool {
        self.node(id, |n| n.rebooted)
    }

    pub fn workload_calls(&self) -> u32 {
        self.state.lock().unwrap().workload_calls
    }

    fn node<T>(&self, id: &str, f: impl FnOnce(&NodeState) -> T) -> T {
        let st = self.state.lock().unwrap();
        f(st.nodes.get(&TargetId::from(id)).expect("unknown node"))
    }
}

fn ready_status(ready: bool) -> ConditionStatus {
    if ready {
        ConditionStatus::True
    } else {
        ConditionStatus::False
    }
}

#[async_trait]
impl InventorySource for SimCluster {
    async fn list_targets(&self) -> Result<Vec<TargetId>> {
        if self.inventory_fails {
            return Err(Error::TransientQuery("connection refused".into()));
        }
        Ok(self.state.lock().unwrap().order.clone())
    }
}

#[async_trait]
impl HealthClient for SimCluster {
    async fn get_target(&self, id: &TargetId) -> Result<Target> {
        let mut st = self.state.lock().unwrap();
        let node = st.nodes.get_mut(id).ok_or_else(|| Error::NotFound(id.clone()))?;
        node.get_calls += 1;
        if node.triggers > 0 {
            node.polls_after_trigger += 1;
        }
        if node.spec.missing {
            return Err(Error::NotFound(id.clone()));
        }
        if node.transient_left > 0 {
            node.transient_left -= 1;
            return Err(Error::TransientQuery("etcd leader changed".into()));
        }

        let ready = if node.rebooted {
            node.polls_since_reboot += 1;
            match node.spec.after_reboot {
                AfterReboot::Recovers { down_polls } => node.polls_since_reboot > down_polls,
                AfterReboot::StaysReady => true,
                AfterReboot::NeverRecovers => false,
            }
        } else {
            node.spec.ready_initially
        };

        let mut conditions = vec![Condition {
            kind: "DiskPressure".into(),
            status: ConditionStatus::False,
            observed_at_ms: 0,
        }];
        if node.spec.has_ready_condition {
            conditions.push(Condition::ready(ready_status(ready), 0));
        }

        Ok(Target {
            id: id.clone(),
            addresses: node
                .spec
                .external_ip
                .iter()
                .map(|ip| Address {
                    kind: AddressKind::ExternalIp,
                    address: ip.clone(),
                })
                .collect(),
            conditions,
            observed_at_ms: 0,
        })
    }

    async fn list_workloads(&self, target: &TargetId) -> Result<Vec<Workload>> {
        let st = self.state.lock().unwrap();
        let node = st
            .nodes
            .get(target)
            .ok_or_else(|| Error::NotFound(target.clone()))?;
        if node.spec.list_fails {
            return Err(Error::TransientQuery("list pods: deadline exceeded".into()));
        }
        Ok(node
            .spec
            .workloads
            .iter()
            .map(|w| Workload {
                id: w.id.clone(),
                target: target.clone(),
                phase: WorkloadPhase::Running,
                conditions: vec![Condition::ready(ready_status(w.ready_before), 0)],
            })
            .collect())
    }

    async fn get_workload(&self, id: &WorkloadId) -> Result<Workload> {
        let mut st = self.state.lock().unwrap();
        st.workload_calls += 1;
        for (target, node) in &st.nodes {
            if let Some(w) = node.spec.workloads.iter().find(|w| &w.id == id) {
                let ready = if node.rebooted {
                    w.ready_after
                } else {
                    w.ready_before
                };
                return Ok(Workload {
                    id: id.clone(),
                    target: target.clone(),
                    phase: if ready {
                        WorkloadPhase::Running
                    } else {
                        WorkloadPhase::Pending
                    },
                    conditions: vec![Condition::ready(ready_status(ready), 0)],
                });
            }
        }
        Err(Error::WorkloadNotFound(id.clone()))
    }
}

#[async_trait]
impl RemoteChannel for SimCluster {
    async fn exec(&self, address: &str, command: &str) -> Result<ExecOutput> {
        let mut st = self.state.lock().unwrap();
        let node = st
            .nodes
            .values_mut()
            .find(|n| n.spec.external_ip.as_deref() == Some(address))
            .ok_or_else(|| Error::ActionExecution {
                exit_code: None,
                message: format!("ssh: connect to host {address}: no route to host"),
            })?;

        node.triggers += 1;
        node.last_command = Some(command.to_string());
        if node.spec.exec_error {
            return Err(Error::ActionExecution {
                exit_code: None,
                message: "ssh: handshake failed".into(),
            });
        }
        if node.spec.exit_code == 0 {
            node.rebooted = true;
        }
        Ok(ExecOutput {
            exit_code: node.spec.exit_code,
            stdout: String::new(),
            stderr: if node.spec.exit_code == 0 {
                String::new()
            } else {
                "reboot: permission denied".into()
            },
        })
    }
}
