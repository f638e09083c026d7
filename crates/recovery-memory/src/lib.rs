//! In-memory (single process) recovery subsystem for local development and tests.
//!
//! Work items are keyed by id and record their owning node. Sweeps reassign items
//! still owned by a departed node to the local node, conditionally on the owner, so
//! repeating a sweep is a no-op.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod readiness;

pub use readiness::ReadinessHandle;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use readiness::Readiness;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};
use vigil_cluster::NodeId;
use vigil_recovery::{RecoveryError, RecoverySubsystem, SubsystemKind, SweepTarget};

/// A work item reassigned by a sweep.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecoveredWork {
    /// The work item's id.
    pub work_id: String,

    /// The departed node that owned it.
    pub previous_owner: NodeId,
}

#[derive(Debug, Default)]
struct Ledger {
    owners: BTreeMap<String, NodeId>,
    recovered: Vec<RecoveredWork>,
    calls: Vec<SweepTarget>,
    failures_remaining: usize,
    sweep_delay: Option<Duration>,
}

/// In-memory recovery subsystem.
#[derive(Clone, Debug)]
pub struct MemoryRecoverySubsystem {
    kind: SubsystemKind,
    local_node: NodeId,
    ledger: Arc<Mutex<Ledger>>,
    readiness: Option<watch::Receiver<Readiness>>,
}

impl MemoryRecoverySubsystem {
    /// Creates a subsystem that claims orphaned work for `local_node`. It is ready
    /// immediately.
    #[must_use]
    pub fn new(kind: SubsystemKind, local_node: NodeId) -> Self {
        Self {
            kind,
            local_node,
            ledger: Arc::new(Mutex::new(Ledger::default())),
            readiness: None,
        }
    }

    /// Creates a subsystem whose readiness barrier stays closed until the returned
    /// handle is marked ready.
    #[must_use]
    pub fn with_readiness_barrier(
        kind: SubsystemKind,
        local_node: NodeId,
    ) -> (Self, ReadinessHandle) {
        let (handle, receiver) = ReadinessHandle::new();

        let subsystem = Self {
            readiness: Some(receiver),
            ..Self::new(kind, local_node)
        };

        (subsystem, handle)
    }

    /// Records `owner` as the owner of `work_id`.
    pub async fn assign(&self, work_id: impl Into<String>, owner: NodeId) {
        self.ledger.lock().await.owners.insert(work_id.into(), owner);
    }

    /// Ids of the work items currently owned by `owner`.
    pub async fn owned_by(&self, owner: &NodeId) -> Vec<String> {
        self.ledger
            .lock()
            .await
            .owners
            .iter()
            .filter(|(_, current)| *current == owner)
            .map(|(work_id, _)| work_id.clone())
            .collect()
    }

    /// Every reassignment performed so far, in order.
    pub async fn recovered(&self) -> Vec<RecoveredWork> {
        self.ledger.lock().await.recovered.clone()
    }

    /// Every sweep requested so far, in order, including failed ones.
    pub async fn calls(&self) -> Vec<SweepTarget> {
        self.ledger.lock().await.calls.clone()
    }

    /// Makes the next `count` sweeps fail without touching the ledger.
    pub async fn fail_next_sweeps(&self, count: usize) {
        self.ledger.lock().await.failures_remaining = count;
    }

    /// Makes every sweep sleep for `delay` before running.
    pub async fn set_sweep_delay(&self, delay: Duration) {
        self.ledger.lock().await.sweep_delay = Some(delay);
    }

    async fn run_sweep(&self, target: SweepTarget) -> Result<(), RecoveryError> {
        let delay = {
            let mut ledger = self.ledger.lock().await;
            ledger.calls.push(target.clone());
            ledger.sweep_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut ledger = self.ledger.lock().await;

        if ledger.failures_remaining > 0 {
            ledger.failures_remaining -= 1;
            return Err(RecoveryError::SweepFailed {
                node: match &target {
                    SweepTarget::SingleNode(node_id) => node_id.clone(),
                    SweepTarget::AllExcept(_) => self.local_node.clone(),
                },
                reason: format!("injected {} sweep failure", self.kind),
            });
        }

        let Ledger { owners, recovered, .. } = &mut *ledger;

        let mut count = 0_usize;
        for (work_id, owner) in owners.iter_mut() {
            if *owner == self.local_node || !target.covers(owner) {
                continue;
            }

            let previous_owner = std::mem::replace(owner, self.local_node.clone());
            recovered.push(RecoveredWork {
                work_id: work_id.clone(),
                previous_owner,
            });
            count += 1;
        }

        if count > 0 {
            info!(subsystem = %self.kind, %target, count, "recovered orphaned work");
        } else {
            debug!(subsystem = %self.kind, %target, "nothing to recover");
        }

        Ok(())
    }
}

#[async_trait]
impl RecoverySubsystem for MemoryRecoverySubsystem {
    fn kind(&self) -> SubsystemKind {
        self.kind
    }

    async fn recover_orphaned(&self, node_id: &NodeId) -> Result<(), RecoveryError> {
        self.run_sweep(SweepTarget::SingleNode(node_id.clone())).await
    }

    async fn recover_orphaned_except(&self, live: &HashSet<NodeId>) -> Result<(), RecoveryError> {
        self.run_sweep(SweepTarget::AllExcept(live.clone())).await
    }

    fn has_readiness_barrier(&self) -> bool {
        self.readiness.is_some()
    }

    async fn await_ready(&self) -> Result<(), RecoveryError> {
        match &self.readiness {
            Some(receiver) => readiness::wait(receiver.clone()).await,
            None => Ok(()),
        }
    }
}
