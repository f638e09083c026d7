//! Abstract interface for subsystems that recover work orphaned by departed nodes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod slots;
mod target;

pub use error::RecoveryError;
pub use slots::RecoverySubsystems;
pub use target::SweepTarget;

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use vigil_cluster::NodeId;

/// The subsystems that can own work on behalf of a node.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SubsystemKind {
    /// Pending administrative tasks.
    Task,

    /// Open stream transactions.
    Transaction,

    /// Event-processing reader assignments.
    ReaderGroup,
}

impl fmt::Display for SubsystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Task => "task",
            Self::Transaction => "transaction",
            Self::ReaderGroup => "reader-group",
        };

        f.write_str(name)
    }
}

/// A subsystem able to claim and complete or reassign work owned by nodes that left
/// the cluster.
///
/// Implementations must be safe to call concurrently for distinct node ids, and
/// idempotent per node id: a sweep claims whatever the node still owns, so once
/// nothing remains a repeat sweep does nothing.
#[async_trait]
pub trait RecoverySubsystem: Send + Sync + 'static {
    /// Which subsystem this is.
    fn kind(&self) -> SubsystemKind;

    /// Recover all work currently owned by `node_id`.
    async fn recover_orphaned(&self, node_id: &NodeId) -> Result<(), RecoveryError>;

    /// Recover all work owned by any node not in `live`.
    async fn recover_orphaned_except(&self, live: &HashSet<NodeId>) -> Result<(), RecoveryError>;

    /// Whether [`Self::await_ready`] is a real barrier that must be waited on before
    /// sweeps are safe.
    fn has_readiness_barrier(&self) -> bool {
        false
    }

    /// Resolves once the subsystem has finished initialising.
    async fn await_ready(&self) -> Result<(), RecoveryError> {
        Ok(())
    }

    /// Run the sweep described by `target`.
    async fn sweep(&self, target: &SweepTarget) -> Result<(), RecoveryError> {
        match target {
            SweepTarget::SingleNode(node_id) => self.recover_orphaned(node_id).await,
            SweepTarget::AllExcept(live) => self.recover_orphaned_except(live).await,
        }
    }
}
