use thiserror::Error;
use vigil_cluster::NodeId;

use crate::SubsystemKind;

/// Errors raised by recovery subsystems.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// A sweep did not complete.
    #[error("sweep for node {node} failed: {reason}")]
    SweepFailed {
        /// The node whose work was being recovered.
        node: NodeId,
        /// Why the sweep failed.
        reason: String,
    },

    /// The subsystem will never become ready.
    #[error("subsystem not ready: {0}")]
    NotReady(String),

    /// The subsystem's backing store failed.
    #[error("store error: {0}")]
    Store(String),

    /// A subsystem sits in the slot of a different kind.
    #[error("{actual} subsystem configured in the {slot} slot")]
    MisplacedSubsystem {
        /// The slot it was put in.
        slot: SubsystemKind,
        /// What the subsystem reports itself as.
        actual: SubsystemKind,
    },
}
