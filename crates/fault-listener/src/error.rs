//! Error types for the fault listener

use std::time::Duration;

use thiserror::Error;
use vigil_bootable::ServiceState;
use vigil_cluster::{ClusterMembershipErrorKind, NodeId};
use vigil_recovery::{RecoveryError, SubsystemKind};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the fault listener.
///
/// Only lifecycle operations fail. Sweep failures and deregistration failures are
/// logged where they happen and never surface here.
#[derive(Debug, Error)]
pub enum Error {
    /// A subsystem was configured in a slot that does not match its kind
    #[error("recovery subsystems are misconfigured")]
    Misconfigured(#[source] RecoveryError),

    /// The local node could not be registered as live
    #[error("failed to register node {node_id} with the cluster ({kind})")]
    Register {
        /// The local node
        node_id: NodeId,
        /// Classification of the membership error
        kind: ClusterMembershipErrorKind,
        /// Underlying membership error
        #[source]
        source: BoxError,
    },

    /// A subsystem reported it will never become ready
    #[error("{subsystem} subsystem failed to become ready")]
    ReadinessBarrier {
        /// The subsystem
        subsystem: SubsystemKind,
        /// Underlying recovery error
        #[source]
        source: RecoveryError,
    },

    /// A subsystem did not become ready in time
    #[error("timed out after {timeout:?} waiting for the {subsystem} subsystem to become ready")]
    ReadinessTimeout {
        /// The subsystem
        subsystem: SubsystemKind,
        /// The configured bound
        timeout: Duration,
    },

    /// Subscribing to membership events failed
    #[error("failed to subscribe to membership events")]
    Subscribe(#[source] BoxError),

    /// The live-member snapshot for a catch-up sweep could not be fetched
    #[error("failed to fetch live members for the {subsystem} catch-up sweep")]
    Snapshot {
        /// The subsystem whose sweep needed the snapshot
        subsystem: SubsystemKind,
        /// Underlying membership error
        #[source]
        source: BoxError,
    },

    /// The operation is not allowed in the current lifecycle state
    #[error("cannot {operation} fault listener while {state}")]
    InvalidState {
        /// `start` or `stop`
        operation: &'static str,
        /// State observed when the operation was attempted
        state: ServiceState,
    },

    /// The membership consumer task panicked
    #[error("membership consumer task failed")]
    ConsumerTask(#[source] tokio::task::JoinError),
}
