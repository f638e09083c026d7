//! Error types for the in-memory membership implementation.

use std::fmt;

use thiserror::Error;
use vigil_cluster::{
    ClusterMembershipError, ClusterMembershipErrorKind, NodeId, SubscriptionId,
};

/// Membership operations that can be made to fail on purpose.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    /// `register_node`
    Register,

    /// `deregister_node`
    Deregister,

    /// `subscribe`
    Subscribe,

    /// `release`
    Release,

    /// `current_members`
    CurrentMembers,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Register => "register",
            Self::Deregister => "deregister",
            Self::Subscribe => "subscribe",
            Self::Release => "release",
            Self::CurrentMembers => "current members",
        };

        f.write_str(name)
    }
}

/// Error type for the in-memory membership implementation.
#[derive(Debug, Error)]
pub enum Error {
    /// Simulated loss of the coordination store.
    #[error("coordination store unavailable during {0}")]
    Connection(Operation),

    /// The node is not a live member.
    #[error("node {0} is not registered")]
    NotRegistered(NodeId),

    /// The node is already a live member.
    #[error("node {0} is already registered")]
    AlreadyRegistered(NodeId),

    /// No such subscription.
    #[error("unknown subscription {0}")]
    UnknownSubscription(SubscriptionId),
}

impl ClusterMembershipError for Error {
    fn kind(&self) -> ClusterMembershipErrorKind {
        match self {
            Self::Connection(_) => ClusterMembershipErrorKind::Connection,
            Self::NotRegistered(_) => ClusterMembershipErrorKind::NotRegistered,
            Self::AlreadyRegistered(_) => ClusterMembershipErrorKind::AlreadyRegistered,
            Self::UnknownSubscription(_) => ClusterMembershipErrorKind::UnknownSubscription,
        }
    }
}
