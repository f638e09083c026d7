//! Membership change events

use serde::{Deserialize, Serialize};

use crate::NodeId;

/// A change in the cluster's live-member set, as observed by the coordination store.
///
/// Delivery may be duplicated. Consumers must treat a repeated `NodeRemoved` for the
/// same node as harmless.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum MembershipEvent {
    /// A node joined the cluster.
    NodeAdded(NodeId),

    /// A node left the cluster, gracefully or not.
    NodeRemoved(NodeId),

    /// Transient transport error while watching membership.
    ChannelError(String),
}
