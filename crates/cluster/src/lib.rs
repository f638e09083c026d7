//! Abstract interface for cluster membership backed by a coordination store.
//!
//! This crate provides:
//! - Node identity type (`NodeId`)
//! - Membership change events and subscriptions
//! - The `ClusterMembership` trait implemented by coordination-store clients
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;
pub mod event;
pub mod node_id;
pub mod subscription;

pub use error::{ClusterMembershipError, ClusterMembershipErrorKind};
pub use event::MembershipEvent;
pub use node_id::NodeId;
pub use subscription::{MembershipSubscription, SubscriptionId};

use std::collections::HashSet;

use async_trait::async_trait;

/// A trait representing the live-member set of a cluster, shared by every node
/// through a coordination store.
///
/// Only the owning process may register or deregister its own `NodeId`.
#[async_trait]
pub trait ClusterMembership: Send + Sync + 'static {
    /// The error type for membership operations.
    type Error: ClusterMembershipError;

    /// Registers `node_id` as live. Visible to every other node immediately.
    async fn register_node(&self, node_id: &NodeId) -> Result<(), Self::Error>;

    /// Removes `node_id` from the live set.
    async fn deregister_node(&self, node_id: &NodeId) -> Result<(), Self::Error>;

    /// Subscribes to membership change events.
    ///
    /// Events for a given node arrive in the order the store observed them. No
    /// ordering is guaranteed across nodes.
    async fn subscribe(&self) -> Result<MembershipSubscription, Self::Error>;

    /// Releases a subscription previously returned by [`Self::subscribe`]. No further
    /// events are delivered to it.
    async fn release(&self, subscription_id: SubscriptionId) -> Result<(), Self::Error>;

    /// Point-in-time snapshot of the live members.
    async fn current_members(&self) -> Result<HashSet<NodeId>, Self::Error>;
}
