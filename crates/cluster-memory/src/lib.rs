//! In-memory (single process) implementation of cluster membership for local
//! development and tests.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{Error, Operation};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;
use vigil_cluster::{
    ClusterMembership, MembershipEvent, MembershipSubscription, NodeId, SubscriptionId,
};

#[derive(Debug, Default)]
struct State {
    members: HashSet<NodeId>,
    subscribers: HashMap<SubscriptionId, mpsc::UnboundedSender<MembershipEvent>>,
    next_subscription_id: u64,
    pending_failures: HashSet<Operation>,
}

impl State {
    fn broadcast(&mut self, event: &MembershipEvent) {
        // Receivers dropped without a release are pruned here.
        self.subscribers
            .retain(|_, sender| sender.send(event.clone()).is_ok());
    }

    fn check_failure(&mut self, operation: Operation) -> Result<(), Error> {
        if self.pending_failures.remove(&operation) {
            return Err(Error::Connection(operation));
        }

        Ok(())
    }

    fn add_member(&mut self, node_id: &NodeId) -> Result<(), Error> {
        if !self.members.insert(node_id.clone()) {
            return Err(Error::AlreadyRegistered(node_id.clone()));
        }

        self.broadcast(&MembershipEvent::NodeAdded(node_id.clone()));
        Ok(())
    }

    fn remove_member(&mut self, node_id: &NodeId) -> Result<(), Error> {
        if !self.members.remove(node_id) {
            return Err(Error::NotRegistered(node_id.clone()));
        }

        self.broadcast(&MembershipEvent::NodeRemoved(node_id.clone()));
        Ok(())
    }
}

/// In-memory cluster membership.
///
/// Clones share the same member set, so one instance can play the coordination store
/// for several simulated nodes.
#[derive(Clone, Debug, Default)]
pub struct MemoryClusterMembership {
    state: Arc<Mutex<State>>,
}

impl MemoryClusterMembership {
    /// Creates a new, empty `MemoryClusterMembership`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a membership with `members` already live. No events are emitted.
    pub fn with_members<I>(members: I) -> Self
    where
        I: IntoIterator<Item = NodeId>,
    {
        let state = State {
            members: members.into_iter().collect(),
            ..State::default()
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Simulates another process joining the cluster.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRegistered` if the node is already live.
    pub async fn join_node(&self, node_id: &NodeId) -> Result<(), Error> {
        self.state.lock().await.add_member(node_id)
    }

    /// Simulates another process dying: its entry expires and subscribers are told.
    ///
    /// # Errors
    ///
    /// Returns `NotRegistered` if the node is not live.
    pub async fn crash_node(&self, node_id: &NodeId) -> Result<(), Error> {
        debug!(%node_id, "simulating node crash");
        self.state.lock().await.remove_member(node_id)
    }

    /// Removes a member without notifying anyone, as if it died while nobody was
    /// listening. Returns whether the node was live.
    pub async fn remove_silently(&self, node_id: &NodeId) -> bool {
        self.state.lock().await.members.remove(node_id)
    }

    /// Sends `NodeRemoved` again for a node, as a duplicate delivery would.
    pub async fn redeliver_removed(&self, node_id: &NodeId) {
        self.state
            .lock()
            .await
            .broadcast(&MembershipEvent::NodeRemoved(node_id.clone()));
    }

    /// Sends a `ChannelError` to every subscriber.
    pub async fn inject_channel_error(&self, reason: impl Into<String>) {
        self.state
            .lock()
            .await
            .broadcast(&MembershipEvent::ChannelError(reason.into()));
    }

    /// Makes the next call of `operation` fail with a connection error.
    pub async fn fail_next(&self, operation: Operation) {
        self.state.lock().await.pending_failures.insert(operation);
    }

    /// Number of subscriptions that have not been released.
    pub async fn subscription_count(&self) -> usize {
        self.state.lock().await.subscribers.len()
    }

    /// Whether `node_id` is currently live.
    pub async fn is_member(&self, node_id: &NodeId) -> bool {
        self.state.lock().await.members.contains(node_id)
    }
}

#[async_trait]
impl ClusterMembership for MemoryClusterMembership {
    type Error = Error;

    async fn register_node(&self, node_id: &NodeId) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        state.check_failure(Operation::Register)?;
        state.add_member(node_id)
    }

    async fn deregister_node(&self, node_id: &NodeId) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        state.check_failure(Operation::Deregister)?;
        state.remove_member(node_id)
    }

    async fn subscribe(&self) -> Result<MembershipSubscription, Self::Error> {
        let mut state = self.state.lock().await;
        state.check_failure(Operation::Subscribe)?;

        let id = SubscriptionId::new(state.next_subscription_id);
        state.next_subscription_id += 1;

        let (sender, receiver) = mpsc::unbounded_channel();
        state.subscribers.insert(id, sender);

        debug!(subscription = %id, "membership subscription added");
        Ok(MembershipSubscription::new(id, receiver))
    }

    async fn release(&self, subscription_id: SubscriptionId) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        state.check_failure(Operation::Release)?;

        state
            .subscribers
            .remove(&subscription_id)
            .map(|_| ())
            .ok_or(Error::UnknownSubscription(subscription_id))
    }

    async fn current_members(&self) -> Result<HashSet<NodeId>, Self::Error> {
        let mut state = self.state.lock().await;
        state.check_failure(Operation::CurrentMembers)?;
        Ok(state.members.clone())
    }
}
