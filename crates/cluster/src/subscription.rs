//! Membership subscriptions

use std::fmt;

use tokio::sync::mpsc;

use crate::MembershipEvent;

/// Identifies a subscription so it can be released.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Create a subscription id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription-{}", self.0)
    }
}

/// A live stream of membership events.
///
/// Exactly one consumer reads from a subscription. Once the subscription is released
/// by the membership implementation, buffered events drain and `recv` returns `None`.
#[derive(Debug)]
pub struct MembershipSubscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<MembershipEvent>,
}

impl MembershipSubscription {
    /// Wrap the receiving end of an event channel.
    #[must_use]
    pub fn new(id: SubscriptionId, receiver: mpsc::UnboundedReceiver<MembershipEvent>) -> Self {
        Self { id, receiver }
    }

    /// The id to pass to `ClusterMembership::release`.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next event, or `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<MembershipEvent> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;

    #[tokio::test]
    async fn test_recv_drains_then_closes() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscription = MembershipSubscription::new(SubscriptionId::new(7), rx);

        tx.send(MembershipEvent::NodeRemoved(NodeId::from("b")))
            .unwrap();
        drop(tx);

        assert_eq!(subscription.id().get(), 7);
        assert_eq!(
            subscription.recv().await,
            Some(MembershipEvent::NodeRemoved(NodeId::from("b")))
        );
        assert_eq!(subscription.recv().await, None);
    }
}
