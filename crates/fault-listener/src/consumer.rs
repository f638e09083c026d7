//! The single task that consumes a membership subscription.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_cluster::{MembershipEvent, MembershipSubscription, NodeId};
use vigil_recovery::RecoverySubsystems;

use crate::sweep::{self, Spawner};

pub struct Consumer {
    pub local_node: NodeId,
    pub subscription: MembershipSubscription,
    pub subsystems: RecoverySubsystems,
    pub spawner: Spawner,
    /// Stops the consumer without draining. Only used when startup fails.
    pub shutdown_token: CancellationToken,
    /// Cancelled once `stop` begins, after which the subscription closing is expected.
    pub stopping: CancellationToken,
}

impl Consumer {
    pub async fn run(mut self) {
        debug!(subscription = %self.subscription.id(), "membership consumer started");

        loop {
            tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => {
                    debug!("membership consumer shutting down");
                    break;
                }
                event = self.subscription.recv() => {
                    let Some(event) = event else {
                        if self.stopping.is_cancelled() {
                            debug!("membership subscription released and drained");
                        } else {
                            warn!("membership subscription closed unexpectedly");
                        }
                        break;
                    };
                    self.handle(event);
                }
            }
        }
    }

    fn handle(&self, event: MembershipEvent) {
        match event {
            MembershipEvent::NodeAdded(node_id) => {
                // A node that just joined owns nothing yet.
                info!(%node_id, "node joined the cluster");
            }
            MembershipEvent::NodeRemoved(node_id) if node_id == self.local_node => {
                debug!(%node_id, "ignoring removal of the local node");
            }
            MembershipEvent::NodeRemoved(node_id) => {
                info!(%node_id, "node left the cluster, sweeping its orphaned work");
                sweep::dispatch_departed(&node_id, &self.subsystems, &self.spawner);
            }
            MembershipEvent::ChannelError(reason) => {
                // Session loss is handled by whoever owns the store session.
                warn!(%reason, "membership channel error, ignoring");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use tracing_test::traced_test;
    use vigil_cluster::ClusterMembership;
    use vigil_cluster_memory::MemoryClusterMembership;
    use vigil_recovery::{SubsystemKind, SweepTarget};
    use vigil_recovery_memory::MemoryRecoverySubsystem;

    async fn consumer(
        membership: &MemoryClusterMembership,
        tasks: &Arc<MemoryRecoverySubsystem>,
    ) -> (Consumer, Spawner, CancellationToken, CancellationToken) {
        let spawner = Spawner::new(None);
        let shutdown_token = CancellationToken::new();
        let stopping = CancellationToken::new();

        let consumer = Consumer {
            local_node: NodeId::from("a"),
            subscription: membership.subscribe().await.unwrap(),
            subsystems: RecoverySubsystems::new().with_task(tasks.clone()),
            spawner: spawner.clone(),
            shutdown_token: shutdown_token.clone(),
            stopping: stopping.clone(),
        };

        (consumer, spawner, shutdown_token, stopping)
    }

    #[tokio::test]
    #[traced_test]
    async fn test_channel_errors_and_joins_are_only_logged() {
        let membership = MemoryClusterMembership::new();
        let tasks = Arc::new(MemoryRecoverySubsystem::new(
            SubsystemKind::Task,
            NodeId::from("a"),
        ));
        let (consumer, _spawner, _token, _stopping) = consumer(&membership, &tasks).await;

        membership.inject_channel_error("connection suspended").await;
        membership.join_node(&NodeId::from("b")).await.unwrap();
        membership.release(consumer.subscription.id()).await.unwrap();

        consumer.run().await;

        assert!(tasks.calls().await.is_empty());
        assert!(logs_contain("membership channel error, ignoring"));
        assert!(logs_contain("connection suspended"));
        assert!(logs_contain("node joined the cluster"));
        assert!(logs_contain("membership subscription closed unexpectedly"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_removal_of_local_node_is_ignored() {
        let membership = MemoryClusterMembership::new();
        let tasks = Arc::new(MemoryRecoverySubsystem::new(
            SubsystemKind::Task,
            NodeId::from("a"),
        ));
        let (consumer, spawner, token, _stopping) = consumer(&membership, &tasks).await;

        membership.redeliver_removed(&NodeId::from("a")).await;
        membership.redeliver_removed(&NodeId::from("b")).await;

        let running = tokio::spawn(consumer.run());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        token.cancel();
        running.await.unwrap();

        spawner.close();
        spawner.wait().await;

        assert_eq!(
            tasks.calls().await,
            vec![SweepTarget::SingleNode(NodeId::from("b"))]
        );
        assert!(logs_contain("ignoring removal of the local node"));
        assert!(logs_contain("membership consumer shutting down"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_release_drains_pending_removals() {
        let membership = MemoryClusterMembership::new();
        let tasks = Arc::new(MemoryRecoverySubsystem::new(
            SubsystemKind::Task,
            NodeId::from("a"),
        ));
        tasks.assign("scale-stream-1", NodeId::from("b")).await;
        let (consumer, spawner, _token, stopping) = consumer(&membership, &tasks).await;

        // Delivered before the stop began, still buffered when the release happens.
        membership.redeliver_removed(&NodeId::from("b")).await;
        stopping.cancel();
        membership.release(consumer.subscription.id()).await.unwrap();

        consumer.run().await;
        spawner.close();
        spawner.wait().await;

        assert_eq!(
            tasks.calls().await,
            vec![SweepTarget::SingleNode(NodeId::from("b"))]
        );
        assert!(tasks.owned_by(&NodeId::from("b")).await.is_empty());
        assert!(logs_contain("membership subscription released and drained"));
        assert!(!logs_contain("closed unexpectedly"));
    }
}
