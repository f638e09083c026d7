//! Delegation of recovery to the configured subsystems.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info, info_span};
use vigil_cluster::{ClusterMembership, NodeId};
use vigil_recovery::{RecoverySubsystem, RecoverySubsystems, SubsystemKind, SweepTarget};

use crate::{Error, Result};

/// Spawns tasks onto the caller-supplied runtime, or the current one, and tracks them.
#[derive(Clone, Debug)]
pub struct Spawner {
    tracker: TaskTracker,
    runtime: Option<Handle>,
}

impl Spawner {
    pub fn new(runtime: Option<Handle>) -> Self {
        Self {
            tracker: TaskTracker::new(),
            runtime,
        }
    }

    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match &self.runtime {
            Some(runtime) => self.tracker.spawn_on(task, runtime),
            None => self.tracker.spawn(task),
        }
    }

    /// Stops tracking new tasks. Already-spawned ones keep running.
    pub fn close(&self) {
        self.tracker.close();
    }

    /// Waits for every tracked task once the spawner is closed.
    #[cfg(test)]
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }
}

/// Dispatches `recover_orphaned(node_id)` to every configured subsystem, each in its
/// own task so that a slow, failing or panicking subsystem cannot hold up another.
pub fn dispatch_departed(node_id: &NodeId, subsystems: &RecoverySubsystems, spawner: &Spawner) {
    for (kind, subsystem) in subsystems.present() {
        let subsystem = Arc::clone(subsystem);
        let node_id = node_id.clone();
        let span = info_span!("sweep", subsystem = %kind, %node_id);

        spawner.spawn(
            async move {
                let target = SweepTarget::SingleNode(node_id);
                run_sweep(kind, &*subsystem, &target).await;
            }
            .instrument(span),
        );
    }
}

/// Catch-up sweep run once at startup.
///
/// Each subsystem gets a snapshot of live members fetched immediately before its own
/// sweep. Failing to fetch a snapshot is fatal; a failing sweep is only logged. All
/// sweeps run to completion before an error is returned.
pub async fn catch_up<C>(membership: &C, subsystems: &RecoverySubsystems) -> Result<()>
where
    C: ClusterMembership,
{
    let sweeps = subsystems.present().map(|(kind, subsystem)| {
        async move {
            let live = membership
                .current_members()
                .await
                .map_err(|e| Error::Snapshot {
                    subsystem: kind,
                    source: Box::new(e),
                })?;

            info!(live = live.len(), "sweeping orphaned work at startup");

            run_sweep(kind, &**subsystem, &SweepTarget::AllExcept(live)).await;
            Ok::<(), Error>(())
        }
        .instrument(info_span!("catch_up", subsystem = %kind))
    });

    join_all(sweeps).await.into_iter().collect()
}

async fn run_sweep(kind: SubsystemKind, subsystem: &dyn RecoverySubsystem, target: &SweepTarget) {
    match subsystem.sweep(target).await {
        Ok(()) => info!(subsystem = %kind, %target, "sweep complete"),
        Err(e) => error!(
            subsystem = %kind,
            %target,
            error = %e,
            "sweep failed; retried on redelivery or the next catch-up sweep"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tracing_test::traced_test;
    use vigil_recovery::RecoveryError;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<SweepTarget>>,
        fail: bool,
    }

    #[async_trait]
    impl RecoverySubsystem for Recording {
        fn kind(&self) -> SubsystemKind {
            SubsystemKind::Task
        }

        async fn recover_orphaned(
            &self,
            node_id: &NodeId,
        ) -> std::result::Result<(), RecoveryError> {
            self.calls
                .lock()
                .unwrap()
                .push(SweepTarget::SingleNode(node_id.clone()));

            if self.fail {
                return Err(RecoveryError::Store("unavailable".to_string()));
            }
            Ok(())
        }

        async fn recover_orphaned_except(
            &self,
            live: &HashSet<NodeId>,
        ) -> std::result::Result<(), RecoveryError> {
            self.calls
                .lock()
                .unwrap()
                .push(SweepTarget::AllExcept(live.clone()));
            Ok(())
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_dispatch_reaches_every_subsystem_despite_failure() {
        let failing = Arc::new(Recording {
            fail: true,
            ..Recording::default()
        });
        let healthy = Arc::new(Recording::default());

        let subsystems = RecoverySubsystems::new()
            .with_task(failing.clone())
            .with_transaction(healthy.clone());

        let spawner = Spawner::new(None);
        dispatch_departed(&NodeId::from("b"), &subsystems, &spawner);
        spawner.close();
        spawner.wait().await;

        let expected = vec![SweepTarget::SingleNode(NodeId::from("b"))];
        assert_eq!(*failing.calls.lock().unwrap(), expected);
        assert_eq!(*healthy.calls.lock().unwrap(), expected);
        assert!(logs_contain("sweep failed"));
        assert!(logs_contain("store error: unavailable"));
        assert!(logs_contain("sweep complete"));
    }

    #[tokio::test]
    async fn test_catch_up_uses_live_members() {
        use vigil_cluster::ClusterMembership;
        use vigil_cluster_memory::MemoryClusterMembership;

        let membership = MemoryClusterMembership::with_members([NodeId::from("a")]);
        membership.register_node(&NodeId::from("c")).await.unwrap();
        let tasks = Arc::new(Recording::default());

        catch_up(&membership, &RecoverySubsystems::new().with_task(tasks.clone()))
            .await
            .unwrap();

        assert_eq!(
            *tasks.calls.lock().unwrap(),
            vec![SweepTarget::AllExcept(HashSet::from([
                NodeId::from("a"),
                NodeId::from("c")
            ]))]
        );
    }

    #[tokio::test]
    async fn test_dispatch_with_no_subsystems_spawns_nothing() {
        let spawner = Spawner::new(None);
        dispatch_departed(&NodeId::from("b"), &RecoverySubsystems::new(), &spawner);
        assert!(spawner.tracker.is_empty());
    }
}
