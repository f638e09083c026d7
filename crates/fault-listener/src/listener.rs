//! The fault listener service

use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use vigil_bootable::{Bootable, ServiceState};
use vigil_cluster::{ClusterMembership, ClusterMembershipError, NodeId, SubscriptionId};
use vigil_recovery::RecoverySubsystems;

use crate::consumer::Consumer;
use crate::lifecycle::Lifecycle;
use crate::sweep::{self, Spawner};
use crate::{Error, FaultListenerConfig, Result};

/// Resources acquired by `start` and released by `stop`
#[derive(Default)]
struct BootableState {
    registered: bool,
    subscription_id: Option<SubscriptionId>,
    consumer_task: Option<JoinHandle<()>>,
}

/// Detects departed nodes and delegates recovery of their work.
///
/// One instance per process. `start` and `stop` may each be called once; any other
/// call is rejected with [`Error::InvalidState`].
pub struct FaultListener<C>
where
    C: ClusterMembership,
{
    node_id: NodeId,
    membership: Arc<C>,
    subsystems: RecoverySubsystems,
    config: FaultListenerConfig,
    lifecycle: Lifecycle,
    bootable_state: RwLock<BootableState>,
    spawner: Spawner,
    shutdown_token: CancellationToken,
    stopping: CancellationToken,
}

impl<C> FaultListener<C>
where
    C: ClusterMembership,
{
    /// Create a new fault listener with default configuration
    pub fn new(node_id: NodeId, membership: Arc<C>, subsystems: RecoverySubsystems) -> Self {
        Self::with_config(node_id, membership, subsystems, FaultListenerConfig::default())
    }

    /// Create a new fault listener with custom configuration
    pub fn with_config(
        node_id: NodeId,
        membership: Arc<C>,
        subsystems: RecoverySubsystems,
        config: FaultListenerConfig,
    ) -> Self {
        info!(
            %node_id,
            ?subsystems,
            "creating fault listener"
        );

        Self {
            node_id,
            membership,
            subsystems,
            spawner: Spawner::new(config.runtime.clone()),
            config,
            lifecycle: Lifecycle::new(),
            bootable_state: RwLock::new(BootableState::default()),
            shutdown_token: CancellationToken::new(),
            stopping: CancellationToken::new(),
        }
    }

    /// The local node
    pub const fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServiceState {
        self.lifecycle.current()
    }

    /// Watch lifecycle state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ServiceState> {
        self.lifecycle.subscribe()
    }

    /// Wait until the listener has terminated or failed
    pub async fn wait(&self) {
        self.lifecycle.wait_terminal().await;
    }

    /// Register the local node, wait for every subsystem to be ready, start listening
    /// for departures and run the catch-up sweep.
    ///
    /// # Errors
    ///
    /// Fails if called more than once, or if registration, a readiness barrier,
    /// subscribing or fetching a live-member snapshot fails. On failure everything
    /// acquired so far is released and the listener ends in `Failed`.
    pub async fn start(&self) -> Result<()> {
        self.lifecycle
            .begin("start", ServiceState::New, ServiceState::Starting)?;

        let span = info_span!("fault_listener_start", node_id = %self.node_id);

        async {
            debug!("enter start");

            let result = self.start_up().await;

            match &result {
                Ok(()) => {
                    self.lifecycle.advance(ServiceState::Running);
                    info!("fault listener running");
                }
                Err(e) => {
                    error!(error = %e, "fault listener failed to start");
                    self.unwind().await;
                    self.lifecycle.advance(ServiceState::Failed);
                }
            }

            debug!("leave start");
            result
        }
        .instrument(span)
        .await
    }

    async fn start_up(&self) -> Result<()> {
        self.subsystems.check_slots().map_err(Error::Misconfigured)?;

        info!("registering node with the cluster");
        self.membership
            .register_node(&self.node_id)
            .await
            .map_err(|e| Error::Register {
                node_id: self.node_id.clone(),
                kind: e.kind(),
                source: Box::new(e),
            })?;
        self.bootable_state.write().await.registered = true;

        self.await_subsystems_ready().await?;

        // Subscribe before the catch-up snapshot so a node dying in between is seen by
        // at least one of the two.
        info!("subscribing to membership events");
        let subscription = self
            .membership
            .subscribe()
            .await
            .map_err(|e| Error::Subscribe(Box::new(e)))?;
        let subscription_id = subscription.id();

        let consumer = Consumer {
            local_node: self.node_id.clone(),
            subscription,
            subsystems: self.subsystems.clone(),
            spawner: self.spawner.clone(),
            shutdown_token: self.shutdown_token.clone(),
            stopping: self.stopping.clone(),
        };
        let consumer_task = self.spawner.spawn(
            consumer
                .run()
                .instrument(info_span!("membership_consumer", node_id = %self.node_id)),
        );

        {
            let mut state = self.bootable_state.write().await;
            state.subscription_id = Some(subscription_id);
            state.consumer_task = Some(consumer_task);
        }

        sweep::catch_up(self.membership.as_ref(), &self.subsystems).await
    }

    async fn await_subsystems_ready(&self) -> Result<()> {
        for (kind, subsystem) in self.subsystems.present() {
            if !subsystem.has_readiness_barrier() {
                continue;
            }

            info!(subsystem = %kind, "awaiting subsystem readiness");

            let ready = subsystem.await_ready();
            let outcome = match self.config.readiness_timeout {
                Some(timeout) => tokio::time::timeout(timeout, ready)
                    .await
                    .map_err(|_| Error::ReadinessTimeout {
                        subsystem: kind,
                        timeout,
                    })?,
                None => ready.await,
            };

            outcome.map_err(|source| Error::ReadinessBarrier {
                subsystem: kind,
                source,
            })?;

            debug!(subsystem = %kind, "subsystem ready");
        }

        Ok(())
    }

    /// Best-effort release of whatever a failed `start` acquired
    async fn unwind(&self) {
        self.shutdown_token.cancel();
        self.spawner.close();

        let state = std::mem::take(&mut *self.bootable_state.write().await);

        if let Some(subscription_id) = state.subscription_id {
            self.release(subscription_id).await;
        }

        if let Some(task) = state.consumer_task {
            if let Err(e) = task.await {
                warn!(error = %e, "membership consumer task failed");
            }
        }

        if state.registered {
            self.deregister().await;
        }
    }

    async fn deregister(&self) {
        info!("deregistering node from the cluster");
        if let Err(e) = self.membership.deregister_node(&self.node_id).await {
            warn!(
                kind = %e.kind(),
                error = %e,
                "failed to deregister node, relying on session expiry"
            );
        }
    }

    /// Returns whether the subscription was released, and so will close.
    async fn release(&self, subscription_id: SubscriptionId) -> bool {
        match self.membership.release(subscription_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    subscription = %subscription_id,
                    kind = %e.kind(),
                    error = %e,
                    "failed to release subscription"
                );
                false
            }
        }
    }

    /// Deregister the local node and stop listening.
    ///
    /// Events already delivered on the subscription are still handled: the consumer
    /// drains until the released subscription closes, bounded by the shutdown timeout.
    /// Sweeps already dispatched keep running to completion.
    ///
    /// # Errors
    ///
    /// Fails if the listener is not running, or if the membership consumer task
    /// panicked, in which case the listener ends in `Failed`. Deregistration and
    /// release failures are logged only; the store's session timeout removes the
    /// node eventually.
    pub async fn stop(&self) -> Result<()> {
        self.lifecycle
            .begin("stop", ServiceState::Running, ServiceState::Stopping)?;

        let span = info_span!("fault_listener_stop", node_id = %self.node_id);

        async {
            debug!("enter stop");

            self.stopping.cancel();
            let state = std::mem::take(&mut *self.bootable_state.write().await);

            // Our own removal is delivered to the consumer, which ignores it.
            self.deregister().await;

            if let Some(subscription_id) = state.subscription_id {
                if !self.release(subscription_id).await {
                    // Nothing will close the subscription, so stop without draining.
                    self.shutdown_token.cancel();
                }
            }

            self.spawner.close();

            let result = match state.consumer_task {
                Some(task) => self.drain(task).await,
                None => Ok(()),
            };

            if result.is_ok() {
                self.lifecycle.advance(ServiceState::Terminated);
                info!("fault listener stopped");
            } else {
                self.lifecycle.advance(ServiceState::Failed);
            }

            debug!("leave stop");
            result
        }
        .instrument(span)
        .await
    }

    async fn drain(&self, mut task: JoinHandle<()>) -> Result<()> {
        let joined = match tokio::time::timeout(self.config.shutdown_timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    timeout = ?self.config.shutdown_timeout,
                    "membership consumer did not drain within timeout, cancelling"
                );
                self.shutdown_token.cancel();
                task.await
            }
        };

        joined.map_err(|e| {
            error!(error = %e, "membership consumer task failed");
            Error::ConsumerTask(e)
        })?;

        debug!("membership consumer shut down cleanly");
        Ok(())
    }
}

impl<C> Debug for FaultListener<C>
where
    C: ClusterMembership,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultListener")
            .field("node_id", &self.node_id)
            .field("subsystems", &self.subsystems)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C> Bootable for FaultListener<C>
where
    C: ClusterMembership,
{
    fn bootable_name(&self) -> &str {
        "FaultListener"
    }

    async fn start(&self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self::start(self).await?)
    }

    async fn shutdown(&self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.stop().await?)
    }

    async fn wait(&self) {
        Self::wait(self).await;
    }

    fn state(&self) -> ServiceState {
        Self::state(self)
    }
}
