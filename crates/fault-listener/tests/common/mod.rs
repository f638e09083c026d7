//! Shared fixtures for fault listener integration tests

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use vigil_cluster::NodeId;
use vigil_cluster_memory::MemoryClusterMembership;
use vigil_fault_listener::{FaultListener, FaultListenerConfig};
use vigil_recovery::{RecoverySubsystems, SubsystemKind};
use vigil_recovery_memory::MemoryRecoverySubsystem;

/// How long `eventually` waits before failing the test
const EVENTUALLY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("vigil_fault_listener=debug,vigil_recovery_memory=debug")
        .with_test_writer()
        .try_init();
}

pub fn node(id: &str) -> NodeId {
    NodeId::from(id)
}

/// The node every test listener runs as
pub fn local() -> NodeId {
    node("a")
}

pub fn subsystem(kind: SubsystemKind) -> Arc<MemoryRecoverySubsystem> {
    Arc::new(MemoryRecoverySubsystem::new(kind, local()))
}

/// Membership with the given peers live (the local node registers itself on start)
pub fn membership(peers: &[&str]) -> MemoryClusterMembership {
    MemoryClusterMembership::with_members(peers.iter().map(|id| node(id)))
}

pub fn listener(
    membership: &MemoryClusterMembership,
    subsystems: RecoverySubsystems,
) -> FaultListener<MemoryClusterMembership> {
    listener_with_config(membership, subsystems, FaultListenerConfig::default())
}

pub fn listener_with_config(
    membership: &MemoryClusterMembership,
    subsystems: RecoverySubsystems,
    config: FaultListenerConfig,
) -> FaultListener<MemoryClusterMembership> {
    FaultListener::with_config(local(), Arc::new(membership.clone()), subsystems, config)
}

/// Poll `check` until it holds, panicking after a few seconds
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + EVENTUALLY_TIMEOUT;

    while !check().await {
        assert!(
            Instant::now() < deadline,
            "condition not met within {EVENTUALLY_TIMEOUT:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
