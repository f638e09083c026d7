use tokio::sync::watch;
use vigil_recovery::RecoveryError;

#[derive(Clone, Debug)]
pub enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

/// Opens or fails the readiness barrier of a `MemoryRecoverySubsystem`.
///
/// Dropping the handle while the barrier is still closed fails every waiter.
#[derive(Debug)]
pub struct ReadinessHandle {
    sender: watch::Sender<Readiness>,
}

impl ReadinessHandle {
    pub(crate) fn new() -> (Self, watch::Receiver<Readiness>) {
        let (sender, receiver) = watch::channel(Readiness::Pending);
        (Self { sender }, receiver)
    }

    /// Opens the barrier.
    pub fn mark_ready(&self) {
        self.sender.send_replace(Readiness::Ready);
    }

    /// Fails the barrier; waiters get `RecoveryError::NotReady`.
    pub fn fail(&self, reason: impl Into<String>) {
        self.sender.send_replace(Readiness::Failed(reason.into()));
    }
}

pub async fn wait(mut receiver: watch::Receiver<Readiness>) -> Result<(), RecoveryError> {
    let readiness = receiver
        .wait_for(|readiness| !matches!(readiness, Readiness::Pending))
        .await
        .map_err(|_| RecoveryError::NotReady("readiness handle dropped".to_string()))?;

    match &*readiness {
        Readiness::Failed(reason) => Err(RecoveryError::NotReady(reason.clone())),
        Readiness::Pending | Readiness::Ready => Ok(()),
    }
}
