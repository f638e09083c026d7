//! The fixed set of recovery subsystems a deployment may run.

use std::fmt;
use std::sync::Arc;

use crate::{RecoveryError, RecoverySubsystem, SubsystemKind};

/// One optional slot per [`SubsystemKind`].
///
/// An empty slot means the deployment does not run that subsystem. Dispatch goes
/// through [`RecoverySubsystems::present`], which skips empty slots.
#[derive(Clone, Default)]
pub struct RecoverySubsystems {
    task: Option<Arc<dyn RecoverySubsystem>>,
    transaction: Option<Arc<dyn RecoverySubsystem>>,
    reader_group: Option<Arc<dyn RecoverySubsystem>>,
}

impl RecoverySubsystems {
    /// No subsystems configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the task slot.
    #[must_use]
    pub fn with_task(mut self, subsystem: Arc<dyn RecoverySubsystem>) -> Self {
        self.task = Some(subsystem);
        self
    }

    /// Fill the transaction slot.
    #[must_use]
    pub fn with_transaction(mut self, subsystem: Arc<dyn RecoverySubsystem>) -> Self {
        self.transaction = Some(subsystem);
        self
    }

    /// Fill the reader-group slot.
    #[must_use]
    pub fn with_reader_group(mut self, subsystem: Arc<dyn RecoverySubsystem>) -> Self {
        self.reader_group = Some(subsystem);
        self
    }

    /// The configured subsystems, in slot order.
    pub fn present(&self) -> impl Iterator<Item = (SubsystemKind, &Arc<dyn RecoverySubsystem>)> {
        [
            (SubsystemKind::Task, self.task.as_ref()),
            (SubsystemKind::Transaction, self.transaction.as_ref()),
            (SubsystemKind::ReaderGroup, self.reader_group.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, slot)| slot.map(|subsystem| (kind, subsystem)))
    }

    /// Checks that every subsystem reports the kind of the slot it sits in.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError::MisplacedSubsystem`] for the first mismatch.
    pub fn check_slots(&self) -> Result<(), RecoveryError> {
        for (slot, subsystem) in self.present() {
            let actual = subsystem.kind();
            if actual != slot {
                return Err(RecoveryError::MisplacedSubsystem { slot, actual });
            }
        }

        Ok(())
    }

    /// Number of configured subsystems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.present().count()
    }

    /// Whether no subsystem is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

impl fmt::Debug for RecoverySubsystems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.present().map(|(kind, _)| kind))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    use async_trait::async_trait;
    use vigil_cluster::NodeId;

    use crate::RecoveryError;

    struct Noop(SubsystemKind);

    #[async_trait]
    impl RecoverySubsystem for Noop {
        fn kind(&self) -> SubsystemKind {
            self.0
        }

        async fn recover_orphaned(&self, _node_id: &NodeId) -> Result<(), RecoveryError> {
            Ok(())
        }

        async fn recover_orphaned_except(
            &self,
            _live: &HashSet<NodeId>,
        ) -> Result<(), RecoveryError> {
            Ok(())
        }
    }

    #[test]
    fn test_empty_slots_are_skipped() {
        let subsystems = RecoverySubsystems::new();
        assert!(subsystems.is_empty());
        assert_eq!(subsystems.len(), 0);

        let subsystems = subsystems.with_transaction(Arc::new(Noop(SubsystemKind::Transaction)));
        let kinds: Vec<_> = subsystems.present().map(|(kind, _)| kind).collect();
        assert_eq!(kinds, vec![SubsystemKind::Transaction]);
        assert_eq!(format!("{subsystems:?}"), "[Transaction]");
    }

    #[test]
    fn test_slot_order_is_fixed() {
        let subsystems = RecoverySubsystems::new()
            .with_reader_group(Arc::new(Noop(SubsystemKind::ReaderGroup)))
            .with_task(Arc::new(Noop(SubsystemKind::Task)));

        let kinds: Vec<_> = subsystems.present().map(|(kind, _)| kind).collect();
        assert_eq!(kinds, vec![SubsystemKind::Task, SubsystemKind::ReaderGroup]);
        assert!(subsystems.check_slots().is_ok());
    }

    #[test]
    fn test_misplaced_subsystem_is_reported() {
        let subsystems = RecoverySubsystems::new()
            .with_task(Arc::new(Noop(SubsystemKind::Task)))
            .with_reader_group(Arc::new(Noop(SubsystemKind::Transaction)));

        let err = subsystems.check_slots().unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::MisplacedSubsystem {
                slot: SubsystemKind::ReaderGroup,
                actual: SubsystemKind::Transaction,
            }
        ));
        assert_eq!(
            err.to_string(),
            "transaction subsystem configured in the reader-group slot"
        );
    }

    #[tokio::test]
    async fn test_default_readiness_is_immediate() {
        let noop = Noop(SubsystemKind::Task);
        assert!(!noop.has_readiness_barrier());
        assert!(noop.await_ready().await.is_ok());
    }
}
