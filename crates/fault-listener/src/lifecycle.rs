//! Lifecycle state of the listener, observable through a `watch` channel.

use tokio::sync::watch;
use tracing::{debug, warn};
use vigil_bootable::ServiceState;

use crate::{Error, Result};

/// Lifecycle state shared with anyone waiting on it.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<ServiceState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ServiceState::New);
        Self { state }
    }

    pub fn current(&self) -> ServiceState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServiceState> {
        self.state.subscribe()
    }

    /// Atomically moves `from` -> `to`. Any other current state is rejected, which
    /// makes `start` and `stop` single-invocation.
    pub fn begin(
        &self,
        operation: &'static str,
        from: ServiceState,
        to: ServiceState,
    ) -> Result<()> {
        let mut observed = from;

        let moved = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                observed = *state;
                false
            }
        });

        if moved {
            debug!(%from, %to, "lifecycle transition");
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: observed,
            })
        }
    }

    pub fn advance(&self, to: ServiceState) {
        let mut from = to;

        let moved = self.state.send_if_modified(|state| {
            from = *state;
            if state.can_transition_to(to) {
                *state = to;
                true
            } else {
                false
            }
        });

        if moved {
            debug!(%from, %to, "lifecycle transition");
        } else {
            warn!(%from, %to, "ignoring illegal lifecycle transition");
        }
    }

    pub async fn wait_terminal(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives as long as `self`, so this only ends on a terminal state.
        let _ = receiver.wait_for(|state| state.is_terminal()).await;
    }
}
