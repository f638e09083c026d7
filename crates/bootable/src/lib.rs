//! Abstract interface for bootable services and their lifecycle states.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a bootable service.
///
/// States are only ever left forwards; see [`ServiceState::can_transition_to`].
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ServiceState {
    /// Constructed but never started.
    #[default]
    New,

    /// `start` is in progress.
    Starting,

    /// Started successfully and serving.
    Running,

    /// `shutdown` is in progress.
    Stopping,

    /// Shut down.
    Terminated,

    /// Startup or shutdown failed.
    Failed,
}

impl ServiceState {
    /// Whether moving from `self` to `next` is a legal lifecycle step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Starting)
                | (Self::Starting, Self::Running | Self::Failed)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::Terminated | Self::Failed)
        )
    }

    /// Whether the service can never change state again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Terminated => "terminated",
            Self::Failed => "failed",
        };

        f.write_str(name)
    }
}

/// Trait for bootable services.
#[async_trait]
pub trait Bootable
where
    Self: Send + Sync + 'static,
{
    /// Get the name of the bootable service.
    fn bootable_name(&self) -> &str;

    /// Start the bootable service.
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Shutdown the bootable service.
    async fn shutdown(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Wait for the bootable service to reach a terminal state.
    async fn wait(&self);

    /// Current lifecycle state.
    fn state(&self) -> ServiceState;
}
