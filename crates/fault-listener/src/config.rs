use std::time::Duration;

use tokio::runtime::Handle;

/// Default time `stop` waits for the membership consumer to exit.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the fault listener
#[derive(Clone, Debug)]
pub struct FaultListenerConfig {
    /// Upper bound on each subsystem readiness barrier. `None` waits forever, so a
    /// hung subsystem stalls startup.
    pub readiness_timeout: Option<Duration>,

    /// How long `stop` waits for the membership consumer task to exit
    pub shutdown_timeout: Duration,

    /// Runtime that membership events and sweeps are executed on. Defaults to the
    /// runtime `start` is called from.
    pub runtime: Option<Handle>,
}

impl Default for FaultListenerConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            runtime: None,
        }
    }
}

impl FaultListenerConfig {
    /// Bound every readiness barrier by `timeout`
    #[must_use]
    pub const fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = Some(timeout);
        self
    }

    /// Set the consumer shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Run event handling and sweeps on `runtime`
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}
