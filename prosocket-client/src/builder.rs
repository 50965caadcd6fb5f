//! Builder for [`ConnectionManager`].

use std::fmt;
use std::sync::Arc;

use crate::config::ReconnectPolicy;
use crate::manager::ConnectionManager;
use crate::transport::Transport;

/// Builder for creating a [`ConnectionManager`].
///
/// # Example
///
/// ```
/// use prosocket_client::{ConnectionManager, ReconnectPolicy, WebSocketTransport};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let manager = ConnectionManager::builder(WebSocketTransport::new())
///     .reconnect_policy(ReconnectPolicy::new().max_delay(Duration::from_secs(5)))
///     .build()
///     .unwrap();
/// assert!(!manager.is_connected());
/// # }
/// ```
pub struct ConnectionManagerBuilder {
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
}

impl fmt::Debug for ConnectionManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManagerBuilder")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ConnectionManagerBuilder {
    pub fn new(transport: impl Transport) -> Self {
        Self {
            transport: Arc::new(transport),
            policy: ReconnectPolicy::default(),
        }
    }

    /// Set the reconnect policy. Defaults to [`ReconnectPolicy::default`].
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Disable automatic reconnection.
    pub fn no_reconnect(self) -> Self {
        self.reconnect_policy(ReconnectPolicy::no_reconnect())
    }

    /// Build the manager and spawn its driver task.
    ///
    /// # Errors
    ///
    /// Returns an error if the reconnect policy is invalid or if no Tokio
    /// runtime is running.
    pub fn build(self) -> Result<ConnectionManager, BuildError> {
        self.policy.validate().map_err(BuildError::InvalidPolicy)?;
        tokio::runtime::Handle::try_current().map_err(|_| BuildError::NoRuntime)?;
        Ok(ConnectionManager::spawn(self.transport, self.policy))
    }
}

/// Error building a [`ConnectionManager`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// The reconnect policy failed validation.
    #[error("invalid reconnect policy: {0}")]
    InvalidPolicy(&'static str),

    /// The driver task needs a Tokio runtime.
    #[error("no Tokio runtime is running")]
    NoRuntime,
}
