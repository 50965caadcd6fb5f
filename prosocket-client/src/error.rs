//! Connection error types.
//!
//! This module provides [`ConnectionError`], the error type for connection
//! manager operations and the payload delivered to error subscribers.

/// Connection manager error variants.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// A send was attempted while the connection is not open.
    #[error("not connected")]
    NotConnected,

    /// The channel could not be opened (refused, bad endpoint, handshake failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// An error reported by an open channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// Automatic reconnection gave up.
    #[error("reconnect attempts exhausted after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// The manager was destroyed.
    #[error("connection manager destroyed")]
    Destroyed,
}

impl ConnectionError {
    /// Get the error message, if the variant carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            ConnectionError::Transport(msg) | ConnectionError::Channel(msg) => Some(msg),
            _ => None,
        }
    }

    /// Whether a later reconnect could clear this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectionError::Transport(_) | ConnectionError::Channel(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        assert_eq!(ConnectionError::NotConnected.to_string(), "not connected");
        assert_eq!(
            ConnectionError::Transport("connection refused".into()).to_string(),
            "transport error: connection refused"
        );
        assert_eq!(
            ConnectionError::ReconnectExhausted { attempts: 5 }.to_string(),
            "reconnect attempts exhausted after 5 attempts"
        );
    }

    #[test]
    fn test_connection_error_message() {
        assert_eq!(
            ConnectionError::Channel("reset".into()).message(),
            Some("reset")
        );
        assert_eq!(ConnectionError::Destroyed.message(), None);
    }

    #[test]
    fn test_connection_error_is_transient() {
        assert!(ConnectionError::Transport("refused".into()).is_transient());
        assert!(ConnectionError::Channel("reset".into()).is_transient());
        assert!(!ConnectionError::NotConnected.is_transient());
        assert!(!ConnectionError::Destroyed.is_transient());
        assert!(!ConnectionError::ReconnectExhausted { attempts: 5 }.is_transient());
    }
}
