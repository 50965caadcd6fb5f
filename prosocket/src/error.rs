//! Inspector error type.

use prosocket_client::ConnectionError;
use prosocket_core::SchemaError;

/// Errors from [`Inspector`](crate::Inspector) operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InspectorError {
    /// Loading, encoding or decoding against a schema failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The connection rejected the operation.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A text frame was given where a binary message was expected.
    #[error("expected a binary frame, got text")]
    TextFrame,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_conversions() {
        let err: InspectorError = SchemaError::unknown_type("pkg.Missing").into();
        assert_eq!(err.to_string(), "message type pkg.Missing not found");

        let err: InspectorError = ConnectionError::NotConnected.into();
        assert_eq!(
            err,
            InspectorError::Connection(ConnectionError::NotConnected)
        );
    }
}
