//! Schema-aware connection: encode and send, receive and decode.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use prosocket_client::{ConnectionManager, Frame, Subscription};
use prosocket_core::{LoadReport, SchemaSession};
use serde_json::Value;

use crate::InspectorError;

/// Binds one [`SchemaSession`] to one [`ConnectionManager`].
///
/// The session sits behind a lock shared with decoding subscribers, so
/// schemas loaded after [`on_decoded`](Inspector::on_decoded) apply to
/// frames received later.
pub struct Inspector {
    session: Arc<RwLock<SchemaSession>>,
    connection: ConnectionManager,
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("session", &*self.session.read())
            .field("connection", &self.connection)
            .finish()
    }
}

impl Inspector {
    /// Create an inspector with an empty session.
    pub fn new(connection: ConnectionManager) -> Self {
        Self::with_session(SchemaSession::new(), connection)
    }

    pub fn with_session(session: SchemaSession, connection: ConnectionManager) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            connection,
        }
    }

    /// An inspector over a WebSocket connection with default settings.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn websocket() -> Self {
        Self::new(ConnectionManager::websocket())
    }

    /// Load schema text into the session.
    pub fn load_schema(
        &self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<LoadReport, InspectorError> {
        Ok(self.session.write().load(name, source)?)
    }

    /// Remove a schema document and the types it defined.
    pub fn remove_schema(&self, name: &str) -> bool {
        self.session.write().remove(name)
    }

    pub fn session(&self) -> RwLockReadGuard<'_, SchemaSession> {
        self.session.read()
    }

    pub fn session_mut(&self) -> RwLockWriteGuard<'_, SchemaSession> {
        self.session.write()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub async fn connect(&self, endpoint: impl Into<String>) -> Result<(), InspectorError> {
        Ok(self.connection.connect(endpoint).await?)
    }

    pub async fn disconnect(&self) -> Result<(), InspectorError> {
        Ok(self.connection.disconnect().await?)
    }

    /// Encode `value` as `type_name` and send it as a binary frame.
    ///
    /// Returns the encoded length. Nothing is sent if encoding fails.
    pub fn send_message(&self, type_name: &str, value: &Value) -> Result<usize, InspectorError> {
        let bytes = self.session.read().codec().encode(type_name, value)?;
        let len = bytes.len();
        self.connection.send_binary(bytes)?;
        tracing::debug!(type_name, len, "message sent");
        Ok(len)
    }

    /// Decode an inbound binary frame as `type_name`.
    pub fn decode_frame(&self, type_name: &str, frame: &Frame) -> Result<Value, InspectorError> {
        decode(&self.session.read(), type_name, frame)
    }

    /// Decode every inbound frame as `type_name` and pass the result to
    /// `handler`.
    pub fn on_decoded(
        &self,
        type_name: impl Into<String>,
        handler: impl Fn(Result<Value, InspectorError>) + Send + Sync + 'static,
    ) -> Subscription {
        let type_name = type_name.into();
        let session = Arc::clone(&self.session);
        self.connection.on_message(move |frame| {
            // Release the lock before user code runs.
            let decoded = decode(&session.read(), &type_name, frame);
            handler(decoded);
        })
    }

    /// Disconnect and drop every subscriber. The session is kept.
    pub async fn destroy(&self) {
        self.connection.destroy().await;
    }
}

fn decode(
    session: &SchemaSession,
    type_name: &str,
    frame: &Frame,
) -> Result<Value, InspectorError> {
    match frame {
        Frame::Binary(bytes) => Ok(session.codec().decode(type_name, bytes)?),
        Frame::Text(_) => Err(InspectorError::TextFrame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prosocket_client::{Bytes, ConnectionError};
    use prosocket_core::SchemaError;
    use serde_json::json;

    const PING: &str = r#"
        syntax = "proto3";
        package demo;
        message Ping { int64 seq = 1; string note = 2; }
    "#;

    #[tokio::test]
    async fn test_send_message_while_disconnected() {
        let inspector = Inspector::websocket();
        inspector.load_schema("ping.proto", PING).unwrap();

        assert_eq!(
            inspector.send_message("demo.Ping", &json!({ "seq": 1 })),
            Err(InspectorError::Connection(ConnectionError::NotConnected))
        );
        assert!(matches!(
            inspector.send_message("demo.Missing", &json!({})),
            Err(InspectorError::Schema(SchemaError::UnknownType(_)))
        ));
        assert!(matches!(
            inspector.send_message("demo.Ping", &json!({ "seq": true })),
            Err(InspectorError::Schema(SchemaError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_decode_frame() {
        let inspector = Inspector::websocket();
        inspector.load_schema("ping.proto", PING).unwrap();

        let bytes = inspector
            .session()
            .codec()
            .encode("demo.Ping", &json!({ "seq": "9", "note": "n" }))
            .unwrap();
        let value = inspector
            .decode_frame("demo.Ping", &Frame::Binary(Bytes::from(bytes)))
            .unwrap();
        assert_eq!(value, json!({ "seq": "9", "note": "n" }));

        assert_eq!(
            inspector.decode_frame("demo.Ping", &Frame::Text("{}".into())),
            Err(InspectorError::TextFrame)
        );
    }

    #[tokio::test]
    async fn test_remove_schema() {
        let inspector = Inspector::websocket();
        inspector.load_schema("ping.proto", PING).unwrap();
        assert!(inspector.remove_schema("ping.proto"));
        assert!(inspector.session().registry().is_empty());
        assert!(!inspector.remove_schema("ping.proto"));
    }
}
