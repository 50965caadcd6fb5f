//! # prosocket
//!
//! Inspect WebSocket traffic against Protocol Buffers schemas loaded at
//! runtime.
//!
//! Load `.proto` text into a [`SchemaSession`], connect a
//! [`ConnectionManager`] to an endpoint, and translate between JSON values
//! and binary frames by message type name. No generated code is involved:
//! types are resolved from whatever schemas are loaded.
//!
//! ## Features
//!
//! - **Type registry:** nested packages and messages are flattened into fully
//!   qualified names; later documents shadow earlier ones.
//! - **Codec:** encode, decode, validate and example-payload templates for any
//!   loaded type, plus a best-effort guess of which type a `bytes` field embeds.
//! - **Resilient connection:** automatic reconnection with exponential backoff
//!   and subscriber fan-out for frames, state changes, errors and closes.
//!
//! ## Example
//!
//! ```no_run
//! use prosocket::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), InspectorError> {
//! let inspector = Inspector::websocket();
//! inspector.load_schema("chat.proto", r#"
//!     syntax = "proto3";
//!     package chat;
//!     message Say { string text = 1; }
//! "#)?;
//!
//! inspector.on_decoded("chat.Say", |decoded| match decoded {
//!     Ok(value) => println!("received {value}"),
//!     Err(err) => eprintln!("undecodable frame: {err}"),
//! });
//!
//! inspector.connect("ws://localhost:8080").await?;
//! inspector.send_message("chat.Say", &json!({ "text": "hello" }))?;
//! # Ok(())
//! # }
//! ```

mod error;
mod inspector;

pub use error::InspectorError;
pub use inspector::Inspector;

pub use prosocket_client::{
    BuildError, CloseEvent, ConnectionError, ConnectionManager, ConnectionManagerBuilder,
    ConnectionState, Frame, ReconnectPolicy, Subscription, Transport, WebSocketTransport,
};
pub use prosocket_core::{
    Codec, FieldInfo, LoadReport, SchemaDocument, SchemaError, SchemaSession, TypeDescriptor,
    TypeRegistry, Validation, WireType,
};

// Re-export several crates
pub use prosocket_client;
pub use prosocket_core;
pub use serde_json;

pub mod prelude {
    //! A prelude for `prosocket` providing the most common types.
    pub use crate::error::InspectorError;
    pub use crate::inspector::Inspector;
    pub use prosocket_client::{
        ConnectionError, ConnectionManager, ConnectionState, Frame, ReconnectPolicy,
    };
    pub use prosocket_core::{SchemaError, SchemaSession, Validation};
}
