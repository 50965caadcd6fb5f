//! Reconnecting WebSocket connection manager.
//!
//! This crate manages one logical connection to a WebSocket endpoint: it
//! tracks the connection lifecycle, reconnects with exponential backoff after
//! unclean closes, and fans inbound frames, state changes, errors and closes
//! out to subscribers. It knows nothing about message schemas; payloads are
//! plain bytes or text.
//!
//! ## Example
//!
//! ```no_run
//! use prosocket_client::{ConnectionManager, ConnectionState, Frame};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConnectionManager::websocket();
//!
//! manager.on_state_change(|state| {
//!     if state == ConnectionState::Connected {
//!         println!("connected");
//!     }
//! });
//! let subscription = manager.on_message(|frame: &Frame| match frame {
//!     Frame::Binary(bytes) => println!("binary frame, {} bytes", bytes.len()),
//!     Frame::Text(text) => println!("text frame: {text}"),
//! });
//!
//! manager.connect("ws://localhost:8080").await?;
//! manager.send_text("hello")?;
//!
//! subscription.unsubscribe();
//! manager.destroy().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Reconnection
//!
//! A close that did not complete a close handshake (code 1006, or a failed
//! open) schedules a reconnect to the last endpoint after
//! `min(base_delay * multiplier^attempt, max_delay)`. With the default
//! [`ReconnectPolicy`] the delays are 1s, 2s, 4s, 8s and 16s, after which the
//! manager stays disconnected. [`ConnectionManager::disconnect`] cancels any
//! pending reconnect.

mod builder;
pub mod config;
mod error;
mod manager;
mod subscribers;
pub mod transport;

pub use builder::{BuildError, ConnectionManagerBuilder};
pub use config::{ReconnectPolicy, defaults};
pub use error::ConnectionError;
pub use manager::{ConnectionManager, ConnectionState, USER_DISCONNECT_REASON};
pub use subscribers::Subscription;
pub use transport::{
    Channel, ChannelEvent, CloseEvent, Frame, Outbound, Transport, WebSocketTransport,
};

pub use bytes::Bytes;
