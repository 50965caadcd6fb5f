//! Configuration for the connection manager.
//!
//! - [`ReconnectPolicy`]: Reconnect behavior with exponential backoff

mod reconnect;

pub use reconnect::{ReconnectPolicy, defaults};
