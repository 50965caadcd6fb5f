//! The socket primitive the connection manager drives.
//!
//! A [`Transport`] opens a [`Channel`]: a pair of unbounded queues, one for
//! outbound [`Outbound`] commands and one for inbound [`ChannelEvent`]s.
//! The channel is finished once it yields [`ChannelEvent::Closed`] or its
//! inbound queue ends.

mod websocket;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::mpsc;

pub use websocket::WebSocketTransport;

/// Close code for a normal, user-initiated close.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when a channel ends without a close handshake.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Boxed future returned by [`Transport::open`].
pub type OpenFuture<'a> = Pin<Box<dyn Future<Output = Result<Channel, String>> + Send + 'a>>;

/// Opens channels to an endpoint.
pub trait Transport: Send + Sync + 'static {
    fn open<'a>(&'a self, endpoint: &'a str) -> OpenFuture<'a>;
}

/// An inbound message frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Binary(Bytes),
    Text(String),
}

impl Frame {
    /// Payload bytes; text frames yield their UTF-8 encoding.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Binary(bytes) => bytes,
            Frame::Text(text) => text.as_bytes(),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Frame::Binary(_))
    }
}

/// Commands accepted by an open channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Binary(Bytes),
    Text(String),
    Close { code: u16, reason: String },
}

/// How a channel ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseEvent {
    pub code: u16,
    pub reason: String,
    /// The close was requested through [`Outbound::Close`] or completed a
    /// close handshake the peer started with a normal code.
    pub was_clean: bool,
}

impl CloseEvent {
    pub fn new(code: u16, reason: impl Into<String>, was_clean: bool) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean,
        }
    }

    /// A close without a handshake.
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(ABNORMAL_CLOSURE, reason, false)
    }
}

impl fmt::Display for CloseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.reason)
        }
    }
}

/// Events produced by an open channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    Frame(Frame),
    Error(String),
    Closed(CloseEvent),
}

/// Both halves of an open channel.
#[derive(Debug)]
pub struct Channel {
    pub outbound: mpsc::UnboundedSender<Outbound>,
    pub inbound: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl Channel {
    /// Create a channel and the peer-side halves that feed it.
    pub fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<Outbound>,
        mpsc::UnboundedSender<ChannelEvent>,
    ) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        (Self { outbound, inbound }, outbound_rx, inbound_tx)
    }
}
