//! WebSocket transport on `tokio-tungstenite`.
//!
//! Each open channel is served by one task that owns the socket: it forwards
//! [`Outbound`] commands to the sink and socket messages to the inbound
//! queue, and reports exactly one [`ChannelEvent::Closed`] before exiting.

use std::borrow::Cow;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use super::{Channel, ChannelEvent, CloseEvent, Frame, OpenFuture, Outbound, Transport};

/// Close code reported when the peer's close frame carries no status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// [`Transport`] for `ws://` and `wss://` endpoints.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn open<'a>(&'a self, endpoint: &'a str) -> OpenFuture<'a> {
        Box::pin(async move {
            let (stream, response) = connect_async(endpoint)
                .await
                .map_err(|err| err.to_string())?;
            tracing::debug!(endpoint, status = %response.status(), "websocket handshake complete");

            let (channel, outbound_rx, events) = Channel::pair();
            tokio::spawn(serve(stream, outbound_rx, events));
            Ok(channel)
        })
    }
}

async fn serve<S>(
    stream: S,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut sink, mut source) = stream.split();
    // Set once we have sent our own close frame.
    let mut requested: Option<CloseEvent> = None;

    let closed = loop {
        tokio::select! {
            command = outbound_rx.recv(), if requested.is_none() => {
                let message = match command {
                    Some(Outbound::Binary(bytes)) => Message::Binary(bytes.to_vec()),
                    Some(Outbound::Text(text)) => Message::Text(text),
                    Some(Outbound::Close { code, reason }) => {
                        requested = Some(CloseEvent::new(code, reason.clone(), true));
                        Message::Close(Some(CloseFrame {
                            code: CloseCode::from(code),
                            reason: Cow::Owned(reason),
                        }))
                    }
                    None => {
                        // Every sender is gone; nobody is listening any more.
                        let _ = sink.close().await;
                        return;
                    }
                };
                if let Err(err) = sink.send(message).await {
                    let _ = events.send(ChannelEvent::Error(err.to_string()));
                    if let Some(event) = requested.take() {
                        break event;
                    }
                }
            }
            message = source.next() => match message {
                Some(Ok(Message::Binary(data))) => {
                    let _ = events.send(ChannelEvent::Frame(Frame::Binary(Bytes::from(data))));
                }
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(ChannelEvent::Frame(Frame::Text(text)));
                }
                Some(Ok(Message::Close(frame))) => {
                    break match (requested.take(), frame) {
                        (Some(event), _) => event,
                        (None, Some(frame)) => {
                            CloseEvent::new(u16::from(frame.code), frame.reason.into_owned(), true)
                        }
                        (None, None) => CloseEvent::new(NO_STATUS_RECEIVED, "", true),
                    };
                }
                // Pings are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    let reason = err.to_string();
                    let _ = events.send(ChannelEvent::Error(reason.clone()));
                    break requested
                        .take()
                        .unwrap_or_else(|| CloseEvent::abnormal(reason));
                }
                None => {
                    break requested.take().unwrap_or_else(|| CloseEvent::abnormal(""));
                }
            }
        }
    };

    tracing::debug!(
        code = closed.code,
        was_clean = closed.was_clean,
        "websocket closed"
    );
    let _ = events.send(ChannelEvent::Closed(closed));
}
