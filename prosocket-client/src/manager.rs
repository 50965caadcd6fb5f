//! The connection manager and its driver task.
//!
//! A [`ConnectionManager`] is a handle to a driver task that owns the channel,
//! the lifecycle state machine and the reconnect timer. Lifecycle operations
//! are commands processed by the driver one at a time, interleaved with
//! events from the open channel. Sends and state queries read shared state
//! directly and never wait for the driver.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──open ok──▶ Connected
//!      ▲                        │                       │
//!      └────────open failed─────┴──────closed───────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::ReconnectPolicy;
use crate::subscribers::{Subscribers, Subscription};
use crate::transport::{
    ChannelEvent, CloseEvent, Frame, NORMAL_CLOSURE, Outbound, Transport, WebSocketTransport,
};
use crate::{ConnectionError, ConnectionManagerBuilder};

/// Reason sent with the close frame on [`ConnectionManager::disconnect`].
pub const USER_DISCONNECT_REASON: &str = "User disconnected";

/// Lifecycle state of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State read by both the handle and the driver.
#[derive(Debug)]
struct Shared {
    state: ConnectionState,
    attempts: u32,
    endpoint: Option<String>,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    destroyed: bool,
}

#[derive(Debug)]
struct Core {
    shared: Mutex<Shared>,
    messages: Subscribers<Frame>,
    states: Subscribers<ConnectionState>,
    errors: Subscribers<ConnectionError>,
    closes: Subscribers<CloseEvent>,
}

impl Core {
    fn new() -> Self {
        Self {
            shared: Mutex::new(Shared {
                state: ConnectionState::Disconnected,
                attempts: 0,
                endpoint: None,
                outbound: None,
                destroyed: false,
            }),
            messages: Subscribers::new("message"),
            states: Subscribers::new("state"),
            errors: Subscribers::new("error"),
            closes: Subscribers::new("close"),
        }
    }

    fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Change the state and notify state subscribers if it differs.
    fn transition(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut self.shared.lock().state, state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "connection state changed");
            self.states.dispatch(&state);
        }
    }

    fn report(&self, error: ConnectionError) {
        self.errors.dispatch(&error);
    }
}

enum Command {
    Connect {
        endpoint: String,
        reply: oneshot::Sender<Result<(), ConnectionError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    /// Sent by the reconnect timer.
    Reconnect,
    Destroy {
        reply: oneshot::Sender<()>,
    },
}

/// A single logical connection with automatic reconnection.
///
/// The manager must be built inside a Tokio runtime; it spawns its driver
/// task on construction. Dropping every handle stops the driver and closes
/// the channel.
///
/// # Example
///
/// ```no_run
/// use prosocket_client::{ConnectionManager, Frame, ReconnectPolicy, WebSocketTransport};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = ConnectionManager::builder(WebSocketTransport::new())
///     .reconnect_policy(ReconnectPolicy::new().max_attempts(3))
///     .build()?;
///
/// manager.on_message(|frame: &Frame| println!("{} bytes", frame.as_bytes().len()));
/// manager.connect("ws://localhost:8080").await?;
/// manager.send_binary(vec![0x08, 0x01])?;
/// manager.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager {
    core: Arc<Core>,
    commands: mpsc::UnboundedSender<Command>,
    policy: ReconnectPolicy,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.core.shared.lock();
        f.debug_struct("ConnectionManager")
            .field("state", &shared.state)
            .field("attempts", &shared.attempts)
            .field("endpoint", &shared.endpoint)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ConnectionManager {
    /// Create a builder for a manager over `transport`.
    pub fn builder(transport: impl Transport) -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new(transport)
    }

    /// A manager over [`WebSocketTransport`] with the default reconnect policy.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn websocket() -> Self {
        Self::spawn(
            Arc::new(WebSocketTransport::new()),
            ReconnectPolicy::default(),
        )
    }

    pub(crate) fn spawn(transport: Arc<dyn Transport>, policy: ReconnectPolicy) -> Self {
        let core = Arc::new(Core::new());
        let (commands, receiver) = mpsc::unbounded_channel();

        let driver = Driver {
            core: Arc::clone(&core),
            transport,
            policy: policy.clone(),
            commands: commands.downgrade(),
            inbound: None,
            timer: None,
        };
        tokio::spawn(driver.run(receiver));

        Self {
            core,
            commands,
            policy,
        }
    }

    /// Open a connection to `endpoint`.
    ///
    /// Returns immediately if already connected. A failed open is reported to
    /// error subscribers, handled as an unclean close, and returned.
    pub async fn connect(&self, endpoint: impl Into<String>) -> Result<(), ConnectionError> {
        let (reply, response) = oneshot::channel();
        self.command(Command::Connect {
            endpoint: endpoint.into(),
            reply,
        })?;
        response.await.map_err(|_| ConnectionError::Destroyed)?
    }

    /// Close the connection with code 1000 and cancel any pending reconnect.
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        let (reply, response) = oneshot::channel();
        self.command(Command::Disconnect { reply })?;
        response.await.map_err(|_| ConnectionError::Destroyed)
    }

    /// Disconnect, drop every subscriber and stop the driver.
    ///
    /// Later operations fail with [`ConnectionError::Destroyed`]. Destroying
    /// twice is a no-op.
    pub async fn destroy(&self) {
        let (reply, response) = oneshot::channel();
        if self.command(Command::Destroy { reply }).is_ok() {
            let _ = response.await;
        }
    }

    /// Send a binary frame. Fails with [`ConnectionError::NotConnected`]
    /// unless the connection is open.
    pub fn send_binary(&self, data: impl Into<Bytes>) -> Result<(), ConnectionError> {
        self.send(Outbound::Binary(data.into()))
    }

    /// Send a text frame. Fails with [`ConnectionError::NotConnected`]
    /// unless the connection is open.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ConnectionError> {
        self.send(Outbound::Text(text.into()))
    }

    fn send(&self, outbound: Outbound) -> Result<(), ConnectionError> {
        let shared = self.core.shared.lock();
        if shared.destroyed {
            return Err(ConnectionError::Destroyed);
        }
        match (&shared.outbound, shared.state) {
            (Some(channel), ConnectionState::Connected) => channel
                .send(outbound)
                .map_err(|_| ConnectionError::Channel("channel closed".into())),
            _ => Err(ConnectionError::NotConnected),
        }
    }

    /// Register a handler for inbound frames.
    pub fn on_message(&self, handler: impl Fn(&Frame) + Send + Sync + 'static) -> Subscription {
        self.core.messages.subscribe(handler)
    }

    /// Register a handler for lifecycle state changes.
    pub fn on_state_change(
        &self,
        handler: impl Fn(ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        self.core.states.subscribe(move |state| handler(*state))
    }

    /// Register a handler for transport and channel errors.
    pub fn on_error(
        &self,
        handler: impl Fn(&ConnectionError) + Send + Sync + 'static,
    ) -> Subscription {
        self.core.errors.subscribe(handler)
    }

    /// Register a handler for channel closes.
    pub fn on_close(&self, handler: impl Fn(&CloseEvent) + Send + Sync + 'static) -> Subscription {
        self.core.closes.subscribe(handler)
    }

    pub fn state(&self) -> ConnectionState {
        self.core.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Consecutive reconnect attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.core.shared.lock().attempts
    }

    /// Endpoint of the most recent connect.
    pub fn endpoint(&self) -> Option<String> {
        self.core.shared.lock().endpoint.clone()
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    fn command(&self, command: Command) -> Result<(), ConnectionError> {
        self.commands
            .send(command)
            .map_err(|_| ConnectionError::Destroyed)
    }
}

struct Driver {
    core: Arc<Core>,
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    /// Weak so that a pending timer does not keep the driver alive.
    commands: mpsc::WeakUnboundedSender<Command>,
    inbound: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    timer: Option<JoinHandle<()>>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Connect { endpoint, reply }) => {
                        self.cancel_timer();
                        let result = self.connect(endpoint).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Reconnect) => {
                        self.timer = None;
                        self.reconnect().await;
                    }
                    Some(Command::Disconnect { reply }) => {
                        self.disconnect();
                        let _ = reply.send(());
                    }
                    Some(Command::Destroy { reply }) => {
                        self.destroy();
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        self.disconnect();
                        break;
                    }
                },
                event = next_event(&mut self.inbound) => self.on_event(event),
            }
        }
        tracing::debug!("connection driver stopped");
    }

    async fn connect(&mut self, endpoint: String) -> Result<(), ConnectionError> {
        if self.core.state() == ConnectionState::Connected {
            tracing::warn!(endpoint = %endpoint, "already connected");
            return Ok(());
        }

        self.core.shared.lock().endpoint = Some(endpoint.clone());
        self.core.transition(ConnectionState::Connecting);

        match self.transport.open(&endpoint).await {
            Ok(channel) => {
                {
                    let mut shared = self.core.shared.lock();
                    shared.outbound = Some(channel.outbound);
                    shared.attempts = 0;
                }
                self.inbound = Some(channel.inbound);
                tracing::info!(endpoint = %endpoint, "connected");
                self.core.transition(ConnectionState::Connected);
                Ok(())
            }
            Err(message) => {
                tracing::warn!(endpoint = %endpoint, error = %message, "failed to connect");
                let error = ConnectionError::Transport(message.clone());
                self.core.report(error.clone());
                self.closed(CloseEvent::abnormal(message));
                Err(error)
            }
        }
    }

    async fn reconnect(&mut self) {
        let Some(endpoint) = self.core.shared.lock().endpoint.clone() else {
            return;
        };
        let attempt = self.core.shared.lock().attempts;
        tracing::debug!(endpoint = %endpoint, attempt, "reconnecting");
        if let Err(err) = self.connect(endpoint).await {
            tracing::debug!(attempt, error = %err, "reconnect failed");
        }
    }

    fn disconnect(&mut self) {
        self.cancel_timer();
        self.inbound = None;

        let channel = {
            let mut shared = self.core.shared.lock();
            shared.attempts = 0;
            shared.outbound.take()
        };
        if let Some(channel) = channel {
            let _ = channel.send(Outbound::Close {
                code: NORMAL_CLOSURE,
                reason: USER_DISCONNECT_REASON.into(),
            });
            tracing::info!("disconnected");
            self.core.transition(ConnectionState::Disconnected);
            let closed = CloseEvent::new(NORMAL_CLOSURE, USER_DISCONNECT_REASON, true);
            self.core.closes.dispatch(&closed);
        } else {
            self.core.transition(ConnectionState::Disconnected);
        }
    }

    fn destroy(&mut self) {
        self.disconnect();
        self.core.shared.lock().destroyed = true;
        self.core.messages.clear();
        self.core.states.clear();
        self.core.errors.clear();
        self.core.closes.clear();
        tracing::debug!("connection manager destroyed");
    }

    fn on_event(&mut self, event: Option<ChannelEvent>) {
        match event {
            Some(ChannelEvent::Frame(frame)) => {
                self.core.messages.dispatch(&frame);
            }
            Some(ChannelEvent::Error(message)) => {
                tracing::warn!(error = %message, "channel error");
                self.core.report(ConnectionError::Channel(message));
            }
            Some(ChannelEvent::Closed(event)) => {
                self.inbound = None;
                self.closed(event);
            }
            None => {
                self.inbound = None;
                self.closed(CloseEvent::abnormal("channel ended"));
            }
        }
    }

    /// The channel is gone, or never opened.
    fn closed(&mut self, event: CloseEvent) {
        self.core.shared.lock().outbound = None;
        tracing::info!(
            code = event.code,
            reason = %event.reason,
            was_clean = event.was_clean,
            "connection closed"
        );
        self.core.transition(ConnectionState::Disconnected);
        self.core.closes.dispatch(&event);

        if !event.was_clean {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        let attempts = {
            let mut shared = self.core.shared.lock();
            if !self.policy.can_reconnect(shared.attempts) {
                None
            } else {
                shared.attempts += 1;
                Some(shared.attempts)
            }
        };

        let Some(attempt) = attempts else {
            let attempts = self.core.shared.lock().attempts;
            tracing::warn!(attempts, "reconnect attempts exhausted");
            if self.policy.notify_exhausted {
                self.core
                    .report(ConnectionError::ReconnectExhausted { attempts });
            }
            return;
        };

        let delay = self.policy.delay_for(attempt - 1);
        tracing::info!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );

        self.cancel_timer();
        let commands = self.commands.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::Reconnect);
            }
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            tracing::debug!("pending reconnect cancelled");
        }
    }
}

async fn next_event(
    inbound: &mut Option<mpsc::UnboundedReceiver<ChannelEvent>>,
) -> Option<ChannelEvent> {
    match inbound {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}
