//! Async driver for [`GatewayCore`]
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  commands   ┌──────────────────────────────────────────┐
//! │ GatewayClient│ ──────────> │              actor task                  │
//! │   (handle)   │             │                                          │
//! │              │ <── state ──│  inbox ──> GatewayCore ──> Vec<Action>   │
//! └──────────────┘  snapshot   │    ▲                          │          │
//!                              │    │                          ▼          │
//! ┌──────────────┐   Frame     │    │              write sink / timers /  │
//! │ reader task  │ ────────────┼────┤              connect task           │
//! └──────────────┘             │    │                                     │
//! ┌──────────────┐   ticks     │    │                                     │
//! │ timer tasks  │ ────────────┼────┘                                     │
//! └──────────────┘             └──────────────────────────────────────────┘
//! ```
//!
//! Everything that can change session state arrives on one unbounded
//! channel and is handled in order by the actor, so frames, heartbeat
//! ticks and commands never interleave. Messages tagged with a stale
//! connection epoch (from a transport or timer that has since been torn
//! down) are dropped on arrival.

use crate::core::config::GatewayConfig;
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::core::frame::{Frame, OpCode};
use crate::core::gateway::{Action, DestroyOptions, GatewayCore};
use crate::core::session::Session;
use crate::core::timer::{spawn_delay, spawn_ticker, TimerHandle};
use crate::traits::error::{GatewayError, Result};
use crate::traits::notifier::EventNotifier;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Everything the actor reacts to
enum Input {
    Connect,
    Destroy(DestroyOptions),
    Send(Frame),
    HeartbeatNow,
    Shutdown,
    Opened { epoch: u64, stream: WsStream },
    ConnectFailed { epoch: u64, error: GatewayError },
    Frame { epoch: u64, frame: Frame },
    Closed { epoch: u64, code: Option<u16>, reason: String },
    TransportError { epoch: u64, error: GatewayError },
    HeartbeatTick { epoch: u64 },
    IdentifyRetry { epoch: u64 },
    ReconnectDue { epoch: u64 },
}

impl Input {
    /// Connection epoch for transport and timer messages
    fn epoch(&self) -> Option<u64> {
        match self {
            Input::Opened { epoch, .. }
            | Input::ConnectFailed { epoch, .. }
            | Input::Frame { epoch, .. }
            | Input::Closed { epoch, .. }
            | Input::TransportError { epoch, .. }
            | Input::HeartbeatTick { epoch }
            | Input::IdentifyRetry { epoch }
            | Input::ReconnectDue { epoch } => Some(*epoch),
            Input::Connect
            | Input::Destroy(_)
            | Input::Send(_)
            | Input::HeartbeatNow
            | Input::Shutdown => None,
        }
    }
}

/// Client metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub reconnect_count: u64,
    pub heartbeats_sent: u64,
    pub connection_state: ConnectionState,
}

/// State published by the actor for the handle to read
#[derive(Debug)]
struct Shared {
    state: AtomicConnectionState,
    session: RwLock<Session>,
    latency: RwLock<Option<Duration>>,
    metrics: AtomicMetrics,
}

/// Gateway session client
///
/// Owns the actor task driving one gateway connection (and its
/// reconnections). All methods are non-blocking: they enqueue a command
/// and return.
///
/// # Example
///
/// ```ignore
/// let (notifier, events) = ChannelNotifier::new();
/// let config = GatewayConfig::new(token, Intents::GUILDS | Intents::GUILD_MESSAGES);
/// let client = GatewayClient::new(config, Arc::new(notifier))?;
/// client.connect()?;
///
/// while let Ok(notification) = events.recv() {
///     println!("{:?}", notification);
/// }
/// ```
pub struct GatewayClient {
    config: Arc<GatewayConfig>,
    notifier: Arc<dyn EventNotifier>,
    shared: Arc<Shared>,
    inbox: UnboundedSender<Input>,
    task_handle: Option<JoinHandle<()>>,
}

impl GatewayClient {
    /// Create a client and spawn its actor task
    ///
    /// Must be called from within a tokio runtime. Nothing is opened until
    /// [`connect`](Self::connect) is called.
    pub fn new(config: GatewayConfig, notifier: Arc<dyn EventNotifier>) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| GatewayError::Configuration(format!("no tokio runtime: {}", e)))?;

        let config = Arc::new(config);
        let shared = Arc::new(Shared {
            state: AtomicConnectionState::new(ConnectionState::Idle),
            session: RwLock::new(Session::new()),
            latency: RwLock::new(None),
            metrics: AtomicMetrics::new(),
        });

        let (inbox, inbox_rx) = unbounded_channel();

        let actor = Actor {
            core: GatewayCore::new(Arc::clone(&config), Arc::clone(&notifier)),
            shared: Arc::clone(&shared),
            inbox: inbox.clone(),
            epoch: 0,
            sink: None,
            reader: None,
            connecting: None,
            heartbeat_timer: None,
            identify_timer: None,
            reconnect_timer: None,
        };
        let task_handle = runtime.spawn(actor.run(inbox_rx));

        Ok(Self {
            config,
            notifier,
            shared,
            inbox,
            task_handle: Some(task_handle),
        })
    }

    /// Open the gateway connection
    ///
    /// An unusable configuration (e.g. a missing token) fails here, before
    /// any socket is opened, and is also reported through `notify_error`.
    pub fn connect(&self) -> Result<()> {
        if let Err(e) = self.config.validate() {
            error!("Refusing to connect: {}", e);
            self.notifier.notify_error(&e);
            return Err(e);
        }
        self.command(Input::Connect)
    }

    /// Tear the connection down, optionally reconnecting afterwards
    pub fn destroy(&self, options: DestroyOptions) -> Result<()> {
        self.command(Input::Destroy(options))
    }

    /// Send a raw frame on the current connection
    ///
    /// Frames sent while no transport is open are dropped.
    pub fn send(&self, frame: Frame) -> Result<()> {
        self.command(Input::Send(frame))
    }

    /// Update the bot's presence (op 3)
    pub fn update_presence(&self, presence: Value) -> Result<()> {
        self.send(Frame::presence_update(presence))
    }

    /// Request guild members (op 8); members arrive as GUILD_MEMBERS_CHUNK
    pub fn request_guild_members(&self, request: Value) -> Result<()> {
        self.send(Frame::request_guild_members(request))
    }

    /// Send a heartbeat right away, without the missed-ack check
    pub fn heartbeat_now(&self) -> Result<()> {
        self.command(Input::HeartbeatNow)
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.shared.state.is_ready()
    }

    /// Snapshot of the session store
    pub fn session(&self) -> Session {
        self.shared.session.read().clone()
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        *self.shared.latency.read()
    }

    pub fn metrics(&self) -> Metrics {
        let metrics = &self.shared.metrics;
        Metrics {
            frames_sent: metrics.frames_sent(),
            frames_received: metrics.frames_received(),
            reconnect_count: metrics.reconnect_count(),
            heartbeats_sent: metrics.heartbeats_sent(),
            connection_state: self.shared.state.get(),
        }
    }

    /// Close the connection and stop the actor task
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down gateway client");

        let _ = self.inbox.send(Input::Shutdown);

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| GatewayError::ChannelSend(format!("actor task failed: {}", e)))?;
        }

        info!("Gateway client shut down");
        Ok(())
    }

    fn command(&self, input: Input) -> Result<()> {
        self.inbox
            .send(input)
            .map_err(|_| GatewayError::ChannelSend("gateway actor has stopped".to_string()))
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        // The actor keeps its own inbox sender for timers, so it would
        // never see the channel close on its own.
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// Owner of the session core, the transport halves and the timers
struct Actor {
    core: GatewayCore,
    shared: Arc<Shared>,
    inbox: UnboundedSender<Input>,
    /// Bumped on every open and close; tags transport and timer messages
    epoch: u64,
    sink: Option<WsSink>,
    reader: Option<JoinHandle<()>>,
    connecting: Option<JoinHandle<()>>,
    heartbeat_timer: Option<TimerHandle>,
    identify_timer: Option<TimerHandle>,
    reconnect_timer: Option<TimerHandle>,
}

impl Drop for Actor {
    fn drop(&mut self) {
        // Detached tasks would keep the socket half they own alive
        if let Some(task) = self.connecting.take() {
            task.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl Actor {
    async fn run(mut self, mut inbox_rx: UnboundedReceiver<Input>) {
        debug!("Gateway actor started");

        while let Some(input) = inbox_rx.recv().await {
            if let Some(epoch) = input.epoch() {
                if epoch != self.epoch {
                    trace!(epoch, current = self.epoch, "Dropping stale input");
                    continue;
                }
            }

            if matches!(input, Input::Shutdown) {
                let actions = self.core.destroy(DestroyOptions::new());
                self.perform(actions).await;
                self.publish();
                break;
            }

            let actions = self.handle(input);
            self.perform(actions).await;
            self.publish();
        }

        info!("Gateway actor exiting");
    }

    fn handle(&mut self, input: Input) -> Vec<Action> {
        match input {
            Input::Connect => self.core.connect().unwrap_or_default(),
            Input::Destroy(options) => self.core.destroy(options),
            Input::Send(frame) => self.core.send(frame),
            Input::HeartbeatNow => self.core.heartbeat(false),
            Input::Opened { epoch, stream } => {
                self.connecting = None;
                let (sink, source) = stream.split();
                self.sink = Some(sink);
                self.reader = Some(spawn_reader(epoch, source, self.inbox.clone()));
                self.core.transport_opened()
            }
            Input::ConnectFailed { error, .. } => {
                self.connecting = None;
                self.core.transport_failed(error)
            }
            Input::Frame { frame, .. } => {
                self.shared.metrics.increment_received();
                self.core.route(frame)
            }
            Input::Closed { code, reason, .. } => self.core.transport_closed(code, &reason),
            Input::TransportError { error, .. } => self.core.transport_failed(error),
            Input::HeartbeatTick { .. } => self.core.heartbeat(true),
            Input::IdentifyRetry { .. } => {
                self.identify_timer = None;
                self.core.retry_identify()
            }
            Input::ReconnectDue { .. } => {
                self.reconnect_timer = None;
                self.shared.metrics.increment_reconnects();
                self.core.connect().unwrap_or_default()
            }
            Input::Shutdown => Vec::new(),
        }
    }

    async fn perform(&mut self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();

        while let Some(action) = queue.pop_front() {
            match action {
                Action::OpenTransport { url } => self.open_transport(url),
                Action::Send(frame) => {
                    if let Err(e) = self.write(frame).await {
                        // Nothing queued after a write depends on it succeeding
                        queue = self.core.transport_failed(e).into();
                    }
                }
                Action::CloseTransport { code } => self.close_transport(code).await,
                Action::ArmHeartbeat(interval) => {
                    let epoch = self.epoch;
                    self.heartbeat_timer = Some(spawn_ticker(interval, self.inbox.clone(), move || {
                        Input::HeartbeatTick { epoch }
                    }));
                }
                Action::DisarmHeartbeat => self.heartbeat_timer = None,
                Action::ScheduleIdentify(delay) => {
                    let message = Input::IdentifyRetry { epoch: self.epoch };
                    self.identify_timer = Some(spawn_delay(delay, self.inbox.clone(), message));
                }
                Action::CancelIdentify => self.identify_timer = None,
                Action::ScheduleReconnect(delay) => {
                    let message = Input::ReconnectDue { epoch: self.epoch };
                    self.reconnect_timer = Some(spawn_delay(delay, self.inbox.clone(), message));
                }
                Action::CancelReconnect => self.reconnect_timer = None,
            }
        }
    }

    fn open_transport(&mut self, url: String) {
        self.epoch += 1;
        let epoch = self.epoch;
        let inbox = self.inbox.clone();

        self.connecting = Some(tokio::spawn(async move {
            let input = match connect_async(url.as_str()).await {
                Ok((stream, _response)) => {
                    info!("Connected to {}", url);
                    Input::Opened { epoch, stream }
                }
                Err(e) => Input::ConnectFailed {
                    epoch,
                    error: GatewayError::WebSocket(format!("failed to connect to {}: {}", url, e)),
                },
            };
            let _ = inbox.send(input);
        }));
    }

    async fn close_transport(&mut self, code: Option<u16>) {
        self.epoch += 1;

        if let Some(task) = self.connecting.take() {
            debug!("Aborting pending connect");
            task.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        let Some(mut sink) = self.sink.take() else {
            return;
        };

        match code {
            Some(code) => {
                debug!(code, "Closing transport");
                let frame = CloseFrame {
                    code: WsCloseCode::from(code),
                    reason: "".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!("Close handshake failed: {}", e);
                }
            }
            None => debug!("Dropping transport"),
        }
    }

    async fn write(&mut self, frame: Frame) -> Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            warn!(op = frame.op, "No open transport, dropping outbound frame");
            return Ok(());
        };

        let text = match frame.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!(op = frame.op, "Failed to encode frame: {}", e);
                return Ok(());
            }
        };

        sink.send(Message::Text(text))
            .await
            .map_err(|e| GatewayError::WebSocket(format!("write failed: {}", e)))?;

        self.shared.metrics.increment_sent();
        if frame.opcode() == Some(OpCode::Heartbeat) {
            self.shared.metrics.increment_heartbeats();
        }
        Ok(())
    }

    fn publish(&self) {
        self.shared.state.set(self.core.state());
        *self.shared.latency.write() = self.core.heartbeat_state().latency;

        let session = self.core.session();
        if *self.shared.session.read() != *session {
            *self.shared.session.write() = session.clone();
        }
    }
}

/// Read frames off the socket and post them to the actor
fn spawn_reader(epoch: u64, mut source: WsSource, inbox: UnboundedSender<Input>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = source.next().await {
            let input = match message {
                Ok(Message::Text(text)) => match Frame::from_json(&text) {
                    Ok(frame) => Input::Frame { epoch, frame },
                    Err(e) => {
                        warn!("Discarding inbound message: {}", e);
                        continue;
                    }
                },
                Ok(Message::Close(close)) => {
                    let (code, reason) = close
                        .map(|frame| (Some(u16::from(frame.code)), frame.reason.into_owned()))
                        .unwrap_or((None, String::new()));
                    let _ = inbox.send(Input::Closed { epoch, code, reason });
                    return;
                }
                Ok(Message::Binary(data)) => {
                    debug!(len = data.len(), "Ignoring binary message");
                    continue;
                }
                Ok(_) => continue,
                Err(e) => {
                    let _ = inbox.send(Input::TransportError {
                        epoch,
                        error: GatewayError::WebSocket(e.to_string()),
                    });
                    return;
                }
            };

            if inbox.send(input).is_err() {
                return;
            }
        }

        let _ = inbox.send(Input::Closed {
            epoch,
            code: None,
            reason: "stream ended".to_string(),
        });
    })
}
