//! Gateway session core
//!
//! `GatewayCore` is the whole session state machine with no I/O in it.
//! Every operation mutates the session/connection/heartbeat state and
//! returns the [`Action`]s the driver (`core::client`) must perform:
//!
//! ```text
//!  inputs                               GatewayCore                  actions
//!  ──────                               ───────────                  ───────
//!  connect()              ─┐                                    ┌─> OpenTransport{url}
//!  transport_opened()      │      ┌───────────────────────┐     ├─> Send(frame)
//!  route(frame)            ├────> │ Session               │ ──> ├─> Arm/DisarmHeartbeat
//!  heartbeat(check)        │      │ ConnectionState       │     ├─> Schedule/CancelIdentify
//!  retry_identify()        │      │ HeartbeatState        │     ├─> Schedule/CancelReconnect
//!  transport_closed/failed │      └───────────────────────┘     └─> CloseTransport{code}
//!  destroy(options)       ─┘
//! ```
//!
//! The driver feeds inputs one at a time from a single channel, so the
//! core never needs a lock.

mod router;

use crate::core::close_code::{self, CloseCode, CloseDisposition};
use crate::core::config::GatewayConfig;
use crate::core::connection_state::ConnectionState;
use crate::core::frame::Frame;
use crate::core::heartbeat::{BeatOutcome, HeartbeatState};
use crate::core::identify::{self, Negotiation};
use crate::core::session::Session;
use crate::traits::error::{GatewayError, Result};
use crate::traits::notifier::EventNotifier;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Close code that ends the session on the gateway side
pub const NORMAL_CLOSE: u16 = 1000;

/// Close code that keeps the session resumable
pub const RESUMABLE_CLOSE: u16 = 4000;

/// Side effect requested by the core
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Open a new transport to `url`
    OpenTransport { url: String },
    /// Write a frame to the open transport
    Send(Frame),
    /// Close the transport with `code`, or drop it when `None`
    CloseTransport { code: Option<u16> },
    /// (Re)arm the heartbeat ticker
    ArmHeartbeat(Duration),
    DisarmHeartbeat,
    /// Run `retry_identify()` after the delay
    ScheduleIdentify(Duration),
    CancelIdentify,
    /// Run `connect()` after the delay
    ScheduleReconnect(Duration),
    CancelReconnect,
}

/// Whether a teardown is followed by a new connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectMode {
    /// Stay disconnected
    #[default]
    Never,
    /// Reconnect regardless of configuration
    Always,
    /// Reconnect only if the configuration enables it
    Auto,
}

/// Options for [`GatewayCore::destroy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DestroyOptions {
    pub reconnect: ReconnectMode,
    /// Delay before reconnecting; `None` uses the configured reconnect delay
    pub delay: Option<Duration>,
    /// Drop the session so the next connection identifies from scratch
    pub clear_session: bool,
}

impl DestroyOptions {
    /// Tear down and stay down
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconnect(mode: ReconnectMode) -> Self {
        Self {
            reconnect: mode,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn clear_session(mut self) -> Self {
        self.clear_session = true;
        self
    }
}

/// The gateway session state machine
pub struct GatewayCore {
    config: Arc<GatewayConfig>,
    notifier: Arc<dyn EventNotifier>,
    session: Session,
    state: ConnectionState,
    heartbeat: HeartbeatState,
    /// Handshake completed and not yet torn down
    transport_open: bool,
}

impl GatewayCore {
    pub fn new(config: Arc<GatewayConfig>, notifier: Arc<dyn EventNotifier>) -> Self {
        Self {
            config,
            notifier,
            session: Session::new(),
            state: ConnectionState::Idle,
            heartbeat: HeartbeatState::new(),
            transport_open: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn heartbeat_state(&self) -> &HeartbeatState {
        &self.heartbeat
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Start a new connection attempt
    ///
    /// Fails fast, without opening anything, when the configuration is
    /// unusable; the error is also surfaced through `notify_error`.
    pub fn connect(&mut self) -> Result<Vec<Action>> {
        if let Err(e) = self.config.validate() {
            error!("Refusing to connect: {}", e);
            self.notifier.notify_error(&e);
            return Err(e);
        }

        if self.state == ConnectionState::Connecting || self.state.has_transport() {
            debug!(state = %self.state, "Connect requested while already connecting/connected");
            return Ok(Vec::new());
        }

        let mut actions = Vec::new();
        if self.state == ConnectionState::Reconnecting {
            actions.push(Action::CancelReconnect);
        }

        let url = match self.session.resume_url.as_deref() {
            Some(resume_url) if self.session.can_resume() => self.config.endpoint(resume_url),
            _ => self.config.gateway_endpoint(),
        };

        self.heartbeat.reset();
        self.state = ConnectionState::Connecting;
        info!("Connecting to {}", url);
        actions.push(Action::OpenTransport { url });
        Ok(actions)
    }

    /// The transport handshake completed
    pub fn transport_opened(&mut self) -> Vec<Action> {
        if self.state != ConnectionState::Connecting {
            warn!(state = %self.state, "Transport opened in unexpected state, closing it");
            return vec![Action::CloseTransport {
                code: Some(NORMAL_CLOSE),
            }];
        }

        self.transport_open = true;
        self.state = ConnectionState::Open;
        debug!("Transport open, waiting for Hello");
        Vec::new()
    }

    /// The gateway or the network closed the transport
    pub fn transport_closed(&mut self, code: Option<u16>, reason: &str) -> Vec<Action> {
        self.transport_open = false;

        if !self.expects_transport() {
            debug!(state = %self.state, "Ignoring close of a torn-down transport");
            return Vec::new();
        }

        match close_code::classify(code) {
            CloseDisposition::Fatal => {
                let description = code
                    .and_then(CloseCode::from_u16)
                    .map_or("unknown", CloseCode::description);
                let err = GatewayError::Configuration(format!(
                    "gateway closed the connection: {} ({})",
                    description,
                    code.unwrap_or_default()
                ));
                error!("{}", err);
                self.notifier.notify_error(&err);
                self.destroy(DestroyOptions::new())
            }
            CloseDisposition::Reidentify => {
                warn!(code = ?code, reason, "Gateway closed the session, reconnecting with a fresh identify");
                self.destroy(DestroyOptions::reconnect(ReconnectMode::Auto).clear_session())
            }
            CloseDisposition::Resume => {
                let err = GatewayError::ConnectionClosed(format!("code {:?}: {}", code, reason));
                warn!("{}", err);
                self.destroy(DestroyOptions::reconnect(ReconnectMode::Auto))
            }
        }
    }

    /// The transport failed (connect error or socket error)
    pub fn transport_failed(&mut self, err: GatewayError) -> Vec<Action> {
        self.transport_open = false;

        if !self.expects_transport() {
            debug!(error = %err, "Ignoring failure of a torn-down transport");
            return Vec::new();
        }

        error!("Transport failure: {}", err);
        self.destroy(DestroyOptions::reconnect(ReconnectMode::Auto))
    }

    /// Evaluate a heartbeat (timer tick, gateway request or manual)
    pub fn heartbeat(&mut self, require_ack_check: bool) -> Vec<Action> {
        match self
            .heartbeat
            .beat(self.state, self.session.sequence, require_ack_check)
        {
            BeatOutcome::Skipped => {
                debug!(state = %self.state, "Heartbeat skipped, connection not live");
                Vec::new()
            }
            BeatOutcome::Send(frame) => {
                debug!(seq = ?self.session.sequence, "Sending heartbeat");
                vec![Action::Send(frame)]
            }
            BeatOutcome::AckMissed => {
                let err = GatewayError::HeartbeatNotAcknowledged;
                warn!("{}, tearing down the connection", err);
                self.destroy(DestroyOptions::reconnect(ReconnectMode::Auto))
            }
        }
    }

    /// Deferred identify fired
    pub fn retry_identify(&mut self) -> Vec<Action> {
        if self.state == ConnectionState::Ready || !self.state.has_transport() {
            debug!(state = %self.state, "Discarding identify retry");
            return Vec::new();
        }
        self.negotiate()
    }

    /// Queue an application frame (presence update, member request, ...)
    pub fn send(&mut self, frame: Frame) -> Vec<Action> {
        if !self.transport_open {
            warn!(op = frame.op, "No open transport, dropping outbound frame");
            return Vec::new();
        }
        vec![Action::Send(frame)]
    }

    /// Tear down the current connection
    ///
    /// Cancels every timer, closes (or drops) the transport, resets
    /// heartbeat state and leaves the connection `Disconnected`, or
    /// `Reconnecting` when a reconnect gets scheduled.
    pub fn destroy(&mut self, options: DestroyOptions) -> Vec<Action> {
        let reconnect = match options.reconnect {
            ReconnectMode::Never => false,
            ReconnectMode::Always => true,
            ReconnectMode::Auto => self.config.reconnect,
        };

        let close_code = match (self.transport_open, reconnect && !options.clear_session) {
            (false, _) => None,
            (true, true) => Some(RESUMABLE_CLOSE),
            (true, false) => Some(NORMAL_CLOSE),
        };

        let mut actions = vec![
            Action::DisarmHeartbeat,
            Action::CancelIdentify,
            Action::CancelReconnect,
            Action::CloseTransport { code: close_code },
        ];

        self.transport_open = false;
        self.heartbeat.reset();
        self.state = ConnectionState::Disconnected;

        if options.clear_session {
            debug!("Clearing session");
            self.session.clear();
        }

        if reconnect {
            let delay = options.delay.unwrap_or(self.config.reconnect_delay);
            info!("Reconnecting in {:?}", delay);
            self.state = ConnectionState::Reconnecting;
            actions.push(Action::ScheduleReconnect(delay));
        } else {
            info!("Connection destroyed");
        }

        actions
    }

    fn expects_transport(&self) -> bool {
        self.state == ConnectionState::Connecting || self.state.has_transport()
    }

    /// Resume or identify, per `identify::negotiate`
    fn negotiate(&mut self) -> Vec<Action> {
        let negotiation = identify::negotiate(&self.config, &self.session, self.state);

        let frame = match negotiation {
            Negotiation::Resume(payload) => {
                info!(session_id = %payload.session_id, seq = ?payload.seq, "Resuming session");
                self.state = ConnectionState::Resuming;
                Frame::resume(&payload)
            }
            Negotiation::Identify(payload) => {
                info!(shards = ?payload.shards, "Identifying");
                self.state = ConnectionState::Identifying;
                Frame::identify(&payload)
            }
            Negotiation::RetryAfter(delay) => {
                debug!(state = %self.state, "Not live yet, retrying identify in {:?}", delay);
                return vec![Action::ScheduleIdentify(delay)];
            }
        };

        match frame {
            Ok(frame) => vec![Action::Send(frame)],
            Err(e) => {
                error!("Failed to encode handshake: {}", e);
                Vec::new()
            }
        }
    }
}
