//! Frame router
//!
//! Every inbound frame goes through [`GatewayCore::route`] in four steps:
//!
//! 1. a present `s` moves the session sequence forward
//! 2. the opcode picks a handler (Hello, Heartbeat, Ack, Reconnect, InvalidSession)
//! 3. dispatch frames are inspected for READY / RESUMED and forwarded by name
//! 4. the frame is published as `raw`
//!
//! Unknown opcodes only get steps 1 and 4.

use super::{Action, DestroyOptions, GatewayCore, ReconnectMode};
use crate::core::connection_state::ConnectionState;
use crate::core::frame::{Frame, HelloPayload, OpCode, ReadyPayload};
use crate::traits::error::GatewayError;
use crate::traits::notifier::GatewayEvent;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const READY: &str = "READY";
const RESUMED: &str = "RESUMED";

impl GatewayCore {
    /// Process one inbound frame
    pub fn route(&mut self, frame: Frame) -> Vec<Action> {
        if self.session.observe_sequence(frame.s) {
            trace!(seq = ?frame.s, "Sequence advanced");
        }

        let actions = match frame.opcode() {
            Some(OpCode::Dispatch) => {
                self.on_dispatch(&frame);
                Vec::new()
            }
            Some(OpCode::Hello) => self.on_hello(&frame),
            Some(OpCode::Heartbeat) => {
                debug!("Gateway requested a heartbeat");
                self.heartbeat(true)
            }
            Some(OpCode::HeartbeatAck) => {
                let latency = self.heartbeat.acknowledge();
                debug!(latency = ?latency, "Heartbeat acknowledged");
                Vec::new()
            }
            Some(OpCode::Reconnect) => {
                info!("Gateway requested a reconnect");
                self.destroy(DestroyOptions::reconnect(ReconnectMode::Always))
            }
            Some(OpCode::InvalidSession) => self.on_invalid_session(&frame),
            Some(
                op @ (OpCode::Identify
                | OpCode::PresenceUpdate
                | OpCode::VoiceStateUpdate
                | OpCode::Resume
                | OpCode::RequestGuildMembers),
            ) => {
                debug!(opcode = %op, "Ignoring client-only opcode from gateway");
                Vec::new()
            }
            None => {
                debug!(op = frame.op, "Ignoring unknown opcode");
                Vec::new()
            }
        };

        self.notifier.notify(GatewayEvent::Raw(frame));
        actions
    }

    fn on_hello(&mut self, frame: &Frame) -> Vec<Action> {
        let hello: HelloPayload = match serde_json::from_value(frame.d.clone()) {
            Ok(hello) => hello,
            Err(e) => {
                warn!("{}", GatewayError::Protocol(format!("bad Hello payload: {}", e)));
                return Vec::new();
            }
        };

        if hello.heartbeat_interval == 0 {
            warn!("{}", GatewayError::Protocol("Hello with zero heartbeat interval".into()));
            return Vec::new();
        }

        let interval = Duration::from_millis(hello.heartbeat_interval);
        info!("Hello received, heartbeat interval {:?}", interval);

        self.state = ConnectionState::Connected;
        self.heartbeat.set_interval(Some(interval));

        let mut actions = vec![Action::ArmHeartbeat(interval)];
        actions.extend(self.negotiate());
        actions
    }

    fn on_invalid_session(&mut self, frame: &Frame) -> Vec<Action> {
        let resumable = frame.d.as_bool().unwrap_or(false);
        warn!(resumable, "{}, identifying from scratch", GatewayError::SessionInvalidated);

        self.session.clear();

        if !self.state.has_transport() {
            return Vec::new();
        }

        self.state = ConnectionState::Connected;
        vec![Action::ScheduleIdentify(self.config.reidentify_delay)]
    }

    fn on_dispatch(&mut self, frame: &Frame) {
        let Some(name) = frame.t.as_deref() else {
            debug!(seq = ?frame.s, "Dispatch without event name");
            return;
        };

        match name {
            READY => match serde_json::from_value::<ReadyPayload>(frame.d.clone()) {
                Ok(ready) => {
                    let info = self.session.capture_ready(&ready);
                    self.state = ConnectionState::Ready;
                    info!(
                        session_id = %info.session_id,
                        application_id = %info.application_id,
                        "Session ready"
                    );
                    self.notifier.notify(GatewayEvent::ClientReady(info));
                }
                Err(e) => {
                    warn!("{}", GatewayError::Protocol(format!("bad READY payload: {}", e)));
                }
            },
            RESUMED => {
                self.state = ConnectionState::Ready;
                info!(seq = ?self.session.sequence, "Session resumed");
                self.forward(name, frame);
            }
            _ => self.forward(name, frame),
        }
    }

    fn forward(&self, name: &str, frame: &Frame) {
        self.notifier.notify(GatewayEvent::Dispatch {
            name: name.to_string(),
            frame: frame.clone(),
        });
    }
}
