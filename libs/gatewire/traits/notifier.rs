//! Outward notification seam
//!
//! The session core never talks to application code directly. Everything
//! the application may observe goes through an [`EventNotifier`]:
//!
//! ```text
//! Gateway ──frame──> Router ──┬──> ClientReady      (READY dispatch, once per READY)
//!                             ├──> Dispatch{name}   (every other named event)
//!                             └──> Raw              (every frame)
//!
//! connect() with a bad token ───> notify_error(Configuration)
//! ```

use crate::core::frame::Frame;
use crate::core::session::ReadyInfo;
use crate::traits::error::GatewayError;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

/// Reserved notification names
pub mod event_names {
    /// Raised once the gateway confirmed the session with READY
    pub const CLIENT_READY: &str = "clientReady";
    /// Catch-all for every inbound frame
    pub const RAW: &str = "raw";
}

/// Lifecycle and dispatch events delivered to the application
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// Session established
    ClientReady(ReadyInfo),
    /// Named dispatch event, forwarded verbatim
    Dispatch { name: String, frame: Frame },
    /// Every inbound frame, regardless of content
    Raw(Frame),
}

impl GatewayEvent {
    /// Name the event is published under
    pub fn name(&self) -> &str {
        match self {
            GatewayEvent::ClientReady(_) => event_names::CLIENT_READY,
            GatewayEvent::Dispatch { name, .. } => name,
            GatewayEvent::Raw(_) => event_names::RAW,
        }
    }
}

/// Receiver of gateway notifications
///
/// Called from the client's actor task; implementations must not block for
/// long. Hand the event off to a channel or another thread if the work is
/// expensive.
pub trait EventNotifier: Send + Sync + 'static {
    /// Publish a lifecycle or dispatch event
    fn notify(&self, event: GatewayEvent);

    /// Publish an unrecoverable error
    fn notify_error(&self, error: &GatewayError);
}

/// Notifier that drops everything
pub struct NoOpNotifier;

impl EventNotifier for NoOpNotifier {
    fn notify(&self, _event: GatewayEvent) {}

    fn notify_error(&self, _error: &GatewayError) {}
}

/// Item carried by [`ChannelNotifier`]
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Event(GatewayEvent),
    Error(GatewayError),
}

/// Notifier backed by an unbounded crossbeam channel
///
/// The receiving side can live on any thread; sends never block.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: Sender<Notification>,
}

impl ChannelNotifier {
    /// Create the notifier together with its receiving end
    pub fn new() -> (Self, Receiver<Notification>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl EventNotifier for ChannelNotifier {
    fn notify(&self, event: GatewayEvent) {
        if self.tx.send(Notification::Event(event)).is_err() {
            debug!("Notification receiver dropped, discarding event");
        }
    }

    fn notify_error(&self, error: &GatewayError) {
        if self.tx.send(Notification::Error(error.clone())).is_err() {
            debug!("Notification receiver dropped, discarding error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_names() {
        let raw = GatewayEvent::Raw(Frame::new(11, json!(null)));
        assert_eq!(raw.name(), "raw");

        let dispatch = GatewayEvent::Dispatch {
            name: "MESSAGE_CREATE".to_string(),
            frame: Frame::new(0, json!({})),
        };
        assert_eq!(dispatch.name(), "MESSAGE_CREATE");

        let ready = GatewayEvent::ClientReady(ReadyInfo::default());
        assert_eq!(ready.name(), event_names::CLIENT_READY);
    }

    #[test]
    fn test_channel_notifier_delivers_in_order() {
        let (notifier, rx) = ChannelNotifier::new();

        notifier.notify(GatewayEvent::Raw(Frame::new(10, json!({}))));
        notifier.notify_error(&GatewayError::Configuration("Token is invalid".into()));

        assert!(matches!(rx.try_recv(), Ok(Notification::Event(GatewayEvent::Raw(_)))));
        assert_eq!(
            rx.try_recv(),
            Ok(Notification::Error(GatewayError::Configuration("Token is invalid".into())))
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_notifier_survives_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(GatewayEvent::Raw(Frame::new(11, json!(null))));
    }
}
