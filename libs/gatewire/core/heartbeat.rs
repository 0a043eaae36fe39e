//! Heartbeat bookkeeping
//!
//! # Flow
//!
//! ```text
//! Hello{heartbeat_interval} ──> set_interval(Some) ──> ticker (core::timer)
//!                                                        │ every interval
//!                                                        ▼
//!                              beat(require_ack_check = true)
//!                                ├─ state not live        → Skipped
//!                                ├─ previous ack missing  → AckMissed (tear down, resume)
//!                                └─ otherwise             → Send {op: 1, d: seq}, ack pending
//!
//! HeartbeatAck (op 11) ──> acknowledge() → ack cleared, latency recorded
//! ```
//!
//! The state itself is plain data owned by the session core; the ticker only
//! posts messages to the actor, so ticks and inbound frames are evaluated one
//! at a time.

use crate::core::connection_state::ConnectionState;
use crate::core::frame::Frame;
use std::time::{Duration, Instant};

/// Result of evaluating a heartbeat tick
#[derive(Debug, Clone, PartialEq)]
pub enum BeatOutcome {
    /// Not live; nothing sent
    Skipped,
    /// Send this heartbeat frame
    Send(Frame),
    /// The previous heartbeat was never acknowledged
    AckMissed,
}

/// Heartbeat state of one connection
#[derive(Debug, Clone, Default)]
pub struct HeartbeatState {
    /// Armed interval, `None` when disarmed
    pub interval: Option<Duration>,
    pub last_sent_at: Option<Instant>,
    pub last_ack_at: Option<Instant>,
    pub ack_pending: bool,
    /// Round trip of the last acknowledged heartbeat
    pub latency: Option<Duration>,
}

impl HeartbeatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (`Some`) or disarm (`None`) the periodic heartbeat
    ///
    /// Returns true when the interval actually changed.
    pub fn set_interval(&mut self, interval: Option<Duration>) -> bool {
        let changed = self.interval != interval;
        self.interval = interval;
        changed
    }

    /// Evaluate one heartbeat
    pub fn beat(
        &mut self,
        state: ConnectionState,
        sequence: Option<u64>,
        require_ack_check: bool,
    ) -> BeatOutcome {
        if !state.is_live() {
            return BeatOutcome::Skipped;
        }

        if require_ack_check && self.ack_pending {
            return BeatOutcome::AckMissed;
        }

        self.last_sent_at = Some(Instant::now());
        self.ack_pending = true;
        BeatOutcome::Send(Frame::heartbeat(sequence))
    }

    /// Record a heartbeat ack, returning the measured latency
    pub fn acknowledge(&mut self) -> Option<Duration> {
        let now = Instant::now();
        self.ack_pending = false;
        self.last_ack_at = Some(now);
        self.latency = self.last_sent_at.map(|sent| now.saturating_duration_since(sent));
        self.latency
    }

    /// Forget everything; used on teardown
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::OpCode;
    use serde_json::json;

    #[test]
    fn test_skipped_when_not_live() {
        let mut hb = HeartbeatState::new();
        for state in [
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Identifying,
            ConnectionState::Resuming,
            ConnectionState::Disconnected,
            ConnectionState::Reconnecting,
        ] {
            assert_eq!(hb.beat(state, Some(1), true), BeatOutcome::Skipped);
        }
        assert!(!hb.ack_pending);
        assert!(hb.last_sent_at.is_none());
    }

    #[test]
    fn test_send_marks_ack_pending() {
        let mut hb = HeartbeatState::new();
        let outcome = hb.beat(ConnectionState::Ready, Some(5), true);

        match outcome {
            BeatOutcome::Send(frame) => {
                assert_eq!(frame.opcode(), Some(OpCode::Heartbeat));
                assert_eq!(frame.d, json!(5));
            }
            other => panic!("expected Send, got {:?}", other),
        }
        assert!(hb.ack_pending);
        assert!(hb.last_sent_at.is_some());
    }

    #[test]
    fn test_missed_ack_detected_on_next_checked_beat() {
        let mut hb = HeartbeatState::new();
        assert!(matches!(hb.beat(ConnectionState::Connected, None, true), BeatOutcome::Send(_)));
        assert_eq!(hb.beat(ConnectionState::Connected, None, true), BeatOutcome::AckMissed);
    }

    #[test]
    fn test_unchecked_beat_sends_even_with_pending_ack() {
        let mut hb = HeartbeatState::new();
        hb.beat(ConnectionState::Ready, None, true);
        assert!(matches!(hb.beat(ConnectionState::Ready, None, false), BeatOutcome::Send(_)));
        assert!(hb.ack_pending);
    }

    #[test]
    fn test_ack_clears_pending_and_records_latency() {
        let mut hb = HeartbeatState::new();
        hb.beat(ConnectionState::Ready, Some(1), true);

        let latency = hb.acknowledge();

        assert!(!hb.ack_pending);
        assert!(latency.is_some());
        assert_eq!(hb.latency, latency);
        assert!(matches!(hb.beat(ConnectionState::Ready, Some(2), true), BeatOutcome::Send(_)));
    }

    #[test]
    fn test_set_interval_and_reset() {
        let mut hb = HeartbeatState::new();
        assert!(hb.set_interval(Some(Duration::from_millis(45_000))));
        assert!(!hb.set_interval(Some(Duration::from_millis(45_000))));
        hb.beat(ConnectionState::Ready, None, true);

        hb.reset();

        assert!(hb.interval.is_none());
        assert!(!hb.ack_pending);
        assert!(hb.last_sent_at.is_none());
    }
}
