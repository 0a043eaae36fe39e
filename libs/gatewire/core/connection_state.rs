use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle state of a gateway connection
///
/// ```text
/// Idle → Connecting → Open → Connected (Hello) → Identifying | Resuming → Ready
///            ↑                                                             │
///       Reconnecting ←──────────────── Disconnected ←── error/close/destroy┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Identifying = 3,
    Resuming = 4,
    Connected = 5,
    Ready = 6,
    Disconnected = 7,
    Reconnecting = 8,
}

impl ConnectionState {
    /// Heartbeats are only sent and answered in live states
    #[inline]
    pub const fn is_live(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Ready)
    }

    #[inline]
    pub const fn is_connecting(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Reconnecting)
    }

    /// A transport is (or is about to be) open
    #[inline]
    pub const fn has_transport(self) -> bool {
        matches!(
            self,
            ConnectionState::Open
                | ConnectionState::Identifying
                | ConnectionState::Resuming
                | ConnectionState::Connected
                | ConnectionState::Ready
        )
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Idle,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Identifying,
            4 => ConnectionState::Resuming,
            5 => ConnectionState::Connected,
            6 => ConnectionState::Ready,
            8 => ConnectionState::Reconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Connection state shared between the actor task and client handles
#[derive(Debug)]
pub struct AtomicConnectionState {
    state: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.get().is_live()
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.get() == ConnectionState::Ready
    }
}

/// Frame and reconnect counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    reconnect_count: AtomicU64,
    heartbeats_sent: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_heartbeats(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    pub fn heartbeats_sent(&self) -> u64 {
        self.heartbeats_sent.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const ALL: [ConnectionState; 9] = [
        ConnectionState::Idle,
        ConnectionState::Connecting,
        ConnectionState::Open,
        ConnectionState::Identifying,
        ConnectionState::Resuming,
        ConnectionState::Connected,
        ConnectionState::Ready,
        ConnectionState::Disconnected,
        ConnectionState::Reconnecting,
    ];

    #[test]
    fn test_only_connected_and_ready_are_live() {
        let live: Vec<_> = ALL.iter().copied().filter(|s| s.is_live()).collect();
        assert_eq!(live, vec![ConnectionState::Connected, ConnectionState::Ready]);
    }

    #[test]
    fn test_atomic_state_round_trips_every_value() {
        let state = AtomicConnectionState::new(ConnectionState::Idle);
        for value in ALL {
            state.set(value);
            assert_eq!(state.get(), value);
        }
    }

    #[test]
    fn test_concurrent_metrics() {
        let metrics = Arc::new(AtomicMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.increment_received();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.frames_received(), 4000);
    }
}
