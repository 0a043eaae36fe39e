//! # Gatewire
//!
//! Client for a Discord-style real-time gateway: one WebSocket session with
//! heartbeating, identify/resume negotiation and automatic reconnection.
//!
//! ## Features
//!
//! - **Single-actor session core**: frames, heartbeat ticks and commands are
//!   handled strictly one at a time, with no locks around session state
//! - **Resume-first reconnects**: a stored session id and sequence are
//!   replayed after any recoverable disconnect
//! - **Close-code aware**: fatal gateway close codes stop reconnection and are
//!   surfaced as configuration errors
//! - **Pluggable notifications**: ready, named dispatch and raw frame events
//!   go through the [`EventNotifier`] trait

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use crate::core::{
    client, close_code, config, connection_state, frame, gateway, heartbeat, identify, session,
    timer,
    client::{GatewayClient, Metrics},
    close_code::{CloseCode, CloseDisposition},
    config::{GatewayConfig, Intents, ShardInfo},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
    frame::{Frame, OpCode},
    gateway::{Action, DestroyOptions, GatewayCore, ReconnectMode},
    session::{ReadyInfo, Session},
};
