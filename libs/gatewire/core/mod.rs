//! # Gatewire core
//!
//! The session core is split in two halves:
//!
//! - [`gateway::GatewayCore`]: synchronous state machine (connection manager,
//!   frame router, identify/resume negotiation, heartbeat bookkeeping)
//! - [`client::GatewayClient`]: async driver owning the WebSocket, the timers
//!   and the actor task that feeds the core one input at a time
//!
//! ## Example
//!
//! ```rust,ignore
//! use gatewire::{ChannelNotifier, GatewayClient, GatewayConfig, Intents, Notification};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> gatewire::Result<()> {
//!     let (notifier, events) = ChannelNotifier::new();
//!     let config = GatewayConfig::new(std::env::var("DISCORD_TOKEN").unwrap_or_default(), Intents::GUILDS)
//!         .with_presence(serde_json::json!({"status": "online", "afk": false}));
//!
//!     let client = GatewayClient::new(config, Arc::new(notifier))?;
//!     client.connect()?;
//!
//!     while let Ok(Notification::Event(event)) = events.recv() {
//!         println!("{}", event.name());
//!     }
//!
//!     client.shutdown().await
//! }
//! ```

pub mod client;
pub mod close_code;
pub mod config;
pub mod connection_state;
pub mod frame;
pub mod gateway;
pub mod heartbeat;
pub mod identify;
pub mod session;
pub mod timer;

// Re-export main types
pub use client::{GatewayClient, Metrics};
pub use close_code::{CloseCode, CloseDisposition};
pub use config::{GatewayConfig, Intents, ShardInfo};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use frame::{Frame, OpCode};
pub use gateway::{Action, DestroyOptions, GatewayCore, ReconnectMode};
pub use session::{ReadyInfo, Session};
