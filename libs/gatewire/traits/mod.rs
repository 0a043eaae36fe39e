//! # Gatewire Traits
//!
//! Error type and the outward seams of the session client:
//!
//! - **GatewayError**: every failure the library can report
//! - **EventNotifier**: where ready/dispatch/raw events and fatal errors go

pub mod error;
pub mod notifier;

// Re-export commonly used types
pub use error::{GatewayError, Result};
pub use notifier::{
    event_names, ChannelNotifier, EventNotifier, GatewayEvent, NoOpNotifier, Notification,
};
