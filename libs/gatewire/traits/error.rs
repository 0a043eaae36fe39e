use thiserror::Error;

/// Main error type for gatewire
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Missing or invalid credentials / client configuration.
    /// The only kind surfaced to the application through `notify_error`.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed by the gateway or the network
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Malformed frame or payload
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The previous heartbeat was never acknowledged
    #[error("Heartbeat not acknowledged")]
    HeartbeatNotAcknowledged,

    /// The gateway rejected the session
    #[error("Session invalidated by the gateway")]
    SessionInvalidated,

    /// Channel send error (actor gone)
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// JSON encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GatewayError {
    /// Whether the error ends the client's attempts to stay connected
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::Configuration(_))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Serialization(e.to_string())
    }
}

/// Result type for gatewire operations
pub type Result<T> = std::result::Result<T, GatewayError>;
