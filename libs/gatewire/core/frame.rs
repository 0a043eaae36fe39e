//! Gateway wire format
//!
//! Every message on the socket is a JSON object `{ op, d, s, t }`.
//! Inbound frames keep the raw opcode so an unknown opcode still parses
//! and can be logged and forwarded as a raw frame.

use crate::traits::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Gateway operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Server dispatches a named event
    Dispatch = 0,
    /// Heartbeat (client → server), or heartbeat request (server → client)
    Heartbeat = 1,
    /// Start a new session
    Identify = 2,
    /// Update the client's presence
    PresenceUpdate = 3,
    /// Join/leave/move voice channels
    VoiceStateUpdate = 4,
    /// Resume a previous session
    Resume = 6,
    /// Server asks the client to reconnect and resume
    Reconnect = 7,
    /// Request offline guild members
    RequestGuildMembers = 8,
    /// Session rejected
    InvalidSession = 9,
    /// First frame after connecting, carries the heartbeat interval
    Hello = 10,
    /// Heartbeat acknowledged
    HeartbeatAck = 11,
}

impl OpCode {
    pub fn from_code(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            3 => Some(Self::PresenceUpdate),
            4 => Some(Self::VoiceStateUpdate),
            6 => Some(Self::Resume),
            7 => Some(Self::Reconnect),
            8 => Some(Self::RequestGuildMembers),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }

    pub const fn code(self) -> u64 {
        self as u64
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "Dispatch",
            Self::Heartbeat => "Heartbeat",
            Self::Identify => "Identify",
            Self::PresenceUpdate => "PresenceUpdate",
            Self::VoiceStateUpdate => "VoiceStateUpdate",
            Self::Resume => "Resume",
            Self::Reconnect => "Reconnect",
            Self::RequestGuildMembers => "RequestGuildMembers",
            Self::InvalidSession => "InvalidSession",
            Self::Hello => "Hello",
            Self::HeartbeatAck => "HeartbeatAck",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// A single gateway frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Raw operation code
    pub op: u64,
    /// Event data
    #[serde(default)]
    pub d: Value,
    /// Sequence number (dispatch frames only)
    #[serde(default)]
    pub s: Option<u64>,
    /// Event name (dispatch frames only)
    #[serde(default)]
    pub t: Option<String>,
}

impl Frame {
    /// Create a frame without sequence or event name
    pub fn new(op: u64, d: Value) -> Self {
        Self { op, d, s: None, t: None }
    }

    /// Create a dispatch frame
    pub fn dispatch(name: impl Into<String>, sequence: u64, d: Value) -> Self {
        Self {
            op: OpCode::Dispatch.code(),
            d,
            s: Some(sequence),
            t: Some(name.into()),
        }
    }

    /// Recognised opcode, if any
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_code(self.op)
    }

    /// Decode a text message
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| GatewayError::Protocol(format!("malformed frame: {}", e)))
    }

    /// Encode for the wire
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Heartbeat carrying the last seen sequence (`null` before any dispatch)
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self::new(OpCode::Heartbeat.code(), sequence.map_or(Value::Null, Value::from))
    }

    pub fn identify(payload: &IdentifyPayload) -> Result<Self> {
        Ok(Self::new(OpCode::Identify.code(), serde_json::to_value(payload)?))
    }

    pub fn resume(payload: &ResumePayload) -> Result<Self> {
        Ok(Self::new(OpCode::Resume.code(), serde_json::to_value(payload)?))
    }

    pub fn presence_update(presence: Value) -> Self {
        Self::new(OpCode::PresenceUpdate.code(), presence)
    }

    pub fn request_guild_members(request: Value) -> Self {
        Self::new(OpCode::RequestGuildMembers.code(), request)
    }
}

/// Payload of op 10 (Hello)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Client descriptors sent with Identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl ConnectionProperties {
    /// Properties describing this host and library
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: env!("CARGO_PKG_NAME").to_string(),
            device: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

/// Payload of op 2 (Identify)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: u64,
    pub large_threshold: u32,
    pub properties: ConnectionProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<Value>,
    /// `[shard_id, shard_count]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shards: Option<[u32; 2]>,
}

/// Payload of op 6 (Resume)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: Option<u64>,
}

/// Application block of the READY dispatch
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadyApplication {
    pub id: String,
}

/// Fields of the READY dispatch the session cares about
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    pub application: ReadyApplication,
    #[serde(default)]
    pub user: Value,
}
