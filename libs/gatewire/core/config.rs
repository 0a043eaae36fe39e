use crate::traits::error::{GatewayError, Result};
use bitflags::bitflags;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Default gateway endpoint
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";

/// Gateway protocol version
pub const DEFAULT_API_VERSION: u8 = 10;

/// Member count above which a guild is considered large
pub const LARGE_THRESHOLD: u32 = 50;

/// Delay before reconnecting after a teardown
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Delay before identify is retried (not live yet, or session invalidated)
pub const DEFAULT_REIDENTIFY_DELAY: Duration = Duration::from_millis(2500);

bitflags! {
    /// Gateway intents
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        const GUILDS                        = 1 << 0;
        const GUILD_MEMBERS                 = 1 << 1;
        const GUILD_MODERATION              = 1 << 2;
        const GUILD_EXPRESSIONS             = 1 << 3;
        const GUILD_INTEGRATIONS            = 1 << 4;
        const GUILD_WEBHOOKS                = 1 << 5;
        const GUILD_INVITES                 = 1 << 6;
        const GUILD_VOICE_STATES            = 1 << 7;
        const GUILD_PRESENCES               = 1 << 8;
        const GUILD_MESSAGES                = 1 << 9;
        const GUILD_MESSAGE_REACTIONS       = 1 << 10;
        const GUILD_MESSAGE_TYPING          = 1 << 11;
        const DIRECT_MESSAGES               = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS      = 1 << 13;
        const DIRECT_MESSAGE_TYPING         = 1 << 14;
        const MESSAGE_CONTENT               = 1 << 15;
        const GUILD_SCHEDULED_EVENTS        = 1 << 16;
        const AUTO_MODERATION_CONFIGURATION = 1 << 20;
        const AUTO_MODERATION_EXECUTION     = 1 << 21;
    }
}

impl Intents {
    /// Parse intent names such as `GUILD_MESSAGES`
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        names.iter().try_fold(Intents::empty(), |acc, name| {
            let name = name.as_ref().trim();
            Intents::from_name(name)
                .map(|flag| acc | flag)
                .ok_or_else(|| GatewayError::Configuration(format!("unknown intent: {}", name)))
        })
    }
}

/// This connection's position in a sharded deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardInfo {
    pub id: u32,
    pub count: u32,
}

/// Configuration for a gateway session
///
/// Built with [`GatewayConfig::new`] and the `with_*` methods. The token is
/// checked by [`GatewayConfig::validate`], which `connect()` calls before any
/// socket is opened.
#[derive(Clone)]
pub struct GatewayConfig {
    pub(crate) token: String,
    pub(crate) intents: Intents,
    pub(crate) reconnect: bool,
    pub(crate) shard: Option<ShardInfo>,
    pub(crate) presence: Option<Value>,
    pub(crate) gateway_url: String,
    pub(crate) api_version: u8,
    pub(crate) reconnect_delay: Duration,
    pub(crate) reidentify_delay: Duration,
}

impl GatewayConfig {
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            token: token.into(),
            intents,
            reconnect: true,
            shard: None,
            presence: None,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            api_version: DEFAULT_API_VERSION,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            reidentify_delay: DEFAULT_REIDENTIFY_DELAY,
        }
    }

    /// Enable or disable automatic reconnection
    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_shard(mut self, id: u32, count: u32) -> Self {
        self.shard = Some(ShardInfo { id, count });
        self
    }

    /// Presence sent with Identify
    pub fn with_presence(mut self, presence: Value) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Override the gateway base URL (e.g. a local mock gateway)
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    pub fn with_api_version(mut self, version: u8) -> Self {
        self.api_version = version;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_reidentify_delay(mut self, delay: Duration) -> Self {
        self.reidentify_delay = delay;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn intents(&self) -> Intents {
        self.intents
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect
    }

    pub fn shard(&self) -> Option<ShardInfo> {
        self.shard
    }

    pub fn presence(&self) -> Option<&Value> {
        self.presence.as_ref()
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn reidentify_delay(&self) -> Duration {
        self.reidentify_delay
    }

    /// Full endpoint URL for a base gateway URL
    pub fn endpoint(&self, base: &str) -> String {
        format!(
            "{}/?v={}&encoding=json",
            base.trim_end_matches('/'),
            self.api_version
        )
    }

    /// Endpoint used for a fresh identify
    pub fn gateway_endpoint(&self) -> String {
        self.endpoint(&self.gateway_url)
    }

    /// Reject configurations no gateway would accept
    pub fn validate(&self) -> Result<()> {
        let token = self.token.trim();
        if token.is_empty() || token.chars().any(char::is_whitespace) {
            return Err(GatewayError::Configuration("Token is invalid".to_string()));
        }

        if let Some(shard) = self.shard {
            if shard.count == 0 || shard.id >= shard.count {
                return Err(GatewayError::Configuration(format!(
                    "invalid shard [{}, {}]",
                    shard.id, shard.count
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("reconnect", &self.reconnect)
            .field("shard", &self.shard)
            .field("presence", &self.presence)
            .field("gateway_url", &self.gateway_url)
            .field("api_version", &self.api_version)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("reidentify_delay", &self.reidentify_delay)
            .finish()
    }
}
