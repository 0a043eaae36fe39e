//! Identify / resume negotiation
//!
//! Run once the gateway said Hello:
//!
//! ```text
//! session id stored? ── yes ──> Resume   {token, session_id, seq}     state → Resuming
//!        │
//!        no
//!        ▼
//! state live?        ── yes ──> Identify {token, intents, ...}        state → Identifying
//!        │
//!        no ──────────────────> RetryAfter(reidentify_delay)
//! ```

use crate::core::config::{GatewayConfig, LARGE_THRESHOLD};
use crate::core::connection_state::ConnectionState;
use crate::core::frame::{ConnectionProperties, IdentifyPayload, ResumePayload};
use crate::core::session::Session;
use std::time::Duration;

/// Decision taken on (re)connect
#[derive(Debug, Clone, PartialEq)]
pub enum Negotiation {
    Resume(ResumePayload),
    Identify(IdentifyPayload),
    /// Not live yet; try again later
    RetryAfter(Duration),
}

/// Resume when a session exists, otherwise identify if the connection is live
pub fn negotiate(config: &GatewayConfig, session: &Session, state: ConnectionState) -> Negotiation {
    if let Some(session_id) = session.session_id.as_deref().filter(|id| !id.is_empty()) {
        return Negotiation::Resume(ResumePayload {
            token: config.token.clone(),
            session_id: session_id.to_string(),
            seq: session.sequence,
        });
    }

    if !state.is_live() {
        return Negotiation::RetryAfter(config.reidentify_delay);
    }

    Negotiation::Identify(identify_payload(config))
}

/// Identify payload for this configuration
pub fn identify_payload(config: &GatewayConfig) -> IdentifyPayload {
    IdentifyPayload {
        token: config.token.clone(),
        intents: config.intents.bits(),
        large_threshold: LARGE_THRESHOLD,
        properties: ConnectionProperties::current(),
        presence: config.presence.clone(),
        shards: config
            .shard
            .filter(|shard| shard.count > 1)
            .map(|shard| [shard.id, shard.count]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Intents;
    use serde_json::json;

    fn config() -> GatewayConfig {
        GatewayConfig::new("token-abc", Intents::GUILDS | Intents::GUILD_MESSAGES)
    }

    #[test]
    fn test_stored_session_resumes() {
        let mut session = Session::new();
        session.session_id = Some("sess-1".into());
        session.sequence = Some(41);

        let outcome = negotiate(&config(), &session, ConnectionState::Connected);

        assert_eq!(
            outcome,
            Negotiation::Resume(ResumePayload {
                token: "token-abc".into(),
                session_id: "sess-1".into(),
                seq: Some(41),
            })
        );
    }

    #[test]
    fn test_resume_does_not_require_live_state() {
        let mut session = Session::new();
        session.session_id = Some("sess-1".into());
        assert!(matches!(
            negotiate(&config(), &session, ConnectionState::Open),
            Negotiation::Resume(_)
        ));
    }

    #[test]
    fn test_no_session_identifies() {
        let outcome = negotiate(&config(), &Session::new(), ConnectionState::Connected);
        match outcome {
            Negotiation::Identify(payload) => {
                assert_eq!(payload.token, "token-abc");
                assert_eq!(payload.intents, 1 | (1 << 9));
                assert_eq!(payload.large_threshold, 50);
            }
            other => panic!("expected Identify, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_session_id_identifies() {
        let mut session = Session::new();
        session.session_id = Some(String::new());
        assert!(matches!(
            negotiate(&config(), &session, ConnectionState::Ready),
            Negotiation::Identify(_)
        ));
    }

    #[test]
    fn test_identify_deferred_when_not_live() {
        let outcome = negotiate(&config(), &Session::new(), ConnectionState::Open);
        assert_eq!(outcome, Negotiation::RetryAfter(Duration::from_millis(2500)));
    }

    #[test]
    fn test_identify_payload_presence_and_shards() {
        let config = config()
            .with_presence(json!({"status": "online", "afk": false}))
            .with_shard(1, 4);
        let payload = identify_payload(&config);

        assert_eq!(payload.presence, Some(json!({"status": "online", "afk": false})));
        assert_eq!(payload.shards, Some([1, 4]));
    }

    #[test]
    fn test_single_shard_is_not_reported() {
        let payload = identify_payload(&config().with_shard(0, 1));
        assert!(payload.shards.is_none());
        assert!(payload.presence.is_none());
    }

    #[test]
    fn test_identify_payload_is_deterministic() {
        assert_eq!(identify_payload(&config()), identify_payload(&config()));
    }
}
