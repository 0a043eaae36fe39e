//! Session state store
//!
//! Survives reconnects. Only a READY dispatch sets the session id and only
//! an explicit reset clears it.

use crate::core::frame::ReadyPayload;
use serde_json::Value;

/// Identity captured from the READY dispatch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadyInfo {
    pub session_id: String,
    pub application_id: String,
    pub user: Value,
    pub resume_url: Option<String>,
}

/// Persistent session data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub session_id: Option<String>,
    /// Highest sequence number seen so far
    pub sequence: Option<u64>,
    /// Endpoint to reconnect to when resuming
    pub resume_url: Option<String>,
    pub application_id: Option<String>,
    pub user: Option<Value>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame's sequence number if it moves the counter forward
    ///
    /// Returns true when the stored sequence changed.
    pub fn observe_sequence(&mut self, sequence: Option<u64>) -> bool {
        match (sequence, self.sequence) {
            (Some(seen), Some(current)) if seen <= current => false,
            (Some(seen), _) => {
                self.sequence = Some(seen);
                true
            }
            (None, _) => false,
        }
    }

    /// A session id is stored and non-empty
    pub fn can_resume(&self) -> bool {
        self.session_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Store the identity carried by READY
    pub fn capture_ready(&mut self, ready: &ReadyPayload) -> ReadyInfo {
        self.session_id = Some(ready.session_id.clone());
        self.resume_url = ready.resume_gateway_url.clone();
        self.application_id = Some(ready.application.id.clone());
        self.user = Some(ready.user.clone());

        ReadyInfo {
            session_id: ready.session_id.clone(),
            application_id: ready.application.id.clone(),
            user: ready.user.clone(),
            resume_url: ready.resume_gateway_url.clone(),
        }
    }

    /// Full reset: the next connection must identify from scratch
    pub fn clear(&mut self) {
        self.session_id = None;
        self.resume_url = None;
        self.sequence = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::ReadyApplication;
    use serde_json::json;

    fn ready() -> ReadyPayload {
        ReadyPayload {
            session_id: "sess-1".into(),
            resume_gateway_url: Some("wss://resume.example".into()),
            application: ReadyApplication { id: "app-1".into() },
            user: json!({"id": "42", "username": "bot"}),
        }
    }

    #[test]
    fn test_sequence_is_max_seen_in_any_order() {
        let orders: [&[u64]; 4] = [&[1, 2, 3, 4], &[4, 3, 2, 1], &[2, 9, 3, 9, 5], &[7]];

        for order in orders {
            let mut session = Session::new();
            for &s in order {
                session.observe_sequence(Some(s));
            }
            assert_eq!(session.sequence, order.iter().copied().max());
        }
    }

    #[test]
    fn test_sequence_ignores_missing_and_stale() {
        let mut session = Session::new();
        assert!(!session.observe_sequence(None));
        assert!(session.observe_sequence(Some(0)));
        assert!(session.observe_sequence(Some(5)));
        assert!(!session.observe_sequence(Some(5)));
        assert!(!session.observe_sequence(Some(3)));
        assert!(!session.observe_sequence(None));
        assert_eq!(session.sequence, Some(5));
    }

    #[test]
    fn test_capture_ready() {
        let mut session = Session::new();
        let info = session.capture_ready(&ready());

        assert_eq!(session.session_id.as_deref(), Some("sess-1"));
        assert_eq!(session.application_id.as_deref(), Some("app-1"));
        assert_eq!(session.resume_url.as_deref(), Some("wss://resume.example"));
        assert_eq!(session.user, Some(json!({"id": "42", "username": "bot"})));
        assert_eq!(info.session_id, "sess-1");
        assert_eq!(info.application_id, "app-1");
        assert!(session.can_resume());
    }

    #[test]
    fn test_empty_session_id_cannot_resume() {
        let mut session = Session::new();
        assert!(!session.can_resume());
        session.session_id = Some(String::new());
        assert!(!session.can_resume());
    }

    #[test]
    fn test_clear_resets_resume_data_only() {
        let mut session = Session::new();
        session.capture_ready(&ready());
        session.observe_sequence(Some(10));

        session.clear();

        assert!(session.session_id.is_none());
        assert!(session.resume_url.is_none());
        assert!(session.sequence.is_none());
        assert_eq!(session.application_id.as_deref(), Some("app-1"));
    }
}
