//! External policy backend contract
//!
//! An optional, pluggable validator consulted by the input gate before the
//! built-in checks. Absence of a backend is a normal, expected state; a
//! failing or slow backend must never fail the gate — the gateway absorbs
//! every error here and falls through to built-in checks.

use crate::types::SafetyResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The single message handed to a backend for validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendMessage {
    /// Always `"user"`: only the input gate consults the backend.
    pub role: String,
    /// The raw user input under evaluation.
    pub content: String,
}

impl BackendMessage {
    /// Wrap user input as a backend message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A backend's judgement on one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendVerdict {
    /// Whether the backend wants the message blocked.
    pub blocked: bool,
    /// Rejection message to surface when `blocked` is true.
    #[serde(default)]
    pub message: Option<String>,
}

/// External policy validator.
///
/// Called only for the input gate, never the output gate. Implementations
/// should return `Err` for transport/protocol failures; the gateway logs
/// and degrades to built-in checks, exactly once per call, without retry.
#[async_trait]
pub trait PolicyBackend: Send + Sync {
    /// Evaluate a single user message.
    async fn validate(&self, message: &BackendMessage) -> SafetyResult<BackendVerdict>;

    /// Short human-readable backend name for logs.
    fn name(&self) -> &str {
        "policy-backend"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check: the trait must stay object-safe.
    fn _assert_backend_object_safe(_: &dyn PolicyBackend) {}

    struct AlwaysAllow;

    #[async_trait]
    impl PolicyBackend for AlwaysAllow {
        async fn validate(&self, _message: &BackendMessage) -> SafetyResult<BackendVerdict> {
            Ok(BackendVerdict {
                blocked: false,
                message: None,
            })
        }
    }

    #[tokio::test]
    async fn trait_default_name_and_verdict_flow() {
        let backend = AlwaysAllow;
        assert_eq!(backend.name(), "policy-backend");
        let verdict = backend
            .validate(&BackendMessage::user("hello"))
            .await
            .unwrap();
        assert!(!verdict.blocked);
    }

    #[test]
    fn user_message_role() {
        let message = BackendMessage::user("hello");
        assert_eq!(message.role, "user");
        assert_eq!(message.content, "hello");
    }

    #[test]
    fn verdict_message_defaults_to_none() {
        let verdict: BackendVerdict = serde_json::from_str(r#"{"blocked": false}"#).unwrap();
        assert!(!verdict.blocked);
        assert!(verdict.message.is_none());

        let verdict: BackendVerdict =
            serde_json::from_str(r#"{"blocked": true, "message": "denied"}"#).unwrap();
        assert!(verdict.blocked);
        assert_eq!(verdict.message.as_deref(), Some("denied"));
    }

    #[test]
    fn message_wire_shape() {
        let json = serde_json::to_value(BackendMessage::user("do x")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "do x");
    }
}
