//! Safety gateway core types
//!
//! Defines the threat taxonomy, detection findings, gate verdicts and the
//! error type used across the CodeRail safety layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Threat Taxonomy
// =============================================================================

/// Categories of threats the gateway detects.
///
/// Input-gate categories block a message; output-gate categories trigger a
/// transform. [`ThreatCategory::DangerousCode`] is advisory only and is
/// never used by either gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ThreatCategory {
    /// Jailbreak phrasing ("ignore previous instructions", persona swaps)
    Jailbreak,
    /// Destructive command literals or shell injection syntax
    Injection,
    /// Sensitive path access or path traversal syntax
    PathTraversal,
    /// Input longer than the configured maximum
    LengthViolation,
    /// NUL byte embedded in the input
    ControlCharacter,
    /// Excessive non-alphanumeric ratio (obfuscated/encoded payload)
    ObfuscationRatio,
    /// Model output echoing a destructive command
    BlockedCommandOutput,
    /// Secret or credential shape in the text
    SecretLeak,
    /// Risky construct in generated code (advisory)
    DangerousCode,
}

impl ThreatCategory {
    /// The fixed, user-visible rejection message for this category.
    ///
    /// Deliberately category-level: the raw pattern that matched is never
    /// shown to the caller, so detection heuristics stay opaque to an
    /// adversarial user.
    #[must_use]
    pub fn rejection_message(&self) -> &'static str {
        match self {
            Self::Jailbreak => {
                "I cannot help with that request. I'm designed to assist with \
                 legitimate coding tasks only."
            }
            Self::Injection => {
                "Potentially dangerous command detected. Please rephrase your \
                 request without destructive operations."
            }
            Self::PathTraversal => {
                "Cannot access system directories or sensitive paths. Please \
                 specify a safe working directory."
            }
            Self::LengthViolation | Self::ControlCharacter | Self::ObfuscationRatio => {
                "Input validation failed. Please check your request and try again."
            }
            Self::BlockedCommandOutput => "Destructive command removed from output.",
            Self::SecretLeak => "Sensitive data redacted from output.",
            Self::DangerousCode => "Generated code contains risky constructs.",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jailbreak => write!(f, "jailbreak"),
            Self::Injection => write!(f, "injection"),
            Self::PathTraversal => write!(f, "path_traversal"),
            Self::LengthViolation => write!(f, "length_violation"),
            Self::ControlCharacter => write!(f, "control_character"),
            Self::ObfuscationRatio => write!(f, "obfuscation_ratio"),
            Self::BlockedCommandOutput => write!(f, "blocked_command_output"),
            Self::SecretLeak => write!(f, "secret_leak"),
            Self::DangerousCode => write!(f, "dangerous_code"),
        }
    }
}

// =============================================================================
// Findings
// =============================================================================

/// Result of one detection action firing.
///
/// Findings are ephemeral: produced per call, handed to the audit sink,
/// never persisted by this subsystem. `matched` names the pattern that
/// fired (for logs), `message` is the fixed category-level text shown to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Category of the detected threat
    pub category: ThreatCategory,
    /// Name of the catalog pattern (or literal) that fired
    pub matched: String,
    /// Fixed, user-visible rejection reason
    pub message: String,
}

impl Finding {
    /// Build a finding for `category`, recording which pattern fired.
    #[must_use]
    pub fn new(category: ThreatCategory, matched: impl Into<String>) -> Self {
        Self {
            category,
            matched: matched.into(),
            message: category.rejection_message().to_string(),
        }
    }
}

// =============================================================================
// Input Gate Verdict
// =============================================================================

/// Verdict from the input gate.
///
/// A rejection is a value, never an error: callers branch on the verdict
/// and surface `reason` to the user when blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum InputVerdict {
    /// Input may be forwarded to the model
    Allow,
    /// Input must not be forwarded
    Block {
        /// Fixed, category-level (or backend-supplied) rejection reason
        reason: String,
    },
}

impl InputVerdict {
    /// Returns `true` if the input passed all checks.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// The rejection reason, when blocked.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Block { reason } => Some(reason),
        }
    }
}

// =============================================================================
// Gateway Status
// =============================================================================

/// Read-only snapshot of the gateway, computed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatus {
    /// Whether the gateway is active at all
    pub enabled: bool,
    /// Whether an external backend location is configured
    pub backend_configured: bool,
    /// Whether the external backend initialized successfully
    pub backend_initialized: bool,
    /// Version of the compiled-in pattern catalog
    pub catalog_version: String,
    /// Jailbreak patterns that compiled (plain + persona)
    pub jailbreak_patterns: usize,
    /// Injection patterns that compiled
    pub injection_patterns: usize,
    /// Blocked command literals
    pub blocked_commands: usize,
    /// Blocked path literals
    pub blocked_paths: usize,
    /// Secret patterns that compiled
    pub secret_patterns: usize,
}

// =============================================================================
// Errors
// =============================================================================

/// Errors from the safety layer.
///
/// Note the narrow scope: input rejection and output transformation are
/// verdicts/strings, not errors. Errors only model configuration problems
/// and backend failures — and backend failures are absorbed by the gate's
/// fall-through, never propagated to callers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SafetyError {
    /// A configuration artifact was malformed or unreadable
    #[error("invalid gateway configuration: {0}")]
    Configuration(String),

    /// The external policy backend failed
    #[error("policy backend error: {0}")]
    Backend(String),
}

/// Result type alias for safety operations.
pub type SafetyResult<T> = Result<T, SafetyError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_display() {
        assert_eq!(ThreatCategory::Jailbreak.to_string(), "jailbreak");
        assert_eq!(ThreatCategory::Injection.to_string(), "injection");
        assert_eq!(ThreatCategory::PathTraversal.to_string(), "path_traversal");
        assert_eq!(ThreatCategory::SecretLeak.to_string(), "secret_leak");
        assert_eq!(ThreatCategory::DangerousCode.to_string(), "dangerous_code");
    }

    #[test]
    fn rejection_messages_are_category_level() {
        // The three general-safety categories share the generic message.
        let generic = ThreatCategory::LengthViolation.rejection_message();
        assert_eq!(ThreatCategory::ControlCharacter.rejection_message(), generic);
        assert_eq!(ThreatCategory::ObfuscationRatio.rejection_message(), generic);

        // No message leaks the pattern syntax.
        for category in [
            ThreatCategory::Jailbreak,
            ThreatCategory::Injection,
            ThreatCategory::PathTraversal,
        ] {
            let msg = category.rejection_message();
            assert!(!msg.contains("regex"));
            assert!(!msg.contains('\\'));
        }
    }

    #[test]
    fn finding_carries_fixed_message() {
        let finding = Finding::new(ThreatCategory::Jailbreak, "ignore-instructions");
        assert_eq!(finding.category, ThreatCategory::Jailbreak);
        assert_eq!(finding.matched, "ignore-instructions");
        assert_eq!(
            finding.message,
            ThreatCategory::Jailbreak.rejection_message()
        );
    }

    #[test]
    fn verdict_helpers() {
        assert!(InputVerdict::Allow.is_allowed());
        assert!(InputVerdict::Allow.reason().is_none());

        let blocked = InputVerdict::Block {
            reason: "nope".into(),
        };
        assert!(!blocked.is_allowed());
        assert_eq!(blocked.reason(), Some("nope"));
    }

    #[test]
    fn status_serde_roundtrip() {
        let status = GatewayStatus {
            enabled: true,
            backend_configured: false,
            backend_initialized: false,
            catalog_version: "2026.08".into(),
            jailbreak_patterns: 18,
            injection_patterns: 8,
            blocked_commands: 25,
            blocked_paths: 24,
            secret_patterns: 22,
        };
        let json = serde_json::to_string(&status).unwrap();
        let parsed: GatewayStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn error_display() {
        let err = SafetyError::Backend("connection refused".into());
        assert_eq!(err.to_string(), "policy backend error: connection refused");

        let err = SafetyError::Configuration("bad descriptor".into());
        assert_eq!(
            err.to_string(),
            "invalid gateway configuration: bad descriptor"
        );
    }

    #[test]
    fn category_serde_roundtrip() {
        let categories = vec![ThreatCategory::Jailbreak, ThreatCategory::SecretLeak];
        let json = serde_json::to_string(&categories).unwrap();
        let parsed: Vec<ThreatCategory> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, categories);
    }
}
