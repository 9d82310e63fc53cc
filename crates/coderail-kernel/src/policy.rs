//! Policy configuration
//!
//! [`PolicyConfig`] is the immutable bundle of categorized pattern lists
//! and limits that drives the gateway's built-in checks. [`GatewaySettings`]
//! is the small externally configurable subset (enable flag, length limit,
//! logging toggle, backend location); the pattern lists themselves ship in
//! the [`catalog`](crate::catalog) and are not user-editable at runtime.

use crate::catalog;
use crate::types::ThreatCategory;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One catalog entry: a named, categorized pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    /// Stable identifier, used in logs and tests (never shown to callers)
    pub name: String,
    /// Regex source text
    pub pattern: String,
    /// Category the pattern detects
    pub category: ThreatCategory,
}

/// A persona-swap jailbreak pattern. Capture group 1 is the requested
/// persona word; `allowlist` holds the roles this particular phrasing
/// exempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaSpec {
    /// Stable identifier, used in logs and tests
    pub name: String,
    /// Regex source text with one capture group for the persona word
    pub pattern: String,
    /// Persona words exempt from this pattern
    pub allowlist: Vec<String>,
}

// =============================================================================
// Gateway Settings
// =============================================================================

/// Externally configurable gateway settings, consumed as plain values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Master switch. When `false` the input gate allows everything and
    /// the output gate returns text unchanged.
    pub enabled: bool,
    /// Directory holding the optional policy backend descriptor. A missing
    /// directory or descriptor is a normal state, not an error.
    pub backend_config_dir: Option<PathBuf>,
    /// Maximum accepted input length, in characters.
    pub max_input_length: usize,
    /// Whether blocked requests are reported to the audit sink.
    pub log_blocked_requests: bool,
    /// Upper bound on a single backend consult. On expiry the gate falls
    /// through to built-in checks, identically to "backend unavailable".
    pub backend_timeout: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backend_config_dir: Some(PathBuf::from("coderail_backend")),
            max_input_length: 100_000,
            log_blocked_requests: true,
            backend_timeout: Duration::from_secs(5),
        }
    }
}

impl GatewaySettings {
    /// Build settings from `CODERAIL_*` environment variables, falling back
    /// to defaults for anything unset or unparsable.
    ///
    /// Recognized: `CODERAIL_ENABLED`, `CODERAIL_BACKEND_CONFIG`,
    /// `CODERAIL_MAX_INPUT`, `CODERAIL_LOG_BLOCKED`,
    /// `CODERAIL_BACKEND_TIMEOUT_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_flag("CODERAIL_ENABLED", defaults.enabled),
            backend_config_dir: std::env::var("CODERAIL_BACKEND_CONFIG")
                .ok()
                .map(PathBuf::from)
                .or(defaults.backend_config_dir),
            max_input_length: env_parse("CODERAIL_MAX_INPUT", defaults.max_input_length),
            log_blocked_requests: env_flag("CODERAIL_LOG_BLOCKED", defaults.log_blocked_requests),
            backend_timeout: Duration::from_millis(env_parse(
                "CODERAIL_BACKEND_TIMEOUT_MS",
                defaults.backend_timeout.as_millis() as u64,
            )),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => value.to_lowercase() == "true",
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// =============================================================================
// Policy Config
// =============================================================================

/// Immutable policy bundle held by the gateway for its lifetime.
///
/// Constructed once; replacing it requires constructing a new gateway.
/// Concurrent readers never observe partial updates because nothing
/// mutates a constructed `PolicyConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Master switch (copied into the gateway's bypass check)
    pub enabled: bool,
    /// Maximum accepted input length, in characters
    pub max_input_length: usize,
    /// Whether blocked requests are reported to the audit sink
    pub log_blocked_requests: bool,
    /// Plain jailbreak regexes
    pub jailbreak_patterns: Vec<PatternSpec>,
    /// Persona-swap regexes, each with its own allow-list
    pub persona_patterns: Vec<PersonaSpec>,
    /// Injection syntax regexes
    pub injection_patterns: Vec<PatternSpec>,
    /// Destructive command literals (substring containment)
    pub blocked_commands: Vec<String>,
    /// Sensitive path literals (substring containment, `~` = home-relative)
    pub blocked_paths: Vec<String>,
    /// Path-traversal regexes, applied to un-normalized text
    pub traversal_patterns: Vec<PatternSpec>,
    /// Secret/credential shape regexes
    pub secret_patterns: Vec<PatternSpec>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_input_length: 100_000,
            log_blocked_requests: true,
            jailbreak_patterns: catalog::jailbreak_patterns(),
            persona_patterns: catalog::persona_patterns(),
            injection_patterns: catalog::injection_patterns(),
            blocked_commands: catalog::blocked_commands(),
            blocked_paths: catalog::blocked_paths(),
            traversal_patterns: catalog::traversal_patterns(),
            secret_patterns: catalog::secret_patterns(),
        }
    }
}

impl PolicyConfig {
    /// Default catalog with the externally configurable subset taken from
    /// `settings`.
    #[must_use]
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_input_length: settings.max_input_length,
            log_blocked_requests: settings.log_blocked_requests,
            ..Self::default()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
