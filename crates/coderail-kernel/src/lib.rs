//! `coderail-kernel` — contracts and data model for the CodeRail safety gateway.
//!
//! CodeRail mediates text flowing into and out of a conversational code
//! assistant: user input is checked before it reaches a model, and model
//! output is redacted/sanitized before it reaches the user.
//!
//! This crate holds the pure data model and the pluggable contracts:
//!
//! - **Threat taxonomy**: [`ThreatCategory`], [`Finding`], [`InputVerdict`]
//! - **Policy**: [`PolicyConfig`], [`GatewaySettings`] and the versioned
//!   pattern [`catalog`]
//! - **Backend contract**: [`PolicyBackend`] — an optional external
//!   validator consulted before the built-in checks
//! - **Audit contract**: [`AuditSink`] — where blocked/sanitized events go
//!
//! Concrete detection, redaction and the gateway runtime live in
//! `coderail-gateway`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                coderail-kernel                   │
//! │  ┌────────────┐  ┌──────────────┐  ┌──────────┐  │
//! │  │ThreatCateg.│  │ PolicyConfig │  │  Policy  │  │
//! │  │  Finding   │  │   catalog    │  │  Backend │  │
//! │  └────────────┘  └──────────────┘  └──────────┘  │
//! └──────────────────────────────────────────────────┘
//!                        ▲ types + traits
//!                        │
//! ┌──────────────────────────────────────────────────┐
//! │                coderail-gateway                  │
//! │  detection actions · redaction engine · gateway  │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod audit;
pub mod backend;
pub mod catalog;
pub mod policy;
pub mod types;

// Re-export key types for convenience
pub use audit::AuditSink;
pub use backend::{BackendMessage, BackendVerdict, PolicyBackend};
pub use catalog::CATALOG_VERSION;
pub use policy::{GatewaySettings, PatternSpec, PersonaSpec, PolicyConfig};
pub use types::{
    Finding, GatewayStatus, InputVerdict, SafetyError, SafetyResult, ThreatCategory,
};
