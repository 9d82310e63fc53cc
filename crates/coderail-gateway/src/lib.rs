//! `coderail-gateway` — the CodeRail safety gateway runtime.
//!
//! Concrete implementations of the contracts in `coderail-kernel`:
//!
//! | Kernel contract | Implementation |
//! |-----------------|----------------|
//! | detection over [`PolicyConfig`](coderail_kernel::PolicyConfig) | [`detect::CompiledPolicy`] |
//! | redaction | [`redact::RedactionEngine`] |
//! | [`PolicyBackend`](coderail_kernel::PolicyBackend) | [`backend::HttpPolicyBackend`] |
//! | [`AuditSink`](coderail_kernel::AuditSink) | [`gateway::TracingAuditSink`] |
//!
//! [`gateway::SafetyGateway`] wires everything into the two gates.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use coderail_gateway::gateway::SafetyGateway;
//! use coderail_kernel::GatewaySettings;
//!
//! #[tokio::main]
//! async fn main() {
//!     let gateway = SafetyGateway::new(GatewaySettings::from_env());
//!
//!     let verdict = gateway.check_input("Help me sort a list in Rust").await;
//!     assert!(verdict.is_allowed());
//!
//!     let safe = gateway.process_output("api_key = 'sk-abc123def456ghi789jkl012mno345'");
//!     assert!(safe.contains("REDACTED"));
//! }
//! ```

pub mod backend;
pub mod detect;
pub mod gateway;
pub mod redact;

// Re-export the kernel for convenience.
pub use coderail_kernel as kernel;

pub use gateway::{
    SafetyGateway, reset_shared_gateway, shared_gateway, shared_gateway_with,
};
