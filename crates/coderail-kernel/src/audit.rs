//! Audit sink contract
//!
//! Where blocked-input and sanitized-output events go. The gateway owns no
//! audit storage format; any persistence lives behind this seam. The sink
//! is deliberately synchronous so it cannot block the gate's hot path on
//! I/O — implementations that persist should hand off internally.

use crate::types::Finding;

/// Receiver for gateway audit events.
pub trait AuditSink: Send + Sync {
    /// The input gate blocked a message.
    fn blocked_input(&self, finding: &Finding);

    /// The output gate transformed a response.
    fn sanitized_output(&self, finding: &Finding);
}

/// Sink that drops every event. Useful in tests and for callers that
/// disable blocked-request logging entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn blocked_input(&self, _finding: &Finding) {}
    fn sanitized_output(&self, _finding: &Finding) {}
}

// =============================================================================
// Tests
// =============================================================================
