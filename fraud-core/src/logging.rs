// fraud-core/src/logging.rs
// ============================================================================
// Module: Structured Audit Logging
// Description: Hand-rolled JSON-line audit records for decisions, loader
//              events, and outbox-worker activity (§10.2).
// Purpose: Give C5/C8 a single, dependency-light logging surface instead of
//          pulling in `tracing`/`log`.
// Dependencies: serde_json, std::io::Write, std::sync::Mutex
// ============================================================================

//! ## Overview
//! `AuditLog` wraps a `Mutex<W: Write>` and writes one `serde_json::json!`
//! line per event, flushing after every write (§10.2). Three record shapes
//! are defined: [`AuditLog::decision`] (emitted by the outbox worker after
//! durable append), [`AuditLog::loader_event`] (manifest poll outcome,
//! install, rejection), and [`AuditLog::outbox_event`] (drain batch size,
//! publish latency, pending-recovery claims).

use std::io::Write;
use std::sync::Mutex;

use serde_json::json;

use crate::core::decision::Decision;

/// Structured JSON-line audit sink (§10.2).
///
/// # Invariants
/// - One JSON object per line, newline-terminated.
/// - A poisoned writer mutex degrades to a no-op write rather than panicking;
///   audit logging must never take down the request or worker path.
pub struct AuditLog<W: Write + Send> {
    /// Underlying writer, guarded so concurrent callers interleave whole
    /// lines rather than partial writes.
    writer: Mutex<W>,
}

impl<W: Write + Send> AuditLog<W> {
    /// Creates an audit log over the given writer.
    pub const fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    /// Writes one JSON record, best-effort: failures are swallowed since
    /// audit logging is never allowed to affect the hot or worker path.
    fn write_record(&self, record: serde_json::Value) {
        let Ok(mut guard) = self.writer.lock() else { return };
        if serde_json::to_writer(&mut *guard, &record).is_ok() {
            let _ = guard.write_all(b"\n");
            let _ = guard.flush();
        }
    }

    /// Emits a decision-audit record after the outbox worker durably appends
    /// a decision (§10.2, §4.8 step 1).
    pub fn decision(&self, decision: &Decision) {
        self.write_record(json!({
            "event": "decision_audit",
            "decision_id": decision.decision_id,
            "transaction_id": decision.transaction_id,
            "evaluation_type": decision.evaluation_type,
            "decision": decision.decision,
            "engine_mode": decision.engine_mode,
            "engine_error_code": decision.engine_error_code,
            "ruleset_key": decision.ruleset_key,
            "ruleset_version": decision.ruleset_version,
            "matched_rule_count": decision.matched_rules.len(),
            "timestamp": decision.timestamp,
        }));
    }

    /// Emits a loader-event record: manifest poll outcome, install, or
    /// rejection (§10.2, C5).
    pub fn loader_event(&self, key: &str, environment: &str, outcome: &str, detail: &str) {
        self.write_record(json!({
            "event": "loader_event",
            "ruleset_key": key,
            "environment": environment,
            "outcome": outcome,
            "detail": detail,
        }));
    }

    /// Emits an outbox-worker record: drain batch size, publish latency, or
    /// pending-recovery claim count (§10.2, C8).
    pub fn outbox_event(&self, outcome: &str, count: usize, detail: &str) {
        self.write_record(json!({
            "event": "outbox_worker",
            "outcome": outcome,
            "count": count,
            "detail": detail,
        }));
    }
}
