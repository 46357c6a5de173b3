// fraud-core/src/core/decision.rs
// ============================================================================
// Module: Decision Model
// Description: Decision, velocity result, and engine-mode/error-code taxonomy.
// Purpose: The output of C7/C9 (§3.7, §3.8) and the in-band error vocabulary
//          of §7.
// Dependencies: crate::core::ids, serde, uuid
// ============================================================================

//! ## Overview
//! [`Decision`] is returned by both entry points (§4.9). `engine_error_code`
//! is a stable wire enum (§7, §10.3) distinct from any Rust `Error` type in
//! this crate: it is what a caller observes in-band, never a propagated
//! exception (§9 "exception-free hot path").

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::ids::RuleId;
use crate::core::ids::RuleVersionId;
use crate::core::ids::RulesetId;
use crate::core::ids::RulesetKey;
use crate::core::rule::Action;

/// Which evaluation mode produced a decision (§1, §4.7, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationType {
    /// Latency-critical, first-match, business decision.
    AuthFirstMatch,
    /// Analytics, all-match, caller-supplied decision.
    MonitoringAllMatch,
}

/// The business decision carried by a [`Decision`] (§3.7, §8 property 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Approve the transaction.
    Approve,
    /// Decline the transaction.
    Decline,
}

impl From<Action> for Option<DecisionOutcome> {
    fn from(action: Action) -> Self {
        match action {
            Action::Approve => Some(DecisionOutcome::Approve),
            Action::Decline => Some(DecisionOutcome::Decline),
            Action::Review => None,
        }
    }
}

/// Engine health/degradation mode attached to every decision (§3.7, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Full evaluation, no degradation.
    Normal,
    /// Evaluation completed but a dependency was degraded (e.g. velocity).
    Degraded,
    /// Evaluation could not proceed; decision was synthesized fail-open.
    FailOpen,
    /// Decision was produced by the outbox worker's replay path, not AUTH.
    Replay,
}

/// Stable wire vocabulary for in-band engine errors (§7).
///
/// # Invariants
/// - This is a `Serialize`-only wire enum; converting an internal `Error`
///   type into this is one-way (§10.3) — never parsed back into an `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineErrorCode {
    /// Counter store unreachable or timed out.
    RedisUnavailable,
    /// No active ruleset for `(country, key)`.
    RulesetNotLoaded,
    /// Unexpected evaluation failure.
    EngineException,
    /// Condition dispatch failed for a single rule; that rule was skipped.
    EvaluationError,
    /// Admission was refused by the load shedding gate.
    LoadShedding,
    /// MONITORING request is missing a caller-supplied decision.
    MissingDecision,
    /// MONITORING request carries a decision value that is not valid.
    InvalidDecision,
    /// Durability write failed under strict backpressure policy.
    OutboxUnavailable,
    /// Loader-local: manifest or artifact fetch failed. Never request-facing.
    ManifestFetchFailure,
    /// Loader-local: artifact checksum did not match the manifest.
    ChecksumMismatch,
    /// Loader-local: artifact schema version exceeds the supported ceiling.
    SchemaIncompatible,
}

/// Reason an event was produced, carried on the outbound decision event
/// schema (§6.6), distinct from the in-request `EngineErrorCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// A rule's compiled condition matched.
    RuleMatch,
    /// A rule's velocity gate matched.
    VelocityMatch,
    /// The engine declined without a specific rule match (reserved).
    SystemDecline,
    /// No rule contributed; default-allow applied.
    DefaultAllow,
}

/// One rule that contributed to a decision (§6.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRule {
    /// Identifier of the matched rule.
    pub rule_id: RuleId,
    /// Identifier of the specific compiled rule version.
    pub rule_version_id: RuleVersionId,
    /// Action the rule would contribute.
    pub action: Action,
    /// Whether the rule's compiled condition matched (prior to velocity).
    pub conditions_met: bool,
    /// Rendered condition values for audit display.
    #[serde(default)]
    pub condition_values: BTreeMap<String, String>,
}

/// Sliding-window velocity counter result (§3.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityResult {
    /// Dimension the counter is keyed on, e.g. `card_hash`.
    pub dimension: String,
    /// The transaction's value for that dimension.
    pub dimension_value: String,
    /// Current counter value after increment.
    pub count: u64,
    /// Configured threshold.
    pub threshold: u64,
    /// Configured sliding window width in seconds.
    pub window_seconds: u32,
    /// Remaining window TTL in seconds, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_remaining: Option<u32>,
}

impl VelocityResult {
    /// `exceeded` is auto-maintained as `count >= threshold` (§3.8).
    #[must_use]
    pub const fn exceeded(&self) -> bool {
        self.count >= self.threshold
    }
}

/// Per-stage timing breakdown emitted by the evaluator (§4.7 Latency
/// instrumentation).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingBreakdown {
    /// Time spent resolving the ruleset from the registry.
    pub ruleset_lookup_us: u64,
    /// Time spent computing applicable rules via scope filtering.
    pub scope_traversal_us: u64,
    /// Time spent evaluating compiled conditions.
    pub rule_evaluation_us: u64,
    /// Time spent on the batched velocity round trip.
    pub velocity_us: u64,
    /// Time spent assembling the `Decision` value.
    pub decision_build_us: u64,
    /// Time spent enqueueing to the outbox.
    pub outbox_append_us: u64,
    /// Time spent constructing per-request evaluation context.
    pub context_creation_us: u64,
    /// Time spent dispatching to the evaluator entry point.
    pub dispatch_us: u64,
    /// Time spent on final response assembly.
    pub finalization_us: u64,
}

/// Per-condition debug trace entry (§4.7 Debug mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionTrace {
    /// Rule the condition belongs to.
    pub rule_id: RuleId,
    /// Field name evaluated.
    pub field: String,
    /// Operator applied.
    pub operator: String,
    /// Expected value, rendered for display.
    pub expected: String,
    /// Actual transaction value, rendered for display.
    pub actual: String,
    /// Whether this condition matched.
    pub matched: bool,
}

/// Engine metadata attached to every decision (§3.7).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineMetadata {
    /// Total processing time in milliseconds.
    pub processing_time_ms: f64,
    /// Engine/crate version string.
    pub engine_version: String,
}

/// The full evaluation result returned by both entry points (§3.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// UUIDv4 decision identifier, generated from a fast thread-local RNG.
    pub decision_id: String,
    /// Echoes the transaction's own identifier.
    pub transaction_id: String,
    /// Which entry point produced this decision.
    pub evaluation_type: EvaluationType,
    /// The business decision.
    pub decision: DecisionOutcome,
    /// Engine health/degradation annotation.
    pub engine_mode: EngineMode,
    /// In-band error code, present whenever `engine_mode != Normal`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_error_code: Option<EngineErrorCode>,
    /// Human-readable detail for `engine_error_code`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Ruleset family key evaluated, e.g. `CARD_AUTH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruleset_key: Option<RulesetKey>,
    /// Installed ruleset version evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruleset_version: Option<u32>,
    /// Installed ruleset instance identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruleset_id: Option<RulesetId>,
    /// Rules that contributed to this decision.
    pub matched_rules: Vec<MatchedRule>,
    /// Velocity results keyed by rule id.
    pub velocity_results: BTreeMap<String, VelocityResult>,
    /// RFC 3339 timestamp the decision was produced.
    pub timestamp: String,
    /// Total processing time in milliseconds.
    pub processing_time_ms: f64,
    /// Optional per-condition debug trace (§4.7 Debug mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<Vec<ConditionTrace>>,
    /// Engine metadata (processing time, version).
    pub engine_metadata: EngineMetadata,
    /// Optional latency instrumentation breakdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_breakdown: Option<TimingBreakdown>,
    /// Opaque caller-supplied context echoed back for downstream correlation.
    /// Never populated on the AUTH hot path unless the caller provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_context: Option<serde_json::Value>,
    /// Velocity counter values captured at outbox-worker processing time
    /// (§3.7). Always `None` on the AUTH/MONITORING response; populated only
    /// by the outbox worker before publishing the decision event (§4.8).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_snapshot: Option<BTreeMap<String, VelocityResult>>,
}

#[cfg(test)]
mod tests {
    use super::DecisionOutcome;
    use crate::core::rule::Action;

    #[test]
    fn approve_and_decline_actions_map_to_decision_outcomes() {
        let approve: Option<DecisionOutcome> = Action::Approve.into();
        let decline: Option<DecisionOutcome> = Action::Decline.into();
        assert_eq!(approve, Some(DecisionOutcome::Approve));
        assert_eq!(decline, Some(DecisionOutcome::Decline));
    }

    #[test]
    fn review_action_has_no_direct_auth_decision_mapping() {
        let review: Option<DecisionOutcome> = Action::Review.into();
        assert_eq!(review, None);
    }
}
