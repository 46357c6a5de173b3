// fraud-core/src/core/rule.rs
// ============================================================================
// Module: Rule Model
// Description: Declarative rule attributes and velocity configuration (§3.4).
// Purpose: Hold the source-of-truth rule record; the compiled predicate
//          lives alongside it in runtime::condition_compiler::CompiledRule.
// Dependencies: crate::core::{ids, condition, scope}, serde
// ============================================================================

//! ## Overview
//! A [`Rule`] pairs its declarative `conditions` with metadata (action,
//! priority, scope, optional velocity config). Compilation (C2) produces a
//! `CompiledRule` that wraps a `Rule` with its compiled predicate; this
//! module only defines the declarative shape.

use serde::Deserialize;
use serde::Serialize;

use crate::core::condition::Condition;
use crate::core::ids::RuleId;
use crate::core::ids::RuleVersionId;
use crate::core::scope::RuleScope;

/// The business action a rule contributes when it matches (§3.4).
///
/// # Invariants
/// - `Review` is not itself a business decision for AUTH (§8 property 2);
///   the evaluator resolves it via [`crate::core::decision::EngineErrorCode`]-adjacent
///   configuration, not by adding a fourth AUTH decision value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Approve the transaction.
    Approve,
    /// Decline the transaction.
    Decline,
    /// Flag for manual review; not a terminal AUTH decision by default.
    Review,
}

/// Velocity (sliding-window counter) configuration attached to a rule (§4.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// Transaction field the counter key is derived from, e.g. `card_hash`.
    pub dimension: String,
    /// Sliding window width in seconds.
    pub window_seconds: u32,
    /// Count at or above which the counter is considered exceeded.
    pub threshold: u64,
}

/// A single rule within a ruleset (§3.4).
///
/// # Invariants
/// - `conditions` combine with short-circuit AND (§3.3); there is no OR at
///   the condition level in this runtime.
/// - `priority` is higher-wins: larger values are evaluated earlier among
///   rules of equal scope specificity (§4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Stable rule identifier.
    pub id: RuleId,
    /// Human-readable rule name.
    pub name: String,
    /// Action this rule contributes when matched.
    pub action: Action,
    /// Traversal priority; higher values evaluate earlier (§4.7).
    pub priority: i32,
    /// Whether this rule participates in evaluation at all.
    pub enabled: bool,
    /// Declarative conditions, ANDed together.
    pub conditions: Vec<Condition>,
    /// Optional velocity gate (§4.5, §4.7 step 5).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<VelocityConfig>,
    /// Scope narrowing this rule's applicability (§3.5).
    #[serde(default = "RuleScope::default_global")]
    pub scope: RuleScope,
    /// Identifier of this rule's specific compiled version.
    pub rule_version_id: RuleVersionId,
    /// Monotonic version counter for this rule.
    pub rule_version: u32,
}

impl RuleScope {
    /// Default scope used when an artifact omits the field: matches everything.
    #[must_use]
    pub fn default_global() -> Self {
        Self::Global
    }
}
