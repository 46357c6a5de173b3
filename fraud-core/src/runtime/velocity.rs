// fraud-core/src/runtime/velocity.rs
// ============================================================================
// Module: Velocity Engine
// Description: Batched sliding-window counter checks against the counter
//              store, producing per-rule velocity results (§4.5, C6).
// Purpose: Let C7 gate a batch of candidate rules' velocity configs in one
//          round trip and degrade gracefully when the counter store is down.
// Dependencies: crate::core, crate::interfaces, tri-logic
// ============================================================================

//! ## Overview
//! [`VelocityEngine::evaluate`] takes every candidate rule carrying a
//! [`crate::core::rule::VelocityConfig`], builds one [`CounterProbe`] per
//! rule, and issues a single batched [`CounterStore::check_and_increment`]
//! call (§4.5 "N counters cost one round-trip"). On success, each rule gets a
//! [`VelocityResult`]; [`TriState::True`]/`False` track `exceeded`, and a
//! store failure yields [`TriState::Unknown`] for every rule in the batch —
//! the evaluator (§4.7 step 5) treats `Unknown` rules as non-contributing and
//! marks the evaluation `DEGRADED`.

use std::time::Duration;

use tri_logic::TriState;

use crate::core::decision::VelocityResult;
use crate::core::ids::RuleId;
use crate::core::rule::VelocityConfig;
use crate::core::transaction::FieldValue;
use crate::core::transaction::Transaction;
use crate::interfaces::CounterProbe;
use crate::interfaces::CounterStore;
use crate::interfaces::CounterStoreError;

/// One rule's velocity outcome: the computed result plus a tri-state
/// `exceeded` signal (`Unknown` when the counter store was unavailable).
#[derive(Debug, Clone)]
pub struct VelocityOutcome {
    /// The velocity result to attach to the decision, if the store replied.
    pub result: Option<VelocityResult>,
    /// Whether the rule's velocity gate is satisfied; `Unknown` on failure.
    pub exceeded: TriState,
}

/// Velocity engine: batches counter checks for candidate rules (§4.5, C6).
pub struct VelocityEngine<S> {
    store: S,
    /// Bounded timeout budget for the counter-store round trip (§4.5 "never
    /// block AUTH beyond a bounded timeout budget").
    timeout: Duration,
}

impl<S: CounterStore> VelocityEngine<S> {
    /// Creates a velocity engine over the given counter store.
    pub const fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Evaluates velocity for every `(rule_id, config)` whose rule matched
    /// its compiled condition, keyed by rule id for the decision's
    /// `velocity_results` map (§3.7, §4.7 step 5).
    ///
    /// On counter-store failure or timeout, every rule in the batch gets
    /// [`TriState::Unknown`] and no [`VelocityResult`] (§4.5 "return an empty
    /// map and signal a DEGRADED mode").
    pub async fn evaluate(
        &self,
        transaction: &Transaction,
        candidates: &[(RuleId, &VelocityConfig)],
        registry: &crate::core::field_registry::FieldRegistry,
    ) -> std::collections::BTreeMap<String, VelocityOutcome> {
        let mut outcomes = std::collections::BTreeMap::new();
        if candidates.is_empty() {
            return outcomes;
        }

        let mut probes = Vec::with_capacity(candidates.len());
        let mut dimension_values = Vec::with_capacity(candidates.len());
        for (rule_id, config) in candidates {
            let value = dimension_value(transaction, registry, &config.dimension);
            let key = format!("velocity:{rule_id}:{value}");
            probes.push(CounterProbe { key, window_seconds: config.window_seconds });
            dimension_values.push(value);
        }

        let outcome =
            tokio::time::timeout(self.timeout, self.store.check_and_increment(&probes)).await;

        match outcome {
            Ok(Ok(counter_outcomes)) if counter_outcomes.len() == candidates.len() => {
                for (((rule_id, config), counter), dimension_value) in
                    candidates.iter().zip(counter_outcomes).zip(dimension_values)
                {
                    let result = VelocityResult {
                        dimension: config.dimension.clone(),
                        dimension_value,
                        count: counter.count,
                        threshold: config.threshold,
                        window_seconds: config.window_seconds,
                        ttl_remaining: counter.ttl_remaining,
                    };
                    let exceeded = TriState::from(result.exceeded());
                    outcomes.insert(rule_id.as_str().to_string(), VelocityOutcome { result: Some(result), exceeded });
                }
            }
            // Store unreachable, timed out, or returned a malformed batch:
            // degrade every candidate to Unknown rather than guessing (§4.5).
            Ok(Ok(_)) | Ok(Err(CounterStoreError::Unavailable(_))) | Err(_) => {
                for (rule_id, _) in candidates {
                    outcomes
                        .insert(rule_id.as_str().to_string(), VelocityOutcome { result: None, exceeded: TriState::Unknown });
                }
            }
        }
        outcomes
    }
}

/// Resolves the transaction's value for a velocity dimension field name,
/// rendered to a string for use in the counter key (§4.5).
fn dimension_value(
    transaction: &Transaction,
    registry: &crate::core::field_registry::FieldRegistry,
    dimension: &str,
) -> String {
    match transaction.get_by_name(registry, dimension) {
        Some(FieldValue::Str(value)) => value.clone(),
        Some(FieldValue::Int(value)) => value.to_string(),
        Some(FieldValue::Float(value)) => value.to_string(),
        Some(FieldValue::Bool(value)) => value.to_string(),
        Some(FieldValue::Null) | None => "unknown".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test-only panic-based assertions are permitted")]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::VelocityEngine;
    use crate::core::field_registry::FieldRegistry;
    use crate::core::ids::RuleId;
    use crate::core::rule::VelocityConfig;
    use crate::core::transaction::Transaction;
    use crate::interfaces::CounterOutcome;
    use crate::interfaces::CounterProbe;
    use crate::interfaces::CounterStore;
    use crate::interfaces::CounterStoreError;

    struct FixedStore {
        counts: Vec<u64>,
    }

    #[async_trait]
    impl CounterStore for FixedStore {
        async fn check_and_increment(
            &self,
            probes: &[CounterProbe],
        ) -> Result<Vec<CounterOutcome>, CounterStoreError> {
            Ok(probes
                .iter()
                .zip(&self.counts)
                .map(|(_, count)| CounterOutcome { count: *count, ttl_remaining: Some(60) })
                .collect())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl CounterStore for FailingStore {
        async fn check_and_increment(
            &self,
            _probes: &[CounterProbe],
        ) -> Result<Vec<CounterOutcome>, CounterStoreError> {
            Err(CounterStoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn s5_velocity_gate_exceeds_threshold_at_count_equal_to_threshold() {
        let registry = FieldRegistry::new();
        let mut tx = Transaction::new(&registry);
        tx.set_field(registry.resolve("card_hash"), "abc123");
        let engine = VelocityEngine::new(FixedStore { counts: vec![3] }, Duration::from_millis(5));
        let config = VelocityConfig { dimension: "card_hash".to_string(), window_seconds: 60, threshold: 3 };
        let candidates = vec![(RuleId::new("r1"), &config)];
        let outcomes = engine.evaluate(&tx, &candidates, &registry).await;
        let outcome = outcomes.get("r1").unwrap();
        assert!(outcome.exceeded.is_true());
        assert_eq!(outcome.result.as_ref().unwrap().count, 3);
    }

    #[tokio::test]
    async fn store_failure_degrades_every_candidate_to_unknown() {
        let registry = FieldRegistry::new();
        let tx = Transaction::new(&registry);
        let engine = VelocityEngine::new(FailingStore, Duration::from_millis(5));
        let config = VelocityConfig { dimension: "card_hash".to_string(), window_seconds: 60, threshold: 3 };
        let candidates = vec![(RuleId::new("r1"), &config)];
        let outcomes = engine.evaluate(&tx, &candidates, &registry).await;
        let outcome = outcomes.get("r1").unwrap();
        assert!(outcome.exceeded.is_unknown());
        assert!(outcome.result.is_none());
    }

    #[tokio::test]
    async fn empty_candidate_list_issues_no_probes() {
        let registry = FieldRegistry::new();
        let tx = Transaction::new(&registry);
        let engine = VelocityEngine::new(FixedStore { counts: vec![] }, Duration::from_millis(5));
        let outcomes = engine.evaluate(&tx, &[], &registry).await;
        assert!(outcomes.is_empty());
    }
}
