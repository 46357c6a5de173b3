// fraud-core/src/runtime/engine.rs
// ============================================================================
// Module: Engine Entry Points
// Description: `FraudEngine` wires admission control, the rule evaluator, and
//              outbox handoff into the two public entry points (§4.6, §4.9,
//              C9).
// Purpose: The only surface a CLI or transport adapter needs to call; owns
//          the required ordering: admit, evaluate, hand off, return.
// Dependencies: crate::runtime::{load_shedding, evaluator, outbox}
// ============================================================================

//! ## Overview
//! [`FraudEngine::evaluate_auth`] and [`FraudEngine::evaluate_monitoring`] are
//! the two request-facing operations (§4.9). Both: (1) check the load
//! shedding gate first and synthesize a degraded decision without touching
//! the evaluator if admission is refused (§4.6); (2) otherwise dispatch to
//! [`crate::runtime::evaluator::RuleEvaluator`]; (3) hand the resulting
//! decision to the outbox via a non-blocking enqueue (§4.8 step 9), never
//! awaiting durability before returning. MONITORING additionally validates
//! that the caller supplied a decision *before* any evaluation or outbox work
//! happens (§4.9 "fails the request with a validation error before
//! evaluation, no event emitted").

use crate::core::decision::Decision;
use crate::core::decision::DecisionOutcome;
use crate::core::decision::EngineErrorCode;
use crate::core::decision::EngineMetadata;
use crate::core::decision::EngineMode;
use crate::core::decision::EvaluationType;
use crate::core::field_registry::FieldRegistry;
use crate::core::ids::CountryCode;
use crate::core::ids::RulesetKey;
use crate::core::transaction::Transaction;
use crate::interfaces::CounterStore;
use crate::runtime::evaluator::RuleEvaluator;
use crate::runtime::evaluator::now_rfc3339;
use crate::runtime::load_shedding::LoadSheddingGate;
use crate::runtime::outbox::OutboxEnvelope;
use crate::runtime::outbox::OutboxHandle;

/// Wires the load shedding gate, the rule evaluator, and the outbox handle
/// into the engine's two public operations (§4.9, C9).
pub struct FraudEngine<S> {
    /// The evaluation algorithm both entry points dispatch to.
    evaluator: RuleEvaluator<S>,
    /// Bounded-concurrency admission gate checked before evaluation.
    gate: LoadSheddingGate,
    /// Non-blocking handoff to the outbox worker.
    outbox: OutboxHandle,
    /// Field registry used to resolve the transaction id for synthesized
    /// decisions.
    field_registry: FieldRegistry,
}

impl<S: CounterStore> FraudEngine<S> {
    /// Assembles an engine over an already-constructed evaluator, admission
    /// gate, and outbox handle.
    pub const fn new(
        evaluator: RuleEvaluator<S>,
        gate: LoadSheddingGate,
        outbox: OutboxHandle,
        field_registry: FieldRegistry,
    ) -> Self {
        Self { evaluator, gate, outbox, field_registry }
    }

    /// AUTH entry point (§4.9 `evaluateAuth`): admission-gated, first-match,
    /// returns a business decision. Never fails; admission refusal and
    /// evaluation degradation both synthesize an APPROVE decision with the
    /// appropriate `engine_mode`/`engine_error_code` rather than raising an
    /// exception (§8 property 1, property 7).
    pub async fn evaluate_auth(
        &self,
        transaction: Transaction,
        country: Option<CountryCode>,
        ruleset_key: &RulesetKey,
    ) -> Decision {
        let Some(_permit) = self.gate.try_admit() else {
            return self.load_shedding_decision(&transaction, EvaluationType::AuthFirstMatch, DecisionOutcome::Approve);
        };

        let decision = self.evaluator.evaluate_auth(&transaction, country.as_ref(), ruleset_key).await;
        self.dispatch_to_outbox(&decision, transaction, country.as_ref());
        decision
    }

    /// MONITORING entry point (§4.9 `evaluateMonitoring`): validates the
    /// caller-supplied decision before doing anything else, then admission-
    /// gates and evaluates all-match. A missing or invalid decision fails the
    /// request immediately with no evaluation performed and no event
    /// emitted (§4.9).
    ///
    /// # Errors
    ///
    /// Returns [`EngineErrorCode::MissingDecision`] when `caller_decision` is
    /// `None`. Callers that already parsed an invalid wire value for
    /// `decision` should map that parse failure to
    /// [`EngineErrorCode::InvalidDecision`] before calling this method, since
    /// by the time a `DecisionOutcome` reaches this signature it is
    /// necessarily one of the two valid variants.
    pub async fn evaluate_monitoring(
        &self,
        transaction: Transaction,
        country: Option<CountryCode>,
        ruleset_key: &RulesetKey,
        caller_decision: Option<DecisionOutcome>,
    ) -> Result<Decision, EngineErrorCode> {
        let Some(caller_decision) = caller_decision else {
            return Err(EngineErrorCode::MissingDecision);
        };

        let Some(_permit) = self.gate.try_admit() else {
            return Ok(self.load_shedding_decision(&transaction, EvaluationType::MonitoringAllMatch, caller_decision));
        };

        let decision =
            self.evaluator.evaluate_monitoring(&transaction, country.as_ref(), ruleset_key, caller_decision).await;
        self.dispatch_to_outbox(&decision, transaction, country.as_ref());
        Ok(decision)
    }

    /// Hands a decision to the outbox without blocking the request (§4.8
    /// step 9, §5 "No I/O to the downstream broker on the AUTH thread").
    /// Resolves the matched rules' velocity configs so the worker can
    /// recompute a snapshot at its own processing time (§4.8); this lookup is
    /// bounded by `matched_rules.len()`, never by the full ruleset. Enqueue
    /// failures are not surfaced here: under
    /// [`crate::runtime::outbox::BackpressurePolicy::Drop`] they are silent,
    /// and under `Reject` the caller must check the queue's saturation
    /// before evaluating if strict delivery is required. This engine always
    /// returns the already-computed decision to the caller either way (§8
    /// property 1: the request path never blocks on outbox durability).
    fn dispatch_to_outbox(&self, decision: &Decision, transaction: Transaction, country: Option<&CountryCode>) {
        let velocity_candidates = self.evaluator.velocity_candidates_for(decision, country);
        let envelope = OutboxEnvelope {
            decision: decision.clone(),
            transaction,
            field_registry: self.field_registry,
            velocity_candidates,
        };
        let _ = self.outbox.enqueue(envelope);
    }

    /// Synthesizes a degraded decision when the load shedding gate refuses
    /// admission, without touching the evaluator or the ruleset registry
    /// (§4.6 "return an immediate APPROVE... DEGRADED... LOAD_SHEDDING").
    fn load_shedding_decision(
        &self,
        transaction: &Transaction,
        evaluation_type: EvaluationType,
        decision: DecisionOutcome,
    ) -> Decision {
        let transaction_id = transaction
            .get_by_name(&self.field_registry, "transaction_id")
            .and_then(|value| value.as_str())
            .map(str::to_string)
            .unwrap_or_default();
        Decision {
            decision_id: uuid::Uuid::new_v4().to_string(),
            transaction_id,
            evaluation_type,
            decision,
            engine_mode: EngineMode::Degraded,
            engine_error_code: Some(EngineErrorCode::LoadShedding),
            message: Some("admission refused by load shedding gate".to_string()),
            ruleset_key: None,
            ruleset_version: None,
            ruleset_id: None,
            matched_rules: Vec::new(),
            velocity_results: std::collections::BTreeMap::new(),
            timestamp: now_rfc3339(),
            processing_time_ms: 0.0,
            debug_info: None,
            engine_metadata: EngineMetadata::default(),
            timing_breakdown: None,
            transaction_context: None,
            velocity_snapshot: None,
        }
    }
}
