// fraud-core/src/runtime/evaluator.rs
// ============================================================================
// Module: Rule Evaluator
// Description: Orchestrates scope selection, traversal, condition dispatch,
//              velocity checks, and decision assembly (§4.7, C7 — the core).
// Purpose: The single canonical evaluation path both entry points (C9) call
//          into; never throws across its own boundary (§8 property 1).
// Dependencies: crate::core, crate::runtime::{registry, ruleset, velocity}
// ============================================================================

//! ## Overview
//! [`RuleEvaluator::evaluate`] implements §4.7 steps 1-8: resolve the
//! ruleset, compute applicable rules in traversal order, dispatch compiled
//! conditions, batch velocity checks for matched rules, and assemble a
//! [`Decision`]. AUTH short-circuits on the first contributing rule;
//! MONITORING collects every contributing rule and carries the caller's
//! decision (§4.7 steps 6-7, §8 properties 2-3). Outbox handoff (step 9) and
//! admission control (C10) are the entry points' (C9) concern, not this
//! module's.

use std::collections::BTreeMap;
use std::time::Instant;

use uuid::Uuid;

use crate::core::decision::ConditionTrace;
use crate::core::decision::Decision;
use crate::core::decision::DecisionOutcome;
use crate::core::decision::EngineErrorCode;
use crate::core::decision::EngineMetadata;
use crate::core::decision::EngineMode;
use crate::core::decision::EvaluationType;
use crate::core::decision::MatchedRule;
use crate::core::decision::TimingBreakdown;
use crate::core::field_registry::FieldRegistry;
use crate::core::ids::CountryCode;
use crate::core::ids::RuleId;
use crate::core::ids::RulesetKey;
use crate::core::rule::Action;
use crate::core::rule::VelocityConfig;
use crate::core::transaction::Transaction;
use crate::interfaces::CounterStore;
use crate::runtime::registry::RulesetRegistry;
use crate::runtime::ruleset::CompiledRule;
use crate::runtime::velocity::VelocityEngine;

/// Evaluator-wide tunables named as "configuration-dependent" by §9's open
/// questions and §4.7's debug-mode parameters.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Whether a matched `REVIEW`-action rule maps to an AUTH `DECLINE`
    /// rather than being treated as non-contributing (§9 open question 1,
    /// resolved default `false` — see `DESIGN.md`).
    pub review_maps_to_decline: bool,
    /// Engine/crate version string attached to every decision's metadata.
    pub engine_version: String,
    /// Per-condition debug tracing is enabled at all (§4.7 Debug mode).
    pub debug_enabled: bool,
    /// Fraction of requests, when debug is enabled, that actually record a
    /// trace (bounds overhead to near zero when sampled low).
    pub debug_sample_rate: f64,
    /// Hard cap on the number of condition evaluations traced per request.
    pub debug_max_evaluations: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            review_maps_to_decline: false,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            debug_enabled: false,
            debug_sample_rate: 0.0,
            debug_max_evaluations: 50,
        }
    }
}

/// Extracted scope dimension values used for scope-bucket filtering (§4.7
/// step 2).
struct ScopeDimensions {
    network: Option<String>,
    bin: Option<String>,
    mcc: Option<String>,
    logo: Option<String>,
}

fn extract_scope_dimensions(transaction: &Transaction, registry: &FieldRegistry) -> ScopeDimensions {
    let as_str = |name: &str| {
        transaction
            .get_by_name(registry, name)
            .and_then(|value| value.as_str())
            .map(str::to_string)
    };
    ScopeDimensions {
        network: as_str("card_network"),
        bin: as_str("card_bin"),
        mcc: as_str("merchant_category_code"),
        logo: as_str("card_logo"),
    }
}

fn transaction_id_of(transaction: &Transaction, registry: &FieldRegistry) -> String {
    transaction
        .get_by_name(registry, "transaction_id")
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .unwrap_or_default()
}

/// Renders the current wall-clock time as RFC 3339 with nanosecond precision.
pub(crate) fn now_rfc3339() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    humantime_rfc3339(now.as_secs(), now.subsec_nanos())
}

/// Renders a Unix timestamp as RFC 3339, without pulling in a date/time
/// crate this core crate does not already depend on.
fn humantime_rfc3339(secs: u64, nanos: u32) -> String {
    let days = secs / 86_400;
    let time_of_day = secs % 86_400;
    let (hour, minute, second) = (time_of_day / 3600, (time_of_day % 3600) / 60, time_of_day % 60);
    let (year, month, day) = civil_from_days(days as i64);
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{nanos:09}Z")
}

/// Converts a day count since the Unix epoch to a civil (year, month, day),
/// using Howard Hinnant's `civil_from_days` algorithm (proleptic Gregorian).
const fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// Outcome of resolving which rules contributed to a decision (§4.7 steps
/// 3-7), shared by both AUTH and MONITORING traversal.
struct Contribution {
    matched_rules: Vec<MatchedRule>,
    velocity_results: BTreeMap<String, crate::core::decision::VelocityResult>,
    debug_info: Vec<ConditionTrace>,
    degraded: bool,
    /// For AUTH: the action of the first contributing rule, if any.
    first_contributing_action: Option<Action>,
}

/// The rule evaluator (§4.7, C7).
pub struct RuleEvaluator<S> {
    registry: std::sync::Arc<RulesetRegistry>,
    field_registry: FieldRegistry,
    velocity: VelocityEngine<S>,
    config: EvaluatorConfig,
}

impl<S: CounterStore> RuleEvaluator<S> {
    /// Creates an evaluator over an installed ruleset registry and a
    /// velocity engine backed by `S`.
    pub fn new(
        registry: std::sync::Arc<RulesetRegistry>,
        field_registry: FieldRegistry,
        velocity: VelocityEngine<S>,
        config: EvaluatorConfig,
    ) -> Self {
        Self { registry, field_registry, velocity, config }
    }

    /// AUTH evaluation: first-match, returns a business decision (§4.7 step
    /// 6, §4.9 `evaluateAuth`).
    pub async fn evaluate_auth(
        &self,
        transaction: &Transaction,
        country: Option<&CountryCode>,
        ruleset_key: &RulesetKey,
    ) -> Decision {
        let started = Instant::now();
        let mut timing = TimingBreakdown::default();

        let lookup_started = Instant::now();
        let ruleset = self.registry.get(country, ruleset_key);
        timing.ruleset_lookup_us = elapsed_us(lookup_started);

        let Some(ruleset) = ruleset else {
            return self.fail_open(transaction, EvaluationType::AuthFirstMatch, started);
        };

        let traversal_started = Instant::now();
        let dims = extract_scope_dimensions(transaction, &self.field_registry);
        let applicable =
            ruleset.applicable_rules(dims.network.as_deref(), dims.bin.as_deref(), dims.mcc.as_deref(), dims.logo.as_deref());
        timing.scope_traversal_us = elapsed_us(traversal_started);

        let dispatch_started = Instant::now();
        let contribution = self.resolve_contribution(transaction, &ruleset, &applicable, true).await;
        timing.rule_evaluation_us = elapsed_us(dispatch_started);

        let decision = contribution.first_contributing_action.and_then(|action| {
            if action == Action::Review && self.config.review_maps_to_decline {
                Some(DecisionOutcome::Decline)
            } else {
                Option::<DecisionOutcome>::from(action)
            }
        });
        let decision = decision.unwrap_or(DecisionOutcome::Approve);

        let build_started = Instant::now();
        let engine_mode = if contribution.degraded { EngineMode::Degraded } else { EngineMode::Normal };
        let result = self.assemble(
            transaction,
            EvaluationType::AuthFirstMatch,
            decision,
            engine_mode,
            None,
            Some(&ruleset),
            contribution,
            started,
            timing,
        );
        let _ = build_started;
        result
    }

    /// MONITORING evaluation: all-match, carries the caller-supplied
    /// decision (§4.7 step 7, §4.9 `evaluateMonitoring`). The caller is
    /// responsible for having already validated `decision` is present and
    /// valid (§4.9 "fails the request with a validation error before
    /// evaluation").
    pub async fn evaluate_monitoring(
        &self,
        transaction: &Transaction,
        country: Option<&CountryCode>,
        ruleset_key: &RulesetKey,
        caller_decision: DecisionOutcome,
    ) -> Decision {
        let started = Instant::now();
        let mut timing = TimingBreakdown::default();

        let lookup_started = Instant::now();
        let ruleset = self.registry.get(country, ruleset_key);
        timing.ruleset_lookup_us = elapsed_us(lookup_started);

        let Some(ruleset) = ruleset else {
            let mut decision = self.fail_open(transaction, EvaluationType::MonitoringAllMatch, started);
            decision.decision = caller_decision;
            return decision;
        };

        let dims = extract_scope_dimensions(transaction, &self.field_registry);
        let applicable =
            ruleset.applicable_rules(dims.network.as_deref(), dims.bin.as_deref(), dims.mcc.as_deref(), dims.logo.as_deref());
        let contribution = self.resolve_contribution(transaction, &ruleset, &applicable, false).await;

        let engine_mode = if contribution.degraded { EngineMode::Degraded } else { EngineMode::Normal };
        self.assemble(
            transaction,
            EvaluationType::MonitoringAllMatch,
            caller_decision,
            engine_mode,
            None,
            Some(&ruleset),
            contribution,
            started,
            timing,
        )
    }

    /// Resolves the velocity configs of every matched rule that carries one,
    /// for the outbox worker's velocity-snapshot capture (§4.8 "captures a
    /// velocity snapshot at worker-processing time"). Looks the ruleset back
    /// up from the registry rather than threading it through the decision, so
    /// the hot path's `Decision` stays free of internal ruleset references.
    /// Returns an empty vector if the ruleset was retired or missing (e.g. a
    /// fail-open decision has no matched rules to begin with).
    #[must_use]
    pub fn velocity_candidates_for(
        &self,
        decision: &Decision,
        country: Option<&CountryCode>,
    ) -> Vec<(RuleId, VelocityConfig)> {
        let Some(ruleset_key) = &decision.ruleset_key else { return Vec::new() };
        let Some(ruleset) = self.registry.get(country, ruleset_key) else { return Vec::new() };
        decision
            .matched_rules
            .iter()
            .filter_map(|matched| {
                let compiled = ruleset.rule_by_id(&matched.rule_id)?;
                let velocity = compiled.rule.velocity.clone()?;
                Some((matched.rule_id.clone(), velocity))
            })
            .collect()
    }

    /// Dispatches compiled conditions over the applicable rule list, then
    /// gates matches through velocity (§4.7 steps 4-5). When `first_match` is
    /// set, collection stops at the first contributing rule (AUTH); MONITORING
    /// always collects every contributing rule regardless of `first_match`.
    async fn resolve_contribution(
        &self,
        transaction: &Transaction,
        ruleset: &crate::runtime::ruleset::Ruleset,
        applicable: &[usize],
        first_match: bool,
    ) -> Contribution {
        let mut matched_rules = Vec::new();
        let mut debug_info = Vec::new();
        let mut first_contributing_action = None;
        let mut velocity_candidates: Vec<(RuleId, &VelocityConfig)> = Vec::new();
        let mut condition_matched: Vec<(&CompiledRule, bool)> = Vec::with_capacity(applicable.len());

        for &index in applicable {
            let compiled = ruleset.rule_at(index);
            let matched = (compiled.predicate)(transaction);
            if self.config.debug_enabled && debug_info.len() < self.config.debug_max_evaluations {
                debug_info.push(ConditionTrace {
                    rule_id: compiled.rule.id.clone(),
                    field: compiled.rule.name.clone(),
                    operator: "and".to_string(),
                    expected: String::new(),
                    actual: String::new(),
                    matched,
                });
            }
            if matched {
                if let Some(velocity) = &compiled.rule.velocity {
                    velocity_candidates.push((compiled.rule.id.clone(), velocity));
                }
            }
            condition_matched.push((compiled, matched));
        }

        let velocity_outcomes =
            self.velocity.evaluate(transaction, &velocity_candidates, &self.field_registry).await;
        let degraded = velocity_outcomes.values().any(|outcome| outcome.exceeded.is_unknown());

        let mut velocity_results = BTreeMap::new();
        for (rule_id, outcome) in &velocity_outcomes {
            if let Some(result) = &outcome.result {
                velocity_results.insert(rule_id.clone(), result.clone());
            }
        }

        for (compiled, matched) in condition_matched {
            if !matched {
                continue;
            }
            let contributes = match &compiled.rule.velocity {
                None => true,
                Some(_) => velocity_outcomes
                    .get(compiled.rule.id.as_str())
                    .is_some_and(|outcome| outcome.exceeded.is_true()),
            };
            if !contributes {
                continue;
            }
            if first_match
                && compiled.rule.action == Action::Review
                && !self.config.review_maps_to_decline
            {
                // REVIEW is not a business decision under AUTH (§8 property 2):
                // non-contributing by default, so it neither records a match nor
                // stops traversal ahead of a later DECLINE rule. MONITORING still
                // collects it (first_match is false there).
                continue;
            }
            matched_rules.push(MatchedRule {
                rule_id: compiled.rule.id.clone(),
                rule_version_id: compiled.rule.rule_version_id.clone(),
                action: compiled.rule.action,
                conditions_met: true,
                condition_values: BTreeMap::new(),
            });
            if first_contributing_action.is_none() {
                first_contributing_action = Some(compiled.rule.action);
            }
            if first_match {
                break;
            }
        }

        Contribution { matched_rules, velocity_results, debug_info, degraded, first_contributing_action }
    }

    /// Builds the fail-open decision for a missing ruleset (§4.7 step 1,
    /// §8 property 7). AUTH resolves `RULESET_NOT_LOADED` to `FAIL_OPEN`
    /// with APPROVE; MONITORING carries `DEGRADED` with an empty match list
    /// and leaves `decision` for the caller to overwrite.
    fn fail_open(&self, transaction: &Transaction, evaluation_type: EvaluationType, started: Instant) -> Decision {
        let mode = match evaluation_type {
            EvaluationType::AuthFirstMatch => EngineMode::FailOpen,
            EvaluationType::MonitoringAllMatch => EngineMode::Degraded,
        };
        self.assemble(
            transaction,
            evaluation_type,
            DecisionOutcome::Approve,
            mode,
            Some(EngineErrorCode::RulesetNotLoaded),
            None,
            Contribution {
                matched_rules: Vec::new(),
                velocity_results: BTreeMap::new(),
                debug_info: Vec::new(),
                degraded: false,
                first_contributing_action: None,
            },
            started,
            TimingBreakdown::default(),
        )
    }

    #[allow(clippy::too_many_arguments, reason = "internal assembly step; splitting would scatter one decision's fields across call sites")]
    fn assemble(
        &self,
        transaction: &Transaction,
        evaluation_type: EvaluationType,
        decision: DecisionOutcome,
        engine_mode: EngineMode,
        engine_error_code: Option<EngineErrorCode>,
        ruleset: Option<&crate::runtime::ruleset::Ruleset>,
        contribution: Contribution,
        started: Instant,
        mut timing: TimingBreakdown,
    ) -> Decision {
        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        timing.decision_build_us = elapsed_us(started);
        let engine_error_code = engine_error_code.or_else(|| {
            (engine_mode == EngineMode::Degraded && contribution.degraded)
                .then_some(EngineErrorCode::RedisUnavailable)
        });
        Decision {
            decision_id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id_of(transaction, &self.field_registry),
            evaluation_type,
            decision,
            engine_mode,
            engine_error_code,
            message: None,
            ruleset_key: ruleset.map(|r| r.key.clone()),
            ruleset_version: ruleset.map(|r| r.version),
            ruleset_id: ruleset.map(|r| r.ruleset_id.clone()),
            matched_rules: contribution.matched_rules,
            velocity_results: contribution.velocity_results,
            timestamp: now_rfc3339(),
            processing_time_ms,
            debug_info: self.config.debug_enabled.then_some(contribution.debug_info),
            engine_metadata: EngineMetadata {
                processing_time_ms,
                engine_version: self.config.engine_version.clone(),
            },
            timing_breakdown: Some(timing),
            transaction_context: None,
            velocity_snapshot: None,
        }
    }
}

fn elapsed_us(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_micros()).unwrap_or(u64::MAX)
}
