// fraud-core/src/runtime/ruleset.rs
// ============================================================================
// Module: Compiled Ruleset
// Description: Compiled rules, precomputed scope buckets, and the bounded
//              applicable-rules cache (§3.6, C3).
// Purpose: Turn a validated `RulesetSpec` into an installable, immutable
//          `Ruleset` the registry (C4) can hand to concurrent readers.
// Dependencies: crate::core, crate::runtime::condition, std::sync
// ============================================================================

//! ## Overview
//! A [`Ruleset`] holds one [`CompiledRule`] per declarative rule, plus
//! buckets derived from each rule's [`crate::core::scope::RuleScope`]:
//! per-dimension-value lists and a `global` list. [`Ruleset::applicable_rules`]
//! computes the union for a `(network, bin, mcc, logo)` tuple, sorted by the
//! traversal comparator (§4.7), and memoizes the result in a bounded,
//! clear-on-overflow cache (§3.6, §9).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::field_registry::FieldRegistry;
use crate::core::ids::RulesetId;
use crate::core::ids::RulesetKey;
use crate::core::rule::Action;
use crate::core::rule::Rule;
use crate::core::ruleset_spec::RulesetSpec;
use crate::core::scope::RuleScope;
use crate::runtime::condition::CompiledPredicate;
use crate::runtime::condition::compile_rule_predicate;

/// Maximum number of normalized scope tuples memoized per ruleset before the
/// cache is cleared wholesale (§3.6, §9 "clear-on-overflow").
pub const SCOPE_CACHE_CAPACITY: usize = 2048;

/// A rule paired with its compiled, allocation-free predicate (C2 output).
pub struct CompiledRule {
    /// The declarative rule this predicate was compiled from.
    pub rule: Rule,
    /// The compiled AND-of-conditions predicate (§3.3).
    pub predicate: CompiledPredicate,
}

impl CompiledRule {
    /// Compiles one rule's conditions against the given field registry.
    #[must_use]
    pub fn compile(rule: Rule, registry: &FieldRegistry) -> Self {
        let predicate = compile_rule_predicate(&rule.conditions, registry);
        Self { rule, predicate }
    }
}

/// Normalized `(network, bin, mcc, logo)` lookup key for the scope cache.
/// Values are lowercased so case-insensitive dimensions hash consistently.
type ScopeTuple = (Option<String>, Option<String>, Option<String>, Option<String>);

fn normalize_tuple(
    network: Option<&str>,
    bin: Option<&str>,
    mcc: Option<&str>,
    logo: Option<&str>,
) -> ScopeTuple {
    (
        network.map(str::to_lowercase),
        bin.map(str::to_string),
        mcc.map(str::to_string),
        logo.map(str::to_lowercase),
    )
}

/// Index of rule positions by each scope dimension's value, plus globals
/// (§3.6). Built once, immutable after the ruleset is installed.
struct ScopeBuckets {
    global: Vec<usize>,
    network: HashMap<String, Vec<usize>>,
    bin: HashMap<String, Vec<usize>>,
    mcc: HashMap<String, Vec<usize>>,
    logo: HashMap<String, Vec<usize>>,
    /// Rules with `RuleScope::Combined`; scanned linearly since combined
    /// scopes cannot be indexed by a single dimension value.
    combined: Vec<usize>,
}

impl ScopeBuckets {
    fn build(rules: &[CompiledRule]) -> Self {
        let mut buckets = Self {
            global: Vec::new(),
            network: HashMap::new(),
            bin: HashMap::new(),
            mcc: HashMap::new(),
            logo: HashMap::new(),
            combined: Vec::new(),
        };
        for (index, compiled) in rules.iter().enumerate() {
            match &compiled.rule.scope {
                RuleScope::Global => buckets.global.push(index),
                RuleScope::Network(values) => {
                    for v in values {
                        buckets.network.entry(v.to_lowercase()).or_default().push(index);
                    }
                }
                RuleScope::Bin(values) => {
                    for v in values {
                        buckets.bin.entry(v.clone()).or_default().push(index);
                    }
                }
                RuleScope::Mcc(values) => {
                    for v in values {
                        buckets.mcc.entry(v.clone()).or_default().push(index);
                    }
                }
                RuleScope::Logo(values) => {
                    for v in values {
                        buckets.logo.entry(v.to_lowercase()).or_default().push(index);
                    }
                }
                RuleScope::Combined(_) => buckets.combined.push(index),
            }
        }
        buckets
    }

    /// Collects the indices of rules whose scope bucket membership could
    /// apply to the given dimension values; exact scope matching (including
    /// BIN prefix length and Combined AND-across-dimensions) is re-checked by
    /// the caller against each candidate's full [`RuleScope`].
    fn candidate_indices(
        &self,
        network: Option<&str>,
        bin: Option<&str>,
        mcc: Option<&str>,
        logo: Option<&str>,
    ) -> Vec<usize> {
        let mut indices: Vec<usize> = self.global.clone();
        if let Some(network) = network {
            if let Some(hit) = self.network.get(&network.to_lowercase()) {
                indices.extend(hit.iter().copied());
            }
        }
        if let Some(bin) = bin {
            // Descending prefix length scan (§9 open question, resolved):
            // probe every prefix of the transaction BIN from longest to
            // shortest so the longest registered prefix is found first.
            for end in (1..=bin.len()).rev() {
                if let Some(hit) = self.bin.get(&bin[..end]) {
                    indices.extend(hit.iter().copied());
                }
            }
        }
        if let Some(mcc) = mcc {
            if let Some(hit) = self.mcc.get(mcc) {
                indices.extend(hit.iter().copied());
            }
        }
        if let Some(logo) = logo {
            if let Some(hit) = self.logo.get(&logo.to_lowercase()) {
                indices.extend(hit.iter().copied());
            }
        }
        indices.extend(self.combined.iter().copied());
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Traversal comparator (locked, §4.7 step 3 / §8 property 5):
/// specificity desc, then priority desc, then APPROVE-before-non-APPROVE.
fn traversal_cmp(a: &CompiledRule, b: &CompiledRule) -> std::cmp::Ordering {
    b.rule
        .scope
        .specificity()
        .cmp(&a.rule.scope.specificity())
        .then_with(|| b.rule.priority.cmp(&a.rule.priority))
        .then_with(|| approve_rank(a.rule.action).cmp(&approve_rank(b.rule.action)))
}

const fn approve_rank(action: Action) -> u8 {
    match action {
        Action::Approve => 0,
        Action::Decline | Action::Review => 1,
    }
}

/// A compiled, installable ruleset (§3.6). Immutable after construction;
/// installs replace the whole value via the registry's swap, never mutate
/// one in place.
pub struct Ruleset {
    /// Ruleset family key, e.g. `CARD_AUTH`.
    pub key: RulesetKey,
    /// Monotonic version.
    pub version: u32,
    /// Installed instance identifier.
    pub ruleset_id: RulesetId,
    /// Compiled rules in artifact order (not traversal order).
    rules: Vec<CompiledRule>,
    buckets: ScopeBuckets,
    /// Bounded applicable-rules cache, keyed by normalized scope tuple.
    /// Cleared wholesale on overflow rather than evicted per-entry (§9).
    cache: Mutex<HashMap<ScopeTuple, std::sync::Arc<Vec<usize>>>>,
}

impl Ruleset {
    /// Compiles and indexes a validated [`RulesetSpec`] into an installable
    /// ruleset: compiles every rule's conditions, then builds scope buckets.
    #[must_use]
    pub fn compile(spec: RulesetSpec, registry: &FieldRegistry) -> Self {
        let rules: Vec<CompiledRule> =
            spec.rules.into_iter().map(|rule| CompiledRule::compile(rule, registry)).collect();
        let buckets = ScopeBuckets::build(&rules);
        Self {
            key: spec.key,
            version: spec.version,
            ruleset_id: spec.ruleset_id,
            rules,
            buckets,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the compiled rules, in traversal order, applicable to the
    /// given scope dimension values (§3.6, §4.7 step 2-3). Memoizes the
    /// ordered index list for the normalized tuple.
    #[must_use]
    pub fn applicable_rules(
        &self,
        network: Option<&str>,
        bin: Option<&str>,
        mcc: Option<&str>,
        logo: Option<&str>,
    ) -> std::sync::Arc<Vec<usize>> {
        let tuple = normalize_tuple(network, bin, mcc, logo);
        {
            let guard = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(hit) = guard.get(&tuple) {
                return std::sync::Arc::clone(hit);
            }
        }
        let mut candidates: Vec<usize> = self
            .buckets
            .candidate_indices(network, bin, mcc, logo)
            .into_iter()
            .filter(|&index| {
                let scope = &self.rules[index].rule.scope;
                self.rules[index].rule.enabled && scope.matches(network, bin, mcc, logo)
            })
            .collect();
        candidates.sort_by(|&a, &b| traversal_cmp(&self.rules[a], &self.rules[b]));
        let result = std::sync::Arc::new(candidates);

        let mut guard = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.len() >= SCOPE_CACHE_CAPACITY {
            guard.clear();
        }
        guard.insert(tuple, std::sync::Arc::clone(&result));
        result
    }

    /// Returns a compiled rule by its index in traversal-candidate lists.
    #[must_use]
    pub fn rule_at(&self, index: usize) -> &CompiledRule {
        &self.rules[index]
    }

    /// Looks up a compiled rule by its declarative id, for callers (such as
    /// the outbox worker's velocity-snapshot capture, §4.8) that only have a
    /// [`crate::core::decision::MatchedRule`] to work from. Linear scan: only
    /// ever called for the handful of rules that actually contributed to a
    /// decision, never on the scope-traversal hot path.
    #[must_use]
    pub fn rule_by_id(&self, id: &crate::core::ids::RuleId) -> Option<&CompiledRule> {
        self.rules.iter().find(|compiled| &compiled.rule.id == id)
    }

    /// Total number of rules in this ruleset, enabled or not.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl std::fmt::Debug for Ruleset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ruleset")
            .field("key", &self.key)
            .field("version", &self.version)
            .field("ruleset_id", &self.ruleset_id)
            .field("rule_count", &self.rules.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::Ruleset;
    use crate::core::condition::Condition;
    use crate::core::condition::ConditionOperand;
    use crate::core::condition::Operator;
    use crate::core::field_registry::FieldRegistry;
    use crate::core::ids::RuleId;
    use crate::core::ids::RuleVersionId;
    use crate::core::ids::RulesetId;
    use crate::core::ids::RulesetKey;
    use crate::core::rule::Action;
    use crate::core::rule::Rule;
    use crate::core::ruleset_spec::RulesetSpec;
    use crate::core::scope::RuleScope;
    use crate::core::transaction::FieldValue;

    fn rule(id: &str, action: Action, priority: i32, scope: RuleScope) -> Rule {
        Rule {
            id: RuleId::new(id),
            name: id.to_string(),
            action,
            priority,
            enabled: true,
            conditions: vec![Condition {
                field: "amount".to_string(),
                operator: Operator::Gt,
                value: ConditionOperand::Single(FieldValue::Float(1000.0)),
            }],
            velocity: None,
            scope,
            rule_version_id: RuleVersionId::new(format!("{id}-v1")),
            rule_version: 1,
        }
    }

    fn sample_ruleset() -> Ruleset {
        let registry = FieldRegistry::new();
        let spec = RulesetSpec {
            key: RulesetKey::new("CARD_AUTH"),
            version: 1,
            ruleset_id: RulesetId::new("CARD_AUTH@1"),
            field_registry_version: None,
            rules: vec![
                rule("r1", Action::Decline, 50, RuleScope::Bin(vec!["4111".to_string()])),
                rule("r2", Action::Decline, 80, RuleScope::Network(vec!["VISA".to_string()])),
            ],
        };
        Ruleset::compile(spec, &registry)
    }

    #[test]
    fn s1_specific_beats_priority_bin_before_network() {
        let ruleset = sample_ruleset();
        let indices = ruleset.applicable_rules(Some("VISA"), Some("411122"), None, None);
        assert_eq!(indices.len(), 2);
        assert_eq!(ruleset.rule_at(indices[0]).rule.id.as_str(), "r1");
        assert_eq!(ruleset.rule_at(indices[1]).rule.id.as_str(), "r2");
    }

    #[test]
    fn s2_bin_scope_filters_out_non_matching_bin() {
        let ruleset = sample_ruleset();
        let indices = ruleset.applicable_rules(Some("VISA"), Some("555500"), None, None);
        assert_eq!(indices.len(), 1);
        assert_eq!(ruleset.rule_at(indices[0]).rule.id.as_str(), "r2");
    }

    #[test]
    fn applicable_rules_cache_is_consistent_across_repeated_calls() {
        let ruleset = sample_ruleset();
        let first = ruleset.applicable_rules(Some("VISA"), Some("411122"), None, None);
        let second = ruleset.applicable_rules(Some("visa"), Some("411122"), None, None);
        assert_eq!(*first, *second);
    }

    #[test]
    fn disabled_rule_is_excluded_from_applicable_rules() {
        let registry = FieldRegistry::new();
        let mut disabled = rule("r1", Action::Decline, 50, RuleScope::Global);
        disabled.enabled = false;
        let spec = RulesetSpec {
            key: RulesetKey::new("CARD_AUTH"),
            version: 1,
            ruleset_id: RulesetId::new("CARD_AUTH@1"),
            field_registry_version: None,
            rules: vec![disabled],
        };
        let ruleset = Ruleset::compile(spec, &registry);
        assert!(ruleset.applicable_rules(None, None, None, None).is_empty());
    }

    fn scope_with_specificity(specificity: u32) -> RuleScope {
        match specificity {
            0 => RuleScope::Global,
            1 => RuleScope::Network(vec!["VISA".to_string()]),
            3 => RuleScope::Mcc(vec!["5411".to_string()]),
            4 => RuleScope::Logo(vec!["PLUS".to_string()]),
            // `Bin` specificity is `2 + longest_len`; a prefix of length
            // `specificity - 2` gives exactly the requested value.
            n => RuleScope::Bin(vec!["4".repeat((n - 2) as usize)]),
        }
    }

    fn action_for(flag: bool) -> Action {
        if flag { Action::Approve } else { Action::Decline }
    }

    proptest::proptest! {
        /// The traversal comparator (§4.7 step 3 / §8 property 5) is a total
        /// order: exactly one of `a < b`, `a == b` (by its own fields), `a > b`
        /// holds, and the relation is transitive across three independently
        /// generated rules.
        #[test]
        fn traversal_comparator_is_a_total_order(
            spec_a in 0u32..8, prio_a in -100i32..100, approve_a in proptest::bool::ANY,
            spec_b in 0u32..8, prio_b in -100i32..100, approve_b in proptest::bool::ANY,
            spec_c in 0u32..8, prio_c in -100i32..100, approve_c in proptest::bool::ANY,
        ) {
            let a = rule("a", action_for(approve_a), prio_a, scope_with_specificity(spec_a));
            let b = rule("b", action_for(approve_b), prio_b, scope_with_specificity(spec_b));
            let c = rule("c", action_for(approve_c), prio_c, scope_with_specificity(spec_c));
            let registry = FieldRegistry::new();
            let ca = super::CompiledRule::compile(a, &registry);
            let cb = super::CompiledRule::compile(b, &registry);
            let cc = super::CompiledRule::compile(c, &registry);

            // Antisymmetry: swapping operands reverses the ordering.
            assert_eq!(super::traversal_cmp(&ca, &cb), super::traversal_cmp(&cb, &ca).reverse());

            // Transitivity: if a <= b and b <= c then a <= c.
            use std::cmp::Ordering::Greater;
            if super::traversal_cmp(&ca, &cb) != Greater && super::traversal_cmp(&cb, &cc) != Greater {
                assert_ne!(super::traversal_cmp(&ca, &cc), Greater);
            }
        }
    }
}
