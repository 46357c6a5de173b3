// fraud-core/src/runtime/registry.rs
// ============================================================================
// Module: Ruleset Registry
// Description: Wait-free-read registry of active rulesets keyed by
//              `(country, rulesetKey)`, with atomic hot-swap (§4.3, C4).
// Purpose: Let C7 look up the ruleset to evaluate without ever blocking on a
//          concurrent install, and let C5 replace a ruleset atomically.
// Dependencies: crate::core, crate::runtime::ruleset, arc_swap
// ============================================================================

//! ## Overview
//! The registry stores one [`Ruleset`] per `(country, key)` pair behind a
//! single [`arc_swap::ArcSwap`] over an immutable map (§4.3, §5, §9
//! "Mutable-shared registry & copy-on-write swap"). Reads clone the `Arc`
//! they need and are wait-free; installs build a new map and swap the
//! pointer in one atomic store, so every concurrent evaluation observes
//! either the whole previous ruleset or the whole new one — never a mix
//! (§8 property 9).

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::core::ids::CountryCode;
use crate::core::ids::RulesetKey;
use crate::runtime::ruleset::Ruleset;

/// Lookup key: `None` country is the global fallback namespace (§4.3).
type RegistryKey = (Option<CountryCode>, RulesetKey);

/// Observability snapshot of one installed ruleset (§4.3 `list_status`).
#[derive(Debug, Clone)]
pub struct RulesetStatus {
    /// Country this entry is scoped to, or `None` for the global fallback.
    pub country: Option<CountryCode>,
    /// Ruleset family key.
    pub key: RulesetKey,
    /// Installed version.
    pub version: u32,
    /// Number of compiled rules.
    pub rule_count: usize,
}

/// Registry of active rulesets with atomic hot-swap (§4.3, C4).
pub struct RulesetRegistry {
    rulesets: ArcSwap<HashMap<RegistryKey, Arc<Ruleset>>>,
}

impl Default for RulesetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RulesetRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { rulesets: ArcSwap::from_pointee(HashMap::new()) }
    }

    /// Looks up the ruleset for `(country, key)`, falling back to the global
    /// namespace when no country-specific entry exists (§4.3). Wait-free.
    #[must_use]
    pub fn get(&self, country: Option<&CountryCode>, key: &RulesetKey) -> Option<Arc<Ruleset>> {
        let snapshot = self.rulesets.load();
        if let Some(country) = country {
            if let Some(hit) = snapshot.get(&(Some(country.clone()), key.clone())) {
                return Some(Arc::clone(hit));
            }
        }
        snapshot.get(&(None, key.clone())).map(Arc::clone)
    }

    /// Atomically installs (or replaces) the ruleset for `(country, key)`.
    /// The previous `Arc<Ruleset>`, if any, stays alive for as long as any
    /// in-flight evaluation still holds a clone of it (§4.3 "retired after
    /// all in-flight evaluations complete").
    pub fn install(&self, country: Option<CountryCode>, key: RulesetKey, ruleset: Ruleset) {
        let ruleset = Arc::new(ruleset);
        self.rulesets.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert((country.clone(), key.clone()), Arc::clone(&ruleset));
            Arc::new(next)
        });
    }

    /// Snapshot of every installed ruleset for observability (§4.3).
    #[must_use]
    pub fn list_status(&self) -> Vec<RulesetStatus> {
        self.rulesets
            .load()
            .iter()
            .map(|((country, key), ruleset)| RulesetStatus {
                country: country.clone(),
                key: key.clone(),
                version: ruleset.version,
                rule_count: ruleset.rule_count(),
            })
            .collect()
    }
}
