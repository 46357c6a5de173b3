// fraud-core/src/core/ruleset_spec.rs
// ============================================================================
// Module: Ruleset Artifact Spec
// Description: The declarative, uncompiled shape of a ruleset artifact.
// Purpose: What the loader (C5) deserializes from the artifact store before
//          handing it to the condition compiler and scope-bucket builder.
// Dependencies: crate::core::{ids, rule}, serde
// ============================================================================

//! ## Overview
//! `RulesetSpec` is the artifact-store wire format (§6.2): an ordered list of
//! declarative [`Rule`]s plus ruleset-level metadata. It carries no compiled
//! predicates or scope buckets — those are runtime-only (`runtime::ruleset`)
//! and rebuilt fresh every time a spec is installed.

use serde::Deserialize;
use serde::Serialize;

use crate::core::field_registry::FieldRegistryVersion;
use crate::core::ids::RulesetId;
use crate::core::ids::RulesetKey;
use crate::core::rule::Rule;

/// Declarative ruleset artifact, as produced by the governance service and
/// fetched by the loader (§3.6, §6.2).
///
/// # Invariants
/// - Rule ordering in `rules` is artifact order, not traversal order; the
///   loader sorts by priority and builds scope buckets after compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetSpec {
    /// Ruleset family key, e.g. `CARD_AUTH`.
    pub key: RulesetKey,
    /// Monotonic version for this ruleset family.
    pub version: u32,
    /// Installed ruleset instance identifier (stable per compiled artifact).
    pub ruleset_id: RulesetId,
    /// Field registry version this ruleset was authored against. `None`
    /// means legacy: always accepted (§3.6, §6.7).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_registry_version: Option<FieldRegistryVersion>,
    /// Declarative rules, in artifact order.
    pub rules: Vec<Rule>,
}

/// Errors raised validating a [`RulesetSpec`] before compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesetValidationError {
    /// Two rules in the same artifact share an id.
    #[error("duplicate rule id: {0}")]
    DuplicateRuleId(String),
    /// The artifact's field registry version is newer than this runtime
    /// supports.
    #[error("incompatible field registry version: artifact={artifact}, runtime={runtime}")]
    IncompatibleFieldRegistry {
        /// Version carried by the artifact.
        artifact: u32,
        /// Version supported by this runtime.
        runtime: u32,
    },
}

impl RulesetSpec {
    /// Validates structural invariants that must hold before compilation:
    /// unique rule ids and field registry compatibility.
    ///
    /// # Errors
    ///
    /// Returns [`RulesetValidationError`] on the first violation found.
    pub fn validate(
        &self,
        registry: &crate::core::field_registry::FieldRegistry,
    ) -> Result<(), RulesetValidationError> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str().to_string()) {
                return Err(RulesetValidationError::DuplicateRuleId(rule.id.as_str().to_string()));
            }
        }
        if !registry.is_compatible(self.field_registry_version) {
            return Err(RulesetValidationError::IncompatibleFieldRegistry {
                artifact: self.field_registry_version.unwrap_or(0),
                runtime: registry.version(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::RulesetSpec;
    use crate::core::field_registry::FieldRegistry;
    use crate::core::ids::RulesetId;
    use crate::core::ids::RulesetKey;

    fn empty_spec(field_registry_version: Option<u32>) -> RulesetSpec {
        RulesetSpec {
            key: RulesetKey::new("CARD_AUTH"),
            version: 1,
            ruleset_id: RulesetId::new("CARD_AUTH@1"),
            field_registry_version,
            rules: vec![],
        }
    }

    #[test]
    fn legacy_spec_with_no_registry_version_is_accepted() {
        let registry = FieldRegistry::new();
        assert!(empty_spec(None).validate(&registry).is_ok());
    }

    #[test]
    fn mismatched_registry_version_is_rejected() {
        let registry = FieldRegistry::new();
        let spec = empty_spec(Some(FieldRegistry::CURRENT_VERSION + 1));
        assert!(spec.validate(&registry).is_err());
    }
}
