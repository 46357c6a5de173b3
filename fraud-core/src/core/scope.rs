// fraud-core/src/core/scope.rs
// ============================================================================
// Module: Rule Scope
// Description: Scope hierarchy and specificity ordering (§3.5).
// Purpose: Narrow rule applicability by network/BIN/MCC/logo/combined
//          dimensions and provide the specificity used by the traversal
//          comparator (§4.7).
// Dependencies: std
// ============================================================================

//! ## Overview
//! A scope may carry a single value or a set of values (OR within a
//! dimension); [`RuleScope::Combined`] is AND across dimensions, OR within
//! each. Specificity is a pure function of the scope shape, computed once at
//! load time and never recomputed on the hot path.

use serde::Deserialize;
use serde::Serialize;

/// A single scope dimension used standalone or inside [`RuleScope::Combined`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeDimension {
    /// Card network, matched case-insensitively.
    Network(Vec<String>),
    /// BIN prefix(es); a transaction BIN matches if it starts with any value.
    Bin(Vec<String>),
    /// Merchant category code, matched exactly.
    Mcc(Vec<String>),
    /// Card logo, matched case-insensitively.
    Logo(Vec<String>),
}

/// Rule scope narrowing applicability (§3.5).
///
/// # Invariants
/// - `specificity()` is monotonic with the table in §3.5: GLOBAL < NETWORK <
///   BIN < MCC < LOGO < COMBINED, with BIN and COMBINED additionally ordered
///   by prefix length / dimension count respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Matches every transaction.
    Global,
    /// Matches by card network.
    Network(Vec<String>),
    /// Matches by BIN prefix.
    Bin(Vec<String>),
    /// Matches by merchant category code.
    Mcc(Vec<String>),
    /// Matches by card logo.
    Logo(Vec<String>),
    /// AND across dimensions, OR within each dimension's value set.
    Combined(Vec<ScopeDimension>),
}

impl RuleScope {
    /// Returns the specificity used by the traversal comparator (§3.5/§4.7).
    /// For `Bin`, uses the longest configured prefix length among the
    /// scope's values, per "the reference scans descending prefix lengths"
    /// (§9) — a rule's own specificity reflects its most specific prefix.
    #[must_use]
    pub fn specificity(&self) -> u32 {
        match self {
            Self::Global => 0,
            Self::Network(_) => 1,
            Self::Bin(values) => 2 + longest_len(values),
            Self::Mcc(_) => 3,
            Self::Logo(_) => 4,
            Self::Combined(dims) => 5 + dims.len() as u32,
        }
    }

    /// Returns true if this scope applies to a transaction with the given
    /// extracted dimension values. Absent dimension values (`None`) never
    /// match a scope that requires that dimension.
    #[must_use]
    pub fn matches(
        &self,
        network: Option<&str>,
        bin: Option<&str>,
        mcc: Option<&str>,
        logo: Option<&str>,
    ) -> bool {
        match self {
            Self::Global => true,
            Self::Network(values) => matches_ci(network, values),
            Self::Bin(values) => matches_prefix(bin, values),
            Self::Mcc(values) => matches_exact(mcc, values),
            Self::Logo(values) => matches_ci(logo, values),
            Self::Combined(dims) => {
                dims.iter().all(|dim| dimension_matches(dim, network, bin, mcc, logo))
            }
        }
    }
}

fn longest_len(values: &[String]) -> u32 {
    values.iter().map(|v| v.len() as u32).max().unwrap_or(0)
}

fn matches_ci(actual: Option<&str>, values: &[String]) -> bool {
    actual.is_some_and(|actual| values.iter().any(|v| v.eq_ignore_ascii_case(actual)))
}

fn matches_exact(actual: Option<&str>, values: &[String]) -> bool {
    actual.is_some_and(|actual| values.iter().any(|v| v == actual))
}

fn matches_prefix(actual: Option<&str>, prefixes: &[String]) -> bool {
    actual.is_some_and(|actual| prefixes.iter().any(|p| actual.starts_with(p.as_str())))
}

fn dimension_matches(
    dim: &ScopeDimension,
    network: Option<&str>,
    bin: Option<&str>,
    mcc: Option<&str>,
    logo: Option<&str>,
) -> bool {
    match dim {
        ScopeDimension::Network(values) => matches_ci(network, values),
        ScopeDimension::Bin(values) => matches_prefix(bin, values),
        ScopeDimension::Mcc(values) => matches_exact(mcc, values),
        ScopeDimension::Logo(values) => matches_ci(logo, values),
    }
}

#[cfg(test)]
mod tests {
    use super::RuleScope;
    use super::ScopeDimension;

    #[test]
    fn bin_scope_outranks_network_scope_per_s1() {
        let bin = RuleScope::Bin(vec!["4111".to_string()]);
        let network = RuleScope::Network(vec!["VISA".to_string()]);
        assert!(bin.specificity() > network.specificity());
    }

    #[test]
    fn specificity_ordering_matches_table_in_spec() {
        assert!(RuleScope::Global.specificity() < RuleScope::Network(vec![]).specificity());
        assert!(
            RuleScope::Mcc(vec!["5411".to_string()]).specificity()
                < RuleScope::Logo(vec!["PLUS".to_string()]).specificity()
        );
        let combined = RuleScope::Combined(vec![
            ScopeDimension::Network(vec!["VISA".to_string()]),
            ScopeDimension::Mcc(vec!["5411".to_string()]),
        ]);
        assert!(combined.specificity() > RuleScope::Logo(vec!["PLUS".to_string()]).specificity());
    }

    #[test]
    fn bin_prefix_matches_transaction_bin_starting_with_scope_value() {
        let scope = RuleScope::Bin(vec!["4111".to_string()]);
        assert!(scope.matches(None, Some("411122"), None, None));
        assert!(!scope.matches(None, Some("555500"), None, None));
    }

    #[test]
    fn combined_scope_is_and_across_dimensions_or_within() {
        let scope = RuleScope::Combined(vec![
            ScopeDimension::Network(vec!["VISA".to_string(), "MC".to_string()]),
            ScopeDimension::Mcc(vec!["5411".to_string()]),
        ]);
        assert!(scope.matches(Some("visa"), None, Some("5411"), None));
        assert!(!scope.matches(Some("visa"), None, Some("5999"), None));
        assert!(!scope.matches(None, None, Some("5411"), None));
    }

    #[test]
    fn global_scope_matches_every_transaction() {
        assert!(RuleScope::Global.matches(None, None, None, None));
    }

    #[test]
    fn network_and_logo_scopes_match_case_insensitively() {
        let scope = RuleScope::Network(vec!["VISA".to_string()]);
        assert!(scope.matches(Some("visa"), None, None, None));
    }
}
