// fraud-core/src/core/condition.rs
// ============================================================================
// Module: Condition and Operator Model
// Description: Declarative condition records and the operator vocabulary.
// Purpose: Parse-time representation consumed by the condition compiler
//          (runtime::condition_compiler), before any predicate is built.
// Dependencies: crate::core::transaction, serde
// ============================================================================

//! ## Overview
//! A [`Condition`] is `(field_name, operator, value|values)` as received from
//! a ruleset artifact (§3.2). [`Operator`] normalizes string aliases to a
//! single enumerant at parse time; the condition compiler (C2) turns a
//! `Condition` into a compiled predicate, never re-parsing at evaluation
//! time.

use serde::Deserialize;
use serde::Serialize;

use crate::core::transaction::FieldValue;

/// Supported condition operators (§3.2).
///
/// # Invariants
/// - Variants are stable for artifact (de)serialization.
/// - `from_alias`/`as_str` round-trip for every accepted alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Numeric greater-than.
    Gt,
    /// Numeric greater-than-or-equal.
    Gte,
    /// Numeric less-than.
    Lt,
    /// Numeric less-than-or-equal.
    Lte,
    /// Membership in a value set.
    In,
    /// Non-membership in a value set.
    NotIn,
    /// Inclusive numeric range.
    Between,
    /// Substring containment.
    Contains,
    /// Prefix match.
    StartsWith,
    /// Suffix match.
    EndsWith,
    /// Regular expression match.
    Regex,
    /// Field presence (distinguishes absent from present-but-null, §3.2).
    Exists,
}

impl Operator {
    /// Parses an operator from its canonical name or any accepted alias.
    /// Returns `None` for unrecognized strings; the condition compiler turns
    /// that into an always-false predicate rather than failing ruleset load.
    #[must_use]
    pub fn from_alias(raw: &str) -> Option<Self> {
        let normalized = raw.trim();
        Some(match normalized {
            "eq" | "EQ" | "=" | "==" | "equals" => Self::Eq,
            "ne" | "NE" | "!=" | "<>" | "not_equals" => Self::Ne,
            "gt" | "GT" | ">" => Self::Gt,
            "gte" | "GTE" | ">=" => Self::Gte,
            "lt" | "LT" | "<" => Self::Lt,
            "lte" | "LTE" | "<=" => Self::Lte,
            "in" | "IN" => Self::In,
            "not_in" | "NOT_IN" | "nin" => Self::NotIn,
            "between" | "BETWEEN" => Self::Between,
            "contains" | "CONTAINS" => Self::Contains,
            "starts_with" | "STARTS_WITH" | "startswith" => Self::StartsWith,
            "ends_with" | "ENDS_WITH" | "endswith" => Self::EndsWith,
            "regex" | "REGEX" | "matches" => Self::Regex,
            "exists" | "EXISTS" => Self::Exists,
            _ => return None,
        })
    }

    /// Returns the canonical string form of this operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Between => "between",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Regex => "regex",
            Self::Exists => "exists",
        }
    }

    /// Returns true for operators that compare values numerically
    /// (promoting numeric strings to `f64` per §3.2/§4.2).
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte | Self::Between)
    }
}

/// A condition operand: a single value, or a list for `IN`/`NOT_IN`/`BETWEEN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionOperand {
    /// A single scalar operand.
    Single(FieldValue),
    /// A list operand, used by `IN`, `NOT_IN`, and `BETWEEN` (as `[min, max]`).
    Many(Vec<FieldValue>),
}

impl ConditionOperand {
    /// Returns the operand as a slice regardless of its shape.
    #[must_use]
    pub fn as_slice(&self) -> &[FieldValue] {
        match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

/// Declarative condition as received from a ruleset artifact (§3.2).
///
/// # Invariants
/// - `field` is resolved against the [`crate::core::field_registry::FieldRegistry`]
///   at compile time, not at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Field name or alias to evaluate.
    pub field: String,
    /// Operator applied to the field value.
    pub operator: Operator,
    /// Operand(s) compared against the field value.
    pub value: ConditionOperand,
}

#[cfg(test)]
#[allow(clippy::expect_used, reason = "test-only panic-based assertions are permitted")]
mod tests {
    use super::Operator;

    #[test]
    fn alias_round_trips_to_canonical_form_and_back() {
        for alias in ["gt", "GT", ">"] {
            let op = Operator::from_alias(alias).expect("known alias");
            assert_eq!(op, Operator::Gt);
            let canonical = op.as_str();
            assert_eq!(Operator::from_alias(canonical), Some(op));
        }
    }

    #[test]
    fn unknown_alias_returns_none() {
        assert_eq!(Operator::from_alias("definitely_not_an_operator"), None);
    }

    #[test]
    fn numeric_operators_are_flagged_correctly() {
        assert!(Operator::Between.is_numeric());
        assert!(!Operator::Contains.is_numeric());
    }

    const ALL_OPERATORS: &[Operator] = &[
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::In,
        Operator::NotIn,
        Operator::Between,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Regex,
        Operator::Exists,
    ];

    fn operator_strategy() -> impl proptest::strategy::Strategy<Value = Operator> {
        proptest::sample::select(ALL_OPERATORS)
    }

    proptest::proptest! {
        /// `as_str`/`from_alias` round-trip for every operator variant (§8
        /// "for each accepted alias `a`, `fromString(toString(op)) == op`").
        #[test]
        #[allow(clippy::unwrap_used, reason = "test-only panic-based assertions are permitted")]
        fn operator_canonical_form_round_trips(op in operator_strategy()) {
            let canonical = op.as_str();
            assert_eq!(Operator::from_alias(canonical), Some(op));
            assert_eq!(Operator::from_alias(canonical).unwrap().as_str(), canonical);
        }
    }
}
