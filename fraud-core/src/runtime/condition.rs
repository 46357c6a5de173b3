// fraud-core/src/runtime/condition.rs
// ============================================================================
// Module: Condition Compiler
// Description: Compiles declarative conditions into allocation-free boolean
//              predicates over a transaction (§3.3, §4.2, C2).
// Purpose: Produce, once at ruleset load, the closures the evaluator calls on
//          every request; no interpreter loop or operator lookup at
//          evaluation time (§9).
// Dependencies: crate::core, regex
// ============================================================================

//! ## Overview
//! [`compile_condition`] turns a declarative [`Condition`] into a
//! [`CompiledPredicate`] — a boxed closure over `&Transaction` returning
//! `bool`. A rule's conditions are combined with short-circuit AND by
//! [`compile_rule_predicate`]. Unknown field names and invalid regex
//! patterns compile to an always-false predicate rather than failing
//! ruleset load (§4.2 steps 1 and 3).

use regex::Regex;

use crate::core::condition::Condition;
use crate::core::condition::ConditionOperand;
use crate::core::condition::Operator;
use crate::core::field_registry::FieldId;
use crate::core::field_registry::FieldRegistry;
use crate::core::transaction::FieldValue;
use crate::core::transaction::Transaction;

/// A compiled predicate over a transaction: pure, allocation-free, and safe
/// to share across threads (§3.3, §4.2 invariants).
pub type CompiledPredicate = Box<dyn Fn(&Transaction) -> bool + Send + Sync>;

/// Compiles one declarative condition into a predicate (§4.2).
///
/// Unknown field names and invalid regex patterns resolve to a predicate
/// that always returns `false`, matching §4.2 step 1/3: ruleset load never
/// fails for a single bad condition, and the hot path never throws.
#[must_use]
pub fn compile_condition(condition: &Condition, registry: &FieldRegistry) -> CompiledPredicate {
    let field_id = registry.resolve(&condition.field);
    if field_id.is_unknown() {
        return always_false();
    }
    match condition.operator {
        Operator::Eq => compile_eq(field_id, condition.value.clone()),
        Operator::Ne => compile_ne(field_id, condition.value.clone()),
        Operator::Gt => compile_numeric_cmp(field_id, &condition.value, |a, b| a > b),
        Operator::Gte => compile_numeric_cmp(field_id, &condition.value, |a, b| a >= b),
        Operator::Lt => compile_numeric_cmp(field_id, &condition.value, |a, b| a < b),
        Operator::Lte => compile_numeric_cmp(field_id, &condition.value, |a, b| a <= b),
        Operator::Between => compile_between(field_id, &condition.value),
        Operator::In => compile_in(field_id, condition.value.clone(), false),
        Operator::NotIn => compile_in(field_id, condition.value.clone(), true),
        Operator::Contains => compile_string_op(field_id, &condition.value, |a, b| a.contains(b)),
        Operator::StartsWith => {
            compile_string_op(field_id, &condition.value, str::starts_with)
        }
        Operator::EndsWith => compile_string_op(field_id, &condition.value, str::ends_with),
        Operator::Regex => compile_regex(field_id, &condition.value),
        Operator::Exists => compile_exists(field_id),
    }
}

/// Combines a rule's conditions with short-circuit AND (§3.3, §4.2 step 4).
/// A rule with zero conditions compiles to an always-true predicate.
#[must_use]
pub fn compile_rule_predicate(
    conditions: &[Condition],
    registry: &FieldRegistry,
) -> CompiledPredicate {
    let compiled: Vec<CompiledPredicate> =
        conditions.iter().map(|condition| compile_condition(condition, registry)).collect();
    Box::new(move |tx| compiled.iter().all(|predicate| predicate(tx)))
}

fn always_false() -> CompiledPredicate {
    Box::new(|_tx| false)
}

fn compile_eq(field_id: FieldId, operand: ConditionOperand) -> CompiledPredicate {
    let expected = single_value(&operand);
    Box::new(move |tx| {
        let Some(expected) = expected.as_ref() else { return false };
        tx.get_field(field_id).is_some_and(|actual| values_equal(actual, expected))
    })
}

fn compile_ne(field_id: FieldId, operand: ConditionOperand) -> CompiledPredicate {
    let expected = single_value(&operand);
    Box::new(move |tx| {
        let Some(expected) = expected.as_ref() else { return false };
        tx.get_field(field_id).is_some_and(|actual| !actual.is_null() && !values_equal(actual, expected))
    })
}

fn compile_numeric_cmp(
    field_id: FieldId,
    operand: &ConditionOperand,
    compare: fn(f64, f64) -> bool,
) -> CompiledPredicate {
    let Some(expected) = single_value(operand).and_then(|v| v.as_numeric()) else {
        return always_false();
    };
    Box::new(move |tx| {
        tx.get_field(field_id)
            .and_then(FieldValue::as_numeric)
            .is_some_and(|actual| compare(actual, expected))
    })
}

fn compile_between(field_id: FieldId, operand: &ConditionOperand) -> CompiledPredicate {
    let values = operand.as_slice();
    let (Some(a), Some(b)) = (values.first().and_then(FieldValue::as_numeric), values.get(1).and_then(FieldValue::as_numeric))
    else {
        return always_false();
    };
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    Box::new(move |tx| {
        tx.get_field(field_id)
            .and_then(FieldValue::as_numeric)
            .is_some_and(|actual| actual >= low && actual <= high)
    })
}

fn compile_in(field_id: FieldId, operand: ConditionOperand, negate: bool) -> CompiledPredicate {
    let values = match operand {
        ConditionOperand::Single(v) => vec![v],
        ConditionOperand::Many(v) => v,
    };
    if values.is_empty() {
        // IN with empty list never matches; NOT_IN with empty list always matches (§8).
        return Box::new(move |_tx| negate);
    }
    if values.len() >= 8 {
        let set: std::collections::HashSet<String> =
            values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
        let numeric_set: Vec<f64> = values.iter().filter_map(FieldValue::as_numeric).collect();
        return Box::new(move |tx| {
            let Some(actual) = tx.get_field(field_id) else { return false };
            if actual.is_null() {
                return false;
            }
            let hit = actual
                .as_str()
                .is_some_and(|s| set.contains(s))
                || actual.as_numeric().is_some_and(|n| numeric_set.iter().any(|v| (*v - n).abs() < f64::EPSILON));
            hit != negate
        });
    }
    Box::new(move |tx| {
        let Some(actual) = tx.get_field(field_id) else { return false };
        if actual.is_null() {
            return false;
        }
        let hit = values.iter().any(|v| values_equal(actual, v));
        hit != negate
    })
}

fn compile_string_op(
    field_id: FieldId,
    operand: &ConditionOperand,
    op: fn(&str, &str) -> bool,
) -> CompiledPredicate {
    let Some(expected) = single_value(operand).and_then(|v| v.as_str().map(str::to_string)) else {
        return always_false();
    };
    Box::new(move |tx| {
        tx.get_field(field_id).and_then(FieldValue::as_str).is_some_and(|actual| op(actual, &expected))
    })
}

fn compile_regex(field_id: FieldId, operand: &ConditionOperand) -> CompiledPredicate {
    let Some(pattern) = single_value(operand).and_then(|v| v.as_str().map(str::to_string)) else {
        return always_false();
    };
    match Regex::new(&pattern) {
        Ok(re) => Box::new(move |tx| {
            tx.get_field(field_id).and_then(FieldValue::as_str).is_some_and(|actual| re.is_match(actual))
        }),
        // Invalid pattern: never throw on the hot path (§4.2 step 3).
        Err(_) => always_false(),
    }
}

fn compile_exists(field_id: FieldId) -> CompiledPredicate {
    // EXISTS distinguishes absent (false) from present-but-null (true), §3.2/§8.
    Box::new(move |tx| tx.get_field(field_id).is_some())
}

fn single_value(operand: &ConditionOperand) -> Option<FieldValue> {
    match operand {
        ConditionOperand::Single(value) => Some(value.clone()),
        ConditionOperand::Many(values) => values.first().cloned(),
    }
}

/// No implicit type coercion for non-numeric comparisons: a type mismatch
/// between actual and expected yields non-match, never a coercion (§3.2).
fn values_equal(actual: &FieldValue, expected: &FieldValue) -> bool {
    match (actual, expected) {
        (FieldValue::Str(a), FieldValue::Str(b)) => a == b,
        (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
        (FieldValue::Float(a), FieldValue::Float(b)) => (a - b).abs() < f64::EPSILON,
        (FieldValue::Int(a), FieldValue::Float(b)) | (FieldValue::Float(b), FieldValue::Int(a)) => {
            (*a as f64 - b).abs() < f64::EPSILON
        }
        (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::compile_condition;
    use crate::core::condition::Condition;
    use crate::core::condition::ConditionOperand;
    use crate::core::condition::Operator;
    use crate::core::field_registry::FieldRegistry;
    use crate::core::transaction::FieldValue;
    use crate::core::transaction::Transaction;

    fn tx_with_amount(registry: &FieldRegistry, amount: f64) -> Transaction {
        let mut tx = Transaction::new(registry);
        tx.set_field(registry.resolve("amount"), amount);
        tx
    }

    #[test]
    fn gt_matches_above_threshold() {
        let registry = FieldRegistry::new();
        let cond = Condition {
            field: "amount".to_string(),
            operator: Operator::Gt,
            value: ConditionOperand::Single(FieldValue::Float(1000.0)),
        };
        let predicate = compile_condition(&cond, &registry);
        assert!(predicate(&tx_with_amount(&registry, 1500.0)));
        assert!(!predicate(&tx_with_amount(&registry, 500.0)));
    }

    #[test]
    fn between_is_inclusive_at_exact_bounds() {
        let registry = FieldRegistry::new();
        let cond = Condition {
            field: "amount".to_string(),
            operator: Operator::Between,
            value: ConditionOperand::Many(vec![FieldValue::Float(100.0), FieldValue::Float(200.0)]),
        };
        let predicate = compile_condition(&cond, &registry);
        assert!(predicate(&tx_with_amount(&registry, 100.0)));
        assert!(predicate(&tx_with_amount(&registry, 200.0)));
        assert!(!predicate(&tx_with_amount(&registry, 99.9)));
    }

    #[test]
    fn between_tolerates_swapped_bounds() {
        let registry = FieldRegistry::new();
        let cond = Condition {
            field: "amount".to_string(),
            operator: Operator::Between,
            value: ConditionOperand::Many(vec![FieldValue::Float(200.0), FieldValue::Float(100.0)]),
        };
        let predicate = compile_condition(&cond, &registry);
        assert!(predicate(&tx_with_amount(&registry, 150.0)));
    }

    #[test]
    fn exists_distinguishes_absent_from_present_null() {
        let registry = FieldRegistry::new();
        let cond = Condition {
            field: "email".to_string(),
            operator: Operator::Exists,
            value: ConditionOperand::Single(FieldValue::Null),
        };
        let predicate = compile_condition(&cond, &registry);
        let mut tx = Transaction::new(&registry);
        assert!(!predicate(&tx));
        tx.set_field(registry.resolve("email"), FieldValue::Null);
        assert!(predicate(&tx));
    }

    #[test]
    fn comparison_operators_never_match_undefined_or_null() {
        let registry = FieldRegistry::new();
        let cond = Condition {
            field: "amount".to_string(),
            operator: Operator::Eq,
            value: ConditionOperand::Single(FieldValue::Float(10.0)),
        };
        let predicate = compile_condition(&cond, &registry);
        let tx = Transaction::new(&registry);
        assert!(!predicate(&tx));
    }

    #[test]
    fn in_with_empty_list_never_matches_not_in_always_matches() {
        let registry = FieldRegistry::new();
        let in_cond = Condition {
            field: "amount".to_string(),
            operator: Operator::In,
            value: ConditionOperand::Many(vec![]),
        };
        let not_in_cond = Condition {
            field: "amount".to_string(),
            operator: Operator::NotIn,
            value: ConditionOperand::Many(vec![]),
        };
        let tx = tx_with_amount(&registry, 10.0);
        assert!(!compile_condition(&in_cond, &registry)(&tx));
        assert!(compile_condition(&not_in_cond, &registry)(&tx));
    }

    #[test]
    fn unknown_field_name_compiles_to_always_false() {
        let registry = FieldRegistry::new();
        let cond = Condition {
            field: "not_a_field".to_string(),
            operator: Operator::Eq,
            value: ConditionOperand::Single(FieldValue::Str("x".to_string())),
        };
        let predicate = compile_condition(&cond, &registry);
        assert!(!predicate(&tx_with_amount(&registry, 10.0)));
    }

    #[test]
    fn invalid_regex_compiles_to_always_false_without_panicking() {
        let registry = FieldRegistry::new();
        let cond = Condition {
            field: "email".to_string(),
            operator: Operator::Regex,
            value: ConditionOperand::Single(FieldValue::Str("(unclosed".to_string())),
        };
        let predicate = compile_condition(&cond, &registry);
        assert!(!predicate(&Transaction::new(&registry)));
    }

    #[test]
    fn type_mismatch_yields_non_match_without_coercion() {
        let registry = FieldRegistry::new();
        let cond = Condition {
            field: "card_present".to_string(),
            operator: Operator::Eq,
            value: ConditionOperand::Single(FieldValue::Str("true".to_string())),
        };
        let mut tx = Transaction::new(&registry);
        tx.set_field(registry.resolve("card_present"), true);
        let predicate = compile_condition(&cond, &registry);
        assert!(!predicate(&tx));
    }

    #[test]
    fn ne_yields_non_match_on_undefined_and_null() {
        let registry = FieldRegistry::new();
        let cond = Condition {
            field: "card_network".to_string(),
            operator: Operator::Ne,
            value: ConditionOperand::Single(FieldValue::Str("VISA".to_string())),
        };
        let predicate = compile_condition(&cond, &registry);

        // Undefined (absent): never match, never raise (§3.2, §8 property 6).
        assert!(!predicate(&Transaction::new(&registry)));

        // Present-but-null: still non-match, not the vacuous "!= VISA" truth.
        let mut tx = Transaction::new(&registry);
        tx.set_field(registry.resolve("card_network"), FieldValue::Null);
        assert!(!predicate(&tx));

        // Sanity: an actually different value still matches NE.
        let mut tx = Transaction::new(&registry);
        tx.set_field(registry.resolve("card_network"), "MASTERCARD");
        assert!(predicate(&tx));
    }

    #[test]
    fn not_in_yields_non_match_on_undefined_and_null_for_nonempty_list() {
        let registry = FieldRegistry::new();
        let cond = Condition {
            field: "card_network".to_string(),
            operator: Operator::NotIn,
            value: ConditionOperand::Many(vec![FieldValue::Str("VISA".to_string()), FieldValue::Str("MASTERCARD".to_string())]),
        };
        let predicate = compile_condition(&cond, &registry);

        // Undefined (absent): non-match, not the "not in the list" vacuous match.
        assert!(!predicate(&Transaction::new(&registry)));

        // Present-but-null: also non-match.
        let mut tx = Transaction::new(&registry);
        tx.set_field(registry.resolve("card_network"), FieldValue::Null);
        assert!(!predicate(&tx));

        // Sanity: a genuinely absent-from-list value still matches NOT_IN.
        let mut tx = Transaction::new(&registry);
        tx.set_field(registry.resolve("card_network"), "AMEX");
        assert!(predicate(&tx));
    }

    #[test]
    fn not_in_yields_non_match_on_null_for_large_prehashed_list() {
        // ≥ 8 values takes the prehashed-set branch (§4.2 step 3); null/undefined
        // safety must hold there too.
        let registry = FieldRegistry::new();
        let values: Vec<FieldValue> = (0..10).map(|n| FieldValue::Str(format!("NET{n}"))).collect();
        let cond =
            Condition { field: "card_network".to_string(), operator: Operator::NotIn, value: ConditionOperand::Many(values) };
        let predicate = compile_condition(&cond, &registry);

        assert!(!predicate(&Transaction::new(&registry)));

        let mut tx = Transaction::new(&registry);
        tx.set_field(registry.resolve("card_network"), FieldValue::Null);
        assert!(!predicate(&tx));
    }

    proptest::proptest! {
        /// BETWEEN is inclusive at both bounds regardless of operand order
        /// (§8 "BETWEEN at exact bounds matches (inclusive)", §4.2 step 3
        /// "tolerate swapped bounds").
        #[test]
        fn between_is_inclusive_and_order_independent(a in -1_000_000.0f64..1_000_000.0, b in -1_000_000.0f64..1_000_000.0) {
            let registry = FieldRegistry::new();
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            for (first, second) in [(a, b), (b, a)] {
                let cond = Condition {
                    field: "amount".to_string(),
                    operator: Operator::Between,
                    value: ConditionOperand::Many(vec![FieldValue::Float(first), FieldValue::Float(second)]),
                };
                let predicate = compile_condition(&cond, &registry);
                assert!(predicate(&tx_with_amount(&registry, low)));
                assert!(predicate(&tx_with_amount(&registry, high)));
                if high > low {
                    assert!(!predicate(&tx_with_amount(&registry, low - 1.0)));
                    assert!(!predicate(&tx_with_amount(&registry, high + 1.0)));
                }
            }
        }
    }
}
