// fraud-core/src/core/transaction.rs
// ============================================================================
// Module: Transaction Model
// Description: Canonical transaction representation with O(1) field access.
// Purpose: Give the evaluator allocation-free reads of typed transaction
//          fields by stable integer id (§3.1, §4.1).
// Dependencies: crate::core::field_registry, serde, std::collections::HashMap
// ============================================================================

//! ## Overview
//! A transaction stores one [`FieldValue`] per standard field in a
//! fixed-size array indexed by [`FieldId`], plus a `custom_fields` map for
//! caller-defined extras. Once built, a transaction is immutable for the
//! remainder of the request (§3.1 Lifecycle) — evaluation never mutates it.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::field_registry::FieldId;
use crate::core::field_registry::FieldRegistry;

/// A typed transaction field value.
///
/// # Invariants
/// - `Timestamp` carries the raw string; parsing into a structured time is
///   deferred to first read and is not performed by this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// UTF-8 string value.
    Str(String),
    /// Signed 64-bit integer value.
    Int(i64),
    /// Floating point value (also used for decimal amounts).
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// Explicit null, distinct from an absent field for `EXISTS` (§3.2).
    Null,
}

impl FieldValue {
    /// Returns the value as a string slice, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the value coerced to `f64` for numeric comparison.
    ///
    /// Per §3.2, numeric strings coerce to floating point for numeric
    /// operators; non-numeric strings, bools, and null do not coerce.
    #[must_use]
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Str(value) => value.trim().parse::<f64>().ok(),
            Self::Bool(_) | Self::Null => None,
        }
    }

    /// Returns true if this value is the explicit null sentinel.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Canonical transaction under evaluation.
///
/// # Invariants
/// - Standard fields are stored in a fixed-size array sized to
///   [`FieldRegistry::STANDARD_FIELD_COUNT`]; `get_field`/`set_field` by id
///   never allocate or hash.
/// - Immutable after construction; the evaluator takes `&Transaction`.
#[derive(Debug, Clone)]
pub struct Transaction {
    fields: Vec<Option<FieldValue>>,
    custom_fields: HashMap<String, FieldValue>,
}

impl Transaction {
    /// Creates an empty transaction sized to the given registry.
    #[must_use]
    pub fn new(registry: &FieldRegistry) -> Self {
        let _ = registry;
        Self {
            fields: vec![None; FieldRegistry::STANDARD_FIELD_COUNT + 1],
            custom_fields: HashMap::new(),
        }
    }

    /// Reads a standard field by id. `FieldId::UNKNOWN` always reads `None`.
    #[must_use]
    pub fn get_field(&self, id: FieldId) -> Option<&FieldValue> {
        if id.is_unknown() {
            return None;
        }
        self.fields.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Sets a standard field by id. Setting `FieldId::UNKNOWN` is a no-op.
    pub fn set_field(&mut self, id: FieldId, value: impl Into<FieldValue>) {
        if id.is_unknown() {
            return;
        }
        if let Some(slot) = self.fields.get_mut(id.0 as usize) {
            *slot = Some(value.into());
        }
    }

    /// Reads a caller-defined custom field by name.
    #[must_use]
    pub fn get_custom_field(&self, name: &str) -> Option<&FieldValue> {
        self.custom_fields.get(name)
    }

    /// Sets a caller-defined custom field by name.
    pub fn set_custom_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.custom_fields.insert(name.into(), value.into());
    }

    /// Resolves a field by name against the registry, falling back to
    /// custom fields when the registry does not recognize the name.
    #[must_use]
    pub fn get_by_name(&self, registry: &FieldRegistry, name: &str) -> Option<&FieldValue> {
        let id = registry.resolve(name);
        if id.is_unknown() {
            self.get_custom_field(name)
        } else {
            self.get_field(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FieldValue;
    use super::Transaction;
    use crate::core::field_registry::FieldRegistry;

    #[test]
    fn set_and_get_field_round_trips() {
        let registry = FieldRegistry::new();
        let mut tx = Transaction::new(&registry);
        let amount_id = registry.resolve("amount");
        tx.set_field(amount_id, 1500.0);
        assert_eq!(tx.get_field(amount_id), Some(&FieldValue::Float(1500.0)));
    }

    #[test]
    fn unknown_field_id_always_reads_none() {
        let registry = FieldRegistry::new();
        let tx = Transaction::new(&registry);
        assert_eq!(tx.get_field(registry.resolve("not_a_field")), None);
    }

    #[test]
    fn numeric_string_coerces_to_float() {
        let value = FieldValue::Str("42.5".to_string());
        assert_eq!(value.as_numeric(), Some(42.5));
    }

    #[test]
    fn non_numeric_string_does_not_coerce() {
        let value = FieldValue::Str("visa".to_string());
        assert_eq!(value.as_numeric(), None);
    }

    #[test]
    fn custom_field_falls_back_when_name_unknown_to_registry() {
        let registry = FieldRegistry::new();
        let mut tx = Transaction::new(&registry);
        tx.set_custom_field("risk_segment", "high");
        assert_eq!(
            tx.get_by_name(&registry, "risk_segment"),
            Some(&FieldValue::Str("high".to_string()))
        );
    }

    #[test]
    fn present_null_differs_from_absent_for_callers_checking_is_null() {
        let registry = FieldRegistry::new();
        let mut tx = Transaction::new(&registry);
        let id = registry.resolve("email");
        assert_eq!(tx.get_field(id), None);
        tx.set_field(id, FieldValue::Null);
        assert!(tx.get_field(id).is_some_and(FieldValue::is_null));
    }
}
