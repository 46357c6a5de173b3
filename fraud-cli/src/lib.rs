// fraud-cli/src/lib.rs
// ============================================================================
// Module: Fraud CLI Library
// Description: CLI-local assembly helpers shared between the binary entry
//              point and its tests.
// Purpose: Build the transaction and wiring types `main.rs` needs from
//          on-disk JSON without duplicating that logic in every subcommand.
// Dependencies: fraud-core, serde_json
// ============================================================================

//! ## Overview
//! Everything here is assembly, not decisioning: turning a JSON object into a
//! [`fraud_core::Transaction`], nothing more. The decisioning logic itself
//! lives entirely in `fraud-core`; this crate only wires it to a terminal.

use std::collections::HashMap;

use fraud_core::FieldRegistry;
use fraud_core::FieldValue;
use fraud_core::Transaction;

/// Builds a [`Transaction`] from a flat JSON object of field name to value,
/// routing names the registry recognizes to their stable [`fraud_core::FieldId`]
/// and everything else to the transaction's custom-field map.
#[must_use]
pub fn build_transaction(registry: &FieldRegistry, fields: HashMap<String, FieldValue>) -> Transaction {
    let mut transaction = Transaction::new(registry);
    for (name, value) in fields {
        let id = registry.resolve(&name);
        if id.is_unknown() {
            transaction.set_custom_field(name, value);
        } else {
            transaction.set_field(id, value);
        }
    }
    transaction
}

#[cfg(test)]
mod tests {
    use super::build_transaction;
    use fraud_core::FieldRegistry;
    use fraud_core::FieldValue;

    #[test]
    fn known_field_name_lands_in_fixed_slot_and_custom_field_in_the_map() {
        let registry = FieldRegistry::new();
        let mut fields = std::collections::HashMap::new();
        fields.insert("amount".to_string(), FieldValue::Float(12.5));
        fields.insert("loyalty_tier".to_string(), FieldValue::Str("gold".to_string()));

        let transaction = build_transaction(&registry, fields);

        let amount_id = registry.resolve("amount");
        assert_eq!(transaction.get_field(amount_id), Some(&FieldValue::Float(12.5)));
        assert_eq!(transaction.get_custom_field("loyalty_tier"), Some(&FieldValue::Str("gold".to_string())));
    }
}
