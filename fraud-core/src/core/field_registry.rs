// fraud-core/src/core/field_registry.rs
// ============================================================================
// Module: Field Registry
// Description: Stable integer field IDs for transaction fields.
// Purpose: Give every standard transaction field an allocation-free, O(1)
//          access path and a version the loader can check rulesets against.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Field IDs are a version-coupled contract with rule governance: a ruleset
//! compiled against field registry version N is rejected by a runtime at a
//! different version (§6.7), unless the ruleset's version is absent (legacy).
//! ID 0 is reserved for "unknown field"; standard IDs are contiguous from 1.

use std::fmt;

/// A stable integer field identifier. `0` means "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub u16);

impl FieldId {
    /// The reserved "unknown field" identifier.
    pub const UNKNOWN: Self = Self(0);

    /// Returns true if this is the reserved unknown-field sentinel.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version of the field registry a ruleset was compiled against.
pub type FieldRegistryVersion = u32;

/// Declares the standard field list. Order fixes the assigned `FieldId`s and
/// must never change; new fields are appended, never inserted or renumbered.
macro_rules! standard_fields {
    ($($variant:ident => $canonical:literal $(, aliases: [$($alias:literal),* $(,)?])? );+ $(;)?) => {
        /// Enumerates the standard transaction fields in assignment order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(missing_docs, reason = "variant names mirror the canonical field names below")]
        pub enum StandardField {
            $($variant),+
        }

        impl StandardField {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Returns the canonical field name.
            #[must_use]
            pub const fn canonical_name(self) -> &'static str {
                match self {
                    $(Self::$variant => $canonical),+
                }
            }

            /// Returns the stable field id for this standard field.
            #[must_use]
            pub fn field_id(self) -> FieldId {
                FieldId((Self::ALL.iter().position(|f| *f == self).unwrap_or(0) as u16) + 1)
            }
        }

        fn resolve_standard(name: &str) -> Option<StandardField> {
            $(
                if name.eq_ignore_ascii_case($canonical) {
                    return Some(StandardField::$variant);
                }
                $($(
                    if name.eq_ignore_ascii_case($alias) {
                        return Some(StandardField::$variant);
                    }
                )*)?
            )+
            None
        }
    };
}

standard_fields! {
    TransactionId => "transaction_id";
    CardHash => "card_hash";
    Amount => "amount";
    Currency => "currency";
    MerchantId => "merchant_id";
    MerchantName => "merchant_name";
    MerchantCategory => "merchant_category";
    MerchantCategoryCode => "merchant_category_code", aliases: ["mcc"];
    CardPresent => "card_present";
    TransactionType => "transaction_type";
    EntryMode => "entry_mode";
    CountryCode => "country_code";
    IpAddress => "ip_address";
    DeviceId => "device_id";
    Email => "email";
    Phone => "phone";
    Timestamp => "timestamp";
    BillingCity => "billing_city";
    BillingCountry => "billing_country";
    BillingPostalCode => "billing_postal_code";
    ShippingCity => "shipping_city";
    ShippingCountry => "shipping_country";
    ShippingPostalCode => "shipping_postal_code";
    CardNetwork => "card_network";
    CardBin => "card_bin", aliases: ["bin"];
    CardLogo => "card_logo";
}

/// Registry mapping field names (and aliases) to stable [`FieldId`]s.
///
/// # Invariants
/// - Standard field IDs never change across registry versions.
/// - `version` changes only when the standard field set itself changes.
#[derive(Debug, Clone, Copy)]
pub struct FieldRegistry {
    version: FieldRegistryVersion,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldRegistry {
    /// The current field registry version shipped by this crate.
    pub const CURRENT_VERSION: FieldRegistryVersion = 1;

    /// Number of standard fields, i.e. the size of the fixed field array.
    pub const STANDARD_FIELD_COUNT: usize = StandardField::ALL.len();

    /// Creates the registry at [`Self::CURRENT_VERSION`].
    #[must_use]
    pub const fn new() -> Self {
        Self { version: Self::CURRENT_VERSION }
    }

    /// Returns this registry's version.
    #[must_use]
    pub const fn version(&self) -> FieldRegistryVersion {
        self.version
    }

    /// Resolves a field name or alias to its stable ID. Returns
    /// [`FieldId::UNKNOWN`] for unrecognized names; the condition compiler
    /// turns that into an always-false predicate rather than erroring.
    #[must_use]
    pub fn resolve(&self, name: &str) -> FieldId {
        resolve_standard(name).map_or(FieldId::UNKNOWN, StandardField::field_id)
    }

    /// Returns the canonical name for a standard field id, if any.
    #[must_use]
    pub fn name_for(&self, id: FieldId) -> Option<&'static str> {
        StandardField::ALL
            .iter()
            .find(|field| field.field_id() == id)
            .map(|field| field.canonical_name())
    }

    /// Returns true if `version` is compatible with this runtime's registry.
    /// A `None` version is treated as legacy and always accepted.
    #[must_use]
    pub fn is_compatible(&self, ruleset_version: Option<FieldRegistryVersion>) -> bool {
        ruleset_version.is_none_or(|v| v == self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::FieldId;
    use super::FieldRegistry;

    #[test]
    fn alias_resolves_to_same_id_as_canonical_name() {
        let registry = FieldRegistry::new();
        assert_eq!(registry.resolve("mcc"), registry.resolve("merchant_category_code"));
        assert_eq!(registry.resolve("bin"), registry.resolve("card_bin"));
    }

    #[test]
    fn unknown_field_name_resolves_to_unknown_id() {
        let registry = FieldRegistry::new();
        assert_eq!(registry.resolve("not_a_real_field"), FieldId::UNKNOWN);
        assert!(registry.resolve("not_a_real_field").is_unknown());
    }

    #[test]
    fn name_round_trips_for_every_standard_field() {
        let registry = FieldRegistry::new();
        for raw in [
            "transaction_id",
            "card_hash",
            "amount",
            "card_bin",
            "card_network",
            "card_logo",
            "merchant_category_code",
        ] {
            let id = registry.resolve(raw);
            assert_eq!(registry.name_for(id), Some(raw));
        }
    }

    #[test]
    fn compatibility_accepts_legacy_and_matching_versions() {
        let registry = FieldRegistry::new();
        assert!(registry.is_compatible(None));
        assert!(registry.is_compatible(Some(FieldRegistry::CURRENT_VERSION)));
        assert!(!registry.is_compatible(Some(FieldRegistry::CURRENT_VERSION + 1)));
    }

    proptest::proptest! {
        /// For every standard field `n`, `name(id(n)) == n` (§8 "Field ID
        /// round-trip"), checked across the whole standard field table rather
        /// than a hand-picked subset.
        #[test]
        fn standard_field_name_round_trips_for_every_field(index in 0..super::StandardField::ALL.len()) {
            let registry = FieldRegistry::new();
            let field = super::StandardField::ALL[index];
            let canonical = field.canonical_name();
            let id = registry.resolve(canonical);
            assert_eq!(id, field.field_id());
            assert_eq!(registry.name_for(id), Some(canonical));
        }
    }
}
