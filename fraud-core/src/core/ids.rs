// fraud-core/src/core/ids.rs
// ============================================================================
// Module: Stable Identifiers
// Description: Newtype wrappers for opaque string identifiers.
// Purpose: Give each identifier kind a distinct type so callers cannot pass a
//          rule id where a ruleset id is expected.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every identifier in this crate is a thin, serde-transparent newtype over
//! `String`. The pattern is generated once via [`declare_id_type`] rather than
//! hand-written per type, but the resulting API (`new`, `as_str`, `Display`,
//! `From<&str>`, `From<String>`) is the same shape throughout.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Declares a transparent string-backed identifier newtype.
macro_rules! declare_id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

declare_id_type!(
    /// Identifies a single rule within a ruleset.
    RuleId
);
declare_id_type!(
    /// Identifies a specific compiled version of a rule, stable across
    /// ruleset reloads that do not change that rule's body.
    RuleVersionId
);
declare_id_type!(
    /// Identifies a ruleset family, e.g. `CARD_AUTH` or `CARD_MONITORING`.
    RulesetKey
);
declare_id_type!(
    /// Identifies one installed ruleset instance (key + version + compile).
    RulesetId
);
declare_id_type!(
    /// ISO-3166 country code used for registry lookups; not validated here.
    CountryCode
);

#[cfg(test)]
mod tests {
    use super::RuleId;

    #[test]
    fn round_trips_through_string_conversions() {
        let id = RuleId::from("r-1");
        assert_eq!(id.as_str(), "r-1");
        assert_eq!(id.to_string(), "r-1");
        let owned: RuleId = String::from("r-2").into();
        assert_eq!(owned.as_str(), "r-2");
    }

    #[test]
    fn distinct_id_types_do_not_intermix() {
        use super::RulesetId;
        let rule = RuleId::new("x");
        let ruleset = RulesetId::new("x");
        assert_eq!(rule.as_str(), ruleset.as_str());
    }
}
