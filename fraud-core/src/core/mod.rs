// fraud-core/src/core/mod.rs
// ============================================================================
// Module: Core Types
// Description: Canonical fraud-decisioning data model.
// Purpose: Provide stable, serializable types for transactions, rules,
//          rulesets, and decisions. These are the source of truth for the
//          runtime engine and any derived adapters (HTTP, CLI).
// Dependencies: tri-logic, serde
// ============================================================================

//! ## Overview
//! Core types define the transaction model, condition/operator vocabulary,
//! rule and scope model, ruleset artifact shape, and the decision/velocity
//! result types. Compiled predicates and the registry/evaluator live in
//! [`crate::runtime`]; this module is declarative data only.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod condition;
pub mod decision;
pub mod field_registry;
pub mod hashing;
pub mod ids;
pub mod rule;
pub mod ruleset_spec;
pub mod scope;
pub mod transaction;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use condition::Condition;
pub use condition::ConditionOperand;
pub use condition::Operator;
pub use decision::ConditionTrace;
pub use decision::Decision;
pub use decision::DecisionOutcome;
pub use decision::DecisionReason;
pub use decision::EngineErrorCode;
pub use decision::EngineMetadata;
pub use decision::EngineMode;
pub use decision::EvaluationType;
pub use decision::MatchedRule;
pub use decision::TimingBreakdown;
pub use decision::VelocityResult;
pub use field_registry::FieldId;
pub use field_registry::FieldRegistry;
pub use field_registry::FieldRegistryVersion;
pub use field_registry::StandardField;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use ids::CountryCode;
pub use ids::RuleId;
pub use ids::RuleVersionId;
pub use ids::RulesetId;
pub use ids::RulesetKey;
pub use rule::Action;
pub use rule::Rule;
pub use rule::VelocityConfig;
pub use ruleset_spec::RulesetSpec;
pub use ruleset_spec::RulesetValidationError;
pub use scope::RuleScope;
pub use scope::ScopeDimension;
pub use transaction::FieldValue;
pub use transaction::Transaction;
