// fraud-config/src/lib.rs
// ============================================================================
// Module: Fraud Config Library
// Description: Typed configuration model, TOML loading, and validation for
//              every tunable named across fraud-core's components (§10.1).
// Purpose: Single source of truth for `fraud.toml` semantics; the only crate
//          that parses configuration text.
// Dependencies: crate::config, fraud_core, serde, toml
// ============================================================================

//! ## Overview
//! `fraud-config` defines the canonical configuration model for the fraud
//! decisioning runtime: one `Config` assembled from per-component sections,
//! each with `Default` impls matching the defaults named in fraud-core's own
//! component docs, and a `validate()` pass that fails closed on impossible
//! combinations before any engine component is constructed from it.

pub mod config;

pub use config::BackpressureChoice;
pub use config::Config;
pub use config::ConfigError;
pub use config::EvaluatorSection;
pub use config::LoadSheddingSection;
pub use config::LoaderSection;
pub use config::OutboxSection;
pub use config::RedisSection;
pub use config::VelocitySection;
