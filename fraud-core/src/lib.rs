// fraud-core/src/lib.rs
// ============================================================================
// Module: Fraud Core Library
// Description: Public API surface for the card-fraud decisioning engine.
// Purpose: Expose the data model, external interfaces, runtime, and
//          structured audit logging as one backend-agnostic library.
// Dependencies: crate::{core, interfaces, runtime, logging}
// ============================================================================

//! ## Overview
//! `fraud-core` provides a deterministic AUTH/MONITORING decisioning engine
//! for card-present and card-not-present transactions: a compiled rule
//! model with scope-specificity traversal (§3, §4.7), a velocity subsystem
//! batching sliding-window counter checks (§4.5), an async durable outbox for
//! at-least-once downstream delivery (§4.8), and load-shedding admission
//! control (§4.6). It is backend-agnostic: Redis, object storage, and
//! message-broker access are all behind traits in [`interfaces`], implemented
//! by adapter crates such as `fraud-redis`.

pub mod core;
pub mod interfaces;
pub mod logging;
pub mod runtime;

pub use core::*;

pub use interfaces::ArtifactManifest;
pub use interfaces::ArtifactStore;
pub use interfaces::ArtifactStoreError;
pub use interfaces::CounterOutcome;
pub use interfaces::CounterProbe;
pub use interfaces::CounterStore;
pub use interfaces::CounterStoreError;
pub use interfaces::DurableStream;
pub use interfaces::EventSink;
pub use interfaces::EventSinkError;
pub use interfaces::FileArtifactStore;
pub use interfaces::StreamEntry;
pub use interfaces::StreamError;
pub use logging::AuditLog;
pub use runtime::AdmissionPermit;
pub use runtime::BackpressurePolicy;
pub use runtime::CompiledPredicate;
pub use runtime::CompiledRule;
pub use runtime::EvaluatorConfig;
pub use runtime::FraudEngine;
pub use runtime::LoadSheddingGate;
pub use runtime::LoaderConfig;
pub use runtime::LoaderError;
pub use runtime::OutboxConfig;
pub use runtime::OutboxEnvelope;
pub use runtime::OutboxHandle;
pub use runtime::OutboxUnavailable;
pub use runtime::OutboxWorker;
pub use runtime::PollBackoff;
pub use runtime::PollOutcome;
pub use runtime::RuleEvaluator;
pub use runtime::Ruleset;
pub use runtime::RulesetLoader;
pub use runtime::RulesetRegistry;
pub use runtime::RulesetStatus;
pub use runtime::VelocityEngine;
pub use runtime::VelocityOutcome;
