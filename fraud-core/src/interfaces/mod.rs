// fraud-core/src/interfaces/mod.rs
// ============================================================================
// Module: External Interfaces
// Description: Backend-agnostic contracts for the artifact store, counter
//              store, durable stream, and downstream event sink (§6).
// Purpose: Let the runtime (loader, velocity engine, outbox) depend on traits
//          rather than concrete Redis/HTTP/object-storage clients. Concrete
//          implementations live in adapter crates (e.g. `fraud-redis`) or the
//          CLI binary, never here.
// Dependencies: crate::core, async_trait, serde
// ============================================================================

//! ## Overview
//! Every dependency the core evaluator calls out to — the artifact store
//! (§6.2), the counter store (§6.3), the durable stream (§6.4), and the
//! downstream event sink (§6.5) — is specified here as a trait. The core
//! never constructs a Redis connection, an HTTP client, or an S3 client
//! itself; adapters are supplied by the binary that assembles the engine.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::RulesetKey;

pub mod file_store;
pub use file_store::FileArtifactStore;

// ============================================================================
// SECTION: Artifact Store (§6.2, C5)
// ============================================================================

/// Manifest document for one `(ruleset_key, environment)` pair (§6.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Monotonic ruleset version this manifest points to.
    pub version: u32,
    /// Location of the compiled artifact, opaque to the runtime.
    pub artifact_uri: String,
    /// Lowercase hex SHA-256 checksum of the artifact bytes.
    pub checksum: String,
    /// Schema version the artifact was authored against.
    pub schema_version: u32,
    /// RFC 3339 publish timestamp.
    pub published_at: String,
}

/// Errors raised fetching manifests or artifacts (§4.4, §7 loader-local
/// variants: never surfaced on the request path).
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    /// The manifest could not be fetched (network, not-found, etc.).
    #[error("manifest fetch failed for {key}/{environment}: {detail}")]
    ManifestFetch {
        /// Ruleset key that was requested.
        key: String,
        /// Deployment environment that was requested.
        environment: String,
        /// Human-readable failure detail.
        detail: String,
    },
    /// The artifact body could not be fetched from `artifact_uri`.
    #[error("artifact fetch failed for {uri}: {detail}")]
    ArtifactFetch {
        /// Artifact URI that was requested.
        uri: String,
        /// Human-readable failure detail.
        detail: String,
    },
}

/// Manifest-driven artifact store the loader (C5) polls and fetches from.
///
/// Implementations are thin adapters over object storage; the runtime only
/// relies on the two operations below (§6.2 "the runtime relies only on the
/// manifest fields above").
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetches the current manifest for a ruleset key in an environment.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::ManifestFetch`] when the manifest cannot
    /// be retrieved.
    async fn fetch_manifest(
        &self,
        key: &RulesetKey,
        environment: &str,
    ) -> Result<ArtifactManifest, ArtifactStoreError>;

    /// Fetches the raw artifact body referenced by a manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::ArtifactFetch`] when the bytes cannot be
    /// retrieved.
    async fn fetch_artifact(&self, uri: &str) -> Result<Vec<u8>, ArtifactStoreError>;
}

// ============================================================================
// SECTION: Counter Store (§6.3, C6)
// ============================================================================

/// One velocity counter probe: a key, its sliding window, and its threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterProbe {
    /// Fully-qualified counter key, e.g. `velocity:{rule_id}:{dimension_value}`.
    pub key: String,
    /// Sliding window width in seconds.
    pub window_seconds: u32,
}

/// Outcome of one counter probe after the atomic increment (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterOutcome {
    /// Counter value after increment.
    pub count: u64,
    /// TTL remaining on the key in seconds, if the store can report it.
    pub ttl_remaining: Option<u32>,
}

/// Errors raised by the counter store (§7: surfaces as `REDIS_UNAVAILABLE`).
#[derive(Debug, Error)]
pub enum CounterStoreError {
    /// The store is unreachable or the call exceeded its deadline.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// Atomic multi-key sliding-window counter store (§4.5, §6.3).
///
/// A single call increments every key in `probes` and arms its expiry on
/// first increment, in one round trip, so that N counters cost one network
/// call regardless of N (§4.5 "Implemented as a single server-side script").
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments every probe's key (arming `EXPIRE` on the first
    /// increment) and returns one [`CounterOutcome`] per probe, in order.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError::Unavailable`] if the store cannot be
    /// reached within the caller's deadline; per §4.5 this must never leave
    /// a partial increment across the batch.
    async fn check_and_increment(
        &self,
        probes: &[CounterProbe],
    ) -> Result<Vec<CounterOutcome>, CounterStoreError>;
}

// ============================================================================
// SECTION: Durable Stream (§6.4, C8)
// ============================================================================

/// One durably-appended stream entry, as read back by the outbox worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Server-assigned entry id, stable across process restarts.
    pub entry_id: String,
    /// Raw envelope payload, as appended.
    pub payload: Vec<u8>,
}

/// Errors raised by the durable stream (§7: surfaces as `OUTBOX_UNAVAILABLE`
/// only under the strict backpressure policy).
#[derive(Debug, Error)]
pub enum StreamError {
    /// The stream backend is unreachable.
    #[error("durable stream unavailable: {0}")]
    Unavailable(String),
}

/// Durable, consumer-group-readable append log backing the outbox (§4.8,
/// §6.4). Retention must survive process restarts; acknowledgement is
/// explicit and pending entries can be claimed back after a stale age.
#[async_trait]
pub trait DurableStream: Send + Sync {
    /// Appends one envelope and returns the server-assigned entry id.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unavailable`] when the append cannot complete.
    async fn append(&self, payload: Vec<u8>) -> Result<String, StreamError>;

    /// Reads up to `max` new (never-delivered) entries for this consumer
    /// group, identified by `consumer_name` (§4.8 "Unique consumer names per
    /// instance").
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unavailable`] when the read cannot complete.
    async fn read_new(
        &self,
        consumer_name: &str,
        max: usize,
    ) -> Result<Vec<StreamEntry>, StreamError>;

    /// Acknowledges successful processing of an entry.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unavailable`] when the acknowledgement cannot
    /// complete.
    async fn ack(&self, entry_id: &str) -> Result<(), StreamError>;

    /// Claims pending entries idle for at least `min_idle_ms`, for
    /// pending-recovery (§4.8 "Pending recovery (required)").
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unavailable`] when the claim cannot complete.
    async fn claim_stale(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        max: usize,
    ) -> Result<Vec<StreamEntry>, StreamError>;
}

// ============================================================================
// SECTION: Downstream Event Sink (§6.5, C8)
// ============================================================================

/// Errors raised publishing to the downstream event sink.
#[derive(Debug, Error)]
pub enum EventSinkError {
    /// The sink rejected the publish or the call exceeded its deadline.
    #[error("event sink publish failed: {0}")]
    PublishFailed(String),
}

/// Downstream broker publish surface (§6.5): idempotent-producer semantics,
/// bounded send timeout. Only ever called from the outbox worker, never the
/// AUTH request thread (§5 "No I/O to the downstream broker on the AUTH
/// thread").
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publishes one decision event, serialized by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`EventSinkError::PublishFailed`] when the publish cannot be
    /// confirmed.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), EventSinkError>;
}
