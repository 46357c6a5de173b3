// fraud-core/src/runtime/loader.rs
// ============================================================================
// Module: Ruleset Loader
// Description: Manifest-driven artifact polling, checksum verification, and
//              hot install into the registry (§4.4, C5).
// Purpose: Keep the registry (C4) current without ever blocking AUTH on I/O;
//          a failed poll retains whatever ruleset was already installed.
// Dependencies: crate::core, crate::interfaces::ArtifactStore,
//               crate::runtime::registry, crate::runtime::ruleset
// ============================================================================

//! ## Overview
//! [`RulesetLoader::poll_once`] fetches a manifest, skips entirely when the
//! manifest's version matches what is already installed, otherwise fetches
//! the artifact body, verifies its SHA-256 checksum against the manifest
//! (§4.4 "checksum must be verified before the artifact is trusted"),
//! enforces the artifact size ceiling and schema-version ceiling, validates
//! the parsed [`RulesetSpec`] against the field registry, compiles it, and
//! installs it (§4.3, §4.4). Any failure at any step leaves the previously
//! installed ruleset untouched and is reported through the loader's audit
//! sink rather than the request path (§4.4 "never surfaced to AUTH/MONITORING
//! callers"). [`RulesetLoader::run`] polls on a fixed interval and backs off
//! exponentially with jitter on repeated failure, the same shape used by
//! long-lived network sessions elsewhere in this codebase, so a dead artifact
//! store cannot turn into a tight poll loop (§4.4 "Repeated failures must not
//! tight-loop").

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::field_registry::FieldRegistry;
use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::hash_bytes;
use crate::core::ids::CountryCode;
use crate::core::ids::RulesetKey;
use crate::core::ruleset_spec::RulesetSpec;
use crate::interfaces::ArtifactStore;
use crate::interfaces::ArtifactStoreError;
use crate::runtime::registry::RulesetRegistry;
use crate::runtime::ruleset::Ruleset;

/// Tunables for the loader's polling and backoff behavior (§4.4).
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Deployment environment passed to [`ArtifactStore::fetch_manifest`].
    pub environment: String,
    /// Steady-state interval between manifest polls when not backing off.
    pub poll_interval_ms: u64,
    /// Artifact bodies larger than this are rejected before parsing.
    pub max_artifact_bytes: usize,
    /// Artifacts whose `schema_version` exceeds this ceiling are rejected.
    pub max_schema_version: u32,
    /// Initial backoff delay after the first consecutive failure.
    pub backoff_base_ms: u64,
    /// Backoff delay ceiling; exponential growth is capped here.
    pub backoff_max_ms: u64,
    /// Multiplier applied to the backoff delay per consecutive failure.
    pub backoff_multiplier: f64,
    /// Jitter fraction applied symmetrically around the capped delay.
    pub jitter_factor: f64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            environment: "production".to_string(),
            poll_interval_ms: 30_000,
            max_artifact_bytes: 16 * 1024 * 1024,
            max_schema_version: 1,
            backoff_base_ms: 500,
            backoff_max_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.3,
        }
    }
}

/// Errors produced by a single poll attempt, loader-local (§4.4, never
/// surfaced to request callers).
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// The manifest or artifact body could not be fetched.
    #[error(transparent)]
    Store(#[from] ArtifactStoreError),
    /// The artifact's checksum did not match its manifest.
    #[error("checksum mismatch for {key}/{environment}: manifest={expected} actual={actual}")]
    ChecksumMismatch {
        /// Ruleset key that failed verification.
        key: String,
        /// Deployment environment polled.
        environment: String,
        /// Checksum published in the manifest.
        expected: String,
        /// Checksum computed from the fetched bytes.
        actual: String,
    },
    /// The artifact body exceeded the configured size ceiling.
    #[error("artifact for {key}/{environment} is {actual} bytes, exceeding the {limit} byte ceiling")]
    ArtifactTooLarge {
        /// Ruleset key that failed verification.
        key: String,
        /// Deployment environment polled.
        environment: String,
        /// Observed artifact size in bytes.
        actual: usize,
        /// Configured ceiling in bytes.
        limit: usize,
    },
    /// The artifact's schema version exceeds what this build supports.
    #[error("artifact schema version {actual} for {key}/{environment} exceeds supported ceiling {limit}")]
    SchemaIncompatible {
        /// Ruleset key that failed verification.
        key: String,
        /// Deployment environment polled.
        environment: String,
        /// Schema version declared by the manifest.
        actual: u32,
        /// Highest schema version this build supports.
        limit: u32,
    },
    /// The artifact body did not parse as a [`RulesetSpec`].
    #[error("failed to parse ruleset artifact for {key}/{environment}: {detail}")]
    Malformed {
        /// Ruleset key that failed verification.
        key: String,
        /// Deployment environment polled.
        environment: String,
        /// Human-readable parse failure detail.
        detail: String,
    },
    /// The parsed spec failed structural validation (§3.5).
    #[error("ruleset spec for {key}/{environment} failed validation: {0}")]
    Invalid(#[from] crate::core::ruleset_spec::RulesetValidationError),
}

/// Outcome of one poll, reported to the caller's audit sink (§10.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The manifest version matched what is already installed; no fetch.
    UpToDate,
    /// A new version was fetched, verified, compiled, and installed.
    Installed,
}

/// Polls an [`ArtifactStore`] and installs verified rulesets into a
/// [`RulesetRegistry`] (§4.4, C5).
pub struct RulesetLoader<A> {
    /// The artifact store this loader polls.
    store: A,
    /// Registry installs land in.
    registry: Arc<RulesetRegistry>,
    /// Field registry used to validate and compile fetched specs.
    field_registry: FieldRegistry,
    /// Polling, backoff, and size-limit tunables.
    config: LoaderConfig,
    /// Last-installed version per `(country, key)`, used to skip redundant
    /// fetches when the manifest has not advanced.
    installed_versions: Mutex<HashMap<(Option<String>, String), u32>>,
}

impl<A: ArtifactStore> RulesetLoader<A> {
    /// Creates a loader over the given artifact store and target registry.
    pub fn new(
        store: A,
        registry: Arc<RulesetRegistry>,
        field_registry: FieldRegistry,
        config: LoaderConfig,
    ) -> Self {
        Self { store, registry, field_registry, config, installed_versions: Mutex::new(HashMap::new()) }
    }

    /// Fetches, verifies, and installs the latest ruleset for `(country,
    /// key)` if newer than what is installed; returns without touching the
    /// registry on any failure (§4.4 "retains the previous ruleset").
    ///
    /// # Errors
    ///
    /// Returns a [`LoaderError`] describing the verification step that
    /// failed. The caller (typically [`Self::run`]) is responsible for
    /// logging it and retaining the previously installed ruleset, which this
    /// method never touches on failure.
    pub async fn poll_once(
        &self,
        country: Option<&CountryCode>,
        key: &RulesetKey,
    ) -> Result<PollOutcome, LoaderError> {
        let manifest = self.store.fetch_manifest(key, &self.config.environment).await?;

        let version_key = (country.map(|c| c.as_str().to_string()), key.as_str().to_string());
        {
            let installed = self.installed_versions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if installed.get(&version_key).is_some_and(|&version| version >= manifest.version) {
                return Ok(PollOutcome::UpToDate);
            }
        }

        if manifest.schema_version > self.config.max_schema_version {
            return Err(LoaderError::SchemaIncompatible {
                key: key.as_str().to_string(),
                environment: self.config.environment.clone(),
                actual: manifest.schema_version,
                limit: self.config.max_schema_version,
            });
        }

        let bytes = self.store.fetch_artifact(&manifest.artifact_uri).await?;

        if bytes.len() > self.config.max_artifact_bytes {
            return Err(LoaderError::ArtifactTooLarge {
                key: key.as_str().to_string(),
                environment: self.config.environment.clone(),
                actual: bytes.len(),
                limit: self.config.max_artifact_bytes,
            });
        }

        let digest = hash_bytes(HashAlgorithm::Sha256, &bytes);
        if digest.value != manifest.checksum {
            return Err(LoaderError::ChecksumMismatch {
                key: key.as_str().to_string(),
                environment: self.config.environment.clone(),
                expected: manifest.checksum.clone(),
                actual: digest.value,
            });
        }

        let spec: RulesetSpec = serde_json::from_slice(&bytes).map_err(|err| LoaderError::Malformed {
            key: key.as_str().to_string(),
            environment: self.config.environment.clone(),
            detail: err.to_string(),
        })?;
        spec.validate(&self.field_registry)?;

        let installed_version = spec.version;
        let ruleset = Ruleset::compile(spec, &self.field_registry);
        self.registry.install(country.cloned(), key.clone(), ruleset);

        let mut installed = self.installed_versions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        installed.insert(version_key, installed_version);
        Ok(PollOutcome::Installed)
    }

    /// Returns the loader's configuration, for wiring the background poll
    /// loop's interval and backoff parameters from the owning entry point.
    #[must_use]
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

/// Exponential backoff with jitter for repeated poll failures (§4.4), in the
/// same shape as this codebase's other long-lived polling loops: capped
/// exponential growth, then a symmetric jitter fraction, floored at the base
/// delay so jitter can never collapse the wait to zero.
pub struct PollBackoff {
    /// Backoff parameters this calculator was built from.
    config: LoaderConfig,
    /// Number of consecutive failures observed since the last reset.
    attempt: u32,
    /// xorshift64 PRNG state used for jitter.
    rng_state: u64,
}

impl PollBackoff {
    /// Creates a backoff calculator seeded from the current time.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "nanosecond counter truncated to seed a non-cryptographic PRNG; any resulting bit loss is harmless")]
    pub fn new(config: LoaderConfig) -> Self {
        let rng_state = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0x9E37_79B9_7F4A_7C15, |d| d.as_nanos() as u64 ^ 0x9E37_79B9_7F4A_7C15);
        Self { config, attempt: 0, rng_state: rng_state.max(1) }
    }

    /// Fast xorshift64 PRNG step, used only for jitter and not for anything
    /// security-sensitive.
    fn next_random(&mut self) -> f64 {
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 7;
        self.rng_state ^= self.rng_state << 17;
        (self.rng_state as f64) / (u64::MAX as f64)
    }

    /// Computes the next backoff delay and advances the attempt counter.
    #[allow(clippy::cast_possible_truncation, reason = "attempt is bounded by saturating_add and the millisecond delay is bounded by backoff_max_ms, so the f64-to-integer casts below cannot overflow their targets")]
    pub fn next_delay(&mut self) -> std::time::Duration {
        let base = (self.config.backoff_base_ms as f64) * self.config.backoff_multiplier.powi(self.attempt as i32);
        let capped = base.min(self.config.backoff_max_ms as f64);
        let jitter_range = capped * self.config.jitter_factor;
        let jitter = (self.next_random() * 2.0 - 1.0) * jitter_range;
        let final_ms = (capped + jitter).max(self.config.backoff_base_ms as f64);
        self.attempt = self.attempt.saturating_add(1);
        std::time::Duration::from_millis(final_ms as u64)
    }

    /// Resets the attempt counter after a successful poll.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Steady-state poll interval, used between successful polls.
    #[must_use]
    pub const fn steady_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.config.poll_interval_ms)
    }
}
