// fraud-config/src/config.rs
// ============================================================================
// Module: Configuration Model
// Description: Layered TOML + environment configuration loading and
//              fail-closed validation for every fraud-core/fraud-redis
//              tunable (§10.1).
// Purpose: Translate untrusted configuration text into the concrete
//          `fraud_core` config types the engine is built from, rejecting
//          impossible combinations before construction rather than at
//          request time.
// Dependencies: fraud_core::runtime, serde, std::{env, fs}, toml
// ============================================================================

//! ## Overview
//! [`Config`] mirrors `fraud_core`'s own per-component config structs
//! (`EvaluatorConfig`, `LoaderConfig`, `OutboxConfig`) one section at a time,
//! adding the two sections fraud-core has no type for because they are
//! backend/admission concerns rather than evaluation concerns:
//! [`LoadSheddingSection`] (C10 has no config struct of its own — just
//! `bounded`/`disabled` constructors) and [`RedisSection`] (connection
//! settings fraud-redis's adapters are constructed from). Every section
//! carries `#[serde(default)]` so a `fraud.toml` may specify only the
//! fields it wants to override; [`Config::load`] layers built-in defaults,
//! an optional TOML file, and a small set of environment variable
//! overrides, in that precedence order.

use std::env;
use std::fs;
use std::path::Path;

use fraud_core::runtime::BackpressurePolicy;
use fraud_core::runtime::EvaluatorConfig;
use fraud_core::runtime::LoaderConfig;
use fraud_core::runtime::OutboxConfig;
use serde::Deserialize;
use serde::Serialize;

/// Environment variable that overrides the configuration file path, mirroring
/// `fraud.toml`'s own documented precedence rule.
pub const CONFIG_ENV_VAR: &str = "FRAUD_CONFIG";
/// Environment variable that overrides `redis.url` without editing the file,
/// the one override deployments most commonly need (credentials rotation).
pub const REDIS_URL_ENV_VAR: &str = "FRAUD_REDIS_URL";
/// Environment variable that overrides `load_shedding.max_concurrent`.
pub const MAX_CONCURRENT_ENV_VAR: &str = "FRAUD_MAX_CONCURRENT";
/// Maximum configuration file size accepted by [`Config::load`].
const MAX_CONFIG_FILE_BYTES: u64 = 1024 * 1024;

/// Errors raised loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {detail}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error detail.
        detail: String,
    },
    /// The configuration file exceeded [`MAX_CONFIG_FILE_BYTES`].
    #[error("config file {path} is {actual} bytes, exceeding the {limit}-byte limit")]
    TooLarge {
        /// Path of the oversized file.
        path: String,
        /// Actual file size in bytes.
        actual: u64,
        /// Configured size limit in bytes.
        limit: u64,
    },
    /// The configuration file could not be parsed as TOML.
    #[error("failed to parse config file {path}: {detail}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying parser error detail.
        detail: String,
    },
    /// A field combination failed semantic validation.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Admission-control tunables for the load shedding gate (C10, §4.6).
///
/// `fraud_core` itself has no config struct for C10 — `LoadSheddingGate`
/// exposes only `bounded(n)`/`disabled()` constructors — so this section is
/// the config-layer equivalent, converted with [`LoadSheddingSection::max_concurrent_or_disabled`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSheddingSection {
    /// Whether admission control is active at all (§4.6 "Disabled under
    /// load-test profile to measure raw capacity").
    pub enabled: bool,
    /// Bounded-concurrency permit count when enabled.
    pub max_concurrent: usize,
}

impl Default for LoadSheddingSection {
    fn default() -> Self {
        Self { enabled: true, max_concurrent: 512 }
    }
}

impl LoadSheddingSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.max_concurrent == 0 {
            return Err(ConfigError::Validation(
                "load_shedding.max_concurrent must be nonzero when load_shedding.enabled is true".to_string(),
            ));
        }
        Ok(())
    }
}

/// Serde-friendly mirror of [`fraud_core::runtime::BackpressurePolicy`],
/// since the `fraud_core` enum itself does not derive `serde` traits (it is
/// a runtime-only type, not a wire type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressureChoice {
    /// Silently drop the envelope under backpressure (§4.8).
    Drop,
    /// Reject the enqueue and surface `OUTBOX_UNAVAILABLE` (§4.8, §7).
    Reject,
}

impl From<BackpressureChoice> for BackpressurePolicy {
    fn from(choice: BackpressureChoice) -> Self {
        match choice {
            BackpressureChoice::Drop => Self::Drop,
            BackpressureChoice::Reject => Self::Reject,
        }
    }
}

/// Evaluator tunables (C7, §4.7, §4.9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorSection {
    /// §9 open question 1, resolved default `false` in `DESIGN.md`.
    pub review_maps_to_decline: bool,
    /// Debug tracing enabled at all (§4.7 "Debug mode").
    pub debug_enabled: bool,
    /// Fraction of requests traced when debug mode is enabled.
    pub debug_sample_rate: f64,
    /// Hard cap on traced condition evaluations per request.
    pub debug_max_evaluations: usize,
}

impl Default for EvaluatorSection {
    fn default() -> Self {
        let defaults = EvaluatorConfig::default();
        Self {
            review_maps_to_decline: defaults.review_maps_to_decline,
            debug_enabled: defaults.debug_enabled,
            debug_sample_rate: defaults.debug_sample_rate,
            debug_max_evaluations: defaults.debug_max_evaluations,
        }
    }
}

impl EvaluatorSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.debug_sample_rate) {
            return Err(ConfigError::Validation("evaluator.debug_sample_rate must be between 0.0 and 1.0".to_string()));
        }
        Ok(())
    }

    /// Converts this section into the `fraud_core` config it mirrors.
    #[must_use]
    pub fn to_evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            review_maps_to_decline: self.review_maps_to_decline,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            debug_enabled: self.debug_enabled,
            debug_sample_rate: self.debug_sample_rate,
            debug_max_evaluations: self.debug_max_evaluations,
        }
    }
}

/// Ruleset loader tunables (C5, §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSection {
    /// Deployment environment passed to the artifact store.
    pub environment: String,
    /// Steady-state interval between manifest polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Artifact size ceiling in bytes (§4.4 "a size-limit... ceiling are
    /// enforced").
    pub max_artifact_bytes: usize,
    /// Schema version ceiling; artifacts above this are rejected.
    pub max_schema_version: u32,
    /// Initial backoff delay after the first consecutive poll failure.
    pub backoff_base_ms: u64,
    /// Backoff delay ceiling.
    pub backoff_max_ms: u64,
    /// Multiplier applied per consecutive failure.
    pub backoff_multiplier: f64,
    /// Symmetric jitter fraction applied around the capped delay.
    pub jitter_factor: f64,
}

impl Default for LoaderSection {
    fn default() -> Self {
        let defaults = LoaderConfig::default();
        Self {
            environment: defaults.environment,
            poll_interval_ms: defaults.poll_interval_ms,
            max_artifact_bytes: defaults.max_artifact_bytes,
            max_schema_version: defaults.max_schema_version,
            backoff_base_ms: defaults.backoff_base_ms,
            backoff_max_ms: defaults.backoff_max_ms,
            backoff_multiplier: defaults.backoff_multiplier,
            jitter_factor: defaults.jitter_factor,
        }
    }
}

impl LoaderSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation("loader.poll_interval_ms must be nonzero".to_string()));
        }
        if self.max_artifact_bytes == 0 {
            return Err(ConfigError::Validation("loader.max_artifact_bytes must be nonzero".to_string()));
        }
        if self.backoff_base_ms == 0 || self.backoff_max_ms < self.backoff_base_ms {
            return Err(ConfigError::Validation(
                "loader.backoff_base_ms must be nonzero and no greater than loader.backoff_max_ms".to_string(),
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Validation("loader.backoff_multiplier must be at least 1.0".to_string()));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::Validation("loader.jitter_factor must be between 0.0 and 1.0".to_string()));
        }
        Ok(())
    }

    /// Converts this section into the `fraud_core` config it mirrors.
    #[must_use]
    pub fn to_loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            environment: self.environment.clone(),
            poll_interval_ms: self.poll_interval_ms,
            max_artifact_bytes: self.max_artifact_bytes,
            max_schema_version: self.max_schema_version,
            backoff_base_ms: self.backoff_base_ms,
            backoff_max_ms: self.backoff_max_ms,
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
        }
    }
}

/// Velocity engine timeout (C6, §4.5 "bounded timeout budget").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocitySection {
    /// Bounded timeout budget for the batched counter round trip.
    pub timeout_ms: u64,
}

impl Default for VelocitySection {
    fn default() -> Self {
        Self { timeout_ms: 5 }
    }
}

impl VelocitySection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Validation("velocity.timeout_ms must be nonzero".to_string()));
        }
        Ok(())
    }
}

/// Outbox dispatcher tunables (C8, §4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxSection {
    /// Bounded in-memory queue capacity.
    pub queue_capacity: usize,
    /// Maximum envelopes drained and appended per worker tick.
    pub max_drain_burst: usize,
    /// Downstream event sink topic decisions are published to.
    pub publish_topic: String,
    /// Policy applied when the queue is saturated.
    pub backpressure_policy: BackpressureChoice,
    /// Idle age, in milliseconds, before a pending entry is claimable (§9
    /// open question 2, resolved default 30000 in `DESIGN.md`).
    pub pending_claim_min_idle_ms: u64,
    /// Interval between pending-recovery sweeps.
    pub pending_claim_interval_ms: u64,
    /// Delivery attempts before a pending entry is treated as a poison pill.
    pub max_delivery_attempts: u32,
}

impl Default for OutboxSection {
    fn default() -> Self {
        let defaults = OutboxConfig::default();
        Self {
            queue_capacity: defaults.queue_capacity,
            max_drain_burst: defaults.drain_burst_max,
            publish_topic: defaults.publish_topic,
            backpressure_policy: BackpressureChoice::Drop,
            pending_claim_min_idle_ms: defaults.pending_claim_min_idle_ms,
            pending_claim_interval_ms: defaults.pending_claim_interval_ms,
            max_delivery_attempts: defaults.max_delivery_attempts,
        }
    }
}

impl OutboxSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Validation("outbox.queue_capacity must be nonzero".to_string()));
        }
        if self.max_drain_burst == 0 {
            return Err(ConfigError::Validation("outbox.max_drain_burst must be nonzero".to_string()));
        }
        if self.pending_claim_min_idle_ms == 0 {
            return Err(ConfigError::Validation("outbox.pending_claim_min_idle_ms must be nonzero".to_string()));
        }
        if self.pending_claim_interval_ms == 0 {
            return Err(ConfigError::Validation("outbox.pending_claim_interval_ms must be nonzero".to_string()));
        }
        if self.max_delivery_attempts == 0 {
            return Err(ConfigError::Validation("outbox.max_delivery_attempts must be nonzero".to_string()));
        }
        Ok(())
    }

    /// Converts this section into the `fraud_core` config it mirrors, for a
    /// given consumer name (unique per worker instance, §4.8).
    #[must_use]
    pub fn to_outbox_config(&self, consumer_name: String) -> OutboxConfig {
        OutboxConfig {
            queue_capacity: self.queue_capacity,
            drain_burst_max: self.max_drain_burst,
            consumer_name,
            publish_topic: self.publish_topic.clone(),
            backpressure: self.backpressure_policy.into(),
            pending_claim_min_idle_ms: self.pending_claim_min_idle_ms,
            pending_claim_interval_ms: self.pending_claim_interval_ms,
            max_delivery_attempts: self.max_delivery_attempts,
        }
    }
}

/// Redis connection settings the `fraud-redis` adapters are constructed
/// from (§6.3, §6.4, §6.5); `fraud_core` has no type for this since it never
/// imports the `redis` crate directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSection {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`.
    pub url: String,
    /// Durable stream key used by the outbox (§4.8, §6.4).
    pub stream_key: String,
    /// Consumer group name shared by every outbox worker instance reading
    /// `stream_key` (§4.8 "Unique consumer names per instance" — the group
    /// is shared, the consumer name within it is not).
    pub stream_group: String,
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            stream_key: "fraud:outbox".to_string(),
            stream_group: "fraud-outbox".to_string(),
        }
    }
}

impl RedisSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Validation("redis.url must not be empty".to_string()));
        }
        if self.stream_key.trim().is_empty() {
            return Err(ConfigError::Validation("redis.stream_key must not be empty".to_string()));
        }
        if self.stream_group.trim().is_empty() {
            return Err(ConfigError::Validation("redis.stream_group must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Top-level configuration, assembled from one section per engine component
/// (§10.1). Every field carries a default matching what its corresponding
/// `fraud_core` component already defaults to when unconfigured, so an empty
/// `fraud.toml` (or none at all) produces a fully runnable engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// C7 evaluator tunables.
    pub evaluator: EvaluatorSection,
    /// C5 loader tunables.
    pub loader: LoaderSection,
    /// C6 velocity engine tunables.
    pub velocity: VelocitySection,
    /// C8 outbox tunables.
    pub outbox: OutboxSection,
    /// C10 load shedding tunables.
    pub load_shedding: LoadSheddingSection,
    /// Redis connection settings fraud-redis is wired from.
    pub redis: RedisSection,
}

impl Config {
    /// Validates every section, failing closed on the first impossible
    /// combination found (§10.1 "a `validate()` pass that rejects impossible
    /// combinations").
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first section that
    /// fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.evaluator.validate()?;
        self.loader.validate()?;
        self.velocity.validate()?;
        self.outbox.validate()?;
        self.load_shedding.validate()?;
        self.redis.validate()?;
        Ok(())
    }

    /// Parses a validated [`Config`] from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or
    /// [`ConfigError::Validation`] if the parsed config fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|err| ConfigError::Parse { path: "<string>".to_string(), detail: err.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from, in precedence order: built-in defaults, an
    /// optional TOML file at `path` (or [`CONFIG_ENV_VAR`] if `path` is
    /// `None`), then a small set of environment variable overrides
    /// ([`REDIS_URL_ENV_VAR`], [`MAX_CONCURRENT_ENV_VAR`]). Validation runs
    /// last, against the fully layered result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`]/[`ConfigError::TooLarge`] if the file
    /// cannot be read safely, [`ConfigError::Parse`] if it is not valid
    /// TOML, or [`ConfigError::Validation`] if the layered result is
    /// internally inconsistent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved_path = path.map(Path::to_path_buf).or_else(|| env::var(CONFIG_ENV_VAR).ok().map(Into::into));

        let mut config = match resolved_path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Ok(url) = env::var(REDIS_URL_ENV_VAR) {
            config.redis.url = url;
        }
        if let Ok(raw) = env::var(MAX_CONCURRENT_ENV_VAR) {
            config.load_shedding.max_concurrent = raw.parse().map_err(|_err| {
                ConfigError::Validation(format!("{MAX_CONCURRENT_ENV_VAR} must be a non-negative integer, got {raw:?}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let metadata = fs::metadata(path)
            .map_err(|err| ConfigError::Io { path: path.display().to_string(), detail: err.to_string() })?;
        if metadata.len() > MAX_CONFIG_FILE_BYTES {
            return Err(ConfigError::TooLarge {
                path: path.display().to_string(),
                actual: metadata.len(),
                limit: MAX_CONFIG_FILE_BYTES,
            });
        }
        let text = fs::read_to_string(path)
            .map_err(|err| ConfigError::Io { path: path.display().to_string(), detail: err.to_string() })?;
        let config: Self = toml::from_str(&text)
            .map_err(|err| ConfigError::Parse { path: path.display().to_string(), detail: err.to_string() })?;
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test-only panic-based assertions are permitted")]
mod tests {
    use std::io::Write as _;

    use super::Config;
    use super::ConfigError;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_max_concurrent_is_rejected_when_enabled() {
        let mut config = Config::default();
        config.load_shedding.max_concurrent = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_max_concurrent_is_fine_when_disabled() {
        let mut config = Config::default();
        config.load_shedding.enabled = false;
        config.load_shedding.max_concurrent = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_pending_claim_min_idle_is_rejected() {
        let mut config = Config::default();
        config.outbox.pending_claim_min_idle_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn out_of_range_debug_sample_rate_is_rejected() {
        let mut config = Config::default();
        config.evaluator.debug_sample_rate = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = Config::from_toml_str("[redis]\nurl = \"redis://example:6380\"\n").unwrap();
        assert_eq!(config.redis.url, "redis://example:6380");
        assert_eq!(config.loader.poll_interval_ms, Config::default().loader.poll_interval_ms);
    }

    #[test]
    #[allow(
        unsafe_code,
        reason = "env::set_var is unsafe in this edition; this test does not run concurrently with others that read this var"
    )]
    fn load_reads_a_file_path_and_applies_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[load_shedding]\nmax_concurrent = 10").unwrap();
        // SAFETY: test-only mutation of this process's environment, reverted
        // before the test returns; no other test reads `REDIS_URL_ENV_VAR`.
        unsafe {
            std::env::set_var(super::REDIS_URL_ENV_VAR, "redis://override:6379");
        }
        let config = Config::load(Some(file.path())).unwrap();
        // SAFETY: see above.
        unsafe {
            std::env::remove_var(super::REDIS_URL_ENV_VAR);
        }
        assert_eq!(config.load_shedding.max_concurrent, 10);
        assert_eq!(config.redis.url, "redis://override:6379");
    }

    #[test]
    fn oversized_file_is_rejected_before_parsing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let oversized = "a".repeat(2 * 1024 * 1024);
        write!(file, "# {oversized}").unwrap();
        let result = Config::load(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::TooLarge { .. })));
    }
}
