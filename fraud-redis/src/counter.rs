// fraud-redis/src/counter.rs
// ============================================================================
// Module: Redis Counter Store
// Description: Atomic multi-key sliding-window counter checks via a single
//              server-side Lua script (§4.5, C6, §6.3).
// Purpose: Let the velocity engine batch N counter checks into one Redis
//          round trip, with the increment-then-maybe-expire sequence atomic
//          across the whole batch.
// Dependencies: fraud_core::interfaces::CounterStore, redis, tokio::time
// ============================================================================

//! ## Overview
//! [`RedisCounterStore::check_and_increment`] runs [`INCR_EXPIRE_SCRIPT`]
//! once per call with every probe's key and window packed into `KEYS`/`ARGV`
//! (§4.5 "Implemented as a single server-side script executed once per
//! request with all the rule's required keys"). The script increments each
//! key and arms its expiry only on the key's first increment, so a counter
//! never has its window reset by a later hit; it returns a flat
//! `[count, ttl, count, ttl, ...]` array this adapter unpacks back into one
//! [`CounterOutcome`] per probe, in order. The whole call is wrapped in a
//! bounded timeout (§4.5 "must never block AUTH beyond a bounded timeout
//! budget"); a timeout or connection failure surfaces as
//! [`CounterStoreError::Unavailable`] rather than a partial result, since a
//! Lua script either runs to completion on the server or does not run at all.

use std::time::Duration;

use async_trait::async_trait;
use fraud_core::CounterOutcome;
use fraud_core::CounterProbe;
use fraud_core::CounterStore;
use fraud_core::CounterStoreError;
use redis::AsyncCommands as _;
use redis::Script;
use redis::aio::ConnectionManager;

/// `KEYS[i]` is the i-th probe's counter key; `ARGV[i]` is its window width
/// in seconds. Returns `count` then `ttl` for every key, in key order.
const INCR_EXPIRE_SCRIPT: &str = r"
local out = {}
for i, key in ipairs(KEYS) do
    local window = tonumber(ARGV[i])
    local count = redis.call('INCR', key)
    if count == 1 then
        redis.call('EXPIRE', key, window)
    end
    local ttl = redis.call('TTL', key)
    out[#out + 1] = count
    out[#out + 1] = ttl
end
return out
";

/// Redis-backed [`CounterStore`] (§4.5, §6.3).
pub struct RedisCounterStore {
    connection: ConnectionManager,
    script: Script,
    /// Bounded timeout budget for the whole batched call (§4.5 "typically
    /// <= 5 ms").
    timeout: Duration,
}

impl RedisCounterStore {
    /// Creates a counter store over an already-established connection.
    #[must_use]
    pub fn new(connection: ConnectionManager, timeout: Duration) -> Self {
        Self { connection, script: Script::new(INCR_EXPIRE_SCRIPT), timeout }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn check_and_increment(
        &self,
        probes: &[CounterProbe],
    ) -> Result<Vec<CounterOutcome>, CounterStoreError> {
        if probes.is_empty() {
            return Ok(Vec::new());
        }

        let mut invocation = self.script.prepare_invoke();
        for probe in probes {
            invocation.key(&probe.key);
        }
        for probe in probes {
            invocation.arg(probe.window_seconds);
        }

        let mut connection = self.connection.clone();
        let raw: Vec<i64> = tokio::time::timeout(self.timeout, invocation.invoke_async(&mut connection))
            .await
            .map_err(|_| CounterStoreError::Unavailable("counter store round trip exceeded its deadline".to_string()))?
            .map_err(|err| CounterStoreError::Unavailable(err.to_string()))?;

        if raw.len() != probes.len() * 2 {
            return Err(CounterStoreError::Unavailable(format!(
                "counter script returned {} values for {} probes",
                raw.len(),
                probes.len()
            )));
        }

        Ok(raw
            .chunks_exact(2)
            .map(|pair| CounterOutcome {
                count: pair[0].max(0).unsigned_abs(),
                ttl_remaining: (pair[1] >= 0).then(|| u32::try_from(pair[1]).unwrap_or(u32::MAX)),
            })
            .collect())
    }
}

/// Standalone, single-key probe used only to validate connectivity (e.g. a
/// readiness check); not part of the `CounterStore` hot path.
impl RedisCounterStore {
    /// Pings the connection with a plain `PING`, for health checks outside
    /// the velocity hot path.
    ///
    /// # Errors
    ///
    /// Returns [`CounterStoreError::Unavailable`] if the ping fails or times
    /// out.
    pub async fn ping(&self) -> Result<(), CounterStoreError> {
        let mut connection = self.connection.clone();
        tokio::time::timeout(self.timeout, connection.get::<_, Option<String>>("__fraud_core_ping__"))
            .await
            .map_err(|_| CounterStoreError::Unavailable("ping exceeded its deadline".to_string()))?
            .map(|_| ())
            .map_err(|err| CounterStoreError::Unavailable(err.to_string()))
    }
}
