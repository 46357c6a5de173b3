// fraud-redis/src/lib.rs
// ============================================================================
// Module: Fraud Redis Adapters
// Description: Redis-backed implementations of fraud-core's `CounterStore`,
//              `DurableStream`, and `EventSink` traits (C6, C8, §6.3-§6.5).
// Purpose: Keep fraud-core backend-agnostic; this crate is the one place a
//          `redis::Client` is ever constructed.
// Dependencies: fraud_core::interfaces, redis, tokio
// ============================================================================

//! ## Overview
//! `fraud-redis` supplies the three backend adapters the fraud-core runtime
//! depends on only through traits: [`counter::RedisCounterStore`] for the
//! velocity engine's atomic multi-key sliding-window counters (§4.5, §6.3),
//! [`stream::RedisDurableStream`] for the outbox's durable append/consumer-
//! group log (§4.8, §6.4), and [`sink::RedisEventSink`] for downstream
//! decision-event publication (§6.5). None of fraud-core's other modules
//! import the `redis` crate directly.

pub mod counter;
pub mod sink;
pub mod stream;

pub use counter::RedisCounterStore;
pub use sink::RedisEventSink;
pub use stream::RedisDurableStream;
pub use stream::RedisStreamError;

/// Establishes a multiplexed, auto-reconnecting connection to a single Redis
/// endpoint, shared by every adapter in this crate (§5 "Velocity store
/// connection pool: fixed size, per-instance").
///
/// # Errors
///
/// Returns [`redis::RedisError`] if the client cannot be constructed or the
/// initial connection cannot be established.
pub async fn connect(url: &str) -> Result<redis::aio::ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(url)?;
    client.get_connection_manager().await
}
