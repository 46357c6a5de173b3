// fraud-redis/src/sink.rs
// ============================================================================
// Module: Redis Event Sink
// Description: Downstream decision-event publisher backed by Redis Streams
//              (§4.8, C8, §6.5).
// Purpose: Give the outbox worker a bounded-timeout, idempotent-producer
//          publish surface without introducing a second broker dependency
//          beyond the Redis instance already used for counters and the
//          durable log.
// Dependencies: fraud_core::interfaces::EventSink, redis, tokio::time
// ============================================================================

//! ## Overview
//! [`RedisEventSink::publish`] appends the event to a per-topic Redis
//! stream via `XADD` rather than `PUBLISH`: downstream consumers that are
//! offline when a decision is produced still see it on reconnect, which
//! `PUBLISH`'s fire-and-forget fan-out does not guarantee (§6.5
//! "idempotent-producer semantics (acks=all equivalent)" — an `XADD` that
//! returns an id is durably recorded, the closest this stack gets to a
//! broker ack). Consumers dedupe on the event's own `decision_id` field
//! (§4.8 "At-least-once semantics... include `decision_id` so consumers can
//! dedupe"), so a retried or replayed publish is safe.

use std::time::Duration;

use async_trait::async_trait;
use fraud_core::interfaces::EventSink;
use fraud_core::interfaces::EventSinkError;
use redis::aio::ConnectionManager;
use redis::cmd;

/// Field name the event payload is stored under on the topic stream.
const PAYLOAD_FIELD: &str = "payload";

/// Redis Streams-backed [`EventSink`] (§6.5).
pub struct RedisEventSink {
    connection: ConnectionManager,
    /// Bounded send timeout applied to every publish (§6.5).
    timeout: Duration,
}

impl RedisEventSink {
    /// Creates an event sink over an already-established connection.
    #[must_use]
    pub const fn new(connection: ConnectionManager, timeout: Duration) -> Self {
        Self { connection, timeout }
    }
}

#[async_trait]
impl EventSink for RedisEventSink {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), EventSinkError> {
        let mut connection = self.connection.clone();
        let publish = cmd("XADD")
            .arg(topic)
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .query_async::<String>(&mut connection);

        tokio::time::timeout(self.timeout, publish)
            .await
            .map_err(|_| EventSinkError::PublishFailed("publish exceeded its deadline".to_string()))?
            .map(|_entry_id| ())
            .map_err(|err| EventSinkError::PublishFailed(err.to_string()))
    }
}
