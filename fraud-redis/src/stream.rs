// fraud-redis/src/stream.rs
// ============================================================================
// Module: Redis Durable Stream
// Description: Redis Streams-backed `DurableStream` for the outbox dispatcher
//              (§4.8, C8, §6.4).
// Purpose: Give the outbox worker append-with-server-id, consumer-group
//          reads, explicit ack, and stale-pending claim, all surviving a
//          process restart (retention lives in Redis, not the worker).
// Dependencies: fraud_core::interfaces::DurableStream, redis
// ============================================================================

//! ## Overview
//! Every entry is appended with `XADD` under a single `payload` field
//! (binary-safe, so the caller's serialized bytes round-trip untouched).
//! [`RedisDurableStream::new`] creates the stream's consumer group with
//! `XGROUP CREATE ... MKSTREAM` if it does not already exist, tolerating the
//! `BUSYGROUP` error when another instance raced it. Reads use
//! `XREADGROUP ... STREAMS key >` so only genuinely new entries are
//! delivered to a given consumer (§4.8 "Consumer-group reads of new messages
//! do not auto-retry stranded pending entries" — that is
//! [`RedisDurableStream::claim_stale`]'s job, built on `XAUTOCLAIM`).

use async_trait::async_trait;
use fraud_core::interfaces::DurableStream;
use fraud_core::interfaces::StreamEntry;
use fraud_core::interfaces::StreamError;
use redis::aio::ConnectionManager;
use redis::cmd;

/// Field name every entry's payload is stored under.
const PAYLOAD_FIELD: &str = "payload";

/// Errors specific to this adapter's setup, surfaced only from
/// [`RedisDurableStream::new`] (never on the hot path).
#[derive(Debug, thiserror::Error)]
pub enum RedisStreamError {
    /// The consumer group could not be created for a reason other than it
    /// already existing.
    #[error("failed to create consumer group {group} on stream {stream}: {detail}")]
    GroupCreate {
        /// Stream key the group was being created on.
        stream: String,
        /// Consumer group name.
        group: String,
        /// Underlying Redis error detail.
        detail: String,
    },
}

/// Redis Streams-backed [`DurableStream`] (§4.8, §6.4).
pub struct RedisDurableStream {
    connection: ConnectionManager,
    stream_key: String,
    group: String,
}

impl RedisDurableStream {
    /// Opens (and, if absent, creates) the consumer group `group` on
    /// `stream_key`, starting from the beginning of history (`MKSTREAM`
    /// implicitly creates an empty stream if it does not yet exist so the
    /// first producer does not race the first consumer).
    ///
    /// # Errors
    ///
    /// Returns [`RedisStreamError::GroupCreate`] if group creation fails for
    /// a reason other than the group already existing (`BUSYGROUP`).
    pub async fn new(
        mut connection: ConnectionManager,
        stream_key: impl Into<String>,
        group: impl Into<String>,
    ) -> Result<Self, RedisStreamError> {
        let stream_key = stream_key.into();
        let group = group.into();

        let result: redis::RedisResult<()> = cmd("XGROUP")
            .arg("CREATE")
            .arg(&stream_key)
            .arg(&group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut connection)
            .await;

        if let Err(err) = result {
            let already_exists = err.code().is_some_and(|code| code == "BUSYGROUP");
            if !already_exists {
                return Err(RedisStreamError::GroupCreate {
                    stream: stream_key,
                    group,
                    detail: err.to_string(),
                });
            }
        }

        Ok(Self { connection, stream_key, group })
    }
}

#[async_trait]
impl DurableStream for RedisDurableStream {
    async fn append(&self, payload: Vec<u8>) -> Result<String, StreamError> {
        let mut connection = self.connection.clone();
        cmd("XADD")
            .arg(&self.stream_key)
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .query_async(&mut connection)
            .await
            .map_err(|err| StreamError::Unavailable(err.to_string()))
    }

    async fn read_new(&self, consumer_name: &str, max: usize) -> Result<Vec<StreamEntry>, StreamError> {
        let mut connection = self.connection.clone();
        let reply: redis::Value = cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(max)
            .arg("STREAMS")
            .arg(&self.stream_key)
            .arg(">")
            .query_async(&mut connection)
            .await
            .map_err(|err| StreamError::Unavailable(err.to_string()))?;

        Ok(parse_stream_reply(&reply))
    }

    async fn ack(&self, entry_id: &str) -> Result<(), StreamError> {
        let mut connection = self.connection.clone();
        cmd("XACK")
            .arg(&self.stream_key)
            .arg(&self.group)
            .arg(entry_id)
            .query_async(&mut connection)
            .await
            .map_err(|err| StreamError::Unavailable(err.to_string()))
    }

    async fn claim_stale(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        max: usize,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        let mut connection = self.connection.clone();
        // XAUTOCLAIM <key> <group> <consumer> <min-idle-time> <start> [COUNT n]
        // Reply is [next-cursor, claimed-entries, deleted-ids]; only the
        // claimed entries matter to pending recovery (§4.8).
        let reply: redis::Value = cmd("XAUTOCLAIM")
            .arg(&self.stream_key)
            .arg(&self.group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(max)
            .query_async(&mut connection)
            .await
            .map_err(|err| StreamError::Unavailable(err.to_string()))?;

        let redis::Value::Array(parts) = reply else {
            return Ok(Vec::new());
        };
        let Some(entries) = parts.get(1) else { return Ok(Vec::new()) };
        Ok(parse_entries(entries))
    }
}

/// Unpacks an `XREADGROUP` reply (`[[stream_key, [[id, [field, value, ...]], ...]]]`)
/// into a flat list of entries, tolerant of an empty/`nil` reply when there
/// is nothing new to deliver.
fn parse_stream_reply(reply: &redis::Value) -> Vec<StreamEntry> {
    let redis::Value::Array(streams) = reply else { return Vec::new() };
    let Some(redis::Value::Array(stream)) = streams.first() else { return Vec::new() };
    let Some(entries) = stream.get(1) else { return Vec::new() };
    parse_entries(entries)
}

/// Unpacks the `[[id, [field, value, ...]], ...]` shape shared by
/// `XREADGROUP` and `XAUTOCLAIM` replies.
fn parse_entries(entries: &redis::Value) -> Vec<StreamEntry> {
    let redis::Value::Array(entries) = entries else { return Vec::new() };
    entries
        .iter()
        .filter_map(|entry| {
            let redis::Value::Array(pair) = entry else { return None };
            let (id, fields) = (pair.first()?, pair.get(1)?);
            let entry_id = match id {
                redis::Value::BulkString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                redis::Value::SimpleString(text) => text.clone(),
                _ => return None,
            };
            let redis::Value::Array(fields) = fields else { return None };
            let payload = fields
                .chunks_exact(2)
                .find_map(|pair| {
                    let redis::Value::BulkString(name) = &pair[0] else { return None };
                    (name.as_slice() == PAYLOAD_FIELD.as_bytes()).then(|| match &pair[1] {
                        redis::Value::BulkString(bytes) => bytes.clone(),
                        _ => Vec::new(),
                    })
                })
                .unwrap_or_default();
            Some(StreamEntry { entry_id, payload })
        })
        .collect()
}
