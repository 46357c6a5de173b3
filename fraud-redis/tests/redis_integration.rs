#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    missing_docs,
    reason = "Integration test file; panic-based assertions are permitted."
)]
// fraud-redis/tests/redis_integration.rs
// ============================================================================
// Integration tests against a real Redis instance (§10.4).
// Gated behind `#[ignore]`: run explicitly in CI environments that opt in
// with a `testcontainers`-backed Redis, keeping slow/external-dependency
// tests out of the default run.
// ============================================================================

use std::time::Duration;

use fraud_core::CounterProbe;
use fraud_core::CounterStore;
use fraud_core::DurableStream;
use fraud_core::EventSink;
use fraud_redis::RedisCounterStore;
use fraud_redis::RedisDurableStream;
use fraud_redis::RedisEventSink;
use testcontainers::GenericImage;
use testcontainers::core::IntoContainerPort;
use testcontainers::core::WaitFor;
use testcontainers::runners::AsyncRunner;

async fn redis_url() -> (testcontainers::ContainerAsync<GenericImage>, String) {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    let container = image.start().await.expect("start redis container");
    let port = container.get_host_port_ipv4(6379).await.expect("mapped port");
    (container, format!("redis://127.0.0.1:{port}/"))
}

#[tokio::test]
#[ignore = "requires Docker; run explicitly in CI with testcontainers support"]
async fn counter_store_increments_atomically_across_a_batch() {
    let (_container, url) = redis_url().await;
    let connection = fraud_redis::connect(&url).await.expect("connect");
    let store = RedisCounterStore::new(connection, Duration::from_millis(50));

    let probes = vec![
        CounterProbe { key: "velocity:rule-1:card-1".to_string(), window_seconds: 60 },
        CounterProbe { key: "velocity:rule-2:card-1".to_string(), window_seconds: 60 },
    ];

    let first = store.check_and_increment(&probes).await.expect("first batch");
    assert_eq!(first[0].count, 1);
    assert_eq!(first[1].count, 1);

    let second = store.check_and_increment(&probes).await.expect("second batch");
    assert_eq!(second[0].count, 2);
    assert_eq!(second[1].count, 2);
}

#[tokio::test]
#[ignore = "requires Docker; run explicitly in CI with testcontainers support"]
async fn durable_stream_round_trips_append_read_ack() {
    let (_container, url) = redis_url().await;
    let connection = fraud_redis::connect(&url).await.expect("connect");
    let stream = RedisDurableStream::new(connection, "fraud.decisions.test", "outbox-workers")
        .await
        .expect("create consumer group");

    let entry_id = stream.append(b"decision-payload".to_vec()).await.expect("append");
    assert!(!entry_id.is_empty());

    let delivered = stream.read_new("worker-1", 10).await.expect("read");
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload, b"decision-payload");

    stream.ack(&delivered[0].entry_id).await.expect("ack");
}

#[tokio::test]
#[ignore = "requires Docker; run explicitly in CI with testcontainers support"]
async fn claim_stale_recovers_unacknowledged_entries() {
    let (_container, url) = redis_url().await;
    let connection = fraud_redis::connect(&url).await.expect("connect");
    let stream = RedisDurableStream::new(connection, "fraud.decisions.test2", "outbox-workers")
        .await
        .expect("create consumer group");

    stream.append(b"stuck-payload".to_vec()).await.expect("append");
    let _ = stream.read_new("worker-crashed", 10).await.expect("read, never acked");

    let reclaimed = stream.claim_stale("worker-recovery", 0, 10).await.expect("claim");
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].payload, b"stuck-payload");
}

#[tokio::test]
#[ignore = "requires Docker; run explicitly in CI with testcontainers support"]
async fn event_sink_publish_is_bounded_by_its_timeout() {
    let (_container, url) = redis_url().await;
    let connection = fraud_redis::connect(&url).await.expect("connect");
    let sink = RedisEventSink::new(connection, Duration::from_secs(1));
    sink.publish("fraud.events.test", b"event-payload".to_vec()).await.expect("publish");
}
