// fraud-core/src/runtime/outbox.rs
// ============================================================================
// Module: Outbox Dispatcher
// Description: Bounded in-memory queue, durable append, velocity-snapshot
//              capture, and downstream publish with at-least-once semantics
//              (§4.8, C8).
// Purpose: Take the AUTH/MONITORING request thread off the hook for any I/O
//          to the durable stream or the downstream broker (§5 "No I/O to the
//          downstream broker on the AUTH thread").
// Dependencies: crate::core, crate::interfaces::{DurableStream, EventSink},
//               crate::runtime::velocity, tokio::sync::mpsc
// ============================================================================

//! ## Overview
//! [`OutboxHandle::enqueue`] is the only outbox operation the request thread
//! calls: a non-blocking bounded-channel send (§4.8 "In-memory bounded
//! queue"). [`OutboxWorker::run`] owns everything else: draining up to
//! [`OutboxConfig::drain_burst_max`] envelopes per tick, durably appending
//! each to a [`DurableStream`] before it is considered safe, optionally
//! recomputing a velocity snapshot for the decision, and publishing to the
//! [`EventSink`] — acknowledging only once the publish is confirmed (§4.8
//! "ack-only-after-publish-confirmed", at-least-once semantics). A second
//! loop, [`OutboxWorker::reclaim_pending`], periodically claims entries that
//! some consumer read but never acknowledged, so a crashed worker's
//! in-flight batch is not lost (§4.8 "Pending recovery (required)").

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::core::decision::Decision;
use crate::core::decision::VelocityResult;
use crate::core::field_registry::FieldRegistry;
use crate::core::ids::RuleId;
use crate::core::rule::VelocityConfig;
use crate::core::transaction::Transaction;
use crate::interfaces::CounterStore;
use crate::interfaces::DurableStream;
use crate::interfaces::EventSink;
use crate::runtime::velocity::VelocityEngine;

/// Backpressure policy applied when the in-memory queue is saturated (§4.8
/// "backpressure policy: drop vs. reject with `OUTBOX_UNAVAILABLE`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Silently drop the envelope; the AUTH/MONITORING response already went
    /// out, so this only affects downstream analytics completeness.
    Drop,
    /// Reject the enqueue, letting the caller surface `OUTBOX_UNAVAILABLE`.
    Reject,
}

/// Tunables for the outbox queue and worker (§4.8).
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// Bounded in-memory queue capacity.
    pub queue_capacity: usize,
    /// Maximum envelopes drained and appended in one worker tick.
    pub drain_burst_max: usize,
    /// Unique consumer name for this worker instance (§4.8 "Unique consumer
    /// names per instance").
    pub consumer_name: String,
    /// Downstream event sink topic decisions are published to.
    pub publish_topic: String,
    /// Policy applied when the queue is full.
    pub backpressure: BackpressurePolicy,
    /// Idle age, in milliseconds, before a pending entry is eligible for
    /// reclaim (§9 open question 2, resolved default 30000 — see
    /// `DESIGN.md`).
    pub pending_claim_min_idle_ms: u64,
    /// Interval between pending-recovery sweeps.
    pub pending_claim_interval_ms: u64,
    /// Maximum reclaim attempts before an entry is counted as dead-lettered
    /// rather than retried forever.
    pub max_delivery_attempts: u32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 4096,
            drain_burst_max: 256,
            consumer_name: format!("outbox-{}", uuid::Uuid::new_v4()),
            publish_topic: "fraud.decisions".to_string(),
            backpressure: BackpressurePolicy::Drop,
            pending_claim_min_idle_ms: 30_000,
            pending_claim_interval_ms: 15_000,
            max_delivery_attempts: 5,
        }
    }
}

/// Error returned when the queue is saturated under [`BackpressurePolicy::Reject`].
#[derive(Debug, thiserror::Error)]
#[error("outbox queue is saturated")]
pub struct OutboxUnavailable;

/// One decision plus whatever is needed to recompute a velocity snapshot at
/// worker time, queued for durable append and downstream publish (§4.8).
pub struct OutboxEnvelope {
    /// The decision to durably append and publish.
    pub decision: Decision,
    /// Transaction the decision was evaluated against, retained so the
    /// worker can recompute a velocity snapshot (§3.7 `velocity_snapshot`).
    pub transaction: Transaction,
    /// Field registry the transaction was built against.
    pub field_registry: FieldRegistry,
    /// Velocity configs for every rule that matched its condition, used to
    /// recompute counter values at worker-processing time.
    pub velocity_candidates: Vec<(RuleId, VelocityConfig)>,
}

/// Producer-side handle the request thread enqueues onto (§4.8).
#[derive(Clone)]
pub struct OutboxHandle {
    /// Sending half of the bounded queue shared with [`OutboxWorker`].
    sender: mpsc::Sender<OutboxEnvelope>,
    /// Policy applied when the queue is saturated.
    backpressure: BackpressurePolicy,
}

impl OutboxHandle {
    /// Enqueues one envelope without blocking. Under
    /// [`BackpressurePolicy::Drop`] a saturated queue silently drops the
    /// envelope and returns `Ok(())`; under [`BackpressurePolicy::Reject`] it
    /// returns [`OutboxUnavailable`] so the caller can surface
    /// `OUTBOX_UNAVAILABLE` (§4.8, §7).
    ///
    /// # Errors
    ///
    /// Returns [`OutboxUnavailable`] only under the `Reject` policy when the
    /// queue is full or the worker has been dropped.
    pub fn enqueue(&self, envelope: OutboxEnvelope) -> Result<(), OutboxUnavailable> {
        match self.sender.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => match self.backpressure {
                BackpressurePolicy::Drop => Ok(()),
                BackpressurePolicy::Reject => Err(OutboxUnavailable),
            },
            Err(mpsc::error::TrySendError::Closed(_)) => Err(OutboxUnavailable),
        }
    }
}

/// Background worker owning durable append, velocity-snapshot capture, and
/// downstream publish (§4.8, C8).
pub struct OutboxWorker<Stream, Sink, Store> {
    /// Receiving half of the bounded queue shared with [`OutboxHandle`].
    receiver: mpsc::Receiver<OutboxEnvelope>,
    /// Durable append log entries are written to before publish.
    stream: Arc<Stream>,
    /// Downstream broker decisions are published to.
    sink: Arc<Sink>,
    /// Velocity engine used to recompute a snapshot at processing time.
    velocity: Arc<VelocityEngine<Store>>,
    /// Drain burst size, consumer name, and backpressure tunables.
    config: OutboxConfig,
    /// Per-entry reclaim attempt counter, for poison-pill detection (§4.8 "a
    /// poison-pill detection counter triggers a dead-letter strategy after K
    /// retries"). Tracked by the worker itself rather than the stream
    /// backend, since `claim_stale` only reports which entries are stale, not
    /// how many times each has already been reclaimed.
    delivery_attempts: Mutex<HashMap<String, u32>>,
    /// Count of entries abandoned after exceeding [`OutboxConfig::max_delivery_attempts`].
    dead_lettered: AtomicUsize,
}

/// Builds a bound queue handle/worker pair (§4.8).
pub fn channel<Stream, Sink, Store>(
    stream: Arc<Stream>,
    sink: Arc<Sink>,
    velocity: Arc<VelocityEngine<Store>>,
    config: OutboxConfig,
) -> (OutboxHandle, OutboxWorker<Stream, Sink, Store>) {
    let (sender, receiver) = mpsc::channel(config.queue_capacity);
    let handle = OutboxHandle { sender, backpressure: config.backpressure };
    let worker = OutboxWorker {
        receiver,
        stream,
        sink,
        velocity,
        config,
        delivery_attempts: Mutex::new(HashMap::new()),
        dead_lettered: AtomicUsize::new(0),
    };
    (handle, worker)
}

impl<Stream: DurableStream, Sink: EventSink, Store: CounterStore> OutboxWorker<Stream, Sink, Store> {
    /// Drains up to [`OutboxConfig::drain_burst_max`] queued envelopes,
    /// returning how many were durably appended and published (§4.8 steps
    /// 1-4). Intended to be called in a loop by [`Self::run`]; exposed
    /// separately so tests can drive one tick deterministically.
    pub async fn drain_once(&mut self) -> usize {
        let mut processed = 0;
        while processed < self.config.drain_burst_max {
            let Ok(envelope) = self.receiver.try_recv() else { break };
            self.process(envelope).await;
            processed += 1;
        }
        processed
    }

    /// Appends one envelope, recomputes its velocity snapshot if it carries
    /// candidates, and publishes it, acknowledging only on a confirmed
    /// publish (§4.8).
    async fn process(&self, mut envelope: OutboxEnvelope) {
        let payload = match serde_json::to_vec(&envelope.decision) {
            Ok(bytes) => bytes,
            Err(_) => return,
        };
        let Ok(entry_id) = self.stream.append(payload).await else { return };

        if !envelope.velocity_candidates.is_empty() {
            let candidates: Vec<(RuleId, &VelocityConfig)> =
                envelope.velocity_candidates.iter().map(|(id, config)| (id.clone(), config)).collect();
            let outcomes = self.velocity.evaluate(&envelope.transaction, &candidates, &envelope.field_registry).await;
            let snapshot: std::collections::BTreeMap<String, VelocityResult> = outcomes
                .into_iter()
                .filter_map(|(rule_id, outcome)| outcome.result.map(|result| (rule_id, result)))
                .collect();
            if !snapshot.is_empty() {
                envelope.decision.velocity_snapshot = Some(snapshot);
            }
        }

        if let Ok(payload) = serde_json::to_vec(&envelope.decision) {
            if self.sink.publish(&self.config.publish_topic, payload).await.is_ok() {
                let _ = self.stream.ack(&entry_id).await;
            }
        }
    }

    /// Reclaims entries idle longer than [`OutboxConfig::pending_claim_min_idle_ms`]
    /// and re-publishes them, for at-least-once delivery across worker
    /// restarts (§4.8 "Pending recovery (required)"). An entry reclaimed more
    /// than [`OutboxConfig::max_delivery_attempts`] times is dead-lettered
    /// instead of retried again: it is acknowledged without another publish
    /// attempt so a single poisoned entry cannot loop forever (§4.8 "a
    /// poison-pill detection counter triggers a dead-letter strategy after K
    /// retries"). Returns the number of entries successfully republished
    /// (dead-lettered entries are not counted as reclaimed).
    pub async fn reclaim_pending(&self) -> usize {
        let Ok(entries) = self
            .stream
            .claim_stale(&self.config.consumer_name, self.config.pending_claim_min_idle_ms, self.config.drain_burst_max)
            .await
        else {
            return 0;
        };
        let mut reclaimed = 0;
        for entry in entries {
            let attempts = {
                let mut guard =
                    self.delivery_attempts.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                let count = guard.entry(entry.entry_id.clone()).or_insert(0);
                *count += 1;
                *count
            };
            if attempts > self.config.max_delivery_attempts {
                let _ = self.stream.ack(&entry.entry_id).await;
                self.delivery_attempts
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .remove(&entry.entry_id);
                self.dead_lettered.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if self.sink.publish(&self.config.publish_topic, entry.payload).await.is_ok() {
                let _ = self.stream.ack(&entry.entry_id).await;
                self.delivery_attempts
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .remove(&entry.entry_id);
                reclaimed += 1;
            }
        }
        reclaimed
    }

    /// Number of entries abandoned as dead letters after exceeding
    /// [`OutboxConfig::max_delivery_attempts`] reclaim attempts (§4.8,
    /// observability counterpart to the poison-pill strategy).
    #[must_use]
    pub fn dead_letter_count(&self) -> usize {
        self.dead_lettered.load(Ordering::Relaxed)
    }

    /// Runs the drain loop and the periodic pending-recovery sweep forever.
    /// Intended to be spawned as a background task by the entry point (C9).
    pub async fn run(mut self) {
        let mut since_reclaim = tokio::time::Instant::now();
        let reclaim_interval = Duration::from_millis(self.config.pending_claim_interval_ms);
        loop {
            let Some(envelope) = self.receiver.recv().await else { return };
            self.process(envelope).await;
            let mut drained_more = true;
            while drained_more {
                drained_more = self.drain_once().await > 0;
            }
            if since_reclaim.elapsed() >= reclaim_interval {
                self.reclaim_pending().await;
                since_reclaim = tokio::time::Instant::now();
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test-only panic-based assertions are permitted")]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::BackpressurePolicy;
    use super::OutboxConfig;
    use super::OutboxEnvelope;
    use super::channel;
    use crate::core::decision::Decision;
    use crate::core::decision::DecisionOutcome;
    use crate::core::decision::EngineMetadata;
    use crate::core::decision::EngineMode;
    use crate::core::decision::EvaluationType;
    use crate::core::field_registry::FieldRegistry;
    use crate::core::transaction::Transaction;
    use crate::interfaces::CounterOutcome;
    use crate::interfaces::CounterProbe;
    use crate::interfaces::CounterStore;
    use crate::interfaces::CounterStoreError;
    use crate::interfaces::DurableStream;
    use crate::interfaces::EventSink;
    use crate::interfaces::EventSinkError;
    use crate::interfaces::StreamEntry;
    use crate::interfaces::StreamError;
    use crate::runtime::velocity::VelocityEngine;

    #[derive(Default)]
    struct MemStream {
        appended: Mutex<Vec<(String, Vec<u8>)>>,
        acked: Mutex<Vec<String>>,
        pending: Mutex<Vec<StreamEntry>>,
    }

    #[async_trait]
    impl DurableStream for MemStream {
        async fn append(&self, payload: Vec<u8>) -> Result<String, StreamError> {
            let mut guard = self.appended.lock().unwrap();
            let id = guard.len().to_string();
            guard.push((id.clone(), payload));
            Ok(id)
        }

        async fn read_new(&self, _consumer_name: &str, _max: usize) -> Result<Vec<StreamEntry>, StreamError> {
            Ok(Vec::new())
        }

        async fn ack(&self, entry_id: &str) -> Result<(), StreamError> {
            self.acked.lock().unwrap().push(entry_id.to_string());
            Ok(())
        }

        async fn claim_stale(&self, _consumer_name: &str, _min_idle_ms: u64, max: usize) -> Result<Vec<StreamEntry>, StreamError> {
            let guard = self.pending.lock().unwrap();
            Ok(guard.iter().take(max).cloned().collect())
        }
    }

    #[derive(Default)]
    struct MemSink {
        published: Mutex<Vec<(String, Vec<u8>)>>,
        always_fails: bool,
    }

    #[async_trait]
    impl EventSink for MemSink {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), EventSinkError> {
            if self.always_fails {
                return Err(EventSinkError::PublishFailed("simulated outage".to_string()));
            }
            self.published.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }
    }

    struct NoCounters;

    #[async_trait]
    impl CounterStore for NoCounters {
        async fn check_and_increment(&self, _probes: &[CounterProbe]) -> Result<Vec<CounterOutcome>, CounterStoreError> {
            Ok(Vec::new())
        }
    }

    fn sample_decision() -> Decision {
        Decision {
            decision_id: "d1".to_string(),
            transaction_id: "t1".to_string(),
            evaluation_type: EvaluationType::AuthFirstMatch,
            decision: DecisionOutcome::Approve,
            engine_mode: EngineMode::Normal,
            engine_error_code: None,
            message: None,
            ruleset_key: None,
            ruleset_version: None,
            ruleset_id: None,
            matched_rules: Vec::new(),
            velocity_results: std::collections::BTreeMap::new(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            processing_time_ms: 0.1,
            debug_info: None,
            engine_metadata: EngineMetadata::default(),
            timing_breakdown: None,
            transaction_context: None,
            velocity_snapshot: None,
        }
    }

    #[tokio::test]
    async fn drain_once_appends_and_publishes_then_acks() {
        let stream = Arc::new(MemStream::default());
        let sink = Arc::new(MemSink::default());
        let velocity = Arc::new(VelocityEngine::new(NoCounters, Duration::from_millis(5)));
        let config = OutboxConfig { backpressure: BackpressurePolicy::Reject, ..OutboxConfig::default() };
        let (handle, mut worker) = channel(stream.clone(), sink.clone(), velocity, config);

        let registry = FieldRegistry::new();
        let envelope = OutboxEnvelope {
            decision: sample_decision(),
            transaction: Transaction::new(&registry),
            field_registry: registry,
            velocity_candidates: Vec::new(),
        };
        handle.enqueue(envelope).unwrap();

        let processed = worker.drain_once().await;
        assert_eq!(processed, 1);
        assert_eq!(stream.appended.lock().unwrap().len(), 1);
        assert_eq!(stream.acked.lock().unwrap().len(), 1);
        assert_eq!(sink.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reject_policy_surfaces_outbox_unavailable_when_queue_is_full() {
        let stream = Arc::new(MemStream::default());
        let sink = Arc::new(MemSink::default());
        let velocity = Arc::new(VelocityEngine::new(NoCounters, Duration::from_millis(5)));
        let config =
            OutboxConfig { queue_capacity: 1, backpressure: BackpressurePolicy::Reject, ..OutboxConfig::default() };
        let (handle, _worker) = channel(stream, sink, velocity, config);

        let registry = FieldRegistry::new();
        let make = || OutboxEnvelope {
            decision: sample_decision(),
            transaction: Transaction::new(&registry),
            field_registry: registry,
            velocity_candidates: Vec::new(),
        };
        assert!(handle.enqueue(make()).is_ok());
        assert!(handle.enqueue(make()).is_err());
    }

    #[tokio::test]
    async fn drop_policy_silently_discards_when_queue_is_full() {
        let stream = Arc::new(MemStream::default());
        let sink = Arc::new(MemSink::default());
        let velocity = Arc::new(VelocityEngine::new(NoCounters, Duration::from_millis(5)));
        let config = OutboxConfig { queue_capacity: 1, backpressure: BackpressurePolicy::Drop, ..OutboxConfig::default() };
        let (handle, _worker) = channel(stream, sink, velocity, config);

        let registry = FieldRegistry::new();
        let make = || OutboxEnvelope {
            decision: sample_decision(),
            transaction: Transaction::new(&registry),
            field_registry: registry,
            velocity_candidates: Vec::new(),
        };
        assert!(handle.enqueue(make()).is_ok());
        assert!(handle.enqueue(make()).is_ok());
    }

    #[tokio::test]
    async fn poisoned_entry_is_dead_lettered_after_max_delivery_attempts() {
        let stream = Arc::new(MemStream {
            pending: Mutex::new(vec![StreamEntry { entry_id: "poison".to_string(), payload: vec![1] }]),
            ..MemStream::default()
        });
        let sink = Arc::new(MemSink { always_fails: true, ..MemSink::default() });
        let velocity = Arc::new(VelocityEngine::new(NoCounters, Duration::from_millis(5)));
        let config = OutboxConfig { max_delivery_attempts: 3, ..OutboxConfig::default() };
        let (_handle, worker) = channel(stream.clone(), sink, velocity, config);

        for _ in 0..3 {
            assert_eq!(worker.reclaim_pending().await, 0);
        }
        assert_eq!(worker.dead_letter_count(), 0);

        assert_eq!(worker.reclaim_pending().await, 0);
        assert_eq!(worker.dead_letter_count(), 1);
        assert!(stream.acked.lock().unwrap().contains(&"poison".to_string()));
    }

    #[tokio::test]
    async fn reclaim_resets_attempt_count_after_a_successful_publish() {
        let stream = Arc::new(MemStream {
            pending: Mutex::new(vec![StreamEntry { entry_id: "flaky".to_string(), payload: vec![1] }]),
            ..MemStream::default()
        });
        let sink = Arc::new(MemSink::default());
        let velocity = Arc::new(VelocityEngine::new(NoCounters, Duration::from_millis(5)));
        let config = OutboxConfig { max_delivery_attempts: 1, ..OutboxConfig::default() };
        let (_handle, worker) = channel(stream, sink, velocity, config);

        assert_eq!(worker.reclaim_pending().await, 1);
        assert_eq!(worker.dead_letter_count(), 0);
    }
}
