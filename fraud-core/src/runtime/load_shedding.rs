// fraud-core/src/runtime/load_shedding.rs
// ============================================================================
// Module: Load Shedding Gate
// Description: Bounded-concurrency admission control (§4.6, C10).
// Purpose: Refuse admission under saturation rather than queue requests,
//          trading fraud exposure for payment availability.
// Dependencies: tokio::sync::Semaphore
// ============================================================================

//! ## Overview
//! [`LoadSheddingGate::try_admit`] acquires one of `max_concurrent` permits
//! without waiting; on failure the caller (C9) returns an immediate APPROVE
//! with `engine_mode=DEGRADED`, `engine_error_code=LOAD_SHEDDING` (§4.6). The
//! gate can be disabled entirely for load-test profiles that want to measure
//! raw capacity (§4.6 "Disabled under load-test profile").

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::sync::TryAcquireError;

/// A held admission permit; admission is released when this is dropped.
pub struct AdmissionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Bounded-concurrency admission gate (§4.6).
pub struct LoadSheddingGate {
    semaphore: Option<Arc<Semaphore>>,
}

impl LoadSheddingGate {
    /// Creates a gate bounded to `max_concurrent` in-flight evaluations.
    #[must_use]
    pub fn bounded(max_concurrent: usize) -> Self {
        Self { semaphore: Some(Arc::new(Semaphore::new(max_concurrent))) }
    }

    /// Creates a gate that never refuses admission (§4.6 load-test profile).
    #[must_use]
    pub const fn disabled() -> Self {
        Self { semaphore: None }
    }

    /// Attempts to admit one request without blocking. Returns `None` when
    /// the gate is saturated; the caller must then degrade rather than wait
    /// (§4.6 "bounded-concurrency semaphore... return an immediate APPROVE").
    #[must_use]
    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        let Some(semaphore) = &self.semaphore else {
            return Some(AdmissionPermit { _permit: never_limiting_permit() });
        };
        match Arc::clone(semaphore).try_acquire_owned() {
            Ok(permit) => Some(AdmissionPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits | TryAcquireError::Closed) => None,
        }
    }
}

/// A permit from a semaphore sized to never be exhausted, used to give the
/// disabled gate the same `AdmissionPermit` shape as the bounded gate
/// without special-casing call sites.
fn never_limiting_permit() -> tokio::sync::OwnedSemaphorePermit {
    static UNLIMITED: std::sync::OnceLock<Arc<Semaphore>> = std::sync::OnceLock::new();
    let semaphore = UNLIMITED.get_or_init(|| Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)));
    Arc::clone(semaphore)
        .try_acquire_owned()
        .unwrap_or_else(|_| unreachable!("unlimited semaphore never exhausts its permits"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test-only panic-based assertions are permitted")]
mod tests {
    use super::LoadSheddingGate;

    #[test]
    fn admits_up_to_max_concurrent_then_refuses() {
        let gate = LoadSheddingGate::bounded(2);
        let first = gate.try_admit();
        let second = gate.try_admit();
        let third = gate.try_admit();
        assert!(first.is_some());
        assert!(second.is_some());
        assert!(third.is_none());
    }

    #[test]
    fn releasing_a_permit_frees_capacity_for_the_next_admission() {
        let gate = LoadSheddingGate::bounded(1);
        let first = gate.try_admit();
        assert!(first.is_some());
        drop(first);
        assert!(gate.try_admit().is_some());
    }

    #[test]
    fn disabled_gate_never_refuses_admission() {
        let gate = LoadSheddingGate::disabled();
        for _ in 0..10_000 {
            assert!(gate.try_admit().is_some());
        }
    }
}
