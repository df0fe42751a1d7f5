use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LockResult, RwLock};

use serde::Serialize;
use tracing::warn;

static SNAPSHOT_POISON_REPORTED: AtomicBool = AtomicBool::new(false);

/// A tick that panicked mid-publish leaves the last snapshot readable.
fn recover_snapshot_guard<G>(result: LockResult<G>, access: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        if !SNAPSHOT_POISON_REPORTED.swap(true, Ordering::Relaxed) {
            warn!(access, "field_metrics_lock_poisoned");
        }
        poisoned.into_inner()
    })
}

/// Cumulative simulation counters since the field was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FieldMetricsSnapshot {
    pub ticks: u64,
    pub simulated_seconds: f64,
    pub moves_committed: u64,
    pub moves_blocked: u64,
    pub placements_failed: u64,
    pub trigger_events: u64,
    pub script_requests: u64,
    pub continuations_resumed: u64,
}

/// Read side shared with observers outside the tick loop.
#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<FieldMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(FieldMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> FieldMetricsSnapshot {
        *recover_snapshot_guard(self.snapshot.read(), "read")
    }

    pub(crate) fn publish(&self, snapshot: FieldMetricsSnapshot) {
        *recover_snapshot_guard(self.snapshot.write(), "write") = snapshot;
    }
}

/// Per-tick counts folded into the running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TickCounts {
    pub(crate) moves_committed: u32,
    pub(crate) moves_blocked: u32,
    pub(crate) placements_failed: u32,
    pub(crate) trigger_events: u32,
    pub(crate) script_requests: u32,
    pub(crate) continuations_resumed: u32,
}

/// Owned by the world; publishes every `interval_ticks` ticks.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    totals: FieldMetricsSnapshot,
    interval_ticks: u32,
    ticks_since_publish: u32,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval_ticks: u32) -> Self {
        Self {
            totals: FieldMetricsSnapshot::default(),
            interval_ticks: interval_ticks.max(1),
            ticks_since_publish: 0,
        }
    }

    pub(crate) fn record_tick(&mut self, dt: f32, counts: TickCounts) {
        let totals = &mut self.totals;
        totals.ticks = totals.ticks.saturating_add(1);
        totals.simulated_seconds += f64::from(dt.max(0.0));
        totals.moves_committed = totals
            .moves_committed
            .saturating_add(u64::from(counts.moves_committed));
        totals.moves_blocked = totals
            .moves_blocked
            .saturating_add(u64::from(counts.moves_blocked));
        totals.placements_failed = totals
            .placements_failed
            .saturating_add(u64::from(counts.placements_failed));
        totals.trigger_events = totals
            .trigger_events
            .saturating_add(u64::from(counts.trigger_events));
        totals.script_requests = totals
            .script_requests
            .saturating_add(u64::from(counts.script_requests));
        totals.continuations_resumed = totals
            .continuations_resumed
            .saturating_add(u64::from(counts.continuations_resumed));
        self.ticks_since_publish = self.ticks_since_publish.saturating_add(1);
    }

    pub(crate) fn totals(&self) -> FieldMetricsSnapshot {
        self.totals
    }

    pub(crate) fn maybe_snapshot(&mut self) -> Option<FieldMetricsSnapshot> {
        if self.ticks_since_publish < self.interval_ticks {
            return None;
        }
        self.ticks_since_publish = 0;
        Some(self.totals)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;
    use std::thread;

    use super::*;

    fn poison_lock(lock: &RwLock<FieldMetricsSnapshot>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    #[test]
    fn snapshot_published_on_interval_with_running_totals() {
        let mut accumulator = MetricsAccumulator::new(3);
        let counts = TickCounts {
            moves_committed: 2,
            trigger_events: 1,
            ..TickCounts::default()
        };
        accumulator.record_tick(0.5, counts);
        accumulator.record_tick(0.5, counts);
        assert!(accumulator.maybe_snapshot().is_none());

        accumulator.record_tick(0.5, TickCounts::default());
        let snapshot = accumulator.maybe_snapshot().expect("snapshot should be emitted");
        assert_eq!(snapshot.ticks, 3);
        assert_eq!(snapshot.moves_committed, 4);
        assert_eq!(snapshot.trigger_events, 2);
        assert!((snapshot.simulated_seconds - 1.5).abs() < 1.0e-9);
        assert!(accumulator.maybe_snapshot().is_none());
    }

    #[test]
    fn snapshot_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());

        let snapshot = handle.snapshot();
        assert_eq!(snapshot, FieldMetricsSnapshot::default());
    }

    #[test]
    fn publish_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());

        let expected = FieldMetricsSnapshot {
            ticks: 12,
            moves_blocked: 3,
            ..FieldMetricsSnapshot::default()
        };
        handle.publish(expected);
        assert_eq!(handle.snapshot(), expected);
    }
}
