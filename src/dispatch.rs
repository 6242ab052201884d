//! Bounded concurrent dispatcher: runs the parse + persist pipeline over
//! chunks of feed lines on worker threads, never more than `capacity` at
//! once.
//!
//! Backpressure is applied to the dispatching thread (a polling wait for a
//! free slot), not an internal queue; once a worker is spawned, `dispatch`
//! returns without waiting for it. Chunks may finish in any order, and no
//! parse state crosses a chunk boundary.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::event::CombatEvent;
use crate::parse::classify::LineClassifier;
use crate::parse::machine::EventParser;
use crate::settings::Settings;
use crate::track::apply::EventApplier;
use crate::track::registry::CreatureRegistry;

/// Default number of simultaneously running chunk workers.
pub const DEFAULT_CAPACITY: usize = 2;

/// Poll interval while waiting for a capacity slot.
const CAPACITY_POLL: Duration = Duration::from_millis(10);

/// Parse one chunk and persist every completed event. This is the whole
/// per-worker pipeline; it is also what the replay binary runs inline.
pub fn run_pipeline(
    lines: &[String],
    classifier: &dyn LineClassifier,
    registry: &dyn CreatureRegistry,
    settings: &dyn Settings,
) -> Vec<CombatEvent> {
    let applier = EventApplier::new(registry, settings);
    let parser = EventParser::new(classifier, &applier, settings);
    let events = parser.parse(lines);
    for event in &events {
        applier.persist(event);
    }
    events
}

struct Worker {
    id: u64,
    join: JoinHandle<()>,
    started_wall: DateTime<Utc>,
    started: Instant,
    lines: usize,
}

/// Opaque handle for one dispatched chunk worker. Carries no control
/// surface (workers cannot be joined or cancelled individually); its id
/// matches the worker's entry in [DispatcherStats].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerToken(u64);

impl WorkerToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Point-in-time view of one still-running worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    pub worker_id: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u128,
    pub lines: usize,
}

/// Point-in-time dispatcher statistics (operational visibility only).
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStats {
    pub active: usize,
    pub total_alive: usize,
    pub capacity: usize,
    pub workers: Vec<WorkerStats>,
}

/// Decrements the active count when dropped, so a panicking pipeline still
/// frees its capacity slot.
struct SlotGuard(Arc<AtomicUsize>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fixed-capacity chunk dispatcher.
pub struct ChunkDispatcher {
    capacity: usize,
    active: Arc<AtomicUsize>,
    next_worker_id: AtomicU64,
    workers: Mutex<Vec<Worker>>,
    classifier: Arc<dyn LineClassifier>,
    registry: Arc<dyn CreatureRegistry>,
    settings: Arc<dyn Settings>,
}

impl ChunkDispatcher {
    pub fn new(
        classifier: Arc<dyn LineClassifier>,
        registry: Arc<dyn CreatureRegistry>,
        settings: Arc<dyn Settings>,
    ) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, classifier, registry, settings)
    }

    pub fn with_capacity(
        capacity: usize,
        classifier: Arc<dyn LineClassifier>,
        registry: Arc<dyn CreatureRegistry>,
        settings: Arc<dyn Settings>,
    ) -> Self {
        Self {
            capacity: capacity.max(1),
            active: Arc::new(AtomicUsize::new(0)),
            next_worker_id: AtomicU64::new(1),
            workers: Mutex::new(Vec::new()),
            classifier,
            registry,
            settings,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Dispatch one chunk to a worker thread. Empty chunks are ignored
    /// (`None`).
    ///
    /// Blocks the calling thread (10ms polls, no upper bound) while all
    /// capacity slots are busy, then returns as soon as the worker is
    /// spawned. The returned token identifies the worker in [stats](Self::stats)
    /// output; it carries no join/cancel surface.
    pub fn dispatch(&self, chunk: Vec<String>) -> Option<WorkerToken> {
        if chunk.is_empty() {
            return None;
        }
        self.prune_finished();
        while self.active.load(Ordering::SeqCst) >= self.capacity {
            std::thread::sleep(CAPACITY_POLL);
            self.prune_finished();
        }
        self.active.fetch_add(1, Ordering::SeqCst);

        let lines = chunk.len();
        let classifier = Arc::clone(&self.classifier);
        let registry = Arc::clone(&self.registry);
        let settings = Arc::clone(&self.settings);
        let guard = SlotGuard(Arc::clone(&self.active));

        let join = std::thread::spawn(move || {
            let _guard = guard;
            let result = catch_unwind(AssertUnwindSafe(|| {
                run_pipeline(&chunk, classifier.as_ref(), registry.as_ref(), settings.as_ref());
            }));
            if let Err(payload) = result {
                let msg = panic_message(payload.as_ref());
                if settings.debug_enabled() {
                    debug!(lines, %msg, "chunk pipeline panicked, chunk abandoned");
                }
            }
        });

        let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
        self.lock_workers().push(Worker {
            id,
            join,
            started_wall: Utc::now(),
            started: Instant::now(),
            lines,
        });
        Some(WorkerToken(id))
    }

    /// Block until every outstanding worker has completed.
    pub fn shutdown(&self) {
        let drained: Vec<Worker> = self.lock_workers().drain(..).collect();
        for worker in drained {
            // A panicked worker already logged and released its slot.
            let _ = worker.join.join();
        }
    }

    /// Point-in-time statistics; never blocks on running workers.
    pub fn stats(&self) -> DispatcherStats {
        let workers = self.lock_workers();
        let alive: Vec<WorkerStats> = workers
            .iter()
            .filter(|w| !w.join.is_finished())
            .map(|w| WorkerStats {
                worker_id: w.id,
                started_at: w.started_wall,
                elapsed_ms: w.started.elapsed().as_millis(),
                lines: w.lines,
            })
            .collect();
        DispatcherStats {
            active: self.active.load(Ordering::SeqCst),
            total_alive: alive.len(),
            capacity: self.capacity,
            workers: alive,
        }
    }

    fn prune_finished(&self) {
        self.lock_workers().retain(|w| !w.join.is_finished());
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, Vec<Worker>> {
        self.workers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AttackStart, CriticalHit, StatusChange, UcsSignal};
    use crate::parse::StockClassifier;
    use crate::settings::TrackerSettings;
    use crate::track::registry::CreatureRoster;

    fn dispatcher(capacity: usize) -> (ChunkDispatcher, Arc<CreatureRoster>) {
        let roster = Arc::new(CreatureRoster::new());
        let d = ChunkDispatcher::with_capacity(
            capacity,
            Arc::new(StockClassifier::new()),
            Arc::clone(&roster) as Arc<dyn CreatureRegistry>,
            Arc::new(TrackerSettings::default()),
        );
        (d, roster)
    }

    fn attack_chunk(id: u64, noun: &str, name: &str, damage: u32) -> Vec<String> {
        vec![
            format!(r#"You launch a jab at <b><a exist="{id}" noun="{noun}">{name}</a></b>!"#),
            format!("   ... and hit for {damage} points of damage!"),
        ]
    }

    #[test]
    fn empty_chunk_is_a_noop() {
        let (d, _) = dispatcher(2);
        assert!(d.dispatch(Vec::new()).is_none());
        let stats = d.stats();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.total_alive, 0);
    }

    #[test]
    fn active_count_never_exceeds_capacity() {
        let (d, roster) = dispatcher(2);
        for i in 0..6 {
            roster.add(100 + i, format!("target {i}"));
        }
        let mut tokens = Vec::new();
        for i in 0..6 {
            let token = d.dispatch(attack_chunk(100 + i, "dummy", "a dummy", 5));
            assert!(token.is_some());
            tokens.push(token.unwrap());
            assert!(d.stats().active <= d.capacity());
        }
        let mut ids: Vec<u64> = tokens.iter().map(WorkerToken::id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 6, "each dispatch gets its own token");
        d.shutdown();
        let stats = d.stats();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.total_alive, 0);
    }

    #[test]
    fn shutdown_waits_for_all_work() {
        let (d, roster) = dispatcher(2);
        let kobold = roster.add(31452, "a scarred kobold");
        for _ in 0..4 {
            d.dispatch(attack_chunk(31452, "kobold", "a scarred kobold", 10));
        }
        d.shutdown();
        assert_eq!(kobold.state().total_damage, 40);
    }

    /// Classifier that panics on a marker line, for slot-release tests.
    struct PanickyClassifier {
        inner: StockClassifier,
    }

    impl LineClassifier for PanickyClassifier {
        fn attack_start(&self, line: &str) -> Option<AttackStart> {
            self.inner.attack_start(line)
        }

        fn damage_amount(&self, line: &str) -> Option<u32> {
            if line.contains("KABOOM") {
                panic!("classifier blew up");
            }
            self.inner.damage_amount(line)
        }

        fn status_change(&self, line: &str) -> Option<StatusChange> {
            self.inner.status_change(line)
        }

        fn ucs_signal(&self, line: &str) -> Option<UcsSignal> {
            self.inner.ucs_signal(line)
        }

        fn critical_hit(&self, line: &str) -> Option<CriticalHit> {
            self.inner.critical_hit(line)
        }
    }

    #[test]
    fn panicking_chunk_releases_its_slot() {
        let roster = Arc::new(CreatureRoster::new());
        roster.add(7, "an orc");
        let d = ChunkDispatcher::with_capacity(
            1,
            Arc::new(PanickyClassifier {
                inner: StockClassifier::new(),
            }),
            Arc::clone(&roster) as Arc<dyn CreatureRegistry>,
            Arc::new(TrackerSettings::default()),
        );
        let token = d.dispatch(vec![
            r#"You launch a jab at <b><a exist="7" noun="orc">an orc</a></b>!"#.to_string(),
            "KABOOM".to_string(),
        ]);
        assert!(token.is_some());
        d.shutdown();
        assert_eq!(d.stats().active, 0);

        // Capacity slot must be reusable after the failure.
        assert!(d.dispatch(attack_chunk(7, "orc", "an orc", 3)).is_some());
        d.shutdown();
        assert_eq!(roster.lookup(7).unwrap().state().total_damage, 3);
    }
}
