//! The change engine: poll scheduling, cycle orchestration, public surface.

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigPatch, EngineConfig};
use crate::detect::{classify, ChangeEvent};
use crate::error::{EngineError, EngineResult};
use crate::snapshot::{EntitySnapshot, SnapshotStore};
use crate::subscription::{Dispatcher, SubscriptionId, SubscriptionRegistry};
use entwatch_source::{EntityId, EntitySource};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Counters accumulated across poll cycles.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Completed poll cycles, forced or scheduled.
    pub cycles_completed: u64,
    /// Records fetched and diffed across all cycles.
    pub records_scanned: u64,
    /// Change events produced across all cycles.
    pub events_emitted: u64,
    /// Per-type fetch failures encountered across all cycles.
    pub fetch_errors: u64,
    /// Most recent fetch error message, if any.
    pub last_error: Option<String>,
}

/// Read-only diagnostic view of the engine.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    /// Whether the scheduler thread is active.
    pub is_running: bool,
    /// Active subscriptions.
    pub subscription_count: usize,
    /// Snapshots currently held.
    pub snapshot_count: usize,
    /// Start time of the most recent completed cycle, epoch
    /// milliseconds; `None` before the first cycle.
    pub last_poll_time: Option<u64>,
    /// Current configuration.
    pub config: EngineConfig,
    /// Accumulated counters.
    pub stats: EngineStats,
}

/// Handle to the scheduler thread.
struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

/// Clears the single-flight flag when a cycle ends, however it ends.
struct PollGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PollGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Some(Self { flag })
        } else {
            None
        }
    }
}

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

struct EngineInner {
    config: RwLock<EngineConfig>,
    sources: HashMap<String, Arc<dyn EntitySource>>,
    snapshots: SnapshotStore,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    poll_in_flight: AtomicBool,
    last_poll: RwLock<Option<u64>>,
    baseline_loaded: AtomicBool,
    stats: RwLock<EngineStats>,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl EngineInner {
    /// Loads the diff baseline for every tracked type, bypassing
    /// change detection. A failing type is logged and left with an
    /// empty baseline; its entities will reappear as created.
    fn load_baseline(&self, config: &EngineConfig) {
        for entity_type in &config.tracked_entity_types {
            let Some(source) = self.sources.get(entity_type) else {
                warn!(entity_type = %entity_type, "no source registered for tracked entity type");
                continue;
            };
            match self.baseline_for(source.as_ref(), config.initial_snapshot_limit) {
                Ok(count) => debug!(entity_type = %entity_type, count, "baseline loaded"),
                Err(error) => warn!(
                    entity_type = %entity_type,
                    error = %error,
                    "baseline load failed; continuing with empty baseline"
                ),
            }
        }
    }

    fn baseline_for(&self, source: &dyn EntitySource, limit: usize) -> EngineResult<usize> {
        let records = source.fetch_initial(limit)?;
        for record in &records {
            self.snapshots.put(
                source.entity_type(),
                record.id,
                EntitySnapshot::from_record(record),
            );
        }
        Ok(records.len())
    }

    /// Runs one poll cycle under the single-flight guard.
    ///
    /// Returns the events produced, or an empty list when another
    /// cycle already holds the guard (the trigger is dropped, not
    /// queued).
    fn run_cycle(&self) -> Vec<ChangeEvent> {
        let Some(_guard) = PollGuard::acquire(&self.poll_in_flight) else {
            debug!("poll cycle already in flight; trigger dropped");
            return Vec::new();
        };

        let config = self.config.read().clone();
        let cycle_start = self.clock.now_millis();
        let since = (*self.last_poll.read()).unwrap_or(0);

        let mut events = Vec::new();
        let mut scanned = 0u64;
        let mut fetch_errors = 0u64;
        let mut last_error = None;

        for entity_type in &config.tracked_entity_types {
            let Some(source) = self.sources.get(entity_type) else {
                warn!(entity_type = %entity_type, "no source registered for tracked entity type");
                continue;
            };
            match source.fetch_modified_since(since, config.max_records_per_poll) {
                Ok(records) => {
                    scanned += records.len() as u64;
                    for record in records {
                        let previous = self.snapshots.get(entity_type, record.id);
                        let event = classify(entity_type, previous.as_ref(), &record, cycle_start);
                        self.snapshots.put(
                            entity_type,
                            record.id,
                            EntitySnapshot::from_record(&record),
                        );
                        if config.notifications_enabled {
                            self.dispatcher.dispatch(&event);
                        }
                        events.push(event);
                    }
                }
                Err(error) => {
                    warn!(
                        entity_type = %entity_type,
                        error = %error,
                        "fetch failed; entity type contributes no events this cycle"
                    );
                    fetch_errors += 1;
                    last_error = Some(error.to_string());
                }
            }
        }

        // The next cycle fetches from this cycle's start, so records
        // modified while we were scanning are not skipped.
        *self.last_poll.write() = Some(cycle_start);

        {
            let mut stats = self.stats.write();
            stats.cycles_completed += 1;
            stats.records_scanned += scanned;
            stats.events_emitted += events.len() as u64;
            stats.fetch_errors += fetch_errors;
            if last_error.is_some() {
                stats.last_error = last_error;
            }
        }

        debug!(events = events.len(), scanned, "poll cycle complete");
        events
    }
}

fn spawn_scheduler(inner: Arc<EngineInner>) -> EngineResult<SchedulerHandle> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    let thread = thread::Builder::new()
        .name("entwatch-poll".into())
        .spawn(move || loop {
            let interval = inner.config.read().poll_interval;
            match shutdown_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    inner.run_cycle();
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        })
        .map_err(|e| EngineError::Scheduler(e.to_string()))?;
    Ok(SchedulerHandle {
        shutdown_tx,
        thread,
    })
}

fn stop_locked(slot: &mut Option<SchedulerHandle>) {
    if let Some(handle) = slot.take() {
        // Either the stop signal or the dropped sender ends the loop;
        // an in-flight cycle runs to completion before the join returns.
        let _ = handle.shutdown_tx.send(());
        if handle.thread.join().is_err() {
            warn!("scheduler thread panicked");
        }
        debug!("change engine stopped");
    }
}

/// Gives near-real-time change semantics to a poll-only backing store.
///
/// The engine owns a snapshot store, a subscription registry, and a
/// scheduler thread. Construct one per backing store with the sources
/// for every tracked entity type; multiple engine instances over the
/// same store independently duplicate notifications, since snapshot
/// state is process-local.
pub struct ChangeEngine {
    inner: Arc<EngineInner>,
}

impl ChangeEngine {
    /// Creates an engine on the system clock.
    #[must_use]
    pub fn new(config: EngineConfig, sources: Vec<Arc<dyn EntitySource>>) -> Self {
        Self::with_clock(config, sources, Arc::new(SystemClock))
    }

    /// Creates an engine on an injected clock.
    #[must_use]
    pub fn with_clock(
        config: EngineConfig,
        sources: Vec<Arc<dyn EntitySource>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sources: HashMap<String, Arc<dyn EntitySource>> = sources
            .into_iter()
            .map(|s| (s.entity_type().to_string(), s))
            .collect();
        let registry = Arc::new(SubscriptionRegistry::new());
        Self {
            inner: Arc::new(EngineInner {
                config: RwLock::new(config),
                sources,
                snapshots: SnapshotStore::new(),
                dispatcher: Dispatcher::new(Arc::clone(&registry)),
                registry,
                clock,
                poll_in_flight: AtomicBool::new(false),
                last_poll: RwLock::new(None),
                baseline_loaded: AtomicBool::new(false),
                stats: RwLock::new(EngineStats::default()),
                scheduler: Mutex::new(None),
            }),
        }
    }

    /// Starts the scheduler.
    ///
    /// No-op when the engine is disabled or already running. The
    /// first-ever start performs the initial full snapshot: existing
    /// entities are bulk-loaded into the snapshot store without
    /// emitting change events, establishing the diff baseline.
    /// Restarts after a configuration change do not repeat it.
    pub fn start(&self) -> EngineResult<()> {
        let mut scheduler = self.inner.scheduler.lock();
        if scheduler.is_some() {
            debug!("engine already running; start ignored");
            return Ok(());
        }
        let config = self.inner.config.read().clone();
        if !config.enabled {
            debug!("engine disabled; start is a no-op");
            return Ok(());
        }
        config.validate()?;

        if !self.inner.baseline_loaded.swap(true, Ordering::SeqCst) {
            self.inner.load_baseline(&config);
            *self.inner.last_poll.write() = Some(self.inner.clock.now_millis());
        }

        *scheduler = Some(spawn_scheduler(Arc::clone(&self.inner))?);
        info!(
            interval_ms = config.poll_interval.as_millis() as u64,
            tracked = config.tracked_entity_types.len(),
            "change engine started"
        );
        Ok(())
    }

    /// Stops the scheduler.
    ///
    /// Only future ticks are prevented; a cycle already in progress
    /// runs to completion.
    pub fn stop(&self) {
        stop_locked(&mut self.inner.scheduler.lock());
    }

    /// Triggers one poll cycle immediately.
    ///
    /// Subject to the same single-flight guard as scheduled cycles:
    /// returns the events produced, or an empty list when another
    /// cycle is active. A forced poll before [`start`](Self::start)
    /// diffs against whatever baseline exists, possibly none.
    pub fn force_poll(&self) -> Vec<ChangeEvent> {
        self.inner.run_cycle()
    }

    /// Registers a callback for change events of `entity_type`,
    /// optionally filtered to a single entity.
    pub fn subscribe<F>(
        &self,
        entity_type: impl Into<String>,
        entity_id: Option<EntityId>,
        callback: F,
    ) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe(entity_type, entity_id, callback)
    }

    /// Removes a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.registry.unsubscribe(id);
    }

    /// Merges a partial configuration over the current one.
    ///
    /// Rejects invalid merges without changing anything. While
    /// running: a changed interval restarts the timer, and disabling
    /// the engine stops it.
    pub fn update_config(&self, patch: ConfigPatch) -> EngineResult<()> {
        let mut scheduler = self.inner.scheduler.lock();
        let (merged, interval_changed) = {
            let current = self.inner.config.read();
            let merged = patch.apply_to(&current)?;
            let interval_changed = merged.poll_interval != current.poll_interval;
            (merged, interval_changed)
        };
        let enabled = merged.enabled;
        *self.inner.config.write() = merged;

        if scheduler.is_some() {
            if !enabled {
                info!("engine disabled via config update; stopping");
                stop_locked(&mut scheduler);
            } else if interval_changed {
                stop_locked(&mut scheduler);
                *scheduler = Some(spawn_scheduler(Arc::clone(&self.inner))?);
                debug!("scheduler restarted with new interval");
            }
        }
        Ok(())
    }

    /// Returns a read-only diagnostic view. No side effects.
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            is_running: self.inner.scheduler.lock().is_some(),
            subscription_count: self.inner.registry.len(),
            snapshot_count: self.inner.snapshots.len(),
            last_poll_time: *self.inner.last_poll.read(),
            config: self.inner.config.read().clone(),
            stats: self.inner.stats.read().clone(),
        }
    }

    /// Empties the snapshot store.
    ///
    /// Every entity observed by a later poll is reclassified as
    /// created; use after a long outage to deliberately re-baseline.
    pub fn clear_snapshots(&self) {
        self.inner.snapshots.clear();
        debug!("snapshot store cleared");
    }
}

impl Drop for ChangeEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
