//! Animation scheduler
//!
//! Owns the per-frame tick for every running animation. Units are held through
//! `Weak` references: the scheduler never keeps an animation alive, and a unit
//! whose owners have all gone away is dropped from the schedule on the next
//! tick without explicit unregistration.
//!
//! The scheduler is driven by the host calling [`AnimationScheduler::tick`]
//! once per display refresh. A [`TickSource`] is told when ticking should
//! start (first unit registered) and stop (schedule empty), so an idle
//! scheduler costs nothing.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};
use std::time::Instant;

use rebound_core::{call_isolated, lock, Error, Result};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

new_key_type! {
    /// Handle of a registered tickable unit
    pub struct UnitId;
    /// Handle of a registered frame listener
    pub struct FrameListenerId;
}

/// Largest delta time handed to units, in seconds
pub const MAX_DT: f64 = 0.064;

/// Delta used for the first tick after the scheduler (re)starts
pub const NOMINAL_FRAME: f64 = 1.0 / 60.0;

/// Timing of the tick being processed
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInfo {
    /// Host timestamp in milliseconds
    pub now_ms: f64,
    /// Clamped seconds since the previous tick, never above [`MAX_DT`]
    pub dt: f64,
    /// Number of ticks processed by this scheduler, starting at 1
    pub frame: u64,
}

/// Something advanced once per scheduler tick
pub trait Tickable: Send + Sync {
    fn update(&self, frame: &FrameInfo);

    /// Completed units are dropped from the schedule after their update
    fn is_complete(&self) -> bool;
}

/// Host hook that produces ticks while the schedule is non-empty.
///
/// `start` and `stop` are called outside the scheduler lock, in the order the
/// scheduler decided them. They must not tick the scheduler synchronously.
pub trait TickSource: Send + Sync {
    fn start(&self, scheduler: SchedulerHandle);
    fn stop(&self);
}

/// Callback invoked every tick with the clamped delta time in seconds
pub type FrameListener = Arc<dyn Fn(f64) + Send + Sync>;

struct UnitEntry {
    unit: Weak<dyn Tickable>,
    identity: usize,
}

struct SchedulerState {
    units: SlotMap<UnitId, UnitEntry>,
    /// Registration order; may hold ids already removed from `units`
    order: Vec<UnitId>,
    identities: FxHashMap<usize, UnitId>,
    listeners: SlotMap<FrameListenerId, FrameListener>,
    tick_source: Option<Arc<dyn TickSource>>,
    ticking: bool,
    last_tick_ms: Option<f64>,
    frame_count: u64,
    /// Sequence number of the last start/stop decision
    transitions: u64,
    clock: Instant,
}

/// A start or stop decided under the state lock, applied after releasing it
struct SourceChange {
    sequence: u64,
    source: Arc<dyn TickSource>,
    start: bool,
}

impl SchedulerState {
    fn remove_unit(&mut self, id: UnitId) -> bool {
        match self.units.remove(id) {
            Some(entry) => {
                if self.identities.get(&entry.identity) == Some(&id) {
                    self.identities.remove(&entry.identity);
                }
                if self.order.len() > self.units.len() * 2 + 16 {
                    let units = &self.units;
                    self.order.retain(|id| units.contains_key(*id));
                }
                true
            }
            None => false,
        }
    }

    fn source_change(&mut self, start: bool) -> Option<SourceChange> {
        let source = self.tick_source.clone()?;
        self.transitions += 1;
        Some(SourceChange {
            sequence: self.transitions,
            source,
            start,
        })
    }

    /// Mark the scheduler idle if nothing is registered
    fn go_idle(&mut self) -> Option<SourceChange> {
        if !self.units.is_empty() || !self.ticking {
            return None;
        }
        self.ticking = false;
        self.last_tick_ms = None;
        self.order.clear();
        tracing::debug!("animation scheduler idle");
        self.source_change(false)
    }
}

struct SchedulerShared {
    state: Mutex<SchedulerState>,
    /// Sequence number of the last change handed to the tick source
    applied: Mutex<u64>,
}

/// The animation scheduler that ticks all active animations
///
/// Cloning yields another handle to the same schedule.
#[derive(Clone)]
pub struct AnimationScheduler {
    shared: Arc<SchedulerShared>,
}

impl AnimationScheduler {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                state: Mutex::new(SchedulerState {
                    units: SlotMap::with_key(),
                    order: Vec::new(),
                    identities: FxHashMap::default(),
                    listeners: SlotMap::with_key(),
                    tick_source: None,
                    ticking: false,
                    last_tick_ms: None,
                    frame_count: 0,
                    transitions: 0,
                    clock: Instant::now(),
                }),
                applied: Mutex::new(0),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        lock(&self.shared.state)
    }

    /// A weak handle for values that must not keep the scheduler alive
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Install the host tick source, starting it if units are already waiting
    pub fn set_tick_source<S: TickSource + 'static>(&self, source: S) {
        let source: Arc<dyn TickSource> = Arc::new(source);
        let (stop_previous, start) = {
            let mut state = self.state();
            let stop_previous = state.source_change(false);
            state.tick_source = Some(source);
            let start = if state.ticking {
                state.source_change(true)
            } else {
                None
            };
            (stop_previous, start)
        };
        self.apply(stop_previous);
        self.apply(start);
    }

    /// Hand a start/stop to the tick source unless a later one already went
    fn apply(&self, change: Option<SourceChange>) {
        let Some(change) = change else {
            return;
        };
        let mut applied = lock(&self.shared.applied);
        if change.sequence <= *applied {
            tracing::trace!("skipping superseded tick source change");
            return;
        }
        *applied = change.sequence;
        if change.start {
            change.source.start(self.handle());
        } else {
            change.source.stop();
        }
    }

    /// Add a unit to the schedule.
    ///
    /// Registering an instance that is already scheduled returns its existing
    /// id. The scheduler keeps only a weak reference.
    pub fn register<T: Tickable + 'static>(&self, unit: &Arc<T>) -> UnitId {
        let weak: Weak<T> = Arc::downgrade(unit);
        let weak: Weak<dyn Tickable> = weak;
        let identity = Arc::as_ptr(unit) as *const () as usize;

        let (id, change) = {
            let mut state = self.state();

            if let Some(&existing) = state.identities.get(&identity) {
                let alive = state
                    .units
                    .get(existing)
                    .is_some_and(|entry| entry.unit.strong_count() > 0);
                if alive {
                    return existing;
                }
                state.remove_unit(existing);
            }

            let id = state.units.insert(UnitEntry {
                unit: weak,
                identity,
            });
            state.order.push(id);
            state.identities.insert(identity, id);

            let change = if state.ticking {
                None
            } else {
                state.ticking = true;
                state.last_tick_ms = None;
                tracing::debug!("animation scheduler started");
                state.source_change(true)
            };
            (id, change)
        };

        self.apply(change);
        id
    }

    /// Remove a unit by id
    pub fn unregister(&self, id: UnitId) -> bool {
        let (removed, change) = {
            let mut state = self.state();
            let removed = state.remove_unit(id);
            (removed, state.go_idle())
        };
        self.apply(change);
        removed
    }

    /// Remove a unit by instance
    pub fn unregister_unit<T: Tickable + 'static>(&self, unit: &Arc<T>) -> bool {
        let identity = Arc::as_ptr(unit) as *const () as usize;
        let id = self.state().identities.get(&identity).copied();
        id.is_some_and(|id| self.unregister(id))
    }

    /// Whether a unit id is still scheduled
    pub fn contains(&self, id: UnitId) -> bool {
        self.state().units.contains_key(id)
    }

    /// Register a frame listener.
    ///
    /// Listeners are notified on every tick but do not keep the scheduler
    /// ticking by themselves.
    pub fn on_frame<F: Fn(f64) + Send + Sync + 'static>(&self, callback: F) -> FrameListenerId {
        self.state().listeners.insert(Arc::new(callback))
    }

    pub fn remove_frame_listener(&self, id: FrameListenerId) -> bool {
        self.state().listeners.remove(id).is_some()
    }

    /// Process one frame at host time `now_ms`.
    ///
    /// Returns `false` without doing anything when the scheduler is idle.
    pub fn tick(&self, now_ms: f64) -> bool {
        let (frame, listeners, units) = {
            let mut state = self.state();
            if !state.ticking {
                return false;
            }

            let dt = match state.last_tick_ms {
                Some(last) if now_ms.is_finite() => ((now_ms - last) / 1000.0).clamp(0.0, MAX_DT),
                Some(_) => 0.0,
                None => NOMINAL_FRAME,
            };
            if now_ms.is_finite() {
                state.last_tick_ms = Some(now_ms);
            }
            state.frame_count += 1;

            let frame = FrameInfo {
                now_ms,
                dt,
                frame: state.frame_count,
            };

            let SchedulerState {
                units,
                order,
                listeners,
                ..
            } = &mut *state;
            order.retain(|id| units.contains_key(*id));
            let snapshot: Vec<(UnitId, Weak<dyn Tickable>)> = order
                .iter()
                .filter_map(|id| units.get(*id).map(|entry| (*id, entry.unit.clone())))
                .collect();
            let listeners: SmallVec<[FrameListener; 4]> = listeners.values().cloned().collect();

            (frame, listeners, snapshot)
        };

        tracing::trace!(
            "tick {} dt={:.4}s units={}",
            frame.frame,
            frame.dt,
            units.len()
        );

        for listener in &listeners {
            call_isolated("frame listener", || listener(frame.dt));
        }

        let mut done: SmallVec<[(UnitId, Weak<dyn Tickable>); 8]> = SmallVec::new();
        for (id, weak) in units {
            match weak.upgrade() {
                Some(unit) => {
                    call_isolated("tickable unit", || unit.update(&frame));
                    if unit.is_complete() {
                        done.push((id, weak));
                    }
                }
                None => done.push((id, weak)),
            }
        }

        // A unit restarted by a later callback in this pass stays scheduled
        done.retain(|(_, weak)| weak.upgrade().map_or(true, |unit| unit.is_complete()));

        if !done.is_empty() {
            let change = {
                let mut state = self.state();
                for (id, _) in &done {
                    state.remove_unit(*id);
                }
                state.go_idle()
            };
            self.apply(change);
        }

        true
    }

    /// Tick using the scheduler's own monotonic clock
    pub fn tick_now(&self) -> bool {
        let now_ms = self.state().clock.elapsed().as_secs_f64() * 1000.0;
        self.tick(now_ms)
    }

    /// Milliseconds on the scheduler's monotonic clock
    pub fn now_ms(&self) -> f64 {
        self.state().clock.elapsed().as_secs_f64() * 1000.0
    }

    /// Whether the tick source should currently be producing ticks
    pub fn is_ticking(&self) -> bool {
        self.state().ticking
    }

    /// Registered units, including ones whose owners dropped since the last
    /// tick
    pub fn unit_count(&self) -> usize {
        self.state().units.len()
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    /// Ticks processed so far
    pub fn frame_count(&self) -> u64 {
        self.state().frame_count
    }

    /// Check if any animations are still scheduled
    pub fn has_active_animations(&self) -> bool {
        !self.state().units.is_empty()
    }
}

impl Default for AnimationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AnimationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("AnimationScheduler")
            .field("units", &state.units.len())
            .field("listeners", &state.listeners.len())
            .field("ticking", &state.ticking)
            .field("frame_count", &state.frame_count)
            .finish()
    }
}

/// Weak handle to an [`AnimationScheduler`]
#[derive(Clone, Default)]
pub struct SchedulerHandle {
    shared: Weak<SchedulerShared>,
}

impl SchedulerHandle {
    pub fn upgrade(&self) -> Option<AnimationScheduler> {
        self.shared
            .upgrade()
            .map(|shared| AnimationScheduler { shared })
    }

    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }

    fn scheduler(&self) -> Result<AnimationScheduler> {
        self.upgrade().ok_or(Error::SchedulerDropped)
    }

    pub fn register<T: Tickable + 'static>(&self, unit: &Arc<T>) -> Result<UnitId> {
        Ok(self.scheduler()?.register(unit))
    }

    pub fn unregister(&self, id: UnitId) -> Result<bool> {
        Ok(self.scheduler()?.unregister(id))
    }

    pub fn unregister_unit<T: Tickable + 'static>(&self, unit: &Arc<T>) -> Result<bool> {
        Ok(self.scheduler()?.unregister_unit(unit))
    }

    pub fn on_frame<F: Fn(f64) + Send + Sync + 'static>(
        &self,
        callback: F,
    ) -> Result<FrameListenerId> {
        Ok(self.scheduler()?.on_frame(callback))
    }

    pub fn remove_frame_listener(&self, id: FrameListenerId) -> Result<bool> {
        Ok(self.scheduler()?.remove_frame_listener(id))
    }

    pub fn tick(&self, now_ms: f64) -> Result<bool> {
        Ok(self.scheduler()?.tick(now_ms))
    }

    pub fn tick_now(&self) -> Result<bool> {
        Ok(self.scheduler()?.tick_now())
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

// ============================================================================
// Process-wide default
// ============================================================================

static DEFAULT_SCHEDULER: OnceLock<AnimationScheduler> = OnceLock::new();
static GLOBAL_OVERRIDE: Mutex<Option<SchedulerHandle>> = Mutex::new(None);

/// The process-wide default scheduler instance
pub fn default_scheduler() -> AnimationScheduler {
    DEFAULT_SCHEDULER
        .get_or_init(AnimationScheduler::new)
        .clone()
}

/// Route [`global_scheduler`] to an application-owned scheduler
pub fn set_global_scheduler(handle: SchedulerHandle) {
    *lock(&GLOBAL_OVERRIDE) = Some(handle);
}

/// Scheduler used by the `create_*` convenience constructors.
///
/// Returns the handle passed to [`set_global_scheduler`] while that scheduler
/// is alive, otherwise the process-wide default.
pub fn global_scheduler() -> SchedulerHandle {
    if let Some(handle) = lock(&GLOBAL_OVERRIDE).as_ref() {
        if handle.is_alive() {
            return handle.clone();
        }
    }
    default_scheduler().handle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Counts updates and completes after a fixed number of them
    struct Countdown {
        updates: AtomicUsize,
        remaining: AtomicUsize,
        max_dt: Mutex<f64>,
    }

    impl Countdown {
        fn new(frames: usize) -> Arc<Self> {
            Arc::new(Self {
                updates: AtomicUsize::new(0),
                remaining: AtomicUsize::new(frames),
                max_dt: Mutex::new(0.0),
            })
        }

        fn updates(&self) -> usize {
            self.updates.load(Ordering::SeqCst)
        }
    }

    impl Tickable for Countdown {
        fn update(&self, frame: &FrameInfo) {
            self.updates.fetch_add(1, Ordering::SeqCst);
            let mut max_dt = self.max_dt.lock().unwrap();
            *max_dt = max_dt.max(frame.dt);
            let _ = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        }

        fn is_complete(&self) -> bool {
            self.remaining.load(Ordering::SeqCst) == 0
        }
    }

    #[derive(Default)]
    struct RecordingSource {
        starts: AtomicUsize,
        stops: AtomicUsize,
        running: AtomicBool,
    }

    impl TickSource for Arc<RecordingSource> {
        fn start(&self, _scheduler: SchedulerHandle) {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.running.store(true, Ordering::SeqCst);
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_idle_scheduler_does_not_tick() {
        let scheduler = AnimationScheduler::new();
        assert!(!scheduler.is_ticking());
        assert!(!scheduler.tick(16.0));
        assert_eq!(scheduler.frame_count(), 0);
    }

    #[test]
    fn test_register_is_idempotent() {
        let scheduler = AnimationScheduler::new();
        let unit = Countdown::new(3);

        let first = scheduler.register(&unit);
        let second = scheduler.register(&unit);
        assert_eq!(first, second);
        assert_eq!(scheduler.unit_count(), 1);

        scheduler.tick(0.0);
        assert_eq!(unit.updates(), 1);
    }

    #[test]
    fn test_completed_units_are_removed() {
        let scheduler = AnimationScheduler::new();
        let unit = Countdown::new(2);
        scheduler.register(&unit);

        assert!(scheduler.tick(0.0));
        assert!(scheduler.is_ticking());
        assert!(scheduler.tick(16.0));

        assert_eq!(scheduler.unit_count(), 0);
        assert!(!scheduler.is_ticking());
        assert!(!scheduler.tick(32.0));
        assert_eq!(unit.updates(), 2);
    }

    #[test]
    fn test_dropped_units_are_collected() {
        let scheduler = AnimationScheduler::new();
        let kept = Countdown::new(100);
        let dropped = Countdown::new(100);
        scheduler.register(&kept);
        scheduler.register(&dropped);
        assert_eq!(scheduler.unit_count(), 2);

        drop(dropped);
        scheduler.tick(0.0);
        assert_eq!(scheduler.unit_count(), 1);
        assert_eq!(kept.updates(), 1);

        drop(kept);
        scheduler.tick(16.0);
        assert_eq!(scheduler.unit_count(), 0);
        assert!(!scheduler.is_ticking());
    }

    #[test]
    fn test_unregister_stops_ticking() {
        let scheduler = AnimationScheduler::new();
        let source = Arc::new(RecordingSource::default());
        scheduler.set_tick_source(source.clone());

        let unit = Countdown::new(100);
        let id = scheduler.register(&unit);
        assert_eq!(source.starts.load(Ordering::SeqCst), 1);
        assert!(source.running.load(Ordering::SeqCst));

        assert!(scheduler.unregister(id));
        assert!(!scheduler.unregister(id));
        assert_eq!(source.stops.load(Ordering::SeqCst), 1);
        assert!(!source.running.load(Ordering::SeqCst));
        assert!(!scheduler.is_ticking());

        // Next registration restarts the source
        scheduler.register(&unit);
        assert_eq!(source.starts.load(Ordering::SeqCst), 2);
        assert!(scheduler.unregister_unit(&unit));
        assert_eq!(source.stops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_set_tick_source_while_ticking_starts_it() {
        let scheduler = AnimationScheduler::new();
        let unit = Countdown::new(10);
        scheduler.register(&unit);

        let source = Arc::new(RecordingSource::default());
        scheduler.set_tick_source(source.clone());
        assert!(source.running.load(Ordering::SeqCst));
    }

    #[test]
    fn test_late_stop_does_not_undo_restart() {
        let scheduler = AnimationScheduler::new();
        let source = Arc::new(RecordingSource::default());
        scheduler.set_tick_source(source.clone());

        let unit = Countdown::new(100);
        let id = scheduler.register(&unit);
        let stop = {
            let mut state = scheduler.state();
            state.remove_unit(id);
            state.go_idle()
        };
        // Another thread restarts before the stop is delivered
        scheduler.register(&unit);
        scheduler.apply(stop);

        assert_eq!(source.starts.load(Ordering::SeqCst), 2);
        assert_eq!(source.stops.load(Ordering::SeqCst), 0);
        assert!(source.running.load(Ordering::SeqCst));
        assert!(scheduler.is_ticking());
    }

    #[test]
    fn test_delta_time_is_clamped() {
        let scheduler = AnimationScheduler::new();
        let unit = Countdown::new(10);
        scheduler.register(&unit);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        scheduler.on_frame(move |dt| seen_clone.lock().unwrap().push(dt));

        scheduler.tick(1_000.0);
        scheduler.tick(1_016.0);
        // Simulated suspension
        scheduler.tick(61_016.0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], NOMINAL_FRAME);
        assert!((seen[1] - 0.016).abs() < 1e-9);
        assert_eq!(seen[2], MAX_DT);
        assert!(*unit.max_dt.lock().unwrap() <= MAX_DT);
    }

    #[test]
    fn test_backwards_time_yields_zero_delta() {
        let scheduler = AnimationScheduler::new();
        let unit = Countdown::new(10);
        scheduler.register(&unit);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        scheduler.on_frame(move |dt| seen_clone.lock().unwrap().push(dt));

        scheduler.tick(500.0);
        scheduler.tick(100.0);
        assert_eq!(seen.lock().unwrap()[1], 0.0);
    }

    #[test]
    fn test_frame_listeners_do_not_keep_scheduler_alive() {
        let scheduler = AnimationScheduler::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let id = scheduler.on_frame(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!scheduler.tick(0.0));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let unit = Countdown::new(1);
        scheduler.register(&unit);
        scheduler.tick(16.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(scheduler.remove_frame_listener(id));
        assert_eq!(scheduler.listener_count(), 0);
    }

    #[test]
    fn test_units_update_in_registration_order() {
        struct Recorder {
            name: &'static str,
            log: Arc<Mutex<Vec<&'static str>>>,
        }

        impl Tickable for Recorder {
            fn update(&self, _frame: &FrameInfo) {
                self.log.lock().unwrap().push(self.name);
            }

            fn is_complete(&self) -> bool {
                false
            }
        }

        let scheduler = AnimationScheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let units: Vec<Arc<Recorder>> = ["a", "b", "c"]
            .into_iter()
            .map(|name| {
                Arc::new(Recorder {
                    name,
                    log: log.clone(),
                })
            })
            .collect();

        for unit in &units {
            scheduler.register(unit);
        }
        // Removing and re-adding moves a unit to the back
        scheduler.unregister_unit(&units[0]);
        scheduler.register(&units[0]);

        scheduler.tick(0.0);
        assert_eq!(*log.lock().unwrap(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_panicking_unit_does_not_stop_others() {
        struct Exploding;

        impl Tickable for Exploding {
            fn update(&self, _frame: &FrameInfo) {
                panic!("unit failure");
            }

            fn is_complete(&self) -> bool {
                true
            }
        }

        let scheduler = AnimationScheduler::new();
        let exploding = Arc::new(Exploding);
        let healthy = Countdown::new(5);
        scheduler.register(&exploding);
        scheduler.register(&healthy);

        scheduler.tick(0.0);
        assert_eq!(healthy.updates(), 1);
        assert_eq!(scheduler.unit_count(), 1);
    }

    #[test]
    fn test_unit_registered_during_tick_runs_next_frame() {
        struct Spawner {
            scheduler: SchedulerHandle,
            child: Arc<Countdown>,
            spawned: AtomicBool,
        }

        impl Tickable for Spawner {
            fn update(&self, _frame: &FrameInfo) {
                if !self.spawned.swap(true, Ordering::SeqCst) {
                    self.scheduler.register(&self.child).unwrap();
                }
            }

            fn is_complete(&self) -> bool {
                true
            }
        }

        let scheduler = AnimationScheduler::new();
        let child = Countdown::new(1);
        let spawner = Arc::new(Spawner {
            scheduler: scheduler.handle(),
            child: child.clone(),
            spawned: AtomicBool::new(false),
        });
        scheduler.register(&spawner);

        scheduler.tick(0.0);
        assert_eq!(child.updates(), 0);
        assert!(scheduler.is_ticking());

        scheduler.tick(16.0);
        assert_eq!(child.updates(), 1);
        assert!(!scheduler.is_ticking());
    }

    #[test]
    fn test_handle_reports_dropped_scheduler() {
        let scheduler = AnimationScheduler::new();
        let handle = scheduler.handle();
        assert!(handle.is_alive());

        drop(scheduler);
        assert!(!handle.is_alive());
        let unit = Countdown::new(1);
        assert_eq!(handle.register(&unit), Err(Error::SchedulerDropped));
        assert_eq!(handle.tick(0.0), Err(Error::SchedulerDropped));
    }

    #[test]
    fn test_global_scheduler_override() {
        let app_scheduler = AnimationScheduler::new();
        set_global_scheduler(app_scheduler.handle());

        let unit = Countdown::new(1);
        global_scheduler().register(&unit).unwrap();
        assert_eq!(app_scheduler.unit_count(), 1);

        // Falls back to the default once the override is gone
        drop(app_scheduler);
        assert!(global_scheduler().is_alive());
    }
}
