//! Background tick thread
//!
//! A [`TickSource`] for hosts without a display-refresh callback. While the
//! scheduler has work, a thread ticks it at a fixed rate and optionally pokes
//! the host event loop through a wake callback so it can redraw.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::scheduler::{SchedulerHandle, TickSource};

type WakeCallback = Arc<dyn Fn() + Send + Sync>;

struct TickerShared {
    running: AtomicBool,
    /// Bumped on every start/stop so a stale thread notices it was replaced
    generation: AtomicU64,
    interval: Duration,
    wake: Option<WakeCallback>,
}

/// Drives a scheduler from a dedicated thread
#[derive(Clone)]
pub struct BackgroundTicker {
    shared: Arc<TickerShared>,
}

impl BackgroundTicker {
    /// Tick at `fps` frames per second (clamped to 1..=1000)
    pub fn new(fps: u32) -> Self {
        Self::build(fps, None)
    }

    /// Also invoke `wake` after each tick
    pub fn with_wake_callback<F>(fps: u32, wake: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(fps, Some(Arc::new(wake)))
    }

    fn build(fps: u32, wake: Option<WakeCallback>) -> Self {
        let fps = fps.clamp(1, 1000);
        Self {
            shared: Arc::new(TickerShared {
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                interval: Duration::from_secs_f64(1.0 / fps as f64),
                wake,
            }),
        }
    }

    /// Whether a tick thread is currently active
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }
}

impl TickSource for BackgroundTicker {
    fn start(&self, scheduler: SchedulerHandle) {
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.running.store(true, Ordering::Release);

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("rebound-ticker".into())
            .spawn(move || run(shared, scheduler, generation));

        if let Err(err) = spawned {
            tracing::error!("failed to spawn tick thread: {}", err);
            self.shared.running.store(false, Ordering::Release);
        }
    }

    fn stop(&self) {
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        self.shared.running.store(false, Ordering::Release);
    }
}

fn run(shared: Arc<TickerShared>, scheduler: SchedulerHandle, generation: u64) {
    tracing::debug!("tick thread started");
    loop {
        if shared.generation.load(Ordering::Acquire) != generation {
            break;
        }
        let Some(scheduler) = scheduler.upgrade() else {
            shared.running.store(false, Ordering::Release);
            break;
        };

        let ticked = scheduler.tick_now();
        drop(scheduler);

        if ticked {
            if let Some(wake) = &shared.wake {
                wake();
            }
        }

        thread::sleep(shared.interval);
    }
    tracing::debug!("tick thread exited");
}

impl std::fmt::Debug for BackgroundTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTicker")
            .field("interval", &self.shared.interval)
            .field("running", &self.is_running())
            .finish()
    }
}
