//! Integration tests for the global scheduler driven by a background thread
//!
//! Nothing here ticks by hand: the convenience constructors register with the
//! process-wide scheduler and a [`BackgroundTicker`] produces the frames.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use rebound_animation::{
    create_spring, create_spring_group, default_scheduler, BackgroundTicker, MotionValue,
    SpringConfig, SpringOptions,
};

static WAKES: AtomicUsize = AtomicUsize::new(0);

fn setup() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let ticker = BackgroundTicker::with_wake_callback(240, || {
            WAKES.fetch_add(1, Ordering::Relaxed);
        });
        default_scheduler().set_tick_source(ticker);
    });
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out");
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Test that awaiting a spring on the global scheduler completes at the target
#[test]
fn test_spring_completes_in_background() {
    setup();
    let spring = create_spring(0.0, SpringOptions::new().stiffness(1000.0).damping(100.0));

    spring.set(100.0);
    let value = pollster::block_on(spring.finished());

    assert_eq!(value, 100.0);
    assert_eq!(spring.get(), 100.0);
    assert!(WAKES.load(Ordering::Relaxed) > 0);
}

/// Test that a group animated in the background resolves every moving channel
#[test]
fn test_group_completes_in_background() {
    setup();
    let group = create_spring_group([("width", 10.0), ("height", 20.0)], SpringConfig::snappy());

    group.set([("width", 200.0), ("height", 80.0)]);
    let values = pollster::block_on(group.finished());

    assert_eq!(values.get("width"), Some(&200.0));
    assert_eq!(values.get("height"), Some(&80.0));
    assert!(!group.is_animating());
}

/// Test that a motion value animation observed through a subscriber finishes
#[test]
fn test_motion_value_animates_in_background() {
    setup();
    let motion = MotionValue::new(0.0);
    let updates = Arc::new(AtomicUsize::new(0));
    let updates_clone = updates.clone();
    motion.subscribe(move |_| {
        updates_clone.fetch_add(1, Ordering::SeqCst);
    });

    let finished = motion.animate_to(-50.0, SpringConfig::stiff());
    wait_until(|| finished.is_resolved());

    assert_eq!(motion.get(), -50.0);
    assert!(updates.load(Ordering::SeqCst) > 2);
}

/// Test that the ticker thread winds down once nothing is animating
#[test]
fn test_scheduler_idles_after_work() {
    setup();
    let spring = create_spring(0.0, SpringConfig::snappy());
    spring.set(1.0);
    pollster::block_on(spring.finished());

    // Other tests share the scheduler, so only wait for this spring's unit
    wait_until(|| !spring.is_animating());
    drop(spring);
    wait_until(|| !default_scheduler().has_active_animations());
}
