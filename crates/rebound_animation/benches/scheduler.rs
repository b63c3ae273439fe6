use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rebound_animation::spring::{integrate, OscillatorState};
use rebound_animation::{AnimatedValue, AnimationScheduler, SpringConfig};

const SPRING_COUNTS: &[usize] = &[10, 100, 1000];

fn tick_running_springs(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_tick");

    for &count in SPRING_COUNTS {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let scheduler = AnimationScheduler::new();
            let springs: Vec<AnimatedValue> = (0..count)
                .map(|_| AnimatedValue::new(scheduler.handle(), 0.0, SpringConfig::wobbly()))
                .collect();
            let mut now = 0.0;
            let mut flip = false;

            b.iter(|| {
                if !scheduler.is_ticking() {
                    flip = !flip;
                    let target = if flip { 1000.0 } else { 0.0 };
                    springs.iter().for_each(|spring| spring.set(target));
                }
                now += 16.0;
                black_box(scheduler.tick(now));
            });
        });
    }

    group.finish();
}

fn integrate_single_frame(c: &mut Criterion) {
    let config = SpringConfig::default();
    c.bench_function("integrate_frame", |b| {
        b.iter(|| {
            integrate(
                black_box(OscillatorState::at_rest(0.0)),
                black_box(100.0),
                &config,
                black_box(1.0 / 60.0),
            )
        });
    });
}

criterion_group!(benches, tick_running_springs, integrate_single_frame);
criterion_main!(benches);
