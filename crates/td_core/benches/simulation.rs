//! Simulation benchmarks for td_core.
//!
//! Run with: `cargo bench -p td_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use td_core::simulation::Simulation;
use td_test_utils::fixtures::{
    basic_config, fixed, full_catalog, spawn_group, wave, SessionBuilder, FRAME_MS,
};

/// Twelve towers against a dense wave of 200 enemies.
fn busy_session() -> Simulation {
    let mut config = basic_config(vec![wave(
        vec![
            spawn_group("basic", 120, 50),
            spawn_group("fast", 60, 80),
            spawn_group("boss", 20, 400),
        ],
        100,
    )]);
    config.catalog = full_catalog();
    config.map.starting_gold = 10_000;

    let mut builder = SessionBuilder::new(config);
    for i in 0..6 {
        let x = 80 + i * 150;
        builder = builder.tower("arrow", x, 40).tower(
            if i % 2 == 0 { "storm" } else { "lance" },
            x,
            160,
        );
    }
    builder.start_wave().build().0
}

/// Advance the busy session into the thick of the wave.
fn warmed_session() -> Simulation {
    let mut sim = busy_session();
    for _ in 0..300 {
        let _ = sim.tick(fixed(FRAME_MS));
    }
    sim
}

pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("tick_busy_wave", |b| {
        b.iter_batched(
            warmed_session,
            |mut sim| {
                for _ in 0..60 {
                    black_box(sim.tick(fixed(FRAME_MS)));
                }
                sim
            },
            BatchSize::SmallInput,
        );
    });

    let sim = warmed_session();
    c.bench_function("state_hash", |b| b.iter(|| black_box(sim.state_hash())));
    c.bench_function("get_game_state", |b| {
        b.iter(|| black_box(sim.get_game_state()));
    });
    c.bench_function("save_state_roundtrip", |b| {
        b.iter(|| {
            let bytes = sim.serialize().unwrap_or_default();
            black_box(Simulation::deserialize(&bytes).is_ok())
        });
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
