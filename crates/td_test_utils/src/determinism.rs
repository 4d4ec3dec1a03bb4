//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Save-states must resume bit-for-bit and a replayed session must end in
//! the same state. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`td_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Entity tables iterate in ascending id order.
//!
//! - **System randomness**: Crit rolls draw from a seeded RNG that is part
//!   of the simulation state, never from the OS.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism (movement, combat, etc.)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full sessions are reproducible
//! 4. **Parallel tests**: Running N sessions on separate threads all match

use std::thread;

use td_core::simulation::Simulation;

use crate::fixtures::{fixed, FRAME_MS};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Advance one harness frame.
pub fn step_frame(sim: &mut Simulation) {
    let _ = sim.tick(fixed(FRAME_MS));
}

/// Run a session twice with identical setup and compare final hashes.
///
/// # Example
///
/// ```ignore
/// use td_test_utils::determinism::verify_simulation_determinism;
/// use td_test_utils::fixtures::{basic_config, mixed_wave, SessionBuilder};
///
/// let is_deterministic = verify_simulation_determinism(
///     || {
///         SessionBuilder::new(basic_config(vec![mixed_wave()]))
///             .tower("arrow", 200, 40)
///             .start_wave()
///             .build()
///             .0
///     },
///     500,
/// );
/// assert!(is_deterministic);
/// ```
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        step_frame,
        Simulation::state_hash,
    );
    result.is_deterministic
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run N sessions on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        step_frame(&mut sim);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        step_frame(&mut sim1);
        step_frame(&mut sim2);

        if sim1.state_hash() != sim2.state_hash() {
            tracing::warn!(tick, "Simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Verify that a save-state taken after `num_ticks` restores the same
/// hash, and that both copies stay in lockstep for `resume_ticks` more.
pub fn verify_serialization_determinism<F>(
    setup_fn: F,
    num_ticks: u64,
    resume_ticks: u64,
) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();

    for _ in 0..num_ticks {
        step_frame(&mut sim);
    }

    let bytes = match sim.serialize() {
        Ok(b) => b,
        Err(_) => return false,
    };

    let mut restored = match Simulation::deserialize(&bytes) {
        Ok(s) => s,
        Err(_) => return false,
    };

    if sim.state_hash() != restored.state_hash() {
        return false;
    }

    for _ in 0..resume_ticks {
        step_frame(&mut sim);
        step_frame(&mut restored);
    }

    sim.state_hash() == restored.state_hash()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of the simulation.
pub mod strategies {
    use proptest::prelude::*;
    use td_core::config::{SpawnGroup, WaveDef, WaveReward};
    use td_core::math::{Fixed, Vec2Fixed};

    /// A point inside one of the [`straight_map`](crate::fixtures::straight_map)
    /// build strips.
    pub fn arb_build_position() -> impl Strategy<Value = Vec2Fixed> {
        (0i32..=1000, prop_oneof![0i32..=80, 120i32..=200])
            .prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
    }

    /// A speed factor, including values outside the allowed range.
    pub fn arb_speed_factor() -> impl Strategy<Value = Fixed> {
        (0i32..50).prop_map(|tenths| Fixed::from_num(tenths) / 10)
    }

    /// Wall-clock frame length in milliseconds.
    pub fn arb_frame_ms() -> impl Strategy<Value = Fixed> {
        (1i32..100).prop_map(Fixed::from_num)
    }

    /// A spawn group of `basic` or `fast` enemies on path 0.
    pub fn arb_spawn_group() -> impl Strategy<Value = SpawnGroup> {
        (
            prop_oneof![Just("basic"), Just("fast")],
            1u32..12,
            0u32..1500,
            0u32..2000,
        )
            .prop_map(|(enemy_type, count, spawn_delay_ms, start_offset_ms)| SpawnGroup {
                enemy_type: enemy_type.to_string(),
                count,
                spawn_delay_ms,
                start_offset_ms,
                path: 0,
            })
    }

    /// A wave of one to three groups.
    pub fn arb_wave() -> impl Strategy<Value = WaveDef> {
        (proptest::collection::vec(arb_spawn_group(), 1..4), 0u32..50).prop_map(|(groups, gold)| {
            WaveDef {
                groups,
                reward: WaveReward {
                    gold,
                    experience: 0,
                },
            }
        })
    }

    /// Up to `max` tower positions.
    pub fn arb_tower_positions(max: usize) -> impl Strategy<Value = Vec<Vec2Fixed>> {
        proptest::collection::vec(arb_build_position(), 0..max)
    }
}
