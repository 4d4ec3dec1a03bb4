//! Core simulation loop.
//!
//! The [`Simulation`] owns every collection of a session and advances it
//! one tick per call to [`Simulation::tick`]. It is single-threaded with a
//! single writer; pause and stop are flags checked at the top of `tick`.
//!
//! # Determinism
//!
//! All operations in this module are fully deterministic:
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - Crit rolls come from a seeded `ChaCha8Rng` that is part of the state
//! - Consistent iteration order (ascending entity ids)
//! - Same config and inputs always produce the same state hash
//!
//! # Example
//!
//! ```
//! use td_core::config::GameConfig;
//! use td_core::math::Fixed;
//! use td_core::simulation::Simulation;
//!
//! # fn run(config: GameConfig) -> td_core::error::Result<()> {
//! let mut sim = Simulation::initialize(config)?;
//! let handle = sim.start_game();
//! sim.start_next_wave();
//!
//! while sim.is_current(handle) {
//!     if sim.tick(Fixed::from_num(16)).is_none() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::abilities::ability_system;
use crate::combat::{projectile_system, tower_fire_system};
use crate::components::Enemy;
use crate::config::GameConfig;
use crate::economy::{self, Ledger};
use crate::effects::status_effect_system;
use crate::error::{ActionError, GameError, Result};
use crate::events::{GameOutcome, TickEvents};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::movement::movement_system;
use crate::snapshot::GameState;
use crate::store::{EntityId, EntityStore};
use crate::waves::{SpawnRequest, WaveScheduler};

/// Slowest allowed speed factor (0.1).
pub const MIN_SPEED: Fixed = Fixed::from_bits(0x1999_999A);

/// Fastest allowed speed factor.
pub const MAX_SPEED: Fixed = Fixed::from_bits(3 << 32);

/// Token for the tick loop started by [`Simulation::start_game`].
///
/// Stopping or resetting the game invalidates every handle issued before,
/// so a stale driver can tell it should stop scheduling frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoopHandle {
    generation: u64,
}

/// The tower-defense simulation.
///
/// # System Execution Order
///
/// Each tick, systems run in this order:
/// 1. **Waves** - Automatic wave start, spawn due enemies
/// 2. **Movement** - Walk enemies along their paths, collect leaks
/// 3. **Status Effects** - Damage over time, count effects down
/// 4. **Combat** - Acquire targets, fire, fly and resolve projectiles
/// 5. **Abilities** - Triggered slows, freezes, chains, and buffs
/// 6. **Economy** - Credit kills and leaks, complete waves, check outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    config: GameConfig,
    store: EntityStore,
    ledger: Ledger,
    waves: WaveScheduler,
    rng: ChaCha8Rng,
    /// Ticks executed.
    tick: u64,
    /// Simulated milliseconds.
    #[serde(with = "fixed_serde")]
    time_ms: Fixed,
    #[serde(with = "fixed_serde")]
    speed: Fixed,
    playing: bool,
    paused: bool,
    generation: u64,
    outcome: Option<GameOutcome>,
    selected: Option<EntityId>,
    #[serde(skip)]
    subscribers: Vec<Sender<GameState>>,
}

impl Simulation {
    /// Create a session from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfig`] listing every problem found.
    pub fn initialize(config: GameConfig) -> Result<Self> {
        let problems = config.validate();
        if !problems.is_empty() {
            return Err(GameError::InvalidConfig(problems));
        }

        let ledger = Ledger::new(config.map.starting_gold, config.map.starting_lives);
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        tracing::debug!(
            map = %config.map.name,
            waves = config.map.waves.len(),
            seed = config.seed,
            "Simulation initialized"
        );

        Ok(Self {
            config,
            store: EntityStore::new(),
            ledger,
            waves: WaveScheduler::new(),
            rng,
            tick: 0,
            time_ms: Fixed::ZERO,
            speed: Fixed::ONE,
            playing: false,
            paused: false,
            generation: 0,
            outcome: None,
            selected: None,
            subscribers: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Clock control
    // ------------------------------------------------------------------

    /// Start (or restart) the tick loop. Any earlier handle is invalidated.
    pub fn start_game(&mut self) -> LoopHandle {
        self.generation += 1;
        self.playing = true;
        self.paused = false;
        LoopHandle {
            generation: self.generation,
        }
    }

    /// Whether `handle` belongs to the running loop.
    #[must_use]
    pub fn is_current(&self, handle: LoopHandle) -> bool {
        self.playing && handle.generation == self.generation
    }

    /// Pause without losing any state.
    pub fn pause_game(&mut self) {
        self.paused = true;
    }

    /// Resume after [`pause_game`](Self::pause_game).
    pub fn resume_game(&mut self) {
        self.paused = false;
    }

    /// Halt future ticks and invalidate the loop handle.
    pub fn stop_game(&mut self) {
        self.playing = false;
        self.paused = false;
        self.generation += 1;
    }

    /// Rebuild the session from the stored configuration.
    ///
    /// Subscribers stay attached; the loop handle is invalidated.
    pub fn reset_game(&mut self) {
        self.store = EntityStore::new();
        self.ledger = Ledger::new(self.config.map.starting_gold, self.config.map.starting_lives);
        self.waves = WaveScheduler::new();
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.tick = 0;
        self.time_ms = Fixed::ZERO;
        self.speed = Fixed::ONE;
        self.playing = false;
        self.paused = false;
        self.generation += 1;
        self.outcome = None;
        self.selected = None;
        tracing::debug!("Simulation reset");
    }

    /// Set the speed factor, clamped to `[0.1, 3.0]`. Applies from the
    /// next tick.
    pub fn set_game_speed(&mut self, factor: Fixed) {
        self.speed = factor.clamp(MIN_SPEED, MAX_SPEED);
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the simulation by `elapsed_real_ms` of wall time.
    ///
    /// Simulated time advances by `elapsed_real_ms × speed`. Returns `None`
    /// without touching any state while stopped, paused, or finished.
    pub fn tick(&mut self, elapsed_real_ms: Fixed) -> Option<TickEvents> {
        if !self.playing || self.paused || self.outcome.is_some() {
            return None;
        }

        let dt_ms = elapsed_real_ms.max(Fixed::ZERO) * self.speed;
        self.time_ms += dt_ms;
        self.tick += 1;
        let mut events = TickEvents::default();

        // 1. Waves
        self.run_wave_system(dt_ms, &mut events);

        // 2. Movement
        movement_system(
            &mut self.store.enemies,
            &self.config.map.paths,
            dt_ms,
            &mut events,
        );

        // 3. Status effects
        status_effect_system(&mut self.store.enemies, dt_ms, &mut events);

        // 4. Combat
        tower_fire_system(&mut self.store, self.time_ms, &mut events);
        projectile_system(&mut self.store, &mut self.rng, dt_ms, &mut events);

        // 5. Abilities
        ability_system(&mut self.store, dt_ms, &mut events);

        // 6. Economy
        self.run_economy_system(&mut events);

        #[cfg(feature = "debug-validation")]
        {
            let violations = self.check_invariants();
            for violation in &violations {
                tracing::error!(tick = self.tick, %violation, "Invariant violated");
            }
            debug_assert!(violations.is_empty(), "{violations:?}");
        }

        #[cfg(debug_assertions)]
        tracing::debug!(tick = self.tick, state_hash = self.state_hash(), "Tick complete");

        self.broadcast();
        Some(events)
    }

    fn run_wave_system(&mut self, dt_ms: Fixed, events: &mut TickEvents) {
        let waves = &self.config.map.waves;
        if self
            .waves
            .update_auto_start(waves, self.config.map.auto_start_delay_ms, dt_ms)
        {
            events.waves_started.push(self.waves.current_wave());
        }

        for request in self.waves.update(waves, dt_ms) {
            if let Some(id) = self.spawn_enemy(&request) {
                events.spawned.push(id);
            }
        }
    }

    fn spawn_enemy(&mut self, request: &SpawnRequest) -> Option<EntityId> {
        let Some(ty) = self.config.catalog.get_enemy(&request.enemy_type) else {
            tracing::warn!(enemy_type = %request.enemy_type, "Spawn skipped: unknown enemy type");
            return None;
        };
        let start = self
            .config
            .map
            .paths
            .get(request.path)
            .and_then(|p| p.waypoints.first())
            .copied()?;
        let enemy = Enemy::from_type(ty, request.path, start, request.wave);
        Some(self.store.insert_enemy(enemy))
    }

    fn run_economy_system(&mut self, events: &mut TickEvents) {
        for leak in &events.leaks {
            self.ledger.lose_life();
            tracing::trace!(enemy = leak.enemy, lives = self.ledger.lives, "Enemy leaked");
        }
        for kill in &events.kills {
            self.ledger.credit_kill(&kill.reward);
        }

        let waves = &self.config.map.waves;
        let enemies = &self.store.enemies;
        let auto_start = self.config.map.auto_start_delay_ms.is_some();
        let completed = self.waves.complete_cleared(waves, auto_start, |index| {
            enemies.values().any(|e| e.wave == index)
        });
        for index in completed {
            if let Some(def) = waves.get(index) {
                self.ledger.credit_wave(&def.reward);
            }
            events.waves_completed.push(index + 1);
        }

        let outcome = if self.ledger.lives == 0 {
            Some(GameOutcome::Defeat)
        } else if self.waves.all_complete(waves) && self.store.enemies.is_empty() {
            Some(GameOutcome::Victory)
        } else {
            None
        };
        if let Some(outcome) = outcome {
            tracing::info!(
                ?outcome,
                tick = self.tick,
                score = self.ledger.score,
                "Game over"
            );
            self.outcome = Some(outcome);
            events.outcome = Some(outcome);
        }
    }

    // ------------------------------------------------------------------
    // Player actions
    // ------------------------------------------------------------------

    /// Start the next wave. Returns `false` if none remain or the game is
    /// over.
    pub fn start_next_wave(&mut self) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.waves.start_next_wave(&self.config.map.waves)
    }

    /// Place a tower, reporting why it was refused.
    pub fn try_place_tower(
        &mut self,
        type_id: &str,
        position: Vec2Fixed,
    ) -> std::result::Result<EntityId, ActionError> {
        self.ensure_running()?;
        economy::place_tower(
            &mut self.ledger,
            &mut self.store,
            &self.config.catalog,
            &self.config.map,
            type_id,
            position,
        )
    }

    /// Place a tower at `(x, y)`. Returns `false` if refused.
    pub fn place_tower(&mut self, type_id: &str, x: Fixed, y: Fixed) -> bool {
        log_rejection("place_tower", self.try_place_tower(type_id, Vec2Fixed::new(x, y)))
    }

    /// Sell a tower, reporting the refund or why it was refused.
    pub fn try_sell_tower(&mut self, id: EntityId) -> std::result::Result<u32, ActionError> {
        self.ensure_running()?;
        let refund = economy::sell_tower(&mut self.ledger, &mut self.store, id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Ok(refund)
    }

    /// Sell a tower. Returns `false` for unknown ids.
    pub fn sell_tower(&mut self, id: EntityId) -> bool {
        log_rejection("sell_tower", self.try_sell_tower(id))
    }

    /// Upgrade a tower, reporting why it was refused.
    pub fn try_upgrade_tower(
        &mut self,
        id: EntityId,
        upgrade_id: &str,
    ) -> std::result::Result<(), ActionError> {
        self.ensure_running()?;
        economy::upgrade_tower(&mut self.ledger, &mut self.store, id, upgrade_id)
    }

    /// Upgrade a tower. Returns `false` if refused.
    pub fn upgrade_tower(&mut self, id: EntityId, upgrade_id: &str) -> bool {
        log_rejection("upgrade_tower", self.try_upgrade_tower(id, upgrade_id))
    }

    /// Select a tower, or clear the selection with `None`. Returns `false`
    /// (and keeps the old selection) if the tower does not exist.
    pub fn select_tower(&mut self, id: Option<EntityId>) -> bool {
        match id {
            Some(id) if !self.store.towers.contains(id) => false,
            _ => {
                self.selected = id;
                true
            }
        }
    }

    fn ensure_running(&self) -> std::result::Result<(), ActionError> {
        if self.outcome.is_some() {
            return Err(ActionError::GameOver);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Build a snapshot of the current state.
    #[must_use]
    pub fn get_game_state(&self) -> GameState {
        let live = u32::try_from(self.store.enemies.len()).unwrap_or(u32::MAX);
        GameState {
            lives: self.ledger.lives,
            max_lives: self.ledger.max_lives,
            gold: self.ledger.gold,
            score: self.ledger.score,
            experience: self.ledger.experience,
            current_wave: self.waves.current_wave(),
            total_waves: self.config.map.waves.len(),
            wave_phase: self.waves.phase(),
            wave_progress: self.waves.progress(),
            enemies_remaining: live.saturating_add(self.waves.unspawned()),
            towers: self.store.towers.values().cloned().collect(),
            enemies: self.store.enemies.values().cloned().collect(),
            projectiles: self.store.projectiles.values().cloned().collect(),
            selected_tower: self.selected,
            speed: self.speed,
            playing: self.playing,
            paused: self.paused,
            outcome: self.outcome,
            time_ms: self.time_ms,
            tick: self.tick,
        }
    }

    /// Receive a snapshot after every executed tick.
    ///
    /// The channel is bounded; when the receiver falls behind, snapshots
    /// are dropped rather than stalling the tick.
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<GameState> {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        self.subscribers.push(sender);
        receiver
    }

    fn broadcast(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let state = self.get_game_state();
        self.subscribers
            .retain(|sender| match sender.try_send(state.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });
    }

    /// Ticks executed.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Simulated milliseconds since start.
    #[must_use]
    pub const fn time_ms(&self) -> Fixed {
        self.time_ms
    }

    /// Current speed factor.
    #[must_use]
    pub const fn speed(&self) -> Fixed {
        self.speed
    }

    /// Whether the game ended, and how.
    #[must_use]
    pub const fn outcome(&self) -> Option<GameOutcome> {
        self.outcome
    }

    /// Player resources.
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Live entities.
    #[must_use]
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Wave progression.
    #[must_use]
    pub const fn waves(&self) -> &WaveScheduler {
        &self.waves
    }

    /// Configuration the session was built from.
    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Whether the clock is running.
    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whether the clock is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Selected tower, if any.
    #[must_use]
    pub const fn selected_tower(&self) -> Option<EntityId> {
        self.selected
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.time_ms.to_bits().hash(&mut hasher);
        self.ledger.hash(&mut hasher);
        self.outcome.hash(&mut hasher);
        self.selected.hash(&mut hasher);
        self.waves.hash(&mut hasher);
        self.rng.get_word_pos().hash(&mut hasher);

        self.store.towers.len().hash(&mut hasher);
        for (id, tower) in self.store.towers.iter() {
            id.hash(&mut hasher);
            tower.position.hash(&mut hasher);
            tower.level.hash(&mut hasher);
            tower.stats.damage.to_bits().hash(&mut hasher);
            tower.last_fire_ms.map(Fixed::to_bits).hash(&mut hasher);
            tower.target.hash(&mut hasher);
            tower.buff_multiplier.to_bits().hash(&mut hasher);
            tower.buff_remaining_ms.to_bits().hash(&mut hasher);
            for slot in &tower.abilities {
                slot.cooldown_remaining_ms.to_bits().hash(&mut hasher);
            }
        }

        self.store.enemies.len().hash(&mut hasher);
        for (id, enemy) in self.store.enemies.iter() {
            id.hash(&mut hasher);
            enemy.position.hash(&mut hasher);
            enemy.health.to_bits().hash(&mut hasher);
            enemy.next_waypoint.hash(&mut hasher);
            for effect in &enemy.effects {
                effect.kind.hash(&mut hasher);
                effect.value.to_bits().hash(&mut hasher);
                effect.remaining_ms.to_bits().hash(&mut hasher);
            }
        }

        self.store.projectiles.len().hash(&mut hasher);
        for (id, projectile) in self.store.projectiles.iter() {
            id.hash(&mut hasher);
            projectile.position.hash(&mut hasher);
            projectile.velocity.hash(&mut hasher);
            projectile.piercing_remaining.hash(&mut hasher);
            projectile.age_ms.to_bits().hash(&mut hasher);
            projectile.hit.hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Check the state invariants, returning a description of each
    /// violation.
    #[must_use]
    pub fn check_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for (id, enemy) in self.store.enemies.iter() {
            if enemy.health <= Fixed::ZERO || enemy.health > enemy.max_health {
                violations.push(format!("Enemy {id} has health {}", enemy.health));
            }
            if enemy.effects.iter().any(|e| e.remaining_ms <= Fixed::ZERO) {
                violations.push(format!("Enemy {id} holds an expired effect"));
            }
        }
        for (id, projectile) in self.store.projectiles.iter() {
            if projectile.piercing_remaining == 0 {
                violations.push(format!("Projectile {id} is spent but alive"));
            }
        }
        if let Some(selected) = self.selected {
            if !self.store.towers.contains(selected) {
                violations.push(format!("Selected tower {selected} does not exist"));
            }
        }
        violations
    }

    /// Serialize the simulation state as a save-state.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize simulation: {}", e)))
    }

    /// Restore a simulation from a save-state. Subscribers are not
    /// restored.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            GameError::InvalidState(format!("Failed to deserialize simulation: {}", e))
        })
    }
}

fn log_rejection<T>(action: &str, result: std::result::Result<T, ActionError>) -> bool {
    match result {
        Ok(_) => true,
        Err(err) => {
            tracing::debug!(action, %err, "Action rejected");
            false
        }
    }
}
