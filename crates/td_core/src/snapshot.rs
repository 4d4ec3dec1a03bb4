//! Read-only game state handed to presentation layers.

use serde::{Deserialize, Serialize};

use crate::components::{Enemy, Projectile, Tower};
use crate::events::GameOutcome;
use crate::math::{fixed_serde, Fixed};
use crate::store::EntityId;
use crate::waves::WavePhase;

/// An owned copy of everything a UI needs to draw one frame.
///
/// Entity lists are in ascending id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Lives left.
    pub lives: u32,
    /// Lives at game start.
    pub max_lives: u32,
    /// Gold available.
    pub gold: u32,
    /// Accumulated score.
    pub score: u64,
    /// Accumulated experience.
    pub experience: u64,
    /// One-based number of the latest started wave; zero before any.
    pub current_wave: usize,
    /// Number of waves on the map.
    pub total_waves: usize,
    /// Phase of the latest started wave.
    pub wave_phase: WavePhase,
    /// Spawn progress of the latest wave, 0 to 1.
    #[serde(with = "fixed_serde")]
    pub wave_progress: Fixed,
    /// Live enemies plus enemies still waiting to spawn.
    pub enemies_remaining: u32,
    /// Placed towers.
    pub towers: Vec<Tower>,
    /// Enemies on the field.
    pub enemies: Vec<Enemy>,
    /// Projectiles in flight.
    pub projectiles: Vec<Projectile>,
    /// Tower currently selected by the player.
    pub selected_tower: Option<EntityId>,
    /// Speed factor.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Whether the clock is running.
    pub playing: bool,
    /// Whether the clock is paused.
    pub paused: bool,
    /// Set once the game has ended.
    pub outcome: Option<GameOutcome>,
    /// Simulated milliseconds since start.
    #[serde(with = "fixed_serde")]
    pub time_ms: Fixed,
    /// Ticks executed.
    pub tick: u64,
}

impl GameState {
    /// Look up a tower in the snapshot.
    #[must_use]
    pub fn tower(&self, id: EntityId) -> Option<&Tower> {
        self.towers.iter().find(|t| t.id == id)
    }

    /// Look up an enemy in the snapshot.
    #[must_use]
    pub fn enemy(&self, id: EntityId) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.id == id)
    }
}
