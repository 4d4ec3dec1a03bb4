//! Events produced by a simulation tick.
//!
//! These are for the presentation layer: sounds, floating damage numbers,
//! kill feeds. The simulation never reads them back.

use serde::{Deserialize, Serialize};

use crate::config::Reward;
use crate::math::{fixed_serde, Fixed};
use crate::store::EntityId;

/// A projectile was fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotFired {
    /// Firing tower.
    pub tower: EntityId,
    /// Spawned projectile.
    pub projectile: EntityId,
    /// Enemy aimed at.
    pub target: EntityId,
}

/// Where a hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitSource {
    /// Direct projectile collision.
    Projectile,
    /// Explosion splash.
    Explosion,
    /// Chain ability link.
    Chain,
    /// Burn or poison tick.
    DamageOverTime,
}

/// Damage dealt to an enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageDealt {
    /// Tower responsible, if any.
    pub tower: Option<EntityId>,
    /// Damaged enemy.
    pub enemy: EntityId,
    /// Health removed.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
    /// Whether the hit was critical.
    pub critical: bool,
    /// Origin of the damage.
    pub source: HitSource,
}

/// An enemy died. Its reward is credited once, later in the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyKilled {
    /// Dead enemy.
    pub enemy: EntityId,
    /// Tower credited with the kill, if any.
    pub tower: Option<EntityId>,
    /// Reward owed.
    pub reward: Reward,
    /// Wave the enemy belonged to.
    pub wave: usize,
}

/// An enemy walked off the end of its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyLeaked {
    /// Leaked enemy.
    pub enemy: EntityId,
    /// Wave the enemy belonged to.
    pub wave: usize,
}

/// A triggered ability fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityActivated {
    /// Owning tower.
    pub tower: EntityId,
    /// Ability id.
    pub ability: String,
    /// Entities affected (enemies, or towers for buffs).
    pub affected: Vec<EntityId>,
}

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameOutcome {
    /// Every wave cleared.
    Victory,
    /// Lives ran out.
    Defeat,
}

/// Everything that happened in one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Waves started this tick (one-based numbers).
    pub waves_started: Vec<usize>,
    /// Enemies spawned.
    pub spawned: Vec<EntityId>,
    /// Projectiles fired.
    pub shots: Vec<ShotFired>,
    /// Damage dealt.
    pub damage: Vec<DamageDealt>,
    /// Enemies killed.
    pub kills: Vec<EnemyKilled>,
    /// Enemies that reached the end of their path.
    pub leaks: Vec<EnemyLeaked>,
    /// Projectiles removed (spent or expired).
    pub projectiles_removed: Vec<EntityId>,
    /// Triggered abilities that fired.
    pub abilities: Vec<AbilityActivated>,
    /// Waves completed this tick (one-based numbers).
    pub waves_completed: Vec<usize>,
    /// Set on the tick the game ends.
    pub outcome: Option<GameOutcome>,
}
