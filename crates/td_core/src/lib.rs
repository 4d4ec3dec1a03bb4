//! # TD Core
//!
//! Deterministic combat simulation for a tower-defense game.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (crit rolls use a seeded RNG)
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Headless runs and scripted scenarios
//! - Save-states that resume bit-for-bit
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`config`] - Tower, enemy, wave, and map definitions
//! - [`store`] - Id-ordered entity storage
//! - [`components`] - Runtime tower, enemy, and projectile data
//! - [`movement`] / [`effects`] - Path following and status effects
//! - [`combat`] / [`abilities`] - Targeting, projectiles, triggered abilities
//! - [`waves`] / [`economy`] - Wave scheduling and the gold/lives ledger
//! - [`simulation`] - The tick loop, clock control, and snapshots
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod abilities;
pub mod combat;
pub mod components;
pub mod config;
pub mod economy;
pub mod effects;
pub mod error;
pub mod events;
pub mod math;
pub mod movement;
pub mod simulation;
pub mod snapshot;
pub mod store;
pub mod waves;

#[cfg(test)]
mod testing;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::components::{ActiveEffect, Enemy, Projectile, Tower};
    pub use crate::config::{
        Catalog, DamageKind, EffectKind, EnemyType, GameConfig, MapConfig, TowerType, WaveDef,
    };
    pub use crate::economy::Ledger;
    pub use crate::error::{ActionError, GameError, Result};
    pub use crate::events::{GameOutcome, TickEvents};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::simulation::{LoopHandle, Simulation};
    pub use crate::snapshot::GameState;
    pub use crate::store::EntityId;
    pub use crate::waves::WavePhase;
}
