//! Test fixtures and helpers.
//!
//! Pre-built catalogs, maps, and sessions for consistent testing.

use serde::de::DeserializeOwned;
use td_core::config::{
    AbilityDef, AbilityKind, BuildArea, Catalog, DamageKind, EnemyFlags, EnemyType, GameConfig,
    MapConfig, MapPath, PowerScores, ProjectileSpec, Reward, SpawnGroup, TowerStats, TowerType,
    TriggeredAbility, TriggeredEffect, WaveDef, WaveReward,
};
use td_core::events::TickEvents;
use td_core::math::{Fixed, Vec2Fixed};
use td_core::simulation::Simulation;
use td_core::store::EntityId;

/// Wall-clock frame length used by the harness, in milliseconds.
pub const FRAME_MS: i32 = 16;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Parse any RON fixture.
///
/// # Panics
///
/// Panics with the parser message if `text` is malformed.
#[must_use]
pub fn from_ron<T: DeserializeOwned>(text: &str) -> T {
    match ron::from_str(text) {
        Ok(value) => value,
        Err(e) => panic!("invalid RON fixture: {e}"),
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// A single-target physical tower firing straight shots.
#[must_use]
pub fn tower_type(id: &str, cost: u32, damage: i32, range: i32, fire_rate: i32) -> TowerType {
    TowerType {
        id: id.to_string(),
        name: id.to_string(),
        cost,
        stats: TowerStats {
            damage: fixed(damage),
            range: fixed(range),
            fire_rate: fixed(fire_rate),
            piercing: 1,
            crit_chance: Fixed::ZERO,
            crit_multiplier: fixed(2),
            power: PowerScores::default(),
        },
        damage_kind: DamageKind::Physical,
        targets_flying: true,
        detects_invisible: false,
        projectile: ProjectileSpec {
            speed: fixed(400),
            homing: false,
            lifetime_ms: 3000,
            explosion: None,
            effects: vec![],
        },
        abilities: vec![],
        upgrades: vec![],
    }
}

/// A plain ground enemy with no armor and no flags.
#[must_use]
pub fn enemy_type(id: &str, health: i32, speed: i32, gold: u32) -> EnemyType {
    EnemyType {
        id: id.to_string(),
        name: id.to_string(),
        health: fixed(health),
        speed: fixed(speed),
        armor: Fixed::ZERO,
        magic_resistance: Fixed::ZERO,
        radius: fixed(12),
        flags: EnemyFlags::default(),
        reward: Reward {
            gold,
            experience: 1,
            score: 10,
        },
    }
}

/// Arrow tower (100g, 50 damage, 150 range, 1 shot/s) plus `basic`
/// (100 hp, 5g) and `fast` (60 hp, 3g) enemies.
#[must_use]
pub fn basic_catalog() -> Catalog {
    Catalog {
        towers: vec![tower_type("arrow", 100, 50, 150, 1)],
        enemies: vec![
            enemy_type("basic", 100, 50, 5),
            enemy_type("fast", 60, 100, 3),
        ],
    }
}

/// [`basic_catalog`] plus a piercing tower, a chain tower, and a boss.
#[must_use]
pub fn full_catalog() -> Catalog {
    let mut catalog = basic_catalog();

    let mut lance = tower_type("lance", 150, 40, 200, 1);
    lance.stats.piercing = 3;
    catalog.towers.push(lance);

    let mut storm = tower_type("storm", 200, 10, 150, 1);
    storm.damage_kind = DamageKind::Magic;
    storm.abilities.push(AbilityDef {
        id: "arc".to_string(),
        kind: AbilityKind::Triggered(TriggeredAbility {
            cooldown_ms: 2000,
            radius: Fixed::ZERO,
            effect: TriggeredEffect::Chain {
                damage: fixed(100),
                link_distance: fixed(60),
            },
            scales_with: None,
        }),
    });
    catalog.towers.push(storm);

    let mut boss = enemy_type("boss", 2000, 30, 100);
    boss.armor = fixed(5);
    boss.flags.boss = true;
    catalog.enemies.push(boss);

    catalog
}

// ============================================================================
// Waves and maps
// ============================================================================

/// A spawn group on path 0 with no start offset.
#[must_use]
pub fn spawn_group(enemy_type: &str, count: u32, spawn_delay_ms: u32) -> SpawnGroup {
    SpawnGroup {
        enemy_type: enemy_type.to_string(),
        count,
        spawn_delay_ms,
        start_offset_ms: 0,
        path: 0,
    }
}

/// A wave paying `gold` on completion.
#[must_use]
pub fn wave(groups: Vec<SpawnGroup>, gold: u32) -> WaveDef {
    WaveDef {
        groups,
        reward: WaveReward {
            gold,
            experience: 0,
        },
    }
}

/// A horizontal path along y = 100 from x = 0 to x = 1000, with buildable
/// strips above (y 0..80) and below (y 120..200) it.
///
/// 500 gold, 20 lives, towers at least 32 apart.
#[must_use]
pub fn straight_map(waves: Vec<WaveDef>) -> MapConfig {
    let strip = |y: i32| BuildArea {
        x: Fixed::ZERO,
        y: fixed(y),
        width: fixed(1000),
        height: fixed(80),
    };
    MapConfig {
        name: "straight".to_string(),
        paths: vec![MapPath {
            waypoints: vec![Vec2Fixed::from_ints(0, 100), Vec2Fixed::from_ints(1000, 100)],
        }],
        buildable: vec![strip(0), strip(120)],
        waves,
        starting_gold: 500,
        starting_lives: 20,
        min_tower_spacing: fixed(32),
        auto_start_delay_ms: None,
    }
}

/// [`straight_map`] with [`basic_catalog`] and seed 42.
#[must_use]
pub fn basic_config(waves: Vec<WaveDef>) -> GameConfig {
    GameConfig {
        map: straight_map(waves),
        catalog: basic_catalog(),
        seed: 42,
    }
}

/// One wave of ten `basic` and five `fast` enemies, 500 ms apart.
#[must_use]
pub fn mixed_wave() -> WaveDef {
    wave(
        vec![spawn_group("basic", 10, 500), spawn_group("fast", 5, 500)],
        25,
    )
}

// ============================================================================
// Sessions
// ============================================================================

/// Builds a started [`Simulation`] with towers already placed.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    config: GameConfig,
    towers: Vec<(String, Vec2Fixed)>,
    start_wave: bool,
}

impl SessionBuilder {
    /// Start from a configuration.
    #[must_use]
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            towers: Vec::new(),
            start_wave: false,
        }
    }

    /// Place a tower once the session exists.
    #[must_use]
    pub fn tower(mut self, type_id: &str, x: i32, y: i32) -> Self {
        self.towers
            .push((type_id.to_string(), Vec2Fixed::from_ints(x, y)));
        self
    }

    /// Start the first wave right away.
    #[must_use]
    pub fn start_wave(mut self) -> Self {
        self.start_wave = true;
        self
    }

    /// Override the crit RNG seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Build and start the session. Returns the placed tower ids in order.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid or a placement is refused.
    #[must_use]
    pub fn build(self) -> (Simulation, Vec<EntityId>) {
        let mut sim = match Simulation::initialize(self.config) {
            Ok(sim) => sim,
            Err(e) => panic!("fixture config rejected: {e}"),
        };
        let _ = sim.start_game();

        let ids = self
            .towers
            .iter()
            .map(|(type_id, pos)| match sim.try_place_tower(type_id, *pos) {
                Ok(id) => id,
                Err(e) => panic!("fixture placement of {type_id} rejected: {e}"),
            })
            .collect();

        if self.start_wave {
            assert!(sim.start_next_wave(), "fixture has no wave to start");
        }
        (sim, ids)
    }
}

/// Advance `sim` by `ticks` frames of [`FRAME_MS`], collecting the events.
pub fn run_ticks(sim: &mut Simulation, ticks: u64) -> Vec<TickEvents> {
    (0..ticks)
        .filter_map(|_| sim.tick(fixed(FRAME_MS)))
        .collect()
}

/// Tick until the game ends or `max_ticks` frames pass. Returns the
/// number of ticks executed.
pub fn run_until_outcome(sim: &mut Simulation, max_ticks: u64) -> u64 {
    let mut ticks = 0;
    while ticks < max_ticks && sim.outcome().is_none() {
        if sim.tick(fixed(FRAME_MS)).is_none() {
            break;
        }
        ticks += 1;
    }
    tracing::debug!(ticks, outcome = ?sim.outcome(), "Fixture run finished");
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_configs_validate() {
        assert!(basic_config(vec![mixed_wave()]).validate().is_empty());
        let mut config = basic_config(vec![mixed_wave()]);
        config.catalog = full_catalog();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_session_builder_places_towers() {
        let (sim, ids) = SessionBuilder::new(basic_config(vec![mixed_wave()]))
            .tower("arrow", 100, 40)
            .tower("arrow", 300, 40)
            .start_wave()
            .build();
        assert_eq!(ids.len(), 2);
        assert_eq!(sim.ledger().gold, 300);
        assert!(sim.is_playing());
    }

    #[test]
    fn test_from_ron_parses_wave() {
        let parsed: WaveDef = from_ron(
            r#"(groups: [(enemy_type: "basic", count: 3, spawn_delay_ms: 200)], reward: (gold: 5))"#,
        );
        assert_eq!(parsed.total_enemies(), 3);
        assert_eq!(parsed.reward.gold, 5);
    }
}
