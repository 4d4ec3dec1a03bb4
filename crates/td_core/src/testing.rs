//! Small catalogs and maps shared by the unit tests in this crate.

use crate::config::{
    BuildArea, Catalog, DamageKind, EnemyFlags, EnemyType, GameConfig, MapConfig, MapPath,
    PowerScores, ProjectileSpec, Reward, SpawnGroup, TowerStats, TowerType, WaveDef, WaveReward,
};
use crate::math::{Fixed, Vec2Fixed};

pub fn fixed(value: f64) -> Fixed {
    Fixed::from_num(value)
}

pub fn tower_type(id: &str, cost: u32, damage: i32, range: i32, fire_rate: i32) -> TowerType {
    TowerType {
        id: id.to_string(),
        name: id.to_string(),
        cost,
        stats: TowerStats {
            damage: Fixed::from_num(damage),
            range: Fixed::from_num(range),
            fire_rate: Fixed::from_num(fire_rate),
            piercing: 1,
            crit_chance: Fixed::ZERO,
            crit_multiplier: Fixed::from_num(2),
            power: PowerScores::default(),
        },
        damage_kind: DamageKind::Physical,
        targets_flying: true,
        detects_invisible: false,
        projectile: ProjectileSpec {
            speed: Fixed::from_num(400),
            homing: false,
            lifetime_ms: 3000,
            explosion: None,
            effects: vec![],
        },
        abilities: vec![],
        upgrades: vec![],
    }
}

pub fn enemy_type(id: &str, health: i32, speed: i32, gold: u32) -> EnemyType {
    EnemyType {
        id: id.to_string(),
        name: id.to_string(),
        health: Fixed::from_num(health),
        speed: Fixed::from_num(speed),
        armor: Fixed::ZERO,
        magic_resistance: Fixed::ZERO,
        radius: Fixed::from_num(12),
        flags: EnemyFlags::default(),
        reward: Reward {
            gold,
            experience: 1,
            score: 10,
        },
    }
}

pub fn basic_catalog() -> Catalog {
    Catalog {
        towers: vec![tower_type("arrow", 100, 50, 150, 1)],
        enemies: vec![enemy_type("basic", 100, 50, 5), enemy_type("fast", 60, 100, 3)],
    }
}

pub fn group(enemy_type: &str, count: u32, spawn_delay_ms: u32) -> SpawnGroup {
    SpawnGroup {
        enemy_type: enemy_type.to_string(),
        count,
        spawn_delay_ms,
        start_offset_ms: 0,
        path: 0,
    }
}

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
/// strips above and below it.
pub fn straight_map(waves: Vec<WaveDef>) -> MapConfig {
    MapConfig {
        name: "straight".to_string(),
        paths: vec![MapPath {
            waypoints: vec![Vec2Fixed::from_ints(0, 100), Vec2Fixed::from_ints(1000, 100)],
        }],
        buildable: vec![
            BuildArea {
                x: Fixed::ZERO,
                y: Fixed::ZERO,
                width: Fixed::from_num(1000),
                height: Fixed::from_num(80),
            },
            BuildArea {
                x: Fixed::ZERO,
                y: Fixed::from_num(120),
                width: Fixed::from_num(1000),
                height: Fixed::from_num(80),
            },
        ],
        waves,
        starting_gold: 500,
        starting_lives: 20,
        min_tower_spacing: Fixed::from_num(32),
        auto_start_delay_ms: None,
    }
}

pub fn basic_config(waves: Vec<WaveDef>) -> GameConfig {
    GameConfig {
        map: straight_map(waves),
        catalog: basic_catalog(),
        seed: 42,
    }
}
