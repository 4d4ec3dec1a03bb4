//! Scenario loading and configuration.
//!
//! A scenario is a [`GameConfig`] plus a script: which towers to place and
//! when, how waves are started, and how long to run.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use td_core::config::GameConfig;
use td_core::math::{fixed_decimal, Fixed};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario or its game config is inconsistent.
    #[error("Invalid scenario: {}", .0.join("; "))]
    Invalid(Vec<String>),
    /// The simulation refused to start.
    #[error(transparent)]
    Game(#[from] td_core::error::GameError),
}

/// How the runner starts waves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WavePolicy {
    /// Start the next wave as soon as the current one finishes spawning.
    Eager,
    /// Start the next wave once the field is clear.
    #[default]
    OnClear,
    /// Start the first wave, then leave the rest to the map's auto-start
    /// delay.
    MapAuto,
}

/// A scripted tower purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerPlacement {
    /// Tower type id.
    pub tower_type: String,
    /// X coordinate.
    #[serde(with = "fixed_decimal")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_decimal")]
    pub y: Fixed,
    /// Tick on which to place it; 0 places before the first tick.
    #[serde(default)]
    pub at_tick: u64,
    /// Upgrades to buy right after placing, in order.
    #[serde(default)]
    pub upgrades: Vec<String>,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Map, catalog, and seed.
    pub config: GameConfig,
    /// Towers to place.
    #[serde(default)]
    pub placements: Vec<TowerPlacement>,
    /// How waves are started.
    #[serde(default)]
    pub wave_policy: WavePolicy,
    /// Wall-clock milliseconds per frame.
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u32,
    /// Speed factor.
    #[serde(default = "default_speed", with = "fixed_decimal")]
    pub speed: Fixed,
    /// Give up after this many ticks.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

const fn default_frame_ms() -> u32 {
    16
}

fn default_speed() -> Fixed {
    Fixed::ONE
}

const fn default_max_ticks() -> u64 {
    36_000
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario = Self::from_ron_str(&contents)?;
        tracing::debug!(name = %scenario.name, path = %path.display(), "Scenario loaded");
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Check the game config and the script against it.
    ///
    /// Placements are only checked for a known tower type and known
    /// upgrade ids; spacing and funds depend on the run.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut problems = self.config.validate();

        if self.frame_ms == 0 {
            problems.push("Frame time must be positive".to_string());
        }
        if self.max_ticks == 0 {
            problems.push("Tick cap must be positive".to_string());
        }
        if self.speed <= Fixed::ZERO {
            problems.push("Speed must be positive".to_string());
        }
        if self.wave_policy == WavePolicy::MapAuto && self.config.map.auto_start_delay_ms.is_none()
        {
            problems.push("MapAuto wave policy needs an auto_start_delay_ms on the map".to_string());
        }

        for (i, placement) in self.placements.iter().enumerate() {
            let Some(tower) = self.config.catalog.get_tower(&placement.tower_type) else {
                problems.push(format!(
                    "Placement {i} uses unknown tower type '{}'",
                    placement.tower_type
                ));
                continue;
            };
            for upgrade in &placement.upgrades {
                if !tower.upgrades.iter().any(|u| &u.id == upgrade) {
                    problems.push(format!(
                        "Placement {i} buys unknown upgrade '{upgrade}' for '{}'",
                        tower.id
                    ));
                }
            }
        }
        problems
    }

    /// Validate, turning problems into an error.
    pub fn ensure_valid(&self) -> Result<(), ScenarioError> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ScenarioError::Invalid(problems))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const SMALL: &str = r#"
        Scenario(
            name: "Small",
            config: GameConfig(
                seed: 3,
                map: MapConfig(
                    name: "lane",
                    paths: [MapPath(waypoints: [(x: 0.0, y: 100.0), (x: 600.0, y: 100.0)])],
                    buildable: [BuildArea(x: 0.0, y: 0.0, width: 600.0, height: 80.0)],
                    waves: [
                        WaveDef(
                            groups: [SpawnGroup(enemy_type: "grunt", count: 4, spawn_delay_ms: 400)],
                            reward: WaveReward(gold: 20),
                        ),
                        WaveDef(
                            groups: [SpawnGroup(enemy_type: "grunt", count: 6, spawn_delay_ms: 300)],
                            reward: WaveReward(gold: 30),
                        ),
                    ],
                    starting_gold: 300,
                    starting_lives: 10,
                ),
                catalog: Catalog(
                    towers: [
                        TowerType(
                            id: "arrow",
                            cost: 100,
                            stats: TowerStats(damage: 30.0, range: 160.0, fire_rate: 2.0),
                            projectile: ProjectileSpec(speed: 500.0, homing: true),
                            upgrades: [UpgradeDef(id: "sharp", cost: 50, delta: StatDelta(damage: 10.0))],
                        ),
                    ],
                    enemies: [
                        EnemyType(id: "grunt", health: 80.0, speed: 60.0, reward: Reward(gold: 5)),
                    ],
                ),
            ),
            placements: [
                TowerPlacement(tower_type: "arrow", x: 150.0, y: 50.0, upgrades: ["sharp"]),
                TowerPlacement(tower_type: "arrow", x: 400.0, y: 50.0, at_tick: 120),
            ],
        )
    "#;

    #[test]
    fn test_parse_from_ron() {
        let scenario = Scenario::from_ron_str(SMALL).unwrap();
        assert_eq!(scenario.name, "Small");
        assert_eq!(scenario.frame_ms, 16);
        assert_eq!(scenario.wave_policy, WavePolicy::OnClear);
        assert_eq!(scenario.placements[1].at_tick, 120);
        assert_eq!(scenario.placements[0].x, Fixed::from_num(150));
        assert!(scenario.validate().is_empty());
    }

    #[test]
    fn test_validate_reports_script_problems() {
        let mut scenario = Scenario::from_ron_str(SMALL).unwrap();
        scenario.placements[0].tower_type = "laser".to_string();
        scenario.placements[1].upgrades.push("blunt".to_string());
        scenario.wave_policy = WavePolicy::MapAuto;

        let problems = scenario.validate();
        assert_eq!(problems.len(), 3, "{problems:?}");
        assert!(matches!(
            scenario.ensure_valid(),
            Err(ScenarioError::Invalid(p)) if p.len() == 3
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SMALL.as_bytes()).unwrap();
        let scenario = Scenario::load(file.path()).unwrap();
        assert_eq!(scenario.config.map.waves.len(), 2);
    }

    #[test]
    fn test_bundled_scenario_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/basic.ron");
        let scenario = Scenario::load(path).unwrap();
        assert_eq!(scenario.validate(), Vec::<String>::new());
        assert_eq!(scenario.config.map.waves.len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.ron");
        assert!(matches!(
            Scenario::load(&missing),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(matches!(
            Scenario::from_ron_str("Scenario(name: 5)"),
            Err(ScenarioError::ParseError(_))
        ));
    }
}
