//! Static configuration: tower and enemy catalogs, waves, map geometry.
//!
//! Everything in this module is pure data designed to be deserialized from
//! RON. Numbers are written as decimals in files and converted to
//! fixed-point once at load time. Durations are integer milliseconds.
//!
//! **Note:** This module contains no IO. Reading files is the caller's job;
//! [`GameConfig::from_ron_str`] only parses text.
//!
//! # Example RON
//!
//! ```ron
//! GameConfig(
//!     seed: 7,
//!     map: MapConfig(
//!         name: "meadow",
//!         paths: [MapPath(waypoints: [(x: 0.0, y: 100.0), (x: 800.0, y: 100.0)])],
//!         buildable: [BuildArea(x: 0.0, y: 0.0, width: 800.0, height: 80.0)],
//!         waves: [
//!             WaveDef(
//!                 groups: [SpawnGroup(enemy_type: "grunt", count: 10, spawn_delay_ms: 800)],
//!                 reward: WaveReward(gold: 50, experience: 20),
//!             ),
//!         ],
//!         starting_gold: 500,
//!         starting_lives: 20,
//!     ),
//!     catalog: Catalog(towers: [...], enemies: [...]),
//! )
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_decimal, vec2_decimal, Fixed, Vec2Fixed};

/// Upper bound on the slow fraction any effect can impose.
pub const MAX_SLOW_FRACTION: Fixed = Fixed::from_bits(0xE666_6666); // 0.9

/// Largest absolute map coordinate. Keeps squared distances between any two
/// map points inside the `Fixed` range.
pub const MAX_COORDINATE: i32 = 20_000;

// ============================================================================
// Shared enums
// ============================================================================

/// How incoming damage is mitigated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DamageKind {
    /// Reduced by the target's armor.
    #[default]
    Physical,
    /// Reduced by the target's magic resistance.
    Magic,
}

/// Kind of timed status effect an enemy can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Reduces movement speed by `value` (a fraction).
    Slow,
    /// Holds the enemy in place.
    Freeze,
    /// Deals `value` damage per second.
    Burn,
    /// Deals `value` damage per second.
    Poison,
    /// Holds the enemy in place.
    Stun,
}

impl EffectKind {
    /// Whether this effect stops movement entirely.
    #[must_use]
    pub const fn holds_in_place(self) -> bool {
        matches!(self, Self::Freeze | Self::Stun)
    }

    /// Whether this effect deals damage over time.
    #[must_use]
    pub const fn is_damage_over_time(self) -> bool {
        matches!(self, Self::Burn | Self::Poison)
    }
}

/// A status effect template carried by projectiles or abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSpec {
    /// Effect kind.
    pub kind: EffectKind,
    /// Slow fraction or damage per second, depending on kind.
    #[serde(default, with = "fixed_decimal")]
    pub value: Fixed,
    /// Lifetime in milliseconds.
    pub duration_ms: u32,
}

/// The four auxiliary power scores a tower inherits from its character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerKind {
    /// Physical might.
    Strength,
    /// Speed and precision.
    Agility,
    /// Arcane aptitude.
    Intellect,
    /// Willpower and support.
    Spirit,
}

/// Auxiliary power scores used to scale triggered abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PowerScores {
    /// Strength score.
    #[serde(default, with = "fixed_decimal")]
    pub strength: Fixed,
    /// Agility score.
    #[serde(default, with = "fixed_decimal")]
    pub agility: Fixed,
    /// Intellect score.
    #[serde(default, with = "fixed_decimal")]
    pub intellect: Fixed,
    /// Spirit score.
    #[serde(default, with = "fixed_decimal")]
    pub spirit: Fixed,
}

impl PowerScores {
    /// Look up one score.
    #[must_use]
    pub const fn get(&self, kind: PowerKind) -> Fixed {
        match kind {
            PowerKind::Strength => self.strength,
            PowerKind::Agility => self.agility,
            PowerKind::Intellect => self.intellect,
            PowerKind::Spirit => self.spirit,
        }
    }
}

// ============================================================================
// Towers
// ============================================================================

/// Base combat statistics of a tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerStats {
    /// Damage per projectile.
    #[serde(with = "fixed_decimal")]
    pub damage: Fixed,
    /// Targeting range in world units.
    #[serde(with = "fixed_decimal")]
    pub range: Fixed,
    /// Attacks per second.
    #[serde(with = "fixed_decimal")]
    pub fire_rate: Fixed,
    /// Enemies a single projectile may damage.
    #[serde(default = "default_piercing")]
    pub piercing: u32,
    /// Probability of a critical hit, 0.0 to 1.0.
    #[serde(default, with = "fixed_decimal")]
    pub crit_chance: Fixed,
    /// Damage multiplier on a critical hit.
    #[serde(default = "default_crit_multiplier", with = "fixed_decimal")]
    pub crit_multiplier: Fixed,
    /// Auxiliary power scores.
    #[serde(default)]
    pub power: PowerScores,
}

const fn default_piercing() -> u32 {
    1
}

fn default_crit_multiplier() -> Fixed {
    Fixed::from_num(2)
}

impl TowerStats {
    /// Milliseconds between attacks (`1000 / fire_rate`).
    #[must_use]
    pub fn cooldown_ms(&self) -> Fixed {
        if self.fire_rate <= Fixed::ZERO {
            return Fixed::MAX;
        }
        crate::math::MS_PER_SECOND / self.fire_rate
    }
}

/// Area damage dealt around the impact point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplosionSpec {
    /// Radius around the impact point.
    #[serde(with = "fixed_decimal")]
    pub radius: Fixed,
    /// Fraction of the projectile's damage dealt to bystanders.
    #[serde(with = "fixed_decimal")]
    pub damage_fraction: Fixed,
}

/// How a tower's projectiles fly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileSpec {
    /// Travel speed in units per second.
    #[serde(with = "fixed_decimal")]
    pub speed: Fixed,
    /// Whether the projectile steers toward its live target.
    #[serde(default)]
    pub homing: bool,
    /// Maximum flight time in milliseconds.
    #[serde(default = "default_projectile_lifetime")]
    pub lifetime_ms: u32,
    /// Optional area damage on impact.
    #[serde(default)]
    pub explosion: Option<ExplosionSpec>,
    /// Effects applied to every enemy the projectile hits.
    #[serde(default)]
    pub effects: Vec<EffectSpec>,
}

const fn default_projectile_lifetime() -> u32 {
    3000
}

/// Always-on stat modifier. Bonuses are fractions (`0.2` = +20%), except
/// crit chance which is added directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassiveModifier {
    /// Multiplies damage by `1 + bonus`.
    DamageBonus(#[serde(with = "fixed_decimal")] Fixed),
    /// Multiplies range by `1 + bonus`.
    RangeBonus(#[serde(with = "fixed_decimal")] Fixed),
    /// Multiplies fire rate by `1 + bonus`.
    FireRateBonus(#[serde(with = "fixed_decimal")] Fixed),
    /// Adds to crit chance.
    CritChanceBonus(#[serde(with = "fixed_decimal")] Fixed),
}

/// What a triggered ability does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggeredEffect {
    /// Slow every enemy in the radius.
    Slow {
        /// Speed reduction fraction.
        #[serde(with = "fixed_decimal")]
        fraction: Fixed,
        /// Effect lifetime in milliseconds.
        duration_ms: u32,
    },
    /// Freeze every enemy in the radius.
    Freeze {
        /// Effect lifetime in milliseconds.
        duration_ms: u32,
    },
    /// Hop between enemies starting at the tower's current target.
    Chain {
        /// Damage dealt to the first link.
        #[serde(with = "fixed_decimal")]
        damage: Fixed,
        /// Maximum distance between consecutive links.
        #[serde(with = "fixed_decimal")]
        link_distance: Fixed,
    },
    /// Multiply the damage of every other tower in the radius.
    Buff {
        /// Damage multiplier granted.
        #[serde(with = "fixed_decimal")]
        multiplier: Fixed,
        /// Buff lifetime in milliseconds.
        duration_ms: u32,
    },
}

/// A cooldown-gated ability evaluated after basic combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredAbility {
    /// Milliseconds between activations.
    pub cooldown_ms: u32,
    /// Area radius around the tower (unused by chain).
    #[serde(default, with = "fixed_decimal")]
    pub radius: Fixed,
    /// Effect on activation.
    pub effect: TriggeredEffect,
    /// Power score that scales the effect's magnitude.
    #[serde(default)]
    pub scales_with: Option<PowerKind>,
}

/// Passive or triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Applied whenever effective stats are computed.
    Passive(PassiveModifier),
    /// Evaluated each tick once off cooldown.
    Triggered(TriggeredAbility),
}

/// Ability definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityDef {
    /// Identifier, unique per tower.
    pub id: String,
    /// Behavior.
    pub kind: AbilityKind,
}

/// Additive stat changes applied by an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatDelta {
    /// Added damage.
    #[serde(default, with = "fixed_decimal")]
    pub damage: Fixed,
    /// Added range.
    #[serde(default, with = "fixed_decimal")]
    pub range: Fixed,
    /// Added attacks per second.
    #[serde(default, with = "fixed_decimal")]
    pub fire_rate: Fixed,
    /// Added piercing.
    #[serde(default)]
    pub piercing: u32,
    /// Added crit chance.
    #[serde(default, with = "fixed_decimal")]
    pub crit_chance: Fixed,
    /// Added crit multiplier.
    #[serde(default, with = "fixed_decimal")]
    pub crit_multiplier: Fixed,
}

/// A purchasable tower upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeDef {
    /// Identifier, unique per tower type.
    pub id: String,
    /// Gold cost.
    pub cost: u32,
    /// Minimum tower level.
    #[serde(default = "default_required_level")]
    pub required_level: u32,
    /// Upgrade that must already be applied.
    #[serde(default)]
    pub requires: Option<String>,
    /// Stat changes.
    #[serde(default)]
    pub delta: StatDelta,
    /// Abilities granted.
    #[serde(default)]
    pub grants: Vec<AbilityDef>,
}

const fn default_required_level() -> u32 {
    1
}

/// Catalog entry for a tower type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerType {
    /// Unique type tag.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Purchase cost in gold.
    pub cost: u32,
    /// Base stats.
    pub stats: TowerStats,
    /// How damage is mitigated.
    #[serde(default)]
    pub damage_kind: DamageKind,
    /// Whether flying enemies are legal targets.
    #[serde(default = "default_true")]
    pub targets_flying: bool,
    /// Whether invisible enemies are legal targets.
    #[serde(default)]
    pub detects_invisible: bool,
    /// Projectile profile.
    pub projectile: ProjectileSpec,
    /// Abilities the tower starts with.
    #[serde(default)]
    pub abilities: Vec<AbilityDef>,
    /// Upgrades that can be bought.
    #[serde(default)]
    pub upgrades: Vec<UpgradeDef>,
}

const fn default_true() -> bool {
    true
}

// ============================================================================
// Enemies
// ============================================================================

/// Enemy capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EnemyFlags {
    /// Only towers with anti-air may target it.
    #[serde(default)]
    pub flying: bool,
    /// Only towers with detection may target it.
    #[serde(default)]
    pub invisible: bool,
    /// Immune to freeze and stun.
    #[serde(default)]
    pub boss: bool,
    /// Takes half damage from explosions.
    #[serde(default)]
    pub shielded: bool,
}

/// What killing an enemy is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Reward {
    /// Gold credited.
    pub gold: u32,
    /// Experience credited.
    #[serde(default)]
    pub experience: u32,
    /// Score credited.
    #[serde(default = "default_kill_score")]
    pub score: u32,
}

const fn default_kill_score() -> u32 {
    10
}

/// Catalog entry for an enemy type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyType {
    /// Unique type tag.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Maximum health.
    #[serde(with = "fixed_decimal")]
    pub health: Fixed,
    /// Movement speed in units per second.
    #[serde(with = "fixed_decimal")]
    pub speed: Fixed,
    /// Flat reduction of physical damage.
    #[serde(default, with = "fixed_decimal")]
    pub armor: Fixed,
    /// Flat reduction of magic damage.
    #[serde(default, with = "fixed_decimal")]
    pub magic_resistance: Fixed,
    /// Collision radius for projectiles.
    #[serde(default = "default_enemy_radius", with = "fixed_decimal")]
    pub radius: Fixed,
    /// Capability flags.
    #[serde(default)]
    pub flags: EnemyFlags,
    /// Kill reward.
    pub reward: Reward,
}

fn default_enemy_radius() -> Fixed {
    Fixed::from_num(12)
}

// ============================================================================
// Waves and map
// ============================================================================

/// A batch of identical enemies inside a wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnGroup {
    /// Enemy type tag.
    pub enemy_type: String,
    /// Number of enemies.
    pub count: u32,
    /// Milliseconds between consecutive spawns.
    pub spawn_delay_ms: u32,
    /// Milliseconds after wave start before the first spawn.
    #[serde(default)]
    pub start_offset_ms: u32,
    /// Index into [`MapConfig::paths`].
    #[serde(default)]
    pub path: usize,
}

/// Reward credited when a wave is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaveReward {
    /// Gold credited.
    pub gold: u32,
    /// Experience credited.
    #[serde(default)]
    pub experience: u32,
}

/// One wave: ordered spawn groups plus a completion reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveDef {
    /// Spawn groups in order.
    pub groups: Vec<SpawnGroup>,
    /// Completion reward.
    #[serde(default)]
    pub reward: WaveReward,
}

impl WaveDef {
    /// Total number of enemies this wave spawns.
    #[must_use]
    pub fn total_enemies(&self) -> u32 {
        self.groups.iter().map(|g| g.count).sum()
    }
}

/// An enemy route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapPath {
    /// Waypoints; enemies spawn on the first and leak past the last.
    #[serde(with = "vec2_decimal::seq")]
    pub waypoints: Vec<Vec2Fixed>,
}

/// Axis-aligned rectangle where towers may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArea {
    /// Left edge.
    #[serde(with = "fixed_decimal")]
    pub x: Fixed,
    /// Top edge.
    #[serde(with = "fixed_decimal")]
    pub y: Fixed,
    /// Width.
    #[serde(with = "fixed_decimal")]
    pub width: Fixed,
    /// Height.
    #[serde(with = "fixed_decimal")]
    pub height: Fixed,
}

impl BuildArea {
    /// Whether the point lies inside the rectangle (edges included).
    #[must_use]
    pub fn contains(&self, point: Vec2Fixed) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// Map definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Map name.
    #[serde(default)]
    pub name: String,
    /// Enemy routes.
    pub paths: Vec<MapPath>,
    /// Buildable rectangles.
    pub buildable: Vec<BuildArea>,
    /// Waves in order.
    pub waves: Vec<WaveDef>,
    /// Gold at game start.
    pub starting_gold: u32,
    /// Lives at game start.
    pub starting_lives: u32,
    /// Minimum distance between tower centers.
    #[serde(default = "default_tower_spacing", with = "fixed_decimal")]
    pub min_tower_spacing: Fixed,
    /// Start the next wave automatically this long after one completes.
    #[serde(default)]
    pub auto_start_delay_ms: Option<u32>,
}

fn default_tower_spacing() -> Fixed {
    Fixed::from_num(32)
}

impl MapConfig {
    /// Whether a tower may legally stand at `point`.
    #[must_use]
    pub fn is_buildable(&self, point: Vec2Fixed) -> bool {
        self.buildable.iter().any(|area| area.contains(point))
    }
}

/// Tower and enemy stat tables.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Tower types.
    pub towers: Vec<TowerType>,
    /// Enemy types.
    pub enemies: Vec<EnemyType>,
}

impl Catalog {
    /// Find a tower type by id.
    #[must_use]
    pub fn get_tower(&self, id: &str) -> Option<&TowerType> {
        self.towers.iter().find(|t| t.id == id)
    }

    /// Find an enemy type by id.
    #[must_use]
    pub fn get_enemy(&self, id: &str) -> Option<&EnemyType> {
        self.enemies.iter().find(|e| e.id == id)
    }
}

/// Everything a session is initialized from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Map layout and waves.
    pub map: MapConfig,
    /// Stat tables.
    pub catalog: Catalog,
    /// Seed for critical-hit rolls.
    #[serde(default)]
    pub seed: u64,
}

impl GameConfig {
    /// Parse a config from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] if the text is not valid RON
    /// for this schema. Semantic validation happens separately in
    /// [`validate`](Self::validate).
    pub fn from_ron_str(label: &str, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::DataParseError {
            path: label.to_string(),
            message: e.to_string(),
        })
    }

    /// Validate internal consistency.
    ///
    /// Returns every problem found; an empty list means the config is
    /// usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let map = &self.map;

        if map.paths.is_empty() {
            errors.push("Map has no paths".to_string());
        }
        for (i, path) in map.paths.iter().enumerate() {
            if path.waypoints.len() < 2 {
                errors.push(format!("Path {i} needs at least two waypoints"));
            }
            if path.waypoints.iter().any(|p| !on_map(p.x) || !on_map(p.y)) {
                errors.push(format!("Path {i} has a waypoint beyond ±{MAX_COORDINATE}"));
            }
        }
        for (i, area) in map.buildable.iter().enumerate() {
            let corners = [
                area.x,
                area.y,
                area.x.saturating_add(area.width),
                area.y.saturating_add(area.height),
            ];
            if corners.iter().any(|&c| !on_map(c)) {
                errors.push(format!("Build area {i} reaches beyond ±{MAX_COORDINATE}"));
            }
        }
        if map.starting_lives == 0 {
            errors.push("Starting lives must be positive".to_string());
        }
        if map.min_tower_spacing < Fixed::ZERO {
            errors.push("Minimum tower spacing cannot be negative".to_string());
        }

        for (w, wave) in map.waves.iter().enumerate() {
            if wave.groups.is_empty() {
                errors.push(format!("Wave {} has no spawn groups", w + 1));
            }
            for group in &wave.groups {
                if self.catalog.get_enemy(&group.enemy_type).is_none() {
                    errors.push(format!(
                        "Wave {} references unknown enemy type '{}'",
                        w + 1,
                        group.enemy_type
                    ));
                }
                if group.path >= map.paths.len() {
                    errors.push(format!(
                        "Wave {} references unknown path {}",
                        w + 1,
                        group.path
                    ));
                }
                if group.count == 0 {
                    errors.push(format!(
                        "Wave {} has an empty '{}' group",
                        w + 1,
                        group.enemy_type
                    ));
                }
            }
        }

        let mut seen = HashSet::new();
        for enemy in &self.catalog.enemies {
            if !seen.insert(enemy.id.as_str()) {
                errors.push(format!("Duplicate enemy type '{}'", enemy.id));
            }
            if enemy.health <= Fixed::ZERO {
                errors.push(format!("Enemy '{}' must have positive health", enemy.id));
            }
            if enemy.speed < Fixed::ZERO {
                errors.push(format!("Enemy '{}' has negative speed", enemy.id));
            }
            if enemy.radius <= Fixed::ZERO {
                errors.push(format!("Enemy '{}' must have a positive radius", enemy.id));
            }
        }

        let mut seen = HashSet::new();
        for tower in &self.catalog.towers {
            if !seen.insert(tower.id.as_str()) {
                errors.push(format!("Duplicate tower type '{}'", tower.id));
            }
            validate_tower(tower, &mut errors);
        }

        errors
    }
}

fn on_map(value: Fixed) -> bool {
    let max = Fixed::from_num(MAX_COORDINATE);
    (-max..=max).contains(&value)
}

fn validate_tower(tower: &TowerType, errors: &mut Vec<String>) {
    let id = &tower.id;
    let stats = &tower.stats;

    if stats.fire_rate <= Fixed::ZERO {
        errors.push(format!("Tower '{id}' must have a positive fire rate"));
    }
    if stats.range <= Fixed::ZERO {
        errors.push(format!("Tower '{id}' must have a positive range"));
    }
    if stats.piercing == 0 {
        errors.push(format!("Tower '{id}' must pierce at least one enemy"));
    }
    if stats.crit_chance < Fixed::ZERO || stats.crit_chance > Fixed::ONE {
        errors.push(format!("Tower '{id}' crit chance must be within 0..=1"));
    }
    if stats.crit_multiplier < Fixed::ONE {
        errors.push(format!("Tower '{id}' crit multiplier must be at least 1"));
    }
    if tower.projectile.speed <= Fixed::ZERO {
        errors.push(format!("Tower '{id}' projectile speed must be positive"));
    }
    if tower.projectile.lifetime_ms == 0 {
        errors.push(format!("Tower '{id}' projectile lifetime must be positive"));
    }
    if let Some(explosion) = tower.projectile.explosion {
        if explosion.radius <= Fixed::ZERO {
            errors.push(format!("Tower '{id}' explosion radius must be positive"));
        }
        if explosion.damage_fraction < Fixed::ZERO || explosion.damage_fraction > Fixed::ONE {
            errors.push(format!("Tower '{id}' explosion fraction must be within 0..=1"));
        }
    }
    for effect in &tower.projectile.effects {
        if effect.duration_ms == 0 {
            errors.push(format!("Tower '{id}' carries a {:?} effect with no duration", effect.kind));
        }
    }

    for ability in &tower.abilities {
        validate_ability(id, ability, errors);
    }

    let upgrade_ids: HashSet<&str> = tower.upgrades.iter().map(|u| u.id.as_str()).collect();
    if upgrade_ids.len() != tower.upgrades.len() {
        errors.push(format!("Tower '{id}' has duplicate upgrade ids"));
    }
    for upgrade in &tower.upgrades {
        if let Some(required) = &upgrade.requires {
            if !upgrade_ids.contains(required.as_str()) {
                errors.push(format!(
                    "Upgrade '{}' of tower '{id}' requires unknown upgrade '{required}'",
                    upgrade.id
                ));
            }
        }
        for ability in &upgrade.grants {
            validate_ability(id, ability, errors);
        }
    }
}

fn validate_ability(tower_id: &str, ability: &AbilityDef, errors: &mut Vec<String>) {
    let AbilityKind::Triggered(triggered) = ability.kind else {
        return;
    };
    if triggered.cooldown_ms == 0 {
        errors.push(format!(
            "Ability '{}' of tower '{tower_id}' needs a cooldown",
            ability.id
        ));
    }
    let needs_radius = !matches!(triggered.effect, TriggeredEffect::Chain { .. });
    if needs_radius && triggered.radius <= Fixed::ZERO {
        errors.push(format!(
            "Ability '{}' of tower '{tower_id}' needs a positive radius",
            ability.id
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> GameConfig {
        GameConfig {
            map: MapConfig {
                name: "test".to_string(),
                paths: vec![MapPath {
                    waypoints: vec![Vec2Fixed::from_ints(0, 0), Vec2Fixed::from_ints(100, 0)],
                }],
                buildable: vec![BuildArea {
                    x: Fixed::ZERO,
                    y: Fixed::from_num(20),
                    width: Fixed::from_num(100),
                    height: Fixed::from_num(50),
                }],
                waves: vec![WaveDef {
                    groups: vec![SpawnGroup {
                        enemy_type: "grunt".to_string(),
                        count: 3,
                        spawn_delay_ms: 500,
                        start_offset_ms: 0,
                        path: 0,
                    }],
                    reward: WaveReward::default(),
                }],
                starting_gold: 100,
                starting_lives: 10,
                min_tower_spacing: Fixed::from_num(16),
                auto_start_delay_ms: None,
            },
            catalog: Catalog {
                towers: vec![],
                enemies: vec![EnemyType {
                    id: "grunt".to_string(),
                    name: String::new(),
                    health: Fixed::from_num(50),
                    speed: Fixed::from_num(40),
                    armor: Fixed::ZERO,
                    magic_resistance: Fixed::ZERO,
                    radius: Fixed::from_num(10),
                    flags: EnemyFlags::default(),
                    reward: Reward {
                        gold: 5,
                        experience: 1,
                        score: 10,
                    },
                }],
            },
            seed: 0,
        }
    }

    #[test]
    fn test_validate_valid_config() {
        let errors = sample_config().validate();
        assert!(errors.is_empty(), "Errors: {:?}", errors);
    }

    #[test]
    fn test_validate_unknown_enemy_in_wave() {
        let mut config = sample_config();
        config.map.waves[0].groups[0].enemy_type = "dragon".to_string();

        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("unknown enemy type 'dragon'"));
    }

    #[test]
    fn test_validate_short_path() {
        let mut config = sample_config();
        config.map.paths[0].waypoints.truncate(1);
        assert!(config.validate()[0].contains("at least two waypoints"));
    }

    #[test]
    fn test_validate_far_coordinates() {
        let mut config = sample_config();
        config.map.paths[0].waypoints[1] = Vec2Fixed::from_ints(MAX_COORDINATE, 0);
        assert!(config.validate().is_empty());

        config.map.paths[0].waypoints[1] = Vec2Fixed::from_ints(50_000, 0);
        config.map.buildable[0].width = Fixed::from_num(30_000);
        let errors = config.validate();
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors[0].contains("Path 0 has a waypoint beyond"));
        assert!(errors[1].contains("Build area 0 reaches beyond"));
    }

    #[test]
    fn test_build_area_contains_edges() {
        let config = sample_config();
        assert!(config.map.is_buildable(Vec2Fixed::from_ints(0, 20)));
        assert!(config.map.is_buildable(Vec2Fixed::from_ints(100, 70)));
        assert!(!config.map.is_buildable(Vec2Fixed::from_ints(50, 0)));
    }

    #[test]
    fn test_cooldown_ms() {
        let stats = TowerStats {
            damage: Fixed::from_num(10),
            range: Fixed::from_num(100),
            fire_rate: Fixed::from_num(2),
            piercing: 1,
            crit_chance: Fixed::ZERO,
            crit_multiplier: Fixed::from_num(2),
            power: PowerScores::default(),
        };
        assert_eq!(stats.cooldown_ms(), Fixed::from_num(500));
    }

    #[test]
    fn test_max_slow_fraction_is_point_nine() {
        let diff = (MAX_SLOW_FRACTION - Fixed::from_num(0.9)).abs();
        assert!(diff < Fixed::ONE / Fixed::from_num(1_000_000));
    }

    #[test]
    fn test_parse_ron_defaults() {
        let text = r#"
            GameConfig(
                map: MapConfig(
                    paths: [MapPath(waypoints: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)])],
                    buildable: [],
                    waves: [],
                    starting_gold: 250,
                    starting_lives: 5,
                ),
                catalog: Catalog(
                    towers: [],
                    enemies: [
                        EnemyType(id: "grunt", health: 80.0, speed: 30.0, reward: Reward(gold: 4)),
                    ],
                ),
            )
        "#;

        let config = GameConfig::from_ron_str("inline", text).unwrap();
        assert_eq!(config.seed, 0);
        assert_eq!(config.map.min_tower_spacing, Fixed::from_num(32));
        let grunt = config.catalog.get_enemy("grunt").unwrap();
        assert_eq!(grunt.radius, Fixed::from_num(12));
        assert_eq!(grunt.reward.score, 10);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_ron_reports_label() {
        let err = GameConfig::from_ron_str("broken.ron", "GameConfig(").unwrap_err();
        assert!(err.to_string().contains("broken.ron"));
    }
}
