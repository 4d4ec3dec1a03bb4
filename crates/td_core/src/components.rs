//! Runtime entity data.
//!
//! Every entity is a fixed-shape struct: all per-instance runtime state
//! (cooldowns, buffs, hit sets) is an explicit field. Catalog data is
//! copied into the entity when it is created, so later catalog lookups
//! are never needed during a tick.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{
    AbilityDef, AbilityKind, DamageKind, EffectKind, EffectSpec, EnemyFlags, EnemyType,
    ExplosionSpec, PassiveModifier, PowerScores, Reward, TowerStats, TowerType, UpgradeDef,
};
use crate::math::{fixed_serde, option_fixed_serde, Fixed, Vec2Fixed};
use crate::store::{EntityId, Identified};

// ============================================================================
// Towers
// ============================================================================

/// An ability attached to a tower, with its runtime cooldown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilitySlot {
    /// Static definition.
    pub def: AbilityDef,
    /// Milliseconds until a triggered ability may fire again.
    #[serde(with = "fixed_serde")]
    pub cooldown_remaining_ms: Fixed,
}

impl AbilitySlot {
    /// Wrap a definition, ready to trigger immediately.
    #[must_use]
    pub fn new(def: AbilityDef) -> Self {
        Self {
            def,
            cooldown_remaining_ms: Fixed::ZERO,
        }
    }
}

/// Tower stats after passive abilities are folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveStats {
    /// Damage per projectile, before buffs.
    pub damage: Fixed,
    /// Targeting range.
    pub range: Fixed,
    /// Attacks per second.
    pub fire_rate: Fixed,
    /// Enemies a projectile may damage.
    pub piercing: u32,
    /// Probability of a critical hit.
    pub crit_chance: Fixed,
    /// Critical hit multiplier.
    pub crit_multiplier: Fixed,
}

impl EffectiveStats {
    /// Milliseconds between attacks.
    #[must_use]
    pub fn cooldown_ms(&self) -> Fixed {
        if self.fire_rate <= Fixed::ZERO {
            return Fixed::MAX;
        }
        crate::math::MS_PER_SECOND / self.fire_rate
    }
}

/// A placed tower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tower {
    /// Entity id.
    pub id: EntityId,
    /// Catalog type tag.
    pub type_id: String,
    /// World position.
    pub position: Vec2Fixed,
    /// Level, starting at 1 and raised by each upgrade.
    pub level: u32,
    /// Base stats including applied upgrades.
    pub stats: TowerStats,
    /// How damage is mitigated.
    pub damage_kind: DamageKind,
    /// Whether flying enemies are legal targets.
    pub targets_flying: bool,
    /// Whether invisible enemies are legal targets.
    pub detects_invisible: bool,
    /// Projectile speed in units per second.
    #[serde(with = "fixed_serde")]
    pub projectile_speed: Fixed,
    /// Whether projectiles steer toward their target.
    pub homing: bool,
    /// Projectile lifetime in milliseconds.
    #[serde(with = "fixed_serde")]
    pub projectile_lifetime_ms: Fixed,
    /// Area damage on impact.
    pub explosion: Option<ExplosionSpec>,
    /// Effects carried by projectiles.
    pub effects: Vec<EffectSpec>,
    /// Abilities with cooldown state.
    pub abilities: Vec<AbilitySlot>,
    /// Upgrades that may be bought.
    pub available_upgrades: Vec<UpgradeDef>,
    /// Ids of upgrades already bought, in purchase order.
    pub applied_upgrades: Vec<String>,
    /// Simulation time of the last shot.
    #[serde(with = "option_fixed_serde")]
    pub last_fire_ms: Option<Fixed>,
    /// Target picked this tick.
    pub target: Option<EntityId>,
    /// Damage multiplier from a buff; one means unbuffed.
    #[serde(with = "fixed_serde")]
    pub buff_multiplier: Fixed,
    /// Milliseconds left on the active buff.
    #[serde(with = "fixed_serde")]
    pub buff_remaining_ms: Fixed,
    /// Gold paid for the tower itself.
    pub cost: u32,
}

impl Identified for Tower {
    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

impl Tower {
    /// Instantiate a tower from its catalog entry. The id is assigned by
    /// the store on insert.
    #[must_use]
    pub fn from_type(ty: &TowerType, position: Vec2Fixed) -> Self {
        Self {
            id: 0,
            type_id: ty.id.clone(),
            position,
            level: 1,
            stats: ty.stats,
            damage_kind: ty.damage_kind,
            targets_flying: ty.targets_flying,
            detects_invisible: ty.detects_invisible,
            projectile_speed: ty.projectile.speed,
            homing: ty.projectile.homing,
            projectile_lifetime_ms: Fixed::from_num(ty.projectile.lifetime_ms),
            explosion: ty.projectile.explosion,
            effects: ty.projectile.effects.clone(),
            abilities: ty.abilities.iter().cloned().map(AbilitySlot::new).collect(),
            available_upgrades: ty.upgrades.clone(),
            applied_upgrades: Vec::new(),
            last_fire_ms: None,
            target: None,
            buff_multiplier: Fixed::ONE,
            buff_remaining_ms: Fixed::ZERO,
            cost: ty.cost,
        }
    }

    /// Power scores used to scale triggered abilities.
    #[must_use]
    pub const fn power(&self) -> &PowerScores {
        &self.stats.power
    }

    /// Stats with every passive ability applied.
    ///
    /// Percentage bonuses from several passives add up before they are
    /// applied; crit chance is clamped to `0..=1`.
    #[must_use]
    pub fn effective_stats(&self) -> EffectiveStats {
        let mut damage_bonus = Fixed::ZERO;
        let mut range_bonus = Fixed::ZERO;
        let mut rate_bonus = Fixed::ZERO;
        let mut crit_bonus = Fixed::ZERO;

        for slot in &self.abilities {
            if let AbilityKind::Passive(modifier) = slot.def.kind {
                match modifier {
                    PassiveModifier::DamageBonus(v) => damage_bonus += v,
                    PassiveModifier::RangeBonus(v) => range_bonus += v,
                    PassiveModifier::FireRateBonus(v) => rate_bonus += v,
                    PassiveModifier::CritChanceBonus(v) => crit_bonus += v,
                }
            }
        }

        EffectiveStats {
            damage: self.stats.damage * (Fixed::ONE + damage_bonus),
            range: self.stats.range * (Fixed::ONE + range_bonus),
            fire_rate: self.stats.fire_rate * (Fixed::ONE + rate_bonus),
            piercing: self.stats.piercing,
            crit_chance: (self.stats.crit_chance + crit_bonus).clamp(Fixed::ZERO, Fixed::ONE),
            crit_multiplier: self.stats.crit_multiplier,
        }
    }

    /// Whether this tower can see and reach `enemy`.
    #[must_use]
    pub fn can_target(&self, enemy: &Enemy) -> bool {
        (!enemy.flags.flying || self.targets_flying)
            && (!enemy.flags.invisible || self.detects_invisible)
    }

    /// Whether the tower may fire at `now_ms` with the given cooldown.
    #[must_use]
    pub fn ready_to_fire(&self, now_ms: Fixed, cooldown_ms: Fixed) -> bool {
        match self.last_fire_ms {
            None => true,
            Some(last) => now_ms - last >= cooldown_ms,
        }
    }

    /// Look up an available upgrade by id.
    #[must_use]
    pub fn upgrade(&self, upgrade_id: &str) -> Option<&UpgradeDef> {
        self.available_upgrades.iter().find(|u| u.id == upgrade_id)
    }

    /// Whether an upgrade has already been bought.
    #[must_use]
    pub fn has_upgrade(&self, upgrade_id: &str) -> bool {
        self.applied_upgrades.iter().any(|u| u == upgrade_id)
    }

    /// Apply an upgrade's effects. Validation is the caller's job.
    pub fn apply_upgrade(&mut self, upgrade: &UpgradeDef) {
        let delta = upgrade.delta;
        self.stats.damage += delta.damage;
        self.stats.range += delta.range;
        self.stats.fire_rate += delta.fire_rate;
        self.stats.piercing = self.stats.piercing.saturating_add(delta.piercing);
        self.stats.crit_chance += delta.crit_chance;
        self.stats.crit_multiplier += delta.crit_multiplier;

        self.level += 1;
        self.applied_upgrades.push(upgrade.id.clone());
        self.abilities
            .extend(upgrade.grants.iter().cloned().map(AbilitySlot::new));
    }

    /// Set a damage buff. The latest buff replaces any earlier one.
    pub fn set_buff(&mut self, multiplier: Fixed, duration_ms: Fixed) {
        self.buff_multiplier = multiplier;
        self.buff_remaining_ms = duration_ms;
    }

    /// Count down the active buff, clearing it once expired.
    pub fn tick_buff(&mut self, dt_ms: Fixed) {
        if self.buff_remaining_ms <= Fixed::ZERO {
            return;
        }
        self.buff_remaining_ms -= dt_ms;
        if self.buff_remaining_ms <= Fixed::ZERO {
            self.buff_remaining_ms = Fixed::ZERO;
            self.buff_multiplier = Fixed::ONE;
        }
    }
}

// ============================================================================
// Enemies
// ============================================================================

/// A status effect currently affecting an enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEffect {
    /// Effect kind.
    pub kind: EffectKind,
    /// Slow fraction or damage per second.
    #[serde(with = "fixed_serde")]
    pub value: Fixed,
    /// Milliseconds left.
    #[serde(with = "fixed_serde")]
    pub remaining_ms: Fixed,
}

/// An enemy walking a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    /// Entity id.
    pub id: EntityId,
    /// Catalog type tag.
    pub type_id: String,
    /// World position.
    pub position: Vec2Fixed,
    /// Index into the map's path list.
    pub path: usize,
    /// Index of the waypoint being walked toward.
    pub next_waypoint: usize,
    /// Maximum health.
    #[serde(with = "fixed_serde")]
    pub max_health: Fixed,
    /// Current health, never negative.
    #[serde(with = "fixed_serde")]
    pub health: Fixed,
    /// Base speed in units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Flat physical mitigation.
    #[serde(with = "fixed_serde")]
    pub armor: Fixed,
    /// Flat magic mitigation.
    #[serde(with = "fixed_serde")]
    pub magic_resistance: Fixed,
    /// Collision radius.
    #[serde(with = "fixed_serde")]
    pub radius: Fixed,
    /// Capability flags.
    pub flags: EnemyFlags,
    /// Active status effects in application order.
    pub effects: Vec<ActiveEffect>,
    /// Kill reward.
    pub reward: Reward,
    /// Index of the wave that spawned it.
    pub wave: usize,
}

impl Identified for Enemy {
    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

impl Enemy {
    /// Instantiate an enemy at `position`, walking toward waypoint 1 of
    /// `path`.
    #[must_use]
    pub fn from_type(ty: &EnemyType, path: usize, position: Vec2Fixed, wave: usize) -> Self {
        Self {
            id: 0,
            type_id: ty.id.clone(),
            position,
            path,
            next_waypoint: 1,
            max_health: ty.health,
            health: ty.health,
            speed: ty.speed,
            armor: ty.armor,
            magic_resistance: ty.magic_resistance,
            radius: ty.radius,
            flags: ty.flags,
            effects: Vec::new(),
            reward: ty.reward,
            wave,
        }
    }

    /// Whether the enemy still has health.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > Fixed::ZERO
    }

    /// Flat mitigation against a damage kind.
    #[must_use]
    pub const fn mitigation(&self, kind: DamageKind) -> Fixed {
        match kind {
            DamageKind::Physical => self.armor,
            DamageKind::Magic => self.magic_resistance,
        }
    }

    /// Subtract health, clamping at zero. Returns the health actually lost.
    pub fn take_damage(&mut self, amount: Fixed) -> Fixed {
        let dealt = amount.min(self.health).max(Fixed::ZERO);
        self.health -= dealt;
        dealt
    }
}

// ============================================================================
// Projectiles
// ============================================================================

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Entity id.
    pub id: EntityId,
    /// Tower that fired it.
    pub source: EntityId,
    /// Enemy it was aimed at.
    pub target: Option<EntityId>,
    /// World position.
    pub position: Vec2Fixed,
    /// Velocity in units per second.
    pub velocity: Vec2Fixed,
    /// Cruise speed, used when steering.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Damage before crit and mitigation.
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
    /// How damage is mitigated.
    pub damage_kind: DamageKind,
    /// Crit chance captured at fire time.
    #[serde(with = "fixed_serde")]
    pub crit_chance: Fixed,
    /// Crit multiplier captured at fire time.
    #[serde(with = "fixed_serde")]
    pub crit_multiplier: Fixed,
    /// Enemies it may still damage.
    pub piercing_remaining: u32,
    /// Effects applied on hit.
    pub effects: Vec<EffectSpec>,
    /// Whether it steers toward its target.
    pub homing: bool,
    /// Area damage on impact.
    pub explosion: Option<ExplosionSpec>,
    /// Milliseconds in flight.
    #[serde(with = "fixed_serde")]
    pub age_ms: Fixed,
    /// Milliseconds before it expires.
    #[serde(with = "fixed_serde")]
    pub lifetime_ms: Fixed,
    /// Enemies already damaged.
    pub hit: BTreeSet<EntityId>,
}

impl Identified for Projectile {
    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

impl Projectile {
    /// Whether the projectile has outlived its lifetime.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.age_ms > self.lifetime_ms
    }
}
