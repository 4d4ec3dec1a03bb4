//! Gold, lives, score, and the player actions that spend them.
//!
//! All bookkeeping is integer math. Gold can never go negative: every
//! spend is checked first and rejected with [`ActionError::InsufficientFunds`].

use serde::{Deserialize, Serialize};

use crate::components::Tower;
use crate::config::{Catalog, MapConfig, Reward, WaveReward};
use crate::error::ActionError;
use crate::math::Vec2Fixed;
use crate::store::{EntityId, EntityStore};

/// Percentage of a tower's purchase cost refunded on sale.
pub const SELL_REFUND_PERCENT: u32 = 70;

/// Player resources for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ledger {
    /// Gold available.
    pub gold: u32,
    /// Lives left.
    pub lives: u32,
    /// Lives at game start.
    pub max_lives: u32,
    /// Accumulated score.
    pub score: u64,
    /// Accumulated experience.
    pub experience: u64,
}

impl Ledger {
    /// Start-of-game ledger for a map.
    #[must_use]
    pub const fn new(starting_gold: u32, starting_lives: u32) -> Self {
        Self {
            gold: starting_gold,
            lives: starting_lives,
            max_lives: starting_lives,
            score: 0,
            experience: 0,
        }
    }

    /// Spend gold, or report how much is missing.
    pub fn spend(&mut self, amount: u32) -> Result<(), ActionError> {
        if self.gold < amount {
            return Err(ActionError::InsufficientFunds {
                required: amount,
                available: self.gold,
            });
        }
        self.gold -= amount;
        Ok(())
    }

    /// Add gold.
    pub fn deposit(&mut self, amount: u32) {
        self.gold = self.gold.saturating_add(amount);
    }

    /// Credit a kill.
    pub fn credit_kill(&mut self, reward: &Reward) {
        self.deposit(reward.gold);
        self.experience += u64::from(reward.experience);
        self.score += u64::from(reward.score);
    }

    /// Credit a cleared wave.
    pub fn credit_wave(&mut self, reward: &WaveReward) {
        self.deposit(reward.gold);
        self.experience += u64::from(reward.experience);
    }

    /// Remove one life. Returns `true` if none are left.
    pub fn lose_life(&mut self) -> bool {
        self.lives = self.lives.saturating_sub(1);
        self.lives == 0
    }
}

/// Gold returned when selling a tower bought for `cost`.
#[must_use]
pub const fn sell_value(cost: u32) -> u32 {
    (cost as u64 * SELL_REFUND_PERCENT as u64 / 100) as u32
}

/// Place a tower at `position`.
///
/// Checks run in order: known type, inside a buildable area, spacing from
/// other towers, then gold.
pub fn place_tower(
    ledger: &mut Ledger,
    store: &mut EntityStore,
    catalog: &Catalog,
    map: &MapConfig,
    type_id: &str,
    position: Vec2Fixed,
) -> Result<EntityId, ActionError> {
    let ty = catalog
        .get_tower(type_id)
        .ok_or_else(|| ActionError::UnknownTowerType(type_id.to_string()))?;

    if !map.is_buildable(position) {
        return Err(ActionError::OutOfBounds);
    }

    let spacing_sq = map.min_tower_spacing * map.min_tower_spacing;
    if let Some((blocker, _)) = store
        .towers
        .iter()
        .find(|(_, t)| t.position.distance_squared(position) < spacing_sq)
    {
        return Err(ActionError::Overlapping(blocker));
    }

    ledger.spend(ty.cost)?;
    Ok(store.insert_tower(Tower::from_type(ty, position)))
}

/// Sell a tower. Returns the gold refunded.
pub fn sell_tower(
    ledger: &mut Ledger,
    store: &mut EntityStore,
    id: EntityId,
) -> Result<u32, ActionError> {
    let tower = store
        .towers
        .remove(id)
        .ok_or(ActionError::TowerNotFound(id))?;
    let refund = sell_value(tower.cost);
    ledger.deposit(refund);
    Ok(refund)
}

/// Buy an upgrade for a tower.
pub fn upgrade_tower(
    ledger: &mut Ledger,
    store: &mut EntityStore,
    id: EntityId,
    upgrade_id: &str,
) -> Result<(), ActionError> {
    let tower = store
        .towers
        .get_mut(id)
        .ok_or(ActionError::TowerNotFound(id))?;
    let upgrade = tower
        .upgrade(upgrade_id)
        .cloned()
        .ok_or_else(|| ActionError::UnknownUpgrade(upgrade_id.to_string()))?;

    if tower.has_upgrade(upgrade_id) {
        return Err(ActionError::UpgradeAlreadyApplied(upgrade_id.to_string()));
    }
    if tower.level < upgrade.required_level {
        return Err(ActionError::LevelTooLow {
            required: upgrade.required_level,
            current: tower.level,
        });
    }
    if let Some(required) = &upgrade.requires {
        if !tower.has_upgrade(required) {
            return Err(ActionError::MissingPrerequisite(required.clone()));
        }
    }

    ledger.spend(upgrade.cost)?;
    tower.apply_upgrade(&upgrade);
    Ok(())
}
