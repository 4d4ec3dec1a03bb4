//! Triggered tower abilities.
//!
//! Passive modifiers are folded into [`Tower::effective_stats`]; this
//! module handles the cooldown-gated ones. Triggered abilities run after
//! combat each tick, in tower-id order, and only consume their cooldown
//! when they actually affect something.

use crate::combat::{mitigated_damage, remove_if_dead};
use crate::components::{Enemy, Tower};
use crate::config::{
    AbilityKind, DamageKind, EffectKind, PowerKind, PowerScores, TriggeredAbility,
    TriggeredEffect,
};
use crate::effects::apply_effect;
use crate::events::{AbilityActivated, DamageDealt, HitSource, TickEvents};
use crate::math::{Fixed, Vec2Fixed};
use crate::store::{EntityId, EntityStore, Table};

/// Maximum enemies a chain can strike, the first target included.
pub const CHAIN_MAX_TARGETS: usize = 5;

/// Scale a magnitude by a power score: `value × (1 + score / 100)`.
#[must_use]
pub fn scale_by_power(value: Fixed, power: &PowerScores, kind: Option<PowerKind>) -> Fixed {
    match kind {
        Some(kind) => value * (Fixed::ONE + power.get(kind) / Fixed::from_num(100)),
        None => value,
    }
}

/// Damage dealt by each link of a chain: `base × 0.8^(n−1)`.
#[must_use]
pub fn chain_damage_sequence(base: Fixed, links: usize) -> Vec<Fixed> {
    let decay_num = Fixed::from_num(4);
    let decay_den = Fixed::from_num(5);
    let mut damage = base;
    let mut sequence = Vec::with_capacity(links);
    for _ in 0..links {
        sequence.push(damage);
        damage = damage * decay_num / decay_den;
    }
    sequence
}

/// The parts of a tower an ability needs while the tower table is not
/// borrowed.
#[derive(Debug, Clone, Copy)]
struct Caster {
    id: EntityId,
    position: Vec2Fixed,
    target: Option<EntityId>,
    power: PowerScores,
    damage_kind: DamageKind,
    targets_flying: bool,
    detects_invisible: bool,
}

impl Caster {
    fn of(tower: &Tower) -> Self {
        Self {
            id: tower.id,
            position: tower.position,
            target: tower.target,
            power: tower.stats.power,
            damage_kind: tower.damage_kind,
            targets_flying: tower.targets_flying,
            detects_invisible: tower.detects_invisible,
        }
    }

    fn can_target(&self, enemy: &Enemy) -> bool {
        (!enemy.flags.flying || self.targets_flying)
            && (!enemy.flags.invisible || self.detects_invisible)
    }
}

/// Count down buffs and cooldowns, then fire every ready ability.
pub fn ability_system(store: &mut EntityStore, dt_ms: Fixed, events: &mut TickEvents) {
    for (_, tower) in store.towers.iter_mut() {
        tower.tick_buff(dt_ms);
        for slot in &mut tower.abilities {
            if matches!(slot.def.kind, AbilityKind::Triggered(_)) {
                slot.cooldown_remaining_ms = (slot.cooldown_remaining_ms - dt_ms).max(Fixed::ZERO);
            }
        }
    }

    for tower_id in store.towers.ids() {
        let Some(tower) = store.towers.get(tower_id) else {
            continue;
        };
        let caster = Caster::of(tower);
        let ready: Vec<(usize, String, TriggeredAbility)> = tower
            .abilities
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot.def.kind {
                AbilityKind::Triggered(ability) if slot.cooldown_remaining_ms <= Fixed::ZERO => {
                    Some((index, slot.def.id.clone(), ability))
                }
                _ => None,
            })
            .collect();

        for (index, ability_id, ability) in ready {
            let affected = activate(store, &caster, &ability, events);
            if affected.is_empty() {
                continue;
            }
            if let Some(slot) = store
                .towers
                .get_mut(tower_id)
                .and_then(|t| t.abilities.get_mut(index))
            {
                slot.cooldown_remaining_ms = Fixed::from_num(ability.cooldown_ms);
            }
            tracing::trace!(tower = tower_id, ability = %ability_id, "ability activated");
            events.abilities.push(AbilityActivated {
                tower: tower_id,
                ability: ability_id,
                affected,
            });
        }
    }
}

fn activate(
    store: &mut EntityStore,
    caster: &Caster,
    ability: &TriggeredAbility,
    events: &mut TickEvents,
) -> Vec<EntityId> {
    let scale = |value: Fixed| scale_by_power(value, &caster.power, ability.scales_with);

    match ability.effect {
        TriggeredEffect::Slow {
            fraction,
            duration_ms,
        } => area_effect(
            &mut store.enemies,
            caster.position,
            ability.radius,
            EffectKind::Slow,
            scale(fraction),
            Fixed::from_num(duration_ms),
        ),
        TriggeredEffect::Freeze { duration_ms } => area_effect(
            &mut store.enemies,
            caster.position,
            ability.radius,
            EffectKind::Freeze,
            Fixed::ZERO,
            scale(Fixed::from_num(duration_ms)),
        ),
        TriggeredEffect::Chain {
            damage,
            link_distance,
        } => chain(&mut store.enemies, caster, scale(damage), link_distance, events),
        TriggeredEffect::Buff {
            multiplier,
            duration_ms,
        } => {
            let multiplier = Fixed::ONE + scale(multiplier - Fixed::ONE);
            let duration = Fixed::from_num(duration_ms);
            let mut affected = Vec::new();
            for (id, tower) in store.towers.iter_mut() {
                if id != caster.id && caster.position.within(tower.position, ability.radius) {
                    tower.set_buff(multiplier, duration);
                    affected.push(id);
                }
            }
            affected
        }
    }
}

fn area_effect(
    enemies: &mut Table<Enemy>,
    center: Vec2Fixed,
    radius: Fixed,
    kind: EffectKind,
    value: Fixed,
    duration_ms: Fixed,
) -> Vec<EntityId> {
    enemies
        .iter_mut()
        .filter(|(_, enemy)| center.within(enemy.position, radius))
        .filter_map(|(id, enemy)| apply_effect(enemy, kind, value, duration_ms).then_some(id))
        .collect()
}

/// Pick the chain's links, starting at the caster's current target.
fn chain_links(enemies: &Table<Enemy>, caster: &Caster, link_distance: Fixed) -> Vec<EntityId> {
    let Some(first) = caster
        .target
        .filter(|id| enemies.get(*id).is_some_and(|e| caster.can_target(e)))
    else {
        return Vec::new();
    };

    let mut links = vec![first];
    let link_sq = link_distance * link_distance;

    while links.len() < CHAIN_MAX_TARGETS {
        let Some(from) = links.last().and_then(|id| enemies.get(*id)).map(|e| e.position) else {
            break;
        };
        let mut best: Option<(EntityId, Fixed)> = None;
        for (id, enemy) in enemies.iter() {
            if links.contains(&id) || !caster.can_target(enemy) {
                continue;
            }
            let dist_sq = from.distance_squared(enemy.position);
            if dist_sq <= link_sq && best.map_or(true, |(_, d)| dist_sq < d) {
                best = Some((id, dist_sq));
            }
        }
        match best {
            Some((id, _)) => links.push(id),
            None => break,
        }
    }
    links
}

fn chain(
    enemies: &mut Table<Enemy>,
    caster: &Caster,
    damage: Fixed,
    link_distance: Fixed,
    events: &mut TickEvents,
) -> Vec<EntityId> {
    let links = chain_links(enemies, caster, link_distance);
    let sequence = chain_damage_sequence(damage, links.len());

    for (&id, &raw) in links.iter().zip(&sequence) {
        let Some(enemy) = enemies.get_mut(id) else {
            continue;
        };
        let amount = mitigated_damage(raw, caster.damage_kind, enemy);
        let dealt = enemy.take_damage(amount);
        events.damage.push(DamageDealt {
            tower: Some(caster.id),
            enemy: id,
            amount: dealt,
            critical: false,
            source: HitSource::Chain,
        });
        remove_if_dead(enemies, id, Some(caster.id), events);
    }
    links
}
