//! Targeting, firing, and projectile resolution.
//!
//! Damage mitigation is flat: `max(1, raw − mitigation)`, where mitigation
//! is armor for physical damage and magic resistance for magic damage.
//! Critical hits are rolled from the simulation's seeded RNG, so a given
//! seed always produces the same crits.

use rand::RngCore;

use crate::components::{Enemy, Projectile, Tower};
use crate::config::DamageKind;
use crate::effects::apply_spec;
use crate::events::{DamageDealt, EnemyKilled, HitSource, ShotFired, TickEvents};
use crate::math::{ms_to_seconds, Fixed, Vec2Fixed};
use crate::store::{EntityId, EntityStore, Table};

/// Fraction of the desired heading a homing projectile turns toward each
/// tick.
pub const HOMING_BLEND: Fixed = Fixed::from_bits(1 << 30); // 0.25

/// Damage taken after flat mitigation. Never below one.
#[must_use]
pub fn mitigated_damage(raw: Fixed, kind: DamageKind, enemy: &Enemy) -> Fixed {
    (raw - enemy.mitigation(kind)).max(Fixed::ONE)
}

/// Roll a critical hit. A uniform value in `[0, 1)` is drawn from the RNG
/// and compared against `chance`; nothing is drawn when `chance` is zero.
pub fn roll_crit(rng: &mut impl RngCore, chance: Fixed) -> bool {
    if chance <= Fixed::ZERO {
        return false;
    }
    // The low 32 bits of an I32F32 are the fraction.
    let roll = Fixed::from_bits(i64::from(rng.next_u32()));
    roll < chance
}

/// Pick the nearest legal enemy within range of a tower.
///
/// Ties keep the first enemy found, which is the lowest id.
#[must_use]
pub fn acquire_target(tower: &Tower, range: Fixed, enemies: &Table<Enemy>) -> Option<EntityId> {
    let range_sq = range * range;
    let mut best: Option<(EntityId, Fixed)> = None;

    for (id, enemy) in enemies.iter() {
        if !enemy.is_alive() || !tower.can_target(enemy) {
            continue;
        }
        let dist_sq = tower.position.distance_squared(enemy.position);
        if dist_sq > range_sq {
            continue;
        }
        if best.map_or(true, |(_, d)| dist_sq < d) {
            best = Some((id, dist_sq));
        }
    }

    best.map(|(id, _)| id)
}

/// Acquire targets and fire every tower that is off cooldown.
///
/// Towers are visited in ascending id order. Each tower keeps the target
/// chosen this tick whether or not it fires.
pub fn tower_fire_system(store: &mut EntityStore, now_ms: Fixed, events: &mut TickEvents) {
    let mut fired = Vec::new();

    for (tower_id, tower) in store.towers.iter_mut() {
        let stats = tower.effective_stats();
        tower.target = acquire_target(tower, stats.range, &store.enemies);

        let Some(target_id) = tower.target else {
            continue;
        };
        if !tower.ready_to_fire(now_ms, stats.cooldown_ms()) {
            continue;
        }
        let Some(target) = store.enemies.get(target_id) else {
            continue;
        };

        let direction = (target.position - tower.position).normalize();
        let projectile = Projectile {
            id: 0,
            source: tower_id,
            target: Some(target_id),
            position: tower.position,
            velocity: direction.scale(tower.projectile_speed),
            speed: tower.projectile_speed,
            damage: stats.damage * tower.buff_multiplier,
            damage_kind: tower.damage_kind,
            crit_chance: stats.crit_chance,
            crit_multiplier: stats.crit_multiplier,
            piercing_remaining: stats.piercing,
            effects: tower.effects.clone(),
            homing: tower.homing,
            explosion: tower.explosion,
            age_ms: Fixed::ZERO,
            lifetime_ms: tower.projectile_lifetime_ms,
            hit: std::collections::BTreeSet::new(),
        };
        tower.last_fire_ms = Some(now_ms);
        fired.push((tower_id, target_id, projectile));
    }

    for (tower, target, projectile) in fired {
        let id = store.insert_projectile(projectile);
        events.shots.push(ShotFired {
            tower,
            projectile: id,
            target,
        });
    }
}

/// Fly every projectile and resolve collisions.
pub fn projectile_system(
    store: &mut EntityStore,
    rng: &mut impl RngCore,
    dt_ms: Fixed,
    events: &mut TickEvents,
) {
    let dt_s = ms_to_seconds(dt_ms);

    for id in store.projectiles.ids() {
        let Some(projectile) = store.projectiles.get_mut(id) else {
            continue;
        };

        if projectile.homing {
            steer(projectile, &store.enemies);
        }
        projectile.position = projectile.position + projectile.velocity.scale(dt_s);
        projectile.age_ms += dt_ms;

        resolve_collisions(projectile, &mut store.enemies, rng, events);

        if projectile.piercing_remaining == 0 || projectile.expired() {
            store.projectiles.remove(id);
            events.projectiles_removed.push(id);
        }
    }
}

fn steer(projectile: &mut Projectile, enemies: &Table<Enemy>) {
    let Some(target) = projectile.target.and_then(|t| enemies.get(t)) else {
        return;
    };
    let desired = (target.position - projectile.position)
        .normalize()
        .scale(projectile.speed);
    projectile.velocity = projectile.velocity.lerp(desired, HOMING_BLEND);
}

fn resolve_collisions(
    projectile: &mut Projectile,
    enemies: &mut Table<Enemy>,
    rng: &mut impl RngCore,
    events: &mut TickEvents,
) {
    for enemy_id in enemies.ids() {
        if projectile.piercing_remaining == 0 {
            break;
        }
        if projectile.hit.contains(&enemy_id) {
            continue;
        }
        let Some(enemy) = enemies.get_mut(enemy_id) else {
            continue;
        };
        let radius = enemy.radius;
        if projectile.position.distance_squared(enemy.position) >= radius * radius {
            continue;
        }

        let critical = roll_crit(rng, projectile.crit_chance);
        let raw = if critical {
            projectile.damage * projectile.crit_multiplier
        } else {
            projectile.damage
        };
        let amount = mitigated_damage(raw, projectile.damage_kind, enemy);
        let dealt = enemy.take_damage(amount);
        for spec in &projectile.effects {
            apply_spec(enemy, spec);
        }
        let impact = enemy.position;

        projectile.hit.insert(enemy_id);
        projectile.piercing_remaining -= 1;
        events.damage.push(DamageDealt {
            tower: Some(projectile.source),
            enemy: enemy_id,
            amount: dealt,
            critical,
            source: HitSource::Projectile,
        });
        remove_if_dead(enemies, enemy_id, Some(projectile.source), events);

        if let Some(explosion) = projectile.explosion {
            let splash = projectile.damage * explosion.damage_fraction;
            explode(
                enemies,
                impact,
                explosion.radius,
                splash,
                projectile.damage_kind,
                enemy_id,
                projectile.source,
                events,
            );
        }
    }
}

/// Deal splash damage around `center`, sparing `primary`.
///
/// Splash never crits. Shielded enemies take half of the raw splash before
/// mitigation.
pub fn explode(
    enemies: &mut Table<Enemy>,
    center: Vec2Fixed,
    radius: Fixed,
    damage: Fixed,
    kind: DamageKind,
    primary: EntityId,
    source: EntityId,
    events: &mut TickEvents,
) {
    let half = Fixed::from_num(2);
    for id in enemies.ids() {
        if id == primary {
            continue;
        }
        let Some(enemy) = enemies.get_mut(id) else {
            continue;
        };
        if !center.within(enemy.position, radius) {
            continue;
        }
        let raw = if enemy.flags.shielded {
            damage / half
        } else {
            damage
        };
        let amount = mitigated_damage(raw, kind, enemy);
        let dealt = enemy.take_damage(amount);
        events.damage.push(DamageDealt {
            tower: Some(source),
            enemy: id,
            amount: dealt,
            critical: false,
            source: HitSource::Explosion,
        });
        remove_if_dead(enemies, id, Some(source), events);
    }
}

/// Remove a dead enemy and record the kill. Returns whether it died.
pub fn remove_if_dead(
    enemies: &mut Table<Enemy>,
    id: EntityId,
    tower: Option<EntityId>,
    events: &mut TickEvents,
) -> bool {
    let dead = enemies.get(id).is_some_and(|e| !e.is_alive());
    if dead {
        if let Some(enemy) = enemies.remove(id) {
            events.kills.push(EnemyKilled {
                enemy: id,
                tower,
                reward: enemy.reward,
                wave: enemy.wave,
            });
        }
    }
    dead
}
