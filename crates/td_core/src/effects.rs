//! Timed status effects on enemies.
//!
//! Instances stack independently: two burns both tick, and two slows both
//! count down, though only the strongest slow affects speed.

use crate::components::{ActiveEffect, Enemy};
use crate::config::{EffectKind, EffectSpec, MAX_SLOW_FRACTION};
use crate::events::{DamageDealt, EnemyKilled, HitSource, TickEvents};
use crate::math::{ms_to_seconds, Fixed};
use crate::store::Table;

/// Attach an effect to an enemy.
///
/// Returns `false` when the effect is discarded: a non-positive duration,
/// or freeze/stun on a boss. Slow values are clamped to
/// `0..=MAX_SLOW_FRACTION`.
pub fn apply_effect(enemy: &mut Enemy, kind: EffectKind, value: Fixed, duration_ms: Fixed) -> bool {
    if duration_ms <= Fixed::ZERO {
        return false;
    }
    if enemy.flags.boss && kind.holds_in_place() {
        return false;
    }
    let value = match kind {
        EffectKind::Slow => value.clamp(Fixed::ZERO, MAX_SLOW_FRACTION),
        _ => value.max(Fixed::ZERO),
    };
    enemy.effects.push(ActiveEffect {
        kind,
        value,
        remaining_ms: duration_ms,
    });
    true
}

/// Attach an effect described by a catalog template.
pub fn apply_spec(enemy: &mut Enemy, spec: &EffectSpec) -> bool {
    apply_effect(enemy, spec.kind, spec.value, Fixed::from_num(spec.duration_ms))
}

/// Strongest active slow, already capped.
#[must_use]
pub fn slow_fraction(enemy: &Enemy) -> Fixed {
    enemy
        .effects
        .iter()
        .filter(|e| e.kind == EffectKind::Slow && e.remaining_ms > Fixed::ZERO)
        .map(|e| e.value)
        .max()
        .unwrap_or(Fixed::ZERO)
        .min(MAX_SLOW_FRACTION)
}

/// Whether a freeze or stun is holding the enemy in place.
#[must_use]
pub fn is_held(enemy: &Enemy) -> bool {
    enemy
        .effects
        .iter()
        .any(|e| e.kind.holds_in_place() && e.remaining_ms > Fixed::ZERO)
}

/// Speed after slows and holds.
#[must_use]
pub fn effective_speed(enemy: &Enemy) -> Fixed {
    if is_held(enemy) {
        return Fixed::ZERO;
    }
    enemy.speed * (Fixed::ONE - slow_fraction(enemy))
}

/// Apply damage over time and count down every effect.
///
/// Burn and poison deal `value × elapsed seconds`. Effects whose remaining
/// time reaches zero are dropped. Enemies killed here are removed at once.
pub fn status_effect_system(enemies: &mut Table<Enemy>, dt_ms: Fixed, events: &mut TickEvents) {
    let dt_s = ms_to_seconds(dt_ms);

    for id in enemies.ids() {
        let Some(enemy) = enemies.get_mut(id) else {
            continue;
        };

        let dot: Fixed = enemy
            .effects
            .iter()
            .filter(|e| e.kind.is_damage_over_time())
            .map(|e| e.value * dt_s)
            .sum();

        for effect in &mut enemy.effects {
            effect.remaining_ms -= dt_ms;
        }
        enemy.effects.retain(|e| e.remaining_ms > Fixed::ZERO);

        if dot > Fixed::ZERO {
            let dealt = enemy.take_damage(dot);
            events.damage.push(DamageDealt {
                tower: None,
                enemy: id,
                amount: dealt,
                critical: false,
                source: HitSource::DamageOverTime,
            });
        }

        if !enemy.is_alive() {
            let reward = enemy.reward;
            let wave = enemy.wave;
            enemies.remove(id);
            events.kills.push(EnemyKilled {
                enemy: id,
                tower: None,
                reward,
                wave,
            });
        }
    }
}
