//! Path following.

use crate::components::Enemy;
use crate::config::MapPath;
use crate::effects::effective_speed;
use crate::events::{EnemyLeaked, TickEvents};
use crate::math::{ms_to_seconds, Fixed};
use crate::store::Table;

/// Outcome of moving one enemy for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// Still walking.
    Moving,
    /// Walked past the final waypoint.
    Leaked,
}

/// Move a single enemy toward its next waypoint.
///
/// If the waypoint is closer than this tick's travel distance the enemy
/// snaps onto it and targets the following one; leftover distance is not
/// carried over. A waypoint exactly one step away is walked onto and
/// passed on the next tick.
pub fn step_enemy(enemy: &mut Enemy, path: &MapPath, dt_s: Fixed) -> StepResult {
    let Some(&waypoint) = path.waypoints.get(enemy.next_waypoint) else {
        return StepResult::Leaked;
    };

    let step = effective_speed(enemy) * dt_s;
    if step <= Fixed::ZERO {
        return StepResult::Moving;
    }

    if enemy.position.distance_squared(waypoint) < step * step {
        enemy.position = waypoint;
        enemy.next_waypoint += 1;
        if enemy.next_waypoint >= path.waypoints.len() {
            return StepResult::Leaked;
        }
    } else {
        enemy.position = enemy.position.step_towards(waypoint, step);
    }
    StepResult::Moving
}

/// Advance every enemy along its path, removing the ones that leak.
pub fn movement_system(
    enemies: &mut Table<Enemy>,
    paths: &[MapPath],
    dt_ms: Fixed,
    events: &mut TickEvents,
) {
    let dt_s = ms_to_seconds(dt_ms);

    for id in enemies.ids() {
        let Some(enemy) = enemies.get_mut(id) else {
            continue;
        };
        let result = match paths.get(enemy.path) {
            Some(path) => step_enemy(enemy, path, dt_s),
            None => StepResult::Leaked,
        };

        if result == StepResult::Leaked {
            let wave = enemy.wave;
            enemies.remove(id);
            events.leaks.push(EnemyLeaked { enemy: id, wave });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EffectKind;
    use crate::effects::apply_effect;
    use crate::math::Vec2Fixed;
    use crate::store::EntityStore;
    use crate::testing::{self, fixed};

    fn l_path() -> MapPath {
        MapPath {
            waypoints: vec![
                Vec2Fixed::from_ints(0, 0),
                Vec2Fixed::from_ints(100, 0),
                Vec2Fixed::from_ints(100, 100),
            ],
        }
    }

    fn walker() -> Enemy {
        // speed 50
        let catalog = testing::basic_catalog();
        Enemy::from_type(catalog.get_enemy("basic").unwrap(), 0, Vec2Fixed::ZERO, 0)
    }

    #[test]
    fn test_moves_toward_waypoint() {
        let mut enemy = walker();
        let result = step_enemy(&mut enemy, &l_path(), fixed(1.0));
        assert_eq!(result, StepResult::Moving);
        assert_eq!(enemy.position, Vec2Fixed::from_ints(50, 0));
        assert_eq!(enemy.next_waypoint, 1);
    }

    #[test]
    fn test_snaps_without_overshoot() {
        let mut enemy = walker();
        enemy.position = Vec2Fixed::from_ints(90, 0);

        step_enemy(&mut enemy, &l_path(), fixed(1.0));

        // 50 units available, 10 needed: lands on the corner, no carry.
        assert_eq!(enemy.position, Vec2Fixed::from_ints(100, 0));
        assert_eq!(enemy.next_waypoint, 2);
    }

    #[test]
    fn test_waypoint_exactly_one_step_away_is_passed_next_tick() {
        let mut enemy = walker();
        enemy.position = Vec2Fixed::from_ints(50, 0);

        step_enemy(&mut enemy, &l_path(), fixed(1.0));
        assert_eq!(enemy.position, Vec2Fixed::from_ints(100, 0));
        assert_eq!(enemy.next_waypoint, 1);

        step_enemy(&mut enemy, &l_path(), fixed(1.0));
        assert_eq!(enemy.position, Vec2Fixed::from_ints(100, 0));
        assert_eq!(enemy.next_waypoint, 2);
    }

    #[test]
    fn test_slow_reduces_speed() {
        let mut enemy = walker();
        apply_effect(&mut enemy, EffectKind::Slow, fixed(0.5), fixed(1000.0));
        step_enemy(&mut enemy, &l_path(), fixed(1.0));
        assert_eq!(enemy.position, Vec2Fixed::from_ints(25, 0));
    }

    #[test]
    fn test_stun_holds_in_place() {
        let mut enemy = walker();
        apply_effect(&mut enemy, EffectKind::Stun, Fixed::ZERO, fixed(1000.0));
        step_enemy(&mut enemy, &l_path(), fixed(1.0));
        assert_eq!(enemy.position, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_leak_removes_enemy() {
        let mut store = EntityStore::new();
        let mut enemy = walker();
        enemy.position = Vec2Fixed::from_ints(100, 90);
        enemy.next_waypoint = 2;
        let id = store.insert_enemy(enemy);

        let mut events = TickEvents::default();
        movement_system(&mut store.enemies, &[l_path()], fixed(1000.0), &mut events);

        assert!(store.enemies.is_empty());
        assert_eq!(events.leaks.len(), 1);
        assert_eq!(events.leaks[0].enemy, id);
    }
}
