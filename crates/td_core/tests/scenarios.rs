//! End-to-end sessions driven through the public `Simulation` API.

use std::collections::BTreeSet;

use td_core::abilities::chain_damage_sequence;
use td_core::config::{BuildArea, GameConfig};
use td_core::error::ActionError;
use td_core::events::{GameOutcome, HitSource, TickEvents};
use td_core::math::{Fixed, Vec2Fixed};
use td_core::simulation::Simulation;
use td_core::waves::WavePhase;
use td_test_utils::fixtures::{
    basic_config, fixed, full_catalog, mixed_wave, run_ticks, run_until_outcome, spawn_group, wave,
    SessionBuilder, FRAME_MS,
};

/// Straight map whose path strip is buildable too, so a tower can sit in
/// the enemies' way and take head-on shots.
fn on_path_config(groups: Vec<td_core::config::SpawnGroup>) -> GameConfig {
    let mut config = basic_config(vec![wave(groups, 10)]);
    config.catalog = full_catalog();
    config.map.starting_gold = 1000;
    config.map.buildable.push(BuildArea {
        x: Fixed::ZERO,
        y: fixed(80),
        width: fixed(1000),
        height: fixed(40),
    });
    config
}

fn first_damage_tick(sim: &mut Simulation, source: HitSource, max_ticks: u64) -> TickEvents {
    for _ in 0..max_ticks {
        let events = sim.tick(fixed(FRAME_MS)).expect("session should be running");
        if events.damage.iter().any(|d| d.source == source) {
            return events;
        }
    }
    panic!("no {source:?} damage within {max_ticks} ticks");
}

/// Ten basics then five fasts, spaced so that a single arrow tower can
/// finish each one before the next arrives.
fn spaced_mixed_wave() -> td_core::config::WaveDef {
    let mut fast = spawn_group("fast", 5, 3000);
    fast.start_offset_ms = 40_000;
    wave(vec![spawn_group("basic", 10, 3000), fast], 25)
}

#[test]
fn economy_balances_over_a_full_wave() {
    let mut config = basic_config(vec![spaced_mixed_wave()]);
    config.map.buildable.push(BuildArea {
        x: Fixed::ZERO,
        y: fixed(80),
        width: fixed(1000),
        height: fixed(40),
    });
    let expected_kill_gold: u32 = config.map.waves[0]
        .groups
        .iter()
        .map(|g| {
            let enemy = config.catalog.get_enemy(&g.enemy_type).expect("known enemy");
            g.count * enemy.reward.gold
        })
        .sum();
    assert_eq!(expected_kill_gold, 10 * 5 + 5 * 3);

    // Sitting on the path, the tower's straight shots travel along the
    // enemies' line and cannot miss.
    let (mut sim, _) = SessionBuilder::new(config)
        .tower("arrow", 600, 100)
        .start_wave()
        .build();
    assert_eq!(sim.ledger().gold, 400);

    let mut killed = BTreeSet::new();
    let mut kill_gold = 0;
    let mut leaks = 0;
    for _ in 0..10_000 {
        let Some(events) = sim.tick(fixed(FRAME_MS)) else {
            break;
        };
        for kill in &events.kills {
            assert!(killed.insert(kill.enemy), "enemy {} killed twice", kill.enemy);
            kill_gold += kill.reward.gold;
        }
        leaks += events.leaks.len();
    }

    assert_eq!(sim.outcome(), Some(GameOutcome::Victory));
    assert_eq!(killed.len(), 15);
    assert_eq!(leaks, 0);
    assert_eq!(kill_gold, expected_kill_gold);
    assert_eq!(sim.ledger().gold, 400 + 10 * 5 + 5 * 3 + 25);
    assert_eq!(sim.ledger().lives, 20);
    assert_eq!(sim.waves().completed(), 1);
    assert!(sim.store().enemies.is_empty());
}

#[test]
fn single_target_shot_hits_one_of_a_stack() {
    let (mut sim, _) = SessionBuilder::new(on_path_config(vec![spawn_group("basic", 3, 0)]))
        .tower("arrow", 200, 100)
        .start_wave()
        .build();

    let events = first_damage_tick(&mut sim, HitSource::Projectile, 200);
    let hits: Vec<_> = events
        .damage
        .iter()
        .filter(|d| d.source == HitSource::Projectile)
        .collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].amount, fixed(50));
}

#[test]
fn piercing_shot_hits_three_of_a_stack() {
    let (mut sim, _) = SessionBuilder::new(on_path_config(vec![spawn_group("basic", 4, 0)]))
        .tower("lance", 200, 100)
        .start_wave()
        .build();

    let events = first_damage_tick(&mut sim, HitSource::Projectile, 200);
    let hit: BTreeSet<_> = events
        .damage
        .iter()
        .filter(|d| d.source == HitSource::Projectile)
        .map(|d| d.enemy)
        .collect();
    assert_eq!(hit.len(), 3);
    assert_eq!(events.projectiles_removed.len(), 1);
}

#[test]
fn chain_decays_across_five_links() {
    let (mut sim, ids) = SessionBuilder::new(on_path_config(vec![spawn_group("basic", 6, 0)]))
        .tower("storm", 200, 100)
        .start_wave()
        .build();

    let events = first_damage_tick(&mut sim, HitSource::Chain, 200);
    let amounts: Vec<Fixed> = events
        .damage
        .iter()
        .filter(|d| d.source == HitSource::Chain)
        .map(|d| d.amount)
        .collect();
    assert_eq!(amounts, chain_damage_sequence(fixed(100), 5));

    // The first link killed its enemy; the kill is credited to the tower.
    assert_eq!(events.kills.len(), 1);
    assert_eq!(events.kills[0].tower, Some(ids[0]));
    assert_eq!(events.abilities.len(), 1);
    assert_eq!(events.abilities[0].affected.len(), 5);
}

#[test]
fn double_speed_fires_again_after_half_a_second() {
    let mut config = on_path_config(vec![spawn_group("basic", 1, 0)]);
    config.catalog.enemies[0].health = fixed(10_000);
    let (mut sim, _) = SessionBuilder::new(config)
        .tower("arrow", 200, 100)
        .start_wave()
        .build();
    sim.set_game_speed(fixed(2));

    let frame = fixed(100);
    let mut shots = Vec::new();
    for tick in 0..30u32 {
        let events = sim.tick(frame).expect("session should be running");
        if !events.shots.is_empty() {
            shots.push((tick, sim.time_ms()));
        }
        if shots.len() == 2 {
            break;
        }
    }

    assert_eq!(shots.len(), 2);
    let wall_ms = (shots[1].0 - shots[0].0) * 100;
    assert_eq!(wall_ms, 500);
    assert_eq!(shots[1].1 - shots[0].1, fixed(1000));
}

#[test]
fn leaks_end_the_game_in_defeat() {
    let mut config = basic_config(vec![wave(vec![spawn_group("fast", 5, 0)], 0)]);
    config.map.starting_lives = 3;
    let (mut sim, _) = SessionBuilder::new(config).start_wave().build();

    let ticks = run_until_outcome(&mut sim, 2_000);

    assert!(ticks < 2_000);
    assert_eq!(sim.outcome(), Some(GameOutcome::Defeat));
    assert_eq!(sim.ledger().lives, 0);
    assert!(sim.store().enemies.is_empty());
    assert_eq!(
        sim.try_place_tower("arrow", Vec2Fixed::from_ints(100, 40)),
        Err(ActionError::GameOver)
    );
    assert!(!sim.start_next_wave());
    assert!(sim.tick(fixed(FRAME_MS)).is_none());
}

#[test]
fn map_without_waves_is_won_on_the_first_tick() {
    let (mut sim, _) = SessionBuilder::new(basic_config(vec![])).build();
    let events = sim.tick(fixed(FRAME_MS)).expect("first tick runs");
    assert_eq!(events.outcome, Some(GameOutcome::Victory));
    assert!(sim.tick(fixed(FRAME_MS)).is_none());
}

#[test]
fn waves_run_back_to_back_and_pay_out() {
    let (mut sim, _) = SessionBuilder::new(basic_config(vec![
        wave(vec![spawn_group("basic", 2, 100)], 40),
        wave(vec![spawn_group("fast", 2, 100)], 60),
    ]))
    .tower("arrow", 100, 40)
    .tower("arrow", 140, 160)
    .tower("arrow", 400, 40)
    .start_wave()
    .build();

    // The first wave is still spawning; the second starts alongside it.
    let _ = sim.tick(fixed(FRAME_MS));
    assert_eq!(sim.waves().phase(), WavePhase::Spawning);
    assert!(sim.start_next_wave());
    assert_eq!(sim.get_game_state().current_wave, 2);
    assert_eq!(sim.waves().active().len(), 2);
    assert!(!sim.start_next_wave(), "no third wave to start");

    let _ = run_ticks(&mut sim, 5_000);
    assert_eq!(sim.outcome(), Some(GameOutcome::Victory));
    assert_eq!(sim.waves().completed(), 2);
    assert!(sim.ledger().gold >= 200 + 40 + 60);
}

#[test]
fn auto_start_launches_the_next_wave() {
    let mut config = basic_config(vec![
        wave(vec![spawn_group("fast", 1, 0)], 0),
        wave(vec![spawn_group("fast", 1, 0)], 0),
    ]);
    config.map.auto_start_delay_ms = Some(1000);
    let (mut sim, _) = SessionBuilder::new(config).start_wave().build();

    let events = run_ticks(&mut sim, 2_000);
    let started: Vec<usize> = events.iter().flat_map(|e| e.waves_started.clone()).collect();
    assert_eq!(started, vec![2]);
    assert_eq!(sim.waves().completed(), 2);
}

#[test]
fn snapshots_are_dropped_when_the_subscriber_lags() {
    let (mut sim, _) = SessionBuilder::new(basic_config(vec![mixed_wave()])).build();
    let rx = sim.subscribe(1);

    let _ = run_ticks(&mut sim, 3);
    let first = rx.try_recv().expect("one snapshot buffered");
    assert_eq!(first.tick, 1);
    assert!(rx.try_recv().is_err());

    drop(rx);
    let _ = run_ticks(&mut sim, 1);
    assert_eq!(sim.get_tick(), 4);
}

#[test]
fn reset_restores_the_starting_session() {
    let (mut sim, ids) = SessionBuilder::new(basic_config(vec![mixed_wave()]))
        .tower("arrow", 300, 40)
        .start_wave()
        .build();
    assert!(sim.select_tower(Some(ids[0])));
    let _ = run_ticks(&mut sim, 200);

    sim.reset_game();
    let state = sim.get_game_state();
    assert_eq!(state.gold, 500);
    assert_eq!(state.lives, 20);
    assert!(state.towers.is_empty());
    assert!(state.enemies.is_empty());
    assert_eq!(state.selected_tower, None);
    assert_eq!(state.tick, 0);
    assert!(!state.playing);
}
