//! Wave scheduling.
//!
//! The scheduler only decides *what* should spawn and *when*; the
//! simulation turns its [`SpawnRequest`]s into enemies. A wave moves
//! through `Idle → Spawning → Draining → Complete`. Waves that are still
//! draining keep being tracked after the next one starts.

use serde::{Deserialize, Serialize};

use crate::config::WaveDef;
use crate::math::{fixed_serde, option_fixed_serde, Fixed};

/// Phase of the most recently started wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WavePhase {
    /// No wave started yet.
    #[default]
    Idle,
    /// Spawn groups are still releasing enemies.
    Spawning,
    /// Everything has spawned; waiting for the field to clear.
    Draining,
    /// Every enemy of the wave is dead or leaked.
    Complete,
}

/// An enemy the simulation should create this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Zero-based wave index.
    pub wave: usize,
    /// Enemy type tag.
    pub enemy_type: String,
    /// Path index.
    pub path: usize,
}

/// Runtime state of one started wave.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveWave {
    /// Zero-based wave index.
    pub index: usize,
    /// Spawning or Draining.
    pub phase: WavePhase,
    /// Milliseconds since the wave started.
    #[serde(with = "fixed_serde")]
    pub elapsed_ms: Fixed,
    /// Group currently spawning.
    pub group: usize,
    /// Enemies spawned from the current group.
    pub spawned_in_group: u32,
    /// Enemies spawned overall.
    pub spawned: u32,
    /// Enemies the wave will spawn.
    pub total: u32,
}

impl ActiveWave {
    /// Enemies not spawned yet.
    #[must_use]
    pub const fn unspawned(&self) -> u32 {
        self.total.saturating_sub(self.spawned)
    }
}

/// Wave progression for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveScheduler {
    /// Index of the next wave to start.
    next: usize,
    /// Phase of the most recently started wave.
    phase: WavePhase,
    /// Started waves that are not complete yet, oldest first.
    active: Vec<ActiveWave>,
    /// Waves completed so far.
    completed: usize,
    /// Countdown toward an automatic start, when configured.
    #[serde(with = "option_fixed_serde")]
    auto_start_elapsed_ms: Option<Fixed>,
}

impl WaveScheduler {
    /// Create a scheduler with no wave started.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase of the most recently started wave.
    #[must_use]
    pub const fn phase(&self) -> WavePhase {
        self.phase
    }

    /// One-based number of the most recently started wave; zero before the
    /// first start.
    #[must_use]
    pub const fn current_wave(&self) -> usize {
        self.next
    }

    /// Waves completed so far.
    #[must_use]
    pub const fn completed(&self) -> usize {
        self.completed
    }

    /// Started waves that have not completed.
    #[must_use]
    pub fn active(&self) -> &[ActiveWave] {
        &self.active
    }

    /// Whether the wave at `index` is still spawning or draining.
    #[must_use]
    pub fn is_active(&self, index: usize) -> bool {
        self.active.iter().any(|w| w.index == index)
    }

    /// Enemies that are scheduled but not on the field yet.
    #[must_use]
    pub fn unspawned(&self) -> u32 {
        self.active.iter().map(ActiveWave::unspawned).sum()
    }

    /// Spawn progress of the current wave, from 0 to 1.
    #[must_use]
    pub fn progress(&self) -> Fixed {
        let Some(current) = self.next.checked_sub(1) else {
            return Fixed::ZERO;
        };
        match self.active.iter().find(|w| w.index == current) {
            Some(wave) if wave.total > 0 => {
                Fixed::from_num(wave.spawned) / Fixed::from_num(wave.total)
            }
            Some(_) => Fixed::ZERO,
            None => Fixed::ONE,
        }
    }

    /// Whether every wave has been started and completed.
    #[must_use]
    pub fn all_complete(&self, waves: &[WaveDef]) -> bool {
        self.completed >= waves.len()
    }

    /// Start the next wave.
    ///
    /// Returns `false` only when no waves remain. A wave that is still
    /// spawning keeps spawning alongside the new one.
    pub fn start_next_wave(&mut self, waves: &[WaveDef]) -> bool {
        let Some(def) = waves.get(self.next) else {
            return false;
        };

        self.active.push(ActiveWave {
            index: self.next,
            phase: WavePhase::Spawning,
            elapsed_ms: Fixed::ZERO,
            group: 0,
            spawned_in_group: 0,
            spawned: 0,
            total: def.total_enemies(),
        });
        self.next += 1;
        self.phase = WavePhase::Spawning;
        self.auto_start_elapsed_ms = None;
        tracing::info!(wave = self.next, total = def.total_enemies(), "Wave started");
        true
    }

    /// Advance the automatic-start countdown. Returns `true` when it
    /// started a wave.
    pub fn update_auto_start(
        &mut self,
        waves: &[WaveDef],
        delay_ms: Option<u32>,
        dt_ms: Fixed,
    ) -> bool {
        let (Some(delay), Some(elapsed)) = (delay_ms, self.auto_start_elapsed_ms) else {
            return false;
        };
        let elapsed = elapsed + dt_ms;
        if elapsed < Fixed::from_num(delay) {
            self.auto_start_elapsed_ms = Some(elapsed);
            return false;
        }
        self.auto_start_elapsed_ms = None;
        self.start_next_wave(waves)
    }

    /// Advance spawn timers and return the enemies due this tick.
    ///
    /// Within a group, enemy `k` (zero-based) spawns once
    /// `elapsed ≥ start_offset + k × spawn_delay`. A group that finishes
    /// hands over to the next group in the same tick.
    pub fn update(&mut self, waves: &[WaveDef], dt_ms: Fixed) -> Vec<SpawnRequest> {
        let mut requests = Vec::new();

        for active in &mut self.active {
            if active.phase != WavePhase::Spawning {
                continue;
            }
            active.elapsed_ms += dt_ms;
            let Some(def) = waves.get(active.index) else {
                active.phase = WavePhase::Draining;
                continue;
            };

            while let Some(group) = def.groups.get(active.group) {
                let offset = Fixed::from_num(group.start_offset_ms);
                if active.elapsed_ms < offset {
                    break;
                }
                let due = if group.spawn_delay_ms == 0 {
                    group.count
                } else {
                    let delay = Fixed::from_num(group.spawn_delay_ms);
                    let since = (active.elapsed_ms - offset) / delay;
                    since.saturating_to_num::<u32>().saturating_add(1).min(group.count)
                };
                for _ in active.spawned_in_group..due {
                    requests.push(SpawnRequest {
                        wave: active.index,
                        enemy_type: group.enemy_type.clone(),
                        path: group.path,
                    });
                }
                active.spawned += due.saturating_sub(active.spawned_in_group);
                active.spawned_in_group = active.spawned_in_group.max(due);

                if active.spawned_in_group < group.count {
                    break;
                }
                active.group += 1;
                active.spawned_in_group = 0;
            }

            if active.group >= def.groups.len() {
                active.phase = WavePhase::Draining;
            }
        }

        self.refresh_phase();
        requests
    }

    /// Complete every draining wave with no enemies left on the field.
    ///
    /// `has_live_enemies(index)` reports whether wave `index` still has an
    /// enemy alive. Returns the indices completed, oldest first; each wave
    /// is returned exactly once over the session.
    pub fn complete_cleared<F>(
        &mut self,
        waves: &[WaveDef],
        auto_start: bool,
        has_live_enemies: F,
    ) -> Vec<usize>
    where
        F: Fn(usize) -> bool,
    {
        let mut done = Vec::new();
        self.active.retain(|wave| {
            let cleared = wave.phase == WavePhase::Draining && !has_live_enemies(wave.index);
            if cleared {
                done.push(wave.index);
            }
            !cleared
        });
        self.completed += done.len();

        if !done.is_empty() {
            for index in &done {
                tracing::info!(wave = index + 1, "Wave complete");
            }
            let more = self.next < waves.len();
            if auto_start && more && self.phase != WavePhase::Spawning {
                self.auto_start_elapsed_ms = Some(Fixed::ZERO);
            }
        }
        self.refresh_phase();
        done
    }

    fn refresh_phase(&mut self) {
        let Some(current) = self.next.checked_sub(1) else {
            self.phase = WavePhase::Idle;
            return;
        };
        self.phase = self
            .active
            .iter()
            .find(|w| w.index == current)
            .map_or(WavePhase::Complete, |w| w.phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpawnGroup;
    use crate::testing::{fixed, group, wave};

    fn run(scheduler: &mut WaveScheduler, waves: &[WaveDef], ticks: usize, dt: f64) -> usize {
        (0..ticks).map(|_| scheduler.update(waves, fixed(dt)).len()).sum()
    }

    #[test]
    fn test_start_refused_only_when_exhausted() {
        let waves = vec![wave(vec![group("basic", 2, 1000)], 0)];
        let mut scheduler = WaveScheduler::new();

        assert_eq!(scheduler.phase(), WavePhase::Idle);
        assert!(scheduler.start_next_wave(&waves));
        assert!(!scheduler.start_next_wave(&waves));

        run(&mut scheduler, &waves, 2, 1000.0);
        assert_eq!(scheduler.phase(), WavePhase::Draining);
        assert!(!scheduler.start_next_wave(&waves));
    }

    #[test]
    fn test_start_while_spawning_runs_waves_side_by_side() {
        let waves = vec![
            wave(vec![group("basic", 3, 1000)], 0),
            wave(vec![group("fast", 2, 1000)], 0),
        ];
        let mut scheduler = WaveScheduler::new();
        assert!(scheduler.start_next_wave(&waves));
        assert_eq!(run(&mut scheduler, &waves, 1, 16.0), 1);
        assert_eq!(scheduler.phase(), WavePhase::Spawning);

        assert!(scheduler.start_next_wave(&waves));
        assert_eq!(scheduler.current_wave(), 2);
        assert_eq!(scheduler.active().len(), 2);
        assert_eq!(scheduler.unspawned(), 2 + 2);

        // Both waves keep their own timers.
        let spawned = scheduler.update(&waves, fixed(16.0));
        assert_eq!(spawned.len(), 1);
        assert_eq!(spawned[0].wave, 1);
        let spawned = scheduler.update(&waves, fixed(1000.0));
        assert_eq!(spawned.len(), 2);
        assert_eq!(scheduler.unspawned(), 1);
    }

    #[test]
    fn test_staggered_spawns() {
        let waves = vec![wave(vec![group("basic", 3, 500)], 0)];
        let mut scheduler = WaveScheduler::new();
        scheduler.start_next_wave(&waves);

        assert_eq!(scheduler.update(&waves, fixed(100.0)).len(), 1);
        assert_eq!(scheduler.update(&waves, fixed(300.0)).len(), 0);
        assert_eq!(scheduler.update(&waves, fixed(100.0)).len(), 1);
        assert_eq!(scheduler.progress(), fixed(2.0) / fixed(3.0));
        assert_eq!(scheduler.update(&waves, fixed(2000.0)).len(), 1);
        assert_eq!(scheduler.phase(), WavePhase::Draining);
    }

    #[test]
    fn test_zero_delay_spawns_group_at_once_then_next_group() {
        let mut second = group("fast", 2, 0);
        second.start_offset_ms = 0;
        let waves = vec![wave(vec![group("basic", 3, 0), second], 0)];
        let mut scheduler = WaveScheduler::new();
        scheduler.start_next_wave(&waves);

        let requests = scheduler.update(&waves, fixed(16.0));
        let types: Vec<_> = requests.iter().map(|r| r.enemy_type.as_str()).collect();
        assert_eq!(types, vec!["basic", "basic", "basic", "fast", "fast"]);
        assert_eq!(scheduler.unspawned(), 0);
    }

    #[test]
    fn test_group_offset() {
        let waves = vec![wave(
            vec![SpawnGroup {
                start_offset_ms: 1000,
                ..group("basic", 1, 100)
            }],
            0,
        )];
        let mut scheduler = WaveScheduler::new();
        scheduler.start_next_wave(&waves);

        assert_eq!(run(&mut scheduler, &waves, 9, 100.0), 0);
        assert_eq!(run(&mut scheduler, &waves, 1, 100.0), 1);
    }

    #[test]
    fn test_completion_reported_once_and_draining_tracked() {
        let waves = vec![
            wave(vec![group("basic", 1, 0)], 10),
            wave(vec![group("basic", 1, 0)], 20),
        ];
        let mut scheduler = WaveScheduler::new();
        scheduler.start_next_wave(&waves);
        scheduler.update(&waves, fixed(16.0));

        // Second wave starts while the first is still draining.
        assert!(scheduler.start_next_wave(&waves));
        scheduler.update(&waves, fixed(16.0));
        assert_eq!(scheduler.active().len(), 2);

        let done = scheduler.complete_cleared(&waves, false, |index| index == 1);
        assert_eq!(done, vec![0]);
        assert_eq!(scheduler.phase(), WavePhase::Draining);

        let done = scheduler.complete_cleared(&waves, false, |_| false);
        assert_eq!(done, vec![1]);
        assert!(scheduler.complete_cleared(&waves, false, |_| false).is_empty());
        assert_eq!(scheduler.phase(), WavePhase::Complete);
        assert!(scheduler.all_complete(&waves));
    }

    #[test]
    fn test_auto_start_after_delay() {
        let waves = vec![
            wave(vec![group("basic", 1, 0)], 0),
            wave(vec![group("basic", 1, 0)], 0),
        ];
        let mut scheduler = WaveScheduler::new();
        scheduler.start_next_wave(&waves);
        scheduler.update(&waves, fixed(16.0));
        scheduler.complete_cleared(&waves, true, |_| false);

        assert!(!scheduler.update_auto_start(&waves, Some(1000), fixed(600.0)));
        assert!(scheduler.update_auto_start(&waves, Some(1000), fixed(400.0)));
        assert_eq!(scheduler.current_wave(), 2);
        assert_eq!(scheduler.phase(), WavePhase::Spawning);
    }
}
