//! Headless scenario runner.
//!
//! Drives a [`Simulation`] at a fixed frame time, applies the scenario's
//! script, and summarizes the result.

use serde::{Deserialize, Serialize};

use td_core::events::{GameOutcome, TickEvents};
use td_core::math::{Fixed, Vec2Fixed};
use td_core::simulation::Simulation;
use td_core::waves::WavePhase;

use crate::scenario::{Scenario, ScenarioError, TowerPlacement, WavePolicy};

/// Ticks between progress log lines.
const PROGRESS_INTERVAL: u64 = 600;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunResult {
    /// Every wave cleared.
    Victory,
    /// Lives ran out.
    Defeat,
    /// The tick cap was reached first.
    TimedOut,
}

impl From<GameOutcome> for RunResult {
    fn from(outcome: GameOutcome) -> Self {
        match outcome {
            GameOutcome::Victory => Self::Victory,
            GameOutcome::Defeat => Self::Defeat,
        }
    }
}

/// Running totals collected from tick events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    /// Enemies spawned.
    pub spawned: u32,
    /// Enemies killed.
    pub kills: u32,
    /// Enemies that leaked.
    pub leaks: u32,
    /// Shots fired.
    pub shots: u32,
    /// Critical hits.
    pub crits: u32,
    /// Triggered abilities fired.
    pub abilities: u32,
}

impl RunTotals {
    fn record(&mut self, events: &TickEvents) {
        self.spawned += events.spawned.len() as u32;
        self.kills += events.kills.len() as u32;
        self.leaks += events.leaks.len() as u32;
        self.shots += events.shots.len() as u32;
        self.crits += events.damage.iter().filter(|d| d.critical).count() as u32;
        self.abilities += events.abilities.len() as u32;
    }
}

/// Final report of a run, printed as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// How the run ended.
    pub result: RunResult,
    /// Ticks executed.
    pub ticks: u64,
    /// Simulated seconds.
    pub sim_seconds: f64,
    /// Lives left.
    pub lives: u32,
    /// Gold left.
    pub gold: u32,
    /// Final score.
    pub score: u64,
    /// Final experience.
    pub experience: u64,
    /// Waves completed.
    pub waves_completed: usize,
    /// Waves on the map.
    pub total_waves: usize,
    /// Towers standing at the end.
    pub towers: usize,
    /// Enemies alive or unspawned at the end.
    pub enemies_remaining: u32,
    /// Event totals.
    pub totals: RunTotals,
    /// Scripted placements that were refused.
    pub rejected_actions: Vec<String>,
    /// Final state hash, hex encoded.
    pub state_hash: String,
}

/// Runs one scenario to completion.
pub struct ScenarioRunner {
    scenario: Scenario,
    sim: Simulation,
    totals: RunTotals,
    rejected: Vec<String>,
}

impl ScenarioRunner {
    /// Validate the scenario and build its simulation.
    pub fn new(scenario: Scenario) -> Result<Self, ScenarioError> {
        scenario.ensure_valid()?;
        let mut sim = Simulation::initialize(scenario.config.clone())?;
        sim.set_game_speed(scenario.speed);
        Ok(Self {
            scenario,
            sim,
            totals: RunTotals::default(),
            rejected: Vec::new(),
        })
    }

    /// The simulation being driven.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Run until an outcome or the tick cap.
    pub fn run(mut self) -> RunSummary {
        tracing::info!(
            scenario = %self.scenario.name,
            waves = self.scenario.config.map.waves.len(),
            placements = self.scenario.placements.len(),
            "Starting run"
        );

        let handle = self.sim.start_game();
        self.place_due(0);
        self.sim.start_next_wave();

        let frame = Fixed::from_num(self.scenario.frame_ms);
        while self.sim.is_current(handle) && self.sim.get_tick() < self.scenario.max_ticks {
            let Some(events) = self.sim.tick(frame) else {
                break;
            };
            self.totals.record(&events);

            let tick = self.sim.get_tick();
            self.place_due(tick);
            self.apply_wave_policy();

            if tick % PROGRESS_INTERVAL == 0 {
                let state = self.sim.get_game_state();
                tracing::info!(
                    tick,
                    wave = state.current_wave,
                    lives = state.lives,
                    gold = state.gold,
                    enemies = state.enemies_remaining,
                    "Progress"
                );
            }
        }

        self.summarize()
    }

    fn place_due(&mut self, tick: u64) {
        let due: Vec<TowerPlacement> = self
            .scenario
            .placements
            .iter()
            .filter(|p| p.at_tick == tick)
            .cloned()
            .collect();

        for placement in due {
            let position = Vec2Fixed::new(placement.x, placement.y);
            let id = match self.sim.try_place_tower(&placement.tower_type, position) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(tower = %placement.tower_type, %e, "Placement refused");
                    self.rejected
                        .push(format!("place {} at tick {tick}: {e}", placement.tower_type));
                    continue;
                }
            };
            for upgrade in &placement.upgrades {
                if let Err(e) = self.sim.try_upgrade_tower(id, upgrade) {
                    tracing::warn!(tower = id, %upgrade, %e, "Upgrade refused");
                    self.rejected
                        .push(format!("upgrade {id} with {upgrade} at tick {tick}: {e}"));
                }
            }
        }
    }

    fn apply_wave_policy(&mut self) {
        let phase = self.sim.waves().phase();
        let start = match self.scenario.wave_policy {
            WavePolicy::Eager => phase != WavePhase::Spawning,
            WavePolicy::OnClear => phase == WavePhase::Complete,
            WavePolicy::MapAuto => false,
        };
        if start && self.sim.start_next_wave() {
            tracing::debug!(wave = self.sim.waves().current_wave(), "Runner started wave");
        }
    }

    fn summarize(self) -> RunSummary {
        let state = self.sim.get_game_state();
        let result = self
            .sim
            .outcome()
            .map_or(RunResult::TimedOut, RunResult::from);
        tracing::info!(?result, ticks = state.tick, score = state.score, "Run finished");

        RunSummary {
            scenario: self.scenario.name.clone(),
            result,
            ticks: state.tick,
            sim_seconds: state.time_ms.to_num::<f64>() / 1000.0,
            lives: state.lives,
            gold: state.gold,
            score: state.score,
            experience: state.experience,
            waves_completed: self.sim.waves().completed(),
            total_waves: state.total_waves,
            towers: state.towers.len(),
            enemies_remaining: state.enemies_remaining,
            totals: self.totals,
            rejected_actions: self.rejected,
            state_hash: format!("{:016x}", self.sim.state_hash()),
        }
    }
}

/// Validate, build, and run a scenario.
pub fn run_scenario(scenario: Scenario) -> Result<RunSummary, ScenarioError> {
    Ok(ScenarioRunner::new(scenario)?.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::SMALL;

    fn small() -> Scenario {
        Scenario::from_ron_str(SMALL).unwrap()
    }

    #[test]
    fn test_small_scenario_is_won() {
        let summary = run_scenario(small()).unwrap();
        assert_eq!(summary.result, RunResult::Victory);
        assert_eq!(summary.waves_completed, 2);
        assert_eq!(summary.towers, 2);
        assert!(summary.rejected_actions.is_empty());
        assert_eq!(summary.totals.spawned, 10);
        assert_eq!(summary.totals.kills + summary.totals.leaks, 10);
        assert_eq!(summary.lives, 10 - summary.totals.leaks);
    }

    #[test]
    fn test_rejected_placement_is_reported() {
        let mut scenario = small();
        scenario.placements[1].x = scenario.placements[0].x;
        let summary = run_scenario(scenario).unwrap();
        assert_eq!(summary.rejected_actions.len(), 1);
        assert_eq!(summary.towers, 1);
    }

    #[test]
    fn test_tick_cap_times_out() {
        let mut scenario = small();
        scenario.max_ticks = 10;
        let summary = run_scenario(scenario).unwrap();
        assert_eq!(summary.result, RunResult::TimedOut);
        assert_eq!(summary.ticks, 10);
    }

    #[test]
    fn test_invalid_scenario_is_refused() {
        let mut scenario = small();
        scenario.frame_ms = 0;
        assert!(matches!(
            ScenarioRunner::new(scenario),
            Err(ScenarioError::Invalid(_))
        ));
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let mut scenario = small();
        scenario.max_ticks = 5;
        let summary = run_scenario(scenario).unwrap();
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"result\":\"timed_out\""));
        let back: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ticks, 5);
        assert_eq!(back.state_hash, summary.state_hash);
    }
}
