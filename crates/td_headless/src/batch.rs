//! Repeated runs of one scenario.
//!
//! Runs execute in parallel using rayon. Each run owns its simulation, so
//! identical scenarios must produce identical state hashes regardless of
//! scheduling.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::runner::{run_scenario, RunResult, RunSummary};
use crate::scenario::{Scenario, ScenarioError};

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Scenario name.
    pub scenario: String,
    /// Number of runs.
    pub runs: u32,
    /// Final hash of every run, in run order.
    pub hashes: Vec<String>,
    /// Whether every run ended in the same state.
    pub deterministic: bool,
}

impl VerifyReport {
    fn from_summaries(scenario: &str, summaries: &[RunSummary]) -> Self {
        let hashes: Vec<String> = summaries.iter().map(|s| s.state_hash.clone()).collect();
        let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
        Self {
            scenario: scenario.to_string(),
            runs: summaries.len() as u32,
            hashes,
            deterministic,
        }
    }
}

/// Run `scenario` `runs` times in parallel and compare final hashes.
pub fn verify_determinism(scenario: &Scenario, runs: u32) -> Result<VerifyReport, ScenarioError> {
    scenario.ensure_valid()?;
    info!(scenario = %scenario.name, runs, "Verifying determinism");

    let summaries: Vec<RunSummary> = (0..runs)
        .into_par_iter()
        .map(|run| {
            let summary = run_scenario(scenario.clone())?;
            debug!(run, hash = %summary.state_hash, "Run complete");
            Ok(summary)
        })
        .collect::<Result<_, ScenarioError>>()?;

    let report = VerifyReport::from_summaries(&scenario.name, &summaries);
    if !report.deterministic {
        warn!(hashes = ?report.hashes, "Runs diverged");
    }
    Ok(report)
}

/// Win rate and averages across seeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedSweep {
    /// Scenario name.
    pub scenario: String,
    /// Seeds run.
    pub seeds: Vec<u64>,
    /// Runs ending in victory.
    pub victories: u32,
    /// Runs ending in defeat.
    pub defeats: u32,
    /// Runs hitting the tick cap.
    pub timeouts: u32,
    /// Mean lives left.
    pub mean_lives: f64,
    /// Mean score.
    pub mean_score: f64,
}

/// Run the scenario once per seed in `first_seed..first_seed + count`.
///
/// Only crit rolls depend on the seed, so this measures how much luck
/// swings a scenario.
pub fn sweep_seeds(
    scenario: &Scenario,
    first_seed: u64,
    count: u32,
) -> Result<SeedSweep, ScenarioError> {
    scenario.ensure_valid()?;
    let seeds: Vec<u64> = (0..u64::from(count))
        .map(|i| first_seed.wrapping_add(i))
        .collect();

    let summaries: Vec<RunSummary> = seeds
        .par_iter()
        .map(|&seed| {
            let mut seeded = scenario.clone();
            seeded.config.seed = seed;
            run_scenario(seeded)
        })
        .collect::<Result<_, ScenarioError>>()?;

    let tally = |wanted: RunResult| summaries.iter().filter(|s| s.result == wanted).count() as u32;
    let n = summaries.len().max(1) as f64;
    let sweep = SeedSweep {
        scenario: scenario.name.clone(),
        victories: tally(RunResult::Victory),
        defeats: tally(RunResult::Defeat),
        timeouts: tally(RunResult::TimedOut),
        mean_lives: summaries.iter().map(|s| f64::from(s.lives)).sum::<f64>() / n,
        mean_score: summaries.iter().map(|s| s.score as f64).sum::<f64>() / n,
        seeds,
    };
    info!(
        scenario = %sweep.scenario,
        victories = sweep.victories,
        defeats = sweep.defeats,
        timeouts = sweep.timeouts,
        "Seed sweep complete"
    );
    Ok(sweep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::SMALL;

    #[test]
    fn test_verify_small_scenario() {
        let scenario = Scenario::from_ron_str(SMALL).unwrap();
        let report = verify_determinism(&scenario, 4).unwrap();
        assert!(report.deterministic);
        assert_eq!(report.hashes.len(), 4);
    }

    #[test]
    fn test_report_flags_divergence() {
        let scenario = Scenario::from_ron_str(SMALL).unwrap();
        let mut short = scenario.clone();
        short.max_ticks = 3;
        let summaries = vec![
            run_scenario(scenario).unwrap(),
            run_scenario(short).unwrap(),
        ];
        let report = VerifyReport::from_summaries("mixed", &summaries);
        assert!(!report.deterministic);
    }

    #[test]
    fn test_sweep_counts_every_seed() {
        let scenario = Scenario::from_ron_str(SMALL).unwrap();
        let sweep = sweep_seeds(&scenario, 10, 3).unwrap();
        assert_eq!(sweep.seeds, vec![10, 11, 12]);
        assert_eq!(sweep.victories + sweep.defeats + sweep.timeouts, 3);
    }
}
