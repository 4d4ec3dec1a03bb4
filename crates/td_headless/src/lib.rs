//! Headless scenario runner for balance testing and CI verification.
//!
//! This crate drives the `td_core` simulation without graphics:
//!
//! - **Scenario runs**: Load a RON scenario, run it at a fixed frame time,
//!   and print a JSON summary on stdout
//! - **Validation**: Check a scenario file without running it
//! - **Determinism checks**: Run a scenario repeatedly and compare hashes
//!
//! Logs go to stderr so stdout stays machine-readable.
//!
//! # Example
//!
//! ```bash
//! cargo run -p td_headless -- run --scenario crates/td_headless/scenarios/basic.ron
//! cargo run -p td_headless -- verify --scenario crates/td_headless/scenarios/basic.ron --runs 8
//! ```

pub mod batch;
pub mod runner;
pub mod scenario;

pub use batch::{sweep_seeds, verify_determinism, SeedSweep, VerifyReport};
pub use runner::{run_scenario, RunResult, RunSummary, ScenarioRunner};
pub use scenario::{Scenario, ScenarioError, TowerPlacement, WavePolicy};
