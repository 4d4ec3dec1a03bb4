//! Headless tower-defense runner.
//!
//! Runs scenarios without graphics. Results go to stdout as JSON; logs go
//! to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario and print the summary
//! cargo run -p td_headless -- run --scenario scenarios/basic.ron
//!
//! # Check a scenario file without running it
//! cargo run -p td_headless -- validate --scenario scenarios/basic.ron
//!
//! # Verify determinism by running the same scenario several times
//! cargo run -p td_headless -- verify --scenario scenarios/basic.ron --runs 8
//!
//! # Measure how much crit luck matters
//! cargo run -p td_headless -- sweep --scenario scenarios/basic.ron --count 100
//! ```
//!
//! `RUST_LOG` overrides the log filter (for example `RUST_LOG=td_core=debug`).

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use td_headless::{run_scenario, sweep_seeds, verify_determinism, Scenario};

#[derive(Parser)]
#[command(name = "td_headless")]
#[command(about = "Headless tower-defense runner for balance testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario to completion
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Also write the summary to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON summary
        #[arg(long)]
        pretty: bool,
    },

    /// Check a scenario without running it
    Validate {
        /// Scenario file to check
        #[arg(short, long)]
        scenario: PathBuf,
    },

    /// Verify determinism by running the same scenario multiple times
    Verify {
        /// Scenario to test
        #[arg(short, long)]
        scenario: PathBuf,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Run the scenario once per seed and report the spread
    Sweep {
        /// Scenario to run
        #[arg(short, long)]
        scenario: PathBuf,

        /// First seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Number of seeds
        #[arg(short, long, default_value = "100")]
        count: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON results
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            output,
            pretty,
        } => cmd_run(&scenario, output, pretty),
        Commands::Validate { scenario } => cmd_validate(&scenario),
        Commands::Verify { scenario, runs } => cmd_verify(&scenario, runs),
        Commands::Sweep {
            scenario,
            seed,
            count,
        } => cmd_sweep(&scenario, seed, count),
    }
}

fn load_or_exit(path: &Path) -> Scenario {
    match Scenario::load(path) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Failed to load scenario");
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> String {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match json {
        Ok(json) => {
            println!("{json}");
            json
        }
        Err(e) => {
            eprintln!("FATAL: Failed to encode result: {e}");
            std::process::exit(1);
        }
    }
}

/// Run a single scenario
fn cmd_run(path: &Path, output: Option<PathBuf>, pretty: bool) {
    let scenario = load_or_exit(path);

    let summary = match run_scenario(scenario) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    let json = print_json(&summary, pretty);
    if let Some(output) = output {
        if let Err(e) = std::fs::write(&output, json) {
            tracing::error!(error = %e, path = %output.display(), "Failed to save summary");
            eprintln!("FATAL: Failed to save summary: {e}");
            std::process::exit(1);
        }
    }
}

/// Check a scenario file
fn cmd_validate(path: &Path) {
    let scenario = load_or_exit(path);
    let problems = scenario.validate();

    if problems.is_empty() {
        eprintln!(
            "OK: '{}' ({} waves, {} placements)",
            scenario.name,
            scenario.config.map.waves.len(),
            scenario.placements.len()
        );
    } else {
        eprintln!("INVALID: '{}'", scenario.name);
        for problem in &problems {
            eprintln!("  - {problem}");
        }
        std::process::exit(1);
    }
}

/// Verify determinism
fn cmd_verify(path: &Path, runs: u32) {
    let scenario = load_or_exit(path);

    let report = match verify_determinism(&scenario, runs) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    print_json(&report, false);
    if report.deterministic {
        eprintln!("PASS: All {runs} runs produced identical results");
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
}

/// Sweep seeds
fn cmd_sweep(path: &Path, seed: u64, count: u32) {
    let scenario = load_or_exit(path);

    match sweep_seeds(&scenario, seed, count) {
        Ok(sweep) => {
            print_json(&sweep, true);
        }
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    }
}
