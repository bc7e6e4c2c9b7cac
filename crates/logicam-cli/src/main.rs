//! `logicam` – run a logical-camera scenario from the command line.
//!
//! ```text
//! logicam <scenario.toml>   run the scenario, one JSON report per line on stdout
//! logicam <scenario.toml> --real-time
//!                           same, paced to wall-clock time
//! logicam --example         print an example scenario
//! logicam --schema          print the JSON Schema of a report line
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, `LOGICAM_LOG_FORMAT=json`).  Ctrl-C stops
//! the run after the current step.

mod config;
mod runner;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use colored::Colorize;
use logicam_types::DetectionReport;
use tracing::warn;

/// Run a logical-camera scenario, printing one JSON report per line.
#[derive(Parser, Debug)]
#[command(name = "logicam", version, long_about = None)]
struct Cli {
    /// Scenario file (TOML) to run.
    #[arg(required_unless_present_any = ["example", "schema"])]
    scenario: Option<PathBuf>,

    /// Print an example scenario and exit.
    #[arg(long, conflicts_with_all = ["scenario", "schema"])]
    example: bool,

    /// Print the JSON Schema of a report line and exit.
    #[arg(long, conflicts_with = "scenario")]
    schema: bool,

    /// Sleep one step of wall-clock time between steps.
    #[arg(long, requires = "scenario")]
    real_time: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.example {
        return match config::to_toml(&config::ScenarioConfig::example()) {
            Ok(raw) => {
                print!("{raw}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "error".red().bold(), e);
                ExitCode::FAILURE
            }
        };
    }
    if cli.schema {
        let schema = schemars::schema_for!(DetectionReport);
        return match serde_json::to_string_pretty(&schema) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "error".red().bold(), e);
                ExitCode::FAILURE
            }
        };
    }
    match cli.scenario {
        Some(path) => run_scenario(&path, cli.real_time),
        None => ExitCode::FAILURE,
    }
}

fn run_scenario(path: &Path, real_time: bool) -> ExitCode {
    let _guard = logicam_runtime::init_tracing("logicam");
    print_banner();

    let mut cfg = match config::load_from(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Scenario error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    cfg.simulation.real_time |= real_time;
    eprintln!(
        "  Scenario {} – {} sensor(s), {} entit(ies), {} step(s) of {} s\n",
        path.display().to_string().bold(),
        cfg.sensors.len(),
        cfg.entities.len(),
        cfg.simulation.steps,
        cfg.simulation.step_size
    );

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!(
            "{}",
            "⚠  Ctrl-C received – stopping after this step …".yellow().bold()
        );
        stop_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the run can only end on its own");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match runner::run(&cfg, &stop, &mut out) {
        Ok(summary) => {
            eprintln!(
                "\n  {} {} step(s), {} report(s), {} fault(s), {} failed tick(s)",
                "✓".green().bold(),
                summary.steps,
                summary.reports,
                summary.faults,
                summary.tick_errors
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Run failed".red(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    eprintln!();
    eprintln!(
        "  {} {}",
        "logicam".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    eprintln!("  Frustum-based logical camera simulator");
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_scenario_and_flags() {
        let cli = Cli::try_parse_from(["logicam", "world.toml"]).unwrap();
        assert_eq!(cli.scenario, Some(PathBuf::from("world.toml")));
        assert!(!cli.example && !cli.schema && !cli.real_time);

        let cli = Cli::try_parse_from(["logicam", "world.toml", "--real-time"]).unwrap();
        assert!(cli.real_time);

        assert!(Cli::try_parse_from(["logicam", "--example"]).unwrap().example);
        assert!(Cli::try_parse_from(["logicam", "--schema"]).unwrap().schema);
    }

    #[test]
    fn rejects_missing_unknown_and_conflicting_args() {
        assert!(Cli::try_parse_from(["logicam"]).is_err());
        assert!(Cli::try_parse_from(["logicam", "--fast"]).is_err());
        assert!(Cli::try_parse_from(["logicam", "a.toml", "b.toml"]).is_err());
        assert!(Cli::try_parse_from(["logicam", "a.toml", "--example"]).is_err());
        assert!(Cli::try_parse_from(["logicam", "--example", "--schema"]).is_err());
        assert!(Cli::try_parse_from(["logicam", "--schema", "--real-time"]).is_err());
    }

    #[test]
    fn example_scenario_serialises() {
        let raw = config::to_toml(&config::ScenarioConfig::example()).unwrap();
        assert!(raw.contains("front_cam"));
        assert!(raw.contains("[[entities]]"));
    }
}
