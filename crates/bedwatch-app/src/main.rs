//! Headless replay driver for the bedwatch match tracker.
//!
//! Loads `config.ron` (CLI flags override it), initialises logging, then
//! feeds a scripted event stream through a live session and prints every
//! notification, sound cue and chat command it produces.

mod replay;

use std::process::ExitCode;

use bedwatch_config::{CliArgs, Config, default_config_dir};
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    bedwatch_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let script = match replay::load_script(&args.script) {
        Ok(script) => script,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", args.script.display());
            return ExitCode::FAILURE;
        }
    };

    match replay::run(script, config, args.fast, |line| println!("{line}")).await {
        Ok(summary) => {
            tracing::info!(
                events = summary.events,
                outputs = summary.outputs,
                phase = %summary.snapshot.phase,
                "Replay finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Replay failed: {e}");
            ExitCode::FAILURE
        }
    }
}
