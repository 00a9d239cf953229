//! Configuration system for bedwatch.
//!
//! Provides the tunable thresholds, windows and cooldowns used by the match
//! tracker. Settings persist to disk as RON files, support CLI overrides via
//! clap, hot-reload detection, and forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    AutoBlacklistConfig, AutoplayConfig, BedConfig, Config, DebugConfig, RushConfig, ScanConfig,
    TeammateConfig, TrackerConfig, default_config_dir,
};
pub use error::ConfigError;
