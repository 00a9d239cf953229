//! Command-line argument parsing for bedwatch.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// bedwatch command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "bedwatch", about = "Live match threat tracker")]
pub struct CliArgs {
    /// Replay script (RON) to feed through the tracker.
    pub script: PathBuf,

    /// Turn autoplay on or off.
    #[arg(long)]
    pub autoplay: Option<bool>,

    /// Autoplay queue mode (solo, doubles, threes, fours, 4v4).
    #[arg(long)]
    pub mode: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Replay events back-to-back instead of at their scripted times.
    #[arg(long)]
    pub fast: bool,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(enabled) = args.autoplay {
            self.autoplay.enabled = enabled;
        }
        if let Some(ref mode) = args.mode {
            self.autoplay.mode = mode.clone();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> CliArgs {
        CliArgs {
            script: PathBuf::from("match.ron"),
            autoplay: None,
            mode: None,
            log_level: None,
            config: None,
            fast: false,
        }
    }

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            autoplay: Some(true),
            mode: Some("solo".to_string()),
            ..bare_args()
        };
        config.apply_cli_overrides(&args);
        assert!(config.autoplay.enabled);
        assert_eq!(config.autoplay.mode, "solo");
        // Non-overridden fields retain defaults
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&bare_args());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::try_parse_from([
            "bedwatch",
            "replay.ron",
            "--autoplay",
            "true",
            "--log-level",
            "debug",
            "--fast",
        ])
        .unwrap();
        assert_eq!(args.script, PathBuf::from("replay.ron"));
        assert_eq!(args.autoplay, Some(true));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.fast);
    }
}
