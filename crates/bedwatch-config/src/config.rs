//! Configuration structs with sensible defaults and RON persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name used inside the config directory.
const CONFIG_FILE: &str = "config.ron";

/// Top-level tracker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Lobby join tracking.
    pub tracker: TrackerConfig,
    /// Bed detection and proximity warnings.
    pub bed: BedConfig,
    /// Teammate inference.
    pub teammates: TeammateConfig,
    /// Rush timing prediction.
    pub rush: RushConfig,
    /// Generator and invisible-player scanning.
    pub scan: ScanConfig,
    /// Autoplay decision and requeue.
    pub autoplay: AutoplayConfig,
    /// Automatic blacklist policy.
    pub blacklist: AutoBlacklistConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Lobby join tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// How long a join stays in the recent-joins list, in milliseconds.
    pub join_display_ttl_ms: u64,
}

/// Bed detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BedConfig {
    /// Search the world for the real bed instead of trusting the spawn point.
    pub map_aware_detection: bool,
    /// Horizontal half-extent of the bed search window, in blocks.
    pub scan_horizontal: i32,
    /// Vertical half-extent of the bed search window, in blocks.
    pub scan_vertical: i32,
    /// Minimum time between detection attempts while pending.
    pub retry_interval_ms: u64,
    /// Time after which the spawn fallback is committed.
    pub retry_timeout_ms: u64,
    /// Distance at which an enemy near the bed triggers a warning.
    pub proximity_radius: f64,
    /// Per-player cooldown between proximity warnings.
    pub warning_cooldown_ms: u64,
    /// No proximity warnings until the match has run this long.
    pub grace_period_ms: u64,
}

/// Teammate inference configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TeammateConfig {
    /// Window after lobby entry during which spawn proximity implies a teammate.
    pub spawn_window_ms: u64,
    /// Radius of the spawn proximity check, in blocks.
    pub spawn_radius: f64,
}

/// Rush prediction configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RushConfig {
    /// Enable the rush predictor.
    pub enabled: bool,
    /// Minimum time between two predictions.
    pub recheck_interval_ms: u64,
    /// Predictions only run this long after match start.
    pub active_window_ms: u64,
    /// Warn once when the predicted ETA is at or below this many seconds.
    pub warning_threshold_secs: i32,
    /// Base rush time for maps without a known timing.
    pub default_base_secs: i32,
    /// Per-map base rush time overrides (map name -> seconds).
    pub map_base_secs: HashMap<String, i32>,
}

/// Generator and invisible-player scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    /// Interval between generator scans.
    pub generator_interval_ms: u64,
    /// Horizontal half-extent of the generator scan box.
    pub horizontal_radius: i32,
    /// Vertical half-extent of the generator scan box.
    pub vertical_radius: i32,
    /// Per-axis tolerance used when counting dropped items at a generator.
    pub count_tolerance: f64,
    /// Horizontal tolerance for the "item resting on top" flag.
    pub on_top_horizontal: f64,
    /// Vertical tolerance for the "item resting on top" flag.
    pub on_top_vertical: f64,
    /// Radius within which a count drop is attributed to an enemy.
    pub pickup_radius: f64,
    /// Radius of the invisible-player alert.
    pub invisible_radius: f64,
    /// Per-player cooldown between invisible-player alerts.
    pub invisible_cooldown_ms: u64,
}

/// Autoplay configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoplayConfig {
    /// Start sessions with autoplay on.
    pub enabled: bool,
    /// Queue mode (solo, doubles, threes, fours, 4v4 or a raw game id).
    pub mode: String,
    /// Lowest threat tier (LOW, MEDIUM, HIGH, EXTREME) that counts as a threat.
    pub max_threat: String,
    /// Requeue when an enemy threat is found; otherwise stay and stop autoplay.
    pub requeue_on_threat: bool,
    /// Delay between lobby entry and the autoplay check.
    pub check_delay_ms: u64,
    /// Minimum time between two requeue sequences.
    pub requeue_cooldown_ms: u64,
    /// Delays (from the leave command) of the warp, warp and play steps.
    pub step_delays_ms: [u64; 3],
}

/// Automatic blacklist policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoBlacklistConfig {
    /// Enable automatic blacklisting.
    pub auto_enabled: bool,
    /// Losses against a player within the lookback window that trigger a listing.
    pub loss_threshold: i64,
    /// Lookback window in days.
    pub lookback_days: i64,
    /// Listing duration in days (0 = never expires).
    pub duration_days: i64,
    /// Minimum hours between two automatic listings of the same player.
    pub cooldown_hours: i64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            join_display_ttl_ms: 10_000,
        }
    }
}

impl Default for BedConfig {
    fn default() -> Self {
        Self {
            map_aware_detection: true,
            scan_horizontal: 20,
            scan_vertical: 8,
            retry_interval_ms: 1_000,
            retry_timeout_ms: 5_000,
            proximity_radius: 15.0,
            warning_cooldown_ms: 5_000,
            grace_period_ms: 10_000,
        }
    }
}

impl Default for TeammateConfig {
    fn default() -> Self {
        Self {
            spawn_window_ms: 2_000,
            spawn_radius: 10.0,
        }
    }
}

impl Default for RushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recheck_interval_ms: 2_000,
            active_window_ms: 90_000,
            warning_threshold_secs: 25,
            default_base_secs: 36,
            map_base_secs: HashMap::new(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            generator_interval_ms: 1_000,
            horizontal_radius: 32,
            vertical_radius: 10,
            count_tolerance: 3.0,
            on_top_horizontal: 0.75,
            on_top_vertical: 3.0,
            pickup_radius: 2.5,
            invisible_radius: 24.0,
            invisible_cooldown_ms: 10_000,
        }
    }
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: "fours".to_string(),
            max_threat: "HIGH".to_string(),
            requeue_on_threat: true,
            check_delay_ms: 3_000,
            requeue_cooldown_ms: 7_000,
            step_delays_ms: [1_000, 2_500, 4_000],
        }
    }
}

impl Default for AutoBlacklistConfig {
    fn default() -> Self {
        Self {
            auto_enabled: true,
            loss_threshold: 3,
            lookback_days: 7,
            duration_days: 3,
            cooldown_hours: 12,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Threat labels accepted by `autoplay.max_threat`.
const THREAT_LABELS: [&str; 4] = ["LOW", "MEDIUM", "HIGH", "EXTREME"];

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Platform config directory for bedwatch (e.g. `~/.config/bedwatch`).
///
/// Falls back to the working directory when the platform has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("bedwatch"))
        .unwrap_or_else(|| PathBuf::from("."))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Rejects values the tracker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bed.scan_horizontal < 0 || self.bed.scan_vertical < 0 {
            return Err(invalid("bed.scan_horizontal", "search extents must not be negative"));
        }
        if !(self.bed.proximity_radius > 0.0) {
            return Err(invalid("bed.proximity_radius", "must be positive"));
        }
        if self.rush.default_base_secs <= 0 {
            return Err(invalid("rush.default_base_secs", "must be positive"));
        }
        if !THREAT_LABELS
            .iter()
            .any(|label| label.eq_ignore_ascii_case(&self.autoplay.max_threat))
        {
            return Err(invalid(
                "autoplay.max_threat",
                format!("expected one of {}", THREAT_LABELS.join(", ")),
            ));
        }
        if !self.autoplay.step_delays_ms.is_sorted() {
            return Err(invalid("autoplay.step_delays_ms", "delays must not decrease"));
        }
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.validate()?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
