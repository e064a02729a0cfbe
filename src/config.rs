use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::streak::StreakRules;

/// Upper bound for `checkin.session_timeout_minutes`.
pub const MAX_SESSION_TIMEOUT_MINUTES: i64 = 24 * 60;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VigilConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub checkin: CheckInConfig,
    pub streak: StreakConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CheckInConfig {
    /// IANA zone used when a profile has no (or an unparsable) zone.
    pub default_timezone: String,
    /// Local hour before which a check-in still counts for the previous day.
    pub grace_hour: u32,
    pub session_timeout_minutes: i64,
    pub abbreviated_weekly_limit: u32,
    pub text_min_chars: usize,
    pub text_max_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StreakConfig {
    pub milestones: Vec<u32>,
    pub recovery_checkpoints: Vec<u32>,
    pub recovery_window_days: i64,
    pub shield_every: u32,
    pub max_shields: u32,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            checkin: CheckInConfig::default(),
            streak: StreakConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_vigil_dir()
            .join("vigil.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for CheckInConfig {
    fn default() -> Self {
        Self {
            default_timezone: "UTC".into(),
            grace_hour: 3,
            session_timeout_minutes: 15,
            abbreviated_weekly_limit: 2,
            text_min_chars: 10,
            text_max_chars: 500,
        }
    }
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            milestones: vec![7, 14, 30, 60, 90, 180, 365],
            recovery_checkpoints: vec![3, 7, 14],
            recovery_window_days: 30,
            shield_every: 7,
            max_shields: 3,
        }
    }
}

impl CheckInConfig {
    /// Idle window, clamped to 1 minute ..= 1 day.
    pub fn session_timeout(&self) -> Duration {
        Duration::minutes(
            self.session_timeout_minutes
                .clamp(1, MAX_SESSION_TIMEOUT_MINUTES),
        )
    }

    /// Parse the configured default zone, falling back to UTC.
    pub fn default_tz(&self) -> chrono_tz::Tz {
        self.default_timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

impl StreakConfig {
    pub fn rules(&self) -> StreakRules {
        StreakRules {
            milestones: self.milestones.clone(),
            recovery_checkpoints: self.recovery_checkpoints.clone(),
            recovery_window_days: self.recovery_window_days,
            shield_every: self.shield_every,
            max_shields: self.max_shields,
        }
    }
}

/// Returns `~/.vigil/`, or `./.vigil/` when no home directory is known.
pub fn default_vigil_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vigil")
}

/// Returns the default config file path: `~/.vigil/config.toml`
pub fn default_config_path() -> PathBuf {
    default_vigil_dir().join("config.toml")
}

impl VigilConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            VigilConfig::default()
        };

        config.apply_env_overrides();

        let minutes = config.checkin.session_timeout_minutes;
        if !(1..=MAX_SESSION_TIMEOUT_MINUTES).contains(&minutes) {
            warn!(
                minutes,
                "checkin.session_timeout_minutes out of range, using {} instead",
                minutes.clamp(1, MAX_SESSION_TIMEOUT_MINUTES)
            );
        }
        Ok(config)
    }

    /// Apply environment variable overrides (VIGIL_DB, VIGIL_TIMEZONE, VIGIL_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("VIGIL_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("VIGIL_TIMEZONE") {
            self.checkin.default_timezone = val;
        }
        if let Ok(val) = std::env::var("VIGIL_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
