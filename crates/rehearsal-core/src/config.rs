use anyhow::{Context, Result, anyhow};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::booking::DEFAULT_BOOKING_WINDOW_DAYS;
use crate::schedule::WeeklySchedule;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "rehearsal.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RehearsalConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cutover: CutoverConfig,
    #[serde(default)]
    pub booking: BookingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutoverConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_weekday")]
    pub weekday: String,
    #[serde(default = "default_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

impl Default for CutoverConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            weekday: default_weekday(),
            hour: default_hour(),
            minute: 0,
        }
    }
}

impl CutoverConfig {
    /// Parse the configured weekday and time into a [`WeeklySchedule`].
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown weekday name or an out-of-range time.
    pub fn schedule(&self) -> Result<WeeklySchedule> {
        let weekday = self
            .weekday
            .trim()
            .parse::<Weekday>()
            .map_err(|_| anyhow!("unknown cutover weekday '{}'", self.weekday))?;
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0).ok_or_else(|| {
            anyhow!(
                "cutover time {:02}:{:02} is out of range",
                self.hour,
                self.minute
            )
        })?;
        Ok(WeeklySchedule::new(weekday, time))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

/// Load configuration from the first file that exists: the explicit path,
/// `./rehearsal.toml`, then `<config dir>/rehearsal/config.toml`. Missing
/// files mean defaults; an explicit path that does not exist is an error.
///
/// # Errors
///
/// Returns an error if a file cannot be read or parsed.
pub fn load_config(explicit: Option<&Path>, working_dir: &Path) -> Result<RehearsalConfig> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    let local = working_dir.join(LOCAL_CONFIG_FILE);
    if local.exists() {
        return read_config(&local);
    }

    if let Some(user) = dirs::config_dir().map(|dir| dir.join("rehearsal/config.toml")) {
        if user.exists() {
            return read_config(&user);
        }
    }

    Ok(RehearsalConfig::default())
}

fn read_config(path: &Path) -> Result<RehearsalConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<RehearsalConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .cutover
        .schedule()
        .with_context(|| format!("Invalid [cutover] section in {}", path.display()))?;
    Ok(config)
}

/// Pick the database path: CLI flag, then `REHEARSAL_DB`, then the config
/// file, then the per-user data directory.
#[must_use]
pub fn resolve_database_path(
    config: &RehearsalConfig,
    cli_db: Option<PathBuf>,
    env_db: Option<String>,
) -> PathBuf {
    cli_db
        .or_else(|| env_db.filter(|v| !v.trim().is_empty()).map(PathBuf::from))
        .or_else(|| config.storage.database.clone())
        .unwrap_or_else(default_database_path)
}

/// Pick the listen address: CLI flag, then `REHEARSAL_LISTEN`, then config.
#[must_use]
pub fn resolve_listen(
    config: &RehearsalConfig,
    cli_listen: Option<String>,
    env_listen: Option<String>,
) -> String {
    cli_listen
        .or_else(|| env_listen.filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| config.server.listen.clone())
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rehearsal")
        .join("rehearsal.sqlite3")
}

const fn default_true() -> bool {
    true
}

fn default_listen() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_weekday() -> String {
    "sun".to_string()
}

const fn default_hour() -> u32 {
    19
}

const fn default_window_days() -> u32 {
    DEFAULT_BOOKING_WINDOW_DAYS
}
