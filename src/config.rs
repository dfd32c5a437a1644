/// Run configuration loader - parses bw-check.toml
///
/// The store has four tables: `[run]`, `[location]`, `[birdweather]` and
/// `[mqtt]`. Every key has a default, so a fresh install works without
/// editing anything:
///
/// - a missing file is created with all four tables
/// - a missing table is appended to the existing file
/// - a missing key inside a table is filled from defaults in memory only
///
/// Text the user already wrote is never rewritten. Values are typed and
/// validated once here; the rest of the crate only sees `RunConfiguration`.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default store location, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "bw-check.toml";

/// Environment variable naming an alternative store location.
pub const CONFIG_PATH_ENV: &str = "BWCHECK_CONFIG";

/// Environment variable overriding the stored broker password.
pub const MQTT_PASSWORD_ENV: &str = "BWCHECK_MQTT_PASSWORD";

/// Largest sunrise/sunset shift accepted, in hours either way.
pub const MAX_OFFSET_HOURS: f64 = 24.0;

const SECTIONS: [&str; 4] = ["run", "location", "birdweather", "mqtt"];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Configuration problems. All of them end the run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to render default configuration: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// Typed schema
// ---------------------------------------------------------------------------

/// `[run]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Verbose logging; the summary line goes to the log instead of stdout.
    pub debug: bool,
    /// Only run between (shifted) sunrise and sunset.
    pub limit_times: bool,
    /// Hours added to sunrise. Negative widens the window.
    pub sunrise_offset: f64,
    /// Hours added to sunset.
    pub sunset_offset: f64,
    /// Maximum age of the last detection for the station to count as online.
    pub online_threshold_hours: f64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            debug: false,
            limit_times: true,
            sunrise_offset: -1.0,
            sunset_offset: 1.0,
            online_threshold_hours: 12.0,
        }
    }
}

/// `[location]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub lat: f64,
    pub lon: f64,
    pub tz: Tz,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            lat: 46.69,
            lon: -92.05,
            tz: chrono_tz::America::Chicago,
        }
    }
}

/// `[birdweather]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BirdweatherConfig {
    pub station_id: String,
    pub url: String,
}

impl Default for BirdweatherConfig {
    fn default() -> Self {
        Self {
            station_id: "2265".to_string(),
            url: "https://app.birdweather.com/graphql".to_string(),
        }
    }
}

/// `[mqtt]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Topic base; station topics live under `<topic>/<station name>`.
    pub topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.1".to_string(),
            port: 1883,
            username: "mqtt-user".to_string(),
            password: "mqtt-password".to_string(),
            topic: "birdweather".to_string(),
        }
    }
}

/// Resolved settings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfiguration {
    pub run: RunOptions,
    pub location: LocationConfig,
    pub birdweather: BirdweatherConfig,
    pub mqtt: MqttConfig,
}

impl RunConfiguration {
    /// Parses and validates configuration text. Missing tables and keys take
    /// their defaults.
    pub fn from_toml(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let config: RunConfiguration = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that parse but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.location.lat) {
            return Err(ConfigError::Invalid {
                key: "location.lat",
                reason: format!("{} is outside -90..90", self.location.lat),
            });
        }
        if !(-180.0..=180.0).contains(&self.location.lon) {
            return Err(ConfigError::Invalid {
                key: "location.lon",
                reason: format!("{} is outside -180..180", self.location.lon),
            });
        }
        for (key, offset) in [
            ("run.sunrise_offset", self.run.sunrise_offset),
            ("run.sunset_offset", self.run.sunset_offset),
        ] {
            if !(-MAX_OFFSET_HOURS..=MAX_OFFSET_HOURS).contains(&offset) {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("{} is outside -{}..{} hours", offset, MAX_OFFSET_HOURS, MAX_OFFSET_HOURS),
                });
            }
        }
        if !self.run.online_threshold_hours.is_finite() || self.run.online_threshold_hours < 0.0 {
            return Err(ConfigError::Invalid {
                key: "run.online_threshold_hours",
                reason: format!("{} is not a non-negative number of hours", self.run.online_threshold_hours),
            });
        }
        if self.birdweather.station_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "birdweather.station_id",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Replaces the broker password when `password` is set and non-empty.
    pub fn with_password_override(mut self, password: Option<String>) -> Self {
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            self.mqtt.password = password;
        }
        self
    }

    /// Applies `BWCHECK_MQTT_PASSWORD` from the environment (or `.env`).
    pub fn with_env_overrides(self) -> Self {
        self.with_password_override(std::env::var(MQTT_PASSWORD_ENV).ok())
    }
}

// ---------------------------------------------------------------------------
// Store access
// ---------------------------------------------------------------------------

/// Store path: `BWCHECK_CONFIG` if set, otherwise `bw-check.toml`.
pub fn default_config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Loads the store at `path`, creating the file or appending missing tables
/// with default values first.
pub fn load_or_create(path: &Path) -> Result<RunConfiguration, ConfigError> {
    if !path.exists() {
        log::info!("Creating new config file {} with default settings", path.display());
        append_sections(path, &SECTIONS)?;
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let table: toml::Table = contents.parse().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let missing: Vec<&str> = SECTIONS
        .iter()
        .copied()
        .filter(|section| !table.contains_key(*section))
        .collect();

    if !missing.is_empty() {
        log::info!(
            "Adding section(s) [{}] to config file {}",
            missing.join("], ["),
            path.display()
        );
        append_sections(path, &missing)?;
    }

    let config = RunConfiguration::from_toml(path, &contents)?;
    log::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Renders the named default tables as TOML text.
pub fn default_sections_toml(sections: &[&str]) -> Result<String, ConfigError> {
    let defaults = toml::Value::try_from(RunConfiguration::default())?;

    let mut selected = toml::Table::new();
    for section in sections {
        if let Some(value) = defaults.get(*section) {
            selected.insert((*section).to_string(), value.clone());
        }
    }

    Ok(toml::to_string(&selected)?)
}

fn append_sections(path: &Path, sections: &[&str]) -> Result<(), ConfigError> {
    let text = default_sections_toml(sections)?;
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;

    // Keep appended tables off the last line of existing text.
    let needs_separator = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    if needs_separator {
        file.write_all(b"\n").map_err(write_err)?;
    }
    file.write_all(text.as_bytes()).map_err(write_err)?;
    Ok(())
}
