//! Application configuration management.
//!
//! Handles loading, saving, and validating ringrule configuration including:
//! - Timezone used to evaluate time rules
//! - Default ringer mode when no rule applies
//! - Geofence hysteresis and sample staleness
//! - Override toggles (emergency contacts, spam detection) and forced modes
//! - Suggestion advisor tuning
//!
//! Configuration is layered with the `config` crate: an optional TOML file,
//! then `RINGRULE__SECTION__KEY` environment variables. Missing keys fall back
//! to the serde defaults below.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RingerMode;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "RINGRULE";

/// Errors raised while loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be written.
    #[error("failed to write {path}: {source}")]
    WriteError {
        /// File path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The layered sources could not be merged or deserialized.
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// The configuration could not be serialized to TOML.
    #[error("failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A single field holds an invalid value.
    #[error("{field}: {message}")]
    ValidationError {
        /// Dotted field path, e.g. `geofence.hysteresis_ratio`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields hold invalid values.
    #[error("{} validation errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RingruleConfig {
    /// Timezone, storage and network settings.
    pub system: SystemConfig,
    /// Resolver settings.
    pub engine: EngineConfig,
    /// Geofence tracking settings.
    pub geofence: GeofenceConfig,
    /// Override flag settings.
    pub overrides: OverrideConfig,
    /// Suggestion advisor settings.
    pub advisor: AdvisorConfig,
}

/// System-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// IANA timezone in which time rules are evaluated.
    #[serde(with = "timezone_serde")]
    pub timezone: Tz,
    /// Directory for persisted rules, overrides and history.
    pub data_dir: Option<PathBuf>,
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            data_dir: None,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}

/// Resolver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Mode used when no rule or override applies.
    pub default_mode: RingerMode,
}

/// Geofence tracking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    /// Hysteresis margin as a fraction of each rule's radius.
    pub hysteresis_ratio: f64,
    /// Samples older than this many seconds are ignored.
    pub staleness_secs: u64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            hysteresis_ratio: 0.10,
            staleness_secs: 120,
        }
    }
}

impl GeofenceConfig {
    /// Staleness window as a duration.
    #[must_use]
    pub fn staleness(&self) -> Duration {
        Duration::seconds(i64::try_from(self.staleness_secs).unwrap_or(i64::MAX / 1000))
    }
}

/// Override flag settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideConfig {
    /// Let calls from emergency contacts override everything.
    pub emergency_enabled: bool,
    /// Mode forced while an emergency contact is calling.
    pub emergency_mode: RingerMode,
    /// Silence calls flagged as suspected spam.
    pub spam_enabled: bool,
    /// Mode forced while a suspected spam call is active.
    pub spam_mode: RingerMode,
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            emergency_enabled: true,
            emergency_mode: RingerMode::Normal,
            spam_enabled: true,
            spam_mode: RingerMode::Silent,
        }
    }
}

/// Suggestion advisor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Record user choices for learning.
    pub learning_enabled: bool,
    /// Surface suggestions to the user.
    pub suggestions_enabled: bool,
    /// Observations further apart than this (minute of day) do not match.
    pub time_window_minutes: u16,
    /// Positions within this distance count as the same place.
    pub cluster_radius_m: f64,
    /// Minimum matching observations before suggesting anything.
    pub min_support: usize,
    /// Oldest observations are dropped beyond this count.
    pub max_history: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            learning_enabled: true,
            suggestions_enabled: true,
            time_window_minutes: 90,
            cluster_radius_m: 150.0,
            min_support: 3,
            max_history: 500,
        }
    }
}

impl RingruleConfig {
    /// Load configuration from `path` (if it exists) layered under environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the sources cannot be parsed or the result fails
    /// validation.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location.
    ///
    /// # Errors
    ///
    /// See [`RingruleConfig::load`].
    pub fn load_default() -> ConfigResult<Self> {
        let path = Self::default_path();
        Self::load(path.as_deref())
    }

    /// Save configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be serialized or written.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.display().to_string(),
            source,
        })
    }

    /// Check every field, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns a single [`ConfigError::ValidationError`] or
    /// [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        let ratio = self.geofence.hysteresis_ratio;
        if !ratio.is_finite() || !(0.0..1.0).contains(&ratio) {
            errors.push(invalid(
                "geofence.hysteresis_ratio",
                "must be at least 0 and less than 1",
            ));
        }
        if self.geofence.staleness_secs == 0 {
            errors.push(invalid("geofence.staleness_secs", "must be greater than 0"));
        }
        let window = self.advisor.time_window_minutes;
        if window == 0 || window > 12 * 60 {
            errors.push(invalid(
                "advisor.time_window_minutes",
                "must be between 1 and 720",
            ));
        }
        if !self.advisor.cluster_radius_m.is_finite() || self.advisor.cluster_radius_m <= 0.0 {
            errors.push(invalid("advisor.cluster_radius_m", "must be greater than 0"));
        }
        if self.advisor.min_support == 0 {
            errors.push(invalid("advisor.min_support", "must be at least 1"));
        }
        if self.advisor.max_history == 0 {
            errors.push(invalid("advisor.max_history", "must be at least 1"));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// Directory for persisted data, falling back to the platform default.
    #[must_use]
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.system
            .data_dir
            .clone()
            .or_else(crate::storage::default_data_dir)
    }

    /// Default configuration file path.
    ///
    /// `RINGRULE_CONFIG` wins; otherwise the platform config directory
    /// (e.g. `~/.config/ringrule/config.toml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("RINGRULE_CONFIG") {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("", "", "ringrule")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Check whether a string names a known IANA timezone.
#[must_use]
pub fn is_valid_timezone(name: &str) -> bool {
    name.parse::<Tz>().is_ok()
}

mod timezone_serde {
    use chrono_tz::Tz;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Tz, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
