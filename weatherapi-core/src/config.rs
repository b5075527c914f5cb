use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::coordinator::{CoordinatorConfig, DEFAULT_UPDATE_INTERVAL};

/// Stored host configuration, one location per file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Display name for the location.
    pub name: String,
    pub update_interval_minutes: u64,
    /// Fetch daily and hourly forecasts alongside current conditions.
    pub forecast: bool,
    /// Drop hourly forecast entries that are already in the past.
    pub ignore_past_hour: bool,
    /// Fallback IANA zone when the vendor omits one; UTC when unset.
    pub time_zone: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            name: "Home".to_string(),
            update_interval_minutes: DEFAULT_UPDATE_INTERVAL.as_secs() / 60,
            forecast: true,
            ignore_past_hour: true,
            time_zone: None,
        }
    }
}

impl Config {
    /// The vendor query string for the stored coordinates.
    pub fn location_query(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }

    /// Validate the stored entry and turn it into coordinator settings.
    pub fn coordinator_config(&self) -> Result<CoordinatorConfig> {
        if self.api_key.is_empty() {
            return Err(anyhow!(
                "No API key configured.\n\
                 Hint: run `weatherapi configure` first."
            ));
        }

        if self.update_interval_minutes == 0 {
            return Err(anyhow!("update_interval_minutes must be greater than zero"));
        }

        let interval_secs = self
            .update_interval_minutes
            .checked_mul(60)
            .ok_or_else(|| anyhow!("update_interval_minutes is too large"))?;

        let time_zone = match &self.time_zone {
            Some(zone) => zone.parse::<Tz>().map_err(|_| {
                anyhow!(
                    "Unknown time zone {zone:?} in config.\n\
                     Hint: use an IANA name such as \"Europe/Paris\"."
                )
            })?,
            None => Tz::UTC,
        };

        let mut config = CoordinatorConfig::new(
            self.api_key.clone(),
            self.location_query(),
            self.name.clone(),
        );
        config.update_interval = Duration::from_secs(interval_secs);
        config.forecast = self.forecast;
        config.ignore_past_forecast = self.ignore_past_hour;
        config.time_zone = time_zone;

        Ok(config)
    }

    /// Load config from disk, or return the defaults if none exists yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherapi", "weatherapi-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
