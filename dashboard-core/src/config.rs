use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::{error::Error, model::City};

pub const DEFAULT_CALLBACK_URL: &str = "http://localhost:3000/callback";

/// Weather upstream settings (API credential).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WeatherSettings {
    pub api_key: Option<String>,
}

/// Identity provider settings. Domain and client id are required before the
/// dashboard can be entered at all; callback URL and audience are optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthSettings {
    pub domain: Option<String>,
    pub client_id: Option<String>,
    pub callback_url: Option<String>,
    pub audience: Option<String>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [weather]
/// api_key = "..."
///
/// [auth]
/// domain = "example.eu.auth0.com"
/// client_id = "..."
///
/// [[cities]]
/// code = "2988507"
/// name = "Paris"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub weather: WeatherSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    /// Fixed dashboard city list. Static configuration data, not editable
    /// from inside the app; adding a city at runtime only affects the
    /// in-memory grid.
    #[serde(default = "default_cities")]
    pub cities: Vec<City>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            weather: WeatherSettings::default(),
            auth: AuthSettings::default(),
            cities: default_cities(),
        }
    }
}

pub fn default_cities() -> Vec<City> {
    [
        ("1248991", "Colombo"),
        ("1850147", "Tokyo"),
        ("2644210", "Liverpool"),
        ("2988507", "Paris"),
        ("2147714", "Sydney"),
        ("4930956", "Boston"),
        ("1796236", "Shanghai"),
        ("3143244", "Oslo"),
    ]
    .into_iter()
    .map(|(code, name)| City::new(code, name))
    .collect()
}

impl Config {
    /// API credential for the weather upstream; absence is fatal to every
    /// weather fetch.
    pub fn weather_api_key(&self) -> Result<&str, Error> {
        self.weather.api_key.as_deref().ok_or(Error::MissingApiKey)
    }

    pub fn set_weather_api_key(&mut self, api_key: String) {
        self.weather.api_key = Some(api_key);
    }

    pub fn callback_url(&self) -> &str {
        self.auth.callback_url.as_deref().unwrap_or(DEFAULT_CALLBACK_URL)
    }

    /// Load config from disk, or return the defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }
}

/// Platform directories shared by config, cache storage and the session file.
pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weather-dashboard", "weather-dash")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
