use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

use crate::api::spaceapi::{SpaceApiBuilder, DEFAULT_SENSOR_URL, DEFAULT_STATUS_URL};

pub const DEFAULT_CONFIG_FILE: &str = "./hms_spacestatus.toml";
pub const SPACEAPI_KEY_ENV: &str = "HMS_SPACEAPI_KEY";

/// Persisted flag location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSection {
    pub file: String,
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            file: "/var/haum/status".to_string(),
        }
    }
}

/// Message bus connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSection {
    /// `mqtt://host:port/prefix`; the path is the topic prefix.
    pub url: String,
    /// A random suffix is appended at connect time.
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            url: "mqtt://localhost:1883/haum".to_string(),
            client_id: "hms_spacestatus".to_string(),
            keep_alive_secs: 30,
        }
    }
}

impl BusSection {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceApiSection {
    pub enabled: bool,
    pub status_url: String,
    pub sensor_url: String,
    pub key: String,
    pub timeout_secs: u64,
}

impl Default for SpaceApiSection {
    fn default() -> Self {
        Self {
            enabled: true,
            status_url: DEFAULT_STATUS_URL.to_string(),
            sensor_url: DEFAULT_SENSOR_URL.to_string(),
            key: String::new(),
            timeout_secs: 10,
        }
    }
}

impl SpaceApiSection {
    pub fn builder(&self) -> SpaceApiBuilder {
        SpaceApiBuilder::new()
            .with_status_url(&self.status_url)
            .with_sensor_url(&self.sensor_url)
            .with_key(&self.key)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceStatusConfig {
    pub status: StatusSection,
    pub bus: BusSection,
    pub spaceapi: SpaceApiSection,
    /// `en_us` or `fr_fr`; the environment decides when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl SpaceStatusConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid configuration")
    }

    /// Read configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read configuration file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Cannot load configuration file {}", path.display()))
    }

    /// Load `path`, or the default file when present, or built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(std::env::var(SPACEAPI_KEY_ENV).ok());
        Ok(config)
    }

    /// Secrets from the environment win over the file.
    pub fn apply_env(&mut self, spaceapi_key: Option<String>) {
        if let Some(key) = spaceapi_key.filter(|k| !k.is_empty()) {
            self.spaceapi.key = key;
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Cannot serialize configuration")
    }
}
