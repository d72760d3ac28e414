//! Application configuration

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;
use tracing::warn;

use crate::errors::FleetMapError;

/// User agent of the official mobile client, which the feed expects
pub const DEFAULT_USER_AGENT: &str = "App/2 CFNetwork/3857.100.1 Darwin/25.0.0";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub output: OutputConfig,
    pub map: MapConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Feed endpoint and credentials
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub token: String,
    pub device_id: String,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub timeout: Duration,
    pub user_agent: String,
    /// Skip TLS certificate verification for the feed endpoint
    pub accept_invalid_certs: bool,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub map_path: PathBuf,
    pub log_path: PathBuf,
    /// Page reload interval written into the map
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub refresh_interval: Duration,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MapConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub max_zoom: u8,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RunConfig {
    /// Poll continuously at this interval instead of running once
    #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
    #[serde(default)]
    pub interval: Option<Duration>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("feed.timeout", 15)?
            .set_default("feed.user_agent", DEFAULT_USER_AGENT)?
            .set_default("feed.accept_invalid_certs", false)?
            .set_default("output.map_path", "kragujevac_busevi.html")?
            .set_default("output.log_path", "flota.json")?
            .set_default("output.refresh_interval", 1800)?
            .set_default("map.center_lat", 44.0141)?
            .set_default("map.center_lon", 20.9116)?
            .set_default("map.zoom", 13)?
            .set_default("map.max_zoom", 21)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("BUSMAP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            // Variable names used by existing deployments
            .set_override_option("feed.url", env::var("API_URL").ok())?
            .set_override_option("feed.token", env::var("AUTH_TOKEN").ok())?
            .set_override_option("feed.device_id", env::var("DEVICE_ID").ok())?
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), FleetMapError> {
        self.feed.validate()?;
        self.output.validate()?;
        self.run.validate()?;
        Ok(())
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<(), FleetMapError> {
        for (name, value) in [
            ("feed.url", &self.url),
            ("feed.token", &self.token),
            ("feed.device_id", &self.device_id),
        ] {
            if value.trim().is_empty() {
                return Err(FleetMapError::ConfigurationError {
                    message: format!("{} must be set", name),
                });
            }
        }
        if self.timeout.is_zero() {
            return Err(FleetMapError::ConfigurationError {
                message: "Feed timeout must be greater than zero".to_string(),
            });
        }
        if self.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for the feed");
        }
        Ok(())
    }
}

impl OutputConfig {
    pub fn validate(&self) -> Result<(), FleetMapError> {
        for path in [&self.map_path, &self.log_path] {
            Self::validate_path(path)?;
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                Self::ensure_directory_exists(dir)?;
            }
        }
        if self.refresh_interval.is_zero() {
            return Err(FleetMapError::ConfigurationError {
                message: "Refresh interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    fn validate_path(path: &Path) -> Result<(), FleetMapError> {
        if path.as_os_str().is_empty() {
            return Err(FleetMapError::ConfigurationError {
                message: "Output path cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    fn ensure_directory_exists(dir: &Path) -> Result<(), FleetMapError> {
        if !dir.exists() {
            warn!(
                "Output directory {} does not exist, attempting to create it",
                dir.display()
            );
            std::fs::create_dir_all(dir).map_err(|e| FleetMapError::ConfigurationError {
                message: format!("Could not create output directory: {}", e),
            })?;
        }
        Ok(())
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), FleetMapError> {
        if self.interval.is_some_and(|interval| interval.is_zero()) {
            return Err(FleetMapError::ConfigurationError {
                message: "Poll interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
