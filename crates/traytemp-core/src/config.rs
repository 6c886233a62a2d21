use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Prefix for environment overrides, e.g. `TRAYTEMP__WEATHER__ZIP_CODE`.
const ENV_PREFIX: &str = "TRAYTEMP";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding config.toml, the geocoding cache and the icon.
    /// Always the directory the config file was loaded from.
    #[serde(skip)]
    pub config_dir: PathBuf,

    /// Forecast location and refresh settings
    pub weather: WeatherConfig,

    /// Tray icon and popup settings
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// US zip code of the forecast location
    pub zip_code: String,

    /// Refresh interval in minutes
    pub refresh_minutes: u32,

    /// Geocoding cache file, relative to `config_dir` unless absolute.
    /// Must exist and hold the `zipApiKey` entry.
    pub geocache_file: PathBuf,

    /// Base URL of the zip code geocoding API
    pub geocode_base_url: String,

    /// Base URL of the forecast API
    pub forecast_base_url: String,

    /// User-Agent sent to the forecast API
    pub user_agent: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            zip_code: "60193".to_string(),
            refresh_minutes: 30,
            geocache_file: PathBuf::from("geocache.json"),
            geocode_base_url: "https://www.zipcodeapi.com/rest".to_string(),
            forecast_base_url: "https://api.weather.gov".to_string(),
            user_agent: format!("traytemp/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// How often the tray icon is re-rendered, independent of fetches
    pub icon_refresh_seconds: u64,

    /// Rendered icon file, relative to `config_dir` unless absolute
    pub icon_file: PathBuf,

    /// Popup chart width in pixels
    pub chart_width: u32,

    /// Popup chart height in pixels
    pub chart_height: u32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            icon_refresh_seconds: 60,
            icon_file: PathBuf::from("icon.png"),
            chart_width: 640,
            chart_height: 320,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("traytemp");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing defaults there first when the
    /// file does not exist. Environment variables override file values.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::default().save_to(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(
                // Values stay strings so zip codes keep their leading zeros;
                // numeric fields parse them on deserialize
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to read config file")?;

        let mut config: Config = settings
            .try_deserialize()
            .context("Failed to parse config file")?;

        if let Some(parent) = path.parent() {
            config.config_dir = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load configuration from the default location and validate it
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::load_validated_from(&Self::config_path()?)
    }

    /// Load configuration from `path` and validate it. Validation failures
    /// are reported as [`ConfigError::Invalid`].
    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult)> {
        let config = Self::load_from(path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        let zip = &self.weather.zip_code;
        if zip.len() != 5 || !zip.chars().all(|c| c.is_ascii_digit()) {
            result.add_error(
                "weather.zip_code",
                format!("Zip code must be five digits, got: {:?}", zip),
            );
        }

        if self.weather.refresh_minutes == 0 {
            result.add_error(
                "weather.refresh_minutes",
                "Refresh interval must be greater than 0",
            );
        } else if self.weather.refresh_minutes > 1440 {
            result.add_warning(
                "weather.refresh_minutes",
                "Refresh interval is more than 24 hours; day rollover will lag",
            );
        }

        self.validate_url(
            &self.weather.geocode_base_url,
            "weather.geocode_base_url",
            &mut result,
        );
        self.validate_url(
            &self.weather.forecast_base_url,
            "weather.forecast_base_url",
            &mut result,
        );

        if self.weather.user_agent.trim().is_empty() {
            result.add_warning(
                "weather.user_agent",
                "Empty User-Agent; the forecast API may reject requests",
            );
        }

        if self.ui.icon_refresh_seconds == 0 {
            result.add_error(
                "ui.icon_refresh_seconds",
                "Icon refresh interval must be greater than 0",
            );
        }

        if self.ui.chart_width == 0 || self.ui.chart_height == 0 {
            result.add_error("ui.chart_width", "Chart dimensions must be greater than 0");
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Absolute path of the geocoding cache file
    pub fn geocache_path(&self) -> PathBuf {
        self.resolve(&self.weather.geocache_file)
    }

    /// Absolute path of the rendered tray icon
    pub fn icon_path(&self) -> PathBuf {
        self.resolve(&self.ui.icon_file)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("traytemp");

        Ok(config_dir.join("config.toml"))
    }
}
