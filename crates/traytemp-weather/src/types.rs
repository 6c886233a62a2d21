use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One hour of forecast data.
///
/// `hour_index` is an absolute hour offset from midnight of the day the
/// window is based on, so 30 means 06:00 the following day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourSample {
    pub hour_index: i64,
    pub temperature: f64,
    pub is_daylight: bool,
    pub precipitation_probability: Option<f64>,
}

impl HourSample {
    pub fn new(hour_index: i64, temperature: f64) -> Self {
        Self {
            hour_index,
            temperature,
            is_daylight: true,
            precipitation_probability: None,
        }
    }
}

/// Geographic coordinates as returned by the geocoding provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Weather pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Unexpected provider data: {0}")]
    DataShape(String),

    #[error("Zip code {0} is unknown to the geocoding provider")]
    LocationNotFound(String),

    #[error("Hour {hour} is outside the forecast window ({len} samples from hour {first})")]
    Bounds { hour: f64, first: i64, len: usize },

    #[error("Forecast samples are not contiguous: expected hour {expected}, found {found}")]
    Gap { expected: i64, found: i64 },

    #[error("Geocoding cache not found: {0}")]
    CacheMissing(PathBuf),

    #[error("Geocoding cache is corrupt: {0}")]
    CacheCorrupt(String),

    #[error("Geocoding cache {0} has no zipApiKey")]
    MissingApiKey(PathBuf),

    #[error("Failed to write geocoding cache: {0}")]
    CacheWrite(#[from] std::io::Error),
}

impl WeatherError {
    /// Errors that only cost one refresh cycle. Cache load failures and an
    /// unknown zip code repeat on every refresh until the user steps in.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::CacheMissing(_)
                | Self::CacheCorrupt(_)
                | Self::MissingApiKey(_)
                | Self::LocationNotFound(_)
        )
    }
}
