//! Maps forecast pipeline errors to `traytemp_core::AppError` so the tray can
//! show a consistent tooltip and the binary can tell fatal from transient.

use traytemp_core::{AppError, ConfigError, NetworkError, ReqwestErrorExt, WeatherError};
use traytemp_weather::WeatherError as PipelineError;

pub trait WeatherErrorExt {
    fn into_app_error(self) -> AppError;
}

impl WeatherErrorExt for PipelineError {
    fn into_app_error(self) -> AppError {
        match self {
            PipelineError::Network(e) => AppError::Network(e.into_network_error()),
            PipelineError::Status { status, url } => AppError::Network(NetworkError::ServerError {
                status,
                message: url,
            }),
            PipelineError::DataShape(msg) => AppError::Weather(WeatherError::DataShape(msg)),
            PipelineError::LocationNotFound(zip) => {
                AppError::Weather(WeatherError::LocationNotFound(zip))
            }
            e @ PipelineError::Bounds { .. } => {
                AppError::Weather(WeatherError::OutOfRange(e.to_string()))
            }
            e @ PipelineError::Gap { .. } => AppError::Weather(WeatherError::DataShape(e.to_string())),
            PipelineError::CacheMissing(path) => {
                AppError::Config(ConfigError::NotFound(path.display().to_string()))
            }
            PipelineError::CacheCorrupt(msg) => AppError::Config(ConfigError::ParseError(msg)),
            PipelineError::MissingApiKey(path) => AppError::Config(ConfigError::MissingSetting(
                format!("zipApiKey in {}", path.display()),
            )),
            PipelineError::CacheWrite(e) => AppError::Weather(WeatherError::CacheError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_cache_missing_is_fatal_config_error() {
        let err = PipelineError::CacheMissing(PathBuf::from("geocache.json")).into_app_error();
        assert!(err.is_fatal());
        assert!(matches!(err, AppError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_missing_api_key_is_fatal_missing_setting() {
        let err = PipelineError::MissingApiKey(PathBuf::from("geocache.json")).into_app_error();
        assert!(err.is_fatal());
        match err {
            AppError::Config(ConfigError::MissingSetting(setting)) => {
                assert_eq!(setting, "zipApiKey in geocache.json")
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unknown_zip_maps_to_location_not_found() {
        let err = PipelineError::LocationNotFound("00000".into()).into_app_error();
        assert!(!err.is_fatal());
        assert!(matches!(
            err,
            AppError::Weather(WeatherError::LocationNotFound(ref zip)) if zip == "00000"
        ));
        assert_eq!(err.user_message(), "Zip code could not be located.");
    }

    #[test]
    fn test_status_maps_to_server_error() {
        let err = PipelineError::Status {
            status: 503,
            url: "https://api.weather.gov/points/1,2".into(),
        }
        .into_app_error();
        assert!(!err.is_fatal());
        assert!(matches!(
            err,
            AppError::Network(NetworkError::ServerError { status: 503, .. })
        ));
    }

    #[test]
    fn test_bounds_maps_to_out_of_range() {
        let err = PipelineError::Bounds {
            hour: 200.0,
            first: 0,
            len: 150,
        }
        .into_app_error();
        assert!(matches!(err, AppError::Weather(WeatherError::OutOfRange(_))));
        assert_eq!(err.user_message(), "Forecast is out of date.");
    }
}
