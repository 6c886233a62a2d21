//! Forecast data for traytemp
//!
//! Geocoding with a persistent zip code cache, the National Weather Service
//! hourly forecast client, and the rolling hourly window the tray and the
//! popup chart read from.

pub mod geocache;
pub mod geocode;
pub mod provider;
pub mod retry;
pub mod series;
pub mod types;

pub use geocache::GeoCache;
pub use geocode::ZipGeocoder;
pub use provider::ForecastClient;
pub use retry::RetryConfig;
pub use series::{weekday_labels, TimeSeriesStore};
pub use types::*;
