//! Zip code geocoding via zipcodeapi.com.
//! Requires an API key, which lives in the geocoding cache file.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::provider::read_json;
use crate::retry::{with_retry, RetryConfig};
use crate::types::{GeoPoint, WeatherError};

pub const ZIPCODEAPI_URL: &str = "https://www.zipcodeapi.com/rest";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct ZipInfoResponse {
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ZipGeocoder {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl ZipGeocoder {
    pub fn new(base_url: &str) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Look up the coordinates of `zip_code`.
    #[tracing::instrument(skip(self, api_key), level = "info")]
    pub async fn geocode(&self, api_key: &str, zip_code: &str) -> Result<GeoPoint, WeatherError> {
        let url = format!(
            "{}/{}/info.json/{}/degrees",
            self.base_url, api_key, zip_code
        );

        let response = with_retry(&self.retry, || self.client.get(&url).send()).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(WeatherError::LocationNotFound(zip_code.to_string()));
        }

        if !response.status().is_success() {
            // The key is part of the path; keep it out of errors
            return Err(WeatherError::Status {
                status: response.status().as_u16(),
                url: format!("{}/.../info.json/{}/degrees", self.base_url, zip_code),
            });
        }

        let body: ZipInfoResponse = read_json(response, "geocoding response").await?;

        match (body.lat, body.lng) {
            (Some(lat), Some(lng)) => {
                tracing::info!("Geocoded {} to {:.4}, {:.4}", zip_code, lat, lng);
                Ok(GeoPoint { lat, lng })
            }
            _ => Err(WeatherError::DataShape(format!(
                "geocoding response for {} is missing lat/lng",
                zip_code
            ))),
        }
    }
}
