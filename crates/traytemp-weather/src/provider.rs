//! Hourly forecast client for the National Weather Service API.
//!
//! Two requests per refresh: a points lookup that yields the hourly forecast
//! URL for a coordinate, then the hourly periods themselves.

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::retry::{with_retry, RetryConfig};
use crate::types::{GeoPoint, HourSample, WeatherError};

pub const WEATHER_GOV_URL: &str = "https://api.weather.gov";
const REQUEST_TIMEOUT_SECS: u64 = 20;
const ACCEPT: &str = "application/geo+json";

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointsProperties {
    forecast_hourly: String,
}

#[derive(Debug, Deserialize)]
struct HourlyResponse {
    properties: HourlyProperties,
}

#[derive(Debug, Deserialize)]
struct HourlyProperties {
    periods: Vec<Period>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Period {
    start_time: String,
    temperature: f64,
    is_daytime: bool,
    #[serde(default)]
    probability_of_precipitation: Option<Quantity>,
}

#[derive(Debug, Deserialize)]
struct Quantity {
    value: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ForecastClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl ForecastClient {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(user_agent)
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

    /// Resolve the hourly forecast URL for `point`.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn resolve_endpoint(&self, point: GeoPoint) -> Result<String, WeatherError> {
        let url = format!("{}/points/{:.4},{:.4}", self.base_url, point.lat, point.lng);

        let response = self.get(&url).await?;
        let points: PointsResponse = read_json(response, "points response").await?;

        tracing::debug!("Hourly forecast endpoint: {}", points.properties.forecast_hourly);
        Ok(points.properties.forecast_hourly)
    }

    /// Fetch hourly periods from `url` as samples numbered from the first
    /// period's hour of day.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn fetch_hourly(&self, url: &str) -> Result<Vec<HourSample>, WeatherError> {
        let response = self.get(url).await?;
        let hourly: HourlyResponse = read_json(response, "hourly forecast").await?;

        let samples = periods_to_samples(&hourly.properties.periods)?;
        tracing::info!("Fetched {} hourly forecast periods", samples.len());
        Ok(samples)
    }

    /// Points lookup followed by the hourly fetch.
    pub async fn fetch_forecast(&self, point: GeoPoint) -> Result<Vec<HourSample>, WeatherError> {
        let url = self.resolve_endpoint(point).await?;
        self.fetch_hourly(&url).await
    }

    async fn get(&self, url: &str) -> Result<Response, WeatherError> {
        let response = with_retry(&self.retry, || {
            self.client.get(url).header("Accept", ACCEPT).send()
        })
        .await?;

        if !response.status().is_success() {
            return Err(WeatherError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}

/// Decode a JSON body; decoding failures are data-shape errors.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    what: &str,
) -> Result<T, WeatherError> {
    let body = response
        .text()
        .await
        .map_err(|e| WeatherError::Network(e.without_url()))?;

    serde_json::from_str(&body).map_err(|e| WeatherError::DataShape(format!("{}: {}", what, e)))
}

fn periods_to_samples(periods: &[Period]) -> Result<Vec<HourSample>, WeatherError> {
    let first = periods
        .first()
        .ok_or_else(|| WeatherError::DataShape("hourly forecast has no periods".to_string()))?;
    let start_hour = start_hour(&first.start_time)?;

    Ok(periods
        .iter()
        .zip(start_hour..)
        .map(|(period, hour_index)| HourSample {
            hour_index,
            temperature: period.temperature,
            is_daylight: period.is_daytime,
            precipitation_probability: period
                .probability_of_precipitation
                .as_ref()
                .and_then(|q| q.value),
        })
        .collect())
}

/// Hour of day from an ISO 8601 timestamp like `2026-10-16T14:00:00-05:00`.
/// The local hour is used as-is; the offset is the forecast office's zone.
fn start_hour(start_time: &str) -> Result<i64, WeatherError> {
    start_time
        .get(11..13)
        .and_then(|h| h.parse::<i64>().ok())
        .filter(|h| (0..24).contains(h))
        .ok_or_else(|| WeatherError::DataShape(format!("invalid period startTime {:?}", start_time)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn period(start_time: &str, temperature: f64, pop: Option<f64>) -> Period {
        Period {
            start_time: start_time.to_string(),
            temperature,
            is_daytime: true,
            probability_of_precipitation: Some(Quantity { value: pop }),
        }
    }

    #[test]
    fn test_start_hour_parses_local_hour() {
        assert_eq!(start_hour("2026-10-16T14:00:00-05:00").unwrap(), 14);
        assert_eq!(start_hour("2026-10-16T00:00:00-05:00").unwrap(), 0);
    }

    #[test]
    fn test_start_hour_rejects_garbage() {
        assert!(matches!(start_hour("2026-10-16"), Err(WeatherError::DataShape(_))));
        assert!(start_hour("2026-10-16T25:00:00-05:00").is_err());
        assert!(start_hour("2026-10-16Txx:00:00-05:00").is_err());
    }

    #[test]
    fn test_periods_number_from_first_hour() {
        let periods = vec![
            period("2026-10-16T22:00:00-05:00", 51.0, Some(10.0)),
            period("2026-10-16T23:00:00-05:00", 50.0, None),
            period("2026-10-17T00:00:00-05:00", 49.0, Some(0.0)),
        ];

        let samples = periods_to_samples(&periods).unwrap();

        assert_eq!(
            samples.iter().map(|s| s.hour_index).collect::<Vec<_>>(),
            vec![22, 23, 24]
        );
        assert_eq!(samples[0].precipitation_probability, Some(10.0));
        assert_eq!(samples[1].precipitation_probability, None);
    }

    #[test]
    fn test_empty_periods_is_data_shape_error() {
        assert!(matches!(periods_to_samples(&[]), Err(WeatherError::DataShape(_))));
    }

    #[test]
    fn test_period_without_precipitation_object() {
        let json = serde_json::json!({
            "startTime": "2026-10-16T08:00:00-05:00",
            "temperature": 44,
            "isDaytime": true
        });
        let parsed: Period = serde_json::from_value(json).unwrap();
        assert!(parsed.probability_of_precipitation.is_none());
    }

    #[test]
    fn test_period_missing_temperature_fails() {
        let json = serde_json::json!({
            "startTime": "2026-10-16T08:00:00-05:00",
            "isDaytime": true
        });
        assert!(serde_json::from_value::<Period>(json).is_err());
    }
}
