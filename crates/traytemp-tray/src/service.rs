//! Forecast refresh service.
//!
//! `RefreshScheduler` owns the network side of the applet and publishes
//! immutable [`Snapshot`]s through a `watch` channel. Readers (the icon render
//! loop, the popup chart) only ever see whole snapshots.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::sync::Arc;
use tokio::sync::watch;

use traytemp_weather::series::HOURS_PER_DAY;
use traytemp_weather::{
    weekday_labels, ForecastClient, GeoCache, HourSample, TimeSeriesStore, WeatherError,
    ZipGeocoder,
};

use crate::error_mapping::WeatherErrorExt;

/// One published view of the forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Hourly window; index 0 is midnight of `date`
    pub series: TimeSeriesStore,
    /// Weekday labels starting at `date`
    pub weekdays: [&'static str; 7],
    /// Local date the window is anchored to
    pub date: NaiveDate,
    /// When the data was fetched, `None` before the first successful refresh
    pub fetched_at: Option<NaiveDateTime>,
}

impl Snapshot {
    pub fn empty(today: NaiveDate) -> Self {
        Self {
            series: TimeSeriesStore::new(),
            weekdays: weekday_labels(today),
            date: today,
            fetched_at: None,
        }
    }

    pub fn has_data(&self) -> bool {
        !self.series.is_empty()
    }

    /// Whole days between the snapshot's anchor date and `today`.
    pub fn day_offset(&self, today: NaiveDate) -> i64 {
        (today - self.date).num_days().max(0)
    }

    /// Position of `now` on this snapshot's hour axis.
    pub fn chart_hour(&self, now: NaiveDateTime) -> f64 {
        let offset = self.day_offset(now.date()) * HOURS_PER_DAY;
        (offset + now.hour() as i64) as f64 + now.minute() as f64 / 60.0
    }

    /// Temperature at `now`. A snapshot from an earlier day is read at the
    /// matching later hour of its window.
    pub fn current_temperature(&self, now: NaiveDateTime) -> Result<f64, WeatherError> {
        if self.day_offset(now.date()) == 0 {
            return self.series.current_temperature(&now.time());
        }

        let hour = self.chart_hour(now);
        match self.series.first_hour_index() {
            Some(first) if hour >= first as f64 => self.series.temperature_at(hour),
            first => Err(WeatherError::Bounds {
                hour,
                first: first.unwrap_or_default(),
                len: self.series.len(),
            }),
        }
    }
}

pub type SnapshotReceiver = watch::Receiver<Arc<Snapshot>>;

#[derive(Debug)]
pub struct RefreshScheduler {
    zip_code: String,
    geocache: GeoCache,
    geocoder: ZipGeocoder,
    forecast: ForecastClient,
    last_refresh_date: Option<NaiveDate>,
    publisher: watch::Sender<Arc<Snapshot>>,
}

impl RefreshScheduler {
    /// Create the scheduler with an empty snapshot anchored at `today`.
    pub fn new(
        zip_code: impl Into<String>,
        geocache: GeoCache,
        geocoder: ZipGeocoder,
        forecast: ForecastClient,
        today: NaiveDate,
    ) -> (Self, SnapshotReceiver) {
        let (publisher, receiver) = watch::channel(Arc::new(Snapshot::empty(today)));

        let scheduler = Self {
            zip_code: zip_code.into(),
            geocache,
            geocoder,
            forecast,
            last_refresh_date: None,
            publisher,
        };
        (scheduler, receiver)
    }

    pub fn subscribe(&self) -> SnapshotReceiver {
        self.publisher.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.publisher.borrow().clone()
    }

    pub fn last_refresh_date(&self) -> Option<NaiveDate> {
        self.last_refresh_date
    }

    pub fn zip_code(&self) -> &str {
        &self.zip_code
    }

    /// Fetch, reconcile and publish. On error nothing is published and the
    /// last refresh date stays as it was.
    #[tracing::instrument(skip(self), fields(zip = %self.zip_code))]
    pub async fn refresh(&mut self, now: NaiveDateTime) -> Result<Arc<Snapshot>, WeatherError> {
        let point = self.geocache.lookup(&self.zip_code, &self.geocoder).await?;
        let mut samples = self.forecast.fetch_forecast(point).await?;
        align_to_today(&mut samples, now);

        let today = now.date();
        let series = self.reconcile(today, &samples)?;

        let snapshot = Arc::new(Snapshot {
            series,
            weekdays: weekday_labels(today),
            date: today,
            fetched_at: Some(now),
        });

        self.publisher.send_replace(snapshot.clone());
        self.last_refresh_date = Some(today);

        tracing::info!(
            "Published forecast: {} hours from index {}",
            snapshot.series.len(),
            snapshot.series.first_hour_index().unwrap_or_default()
        );
        Ok(snapshot)
    }

    /// Periodic refresh. Failures are logged and the previous snapshot stays
    /// published.
    pub async fn tick(&mut self, now: NaiveDateTime) -> Option<Arc<Snapshot>> {
        match self.refresh(now).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) if e.is_recoverable() => {
                tracing::warn!("No forecast update this cycle: {}", e);
                None
            }
            Err(e) => {
                let app_error = e.into_app_error();
                tracing::error!(
                    "Forecast refresh failed ({}): {}",
                    app_error.user_message(),
                    app_error
                );
                None
            }
        }
    }

    /// Age the last published window to `today` and merge the fetch into it.
    /// A window that no longer lines up with the fetch is replaced by it.
    fn reconcile(
        &self,
        today: NaiveDate,
        samples: &[HourSample],
    ) -> Result<TimeSeriesStore, WeatherError> {
        let mut series = self.snapshot().series.clone();

        if let Some(last) = self.last_refresh_date {
            series.advance_days((today - last).num_days());
        }

        match series.merged(samples) {
            Ok(merged) => Ok(merged),
            Err(WeatherError::Gap { expected, found }) => {
                tracing::warn!(
                    "Forecast does not line up with the stored window (expected hour {}, got {}); replacing it",
                    expected,
                    found
                );
                TimeSeriesStore::from_samples(samples)
            }
            Err(e) => Err(e),
        }
    }
}

/// Hours are numbered from the first period's hour of day. Just after
/// midnight the provider may still lead with the previous evening, which
/// would otherwise be numbered as this evening.
fn align_to_today(samples: &mut [HourSample], now: NaiveDateTime) {
    let Some(first) = samples.first().map(|s| s.hour_index) else {
        return;
    };
    if first > now.hour() as i64 + HOURS_PER_DAY / 2 {
        tracing::debug!("Forecast starts yesterday at {}:00, renumbering", first);
        for sample in samples.iter_mut() {
            sample.hour_index -= HOURS_PER_DAY;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
        date.and_hms_opt(hour, minute, 0).unwrap()
    }

    fn snapshot(date: NaiveDate, first: i64, temps: &[f64]) -> Snapshot {
        let samples: Vec<HourSample> = temps
            .iter()
            .zip(first..)
            .map(|(t, h)| HourSample::new(h, *t))
            .collect();
        Snapshot {
            series: TimeSeriesStore::from_samples(&samples).unwrap(),
            weekdays: weekday_labels(date),
            date,
            fetched_at: Some(at(date, first as u32, 0)),
        }
    }

    #[test]
    fn test_empty_snapshot_has_no_data() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let snap = Snapshot::empty(today);
        assert!(!snap.has_data());
        assert_eq!(snap.weekdays[0], "Fri");
        assert!(snap.current_temperature(at(today, 12, 0)).is_err());
    }

    #[test]
    fn test_current_temperature_same_day() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let snap = snapshot(today, 10, &[40.0, 44.0, 46.0]);
        assert_eq!(snap.current_temperature(at(today, 10, 30)).unwrap(), 42.0);
    }

    #[test]
    fn test_current_temperature_reads_stale_snapshot_at_offset() {
        let yesterday = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let today = yesterday.succ_opt().unwrap();
        // Hours 22..=27 of yesterday's window; 01:00 today is index 25
        let snap = snapshot(yesterday, 22, &[50.0, 49.0, 48.0, 47.0, 46.0, 45.0]);

        assert_eq!(snap.day_offset(today), 1);
        assert_eq!(snap.chart_hour(at(today, 1, 30)), 25.5);
        assert_eq!(snap.current_temperature(at(today, 1, 30)).unwrap(), 46.5);
    }

    #[test]
    fn test_align_renumbers_forecast_starting_yesterday() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let mut samples = vec![
            HourSample::new(23, 50.0),
            HourSample::new(24, 49.0),
            HourSample::new(25, 48.0),
        ];

        align_to_today(&mut samples, at(today, 0, 10));

        assert_eq!(samples[0].hour_index, -1);
        let store = TimeSeriesStore::from_samples(&samples).unwrap();
        assert_eq!(store.current_temperature(&at(today, 0, 0).time()).unwrap(), 49.0);
    }

    #[test]
    fn test_align_keeps_forecast_starting_now() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let mut samples = vec![HourSample::new(22, 50.0), HourSample::new(23, 49.0)];

        align_to_today(&mut samples, at(today, 22, 40));

        assert_eq!(samples[0].hour_index, 22);
    }

    #[test]
    fn test_stale_snapshot_past_end_is_bounds() {
        let yesterday = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let today = yesterday.succ_opt().unwrap();
        let snap = snapshot(yesterday, 10, &[40.0, 41.0]);

        assert!(matches!(
            snap.current_temperature(at(today, 10, 0)),
            Err(WeatherError::Bounds { .. })
        ));
    }
}
