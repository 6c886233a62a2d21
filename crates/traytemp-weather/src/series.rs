//! Rolling hourly forecast window.
//!
//! `TimeSeriesStore` keeps one sample per hour, sorted and without gaps,
//! indexed from midnight of the current day. Merges are computed on a copy
//! and only committed when the result is still contiguous.

use chrono::{Datelike, NaiveDate, Timelike};

use crate::types::{HourSample, WeatherError};

pub const HOURS_PER_DAY: i64 = 24;

/// Days shown in the popup chart
pub const WINDOW_DAYS: i64 = 7;

/// A week plus one day of slack for forecasts that start late in the day
pub const MAX_SAMPLES: usize = ((WINDOW_DAYS + 1) * HOURS_PER_DAY) as usize;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesStore {
    samples: Vec<HourSample>,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a single fetch.
    pub fn from_samples(samples: &[HourSample]) -> Result<Self, WeatherError> {
        Self::new().merged(samples)
    }

    /// Merge `incoming` into the store in place.
    ///
    /// Samples with a known `hour_index` overwrite the stored fields, new ones
    /// are inserted in order. On error the store is left untouched.
    pub fn merge(&mut self, incoming: &[HourSample]) -> Result<(), WeatherError> {
        if incoming.is_empty() {
            return Ok(());
        }
        *self = self.merged(incoming)?;
        Ok(())
    }

    /// Same as [`merge`](Self::merge) but returns the merged store and leaves
    /// `self` as it was.
    pub fn merged(&self, incoming: &[HourSample]) -> Result<Self, WeatherError> {
        let mut samples = self.samples.clone();

        for sample in incoming {
            match samples.binary_search_by_key(&sample.hour_index, |s| s.hour_index) {
                Ok(pos) => samples[pos] = *sample,
                Err(pos) => samples.insert(pos, *sample),
            }
        }

        if let Some(pair) = samples
            .windows(2)
            .find(|w| w[1].hour_index != w[0].hour_index + 1)
        {
            return Err(WeatherError::Gap {
                expected: pair[0].hour_index + 1,
                found: pair[1].hour_index,
            });
        }

        if samples.len() > MAX_SAMPLES {
            tracing::debug!(
                "Dropping {} forecast hours past the window",
                samples.len() - MAX_SAMPLES
            );
            samples.truncate(MAX_SAMPLES);
        }

        Ok(Self { samples })
    }

    /// Age the window by one calendar day.
    pub fn advance_day(&mut self) {
        self.advance_days(1);
    }

    /// Drop the hours of `days` past calendar days and rebase the rest so
    /// that index 0 is midnight of the new current day.
    pub fn advance_days(&mut self, days: i64) {
        if days <= 0 {
            return;
        }

        let cutoff = days * HOURS_PER_DAY;
        let stale = self.samples.partition_point(|s| s.hour_index < cutoff);
        self.samples.drain(..stale);

        for sample in &mut self.samples {
            sample.hour_index -= cutoff;
        }

        tracing::debug!(
            "Advanced forecast window by {} day(s), dropped {} hour(s)",
            days,
            stale
        );
    }

    /// Temperature at wall-clock time `now`, interpolated between the
    /// surrounding hourly samples by minute.
    pub fn current_temperature<T: Timelike>(&self, now: &T) -> Result<f64, WeatherError> {
        let first = self.first_hour_index().ok_or_else(|| self.bounds(now.hour() as f64))?;
        let offset = now.hour() as i64 - first;
        let frac = now.minute() as f64 / 60.0;

        if offset < 0 {
            return Err(self.bounds(now.hour() as f64 + frac));
        }

        self.interpolate(offset as f64 + frac)
    }

    /// Temperature at a fractional hour index. Hours before the start of the
    /// window read as the first sample.
    pub fn temperature_at(&self, continuous_hour: f64) -> Result<f64, WeatherError> {
        let first = self
            .first_hour_index()
            .ok_or_else(|| self.bounds(continuous_hour))?;
        let hour = continuous_hour.max(first as f64);

        self.interpolate(hour - first as f64)
    }

    /// Linear blend at `offset` hours past the first sample. Both neighbours
    /// must exist, including at whole hours.
    fn interpolate(&self, offset: f64) -> Result<f64, WeatherError> {
        let first = self.first_hour_index().unwrap_or_default();
        // Checked before the cast, which saturates
        let last_offset = self.samples.len().saturating_sub(1) as f64;
        if !offset.is_finite() || offset < 0.0 || offset >= last_offset {
            return Err(self.bounds(first as f64 + offset));
        }

        let idx = offset.floor() as usize;
        let frac = offset - offset.floor();

        match (self.samples.get(idx), self.samples.get(idx + 1)) {
            (Some(a), Some(b)) => Ok((1.0 - frac) * a.temperature + frac * b.temperature),
            _ => Err(self.bounds(first as f64 + offset)),
        }
    }

    fn bounds(&self, hour: f64) -> WeatherError {
        WeatherError::Bounds {
            hour,
            first: self.first_hour_index().unwrap_or_default(),
            len: self.samples.len(),
        }
    }

    pub fn samples(&self) -> &[HourSample] {
        &self.samples
    }

    pub fn get(&self, hour_index: i64) -> Option<&HourSample> {
        let first = self.first_hour_index()?;
        usize::try_from(hour_index - first)
            .ok()
            .and_then(|i| self.samples.get(i))
    }

    pub fn first_hour_index(&self) -> Option<i64> {
        self.samples.first().map(|s| s.hour_index)
    }

    pub fn last_hour_index(&self) -> Option<i64> {
        self.samples.last().map(|s| s.hour_index)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn hours(&self) -> Vec<i64> {
        self.samples.iter().map(|s| s.hour_index).collect()
    }

    pub fn temperatures(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.temperature).collect()
    }

    pub fn daylight(&self) -> Vec<bool> {
        self.samples.iter().map(|s| s.is_daylight).collect()
    }

    pub fn precipitation(&self) -> Vec<Option<f64>> {
        self.samples
            .iter()
            .map(|s| s.precipitation_probability)
            .collect()
    }
}

/// Short day names starting with `today`.
pub fn weekday_labels(today: NaiveDate) -> [&'static str; 7] {
    let start = today.weekday().num_days_from_sunday() as usize;
    std::array::from_fn(|i| WEEKDAYS[(start + i) % 7])
}
