//! Popup chart model.
//!
//! `ChartView` turns a [`Snapshot`] into plain geometry in chart coordinates
//! (x in hours from midnight of the snapshot date, y in degrees or percent).
//! It holds the interactive state of the popup: the visible day and the
//! click read-out.

use chrono::NaiveDateTime;
use std::sync::Arc;

use traytemp_weather::series::{HOURS_PER_DAY, WINDOW_DAYS};
use traytemp_weather::WeatherError;

use crate::icon::temperature_label;
use crate::service::Snapshot;

pub const WEEK_HOURS: f64 = (WINDOW_DAYS * HOURS_PER_DAY) as f64;
pub const Y_MIN: f64 = 0.0;
pub const Y_MAX: f64 = 100.0;
pub const FREEZING_F: f64 = 32.0;

const TICK_STEP_HOURS: i64 = 3;
const DAY_LABEL_Y: f64 = 90.0;
/// Labels sit this many degrees above the point they describe
const LABEL_OFFSET: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One hour `[start, end)` shaded as day or night.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub start: f64,
    pub end: f64,
    pub daylight: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// A highlighted point with its rounded temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub point: Point,
    pub label: Label,
}

impl Marker {
    fn at(x: f64, temperature: f64) -> Self {
        Self {
            point: Point { x, y: temperature },
            label: Label {
                x,
                y: temperature + LABEL_OFFSET,
                text: temperature_label(temperature),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChartView {
    snapshot: Arc<Snapshot>,
    now: NaiveDateTime,
    day: usize,
    readout: Option<Marker>,
    last_click_hour: Option<i64>,
}

impl ChartView {
    /// A view of `snapshot` at `now`, showing the first day.
    pub fn new(snapshot: Arc<Snapshot>, now: NaiveDateTime) -> Self {
        Self {
            snapshot,
            now,
            day: 0,
            readout: None,
            last_click_hour: None,
        }
    }

    /// Swap in fresh data, keeping the visible day and the read-out state.
    pub fn update(&mut self, snapshot: Arc<Snapshot>, now: NaiveDateTime) {
        self.snapshot = snapshot;
        self.now = now;
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn day(&self) -> usize {
        self.day
    }

    /// Show day `day` (0 is the snapshot date). Days past the window are
    /// clamped to the last one.
    pub fn choose_day(&mut self, day: usize) -> (f64, f64) {
        self.day = day.min(WINDOW_DAYS as usize - 1);
        self.visible_range()
    }

    pub fn visible_range(&self) -> (f64, f64) {
        let start = (self.day as i64 * HOURS_PER_DAY) as f64;
        (start, start + HOURS_PER_DAY as f64)
    }

    pub fn temperature_line(&self) -> Vec<Point> {
        self.snapshot
            .series
            .samples()
            .iter()
            .map(|s| Point {
                x: s.hour_index as f64,
                y: s.temperature,
            })
            .collect()
    }

    /// Precipitation chance in percent, one run per stretch of hours that
    /// carry a value. A missing hour ends the run.
    pub fn precipitation_lines(&self) -> Vec<Vec<Point>> {
        let mut lines = Vec::new();
        let mut current = Vec::new();
        for s in self.snapshot.series.samples() {
            match s.precipitation_probability {
                Some(p) => current.push(Point {
                    x: s.hour_index as f64,
                    y: p,
                }),
                None if !current.is_empty() => lines.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    pub fn daylight_regions(&self) -> Vec<Region> {
        self.snapshot
            .series
            .samples()
            .iter()
            .map(|s| Region {
                start: s.hour_index as f64,
                end: (s.hour_index + 1) as f64,
                daylight: s.is_daylight,
            })
            .collect()
    }

    pub fn freezing_line(&self) -> [Point; 2] {
        [
            Point {
                x: 0.0,
                y: FREEZING_F,
            },
            Point {
                x: WEEK_HOURS,
                y: FREEZING_F,
            },
        ]
    }

    /// x positions of the midnight separators, both window edges included.
    pub fn day_separators(&self) -> Vec<f64> {
        (0..=WINDOW_DAYS)
            .map(|d| (d * HOURS_PER_DAY) as f64)
            .collect()
    }

    /// Weekday names centred on each day.
    pub fn day_labels(&self) -> Vec<Label> {
        self.snapshot
            .weekdays
            .iter()
            .zip(0i64..)
            .map(|(name, d)| Label {
                x: (d * HOURS_PER_DAY + HOURS_PER_DAY / 2) as f64,
                y: DAY_LABEL_Y,
                text: (*name).to_string(),
            })
            .collect()
    }

    /// Hour-of-day ticks every three hours across the week.
    pub fn x_ticks(&self) -> Vec<(f64, String)> {
        (0..WINDOW_DAYS * HOURS_PER_DAY)
            .step_by(TICK_STEP_HOURS as usize)
            .map(|h| (h as f64, hour_label(h % HOURS_PER_DAY)))
            .collect()
    }

    /// The current temperature at the current time, if the data covers it.
    pub fn current_marker(&self) -> Option<Marker> {
        let temperature = self.snapshot.current_temperature(self.now).ok()?;
        Some(Marker::at(self.snapshot.chart_hour(self.now), temperature))
    }

    pub fn readout(&self) -> Option<&Marker> {
        self.readout.as_ref()
    }

    /// Handle a click at chart position `x`.
    ///
    /// Clicking the same whole hour twice in a row hides the read-out; any
    /// other click moves it to the interpolated temperature at `x`. Returns
    /// the read-out now visible.
    pub fn click(&mut self, x: f64) -> Result<Option<&Marker>, WeatherError> {
        let x = (x * 1000.0).round() / 1000.0;
        let first = self.snapshot.series.first_hour_index().unwrap_or_default();
        let time = x.max(first as f64);
        let temperature = self.snapshot.series.temperature_at(time)?;

        let hour = time.floor() as i64;
        if self.readout.is_some() && self.last_click_hour == Some(hour) {
            self.readout = None;
            self.last_click_hour = None;
        } else {
            self.readout = Some(Marker::at(time, temperature));
            self.last_click_hour = Some(hour);
        }

        Ok(self.readout.as_ref())
    }
}

/// `12am`, `1am`, .. `11pm` for an hour of day.
pub fn hour_label(hour: i64) -> String {
    let hour = hour.rem_euclid(HOURS_PER_DAY);
    let twelve = (hour + 11) % 12 + 1;
    let suffix = if hour >= 12 { "pm" } else { "am" };
    format!("{}{}", twelve, suffix)
}
