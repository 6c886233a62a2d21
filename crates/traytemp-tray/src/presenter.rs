//! Shows the current temperature in the tray.
//!
//! The platform tray is behind [`IconSink`]; [`FileIconSink`] hands the icon
//! over as a PNG file that a tray host can watch.

use anyhow::Context;
use chrono::NaiveDateTime;
use image::RgbaImage;
use std::path::{Path, PathBuf};

use traytemp_core::AppError;

use crate::error_mapping::WeatherErrorExt;
use crate::icon;
use crate::service::Snapshot;

/// Destination for rendered tray icons.
pub trait IconSink: Send {
    /// Replace the icon and its tooltip.
    fn show(&mut self, icon: &RgbaImage, tooltip: &str) -> anyhow::Result<()>;

    /// Replace only the tooltip, keeping the current icon.
    fn set_tooltip(&mut self, tooltip: &str) -> anyhow::Result<()>;
}

/// Writes the icon to a PNG file, replacing it atomically.
#[derive(Debug)]
pub struct FileIconSink {
    path: PathBuf,
    tooltip: String,
}

impl FileIconSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tooltip: String::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tooltip(&self) -> &str {
        &self.tooltip
    }
}

impl IconSink for FileIconSink {
    fn show(&mut self, icon: &RgbaImage, tooltip: &str) -> anyhow::Result<()> {
        let bytes = icon::encode_png(icon).context("Failed to encode tray icon")?;

        let tmp_path = self.path.with_extension("png.tmp");
        std::fs::write(&tmp_path, bytes)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        self.set_tooltip(tooltip)
    }

    fn set_tooltip(&mut self, tooltip: &str) -> anyhow::Result<()> {
        if self.tooltip != tooltip {
            tracing::debug!("Tray tooltip: {}", tooltip);
            self.tooltip = tooltip.to_string();
        }
        Ok(())
    }
}

pub struct TrayPresenter<S: IconSink> {
    sink: S,
    last_label: Option<String>,
}

impl<S: IconSink> TrayPresenter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            last_label: None,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Label currently shown on the icon, if any render has succeeded.
    pub fn last_label(&self) -> Option<&str> {
        self.last_label.as_deref()
    }

    /// Render the temperature at `now` from `snapshot`.
    ///
    /// When the snapshot cannot answer for `now` the previous icon stays and
    /// only the tooltip changes to say why.
    pub fn render(&mut self, snapshot: &Snapshot, now: NaiveDateTime) -> Result<f64, AppError> {
        let temperature = match snapshot.current_temperature(now) {
            Ok(t) => t,
            Err(e) => {
                let err = e.into_app_error();
                if snapshot.has_data() {
                    self.sink.set_tooltip(err.user_message())?;
                }
                return Err(err);
            }
        };

        let label = icon::temperature_label(temperature);
        let tooltip = tooltip(&label, snapshot);
        let image = icon::render_icon(temperature).context("Failed to load the icon font")?;
        self.sink.show(&image, &tooltip)?;

        tracing::debug!("Rendered tray icon {}", label);
        self.last_label = Some(label);
        Ok(temperature)
    }
}

fn tooltip(label: &str, snapshot: &Snapshot) -> String {
    match snapshot.fetched_at {
        Some(fetched) => format!("{}°F (updated {})", label, fetched.format("%H:%M")),
        None => format!("{}°F", label),
    }
}
