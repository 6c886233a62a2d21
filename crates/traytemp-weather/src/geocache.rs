//! Persistent zip code → coordinates cache.
//!
//! The cache file doubles as the home of the geocoding API key:
//!
//! ```json
//! {
//!   "zipApiKey": "...",
//!   "60193": { "lat": 42.0123, "lng": -88.0934 }
//! }
//! ```
//!
//! Entries are written once on a lookup miss and never changed afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::geocode::ZipGeocoder;
use crate::types::{GeoPoint, WeatherError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CacheFile {
    #[serde(rename = "zipApiKey", default)]
    api_key: String,
    #[serde(flatten)]
    entries: BTreeMap<String, GeoPoint>,
}

#[derive(Debug)]
pub struct GeoCache {
    path: PathBuf,
    file: CacheFile,
}

impl GeoCache {
    /// Load the cache. The file must exist and carry a non-empty API key.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WeatherError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(WeatherError::CacheMissing(path));
        }

        let contents = std::fs::read_to_string(&path)
            .map_err(|e| WeatherError::CacheCorrupt(format!("{}: {}", path.display(), e)))?;
        let file: CacheFile = serde_json::from_str(&contents)
            .map_err(|e| WeatherError::CacheCorrupt(format!("{}: {}", path.display(), e)))?;

        if file.api_key.trim().is_empty() {
            return Err(WeatherError::MissingApiKey(path));
        }

        tracing::info!(
            "Loaded geocoding cache with {} location(s) from {}",
            file.entries.len(),
            path.display()
        );
        Ok(Self { path, file })
    }

    pub fn api_key(&self) -> &str {
        &self.file.api_key
    }

    pub fn get(&self, zip_code: &str) -> Option<GeoPoint> {
        self.file.entries.get(zip_code).copied()
    }

    pub fn len(&self) -> usize {
        self.file.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.entries.is_empty()
    }

    /// Cached coordinates for `zip_code`, geocoding and persisting on a miss.
    pub async fn lookup(
        &mut self,
        zip_code: &str,
        geocoder: &ZipGeocoder,
    ) -> Result<GeoPoint, WeatherError> {
        if let Some(point) = self.get(zip_code) {
            return Ok(point);
        }

        tracing::info!("Geocoding cache miss for {}", zip_code);
        let point = geocoder.geocode(&self.file.api_key, zip_code).await?;

        self.file.entries.insert(zip_code.to_string(), point);
        if let Err(e) = self.save() {
            // The point is still good for this session
            tracing::warn!("Failed to persist geocoding cache: {}", e);
        }

        Ok(point)
    }

    /// Rewrite the whole cache file via a temporary sibling and rename.
    fn save(&self) -> Result<(), WeatherError> {
        let contents = serde_json::to_string_pretty(&self.file)
            .map_err(|e| WeatherError::CacheCorrupt(e.to_string()))?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &self.path)?;

        tracing::debug!("Saved geocoding cache to {}", self.path.display());
        Ok(())
    }
}
