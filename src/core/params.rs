use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Reducer, Resampling};

const LANDSAT_BANDS: [&str; 6] = ["B02", "B03", "B04", "B05", "B06", "B07"];
const SENTINEL_BANDS: [&str; 10] = [
    "B02", "B03", "B04", "B05", "B06", "B07", "B08", "B8A", "B11", "B12",
];

/// Pipeline configuration suitable for JSON config files.
///
/// Missing fields fall back to the defaults (four seasons, L30 and S30 with their
/// bands of interest, `min` tile reducer, bilinear mosaic blending).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Folder holding one subfolder per season
    pub root_dir: PathBuf,
    pub seasons: Vec<String>,
    pub sensors: Vec<String>,
    /// Band codes composited for each sensor, in output band order
    pub bands_by_sensor: BTreeMap<String, Vec<String>>,
    pub reducer: Reducer,
    pub mosaic_resampling: Resampling,
    /// Keep going after a failed unit instead of returning the first error
    pub continue_on_error: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut bands_by_sensor = BTreeMap::new();
        bands_by_sensor.insert(
            "L30".to_string(),
            LANDSAT_BANDS.iter().map(|b| b.to_string()).collect(),
        );
        bands_by_sensor.insert(
            "S30".to_string(),
            SENTINEL_BANDS.iter().map(|b| b.to_string()).collect(),
        );
        Self {
            root_dir: PathBuf::from("data/RMF_HLS"),
            seasons: ["fall", "spring", "summer", "winter"]
                .map(String::from)
                .to_vec(),
            sensors: vec!["L30".to_string(), "S30".to_string()],
            bands_by_sensor,
            reducer: Reducer::Min,
            mosaic_resampling: Resampling::Bilinear,
            continue_on_error: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Bands of interest for a sensor; empty for sensors without a band list
    pub fn bands_for(&self, sensor: &str) -> &[String] {
        self.bands_by_sensor
            .get(sensor)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn season_dir(&self, season: &str) -> PathBuf {
        self.root_dir.join(season)
    }

    pub fn sensor_dir(&self, season: &str, sensor: &str) -> PathBuf {
        self.season_dir(season).join(sensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults_cover_both_sensors() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.bands_for("L30").len(), 6);
        assert_eq!(cfg.bands_for("S30").len(), 10);
        assert_eq!(cfg.bands_for("S30")[7], "B8A");
        assert!(cfg.bands_for("X99").is_empty());
        assert_eq!(cfg.seasons, ["fall", "spring", "summer", "winter"]);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = PipelineConfig::from_json_str(
            r#"{"root_dir": "/data/hls", "seasons": ["summer"], "reducer": "max"}"#,
        )
        .unwrap();
        assert_eq!(cfg.root_dir, PathBuf::from("/data/hls"));
        assert_eq!(cfg.seasons, ["summer"]);
        assert_eq!(cfg.reducer, Reducer::Max);
        assert_eq!(cfg.sensors, ["L30", "S30"]);
        assert_eq!(cfg.sensor_dir("summer", "S30"), PathBuf::from("/data/hls/summer/S30"));
    }

    #[test]
    fn unknown_reducer_in_config_is_rejected() {
        let err = PipelineConfig::from_json_str(r#"{"reducer": "mean"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("mean"));
    }
}
