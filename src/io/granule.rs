//! Validated identifiers parsed from dot-delimited HLS names.
//!
//! A granule ID looks like `HLS.S30.T17SLB.2020273T160941.v2.0`: mission, sensor,
//! MGRS tile, acquisition time (`%Y%jT%H%M%S`) and a two-part version. Band files
//! append the band code and extension, e.g. `HLS.S30.T17SLB.2020273T160941.v2.0.B02.tif`.
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;

const ACQUISITION_FORMAT: &str = "%Y%jT%H%M%S";
const GRANULE_SEGMENTS: usize = 6;

/// Errors raised for malformed granule or band file names
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GranuleIdError {
    #[error("`{id}` has {found} dot-delimited segments, expected at least {expected}")]
    TooFewSegments {
        id: String,
        found: usize,
        expected: usize,
    },
    #[error("`{id}` has an invalid {field}: `{value}`")]
    InvalidSegment {
        id: String,
        field: &'static str,
        value: String,
    },
    #[error("`{id}` has an unparseable acquisition time `{value}`")]
    InvalidAcquisition { id: String, value: String },
}

/// Identity of one granule, derived from its dot-delimited ID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GranuleId {
    pub mission: String,
    pub sensor: String,
    pub tile: String,
    /// Acquisition segment exactly as it appears in the ID
    pub acquisition: String,
    pub acquired: NaiveDateTime,
    pub version: String,
}

fn is_code(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

impl GranuleId {
    /// Parse an ID, or any name that starts with one (band files, descriptors, browse images).
    pub fn parse(name: &str) -> Result<Self, GranuleIdError> {
        let segments: Vec<&str> = name.split('.').collect();
        Self::from_segments(name, &segments)
    }

    fn from_segments(name: &str, segments: &[&str]) -> Result<Self, GranuleIdError> {
        if segments.len() < GRANULE_SEGMENTS {
            return Err(GranuleIdError::TooFewSegments {
                id: name.to_string(),
                found: segments.len(),
                expected: GRANULE_SEGMENTS,
            });
        }
        let invalid = |field: &'static str, value: &str| GranuleIdError::InvalidSegment {
            id: name.to_string(),
            field,
            value: value.to_string(),
        };

        let (mission, sensor, tile, acquisition) =
            (segments[0], segments[1], segments[2], segments[3]);
        if !is_code(mission) {
            return Err(invalid("mission", mission));
        }
        if !is_code(sensor) {
            return Err(invalid("sensor", sensor));
        }
        if tile.len() != 6 || !tile.starts_with('T') || !is_code(tile) {
            return Err(invalid("tile", tile));
        }
        let acquired = NaiveDateTime::parse_from_str(acquisition, ACQUISITION_FORMAT).map_err(
            |_| GranuleIdError::InvalidAcquisition {
                id: name.to_string(),
                value: acquisition.to_string(),
            },
        )?;

        let (major, minor) = (segments[4], segments[5]);
        let major_ok = major
            .strip_prefix('v')
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
        if !major_ok {
            return Err(invalid("version", major));
        }
        if minor.is_empty() || !minor.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("version", minor));
        }

        Ok(GranuleId {
            mission: mission.to_string(),
            sensor: sensor.to_string(),
            tile: tile.to_string(),
            acquisition: acquisition.to_string(),
            acquired,
            version: format!("{}.{}", major, minor),
        })
    }

    /// Folder of this granule below a season directory: `<sensor>/<tile>/<acquisition>`
    pub fn relative_dir(&self) -> PathBuf {
        Path::new(&self.sensor)
            .join(&self.tile)
            .join(&self.acquisition)
    }

    /// File name of the band composite built for this granule
    pub fn composite_file_name(&self) -> String {
        format!("{}_{}.tif", self.tile, self.acquisition)
    }
}

impl fmt::Display for GranuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}",
            self.mission, self.sensor, self.tile, self.acquisition, self.version
        )
    }
}

/// One single-band raster file belonging to a granule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandFile {
    pub granule: GranuleId,
    pub band: String,
    pub extension: String,
}

impl BandFile {
    pub fn parse(name: &str) -> Result<Self, GranuleIdError> {
        let segments: Vec<&str> = name.split('.').collect();
        if segments.len() < GRANULE_SEGMENTS + 2 {
            return Err(GranuleIdError::TooFewSegments {
                id: name.to_string(),
                found: segments.len(),
                expected: GRANULE_SEGMENTS + 2,
            });
        }
        let granule = GranuleId::from_segments(name, &segments)?;
        let band = segments[GRANULE_SEGMENTS];
        if !is_code(band) {
            return Err(GranuleIdError::InvalidSegment {
                id: name.to_string(),
                field: "band",
                value: band.to_string(),
            });
        }
        Ok(BandFile {
            granule,
            band: band.to_string(),
            extension: segments[segments.len() - 1].to_ascii_lowercase(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, GranuleIdError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_granule_ur() {
        let id = GranuleId::parse("HLS.S30.T17SLB.2020273T160941.v2.0").unwrap();
        assert_eq!(id.mission, "HLS");
        assert_eq!(id.sensor, "S30");
        assert_eq!(id.tile, "T17SLB");
        assert_eq!(id.acquisition, "2020273T160941");
        assert_eq!(id.version, "v2.0");
        assert_eq!(id.acquired.ordinal(), 273);
        assert_eq!(id.acquired.year(), 2020);
        assert_eq!(id.acquired.hour(), 16);
        assert_eq!(id.to_string(), "HLS.S30.T17SLB.2020273T160941.v2.0");
    }

    #[test]
    fn derives_folder_and_composite_names() {
        let id = GranuleId::parse("HLS.L30.T18TUL.2021150T153311.v2.0.Fmask.tif").unwrap();
        assert_eq!(id.relative_dir(), Path::new("L30/T18TUL/2021150T153311"));
        assert_eq!(id.composite_file_name(), "T18TUL_2021150T153311.tif");
    }

    #[test]
    fn rejects_short_ids() {
        let err = GranuleId::parse("HLS.S30.T17SLB").unwrap_err();
        assert!(matches!(err, GranuleIdError::TooFewSegments { found: 3, .. }));
    }

    #[test]
    fn rejects_bad_tile_and_date() {
        let err = GranuleId::parse("HLS.S30.17SLB.2020273T160941.v2.0").unwrap_err();
        assert!(matches!(err, GranuleIdError::InvalidSegment { field: "tile", .. }));

        let err = GranuleId::parse("HLS.S30.T17SLB.2020999T160941.v2.0").unwrap_err();
        assert!(matches!(err, GranuleIdError::InvalidAcquisition { .. }));

        let err = GranuleId::parse("HLS.S30.T17SLB.2020273T160941.2.0").unwrap_err();
        assert!(matches!(err, GranuleIdError::InvalidSegment { field: "version", .. }));
    }

    #[test]
    fn parses_band_file() {
        let bf = BandFile::parse("HLS.S30.T17SLB.2020273T160941.v2.0.B8A.TIF").unwrap();
        assert_eq!(bf.band, "B8A");
        assert_eq!(bf.extension, "tif");
        assert_eq!(bf.granule.tile, "T17SLB");

        assert!(BandFile::parse("HLS.S30.T17SLB.2020273T160941.v2.0.jpg").is_err());
    }
}
