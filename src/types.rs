//! Shared types and enums used across hlsmosaic.
//! Includes the tile-merge `Reducer`, the internal `MergeMethod`, resampling
//! kernels (`Resampling`), on-disk `PixelType` and the orchestrator `Pass`.
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Pixel reducer used when merging the same tile across acquisition dates.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Reducer {
    Min,
    Max,
}

impl FromStr for Reducer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Ok(Reducer::Min),
            "max" => Ok(Reducer::Max),
            _ => Err(Error::UnsupportedReducer(s.to_string())),
        }
    }
}

impl TryFrom<String> for Reducer {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Reducer> for String {
    fn from(value: Reducer) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Reducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reducer::Min => write!(f, "min"),
            Reducer::Max => write!(f, "max"),
        }
    }
}

/// How overlapping pixels are resolved by the merge engine.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MergeMethod {
    /// Keep the value of the first input that covers the pixel
    First,
    /// Overwrite with every later input that covers the pixel
    Last,
    Min,
    Max,
}

impl From<Reducer> for MergeMethod {
    fn from(value: Reducer) -> Self {
        match value {
            Reducer::Min => MergeMethod::Min,
            Reducer::Max => MergeMethod::Max,
        }
    }
}

impl std::fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MergeMethod::First => "first",
            MergeMethod::Last => "last",
            MergeMethod::Min => "min",
            MergeMethod::Max => "max",
        };
        write!(f, "{}", s)
    }
}

/// Resampling kernel applied when sampling a source grid at arbitrary positions.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Resampling {
    Nearest,
    #[default]
    Bilinear,
    Cubic,
}

impl FromStr for Resampling {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" | "near" => Ok(Resampling::Nearest),
            "bilinear" => Ok(Resampling::Bilinear),
            "cubic" => Ok(Resampling::Cubic),
            _ => Err(Error::UnsupportedResampling(s.to_string())),
        }
    }
}

impl TryFrom<String> for Resampling {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resampling> for String {
    fn from(value: Resampling) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Resampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resampling::Nearest => write!(f, "nearest"),
            Resampling::Bilinear => write!(f, "bilinear"),
            Resampling::Cubic => write!(f, "cubic"),
        }
    }
}

/// Sample type of a raster on disk. Pixels are processed as `f64` in memory and
/// converted back to this type on write.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum PixelType {
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    #[default]
    F64,
}

/// The three orchestrator passes.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum Pass {
    /// Organize raw files and build the seasonal metadata table
    Organize,
    /// Stack single-band rasters into per-granule composites
    Composite,
    /// Merge composites per tile and mosaic the tiles
    Mosaic,
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::Organize => write!(f, "organize"),
            Pass::Composite => write!(f, "composite"),
            Pass::Mosaic => write!(f, "mosaic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reducer_parses_known_names() {
        assert_eq!("min".parse::<Reducer>().unwrap(), Reducer::Min);
        assert_eq!(" MAX ".parse::<Reducer>().unwrap(), Reducer::Max);
    }

    #[test]
    fn unknown_reducer_is_an_explicit_error() {
        let err = "mean".parse::<Reducer>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedReducer(ref s) if s == "mean"));
    }

    #[test]
    fn reducer_rejected_during_deserialization() {
        let parsed: Result<Reducer, _> = serde_json::from_str("\"median\"");
        assert!(parsed.is_err());
        let ok: Reducer = serde_json::from_str("\"max\"").unwrap();
        assert_eq!(ok, Reducer::Max);
    }

    #[test]
    fn resampling_round_trips_through_strings() {
        for r in [Resampling::Nearest, Resampling::Bilinear, Resampling::Cubic] {
            assert_eq!(r.to_string().parse::<Resampling>().unwrap(), r);
        }
        assert!("lanczos".parse::<Resampling>().is_err());
    }
}
