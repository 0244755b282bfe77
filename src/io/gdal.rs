use gdal::raster::GdalDataType;
use gdal::{Dataset, Metadata, errors::GdalError as GdalCrateError};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::core::grid::{GeoTransform, Grid};
use crate::types::PixelType;

/// Errors encountered when reading, combining or writing rasters
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
    #[error("Grid mismatch in {path}: expected {expected}, found {found}")]
    GridMismatch {
        path: String,
        expected: String,
        found: String,
    },
    #[error("CRS mismatch in {path}: inputs must share one coordinate reference system")]
    CrsMismatch { path: String },
    #[error("Band count mismatch in {path}: expected {expected}, found {found}")]
    BandCountMismatch {
        path: String,
        expected: usize,
        found: usize,
    },
    #[error("Band {band} of {path} is labelled `{found}`, expected `{expected}`")]
    BandLabelMismatch {
        path: String,
        band: usize,
        expected: String,
        found: String,
    },
    #[error("{files} input files but {labels} band labels")]
    LabelCountMismatch { files: usize, labels: usize },
    #[error("No input rasters given")]
    NoInputs,
    #[error("Raster {0} has no usable spatial reference")]
    MissingCrs(String),
    #[error("Geotransform of {0} is not invertible")]
    SingularTransform(String),
}

/// An in-memory raster: band grids in `f64` plus georeferencing.
///
/// Bands are `(height, width)` arrays. `pixel_type` records the on-disk sample type
/// so writers can convert back without changing the dataset's dtype.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub bands: Vec<Array2<f64>>,
    pub grid: Grid,
    /// Coordinate reference system as WKT (empty when unknown)
    pub crs: String,
    pub nodata: Option<f64>,
    /// Per-band descriptions, same length as `bands`
    pub descriptions: Vec<String>,
    pub pixel_type: PixelType,
    /// Dataset-level metadata items written to the default domain
    pub metadata: BTreeMap<String, String>,
}

impl Raster {
    pub fn new(
        grid: Grid,
        crs: impl Into<String>,
        pixel_type: PixelType,
        nodata: Option<f64>,
        bands: Vec<Array2<f64>>,
    ) -> Result<Self, RasterError> {
        for band in &bands {
            let (rows, cols) = band.dim();
            if rows != grid.height || cols != grid.width {
                return Err(RasterError::DimensionMismatch(
                    grid.width,
                    grid.height,
                    cols,
                    rows,
                ));
            }
        }
        let descriptions = vec![String::new(); bands.len()];
        Ok(Raster {
            bands,
            grid,
            crs: crs.into(),
            nodata,
            descriptions,
            pixel_type,
            metadata: BTreeMap::new(),
        })
    }

    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Value used for pixels no input covers
    pub fn fill_value(&self) -> f64 {
        self.nodata.unwrap_or(0.0)
    }

    pub fn header(&self) -> RasterHeader {
        RasterHeader {
            grid: self.grid,
            crs: self.crs.clone(),
            band_count: self.band_count(),
            descriptions: self.descriptions.clone(),
            nodata: self.nodata,
            pixel_type: self.pixel_type,
        }
    }

    /// Read every band of a GDAL dataset into memory. The dataset handle is
    /// released before returning.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        GdalRasterReader::open(path)?.read_all()
    }
}

pub(crate) fn is_valid(v: f64, nodata: Option<f64>) -> bool {
    match nodata {
        Some(nd) if nd.is_nan() => !v.is_nan(),
        Some(nd) => v != nd && !v.is_nan(),
        None => !v.is_nan(),
    }
}

/// Shape, georeferencing and band labels of a raster, known without reading pixels
#[derive(Debug, Clone, PartialEq)]
pub struct RasterHeader {
    pub grid: Grid,
    pub crs: String,
    pub band_count: usize,
    pub descriptions: Vec<String>,
    pub nodata: Option<f64>,
    pub pixel_type: PixelType,
}

/// Metadata extracted from a GDAL-supported dataset
#[derive(Debug, Clone)]
pub struct RasterMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection in WKT format
    pub projection: String,
    /// Nodata value of the first band
    pub nodata: Option<f64>,
    pub pixel_type: PixelType,
    /// Additional metadata key-value pairs
    pub metadata: BTreeMap<String, String>,
}

/// Reader for GeoTIFF (or any GDAL raster) inputs
pub struct GdalRasterReader {
    pub dataset: Dataset,
    pub metadata: RasterMetadata,
}

// Helper to extract EPSG code from WKT authority tag
pub fn parse_epsg(wkt: &str) -> Option<String> {
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    if let Some(idx) = wkt.rfind(KEY) {
        let start = idx + KEY.len();
        if let Some(end) = wkt[start..].find('"') {
            let code = &wkt[start..start + end];
            return Some(format!("EPSG:{}", code));
        }
    }
    None
}

fn pixel_type_of(t: GdalDataType) -> PixelType {
    match t {
        GdalDataType::UInt8 => PixelType::U8,
        GdalDataType::Int16 => PixelType::I16,
        GdalDataType::UInt16 => PixelType::U16,
        GdalDataType::Int32 => PixelType::I32,
        GdalDataType::UInt32 => PixelType::U32,
        GdalDataType::Float32 => PixelType::F32,
        _ => PixelType::F64,
    }
}

impl GdalRasterReader {
    /// Open a GDAL-supported dataset (e.g., GeoTIFF)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(RasterError::UnsupportedFormat(format!(
                "No raster bands found in {:?}",
                path.as_ref()
            )));
        }
        let geotransform = match dataset.geo_transform() {
            Ok(gt) => gt,
            Err(_) => [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        let projection = dataset.projection();
        let first = dataset.rasterband(1)?;
        let nodata = first.no_data_value();
        let pixel_type = pixel_type_of(first.band_type());
        // Collect metadata entries (domain "")
        let mut metadata_map = BTreeMap::new();
        if let Some(entries) = dataset.metadata_domain("") {
            for entry in entries {
                if let Some((key, val)) = entry.split_once('=') {
                    metadata_map.insert(key.to_string(), val.to_string());
                }
            }
        }
        debug!(
            "Opened {:?}: {}x{}x{} {:?} crs={}",
            path.as_ref(),
            size_x,
            size_y,
            bands,
            pixel_type,
            parse_epsg(&projection).unwrap_or_else(|| "custom".to_string())
        );
        Ok(GdalRasterReader {
            dataset,
            metadata: RasterMetadata {
                size_x,
                size_y,
                bands,
                geotransform,
                projection,
                nodata,
                pixel_type,
                metadata: metadata_map,
            },
        })
    }

    pub fn grid(&self) -> Grid {
        Grid::new(
            self.metadata.size_x,
            self.metadata.size_y,
            GeoTransform(self.metadata.geotransform),
        )
    }

    /// Read a single band (1-based index) as an f64 ndarray of shape (height, width)
    pub fn read_band(&self, index: usize) -> Result<Array2<f64>, RasterError> {
        if index == 0 || index > self.metadata.bands {
            return Err(RasterError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        let band = self.dataset.rasterband(index)?;
        let window = (self.metadata.size_x, self.metadata.size_y);
        let buf = band.read_as::<f64>((0, 0), window, window, None)?;
        let data_vec = buf.data().to_vec();
        let array = Array2::from_shape_vec((self.metadata.size_y, self.metadata.size_x), data_vec)
            .map_err(|_| {
                RasterError::DimensionMismatch(
                    self.metadata.size_x,
                    self.metadata.size_y,
                    self.metadata.size_x,
                    self.metadata.size_y,
                )
            })?;
        Ok(array)
    }

    /// Description (label) of a band, empty when unset
    pub fn band_description(&self, index: usize) -> Result<String, RasterError> {
        let band = self.dataset.rasterband(index)?;
        Ok(band.description().unwrap_or_default())
    }

    /// Header of the dataset; only band descriptions are queried, no pixels
    pub fn header(&self) -> Result<RasterHeader, RasterError> {
        let mut descriptions = Vec::with_capacity(self.metadata.bands);
        for idx in 1..=self.metadata.bands {
            descriptions.push(self.band_description(idx)?);
        }
        Ok(RasterHeader {
            grid: self.grid(),
            crs: self.metadata.projection.clone(),
            band_count: self.metadata.bands,
            descriptions,
            nodata: self.metadata.nodata,
            pixel_type: self.metadata.pixel_type,
        })
    }

    /// Read all bands with their descriptions, consuming the reader
    pub fn read_all(self) -> Result<Raster, RasterError> {
        let mut bands = Vec::with_capacity(self.metadata.bands);
        let mut descriptions = Vec::with_capacity(self.metadata.bands);
        for idx in 1..=self.metadata.bands {
            bands.push(self.read_band(idx)?);
            descriptions.push(self.band_description(idx)?);
        }
        let mut raster = Raster::new(
            self.grid(),
            self.metadata.projection.clone(),
            self.metadata.pixel_type,
            self.metadata.nodata,
            bands,
        )?;
        raster.descriptions = descriptions;
        raster.metadata = self.metadata.metadata.clone();
        Ok(raster)
    }
}
