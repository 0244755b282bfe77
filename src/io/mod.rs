//! I/O layer: HLS name parsing, granule descriptor extraction, the seasonal
//! metadata table, GDAL-backed raster reading and GeoTIFF `writers`.
pub mod granule;
pub use granule::{BandFile, GranuleId, GranuleIdError};

pub mod descriptor;
pub use descriptor::{DescriptorError, GranuleRecord};

pub mod table;
pub use table::MetadataTable;

pub mod gdal;
pub use gdal::{GdalRasterReader, Raster, RasterError, RasterHeader, RasterMetadata};

pub mod writers;
