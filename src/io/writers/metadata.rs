use gdal::Dataset;
use gdal::Metadata;
use gdal::spatial_ref::SpatialRef;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::io::gdal::{Raster, RasterError};

/// Provenance fields recorded on every raster this crate writes
pub fn provenance_fields(operation: &str, sources: &[PathBuf]) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("PROCESSING_TOOL".to_string(), "hlsmosaic".to_string());
    metadata.insert(
        "PROCESSING_VERSION".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    metadata.insert(
        "PROCESSING_TIMESTAMP".to_string(),
        chrono::Utc::now().to_rfc3339(),
    );
    metadata.insert("OPERATION".to_string(), operation.to_string());
    metadata.insert("SOURCE_COUNT".to_string(), sources.len().to_string());
    let names: Vec<String> = sources
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    if !names.is_empty() {
        metadata.insert("SOURCES".to_string(), names.join(","));
    }
    metadata
}

/// Embed georeferencing and metadata items of `raster` into a GeoTIFF dataset
pub fn embed_tiff_metadata(ds: &mut Dataset, raster: &Raster) -> Result<(), RasterError> {
    ds.set_geo_transform(&raster.grid.transform.0)?;
    // Accepts WKT as read from GDAL as well as `EPSG:n` style definitions
    if !raster.crs.trim().is_empty() {
        let srs = SpatialRef::from_definition(&raster.crs)?;
        ds.set_spatial_ref(&srs)?;
    }
    for (key, value) in &raster.metadata {
        ds.set_metadata_item(key, value, "")?;
    }
    Ok(())
}
