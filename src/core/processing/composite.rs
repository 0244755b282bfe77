use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::processing::reproject::same_crs;
use crate::error::Result;
use crate::io::gdal::{Raster, RasterError};
use crate::io::writers::metadata::provenance_fields;
use crate::io::writers::tiff::write_tiff;

/// Stack the first band of each input into one multi-band GeoTIFF.
///
/// Band `i` of the output is band 1 of `inputs[i]` and carries `labels[i]` as its
/// description. Georeferencing, nodata and pixel type come from the first input;
/// every other input must sit on the same grid and CRS or the call fails with
/// [`RasterError::GridMismatch`] / [`RasterError::CrsMismatch`] before anything is written.
pub fn composite_bands(inputs: &[PathBuf], output: &Path, labels: &[String]) -> Result<Raster> {
    if inputs.is_empty() {
        return Err(RasterError::NoInputs.into());
    }
    if inputs.len() != labels.len() {
        return Err(RasterError::LabelCountMismatch {
            files: inputs.len(),
            labels: labels.len(),
        }
        .into());
    }

    let first = Raster::open(&inputs[0])?;
    let mut bands = Vec::with_capacity(inputs.len());
    for (idx, path) in inputs.iter().enumerate() {
        let src = if idx == 0 {
            first.clone()
        } else {
            Raster::open(path)?
        };
        if !src.grid.aligned_with(&first.grid) {
            return Err(RasterError::GridMismatch {
                path: path.display().to_string(),
                expected: first.grid.to_string(),
                found: src.grid.to_string(),
            }
            .into());
        }
        if !same_crs(&first.crs, &src.crs) {
            return Err(RasterError::CrsMismatch {
                path: path.display().to_string(),
            }
            .into());
        }
        let Some(band) = src.bands.into_iter().next() else {
            return Err(RasterError::NoInputs.into());
        };
        bands.push(band);
    }

    let mut composite = Raster::new(
        first.grid,
        first.crs.clone(),
        first.pixel_type,
        first.nodata,
        bands,
    )?;
    composite.descriptions = labels.to_vec();
    composite.metadata = provenance_fields("composite", inputs);
    composite
        .metadata
        .insert("BANDS".to_string(), labels.join(","));

    write_tiff(output, &composite)?;
    info!(
        "Output file {:?} created with {} bands",
        output.file_name().unwrap_or_default(),
        composite.band_count()
    );
    Ok(composite)
}
