use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::processing::merge::merge_files;
use crate::core::processing::reproject::reproject_rasters;
use crate::error::Result;
use crate::io::gdal::{GdalRasterReader, Raster, RasterError};
use crate::types::{MergeMethod, Resampling};

/// Mosaic tile composites into one raster.
///
/// All inputs are reprojected (bilinear) into the CRS of the first input inside a
/// scratch directory next to `output`, then merged with `first`-wins blending where
/// overlapping samples are read through `resampling`. The scratch directory and its
/// reprojected copies are removed on every exit path, including failures.
pub fn mosaic_rasters(inputs: &[PathBuf], output: &Path, resampling: Resampling) -> Result<Raster> {
    if inputs.is_empty() {
        return Err(RasterError::NoInputs.into());
    }
    let out_folder = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(out_folder)?;

    // Only the projection is needed; the handle closes at the end of the statement
    let crs = GdalRasterReader::open(&inputs[0])?.metadata.projection;
    if crs.trim().is_empty() {
        return Err(RasterError::MissingCrs(inputs[0].display().to_string()).into());
    }

    let scratch = tempfile::Builder::new()
        .prefix("reproject_")
        .tempdir_in(out_folder)?;
    let reprojected = reproject_rasters(inputs, &crs, scratch.path(), Resampling::Bilinear)?;
    let mosaic = merge_files(&reprojected, output, MergeMethod::First, resampling)?;
    scratch.close()?;

    info!(
        "{:?} generated from {} rasters ({}x{}, {} bands)",
        output,
        inputs.len(),
        mosaic.width(),
        mosaic.height(),
        mosaic.band_count()
    );
    Ok(mosaic)
}
