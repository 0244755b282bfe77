use gdal::DriverManager;
use gdal::Metadata;
use gdal::raster::{Buffer, GdalType};
use std::path::Path;
use tracing::debug;

use crate::io::gdal::{Raster, RasterError};
use crate::io::writers::metadata::embed_tiff_metadata;
use crate::types::PixelType;

fn to_int(v: f64) -> f64 {
    v.round()
}

fn write_typed<T: GdalType + Copy>(
    output: &Path,
    raster: &Raster,
    convert: fn(f64) -> T,
) -> Result<(), RasterError> {
    let (cols, rows) = (raster.width(), raster.height());
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut ds = driver.create_with_band_type::<T, _>(output, cols, rows, raster.band_count())?;
    embed_tiff_metadata(&mut ds, raster)?;

    for (i, data) in raster.bands.iter().enumerate() {
        let mut band = ds.rasterband(i + 1)?;
        if let Some(nd) = raster.nodata {
            band.set_no_data_value(Some(nd))?;
        }
        if let Some(label) = raster.descriptions.get(i).filter(|d| !d.is_empty()) {
            band.set_description(label)?;
        }
        let values: Vec<T> = data.iter().map(|&v| convert(v)).collect();
        let mut buf = Buffer::new((cols, rows), values);
        band.write((0, 0), (cols, rows), &mut buf)?;
    }
    Ok(())
}

/// Write a raster as GeoTIFF in its recorded pixel type. Float samples are cast to
/// integer types by rounding and saturating.
pub fn write_tiff(output: &Path, raster: &Raster) -> Result<(), RasterError> {
    if raster.bands.is_empty() {
        return Err(RasterError::UnsupportedFormat(format!(
            "Refusing to write {:?} without bands",
            output
        )));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            RasterError::UnsupportedFormat(format!("cannot create {:?}: {}", parent, e))
        })?;
    }
    match raster.pixel_type {
        PixelType::U8 => write_typed::<u8>(output, raster, |v| to_int(v) as u8),
        PixelType::I16 => write_typed::<i16>(output, raster, |v| to_int(v) as i16),
        PixelType::U16 => write_typed::<u16>(output, raster, |v| to_int(v) as u16),
        PixelType::I32 => write_typed::<i32>(output, raster, |v| to_int(v) as i32),
        PixelType::U32 => write_typed::<u32>(output, raster, |v| to_int(v) as u32),
        PixelType::F32 => write_typed::<f32>(output, raster, |v| v as f32),
        PixelType::F64 => write_typed::<f64>(output, raster, |v| v),
    }?;
    debug!(
        "write_tiff: {:?} {} bands {:?} {}",
        output,
        raster.band_count(),
        raster.pixel_type,
        raster.grid
    );
    Ok(())
}
