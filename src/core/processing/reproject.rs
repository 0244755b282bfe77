//! Raster reprojection by inverse mapping.
//!
//! The destination grid keeps the source's pixel dimensions and spans the source
//! footprint expressed in the target CRS. Every destination pixel centre is mapped
//! back into the source CRS with a GDAL coordinate transform and sampled with the
//! requested kernel; centres that fall outside the source receive the fill value.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use ndarray::Array2;
use tracing::{debug, info};

use crate::core::grid::{Bounds, GeoTransform, Grid};
use crate::core::processing::resample::sample;
use crate::error::{Error, Result};
use crate::io::gdal::{Raster, RasterError, parse_epsg};
use crate::io::writers::metadata::provenance_fields;
use crate::io::writers::tiff::write_tiff;
use crate::types::Resampling;

const EDGE_SAMPLES: usize = 21;

fn spatial_ref(definition: &str) -> std::result::Result<SpatialRef, RasterError> {
    let mut srs = SpatialRef::from_definition(definition)?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

/// Whether two CRS definitions (WKT or `EPSG:n`) describe the same system
pub fn same_crs(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    if a.trim().is_empty() || b.trim().is_empty() {
        return false;
    }
    match (SpatialRef::from_definition(a), SpatialRef::from_definition(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

/// Transform points in place; points GDAL cannot transform become NaN.
fn transform_points(
    ct: &CoordTransform,
    xs: &mut [f64],
    ys: &mut [f64],
) -> std::result::Result<(), RasterError> {
    let (orig_x, orig_y) = (xs.to_vec(), ys.to_vec());
    let mut zs = vec![0.0; xs.len()];
    if ct.transform_coords(xs, ys, &mut zs).is_ok() {
        return Ok(());
    }
    // One bad point fails the whole batch; redo point by point
    for i in 0..orig_x.len() {
        let (mut x, mut y, mut z) = ([orig_x[i]], [orig_y[i]], [0.0]);
        match ct.transform_coords(&mut x, &mut y, &mut z) {
            Ok(()) => {
                xs[i] = x[0];
                ys[i] = y[0];
            }
            Err(_) => {
                xs[i] = f64::NAN;
                ys[i] = f64::NAN;
            }
        }
    }
    Ok(())
}

/// Grid in the target CRS with the source's width and height, covering the
/// source outline mapped through `forward`.
pub fn destination_grid<F>(src: &Grid, mut forward: F) -> std::result::Result<Grid, RasterError>
where
    F: FnMut(&mut [f64], &mut [f64]) -> std::result::Result<(), RasterError>,
{
    let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = src
        .edge_samples(EDGE_SAMPLES)
        .into_iter()
        .map(|(px, py)| src.transform.apply(px, py))
        .unzip();
    forward(&mut xs, &mut ys)?;
    let bounds = Bounds::from_points(xs.into_iter().zip(ys))
        .ok_or_else(|| RasterError::MissingCrs("no source corner maps into the target CRS".into()))?;
    let res_x = bounds.width() / src.width as f64;
    let res_y = bounds.height() / src.height as f64;
    Ok(Grid::new(
        src.width,
        src.height,
        GeoTransform::north_up(bounds.min_x, bounds.max_y, res_x, res_y),
    ))
}

/// Resample `src` onto `dst_grid`. `to_source` maps destination world coordinates
/// into the source CRS in place.
pub fn warp<F>(
    src: &Raster,
    dst_grid: Grid,
    dst_crs: String,
    kernel: Resampling,
    mut to_source: F,
) -> std::result::Result<Raster, RasterError>
where
    F: FnMut(&mut [f64], &mut [f64]) -> std::result::Result<(), RasterError>,
{
    let inverse = src
        .grid
        .transform
        .invert()
        .ok_or_else(|| RasterError::SingularTransform(src.grid.to_string()))?;
    let (w, h) = (dst_grid.width, dst_grid.height);
    let fill = src.fill_value();
    let mut bands: Vec<Array2<f64>> = (0..src.band_count())
        .map(|_| Array2::from_elem((h, w), fill))
        .collect();

    let mut xs = vec![0.0; w];
    let mut ys = vec![0.0; w];
    for row in 0..h {
        for col in 0..w {
            let (x, y) = dst_grid.pixel_center(col, row);
            xs[col] = x;
            ys[col] = y;
        }
        to_source(&mut xs, &mut ys)?;
        for col in 0..w {
            let (px, py) = inverse.apply(xs[col], ys[col]);
            for (out, band) in bands.iter_mut().zip(&src.bands) {
                if let Some(v) = sample(band, src.nodata, px, py, kernel) {
                    out[[row, col]] = v;
                }
            }
        }
    }

    let mut out = Raster::new(dst_grid, dst_crs, src.pixel_type, src.nodata, bands)?;
    out.descriptions = src.descriptions.clone();
    out.metadata = src.metadata.clone();
    Ok(out)
}

/// Reproject an in-memory raster into `target_crs` (WKT or `EPSG:n`)
pub fn reproject_raster(
    src: &Raster,
    target_crs: &str,
    kernel: Resampling,
) -> std::result::Result<Raster, RasterError> {
    if src.crs.trim().is_empty() {
        return Err(RasterError::MissingCrs(src.grid.to_string()));
    }
    if same_crs(&src.crs, target_crs) {
        debug!("Input already in target CRS ({}); skipping warp", target_crs);
        return Ok(src.clone());
    }
    let src_srs = spatial_ref(&src.crs)?;
    let dst_srs = spatial_ref(target_crs)?;
    let forward = CoordTransform::new(&src_srs, &dst_srs)?;
    let backward = CoordTransform::new(&dst_srs, &src_srs)?;

    let dst_grid = destination_grid(&src.grid, |xs, ys| transform_points(&forward, xs, ys))?;
    debug!(
        "Warping {} -> {} onto {}",
        parse_epsg(&src.crs).unwrap_or_else(|| "source".into()),
        target_crs,
        dst_grid
    );
    warp(src, dst_grid, dst_srs.to_wkt()?, kernel, |xs, ys| {
        transform_points(&backward, xs, ys)
    })
}

/// Reproject each input into `target_crs`, writing one GeoTIFF per input into
/// `output_dir` under the input's file name. Any failure is returned immediately.
pub fn reproject_rasters(
    inputs: &[PathBuf],
    target_crs: &str,
    output_dir: &Path,
    kernel: Resampling,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut names = HashSet::new();
    let mut outputs = Vec::with_capacity(inputs.len());
    for path in inputs {
        let name = path
            .file_name()
            .ok_or_else(|| Error::MissingInput(path.display().to_string()))?;
        if !names.insert(name.to_os_string()) {
            return Err(Error::InvalidArgument {
                arg: "inputs",
                value: format!("duplicate file name {:?}", name),
            });
        }
        let src = Raster::open(path)?;
        let mut out = reproject_raster(&src, target_crs, kernel)?;
        out.metadata
            .extend(provenance_fields(&format!("reproject:{}", kernel), &[path.clone()]));
        let output = output_dir.join(name);
        write_tiff(&output, &out)?;
        info!("Reprojected {:?} -> {:?}", path, output);
        outputs.push(output);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelType;
    use ndarray::array;

    fn raster() -> Raster {
        let grid = Grid::new(3, 2, GeoTransform::north_up(100.0, 50.0, 10.0, 10.0));
        Raster::new(
            grid,
            "",
            PixelType::I16,
            Some(-9999.0),
            vec![array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]],
        )
        .unwrap()
    }

    fn identity(_: &mut [f64], _: &mut [f64]) -> std::result::Result<(), RasterError> {
        Ok(())
    }

    #[test]
    fn identity_mapping_preserves_grid_and_values() {
        let src = raster();
        let grid = destination_grid(&src.grid, identity).unwrap();
        assert_eq!((grid.width, grid.height), (3, 2));
        assert!(grid.aligned_with(&src.grid));

        let out = warp(&src, grid, "X".into(), Resampling::Bilinear, identity).unwrap();
        for (a, b) in out.bands[0].iter().zip(src.bands[0].iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert_eq!(out.crs, "X");
        assert_eq!(out.pixel_type, PixelType::I16);
    }

    #[test]
    fn shifted_mapping_fills_uncovered_pixels_with_nodata() {
        let src = raster();
        // Destination is one pixel (10 units) east of the source
        let grid = Grid::new(3, 2, GeoTransform::north_up(110.0, 50.0, 10.0, 10.0));
        let out = warp(&src, grid, String::new(), Resampling::Nearest, identity).unwrap();
        assert_eq!(out.bands[0], array![[2.0, 3.0, -9999.0], [5.0, 6.0, -9999.0]]);
    }

    #[test]
    fn destination_grid_keeps_pixel_counts_under_scaling() {
        let src = raster();
        let grid = destination_grid(&src.grid, |xs: &mut [f64], ys: &mut [f64]| {
            xs.iter_mut().for_each(|x| *x *= 2.0);
            ys.iter_mut().for_each(|y| *y *= 2.0);
            Ok(())
        })
        .unwrap();
        assert_eq!((grid.width, grid.height), (3, 2));
        assert_eq!(grid.transform, GeoTransform::north_up(200.0, 100.0, 20.0, 20.0));
    }

    #[test]
    fn missing_crs_is_reported() {
        let err = reproject_raster(&raster(), "EPSG:4326", Resampling::Bilinear).unwrap_err();
        assert!(matches!(err, RasterError::MissingCrs(_)));
    }
}
