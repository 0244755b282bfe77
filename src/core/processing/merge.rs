//! Merge engine shared by the tile merger and the mosaicker.
//!
//! Inputs must share a CRS, band count and band labels. The output grid spans the
//! union of all input footprints at the first input's resolution; each output pixel
//! is resolved from the inputs whose valid samples cover its centre, according to
//! the [`MergeMethod`]. Pixels no input covers hold the nodata (fill) value.
//!
//! The output grid is derived from headers alone, so file inputs are read and
//! accumulated one at a time.
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::core::grid::{Bounds, Grid};
use crate::core::processing::resample::sample;
use crate::core::processing::reproject::same_crs;
use crate::error::Result;
use crate::io::gdal::{GdalRasterReader, Raster, RasterError, RasterHeader};
use crate::io::writers::metadata::provenance_fields;
use crate::io::writers::tiff::write_tiff;
use crate::types::{MergeMethod, Reducer, Resampling};

fn check_compatible(
    headers: &[RasterHeader],
    names: &[String],
) -> std::result::Result<(), RasterError> {
    let first = headers.first().ok_or(RasterError::NoInputs)?;
    for (h, name) in headers.iter().zip(names).skip(1) {
        if h.band_count != first.band_count {
            return Err(RasterError::BandCountMismatch {
                path: name.clone(),
                expected: first.band_count,
                found: h.band_count,
            });
        }
        if !same_crs(&first.crs, &h.crs) {
            return Err(RasterError::CrsMismatch { path: name.clone() });
        }
        // Unlabelled bands are accepted; labelled ones must agree
        let labels = first.descriptions.iter().zip(&h.descriptions).enumerate();
        for (i, (expected, found)) in labels {
            if !expected.is_empty() && !found.is_empty() && expected != found {
                return Err(RasterError::BandLabelMismatch {
                    path: name.clone(),
                    band: i + 1,
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Output grid covering every input at the first input's resolution
pub fn union_grid(headers: &[RasterHeader]) -> std::result::Result<Grid, RasterError> {
    let first = headers.first().ok_or(RasterError::NoInputs)?;
    let mut bounds = first.grid.bounds();
    for h in &headers[1..] {
        bounds = bounds.union(&h.grid.bounds());
    }
    let (res_x, res_y) = first.grid.transform.resolution();
    Ok(Grid::covering(&bounds, res_x, res_y))
}

/// Running merge state: output bands plus which pixels already hold a value
struct Accumulator {
    grid: Grid,
    bounds: Bounds,
    method: MergeMethod,
    kernel: Resampling,
    bands: Vec<Array2<f64>>,
    filled: Vec<Array2<bool>>,
}

impl Accumulator {
    fn new(grid: Grid, first: &RasterHeader, method: MergeMethod, kernel: Resampling) -> Self {
        let (w, h) = (grid.width, grid.height);
        let fill = first.nodata.unwrap_or(0.0);
        Accumulator {
            grid,
            bounds: grid.bounds(),
            method,
            kernel,
            bands: (0..first.band_count)
                .map(|_| Array2::from_elem((h, w), fill))
                .collect(),
            filled: (0..first.band_count)
                .map(|_| Array2::from_elem((h, w), false))
                .collect(),
        }
    }

    fn add(&mut self, r: &Raster, label: &str) -> std::result::Result<(), RasterError> {
        let inverse = r
            .grid
            .transform
            .invert()
            .ok_or_else(|| RasterError::SingularTransform(label.to_string()))?;
        let (w, h) = (self.grid.width, self.grid.height);
        let (res_x, res_y) = self.grid.transform.resolution();
        let bounds = self.bounds;

        // Restrict the scan to output pixels inside this input's footprint
        let rb = r.grid.bounds();
        let col_start = (((rb.min_x - bounds.min_x) / res_x).floor().max(0.0)) as usize;
        let col_end = ((((rb.max_x - bounds.min_x) / res_x).ceil()) as usize).min(w);
        let row_start = (((bounds.max_y - rb.max_y) / res_y).floor().max(0.0)) as usize;
        let row_end = ((((bounds.max_y - rb.min_y) / res_y).ceil()) as usize).min(h);

        for row in row_start..row_end {
            for col in col_start..col_end {
                let (x, y) = self.grid.pixel_center(col, row);
                let (px, py) = inverse.apply(x, y);
                for b in 0..self.bands.len() {
                    let Some(v) = sample(&r.bands[b], r.nodata, px, py, self.kernel) else {
                        continue;
                    };
                    let cell = &mut self.bands[b][[row, col]];
                    let seen = &mut self.filled[b][[row, col]];
                    match self.method {
                        MergeMethod::First if *seen => {}
                        MergeMethod::Min if *seen => *cell = cell.min(v),
                        MergeMethod::Max if *seen => *cell = cell.max(v),
                        _ => *cell = v,
                    }
                    *seen = true;
                }
            }
        }
        Ok(())
    }

    fn finish(self, first: &RasterHeader) -> std::result::Result<Raster, RasterError> {
        let mut out = Raster::new(
            self.grid,
            first.crs.clone(),
            first.pixel_type,
            first.nodata,
            self.bands,
        )?;
        out.descriptions = first.descriptions.clone();
        Ok(out)
    }
}

fn labels_for(count: usize, names: &[String]) -> Vec<String> {
    (0..count)
        .map(|i| names.get(i).cloned().unwrap_or_else(|| format!("input #{}", i + 1)))
        .collect()
}

/// Merge in-memory rasters. `names` label inputs in error messages and may be
/// shorter than `rasters`.
pub fn merge(
    rasters: &[Raster],
    names: &[String],
    method: MergeMethod,
    kernel: Resampling,
) -> std::result::Result<Raster, RasterError> {
    let labels = labels_for(rasters.len(), names);
    let headers: Vec<RasterHeader> = rasters.iter().map(Raster::header).collect();
    check_compatible(&headers, &labels)?;
    let mut acc = Accumulator::new(union_grid(&headers)?, &headers[0], method, kernel);
    for (r, label) in rasters.iter().zip(&labels) {
        acc.add(r, label)?;
    }
    acc.finish(&headers[0])
}

/// Merge files with the given method and kernel, write the result and return it.
///
/// Headers are read first to validate the inputs and size the output; pixels are
/// then read one input at a time.
pub fn merge_files(
    inputs: &[PathBuf],
    output: &Path,
    method: MergeMethod,
    kernel: Resampling,
) -> Result<Raster> {
    if inputs.is_empty() {
        return Err(RasterError::NoInputs.into());
    }
    let labels: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();
    let mut headers = Vec::with_capacity(inputs.len());
    for path in inputs {
        headers.push(GdalRasterReader::open(path)?.header()?);
    }
    check_compatible(&headers, &labels)?;
    let grid = union_grid(&headers)?;
    debug!("Merging {} inputs onto {}", inputs.len(), grid);

    let mut acc = Accumulator::new(grid, &headers[0], method, kernel);
    for (path, label) in inputs.iter().zip(&labels) {
        let raster = Raster::open(path)?;
        acc.add(&raster, label)?;
    }
    let mut merged = acc.finish(&headers[0])?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    merged.metadata = provenance_fields(&format!("merge:{}", method), inputs);
    write_tiff(output, &merged)?;
    Ok(merged)
}

/// Tile merger: combine same-tile composites across dates with a min or max reducer.
///
/// Pixels are reduced value-wise and order-independently; nearest sampling keeps
/// aligned inputs unchanged. Parent directories of `output` are created as needed.
pub fn merge_rasters(inputs: &[PathBuf], output: &Path, reducer: Reducer) -> Result<Raster> {
    if inputs.len() == 1 {
        warn!("Tile merge of a single input {:?}", inputs[0]);
    }
    let merged = merge_files(inputs, output, reducer.into(), Resampling::Nearest)?;
    info!(
        "Merged {} rasters with `{}` into {:?} ({}x{})",
        inputs.len(),
        reducer,
        output,
        merged.width(),
        merged.height()
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::GeoTransform;
    use crate::types::PixelType;
    use ndarray::array;

    const ND: f64 = -9999.0;

    fn tile(origin_x: f64, origin_y: f64, band: Array2<f64>) -> Raster {
        let (rows, cols) = band.dim();
        let grid = Grid::new(cols, rows, GeoTransform::north_up(origin_x, origin_y, 30.0, 30.0));
        Raster::new(grid, "EPSG:32617", PixelType::I16, Some(ND), vec![band]).unwrap()
    }

    fn run(rasters: &[Raster], method: MergeMethod) -> Raster {
        merge(rasters, &[], method, Resampling::Nearest).unwrap()
    }

    #[test]
    fn max_and_min_take_pixelwise_extremes() {
        let a = tile(0.0, 60.0, array![[1.0, 8.0], [ND, 4.0]]);
        let b = tile(0.0, 60.0, array![[5.0, 2.0], [ND, ND]]);
        let c = tile(0.0, 60.0, array![[3.0, 9.0], [ND, 0.0]]);

        let max = run(&[a.clone(), b.clone(), c.clone()], MergeMethod::Max);
        assert_eq!(max.bands[0], array![[5.0, 9.0], [ND, 4.0]]);

        let min = run(&[a, b, c], MergeMethod::Min);
        assert_eq!(min.bands[0], array![[1.0, 2.0], [ND, 0.0]]);
        assert_eq!(min.nodata, Some(ND));
    }

    #[test]
    fn reducers_are_order_independent() {
        let a = tile(0.0, 60.0, array![[1.0, 8.0], [7.0, 4.0]]);
        let b = tile(30.0, 90.0, array![[5.0, 2.0], [6.0, ND]]);
        for method in [MergeMethod::Min, MergeMethod::Max] {
            let ab = run(&[a.clone(), b.clone()], method);
            let ba = run(&[b.clone(), a.clone()], method);
            assert_eq!(ab.bands, ba.bands);
            assert_eq!(ab.grid, ba.grid);
        }
    }

    #[test]
    fn disjoint_footprints_merge_into_union_without_loss() {
        let west = tile(0.0, 60.0, array![[1.0, 2.0], [3.0, 4.0]]);
        let east = tile(60.0, 60.0, array![[5.0, 6.0], [7.0, 8.0]]);
        let out = run(&[west, east], MergeMethod::Min);
        assert_eq!((out.width(), out.height()), (4, 2));
        assert_eq!(out.grid.transform, GeoTransform::north_up(0.0, 60.0, 30.0, 30.0));
        assert_eq!(
            out.bands[0],
            array![[1.0, 2.0, 5.0, 6.0], [3.0, 4.0, 7.0, 8.0]]
        );
    }

    #[test]
    fn uncovered_pixels_hold_nodata() {
        let nw = tile(0.0, 60.0, array![[1.0]]);
        let se = tile(30.0, 30.0, array![[2.0]]);
        let out = run(&[nw, se], MergeMethod::Max);
        assert_eq!(out.bands[0], array![[1.0, ND], [ND, 2.0]]);
    }

    #[test]
    fn first_and_last_follow_input_order() {
        let a = tile(0.0, 30.0, array![[1.0, ND]]);
        let b = tile(0.0, 30.0, array![[2.0, 3.0]]);
        assert_eq!(
            run(&[a.clone(), b.clone()], MergeMethod::First).bands[0],
            array![[1.0, 3.0]]
        );
        assert_eq!(run(&[a, b], MergeMethod::Last).bands[0], array![[2.0, 3.0]]);
    }

    #[test]
    fn rejects_mixed_band_counts() {
        let a = tile(0.0, 30.0, array![[1.0]]);
        let mut b = tile(0.0, 30.0, array![[1.0]]);
        b.bands.push(array![[2.0]]);
        b.descriptions.push(String::new());
        let err = merge(&[a, b], &[], MergeMethod::Min, Resampling::Nearest).unwrap_err();
        assert!(matches!(err, RasterError::BandCountMismatch { expected: 1, found: 2, .. }));
    }

    #[test]
    fn rejects_bands_labelled_differently() {
        let mut a = tile(0.0, 30.0, array![[1.0]]);
        let mut b = tile(0.0, 30.0, array![[2.0]]);
        a.bands.push(array![[3.0]]);
        b.bands.push(array![[4.0]]);
        a.descriptions = vec!["B02".into(), "B03".into()];
        b.descriptions = vec!["B02".into(), "B04".into()];
        let names = ["T1_D1.tif".to_string(), "T1_D2.tif".to_string()];

        let err = merge(&[a, b], &names, MergeMethod::Min, Resampling::Nearest).unwrap_err();
        match err {
            RasterError::BandLabelMismatch { path, band, expected, found } => {
                assert_eq!(path, "T1_D2.tif");
                assert_eq!(band, 2);
                assert_eq!((expected.as_str(), found.as_str()), ("B03", "B04"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unlabelled_bands_merge_with_labelled_ones() {
        let mut a = tile(0.0, 30.0, array![[1.0]]);
        a.descriptions = vec!["B02".into()];
        let b = tile(0.0, 30.0, array![[2.0]]);
        let out = run(&[a, b], MergeMethod::Max);
        assert_eq!(out.descriptions, ["B02"]);
        assert_eq!(out.bands[0], array![[2.0]]);
    }

    #[test]
    fn union_grid_needs_only_headers() {
        let headers = [
            tile(0.0, 60.0, array![[1.0, 2.0], [3.0, 4.0]]).header(),
            tile(90.0, 30.0, array![[5.0]]).header(),
        ];
        let grid = union_grid(&headers).unwrap();
        assert_eq!((grid.width, grid.height), (4, 2));
        assert_eq!(grid.transform, GeoTransform::north_up(0.0, 60.0, 30.0, 30.0));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            merge(&[], &[], MergeMethod::Max, Resampling::Nearest),
            Err(RasterError::NoInputs)
        ));
    }
}
