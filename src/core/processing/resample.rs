//! Nodata-aware resampling kernels.
//!
//! Positions are fractional pixel coordinates: pixel `(c, r)` spans `[c, c+1) x [r, r+1)`
//! and its value sits at the centre `(c + 0.5, r + 0.5)`. Positions outside the band
//! sample to `None`.
use ndarray::Array2;

use crate::io::gdal::is_valid;
use crate::types::Resampling;

/// Sample `band` at `(px, py)` with the given kernel
pub fn sample(
    band: &Array2<f64>,
    nodata: Option<f64>,
    px: f64,
    py: f64,
    kernel: Resampling,
) -> Option<f64> {
    let (rows, cols) = band.dim();
    if !(px >= 0.0 && py >= 0.0 && px < cols as f64 && py < rows as f64) {
        return None;
    }
    match kernel {
        Resampling::Nearest => nearest(band, nodata, px, py),
        Resampling::Bilinear => bilinear(band, nodata, px, py),
        Resampling::Cubic => cubic(band, nodata, px, py).or_else(|| bilinear(band, nodata, px, py)),
    }
}

fn nearest(band: &Array2<f64>, nodata: Option<f64>, px: f64, py: f64) -> Option<f64> {
    let v = band[[py as usize, px as usize]];
    is_valid(v, nodata).then_some(v)
}

fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

fn bilinear(band: &Array2<f64>, nodata: Option<f64>, px: f64, py: f64) -> Option<f64> {
    let (rows, cols) = band.dim();
    let x = px - 0.5;
    let y = py - 0.5;
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let mut acc = 0.0;
    let mut weight = 0.0;
    for (dy, wy) in [(0isize, 1.0 - fy), (1, fy)] {
        for (dx, wx) in [(0isize, 1.0 - fx), (1, fx)] {
            let w = wx * wy;
            if w <= 0.0 {
                continue;
            }
            let r = clamp_index(y0 as isize + dy, rows);
            let c = clamp_index(x0 as isize + dx, cols);
            let v = band[[r, c]];
            if is_valid(v, nodata) {
                acc += v * w;
                weight += w;
            }
        }
    }
    (weight > 1e-12).then(|| acc / weight)
}

// Keys cubic convolution weight with a = -0.5
fn cubic_weight(t: f64) -> f64 {
    let a = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        (a + 2.0) * t.powi(3) - (a + 3.0) * t.powi(2) + 1.0
    } else if t < 2.0 {
        a * t.powi(3) - 5.0 * a * t.powi(2) + 8.0 * a * t - 4.0 * a
    } else {
        0.0
    }
}

// Any nodata inside the 4x4 support yields None so the caller can fall back
fn cubic(band: &Array2<f64>, nodata: Option<f64>, px: f64, py: f64) -> Option<f64> {
    let (rows, cols) = band.dim();
    let x = px - 0.5;
    let y = py - 0.5;
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let mut acc = 0.0;
    for j in -1isize..=2 {
        let wy = cubic_weight(j as f64 - fy);
        let r = clamp_index(y0 as isize + j, rows);
        for i in -1isize..=2 {
            let wx = cubic_weight(i as f64 - fx);
            let c = clamp_index(x0 as isize + i, cols);
            let v = band[[r, c]];
            if !is_valid(v, nodata) {
                return None;
            }
            acc += v * wx * wy;
        }
    }
    Some(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn pixel_centres_reproduce_source_values() {
        let band = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        for kernel in [Resampling::Nearest, Resampling::Bilinear, Resampling::Cubic] {
            for r in 0..3 {
                for c in 0..3 {
                    let v = sample(&band, None, c as f64 + 0.5, r as f64 + 0.5, kernel).unwrap();
                    assert!((v - band[[r, c]]).abs() < 1e-9, "{kernel} at ({c},{r})");
                }
            }
        }
    }

    #[test]
    fn bilinear_interpolates_between_centres() {
        let band = array![[0.0, 10.0], [20.0, 30.0]];
        let v = sample(&band, None, 1.0, 1.0, Resampling::Bilinear).unwrap();
        assert!((v - 15.0).abs() < 1e-9);
        let v = sample(&band, None, 1.0, 0.5, Resampling::Bilinear).unwrap();
        assert!((v - 5.0).abs() < 1e-9);
    }

    #[test]
    fn bilinear_skips_nodata_neighbours() {
        let band = array![[0.0, -1.0], [20.0, 30.0]];
        let v = sample(&band, Some(-1.0), 1.0, 1.0, Resampling::Bilinear).unwrap();
        assert!((v - 50.0 / 3.0).abs() < 1e-9);
        let only_nodata = array![[-1.0]];
        assert_eq!(sample(&only_nodata, Some(-1.0), 0.5, 0.5, Resampling::Bilinear), None);
    }

    #[test]
    fn outside_band_is_none() {
        let band = array![[1.0]];
        assert_eq!(sample(&band, None, -0.1, 0.5, Resampling::Nearest), None);
        assert_eq!(sample(&band, None, 0.5, 1.0, Resampling::Bilinear), None);
        assert_eq!(sample(&band, None, f64::NAN, 0.5, Resampling::Cubic), None);
    }

    #[test]
    fn cubic_falls_back_near_nodata() {
        let band = array![
            [1.0, 1.0, 1.0, 1.0],
            [1.0, 2.0, 2.0, 1.0],
            [1.0, 2.0, 2.0, -5.0],
            [1.0, 1.0, 1.0, 1.0]
        ];
        let v = sample(&band, Some(-5.0), 2.0, 2.0, Resampling::Cubic).unwrap();
        let b = sample(&band, Some(-5.0), 2.0, 2.0, Resampling::Bilinear).unwrap();
        assert_eq!(v, b);
    }
}
