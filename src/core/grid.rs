//! Affine pixel grids.
//!
//! A [`GeoTransform`] uses GDAL's coefficient order
//! `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`;
//! pixel `(col, row)` maps to world `(x, y)` at the pixel's top-left corner.

/// Affine transform between pixel and world coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl Default for GeoTransform {
    fn default() -> Self {
        GeoTransform([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }
}

impl GeoTransform {
    /// North-up transform with the given top-left origin and positive pixel sizes
    pub fn north_up(origin_x: f64, origin_y: f64, res_x: f64, res_y: f64) -> Self {
        GeoTransform([origin_x, res_x, 0.0, origin_y, 0.0, -res_y])
    }

    /// World coordinate of fractional pixel position `(px, py)`
    pub fn apply(&self, px: f64, py: f64) -> (f64, f64) {
        let g = &self.0;
        (
            g[0] + px * g[1] + py * g[2],
            g[3] + px * g[4] + py * g[5],
        )
    }

    pub fn invert(&self) -> Option<GeoTransform> {
        let g = &self.0;
        let det = g[1] * g[5] - g[2] * g[4];
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        let a = g[5] * inv_det;
        let b = -g[2] * inv_det;
        let d = -g[4] * inv_det;
        let e = g[1] * inv_det;
        Some(GeoTransform([
            -g[0] * a - g[3] * b,
            a,
            b,
            -g[0] * d - g[3] * e,
            d,
            e,
        ]))
    }

    /// Absolute pixel sizes along x and y
    pub fn resolution(&self) -> (f64, f64) {
        let g = &self.0;
        (
            (g[1] * g[1] + g[4] * g[4]).sqrt(),
            (g[2] * g[2] + g[5] * g[5]).sqrt(),
        )
    }

    pub fn approx_eq(&self, other: &GeoTransform, tolerance: f64) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

/// Axis-aligned world extent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Smallest extent containing all points; `None` when no finite point is given
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Bounds> {
        let mut out: Option<Bounds> = None;
        for (x, y) in points {
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            out = Some(match out {
                None => Bounds {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                },
                Some(b) => Bounds {
                    min_x: b.min_x.min(x),
                    min_y: b.min_y.min(y),
                    max_x: b.max_x.max(x),
                    max_y: b.max_y.max(y),
                },
            });
        }
        out
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Pixel dimensions together with their georeferencing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
}

impl Grid {
    pub fn new(width: usize, height: usize, transform: GeoTransform) -> Self {
        Self {
            width,
            height,
            transform,
        }
    }

    /// North-up grid covering `bounds` at the given resolution, rounding the
    /// pixel count to the nearest whole pixel (at least one).
    pub fn covering(bounds: &Bounds, res_x: f64, res_y: f64) -> Self {
        let width = (bounds.width() / res_x).round().max(1.0) as usize;
        let height = (bounds.height() / res_y).round().max(1.0) as usize;
        Grid::new(
            width,
            height,
            GeoTransform::north_up(bounds.min_x, bounds.max_y, res_x, res_y),
        )
    }

    /// World extent of the four grid corners
    pub fn bounds(&self) -> Bounds {
        let (w, h) = (self.width as f64, self.height as f64);
        let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)]
            .map(|(px, py)| self.transform.apply(px, py));
        Bounds::from_points(corners).unwrap_or(Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        })
    }

    /// World coordinate of the centre of pixel `(col, row)`
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Same dimensions and a transform equal within a small fraction of a pixel
    pub fn aligned_with(&self, other: &Grid) -> bool {
        let (rx, ry) = self.transform.resolution();
        let tolerance = 1e-6 * rx.max(ry).max(f64::EPSILON);
        self.width == other.width
            && self.height == other.height
            && self.transform.approx_eq(&other.transform, tolerance)
    }

    /// Points sampled along the grid's outline, `per_edge` per side, as pixel positions
    pub fn edge_samples(&self, per_edge: usize) -> Vec<(f64, f64)> {
        let n = per_edge.max(2);
        let (w, h) = (self.width as f64, self.height as f64);
        let mut pts = Vec::with_capacity(4 * n);
        for i in 0..n {
            let t = i as f64 / (n - 1) as f64;
            pts.push((t * w, 0.0));
            pts.push((t * w, h));
            pts.push((0.0, t * h));
            pts.push((w, t * h));
        }
        pts
    }
}

impl std::fmt::Display for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let g = &self.transform.0;
        write!(
            f,
            "{}x{} @ [{}, {}, {}, {}, {}, {}]",
            self.width, self.height, g[0], g[1], g[2], g[3], g[4], g[5]
        )
    }
}
