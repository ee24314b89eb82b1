// src/raster.rs
use std::fmt;

use rayon::prelude::*;

use crate::error::SourceError;

/// Georeferencing of a raster grid, copied from the first band of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoInfo {
    pub projection: String,
    pub geo_transform: [f64; 6],
    pub width: usize,
    pub height: usize,
}

impl GeoInfo {
    /// North-up grid with square pixels and `(origin_x, origin_y)` at the top-left corner.
    pub fn north_up(
        width: usize,
        height: usize,
        origin_x: f64,
        origin_y: f64,
        pixel_size: f64,
    ) -> Self {
        Self {
            projection: String::new(),
            geo_transform: [origin_x, pixel_size, 0.0, origin_y, 0.0, -pixel_size],
            width,
            height,
        }
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// World coordinates of the centre of pixel `(col, row)`.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        let gt = &self.geo_transform;
        let px = col as f64 + 0.5;
        let py = row as f64 + 0.5;
        (
            gt[0] + px * gt[1] + py * gt[2],
            gt[3] + px * gt[4] + py * gt[5],
        )
    }

    /// Fractional pixel coordinates of a world point. `None` for rotated grids.
    pub fn to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let gt = &self.geo_transform;
        if gt[2] != 0.0 || gt[4] != 0.0 || gt[1] == 0.0 || gt[5] == 0.0 {
            return None;
        }
        Some(((x - gt[0]) / gt[1], (y - gt[3]) / gt[5]))
    }

    /// Grid of a sub-window, with the origin moved to the window's top-left pixel.
    pub fn window(&self, window: &PixelWindow) -> GeoInfo {
        let gt = &self.geo_transform;
        let (col, row) = (window.col_off as f64, window.row_off as f64);
        let mut geo_transform = *gt;
        geo_transform[0] = gt[0] + col * gt[1] + row * gt[2];
        geo_transform[3] = gt[3] + col * gt[4] + row * gt[5];
        GeoInfo {
            projection: self.projection.clone(),
            geo_transform,
            width: window.width,
            height: window.height,
        }
    }

    /// Two grids are compatible when pixel `i` covers the same ground in both.
    /// Projection strings are not compared: GDAL formats the same CRS differently
    /// depending on the driver.
    pub fn same_grid(&self, other: &GeoInfo) -> bool {
        self.width == other.width
            && self.height == other.height
            && self
                .geo_transform
                .iter()
                .zip(other.geo_transform.iter())
                .all(|(a, b)| (a - b).abs() <= 1e-9 * a.abs().max(1.0))
    }

    pub fn ensure_same_grid(&self, other: &GeoInfo) -> Result<(), SourceError> {
        if self.same_grid(other) {
            Ok(())
        } else {
            Err(SourceError::GridMismatch {
                expected: self.to_string(),
                found: other.to_string(),
            })
        }
    }
}

impl fmt::Display for GeoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gt = &self.geo_transform;
        write!(
            f,
            "{}x{} origin ({}, {}) pixel ({}, {})",
            self.width, self.height, gt[0], gt[3], gt[1], gt[5]
        )
    }
}

/// Rectangle of pixels within a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    pub fn full(geo: &GeoInfo) -> Self {
        Self {
            col_off: 0,
            row_off: 0,
            width: geo.width,
            height: geo.height,
        }
    }
}

/// Single-band `f32` raster. `NaN` marks masked or missing pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    geo: GeoInfo,
    data: Vec<f32>,
}

impl Raster {
    pub fn new(geo: GeoInfo, data: Vec<f32>) -> Result<Self, SourceError> {
        if data.len() != geo.len() {
            return Err(SourceError::GridMismatch {
                expected: geo.to_string(),
                found: format!("{} pixels", data.len()),
            });
        }
        Ok(Self { geo, data })
    }

    pub fn filled(geo: GeoInfo, value: f32) -> Self {
        let data = vec![value; geo.len()];
        Self { geo, data }
    }

    pub fn geo(&self) -> &GeoInfo {
        &self.geo
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.data.get(index).copied().filter(|v| !v.is_nan())
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Combine two rasters on the same grid pixel by pixel. A masked input
    /// pixel stays masked in the output.
    pub fn zip_with<F>(&self, other: &Raster, op: F) -> Result<Raster, SourceError>
    where
        F: Fn(f32, f32) -> f32 + Send + Sync,
    {
        self.geo.ensure_same_grid(&other.geo)?;

        let mut result = vec![f32::NAN; self.data.len()];
        result
            .par_iter_mut()
            .zip(self.data.par_iter().zip(other.data.par_iter()))
            .for_each(|(out, (&a, &b))| {
                if !a.is_nan() && !b.is_nan() {
                    *out = op(a, b);
                }
            });

        Ok(Raster {
            geo: self.geo.clone(),
            data: result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_center_follows_geo_transform() {
        let geo = GeoInfo::north_up(4, 4, 500.0, 1000.0, 10.0);
        assert_eq!(geo.pixel_center(0, 0), (505.0, 995.0));
        assert_eq!(geo.pixel_center(3, 1), (535.0, 985.0));
        assert_eq!(geo.to_pixel(535.0, 985.0), Some((3.5, 1.5)));
    }

    #[test]
    fn window_moves_origin() {
        let geo = GeoInfo::north_up(10, 10, 500.0, 1000.0, 10.0);
        let window = PixelWindow {
            col_off: 3,
            row_off: 2,
            width: 4,
            height: 5,
        };
        let sub = geo.window(&window);
        assert_eq!(sub.geo_transform, [530.0, 10.0, 0.0, 980.0, 0.0, -10.0]);
        assert_eq!((sub.width, sub.height), (4, 5));
        assert_eq!(sub.pixel_center(0, 0), geo.pixel_center(3, 2));
        assert_eq!(geo.window(&PixelWindow::full(&geo)), geo);
    }

    #[test]
    fn zip_with_keeps_mask() {
        let geo = GeoInfo::north_up(2, 1, 0.0, 10.0, 10.0);
        let a = Raster::new(geo.clone(), vec![0.6, f32::NAN]).unwrap();
        let b = Raster::new(geo, vec![0.5, 0.5]).unwrap();
        let diff = a.zip_with(&b, |x, y| x - y).unwrap();
        assert!((diff.data()[0] - 0.1).abs() < 1e-6);
        assert!(diff.data()[1].is_nan());
        assert_eq!(diff.valid_count(), 1);
    }

    #[test]
    fn zip_with_rejects_other_grid() {
        let a = Raster::filled(GeoInfo::north_up(2, 2, 0.0, 20.0, 10.0), 0.5);
        let b = Raster::filled(GeoInfo::north_up(2, 2, 0.0, 20.0, 20.0), 0.5);
        assert!(matches!(
            a.zip_with(&b, |x, y| x - y),
            Err(SourceError::GridMismatch { .. })
        ));
    }
}
