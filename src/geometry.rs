// src/geometry.rs
//! Field boundaries and their footprint on a raster grid.

use geo::{Area, BoundingRect, Contains, Euclidean, Length, MultiPolygon, Point, Polygon};

use crate::raster::{GeoInfo, PixelWindow};

/// A named field boundary, in the same CRS as the imagery.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

impl Field {
    pub fn new(name: impl Into<String>, geometry: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            name: name.into(),
            geometry: geometry.into(),
        }
    }

    /// Area in squared CRS units.
    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }

    /// Hectares, assuming a metric CRS.
    pub fn area_hectares(&self) -> f64 {
        self.area() / 10_000.0
    }

    /// Total length of exterior and interior rings.
    pub fn perimeter(&self) -> f64 {
        self.geometry
            .iter()
            .map(|p: &Polygon<f64>| {
                p.exterior().length::<Euclidean>()
                    + p.interiors()
                        .iter()
                        .map(|r| r.length::<Euclidean>())
                        .sum::<f64>()
            })
            .sum()
    }

    /// Pixels of `grid` whose centre falls inside the field.
    pub fn region(&self, grid: &GeoInfo) -> Region {
        let mut pixels = Vec::new();
        if let Some(window) = self.pixel_bounds(grid) {
            for row in window.row_off..window.row_off + window.height {
                for col in window.col_off..window.col_off + window.width {
                    let (x, y) = grid.pixel_center(col, row);
                    if self.geometry.contains(&Point::new(x, y)) {
                        pixels.push(row * grid.width + col);
                    }
                }
            }
        }
        Region { pixels }
    }

    /// Smallest window of `grid` holding the field's bounding box, `None` when
    /// the box misses the grid. Rotated grids give the whole grid.
    pub fn pixel_bounds(&self, grid: &GeoInfo) -> Option<PixelWindow> {
        let rect = self.geometry.bounding_rect()?;
        let (Some(a), Some(b)) = (
            grid.to_pixel(rect.min().x, rect.min().y),
            grid.to_pixel(rect.max().x, rect.max().y),
        ) else {
            return (!grid.is_empty()).then(|| PixelWindow::full(grid));
        };

        let clamp = |lo: f64, hi: f64, limit: usize| {
            let start = lo.min(hi).floor().max(0.0) as usize;
            let end = (lo.max(hi).ceil().max(0.0) as usize).min(limit);
            start.min(end)..end
        };
        let cols = clamp(a.0, b.0, grid.width);
        let rows = clamp(a.1, b.1, grid.height);
        if cols.is_empty() || rows.is_empty() {
            return None;
        }
        Some(PixelWindow {
            col_off: cols.start,
            row_off: rows.start,
            width: cols.len(),
            height: rows.len(),
        })
    }
}

/// Linear pixel indices of a field on one grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pixels: Vec<usize>,
}

impl Region {
    pub fn pixels(&self) -> &[usize] {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}
