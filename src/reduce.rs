// src/reduce.rs
//! Reductions of a raster over a field region, and the single policy that
//! decides what a reduction yields when it finds no valid pixel.

use log::debug;

use crate::geometry::Region;
use crate::raster::Raster;

/// Values substituted when a field has no usable pixel. Every reduction
/// boundary goes through here so an empty mask, an empty composite and an
/// empty pixel count all resolve the same way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fallback {
    pub mean: f64,
}

impl Fallback {
    pub const ZERO: Fallback = Fallback { mean: 0.0 };

    pub fn mean(&self, value: Option<f64>, context: &str) -> f64 {
        value.unwrap_or_else(|| {
            debug!("{context}: no valid pixels, using {}", self.mean);
            self.mean
        })
    }

    /// `numerator / max(denominator, 1)`. A zero denominator means nothing was
    /// observed, which counts as no stressed area.
    pub fn fraction(&self, numerator: usize, denominator: usize) -> f64 {
        numerator as f64 / denominator.max(1) as f64
    }
}

impl Default for Fallback {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Mean of the valid pixels of `raster` inside `region`, `None` if there are none.
pub fn region_mean(raster: &Raster, region: &Region) -> Option<f64> {
    let (sum, count) = region
        .pixels()
        .iter()
        .filter_map(|&i| raster.get(i))
        .fold((0.0f64, 0usize), |(sum, count), v| (sum + v as f64, count + 1));

    (count > 0).then(|| sum / count as f64)
}

/// Number of valid pixels inside `region` that satisfy `predicate`.
pub fn region_count<F>(raster: &Raster, region: &Region, predicate: F) -> usize
where
    F: Fn(f32) -> bool,
{
    region
        .pixels()
        .iter()
        .filter_map(|&i| raster.get(i))
        .filter(|&v| predicate(v))
        .count()
}

/// Number of valid pixels inside `region`.
pub fn region_valid(raster: &Raster, region: &Region) -> usize {
    region_count(raster, region, |_| true)
}
