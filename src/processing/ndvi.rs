// src/processing/ndvi.rs
use rayon::prelude::*;

use crate::error::SourceError;
use crate::raster::Raster;
use crate::source::Scene;

/// Scene-classification codes excluded by default: cloud shadow (3),
/// cloud medium probability (8), cloud high probability (9), thin cirrus (10).
pub const DEFAULT_MASK_CODES: [u8; 4] = [3, 8, 9, 10];

/// Per-pixel validity mask driven by the scene-classification band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudMask {
    codes: Vec<u8>,
}

impl CloudMask {
    pub fn new(codes: impl Into<Vec<u8>>) -> Self {
        Self {
            codes: codes.into(),
        }
    }

    /// A pixel without a classification is excluded as well.
    pub fn excludes(&self, scl: f32) -> bool {
        if scl.is_nan() {
            return true;
        }
        let code = scl.round();
        self.codes.iter().any(|&c| f32::from(c) == code)
    }
}

impl Default for CloudMask {
    fn default() -> Self {
        Self::new(DEFAULT_MASK_CODES)
    }
}

/// Normalized Difference Vegetation Index: (NIR - RED) / (NIR + RED)
#[derive(Debug, Clone, Copy, Default)]
pub struct Ndvi;

impl Ndvi {
    /// NDVI of every pixel not excluded by `mask`. Pixels with a zero
    /// denominator or a missing input band come out masked.
    pub fn calculate(
        &self,
        scl: &Raster,
        nir: &Raster,
        red: &Raster,
        mask: &CloudMask,
    ) -> Result<Raster, SourceError> {
        scl.geo().ensure_same_grid(nir.geo())?;
        scl.geo().ensure_same_grid(red.geo())?;

        let scl_data = scl.data();
        let nir_data = nir.data();
        let red_data = red.data();

        // Preallocate result buffer
        let mut result_data = vec![f32::NAN; scl_data.len()];

        result_data
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, result)| {
                if mask.excludes(scl_data[i]) {
                    return;
                }
                let nir_val = nir_data[i];
                let red_val = red_data[i];
                let sum = nir_val + red_val;

                // NaN inputs fail this test as well
                if sum != 0.0 && !sum.is_nan() {
                    *result = (nir_val - red_val) / sum;
                }
            });

        Raster::new(scl.geo().clone(), result_data)
    }

    pub fn for_scene(&self, scene: &Scene, mask: &CloudMask) -> Result<Raster, SourceError> {
        self.calculate(&scene.scl, &scene.nir, &scene.red, mask)
    }
}
