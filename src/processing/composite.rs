// src/processing/composite.rs
use rayon::prelude::*;

use crate::error::SourceError;
use crate::raster::Raster;

/// Median of the values, `None` for an empty slice. Even counts average the
/// two middle values. The slice is reordered.
pub fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Per-pixel median across `layers`, ignoring masked pixels. A pixel masked
/// in every layer stays masked. Returns `None` when there are no layers.
pub fn median_composite(layers: &[&Raster]) -> Result<Option<Raster>, SourceError> {
    let Some(first) = layers.first() else {
        return Ok(None);
    };
    let geo = first.geo().clone();
    for layer in &layers[1..] {
        geo.ensure_same_grid(layer.geo())?;
    }

    let mut result = vec![f32::NAN; geo.len()];
    result.par_iter_mut().enumerate().for_each_init(
        || Vec::with_capacity(layers.len()),
        |stack, (i, out)| {
            stack.clear();
            stack.extend(layers.iter().map(|l| l.data()[i]).filter(|v| !v.is_nan()));
            if let Some(m) = median(stack) {
                *out = m;
            }
        },
    );

    Raster::new(geo, result).map(Some)
}
