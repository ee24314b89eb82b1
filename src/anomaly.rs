// src/anomaly.rs
//! Per-date anomalies and the two stress tests run on them.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::SourceError;
use crate::geometry::Region;
use crate::raster::Raster;
use crate::reduce::{region_count, region_valid, Fallback};

/// Field-mean NDVI of one season observation against the baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    pub date: NaiveDate,
    pub mean_ndvi: f64,
    /// Observed minus baseline; negative means stress.
    pub anomaly: f64,
    pub is_low: bool,
}

impl AnomalyRecord {
    pub fn new(date: NaiveDate, mean_ndvi: f64, baseline_mean: f64, threshold: f64) -> Self {
        let anomaly = mean_ndvi - baseline_mean;
        Self {
            date,
            mean_ndvi,
            anomaly,
            is_low: anomaly <= threshold,
        }
    }
}

/// The last `size` records, or all of them if there are fewer.
pub fn trailing_window(records: &[AnomalyRecord], size: usize) -> &[AnomalyRecord] {
    &records[records.len().saturating_sub(size)..]
}

/// True when `flags` holds at least `needed` consecutive `true` values.
pub fn has_consecutive_run<I>(flags: I, needed: usize) -> bool
where
    I: IntoIterator<Item = bool>,
{
    let mut run = 0;
    for low in flags {
        if low {
            run += 1;
            if run >= needed {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Share of the field showing depressed NDVI on one date.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ArealExtent {
    /// Pixels whose anomaly is strictly below the threshold.
    pub pix_below: usize,
    /// Valid pixels of the observation, regardless of baseline coverage.
    pub pix_total: usize,
    pub frac_below: f64,
}

/// Pixel-level anomaly of `latest` against `baseline`. Pixels missing from
/// either raster never count as stressed; a missing baseline raster means no
/// pixel does.
pub fn anomaly_raster(latest: &Raster, baseline: Option<&Raster>) -> Result<Raster, SourceError> {
    match baseline {
        Some(baseline) => latest.zip_with(baseline, |obs, base| obs - base),
        None => Ok(Raster::filled(latest.geo().clone(), f32::NAN)),
    }
}

/// Stressed share of the field on the latest date, counted on its pixel
/// `anomaly` raster. The total is the valid pixels of `latest`.
pub fn areal_extent(
    latest: &Raster,
    anomaly: &Raster,
    region: &Region,
    threshold: f64,
    fallback: &Fallback,
) -> ArealExtent {
    let pix_below = region_count(anomaly, region, |v| (v as f64) < threshold);
    let pix_total = region_valid(latest, region);

    ArealExtent {
        pix_below,
        pix_total,
        frac_below: fallback.fraction(pix_below, pix_total),
    }
}
