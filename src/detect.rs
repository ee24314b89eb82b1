// src/detect.rs
//! Season anomaly analysis and the per-field detection pipeline.

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::anomaly::{
    anomaly_raster, areal_extent, has_consecutive_run, trailing_window, AnomalyRecord,
    ArealExtent,
};
use crate::baseline::{Baseline, BaselineEstimator};
use crate::config::DetectionConfig;
use crate::error::SourceError;
use crate::geometry::Field;
use crate::processing::{CloudMask, Ndvi};
use crate::raster::Raster;
use crate::reduce::{region_mean, Fallback};
use crate::report::{DetectionResult, FieldOutcome};
use crate::source::ImagerySource;

/// Everything computed for one field. `result` is the record that gets
/// reported; the rasters are kept for export.
#[derive(Debug, Clone)]
pub struct FieldAnalysis {
    pub result: DetectionResult,
    pub baseline: Baseline,
    pub records: Vec<AnomalyRecord>,
    pub extent: ArealExtent,
    /// Pixel anomaly of the latest season scene, if there was one.
    pub latest_anomaly: Option<Raster>,
}

pub struct SeasonAnalyzer<'a, S: ImagerySource + ?Sized> {
    source: &'a S,
    config: &'a DetectionConfig,
    mask: CloudMask,
    ndvi: Ndvi,
    fallback: Fallback,
}

impl<'a, S: ImagerySource + ?Sized> SeasonAnalyzer<'a, S> {
    pub fn new(source: &'a S, config: &'a DetectionConfig) -> Self {
        Self {
            source,
            config,
            mask: config.cloud_mask(),
            ndvi: Ndvi,
            fallback: Fallback::default(),
        }
    }

    pub fn analyze(&self, field: &Field, baseline: Baseline) -> Result<FieldAnalysis, SourceError> {
        let config = self.config;
        let mut scenes = self.source.scenes(field, &config.season_query())?;
        scenes.sort_by_key(|s| s.date);
        let n_images = scenes.len();
        info!("{}: {n_images} season scenes in {}", field.name, config.season());
        if let Some((first, rest)) = scenes.split_first() {
            for scene in rest {
                first.grid().ensure_same_grid(scene.grid())?;
            }
        }

        let mut records = Vec::with_capacity(n_images);
        let mut latest = None;
        for scene in &scenes {
            if let Some(raster) = &baseline.raster {
                raster.geo().ensure_same_grid(scene.grid())?;
            }
            let ndvi = self.ndvi.for_scene(scene, &self.mask)?;
            let region = field.region(ndvi.geo());
            let mean_ndvi = self.fallback.mean(
                region_mean(&ndvi, &region),
                &format!("{} on {}", field.name, scene.date),
            );
            let record = AnomalyRecord::new(
                scene.date,
                mean_ndvi,
                baseline.mean,
                config.ndvi_anom_threshold,
            );
            debug!(
                "{}: {} mean {:.4} anomaly {:+.4}{}",
                field.name,
                record.date,
                record.mean_ndvi,
                record.anomaly,
                if record.is_low { " (low)" } else { "" }
            );
            records.push(record);
            latest = Some((ndvi, region));
        }

        let window = trailing_window(&records, config.recent_window);
        let consecutive_flag =
            has_consecutive_run(window.iter().map(|r| r.is_low), config.consecutive_needed);

        let (extent, latest_anomaly) = match &latest {
            Some((ndvi, region)) => {
                let anomaly = anomaly_raster(ndvi, baseline.raster.as_ref())?;
                let extent = areal_extent(
                    ndvi,
                    &anomaly,
                    region,
                    config.ndvi_anom_threshold,
                    &self.fallback,
                );
                (extent, Some(anomaly))
            }
            None => (ArealExtent::default(), None),
        };

        let pest_detected = consecutive_flag && extent.frac_below >= config.min_frac;
        if pest_detected {
            warn!(
                "{}: possible pest damage, {:.1}% of the field below threshold",
                field.name,
                extent.frac_below * 100.0
            );
        }

        let result = DetectionResult {
            field: field.name.clone(),
            n_images,
            frac_below: extent.frac_below,
            pest_detected,
            baseline_mean: baseline.mean,
            last_anomalies: window.iter().map(|r| r.anomaly).collect(),
            consecutive_flag,
            pix_below: extent.pix_below,
            pix_total: extent.pix_total,
            area_ha: field.area_hectares(),
            perimeter_m: field.perimeter(),
        };

        Ok(FieldAnalysis {
            result,
            baseline,
            records,
            extent,
            latest_anomaly,
        })
    }
}

/// Baseline, then season analysis, for one field.
pub fn analyze_field<S: ImagerySource + ?Sized>(
    source: &S,
    config: &DetectionConfig,
    field: &Field,
) -> Result<FieldAnalysis, SourceError> {
    let baseline = BaselineEstimator::new(source, config).estimate(field)?;
    SeasonAnalyzer::new(source, config).analyze(field, baseline)
}

/// Result of one field in a batch; a failed field does not stop the others.
#[derive(Debug)]
pub struct FieldRun {
    pub field: String,
    pub analysis: Result<FieldAnalysis, SourceError>,
}

impl FieldRun {
    pub fn outcome(&self) -> FieldOutcome {
        match &self.analysis {
            Ok(analysis) => FieldOutcome::Analyzed(analysis.result.clone()),
            Err(e) => FieldOutcome::Failed {
                field: self.field.clone(),
                error: e.to_string(),
            },
        }
    }
}

/// Analyse all fields in parallel. Output order follows `fields`.
pub fn run_batch<S: ImagerySource + ?Sized>(
    source: &S,
    config: &DetectionConfig,
    fields: &[Field],
) -> Vec<FieldRun> {
    fields
        .par_iter()
        .map(|field| {
            let analysis = analyze_field(source, config, field);
            if let Err(e) = &analysis {
                warn!("{}: analysis failed: {e}", field.name);
            }
            FieldRun {
                field: field.name.clone(),
                analysis,
            }
        })
        .collect()
}
