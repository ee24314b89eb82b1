// src/baseline.rs
//! Multi-year NDVI baseline for a field.

use log::{debug, info};

use crate::config::DetectionConfig;
use crate::error::SourceError;
use crate::geometry::Field;
use crate::processing::{median_composite, CloudMask, Ndvi};
use crate::raster::Raster;
use crate::reduce::{region_mean, Fallback};
use crate::source::ImagerySource;

/// Typical in-season NDVI of a field across the reference years.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    /// Median of the per-year median composites; `None` if no reference year had imagery.
    pub raster: Option<Raster>,
    /// Mean of `raster` over the field, 0 when the field has no valid baseline pixel.
    pub mean: f64,
    /// Reference years that contributed a composite.
    pub years_used: Vec<i32>,
    pub scene_count: usize,
}

impl Baseline {
    pub fn empty() -> Self {
        Self {
            raster: None,
            mean: Fallback::ZERO.mean,
            years_used: Vec::new(),
            scene_count: 0,
        }
    }
}

pub struct BaselineEstimator<'a, S: ImagerySource + ?Sized> {
    source: &'a S,
    config: &'a DetectionConfig,
    mask: CloudMask,
    ndvi: Ndvi,
    fallback: Fallback,
}

impl<'a, S: ImagerySource + ?Sized> BaselineEstimator<'a, S> {
    pub fn new(source: &'a S, config: &'a DetectionConfig) -> Self {
        Self {
            source,
            config,
            mask: config.cloud_mask(),
            ndvi: Ndvi,
            fallback: Fallback::default(),
        }
    }

    /// Per-pixel median NDVI of one reference year, with the number of scenes
    /// that went into it. `None` when the year has no usable scene.
    pub fn year_composite(
        &self,
        field: &Field,
        year: i32,
    ) -> Result<(Option<Raster>, usize), SourceError> {
        let Some(query) = self.config.baseline_query(year) else {
            debug!("{}: no calendar window in {year}", field.name);
            return Ok((None, 0));
        };

        let scenes = self.source.scenes(field, &query)?;
        debug!(
            "{}: {} baseline scenes in {}",
            field.name,
            scenes.len(),
            query.window
        );

        let layers = scenes
            .iter()
            .map(|scene| self.ndvi.for_scene(scene, &self.mask))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&Raster> = layers.iter().collect();

        Ok((median_composite(&refs)?, scenes.len()))
    }

    pub fn estimate(&self, field: &Field) -> Result<Baseline, SourceError> {
        let mut composites = Vec::with_capacity(self.config.baseline_years.len());
        let mut years_used = Vec::new();
        let mut scene_count = 0;

        for &year in &self.config.baseline_years {
            let (composite, scenes) = self.year_composite(field, year)?;
            scene_count += scenes;
            if let Some(composite) = composite {
                composites.push(composite);
                years_used.push(year);
            }
        }

        let refs: Vec<&Raster> = composites.iter().collect();
        let Some(raster) = median_composite(&refs)? else {
            info!("{}: no baseline imagery, baseline mean defaults to 0", field.name);
            return Ok(Baseline::empty());
        };

        let region = field.region(raster.geo());
        let mean = self.fallback.mean(
            region_mean(&raster, &region),
            &format!("{} baseline", field.name),
        );
        info!(
            "{}: baseline mean {mean:.4} from {} years ({} scenes)",
            field.name,
            years_used.len(),
            scene_count
        );

        Ok(Baseline {
            raster: Some(raster),
            mean,
            years_used,
            scene_count,
        })
    }
}
