// src/io/catalog.rs
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::geometry::Field;
use crate::io::BandRequest;
use crate::source::{ImagerySource, Scene, SceneQuery};
use crate::utils::RasterCache;

/// One scene of the catalog. Band paths are single-band rasters on a common grid.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub date: NaiveDate,
    #[serde(alias = "CLOUDY_PIXEL_PERCENTAGE")]
    pub cloud_pct: f32,
    /// Scene classification band
    pub scl: PathBuf,
    /// Near-infrared band (Sentinel-2 B8)
    pub nir: PathBuf,
    /// Red band (Sentinel-2 B4)
    pub red: PathBuf,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    pub scenes: Vec<CatalogEntry>,
}

impl Catalog {
    /// Load a JSON catalog. Relative band paths are resolved against the
    /// catalog's own directory.
    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        let content = fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut catalog: Catalog =
            serde_json::from_str(&content).map_err(|source| SourceError::Catalog {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(base) = path.parent() {
            catalog.resolve_paths(base);
        }
        Ok(catalog)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for entry in &mut self.scenes {
            for band in [&mut entry.scl, &mut entry.nir, &mut entry.red] {
                if band.is_relative() {
                    *band = base.join(&*band);
                }
            }
        }
    }
}

/// Imagery read from a scene catalog with GDAL. Only the pixel window around
/// the field is read from each band.
pub struct CatalogSource {
    catalog: Catalog,
    cache: RasterCache,
    io_threads: usize,
}

impl CatalogSource {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            cache: RasterCache::new(),
            io_threads: num_cpus::get().max(4),
        }
    }

    pub fn open(path: &Path) -> Result<Self, SourceError> {
        Catalog::from_file(path).map(Self::new)
    }

    pub fn with_io_threads(mut self, io_threads: usize) -> Self {
        self.io_threads = io_threads.max(1);
        self
    }

    /// Bound the band cache to `megabytes` of decoded pixels.
    pub fn with_cache_mb(mut self, megabytes: usize) -> Self {
        let pixels = megabytes.saturating_mul(1024 * 1024) / std::mem::size_of::<f32>();
        self.cache = RasterCache::with_capacity(pixels);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cache(&self) -> &RasterCache {
        &self.cache
    }
}

impl ImagerySource for CatalogSource {
    fn scenes(&self, field: &Field, query: &SceneQuery) -> Result<Vec<Scene>, SourceError> {
        let entries = self
            .catalog
            .scenes
            .iter()
            .filter(|e| query.matches(e.date, e.cloud_pct))
            .sorted_by_key(|e| e.date);

        let mut covering = Vec::new();
        let mut requests = Vec::new();
        for entry in entries {
            let grid = self.cache.grid(&entry.scl)?;
            let Some(window) = field.pixel_bounds(&grid) else {
                debug!("{}: scene {} does not cover the field", field.name, entry.id);
                continue;
            };
            for band in [&entry.scl, &entry.nir, &entry.red] {
                requests.push(BandRequest::new(band, Some(window)));
            }
            covering.push(entry);
        }
        if covering.is_empty() {
            return Ok(Vec::new());
        }

        let bands = self.cache.load(&requests, self.io_threads)?;

        let mut scenes = Vec::with_capacity(covering.len());
        for (entry, band) in covering.iter().zip(bands.chunks_exact(3)) {
            let scene = Scene::new(
                entry.id.clone(),
                entry.date,
                entry.cloud_pct,
                band[0].clone(),
                band[1].clone(),
                band[2].clone(),
            )?;
            // the bounding box can touch pixels whose centres all miss the field
            if scene.overlaps(field) {
                scenes.push(scene);
            }
        }
        Ok(scenes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalog_and_resolves_paths() {
        let json = r#"{
            "scenes": [
                { "id": "S2A_20250612", "date": "2025-06-12", "cloud_pct": 12.5,
                  "scl": "2025-06-12/SCL.tif", "nir": "2025-06-12/B08.tif",
                  "red": "/data/B04.tif" },
                { "id": "S2B_20250617", "date": "2025-06-17", "CLOUDY_PIXEL_PERCENTAGE": 55.0,
                  "scl": "a.tif", "nir": "b.tif", "red": "c.tif" }
            ]
        }"#;
        let mut catalog: Catalog = serde_json::from_str(json).unwrap();
        catalog.resolve_paths(Path::new("/imagery"));

        assert_eq!(catalog.scenes.len(), 2);
        assert_eq!(catalog.scenes[0].scl, PathBuf::from("/imagery/2025-06-12/SCL.tif"));
        assert_eq!(catalog.scenes[0].red, PathBuf::from("/data/B04.tif"));
        assert_eq!(catalog.scenes[1].cloud_pct, 55.0);
    }
}
