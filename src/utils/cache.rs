// src/utils/cache.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use itertools::Itertools;
use log::trace;
use parking_lot::Mutex;

use crate::error::SourceError;
use crate::io::{read_bands_parallel, read_grid, BandRequest};
use crate::raster::{GeoInfo, Raster};

/// Default cache budget in pixels, 1 GiB of `f32`.
pub const DEFAULT_CAPACITY_PIXELS: usize = 256 * 1024 * 1024;

struct Entry {
    raster: Arc<Raster>,
    last_used: u64,
}

#[derive(Default)]
struct Bands {
    entries: HashMap<BandRequest, Entry>,
    pixels: usize,
    tick: u64,
}

impl Bands {
    fn touch(&mut self, request: &BandRequest) -> Option<Arc<Raster>> {
        self.tick += 1;
        let entry = self.entries.get_mut(request)?;
        entry.last_used = self.tick;
        Some(entry.raster.clone())
    }

    /// Insert, then drop least recently used bands until the budget holds.
    /// The newest band always stays.
    fn insert(&mut self, request: BandRequest, raster: Arc<Raster>, capacity: usize) {
        if self.entries.contains_key(&request) {
            return;
        }
        self.tick += 1;
        self.pixels += raster.data().len();
        self.entries.insert(
            request,
            Entry {
                raster,
                last_used: self.tick,
            },
        );

        while self.pixels > capacity && self.entries.len() > 1 {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&oldest) {
                self.pixels -= evicted.raster.data().len();
                trace!("evicted {} from band cache", oldest.path.display());
            }
        }
    }
}

/// Thread-safe, size-bounded cache of decoded band windows. Reference-year
/// scenes are shared by every field, so overlapping fields reuse their reads.
pub struct RasterCache {
    bands: Mutex<Bands>,
    grids: Mutex<HashMap<PathBuf, GeoInfo>>,
    capacity: usize,
}

impl RasterCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY_PIXELS)
    }

    /// Cache holding at most `capacity` pixels, plus the band being added.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bands: Mutex::new(Bands::default()),
            grids: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Grid of a band file, read from its header once.
    pub fn grid(&self, path: &Path) -> Result<GeoInfo, SourceError> {
        if let Some(grid) = self.grids.lock().get(path) {
            return Ok(grid.clone());
        }
        let grid = read_grid(path)?;
        self.grids.lock().insert(path.to_path_buf(), grid.clone());
        Ok(grid)
    }

    /// Rasters for `requests`, in order. Bands not cached yet are read in
    /// parallel outside the lock.
    pub fn load(
        &self,
        requests: &[BandRequest],
        io_threads: usize,
    ) -> Result<Vec<Arc<Raster>>, SourceError> {
        let mut found: Vec<Option<Arc<Raster>>> = {
            let mut bands = self.bands.lock();
            requests.iter().map(|r| bands.touch(r)).collect()
        };

        let missing: Vec<BandRequest> = requests
            .iter()
            .zip(&found)
            .filter(|(_, hit)| hit.is_none())
            .map(|(r, _)| r.clone())
            .unique()
            .collect();
        if missing.is_empty() {
            return found
                .into_iter()
                .map(|hit| hit.ok_or(SourceError::ReaderPool))
                .collect();
        }

        let loaded: HashMap<BandRequest, Arc<Raster>> = missing
            .iter()
            .cloned()
            .zip(read_bands_parallel(&missing, io_threads)?.into_iter().map(Arc::new))
            .collect();

        for (request, hit) in requests.iter().zip(found.iter_mut()) {
            if hit.is_none() {
                *hit = loaded.get(request).cloned();
            }
        }

        let mut bands = self.bands.lock();
        for (request, raster) in loaded {
            bands.insert(request, raster, self.capacity);
        }
        drop(bands);

        found
            .into_iter()
            .map(|hit| hit.ok_or(SourceError::ReaderPool))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bands.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixels currently held.
    pub fn pixels(&self) -> usize {
        self.bands.lock().pixels
    }
}

impl Default for RasterCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(name: &str) -> (BandRequest, Arc<Raster>) {
        let raster = Raster::filled(GeoInfo::north_up(10, 10, 0.0, 100.0, 10.0), 0.5);
        (BandRequest::new(name, None), Arc::new(raster))
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut bands = Bands::default();
        let (a, ra) = band("a.tif");
        let (b, rb) = band("b.tif");
        let (c, rc) = band("c.tif");

        bands.insert(a.clone(), ra, 250);
        bands.insert(b.clone(), rb, 250);
        // a is used again, so b is the oldest when c arrives
        assert!(bands.touch(&a).is_some());
        bands.insert(c.clone(), rc, 250);

        assert_eq!(bands.entries.len(), 2);
        assert_eq!(bands.pixels, 200);
        assert!(bands.touch(&b).is_none());
        assert!(bands.touch(&a).is_some());
        assert!(bands.touch(&c).is_some());
    }

    #[test]
    fn oversized_band_is_kept_alone() {
        let mut bands = Bands::default();
        let (a, ra) = band("a.tif");
        let (b, rb) = band("b.tif");
        bands.insert(a.clone(), ra, 50);
        assert_eq!(bands.entries.len(), 1);
        bands.insert(b.clone(), rb, 50);
        assert_eq!(bands.entries.len(), 1);
        assert!(bands.touch(&b).is_some());
        assert_eq!(bands.pixels, 100);
    }
}
