// src/source.rs
use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::geometry::Field;
use crate::raster::{GeoInfo, Raster};

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    pub fn overlaps(&self, other: &DateWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The same calendar window moved to start in `year`. A window that spans
    /// the new year keeps its span. Feb 29 becomes Feb 28 in common years.
    pub fn in_year(&self, year: i32) -> Option<DateWindow> {
        let span = self.end.year() - self.start.year();
        Some(DateWindow {
            start: same_day_in_year(self.start, year)?,
            end: same_day_in_year(self.end, year.checked_add(span)?)?,
        })
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

fn same_day_in_year(date: NaiveDate, year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), date.day() - 1))
}

/// Scene filter: capture date inside the window and whole-scene cloud cover
/// strictly below the limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneQuery {
    pub window: DateWindow,
    pub max_cloud_pct: f32,
}

impl SceneQuery {
    pub fn new(window: DateWindow, max_cloud_pct: f32) -> Self {
        Self {
            window,
            max_cloud_pct,
        }
    }

    pub fn matches(&self, date: NaiveDate, cloud_pct: f32) -> bool {
        self.window.contains(date) && cloud_pct < self.max_cloud_pct
    }
}

/// One satellite pass with its scene-classification, near-infrared and red bands.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub date: NaiveDate,
    pub cloud_pct: f32,
    pub scl: Arc<Raster>,
    pub nir: Arc<Raster>,
    pub red: Arc<Raster>,
}

impl Scene {
    /// Bands must be co-registered.
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        cloud_pct: f32,
        scl: Arc<Raster>,
        nir: Arc<Raster>,
        red: Arc<Raster>,
    ) -> Result<Self, SourceError> {
        scl.geo().ensure_same_grid(nir.geo())?;
        scl.geo().ensure_same_grid(red.geo())?;
        Ok(Self {
            id: id.into(),
            date,
            cloud_pct,
            scl,
            nir,
            red,
        })
    }

    pub fn grid(&self) -> &GeoInfo {
        self.scl.geo()
    }

    pub fn overlaps(&self, field: &Field) -> bool {
        !field.region(self.grid()).is_empty()
    }
}

/// Supplier of imagery for a field. Implementations return the scenes that
/// overlap the field and match the query, sorted by capture date.
pub trait ImagerySource: Sync {
    fn scenes(&self, field: &Field, query: &SceneQuery) -> Result<Vec<Scene>, SourceError>;
}

/// Imagery held in memory, for callers that already have their rasters loaded.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    scenes: Vec<Scene>,
}

impl MemorySource {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }
}

impl ImagerySource for MemorySource {
    fn scenes(&self, field: &Field, query: &SceneQuery) -> Result<Vec<Scene>, SourceError> {
        Ok(self
            .scenes
            .iter()
            .filter(|s| query.matches(s.date, s.cloud_pct) && s.overlaps(field))
            .sorted_by_key(|s| s.date)
            .cloned()
            .collect())
    }
}
