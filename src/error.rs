// src/error.rs
use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Failures of the imagery or field inputs. Missing pixels are never an error;
/// these are the faults that make a whole field unanalysable.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scene catalog {path}: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("GDAL error on {path}: {source}")]
    Gdal {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("raster grid mismatch: expected {expected}, found {found}")]
    GridMismatch { expected: String, found: String },

    #[error("invalid field geometry: {0}")]
    Geometry(String),

    #[error("band reader pool stopped before all bands were read")]
    ReaderPool,
}

/// Rejected detection parameters.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("season start {start} must be before season end {end}")]
    EmptySeason { start: NaiveDate, end: NaiveDate },

    #[error("at least one baseline year is required")]
    NoBaselineYears,

    #[error("baseline year {0} cannot hold the season's calendar window")]
    InvalidBaselineYear(i32),

    #[error("baseline year {year} overlaps the evaluation season ({start} to {end})")]
    BaselineOverlapsSeason {
        year: i32,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("{name} must be at least 1")]
    ZeroCount { name: &'static str },

    #[error("min_frac must lie in [0, 1], got {0}")]
    MinFracOutOfRange(f64),

    #[error("cloud_thresh must lie in (0, 100], got {0}")]
    CloudThreshOutOfRange(f32),
}
