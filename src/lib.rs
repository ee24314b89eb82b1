// src/lib.rs
pub mod anomaly;
pub mod baseline;
pub mod cli;
pub mod commands;
pub mod config;
pub mod detect;
pub mod error;
pub mod geometry;
pub mod io;
pub mod processing;
pub mod raster;
pub mod reduce;
pub mod report;
pub mod source;
pub mod utils;

pub use baseline::{Baseline, BaselineEstimator};
pub use config::DetectionConfig;
pub use detect::{analyze_field, run_batch, FieldAnalysis, FieldRun, SeasonAnalyzer};
pub use error::{ConfigError, SourceError};
pub use geometry::Field;
pub use raster::{GeoInfo, Raster};
pub use report::{DetectionResult, FieldOutcome};
pub use source::{DateWindow, ImagerySource, MemorySource, Scene, SceneQuery};

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
