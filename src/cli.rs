use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DetectionConfig;

#[derive(Parser)]
#[command(name = "ndvi-pest-scan")]
#[command(about = "Flag fields whose NDVI stays below their multi-year baseline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON file with detection parameters
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run baseline and season analysis for every field
    Detect {
        /// Scene catalog (JSON)
        #[arg(long)]
        catalog: PathBuf,

        /// Field boundaries (GeoJSON)
        #[arg(long)]
        fields: PathBuf,

        /// Report file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only report fields flagged for pest damage
        #[arg(long)]
        detected_only: bool,

        /// Write each field's latest-date anomaly raster here
        #[arg(long)]
        anomaly_dir: Option<PathBuf>,

        /// I/O threads for band reading
        #[arg(long)]
        io_threads: Option<usize>,

        /// Memory budget for cached band windows, in MB
        #[arg(long)]
        cache_mb: Option<usize>,
    },

    /// Write each field's baseline NDVI raster to GeoTIFF
    Baseline {
        /// Scene catalog (JSON)
        #[arg(long)]
        catalog: PathBuf,

        /// Field boundaries (GeoJSON)
        #[arg(long)]
        fields: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Use float32 instead of int16
        #[arg(long)]
        float: bool,

        /// Scaling factor for fixed-point
        #[arg(long, default_value = "10000", value_parser = clap::value_parser!(i32).range(1..))]
        scale_factor: i32,
    },

    /// Print the effective configuration as JSON
    Config,
}

/// Command-line values that replace the ones from the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Season start (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub season_start: Option<NaiveDate>,

    /// Season end, exclusive (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub season_end: Option<NaiveDate>,

    /// Baseline years (comma separated)
    #[arg(long, value_delimiter = ',', global = true)]
    pub baseline_years: Option<Vec<i32>>,

    /// Max accepted scene cloud percentage
    #[arg(long, global = true)]
    pub cloud_thresh: Option<f32>,

    /// NDVI anomaly threshold (negative)
    #[arg(long, allow_negative_numbers = true, global = true)]
    pub ndvi_threshold: Option<f64>,

    /// Min fraction of pixels below threshold
    #[arg(long, global = true)]
    pub min_frac: Option<f64>,

    /// Consecutive low observations needed
    #[arg(long, global = true)]
    pub consecutive_needed: Option<usize>,

    /// Trailing observations examined
    #[arg(long, global = true)]
    pub recent_window: Option<usize>,
}

impl Overrides {
    pub fn apply(&self, config: &mut DetectionConfig) {
        if let Some(start) = self.season_start {
            config.season_start = start;
        }
        if let Some(end) = self.season_end {
            config.season_end = end;
        }
        if let Some(years) = &self.baseline_years {
            config.baseline_years = years.clone();
        }
        if let Some(cloud) = self.cloud_thresh {
            config.cloud_thresh = cloud;
        }
        if let Some(threshold) = self.ndvi_threshold {
            config.ndvi_anom_threshold = threshold;
        }
        if let Some(min_frac) = self.min_frac {
            config.min_frac = min_frac;
        }
        if let Some(needed) = self.consecutive_needed {
            config.consecutive_needed = needed;
        }
        if let Some(window) = self.recent_window {
            config.recent_window = window;
        }
    }
}
