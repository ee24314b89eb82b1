// src/config.rs
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::processing::{CloudMask, DEFAULT_MASK_CODES};
use crate::source::{DateWindow, SceneQuery};

/// Detection parameters. Built once, validated, then shared read-only by the
/// baseline estimator and the season analyzer.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    #[serde(default = "default_season_start")]
    pub season_start: NaiveDate,
    #[serde(default = "default_season_end")]
    pub season_end: NaiveDate,
    #[serde(default = "default_baseline_years")]
    pub baseline_years: Vec<i32>,
    /// Scenes with this much whole-scene cloud cover or more are dropped.
    #[serde(default = "default_cloud_thresh")]
    pub cloud_thresh: f32,
    #[serde(default = "default_ndvi_anom_threshold")]
    pub ndvi_anom_threshold: f64,
    #[serde(default = "default_min_frac")]
    pub min_frac: f64,
    #[serde(default = "default_consecutive_needed")]
    pub consecutive_needed: usize,
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
    #[serde(default = "default_mask_codes")]
    pub mask_codes: Vec<u8>,
}

fn default_season_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default()
}

fn default_season_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 1).unwrap_or_default()
}

fn default_baseline_years() -> Vec<i32> {
    (2019..=2023).collect()
}

fn default_cloud_thresh() -> f32 {
    40.0
}

fn default_ndvi_anom_threshold() -> f64 {
    -0.12
}

fn default_min_frac() -> f64 {
    0.15
}

fn default_consecutive_needed() -> usize {
    3
}

fn default_recent_window() -> usize {
    5
}

fn default_mask_codes() -> Vec<u8> {
    DEFAULT_MASK_CODES.to_vec()
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            season_start: default_season_start(),
            season_end: default_season_end(),
            baseline_years: default_baseline_years(),
            cloud_thresh: default_cloud_thresh(),
            ndvi_anom_threshold: default_ndvi_anom_threshold(),
            min_frac: default_min_frac(),
            consecutive_needed: default_consecutive_needed(),
            recent_window: default_recent_window(),
            mask_codes: default_mask_codes(),
        }
    }
}

impl DetectionConfig {
    /// Read a JSON config. Missing keys take their defaults; the result is not
    /// validated yet so command-line overrides can still be applied.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn season(&self) -> DateWindow {
        DateWindow::new(self.season_start, self.season_end)
    }

    pub fn season_query(&self) -> SceneQuery {
        SceneQuery::new(self.season(), self.cloud_thresh)
    }

    /// Query for the season's calendar window in a reference year.
    pub fn baseline_query(&self, year: i32) -> Option<SceneQuery> {
        self.season()
            .in_year(year)
            .map(|window| SceneQuery::new(window, self.cloud_thresh))
    }

    pub fn cloud_mask(&self) -> CloudMask {
        CloudMask::new(self.mask_codes.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let season = self.season();
        if season.start >= season.end {
            return Err(ConfigError::EmptySeason {
                start: season.start,
                end: season.end,
            });
        }
        if self.baseline_years.is_empty() {
            return Err(ConfigError::NoBaselineYears);
        }
        for &year in &self.baseline_years {
            let window = season
                .in_year(year)
                .ok_or(ConfigError::InvalidBaselineYear(year))?;
            if window.overlaps(&season) {
                return Err(ConfigError::BaselineOverlapsSeason {
                    year,
                    start: window.start,
                    end: window.end,
                });
            }
        }
        if self.consecutive_needed == 0 {
            return Err(ConfigError::ZeroCount {
                name: "consecutive_needed",
            });
        }
        if self.recent_window == 0 {
            return Err(ConfigError::ZeroCount {
                name: "recent_window",
            });
        }
        if !(0.0..=1.0).contains(&self.min_frac) {
            return Err(ConfigError::MinFracOutOfRange(self.min_frac));
        }
        if !(self.cloud_thresh > 0.0 && self.cloud_thresh <= 100.0) {
            return Err(ConfigError::CloudThreshOutOfRange(self.cloud_thresh));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = DetectionConfig::default();
        assert_eq!(config.season_start.to_string(), "2025-06-01");
        assert_eq!(config.season_end.to_string(), "2025-10-01");
        assert_eq!(config.baseline_years, vec![2019, 2020, 2021, 2022, 2023]);
        assert_eq!(config.cloud_thresh, 40.0);
        assert_eq!(config.ndvi_anom_threshold, -0.12);
        assert_eq!(config.min_frac, 0.15);
        assert_eq!(config.consecutive_needed, 3);
        assert_eq!(config.recent_window, 5);
        assert_eq!(config.mask_codes, vec![3, 8, 9, 10]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: DetectionConfig =
            serde_json::from_str(r#"{ "min_frac": 0.1, "consecutive_needed": 2 }"#).unwrap();
        assert_eq!(config.min_frac, 0.1);
        assert_eq!(config.consecutive_needed, 2);
        assert_eq!(config.recent_window, 5);
        assert_eq!(config.baseline_years.len(), 5);
    }

    #[test]
    fn baseline_year_inside_season_is_rejected() {
        let config = DetectionConfig {
            baseline_years: vec![2021, 2025],
            ..DetectionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BaselineOverlapsSeason { year: 2025, .. })
        ));
    }

    #[test]
    fn zero_counts_are_rejected() {
        let config = DetectionConfig {
            consecutive_needed: 0,
            ..DetectionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroCount { name: "consecutive_needed" })
        ));

        let config = DetectionConfig {
            min_frac: 1.5,
            ..DetectionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MinFracOutOfRange(_))));
    }

    #[test]
    fn baseline_query_uses_season_calendar_window() {
        let config = DetectionConfig::default();
        let query = config.baseline_query(2020).unwrap();
        assert_eq!(query.window.start.to_string(), "2020-06-01");
        assert_eq!(query.window.end.to_string(), "2020-10-01");
        assert_eq!(query.max_cloud_pct, 40.0);
    }
}
