// src/report.rs
use std::fmt;
use std::io::Write;

use serde::Serialize;

/// Detection outcome of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub field: String,
    /// Season scenes analysed.
    pub n_images: usize,
    /// Share of valid field pixels below the anomaly threshold on the latest date.
    pub frac_below: f64,
    pub pest_detected: bool,
    pub baseline_mean: f64,
    /// Anomalies of the trailing window, oldest first.
    pub last_anomalies: Vec<f64>,
    pub consecutive_flag: bool,
    pub pix_below: usize,
    pub pix_total: usize,
    pub area_ha: f64,
    pub perimeter_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldOutcome {
    Analyzed(DetectionResult),
    Failed { field: String, error: String },
}

impl FieldOutcome {
    pub fn is_detected(&self) -> bool {
        matches!(self, FieldOutcome::Analyzed(r) if r.pest_detected)
    }
}

/// Write outcomes as a pretty JSON array, optionally keeping only fields
/// flagged for pest damage.
pub fn write_report<W: Write>(
    writer: W,
    outcomes: &[FieldOutcome],
    detected_only: bool,
) -> serde_json::Result<()> {
    let selected: Vec<&FieldOutcome> = outcomes
        .iter()
        .filter(|o| !detected_only || o.is_detected())
        .collect();
    serde_json::to_writer_pretty(writer, &selected)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub analyzed: usize,
    pub detected: usize,
    pub failed: usize,
}

impl Summary {
    pub fn of(outcomes: &[FieldOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut s, o| {
            match o {
                FieldOutcome::Analyzed(r) => {
                    s.analyzed += 1;
                    if r.pest_detected {
                        s.detected += 1;
                    }
                }
                FieldOutcome::Failed { .. } => s.failed += 1,
            }
            s
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fields analysed, {} with pest damage, {} failed",
            self.analyzed, self.detected, self.failed
        )
    }
}
