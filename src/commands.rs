// src/commands.rs
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use log::{info, warn};

use crate::cli::Overrides;
use crate::config::DetectionConfig;
use crate::detect::run_batch;
use crate::io::{load_fields, write_raster, CatalogSource};
use crate::report::{write_report, FieldOutcome, Summary};
use crate::BaselineEstimator;

/// Config file (or defaults) with command-line overrides applied, validated.
pub fn effective_config(path: Option<&Path>, overrides: &Overrides) -> Result<DetectionConfig> {
    let mut config = match path {
        Some(path) => DetectionConfig::from_file(path)?,
        None => DetectionConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate().context("invalid detection parameters")?;
    Ok(config)
}

pub struct DetectArgs<'a> {
    pub catalog: &'a Path,
    pub fields: &'a Path,
    pub output: Option<&'a Path>,
    pub detected_only: bool,
    pub anomaly_dir: Option<&'a Path>,
    pub io_threads: Option<usize>,
    pub cache_mb: Option<usize>,
}

fn open_catalog(
    path: &Path,
    io_threads: Option<usize>,
    cache_mb: Option<usize>,
) -> Result<CatalogSource> {
    let mut source = CatalogSource::open(path)
        .with_context(|| format!("loading scene catalog {}", path.display()))?;
    if let Some(threads) = io_threads {
        source = source.with_io_threads(threads);
    }
    if let Some(megabytes) = cache_mb {
        source = source.with_cache_mb(megabytes);
    }
    Ok(source)
}

pub fn run_detect(config: &DetectionConfig, args: &DetectArgs<'_>) -> Result<Summary> {
    let source = open_catalog(args.catalog, args.io_threads, args.cache_mb)?;
    let fields = load_fields(args.fields)
        .with_context(|| format!("loading fields {}", args.fields.display()))?;

    info!(
        "Starting detection on {} fields with {} catalog scenes...",
        fields.len(),
        source.catalog().scenes.len()
    );

    let runs = run_batch(&source, config, &fields);
    info!(
        "{} band windows cached ({} pixels)",
        source.cache().len(),
        source.cache().pixels()
    );

    if let Some(dir) = args.anomaly_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let mut names = OutputNames::new(dir, "anomaly");
        for (i, run) in runs.iter().enumerate() {
            let Ok(analysis) = &run.analysis else { continue };
            let Some(anomaly) = &analysis.latest_anomaly else { continue };
            let path = names.path_for(i, &run.field);
            write_raster(anomaly, &path, "NDVI anomaly", false, 1)
                .with_context(|| format!("writing {}", path.display()))?;
        }
    }

    let outcomes: Vec<FieldOutcome> = runs.iter().map(|r| r.outcome()).collect();
    match args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_report(&mut writer, &outcomes, args.detected_only)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_report(&mut writer, &outcomes, args.detected_only)?;
            writeln!(writer)?;
        }
    }

    Ok(Summary::of(&outcomes))
}

pub struct BaselineArgs<'a> {
    pub catalog: &'a Path,
    pub fields: &'a Path,
    pub output_dir: &'a Path,
    pub use_fixed_point: bool,
    pub scale_factor: i32,
}

/// Writes one baseline GeoTIFF per field and returns the files written.
pub fn run_baseline(config: &DetectionConfig, args: &BaselineArgs<'_>) -> Result<Vec<PathBuf>> {
    ensure!(
        args.scale_factor > 0,
        "scale factor must be positive, got {}",
        args.scale_factor
    );
    let source = open_catalog(args.catalog, None, None)?;
    let fields = load_fields(args.fields)
        .with_context(|| format!("loading fields {}", args.fields.display()))?;
    fs::create_dir_all(args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let estimator = BaselineEstimator::new(&source, config);
    let mut names = OutputNames::new(args.output_dir, "baseline");
    let mut written = Vec::new();

    for (i, field) in fields.iter().enumerate() {
        info!("[{}/{}] Baseline for {}", i + 1, fields.len(), field.name);
        let baseline = match estimator.estimate(field) {
            Ok(baseline) => baseline,
            Err(e) => {
                warn!("{}: baseline failed: {e}", field.name);
                continue;
            }
        };
        let Some(raster) = &baseline.raster else {
            warn!("{}: no baseline imagery, nothing written", field.name);
            continue;
        };

        let path = names.path_for(i, &field.name);
        write_raster(
            raster,
            &path,
            "NDVI baseline",
            args.use_fixed_point,
            args.scale_factor,
        )
        .with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }

    Ok(written)
}

/// `<dir>/<field>_<kind>.tif` per field, with characters unsafe in file names
/// replaced. A name already handed out gets the field's index appended.
struct OutputNames<'a> {
    dir: &'a Path,
    kind: &'a str,
    taken: HashSet<String>,
}

impl<'a> OutputNames<'a> {
    fn new(dir: &'a Path, kind: &'a str) -> Self {
        Self {
            dir,
            kind,
            taken: HashSet::new(),
        }
    }

    fn path_for(&mut self, index: usize, field: &str) -> PathBuf {
        let stem: String = field
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let mut name = format!("{stem}_{}", self.kind);
        if self.taken.contains(&name) {
            name = format!("{stem}-{index}_{}", self.kind);
        }
        self.taken.insert(name.clone());
        self.dir.join(format!("{name}.tif"))
    }
}
