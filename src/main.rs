// src/main.rs
use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};

use ndvi_pest_scan::cli::{Cli, Commands};
use ndvi_pest_scan::commands::{
    effective_config, run_baseline, run_detect, BaselineArgs, DetectArgs,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut builder = Builder::from_env(Env::default().default_filter_or(level));
    builder.format_timestamp_secs();
    builder.init();

    let config = effective_config(cli.config.as_deref(), &cli.overrides)?;

    match &cli.command {
        Commands::Detect {
            catalog,
            fields,
            output,
            detected_only,
            anomaly_dir,
            io_threads,
            cache_mb,
        } => {
            let summary = run_detect(
                &config,
                &DetectArgs {
                    catalog,
                    fields,
                    output: output.as_deref(),
                    detected_only: *detected_only,
                    anomaly_dir: anomaly_dir.as_deref(),
                    io_threads: *io_threads,
                    cache_mb: *cache_mb,
                },
            )?;
            eprintln!("Detection complete: {summary}");
        }
        Commands::Baseline {
            catalog,
            fields,
            output_dir,
            float,
            scale_factor,
        } => {
            let written = run_baseline(
                &config,
                &BaselineArgs {
                    catalog,
                    fields,
                    output_dir,
                    use_fixed_point: !float,
                    scale_factor: *scale_factor,
                },
            )?;
            eprintln!("Baseline complete: {} rasters in {}", written.len(), output_dir.display());
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
