use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hlsmosaic::{Pass, PipelineConfig, RunReport, run_pipeline};

use super::args::CliArgs;
use super::errors::AppError;

const ALL_PASSES: [Pass; 3] = [Pass::Organize, Pass::Composite, Pass::Mosaic];

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Build the effective configuration: file (or defaults) overridden by flags
fn load_config(args: &CliArgs) -> Result<PipelineConfig, AppError> {
    let mut config = match &args.config {
        Some(path) if !path.is_file() => {
            return Err(AppError::MissingConfig {
                path: path.display().to_string(),
            });
        }
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(root) = &args.root_dir {
        config.root_dir = root.clone();
    }
    if !args.seasons.is_empty() {
        config.seasons = args.seasons.clone();
    }
    if !args.sensors.is_empty() {
        config.sensors = args.sensors.clone();
    }
    if let Some(reducer) = args.reducer {
        config.reducer = reducer;
    }
    if let Some(resampling) = args.resampling {
        config.mosaic_resampling = resampling;
    }
    if args.stop_on_error {
        config.continue_on_error = false;
    }

    for sensor in &config.sensors {
        if config.bands_for(sensor).is_empty() {
            return Err(AppError::UnknownSensor {
                sensor: sensor.clone(),
                available: config
                    .bands_by_sensor
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
    }
    Ok(config)
}

fn log_summary(report: &RunReport) {
    for unit in report.failures() {
        error!("Failed: {}", unit);
    }
    info!("Processing complete!");
    info!("Processed: {}", report.processed());
    info!("Skipped: {}", report.skipped());
    info!("Errors: {}", report.errors());
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);

    let config = load_config(&args)?;
    let passes: Vec<Pass> = if args.passes.is_empty() {
        ALL_PASSES.to_vec()
    } else {
        args.passes.clone()
    };

    info!("Root directory: {:?}", config.root_dir);
    info!(
        "Seasons: {:?}, sensors: {:?}, reducer: {}, mosaic resampling: {}",
        config.seasons, config.sensors, config.reducer, config.mosaic_resampling
    );
    if !config.continue_on_error {
        warn!("Stopping at the first failed unit");
    }

    let report = run_pipeline(&config, &passes).map_err(AppError::from)?;
    log_summary(&report);
    Ok(())
}
