use clap::Parser;
use std::path::PathBuf;

use hlsmosaic::{Pass, Reducer, Resampling};

#[derive(Parser)]
#[command(name = "hlsmosaic", version, about = "HLS seasonal composite and mosaic builder")]
pub struct CliArgs {
    /// JSON pipeline configuration; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root folder holding one subfolder per season
    #[arg(short, long)]
    pub root_dir: Option<PathBuf>,

    /// Season to process (repeatable; default: all configured seasons)
    #[arg(long = "season")]
    pub seasons: Vec<String>,

    /// Sensor to process, e.g. L30 or S30 (repeatable; default: all configured sensors)
    #[arg(long = "sensor")]
    pub sensors: Vec<String>,

    /// Pass to run (repeatable; default: organize, composite and mosaic)
    #[arg(long = "pass", value_enum)]
    pub passes: Vec<Pass>,

    /// Pixel reducer used when merging a tile across dates
    #[arg(long, value_enum)]
    pub reducer: Option<Reducer>,

    /// Resampling kernel used to blend overlapping tiles in the mosaic
    #[arg(long, value_enum)]
    pub resampling: Option<Resampling>,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub log: bool,

    /// Abort on the first failed unit instead of logging it and continuing
    #[arg(long, default_value_t = false)]
    pub stop_on_error: bool,
}
