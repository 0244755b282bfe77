#![doc = r#"
hlsmosaic: seasonal composites and mosaics from Harmonized Landsat Sentinel-2 (HLS) granules.

This crate turns a season folder of raw HLS downloads (single-band GeoTIFFs, browse
images and CMR XML descriptors) into an organized `<season>/<sensor>/<tile>/<date>/`
tree, a per-season metadata table, per-acquisition multi-band composites, per-tile
min/max composites and one mosaic per season and sensor. It powers the `hlsmosaic`
CLI and can be embedded in your own Rust applications.

Requirements
------------
- GDAL development headers and runtime available on your system.
- Rust 2024 edition toolchain.

Run the whole pipeline
----------------------
```rust,no_run
use std::path::PathBuf;
use hlsmosaic::{run_pipeline, Pass, PipelineConfig, Reducer};

fn main() -> hlsmosaic::Result<()> {
    let config = PipelineConfig {
        root_dir: PathBuf::from("/data/RMF_HLS"),
        seasons: vec!["summer".into()],
        reducer: Reducer::Max,
        ..PipelineConfig::default()
    };

    let report = run_pipeline(&config, &[Pass::Organize, Pass::Composite, Pass::Mosaic])?;
    println!("processed={} skipped={} errors={}", report.processed(), report.skipped(), report.errors());
    Ok(())
}
```

Individual stages
-----------------
```rust,no_run
use std::path::{Path, PathBuf};
use hlsmosaic::{composite_bands, merge_rasters, mosaic_rasters, Reducer, Resampling};

fn main() -> hlsmosaic::Result<()> {
    let bands: Vec<PathBuf> = ["B02", "B03", "B04"]
        .iter()
        .map(|b| PathBuf::from(format!("/data/HLS.S30.T17SLB.2020273T160941.v2.0.{b}.tif")))
        .collect();
    let labels: Vec<String> = vec!["B02".into(), "B03".into(), "B04".into()];
    composite_bands(&bands, Path::new("/out/T17SLB_2020273T160941.tif"), &labels)?;

    let dates = vec![
        PathBuf::from("/out/T17SLB_2020273T160941.tif"),
        PathBuf::from("/out/T17SLB_2020283T160941.tif"),
    ];
    merge_rasters(&dates, Path::new("/out/tiles/T17SLB.tif"), Reducer::Min)?;

    let tiles = vec![PathBuf::from("/out/tiles/T17SLB.tif"), PathBuf::from("/out/tiles/T17SMB.tif")];
    mosaic_rasters(&tiles, Path::new("/out/mosaic.tif"), Resampling::Bilinear)?;
    Ok(())
}
```

Error handling
--------------
All public functions return `hlsmosaic::Result<T>`; match on `hlsmosaic::Error` to handle
specific cases, e.g. descriptor or raster errors.

```rust,no_run
use std::path::Path;
use hlsmosaic::{Error, RasterError};
use hlsmosaic::io::descriptor::extract_descriptor;

fn main() {
    match extract_descriptor(Path::new("/data/HLS.S30.T17SLB.2020273T160941.v2.0.cmr.xml")) {
        Ok((record, csv)) => println!("{} -> {:?}", record.file_name, csv),
        Err(Error::Descriptor(e)) => eprintln!("Descriptor error: {e}"),
        Err(Error::Raster(RasterError::Gdal(e))) => eprintln!("GDAL error: {e}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: the three pipeline passes and the run report.
- [`core`]: configuration, grid math, folder organization and processing stages.
- [`io`]: HLS names, descriptors, the metadata table and GDAL readers/writers.
- [`types`]: shared enums (`Reducer`, `Resampling`, `Pass`, ...).
- [`error`]: crate-level `Error` and `Result`.
"#]

pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::grid::{Bounds, GeoTransform, Grid};
pub use core::params::PipelineConfig;
pub use error::{Error, Result};
pub use types::{MergeMethod, Pass, PixelType, Reducer, Resampling};

// Readers and records
pub use io::{
    BandFile, DescriptorError, GdalRasterReader, GranuleId, GranuleIdError, GranuleRecord,
    MetadataTable, Raster, RasterError,
};

// Writers
pub use io::writers::metadata::{embed_tiff_metadata, provenance_fields};
pub use io::writers::write_tiff;

// Processing stages
pub use core::processing::composite::composite_bands;
pub use core::processing::merge::{merge, merge_rasters};
pub use core::processing::mosaic::mosaic_rasters;
pub use core::processing::reproject::{reproject_raster, reproject_rasters};

// High-level API re-exports
pub use api::{
    RunReport, UnitOutcome, UnitReport, composite_sensor, mosaic_sensor, organize_season,
    run_pipeline,
};
