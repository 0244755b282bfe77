//! High-level library API: the three-pass seasonal pipeline.
//!
//! Pass 1 ([`organize_season`]) moves raw granule files into the
//! `<season>/<sensor>/<tile>/<acquisition>/` hierarchy and builds `hls_images.csv`.
//! Pass 2 ([`composite_sensor`]) stacks the bands of every acquisition folder into
//! one composite. Pass 3 ([`mosaic_sensor`]) merges composites per tile and mosaics
//! the tiles. [`run_pipeline`] drives the passes over the season × sensor matrix
//! and aggregates every unit's outcome into a [`RunReport`].
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::core::organize::{
    band_files, find_leaf_dirs, list_files, move_into_hierarchy, organize_granule_file,
};
use crate::core::params::PipelineConfig;
use crate::core::processing::composite::composite_bands;
use crate::core::processing::merge::merge_rasters;
use crate::core::processing::mosaic::mosaic_rasters;
use crate::error::{Error, Result};
use crate::io::descriptor::extract_descriptor;
use crate::io::granule::GranuleId;
use crate::io::table::{MetadataTable, SEASON_TABLE, aggregate_tables};
use crate::types::{Pass, Reducer, Resampling};

pub const COMPOSITES_DIR: &str = "composites";
pub const TILE_COMPOSITES_DIR: &str = "tile_composites";
pub const MOSAIC_DIR: &str = "mosaic";
pub const MOSAIC_FILE: &str = "mosaic.tif";

/// Outcome of one unit of work (a file, an acquisition folder, a sensor)
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    /// Produced or moved the given path
    Succeeded(PathBuf),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitReport {
    pub pass: Pass,
    pub season: String,
    pub sensor: Option<String>,
    pub unit: String,
    pub outcome: UnitOutcome,
}

impl fmt::Display for UnitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.pass, self.season)?;
        if let Some(sensor) = &self.sensor {
            write!(f, "/{}", sensor)?;
        }
        write!(f, " {}", self.unit)
    }
}

/// Per-unit outcomes of a pipeline run, in execution order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub units: Vec<UnitReport>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Succeeded(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Skipped(_)))
    }

    pub fn errors(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Failed(_)))
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitReport> {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, UnitOutcome::Failed(_)))
    }

    pub fn for_pass(&self, pass: Pass) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(move |u| u.pass == pass)
    }

    pub fn merge(&mut self, other: RunReport) {
        self.units.extend(other.units);
    }

    fn count(&self, pred: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.units.iter().filter(|u| pred(&u.outcome)).count()
    }
}

/// Where a unit belongs and what to do when it fails
struct Scope<'a> {
    pass: Pass,
    season: &'a str,
    sensor: Option<&'a str>,
    continue_on_error: bool,
}

impl Scope<'_> {
    fn unit(&self, unit: String, outcome: UnitOutcome) -> UnitReport {
        UnitReport {
            pass: self.pass,
            season: self.season.to_string(),
            sensor: self.sensor.map(str::to_string),
            unit,
            outcome,
        }
    }

    fn skip(&self, report: &mut RunReport, unit: String, reason: String) {
        let entry = self.unit(unit, UnitOutcome::Skipped(reason.clone()));
        warn!("Skipping {}: {}", entry, reason);
        report.units.push(entry);
    }

    /// Record a unit result. Failures are logged at ERROR level and returned
    /// when the run must stop.
    fn record(&self, report: &mut RunReport, unit: String, result: Result<PathBuf>) -> Result<()> {
        match result {
            Ok(path) => {
                report.units.push(self.unit(unit, UnitOutcome::Succeeded(path)));
                Ok(())
            }
            Err(e) => {
                let entry = self.unit(unit, UnitOutcome::Failed(e.to_string()));
                error!("Error processing {}: {}", entry, e);
                report.units.push(entry);
                if self.continue_on_error { Ok(()) } else { Err(e) }
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn season_name(season_dir: &Path) -> String {
    display_name(season_dir)
}

/// Extract a descriptor's table, then move the descriptor next to its granule
fn organize_descriptor(season_dir: &Path, xml: &Path) -> Result<PathBuf> {
    let (record, _csv) = extract_descriptor(xml)?;
    let granule = record.granule_id()?;
    move_into_hierarchy(season_dir, xml, &granule)
}

fn organize(season_dir: &Path, continue_on_error: bool) -> Result<RunReport> {
    let season = season_name(season_dir);
    let scope = Scope {
        pass: Pass::Organize,
        season: &season,
        sensor: None,
        continue_on_error,
    };
    let mut report = RunReport::default();
    info!("Organizing {:?}", season_dir);

    for file in list_files(season_dir, &["tif", "jpg"])? {
        let name = display_name(&file);
        if let Err(e) = GranuleId::parse(&name) {
            scope.skip(&mut report, name, e.to_string());
            continue;
        }
        scope.record(&mut report, name, organize_granule_file(season_dir, &file))?;
    }

    for xml in list_files(season_dir, &["xml"])? {
        let name = display_name(&xml);
        scope.record(&mut report, name, organize_descriptor(season_dir, &xml))?;
    }

    // The previous season table is folded in first so re-runs keep earlier rows
    let table_path = season_dir.join(SEASON_TABLE);
    let mut inputs = Vec::new();
    if table_path.is_file() {
        inputs.push(table_path.clone());
    }
    inputs.extend(
        list_files(season_dir, &["csv"])?
            .into_iter()
            .filter(|p| *p != table_path),
    );
    if inputs.is_empty() {
        scope.skip(&mut report, SEASON_TABLE.to_string(), "no metadata tables found".into());
    } else {
        let result = aggregate_tables(&inputs, &table_path).map(|_| table_path.clone());
        scope.record(&mut report, SEASON_TABLE.to_string(), result)?;
    }
    Ok(report)
}

/// Pass 1: organize one season folder and build its metadata table.
///
/// Raster and browse files named like HLS granules are moved into
/// `<sensor>/<tile>/<acquisition>/`; other files are skipped. Each XML descriptor
/// yields a single-row `<GranuleUR>.csv` and is moved next to its granule. All
/// per-granule tables are then aggregated into `hls_images.csv` and deleted.
/// A failed descriptor is recorded and the remaining granules still processed.
pub fn organize_season(season_dir: &Path) -> Result<RunReport> {
    organize(season_dir, true)
}

fn composite_leaf(leaf: &Path, out_dir: &Path, bands: &[String]) -> Result<Option<PathBuf>> {
    let found = band_files(leaf, bands)?;
    let Some((_, first)) = found.first() else {
        return Ok(None);
    };
    let missing: Vec<&str> = bands
        .iter()
        .filter(|b| !found.iter().any(|(_, bf)| bf.band == **b))
        .map(String::as_str)
        .collect();
    // A partial stack would misalign bands when merged with complete ones
    if !missing.is_empty() {
        return Err(Error::MissingBands {
            dir: leaf.display().to_string(),
            bands: missing.join(", "),
        });
    }

    let output = out_dir.join(first.granule.composite_file_name());
    let inputs: Vec<PathBuf> = found.iter().map(|(p, _)| p.clone()).collect();
    let labels: Vec<String> = found.iter().map(|(_, bf)| bf.band.clone()).collect();
    composite_bands(&inputs, &output, &labels)?;
    Ok(Some(output))
}

fn composite(
    sensor_dir: &Path,
    season: &str,
    sensor: &str,
    bands: &[String],
    continue_on_error: bool,
) -> Result<RunReport> {
    let scope = Scope {
        pass: Pass::Composite,
        season,
        sensor: Some(sensor),
        continue_on_error,
    };
    let mut report = RunReport::default();
    let out_dir = sensor_dir.join(COMPOSITES_DIR);
    if out_dir.exists() {
        std::fs::remove_dir_all(&out_dir)?;
    }
    std::fs::create_dir_all(&out_dir)?;
    info!("Processing images in: {:?}", sensor_dir);

    for leaf in find_leaf_dirs(sensor_dir, &[COMPOSITES_DIR, MOSAIC_DIR])? {
        let unit = leaf
            .strip_prefix(sensor_dir)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| leaf.display().to_string());
        match composite_leaf(&leaf, &out_dir, bands) {
            Ok(Some(output)) => scope.record(&mut report, unit, Ok(output))?,
            Ok(None) => scope.skip(&mut report, unit, "no band files of interest".into()),
            Err(e) => scope.record(&mut report, unit, Err(e))?,
        }
    }
    Ok(report)
}

/// Pass 2: build one multi-band composite per acquisition folder below
/// `<season>/<sensor>`, written to `composites/<tile>_<acquisition>.tif`.
///
/// The `composites` folder is regenerated on every run. Bands are stacked in the
/// order of `bands`; folders without any band of interest are skipped, folders
/// missing some of them fail, and a failed folder does not stop the others.
pub fn composite_sensor(sensor_dir: &Path, bands: &[String]) -> Result<RunReport> {
    let sensor = display_name(sensor_dir);
    let season = sensor_dir.parent().map(season_name).unwrap_or_default();
    composite(sensor_dir, &season, &sensor, bands, true)
}

/// Pass 3 for one sensor: merge each tile's composites with `reducer` into
/// `composites/tile_composites/<tile>.tif`, then mosaic every tile composite into
/// `mosaic/mosaic.tif`. Returns the mosaic path.
///
/// Only tile composites produced by this call enter the mosaic; leftovers from
/// earlier runs in `tile_composites` are ignored.
///
/// Tiles and their granules come from the season table; composites that are not on
/// disk are skipped with a warning.
pub fn mosaic_sensor(
    sensor_dir: &Path,
    sensor: &str,
    table: &MetadataTable,
    reducer: Reducer,
    resampling: Resampling,
) -> Result<PathBuf> {
    let comp_dir = sensor_dir.join(COMPOSITES_DIR);
    let tile_dir = comp_dir.join(TILE_COMPOSITES_DIR);

    let mut tiles = Vec::new();
    for tile in table.tiles(sensor) {
        info!("Generating tile composite for {}", tile);
        let mut inputs = Vec::new();
        for file in table.files(sensor, &tile) {
            let path = comp_dir.join(GranuleId::parse(&file)?.composite_file_name());
            if path.is_file() {
                inputs.push(path);
            } else {
                warn!("Composite {:?} for {} not found; skipping", path, file);
            }
        }
        if inputs.is_empty() {
            warn!("No composites for tile {}; skipping", tile);
            continue;
        }
        let tile_path = tile_dir.join(format!("{}.tif", tile));
        merge_rasters(&inputs, &tile_path, reducer)?;
        tiles.push(tile_path);
    }

    if tiles.is_empty() {
        return Err(Error::MissingInput(format!("no tile composites in {:?}", tile_dir)));
    }
    let output = sensor_dir.join(MOSAIC_DIR).join(MOSAIC_FILE);
    info!("Creating {} mosaic from {} tiles", sensor, tiles.len());
    mosaic_rasters(&tiles, &output, resampling)?;
    Ok(output)
}

/// Run the selected passes over every configured season and sensor.
///
/// Passes run in the fixed order organize, composite, mosaic regardless of the
/// order in `passes`. Every unit outcome lands in the returned report; with
/// `continue_on_error` unset the first failure is returned instead.
pub fn run_pipeline(config: &PipelineConfig, passes: &[Pass]) -> Result<RunReport> {
    let mut report = RunReport::default();
    let runs = |p: Pass| passes.contains(&p);

    if runs(Pass::Organize) {
        for season in &config.seasons {
            let season_dir = config.season_dir(season);
            let scope = Scope {
                pass: Pass::Organize,
                season: season.as_str(),
                sensor: None,
                continue_on_error: config.continue_on_error,
            };
            match organize(&season_dir, config.continue_on_error) {
                Ok(r) => report.merge(r),
                Err(e) => scope.record(&mut report, season_dir.display().to_string(), Err(e))?,
            }
        }
    }

    if runs(Pass::Composite) {
        for season in &config.seasons {
            for sensor in &config.sensors {
                let sensor_dir = config.sensor_dir(season, sensor);
                let scope = Scope {
                    pass: Pass::Composite,
                    season: season.as_str(),
                    sensor: Some(sensor.as_str()),
                    continue_on_error: config.continue_on_error,
                };
                if !sensor_dir.is_dir() {
                    scope.skip(&mut report, sensor_dir.display().to_string(), "folder not found".into());
                    continue;
                }
                let bands = config.bands_for(sensor);
                if bands.is_empty() {
                    scope.skip(&mut report, sensor.clone(), "no bands configured".into());
                    continue;
                }
                match composite(&sensor_dir, season, sensor, bands, config.continue_on_error) {
                    Ok(r) => report.merge(r),
                    Err(e) => scope.record(&mut report, sensor_dir.display().to_string(), Err(e))?,
                }
            }
        }
    }

    if runs(Pass::Mosaic) {
        for season in &config.seasons {
            let table_path = config.season_dir(season).join(SEASON_TABLE);
            let table = MetadataTable::read(&table_path);
            for sensor in &config.sensors {
                info!("{} {}", season, sensor);
                let scope = Scope {
                    pass: Pass::Mosaic,
                    season: season.as_str(),
                    sensor: Some(sensor.as_str()),
                    continue_on_error: config.continue_on_error,
                };
                let result = match &table {
                    Ok(table) => mosaic_sensor(
                        &config.sensor_dir(season, sensor),
                        sensor,
                        table,
                        config.reducer,
                        config.mosaic_resampling,
                    ),
                    Err(e) => Err(Error::MissingInput(format!("{:?}: {}", table_path, e))),
                };
                scope.record(&mut report, MOSAIC_FILE.to_string(), result)?;
            }
        }
    }

    info!(
        "Pipeline finished: processed={} skipped={} errors={}",
        report.processed(),
        report.skipped(),
        report.errors()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::descriptor::tests::descriptor_xml;

    const ID: &str = "HLS.S30.T17SLB.2020273T160941.v2.0";

    fn report_of(outcomes: Vec<UnitOutcome>) -> RunReport {
        RunReport {
            units: outcomes
                .into_iter()
                .enumerate()
                .map(|(i, outcome)| UnitReport {
                    pass: Pass::Composite,
                    season: "summer".into(),
                    sensor: Some("S30".into()),
                    unit: format!("unit{}", i),
                    outcome,
                })
                .collect(),
        }
    }

    #[test]
    fn report_counts_outcomes() {
        let report = report_of(vec![
            UnitOutcome::Succeeded(PathBuf::from("a.tif")),
            UnitOutcome::Failed("boom".into()),
            UnitOutcome::Skipped("empty".into()),
            UnitOutcome::Succeeded(PathBuf::from("b.tif")),
        ]);
        assert_eq!(report.processed(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.errors(), 1);
        assert_eq!(report.failures().next().map(|u| u.unit.as_str()), Some("unit1"));
        assert_eq!(report.units[1].to_string(), "[composite] summer/S30 unit1");
    }

    #[test]
    fn organize_moves_files_and_builds_season_table() {
        let dir = tempfile::tempdir().unwrap();
        let season = dir.path().join("summer");
        std::fs::create_dir_all(&season).unwrap();
        std::fs::write(season.join(format!("{}.B02.tif", ID)), b"x").unwrap();
        std::fs::write(season.join(format!("{}.jpg", ID)), b"x").unwrap();
        std::fs::write(season.join("readme.tif"), b"x").unwrap();
        std::fs::write(
            season.join(format!("{}.cmr.xml", ID)),
            descriptor_xml(ID, "12", None),
        )
        .unwrap();

        let report = organize_season(&season).unwrap();
        assert_eq!(report.errors(), 0);
        assert_eq!(report.skipped(), 1);

        let granule_dir = season.join("S30/T17SLB/2020273T160941");
        assert!(granule_dir.join(format!("{}.B02.tif", ID)).is_file());
        assert!(granule_dir.join(format!("{}.jpg", ID)).is_file());
        assert!(granule_dir.join(format!("{}.cmr.xml", ID)).is_file());
        assert!(!season.join(format!("{}.csv", ID)).exists());

        let table = MetadataTable::read(&season.join(SEASON_TABLE)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].file_name, ID);

        // A second run keeps the table intact
        organize_season(&season).unwrap();
        assert_eq!(MetadataTable::read(&season.join(SEASON_TABLE)).unwrap().len(), 1);
    }

    #[test]
    fn broken_descriptor_is_recorded_and_others_continue() {
        let dir = tempfile::tempdir().unwrap();
        let season = dir.path().join("fall");
        std::fs::create_dir_all(&season).unwrap();
        let other = "HLS.L30.T17SLB.2020280T155500.v2.0";
        std::fs::write(
            season.join(format!("{}.cmr.xml", ID)),
            descriptor_xml(ID, "12", Some("MEAN_SUN_ZENITH_ANGLE")),
        )
        .unwrap();
        std::fs::write(
            season.join(format!("{}.cmr.xml", other)),
            descriptor_xml(other, "3", None),
        )
        .unwrap();

        let report = organize_season(&season).unwrap();
        assert_eq!(report.errors(), 1);
        let table = MetadataTable::read(&season.join(SEASON_TABLE)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].file_name, other);
    }

    #[test]
    fn stop_on_error_returns_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            root_dir: dir.path().to_path_buf(),
            seasons: vec!["winter".into()],
            continue_on_error: false,
            ..PipelineConfig::default()
        };
        assert!(run_pipeline(&config, &[Pass::Organize]).is_err());

        let lenient = PipelineConfig {
            continue_on_error: true,
            ..config
        };
        let report = run_pipeline(&lenient, &[Pass::Organize]).unwrap();
        assert_eq!(report.errors(), 1);
        assert_eq!(report.units[0].pass, Pass::Organize);
    }

    #[test]
    fn acquisition_missing_a_band_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let sensor_dir = dir.path().join("summer/S30");
        let leaf = sensor_dir.join("T17SLB/2020273T160941");
        std::fs::create_dir_all(&leaf).unwrap();
        std::fs::create_dir_all(sensor_dir.join("T17SLB/2020283T160941")).unwrap();
        for band in ["B02", "B03"] {
            std::fs::write(leaf.join(format!("{}.{}.tif", ID, band)), b"x").unwrap();
        }
        let bands: Vec<String> = ["B02", "B03", "B04"].map(String::from).to_vec();

        let report = composite_sensor(&sensor_dir, &bands).unwrap();
        assert_eq!(report.errors(), 1);
        assert_eq!(report.skipped(), 1);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.unit, "T17SLB/2020273T160941");
        assert!(matches!(&failure.outcome, UnitOutcome::Failed(msg) if msg.contains("B04")));
        let written = std::fs::read_dir(sensor_dir.join(COMPOSITES_DIR)).unwrap().count();
        assert_eq!(written, 0);
    }

    #[test]
    fn composite_pass_skips_missing_sensor_folders() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            root_dir: dir.path().to_path_buf(),
            seasons: vec!["spring".into()],
            ..PipelineConfig::default()
        };
        let report = run_pipeline(&config, &[Pass::Composite]).unwrap();
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.errors(), 0);
    }
}
