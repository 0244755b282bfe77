//! Seasonal metadata table persisted as CSV.
//!
//! Rows are [`GranuleRecord`]s keyed by `File Name`. Concatenation keeps input order
//! and drops later rows whose file name was already seen, so aggregating the same
//! inputs twice never doubles the table.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::io::descriptor::GranuleRecord;

/// Name of the aggregated table written in each season folder
pub const SEASON_TABLE: &str = "hls_images.csv";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    rows: Vec<GranuleRecord>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rows, keeping the first row of each file name
    pub fn from_rows(rows: Vec<GranuleRecord>) -> Self {
        let mut table = Self::new();
        table.extend(rows);
        table
    }

    pub fn rows(&self) -> &[GranuleRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append rows whose file name is not yet present. Returns how many were dropped.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = GranuleRecord>) -> usize {
        let mut seen: HashSet<String> = self.rows.iter().map(|r| r.file_name.clone()).collect();
        let mut dropped = 0;
        for row in rows {
            if seen.insert(row.file_name.clone()) {
                self.rows.push(row);
            } else {
                dropped += 1;
            }
        }
        dropped
    }

    /// Concatenate tables in order, deduplicating by file name
    pub fn concat(tables: impl IntoIterator<Item = MetadataTable>) -> Self {
        let mut out = Self::new();
        for t in tables {
            out.extend(t.rows);
        }
        out
    }

    pub fn read(path: &Path) -> Result<Self> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut rows = Vec::new();
        for record in rdr.deserialize() {
            let row: GranuleRecord = record?;
            rows.push(row);
        }
        Ok(Self::from_rows(rows))
    }

    /// Write the table with its header row, even when empty
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        if self.rows.is_empty() {
            wtr.write_record(GranuleRecord::COLUMNS)?;
        }
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Rows recorded for one sensor, in table order
    pub fn for_sensor<'a>(&'a self, sensor: &'a str) -> impl Iterator<Item = &'a GranuleRecord> {
        self.rows.iter().filter(move |r| r.sensor == sensor)
    }

    /// Distinct tiles of one sensor, in order of first appearance
    pub fn tiles(&self, sensor: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.for_sensor(sensor)
            .filter(|r| seen.insert(r.tile.clone()))
            .map(|r| r.tile.clone())
            .collect()
    }

    /// Distinct file names of one sensor and tile, in table order
    pub fn files(&self, sensor: &str, tile: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.for_sensor(sensor)
            .filter(|r| r.tile == tile)
            .filter(|r| seen.insert(r.file_name.clone()))
            .map(|r| r.file_name.clone())
            .collect()
    }
}

/// Union single-record tables into one table written to `output`.
///
/// Inputs are read in the given order; on success the source files are deleted.
/// A failed delete is logged and does not fail the aggregation.
pub fn aggregate_tables(inputs: &[PathBuf], output: &Path) -> Result<MetadataTable> {
    let mut tables = Vec::with_capacity(inputs.len());
    for path in inputs {
        tables.push(MetadataTable::read(path)?);
    }
    let total: usize = tables.iter().map(MetadataTable::len).sum();
    let table = MetadataTable::concat(tables);
    if table.len() < total {
        warn!(
            "Dropped {} duplicate rows while aggregating into {:?}",
            total - table.len(),
            output
        );
    }
    table.write(output)?;
    info!("Aggregated {} tables ({} rows) into {:?}", inputs.len(), table.len(), output);

    delete_files(inputs.iter().filter(|p| p.as_path() != output));
    Ok(table)
}

/// Remove files, logging (not failing on) any that cannot be removed
pub fn delete_files<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Error deleting file {:?}: {}", path, e);
        }
    }
}
