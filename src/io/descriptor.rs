//! Granule descriptor (CMR XML) reader.
//!
//! Pulls the identity, timing, cloud cover, projection and sun-angle attributes out
//! of one `*.cmr.xml` document into a flat [`GranuleRecord`]. Every field is required:
//! a missing element or attribute fails the whole record with
//! [`DescriptorError::MissingAttribute`] so callers can skip the granule or abort.
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::Result;
use crate::io::granule::{GranuleId, GranuleIdError};
use crate::io::table::MetadataTable;

const CLOUD_COVERAGE: &str = "CLOUD_COVERAGE";
const SPATIAL_RESAMPLING_ALG: &str = "SPATIAL_RESAMPLING_ALG";
const HORIZONTAL_CS_NAME: &str = "HORIZONTAL_CS_NAME";
const REF_SCALE_FACTOR: &str = "REF_SCALE_FACTOR";
const MEAN_SUN_AZIMUTH_ANGLE: &str = "MEAN_SUN_AZIMUTH_ANGLE";
const MEAN_SUN_ZENITH_ANGLE: &str = "MEAN_SUN_ZENITH_ANGLE";

/// Errors encountered when reading granule descriptors
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Missing attribute `{0}` in granule descriptor")]
    MissingAttribute(&'static str),
    #[error("Invalid value for `{field}`: `{value}`")]
    InvalidValue { field: &'static str, value: String },
    #[error(transparent)]
    GranuleId(#[from] GranuleIdError),
}

/// One row of the seasonal metadata table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GranuleRecord {
    #[serde(rename = "File Name")]
    pub file_name: String,
    #[serde(rename = "Sensor")]
    pub sensor: String,
    #[serde(rename = "Tile")]
    pub tile: String,
    #[serde(rename = "Production Date")]
    pub production_date: String,
    #[serde(rename = "Sensing Begin")]
    pub sensing_begin: String,
    #[serde(rename = "Sensing End")]
    pub sensing_end: String,
    #[serde(rename = "Cloud Cover")]
    pub cloud_cover: f64,
    #[serde(rename = "Resampling Algorithm", alias = "Resampling Algorithim")]
    pub resampling_algorithm: String,
    #[serde(rename = "UTM")]
    pub utm: String,
    #[serde(rename = "Ref Scale Factor")]
    pub ref_scale_factor: String,
    #[serde(rename = "Mean Sun Azimuth")]
    pub mean_sun_azimuth: f64,
    #[serde(rename = "Mean Sun Zenith")]
    pub mean_sun_zenith: f64,
}

impl GranuleRecord {
    /// Column titles in table order
    pub const COLUMNS: [&'static str; 12] = [
        "File Name",
        "Sensor",
        "Tile",
        "Production Date",
        "Sensing Begin",
        "Sensing End",
        "Cloud Cover",
        "Resampling Algorithm",
        "UTM",
        "Ref Scale Factor",
        "Mean Sun Azimuth",
        "Mean Sun Zenith",
    ];

    pub fn granule_id(&self) -> std::result::Result<GranuleId, GranuleIdError> {
        GranuleId::parse(&self.file_name)
    }
}

#[derive(Default)]
struct RawDescriptor {
    granule_ur: Option<String>,
    production: Option<String>,
    begin: Option<String>,
    end: Option<String>,
    attributes: HashMap<String, Vec<String>>,
}

// Matches an element path below the document root
fn at(stack: &[String], path: &[&str]) -> bool {
    stack.len() == path.len() + 1 && stack[1..].iter().zip(path).all(|(a, b)| a == b)
}

fn read_raw<R: BufRead>(mut reader: Reader<R>) -> std::result::Result<RawDescriptor, DescriptorError> {
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut raw = RawDescriptor::default();
    let mut attr_name: Option<String> = None;
    let mut attr_values: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "AdditionalAttribute" {
                    attr_name = None;
                    attr_values.clear();
                }
                stack.push(tag);
            }
            Event::End(ref e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "AdditionalAttribute" {
                    if let Some(name) = attr_name.take() {
                        raw.attributes
                            .insert(name, std::mem::take(&mut attr_values));
                    }
                }
                stack.pop();
            }
            Event::Text(e) => {
                let txt = e.unescape()?.trim().to_string();
                if at(&stack, &["GranuleUR"]) {
                    raw.granule_ur = Some(txt);
                } else if at(&stack, &["DataGranule", "ProductionDateTime"]) {
                    raw.production = Some(txt);
                } else if at(&stack, &["Temporal", "RangeDateTime", "BeginningDateTime"]) {
                    raw.begin = Some(txt);
                } else if at(&stack, &["Temporal", "RangeDateTime", "EndingDateTime"]) {
                    raw.end = Some(txt);
                } else if at(&stack, &["AdditionalAttributes", "AdditionalAttribute", "Name"]) {
                    attr_name = Some(txt);
                } else if at(
                    &stack,
                    &["AdditionalAttributes", "AdditionalAttribute", "Values", "Value"],
                ) {
                    attr_values.push(txt);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(raw)
}

fn first_value(
    attributes: &HashMap<String, Vec<String>>,
    name: &'static str,
) -> std::result::Result<String, DescriptorError> {
    attributes
        .get(name)
        .and_then(|values| values.first())
        .cloned()
        .ok_or(DescriptorError::MissingAttribute(name))
}

fn number(field: &'static str, value: String) -> std::result::Result<f64, DescriptorError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| DescriptorError::InvalidValue { field, value })
}

fn into_record(raw: RawDescriptor) -> std::result::Result<GranuleRecord, DescriptorError> {
    let ur = raw
        .granule_ur
        .ok_or(DescriptorError::MissingAttribute("GranuleUR"))?;
    let id = GranuleId::parse(&ur)?;
    let attrs = &raw.attributes;

    Ok(GranuleRecord {
        sensor: id.sensor.clone(),
        tile: id.tile.clone(),
        file_name: ur,
        production_date: raw
            .production
            .ok_or(DescriptorError::MissingAttribute("ProductionDateTime"))?,
        sensing_begin: raw
            .begin
            .ok_or(DescriptorError::MissingAttribute("BeginningDateTime"))?,
        sensing_end: raw
            .end
            .ok_or(DescriptorError::MissingAttribute("EndingDateTime"))?,
        cloud_cover: number(CLOUD_COVERAGE, first_value(attrs, CLOUD_COVERAGE)?)?,
        resampling_algorithm: first_value(attrs, SPATIAL_RESAMPLING_ALG)?,
        utm: first_value(attrs, HORIZONTAL_CS_NAME)?.replace(',', ""),
        ref_scale_factor: first_value(attrs, REF_SCALE_FACTOR)?,
        mean_sun_azimuth: number(
            MEAN_SUN_AZIMUTH_ANGLE,
            first_value(attrs, MEAN_SUN_AZIMUTH_ANGLE)?,
        )?,
        mean_sun_zenith: number(
            MEAN_SUN_ZENITH_ANGLE,
            first_value(attrs, MEAN_SUN_ZENITH_ANGLE)?,
        )?,
    })
}

/// Parse a descriptor held in memory
pub fn parse_descriptor_str(xml: &str) -> std::result::Result<GranuleRecord, DescriptorError> {
    into_record(read_raw(Reader::from_str(xml))?)
}

/// Parse a descriptor file
pub fn parse_descriptor(path: &Path) -> std::result::Result<GranuleRecord, DescriptorError> {
    debug!("Parsing granule descriptor {:?}", path);
    into_record(read_raw(Reader::from_file(path)?)?)
}

/// Parse a descriptor and write its single-row table as `<GranuleUR>.csv` next to it.
pub fn extract_descriptor(xml_path: &Path) -> Result<(GranuleRecord, PathBuf)> {
    let record = parse_descriptor(xml_path)?;
    let dir = xml_path.parent().unwrap_or_else(|| Path::new("."));
    let csv_path = dir.join(format!("{}.csv", record.file_name));
    MetadataTable::from_rows(vec![record.clone()]).write(&csv_path)?;
    info!("Extracted metadata for {} -> {:?}", record.file_name, csv_path);
    Ok((record, csv_path))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn descriptor_xml(ur: &str, cloud: &str, skip: Option<&str>) -> String {
        let attribute = |name: &str, values: &[&str]| -> String {
            if skip == Some(name) {
                return String::new();
            }
            let vals: String = values
                .iter()
                .map(|v| format!("<Value>{}</Value>", v))
                .collect();
            format!(
                "<AdditionalAttribute><Name>{}</Name><Values>{}</Values></AdditionalAttribute>",
                name, vals
            )
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Granule>
  <GranuleUR>{ur}</GranuleUR>
  <InsertTime>2020-10-01T02:03:04.000Z</InsertTime>
  <Collection><ShortName>HLSS30</ShortName><VersionId>2.0</VersionId></Collection>
  <DataGranule>
    <DayNightFlag>DAY</DayNightFlag>
    <ProductionDateTime>2020-10-01T01:02:03.000Z</ProductionDateTime>
  </DataGranule>
  <Temporal>
    <RangeDateTime>
      <BeginningDateTime>2020-09-29T16:18:46.123Z</BeginningDateTime>
      <EndingDateTime>2020-09-29T16:18:46.123Z</EndingDateTime>
    </RangeDateTime>
  </Temporal>
  <AdditionalAttributes>
    {a1}{a2}{a3}{a4}{a5}{a6}
  </AdditionalAttributes>
</Granule>"#,
            ur = ur,
            a1 = attribute("CLOUD_COVERAGE", &[cloud]),
            a2 = attribute("SPATIAL_RESAMPLING_ALG", &["Cubic Convolution"]),
            a3 = attribute("HORIZONTAL_CS_NAME", &["UTM, WGS84, UTM ZONE 17", "ignored"]),
            a4 = attribute("REF_SCALE_FACTOR", &["0.0001"]),
            a5 = attribute("MEAN_SUN_AZIMUTH_ANGLE", &["160.25"]),
            a6 = attribute("MEAN_SUN_ZENITH_ANGLE", &["38.5"]),
        )
    }

    #[test]
    fn extracts_flat_record() {
        let xml = descriptor_xml("HLS.S30.T17SLB.2020273T160941.v2.0", "37", None);
        let rec = parse_descriptor_str(&xml).unwrap();
        assert_eq!(rec.file_name, "HLS.S30.T17SLB.2020273T160941.v2.0");
        assert_eq!(rec.sensor, "S30");
        assert_eq!(rec.tile, "T17SLB");
        assert_eq!(rec.production_date, "2020-10-01T01:02:03.000Z");
        assert_eq!(rec.sensing_begin, "2020-09-29T16:18:46.123Z");
        assert_eq!(rec.cloud_cover, 37.0);
        assert_eq!(rec.resampling_algorithm, "Cubic Convolution");
        assert_eq!(rec.utm, "UTM WGS84 UTM ZONE 17");
        assert_eq!(rec.ref_scale_factor, "0.0001");
        assert_eq!(rec.mean_sun_azimuth, 160.25);
        assert_eq!(rec.mean_sun_zenith, 38.5);
    }

    #[test]
    fn missing_attribute_fails_the_record() {
        let xml = descriptor_xml(
            "HLS.S30.T17SLB.2020273T160941.v2.0",
            "37",
            Some("MEAN_SUN_ZENITH_ANGLE"),
        );
        let err = parse_descriptor_str(&xml).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::MissingAttribute("MEAN_SUN_ZENITH_ANGLE")
        ));
    }

    #[test]
    fn malformed_granule_ur_fails_fast() {
        let xml = descriptor_xml("HLS.S30.T17SLB", "37", None);
        assert!(matches!(
            parse_descriptor_str(&xml),
            Err(DescriptorError::GranuleId(_))
        ));
    }

    #[test]
    fn non_numeric_cloud_cover_is_rejected() {
        let xml = descriptor_xml("HLS.S30.T17SLB.2020273T160941.v2.0", "cloudy", None);
        assert!(matches!(
            parse_descriptor_str(&xml),
            Err(DescriptorError::InvalidValue { field: "CLOUD_COVERAGE", .. })
        ));
    }

    #[test]
    fn writes_sidecar_table_next_to_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let xml_path = dir.path().join("HLS.L30.T18TUL.2021150T153311.v2.0.cmr.xml");
        std::fs::write(
            &xml_path,
            descriptor_xml("HLS.L30.T18TUL.2021150T153311.v2.0", "5", None),
        )
        .unwrap();

        let (rec, csv_path) = extract_descriptor(&xml_path).unwrap();
        assert_eq!(
            csv_path,
            dir.path().join("HLS.L30.T18TUL.2021150T153311.v2.0.csv")
        );
        let table = MetadataTable::read(&csv_path).unwrap();
        assert_eq!(table.rows(), &[rec]);
    }
}
