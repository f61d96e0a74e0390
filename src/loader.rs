//! Reads the `street_segment_risk` export produced by the offline clustering job.

use crate::model::RiskLabel;
use crate::store::SegmentRiskRecord;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to open segment data {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed segment row {row}: {source}")]
    Csv { row: usize, source: csv::Error },
    #[error("segment row {row} ({unitid}): {reason}")]
    Invalid {
        row: usize,
        unitid: String,
        reason: String,
    },
    #[error("segment row {row}: duplicate unitid {unitid}")]
    Duplicate { row: usize, unitid: String },
}

#[derive(Debug, Deserialize)]
struct SegmentRow {
    unitid: String,
    #[serde(default)]
    street_name: Option<String>,
    latitude: f64,
    longitude: f64,
    risk_score: f64,
    #[serde(default)]
    risk_label: Option<String>,
    #[serde(default)]
    cluster_id: Option<i32>,
    #[serde(default)]
    incident_density: Option<f64>,
    #[serde(default)]
    night_fraction: Option<f64>,
    #[serde(default)]
    last_90d_incidents: Option<i32>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    override_reason: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

pub fn load_path(path: &Path) -> Result<Vec<SegmentRiskRecord>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let records = load_reader(file)?;
    info!(path = %path.display(), segments = records.len(), "loaded segment risk data");
    Ok(records)
}

pub fn load_reader<R: Read>(reader: R) -> Result<Vec<SegmentRiskRecord>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for (index, row) in csv_reader.deserialize::<SegmentRow>().enumerate() {
        // Header is row 1.
        let row_number = index + 2;
        let row = row.map_err(|source| LoadError::Csv {
            row: row_number,
            source,
        })?;
        let record = into_record(row_number, row)?;

        if !seen.insert(record.unitid.clone()) {
            return Err(LoadError::Duplicate {
                row: row_number,
                unitid: record.unitid,
            });
        }
        records.push(record);
    }

    Ok(records)
}

fn into_record(row_number: usize, row: SegmentRow) -> Result<SegmentRiskRecord, LoadError> {
    let invalid = |reason: String| LoadError::Invalid {
        row: row_number,
        unitid: row.unitid.clone(),
        reason,
    };

    if row.unitid.is_empty() {
        return Err(invalid("unitid is blank".to_string()));
    }
    if !(0.0..=1.0).contains(&row.risk_score) {
        return Err(invalid(format!("risk_score {} outside [0, 1]", row.risk_score)));
    }
    if !(-90.0..=90.0).contains(&row.latitude) || !(-180.0..=180.0).contains(&row.longitude) {
        return Err(invalid(format!(
            "coordinate ({}, {}) out of range",
            row.latitude, row.longitude
        )));
    }
    let updated_at = match non_blank(row.updated_at.as_deref()) {
        Some(raw) => Some(
            parse_timestamp(raw)
                .ok_or_else(|| invalid(format!("unparseable updated_at '{raw}'")))?,
        ),
        None => None,
    };

    Ok(SegmentRiskRecord {
        risk_label: row
            .risk_label
            .as_deref()
            .map(RiskLabel::parse)
            .unwrap_or_default(),
        street_name: non_blank(row.street_name.as_deref()).map(str::to_string),
        model_version: non_blank(row.model_version.as_deref()).map(str::to_string),
        override_reason: non_blank(row.override_reason.as_deref()).map(str::to_string),
        unitid: row.unitid,
        latitude: row.latitude,
        longitude: row.longitude,
        risk_score: row.risk_score,
        cluster_id: row.cluster_id,
        incident_density: row.incident_density,
        night_fraction: row.night_fraction,
        last_90d_incidents: row.last_90d_incidents,
        updated_at,
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// The export writes either ISO-8601 or the database's "YYYY-MM-DD HH:MM:SS".
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}
