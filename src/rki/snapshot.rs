//! Bundled fallback snapshot: a gzip-compressed CSV of flat case records,
//! refreshed out-of-band. Dates are stored as `%d-%m-%Y` strings.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use flate2::read::GzDecoder;
use serde::Deserialize;

use super::{CaseRecord, RkiError};

pub(crate) const SNAPSHOT_DATE_FORMAT: &str = "%d-%m-%Y";

#[derive(Debug, Deserialize)]
struct SnapshotRow {
    #[serde(rename = "Bundesland")]
    state: String,
    #[serde(rename = "Landkreis")]
    district: String,
    #[serde(rename = "Altersgruppe", default)]
    age_group: String,
    #[serde(rename = "Geschlecht", default)]
    sex: String,
    #[serde(rename = "AnzahlFall", default)]
    cases: i64,
    #[serde(rename = "AnzahlTodesfall", default)]
    deaths: i64,
    #[serde(rename = "AnzahlGenesen", default)]
    recovered: i64,
    #[serde(rename = "NeuerFall", default)]
    new_case_flag: i64,
    #[serde(rename = "NeuGenesen", default)]
    new_recovered_flag: i64,
    date: String,
    date_ref: String,
}

/// Reads the whole snapshot into case records. Each date column parses from
/// its own field; a malformed row is an error, not a skip.
pub(crate) fn load_snapshot(path: &Path) -> Result<Vec<CaseRecord>, RkiError> {
    let file = File::open(path).map_err(|source| RkiError::SnapshotRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(GzDecoder::new(file));

    let mut records = Vec::new();
    for (index, result) in reader.deserialize::<SnapshotRow>().enumerate() {
        let row = result.map_err(|err| RkiError::SnapshotParse {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })?;
        let report_date = parse_snapshot_date(path, index, "date", &row.date)?;
        let reference_date = parse_snapshot_date(path, index, "date_ref", &row.date_ref)?;
        records.push(CaseRecord {
            state: row.state,
            district: row.district,
            age_group: row.age_group,
            sex: row.sex,
            cases: row.cases,
            deaths: row.deaths,
            recovered: row.recovered,
            new_case_flag: row.new_case_flag,
            new_recovered_flag: row.new_recovered_flag,
            report_date,
            reference_date,
        });
    }
    Ok(records)
}

fn parse_snapshot_date(
    path: &Path,
    index: usize,
    column: &str,
    value: &str,
) -> Result<NaiveDate, RkiError> {
    NaiveDate::parse_from_str(value, SNAPSHOT_DATE_FORMAT).map_err(|_| RkiError::SnapshotParse {
        path: path.to_path_buf(),
        detail: format!("record {index}: '{value}' in column '{column}' is not a {SNAPSHOT_DATE_FORMAT} date"),
    })
}
