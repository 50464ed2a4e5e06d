//! Robert Koch Institute dashboard adapter.
//!
//! Retrieval enumerates the dashboard's districts, downloads each district's
//! case-report rows with a bounded retry loop and keeps the concatenated
//! result as one flat record table. Cumulative series are derived lazily by
//! the filter accessors, because the source stores per-record counts rather
//! than running totals.

mod query;
mod snapshot;

pub use query::DEFAULT_QUERY_BASE_URL;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::fetch::DataOrigin;
use crate::series::{
    clip_to_range, daily_from_cumulative, CumulativeSeries, DailySeries, DateKind, DateRange,
    FilterError, Metric, RegionLevel, RegionSelector,
};

/// The dashboard distinguishes 412 districts, more than the official
/// administrative count; fewer in a discovery response means the source is
/// mid-update.
pub const EXPECTED_DISTRICTS: usize = 412;

/// The query endpoint truncates responses beyond this many features.
pub const PAGINATION_LIMIT: usize = 5000;

pub const DEFAULT_MAX_RETRIES: u32 = 10;

pub const DEFAULT_SNAPSHOT_PATH: &str = "data/rki_fallback.csv.gz";

#[derive(Debug)]
pub enum RkiError {
    RetriesExhausted {
        district: String,
        attempts: u32,
        detail: String,
    },
    SnapshotRead {
        path: PathBuf,
        source: std::io::Error,
    },
    SnapshotParse {
        path: PathBuf,
        detail: String,
    },
    BadTimestamp {
        field: &'static str,
        value: i64,
    },
}

impl fmt::Display for RkiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetriesExhausted {
                district,
                attempts,
                detail,
            } => write!(
                f,
                "maximum number of retries ({attempts}) exceeded for district {district}: {detail}"
            ),
            Self::SnapshotRead { path, source } => {
                write!(
                    f,
                    "unable to read fallback snapshot '{}': {source}",
                    path.display()
                )
            }
            Self::SnapshotParse { path, detail } => {
                write!(
                    f,
                    "malformed fallback snapshot '{}': {detail}",
                    path.display()
                )
            }
            Self::BadTimestamp { field, value } => {
                write!(
                    f,
                    "timestamp {value} in field '{field}' is outside the representable range"
                )
            }
        }
    }
}

impl std::error::Error for RkiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SnapshotRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// One case-report row of the flat table: region hierarchy, demographic
/// split, per-record counts and the two date axes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
    pub state: String,
    pub district: String,
    pub age_group: String,
    pub sex: String,
    pub cases: i64,
    pub deaths: i64,
    pub recovered: i64,
    pub new_case_flag: i64,
    pub new_recovered_flag: i64,
    pub report_date: NaiveDate,
    pub reference_date: NaiveDate,
}

impl CaseRecord {
    pub fn count(&self, metric: Metric) -> i64 {
        match metric {
            Metric::Confirmed => self.cases,
            Metric::Deaths => self.deaths,
            Metric::Recovered => self.recovered,
        }
    }

    pub fn date(&self, kind: DateKind) -> NaiveDate {
        match kind {
            DateKind::Report => self.report_date,
            DateKind::Reference => self.reference_date,
        }
    }

    pub fn matches(&self, selector: &RegionSelector) -> bool {
        match selector.level {
            RegionLevel::State => self.state == selector.name,
            RegionLevel::District => self.district == selector.name,
        }
    }

    fn from_attributes(attributes: query::CaseAttributes) -> Result<Self, RkiError> {
        let report_date = date_from_epoch_ms(attributes.report_stamp_ms, "Meldedatum")?;
        let reference_date = date_from_epoch_ms(attributes.reference_stamp_ms, "Refdatum")?;
        Ok(Self {
            state: attributes.state,
            district: attributes.district,
            age_group: attributes.age_group,
            sex: attributes.sex,
            cases: attributes.cases,
            deaths: attributes.deaths,
            recovered: attributes.recovered,
            new_case_flag: attributes.new_case_flag,
            new_recovered_flag: attributes.new_recovered_flag,
            report_date,
            reference_date,
        })
    }
}

fn date_from_epoch_ms(stamp: i64, field: &'static str) -> Result<NaiveDate, RkiError> {
    let Some(moment) = chrono::DateTime::from_timestamp_millis(stamp) else {
        return Err(RkiError::BadTimestamp { field, value: stamp });
    };
    Ok(moment.date_naive())
}

/// Retrieval knobs. The defaults match the public dashboard; tests point
/// `base_url` at a local stub and lower `expected_districts`.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub base_url: String,
    pub snapshot_path: PathBuf,
    pub max_retries: u32,
    pub expected_districts: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_QUERY_BASE_URL.to_string(),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            max_retries: DEFAULT_MAX_RETRIES,
            expected_districts: EXPECTED_DISTRICTS,
        }
    }
}

#[derive(Debug)]
struct Dataset {
    records: Vec<CaseRecord>,
    origin: DataOrigin,
}

/// Adapter state: the flat record table plus its provenance, written once
/// per retrieval and read by the filter accessors.
#[derive(Debug, Default)]
pub struct Rki {
    dataset: Option<Dataset>,
}

impl Rki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Option<&[CaseRecord]> {
        self.dataset.as_ref().map(|dataset| dataset.records.as_slice())
    }

    pub fn origin(&self) -> Option<DataOrigin> {
        self.dataset.as_ref().map(|dataset| dataset.origin)
    }

    /// Downloads the full dataset from the default endpoint, retrying each
    /// district query up to `max_retries` times.
    pub fn download_all_available_data(
        &mut self,
        max_retries: u32,
    ) -> Result<&[CaseRecord], RkiError> {
        self.download_with(&RetrievalConfig {
            max_retries,
            ..RetrievalConfig::default()
        })
    }

    /// Downloads the full dataset with explicit retrieval knobs, replacing
    /// any previously held records. On error the previous state is kept
    /// untouched; no partial table is ever stored.
    pub fn download_with(&mut self, config: &RetrievalConfig) -> Result<&[CaseRecord], RkiError> {
        let dataset = retrieve_dataset(config)?;
        let dataset = self.dataset.insert(dataset);
        Ok(&dataset.records)
    }

    /// Cumulative series for one metric along one date axis, optionally
    /// restricted to a state or district, sliced to the range after the
    /// running sum (totals do not restart at the window begin).
    pub fn filter(
        &self,
        metric: Metric,
        date_kind: DateKind,
        region: Option<&RegionSelector>,
        range: &DateRange,
    ) -> Result<CumulativeSeries, FilterError> {
        range.validate()?;
        let records = self
            .records()
            .ok_or(FilterError::NotRetrieved { source: "rki" })?;

        let mut by_date: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for record in records {
            if let Some(selector) = region {
                if !record.matches(selector) {
                    continue;
                }
            }
            *by_date.entry(record.date(date_kind)).or_insert(0) += record.count(metric);
        }

        let mut series = Vec::with_capacity(by_date.len());
        let mut running = 0;
        for (date, total) in by_date {
            running += total;
            series.push((date, running));
        }
        clip_to_range(&mut series, range);
        Ok(series)
    }

    /// Daily-new series: first difference of the sliced cumulative series.
    pub fn new_filter(
        &self,
        metric: Metric,
        date_kind: DateKind,
        region: Option<&RegionSelector>,
        range: &DateRange,
    ) -> Result<DailySeries, FilterError> {
        Ok(daily_from_cumulative(&self.filter(
            metric, date_kind, region, range,
        )?))
    }

    /// The cumulative series broken out per federal state: rows = dates,
    /// columns = states, combinations without reports filled with zero
    /// before the running sum.
    pub fn filter_all_states(
        &self,
        metric: Metric,
        date_kind: DateKind,
        range: &DateRange,
    ) -> Result<StateBreakdown, FilterError> {
        range.validate()?;
        let records = self
            .records()
            .ok_or(FilterError::NotRetrieved { source: "rki" })?;

        let states: Vec<String> = records
            .iter()
            .map(|record| record.state.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut rows: BTreeMap<NaiveDate, Vec<i64>> = BTreeMap::new();
        for record in records {
            let row = rows
                .entry(record.date(date_kind))
                .or_insert_with(|| vec![0; states.len()]);
            if let Ok(column) =
                states.binary_search_by(|state| state.as_str().cmp(record.state.as_str()))
            {
                row[column] += record.count(metric);
            }
        }

        let mut running = vec![0i64; states.len()];
        let mut dates = Vec::new();
        let mut values = Vec::new();
        for (date, row) in rows {
            for (column, value) in row.into_iter().enumerate() {
                running[column] += value;
            }
            if range.contains(date) {
                dates.push(date);
                values.push(running.clone());
            }
        }

        Ok(StateBreakdown {
            dates,
            states,
            values,
        })
    }
}

/// Per-state pivot of a cumulative series: one row per date, one column per
/// federal state, from [`Rki::filter_all_states`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBreakdown {
    dates: Vec<NaiveDate>,
    states: Vec<String>,
    // values[date index][state index]
    values: Vec<Vec<i64>>,
}

impl StateBreakdown {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// One state's column as a series, or `None` for an unknown state name.
    pub fn series(&self, state: &str) -> Option<CumulativeSeries> {
        let column = self.states.iter().position(|name| name == state)?;
        Some(
            self.dates
                .iter()
                .zip(&self.values)
                .map(|(date, row)| (*date, row[column]))
                .collect(),
        )
    }
}

fn retrieve_dataset(config: &RetrievalConfig) -> Result<Dataset, RkiError> {
    match query::QueryClient::new(&config.base_url) {
        Ok(client) => match client.district_ids() {
            Ok(ids) if ids.len() >= config.expected_districts => {
                println!("rki: downloading {} districts, this may take a while", ids.len());
                let records = download_districts(&client, &ids, config.max_retries)?;
                println!("rki: finished downloading {} case records", records.len());
                Ok(Dataset {
                    records,
                    origin: DataOrigin::Live,
                })
            }
            Ok(ids) => {
                eprintln!(
                    "rki: query returned {} districts (expected at least {}), source likely mid-update; using the bundled fallback snapshot",
                    ids.len(),
                    config.expected_districts
                );
                load_fallback(&config.snapshot_path)
            }
            Err(err) => {
                eprintln!("rki: district discovery failed ({err}); using the bundled fallback snapshot");
                load_fallback(&config.snapshot_path)
            }
        },
        Err(err) => {
            eprintln!("rki: query client unavailable ({err}); using the bundled fallback snapshot");
            load_fallback(&config.snapshot_path)
        }
    }
}

fn load_fallback(path: &Path) -> Result<Dataset, RkiError> {
    let records = snapshot::load_snapshot(path)?;
    Ok(Dataset {
        records,
        origin: DataOrigin::Fallback,
    })
}

fn download_districts(
    client: &query::QueryClient,
    ids: &[String],
    max_retries: u32,
) -> Result<Vec<CaseRecord>, RkiError> {
    let mut records = Vec::new();
    for id in ids {
        for attributes in fetch_district(client, id, max_retries)? {
            records.push(CaseRecord::from_attributes(attributes)?);
        }
    }
    Ok(records)
}

/// One district's rows, retried immediately (no backoff) on any failure,
/// including responses large enough to have been truncated by pagination.
fn fetch_district(
    client: &query::QueryClient,
    district: &str,
    max_retries: u32,
) -> Result<Vec<query::CaseAttributes>, RkiError> {
    let mut detail = String::from("no attempts made");
    for _ in 0..max_retries {
        match client.district_cases(district) {
            Ok(rows) if rows.len() > PAGINATION_LIMIT => {
                detail = format!(
                    "{} features exceed the pagination limit of {PAGINATION_LIMIT}",
                    rows.len()
                );
            }
            Ok(rows) => return Ok(rows),
            Err(err) => detail = err.to_string(),
        }
    }
    Err(RkiError::RetriesExhausted {
        district: district.to_string(),
        attempts: max_retries,
        detail,
    })
}
