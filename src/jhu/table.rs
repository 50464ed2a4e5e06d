//! Normalized date-by-region table for one dashboard metric.
//!
//! The upstream CSV is wide: one row per region, one `%m/%d/%y` column per
//! day. Normalization turns that into date-ordered rows against compound
//! (country, province) column keys and validates the date axis.

use chrono::NaiveDate;

use super::JhuError;
use crate::fetch::DataOrigin;
use crate::series::{CumulativeSeries, DateRange, FilterError};

pub(crate) const DATE_HEADER_FORMAT: &str = "%m/%d/%y";

const COUNTRY_HEADER: &str = "Country/Region";
const PROVINCE_HEADER: &str = "Province/State";

/// Compound column key: country plus optional province/state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionColumn {
    pub country: String,
    pub province: Option<String>,
}

/// Selects columns of a [`CompartmentTable`]. Country-only selectors sum all
/// of that country's provinces; adding a province picks the exact column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountrySelector {
    pub country: String,
    pub province: Option<String>,
}

impl CountrySelector {
    pub fn country(name: impl Into<String>) -> Self {
        Self {
            country: name.into(),
            province: None,
        }
    }

    pub fn province(country: impl Into<String>, province: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            province: Some(province.into()),
        }
    }

    fn matches(&self, column: &RegionColumn) -> bool {
        if column.country != self.country {
            return false;
        }
        match &self.province {
            None => true,
            Some(province) => column.province.as_deref() == Some(province.as_str()),
        }
    }
}

/// One metric's cumulative counts: rows = dates, columns = regions.
#[derive(Debug, Clone)]
pub struct CompartmentTable {
    columns: Vec<RegionColumn>,
    dates: Vec<NaiveDate>,
    // counts[column][date index], same length as `dates` per column;
    // every value fits in i64, checked when the CSV is parsed
    counts: Vec<Vec<u64>>,
    origin: DataOrigin,
}

impl CompartmentTable {
    pub fn origin(&self) -> DataOrigin {
        self.origin
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[RegionColumn] {
        &self.columns
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Cumulative series over the selected columns, sliced to `range`
    /// (inclusive; open ends default to the observed range). No selector sums
    /// every column. A selector matching no column yields an empty series.
    pub fn series(
        &self,
        region: Option<&CountrySelector>,
        range: &DateRange,
    ) -> Result<CumulativeSeries, FilterError> {
        range.validate()?;

        let selected: Vec<usize> = match region {
            None => (0..self.columns.len()).collect(),
            Some(selector) => self
                .columns
                .iter()
                .enumerate()
                .filter(|(_, column)| selector.matches(column))
                .map(|(index, _)| index)
                .collect(),
        };
        if region.is_some() && selected.is_empty() {
            return Ok(Vec::new());
        }
        let (Some(first), Some(last)) = (self.first_date(), self.last_date()) else {
            return Ok(Vec::new());
        };

        let begin = range.begin.unwrap_or(first);
        let end = range.end.unwrap_or(last);
        let start = self.dates.partition_point(|date| *date < begin);
        let stop = self.dates.partition_point(|date| *date <= end);

        let mut series = Vec::with_capacity(stop.saturating_sub(start));
        for index in start..stop {
            let total: i64 = selected
                .iter()
                .map(|&column| self.counts[column][index] as i64)
                .sum();
            series.push((self.dates[index], total));
        }
        Ok(series)
    }
}

/// Parses the upstream wide CSV into a [`CompartmentTable`].
///
/// Drops the Lat/Long columns, keys each row by (country, province), parses
/// every remaining header as a date and requires those dates to advance one
/// day at a time. Cell values must be non-negative integers.
pub(crate) fn parse_wide_csv(text: &str, origin: DataOrigin) -> Result<CompartmentTable, JhuError> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader.headers().map_err(JhuError::Csv)?.clone();

    let mut country_index = None;
    let mut province_index = None;
    let mut date_columns: Vec<(usize, NaiveDate)> = Vec::new();

    for (index, name) in headers.iter().enumerate() {
        match name.trim() {
            COUNTRY_HEADER => country_index = Some(index),
            PROVINCE_HEADER => province_index = Some(index),
            "Lat" | "Long" => {}
            header => {
                let date = NaiveDate::parse_from_str(header, DATE_HEADER_FORMAT).map_err(|_| {
                    JhuError::Malformed {
                        detail: format!(
                            "column {index} '{header}' is neither a region field nor a date"
                        ),
                    }
                })?;
                date_columns.push((index, date));
            }
        }
    }

    let Some(country_index) = country_index else {
        return Err(JhuError::Malformed {
            detail: format!("missing '{COUNTRY_HEADER}' column"),
        });
    };

    for pair in date_columns.windows(2) {
        let (previous, next) = (pair[0].1, pair[1].1);
        if previous.succ_opt() != Some(next) {
            return Err(JhuError::Malformed {
                detail: format!(
                    "date columns must advance one day at a time: {next} follows {previous}"
                ),
            });
        }
    }

    let mut columns = Vec::new();
    let mut counts = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(JhuError::Csv)?;
        let country = record.get(country_index).unwrap_or("").trim();
        if country.is_empty() {
            return Err(JhuError::Malformed {
                detail: format!("row {row}: empty '{COUNTRY_HEADER}' value"),
            });
        }
        let province = province_index
            .and_then(|index| record.get(index))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        let mut row_counts = Vec::with_capacity(date_columns.len());
        for &(index, date) in &date_columns {
            let cell = record.get(index).unwrap_or("").trim();
            let value: u64 = cell.parse().map_err(|_| JhuError::Malformed {
                detail: format!(
                    "row {row} ('{country}'): value '{cell}' for {date} is not a non-negative count"
                ),
            })?;
            if i64::try_from(value).is_err() {
                return Err(JhuError::Malformed {
                    detail: format!(
                        "row {row} ('{country}'): value '{cell}' for {date} exceeds the largest supported count"
                    ),
                });
            }
            row_counts.push(value);
        }

        columns.push(RegionColumn {
            country: country.to_string(),
            province,
        });
        counts.push(row_counts);
    }

    Ok(CompartmentTable {
        columns,
        dates: date_columns.into_iter().map(|(_, date)| date).collect(),
        counts,
        origin,
    })
}
