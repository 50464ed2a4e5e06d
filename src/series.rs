//! Shared filter vocabulary for the source adapters: metric and date-axis
//! enumerations, region selectors, date windows and series arithmetic.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

/// Cumulative counts per calendar day, ascending by date.
pub type CumulativeSeries = Vec<(NaiveDate, i64)>;

/// Day-over-day changes of a cumulative series, ascending by date.
pub type DailySeries = Vec<(NaiveDate, i64)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Confirmed,
    Deaths,
    Recovered,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Confirmed, Metric::Deaths, Metric::Recovered];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Deaths => "deaths",
            Self::Recovered => "recovered",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Metric {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // 'cases' is the reporting-agency name for the confirmed count.
        match value.trim().to_ascii_lowercase().as_str() {
            "confirmed" | "cases" => Ok(Self::Confirmed),
            "deaths" => Ok(Self::Deaths),
            "recovered" => Ok(Self::Recovered),
            _ => Err(FilterError::UnknownMetric(value.to_string())),
        }
    }
}

/// Which date a case is keyed by: the day it was reported to the agency or
/// the reference day (symptom onset where known).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateKind {
    Report,
    Reference,
}

impl DateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Reference => "reference",
        }
    }
}

impl fmt::Display for DateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DateKind {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "report" => Ok(Self::Report),
            "reference" => Ok(Self::Reference),
            _ => Err(FilterError::UnknownDateKind(value.to_string())),
        }
    }
}

/// Administrative level of a region selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionLevel {
    State,
    District,
}

impl RegionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::District => "district",
        }
    }
}

impl fmt::Display for RegionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RegionLevel {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // German datasets call these levels Bundesland and Landkreis.
        match value.trim().to_ascii_lowercase().as_str() {
            "state" | "bundesland" => Ok(Self::State),
            "district" | "landkreis" => Ok(Self::District),
            _ => Err(FilterError::UnknownRegionLevel(value.to_string())),
        }
    }
}

/// A (level, name) pair selecting one region. Absence of a selector means
/// all regions combined; there is no magic name standing in for "all".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSelector {
    pub level: RegionLevel,
    pub name: String,
}

impl RegionSelector {
    pub fn new(level: RegionLevel, name: impl Into<String>) -> Self {
        Self {
            level,
            name: name.into(),
        }
    }

    pub fn state(name: impl Into<String>) -> Self {
        Self::new(RegionLevel::State, name)
    }

    pub fn district(name: impl Into<String>) -> Self {
        Self::new(RegionLevel::District, name)
    }
}

impl fmt::Display for RegionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.level, self.name)
    }
}

/// Inclusive calendar window. `None` on either side leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub begin: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(begin: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { begin, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn between(begin: NaiveDate, end: NaiveDate) -> Self {
        Self {
            begin: Some(begin),
            end: Some(end),
        }
    }

    /// Rejects windows whose begin lies after their end. Half-open and fully
    /// open windows are always valid.
    pub fn validate(&self) -> Result<(), FilterError> {
        match (self.begin, self.end) {
            (Some(begin), Some(end)) if begin > end => {
                Err(FilterError::InvalidDateRange { begin, end })
            }
            _ => Ok(()),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        if let Some(begin) = self.begin {
            if date < begin {
                return false;
            }
        }
        if let Some(end) = self.end {
            if date > end {
                return false;
            }
        }
        true
    }
}

/// Keeps only the points falling inside `range`, preserving order.
pub fn clip_to_range(series: &mut Vec<(NaiveDate, i64)>, range: &DateRange) {
    series.retain(|(date, _)| range.contains(*date));
}

/// Day-over-day differences of a cumulative series. The first point has no
/// predecessor and is dropped; series shorter than two points come out empty.
pub fn daily_from_cumulative(series: &[(NaiveDate, i64)]) -> DailySeries {
    series
        .windows(2)
        .map(|pair| (pair[1].0, pair[1].1 - pair[0].1))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    UnknownMetric(String),
    UnknownDateKind(String),
    UnknownRegionLevel(String),
    InvalidDateRange { begin: NaiveDate, end: NaiveDate },
    NotRetrieved { source: &'static str },
    MissingMetric(Metric),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMetric(value) => write!(
                f,
                "invalid metric '{value}'; valid options: 'confirmed' (alias 'cases'), 'deaths', 'recovered'"
            ),
            Self::UnknownDateKind(value) => write!(
                f,
                "invalid date kind '{value}'; valid options: 'report', 'reference'"
            ),
            Self::UnknownRegionLevel(value) => write!(
                f,
                "invalid region level '{value}'; valid options: 'state', 'district'"
            ),
            Self::InvalidDateRange { begin, end } => {
                write!(f, "invalid date range: begin {begin} lies after end {end}")
            }
            Self::NotRetrieved { source } => write!(
                f,
                "no {source} dataset in memory; run download_all_available_data first"
            ),
            Self::MissingMetric(metric) => {
                write!(f, "no '{metric}' table in memory; download it first")
            }
        }
    }
}

impl std::error::Error for FilterError {}
