//! Johns Hopkins CSSE global dashboard adapter.
//!
//! Three wide CSV time series (confirmed, deaths, recovered) are fetched
//! independently, normalized into [`CompartmentTable`]s and cached on the
//! adapter. A fetch or parse failure on any one file substitutes the bundled
//! fallback copy for that file and the call still succeeds.

mod table;

pub use table::{CompartmentTable, CountrySelector, RegionColumn};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::fetch::{fetch_text, DataOrigin, FetchError, Locator};
use crate::series::{
    daily_from_cumulative, CumulativeSeries, DailySeries, DateRange, FilterError, Metric,
};

pub const DEFAULT_CONFIRMED_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";
pub const DEFAULT_DEATHS_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_deaths_global.csv";
pub const DEFAULT_RECOVERED_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_recovered_global.csv";

pub const DEFAULT_CONFIRMED_FALLBACK_PATH: &str = "data/time_series_covid19_confirmed_global.csv";
pub const DEFAULT_DEATHS_FALLBACK_PATH: &str = "data/time_series_covid19_deaths_global.csv";
pub const DEFAULT_RECOVERED_FALLBACK_PATH: &str = "data/time_series_covid19_recovered_global.csv";

#[derive(Debug)]
pub enum JhuError {
    Fetch(FetchError),
    Csv(csv::Error),
    Malformed { detail: String },
    Fallback { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for JhuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(err) => write!(f, "dashboard fetch failed: {err}"),
            Self::Csv(err) => write!(f, "failed to parse dashboard CSV: {err}"),
            Self::Malformed { detail } => write!(f, "malformed dashboard CSV: {detail}"),
            Self::Fallback { path, source } => {
                write!(f, "unable to read fallback copy '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for JhuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fetch(err) => Some(err),
            Self::Csv(err) => Some(err),
            Self::Malformed { .. } => None,
            Self::Fallback { source, .. } => Some(source),
        }
    }
}

fn default_source(metric: Metric) -> Locator {
    let url = match metric {
        Metric::Confirmed => DEFAULT_CONFIRMED_URL,
        Metric::Deaths => DEFAULT_DEATHS_URL,
        Metric::Recovered => DEFAULT_RECOVERED_URL,
    };
    Locator::Url(url.to_string())
}

fn default_fallback(metric: Metric) -> PathBuf {
    PathBuf::from(match metric {
        Metric::Confirmed => DEFAULT_CONFIRMED_FALLBACK_PATH,
        Metric::Deaths => DEFAULT_DEATHS_FALLBACK_PATH,
        Metric::Recovered => DEFAULT_RECOVERED_FALLBACK_PATH,
    })
}

/// Retrieves and normalizes one metric table without caching it anywhere.
///
/// A fetch or parse failure on the primary source falls back to the local
/// copy (when one is given) with a stderr notice; the returned table then
/// carries origin [`DataOrigin::Fallback`].
pub fn fetch_table(
    metric: Metric,
    source: &Locator,
    fallback: Option<&Path>,
) -> Result<CompartmentTable, JhuError> {
    let live = fetch_text(source)
        .map_err(JhuError::Fetch)
        .and_then(|text| table::parse_wide_csv(&text, DataOrigin::Live));
    match live {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            let Some(path) = fallback else {
                return Err(err);
            };
            eprintln!("jhu: failed to load {metric} data from {source} ({err}); using local fallback copy");
            let text = fs::read_to_string(path).map_err(|source| JhuError::Fallback {
                path: path.to_path_buf(),
                source,
            })?;
            table::parse_wide_csv(&text, DataOrigin::Fallback)
        }
    }
}

/// One date's values across all three metrics, from [`Jhu::combined`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinedPoint {
    pub date: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
}

/// Adapter state: one normalized table per metric, populated by the
/// download calls and read by the accessors.
#[derive(Debug, Default)]
pub struct Jhu {
    confirmed: Option<CompartmentTable>,
    deaths: Option<CompartmentTable>,
    recovered: Option<CompartmentTable>,
}

impl Jhu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Downloads all three metric tables from the default endpoints.
    pub fn download_all_available_data(&mut self) -> Result<(), JhuError> {
        for metric in Metric::ALL {
            self.download(metric)?;
        }
        Ok(())
    }

    /// Downloads one metric table from its default endpoint, with the
    /// default fallback copy.
    pub fn download(&mut self, metric: Metric) -> Result<&CompartmentTable, JhuError> {
        let source = default_source(metric);
        let fallback = default_fallback(metric);
        self.download_from(metric, &source, Some(&fallback))
    }

    /// Downloads one metric table from an explicit source, replacing any
    /// previously cached table for that metric.
    pub fn download_from(
        &mut self,
        metric: Metric,
        source: &Locator,
        fallback: Option<&Path>,
    ) -> Result<&CompartmentTable, JhuError> {
        let parsed = fetch_table(metric, source, fallback)?;
        Ok(self.slot_mut(metric).insert(parsed))
    }

    pub fn table(&self, metric: Metric) -> Option<&CompartmentTable> {
        match metric {
            Metric::Confirmed => self.confirmed.as_ref(),
            Metric::Deaths => self.deaths.as_ref(),
            Metric::Recovered => self.recovered.as_ref(),
        }
    }

    fn slot_mut(&mut self, metric: Metric) -> &mut Option<CompartmentTable> {
        match metric {
            Metric::Confirmed => &mut self.confirmed,
            Metric::Deaths => &mut self.deaths,
            Metric::Recovered => &mut self.recovered,
        }
    }

    /// Cumulative series for one metric. See [`CompartmentTable::series`]
    /// for the selector and range semantics.
    pub fn series(
        &self,
        metric: Metric,
        region: Option<&CountrySelector>,
        range: &DateRange,
    ) -> Result<CumulativeSeries, FilterError> {
        let table = self
            .table(metric)
            .ok_or(FilterError::MissingMetric(metric))?;
        table.series(region, range)
    }

    /// Daily-new series: first difference of the sliced cumulative series.
    /// The first date of the window has no predecessor and is dropped.
    pub fn new_series(
        &self,
        metric: Metric,
        region: Option<&CountrySelector>,
        range: &DateRange,
    ) -> Result<DailySeries, FilterError> {
        Ok(daily_from_cumulative(&self.series(metric, region, range)?))
    }

    /// All three metrics side by side, one row per date. Rows exist only for
    /// dates present in all three tables.
    pub fn combined(
        &self,
        region: Option<&CountrySelector>,
        range: &DateRange,
    ) -> Result<Vec<CombinedPoint>, FilterError> {
        let confirmed = self.series(Metric::Confirmed, region, range)?;
        let deaths: HashMap<NaiveDate, i64> = self
            .series(Metric::Deaths, region, range)?
            .into_iter()
            .collect();
        let recovered: HashMap<NaiveDate, i64> = self
            .series(Metric::Recovered, region, range)?
            .into_iter()
            .collect();

        let mut rows = Vec::with_capacity(confirmed.len());
        for (date, confirmed_count) in confirmed {
            let (Some(&death_count), Some(&recovered_count)) =
                (deaths.get(&date), recovered.get(&date))
            else {
                continue;
            };
            rows.push(CombinedPoint {
                date,
                confirmed: confirmed_count,
                deaths: death_count,
                recovered: recovered_count,
            });
        }
        Ok(rows)
    }

    /// Sorted (country, provinces) pairs across every populated table.
    /// Countries reported without province detail come back with an empty
    /// province list.
    pub fn regions(&self) -> Vec<(String, Vec<String>)> {
        let tables = [
            self.confirmed.as_ref(),
            self.deaths.as_ref(),
            self.recovered.as_ref(),
        ];
        let mut by_country: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for table in tables.into_iter().flatten() {
            for column in table.columns() {
                let provinces = by_country.entry(column.country.clone()).or_default();
                if let Some(province) = &column.province {
                    provinces.insert(province.clone());
                }
            }
        }
        by_country
            .into_iter()
            .map(|(country, provinces)| (country, provinces.into_iter().collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::table::parse_wide_csv;
    use super::{CountrySelector, Jhu, Metric};
    use crate::fetch::DataOrigin;
    use crate::series::{DateRange, FilterError};
    use chrono::NaiveDate;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    fn adapter_with(confirmed: &str, deaths: &str, recovered: &str) -> Jhu {
        Jhu {
            confirmed: Some(parse_wide_csv(confirmed, DataOrigin::Live).unwrap()),
            deaths: Some(parse_wide_csv(deaths, DataOrigin::Live).unwrap()),
            recovered: Some(parse_wide_csv(recovered, DataOrigin::Live).unwrap()),
        }
    }

    #[test]
    fn accessors_before_download_report_the_missing_metric() {
        let adapter = Jhu::new();
        let err = adapter
            .series(Metric::Deaths, None, &DateRange::unbounded())
            .unwrap_err();
        assert_eq!(err, FilterError::MissingMetric(Metric::Deaths));
    }

    #[test]
    fn combined_keeps_only_dates_shared_by_all_tables() {
        let adapter = adapter_with(
            "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20\n,Iceland,0,0,1,2,3\n",
            "Province/State,Country/Region,Lat,Long,1/23/20,1/24/20\n,Iceland,0,0,0,1\n",
            "Province/State,Country/Region,Lat,Long,1/23/20,1/24/20,1/25/20\n,Iceland,0,0,1,1,2\n",
        );
        let rows = adapter.combined(None, &DateRange::unbounded()).unwrap();
        let dates: Vec<_> = rows.iter().map(|row| row.date).collect();
        assert_eq!(dates, vec![day(1, 23), day(1, 24)]);
        assert_eq!(rows[0].confirmed, 2);
        assert_eq!(rows[0].deaths, 0);
        assert_eq!(rows[0].recovered, 1);
    }

    #[test]
    fn combined_without_deaths_table_errors() {
        let mut adapter = Jhu::new();
        adapter.confirmed = Some(
            parse_wide_csv(
                "Province/State,Country/Region,Lat,Long,1/22/20\n,Iceland,0,0,1\n",
                DataOrigin::Live,
            )
            .unwrap(),
        );
        let err = adapter.combined(None, &DateRange::unbounded()).unwrap_err();
        assert_eq!(err, FilterError::MissingMetric(Metric::Deaths));
    }

    #[test]
    fn new_series_first_differences_the_window() {
        let adapter = adapter_with(
            "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20\n,Iceland,0,0,1,4,9\n",
            "Province/State,Country/Region,Lat,Long,1/22/20\n,Iceland,0,0,0\n",
            "Province/State,Country/Region,Lat,Long,1/22/20\n,Iceland,0,0,0\n",
        );
        let daily = adapter
            .new_series(Metric::Confirmed, None, &DateRange::unbounded())
            .unwrap();
        assert_eq!(daily, vec![(day(1, 23), 3), (day(1, 24), 5)]);
    }

    #[test]
    fn single_date_window_differences_to_an_empty_series() {
        let adapter = adapter_with(
            "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20\n,Iceland,0,0,1,4\n",
            "Province/State,Country/Region,Lat,Long,1/22/20\n,Iceland,0,0,0\n",
            "Province/State,Country/Region,Lat,Long,1/22/20\n,Iceland,0,0,0\n",
        );
        let range = DateRange::between(day(1, 23), day(1, 23));
        let daily = adapter
            .new_series(Metric::Confirmed, None, &range)
            .unwrap();
        assert!(daily.is_empty());
    }

    #[test]
    fn regions_merge_countries_across_tables() {
        let adapter = adapter_with(
            "Province/State,Country/Region,Lat,Long,1/22/20\nBavaria,Germany,0,0,1\nBerlin,Germany,0,0,1\n",
            "Province/State,Country/Region,Lat,Long,1/22/20\n,Iceland,0,0,0\n",
            "Province/State,Country/Region,Lat,Long,1/22/20\nBavaria,Germany,0,0,0\n",
        );
        let regions = adapter.regions();
        assert_eq!(
            regions,
            vec![
                (
                    "Germany".to_string(),
                    vec!["Bavaria".to_string(), "Berlin".to_string()]
                ),
                ("Iceland".to_string(), Vec::new()),
            ]
        );
    }

    #[test]
    fn selector_named_none_is_an_ordinary_region_name() {
        let adapter = adapter_with(
            "Province/State,Country/Region,Lat,Long,1/22/20\n,Iceland,0,0,1\n",
            "Province/State,Country/Region,Lat,Long,1/22/20\n,Iceland,0,0,0\n",
            "Province/State,Country/Region,Lat,Long,1/22/20\n,Iceland,0,0,0\n",
        );
        let selector = CountrySelector::country("None");
        let series = adapter
            .series(Metric::Confirmed, Some(&selector), &DateRange::unbounded())
            .unwrap();
        assert!(series.is_empty());
    }
}
