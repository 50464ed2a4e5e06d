//! Retrieval and filtering of COVID-19 case data from public dashboards.
//!
//! Two source adapters share one filter vocabulary: [`Jhu`] normalizes the
//! Johns Hopkins CSSE wide CSV time series into date-by-region tables, and
//! [`Rki`] collects the Robert Koch Institute ArcGIS query API into a flat
//! record table. Both fall back to bundled local snapshots when the live
//! source fails or looks mid-update, and both expose cumulative and
//! daily-new series sliced by region and date range.

pub mod fetch;
pub mod jhu;
pub mod rki;
pub mod series;

pub use fetch::{DataOrigin, FetchError, Locator};
pub use jhu::{CombinedPoint, CompartmentTable, CountrySelector, Jhu, JhuError, RegionColumn};
pub use rki::{CaseRecord, RetrievalConfig, Rki, RkiError, StateBreakdown};
pub use series::{
    daily_from_cumulative, CumulativeSeries, DailySeries, DateKind, DateRange, FilterError,
    Metric, RegionLevel, RegionSelector,
};
