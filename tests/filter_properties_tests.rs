//! Behavioural properties of the filter accessors at the public API:
//! fixture round-trips, additivity across selectors, monotonicity and
//! window semantics.

use std::path::{Path, PathBuf};

use casefeed::{
    CountrySelector, DateKind, DateRange, FilterError, Jhu, Locator, Metric, Rki,
};
use chrono::NaiveDate;

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("dashboards")
        .join(name)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, d).unwrap()
}

fn downloaded_adapter() -> Jhu {
    let mut adapter = Jhu::new();
    for metric in Metric::ALL {
        let locator = Locator::file(fixture_path(&format!("{metric}_global.csv")));
        adapter
            .download_from(metric, &locator, None)
            .expect("metric fixture");
    }
    adapter
}

/// Per-date totals summed straight out of the fixture text, bypassing the
/// adapter entirely.
fn fixture_sums(name: &str) -> Vec<i64> {
    let text = std::fs::read_to_string(fixture_path(name)).expect("fixture text");
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let mut totals: Vec<i64> = Vec::new();
    for result in reader.records() {
        let row = result.expect("fixture row");
        for (index, cell) in row.iter().skip(4).enumerate() {
            if index == totals.len() {
                totals.push(0);
            }
            totals[index] += cell.parse::<i64>().expect("count cell");
        }
    }
    totals
}

#[test]
fn aggregate_series_match_the_raw_fixture_sums() {
    let adapter = downloaded_adapter();
    for metric in Metric::ALL {
        let series = adapter
            .series(metric, None, &DateRange::unbounded())
            .expect("aggregate series");
        let sums = fixture_sums(&format!("{metric}_global.csv"));
        assert_eq!(series.len(), sums.len());
        for ((_, value), expected) in series.iter().zip(&sums) {
            assert_eq!(value, expected);
        }
    }
}

#[test]
fn regional_series_add_up_to_the_aggregate() {
    let adapter = downloaded_adapter();
    let germany = adapter
        .series(
            Metric::Confirmed,
            Some(&CountrySelector::country("Germany")),
            &DateRange::unbounded(),
        )
        .expect("country series");
    let iceland = adapter
        .series(
            Metric::Confirmed,
            Some(&CountrySelector::country("Iceland")),
            &DateRange::unbounded(),
        )
        .expect("country series");
    let all = adapter
        .series(Metric::Confirmed, None, &DateRange::unbounded())
        .expect("aggregate series");

    assert_eq!(germany.len(), all.len());
    for (index, (date, total)) in all.into_iter().enumerate() {
        assert_eq!(germany[index].0, date);
        assert_eq!(germany[index].1 + iceland[index].1, total);
    }
}

#[test]
fn cumulative_series_never_decrease() {
    let adapter = downloaded_adapter();
    for metric in Metric::ALL {
        let series = adapter
            .series(metric, None, &DateRange::unbounded())
            .expect("aggregate series");
        for pair in series.windows(2) {
            assert!(pair[1].1 >= pair[0].1, "{metric} series decreased");
        }
    }
}

#[test]
fn daily_new_counts_are_non_negative_for_monotone_sources() {
    let adapter = downloaded_adapter();
    for metric in Metric::ALL {
        let daily = adapter
            .new_series(metric, None, &DateRange::unbounded())
            .expect("daily series");
        assert!(daily.iter().all(|(_, change)| *change >= 0));
    }
}

#[test]
fn repeating_a_query_returns_identical_results() {
    let adapter = downloaded_adapter();
    let selector = CountrySelector::province("Germany", "Bavaria");
    let range = DateRange::between(day(23), day(25));
    let first = adapter
        .series(Metric::Confirmed, Some(&selector), &range)
        .expect("first query");
    let second = adapter
        .series(Metric::Confirmed, Some(&selector), &range)
        .expect("second query");
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn unmatched_region_yields_an_empty_series() {
    let adapter = downloaded_adapter();
    let selector = CountrySelector::country("Atlantis");
    let series = adapter
        .series(Metric::Confirmed, Some(&selector), &DateRange::unbounded())
        .expect("empty series");
    assert!(series.is_empty());
}

#[test]
fn window_slices_are_suffixes_of_the_full_series() {
    let adapter = downloaded_adapter();
    let full = adapter
        .series(Metric::Confirmed, None, &DateRange::unbounded())
        .expect("full series");
    let sliced = adapter
        .series(
            Metric::Confirmed,
            None,
            &DateRange::new(Some(day(24)), None),
        )
        .expect("sliced series");
    assert_eq!(sliced.as_slice(), &full[full.len() - sliced.len()..]);
    assert_eq!(sliced.first().map(|point| point.0), Some(day(24)));
}

#[test]
fn inverted_windows_fail_before_any_data_access() {
    let range = DateRange::between(day(25), day(22));

    let err = Rki::new()
        .filter(Metric::Confirmed, DateKind::Report, None, &range)
        .unwrap_err();
    assert!(matches!(err, FilterError::InvalidDateRange { .. }));

    let adapter = downloaded_adapter();
    let err = adapter
        .series(Metric::Confirmed, None, &range)
        .unwrap_err();
    assert!(matches!(err, FilterError::InvalidDateRange { .. }));
}

#[test]
fn parsed_metric_names_drive_the_same_queries() {
    let adapter = downloaded_adapter();
    let metric: Metric = "cases".parse().expect("alias parses");
    let via_alias = adapter
        .series(metric, None, &DateRange::unbounded())
        .expect("alias series");
    let direct = adapter
        .series(Metric::Confirmed, None, &DateRange::unbounded())
        .expect("direct series");
    assert_eq!(via_alias, direct);
}
