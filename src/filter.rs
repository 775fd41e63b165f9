//! Date-range filtering of catalog entries.
//!
//! Report names end in `_YYYY-MM-DD.csv`. The date suffix is compared as a
//! string; fixed-width ISO dates order the same lexicographically and
//! chronologically.

use chrono::{Days, Local, NaiveDate};

use crate::catalog::ReportEntry;
use crate::error::{Error, Result};

/// Date format used in report names and range bounds.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Default look-back window in days.
pub const DEFAULT_WINDOW_DAYS: u64 = 15;

/// Extracts the date key from a report name.
///
/// Returns `None` unless the name ends in `.csv` and contains `_`.
#[must_use]
pub fn date_key(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(".csv")?;
    let (_, key) = stem.rsplit_once('_')?;
    Some(key)
}

/// Keeps the entries whose date key lies in `start..=end`.
#[must_use]
pub fn filter_by_date_range(catalog: &[ReportEntry], start: &str, end: &str) -> Vec<ReportEntry> {
    catalog
        .iter()
        .filter(|entry| date_key(&entry.name).is_some_and(|key| start <= key && key <= end))
        .cloned()
        .collect()
}

/// An inclusive range of calendar dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    start: String,
    end: String,
}

impl DateRange {
    /// Creates a range from two dates.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start.format(DATE_FORMAT).to_string(),
            end: end.format(DATE_FORMAT).to_string(),
        }
    }

    /// Parses a range from two `YYYY-MM-DD` strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either bound is not a valid date.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self::new(parse_date(start)?, parse_date(end)?))
    }

    /// The `days` days before `today` through `today`.
    #[must_use]
    pub fn ending_on(today: NaiveDate, days: u64) -> Self {
        let start = today.checked_sub_days(Days::new(days)).unwrap_or(today);
        Self::new(start, today)
    }

    /// The default window ending today in local time.
    #[must_use]
    pub fn last_days(days: u64) -> Self {
        Self::ending_on(Local::now().date_naive(), days)
    }

    /// Lower bound.
    #[must_use]
    pub fn start(&self) -> &str {
        &self.start
    }

    /// Upper bound.
    #[must_use]
    pub fn end(&self) -> &str {
        &self.end
    }

    /// Returns true if `start` is after `end`, which matches nothing.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    /// Applies the range to a catalog.
    #[must_use]
    pub fn apply(&self, catalog: &[ReportEntry]) -> Vec<ReportEntry> {
        filter_by_date_range(catalog, &self.start, &self.end)
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::last_days(DEFAULT_WINDOW_DAYS)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| Error::Config(format!("invalid date {value:?} (expected YYYY-MM-DD): {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(names: &[&str]) -> Vec<ReportEntry> {
        names
            .iter()
            .map(|n| ReportEntry::new(*n, format!("https://blob/{n}")))
            .collect()
    }

    fn names(entries: &[ReportEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn extracts_date_key() {
        assert_eq!(date_key("report_2024-01-01.csv"), Some("2024-01-01"));
        assert_eq!(date_key("daily_sales_2024-03-09.csv"), Some("2024-03-09"));
        assert_eq!(date_key("report-2024-01-01.csv"), None);
        assert_eq!(date_key("report_2024-01-01.txt"), None);
        assert_eq!(date_key("report_2024-01-01.CSV"), None);
    }

    #[test]
    fn single_day_range_is_inclusive() {
        let catalog = entries(&["report_2024-01-01.csv", "report_2023-12-31.csv"]);
        let kept = filter_by_date_range(&catalog, "2024-01-01", "2024-01-01");
        assert_eq!(names(&kept), ["report_2024-01-01.csv"]);
    }

    #[test]
    fn both_bounds_inclusive_neighbours_excluded() {
        let catalog = entries(&[
            "r_2024-01-09.csv",
            "r_2024-01-10.csv",
            "r_2024-01-15.csv",
            "r_2024-01-20.csv",
            "r_2024-01-21.csv",
        ]);
        let kept = filter_by_date_range(&catalog, "2024-01-10", "2024-01-20");
        assert_eq!(
            names(&kept),
            ["r_2024-01-10.csv", "r_2024-01-15.csv", "r_2024-01-20.csv"]
        );
    }

    #[test]
    fn names_without_date_key_are_dropped() {
        let catalog = entries(&["summary.csv", "notes_2024-01-05.pdf", "r_2024-01-05.csv"]);
        let kept = filter_by_date_range(&catalog, "2024-01-01", "2024-12-31");
        assert_eq!(names(&kept), ["r_2024-01-05.csv"]);
    }

    #[test]
    fn empty_result_is_fine() {
        let catalog = entries(&["r_2024-01-05.csv"]);
        assert!(filter_by_date_range(&catalog, "2025-01-01", "2025-01-31").is_empty());
    }

    #[test]
    fn date_range_parse_and_apply() {
        let range = DateRange::parse("2024-01-01", " 2024-01-31").unwrap();
        assert_eq!(range.start(), "2024-01-01");
        assert_eq!(range.end(), "2024-01-31");
        let kept = range.apply(&entries(&["r_2024-01-31.csv", "r_2024-02-01.csv"]));
        assert_eq!(names(&kept), ["r_2024-01-31.csv"]);
    }

    #[test]
    fn date_range_rejects_bad_dates() {
        assert!(matches!(DateRange::parse("2024-13-01", "2024-12-31"), Err(Error::Config(_))));
        assert!(DateRange::parse("yesterday", "2024-12-31").is_err());
    }

    #[test]
    fn default_window_spans_fifteen_days() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let range = DateRange::ending_on(today, DEFAULT_WINDOW_DAYS);
        assert_eq!(range.start(), "2024-02-24");
        assert_eq!(range.end(), "2024-03-10");
        assert!(!range.is_inverted());
    }

    #[test]
    fn inverted_range_matches_nothing() {
        let range = DateRange::parse("2024-02-01", "2024-01-01").unwrap();
        assert!(range.is_inverted());
        assert!(range.apply(&entries(&["r_2024-01-15.csv"])).is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn kept_entries_lie_within_bounds(
                days in proptest::collection::vec(0u64..400, 0..30),
                a in 0u64..400,
                b in 0u64..400,
            ) {
                let base = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
                let day = |n: u64| base.checked_add_days(Days::new(n)).unwrap();
                let catalog: Vec<_> = days
                    .iter()
                    .map(|d| ReportEntry::new(format!("r_{}.csv", day(*d).format(DATE_FORMAT)), "u"))
                    .collect();
                let range = DateRange::new(day(a.min(b)), day(a.max(b)));
                let kept = range.apply(&catalog);
                let expected = days.iter().filter(|d| (a.min(b)..=a.max(b)).contains(*d)).count();
                prop_assert_eq!(kept.len(), expected);
            }
        }
    }
}
