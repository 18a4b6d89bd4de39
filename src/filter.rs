use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;

use crate::error::FilterError;
use crate::models::{DateRange, FilterSpec, TransactionRow};

/// Rows matching every active filter dimension, in input order.
///
/// An empty city or segment set passes every row. Once a dimension is
/// active, rows with a null value for it cannot match.
pub fn apply_filters<'a, I>(rows: I, spec: &FilterSpec) -> Vec<&'a TransactionRow>
where
    I: IntoIterator<Item = &'a TransactionRow>,
{
    rows.into_iter().filter(|row| matches(row, spec)).collect()
}

pub fn matches(row: &TransactionRow, spec: &FilterSpec) -> bool {
    member_of(&spec.cities, row.city.as_deref())
        && member_of(&spec.segments, row.segment.as_deref())
        && spec
            .date_range
            .map_or(true, |range| row.order_day().is_some_and(|day| range.contains(day)))
}

fn member_of(allowed: &BTreeSet<String>, value: Option<&str>) -> bool {
    allowed.is_empty() || value.is_some_and(|value| allowed.contains(value))
}

pub fn distinct_cities(rows: &[TransactionRow]) -> Vec<String> {
    distinct(rows.iter().filter_map(|row| row.city.as_deref()))
}

pub fn distinct_segments(rows: &[TransactionRow]) -> Vec<String> {
    distinct(rows.iter().filter_map(|row| row.segment.as_deref()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|value| seen.insert(*value))
        .map(str::to_string)
        .collect()
}

/// Earliest and latest order day among rows with a valid date.
pub fn date_bounds(rows: &[TransactionRow]) -> Option<(NaiveDate, NaiveDate)> {
    let mut days = rows.iter().filter_map(TransactionRow::order_day);
    let first = days.next()?;
    Some(days.fold((first, first), |(min, max), day| (min.min(day), max.max(day))))
}

/// Builds a range from optional bounds, completing a missing side from the
/// working set. No bounds at all means no date filter.
pub fn resolve_date_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    rows: &[TransactionRow],
) -> Result<Option<DateRange>, FilterError> {
    let bounds = date_bounds(rows);
    let (start, end) = match (from, to) {
        (Some(start), Some(end)) => (start, end),
        // A filled-in side never turns a one-sided range backwards.
        (Some(start), None) => (start, bounds.map_or(start, |(_, max)| max.max(start))),
        (None, Some(end)) => (bounds.map_or(end, |(min, _)| min.min(end)), end),
        (None, None) => return Ok(None),
    };

    DateRange::new(start, end).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(
        sequence: u64,
        customer: &str,
        date: Option<NaiveDate>,
        revenue: f64,
        city: &str,
        segment: &str,
    ) -> TransactionRow {
        TransactionRow {
            sequence,
            customer_id: Some(customer.to_string()),
            order_date: date.and_then(|date| date.and_hms_opt(9, 30, 0)),
            city: Some(city.to_string()),
            segment: Some(segment.to_string()),
            revenue,
            ..Default::default()
        }
    }

    fn sample_rows() -> Vec<TransactionRow> {
        vec![
            row(0, "C1", Some(day(2024, 1, 1)), 100.0, "A", "Retail"),
            row(1, "C1", Some(day(2024, 2, 1)), 50.0, "A", "Retail"),
            row(2, "C2", Some(day(2024, 1, 15)), 200.0, "B", "Enterprise"),
        ]
    }

    fn spec_with_range(start: NaiveDate, end: NaiveDate) -> FilterSpec {
        FilterSpec {
            date_range: Some(DateRange::new(start, end).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn empty_spec_is_identity() {
        let rows = sample_rows();
        let filtered = apply_filters(&rows, &FilterSpec::default());
        let expected: Vec<&TransactionRow> = rows.iter().collect();
        assert_eq!(filtered, expected);
    }

    #[test]
    fn full_date_range_is_identity_when_dates_are_valid() {
        let rows = sample_rows();
        let (start, end) = date_bounds(&rows).unwrap();
        let filtered = apply_filters(&rows, &spec_with_range(start, end));
        assert_eq!(filtered.len(), rows.len());
    }

    #[test]
    fn date_range_is_inclusive_by_calendar_day() {
        let rows = sample_rows();
        let february = spec_with_range(day(2024, 2, 1), day(2024, 2, 28));
        let filtered = apply_filters(&rows, &february);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].sequence, 1);
        assert_eq!(filtered[0].revenue, 50.0);
    }

    #[test]
    fn dimensions_combine_as_conjunction() {
        let rows = sample_rows();
        let spec = FilterSpec {
            cities: BTreeSet::from(["A".to_string(), "B".to_string()]),
            segments: BTreeSet::from(["Enterprise".to_string()]),
            date_range: None,
        };

        let filtered = apply_filters(&rows, &spec);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].customer_id.as_deref(), Some("C2"));
    }

    #[test]
    fn null_values_fail_active_dimensions() {
        let mut rows = sample_rows();
        rows[0].city = None;
        rows[1].order_date = None;

        let by_city = FilterSpec {
            cities: BTreeSet::from(["A".to_string()]),
            ..Default::default()
        };
        assert_eq!(apply_filters(&rows, &by_city).len(), 1);

        let by_date = spec_with_range(day(2024, 1, 1), day(2024, 12, 31));
        assert_eq!(apply_filters(&rows, &by_date).len(), 2);

        assert_eq!(apply_filters(&rows, &FilterSpec::default()).len(), 3);
    }

    #[test]
    fn reapplying_a_filter_changes_nothing() {
        let rows = sample_rows();
        let spec = FilterSpec {
            cities: BTreeSet::from(["A".to_string()]),
            segments: BTreeSet::new(),
            date_range: Some(DateRange::new(day(2024, 1, 1), day(2024, 1, 31)).unwrap()),
        };

        let once = apply_filters(&rows, &spec);
        let twice = apply_filters(once.iter().copied(), &spec);
        assert_eq!(once, twice);
    }

    #[test]
    fn distinct_values_keep_first_seen_order() {
        let mut rows = sample_rows();
        rows.push(row(3, "C3", None, 1.0, "A", "Retail"));
        rows[1].segment = None;

        assert_eq!(distinct_cities(&rows), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(
            distinct_segments(&rows),
            vec!["Retail".to_string(), "Enterprise".to_string()]
        );
    }

    #[test]
    fn half_open_range_is_completed_from_bounds() {
        let rows = sample_rows();

        let range = resolve_date_range(Some(day(2024, 1, 10)), None, &rows)
            .unwrap()
            .unwrap();
        assert_eq!(range.start(), day(2024, 1, 10));
        assert_eq!(range.end(), day(2024, 2, 1));

        assert_eq!(resolve_date_range(None, None, &rows), Ok(None));
    }

    #[test]
    fn one_sided_range_outside_the_data_selects_nothing() {
        let rows = sample_rows();

        let after = resolve_date_range(Some(day(2024, 3, 1)), None, &rows)
            .unwrap()
            .unwrap();
        assert_eq!(after.start(), day(2024, 3, 1));
        assert_eq!(after.end(), day(2024, 3, 1));

        let before = resolve_date_range(None, Some(day(2023, 12, 1)), &rows)
            .unwrap()
            .unwrap();
        assert_eq!(before.start(), day(2023, 12, 1));
        assert_eq!(before.end(), day(2023, 12, 1));

        for range in [after, before] {
            let spec = FilterSpec {
                date_range: Some(range),
                ..Default::default()
            };
            assert!(apply_filters(&rows, &spec).is_empty());
        }
    }

    #[test]
    fn explicit_inverted_bounds_are_rejected() {
        let rows = sample_rows();
        let err =
            resolve_date_range(Some(day(2024, 3, 1)), Some(day(2024, 1, 1)), &rows).unwrap_err();
        assert!(matches!(err, FilterError::InvertedRange { .. }));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = DateRange::new(day(2024, 3, 1), day(2024, 2, 1)).unwrap_err();
        assert_eq!(
            err,
            FilterError::InvertedRange {
                start: day(2024, 3, 1),
                end: day(2024, 2, 1)
            }
        );
    }
}
