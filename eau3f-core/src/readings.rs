//! Derivations over a reading list.
//!
//! Everything a sensor shows is computed here from the coordinator's latest
//! reading list: which meters exist, which reading is the latest, and the
//! statistics series to backfill.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::debug;

use crate::models::{MeterKind, Reading, StatisticPoint};

/// Returns the readings of one meter kind, in input order.
pub fn readings_for(readings: &[Reading], kind: MeterKind) -> impl Iterator<Item = &Reading> {
    readings.iter().filter(move |r| r.is_kind(kind))
}

/// Returns the meter kinds with at least one reading.
pub fn detect_meters(readings: &[Reading]) -> Vec<MeterKind> {
    MeterKind::all()
        .iter()
        .copied()
        .filter(|kind| readings.iter().any(|r| r.is_kind(*kind)))
        .collect()
}

/// Returns the latest reading of a meter kind.
///
/// "Latest" is the greatest `ecrelDatrel` string, compared as plain strings.
/// A missing date sorts as the empty string. On ties the earlier record in
/// input order wins.
pub fn latest_reading(readings: &[Reading], kind: MeterKind) -> Option<&Reading> {
    readings_for(readings, kind).fold(None, |best: Option<&Reading>, candidate| match best {
        Some(current) if candidate.date_key() <= current.date_key() => Some(current),
        _ => Some(candidate),
    })
}

/// Builds the statistics series for a meter kind.
///
/// Points are sorted by date ascending and carry the cumulative index as
/// both state and sum. Readings whose date does not parse, or that have no
/// index, are skipped. Start times are truncated to the hour. When two
/// readings land on the same start, the one [`latest_reading`] would pick
/// is kept: greatest date string, ties to the first in input order.
pub fn build_statistics(readings: &[Reading], kind: MeterKind) -> Vec<StatisticPoint> {
    let mut by_start: BTreeMap<DateTime<Utc>, (&str, StatisticPoint)> = BTreeMap::new();

    for reading in readings_for(readings, kind) {
        let Some(start) = reading.parsed_date().and_then(truncate_to_hour) else {
            debug!(date = %reading.date_key(), "Skipping reading with unparsable date");
            continue;
        };
        let Some(value) = reading.index_m3 else {
            debug!(date = %reading.date_key(), "Skipping reading without index");
            continue;
        };
        let point = StatisticPoint {
            start,
            state: value,
            sum: value,
        };

        match by_start.entry(start) {
            Entry::Vacant(slot) => {
                slot.insert((reading.date_key(), point));
            }
            Entry::Occupied(mut slot) => {
                let kept = slot.get().0;
                debug!(
                    start = %start,
                    kept,
                    other = %reading.date_key(),
                    "Readings share a statistics hour"
                );
                if reading.date_key() > kept {
                    slot.insert((reading.date_key(), point));
                }
            }
        }
    }

    by_start.into_values().map(|(_, point)| point).collect()
}

fn truncate_to_hour(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    dt.duration_trunc(TimeDelta::hours(1)).ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cold(date: &str, value: f64) -> Reading {
        Reading {
            cold: true,
            date: Some(date.to_string()),
            index_m3: Some(value),
            ..Reading::default()
        }
    }

    fn hot(date: &str, value: f64) -> Reading {
        Reading {
            hot: true,
            date: Some(date.to_string()),
            index_m3: Some(value),
            ..Reading::default()
        }
    }

    #[test]
    fn test_latest_reading_uses_greatest_date_string() {
        let readings = vec![
            cold("2026-01-01T00:00:00+00:00", 100.0),
            cold("2026-03-01T00:00:00+00:00", 130.0),
            cold("2026-02-01T00:00:00+00:00", 120.0),
            hot("2026-04-01T00:00:00+00:00", 9.0),
        ];

        let latest = latest_reading(&readings, MeterKind::Cold).unwrap();
        assert_eq!(latest.index_m3, Some(130.0));

        let latest = latest_reading(&readings, MeterKind::Hot).unwrap();
        assert_eq!(latest.index_m3, Some(9.0));
    }

    #[test]
    fn test_latest_reading_tie_keeps_first() {
        let readings = vec![
            cold("2026-02-01T00:00:00+00:00", 1.0),
            cold("2026-02-01T00:00:00+00:00", 2.0),
        ];
        let latest = latest_reading(&readings, MeterKind::Cold).unwrap();
        assert_eq!(latest.index_m3, Some(1.0));
    }

    #[test]
    fn test_latest_reading_missing_date_sorts_first() {
        let mut undated = cold("", 50.0);
        undated.date = None;
        let readings = vec![undated, cold("2025-12-01", 40.0)];

        let latest = latest_reading(&readings, MeterKind::Cold).unwrap();
        assert_eq!(latest.index_m3, Some(40.0));
    }

    #[test]
    fn test_latest_reading_is_string_ordered() {
        // Mixed offsets compare as strings, not instants.
        let readings = vec![
            cold("2026-02-01T00:30:00+01:00", 1.0),
            cold("2026-02-01T00:00:00+00:00", 2.0),
        ];
        let latest = latest_reading(&readings, MeterKind::Cold).unwrap();
        assert_eq!(latest.index_m3, Some(1.0));
    }

    #[test]
    fn test_detect_meters() {
        assert!(detect_meters(&[]).is_empty());

        let readings = vec![cold("2026-01-01", 1.0)];
        assert_eq!(detect_meters(&readings), vec![MeterKind::Cold]);

        let readings = vec![cold("2026-01-01", 1.0), hot("2026-01-01", 1.0)];
        assert_eq!(detect_meters(&readings), vec![MeterKind::Hot, MeterKind::Cold]);
    }

    #[test]
    fn test_statistics_ascending_with_sum() {
        let readings = vec![
            cold("2026-02-01T00:00:00+00:00", 120.0),
            cold("2026-01-01T00:00:00+00:00", 100.0),
        ];

        let points = build_statistics(&readings, MeterKind::Cold);
        assert_eq!(points.len(), 2);
        assert!(points[0].start < points[1].start);
        assert_eq!(points[0].sum, 100.0);
        assert_eq!(points[1].sum, 120.0);
        for p in &points {
            assert_eq!(p.state, p.sum);
        }
    }

    #[test]
    fn test_statistics_skip_unparsable_dates() {
        let readings = vec![
            cold("2026-01-01T00:00:00+00:00", 100.0),
            cold("not a date", 110.0),
            cold("2026-02-01T00:00:00+00:00", 120.0),
        ];

        let points = build_statistics(&readings, MeterKind::Cold);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].sum, 120.0);
    }

    #[test]
    fn test_statistics_one_point_per_distinct_hour() {
        let readings = vec![
            cold("2026-01-01T10:15:00+00:00", 100.0),
            cold("2026-01-01T11:45:00+00:00", 101.0),
            cold("2026-02-01T00:00:00+00:00", 120.0),
            cold("2026-01-15T00:00:00+01:00", 110.0),
        ];

        let points = build_statistics(&readings, MeterKind::Cold);
        let starts: Vec<String> = points.iter().map(|p| p.start.to_rfc3339()).collect();
        assert_eq!(
            starts,
            vec![
                "2026-01-01T10:00:00+00:00",
                "2026-01-01T11:00:00+00:00",
                "2026-01-14T23:00:00+00:00",
                "2026-02-01T00:00:00+00:00",
            ]
        );
        let sums: Vec<f64> = points.iter().map(|p| p.sum).collect();
        assert_eq!(sums, vec![100.0, 101.0, 110.0, 120.0]);
    }

    #[test]
    fn test_statistics_same_hour_keeps_latest_date() {
        let readings = vec![
            cold("2026-01-01T10:15:00+00:00", 100.0),
            cold("2026-01-01T10:45:00+00:00", 101.0),
            cold("2026-01-01T10:30:00+00:00", 102.0),
        ];

        let points = build_statistics(&readings, MeterKind::Cold);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].start.to_rfc3339(), "2026-01-01T10:00:00+00:00");
        assert_eq!(points[0].sum, 101.0);
    }

    #[test]
    fn test_statistics_same_instant_agrees_with_latest_reading() {
        // Same instant written with two offsets.
        let readings = vec![
            cold("2026-02-01T00:00:00+00:00", 120.0),
            cold("2026-02-01T01:00:00+01:00", 121.0),
        ];

        let points = build_statistics(&readings, MeterKind::Cold);
        let latest = latest_reading(&readings, MeterKind::Cold).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(Some(points[0].sum), latest.index_m3);
        assert_eq!(points[0].sum, 121.0);
    }

    #[test]
    fn test_statistics_same_date_tie_keeps_first() {
        let readings = vec![
            cold("2026-02-01T00:00:00+00:00", 1.0),
            cold("2026-02-01T00:00:00+00:00", 2.0),
        ];
        let points = build_statistics(&readings, MeterKind::Cold);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].sum, 1.0);
    }

    #[test]
    fn test_statistics_only_matching_kind() {
        let readings = vec![hot("2026-01-01", 5.0), cold("2026-01-01", 100.0)];
        let points = build_statistics(&readings, MeterKind::Hot);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].sum, 5.0);
    }
}
