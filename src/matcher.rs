use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::coordinates::Coordinates;
use crate::drift::ClockDriftCompensator;
use crate::error::GeotagError;
use crate::ledger::AssignmentLedger;
use crate::options::MatchOptions;
use crate::track_store::TrackStore;

/// How a photo's current coordinates came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchType {
    #[default]
    NotMatched,
    ExactMatch,
    InterpolatedMatch,
    ManuallySet,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotMatched => "notMatched",
            Self::ExactMatch => "exactMatch",
            Self::InterpolatedMatch => "interpolatedMatch",
            Self::ManuallySet => "manuallySet",
        }
    }
}

/// Outcome of matching one timestamp against the loaded tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchResult {
    NotMatched,
    Exact(Coordinates),
    Interpolated(Coordinates),
}

impl MatchResult {
    pub fn match_type(&self) -> MatchType {
        match self {
            Self::NotMatched => MatchType::NotMatched,
            Self::Exact(_) => MatchType::ExactMatch,
            Self::Interpolated(_) => MatchType::InterpolatedMatch,
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Self::NotMatched => None,
            Self::Exact(c) | Self::Interpolated(c) => Some(*c),
        }
    }
}

/// Which kinds of match a run may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Exact first, interpolated otherwise.
    #[default]
    Combined,
    ExactOnly,
    InterpolatedOnly,
}

impl MatchMode {
    fn allows_exact(self) -> bool {
        self != Self::InterpolatedOnly
    }

    fn allows_interpolation(self) -> bool {
        self != Self::ExactOnly
    }
}

impl FromStr for MatchMode {
    type Err = GeotagError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "combined" => Ok(Self::Combined),
            "exact" => Ok(Self::ExactOnly),
            "interpolated" => Ok(Self::InterpolatedOnly),
            other => Err(GeotagError::Options(format!("unknown match mode: {other}"))),
        }
    }
}

/// Counts from a batch run over the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub exact: usize,
    pub interpolated: usize,
    pub not_matched: usize,
    pub manually_set: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    options: MatchOptions,
}

impl MatchEngine {
    pub fn new(options: MatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// Match an absolute time against the store. Never fails: no usable track
    /// data is reported as `MatchResult::NotMatched`.
    pub fn match_time(&self, store: &TrackStore, time: DateTime<Utc>) -> MatchResult {
        self.match_time_with(store, time, MatchMode::Combined)
    }

    /// Like [`match_time`](Self::match_time), trying only the kinds of match
    /// `mode` allows.
    pub fn match_time_with(
        &self,
        store: &TrackStore,
        time: DateTime<Utc>,
        mode: MatchMode,
    ) -> MatchResult {
        if mode.allows_exact() {
            let tolerance = Duration::seconds(i64::from(self.options.exact_match_tolerance));
            if let Some(nearest) = store.query_nearest(time) {
                if nearest.delta <= tolerance {
                    return MatchResult::Exact(nearest.point.coordinates);
                }
            }
        }
        if !mode.allows_interpolation() {
            return MatchResult::NotMatched;
        }

        let Some((before, after)) = store.query_bracket(time) else {
            return MatchResult::NotMatched;
        };

        let interval = after.time - before.time;
        if let Some(max_interval) = self.options.maximum_interpolation_interval {
            if interval > Duration::seconds(i64::from(max_interval)) {
                debug!("Interval of {}s exceeds {max_interval}s", interval.num_seconds());
                return MatchResult::NotMatched;
            }
        }

        if let Some(max_distance) = self.options.maximum_interpolation_distance {
            let distance = before.coordinates.distance_to(&after.coordinates);
            if distance > f64::from(max_distance) {
                debug!("Distance of {distance:.0}m exceeds {max_distance}m");
                return MatchResult::NotMatched;
            }
        }

        let fraction = match interval.num_milliseconds() {
            0 => 0.0,
            total => (time - before.time).num_milliseconds() as f64 / total as f64,
        };

        MatchResult::Interpolated(before.coordinates.interpolate(&after.coordinates, fraction))
    }

    /// Correct the photo's capture time, match it and write the result into the ledger.
    ///
    /// Overwrites whatever the photo had before, manual assignments included.
    pub fn match_photo(
        &self,
        store: &TrackStore,
        compensator: &ClockDriftCompensator,
        ledger: &mut AssignmentLedger,
        path: &str,
        mode: MatchMode,
    ) -> Result<MatchResult, GeotagError> {
        let capture_time = ledger
            .get(path)
            .ok_or_else(|| GeotagError::UnknownPhoto(path.to_string()))?
            .capture_time();

        let result = self.match_time_with(store, compensator.correct(capture_time), mode);
        ledger.apply_match(path, result)?;
        Ok(result)
    }

    /// Match every photo in the ledger, leaving manually set ones alone.
    pub fn match_all(
        &self,
        store: &TrackStore,
        compensator: &ClockDriftCompensator,
        ledger: &mut AssignmentLedger,
        mode: MatchMode,
    ) -> MatchReport {
        let mut report = MatchReport::default();
        let pending: Vec<_> = ledger
            .photos()
            .filter(|photo| {
                if photo.match_type() == MatchType::ManuallySet {
                    report.manually_set += 1;
                    false
                } else {
                    true
                }
            })
            .map(|photo| (photo.path().to_string(), photo.capture_time()))
            .collect();

        for (path, capture_time) in pending {
            let result = self.match_time_with(store, compensator.correct(capture_time), mode);
            match result {
                MatchResult::Exact(_) => report.exact += 1,
                MatchResult::Interpolated(_) => report.interpolated += 1,
                MatchResult::NotMatched => report.not_matched += 1,
            }
            if let Err(e) = ledger.apply_match(&path, result) {
                warn!("Could not store match for {path}: {e}");
            }
        }

        info!(
            "Matched photos: {} exact, {} interpolated, {} not matched, {} manually set",
            report.exact, report.interpolated, report.not_matched, report.manually_set
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpx_types::{GpxData, GpxPoint, GpxSegment, GpxTrack};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn point(secs: i64, lon: f64, lat: f64) -> GpxPoint {
        GpxPoint::new(lat, lon).with_time(&at(secs).to_rfc3339())
    }

    fn store(segments: Vec<Vec<GpxPoint>>) -> TrackStore {
        let mut store = TrackStore::new();
        store.load(
            "track.gpx",
            &GpxData {
                tracks: vec![GpxTrack {
                    name: None,
                    segments: segments.into_iter().map(GpxSegment::new).collect(),
                }],
                skipped_points: 0,
            },
        );
        store
    }

    fn two_point_store() -> TrackStore {
        store(vec![vec![point(0, 0.0, 0.0), point(100, 0.0, 1.0)]])
    }

    fn engine(tolerance: u32, interval: Option<u32>, distance: Option<u32>) -> MatchEngine {
        MatchEngine::new(MatchOptions {
            exact_match_tolerance: tolerance,
            maximum_interpolation_interval: interval,
            maximum_interpolation_distance: distance,
        })
    }

    fn coords(lon: f64, lat: f64) -> Coordinates {
        Coordinates::new(lon, lat, None).unwrap()
    }

    #[test]
    fn test_exact_tolerance_is_inclusive() {
        let store = two_point_store();
        let engine = engine(5, None, None);

        assert_eq!(engine.match_time(&store, at(105)), MatchResult::Exact(coords(0.0, 1.0)));
        assert_eq!(engine.match_time(&store, at(106)), MatchResult::NotMatched);
        assert_eq!(engine.match_time(&store, at(5)), MatchResult::Exact(coords(0.0, 0.0)));
        assert_eq!(
            engine.match_time(&store, at(6)).match_type(),
            MatchType::InterpolatedMatch
        );
    }

    #[test]
    fn test_two_point_scenario() {
        let store = two_point_store();
        let engine = engine(5, None, None);

        assert_eq!(engine.match_time(&store, at(102)), MatchResult::Exact(coords(0.0, 1.0)));

        let result = engine.match_time(&store, at(50));
        assert_eq!(result.match_type(), MatchType::InterpolatedMatch);
        let c = result.coordinates().unwrap();
        assert!((c.lon() - 0.0).abs() < 1e-12);
        assert!((c.lat() - 0.5).abs() < 1e-12);

        assert_eq!(engine.match_time(&store, at(200)), MatchResult::NotMatched);
    }

    #[test]
    fn test_distance_limit_rejects_interpolation() {
        let store = two_point_store();
        assert_eq!(
            engine(5, None, Some(1)).match_time(&store, at(50)),
            MatchResult::NotMatched
        );
        assert_eq!(
            engine(5, None, Some(112_000))
                .match_time(&store, at(50))
                .match_type(),
            MatchType::InterpolatedMatch
        );
    }

    #[test]
    fn test_interval_limit_rejects_interpolation() {
        let store = two_point_store();
        assert_eq!(
            engine(5, Some(99), None).match_time(&store, at(50)),
            MatchResult::NotMatched
        );
        assert_eq!(
            engine(5, Some(100), None)
                .match_time(&store, at(50))
                .match_type(),
            MatchType::InterpolatedMatch
        );
    }

    #[test]
    fn test_zero_tolerance_interpolates_at_endpoints() {
        let store = two_point_store();
        let engine = engine(0, None, None);

        assert_eq!(engine.match_time(&store, at(0)), MatchResult::Exact(coords(0.0, 0.0)));
        let result = engine.match_time(&store, at(25));
        assert!((result.coordinates().unwrap().lat() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_no_interpolation_across_segment_gap() {
        let store = store(vec![
            vec![point(0, 0.0, 0.0), point(10, 0.0, 0.001)],
            vec![point(40, 0.0, 0.002), point(50, 0.0, 0.003)],
        ]);
        let engine = engine(5, Some(3600), None);
        assert_eq!(engine.match_time(&store, at(25)), MatchResult::NotMatched);
        assert_eq!(
            engine.match_time(&store, at(45)).match_type(),
            MatchType::ExactMatch
        );
    }

    #[test]
    fn test_altitude_interpolation() {
        let store = store(vec![vec![
            point(0, 0.0, 0.0).with_ele(100.0),
            point(100, 0.0, 0.1).with_ele(200.0),
            point(200, 0.0, 0.2),
        ]]);
        let engine = engine(0, None, None);

        let c = engine.match_time(&store, at(25)).coordinates().unwrap();
        assert!((c.alt().unwrap() - 125.0).abs() < 1e-9);

        let c = engine.match_time(&store, at(150)).coordinates().unwrap();
        assert_eq!(c.alt(), None);

        let c = engine.match_time(&store, at(100)).coordinates().unwrap();
        assert_eq!(c.alt(), Some(200.0));
    }

    #[test]
    fn test_empty_store_never_matches() {
        let engine = MatchEngine::default();
        assert_eq!(engine.match_time(&TrackStore::new(), at(0)), MatchResult::NotMatched);
    }

    #[test]
    fn test_match_is_repeatable() {
        let store = two_point_store();
        let engine = engine(5, None, None);
        assert_eq!(engine.match_time(&store, at(37)), engine.match_time(&store, at(37)));
    }

    #[test]
    fn test_match_photo_and_batch() {
        let store = two_point_store();
        let engine = engine(5, None, None);
        let compensator = ClockDriftCompensator::default();
        let mut ledger = AssignmentLedger::new();

        ledger.record_initial("a.jpg", at(50).naive_utc(), Coordinates::unset());
        ledger.record_initial("b.jpg", at(101).naive_utc(), Coordinates::unset());
        ledger.record_initial("c.jpg", at(500).naive_utc(), Coordinates::unset());
        ledger.record_initial("d.jpg", at(0).naive_utc(), Coordinates::unset());
        ledger.set_manual("d.jpg", coords(9.0, 9.0)).unwrap();

        let report = engine.match_all(&store, &compensator, &mut ledger, MatchMode::Combined);
        assert_eq!(
            report,
            MatchReport {
                exact: 1,
                interpolated: 1,
                not_matched: 1,
                manually_set: 1,
            }
        );
        assert_eq!(ledger.get("a.jpg").unwrap().match_type(), MatchType::InterpolatedMatch);
        assert_eq!(ledger.get("b.jpg").unwrap().match_type(), MatchType::ExactMatch);
        assert_eq!(ledger.get("c.jpg").unwrap().match_type(), MatchType::NotMatched);
        assert_eq!(ledger.get("d.jpg").unwrap().coordinates(), coords(9.0, 9.0));

        // An explicit re-match replaces the manual position.
        let result = engine
            .match_photo(&store, &compensator, &mut ledger, "d.jpg", MatchMode::Combined)
            .unwrap();
        assert_eq!(result, MatchResult::Exact(coords(0.0, 0.0)));
        assert_eq!(ledger.get("d.jpg").unwrap().match_type(), MatchType::ExactMatch);

        assert!(matches!(
            engine.match_photo(&store, &compensator, &mut ledger, "missing.jpg", MatchMode::Combined),
            Err(GeotagError::UnknownPhoto(_))
        ));
    }

    #[test]
    fn test_match_photo_applies_clock_deviation() {
        let store = two_point_store();
        let engine = engine(5, None, None);
        let compensator = ClockDriftCompensator::new(chrono_tz::Tz::UTC, chrono_tz::Tz::UTC, 100).unwrap();
        let mut ledger = AssignmentLedger::new();
        ledger.record_initial("a.jpg", at(0).naive_utc(), Coordinates::unset());

        let result = engine
            .match_photo(&store, &compensator, &mut ledger, "a.jpg", MatchMode::Combined)
            .unwrap();
        assert_eq!(result, MatchResult::Exact(coords(0.0, 1.0)));
    }

    #[test]
    fn test_match_modes() {
        let store = two_point_store();
        let engine = engine(5, None, None);

        assert_eq!(
            engine.match_time_with(&store, at(2), MatchMode::ExactOnly),
            MatchResult::Exact(coords(0.0, 0.0))
        );
        assert_eq!(
            engine.match_time_with(&store, at(50), MatchMode::ExactOnly),
            MatchResult::NotMatched
        );

        // Close enough for an exact match, but only interpolation is allowed.
        let result = engine.match_time_with(&store, at(2), MatchMode::InterpolatedOnly);
        assert_eq!(result.match_type(), MatchType::InterpolatedMatch);
        assert!((result.coordinates().unwrap().lat() - 0.02).abs() < 1e-12);
        assert_eq!(
            engine.match_time_with(&store, at(102), MatchMode::InterpolatedOnly),
            MatchResult::NotMatched
        );

        assert_eq!(
            engine.match_time_with(&store, at(37), MatchMode::Combined),
            engine.match_time(&store, at(37))
        );
    }

    #[test]
    fn test_batch_in_exact_mode_keeps_misses_untouched() {
        let store = two_point_store();
        let engine = engine(5, None, None);
        let compensator = ClockDriftCompensator::default();
        let mut ledger = AssignmentLedger::new();
        ledger.record_initial("a.jpg", at(50).naive_utc(), Coordinates::unset());
        ledger.record_initial("b.jpg", at(99).naive_utc(), Coordinates::unset());

        let report = engine.match_all(&store, &compensator, &mut ledger, MatchMode::ExactOnly);
        assert_eq!(report.exact, 1);
        assert_eq!(report.interpolated, 0);
        assert_eq!(report.not_matched, 1);
        assert_eq!(ledger.get("a.jpg").unwrap().match_type(), MatchType::NotMatched);
        assert!(!ledger.is_changed("a.jpg").unwrap());
    }

    #[test]
    fn test_parse_match_mode() {
        assert_eq!("combined".parse::<MatchMode>().unwrap(), MatchMode::Combined);
        assert_eq!("exact".parse::<MatchMode>().unwrap(), MatchMode::ExactOnly);
        assert_eq!(" interpolated ".parse::<MatchMode>().unwrap(), MatchMode::InterpolatedOnly);
        assert!(matches!(
            "nearest".parse::<MatchMode>(),
            Err(GeotagError::Options(_))
        ));
    }
}
