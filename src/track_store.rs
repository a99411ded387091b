use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::coordinates::Coordinates;
use crate::error::GeotagError;
use crate::gpx_types::{GpxData, GpxPoint};
use crate::parser::parse_gpx;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub time: DateTime<Utc>,
    pub coordinates: Coordinates,
}

/// One contiguous recording session. Never empty, points ordered by time.
#[derive(Debug, Clone)]
pub struct TrackSegment {
    points: Vec<TrackPoint>,
}

impl TrackSegment {
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.points[0].time
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.points[self.points.len() - 1].time
    }

    /// Tightest pair of points enclosing `time`, if `time` lies within the segment.
    fn bracket(&self, time: DateTime<Utc>) -> Option<(TrackPoint, TrackPoint)> {
        if self.points.len() < 2 || time < self.start() || time > self.end() {
            return None;
        }

        // First point not before `time`; at the segment start, pair the first two points.
        let after = self.points.partition_point(|p| p.time < time).max(1);
        Some((self.points[after - 1], self.points[after]))
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    path: String,
    name: Option<String>,
    segments: Vec<TrackSegment>,
}

impl Track {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }
}

/// Result of loading one track file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub path: String,
    pub segments: usize,
    pub points: usize,
    pub skipped_points: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Closest point in time, with the absolute time difference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    pub point: TrackPoint,
    pub delta: Duration,
}

/// Position of a point inside the store, used by the time index.
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    time: DateTime<Utc>,
    track: usize,
    segment: usize,
    point: usize,
}

/// All loaded tracks, queryable by absolute (UTC) time.
///
/// Loading needs `&mut self`; queries only read, so a loaded store can be
/// shared between threads.
#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: Vec<Track>,
    summaries: HashMap<String, TrackSummary>,
    index: Vec<IndexEntry>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.summaries.contains_key(path)
    }

    /// Parse a GPX document and load it under `path`.
    ///
    /// Malformed XML fails the whole file and leaves the store untouched.
    pub fn load_gpx(&mut self, path: &str, xml: &str) -> Result<TrackSummary, GeotagError> {
        if let Some(summary) = self.summaries.get(path) {
            warn!("Track {path} is already loaded, skipping");
            return Ok(summary.clone());
        }

        let data = parse_gpx(xml)?;
        Ok(self.load(path, &data))
    }

    /// Load parsed track records under `path`.
    ///
    /// Points with an unparseable timestamp or an out-of-range position are
    /// skipped and counted; segments left without points are dropped.
    /// Loading a path twice returns the first summary and changes nothing.
    pub fn load(&mut self, path: &str, data: &GpxData) -> TrackSummary {
        if let Some(summary) = self.summaries.get(path) {
            warn!("Track {path} is already loaded, skipping");
            return summary.clone();
        }

        let mut skipped_points = data.skipped_points;
        let mut segments = Vec::new();

        for gpx_track in &data.tracks {
            for gpx_segment in &gpx_track.segments {
                let mut points: Vec<TrackPoint> = gpx_segment
                    .points
                    .iter()
                    .filter_map(|pt| {
                        let point = to_track_point(pt);
                        if point.is_none() {
                            skipped_points += 1;
                        }
                        point
                    })
                    .collect();

                if points.is_empty() {
                    debug!("{path}: dropping segment without valid points");
                    continue;
                }

                if !points.windows(2).all(|w| w[0].time <= w[1].time) {
                    debug!("{path}: reordering segment points by time");
                    points.sort_by_key(|p| p.time);
                }

                segments.push(TrackSegment { points });
            }
        }

        let name = data.tracks.iter().find_map(|t| t.name.clone());
        let track = Track {
            path: path.to_string(),
            name,
            segments,
        };
        let summary = summarize(&track, skipped_points);

        info!(
            "Loaded track {path}: {} segment(s), {} point(s), {} skipped",
            summary.segments, summary.points, summary.skipped_points
        );

        self.add_track(track);
        self.summaries.insert(path.to_string(), summary.clone());
        summary
    }

    fn add_track(&mut self, track: Track) {
        let track_index = self.tracks.len();
        for (segment_index, segment) in track.segments.iter().enumerate() {
            for (point_index, point) in segment.points.iter().enumerate() {
                self.index.push(IndexEntry {
                    time: point.time,
                    track: track_index,
                    segment: segment_index,
                    point: point_index,
                });
            }
        }
        // Stable, so equal timestamps keep load order.
        self.index.sort_by_key(|entry| entry.time);
        self.tracks.push(track);
    }

    fn point_at(&self, entry: &IndexEntry) -> TrackPoint {
        self.tracks[entry.track].segments[entry.segment].points[entry.point]
    }

    /// Closest point in time over all tracks. On a tie between a point before
    /// and a point after `time`, the earlier one wins.
    pub fn query_nearest(&self, time: DateTime<Utc>) -> Option<Nearest> {
        let split = self.index.partition_point(|entry| entry.time < time);

        // Last entry before `time`: first of its run of equal timestamps.
        let before = split.checked_sub(1).map(|i| {
            let t = self.index[i].time;
            &self.index[self.index[..i].partition_point(|entry| entry.time < t)]
        });
        let after = self.index.get(split);

        let nearest = match (before, after) {
            (Some(b), Some(a)) => {
                if time - b.time <= a.time - time {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };

        Some(Nearest {
            point: self.point_at(nearest),
            delta: (nearest.time - time).abs(),
        })
    }

    /// Tightest pair of points enclosing `time` inside a single segment.
    ///
    /// Pairs never span two segments. When several segments enclose `time`,
    /// the one with the shortest interval wins, earliest loaded on a tie.
    pub fn query_bracket(&self, time: DateTime<Utc>) -> Option<(TrackPoint, TrackPoint)> {
        self.tracks
            .iter()
            .flat_map(|track| track.segments.iter())
            .filter_map(|segment| segment.bracket(time))
            .fold(None, |best: Option<(TrackPoint, TrackPoint)>, candidate| match best {
                Some(b) if b.1.time - b.0.time <= candidate.1.time - candidate.0.time => Some(b),
                _ => Some(candidate),
            })
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, path: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.path == path)
    }

    pub fn summary(&self, path: &str) -> Option<&TrackSummary> {
        self.summaries.get(path)
    }

    /// Number of points over all tracks.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Time of the first and last point over all tracks.
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.index.first()?.time, self.index.last()?.time))
    }
}

fn summarize(track: &Track, skipped_points: usize) -> TrackSummary {
    TrackSummary {
        path: track.path.clone(),
        segments: track.segments.len(),
        points: track.segments.iter().map(|s| s.points.len()).sum(),
        skipped_points,
        start: track.segments.iter().map(TrackSegment::start).min(),
        end: track.segments.iter().map(TrackSegment::end).max(),
    }
}

fn to_track_point(pt: &GpxPoint) -> Option<TrackPoint> {
    let time = parse_track_time(pt.time.as_deref()?)?;
    let coordinates = Coordinates::new(pt.lon, pt.lat, pt.ele).ok()?;
    Some(TrackPoint { time, coordinates })
}

/// RFC 3339 timestamp; a timestamp without zone designator is taken as UTC.
pub fn parse_track_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
