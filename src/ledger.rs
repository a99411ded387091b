use std::collections::HashMap;

use chrono::NaiveDateTime;
use log::warn;

use crate::coordinates::Coordinates;
use crate::error::GeotagError;
use crate::matcher::{MatchResult, MatchType};

type Result<T> = std::result::Result<T, GeotagError>;

/// Coordinate state of one photo.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    path: String,
    capture_time: NaiveDateTime,
    coordinates: Coordinates,
    original_coordinates: Coordinates,
    match_type: MatchType,
}

impl PhotoRecord {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Camera-local time, as read from the file.
    pub fn capture_time(&self) -> NaiveDateTime {
        self.capture_time
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    /// Coordinates read from the file when the photo was added.
    pub fn original_coordinates(&self) -> Coordinates {
        self.original_coordinates
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn is_changed(&self) -> bool {
        self.coordinates != self.original_coordinates
    }
}

/// Per-photo coordinates and their provenance, ordered by capture time.
#[derive(Debug, Default)]
pub struct AssignmentLedger {
    paths: Vec<String>,
    records: HashMap<String, PhotoRecord>,
}

impl AssignmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a photo with the coordinates found in its metadata (or unset).
    ///
    /// Returns false, changing nothing, if the path is already recorded.
    pub fn record_initial(
        &mut self,
        path: &str,
        capture_time: NaiveDateTime,
        coordinates: Coordinates,
    ) -> bool {
        if self.records.contains_key(path) {
            return false;
        }

        // After all photos taken at the same time or earlier.
        let row = self
            .paths
            .partition_point(|p| self.records[p].capture_time <= capture_time);
        self.paths.insert(row, path.to_string());
        self.records.insert(
            path.to_string(),
            PhotoRecord {
                path: path.to_string(),
                capture_time,
                coordinates,
                original_coordinates: coordinates,
                match_type: MatchType::NotMatched,
            },
        );
        true
    }

    /// Store a match result. A `NotMatched` result leaves the photo as it is.
    ///
    /// Returns whether anything was written.
    pub fn apply_match(&mut self, path: &str, result: MatchResult) -> Result<bool> {
        let record = self.record_mut(path)?;
        let Some(coordinates) = result.coordinates() else {
            return Ok(false);
        };
        record.coordinates = coordinates;
        record.match_type = result.match_type();
        Ok(true)
    }

    pub fn set_manual(&mut self, path: &str, coordinates: Coordinates) -> Result<()> {
        let record = self.record_mut(path)?;
        record.coordinates = coordinates;
        record.match_type = MatchType::ManuallySet;
        Ok(())
    }

    /// Replace only the altitude of the current coordinates.
    pub fn set_elevation(&mut self, path: &str, altitude: f64) -> Result<()> {
        let record = self.record_mut(path)?;
        if !record.coordinates.is_set() {
            warn!("Not setting elevation of {path}: no coordinates assigned");
            return Err(GeotagError::CoordinatesNotSet(path.to_string()));
        }
        record.coordinates = record.coordinates.with_altitude(altitude);
        Ok(())
    }

    /// Clear the current coordinates. The photo counts as changed if its file
    /// had GPS data.
    pub fn remove_coordinates(&mut self, path: &str) -> Result<()> {
        let record = self.record_mut(path)?;
        record.coordinates = Coordinates::unset();
        record.match_type = MatchType::NotMatched;
        Ok(())
    }

    pub fn discard_changes(&mut self, path: &str) -> Result<()> {
        let record = self.record_mut(path)?;
        record.coordinates = record.original_coordinates;
        record.match_type = MatchType::NotMatched;
        Ok(())
    }

    pub fn is_changed(&self, path: &str) -> Result<bool> {
        self.get(path)
            .map(PhotoRecord::is_changed)
            .ok_or_else(|| GeotagError::UnknownPhoto(path.to_string()))
    }

    pub fn get(&self, path: &str) -> Option<&PhotoRecord> {
        self.records.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.records.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<PhotoRecord> {
        let record = self.records.remove(path)?;
        self.paths.retain(|p| p != path);
        Some(record)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// All photos, oldest capture time first.
    pub fn photos(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.paths.iter().map(|p| &self.records[p])
    }

    /// Paths of photos whose coordinates differ from the ones in the file.
    pub fn changed_photos(&self) -> Vec<&str> {
        self.photos()
            .filter(|r| r.is_changed())
            .map(PhotoRecord::path)
            .collect()
    }

    /// Photos that currently have coordinates.
    pub fn assigned(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.photos().filter(|r| r.coordinates.is_set())
    }

    pub fn unassigned(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.photos().filter(|r| !r.coordinates.is_set())
    }

    fn record_mut(&mut self, path: &str) -> Result<&mut PhotoRecord> {
        self.records
            .get_mut(path)
            .ok_or_else(|| GeotagError::UnknownPhoto(path.to_string()))
    }
}
