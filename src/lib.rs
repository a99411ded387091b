pub mod coordinates;
pub mod drift;
pub mod error;
pub mod export;
pub mod gpx_types;
pub mod ledger;
pub mod matcher;
pub mod options;
pub mod parser;
pub mod track_store;

use wasm_bindgen::prelude::*;

use crate::coordinates::Coordinates;
use crate::drift::{parse_camera_timestamp, ClockDriftCompensator};
use crate::error::GeotagError;
use crate::ledger::AssignmentLedger;
use crate::matcher::{MatchEngine, MatchMode};
use crate::options::GeotagOptions;
use crate::track_store::TrackStore;

/// A geotagging session: loaded tracks, photos and the matching configuration.
#[wasm_bindgen]
pub struct GeotagSession {
    store: TrackStore,
    ledger: AssignmentLedger,
    engine: MatchEngine,
    compensator: ClockDriftCompensator,
}

#[wasm_bindgen]
impl GeotagSession {
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<GeotagSession, JsValue> {
        console_error_panic_hook::set_once();

        let opts = parse_options(options)?;
        Ok(Self {
            store: TrackStore::new(),
            ledger: AssignmentLedger::new(),
            engine: MatchEngine::new(opts.matching),
            compensator: ClockDriftCompensator::from_options(&opts.drift)?,
        })
    }

    /// Load a GPX string; returns the track summary as a JS object.
    #[wasm_bindgen(js_name = loadTrack)]
    pub fn load_track(&mut self, path: &str, gpx_string: &str) -> Result<JsValue, JsValue> {
        let summary = self.store.load_gpx(path, gpx_string)?;
        to_js(&summary)
    }

    /// Add a photo by its camera timestamp and the GPS data found in the file, if any.
    #[wasm_bindgen(js_name = addPhoto)]
    pub fn add_photo(
        &mut self,
        path: &str,
        capture_time: &str,
        lon: Option<f64>,
        lat: Option<f64>,
        alt: Option<f64>,
    ) -> Result<bool, JsValue> {
        let capture_time = parse_camera_timestamp(capture_time)?;
        let coordinates = match lon.zip(lat) {
            Some((lon, lat)) => Coordinates::new(lon, lat, alt)?,
            None => Coordinates::unset(),
        };
        Ok(self.ledger.record_initial(path, capture_time, coordinates))
    }

    /// Match one photo; returns the match type name.
    ///
    /// `mode` is "combined" (the default), "exact" or "interpolated".
    #[wasm_bindgen(js_name = matchPhoto)]
    pub fn match_photo(&mut self, path: &str, mode: Option<String>) -> Result<String, JsValue> {
        let mode = parse_mode(mode.as_deref())?;
        let result = self.engine.match_photo(
            &self.store,
            &self.compensator,
            &mut self.ledger,
            path,
            mode,
        )?;
        Ok(result.match_type().as_str().to_string())
    }

    /// Match all photos not set manually; returns the per-kind counts.
    #[wasm_bindgen(js_name = matchAll)]
    pub fn match_all(&mut self, mode: Option<String>) -> Result<JsValue, JsValue> {
        let mode = parse_mode(mode.as_deref())?;
        let report = self
            .engine
            .match_all(&self.store, &self.compensator, &mut self.ledger, mode);
        to_js(&report)
    }

    #[wasm_bindgen(js_name = setManual)]
    pub fn set_manual(
        &mut self,
        path: &str,
        lon: f64,
        lat: f64,
        alt: Option<f64>,
    ) -> Result<(), JsValue> {
        let coordinates = Coordinates::new(lon, lat, alt)?;
        Ok(self.ledger.set_manual(path, coordinates)?)
    }

    #[wasm_bindgen(js_name = setElevation)]
    pub fn set_elevation(&mut self, path: &str, altitude: f64) -> Result<(), JsValue> {
        Ok(self.ledger.set_elevation(path, altitude)?)
    }

    #[wasm_bindgen(js_name = removeCoordinates)]
    pub fn remove_coordinates(&mut self, path: &str) -> Result<(), JsValue> {
        Ok(self.ledger.remove_coordinates(path)?)
    }

    #[wasm_bindgen(js_name = discardChanges)]
    pub fn discard_changes(&mut self, path: &str) -> Result<(), JsValue> {
        Ok(self.ledger.discard_changes(path)?)
    }

    #[wasm_bindgen(js_name = isChanged)]
    pub fn is_changed(&self, path: &str) -> Result<bool, JsValue> {
        Ok(self.ledger.is_changed(path)?)
    }

    /// Photo state as a JS object: coordinates, original coordinates and match type.
    #[wasm_bindgen(js_name = photo)]
    pub fn photo(&self, path: &str) -> Result<JsValue, JsValue> {
        let record = self
            .ledger
            .get(path)
            .ok_or_else(|| GeotagError::UnknownPhoto(path.to_string()))?;
        let value = serde_json::json!({
            "path": record.path(),
            "coordinates": record.coordinates(),
            "originalCoordinates": record.original_coordinates(),
            "matchType": record.match_type(),
            "changed": record.is_changed(),
        });
        to_js(&value)
    }

    #[wasm_bindgen(js_name = changedPhotos)]
    pub fn changed_photos(&self) -> js_sys::Array {
        self.ledger
            .changed_photos()
            .into_iter()
            .map(JsValue::from_str)
            .collect()
    }

    /// Loaded tracks as a GeoJSON string.
    #[wasm_bindgen(js_name = tracksGeoJson)]
    pub fn tracks_geojson(&self) -> Result<String, JsValue> {
        let fc = export::tracks_to_feature_collection(&self.store);
        serde_json::to_string(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Photos with coordinates as a GeoJSON string.
    #[wasm_bindgen(js_name = photosGeoJson)]
    pub fn photos_geojson(&self) -> Result<String, JsValue> {
        let fc = export::photos_to_feature_collection(&self.ledger);
        serde_json::to_string(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

fn parse_options(options: JsValue) -> Result<GeotagOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(GeotagOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options)
            .map_err(|e| GeotagError::Options(e.to_string()).into())
    }
}

fn parse_mode(mode: Option<&str>) -> Result<MatchMode, GeotagError> {
    mode.map_or(Ok(MatchMode::default()), str::parse)
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
