#![cfg(target_arch = "wasm32")]

use geotag_match::GeotagSession;
use serde::Serialize;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

const GPX: &str = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="0.0" lon="0.0"><time>2021-06-01T00:00:00Z</time></trkpt>
      <trkpt lat="1.0" lon="0.0"><time>2021-06-01T00:01:40Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

#[wasm_bindgen_test]
fn session_matches_and_discards() {
    let mut session = GeotagSession::new(JsValue::UNDEFINED).unwrap();
    session.load_track("walk.gpx", GPX).unwrap();

    assert!(session
        .add_photo("a.jpg", "2021:06:01 00:00:50", None, None, None)
        .unwrap());
    assert_eq!(session.match_photo("a.jpg", None).unwrap(), "interpolatedMatch");
    assert!(session.is_changed("a.jpg").unwrap());
    assert_eq!(session.changed_photos().length(), 1);

    session.discard_changes("a.jpg").unwrap();
    assert!(!session.is_changed("a.jpg").unwrap());

    assert_eq!(
        session.match_photo("a.jpg", Some("exact".to_string())).unwrap(),
        "notMatched"
    );
    session.match_photo("a.jpg", Some("interpolated".to_string())).unwrap();
    session.remove_coordinates("a.jpg").unwrap();
    assert!(!session.is_changed("a.jpg").unwrap());
}

#[wasm_bindgen_test]
fn session_rejects_bad_input() {
    let mut session = GeotagSession::new(JsValue::NULL).unwrap();
    assert!(session.load_track("bad.gpx", "<gpx><trk></gpx>").is_err());
    assert!(session.match_photo("missing.jpg", None).is_err());
    assert!(session.match_all(Some("closest".to_string())).is_err());
    let drift = serde_json::json!({"drift": {"cameraClockDeviation": 10_000_000_000_000_i64}});
    let options = drift.serialize(&serde_wasm_bindgen::Serializer::json_compatible()).unwrap();
    assert!(GeotagSession::new(options).is_err());
    assert!(session
        .add_photo("b.jpg", "2021:06:01 00:00:50", Some(200.0), Some(0.0), None)
        .is_err());
}
