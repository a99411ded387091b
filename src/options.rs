use serde::{Deserialize, Deserializer};

/// Full engine configuration, as persisted by the host application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeotagOptions {
    #[serde(default)]
    pub matching: MatchOptions,

    #[serde(default)]
    pub drift: DriftOptions,
}

/// Tolerances for assigning track coordinates to photos.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOptions {
    /// Largest time difference in seconds for an exact match (default: 10)
    #[serde(default = "default_exact_match_tolerance")]
    pub exact_match_tolerance: u32,

    /// Longest interval in seconds between two points to interpolate across
    /// (default: unlimited; -1 in stored settings)
    #[serde(default, deserialize_with = "deserialize_limit")]
    pub maximum_interpolation_interval: Option<u32>,

    /// Longest distance in meters between two points to interpolate across
    /// (default: unlimited; -1 in stored settings)
    #[serde(default, deserialize_with = "deserialize_limit")]
    pub maximum_interpolation_distance: Option<u32>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            exact_match_tolerance: default_exact_match_tolerance(),
            maximum_interpolation_interval: None,
            maximum_interpolation_distance: None,
        }
    }
}

/// How the camera clock relates to UTC.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftOptions {
    /// IANA zone the camera clock was set to (default: the system zone)
    #[serde(default)]
    pub images_time_zone: Option<String>,

    /// IANA reference zone (default: UTC)
    #[serde(default = "default_time_zone")]
    pub system_time_zone: String,

    /// Seconds to add to every corrected photo time (default: 0)
    #[serde(default)]
    pub camera_clock_deviation: i64,
}

impl Default for DriftOptions {
    fn default() -> Self {
        Self {
            images_time_zone: None,
            system_time_zone: default_time_zone(),
            camera_clock_deviation: 0,
        }
    }
}

fn default_exact_match_tolerance() -> u32 {
    10
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

/// Negative values and null both mean "no limit".
fn deserialize_limit<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(v) if v < 0 => Ok(None),
        Some(v) => u32::try_from(v)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("limit {v} is too large"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let opts: GeotagOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.matching, MatchOptions::default());
        assert_eq!(opts.matching.exact_match_tolerance, 10);
        assert_eq!(opts.matching.maximum_interpolation_interval, None);
        assert_eq!(opts.drift.system_time_zone, "UTC");
        assert_eq!(opts.drift.camera_clock_deviation, 0);
    }

    #[test]
    fn test_unlimited_sentinel() {
        let opts: MatchOptions = serde_json::from_str(
            r#"{"exactMatchTolerance": 5, "maximumInterpolationInterval": -1, "maximumInterpolationDistance": 250}"#,
        )
        .unwrap();
        assert_eq!(opts.exact_match_tolerance, 5);
        assert_eq!(opts.maximum_interpolation_interval, None);
        assert_eq!(opts.maximum_interpolation_distance, Some(250));

        let opts: MatchOptions =
            serde_json::from_str(r#"{"maximumInterpolationInterval": null}"#).unwrap();
        assert_eq!(opts.maximum_interpolation_interval, None);
    }

    #[test]
    fn test_drift_options() {
        let opts: DriftOptions = serde_json::from_str(
            r#"{"imagesTimeZone": "Europe/Berlin", "systemTimeZone": "Europe/London", "cameraClockDeviation": -42}"#,
        )
        .unwrap();
        assert_eq!(opts.images_time_zone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(opts.system_time_zone, "Europe/London");
        assert_eq!(opts.camera_clock_deviation, -42);
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        assert!(serde_json::from_str::<MatchOptions>(r#"{"exactMatchTolerance": -3}"#).is_err());
    }
}
