use serde::Serialize;

use crate::error::GeotagError;

/// Mean Earth radius for the spherical distance model, in meters.
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// A WGS84 position in decimal degrees, with optional altitude in meters.
///
/// An unset value carries no position at all; two unset values are always
/// equal, whatever was passed in before they were cleared.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    lon: f64,
    lat: f64,
    alt: Option<f64>,
    is_set: bool,
}

impl Coordinates {
    /// Build a set coordinate, rejecting positions outside lon [-180, 180] / lat [-90, 90].
    pub fn new(lon: f64, lat: f64, alt: Option<f64>) -> Result<Self, GeotagError> {
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(GeotagError::OutOfRangeCoordinate { lon, lat });
        }

        Ok(Self {
            lon,
            lat,
            alt: alt.filter(|a| a.is_finite()),
            is_set: true,
        })
    }

    pub fn unset() -> Self {
        Self::default()
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn alt(&self) -> Option<f64> {
        self.alt
    }

    pub fn is_set(&self) -> bool {
        self.is_set
    }

    /// Copy of this coordinate with the altitude replaced. Unset stays unset.
    pub fn with_altitude(&self, alt: f64) -> Self {
        if !self.is_set {
            return *self;
        }
        Self {
            alt: Some(alt).filter(|a| a.is_finite()),
            ..*self
        }
    }

    /// Great-circle distance in meters (haversine, spherical Earth).
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Linear blend of lon/lat at `fraction` (0 = self, 1 = other).
    ///
    /// This is a planar approximation, only sensible for points close to
    /// each other. Altitude is blended only when both ends carry one.
    pub fn interpolate(&self, other: &Coordinates, fraction: f64) -> Coordinates {
        if fraction <= 0.0 {
            return *self;
        }
        if fraction >= 1.0 {
            return *other;
        }

        let blend = |a: f64, b: f64| a + (b - a) * fraction;
        let alt = match (self.alt, other.alt) {
            (Some(a), Some(b)) => Some(blend(a, b)),
            _ => None,
        };

        Coordinates {
            lon: blend(self.lon, other.lon),
            lat: blend(self.lat, other.lat),
            alt,
            is_set: true,
        }
    }
}

impl PartialEq for Coordinates {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_set, other.is_set) {
            (false, false) => true,
            (true, true) => self.lon == other.lon && self.lat == other.lat && self.alt == other.alt,
            _ => false,
        }
    }
}
