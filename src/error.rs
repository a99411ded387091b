use wasm_bindgen::JsValue;

#[derive(Debug)]
pub enum GeotagError {
    XmlParse(quick_xml::Error),
    OutOfRangeCoordinate {
        lon: f64,
        lat: f64,
    },
    UnknownTimeZone(String),
    InvalidTimestamp(String),
    UnknownPhoto(String),
    CoordinatesNotSet(String),
    Options(String),
}

impl std::fmt::Display for GeotagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::XmlParse(e) => write!(f, "XML parse error: {e}"),
            Self::OutOfRangeCoordinate { lon, lat } => {
                write!(f, "Coordinate out of range: lon {lon}, lat {lat}")
            }
            Self::UnknownTimeZone(name) => write!(f, "Unknown time zone '{name}'"),
            Self::InvalidTimestamp(value) => write!(f, "Invalid timestamp '{value}'"),
            Self::UnknownPhoto(path) => write!(f, "No photo loaded for '{path}'"),
            Self::CoordinatesNotSet(path) => {
                write!(f, "Photo '{path}' has no coordinates to set an elevation on")
            }
            Self::Options(msg) => write!(f, "Invalid options: {msg}"),
        }
    }
}

impl std::error::Error for GeotagError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::XmlParse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for GeotagError {
    fn from(e: quick_xml::Error) -> Self {
        Self::XmlParse(e)
    }
}

impl From<GeotagError> for JsValue {
    fn from(e: GeotagError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
