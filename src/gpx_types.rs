/// Track records read from a GPX document, before validation.
#[derive(Debug, Default)]
pub struct GpxData {
    pub tracks: Vec<GpxTrack>,
    /// Points dropped by the reader because lat/lon were missing or not numeric.
    pub skipped_points: usize,
}

/// A single track point (<trkpt>).
#[derive(Debug, Clone)]
pub struct GpxPoint {
    pub lat: f64,
    pub lon: f64,
    pub ele: Option<f64>,
    pub time: Option<String>,
}

impl GpxPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ele: None,
            time: None,
        }
    }

    pub fn with_time(mut self, time: &str) -> Self {
        self.time = Some(time.to_string());
        self
    }

    pub fn with_ele(mut self, ele: f64) -> Self {
        self.ele = Some(ele);
        self
    }
}

/// A GPX track (<trk>).
#[derive(Debug, Default)]
pub struct GpxTrack {
    pub name: Option<String>,
    pub segments: Vec<GpxSegment>,
}

/// A GPX track segment (<trkseg>).
#[derive(Debug, Default)]
pub struct GpxSegment {
    pub points: Vec<GpxPoint>,
}

impl GpxSegment {
    pub fn new(points: Vec<GpxPoint>) -> Self {
        Self { points }
    }
}
