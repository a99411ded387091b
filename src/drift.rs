use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::GeotagError;
use crate::options::DriftOptions;

type Result<T> = std::result::Result<T, GeotagError>;

/// Largest accepted camera clock deviation: 100 years, in seconds.
pub const MAX_CLOCK_DEVIATION: i64 = 100 * 366 * 24 * 60 * 60;

/// Maps camera-local photo timestamps onto the UTC axis of the track points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockDriftCompensator {
    images_time_zone: Tz,
    system_time_zone: Tz,
    clock_deviation: i64,
}

impl Default for ClockDriftCompensator {
    fn default() -> Self {
        Self {
            images_time_zone: Tz::UTC,
            system_time_zone: Tz::UTC,
            clock_deviation: 0,
        }
    }
}

impl ClockDriftCompensator {
    /// `clock_deviation` is added, in seconds, after the zone conversion.
    /// Deviations beyond [`MAX_CLOCK_DEVIATION`] either way are rejected.
    pub fn new(images_time_zone: Tz, system_time_zone: Tz, clock_deviation: i64) -> Result<Self> {
        if !(-MAX_CLOCK_DEVIATION..=MAX_CLOCK_DEVIATION).contains(&clock_deviation) {
            return Err(GeotagError::Options(format!(
                "camera clock deviation of {clock_deviation}s is out of range"
            )));
        }
        Ok(Self {
            images_time_zone,
            system_time_zone,
            clock_deviation,
        })
    }

    /// Build from configuration; the images zone falls back to the system zone.
    pub fn from_options(opts: &DriftOptions) -> Result<Self> {
        let system_time_zone = parse_time_zone(&opts.system_time_zone)?;
        let images_time_zone = match opts.images_time_zone.as_deref() {
            Some(name) => parse_time_zone(name)?,
            None => system_time_zone,
        };
        Self::new(images_time_zone, system_time_zone, opts.camera_clock_deviation)
    }

    pub fn images_time_zone(&self) -> Tz {
        self.images_time_zone
    }

    pub fn system_time_zone(&self) -> Tz {
        self.system_time_zone
    }

    pub fn clock_deviation(&self) -> i64 {
        self.clock_deviation
    }

    /// Interpret `camera_time` in the images zone, convert to UTC and add the
    /// clock deviation.
    ///
    /// Local times that occur twice (clocks turned back) or not at all (clocks
    /// turned forward) resolve to the later of the two candidate instants.
    /// Results past the representable range saturate at its ends.
    pub fn correct(&self, camera_time: NaiveDateTime) -> DateTime<Utc> {
        let utc = match self.images_time_zone.from_local_datetime(&camera_time) {
            LocalResult::Single(time) => time.with_timezone(&Utc),
            LocalResult::Ambiguous(earlier, later) => {
                earlier.with_timezone(&Utc).max(later.with_timezone(&Utc))
            }
            LocalResult::None => self.resolve_gap(camera_time),
        };
        let deviation = Duration::seconds(self.clock_deviation);
        utc.checked_add_signed(deviation)
            .unwrap_or(if deviation < Duration::zero() {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            })
    }

    /// A skipped local time, read with the offsets in force a day before and a
    /// day after it.
    fn resolve_gap(&self, camera_time: NaiveDateTime) -> DateTime<Utc> {
        let offset_at = |naive: NaiveDateTime| {
            self.images_time_zone
                .offset_from_utc_datetime(&naive)
                .fix()
                .local_minus_utc()
        };
        let day = Duration::days(1);
        let before = offset_at(camera_time.checked_sub_signed(day).unwrap_or(camera_time));
        let after = offset_at(camera_time.checked_add_signed(day).unwrap_or(camera_time));
        let smallest_offset = Duration::seconds(i64::from(before.min(after)));
        camera_time
            .checked_sub_signed(smallest_offset)
            .unwrap_or(camera_time)
            .and_utc()
    }

    /// A UTC instant as wall-clock time in the system zone.
    pub fn to_system_time(&self, time: DateTime<Utc>) -> DateTime<Tz> {
        time.with_timezone(&self.system_time_zone)
    }
}

pub fn parse_time_zone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| GeotagError::UnknownTimeZone(name.to_string()))
}

/// Parse a camera timestamp in EXIF (`2021:05:01 12:30:00`) or ISO form.
pub fn parse_camera_timestamp(value: &str) -> Result<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    let trimmed = value.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| GeotagError::InvalidTimestamp(value.to_string()))
}
