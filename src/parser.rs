use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::GeotagError;
use crate::gpx_types::*;

type Result<T> = std::result::Result<T, GeotagError>;

/// Parse the tracks of a GPX XML string into GpxData.
///
/// Waypoints, routes and extensions are not needed for time matching and are
/// skipped. A point without usable lat/lon is dropped and counted in
/// `skipped_points`; only malformed markup fails the whole document.
pub fn parse_gpx(xml: &str) -> Result<GpxData> {
    let mut reader = Reader::from_str(xml);
    let mut data = GpxData::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trk" => {
                    let track = parse_track(&mut reader, &mut data.skipped_points)?;
                    data.tracks.push(track);
                }
                b"wpt" | b"rte" | b"metadata" | b"extensions" => {
                    reader.read_to_end(e.name())?;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(GeotagError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(data)
}

/// Parse lat/lon attributes from a point element's start tag.
/// Returns None if either one is missing or not a number.
fn parse_lat_lon(e: &BytesStart<'_>) -> Result<Option<(f64, f64)>> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| GeotagError::XmlParse(e.into()))?;
        let val = std::str::from_utf8(&attr.value).unwrap_or_default().trim();
        match attr.key.local_name().as_ref() {
            b"lat" => lat = val.parse::<f64>().ok(),
            b"lon" => lon = val.parse::<f64>().ok(),
            _ => {}
        }
    }

    Ok(lat.zip(lon))
}

/// Parse a <trkpt> element and its children.
/// Called after receiving Event::Start for the point element.
fn parse_point<'a>(
    start: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
) -> Result<Option<GpxPoint>> {
    let Some((lat, lon)) = parse_lat_lon(start)? else {
        reader.read_to_end(start.name())?;
        return Ok(None);
    };

    let mut point = GpxPoint::new(lat, lon);
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" => {
                    let text = read_text_owned(reader, &e)?;
                    point.ele = text.trim().parse::<f64>().ok();
                }
                b"time" => {
                    point.time = Some(read_text_owned(reader, &e)?);
                }
                _ => {
                    // name, desc, extensions, GPX 1.0 speed/course, ...
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(GeotagError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(Some(point))
}

/// Parse a <trk> element.
fn parse_track<'a>(reader: &mut Reader<&'a [u8]>, skipped: &mut usize) -> Result<GpxTrack> {
    let mut track = GpxTrack::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"name" => track.name = Some(read_text_owned(reader, &e)?),
                b"trkseg" => {
                    let seg = parse_segment(reader, skipped)?;
                    if seg.points.is_empty() {
                        debug!("Dropping empty track segment");
                    } else {
                        track.segments.push(seg);
                    }
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trk" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(GeotagError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(track)
}

/// Parse a <trkseg> element.
fn parse_segment<'a>(reader: &mut Reader<&'a [u8]>, skipped: &mut usize) -> Result<GpxSegment> {
    let mut segment = GpxSegment::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkpt" => match parse_point(&e, reader)? {
                    Some(pt) => segment.points.push(pt),
                    None => *skipped += 1,
                },
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    match parse_lat_lon(&e)? {
                        Some((lat, lon)) => segment.points.push(GpxPoint::new(lat, lon)),
                        None => *skipped += 1,
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkseg" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(GeotagError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(segment)
}

/// Read text content of an element as an owned String.
/// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::CData(e)) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::GeneralRef(e)) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else {
                    match std::str::from_utf8(e.as_ref()).unwrap_or_default() {
                        "amp" => text.push('&'),
                        "lt" => text.push('<'),
                        "gt" => text.push('>'),
                        "quot" => text.push('"'),
                        "apos" => text.push('\''),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(GeotagError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(text)
}
