//! Google encoded polyline format.
//!
//! Each coordinate is stored as the zigzag-encoded delta from the previous
//! one, at 1e-5 degree precision, split into 5-bit chunks offset by 63 so the
//! result is printable ASCII. A chunk with bit 0x20 set continues the value.

use crate::model::Coordinate;
use thiserror::Error;

const PRECISION: f64 = 1e5;
const CHAR_OFFSET: u8 = 63;
const CONTINUATION: i64 = 0x20;
const CHUNK_MASK: i64 = 0x1f;
// Seven 5-bit chunks carry a 32-bit value; an eighth means garbage.
const MAX_SHIFT: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("polyline ends in the middle of a value at byte {position}")]
    Truncated { position: usize },
    #[error("invalid polyline byte {byte:#04x} at position {position}")]
    InvalidCharacter { position: usize, byte: u8 },
    #[error("polyline value starting at byte {position} does not fit in 32 bits")]
    Overflow { position: usize },
}

/// Decodes an encoded polyline into its coordinates. An empty string decodes
/// to an empty sequence.
pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, DecodeError> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        lat += read_delta(bytes, &mut index)?;
        lng += read_delta(bytes, &mut index)?;
        points.push(Coordinate::new(
            lat as f64 / PRECISION,
            lng as f64 / PRECISION,
        ));
    }

    Ok(points)
}

/// `None` behaves like the empty string.
pub fn decode_optional(encoded: Option<&str>) -> Result<Vec<Coordinate>, DecodeError> {
    encoded.map_or_else(|| Ok(Vec::new()), decode)
}

fn read_delta(bytes: &[u8], index: &mut usize) -> Result<i64, DecodeError> {
    let start = *index;
    let mut result: i64 = 0;
    let mut shift: u32 = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(DecodeError::Truncated { position: *index });
        };
        if !(CHAR_OFFSET..=126).contains(&byte) {
            return Err(DecodeError::InvalidCharacter {
                position: *index,
                byte,
            });
        }
        if shift > MAX_SHIFT {
            return Err(DecodeError::Overflow { position: start });
        }

        let chunk = i64::from(byte - CHAR_OFFSET);
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;
        *index += 1;

        if chunk < CONTINUATION {
            break;
        }
    }

    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

/// Encodes coordinates, rounding each to 1e-5 degrees. Points outside the
/// valid latitude/longitude range (or not finite) are skipped.
pub fn encode(points: &[Coordinate]) -> String {
    let mut encoded = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for point in points.iter().filter(|point| point.is_valid()) {
        let lat = (point.lat * PRECISION).round() as i64;
        let lng = (point.lng * PRECISION).round() as i64;
        write_delta(lat - prev_lat, &mut encoded);
        write_delta(lng - prev_lng, &mut encoded);
        prev_lat = lat;
        prev_lng = lng;
    }

    encoded
}

fn write_delta(delta: i64, out: &mut String) {
    let mut value = if delta < 0 { !(delta << 1) } else { delta << 1 };
    while value >= CONTINUATION {
        out.push(char::from(((value & CHUNK_MASK) | CONTINUATION) as u8 + CHAR_OFFSET));
        value >>= 5;
    }
    out.push(char::from(value as u8 + CHAR_OFFSET));
}
