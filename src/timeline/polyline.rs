//! Decoder for the encoded polyline format used by map routing APIs
//! (precision 5, zig-zag encoded deltas in 5-bit chunks offset by 63).

use thiserror::Error;

use crate::poi::Coordinates;

const PRECISION: f64 = 1e5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolylineError {
    #[error("invalid polyline byte {byte:#04x} at offset {offset}")]
    InvalidByte { byte: u8, offset: usize },
    #[error("polyline ends in the middle of a value")]
    Truncated,
    #[error("polyline value overflows at offset {0}")]
    Overflow(usize),
    #[error("decoded coordinate out of range at point {0}")]
    OutOfRange(usize),
}

pub fn decode(encoded: &str) -> Result<Vec<Coordinates>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut offset = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    while offset < bytes.len() {
        lat += next_value(bytes, &mut offset)?;
        if offset >= bytes.len() {
            return Err(PolylineError::Truncated);
        }
        lng += next_value(bytes, &mut offset)?;
        let point = Coordinates::new(lat as f64 / PRECISION, lng as f64 / PRECISION);
        if !point.is_valid() {
            return Err(PolylineError::OutOfRange(points.len()));
        }
        points.push(point);
    }
    Ok(points)
}

/// Lenient decode for rendering: bad paths are logged and drawn as nothing.
pub fn decode_or_warn(encoded: &str, context: &str) -> Option<Vec<Coordinates>> {
    match decode(encoded) {
        Ok(points) if points.len() >= 2 => Some(points),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(context, %err, "skipping invalid route polyline");
            None
        }
    }
}

fn next_value(bytes: &[u8], offset: &mut usize) -> Result<i64, PolylineError> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let Some(&byte) = bytes.get(*offset) else {
            return Err(PolylineError::Truncated);
        };
        if !(63..=126).contains(&byte) {
            return Err(PolylineError::InvalidByte {
                byte,
                offset: *offset,
            });
        }
        if shift > 30 {
            return Err(PolylineError::Overflow(*offset));
        }
        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        *offset += 1;
        if chunk < 0x20 {
            break;
        }
    }
    Ok(if result & 1 == 1 { !(result >> 1) } else { result >> 1 })
}
