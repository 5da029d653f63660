//! Encoded polyline format (precision 5), as returned by directions providers.

use geo::Coord;
use realtime::{Result, invalid_request, malformed_polyline};

use crate::{Coordinate, Route};

const PRECISION: u32 = 5;
const ASCII_OFFSET: u8 = 63;
const CONTINUATION: u8 = 0x20;

// A full-range longitude delta (360 degrees at 1e5) fits in six 5-bit chunks.
const MAX_VALUE_CHUNKS: usize = 6;

/// Decode an encoded polyline into a route.
///
/// # Errors
///
/// Returns `MalformedPolyline` when the input contains characters outside the
/// polyline alphabet, ends mid-value or mid-pair, holds a value wider than
/// any coordinate delta, or decodes to fewer than two in-range points.
pub fn decode_polyline(encoded: &str) -> Result<Route> {
    check_framing(encoded)?;

    let line = polyline::decode_polyline(encoded, PRECISION)
        .map_err(|e| malformed_polyline!("decoding polyline: {e}"))?;

    Route::new(line.into_iter().map(Coordinate::from).collect())
}

/// Encode a sequence of coordinates as a polyline string.
///
/// # Errors
///
/// Returns `InvalidRequest` when any coordinate is out of range.
pub fn encode_polyline(points: &[Coordinate]) -> Result<String> {
    polyline::encode_coordinates(points.iter().map(|p| Coord::from(*p)), PRECISION)
        .map_err(|e| invalid_request!("encoding polyline: {e}"))
}

// Walks the value boundaries so the decoder only ever sees complete,
// bounded-width lat/lon pairs.
fn check_framing(encoded: &str) -> Result<()> {
    let mut values = 0_usize;
    let mut chunks = 0_usize;

    for (offset, byte) in encoded.bytes().enumerate() {
        if !(ASCII_OFFSET..=126).contains(&byte) {
            return Err(malformed_polyline!(
                "invalid character {:?} at offset {offset}",
                byte as char
            ));
        }

        chunks += 1;
        if chunks > MAX_VALUE_CHUNKS {
            return Err(malformed_polyline!("value at offset {offset} overflows"));
        }
        if byte - ASCII_OFFSET < CONTINUATION {
            values += 1;
            chunks = 0;
        }
    }

    if chunks > 0 {
        return Err(malformed_polyline!("truncated value at offset {}", encoded.len()));
    }
    if !values.is_multiple_of(2) {
        return Err(malformed_polyline!("latitude at offset {} has no longitude", encoded.len()));
    }
    Ok(())
}
