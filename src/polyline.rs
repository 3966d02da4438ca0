//! Encoded-polyline codec for route geometries.
//!
//! Routing services return each leg's geometry as a compact ASCII string:
//! coordinates are delta-encoded as zig-zag signed integers, packed five bits
//! per character with a continuation bit, at a fixed precision of 1e-6
//! degrees per unit (the six-digit variant Valhalla uses, not the classic
//! five-digit one). Decoding happens at the API boundary; everything
//! downstream works on plain coordinate sequences.

use crate::geometry::Coordinate;

/// Degrees per encoded integer unit.
pub const PRECISION: f64 = 1e-6;

// Encoded characters are offset by 63, so the valid alphabet is '?'..='~'.
const CHAR_OFFSET: u8 = 63;
const CHAR_MAX: u8 = 126;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolylineError {
    /// A byte outside the encoding alphabet appeared in the input.
    #[error("invalid polyline character {byte:#04x} at offset {offset}")]
    InvalidCharacter { byte: u8, offset: usize },
    /// The input ended in the middle of a varint group.
    #[error("polyline truncated inside the varint starting at offset {offset}")]
    Truncated { offset: usize },
    /// A varint carried more continuation groups than any coordinate delta
    /// can need.
    #[error("polyline varint starting at offset {offset} is too long")]
    Overflow { offset: usize },
}

/// Decodes an encoded polyline into (longitude, latitude) pairs.
///
/// Pure and stateless; the empty string decodes to an empty sequence.
/// Truncated or out-of-alphabet input is rejected rather than decoded
/// best-effort into garbage deltas.
pub fn decode(shape: &str) -> Result<Vec<Coordinate>, PolylineError> {
    let bytes = shape.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;
    let mut coordinates = Vec::new();

    while index < bytes.len() {
        lat += next_delta(bytes, &mut index)?;
        lon += next_delta(bytes, &mut index)?;
        coordinates.push((lon as f64 * PRECISION, lat as f64 * PRECISION));
    }

    Ok(coordinates)
}

/// Reads one zig-zag varint delta, advancing `index` past it.
fn next_delta(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let start = *index;
    let mut result: i64 = 1;
    let mut shift = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(PolylineError::Truncated { offset: start });
        };
        if !(CHAR_OFFSET..=CHAR_MAX).contains(&byte) {
            return Err(PolylineError::InvalidCharacter {
                byte,
                offset: *index,
            });
        }
        *index += 1;

        // A full-circle delta at 1e-6 precision zig-zags into about 30
        // bits, six groups; past twelve the accumulator would leave i64
        // range, so the run can only be adversarial.
        if shift > 57 {
            return Err(PolylineError::Overflow { offset: start });
        }

        let group = byte as i64 - CHAR_OFFSET as i64 - 1;
        result += group << shift;
        shift += 5;
        if group < 0x1f {
            break;
        }
    }

    // Undo the zig-zag: odd accumulators carry a negative delta.
    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

/// Encodes (longitude, latitude) pairs into the polyline format `decode`
/// reads. Coordinates are rounded to the nearest 1e-6 degree.
pub fn encode(coordinates: &[Coordinate]) -> String {
    let mut out = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lon: i64 = 0;

    for &(lon, lat) in coordinates {
        let lat_units = (lat / PRECISION).round() as i64;
        let lon_units = (lon / PRECISION).round() as i64;
        encode_delta(lat_units - prev_lat, &mut out);
        encode_delta(lon_units - prev_lon, &mut out);
        prev_lat = lat_units;
        prev_lon = lon_units;
    }

    out
}

fn encode_delta(value: i64, out: &mut String) {
    let mut zigzag = if value < 0 {
        !(value << 1)
    } else {
        value << 1
    };
    while zigzag >= 0x20 {
        out.push((CHAR_OFFSET + (0x20 | (zigzag & 0x1f)) as u8) as char);
        zigzag >>= 5;
    }
    out.push((CHAR_OFFSET + zigzag as u8) as char);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[Coordinate], expected: &[Coordinate]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!(
                (a.0 - e.0).abs() < 1e-9 && (a.1 - e.1).abs() < 1e-9,
                "expected {e:?}, got {a:?}"
            );
        }
    }

    #[test]
    fn test_empty_input_decodes_to_empty_sequence() {
        assert_eq!(decode("").unwrap(), vec![]);
    }

    #[test]
    fn test_decode_classic_vector_at_sixth_digit_precision() {
        // The well-known three-point vector, re-based to 1e-6 degrees per
        // unit (one tenth of its usual five-digit reading).
        let coords = decode("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        assert_close(
            &coords,
            &[(-12.02, 3.85), (-12.095, 4.07), (-12.6453, 4.3252)],
        );
    }

    #[test]
    fn test_round_trip_through_local_encoder() {
        let coords = vec![
            (13.377704, 52.516275),
            (13.377806, 52.516832),
            (13.379899, 52.517033),
            (-0.127647, 51.503041),
        ];
        let encoded = encode(&coords);
        assert_close(&decode(&encoded).unwrap(), &coords);
    }

    #[test]
    fn test_round_trip_single_point() {
        let coords = vec![(-126.453001, 43.252004)];
        assert_close(&decode(&encode(&coords)).unwrap(), &coords);
    }

    #[test]
    fn test_decode_is_restartable() {
        let encoded = encode(&[(1.0, 2.0), (1.5, 2.5)]);
        let first = decode(&encoded).unwrap();
        let second = decode(&encoded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let mut encoded = encode(&[(-120.2, 38.5)]);
        encoded.pop();
        assert!(matches!(
            decode(&encoded),
            Err(PolylineError::Truncated { .. })
        ));
    }

    #[test]
    fn test_missing_longitude_varint_is_rejected() {
        // A single complete varint leaves the longitude of the first point
        // missing entirely.
        assert!(matches!(
            decode("_p~iF"),
            Err(PolylineError::Truncated { .. })
        ));
    }

    #[test]
    fn test_out_of_alphabet_byte_is_rejected() {
        assert_eq!(
            decode("_p~iF~ps|U !"),
            Err(PolylineError::InvalidCharacter {
                byte: b' ',
                offset: 10
            })
        );
    }

    #[test]
    fn test_overlong_continuation_run_is_rejected() {
        // Every byte is inside the alphabet, so only the group count gives
        // this away as malformed.
        let hostile = format!("{}?", "~".repeat(20));
        assert_eq!(
            decode(&hostile),
            Err(PolylineError::Overflow { offset: 0 })
        );
    }

    #[test]
    fn test_widest_real_deltas_still_decode() {
        // Antipodal jumps are the largest deltas well-formed input can
        // carry; they stay far below the varint length cap.
        let coords = vec![(-179.999999, -89.999999), (179.999999, 89.999999)];
        assert_close(&decode(&encode(&coords)).unwrap(), &coords);
    }

    #[test]
    fn test_encode_rounds_to_sixth_digit() {
        let coords = decode(&encode(&[(1.00000049, 2.0)])).unwrap();
        assert_close(&coords, &[(1.0, 2.0)]);
    }
}
