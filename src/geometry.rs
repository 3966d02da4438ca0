//! Coordinate and bounding-box primitives.
//!
//! Coordinates are (longitude, latitude) degree pairs, matching the GeoJSON
//! convention used by every external-facing structure in this crate. The one
//! latitude-first shape is the Valhalla request payload, which builds its own
//! `{lat, lon}` objects at the boundary.

use serde::{Deserialize, Serialize};

/// A geographic coordinate as a (longitude, latitude) pair in degrees.
pub type Coordinate = (f64, f64);

/// The minimal axis-aligned rectangle enclosing a set of coordinates.
///
/// Serializes as `[[min_lon, min_lat], [max_lon, max_lat]]`, the shape map
/// widgets expect for fit-to-bounds calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "(Coordinate, Coordinate)",
    into = "(Coordinate, Coordinate)"
)]
pub struct BoundingBox {
    pub southwest: Coordinate,
    pub northeast: Coordinate,
}

impl From<(Coordinate, Coordinate)> for BoundingBox {
    fn from((southwest, northeast): (Coordinate, Coordinate)) -> Self {
        Self {
            southwest,
            northeast,
        }
    }
}

impl From<BoundingBox> for (Coordinate, Coordinate) {
    fn from(bbox: BoundingBox) -> Self {
        (bbox.southwest, bbox.northeast)
    }
}

impl BoundingBox {
    /// Whether a coordinate falls within the box, bounds inclusive.
    pub fn contains(&self, (lon, lat): Coordinate) -> bool {
        lon >= self.southwest.0
            && lon <= self.northeast.0
            && lat >= self.southwest.1
            && lat <= self.northeast.1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// The minimum of an empty set is undefined; callers must pass at least
    /// one coordinate. An empty box would corrupt downstream viewport fits,
    /// so this propagates as an error rather than a silent default.
    #[error("cannot compute a bounding box over zero coordinates")]
    EmptyInput,
}

/// Computes the bounding box of a non-empty coordinate sequence.
///
/// Single O(n) pass; no sorting.
pub fn bounding_box(coords: &[Coordinate]) -> Result<BoundingBox, GeometryError> {
    let (&first, rest) = coords.split_first().ok_or(GeometryError::EmptyInput)?;

    let mut southwest = first;
    let mut northeast = first;
    for &(lon, lat) in rest {
        southwest.0 = southwest.0.min(lon);
        southwest.1 = southwest.1.min(lat);
        northeast.0 = northeast.0.max(lon);
        northeast.1 = northeast.1.max(lat);
    }

    Ok(BoundingBox {
        southwest,
        northeast,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_an_error() {
        assert_eq!(bounding_box(&[]), Err(GeometryError::EmptyInput));
    }

    #[test]
    fn test_single_point_yields_zero_area_box() {
        let bbox = bounding_box(&[(13.4, 52.5)]).unwrap();
        assert_eq!(bbox.southwest, (13.4, 52.5));
        assert_eq!(bbox.northeast, (13.4, 52.5));
    }

    #[test]
    fn test_min_max_over_mixed_signs() {
        let coords = [(-120.2, 38.5), (-120.95, 40.7), (-126.453, 43.252)];
        let bbox = bounding_box(&coords).unwrap();
        assert_eq!(bbox.southwest, (-126.453, 38.5));
        assert_eq!(bbox.northeast, (-120.2, 43.252));
    }

    #[test]
    fn test_containment_is_inclusive() {
        let coords = [(1.0, 2.0), (3.0, -1.0), (2.0, 0.5)];
        let bbox = bounding_box(&coords).unwrap();
        for coord in coords {
            assert!(bbox.contains(coord), "{coord:?} should be inside {bbox:?}");
        }
        assert!(!bbox.contains((3.1, 0.0)));
        assert!(!bbox.contains((2.0, -1.1)));
    }

    #[test]
    fn test_serializes_as_corner_pair() {
        let bbox = BoundingBox {
            southwest: (-1.0, -2.0),
            northeast: (3.0, 4.0),
        };
        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(json, "[[-1.0,-2.0],[3.0,4.0]]");
        let back: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bbox);
    }
}
