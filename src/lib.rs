//! trip-planner kernel
//!
//! Geometry and canonicalization primitives for a map-based trip planner:
//! encoded-polyline decoding, bounding-box fitting, and search-result
//! canonicalization, plus the thin upstream adapters (Valhalla, Photon,
//! Nominatim/Mapillary) that exercise them. The kernel functions are pure
//! and safe to call from any number of request contexts; the adapters share
//! state only through the [`cache::ResponseCache`] handle.

pub mod cache;
pub mod cache_key;
pub mod geometry;
pub mod photon;
pub mod place;
pub mod polyline;
pub mod reverse_geocode;
pub mod valhalla;
