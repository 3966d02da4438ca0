//! Normalized place records and result canonicalization.
//!
//! Upstream search responses arrive as loosely-shaped GeoJSON features; this
//! module owns the typed records they are normalized into and the identity
//! rules applied to them. Two records describe the same real-world place iff
//! their `(osm_type, osm_id)` pair matches, regardless of any other field.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A normalized search result from a geocoding upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub osm_id: i64,
    pub osm_type: String,
    #[serde(rename = "type")]
    pub place_type: String,
}

impl PlaceRecord {
    /// The `"{osm_type}-{osm_id}"` identity key.
    pub fn composite_key(&self) -> String {
        composite_key(&self.osm_type, self.osm_id)
    }
}

pub fn composite_key(osm_type: &str, osm_id: i64) -> String {
    format!("{osm_type}-{osm_id}")
}

/// Drops records whose composite key was already seen, keeping the first
/// occurrence. Output order is a stable subsequence of input order.
pub fn dedupe(records: Vec<PlaceRecord>) -> Vec<PlaceRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.composite_key()))
        .collect()
}

/// Thumbnail URLs for a place, from street-level imagery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceImage {
    pub thumb_256_url: Option<String>,
    pub thumb_1024_url: Option<String>,
}

/// A place shown on the map before (or instead of) becoming a full search
/// result: reverse-geocode output, a dropped pin, or a stop already added to
/// the trip. Only the coordinates are guaranteed; everything else depends on
/// how the place entered the preview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewPlace {
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osm_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osm_type: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub place_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    /// Snapped coordinates as reported by the reverse geocoder, kept as the
    /// upstream's decimal strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_lat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrected_lon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<PlaceImage>,
}

/// Collects the composite keys of every place that carries an OSM reference.
///
/// Used to exclude already-chosen stops from nearby-search suggestions.
/// Places without both `osm_type` and `osm_id` contribute nothing.
pub fn selected_id_set<'a, I>(places: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a PreviewPlace>,
{
    places
        .into_iter()
        .filter_map(|place| match (&place.osm_type, place.osm_id) {
            (Some(osm_type), Some(osm_id)) => Some(composite_key(osm_type, osm_id)),
            _ => None,
        })
        .collect()
}
