//! Valhalla optimized-route adapter and route geometry assembly.
//!
//! Sends an ordered stop list to the `optimized_route` endpoint and turns the
//! trip response into map-renderable geometry: one GeoJSON LineString per
//! leg, the optimized waypoint order, and a fit-to-bounds box over every
//! decoded point.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::geometry::{BoundingBox, Coordinate, GeometryError, bounding_box};
use crate::polyline::{self, PolylineError};

#[derive(Debug, Clone)]
pub struct ValhallaConfig {
    pub base_url: String,
    /// Valhalla costing model, e.g. "pedestrian" or "bicycle".
    pub costing: String,
    pub timeout_secs: u64,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://valhalla1.openstreetmap.de".to_string(),
            costing: "pedestrian".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("an optimized route needs at least two locations")]
    NotEnoughLocations,
    #[error("valhalla request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("valhalla returned status {status}: {body}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode leg shape: {0}")]
    Shape(#[from] PolylineError),
    #[error("trip carried no geometry: {0}")]
    Geometry(#[from] GeometryError),
}

// Request payload. The one latitude-first shape in the crate.
#[derive(Debug, Serialize)]
struct RouteRequest<'a> {
    locations: Vec<RequestLocation>,
    costing: &'a str,
    directions_options: DirectionsOptions<'a>,
}

#[derive(Debug, Serialize)]
struct RequestLocation {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize)]
struct DirectionsOptions<'a> {
    units: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizedRouteResponse {
    pub trip: Trip,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trip {
    pub locations: Vec<TripLocation>,
    pub legs: Vec<Leg>,
    pub summary: TripSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripLocation {
    pub lat: f64,
    pub lon: f64,
    /// Index of this stop in the request order, before optimization.
    #[serde(default)]
    pub original_index: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Leg {
    /// Encoded polyline at 1e-6 precision.
    pub shape: String,
    pub summary: TripSummary,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripSummary {
    /// Travel time in seconds.
    #[serde(default)]
    pub time: f64,
    /// Length in the requested units (kilometers).
    #[serde(default)]
    pub length: f64,
}

/// A GeoJSON FeatureCollection of per-leg LineStrings.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub geometry: LineString,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineString {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: Vec<Coordinate>,
}

impl Feature {
    fn line_string(coordinates: Vec<Coordinate>) -> Self {
        Self {
            kind: "Feature",
            geometry: LineString {
                kind: "LineString",
                coordinates,
            },
            properties: serde_json::Map::new(),
        }
    }
}

/// Everything the map layer needs to render a trip.
#[derive(Debug, Clone, Serialize)]
pub struct RouteGeometry {
    pub geojson: FeatureCollection,
    /// Fit-to-bounds box over all decoded leg points.
    pub bbox: BoundingBox,
    /// Waypoints in optimized visiting order, (lon, lat).
    pub ordered_coords: Vec<Coordinate>,
}

/// Decodes every leg shape and assembles renderable geometry.
///
/// Legs decode independently, so they run in parallel; feature order still
/// follows leg order. A trip whose legs decode to zero points is an error
/// (there is nothing to fit the viewport to).
pub fn assemble_route_geometry(trip: &Trip) -> Result<RouteGeometry, RouteError> {
    let leg_coords = trip
        .legs
        .par_iter()
        .map(|leg| polyline::decode(&leg.shape))
        .collect::<Result<Vec<_>, _>>()?;

    let all_coords: Vec<Coordinate> = leg_coords.iter().flatten().copied().collect();
    let bbox = bounding_box(&all_coords)?;

    let features = leg_coords.into_iter().map(Feature::line_string).collect();
    let ordered_coords = trip
        .locations
        .iter()
        .map(|location| (location.lon, location.lat))
        .collect();

    Ok(RouteGeometry {
        geojson: FeatureCollection {
            kind: "FeatureCollection",
            features,
        },
        bbox,
        ordered_coords,
    })
}

#[derive(Debug, Clone)]
pub struct ValhallaClient {
    config: ValhallaConfig,
    client: reqwest::blocking::Client,
}

impl ValhallaClient {
    pub fn new(config: ValhallaConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Requests an optimized route through `locations` ((lon, lat) pairs)
    /// and returns the assembled geometry.
    pub fn optimized_route(&self, locations: &[Coordinate]) -> Result<RouteGeometry, RouteError> {
        if locations.len() < 2 {
            return Err(RouteError::NotEnoughLocations);
        }

        let body = RouteRequest {
            locations: locations
                .iter()
                .map(|&(lon, lat)| RequestLocation { lat, lon })
                .collect(),
            costing: &self.config.costing,
            directions_options: DirectionsOptions { units: "kilometers" },
        };

        let url = format!("{}/optimized_route", self.config.base_url);
        let response = self.client.post(url).json(&body).send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!(%status, "valhalla optimized_route failed");
            return Err(RouteError::UpstreamStatus { status, body });
        }

        let data: OptimizedRouteResponse = response.json()?;
        info!(
            legs = data.trip.legs.len(),
            time_secs = data.trip.summary.time,
            length_km = data.trip.summary.length,
            "optimized route received"
        );

        assemble_route_geometry(&data.trip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyline::encode;

    fn trip_with_legs(legs: Vec<Vec<Coordinate>>) -> Trip {
        let locations = legs
            .iter()
            .filter_map(|coords| coords.first())
            .enumerate()
            .map(|(i, &(lon, lat))| TripLocation {
                lat,
                lon,
                original_index: Some(i),
            })
            .collect();
        Trip {
            locations,
            legs: legs
                .into_iter()
                .map(|coords| Leg {
                    shape: encode(&coords),
                    summary: TripSummary::default(),
                })
                .collect(),
            summary: TripSummary::default(),
        }
    }

    #[test]
    fn test_assembles_one_feature_per_leg_in_order() {
        let first = vec![(13.40, 52.52), (13.41, 52.53)];
        let second = vec![(13.41, 52.53), (13.42, 52.51)];
        let trip = trip_with_legs(vec![first.clone(), second.clone()]);

        let geometry = assemble_route_geometry(&trip).unwrap();
        assert_eq!(geometry.geojson.kind, "FeatureCollection");
        assert_eq!(geometry.geojson.features.len(), 2);
        assert_eq!(geometry.geojson.features[0].geometry.coordinates.len(), 2);
        let start = geometry.geojson.features[0].geometry.coordinates[0];
        assert!((start.0 - first[0].0).abs() < 1e-9);
        assert!((start.1 - first[0].1).abs() < 1e-9);
    }

    #[test]
    fn test_bbox_covers_every_leg_point() {
        let trip = trip_with_legs(vec![
            vec![(13.40, 52.52), (13.48, 52.49)],
            vec![(13.48, 52.49), (13.35, 52.56)],
        ]);
        let geometry = assemble_route_geometry(&trip).unwrap();
        for feature in &geometry.geojson.features {
            for &coord in &feature.geometry.coordinates {
                assert!(geometry.bbox.contains(coord), "{coord:?} outside bbox");
            }
        }
    }

    #[test]
    fn test_ordered_coords_follow_trip_locations() {
        let trip = trip_with_legs(vec![
            vec![(1.0, 2.0), (3.0, 4.0)],
            vec![(3.0, 4.0), (5.0, 6.0)],
        ]);
        let geometry = assemble_route_geometry(&trip).unwrap();
        assert_eq!(geometry.ordered_coords, vec![(1.0, 2.0), (3.0, 4.0)]);
    }

    #[test]
    fn test_empty_trip_is_an_error() {
        let trip = trip_with_legs(vec![]);
        assert!(matches!(
            assemble_route_geometry(&trip),
            Err(RouteError::Geometry(GeometryError::EmptyInput))
        ));
    }

    #[test]
    fn test_garbage_shape_is_an_error() {
        let mut trip = trip_with_legs(vec![vec![(1.0, 2.0), (3.0, 4.0)]]);
        trip.legs[0].shape.push(' ');
        assert!(matches!(
            assemble_route_geometry(&trip),
            Err(RouteError::Shape(_))
        ));
    }

    #[test]
    fn test_too_few_locations_rejected_before_any_request() {
        let client = ValhallaClient::new(ValhallaConfig::default()).unwrap();
        assert!(matches!(
            client.optimized_route(&[(13.4, 52.5)]),
            Err(RouteError::NotEnoughLocations)
        ));
    }

    #[test]
    fn test_geojson_serializes_with_type_tags() {
        let trip = trip_with_legs(vec![vec![(1.0, 2.0), (3.0, 4.0)]]);
        let geometry = assemble_route_geometry(&trip).unwrap();
        let json = serde_json::to_value(&geometry).unwrap();
        assert_eq!(json["geojson"]["type"], "FeatureCollection");
        assert_eq!(json["geojson"]["features"][0]["type"], "Feature");
        assert_eq!(
            json["geojson"]["features"][0]["geometry"]["type"],
            "LineString"
        );
    }
}
