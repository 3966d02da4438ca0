//! Photon search proxy with canonical cache keys and dedup.
//!
//! Forwards search and nearby-search requests to a Photon instance, caching
//! deduplicated results under order-independent keys. Touristic places change
//! rarely, so results keep for a couple of hours.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::cache::{self, ResponseCache, Source};
use crate::cache_key::{
    NearbySearchRequest, RequestValidationError, SearchRequest, nearby_cache_key, search_cache_key,
};
use crate::place::{PlaceRecord, dedupe};

pub const PLACE_CACHE_TTL: Duration = Duration::from_secs(120 * 60);

/// Upstream tag filter applied when a search does not pick one.
const DEFAULT_SEARCH_OSM_TAG: &str = "tourism";

#[derive(Debug, Clone)]
pub struct PhotonConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PhotonConfig {
    fn default() -> Self {
        Self {
            base_url: "https://photon.komoot.io".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("invalid search request: {0}")]
    InvalidRequest(#[from] RequestValidationError),
    #[error("photon request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("photon returned status {status}: {body}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Deduplicated results plus where they came from.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub source: Source,
    pub results: Vec<PlaceRecord>,
}

// Upstream response shape: GeoJSON features with lon-first coordinates.
#[derive(Debug, Deserialize)]
pub struct PhotonResponse {
    pub features: Vec<PhotonFeature>,
}

#[derive(Debug, Deserialize)]
pub struct PhotonFeature {
    pub geometry: PhotonGeometry,
    pub properties: PhotonProperties,
}

#[derive(Debug, Deserialize)]
pub struct PhotonGeometry {
    pub coordinates: [f64; 2],
}

#[derive(Debug, Deserialize)]
pub struct PhotonProperties {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    pub osm_id: i64,
    pub osm_type: String,
    #[serde(rename = "type", default)]
    pub place_type: Option<String>,
}

impl From<PhotonFeature> for PlaceRecord {
    fn from(feature: PhotonFeature) -> Self {
        let [lon, lat] = feature.geometry.coordinates;
        let properties = feature.properties;
        Self {
            name: properties.name.unwrap_or_default(),
            city: properties.city,
            country: properties.country,
            state: properties.state,
            postcode: properties.postcode,
            lat,
            lon,
            osm_id: properties.osm_id,
            osm_type: properties.osm_type,
            place_type: properties.place_type.unwrap_or_default(),
        }
    }
}

pub struct PhotonClient {
    config: PhotonConfig,
    client: reqwest::blocking::Client,
    cache: Arc<dyn ResponseCache>,
}

impl PhotonClient {
    pub fn new(config: PhotonConfig, cache: Arc<dyn ResponseCache>) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            cache,
        })
    }

    /// Forward search against `/api`.
    pub fn search(&self, input: &SearchRequest) -> Result<SearchResponse, SearchError> {
        input.validate()?;

        let key = search_cache_key(input);
        if let Some(results) = cache::get_json::<Vec<PlaceRecord>>(self.cache.as_ref(), &key) {
            return Ok(SearchResponse {
                source: Source::Cache,
                results,
            });
        }

        let mut params: Vec<(&str, String)> = vec![
            ("q", input.query.clone()),
            ("lang", input.effective_lang().to_string()),
            ("limit", input.effective_limit().to_string()),
            (
                "osm_tag",
                input
                    .osm_tag
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SEARCH_OSM_TAG.to_string()),
            ),
        ];
        if let Some(layer) = &input.layer {
            params.push(("layer", layer.clone()));
        }
        if let Some(lat) = input.lat {
            params.push(("lat", lat.to_string()));
        }
        if let Some(lon) = input.lon {
            params.push(("lon", lon.to_string()));
        }
        if let Some(bbox) = &input.bbox {
            params.push(("bbox", bbox.clone()));
        }

        let url = format!("{}/api", self.config.base_url);
        let results = self.fetch_places(&url, &params)?;
        info!(query = %input.query, results = results.len(), "photon search ok");

        cache::set_json(self.cache.as_ref(), &key, &results, PLACE_CACHE_TTL);
        Ok(SearchResponse {
            source: Source::Api,
            results,
        })
    }

    /// Nearby search (reverse lookup around a point) against `/reverse`.
    pub fn nearby_search(&self, input: &NearbySearchRequest) -> Result<SearchResponse, SearchError> {
        let key = nearby_cache_key(input);
        if let Some(results) = cache::get_json::<Vec<PlaceRecord>>(self.cache.as_ref(), &key) {
            return Ok(SearchResponse {
                source: Source::Cache,
                results,
            });
        }

        let mut params: Vec<(&str, String)> = vec![
            ("lat", input.lat.to_string()),
            ("lon", input.lon.to_string()),
            ("lang", input.effective_lang().to_string()),
            ("limit", input.effective_limit().to_string()),
            ("radius", input.effective_radius().to_string()),
        ];
        if let Some(layer) = &input.layer {
            params.push(("layer", layer.clone()));
        }
        if let Some(osm_tag) = &input.osm_tag {
            params.push(("osm_tag", osm_tag.clone()));
        }

        let url = format!("{}/reverse", self.config.base_url);
        let results = self.fetch_places(&url, &params)?;
        info!(
            lat = input.lat,
            lon = input.lon,
            results = results.len(),
            "photon nearby search ok"
        );

        cache::set_json(self.cache.as_ref(), &key, &results, PLACE_CACHE_TTL);
        Ok(SearchResponse {
            source: Source::Api,
            results,
        })
    }

    fn fetch_places(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<PlaceRecord>, SearchError> {
        let response = self.client.get(url).query(params).send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!(%status, url, "photon request failed");
            return Err(SearchError::UpstreamStatus { status, body });
        }

        let data: PhotonResponse = response.json()?;
        let records = data.features.into_iter().map(PlaceRecord::from).collect();
        Ok(dedupe(records))
    }
}
