//! Nominatim reverse geocoding with street-level imagery lookup.
//!
//! Resolves a clicked map point into an addressed `PreviewPlace`, optionally
//! decorated with a Mapillary thumbnail found in a small box around the
//! point. Results are cached per rounded coordinate; five decimal places is
//! about a meter, well under the precision of a map click.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::cache::{self, ResponseCache, Source};
use crate::place::{PlaceImage, PreviewPlace};

pub const REVERSE_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Half-width in degrees of the box searched for imagery.
const IMAGE_BBOX_DELTA: f64 = 0.0005;

/// Cache key for a reverse lookup, coordinates rounded to 1e-5 degrees.
pub fn reverse_cache_key(lat: f64, lon: f64) -> String {
    format!("{lat:.5},{lon:.5}")
}

#[derive(Debug, Clone)]
pub struct ReverseGeocodeConfig {
    pub nominatim_base_url: String,
    pub mapillary_base_url: String,
    /// Imagery lookup is skipped entirely without a token.
    pub mapillary_token: Option<String>,
    /// Nominatim's usage policy requires an identifying agent.
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for ReverseGeocodeConfig {
    fn default() -> Self {
        Self {
            nominatim_base_url: "https://nominatim.openstreetmap.org".to_string(),
            mapillary_base_url: "https://graph.mapillary.com".to_string(),
            mapillary_token: None,
            user_agent: "trip-planner".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Error, Debug)]
pub enum ReverseGeocodeError {
    #[error("nominatim request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("nominatim returned status {status}: {body}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    /// Nominatim reports unresolvable coordinates as a 200 with an `error`
    /// member in the body.
    #[error("nominatim reported an error: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NominatimResponse {
    /// Snapped coordinates, as decimal strings.
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default)]
    pub lon: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub osm_id: Option<i64>,
    #[serde(default)]
    pub osm_type: Option<String>,
    #[serde(rename = "type", default)]
    pub place_type: Option<String>,
    #[serde(default)]
    pub address: Option<GeocodeAddress>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeocodeAddress {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
}

impl GeocodeAddress {
    /// Best available settlement name; Nominatim uses different keys by
    /// place size.
    fn locality(&self) -> Option<String> {
        self.city
            .clone()
            .or_else(|| self.town.clone())
            .or_else(|| self.village.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MapillaryResponse {
    #[serde(default)]
    data: Vec<MapillaryImage>,
}

#[derive(Debug, Deserialize)]
struct MapillaryImage {
    #[serde(default)]
    thumb_256_url: Option<String>,
    #[serde(default)]
    thumb_1024_url: Option<String>,
}

/// A reverse-geocode result plus where it came from.
#[derive(Debug, Clone)]
pub struct LookupResponse {
    pub source: Source,
    pub result: PreviewPlace,
}

pub struct ReverseGeocodeClient {
    config: ReverseGeocodeConfig,
    client: reqwest::blocking::Client,
    cache: Arc<dyn ResponseCache>,
}

impl ReverseGeocodeClient {
    pub fn new(
        config: ReverseGeocodeConfig,
        cache: Arc<dyn ResponseCache>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            cache,
        })
    }

    /// Resolves the place at (lat, lon).
    pub fn by_coords(&self, lat: f64, lon: f64) -> Result<LookupResponse, ReverseGeocodeError> {
        let key = reverse_cache_key(lat, lon);
        if let Some(result) = cache::get_json::<PreviewPlace>(self.cache.as_ref(), &key) {
            return Ok(LookupResponse {
                source: Source::Cache,
                result,
            });
        }

        let data = self.fetch_nominatim(lat, lon)?;
        if let Some(err) = data.error {
            return Err(ReverseGeocodeError::Upstream(err.to_string()));
        }

        // Imagery is decoration; a failed lookup degrades to no image.
        let image = self.fetch_thumbnails(lat, lon);

        let address = data.address.unwrap_or_default();
        let result = PreviewPlace {
            lat,
            lon,
            name: data.name,
            display_name: data.display_name,
            osm_id: data.osm_id,
            osm_type: data.osm_type,
            place_type: data.place_type,
            city: address.locality(),
            country: address.country.clone(),
            state: address.state.clone(),
            postcode: address.postcode.clone(),
            corrected_lat: data.lat,
            corrected_lon: data.lon,
            image,
        };

        info!(lat, lon, "reverse geocode ok");
        cache::set_json(self.cache.as_ref(), &key, &result, REVERSE_CACHE_TTL);
        Ok(LookupResponse {
            source: Source::Api,
            result,
        })
    }

    fn fetch_nominatim(&self, lat: f64, lon: f64) -> Result<NominatimResponse, ReverseGeocodeError> {
        let url = format!("{}/reverse", self.config.nominatim_base_url);
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, self.config.user_agent.as_str())
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("format", "jsonv2".to_string()),
                ("addressdetails", "1".to_string()),
                ("extratags", "1".to_string()),
            ])
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            error!(%status, "nominatim reverse failed");
            return Err(ReverseGeocodeError::UpstreamStatus { status, body });
        }

        Ok(response.json()?)
    }

    /// Looks up a street-level thumbnail near the point. Never fails the
    /// lookup; returns `None` without a token or on any upstream problem.
    fn fetch_thumbnails(&self, lat: f64, lon: f64) -> Option<PlaceImage> {
        let token = self.config.mapillary_token.as_deref()?;

        let bbox = format!(
            "{},{},{},{}",
            lon - IMAGE_BBOX_DELTA,
            lat - IMAGE_BBOX_DELTA,
            lon + IMAGE_BBOX_DELTA,
            lat + IMAGE_BBOX_DELTA
        );
        let url = format!("{}/images", self.config.mapillary_base_url);
        let response = self
            .client
            .get(url)
            .query(&[
                ("fields", "id,thumb_256_url,thumb_1024_url"),
                ("bbox", bbox.as_str()),
                ("limit", "1"),
                ("access_token", token),
            ])
            .send();

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = %response.status(), "mapillary lookup failed");
                return None;
            }
            Err(err) => {
                warn!(%err, "mapillary request failed");
                return None;
            }
        };

        let data: MapillaryResponse = match response.json() {
            Ok(data) => data,
            Err(err) => {
                warn!(%err, "mapillary response did not parse");
                return None;
            }
        };

        data.data.into_iter().next().map(|image| PlaceImage {
            thumb_256_url: image.thumb_256_url,
            thumb_1024_url: image.thumb_1024_url,
        })
    }
}
