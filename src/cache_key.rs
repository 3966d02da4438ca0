//! Canonical cache keys for search proxy requests.
//!
//! Keys are built from `field:value` tokens, sorted lexicographically and
//! joined with `|` under a request-kind prefix. Sorting makes the key
//! independent of field declaration order, and defaulted fields always emit
//! their effective value, so a request that spells out a default and one that
//! leaves it unset land on the same cache entry. Naive concatenation is
//! avoided: the token structure keeps `lat:1, lon:23` distinct from
//! `lat:12, lon:3`.

use serde::Deserialize;

pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_SEARCH_LIMIT: u32 = 8;
pub const DEFAULT_NEARBY_LIMIT: u32 = 1;
pub const DEFAULT_NEARBY_RADIUS: u32 = 50;

/// Shorter queries are never worth an upstream call or a cache entry.
pub const MIN_QUERY_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RequestValidationError {
    #[error("query must be at least {MIN_QUERY_LEN} characters")]
    QueryTooShort,
}

/// A forward-search request against the geocoding upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub lang: Option<String>,
    pub limit: Option<u32>,
    pub layer: Option<String>,
    pub osm_tag: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub bbox: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn effective_lang(&self) -> &str {
        self.lang.as_deref().unwrap_or(DEFAULT_LANG)
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)
    }

    /// Boundary check, applied once before a request is keyed or forwarded.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.query.chars().count() < MIN_QUERY_LEN {
            return Err(RequestValidationError::QueryTooShort);
        }
        Ok(())
    }
}

/// A nearby-search (reverse lookup around a point) request.
#[derive(Debug, Clone, Deserialize)]
pub struct NearbySearchRequest {
    pub lat: f64,
    pub lon: f64,
    pub lang: Option<String>,
    pub limit: Option<u32>,
    pub radius: Option<u32>,
    pub layer: Option<String>,
    pub osm_tag: Option<String>,
}

impl NearbySearchRequest {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            lang: None,
            limit: None,
            radius: None,
            layer: None,
            osm_tag: None,
        }
    }

    pub fn effective_lang(&self) -> &str {
        self.lang.as_deref().unwrap_or(DEFAULT_LANG)
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_NEARBY_LIMIT)
    }

    pub fn effective_radius(&self) -> u32 {
        self.radius.unwrap_or(DEFAULT_NEARBY_RADIUS)
    }
}

/// Cache key for a forward search. Query text is lower-cased; unset optional
/// fields emit no token.
pub fn search_cache_key(input: &SearchRequest) -> String {
    let mut parts = vec![
        format!("q:{}", input.query.to_lowercase()),
        format!("lang:{}", input.effective_lang()),
        format!("limit:{}", input.effective_limit()),
    ];
    push_token(&mut parts, "layer", input.layer.as_deref());
    push_token(&mut parts, "osm_tag", input.osm_tag.as_deref());
    push_number(&mut parts, "lat", input.lat);
    push_number(&mut parts, "lon", input.lon);
    push_token(&mut parts, "bbox", input.bbox.as_deref());

    join_key("search", parts)
}

/// Cache key for a nearby search.
pub fn nearby_cache_key(input: &NearbySearchRequest) -> String {
    let mut parts = vec![
        format!("lat:{}", input.lat),
        format!("lon:{}", input.lon),
        format!("lang:{}", input.effective_lang()),
        format!("limit:{}", input.effective_limit()),
        format!("radius:{}", input.effective_radius()),
    ];
    push_token(&mut parts, "layer", input.layer.as_deref());
    push_token(&mut parts, "osm_tag", input.osm_tag.as_deref());

    join_key("nearby", parts)
}

fn push_token(parts: &mut Vec<String>, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        parts.push(format!("{field}:{value}"));
    }
}

fn push_number(parts: &mut Vec<String>, field: &str, value: Option<f64>) {
    if let Some(value) = value {
        parts.push(format!("{field}:{value}"));
    }
}

fn join_key(kind: &str, mut parts: Vec<String>) -> String {
    parts.sort_unstable();
    format!("{kind}|{}", parts.join("|"))
}
