//! Geocoding: coordinates to place names and free-text search to coordinates.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::provider::{build_client, ensure_success, ProviderEndpoints};
use crate::types::{GatewayError, GatewayOutcome, Place, UNKNOWN_LOCATION};

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
}

impl NominatimAddress {
    // Prefer city > town > village > county
    fn place_name(self) -> Option<String> {
        [self.city, self.town, self.village, self.county]
            .into_iter()
            .flatten()
            .map(|name| name.trim().to_string())
            .find(|name| !name.is_empty())
    }
}

/// Nominatim returns coordinates as strings; tolerate numbers too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Text(String),
    Number(f64),
}

impl Coordinate {
    fn value(&self) -> Option<f64> {
        match self {
            Self::Text(raw) => raw.trim().parse().ok(),
            Self::Number(value) => Some(*value),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: Coordinate,
    lon: Coordinate,
    display_name: String,
}

#[derive(Debug, Clone)]
pub struct Geocoder {
    client: Arc<Client>,
    base_url: String,
}

impl Geocoder {
    pub fn new(endpoints: &ProviderEndpoints) -> Result<Self, GatewayError> {
        let client = Arc::new(build_client(endpoints)?);
        Ok(Self::with_client(client, endpoints))
    }

    pub fn with_client(client: Arc<Client>, endpoints: &ProviderEndpoints) -> Self {
        Self {
            client,
            base_url: endpoints.geocoding_url.trim_end_matches('/').to_string(),
        }
    }

    /// Reverse geocode coordinates to a place name.
    ///
    /// Falls back to [`UNKNOWN_LOCATION`]; never fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn reverse(&self, latitude: f64, longitude: f64) -> GatewayOutcome<String> {
        let outcome = GatewayOutcome::or_fallback(
            self.request_reverse(latitude, longitude).await,
            || UNKNOWN_LOCATION.to_string(),
        );

        match &outcome {
            GatewayOutcome::Live(name) => tracing::info!("Reverse geocoded to: {}", name),
            GatewayOutcome::Fallback { reason, .. } => {
                tracing::warn!("Geocoding failed: {}", reason)
            }
            GatewayOutcome::Failed(_) => {}
        }
        outcome
    }

    /// Search for places matching free text, best match first.
    ///
    /// Blank queries return no results without touching the network; failures
    /// yield an empty list.
    #[instrument(skip(self), level = "debug")]
    pub async fn search(&self, query: &str) -> GatewayOutcome<Vec<Place>> {
        let query = query.trim();
        if query.is_empty() {
            return GatewayOutcome::Live(Vec::new());
        }

        let outcome = GatewayOutcome::or_fallback(self.request_search(query).await, Vec::new);
        if let GatewayOutcome::Fallback { reason, .. } = &outcome {
            tracing::warn!("City search failed: {}", reason);
        }
        outcome
    }

    async fn request_reverse(&self, latitude: f64, longitude: f64) -> Result<String, GatewayError> {
        let response = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("format", "json".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
            ])
            .send()
            .await?;

        let body: NominatimResponse = ensure_success(response, "reverse geocoder")?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        Ok(body
            .address
            .and_then(NominatimAddress::place_name)
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()))
    }

    async fn request_search(&self, query: &str) -> Result<Vec<Place>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("format", "json"), ("q", query)])
            .send()
            .await?;

        let hits: Vec<NominatimPlace> = ensure_success(response, "city search")?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        // Hits without a name would become a selection with no city.
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                Some(Place {
                    latitude: hit.lat.value()?,
                    longitude: hit.lon.value()?,
                    display_name: hit.display_name,
                })
            })
            .filter(|place| !place.city_name().is_empty())
            .collect())
    }
}
