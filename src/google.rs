use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::coords::Coordinate;
use crate::error::AppError;

const ROUTES_URL: &str = "https://routes.googleapis.com/directions/v2:computeRoutes";
const AUTOCOMPLETE_URL: &str = "https://maps.googleapis.com/maps/api/place/autocomplete/json";
const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

// Only the fields named in the field mask below; the payload is sparse, so
// everything stays optional and missing lists default to empty.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutesResponse {
    #[serde(default)]
    pub routes: Vec<RawRoute>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRoute {
    /// Total travel time as "<seconds>s", e.g. "1620s".
    pub duration: Option<String>,
    #[serde(default)]
    pub legs: Vec<RawLeg>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLeg {
    #[serde(default)]
    pub steps: Vec<RawStep>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStep {
    pub transit_details: Option<TransitDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitDetails {
    pub transit_line: Option<TransitLine>,
    pub stop_details: Option<StopDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitLine {
    pub name_short: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDetails {
    pub departure_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Typed client for the three Google Maps endpoints the app depends on.
/// Holds a shared reqwest client with a per-call timeout so a stalled
/// upstream query fails recoverably instead of hanging the request.
#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    api_key: String,
}

impl GoogleClient {
    pub fn new(api_key: String) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(GoogleClient { http, api_key })
    }

    /// One computeRoutes query: transit mode restricted to buses, alternative
    /// routes on, optionally anchored to a forward departure time. The Routes
    /// API never accepts an arrival time in transit mode.
    pub async fn compute_routes(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        departure: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawRoute>, AppError> {
        let mut body = json!({
            "origin": {
                "location": { "latLng": { "latitude": origin.latitude, "longitude": origin.longitude } }
            },
            "destination": {
                "location": { "latLng": { "latitude": destination.latitude, "longitude": destination.longitude } }
            },
            "travelMode": "TRANSIT",
            "computeAlternativeRoutes": true,
            "transitPreferences": {
                "allowedTravelModes": ["BUS"]
            }
        });
        if let Some(dt) = departure {
            body["departureTime"] = json!(dt.to_rfc3339_opts(SecondsFormat::Secs, true));
        }

        let field_mask = "routes.duration,routes.legs.steps.travelMode,routes.legs.steps.transitDetails";
        let res = self
            .http
            .post(ROUTES_URL)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", field_mask)
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "routes API returned {status}: {text}"
            )));
        }

        let parsed: RoutesResponse = res.json().await?;
        Ok(parsed.routes)
    }

    /// Place autocomplete, returned to the caller as-is (`predictions[]`).
    pub async fn autocomplete(&self, input: &str) -> Result<Value, AppError> {
        let res = self
            .http
            .get(AUTOCOMPLETE_URL)
            .query(&[("input", input), ("key", self.api_key.as_str())])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(AppError::Upstream(format!(
                "autocomplete API returned {}",
                res.status()
            )));
        }

        Ok(res.json().await?)
    }

    /// Address to coordinate; the first geocoding result wins.
    pub async fn geocode(&self, address: &str) -> Result<LatLng, AppError> {
        #[derive(Deserialize)]
        struct GeocodeResponse {
            #[serde(default)]
            results: Vec<GeocodeResult>,
        }
        #[derive(Deserialize)]
        struct GeocodeResult {
            geometry: Geometry,
        }
        #[derive(Deserialize)]
        struct Geometry {
            location: LatLng,
        }

        let res = self
            .http
            .get(GEOCODE_URL)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(AppError::Upstream(format!(
                "geocode API returned {}",
                res.status()
            )));
        }

        let parsed: GeocodeResponse = res.json().await?;
        parsed
            .results
            .into_iter()
            .next()
            .map(|r| r.geometry.location)
            .ok_or_else(|| AppError::NotFound(format!("no geocoding result for \"{address}\"")))
    }
}
