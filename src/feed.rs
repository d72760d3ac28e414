//! Vehicle feed client
//!
//! The feed answers with a JSON object whose `data` field is a string
//! holding a second JSON document. Vehicles sit at `ROOT.BUSES.BUS` in that
//! inner document, as a list or, for a single vehicle, as a bare object.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{config::FeedConfig, errors::FleetMapError, models::VehicleSighting};

#[derive(Debug, Deserialize)]
struct Envelope {
    data: String,
}

/// HTTP client for the vehicle feed
pub struct FeedClient {
    client: Client,
    url: String,
}

impl FeedClient {
    /// Create a client with the feed credentials baked into every request
    pub fn new(config: &FeedConfig) -> Result<Self, FleetMapError> {
        let mut headers = HeaderMap::new();

        let mut auth = header_value("token", &format!("Bearer {}", config.token))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            HeaderName::from_static("x-device-id"),
            header_value("device_id", &config.device_id)?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Fetch the current list of vehicles
    pub async fn fetch(&self) -> Result<Vec<VehicleSighting>, FleetMapError> {
        info!("Fetching vehicles from {}", self.url);
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FleetMapError::FeedStatus { status });
        }

        let body = response.text().await?;
        let sightings = parse_envelope(&body)?;
        info!("Feed returned {} vehicles", sightings.len());
        Ok(sightings)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, FleetMapError> {
    HeaderValue::from_str(value).map_err(|_| FleetMapError::ConfigurationError {
        message: format!("feed.{} is not a valid HTTP header value", name),
    })
}

/// Unwrap the double-encoded feed response into sightings.
///
/// Records that do not deserialize are skipped with a warning.
pub fn parse_envelope(body: &str) -> Result<Vec<VehicleSighting>, FleetMapError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| FleetMapError::InvalidEnvelope(format!("response: {}", e)))?;
    let mut payload: Value = serde_json::from_str(&envelope.data)
        .map_err(|e| FleetMapError::InvalidEnvelope(format!("data field: {}", e)))?;

    if payload.get("ROOT").is_none() {
        return Err(FleetMapError::InvalidEnvelope(
            "data field has no ROOT".to_string(),
        ));
    }

    let records = match payload.pointer_mut("/ROOT/BUSES/BUS").map(Value::take) {
        Some(Value::Array(items)) => items,
        Some(item @ Value::Object(_)) => vec![item],
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(FleetMapError::InvalidEnvelope(format!(
                "unexpected BUS value: {}",
                other
            )))
        }
    };

    Ok(records
        .into_iter()
        .filter_map(
            |record| match serde_json::from_value::<VehicleSighting>(record) {
                Ok(sighting) => Some(sighting),
                Err(e) => {
                    warn!("Failed to parse vehicle record: {}", e);
                    None
                }
            },
        )
        .collect())
}
