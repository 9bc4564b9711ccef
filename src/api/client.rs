//! HTTP client for the AfterShip tracking API
//!
//! This module performs the authenticated REST calls and decodes the API's
//! meta/data response envelope into the typed models. No retry or backoff
//! happens at this layer; a failed call surfaces as a typed error.

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use super::{Courier, ListFilters, NewTracking, Tracking, TrackingId, TrackingList, TrackingUpdate};

/// Base URL for the tracking API
const DEFAULT_BASE_URL: &str = "https://api.aftership.com/v4";

/// Header carrying the API credential
const API_KEY_HEADER: &str = "aftership-api-key";

/// Errors that can occur when calling the tracking API
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response was decoded
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response body was not the expected JSON shape
    #[error("failed to parse API response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The requested resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The API key was rejected
    #[error("API key was rejected by the tracking service")]
    Unauthorized,

    /// Too many requests in the current window
    #[error("rate limit exceeded")]
    RateLimited,

    /// Any other error reported by the service
    #[error("tracking service error (code {code}): {message}")]
    Remote { code: i64, message: String },
}

impl ApiError {
    /// Whether this error means the resource simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// The meta/data envelope wrapping every API response
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    meta: Meta,
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    code: i64,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackingData {
    tracking: Tracking,
}

#[derive(Debug, Deserialize)]
struct CourierData {
    #[serde(default)]
    couriers: Vec<Courier>,
}

/// Client for the tracking API
///
/// Thin wrapper over `reqwest::Client` that attaches the credential header,
/// builds endpoint paths, and decodes response envelopes.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    /// Creates a client for the production API endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Points the client at a different base URL (mock server, proxy)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Registers a new shipment for tracking
    pub async fn create_tracking(&self, new_tracking: &NewTracking) -> Result<Tracking, ApiError> {
        let body = json!({ "tracking": new_tracking });
        let data: TrackingData = self
            .send(Method::POST, "trackings", &[], Some(body))
            .await?;
        Ok(data.tracking)
    }

    /// Fetches one tracking
    pub async fn get_tracking(&self, id: &TrackingId) -> Result<Tracking, ApiError> {
        let data: TrackingData = self.send(Method::GET, &id.path(), &[], None).await?;
        Ok(data.tracking)
    }

    /// Lists trackings matching the given filters
    pub async fn list_trackings(&self, filters: &ListFilters) -> Result<TrackingList, ApiError> {
        self.send(Method::GET, "trackings", &filters.query(), None)
            .await
    }

    /// Updates mutable fields on a tracking
    pub async fn update_tracking(
        &self,
        id: &TrackingId,
        update: &TrackingUpdate,
    ) -> Result<Tracking, ApiError> {
        let body = json!({ "tracking": update });
        let data: TrackingData = self.send(Method::PUT, &id.path(), &[], Some(body)).await?;
        Ok(data.tracking)
    }

    /// Removes a tracking; the API echoes back a stub of the deleted record
    pub async fn delete_tracking(&self, id: &TrackingId) -> Result<Tracking, ApiError> {
        let data: TrackingData = self.send(Method::DELETE, &id.path(), &[], None).await?;
        Ok(data.tracking)
    }

    /// Re-activates an expired tracking
    pub async fn retrack(&self, id: &TrackingId) -> Result<Tracking, ApiError> {
        let path = format!("{}/retrack", id.path());
        let data: TrackingData = self.send(Method::POST, &path, &[], None).await?;
        Ok(data.tracking)
    }

    /// Closes a tracking with a completion reason
    pub async fn mark_as_completed(
        &self,
        id: &TrackingId,
        reason: &str,
    ) -> Result<Tracking, ApiError> {
        let path = format!("{}/mark-as-completed", id.path());
        let body = json!({ "reason": reason });
        let data: TrackingData = self.send(Method::POST, &path, &[], Some(body)).await?;
        Ok(data.tracking)
    }

    /// Asks the provider which couriers could own a tracking number
    pub async fn detect_couriers(&self, tracking_number: &str) -> Result<Vec<Courier>, ApiError> {
        let body = json!({ "tracking": { "tracking_number": tracking_number } });
        let data: CourierData = self
            .send(Method::POST, "couriers/detect", &[], Some(body))
            .await?;
        Ok(data.couriers)
    }

    /// Lists couriers activated on the account
    pub async fn list_couriers(&self) -> Result<Vec<Courier>, ApiError> {
        let data: CourierData = self.send(Method::GET, "couriers", &[], None).await?;
        Ok(data.couriers)
    }

    /// Lists every courier the provider supports
    pub async fn list_all_couriers(&self) -> Result<Vec<Courier>, ApiError> {
        let data: CourierData = self.send(Method::GET, "couriers/all", &[], None).await?;
        Ok(data.couriers)
    }

    /// Sends one request and decodes the enveloped response
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let mut request = self
            .client
            .request(method, &url)
            .header(API_KEY_HEADER, &self.api_key);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        decode(status, &text, path)
    }
}

/// Decodes a response body against the HTTP status and the meta envelope
fn decode<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    context: &str,
) -> Result<T, ApiError> {
    if !status.is_success() {
        return Err(match status.as_u16() {
            401 | 403 => ApiError::Unauthorized,
            404 => ApiError::NotFound(context.to_string()),
            429 => ApiError::RateLimited,
            code => ApiError::Remote {
                code: i64::from(code),
                message: meta_message(body),
            },
        });
    }

    let envelope: Envelope<T> = serde_json::from_str(body)?;
    match envelope.data {
        Some(data) => Ok(data),
        None => Err(ApiError::Remote {
            code: envelope.meta.code,
            message: envelope
                .meta
                .message
                .unwrap_or_else(|| "response carried no data".to_string()),
        }),
    }
}

/// Best-effort extraction of the error message from an envelope body
fn meta_message(body: &str) -> String {
    serde_json::from_str::<Envelope<Value>>(body)
        .ok()
        .and_then(|envelope| envelope.meta.message)
        .unwrap_or_else(|| "no error detail provided".to_string())
}
