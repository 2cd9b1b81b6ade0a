//! OVH API client implementing the resource directory.
//!
//! Only the calls the sweep needs are covered: listing and deleting private
//! networks and their subnets within a cloud project.

mod directory;
mod error;
mod signature;
mod types;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::Method;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::directory::ApiError;
use types::OvhErrorBody;

pub use error::OvhClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "ovh-eu";

const ENDPOINT_ALIASES: &[(&str, &str)] = &[
    ("ovh-eu", "https://eu.api.ovh.com/1.0"),
    ("ovh-ca", "https://ca.api.ovh.com/1.0"),
    ("ovh-us", "https://api.us.ovhcloud.com/1.0"),
    ("kimsufi-eu", "https://eu.api.kimsufi.com/1.0"),
    ("kimsufi-ca", "https://ca.api.kimsufi.com/1.0"),
    ("soyoustart-eu", "https://eu.api.soyoustart.com/1.0"),
    ("soyoustart-ca", "https://ca.api.soyoustart.com/1.0"),
];

/// Credentials and endpoint for the OVH API.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OvhCredentials {
    /// Endpoint alias (for example `ovh-eu`) or base URL.
    pub endpoint: String,
    /// Application key issued when registering the application.
    pub application_key: String,
    /// Application secret paired with the key.
    pub application_secret: String,
    /// Consumer key granting access to the account.
    pub consumer_key: String,
}

/// Resolves an endpoint alias or URL to the API base URL.
///
/// # Errors
///
/// Returns [`OvhClientError::UnknownEndpoint`] when the value is neither a
/// known alias nor an `http(s)` URL.
pub fn resolve_endpoint(endpoint: &str) -> Result<String, OvhClientError> {
    let trimmed = endpoint.trim();
    if let Some((_, url)) = ENDPOINT_ALIASES.iter().find(|(alias, _)| *alias == trimmed) {
        return Ok((*url).to_owned());
    }
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        return Ok(trimmed.trim_end_matches('/').to_owned());
    }
    Err(OvhClientError::UnknownEndpoint {
        endpoint: endpoint.to_owned(),
    })
}

/// Signed HTTP client for the OVH API.
#[derive(Clone, Debug)]
pub struct OvhClient {
    http: reqwest::Client,
    base_url: String,
    credentials: OvhCredentials,
    time_delta: Arc<OnceCell<i64>>,
}

impl OvhClient {
    /// Builds a client from credentials.
    ///
    /// # Errors
    ///
    /// Returns [`OvhClientError`] when a credential is blank, the endpoint is
    /// unknown, or the HTTP client cannot be built.
    pub fn new(credentials: OvhCredentials) -> Result<Self, OvhClientError> {
        for (field, value) in [
            ("application_key", &credentials.application_key),
            ("application_secret", &credentials.application_secret),
            ("consumer_key", &credentials.consumer_key),
        ] {
            if value.trim().is_empty() {
                return Err(OvhClientError::MissingCredential {
                    field: field.to_owned(),
                });
            }
        }
        let base_url = resolve_endpoint(&credentials.endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            credentials,
            time_delta: Arc::new(OnceCell::new()),
        })
    }

    /// Base URL every request path is appended to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.call(Method::GET, path).await?;
        serde_json::from_str(&body).map_err(|err| ApiError::decode(format!("{path}: {err}")))
    }

    async fn delete_path(&self, path: &str) -> Result<(), ApiError> {
        self.call(Method::DELETE, path).await.map(|_| ())
    }

    async fn call(&self, method: Method, path: &str) -> Result<String, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let timestamp = self.server_timestamp().await?;
        let signature = signature::sign(
            &self.credentials.application_secret,
            &self.credentials.consumer_key,
            method.as_str(),
            &url,
            "",
            timestamp,
        );
        debug!(event = "ovh.request", method = %method, url = %url);

        let response = self
            .http
            .request(method, &url)
            .header(ACCEPT, "application/json")
            .header("X-Ovh-Application", &self.credentials.application_key)
            .header("X-Ovh-Consumer", &self.credentials.consumer_key)
            .header("X-Ovh-Timestamp", timestamp.to_string())
            .header("X-Ovh-Signature", signature)
            .send()
            .await
            .map_err(|err| ApiError::transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ApiError::transport(err.to_string()))?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(api_error(status.as_u16(), &body))
        }
    }

    /// Current time on the API server, derived from a cached clock delta.
    async fn server_timestamp(&self) -> Result<i64, ApiError> {
        let delta = *self
            .time_delta
            .get_or_try_init(|| self.fetch_time_delta())
            .await?;
        Ok(local_timestamp()?.saturating_add(delta))
    }

    async fn fetch_time_delta(&self) -> Result<i64, ApiError> {
        let url = format!("{}/auth/time", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| ApiError::transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ApiError::transport(err.to_string()))?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }
        let server_time: i64 = body
            .trim()
            .parse()
            .map_err(|err| ApiError::decode(format!("/auth/time: {err}")))?;
        Ok(server_time.saturating_sub(local_timestamp()?))
    }
}

fn local_timestamp() -> Result<i64, ApiError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| ApiError::transport(format!("system clock error: {err}")))?;
    i64::try_from(elapsed.as_secs())
        .map_err(|err| ApiError::transport(format!("system clock error: {err}")))
}

/// Converts a non-success response into an [`ApiError`], preferring the OVH
/// `message` field over the raw body.
fn api_error(status: u16, body: &str) -> ApiError {
    let message = serde_json::from_str::<OvhErrorBody>(body)
        .map_or_else(|_| body.trim().to_owned(), |parsed| parsed.message);
    ApiError::http(status, message)
}
