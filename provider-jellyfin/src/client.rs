//! Jellyfin API client
//!
//! [`JellyfinClient`] holds the server session and the shared request path:
//! authorization header, JSON decoding and retry with exponential backoff.
//! The collaborator trait impls live in sibling modules.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use core_async::time::{sleep, Duration};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{JellyfinError, Result};

/// Timeout for API calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity the client presents in the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub client: String,
    pub device_name: String,
    pub device_id: String,
    pub version: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            client: "Media Client".to_string(),
            device_name: "Desktop".to_string(),
            device_id: "media-client-desktop".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// An authenticated server session.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerSession {
    pub base_url: String,
    pub user_id: String,
    pub access_token: String,
    pub device: DeviceInfo,
}

impl ServerSession {
    pub fn new(
        base_url: impl Into<String>,
        user_id: impl Into<String>,
        access_token: impl Into<String>,
        device: DeviceInfo,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            user_id: user_id.into(),
            access_token: access_token.into(),
            device,
        }
    }
}

impl fmt::Debug for ServerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSession")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("device", &self.device)
            .finish()
    }
}

/// Jellyfin API client
///
/// Implements `MediaCatalog`, `ProgressSink` and `TrickplaySource`, so one
/// `Arc<JellyfinClient>` can fill all three collaborator slots.
pub struct JellyfinClient {
    http_client: Arc<dyn HttpClient>,
    session: ServerSession,
    retry: RetryPolicy,
}

impl JellyfinClient {
    pub fn new(http_client: Arc<dyn HttpClient>, session: ServerSession) -> Self {
        Self {
            http_client,
            session,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy for API calls.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn session(&self) -> &ServerSession {
        &self.session
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.session.base_url
    }

    pub(crate) fn user_id(&self) -> &str {
        &self.session.user_id
    }

    pub(crate) fn access_token(&self) -> &str {
        &self.session.access_token
    }

    pub(crate) fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.session.base_url, path_and_query)
    }

    /// `Authorization` header value in the MediaBrowser scheme.
    fn authorization(&self) -> String {
        let device = &self.session.device;
        format!(
            "MediaBrowser Client=\"{}\", Device=\"{}\", DeviceId=\"{}\", Version=\"{}\", Token=\"{}\"",
            device.client, device.device_name, device.device_id, device.version, self.session.access_token
        )
    }

    pub(crate) fn request(&self, method: HttpMethod, path_and_query: &str) -> HttpRequest {
        HttpRequest::new(method, self.url(path_and_query))
            .header("Authorization", self.authorization())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    /// Execute `request`, retrying rate limits, server errors and transient
    /// transport failures with exponential backoff.
    ///
    /// 404 maps to [`JellyfinError::NotFound`] so callers can treat absence
    /// as data.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub(crate) async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.http_client.execute(request.clone()).await {
                Ok(response) if response.is_success() => {
                    debug!("API request succeeded: status={}", response.status);
                    return Ok(response);
                }
                Ok(response) if RetryPolicy::should_retry_status(response.status) => {
                    if attempt >= max_attempts {
                        warn!(
                            "API request failed after {} attempts: status={}",
                            attempt, response.status
                        );
                        return Err(JellyfinError::ApiError {
                            status_code: response.status,
                            message: format!("Request failed after {} attempts", attempt),
                        });
                    }
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        "API request failed (attempt {}/{}): status={}, retrying in {}ms",
                        attempt,
                        max_attempts,
                        response.status,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                }
                Ok(response) => return Err(status_error(&request, response)),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        "API request failed (attempt {}/{}): {}, retrying in {}ms",
                        attempt,
                        max_attempts,
                        e,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    warn!("API request failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let response = self
            .send(self.request(HttpMethod::Get, path_and_query))
            .await?;
        serde_json::from_slice(&response.body).map_err(|e| {
            JellyfinError::ParseError(format!("{}: {}", path_and_query, e))
        })
    }

    pub(crate) async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let request = self.request(HttpMethod::Post, path).json(body)?;
        self.send(request).await?;
        Ok(())
    }
}

fn status_error(request: &HttpRequest, response: HttpResponse) -> JellyfinError {
    match response.status {
        401 | 403 => {
            warn!("Access token rejected: status={}", response.status);
            JellyfinError::Unauthorized {
                status_code: response.status,
            }
        }
        404 => JellyfinError::NotFound {
            resource: request.url.clone(),
        },
        status => {
            warn!("API request failed: status={}", status);
            JellyfinError::ApiError {
                status_code: status,
                message: String::from_utf8_lossy(&response.body)
                    .chars()
                    .take(200)
                    .collect(),
            }
        }
    }
}

/// Append `key=value` pairs to a path, URL-encoding the values.
pub(crate) fn with_query(path: &str, params: &[(&str, Option<String>)]) -> String {
    let query: Vec<String> = params
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .map(|value| format!("{}={}", key, urlencoding::encode(value)))
        })
        .collect();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query.join("&"))
    }
}
