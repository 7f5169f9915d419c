// src/client/api.rs
use crate::config::ApiConfig;
use crate::health::ApiResponse;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// HTTP client with a bounded per-call deadline and a uniform JSON
/// envelope. Retry policy is deliberately not here; callers that want
/// retries wrap calls in a [`crate::client::RetryStrategy`].
pub struct ApiClient {
    base_url: String,
    timeout: Duration,
    http: Client,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Invalid response body: {0}")]
    Parse(String),
}

impl ApiError {
    /// Originating HTTP status code, when the failure got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Self {
        let mut base_url = config.base_url.to_string();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self {
            base_url,
            timeout: config.timeout(),
            http: Client::new(),
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.execute(Method::GET, endpoint, None, options).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.execute(Method::POST, endpoint, body, options).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.execute(Method::PUT, endpoint, body, options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.execute(Method::DELETE, endpoint, None, options).await
    }

    /// Exactly one `/` between base and endpoint, whatever the caller passed.
    fn build_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        let url = self.build_url(endpoint);
        let deadline = options.timeout.unwrap_or(self.timeout);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(%method, %url, ?deadline, "issuing request");

        // The deadline cancels the in-flight request by dropping it.
        let response = match timeout(deadline, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ApiError::Transport(e.to_string())),
            Err(_) => return Err(ApiError::Timeout(deadline)),
        };

        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<ApiResponse<T>, ApiError> {
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("application/json"))
            .unwrap_or(false);

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if is_json {
            if !status.is_success() {
                return Err(Self::status_error(status, Some(&text)));
            }
            serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
        } else {
            if !status.is_success() {
                return Err(Self::status_error(status, None));
            }
            // Non-JSON success bodies are wrapped as raw text; this only
            // deserializes when T accepts a JSON string.
            let data = serde_json::from_value(serde_json::Value::String(text))
                .map_err(|e| ApiError::Parse(e.to_string()))?;
            Ok(ApiResponse::ok(data))
        }
    }

    /// Prefer the server's own `message` field; fall back to the canonical
    /// reason phrase.
    fn status_error(status: StatusCode, json_body: Option<&str>) -> ApiError {
        let server_message = json_body
            .and_then(|text| serde_json::from_str::<serde_json::Value>(text).ok())
            .and_then(|value| value.get("message").and_then(|m| m.as_str().map(String::from)));

        let message = server_message
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());

        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with_base(base: &str) -> ApiClient {
        let config = ApiConfig {
            base_url: base.parse().unwrap(),
            timeout_ms: 10_000,
            retries: 0,
            retry_delay_ms: 10,
            retry_max_delay_ms: 100,
        };
        ApiClient::new(&config)
    }

    #[test]
    fn build_url_single_slash() {
        let client = client_with_base("http://x/api");
        assert_eq!(client.build_url("/health"), "http://x/api/health");
        assert_eq!(client.build_url("health"), "http://x/api/health");

        let client = client_with_base("http://x/api/");
        assert_eq!(client.build_url("/health"), "http://x/api/health");
        assert_eq!(client.build_url("health"), "http://x/api/health");
    }

    #[test]
    fn status_error_prefers_server_message() {
        let err = ApiClient::status_error(
            StatusCode::BAD_REQUEST,
            Some(r#"{"success":false,"message":"bad input"}"#),
        );
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.to_string(), "HTTP 400: bad input");
    }

    #[test]
    fn status_error_falls_back_to_reason_phrase() {
        let err = ApiClient::status_error(StatusCode::SERVICE_UNAVAILABLE, None);
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
    }
}
