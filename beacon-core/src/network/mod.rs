//! Network abstraction layer for production and simulation environments
//!
//! Provides a unified async trait for the HTTP requests a [`Dispatcher`]
//! performs, enabling both real network operations and deterministic
//! simulation with the same dispatch logic.
//!
//! [`Dispatcher`]: crate::transport::Dispatcher

pub mod simulation;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
pub use simulation::{RecordedRequest, SimulationNetworkLayer};
use url::Url;

use crate::config::NetworkConfig;
use crate::transport::TransportError;

/// Outgoing hit request metadata.
#[derive(Debug, Clone)]
pub struct HitRequest {
    /// Target URL, including the query string for GET hits
    pub url: Url,
    /// Value of the `User-Agent` header
    pub user_agent: String,
    /// Value of the `Content-Type` header, if any
    pub content_type: Option<&'static str>,
}

impl HitRequest {
    /// Creates request metadata without a content type.
    pub fn new(url: Url, user_agent: impl Into<String>) -> Self {
        Self {
            url,
            user_agent: user_agent.into(),
            content_type: None,
        }
    }

    /// Sets the `Content-Type` header value.
    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Returns the target URL without its query string.
    ///
    /// GET hits can carry kilobytes of parameters in the URL, so logs and
    /// errors refer to the bare target instead.
    pub fn target(&self) -> String {
        let mut target = self.url.clone();
        target.set_query(None);
        target.into()
    }
}

/// HTTP response abstraction
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status_code: u16,
    /// Response body bytes
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create new HTTP response with status code and body
    pub fn new(status_code: u16, body: Vec<u8>) -> Self {
        Self { status_code, body }
    }

    /// Returns true if the HTTP status code indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Network layer abstraction for HTTP operations
///
/// Enables both production HTTP clients and simulation environments
/// to sit behind the same dispatcher.
#[async_trait]
pub trait NetworkLayer: Send + Sync + 'static {
    /// Performs HTTP GET request
    ///
    /// # Errors
    ///
    /// - `TransportError::Timeout` - If the request exceeded the configured timeout
    /// - `TransportError::ConnectionFailed` - If the collector could not be reached
    /// - `TransportError::Request` - If the request could not be built or sent
    async fn http_get(&self, request: &HitRequest) -> Result<HttpResponse, TransportError>;

    /// Performs HTTP POST request
    ///
    /// # Errors
    ///
    /// Same as [`NetworkLayer::http_get`].
    async fn http_post(
        &self,
        request: &HitRequest,
        body: &[u8],
    ) -> Result<HttpResponse, TransportError>;

    /// Short name for log output
    fn name(&self) -> &'static str;
}

/// Production HTTP client using reqwest
pub struct ProductionNetworkLayer {
    client: reqwest::Client,
    timeout: Duration,
}

impl ProductionNetworkLayer {
    /// Creates a network layer with timeout and redirect policy from `config`.
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            client: Self::build_client(config),
            timeout: config.request_timeout,
        }
    }

    /// Returns current timeout setting
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build_client(config: &NetworkConfig) -> reqwest::Client {
        match reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Failed to build configured HTTP client, using defaults: {}", e);
                reqwest::Client::new()
            }
        }
    }

    async fn read_response(
        target: &str,
        response: reqwest::Response,
    ) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(target, e))?
            .to_vec();

        Ok(HttpResponse::new(status, body))
    }
}

impl Default for ProductionNetworkLayer {
    fn default() -> Self {
        Self::new(&NetworkConfig::default())
    }
}

#[async_trait]
impl NetworkLayer for ProductionNetworkLayer {
    async fn http_get(&self, request: &HitRequest) -> Result<HttpResponse, TransportError> {
        let target = request.target();
        let response = self
            .client
            .get(request.url.clone())
            .header(USER_AGENT, request.user_agent.as_str())
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&target, e))?;

        Self::read_response(&target, response).await
    }

    async fn http_post(
        &self,
        request: &HitRequest,
        body: &[u8],
    ) -> Result<HttpResponse, TransportError> {
        let target = request.target();
        let mut builder = self
            .client
            .post(request.url.clone())
            .header(USER_AGENT, request.user_agent.as_str());
        if let Some(content_type) = request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }

        let response = builder
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&target, e))?;

        Self::read_response(&target, response).await
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
mod network_tests {
    use super::*;

    #[test]
    fn test_hit_request_target_strips_query() {
        let url = Url::parse("http://collector.test/collect?v=1&tid=UA-1-1").unwrap();
        let request = HitRequest::new(url, "beacon/test");
        assert_eq!(request.target(), "http://collector.test/collect");
        assert_eq!(request.content_type, None);
    }

    #[test]
    fn test_http_response_success_range() {
        assert!(HttpResponse::new(200, Vec::new()).is_success());
        assert!(HttpResponse::new(204, Vec::new()).is_success());
        assert!(!HttpResponse::new(302, Vec::new()).is_success());
        assert!(!HttpResponse::new(500, Vec::new()).is_success());
    }

    #[test]
    fn test_production_layer_uses_configured_timeout() {
        let config = NetworkConfig {
            request_timeout: Duration::from_secs(3),
            ..NetworkConfig::default()
        };
        let layer = ProductionNetworkLayer::new(&config);
        assert_eq!(layer.timeout(), Duration::from_secs(3));
        assert_eq!(layer.name(), "reqwest");
    }
}
