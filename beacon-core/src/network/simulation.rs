//! Simulation network layer for deterministic testing

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use super::{HitRequest, HttpResponse, NetworkLayer};
use crate::tracker::DispatchMode;
use crate::transport::TransportError;

/// A request observed by [`SimulationNetworkLayer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub mode: DispatchMode,
    pub url: Url,
    pub user_agent: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Returns the hit payload: the body for POST, the URL query for GET.
    pub fn payload(&self) -> String {
        match self.mode {
            DispatchMode::Post => String::from_utf8_lossy(&self.body).into_owned(),
            DispatchMode::Get => self.url.query().unwrap_or_default().to_string(),
        }
    }
}

/// Simulated network layer for testing
///
/// Records every request and answers with a canned status instead of
/// touching the network. Useful for testing, dry runs, and development.
pub struct SimulationNetworkLayer {
    latency: Duration,
    status_code: u16,
    failure: Option<TransportError>,
    recorded: Mutex<Vec<RecordedRequest>>,
}

impl SimulationNetworkLayer {
    /// Creates new simulation network layer that answers every request with 200
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            status_code: 200,
            failure: None,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Configure a delay applied before every response
    pub fn configure_latency(&mut self, latency: Duration) {
        self.latency = latency;
    }

    /// Configure the HTTP status returned for every request
    pub fn configure_status(&mut self, status_code: u16) {
        self.status_code = status_code;
    }

    /// Make every request fail with `error` instead of returning a response
    pub fn configure_failure(&mut self, error: TransportError) {
        self.failure = Some(error);
    }

    /// Returns a copy of every request seen so far, in arrival order.
    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().clone()
    }

    /// Returns the number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.recorded.lock().len()
    }

    async fn respond(
        &self,
        mode: DispatchMode,
        request: &HitRequest,
        body: &[u8],
    ) -> Result<HttpResponse, TransportError> {
        self.recorded.lock().push(RecordedRequest {
            mode,
            url: request.url.clone(),
            user_agent: request.user_agent.clone(),
            content_type: request.content_type.map(str::to_string),
            body: body.to_vec(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(error) = &self.failure {
            tracing::debug!("Simulation: failing {} request to {}", mode, request.target());
            return Err(error.clone());
        }

        tracing::debug!(
            "Simulation: answering {} request to {} with {}",
            mode,
            request.target(),
            self.status_code
        );
        Ok(HttpResponse::new(self.status_code, Vec::new()))
    }
}

impl Default for SimulationNetworkLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkLayer for SimulationNetworkLayer {
    async fn http_get(&self, request: &HitRequest) -> Result<HttpResponse, TransportError> {
        self.respond(DispatchMode::Get, request, &[]).await
    }

    async fn http_post(
        &self,
        request: &HitRequest,
        body: &[u8],
    ) -> Result<HttpResponse, TransportError> {
        self.respond(DispatchMode::Post, request, body).await
    }

    fn name(&self) -> &'static str {
        "simulation"
    }
}

#[cfg(test)]
mod simulation_tests {
    use super::*;

    fn collect_request(query: Option<&str>) -> HitRequest {
        let mut url = Url::parse("http://collector.test/collect").unwrap();
        url.set_query(query);
        HitRequest::new(url, "beacon/test")
    }

    #[tokio::test]
    async fn test_records_get_and_post_requests() {
        let layer = SimulationNetworkLayer::new();

        let response = layer
            .http_get(&collect_request(Some("v=1&t=pageview")))
            .await
            .unwrap();
        assert_eq!(response.status_code, 200);

        let post = collect_request(None).with_content_type("application/x-www-form-urlencoded");
        layer.http_post(&post, b"v=1&t=event").await.unwrap();

        let recorded = layer.recorded_requests();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].mode, DispatchMode::Get);
        assert_eq!(recorded[0].payload(), "v=1&t=pageview");
        assert_eq!(recorded[1].mode, DispatchMode::Post);
        assert_eq!(recorded[1].payload(), "v=1&t=event");
        assert_eq!(
            recorded[1].content_type.as_deref(),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[tokio::test]
    async fn test_configured_failure_is_returned() {
        let mut layer = SimulationNetworkLayer::new();
        layer.configure_failure(TransportError::ConnectionFailed {
            url: "http://collector.test/collect".to_string(),
        });

        let result = layer.http_get(&collect_request(None)).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed { .. })));
        assert_eq!(layer.request_count(), 1);
    }

    #[tokio::test]
    async fn test_configured_status_is_returned() {
        let mut layer = SimulationNetworkLayer::new();
        layer.configure_status(503);

        let response = layer.http_get(&collect_request(None)).await.unwrap();
        assert_eq!(response.status_code, 503);
        assert!(!response.is_success());
    }
}
