/// Forwarding handler: performs the inner request against its real target.
///
/// The production counterpart of the filter handlers used in tests. An
/// allowlist gates which hosts the gateway will reach out to; an empty
/// allowlist permits any target.
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Request, Response};

use crate::error::{GatewayError, Result};
use crate::handlers::http::HttpHandler;
use crate::metrics::MetricsEvent;

pub struct ForwardingHttpHandler {
    client: reqwest::Client,
    allowed_hosts: HashSet<String>,
}

impl ForwardingHttpHandler {
    pub fn new(allowed_hosts: impl IntoIterator<Item = String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            allowed_hosts: allowed_hosts.into_iter().collect(),
        }
    }

    /// Convenience for wiring into a [`crate::handlers::http::BinaryHttpHandler`].
    pub fn shared(allowed_hosts: impl IntoIterator<Item = String>) -> Arc<dyn HttpHandler> {
        Arc::new(Self::new(allowed_hosts))
    }

    fn is_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.is_empty() || self.allowed_hosts.contains(host)
    }
}

#[async_trait]
impl HttpHandler for ForwardingHttpHandler {
    async fn handle(
        &self,
        request: Request<Vec<u8>>,
        _event: &mut MetricsEvent,
    ) -> Result<Response<Vec<u8>>> {
        let host = request
            .uri()
            .host()
            .ok_or_else(|| GatewayError::MalformedMessage("inner request has no host".to_string()))?;
        if !self.is_allowed(host) {
            return Err(GatewayError::TargetForbidden);
        }

        let (parts, body) = request.into_parts();
        tracing::debug!(method = %parts.method, uri = %parts.uri, "forwarding inner request");

        let upstream = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await
            .map_err(|e| GatewayError::Application(e.to_string()))?;

        let status = upstream.status();
        let headers = upstream.headers().clone();
        let body = upstream
            .bytes()
            .await
            .map_err(|e| GatewayError::Application(e.to_string()))?;

        let mut response = Response::builder()
            .status(status)
            .body(body.to_vec())
            .map_err(|e| GatewayError::Application(e.to_string()))?;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricsFactory, RecordingMetricsFactory};

    #[test]
    fn test_allowlist() {
        let open = ForwardingHttpHandler::new(Vec::new());
        assert!(open.is_allowed("anything.example"));

        let gated = ForwardingHttpHandler::new(vec!["allowed.example".to_string()]);
        assert!(gated.is_allowed("allowed.example"));
        assert!(!gated.is_allowed("forbidden.example"));
    }

    #[tokio::test]
    async fn test_disallowed_host_is_forbidden_without_io() {
        let handler = ForwardingHttpHandler::new(vec!["allowed.example".to_string()]);
        let factory = RecordingMetricsFactory::new();
        let mut event = factory.create("gateway_request");

        let request = Request::builder()
            .method("GET")
            .uri("http://forbidden.example/")
            .body(Vec::new())
            .unwrap();

        let result = handler.handle(request, &mut event).await;
        assert!(matches!(result, Err(GatewayError::TargetForbidden)));
        assert!(!event.is_fired());
    }

    #[tokio::test]
    async fn test_missing_host_is_malformed() {
        let handler = ForwardingHttpHandler::new(Vec::new());
        let factory = RecordingMetricsFactory::new();
        let mut event = factory.create("gateway_request");

        let request = Request::builder()
            .method("GET")
            .uri("/relative")
            .body(Vec::new())
            .unwrap();

        let result = handler.handle(request, &mut event).await;
        assert!(matches!(result, Err(GatewayError::MalformedMessage(_))));
    }
}
