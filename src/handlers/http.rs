/// Binary-HTTP application handler.
///
/// Decodes the plaintext as the inner request schema, rebuilds a
/// conventional HTTP request, and hands it to a user-supplied
/// [`HttpHandler`]. The outcome is encoded back into the inner response
/// schema; a forbidden target becomes an inner 403 and any other handler
/// failure an inner 500. The outer HTTP status never reflects any of this.
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, Request, Response, Uri};

use crate::bhttp::{BinaryRequest, BinaryResponse};
use crate::error::{GatewayError, Result};
use crate::handlers::AppHandler;
use crate::metrics::{MetricsEvent, MetricsResult};

/// A user-supplied handler for the reconstructed inner request.
#[async_trait]
pub trait HttpHandler: Send + Sync {
    async fn handle(
        &self,
        request: Request<Vec<u8>>,
        event: &mut MetricsEvent,
    ) -> Result<Response<Vec<u8>>>;
}

pub struct BinaryHttpHandler {
    inner: Arc<dyn HttpHandler>,
}

impl BinaryHttpHandler {
    pub fn new(inner: Arc<dyn HttpHandler>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl AppHandler for BinaryHttpHandler {
    async fn handle(&self, plaintext: Vec<u8>, event: &mut MetricsEvent) -> Result<Vec<u8>> {
        let request = to_http_request(BinaryRequest::decode(&plaintext)?)?;

        let response = match self.inner.handle(request, event).await {
            Ok(response) => from_http_response(response),
            Err(GatewayError::TargetForbidden) => {
                if !event.is_fired() {
                    event.fire(MetricsResult::TargetRequestForbidden);
                }
                BinaryResponse::with_status(403)
            }
            Err(err) => {
                tracing::warn!(error = %err, "inner http handler failed");
                BinaryResponse::with_status(500)
            }
        };

        response.encode()
    }
}

fn to_http_request(decoded: BinaryRequest) -> Result<Request<Vec<u8>>> {
    let malformed =
        |what: &str| GatewayError::MalformedMessage(format!("invalid inner request {what}"));

    let path = if decoded.path.is_empty() {
        "/"
    } else {
        decoded.path.as_str()
    };
    let uri = Uri::builder()
        .scheme(decoded.scheme.as_str())
        .authority(decoded.host.as_str())
        .path_and_query(path)
        .build()
        .map_err(|_| malformed("uri"))?;
    let method =
        Method::from_bytes(decoded.method.as_bytes()).map_err(|_| malformed("method"))?;

    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in &decoded.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(decoded.body).map_err(|_| malformed("headers"))
}

fn from_http_response(response: Response<Vec<u8>>) -> BinaryResponse {
    let (parts, body) = response.into_parts();
    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    BinaryResponse {
        status: parts.status.as_u16(),
        headers,
        body,
    }
}
