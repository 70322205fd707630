/// Application handlers behind the encapsulation.
///
/// An [`EncapsulationHandler`] pairs the gateway core with one application
/// handler and the media labels its clients encapsulate under. The front
/// door owns a map from endpoint path to encapsulation handler.
pub mod echo;
pub mod forward;
pub mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::bhttp::BinaryResponse;
use crate::error::Result;
use crate::metrics::MetricsEvent;
use crate::ohttp::gateway::{Gateway, MediaLabels};

/// An application handler: plaintext in, plaintext out.
///
/// Receives the unfired request event; a handler that recognises the outcome
/// fires it, otherwise the caller records success.
#[async_trait]
pub trait AppHandler: Send + Sync {
    async fn handle(&self, plaintext: Vec<u8>, event: &mut MetricsEvent) -> Result<Vec<u8>>;
}

/// Decapsulates a request, runs the application handler, seals the response.
pub struct EncapsulationHandler {
    labels: MediaLabels,
    gateway: Arc<Gateway>,
    app: Arc<dyn AppHandler>,
}

impl EncapsulationHandler {
    pub fn new(labels: MediaLabels, gateway: Arc<Gateway>, app: Arc<dyn AppHandler>) -> Self {
        Self {
            labels,
            gateway,
            app,
        }
    }

    /// Process one encapsulated request body.
    ///
    /// Decapsulation errors propagate to the caller; once decapsulation has
    /// succeeded, application failures ride inside the sealed channel as an
    /// inner 500 so the relay cannot tell them from successes.
    pub async fn handle(&self, body: &[u8], event: &mut MetricsEvent) -> Result<Vec<u8>> {
        let (plaintext, ctx) = self.gateway.decapsulate(&self.labels, body)?;

        let response = match self.app.handle(plaintext, event).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "application handler failed");
                BinaryResponse::with_status(500).encode()?
            }
        };

        self.gateway.encapsulate_response(ctx, &response)
    }
}
