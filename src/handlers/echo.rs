/// Diagnostic handler: returns the plaintext untouched.
///
/// Exists to exercise the crypto pipeline end to end without an application
/// behind the gateway.
use async_trait::async_trait;

use crate::error::Result;
use crate::handlers::AppHandler;
use crate::metrics::{MetricsEvent, MetricsResult};

pub struct EchoAppHandler;

#[async_trait]
impl AppHandler for EchoAppHandler {
    async fn handle(&self, plaintext: Vec<u8>, event: &mut MetricsEvent) -> Result<Vec<u8>> {
        event.fire(MetricsResult::Success);
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricsFactory, RecordingMetricsFactory};

    #[tokio::test]
    async fn test_echo_is_byte_identical_and_fires_success() {
        let factory = RecordingMetricsFactory::new();
        let mut event = factory.create("gateway_request");

        let out = EchoAppHandler
            .handle(vec![0xCA, 0xFE], &mut event)
            .await
            .unwrap();

        assert_eq!(out, vec![0xCA, 0xFE]);
        assert_eq!(factory.events()[0].result, Some(MetricsResult::Success));
    }
}
