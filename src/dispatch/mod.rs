//! Dispatch of completed batches to the external conversion function.
//!
//! One invocation per batch, fire-and-forget: the conversion function
//! downloads the batch's files and converts them to columnar form on its
//! own time. The dispatcher only guarantees the invocation was accepted.

mod client;

pub use client::mock::MockInvokeClient;
pub use client::{HttpInvokeClient, InvokeClient};

use serde_json::Value;
use snafu::prelude::*;
use std::sync::Arc;
use tracing::info;

use crate::batch::Batch;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, PayloadSerializeSnafu};

/// Dispatches batches to the configured conversion function.
pub struct Dispatcher {
    function_url: Option<String>,
    client: Arc<dyn InvokeClient>,
}

impl Dispatcher {
    pub fn new(config: &DispatchConfig, client: Arc<dyn InvokeClient>) -> Self {
        Self {
            function_url: config.function_url.clone(),
            client,
        }
    }

    /// Invoke the conversion function for one completed batch.
    ///
    /// Fails with [`DispatchError::MissingFunctionUrl`] when no endpoint is
    /// configured; that error is permanent and must not be retried. An
    /// [`DispatchError::Invocation`] failure is left to the caller's retry
    /// policy.
    pub async fn dispatch(&self, batch: &Batch) -> Result<(), DispatchError> {
        let url = self
            .function_url
            .as_deref()
            .ok_or(DispatchError::MissingFunctionUrl)?;

        let body: Value =
            serde_json::to_value(batch.payload()).context(PayloadSerializeSnafu)?;

        info!(
            feed_type = %batch.feed_type(),
            files = batch.len(),
            mb = batch.total_bytes() as f64 / 1_000_000.0,
            "invoking conversion function"
        );

        self.client
            .invoke(url, batch.feed_type().as_str(), &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedType;

    fn small_batch() -> Batch {
        let mut batch = Batch::new(FeedType::RtAlerts);
        batch.add_file("incoming/a.json.gz", 10);
        batch.add_file("incoming/b.json.gz", 20);
        batch
    }

    #[tokio::test]
    async fn test_missing_function_url_is_permanent() {
        let dispatcher = Dispatcher::new(
            &DispatchConfig::default(),
            Arc::new(MockInvokeClient::default()),
        );

        let err = dispatcher.dispatch(&small_batch()).await.unwrap_err();
        assert!(matches!(err, DispatchError::MissingFunctionUrl));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_dispatch_sends_compressed_payload() {
        let client = Arc::new(MockInvokeClient::default());
        let config = DispatchConfig {
            function_url: Some("https://converter/invoke".to_string()),
            timeout_secs: 5,
        };
        let dispatcher = Dispatcher::new(&config, client.clone());

        dispatcher.dispatch(&small_batch()).await.unwrap();

        let invocations = client.invocations.lock().unwrap();
        assert_eq!(invocations.len(), 1);
        let (feed_type, body) = &invocations[0];
        assert_eq!(feed_type, "rt_alerts");
        assert_eq!(body["prefix"], "incoming/");
        assert_eq!(body["suffix"], ".json.gz");
        assert_eq!(body["bodies"], serde_json::json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_invocation_failure_is_retryable() {
        let client = Arc::new(MockInvokeClient::failing(1));
        let config = DispatchConfig {
            function_url: Some("https://converter/invoke".to_string()),
            timeout_secs: 5,
        };
        let dispatcher = Dispatcher::new(&config, client);

        let err = dispatcher.dispatch(&small_batch()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Invocation { .. }));
        assert!(err.is_retryable());
    }
}
