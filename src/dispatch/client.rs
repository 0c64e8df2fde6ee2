//! Invocation client abstraction for the conversion function.
//!
//! The dispatcher talks to the external conversion function through the
//! `InvokeClient` trait, so batch handling stays testable without making
//! real network calls.

use async_trait::async_trait;
use serde_json::Value;
use snafu::prelude::*;
use std::time::Duration;

use crate::error::{DispatchError, InvocationSnafu};

/// Trait for invoking the external conversion function.
#[async_trait]
pub trait InvokeClient: Send + Sync {
    /// Fire an asynchronous invocation carrying the given JSON body.
    ///
    /// Returns once the invocation is accepted; never waits for the
    /// downstream conversion to complete.
    async fn invoke(
        &self,
        url: &str,
        feed_type: &str,
        body: &Value,
    ) -> Result<(), DispatchError>;
}

/// Production invoke client using reqwest.
#[derive(Clone)]
pub struct HttpInvokeClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpInvokeClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl InvokeClient for HttpInvokeClient {
    async fn invoke(
        &self,
        url: &str,
        feed_type: &str,
        body: &Value,
    ) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .context(InvocationSnafu { feed_type })?;

        response
            .error_for_status()
            .context(InvocationSnafu { feed_type })?;

        Ok(())
    }
}

pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Recording invoke client for tests.
    ///
    /// Captures every payload; optionally fails a configured number of
    /// leading invocations.
    #[derive(Default)]
    pub struct MockInvokeClient {
        pub invocations: Mutex<Vec<(String, Value)>>,
        pub failures_remaining: Mutex<u32>,
    }

    impl MockInvokeClient {
        pub fn failing(count: u32) -> Self {
            Self {
                invocations: Mutex::new(Vec::new()),
                failures_remaining: Mutex::new(count),
            }
        }
    }

    #[async_trait]
    impl InvokeClient for MockInvokeClient {
        async fn invoke(
            &self,
            _url: &str,
            feed_type: &str,
            body: &Value,
        ) -> Result<(), DispatchError> {
            let should_fail = {
                let mut remaining = self.failures_remaining.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    true
                } else {
                    false
                }
            };
            if should_fail {
                // A refused connection is the closest stand-in for a
                // transient invocation failure.
                let err = reqwest::Client::new()
                    .get("http://127.0.0.1:1")
                    .send()
                    .await
                    .unwrap_err();
                return Err(DispatchError::Invocation {
                    feed_type: feed_type.to_string(),
                    source: err,
                });
            }
            self.invocations
                .lock()
                .unwrap()
                .push((feed_type.to_string(), body.clone()));
            Ok(())
        }
    }
}
