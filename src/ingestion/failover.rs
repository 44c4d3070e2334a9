use std::future::Future;
use std::time::Duration;

use crate::config::provider::ProviderSettings;
use crate::ingestion::provider_client::ProviderError;

/// One failed endpoint attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedAttempt {
    pub endpoint: String,
    pub reason: String,
}

/// Every endpoint in the list was tried and none answered.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("no provider endpoint answered ({} attempts)", attempts.len())]
pub struct Unreachable {
    pub attempts: Vec<FailedAttempt>,
}

impl Unreachable {
    pub fn endpoints(&self) -> Vec<String> {
        self.attempts.iter().map(|attempt| attempt.endpoint.clone()).collect()
    }
}

/// Ordered endpoint list with a bounded timeout per attempt.
///
/// Endpoints are tried strictly in order, each exactly once. The first one
/// whose check succeeds wins; nothing is retried after the list runs out.
#[derive(Debug, Clone)]
pub struct FailoverPolicy {
    endpoints: Vec<String>,
    attempt_timeout: Duration,
}

impl FailoverPolicy {
    pub fn new(endpoints: Vec<String>, attempt_timeout: Duration) -> Self {
        Self {
            endpoints,
            attempt_timeout,
        }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(settings.endpoints.clone(), settings.attempt_timeout())
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Run `check` against each endpoint until one succeeds.
    ///
    /// A check that outlives the attempt timeout is dropped, which cancels
    /// the underlying request.
    pub async fn first_responsive<T, F, Fut>(&self, mut check: F) -> Result<(String, T), Unreachable>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempts = Vec::with_capacity(self.endpoints.len());

        for endpoint in &self.endpoints {
            tracing::debug!("Trying provider endpoint {}", endpoint);
            let outcome = match tokio::time::timeout(self.attempt_timeout, check(endpoint.clone())).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.attempt_timeout)),
            };

            match outcome {
                Ok(value) => {
                    tracing::info!("Provider endpoint {} answered", endpoint);
                    return Ok((endpoint.clone(), value));
                }
                Err(e) => {
                    tracing::warn!("Provider endpoint {} failed: {}", endpoint, e);
                    attempts.push(FailedAttempt {
                        endpoint: endpoint.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(Unreachable { attempts })
    }
}
