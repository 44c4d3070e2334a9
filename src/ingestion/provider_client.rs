use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::models::health_record::MetricType;
use crate::models::sync::{ProviderProfile, RawSample, RawSamplePage, SyncWindow};

/// Why a single provider call failed.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not decode provider response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(Duration::ZERO)
        } else if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// Calls into the external health data provider, one endpoint at a time.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn fetch_profile(&self, endpoint: &str, credential: &SecretString) -> Result<ProviderProfile, ProviderError>;

    async fn fetch_samples(
        &self,
        endpoint: &str,
        credential: &SecretString,
        metric_type: MetricType,
        window: SyncWindow,
    ) -> Result<Vec<RawSample>, ProviderError>;
}

pub struct HttpProviderClient {
    client: Client,
    fetch_timeout: Duration,
}

impl HttpProviderClient {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            fetch_timeout,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        credential: &SecretString,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(credential.expose_secret())
            .query(query)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| match ProviderError::from(e) {
                ProviderError::Timeout(_) => ProviderError::Timeout(self.fetch_timeout),
                other => other,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Provider returned error {} for {}: {}", status, url, body);
            return Err(ProviderError::Status { status, body });
        }

        response.json::<T>().await.map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    #[tracing::instrument(name = "Fetch provider profile", skip(self, credential))]
    async fn fetch_profile(&self, endpoint: &str, credential: &SecretString) -> Result<ProviderProfile, ProviderError> {
        let url = format!("{}/user/profile", endpoint.trim_end_matches('/'));
        self.get_json(&url, credential, &[]).await
    }

    #[tracing::instrument(
        name = "Fetch provider samples",
        skip(self, credential),
        fields(metric_type = %metric_type, start = %window.start, end = %window.end)
    )]
    async fn fetch_samples(
        &self,
        endpoint: &str,
        credential: &SecretString,
        metric_type: MetricType,
        window: SyncWindow,
    ) -> Result<Vec<RawSample>, ProviderError> {
        let url = format!("{}/data/{}", endpoint.trim_end_matches('/'), metric_type);
        let query = [
            ("from", window.start.format("%Y-%m-%d").to_string()),
            ("to", window.end.format("%Y-%m-%d").to_string()),
        ];
        let page: RawSamplePage = self.get_json(&url, credential, &query).await?;
        tracing::debug!("Provider returned {} {} samples", page.data.len(), metric_type);
        Ok(page.data)
    }
}
