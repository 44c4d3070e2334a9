use std::time::Duration;

use serde::Deserialize;

/// How the ingestion step obtains provider samples.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IngestionMode {
    /// Only the real provider; exhausting the endpoints is an error.
    #[default]
    Live,
    /// Never call the provider; generate plausible samples instead.
    Synthetic,
    /// Try the provider first and generate samples if every endpoint fails.
    LiveWithSyntheticFallback,
}

impl IngestionMode {
    pub fn allows_synthetic(&self) -> bool {
        !matches!(self, IngestionMode::Live)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderSettings {
    /// Candidate base URLs, tried in order.
    pub endpoints: Vec<String>,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub ingestion_mode: IngestionMode,
    #[serde(default = "default_sync_days")]
    pub default_sync_days: i64,
    /// Longest window a historical sync may request.
    #[serde(default = "default_max_sync_days")]
    pub max_sync_days: i64,
}

fn default_attempt_timeout_secs() -> u64 {
    5
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_sync_days() -> i64 {
    7
}

fn default_max_sync_days() -> i64 {
    366
}

impl ProviderSettings {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
