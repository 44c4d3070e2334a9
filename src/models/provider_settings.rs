use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::health_record::MetricType;

/// Types synced when neither the request nor the saved settings name any.
pub const DEFAULT_SYNC_TYPES: [MetricType; 3] = [MetricType::Weight, MetricType::Bodyfat, MetricType::Bmi];

/// How often an external scheduler should trigger a sync. Stored only; this
/// service never schedules.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncFrequency {
    Hourly,
    #[default]
    Daily,
    Weekly,
}

impl SyncFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncFrequency::Hourly => "hourly",
            SyncFrequency::Daily => "daily",
            SyncFrequency::Weekly => "weekly",
        }
    }
}

impl std::str::FromStr for SyncFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(SyncFrequency::Hourly),
            "daily" => Ok(SyncFrequency::Daily),
            "weekly" => Ok(SyncFrequency::Weekly),
            other => Err(format!("{} is not a supported sync frequency", other)),
        }
    }
}

/// Saved provider preferences of one owner.
#[derive(Debug, Clone)]
pub struct ProviderPreferences {
    pub owner_id: Uuid,
    pub credential: Option<SecretString>,
    pub auto_sync: bool,
    pub sync_frequency: SyncFrequency,
    pub metric_types: Vec<MetricType>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderPreferences {
    pub fn defaults_for(owner_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            credential: None,
            auto_sync: false,
            sync_frequency: SyncFrequency::Daily,
            metric_types: DEFAULT_SYNC_TYPES.to_vec(),
            updated_at: now,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential
            .as_ref()
            .map_or(false, |credential| !credential.expose_secret().trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveProviderSettingsRequest {
    /// Omitted keeps the saved credential.
    #[serde(default)]
    pub credential: Option<SecretString>,
    #[serde(default)]
    pub auto_sync: bool,
    #[serde(default)]
    pub sync_frequency: SyncFrequency,
    /// Omitted keeps the saved types.
    #[serde(default)]
    pub metric_types: Option<Vec<String>>,
}

/// Settings as shown to the owner. The credential itself is never echoed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettingsResponse {
    pub has_credential: bool,
    pub auto_sync: bool,
    pub sync_frequency: SyncFrequency,
    pub metric_types: Vec<MetricType>,
    pub last_sync: Option<DateTime<Utc>>,
}

impl ProviderSettingsResponse {
    pub fn new(preferences: &ProviderPreferences, last_sync: Option<DateTime<Utc>>) -> Self {
        Self {
            has_credential: preferences.has_credential(),
            auto_sync: preferences.auto_sync,
            sync_frequency: preferences.sync_frequency,
            metric_types: preferences.metric_types.clone(),
            last_sync,
        }
    }
}
