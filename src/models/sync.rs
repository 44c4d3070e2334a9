use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::health_record::{MetricType, RecordSource};

/// Per-owner, per-source bookkeeping of the last successful sync.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    pub owner_id: Uuid,
    pub source: RecordSource,
    pub last_sync: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Falls back to the credential saved in the provider settings.
    #[serde(default)]
    pub credential: Option<SecretString>,
    /// Falls back to the saved types, then to weight, bodyfat and bmi.
    #[serde(default)]
    pub metric_types: Option<Vec<String>>,
    #[serde(default)]
    pub historical: bool,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct TestConnectionRequest {
    #[serde(default)]
    pub credential: Option<SecretString>,
}

/// Inclusive calendar-day range requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SyncWindow {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub total_records: usize,
    pub new_records: usize,
    pub synced_types: Vec<MetricType>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailedMetric {
    pub metric_type: String,
    pub reason: String,
}

/// Newly written samples sharing one measurement instant.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupedSample {
    pub measure_time: DateTime<Utc>,
    pub data: BTreeMap<MetricType, f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub synthetic: bool,
    pub stats: SyncStats,
    pub failed_types: Vec<FailedMetric>,
    pub data: Vec<GroupedSample>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    #[serde(default = "unknown")]
    pub user_id: String,
    #[serde(default = "unknown")]
    pub nickname: String,
}

fn unknown() -> String {
    "unknown".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
    pub endpoint: Option<String>,
    pub user_data: ProviderProfile,
    pub available_data_types: Vec<MetricType>,
}

/// One sample as the provider delivers it. Providers send the instant as
/// `measureTime`, `timestamp` or both; `measureTime` wins.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RawSample {
    pub value: f64,
    #[serde(default, rename = "measureTime")]
    pub measure_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawSample {
    pub fn new(value: f64, measured_at: DateTime<Utc>, extra: Map<String, Value>) -> Self {
        Self {
            value,
            measure_time: Some(measured_at),
            timestamp: None,
            extra,
        }
    }

    /// Measurement instant, `None` when the provider sent neither field.
    pub fn measured_at(&self) -> Option<DateTime<Utc>> {
        self.measure_time.or(self.timestamp)
    }
}

#[derive(Debug, Deserialize)]
pub struct RawSamplePage {
    #[serde(default)]
    pub data: Vec<RawSample>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatusResponse {
    pub source: RecordSource,
    pub last_sync: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn measure_time_wins_when_both_instants_are_sent() {
        let sample: RawSample = serde_json::from_value(json!({
            "value": 80.1,
            "measureTime": "2024-04-07T07:00:00Z",
            "timestamp": "2024-04-07T09:30:00Z",
            "deviceId": "scale-1"
        }))
        .unwrap();

        assert_eq!(sample.measured_at(), Some(Utc.with_ymd_and_hms(2024, 4, 7, 7, 0, 0).unwrap()));
        assert_eq!(sample.extra.get("deviceId"), Some(&json!("scale-1")));
        assert!(!sample.extra.contains_key("timestamp"));
    }

    #[test]
    fn either_instant_field_is_accepted_alone() {
        let legacy: RawSample =
            serde_json::from_value(json!({ "value": 80.1, "timestamp": "2024-04-07T09:30:00Z" })).unwrap();
        assert_eq!(legacy.measured_at(), Some(Utc.with_ymd_and_hms(2024, 4, 7, 9, 30, 0).unwrap()));

        let missing: RawSample = serde_json::from_value(json!({ "value": 80.1 })).unwrap();
        assert_eq!(missing.measured_at(), None);
    }

    #[test]
    fn sync_request_may_omit_credential_and_types() {
        let request: SyncRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.credential.is_none());
        assert!(request.metric_types.is_none());
        assert!(!request.historical);
    }
}
