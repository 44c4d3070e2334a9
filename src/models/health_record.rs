use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Kind of body-composition or activity metric a record carries.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Weight,
    Bodyfat,
    Bmi,
    Muscle,
    Water,
    Bone,
    VisceralFat,
    BasalMetabolism,
    HeartRate,
    Steps,
    Sleep,
    Activity,
}

impl MetricType {
    pub const ALL: [MetricType; 12] = [
        MetricType::Weight,
        MetricType::Bodyfat,
        MetricType::Bmi,
        MetricType::Muscle,
        MetricType::Water,
        MetricType::Bone,
        MetricType::VisceralFat,
        MetricType::BasalMetabolism,
        MetricType::HeartRate,
        MetricType::Steps,
        MetricType::Sleep,
        MetricType::Activity,
    ];

    /// Metrics a body-composition scale provider can deliver.
    pub const PROVIDER_SUPPLIED: [MetricType; 8] = [
        MetricType::Weight,
        MetricType::Bodyfat,
        MetricType::Bmi,
        MetricType::Muscle,
        MetricType::Water,
        MetricType::Bone,
        MetricType::VisceralFat,
        MetricType::BasalMetabolism,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Weight => "weight",
            MetricType::Bodyfat => "bodyfat",
            MetricType::Bmi => "bmi",
            MetricType::Muscle => "muscle",
            MetricType::Water => "water",
            MetricType::Bone => "bone",
            MetricType::VisceralFat => "visceral_fat",
            MetricType::BasalMetabolism => "basal_metabolism",
            MetricType::HeartRate => "heart_rate",
            MetricType::Steps => "steps",
            MetricType::Sleep => "sleep",
            MetricType::Activity => "activity",
        }
    }
}

impl Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricType::ALL
            .iter()
            .find(|metric| metric.as_str() == s)
            .copied()
            .ok_or_else(|| format!("{} is not a supported metric type", s))
    }
}

/// Largest magnitude a stored value may have. Statistics over values in
/// this range cannot overflow.
pub const MAX_ABS_VALUE: f64 = 1e9;

/// Whether `value` can be stored as a measurement.
pub fn check_value(value: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err("value must be a finite number".to_string());
    }
    if value.abs() > MAX_ABS_VALUE {
        return Err(format!("value must be within ±{:e}", MAX_ABS_VALUE));
    }
    Ok(())
}

/// Provenance of a record.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RecordSource {
    ExternalProvider,
    #[default]
    Manual,
    Other,
}

impl RecordSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSource::ExternalProvider => "external-provider",
            RecordSource::Manual => "manual",
            RecordSource::Other => "other",
        }
    }
}

impl Display for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecordSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "external-provider" => Ok(RecordSource::ExternalProvider),
            "manual" => Ok(RecordSource::Manual),
            "other" => Ok(RecordSource::Other),
            other => Err(format!("{} is not a supported record source", other)),
        }
    }
}

/// Annotation attached to a record, tagged by where it came from.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordMetadata {
    /// Raw sample as the provider returned it, minus the value and timestamp.
    ProviderPayload { payload: Map<String, Value> },
    /// Free-text note typed in by the user.
    UserNote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    /// Measuring device description.
    DeviceInfo {
        device: String,
        #[serde(default)]
        synthetic: bool,
    },
}

impl RecordMetadata {
    pub fn empty_for(source: RecordSource) -> Self {
        match source {
            RecordSource::ExternalProvider => RecordMetadata::ProviderPayload { payload: Map::new() },
            RecordSource::Manual | RecordSource::Other => RecordMetadata::UserNote { note: None },
        }
    }

    /// Merge `incoming` into `self`. Keys present in `incoming` win; a
    /// different variant replaces the current annotation entirely.
    pub fn merge(self, incoming: RecordMetadata) -> RecordMetadata {
        match (self, incoming) {
            (
                RecordMetadata::ProviderPayload { mut payload },
                RecordMetadata::ProviderPayload { payload: newer },
            ) => {
                payload.extend(newer);
                RecordMetadata::ProviderPayload { payload }
            }
            (RecordMetadata::UserNote { note }, RecordMetadata::UserNote { note: newer }) => {
                RecordMetadata::UserNote { note: newer.or(note) }
            }
            (_, incoming) => incoming,
        }
    }
}

/// Dedup key: no two stored records may share it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub owner_id: Uuid,
    pub metric_type: MetricType,
    pub timestamp: DateTime<Utc>,
    pub source: RecordSource,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub source: RecordSource,
    pub metric_type: MetricType,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub metadata: RecordMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HealthRecord {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            owner_id: self.owner_id,
            metric_type: self.metric_type,
            timestamp: self.timestamp,
            source: self.source,
        }
    }
}

/// A record that has not been reconciled against the store yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHealthRecord {
    pub owner_id: Uuid,
    pub source: RecordSource,
    pub metric_type: MetricType,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub metadata: RecordMetadata,
}

impl NewHealthRecord {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            owner_id: self.owner_id,
            metric_type: self.metric_type,
            timestamp: self.timestamp,
            source: self.source,
        }
    }
}

/// Body of the add-or-update endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRecordRequest {
    pub metric_type: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<RecordSource>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListRecordsQuery {
    #[serde(default)]
    pub metric_type: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: Option<RecordSource>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRecordsRequest {
    #[serde(default)]
    pub metric_type: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: Option<RecordSource>,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestRecordQuery {
    pub metric_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRecordResponse {
    pub created: bool,
    pub record: HealthRecord,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRecordsResponse {
    pub deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metric_type_round_trips_through_its_wire_name() {
        for metric in MetricType::ALL {
            assert_eq!(metric.as_str().parse::<MetricType>().unwrap(), metric);
        }
        assert!("protein".parse::<MetricType>().is_err());
    }

    #[test]
    fn provider_payload_merge_prefers_new_keys() {
        let current = RecordMetadata::ProviderPayload {
            payload: json!({"device": "scale-1", "impedance": 480}).as_object().unwrap().clone(),
        };
        let incoming = RecordMetadata::ProviderPayload {
            payload: json!({"impedance": 500, "battery": 80}).as_object().unwrap().clone(),
        };

        let merged = current.merge(incoming);
        let RecordMetadata::ProviderPayload { payload } = merged else {
            panic!("expected provider payload");
        };
        assert_eq!(payload["device"], "scale-1");
        assert_eq!(payload["impedance"], 500);
        assert_eq!(payload["battery"], 80);
    }

    #[test]
    fn user_note_merge_keeps_old_note_when_none_supplied() {
        let current = RecordMetadata::UserNote { note: Some("after run".into()) };
        let merged = current.merge(RecordMetadata::UserNote { note: None });
        assert_eq!(merged, RecordMetadata::UserNote { note: Some("after run".into()) });
    }

    #[test]
    fn metadata_is_tagged_on_the_wire() {
        let metadata = RecordMetadata::DeviceInfo { device: "Mi Scale 2".into(), synthetic: true };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["kind"], "device_info");
        assert_eq!(value["device"], "Mi Scale 2");
    }

    #[test]
    fn values_outside_the_storable_range_are_rejected() {
        assert!(check_value(72.5).is_ok());
        assert!(check_value(-MAX_ABS_VALUE).is_ok());
        assert!(check_value(1e308).is_err());
        assert!(check_value(f64::NAN).is_err());
    }

    #[test]
    fn source_uses_kebab_case() {
        let value = serde_json::to_value(RecordSource::ExternalProvider).unwrap();
        assert_eq!(value, "external-provider");
    }
}
