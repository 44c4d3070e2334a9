use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::health_record::{HealthRecord, MetricType};
use crate::models::stats::{MetricStats, StatsPeriod};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Positive,
    Negative,
    Warning,
}

/// Advisory statement derived from a window of records. Never persisted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Insight {
    pub kind: InsightKind,
    pub title: String,
    pub message: String,
}

impl Insight {
    pub fn new(kind: InsightKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InsightsQuery {
    #[serde(default)]
    pub metric_type: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub date: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InsightStats {
    #[serde(flatten)]
    pub summary: MetricStats,
    pub max_date: DateTime<Utc>,
    pub min_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsResponse {
    pub period: StatsPeriod,
    pub metric_type: MetricType,
    pub timeline: Vec<TimelineEntry>,
    pub current: HealthRecord,
    pub change: f64,
    pub stats: InsightStats,
    pub insights: Vec<Insight>,
}
