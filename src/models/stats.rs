use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::models::health_record::MetricType;

/// Named lookback window for statistics and insights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsPeriod {
    SevenDays,
    #[default]
    ThirtyDays,
    NinetyDays,
    OneYear,
    All,
}

impl StatsPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsPeriod::SevenDays => "7d",
            StatsPeriod::ThirtyDays => "30d",
            StatsPeriod::NinetyDays => "90d",
            StatsPeriod::OneYear => "1y",
            StatsPeriod::All => "all",
        }
    }

    pub fn lookback(&self) -> Option<Duration> {
        match self {
            StatsPeriod::SevenDays => Some(Duration::days(7)),
            StatsPeriod::ThirtyDays => Some(Duration::days(30)),
            StatsPeriod::NinetyDays => Some(Duration::days(90)),
            StatsPeriod::OneYear => Some(Duration::days(365)),
            StatsPeriod::All => None,
        }
    }

    /// Start of the window relative to `now`; `None` means unbounded.
    pub fn start_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.lookback().map(|lookback| now - lookback)
    }
}

impl Display for StatsPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StatsPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(StatsPeriod::SevenDays),
            "30d" => Ok(StatsPeriod::ThirtyDays),
            "90d" => Ok(StatsPeriod::NinetyDays),
            "1y" => Ok(StatsPeriod::OneYear),
            "all" => Ok(StatsPeriod::All),
            other => Err(format!(
                "{} is not a supported period. Use one of 7d, 30d, 90d, 1y, all.",
                other
            )),
        }
    }
}

impl Serialize for StatsPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Relative change against the first value of the window.
///
/// A zero baseline has no defined percentage; it is reported as the string
/// `"undefined"` so that it can never be mistaken for a real `0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangePercent {
    Defined(f64),
    Undefined,
}

impl ChangePercent {
    pub fn between(first: f64, last: f64) -> Self {
        if first == 0.0 {
            return ChangePercent::Undefined;
        }
        let percent = ((last - first) / first * 10_000.0).round() / 100.0;
        if percent.is_finite() {
            ChangePercent::Defined(percent)
        } else {
            ChangePercent::Undefined
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            ChangePercent::Defined(percent) => Some(*percent),
            ChangePercent::Undefined => None,
        }
    }
}

impl Serialize for ChangePercent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChangePercent::Defined(percent) => serializer.serialize_f64(*percent),
            ChangePercent::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub first: f64,
    pub last: f64,
    pub change: f64,
    pub change_percent: ChangePercent,
}

/// Statistic block of a stats response.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsPayload {
    Empty,
    Single(MetricStats),
    PerMetric(BTreeMap<MetricType, MetricStats>),
}

impl StatsPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            StatsPayload::Empty => true,
            StatsPayload::Single(_) => false,
            StatsPayload::PerMetric(per_metric) => per_metric.is_empty(),
        }
    }
}

impl Serialize for StatsPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StatsPayload::Empty => serializer.serialize_map(Some(0))?.end(),
            StatsPayload::Single(stats) => stats.serialize(serializer),
            StatsPayload::PerMetric(per_metric) => {
                let mut map = serializer.serialize_map(Some(per_metric.len()))?;
                for (metric, stats) in per_metric {
                    map.serialize_entry(metric.as_str(), stats)?;
                }
                map.end()
            }
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    #[serde(default)]
    pub metric_type: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub period: StatsPeriod,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: DateTime<Utc>,
    pub stats: StatsPayload,
}
