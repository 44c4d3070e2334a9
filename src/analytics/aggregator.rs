use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::record_store::{RecordQuery, RecordStore, SortOrder, StoreError};
use crate::models::health_record::{HealthRecord, MetricType};
use crate::models::stats::{ChangePercent, MetricStats, StatsPayload, StatsPeriod, StatsResponse};

/// Records of one owner inside a period, oldest first.
#[derive(Debug, Clone)]
pub struct RecordWindow {
    pub period: StatsPeriod,
    pub start: Option<DateTime<Utc>>,
    pub end: DateTime<Utc>,
    pub records: Vec<HealthRecord>,
}

/// Load the time-ordered slice used by both the aggregator and the insight
/// generator.
#[tracing::instrument(
    name = "Load record window",
    skip(store),
    fields(owner_id = %owner_id, metric_type = ?metric_type, period = %period)
)]
pub async fn load_window(
    store: &dyn RecordStore,
    owner_id: Uuid,
    metric_type: Option<MetricType>,
    period: StatsPeriod,
    now: DateTime<Utc>,
) -> Result<RecordWindow, StoreError> {
    let start = period.start_from(now);
    let query = RecordQuery::for_owner(owner_id)
        .metric(metric_type)
        .between(start, Some(now))
        .order(SortOrder::Ascending);
    let records = store.query(&query).await?;

    tracing::debug!("Loaded {} records into the window", records.len());
    Ok(RecordWindow {
        period,
        start,
        end: now,
        records,
    })
}

/// Summary statistics of a series ordered by timestamp ascending.
/// Returns `None` for an empty series.
///
/// Every field is finite for finite input: the mean divides before summing
/// and `change` saturates at `±f64::MAX`.
pub fn summarize(values: &[f64]) -> Option<MetricStats> {
    let first = *values.first()?;
    let last = *values.last()?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let count = values.len() as f64;
    let avg = values.iter().map(|value| value / count).sum::<f64>();

    Some(MetricStats {
        count: values.len(),
        min,
        max,
        avg,
        first,
        last,
        change: (last - first).clamp(f64::MIN, f64::MAX),
        change_percent: ChangePercent::between(first, last),
    })
}

fn values_of<'a>(records: impl IntoIterator<Item = &'a HealthRecord>) -> Vec<f64> {
    records.into_iter().map(|record| record.value).collect()
}

/// Statistic block for a window: a single block when `metric_type` is given,
/// one block per metric present otherwise.
pub fn aggregate(records: &[HealthRecord], metric_type: Option<MetricType>) -> StatsPayload {
    match metric_type {
        Some(metric) => {
            let values = values_of(records.iter().filter(|record| record.metric_type == metric));
            summarize(&values).map_or(StatsPayload::Empty, StatsPayload::Single)
        }
        None => {
            let mut grouped: BTreeMap<MetricType, Vec<f64>> = BTreeMap::new();
            for record in records {
                grouped.entry(record.metric_type).or_default().push(record.value);
            }
            if grouped.is_empty() {
                return StatsPayload::Empty;
            }
            let per_metric = grouped
                .into_iter()
                .filter_map(|(metric, values)| summarize(&values).map(|stats| (metric, stats)))
                .collect();
            StatsPayload::PerMetric(per_metric)
        }
    }
}

pub async fn compute_stats(
    store: &dyn RecordStore,
    owner_id: Uuid,
    metric_type: Option<MetricType>,
    period: StatsPeriod,
    now: DateTime<Utc>,
) -> Result<StatsResponse, StoreError> {
    let window = load_window(store, owner_id, metric_type, period, now).await?;
    let stats = aggregate(&window.records, metric_type);

    Ok(StatsResponse {
        period,
        start_date: window.start,
        end_date: window.end,
        stats,
    })
}
