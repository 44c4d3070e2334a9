use std::collections::HashMap;

use crate::analytics::aggregator::{summarize, RecordWindow};
use crate::models::health_record::{HealthRecord, MetricType};
use crate::models::insight::{Insight, InsightKind, InsightStats, InsightsResponse, TimelineEntry};

/// Population standard deviation threshold above which weight is "fluctuating".
pub const WEIGHT_VOLATILITY_THRESHOLD: f64 = 1.0;
/// Volatility is only judged on windows with at least this many samples.
pub const VOLATILITY_MIN_SAMPLES: usize = 5;

/// Outcome of running the generator over a window.
#[derive(Debug, Clone, PartialEq)]
pub enum InsightOutcome {
    /// No records in the window; nothing can be said.
    InsufficientData,
    /// The window was evaluated; the list may legitimately be empty.
    Insights(Vec<Insight>),
}

/// Slice of one metric's records, oldest first.
pub struct MetricSeries<'a> {
    pub metric_type: MetricType,
    pub records: &'a [HealthRecord],
}

impl MetricSeries<'_> {
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(|record| record.value)
    }

    /// Newest minus oldest value.
    pub fn change(&self) -> f64 {
        match (self.records.first(), self.records.last()) {
            (Some(oldest), Some(newest)) => newest.value - oldest.value,
            _ => 0.0,
        }
    }

    pub fn population_std_dev(&self) -> f64 {
        let count = self.records.len();
        if count == 0 {
            return 0.0;
        }
        let mean = self.values().sum::<f64>() / count as f64;
        let variance = self.values().map(|value| (value - mean).powi(2)).sum::<f64>() / count as f64;
        variance.sqrt()
    }
}

pub trait InsightRule: Send + Sync {
    fn evaluate(&self, series: &MetricSeries<'_>) -> Option<Insight>;
}

/// Reports the direction of the newest-minus-oldest change.
pub struct ChangeDirectionRule {
    pub label: &'static str,
    pub unit: &'static str,
}

impl InsightRule for ChangeDirectionRule {
    fn evaluate(&self, series: &MetricSeries<'_>) -> Option<Insight> {
        let change = series.change();
        if change > 0.0 {
            Some(Insight::new(
                InsightKind::Negative,
                format!("{} increasing", capitalize(self.label)),
                format!(
                    "Your {} went up by {:.1} {} over the selected period. Consider adjusting your diet and adding more exercise.",
                    self.label, change, self.unit
                ),
            ))
        } else if change < 0.0 {
            Some(Insight::new(
                InsightKind::Positive,
                format!("{} decreasing", capitalize(self.label)),
                format!(
                    "Your {} went down by {:.1} {} over the selected period. Keep up the healthy routine!",
                    self.label,
                    change.abs(),
                    self.unit
                ),
            ))
        } else {
            None
        }
    }
}

/// Flags windows whose spread exceeds `threshold`, praises stable ones.
pub struct VolatilityRule {
    pub label: &'static str,
    pub threshold: f64,
    pub min_samples: usize,
}

impl InsightRule for VolatilityRule {
    fn evaluate(&self, series: &MetricSeries<'_>) -> Option<Insight> {
        if series.records.len() < self.min_samples {
            return None;
        }
        if series.population_std_dev() > self.threshold {
            Some(Insight::new(
                InsightKind::Warning,
                format!("{} fluctuating", capitalize(self.label)),
                format!(
                    "Your {} varies considerably. A more regular routine and eating pattern should help.",
                    self.label
                ),
            ))
        } else {
            Some(Insight::new(
                InsightKind::Positive,
                format!("{} stable", capitalize(self.label)),
                format!("Your {} is holding steady, a sign of good health management.", self.label),
            ))
        }
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rule set looked up by metric type. Metrics without rules evaluate to an
/// empty insight list.
pub struct InsightGenerator {
    rules: HashMap<MetricType, Vec<Box<dyn InsightRule>>>,
}

impl InsightGenerator {
    pub fn empty() -> Self {
        Self { rules: HashMap::new() }
    }

    pub fn with_rule(mut self, metric_type: MetricType, rule: impl InsightRule + 'static) -> Self {
        self.rules.entry(metric_type).or_default().push(Box::new(rule));
        self
    }

    pub fn has_rules_for(&self, metric_type: MetricType) -> bool {
        self.rules.get(&metric_type).is_some_and(|rules| !rules.is_empty())
    }

    /// Evaluate the rules of `metric_type` over `records` (oldest first).
    pub fn generate(&self, metric_type: MetricType, records: &[HealthRecord]) -> InsightOutcome {
        if records.is_empty() {
            return InsightOutcome::InsufficientData;
        }

        let series = MetricSeries { metric_type, records };
        let insights = self
            .rules
            .get(&metric_type)
            .map(|rules| rules.iter().filter_map(|rule| rule.evaluate(&series)).collect())
            .unwrap_or_default();

        InsightOutcome::Insights(insights)
    }
}

impl Default for InsightGenerator {
    fn default() -> Self {
        InsightGenerator::empty()
            .with_rule(
                MetricType::Weight,
                ChangeDirectionRule { label: "weight", unit: "kg" },
            )
            .with_rule(
                MetricType::Weight,
                VolatilityRule {
                    label: "weight",
                    threshold: WEIGHT_VOLATILITY_THRESHOLD,
                    min_samples: VOLATILITY_MIN_SAMPLES,
                },
            )
    }
}

/// Timeline, summary and insights of a single-metric window.
/// Returns `None` when the window holds no records.
pub fn report(generator: &InsightGenerator, metric_type: MetricType, window: RecordWindow) -> Option<InsightsResponse> {
    let insights = match generator.generate(metric_type, &window.records) {
        InsightOutcome::InsufficientData => return None,
        InsightOutcome::Insights(insights) => insights,
    };

    let values: Vec<f64> = window.records.iter().map(|record| record.value).collect();
    let summary = summarize(&values)?;
    let max_date = window.records.iter().find(|record| record.value == summary.max)?.timestamp;
    let min_date = window.records.iter().find(|record| record.value == summary.min)?.timestamp;
    let timeline = window
        .records
        .iter()
        .map(|record| TimelineEntry {
            date: record.timestamp,
            value: record.value,
        })
        .collect();

    let change = summary.change;
    let current = window.records.into_iter().last()?;
    Some(InsightsResponse {
        period: window.period,
        metric_type,
        timeline,
        current,
        change,
        stats: InsightStats {
            summary,
            max_date,
            min_date,
        },
        insights,
    })
}
