use chrono::{Duration, NaiveTime, TimeZone, Utc};
use rand::Rng;

use crate::models::health_record::MetricType;
use crate::models::sync::SyncWindow;

pub const SYNTHETIC_DEVICE: &str = "synthetic-body-scale";

const DAY_SKIP_PROBABILITY: f64 = 0.3;
const TYPE_SKIP_PROBABILITY: f64 = 0.1;
/// Trend reaches at most one variance, noise at most half of one.
pub const VARIANCE_BOUND: f64 = 1.5;
/// Slack for rounding to one decimal.
pub const ROUNDING_SLACK: f64 = 0.05;

/// Center and spread of generated values for one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub base: f64,
    pub variance: f64,
}

impl Baseline {
    pub fn contains(&self, value: f64) -> bool {
        (value - self.base).abs() <= self.variance * VARIANCE_BOUND + ROUNDING_SLACK
    }
}

pub fn baseline(metric_type: MetricType) -> Baseline {
    let (base, variance) = match metric_type {
        MetricType::Weight => (70.0, 2.0),
        MetricType::Bodyfat => (20.0, 3.0),
        MetricType::Bmi => (23.0, 1.0),
        MetricType::Muscle => (35.0, 1.5),
        MetricType::Water => (55.0, 2.0),
        MetricType::Bone => (3.2, 0.2),
        MetricType::VisceralFat => (10.0, 1.0),
        MetricType::BasalMetabolism => (1600.0, 100.0),
        MetricType::HeartRate => (70.0, 8.0),
        MetricType::Steps => (8000.0, 2000.0),
        MetricType::Sleep => (7.5, 1.0),
        MetricType::Activity => (45.0, 15.0),
    };
    Baseline { base, variance }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSample {
    pub metric_type: MetricType,
    pub value: f64,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Plausible provider-like samples for development and tests.
///
/// The random source is injected; tests pass a seeded `StdRng`.
pub struct SyntheticGenerator<R: Rng> {
    rng: R,
}

impl<R: Rng> SyntheticGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// One sample per day and metric, with random gaps. The first and last
    /// day of the window are never skipped as a whole.
    pub fn generate(&mut self, metric_types: &[MetricType], window: SyncWindow) -> Vec<SyntheticSample> {
        let days = window.days().max(0);
        // One trend direction per metric for the whole window.
        let directions: Vec<f64> = metric_types
            .iter()
            .map(|_| if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 })
            .collect();

        let mut samples = Vec::new();
        for day in 0..days {
            let skippable = day > 0 && day < days - 1;
            if skippable && self.rng.gen_bool(DAY_SKIP_PROBABILITY) {
                continue;
            }
            let date = window.start + Duration::days(day);

            for (metric_type, direction) in metric_types.iter().zip(&directions) {
                if self.rng.gen_bool(TYPE_SKIP_PROBABILITY) {
                    continue;
                }
                let Baseline { base, variance } = baseline(*metric_type);
                let trend = (day as f64 / days as f64) * direction * variance;
                let noise = (self.rng.gen::<f64>() - 0.5) * variance;
                let value = ((base + trend + noise) * 10.0).round() / 10.0;

                let hour = self.rng.gen_range(7..19);
                let minute = self.rng.gen_range(0..60);
                let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();

                samples.push(SyntheticSample {
                    metric_type: *metric_type,
                    value,
                    timestamp: Utc.from_utc_datetime(&date.and_time(time)),
                });
            }
        }

        samples
    }
}
