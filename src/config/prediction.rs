use serde::Deserialize;

/// Constants of the linear weight projection. These are tuning values for a
/// transparent heuristic, not fitted parameters.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PredictionSettings {
    /// kg per day at full intensity on both dials.
    pub base_rate: f64,
    pub diet_weight: f64,
    pub exercise_weight: f64,
    /// Upper bound of both intensity dials; the lower bound is 1.
    pub max_intensity: u8,
    /// Daily rates above this are classified as low feasibility.
    pub low_feasibility_rate: f64,
    /// Daily rates below this are classified as high feasibility.
    pub high_feasibility_rate: f64,
    /// A midpoint milestone is emitted only for horizons longer than this.
    pub midpoint_min_days: i64,
    /// Approximate number of timeline samples before the final point.
    pub timeline_points: i64,
    /// Longest projection accepted, in days.
    pub max_horizon_days: i64,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            base_rate: 0.1,
            diet_weight: 0.7,
            exercise_weight: 0.4,
            max_intensity: 3,
            low_feasibility_rate: 0.3,
            high_feasibility_rate: 0.1,
            midpoint_min_days: 14,
            timeline_points: 10,
            max_horizon_days: 3650,
        }
    }
}
