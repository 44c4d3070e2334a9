use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PredictionMode {
    /// Project the weight reached on a given date.
    TargetDate,
    /// Project the date a given weight is reached.
    TargetWeight,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub diet_intensity: u8,
    pub exercise_intensity: u8,
    pub mode: PredictionMode,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub target_weight: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Feasibility {
    High,
    Medium,
    Low,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    Start,
    Midpoint,
    End,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub weight: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Milestone {
    pub kind: MilestoneKind,
    pub date: NaiveDate,
    pub weight: f64,
    pub title: String,
}

/// What a projection was computed from. Only the dials and the latest
/// recorded weight feed the model; the history is not fitted.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionBasis {
    pub model: String,
    pub latest_weight_at: DateTime<Utc>,
    pub diet_intensity: u8,
    pub exercise_intensity: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub mode: PredictionMode,
    pub start_weight: f64,
    pub target_weight: f64,
    pub target_date: NaiveDate,
    pub days_required: i64,
    pub daily_rate: f64,
    pub timeline: Vec<TimelinePoint>,
    pub milestones: Vec<Milestone>,
    pub feasibility: Feasibility,
    pub analysis: String,
    pub basis: PredictionBasis,
}
