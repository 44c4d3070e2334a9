use chrono::{Duration, NaiveDate};

use crate::config::prediction::PredictionSettings;
use crate::errors::AppError;
use crate::models::health_record::HealthRecord;
use crate::models::prediction::{
    Feasibility, Milestone, MilestoneKind, PredictionBasis, PredictionMode, PredictionRequest, PredictionResult,
    TimelinePoint,
};

pub const MODEL_NAME: &str = "linear-intensity";

/// Absorbs float noise in `diff / rate` before rounding up to whole days.
const DAY_EPSILON: f64 = 1e-9;

/// Start and end of a projection before it is sampled into a timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub start_weight: f64,
    pub target_weight: f64,
    pub days: i64,
    pub daily_rate: f64,
}

impl Projection {
    /// Projected weight `day` days after today.
    pub fn weight_on(&self, day: i64) -> f64 {
        if day >= self.days {
            return self.target_weight;
        }
        let direction = if self.target_weight > self.start_weight { 1.0 } else { -1.0 };
        self.start_weight + direction * self.daily_rate * day as f64
    }
}

/// Linear weight projection driven by two intensity dials.
///
/// The projection only uses the dials and the most recent recorded weight;
/// it does not look at the user's history.
#[derive(Debug, Clone, Default)]
pub struct PredictionEngine {
    settings: PredictionSettings,
}

impl PredictionEngine {
    pub fn new(settings: PredictionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PredictionSettings {
        &self.settings
    }

    fn validate_horizon(&self, days: i64) -> Result<(), AppError> {
        if days > self.settings.max_horizon_days {
            return Err(AppError::validation(format!(
                "target is unreachable within {} days at the chosen intensity",
                self.settings.max_horizon_days
            )));
        }
        Ok(())
    }

    fn validate_intensity(&self, name: &str, intensity: u8) -> Result<(), AppError> {
        if intensity == 0 || intensity > self.settings.max_intensity {
            return Err(AppError::validation(format!(
                "{} must be between 1 and {}, got {}",
                name, self.settings.max_intensity, intensity
            )));
        }
        Ok(())
    }

    /// `base_rate × (diet/max × diet_weight + exercise/max × exercise_weight)`
    pub fn daily_rate(&self, diet_intensity: u8, exercise_intensity: u8) -> Result<f64, AppError> {
        self.validate_intensity("dietIntensity", diet_intensity)?;
        self.validate_intensity("exerciseIntensity", exercise_intensity)?;

        let max = f64::from(self.settings.max_intensity);
        let diet = f64::from(diet_intensity) / max * self.settings.diet_weight;
        let exercise = f64::from(exercise_intensity) / max * self.settings.exercise_weight;
        Ok(self.settings.base_rate * (diet + exercise))
    }

    pub fn classify(&self, daily_rate: f64) -> (Feasibility, &'static str) {
        if daily_rate > self.settings.low_feasibility_rate {
            (
                Feasibility::Low,
                "This goal may be too aggressive. A healthy pace is usually 0.5-1 kg per week; consider a later date or a milder target.",
            )
        } else if daily_rate < self.settings.high_feasibility_rate {
            (
                Feasibility::High,
                "This goal is very reasonable and reachable with balanced eating and moderate exercise.",
            )
        } else {
            (
                Feasibility::Medium,
                "This goal is moderately challenging; it is reachable with a consistent diet plan and regular exercise.",
            )
        }
    }

    /// Checks that need no stored data: dial range and the mode's target.
    pub fn validate_request(&self, request: &PredictionRequest, today: NaiveDate) -> Result<(), AppError> {
        self.daily_rate(request.diet_intensity, request.exercise_intensity)?;
        match request.mode {
            PredictionMode::TargetDate => match request.target_date {
                Some(date) if date > today => self.validate_horizon((date - today).num_days()),
                Some(_) => Err(AppError::validation("targetDate must be in the future")),
                None => Err(AppError::validation("targetDate is required in target-date mode")),
            },
            PredictionMode::TargetWeight => match request.target_weight {
                Some(weight) if weight.is_finite() && weight > 0.0 => Ok(()),
                Some(_) => Err(AppError::validation("targetWeight must be a positive number")),
                None => Err(AppError::validation("targetWeight is required in target-weight mode")),
            },
        }
    }

    /// Weight reached on `target_date` when losing `daily_rate` per day.
    pub fn project_to_date(
        &self,
        current_weight: f64,
        daily_rate: f64,
        today: NaiveDate,
        target_date: NaiveDate,
    ) -> Result<Projection, AppError> {
        let days = (target_date - today).num_days();
        if days <= 0 {
            return Err(AppError::validation("targetDate must be in the future"));
        }
        self.validate_horizon(days)?;
        let target_weight = current_weight - daily_rate * days as f64;
        if target_weight <= 0.0 {
            return Err(AppError::validation("targetDate is too far ahead: the projected weight is not positive"));
        }
        Ok(Projection {
            start_weight: current_weight,
            target_weight,
            days,
            daily_rate,
        })
    }

    /// Days needed to move from `current_weight` to `target_weight`.
    pub fn project_to_weight(
        &self,
        current_weight: f64,
        daily_rate: f64,
        target_weight: f64,
    ) -> Result<Projection, AppError> {
        if !target_weight.is_finite() || target_weight <= 0.0 {
            return Err(AppError::validation("targetWeight must be a positive number"));
        }
        let difference = (current_weight - target_weight).abs();
        if difference == 0.0 {
            return Err(AppError::validation("targetWeight equals the current weight"));
        }
        if daily_rate <= 0.0 {
            return Err(AppError::validation("intensity settings yield no weight change"));
        }
        let days = ((difference / daily_rate) - DAY_EPSILON).ceil().max(1.0);
        if days > self.settings.max_horizon_days as f64 {
            return Err(AppError::validation(format!(
                "target is unreachable within {} days at the chosen intensity",
                self.settings.max_horizon_days
            )));
        }
        let days = days as i64;
        Ok(Projection {
            start_weight: current_weight,
            target_weight,
            days,
            daily_rate,
        })
    }

    /// Evenly spaced samples from today, ending with the exact final point.
    pub fn timeline(&self, projection: &Projection, today: NaiveDate) -> Vec<TimelinePoint> {
        let points = self.settings.timeline_points.max(1);
        let stride = ((projection.days + points - 1) / points).max(1);

        let mut timeline: Vec<TimelinePoint> = (0..projection.days)
            .step_by(stride as usize)
            .map(|day| TimelinePoint {
                date: day_after(today, day),
                weight: round2(projection.weight_on(day)),
            })
            .collect();
        timeline.push(TimelinePoint {
            date: day_after(today, projection.days),
            weight: round2(projection.target_weight),
        });
        timeline
    }

    pub fn milestones(&self, projection: &Projection, mode: PredictionMode, today: NaiveDate) -> Vec<Milestone> {
        let mut milestones = vec![Milestone {
            kind: MilestoneKind::Start,
            date: today,
            weight: round2(projection.start_weight),
            title: "Prediction start".to_string(),
        }];

        if projection.days > self.settings.midpoint_min_days {
            let midpoint = projection.days / 2;
            milestones.push(Milestone {
                kind: MilestoneKind::Midpoint,
                date: day_after(today, midpoint),
                weight: round2(projection.weight_on(midpoint)),
                title: "Midpoint check-in".to_string(),
            });
        }

        milestones.push(Milestone {
            kind: MilestoneKind::End,
            date: day_after(today, projection.days),
            weight: round2(projection.target_weight),
            title: match mode {
                PredictionMode::TargetDate => "Target date".to_string(),
                PredictionMode::TargetWeight => "Expected achievement date".to_string(),
            },
        });
        milestones
    }

    /// Build the full prediction for `request` from the latest weight record.
    pub fn predict(
        &self,
        latest_weight: &HealthRecord,
        request: &PredictionRequest,
        today: NaiveDate,
    ) -> Result<PredictionResult, AppError> {
        let daily_rate = self.daily_rate(request.diet_intensity, request.exercise_intensity)?;
        let current_weight = latest_weight.value;

        let projection = match request.mode {
            PredictionMode::TargetDate => {
                let target_date = request
                    .target_date
                    .ok_or_else(|| AppError::validation("targetDate is required in target-date mode"))?;
                self.project_to_date(current_weight, daily_rate, today, target_date)?
            }
            PredictionMode::TargetWeight => {
                let target_weight = request
                    .target_weight
                    .ok_or_else(|| AppError::validation("targetWeight is required in target-weight mode"))?;
                self.project_to_weight(current_weight, daily_rate, target_weight)?
            }
        };

        let (feasibility, analysis) = self.classify(daily_rate);
        tracing::info!(
            "Projected {:.1} -> {:.1} kg over {} days at {:.3} kg/day ({:?})",
            projection.start_weight,
            projection.target_weight,
            projection.days,
            daily_rate,
            feasibility
        );

        Ok(PredictionResult {
            mode: request.mode,
            start_weight: current_weight,
            target_weight: round2(projection.target_weight),
            target_date: day_after(today, projection.days),
            days_required: projection.days,
            daily_rate,
            timeline: self.timeline(&projection, today),
            milestones: self.milestones(&projection, request.mode, today),
            feasibility,
            analysis: analysis.to_string(),
            basis: PredictionBasis {
                model: MODEL_NAME.to_string(),
                latest_weight_at: latest_weight.timestamp,
                diet_intensity: request.diet_intensity,
                exercise_intensity: request.exercise_intensity,
            },
        })
    }
}

/// `today + day`, saturating at the last representable date.
fn day_after(today: NaiveDate, day: i64) -> NaiveDate {
    Duration::try_days(day)
        .and_then(|offset| today.checked_add_signed(offset))
        .unwrap_or(NaiveDate::MAX)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
