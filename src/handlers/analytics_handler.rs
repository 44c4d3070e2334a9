use actix_web::{web, HttpResponse, ResponseError};
use chrono::Utc;

use crate::analytics::aggregator::{compute_stats, load_window};
use crate::analytics::insights::{self, InsightGenerator};
use crate::db::record_store::RecordStore;
use crate::errors::AppError;
use crate::handlers::{owner_id, parse_metric_type};
use crate::middleware::auth::Claims;
use crate::models::common::ApiResponse;
use crate::models::health_record::MetricType;
use crate::models::insight::InsightsQuery;
use crate::models::stats::{StatsPeriod, StatsQuery};

fn parse_period(period: Option<&str>) -> Result<StatsPeriod, AppError> {
    period
        .map(|period| period.parse().map_err(AppError::Validation))
        .transpose()
        .map(Option::unwrap_or_default)
}

#[tracing::instrument(
    name = "Get health stats",
    skip(params, store, claims),
    fields(username = %claims.username, metric_type = ?params.metric_type, period = ?params.period)
)]
pub async fn get_stats(
    params: web::Query<StatsQuery>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let (metric_type, period) = match (
        parse_metric_type(params.metric_type.as_deref()),
        parse_period(params.period.as_deref()),
    ) {
        (Ok(metric_type), Ok(period)) => (metric_type, period),
        (Err(e), _) | (_, Err(e)) => return e.error_response(),
    };

    match compute_stats(store.get_ref(), owner_id, metric_type, period, Utc::now()).await {
        Ok(stats) => {
            let message = if stats.stats.is_empty() {
                "No records in the selected period"
            } else {
                "Health stats computed"
            };
            HttpResponse::Ok().json(ApiResponse::success(message, stats))
        }
        Err(e) => {
            tracing::error!("❌ Failed to compute stats: {}", e);
            AppError::from(e).error_response()
        }
    }
}

#[tracing::instrument(
    name = "Get health insights",
    skip(params, store, generator, claims),
    fields(username = %claims.username, metric_type = ?params.metric_type, period = ?params.period)
)]
pub async fn get_insights(
    params: web::Query<InsightsQuery>,
    store: web::Data<dyn RecordStore>,
    generator: web::Data<InsightGenerator>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let (metric_type, period) = match (
        parse_metric_type(params.metric_type.as_deref()),
        parse_period(params.period.as_deref()),
    ) {
        (Ok(metric_type), Ok(period)) => (metric_type.unwrap_or(MetricType::Weight), period),
        (Err(e), _) | (_, Err(e)) => return e.error_response(),
    };

    let window = match load_window(store.get_ref(), owner_id, Some(metric_type), period, Utc::now()).await {
        Ok(window) => window,
        Err(e) => {
            tracing::error!("❌ Failed to load the insight window: {}", e);
            return AppError::from(e).error_response();
        }
    };

    match insights::report(&generator, metric_type, window) {
        Some(report) => {
            tracing::info!("💡 Generated {} insights", report.insights.len());
            HttpResponse::Ok().json(ApiResponse::success("Health insights generated", report))
        }
        None => AppError::InsufficientData(format!("No {} records for period {}", metric_type, period))
            .error_response(),
    }
}
