use actix_web::{web, HttpResponse, ResponseError};
use chrono::Utc;

use crate::analytics::prediction::PredictionEngine;
use crate::db::record_store::RecordStore;
use crate::errors::AppError;
use crate::handlers::owner_id;
use crate::middleware::auth::Claims;
use crate::models::common::ApiResponse;
use crate::models::health_record::MetricType;
use crate::models::prediction::PredictionRequest;

#[tracing::instrument(
    name = "Predict weight",
    skip(body, store, engine, claims),
    fields(
        username = %claims.username,
        mode = ?body.mode,
        diet = body.diet_intensity,
        exercise = body.exercise_intensity
    )
)]
pub async fn predict_weight(
    body: web::Json<PredictionRequest>,
    store: web::Data<dyn RecordStore>,
    engine: web::Data<PredictionEngine>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let today = Utc::now().date_naive();
    if let Err(e) = engine.validate_request(&body, today) {
        tracing::warn!("Rejected prediction request: {}", e);
        return e.error_response();
    }

    let latest = match store.latest(owner_id, MetricType::Weight).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return AppError::NotFound("No weight record found. Record your weight first.".to_string())
                .error_response()
        }
        Err(e) => {
            tracing::error!("❌ Failed to load the latest weight: {}", e);
            return AppError::from(e).error_response();
        }
    };

    match engine.predict(&latest, &body, today) {
        Ok(prediction) => {
            tracing::info!(
                "📈 Predicted {} days to reach {:.1} kg",
                prediction.days_required,
                prediction.target_weight
            );
            HttpResponse::Ok().json(ApiResponse::success("Weight prediction computed", prediction))
        }
        Err(e) => e.error_response(),
    }
}
