use actix_web::HttpResponse;
use uuid::Uuid;

use crate::errors::AppError;
use crate::middleware::auth::Claims;
use crate::models::common::ApiResponse;
use crate::models::health_record::MetricType;

pub mod analytics_handler;
pub mod backend_health_handler;
pub mod health_records;
pub mod prediction_handler;
pub mod provider;

/// Owner id carried by the validated token.
pub(crate) fn owner_id(claims: &Claims) -> Result<Uuid, HttpResponse> {
    claims.user_id().ok_or_else(|| {
        tracing::error!("Token subject {} is not a valid owner id", claims.sub);
        HttpResponse::Unauthorized().json(ApiResponse::<()>::error("Invalid owner id"))
    })
}

pub(crate) fn parse_metric_type(name: Option<&str>) -> Result<Option<MetricType>, AppError> {
    name.map(|name| name.parse().map_err(AppError::Validation)).transpose()
}
