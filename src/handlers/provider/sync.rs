use actix_web::{web, HttpResponse, ResponseError};
use chrono::Utc;

use crate::db::record_store::RecordStore;
use crate::errors::AppError;
use crate::handlers::owner_id;
use crate::ingestion::normalizer::IngestionService;
use crate::middleware::auth::Claims;
use crate::models::common::ApiResponse;
use crate::models::health_record::RecordSource;
use crate::models::sync::{ProviderStatusResponse, SyncRequest, TestConnectionRequest};

#[tracing::instrument(
    name = "Sync provider health data",
    skip(body, ingestion, claims),
    fields(username = %claims.username, metric_types = ?body.metric_types)
)]
pub async fn sync_provider_data(
    body: web::Json<SyncRequest>,
    ingestion: web::Data<IngestionService>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let now = Utc::now();
    match ingestion.sync(owner_id, body.into_inner(), now.date_naive(), now).await {
        Ok(response) => {
            let message = if response.synthetic {
                "Sync completed with synthetic data"
            } else {
                "Sync completed"
            };
            HttpResponse::Ok().json(ApiResponse::success(message, response))
        }
        Err(e) => {
            tracing::error!("❌ Provider sync failed: {}", e);
            e.error_response()
        }
    }
}

#[tracing::instrument(
    name = "Test provider connection",
    skip(body, ingestion, claims),
    fields(username = %claims.username)
)]
pub async fn test_connection(
    body: web::Json<TestConnectionRequest>,
    ingestion: web::Data<IngestionService>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match ingestion.test_connection(owner_id, body.into_inner().credential).await {
        Ok(result) => {
            if result.success {
                tracing::info!("✅ Provider connection verified");
            } else {
                tracing::warn!("Provider connection failed: {}", result.message);
            }
            HttpResponse::Ok().json(result)
        }
        Err(e) => {
            tracing::error!("❌ Provider connection test rejected: {}", e);
            e.error_response()
        }
    }
}

#[tracing::instrument(
    name = "Get provider sync status",
    skip(store, claims),
    fields(username = %claims.username)
)]
pub async fn sync_status(store: web::Data<dyn RecordStore>, claims: web::ReqData<Claims>) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match store.sync_cursor(owner_id, RecordSource::ExternalProvider).await {
        Ok(cursor) => HttpResponse::Ok().json(ApiResponse::success(
            "Sync status retrieved",
            ProviderStatusResponse {
                source: RecordSource::ExternalProvider,
                last_sync: cursor.map(|cursor| cursor.last_sync),
            },
        )),
        Err(e) => {
            tracing::error!("❌ Failed to read the sync cursor: {}", e);
            AppError::from(e).error_response()
        }
    }
}
