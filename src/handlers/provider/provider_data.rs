use actix_web::{web, HttpResponse, ResponseError};

use crate::db::record_store::RecordStore;
use crate::handlers::health_records::delete_records::delete_for_owner;
use crate::handlers::health_records::get_records::list_for_owner;
use crate::handlers::owner_id;
use crate::middleware::auth::Claims;
use crate::models::common::ApiResponse;
use crate::models::health_record::{DeleteRecordsRequest, DeleteRecordsResponse, ListRecordsQuery, RecordSource};

#[tracing::instrument(
    name = "List synced provider data",
    skip(filters, store, claims),
    fields(username = %claims.username, metric_type = ?filters.metric_type)
)]
pub async fn get_provider_data(
    filters: web::Query<ListRecordsQuery>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match list_for_owner(store.get_ref(), owner_id, &filters, Some(RecordSource::ExternalProvider)).await {
        Ok(records) => HttpResponse::Ok().json(ApiResponse::success("Synced provider data retrieved", records)),
        Err(e) => e.error_response(),
    }
}

#[tracing::instrument(
    name = "Delete synced provider data",
    skip(body, store, claims),
    fields(username = %claims.username, all = body.all)
)]
pub async fn delete_provider_data(
    body: web::Json<DeleteRecordsRequest>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    let owner_id = match owner_id(&claims) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match delete_for_owner(store.get_ref(), owner_id, &body, Some(RecordSource::ExternalProvider)).await {
        Ok(deleted) => {
            tracing::info!("🗑️ Deleted {} synced provider records", deleted);
            HttpResponse::Ok().json(ApiResponse::success(
                format!("Deleted {} synced records", deleted),
                DeleteRecordsResponse { deleted },
            ))
        }
        Err(e) => e.error_response(),
    }
}
