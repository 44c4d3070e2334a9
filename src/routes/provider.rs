use actix_web::{delete, get, post, web, HttpResponse};

use crate::db::record_store::RecordStore;
use crate::handlers::provider::provider_data::{delete_provider_data, get_provider_data};
use crate::handlers::provider::settings::{get_provider_settings, save_provider_settings};
use crate::handlers::provider::sync::{sync_provider_data, sync_status, test_connection};
use crate::ingestion::normalizer::IngestionService;
use crate::middleware::auth::Claims;
use crate::models::health_record::{DeleteRecordsRequest, ListRecordsQuery};
use crate::models::provider_settings::SaveProviderSettingsRequest;
use crate::models::sync::{SyncRequest, TestConnectionRequest};

#[post("/sync")]
async fn sync(
    body: web::Json<SyncRequest>,
    ingestion: web::Data<IngestionService>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    sync_provider_data(body, ingestion, claims).await
}

#[post("/test-connection")]
async fn check_connection(
    body: web::Json<TestConnectionRequest>,
    ingestion: web::Data<IngestionService>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    test_connection(body, ingestion, claims).await
}

#[get("/data")]
async fn synced_data(
    filters: web::Query<ListRecordsQuery>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    get_provider_data(filters, store, claims).await
}

#[delete("/data")]
async fn remove_synced_data(
    body: web::Json<DeleteRecordsRequest>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    delete_provider_data(body, store, claims).await
}

#[get("/status")]
async fn status(store: web::Data<dyn RecordStore>, claims: web::ReqData<Claims>) -> HttpResponse {
    sync_status(store, claims).await
}

#[get("/settings")]
async fn settings(store: web::Data<dyn RecordStore>, claims: web::ReqData<Claims>) -> HttpResponse {
    get_provider_settings(store, claims).await
}

#[post("/settings")]
async fn update_settings(
    body: web::Json<SaveProviderSettingsRequest>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    save_provider_settings(body, store, claims).await
}
