use actix_web::{delete, get, post, web, HttpResponse};
use uuid::Uuid;

use crate::db::record_store::RecordStore;
use crate::handlers::health_records::delete_records::{delete_record, delete_records};
use crate::handlers::health_records::get_records::{latest_record, list_records};
use crate::handlers::health_records::upsert_record::upsert_record;
use crate::middleware::auth::Claims;
use crate::models::health_record::{DeleteRecordsRequest, LatestRecordQuery, ListRecordsQuery, UpsertRecordRequest};

#[post("/records")]
async fn add_record(
    body: web::Json<UpsertRecordRequest>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    upsert_record(body, store, claims).await
}

#[get("/records")]
async fn get_records(
    filters: web::Query<ListRecordsQuery>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    list_records(filters, store, claims).await
}

#[get("/records/latest")]
async fn get_latest_record(
    params: web::Query<LatestRecordQuery>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    latest_record(params, store, claims).await
}

#[delete("/records/{record_id}")]
async fn remove_record(
    record_id: web::Path<Uuid>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    delete_record(record_id, store, claims).await
}

#[delete("/records")]
async fn remove_records(
    body: web::Json<DeleteRecordsRequest>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    delete_records(body, store, claims).await
}
