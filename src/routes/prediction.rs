use actix_web::{post, web, HttpResponse};

use crate::analytics::prediction::PredictionEngine;
use crate::db::record_store::RecordStore;
use crate::handlers::prediction_handler::predict_weight;
use crate::middleware::auth::Claims;
use crate::models::prediction::PredictionRequest;

#[post("/weight")]
async fn weight(
    body: web::Json<PredictionRequest>,
    store: web::Data<dyn RecordStore>,
    engine: web::Data<PredictionEngine>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    predict_weight(body, store, engine, claims).await
}
