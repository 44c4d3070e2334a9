use actix_web::{get, web, HttpResponse};

use crate::analytics::insights::InsightGenerator;
use crate::db::record_store::RecordStore;
use crate::handlers::analytics_handler::{get_insights, get_stats};
use crate::middleware::auth::Claims;
use crate::models::insight::InsightsQuery;
use crate::models::stats::StatsQuery;

#[get("/stats")]
async fn stats(
    params: web::Query<StatsQuery>,
    store: web::Data<dyn RecordStore>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    get_stats(params, store, claims).await
}

#[get("/insights")]
async fn insights(
    params: web::Query<InsightsQuery>,
    store: web::Data<dyn RecordStore>,
    generator: web::Data<InsightGenerator>,
    claims: web::ReqData<Claims>,
) -> HttpResponse {
    get_insights(params, store, generator, claims).await
}
