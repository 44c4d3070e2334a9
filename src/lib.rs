use actix_web::{http, web, App, HttpServer};
use actix_web::dev::Server;
use tracing_actix_web::TracingLogger;
use std::net::TcpListener;
use std::sync::Arc;
use actix_cors::Cors;

pub mod config;
pub mod errors;
pub mod telemetry;
mod routes;
mod handlers;
pub mod middleware;
pub mod models;
pub mod db;
pub mod analytics;
pub mod ingestion;

use crate::analytics::insights::InsightGenerator;
use crate::analytics::prediction::PredictionEngine;
use crate::config::jwt::JwtSettings;
use crate::db::RecordStore;
use crate::ingestion::normalizer::IngestionService;
use crate::routes::init_routes;

/// Everything the HTTP layer shares across workers.
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub jwt_settings: JwtSettings,
    pub ingestion: IngestionService,
    pub prediction: PredictionEngine,
    pub insights: InsightGenerator,
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    // Wrap using web::Data, which boils down to an Arc smart pointer
    let store: web::Data<dyn RecordStore> = web::Data::from(state.store);
    let jwt_settings = web::Data::new(state.jwt_settings);
    let ingestion = web::Data::new(state.ingestion);
    let prediction = web::Data::new(state.prediction);
    let insights = web::Data::new(state.insights);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://localhost:5173")
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_headers(vec![
                http::header::AUTHORIZATION,
                http::header::ACCEPT,
                http::header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(cors)
            // Get a pointer copy and attach it to the application state
            .app_data(store.clone())
            .app_data(jwt_settings.clone())
            .app_data(ingestion.clone())
            .app_data(prediction.clone())
            .app_data(insights.clone())
            .configure(init_routes)
    })
    .listen(listener)?
    .run();

    Ok(server)
}
