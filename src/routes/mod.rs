use actix_web::web;

pub mod analytics;
pub mod backend_health;
pub mod health_records;
pub mod prediction;
pub mod provider;

use crate::middleware::auth::AuthMiddleware;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(backend_health::backend_health);

    // Health record routes (require authentication)
    cfg.service(
        web::scope("/health")
            .wrap(AuthMiddleware)
            .service(health_records::add_record)
            .service(health_records::get_latest_record)
            .service(health_records::get_records)
            .service(health_records::remove_records)
            .service(health_records::remove_record)
            .service(analytics::stats)
            .service(analytics::insights),
    );
    // External provider routes (require authentication)
    cfg.service(
        web::scope("/provider")
            .wrap(AuthMiddleware)
            .service(provider::sync)
            .service(provider::check_connection)
            .service(provider::synced_data)
            .service(provider::remove_synced_data)
            .service(provider::status)
            .service(provider::settings)
            .service(provider::update_settings),
    );
    cfg.service(
        web::scope("/predict")
            .wrap(AuthMiddleware)
            .service(prediction::weight),
    );
}
