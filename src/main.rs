use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;

use health_tracker_backend::analytics::insights::InsightGenerator;
use health_tracker_backend::analytics::prediction::PredictionEngine;
use health_tracker_backend::config::settings::{get_config, get_jwt_settings};
use health_tracker_backend::db::{InMemoryRecordStore, PgRecordStore, RecordStore};
use health_tracker_backend::ingestion::normalizer::IngestionService;
use health_tracker_backend::ingestion::provider_client::HttpProviderClient;
use health_tracker_backend::telemetry::{get_subscriber, init_subscriber};
use health_tracker_backend::{run, AppState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = match get_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to read the config: {}", e);
            std::process::exit(1);
        }
    };

    let subscriber = get_subscriber(
        "health-tracker-backend".into(),
        config.application.log_level.clone(),
        std::io::stdout
    );
    init_subscriber(subscriber);

    let store: Arc<dyn RecordStore> = if config.database.in_memory {
        tracing::warn!("⚠️ Using the in-memory record store, data is lost on restart");
        Arc::new(InMemoryRecordStore::new())
    } else {
        // Only try to establish connection when actually used
        let connection_pool = match PgPoolOptions::new()
            .max_connections(32)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect_lazy(config.database.connection_string().expose_secret())
        {
            Ok(pool) => pool,
            Err(e) => {
                tracing::error!("❌ Failed to create Postgres connection pool: {}", e);
                std::process::exit(1);
            }
        };
        if let Err(e) = sqlx::migrate!("./migrations").run(&connection_pool).await {
            tracing::error!("❌ Failed to run database migrations: {}", e);
            std::process::exit(1);
        }
        tracing::info!("✅ Database migrations applied");
        Arc::new(PgRecordStore::new(connection_pool))
    };

    tracing::info!("Ingestion mode: {:?}", config.provider.ingestion_mode);
    let client = Arc::new(HttpProviderClient::new(config.provider.fetch_timeout()));
    let ingestion = IngestionService::new(store.clone(), client, &config.provider);

    let state = AppState {
        store,
        jwt_settings: get_jwt_settings(&config),
        ingestion,
        prediction: PredictionEngine::new(config.prediction.clone()),
        insights: InsightGenerator::default(),
    };

    let address = format!("{}:{}", config.application.host, config.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!("🚀 Listening on {}", address);

    run(listener, state)?.await
}
