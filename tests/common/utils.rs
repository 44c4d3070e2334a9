use actix_web::{get, web, App, HttpRequest, HttpResponse, HttpServer};
use chrono::{DateTime, Duration, DurationRound, Utc};
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::json;
use std::net::TcpListener;
use std::sync::Arc;
use uuid::Uuid;

use health_tracker_backend::analytics::insights::InsightGenerator;
use health_tracker_backend::analytics::prediction::PredictionEngine;
use health_tracker_backend::config::jwt::JwtSettings;
use health_tracker_backend::config::prediction::PredictionSettings;
use health_tracker_backend::config::provider::{IngestionMode, ProviderSettings};
use health_tracker_backend::db::InMemoryRecordStore;
use health_tracker_backend::ingestion::normalizer::IngestionService;
use health_tracker_backend::ingestion::provider_client::HttpProviderClient;
use health_tracker_backend::middleware::auth::issue_token;
use health_tracker_backend::telemetry::{get_subscriber, init_subscriber};
use health_tracker_backend::{run, AppState};

pub const TEST_JWT_SECRET: &str = "integration-test-secret";
pub const PROVIDER_TOKEN: &str = "valid-provider-token";

// Ensure that the `tracing` stack is only initialised once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryRecordStore>,
    pub api_client: Client,
}

pub struct TestUser {
    pub owner_id: Uuid,
    pub token: String,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

/// Spawn the service on a random port with an in-memory store.
pub async fn spawn_app() -> TestApp {
    spawn_app_with_provider(IngestionMode::Live, vec![unreachable_endpoint()]).await
}

pub async fn spawn_app_with_provider(mode: IngestionMode, endpoints: Vec<String>) -> TestApp {
    // The first time `initialize` is invoked the code in `TRACING` is executed.
    // All other invocations will instead skip execution.
    Lazy::force(&TRACING);

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    // Get port assigned by the OS
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let provider_settings = ProviderSettings {
        endpoints,
        attempt_timeout_secs: 2,
        fetch_timeout_secs: 2,
        ingestion_mode: mode,
        default_sync_days: 7,
        max_sync_days: 366,
    };
    let store = Arc::new(InMemoryRecordStore::new());
    let client = Arc::new(HttpProviderClient::new(provider_settings.fetch_timeout()));
    let ingestion = IngestionService::new(store.clone(), client, &provider_settings).with_synthetic_seed(42);

    let state = AppState {
        store: store.clone(),
        jwt_settings: jwt_settings(),
        ingestion,
        prediction: PredictionEngine::new(PredictionSettings::default()),
        insights: InsightGenerator::default(),
    };

    let server = run(listener, state).expect("Failed to bind address");
    // Launch the server as a background task
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        api_client: Client::new(),
    }
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings::new(TEST_JWT_SECRET.to_string(), 1)
}

pub fn create_test_user() -> TestUser {
    let owner_id = Uuid::new_v4();
    let token = issue_token(owner_id, &format!("user{}", owner_id.simple()), &jwt_settings())
        .expect("Failed to sign token");
    TestUser { owner_id, token }
}

/// Address of a port nothing listens on.
pub fn unreachable_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// Timestamps served by the fake provider; fixed at spawn so that repeated
/// syncs see identical samples.
#[derive(Clone)]
pub struct ProviderFixture {
    pub weight: Vec<(DateTime<Utc>, f64)>,
    pub bodyfat: Vec<(DateTime<Utc>, f64)>,
}

impl ProviderFixture {
    pub fn recent() -> Self {
        let today = Utc::now().duration_trunc(Duration::days(1)).unwrap();
        let at = |days_ago: i64| today - Duration::days(days_ago) + Duration::hours(7);
        Self {
            weight: vec![(at(3), 80.4), (at(2), 80.1), (at(1), 79.8)],
            bodyfat: vec![(at(2), 21.5)],
        }
    }
}

fn authorized(req: &HttpRequest) -> bool {
    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {}", PROVIDER_TOKEN))
        .unwrap_or(false)
}

#[get("/user/profile")]
async fn fake_profile(req: HttpRequest) -> HttpResponse {
    if !authorized(&req) {
        return HttpResponse::Unauthorized().json(json!({ "error": "invalid token" }));
    }
    HttpResponse::Ok().json(json!({ "userId": "1001", "nickname": "scale-owner" }))
}

#[get("/data/{metric}")]
async fn fake_data(req: HttpRequest, metric: web::Path<String>, fixture: web::Data<ProviderFixture>) -> HttpResponse {
    if !authorized(&req) {
        return HttpResponse::Unauthorized().json(json!({ "error": "invalid token" }));
    }
    let samples = match metric.as_str() {
        "weight" => &fixture.weight,
        "bodyfat" => &fixture.bodyfat,
        "bone" => return HttpResponse::InternalServerError().json(json!({ "error": "bone data unavailable" })),
        _ => return HttpResponse::Ok().json(json!({ "data": [] })),
    };
    let data: Vec<_> = samples
        .iter()
        // `timestamp` is the upload instant; `measureTime` is when the scale measured
        .map(|(at, value)| {
            json!({
                "value": value,
                "measureTime": at,
                "timestamp": *at + Duration::hours(2),
                "deviceId": "scale-1"
            })
        })
        .collect();
    HttpResponse::Ok().json(json!({ "data": data }))
}

/// Spawn a fake provider on a random port and return its base URL.
pub fn spawn_fake_provider(fixture: ProviderFixture) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let fixture = web::Data::new(fixture);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(fixture.clone())
            .service(fake_profile)
            .service(fake_data)
    })
    .listen(listener)
    .expect("Failed to bind fake provider")
    .workers(1)
    .run();
    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

pub async fn add_record(app: &TestApp, user: &TestUser, metric_type: &str, value: f64, timestamp: DateTime<Utc>) -> reqwest::Response {
    app.api_client
        .post(app.url("/health/records"))
        .bearer_auth(&user.token)
        .json(&json!({
            "metricType": metric_type,
            "value": value,
            "timestamp": timestamp,
        }))
        .send()
        .await
        .expect("Failed to execute request.")
}
