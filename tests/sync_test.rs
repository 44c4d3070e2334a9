use serde_json::{json, Value};

use health_tracker_backend::config::provider::IngestionMode;

mod common;
use common::utils::{
    add_record, create_test_user, spawn_app_with_provider, spawn_fake_provider, unreachable_endpoint,
    ProviderFixture, TestApp, TestUser, PROVIDER_TOKEN,
};

async fn sync(app: &TestApp, user: &TestUser, metric_types: &[&str]) -> (u16, Value) {
    let response = app
        .api_client
        .post(app.url("/provider/sync"))
        .bearer_auth(&user.token)
        .json(&json!({
            "credential": PROVIDER_TOKEN,
            "metricTypes": metric_types,
        }))
        .send()
        .await
        .expect("Failed to execute request.");
    let status = response.status().as_u16();
    (status, response.json().await.expect("Failed to parse response"))
}

#[tokio::test]
async fn syncing_twice_writes_nothing_new() {
    let provider = spawn_fake_provider(ProviderFixture::recent());
    let app = spawn_app_with_provider(IngestionMode::Live, vec![provider]).await;
    let user = create_test_user();

    let (status, first) = sync(&app, &user, &["weight", "bodyfat"]).await;
    assert_eq!(status, 200);
    assert_eq!(first["data"]["stats"]["totalRecords"], 4);
    assert_eq!(first["data"]["stats"]["newRecords"], 4);
    assert_eq!(first["data"]["synthetic"], false);
    assert_eq!(first["data"]["data"].as_array().unwrap().len(), 3);

    let (status, second) = sync(&app, &user, &["weight", "bodyfat"]).await;
    assert_eq!(status, 200);
    assert_eq!(second["data"]["stats"]["newRecords"], 0);
    assert_eq!(second["data"]["stats"]["totalRecords"], first["data"]["stats"]["totalRecords"]);
    assert_eq!(app.store.len().await, 4);
}

#[tokio::test]
async fn a_failing_type_is_reported_without_aborting_the_sync() {
    let provider = spawn_fake_provider(ProviderFixture::recent());
    let app = spawn_app_with_provider(IngestionMode::Live, vec![provider]).await;
    let user = create_test_user();

    let (status, body) = sync(&app, &user, &["bone", "weight"]).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["success"], true);
    assert_eq!(body["data"]["stats"]["syncedTypes"], json!(["weight"]));
    assert_eq!(body["data"]["failedTypes"][0]["metricType"], "bone");
}

#[tokio::test]
async fn the_first_reachable_endpoint_is_used() {
    let provider = spawn_fake_provider(ProviderFixture::recent());
    let app = spawn_app_with_provider(IngestionMode::Live, vec![unreachable_endpoint(), provider]).await;
    let user = create_test_user();

    let (status, body) = sync(&app, &user, &["weight"]).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["stats"]["newRecords"], 3);
}

#[tokio::test]
async fn exhausting_every_endpoint_is_a_bad_gateway_in_live_mode() {
    let app = spawn_app_with_provider(IngestionMode::Live, vec![unreachable_endpoint(), unreachable_endpoint()]).await;
    let user = create_test_user();

    let (status, body) = sync(&app, &user, &["weight"]).await;
    assert_eq!(status, 502);
    assert_eq!(body["success"], false);
    assert_eq!(app.store.len().await, 0);
}

#[tokio::test]
async fn fallback_mode_substitutes_synthetic_samples() {
    let app = spawn_app_with_provider(IngestionMode::LiveWithSyntheticFallback, vec![unreachable_endpoint()]).await;
    let user = create_test_user();

    let (status, body) = sync(&app, &user, &["weight"]).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["synthetic"], true);
    assert!(body["data"]["stats"]["newRecords"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn status_exposes_the_last_sync_instant() {
    let provider = spawn_fake_provider(ProviderFixture::recent());
    let app = spawn_app_with_provider(IngestionMode::Live, vec![provider]).await;
    let user = create_test_user();

    let before: Value = app
        .api_client
        .get(app.url("/provider/status"))
        .bearer_auth(&user.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(before["data"]["lastSync"].is_null());

    sync(&app, &user, &["weight"]).await;

    let after: Value = app
        .api_client
        .get(app.url("/provider/status"))
        .bearer_auth(&user.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(after["data"]["lastSync"].is_string());
    assert_eq!(after["data"]["source"], "external-provider");
}

#[tokio::test]
async fn synced_data_views_are_scoped_to_the_provider() {
    let provider = spawn_fake_provider(ProviderFixture::recent());
    let app = spawn_app_with_provider(IngestionMode::Live, vec![provider]).await;
    let user = create_test_user();

    sync(&app, &user, &["weight"]).await;
    add_record(&app, &user, "weight", 82.0, chrono::Utc::now()).await;

    let listed: Value = app
        .api_client
        .get(app.url("/provider/data?metricType=weight"))
        .bearer_auth(&user.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let records = listed["data"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|record| record["source"] == "external-provider"));
    assert_eq!(records[0]["metadata"]["payload"]["deviceId"], "scale-1");

    let deleted: Value = app
        .api_client
        .delete(app.url("/provider/data"))
        .bearer_auth(&user.token)
        .json(&json!({ "all": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted["data"]["deleted"], 3);
    // the manual entry survives
    assert_eq!(app.store.len().await, 1);
}

#[tokio::test]
async fn connection_test_uses_the_failover_list() {
    let provider = spawn_fake_provider(ProviderFixture::recent());
    let app = spawn_app_with_provider(IngestionMode::Live, vec![unreachable_endpoint(), provider.clone()]).await;
    let user = create_test_user();

    let body: Value = app
        .api_client
        .post(app.url("/provider/test-connection"))
        .bearer_auth(&user.token)
        .json(&json!({ "credential": PROVIDER_TOKEN }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["endpoint"], provider);
    assert_eq!(body["userData"]["nickname"], "scale-owner");
    assert_eq!(body["availableDataTypes"].as_array().unwrap().len(), 8);

    let rejected: Value = app
        .api_client
        .post(app.url("/provider/test-connection"))
        .bearer_auth(&user.token)
        .json(&json!({ "credential": "wrong" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rejected["success"], false);
}

#[tokio::test]
async fn measure_time_is_stored_when_the_provider_also_sends_timestamp() {
    let fixture = ProviderFixture::recent();
    let provider = spawn_fake_provider(fixture.clone());
    let app = spawn_app_with_provider(IngestionMode::Live, vec![provider]).await;
    let user = create_test_user();

    let (status, body) = sync(&app, &user, &["weight"]).await;
    assert_eq!(status, 200);

    let newest = fixture.weight.iter().map(|(at, _)| *at).max().unwrap();
    let reported: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(body["data"]["data"][0]["measureTime"].clone()).unwrap();
    assert_eq!(reported, newest);
}

#[tokio::test]
async fn saved_settings_drive_a_bare_sync() {
    let provider = spawn_fake_provider(ProviderFixture::recent());
    let app = spawn_app_with_provider(IngestionMode::Live, vec![provider]).await;
    let user = create_test_user();

    let defaults: Value = app
        .api_client
        .get(app.url("/provider/settings"))
        .bearer_auth(&user.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(defaults["data"]["hasCredential"], false);
    assert_eq!(defaults["data"]["metricTypes"], json!(["weight", "bodyfat", "bmi"]));
    assert_eq!(defaults["data"]["syncFrequency"], "daily");

    let saved = app
        .api_client
        .post(app.url("/provider/settings"))
        .bearer_auth(&user.token)
        .json(&json!({
            "credential": PROVIDER_TOKEN,
            "autoSync": true,
            "syncFrequency": "hourly",
            "metricTypes": ["weight"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(saved.status().as_u16(), 200);
    let saved: Value = saved.json().await.unwrap();
    assert_eq!(saved["data"]["hasCredential"], true);
    assert!(!saved.to_string().contains(PROVIDER_TOKEN));

    let response = app
        .api_client
        .post(app.url("/provider/sync"))
        .bearer_auth(&user.token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["stats"]["syncedTypes"], json!(["weight"]));
    assert_eq!(body["data"]["stats"]["newRecords"], 3);

    let after: Value = app
        .api_client
        .get(app.url("/provider/settings"))
        .bearer_auth(&user.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(after["data"]["lastSync"].is_string());
    assert_eq!(after["data"]["syncFrequency"], "hourly");
}

#[tokio::test]
async fn a_bare_sync_without_saved_settings_is_rejected() {
    let provider = spawn_fake_provider(ProviderFixture::recent());
    let app = spawn_app_with_provider(IngestionMode::Live, vec![provider]).await;
    let user = create_test_user();

    let response = app
        .api_client
        .post(app.url("/provider/sync"))
        .bearer_auth(&user.token)
        .json(&json!({ "metricTypes": ["weight"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(app.store.len().await, 0);
}

#[tokio::test]
async fn historical_windows_over_the_cap_are_rejected() {
    let provider = spawn_fake_provider(ProviderFixture::recent());
    let app = spawn_app_with_provider(IngestionMode::Live, vec![provider]).await;
    let user = create_test_user();

    let response = app
        .api_client
        .post(app.url("/provider/sync"))
        .bearer_auth(&user.token)
        .json(&json!({
            "credential": PROVIDER_TOKEN,
            "metricTypes": ["weight"],
            "historical": true,
            "startDate": "0001-01-01",
            "endDate": "9999-12-31",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}
