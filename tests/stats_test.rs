use chrono::{Duration, Utc};
use serde_json::Value;

mod common;
use common::utils::{add_record, create_test_user, spawn_app, TestApp, TestUser};

async fn get_json(app: &TestApp, user: &TestUser, path: &str) -> (u16, Value) {
    let response = app
        .api_client
        .get(app.url(path))
        .bearer_auth(&user.token)
        .send()
        .await
        .expect("Failed to execute request.");
    let status = response.status().as_u16();
    (status, response.json().await.expect("Failed to parse response"))
}

#[tokio::test]
async fn stats_for_a_known_series() {
    let app = spawn_app().await;
    let user = create_test_user();
    let now = Utc::now();

    for (days_ago, value) in [(4, 10.0), (3, 12.0), (2, 8.0), (1, 14.0)] {
        add_record(&app, &user, "bodyfat", value, now - Duration::days(days_ago)).await;
    }

    let (status, body) = get_json(&app, &user, "/health/stats?metricType=bodyfat&period=7d").await;
    assert_eq!(status, 200);
    let stats = &body["data"]["stats"];
    assert_eq!(stats["count"], 4);
    assert_eq!(stats["min"], 8.0);
    assert_eq!(stats["max"], 14.0);
    assert_eq!(stats["avg"], 11.0);
    assert_eq!(stats["first"], 10.0);
    assert_eq!(stats["last"], 14.0);
    assert_eq!(stats["change"], 4.0);
    assert_eq!(stats["changePercent"], 40.0);
    assert_eq!(body["data"]["period"], "7d");
}

#[tokio::test]
async fn zero_baseline_reports_an_undefined_percent() {
    let app = spawn_app().await;
    let user = create_test_user();
    let now = Utc::now();

    add_record(&app, &user, "activity", 0.0, now - Duration::days(2)).await;
    add_record(&app, &user, "activity", 30.0, now - Duration::days(1)).await;

    let (status, body) = get_json(&app, &user, "/health/stats?metricType=activity").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["stats"]["changePercent"], "undefined");
    assert_eq!(body["data"]["stats"]["change"], 30.0);
}

#[tokio::test]
async fn empty_window_is_a_success_with_empty_stats() {
    let app = spawn_app().await;
    let user = create_test_user();

    add_record(&app, &user, "weight", 80.0, Utc::now() - Duration::days(40)).await;

    let (status, body) = get_json(&app, &user, "/health/stats?metricType=weight&period=30d").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["stats"], serde_json::json!({}));
    assert!(body["data"]["startDate"].is_string());
    assert!(body["data"]["endDate"].is_string());
}

#[tokio::test]
async fn without_a_type_stats_are_keyed_by_metric() {
    let app = spawn_app().await;
    let user = create_test_user();
    let now = Utc::now();

    add_record(&app, &user, "weight", 80.0, now - Duration::days(2)).await;
    add_record(&app, &user, "weight", 79.0, now - Duration::days(1)).await;
    add_record(&app, &user, "steps", 9000.0, now - Duration::days(1)).await;

    let (status, body) = get_json(&app, &user, "/health/stats").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["period"], "30d");
    assert_eq!(body["data"]["stats"]["weight"]["change"], -1.0);
    assert_eq!(body["data"]["stats"]["steps"]["count"], 1);
}

#[tokio::test]
async fn unknown_periods_are_rejected() {
    let app = spawn_app().await;
    let user = create_test_user();

    let (status, body) = get_json(&app, &user, "/health/stats?period=2w").await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn insights_need_at_least_one_record() {
    let app = spawn_app().await;
    let user = create_test_user();

    let (status, _) = get_json(&app, &user, "/health/insights?metricType=weight&period=7d").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn falling_weight_produces_a_positive_insight() {
    let app = spawn_app().await;
    let user = create_test_user();
    let now = Utc::now();

    for (days_ago, value) in [(6, 81.0), (5, 80.8), (4, 80.9), (3, 80.6), (2, 80.5), (1, 80.3)] {
        add_record(&app, &user, "weight", value, now - Duration::days(days_ago)).await;
    }

    let (status, body) = get_json(&app, &user, "/health/insights?metricType=weight&period=7d").await;
    assert_eq!(status, 200);
    let data = &body["data"];
    assert_eq!(data["timeline"].as_array().unwrap().len(), 6);
    assert_eq!(data["current"]["value"], 80.3);
    assert_eq!(data["stats"]["maxDate"], data["timeline"][0]["date"]);

    let kinds: Vec<&str> = data["insights"]
        .as_array()
        .unwrap()
        .iter()
        .map(|insight| insight["kind"].as_str().unwrap())
        .collect();
    // decreasing, then stable (population std dev well below 1 kg)
    assert_eq!(kinds, vec!["positive", "positive"]);
}

#[tokio::test]
async fn metrics_without_rules_get_an_empty_insight_list() {
    let app = spawn_app().await;
    let user = create_test_user();

    add_record(&app, &user, "steps", 8000.0, Utc::now() - Duration::days(1)).await;

    let (status, body) = get_json(&app, &user, "/health/insights?metricType=steps&period=7d").await;
    assert_eq!(status, 200);
    assert!(body["data"]["insights"].as_array().unwrap().is_empty());
}
