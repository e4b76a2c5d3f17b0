//! End-to-end tests: the full router on an ephemeral port with in-memory
//! storage, driven over HTTP.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{extract::Query, routing::get, Json, Router};
use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio_test::assert_ok;

use sensorflow_quality::{config, router, AppState, MemoryRepository};

// ---

async fn serve(app: Router) -> Result<SocketAddr> {
    // ---
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(addr)
}

/// Start the service with memory storage plus any extra variables.
async fn spawn_app(extra: &[(&str, &str)]) -> Result<String> {
    // ---
    let mut vars: HashMap<String, String> = HashMap::from([
        ("STORAGE_BACKEND".to_string(), "memory".to_string()),
        ("BIND_ADDR".to_string(), "127.0.0.1:0".to_string()),
    ]);
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    let cfg = config::load_from(|name| vars.get(name).cloned())?;

    let state = AppState::new(cfg, Arc::new(MemoryRepository::new()));
    let addr = serve(router(state)).await?;
    Ok(format!("http://{addr}"))
}

async fn post_reading(client: &Client, base: &str, body: Value) -> Result<(StatusCode, Value)> {
    // ---
    let resp = client.post(format!("{base}/etl/readings")).json(&body).send().await?;
    let status = resp.status();
    Ok((status, resp.json().await?))
}

async fn get_json(client: &Client, url: String) -> Result<(StatusCode, Value)> {
    // ---
    let resp = client.get(url).send().await?;
    let status = resp.status();
    Ok((status, resp.json().await?))
}

// ---

#[tokio::test]
async fn health_reports_memory_backend() -> Result<()> {
    // ---
    let base = spawn_app(&[]).await?;
    let (status, body) = get_json(&Client::new(), format!("{base}/health")).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["readings_processed"], 0);
    Ok(())
}

#[tokio::test]
async fn valid_reading_is_enriched_and_stored() -> Result<()> {
    // ---
    let base = spawn_app(&[]).await?;
    let client = Client::new();

    let (status, body) = post_reading(
        &client,
        &base,
        json!({ "temperature": 28.5, "humidity": 70.0, "device_id": "greenhouse-1" }),
    )
    .await?;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_valid"], true);
    assert_eq!(body["data_quality_score"], 100.0);
    assert_eq!(body["processed_fields"]["heat_index"], true);
    assert_eq!(body["outliers_detected"]["temperature"], false);

    let reading = &body["reading"];
    assert_eq!(reading["device_id"], "greenhouse-1");
    assert_eq!(reading["comfort_level"], "hot_humid");
    let heat_index = reading["heat_index"].as_f64().unwrap_or_default();
    assert!((heat_index - 31.67).abs() < 0.01, "heat index was {heat_index}");
    let dew_point = reading["dew_point"].as_f64().unwrap_or_default();
    assert!((dew_point - 22.48).abs() < 0.05, "dew point was {dew_point}");

    let (status, latest) = get_json(&client, format!("{base}/readings/latest?device_id=greenhouse-1")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["id"], body["id"]);
    Ok(())
}

#[tokio::test]
async fn invalid_reading_is_stored_not_rejected() -> Result<()> {
    // ---
    let base = spawn_app(&[]).await?;
    let client = Client::new();

    let (status, body) = post_reading(&client, &base, json!({ "temperature": 120.0, "humidity": 50.0 })).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_valid"], false);
    assert_eq!(body["data_quality_score"], 70.0);
    assert_eq!(body["reading"]["device_id"], "unknown");
    assert_eq!(body["reading"]["validation"]["errors"], json!(["temperature_out_of_range"]));

    let (status, body) = post_reading(&client, &base, json!({ "temperature": "warm", "humidity": 50.0 })).await?;
    assert_eq!(status, StatusCode::CREATED);
    let errors = body["reading"]["validation"]["errors"].as_array().cloned().unwrap_or_default();
    assert!(errors.contains(&json!("temperature_invalid_type")));
    assert!(errors.contains(&json!("processing_error")));
    assert_eq!(body["processed_fields"]["comfort_level"], false);

    let (_, history) = get_json(&client, format!("{base}/readings/history")).await?;
    assert_eq!(history.as_array().map(Vec::len), Some(2));

    let (_, stats) = get_json(&client, format!("{base}/etl/stats")).await?;
    assert_eq!(stats["stats"]["processed"], 2);
    assert_eq!(stats["stats"]["invalid"], 2);
    assert_eq!(stats["stats"]["success_rate"], 0.0);
    Ok(())
}

#[tokio::test]
async fn malformed_fields_surface_in_quality_report() -> Result<()> {
    // ---
    let base = spawn_app(&[]).await?;
    let client = Client::new();

    let (_, body) = post_reading(&client, &base, json!({ "humidity": 50.0, "device_id": "d1" })).await?;
    let errors = body["reading"]["validation"]["errors"].as_array().cloned().unwrap_or_default();
    assert!(errors.contains(&json!("temperature_missing")));
    assert!(!errors.contains(&json!("temperature_invalid_type")));

    let (_, body) = post_reading(
        &client,
        &base,
        json!({ "temperature": 21.0, "humidity": 50.0, "device_id": 42 }),
    )
    .await?;
    assert_eq!(body["is_valid"], false);
    assert_eq!(body["reading"]["validation"]["errors"], json!(["device_id_invalid_type"]));

    let (_, quality) = get_json(&client, format!("{base}/analytics/data-quality")).await?;
    assert_eq!(quality["validation_issues"]["invalid_records"], 2);
    let codes: Vec<&str> = quality["validation_issues"]["common_errors"]
        .as_array()
        .map(|a| a.iter().filter_map(|e| e["code"].as_str()).collect())
        .unwrap_or_default();
    assert!(codes.contains(&"temperature_missing"));
    assert!(codes.contains(&"device_id_invalid_type"));
    Ok(())
}

#[tokio::test]
async fn outlier_detected_against_device_history() -> Result<()> {
    // ---
    let base = spawn_app(&[]).await?;
    let client = Client::new();

    for t in [20.0, 21.0, 20.5, 21.5, 20.0, 21.0] {
        let body = json!({ "temperature": t, "humidity": 50.0, "device_id": "lab" });
        assert_ok!(post_reading(&client, &base, body).await);
    }

    // another device's history must not count
    let (_, other) = post_reading(
        &client,
        &base,
        json!({ "temperature": 45.0, "humidity": 50.0, "device_id": "attic" }),
    )
    .await?;
    assert_eq!(other["outliers_detected"]["temperature"], false);

    let (_, body) = post_reading(
        &client,
        &base,
        json!({ "temperature": 45.0, "humidity": 50.0, "device_id": "lab" }),
    )
    .await?;
    assert_eq!(body["is_valid"], true);
    assert_eq!(body["outliers_detected"]["temperature"], true);
    assert_eq!(body["outliers_detected"]["humidity"], false);
    assert_eq!(body["data_quality_score"], 90.0);

    let (_, stats) = get_json(&client, format!("{base}/etl/stats")).await?;
    assert_eq!(stats["stats"]["processed"], 8);
    assert_eq!(stats["stats"]["outliers"], 1);

    let resp = client.post(format!("{base}/etl/stats/reset")).send().await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let (_, stats) = get_json(&client, format!("{base}/etl/stats")).await?;
    assert_eq!(stats["stats"]["processed"], 0);
    Ok(())
}

#[tokio::test]
async fn empty_summary_reports_nulls() -> Result<()> {
    // ---
    let base = spawn_app(&[]).await?;
    let (status, body) = get_json(&Client::new(), format!("{base}/analytics/summary")).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timeframe"], "24h");
    assert_eq!(body["data_quality"]["total_readings"], 0);
    assert!(body["temperature"]["average"].is_null());
    assert!(body["data_quality"]["outlier_rate_percent"].is_null());
    Ok(())
}

#[tokio::test]
async fn invalid_analytics_parameters_are_rejected() -> Result<()> {
    // ---
    let base = spawn_app(&[]).await?;
    let client = Client::new();

    for days in ["0", "91"] {
        let (status, body) = get_json(&client, format!("{base}/analytics/trends?days={days}")).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap_or_default().contains("days"));
    }

    let (status, _) = get_json(&client, format!("{base}/analytics/summary?timeframe=2w")).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn trends_and_dashboard_over_hourly_readings() -> Result<()> {
    // ---
    let base = spawn_app(&[]).await?;
    let client = Client::new();
    let now = Utc::now();

    for k in 0..6i64 {
        let recorded_at = now - Duration::hours(6 - k);
        let body = json!({
            "temperature": 20.0 + 2.0 * k as f64,
            "humidity": 50.0,
            "device_id": "roof",
            "recorded_at": recorded_at.to_rfc3339(),
        });
        assert_ok!(post_reading(&client, &base, body).await);
    }

    let (status, trends) = get_json(&client, format!("{base}/analytics/trends?days=1")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trends["data_points"], 6);
    assert_eq!(trends["temperature_trend"]["direction"], "increasing");
    assert_eq!(trends["temperature_trend"]["interpretation"], "temperature is rapidly increasing");
    assert_eq!(trends["humidity_trend"]["direction"], "stable");

    let (status, dashboard) = get_json(&client, format!("{base}/analytics/dashboard")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["summary"]["total_readings"], 6);
    assert_eq!(dashboard["alerts"]["data_freshness"], "good");
    assert_eq!(dashboard["trends"]["temperature"]["direction"], "increasing");
    assert_eq!(dashboard["current_metrics"]["temperature"]["minimum"], 20.0);
    assert_eq!(dashboard["current_metrics"]["temperature"]["maximum"], 30.0);

    let (status, quality) = get_json(&client, format!("{base}/analytics/data-quality")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quality["validation_issues"]["invalid_records"], 0);
    Ok(())
}

#[tokio::test]
async fn sync_without_upstream_is_not_found() -> Result<()> {
    // ---
    let base = spawn_app(&[]).await?;
    let resp = Client::new().post(format!("{base}/etl/sync")).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

/// Two-page cursor-paginated upstream stand-in.
async fn upstream_page(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    // ---
    match params.get("cursor").map(String::as_str) {
        None => Json(json!({
            "results": [
                { "temperature": 21.0, "humidity": 45.0, "device_id": "up-1" },
                { "temperature": 22.0, "humidity": 46.0, "device_id": "up-1" }
            ],
            "next_cursor": "page-2"
        })),
        Some(_) => Json(json!({
            "results": [
                { "temperature": 150.0, "humidity": 45.0, "device_id": "up-2" }
            ]
        })),
    }
}

#[tokio::test]
async fn sync_pulls_every_upstream_page() -> Result<()> {
    // ---
    let upstream = serve(Router::new().route("/api/readings", get(upstream_page))).await?;
    let api_url = format!("http://{upstream}/api/readings");
    let base = spawn_app(&[("SENSOR_API_URL", api_url.as_str())]).await?;
    let client = Client::new();

    let resp = client.post(format!("{base}/etl/sync")).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = resp.json().await?;
    assert_eq!(report["pages"], 2);
    assert_eq!(report["total_fetched"], 3);
    assert_eq!(report["processed"], 3);
    assert_eq!(report["error_count"], 0);

    let (_, stats) = get_json(&client, format!("{base}/etl/stats")).await?;
    assert_eq!(stats["stats"]["valid"], 2);
    assert_eq!(stats["stats"]["invalid"], 1);
    Ok(())
}
