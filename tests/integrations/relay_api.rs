//! End-to-end tests for the HTTP surface.

use anyhow::Result;
use serde_json::json;
use sigrelay::{
    errors::TransportError,
    server::{ApiResponse, ApiStatus},
    test_utils::{MemoryStorage, RecordingTransport},
};
use std::{sync::Arc, time::Duration};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::app::TestAppBuilder;

#[tokio::test]
async fn test_subscribe_broadcast_unsubscribe_flow() -> Result<()> {
    let app = TestAppBuilder::new().build().await?;

    let reply = app.post("/subscribe", json!({ "user_id": "1001" })).await?;
    assert_eq!(reply, ApiResponse::success("User 1001 subscribed"));

    let reply = app.post("/subscribe", json!({ "user_id": "1001" })).await?;
    assert_eq!(reply, ApiResponse::error("User already subscribed"));

    let reply = app.post("/tradingview", json!({ "message": "BUY EURUSD" })).await?;
    assert_eq!(reply.status, ApiStatus::Success);
    assert_eq!(
        app.transport.sent(),
        vec![("1001".to_string(), "BUY EURUSD".to_string())]
    );

    let reply = app.post("/unsubscribe", json!({ "user_id": "1001" })).await?;
    assert_eq!(reply, ApiResponse::success("User 1001 unsubscribed"));

    let reply = app.post("/tradingview", json!({ "message": "SELL EURUSD" })).await?;
    assert_eq!(reply, ApiResponse::no_subscribers());
    assert_eq!(app.transport.sent().len(), 1);

    app.shutdown(Duration::from_secs(2)).await
}

#[tokio::test]
async fn test_no_subscribers_response_shape() -> Result<()> {
    let app = TestAppBuilder::new().build().await?;

    let (status, body) = {
        let response = reqwest::Client::new()
            .post(format!("http://{}/tradingview", app.addr))
            .json(&json!({ "message": "hello" }))
            .send()
            .await?;
        (response.status(), response.text().await?)
    };
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(serde_json::from_str::<serde_json::Value>(&body)?, json!({ "status": "no_subscribers" }));
    assert!(app.transport.sent().is_empty());

    app.shutdown(Duration::from_secs(2)).await
}

#[tokio::test]
async fn test_missing_user_id_is_an_error() -> Result<()> {
    let app = TestAppBuilder::new().build().await?;

    let reply = app.post("/subscribe", json!({})).await?;
    assert_eq!(reply, ApiResponse::error("Missing user_id"));

    let reply = app.post("/unsubscribe", json!({ "user_id": "" })).await?;
    assert_eq!(reply, ApiResponse::error("Missing user_id"));
    assert!(app.store.is_empty());

    app.shutdown(Duration::from_secs(2)).await
}

#[tokio::test]
async fn test_unsubscribe_unknown_user() -> Result<()> {
    let app = TestAppBuilder::new().build().await?;

    let reply = app.post("/unsubscribe", json!({ "user_id": "42" })).await?;
    assert_eq!(reply, ApiResponse::error("User not found in subscription list"));

    app.shutdown(Duration::from_secs(2)).await
}

#[tokio::test]
async fn test_numeric_user_id_is_accepted() -> Result<()> {
    let app = TestAppBuilder::new().build().await?;

    let reply = app.post("/subscribe", json!({ "user_id": 1001 })).await?;
    assert_eq!(reply, ApiResponse::success("User 1001 subscribed"));
    assert!(app.store.contains("1001"));

    app.shutdown(Duration::from_secs(2)).await
}

#[tokio::test]
async fn test_invalid_json_is_reported_with_200() -> Result<()> {
    let app = TestAppBuilder::new().build().await?;

    for path in ["/tradingview", "/subscribe", "/unsubscribe"] {
        let reply = app.post_raw(path, "application/json", "{ nope").await?;
        assert_eq!(reply.status, ApiStatus::Error, "path {}", path);
        assert!(reply.message.unwrap().starts_with("Invalid JSON body"));
    }

    app.shutdown(Duration::from_secs(2)).await
}

#[tokio::test]
async fn test_non_object_bodies_are_rejected() -> Result<()> {
    let app = TestAppBuilder::new().build().await?;
    app.post("/subscribe", json!({ "user_id": "1" })).await?;

    for path in ["/tradingview", "/subscribe", "/unsubscribe"] {
        for body in [r#"["555"]"#, r#"["1"]"#, "[]", r#""x""#, "42"] {
            let reply = app.post_raw(path, "application/json", body).await?;
            assert_eq!(reply.status, ApiStatus::Error, "path {} body {}", path, body);
            assert_eq!(
                reply.message.as_deref(),
                Some("Invalid JSON body: expected a JSON object"),
                "path {} body {}",
                path,
                body
            );
        }
    }

    assert!(app.transport.sent().is_empty());
    assert_eq!(app.store.len(), 1);
    assert!(app.store.contains("1"));
    assert!(!app.store.contains("555"));

    app.shutdown(Duration::from_secs(2)).await
}

#[tokio::test]
async fn test_plain_text_content_type_is_parsed_as_json() -> Result<()> {
    let app = TestAppBuilder::new().build().await?;
    app.post("/subscribe", json!({ "user_id": "7" })).await?;

    let reply = app
        .post_raw("/tradingview", "text/plain", r#"{"message":"BUY BTCUSD","ticker":"BTCUSD"}"#)
        .await?;
    assert_eq!(reply.status, ApiStatus::Success);
    assert_eq!(app.transport.sent(), vec![("7".to_string(), "BUY BTCUSD".to_string())]);

    app.shutdown(Duration::from_secs(2)).await
}

#[tokio::test]
async fn test_missing_message_uses_default() -> Result<()> {
    let app = TestAppBuilder::new()
        .with_config_modifier(|config| config.relay.default_message = "Signal!".to_string())
        .build()
        .await?;
    app.post("/subscribe", json!({ "user_id": "7" })).await?;

    app.post("/tradingview", json!({})).await?;
    assert_eq!(app.transport.sent(), vec![("7".to_string(), "Signal!".to_string())]);

    app.shutdown(Duration::from_secs(2)).await
}

#[tokio::test]
async fn test_partial_failure_still_reports_success() -> Result<()> {
    let transport = RecordingTransport::new();
    transport.fail_for(
        "2",
        TransportError::Api {
            status: 403,
            description: "Forbidden: bot was blocked by the user".to_string(),
        },
    );
    let app = TestAppBuilder::new().with_transport(transport).build().await?;
    for id in ["1", "2", "3"] {
        app.post("/subscribe", json!({ "user_id": id })).await?;
    }

    let reply = app.post("/tradingview", json!({ "message": "BUY" })).await?;

    assert_eq!(reply, ApiResponse::success("Signal sent to subscribers"));
    for id in ["1", "2", "3"] {
        assert_eq!(app.transport.send_count(id), 1, "recipient {}", id);
    }

    app.shutdown(Duration::from_secs(2)).await
}

#[tokio::test]
async fn test_persistence_failure_still_reports_success() -> Result<()> {
    let app = TestAppBuilder::new()
        .with_storage(Arc::new(MemoryStorage::failing()))
        .build()
        .await?;

    let reply = app.post("/subscribe", json!({ "user_id": "1001" })).await?;
    assert_eq!(reply, ApiResponse::success("User 1001 subscribed"));
    assert!(app.store.contains("1001"));

    app.post("/tradingview", json!({ "message": "BUY" })).await?;
    assert_eq!(app.transport.send_count("1001"), 1);

    app.shutdown(Duration::from_secs(2)).await
}

#[tokio::test]
async fn test_concurrent_subscribes_over_http() -> Result<()> {
    let storage = MemoryStorage::new();
    let app = TestAppBuilder::new()
        .with_storage(Arc::new(storage.clone()))
        .build()
        .await?;

    let requests = (0..20).map(|i| app.post("/subscribe", json!({ "user_id": i.to_string() })));
    let replies = futures::future::try_join_all(requests).await?;

    assert!(replies.iter().all(|r| r.status == ApiStatus::Success));
    assert_eq!(app.store.len(), 20);
    assert_eq!(storage.saved().len(), 20);

    app.shutdown(Duration::from_secs(2)).await
}

#[tokio::test]
async fn test_metrics_endpoint_absent_by_default() -> Result<()> {
    let app = TestAppBuilder::new().build().await?;

    let (status, _) = app.get_text("/metrics").await?;
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);

    app.shutdown(Duration::from_secs(2)).await
}

// The Prometheus recorder is process-global, so only this test enables it.
#[tokio::test]
async fn test_metrics_endpoint_renders_counters() -> Result<()> {
    let app = TestAppBuilder::new()
        .with_config_modifier(|config| config.metrics.enabled = true)
        .build()
        .await?;
    app.post("/subscribe", json!({ "user_id": "1" })).await?;
    app.post("/tradingview", json!({ "message": "BUY" })).await?;

    let (status, body) = app.get_text("/metrics").await?;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert!(body.contains("relay_alerts_received_total"), "body: {}", body);

    app.shutdown(Duration::from_secs(2)).await
}
