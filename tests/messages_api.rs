//! End-to-end tests for `/api/messages` over the in-memory store.

#![allow(clippy::panic)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use tower::ServiceExt;

use message_board::api;
use message_board::app_state::AppState;
use message_board::domain::Message;
use message_board::persistence::{ConnectionManager, LifecyclePolicy, MemoryDatabase};

fn make_app(db: &Arc<MemoryDatabase>, policy: LifecyclePolicy) -> Router {
    let connections = Arc::new(ConnectionManager::new(db.connector(), policy));
    api::build_router().with_state(AppState::new(connections, 50))
}

async fn send(app: &Router, method: Method, body: &str) -> (StatusCode, Vec<u8>) {
    let Ok(request) = Request::builder()
        .method(method)
        .uri("/api/messages")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
    else {
        panic!("invalid request");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router failed");
    };
    let status = response.status();
    let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body read failed");
    };
    (status, bytes.to_vec())
}

async fn list(app: &Router) -> Vec<Message> {
    let (status, body) = send(app, Method::GET, "").await;
    assert_eq!(status, StatusCode::OK);
    let Ok(messages) = serde_json::from_slice::<Vec<Message>>(&body) else {
        panic!("invalid list body");
    };
    messages
}

#[tokio::test]
async fn post_then_get_round_trip() {
    let db = MemoryDatabase::new();
    let app = make_app(&db, LifecyclePolicy::Singleton);

    let (status, body) = send(&app, Method::POST, r#"{"text":"  hello  "}"#).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.is_empty());

    let messages = list(&app).await;
    assert_eq!(messages.len(), 1);
    let Some(message) = messages.first() else {
        panic!("no message");
    };
    assert_eq!(message.text, "hello");
}

#[tokio::test]
async fn get_returns_iso_timestamps_newest_first() {
    let db = MemoryDatabase::new();
    let app = make_app(&db, LifecyclePolicy::Ephemeral);
    for text in ["a", "b", "c"] {
        let (status, _) = send(&app, Method::POST, &format!(r#"{{"text":"{text}"}}"#)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = send(&app, Method::GET, "").await;
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(&body) else {
        panic!("invalid json");
    };
    let Some(items) = value.as_array() else {
        panic!("expected array");
    };
    let texts: Vec<&str> = items.iter().filter_map(|m| m["text"].as_str()).collect();
    assert_eq!(texts, ["c", "b", "a"]);
    for item in items {
        assert!(item["id"].is_i64());
        let Some(ts) = item["timestamp"].as_str() else {
            panic!("timestamp must be a string");
        };
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }
    assert_eq!(db.open_count(), db.close_count());
}

#[tokio::test]
async fn get_caps_at_fifty_most_recent() {
    let db = MemoryDatabase::new();
    let app = make_app(&db, LifecyclePolicy::Singleton);
    for i in 0..60 {
        let (status, _) = send(&app, Method::POST, &format!(r#"{{"text":"m{i}"}}"#)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let messages = list(&app).await;
    assert_eq!(messages.len(), 50);
    assert_eq!(messages.first().map(|m| m.text.as_str()), Some("m59"));
    assert_eq!(messages.last().map(|m| m.text.as_str()), Some("m10"));
}

#[tokio::test]
async fn invalid_text_is_400_and_not_stored() {
    let db = MemoryDatabase::new();
    let app = make_app(&db, LifecyclePolicy::Singleton);

    for body in [
        r#"{"text":""}"#,
        r#"{"text":"   "}"#,
        r#"{"text":null}"#,
        r#"{"text":42}"#,
        r#"{}"#,
        "not json",
    ] {
        let (status, response) = send(&app, Method::POST, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        let Ok(error) = serde_json::from_slice::<serde_json::Value>(&response) else {
            panic!("error body must be json");
        };
        assert_eq!(error["error"]["code"], 1001);
    }
    assert_eq!(db.row_count().await, 0);
}

#[tokio::test]
async fn other_methods_are_405() {
    let db = MemoryDatabase::new();
    let app = make_app(&db, LifecyclePolicy::Singleton);

    for method in [Method::PUT, Method::DELETE, Method::PATCH] {
        let (status, _) = send(&app, method, "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}

#[tokio::test]
async fn storage_failure_is_generic_500() {
    let db = MemoryDatabase::new();
    let app = make_app(&db, LifecyclePolicy::Ephemeral);
    assert_eq!(list(&app).await.len(), 0);

    db.fail_queries(true);
    let (status, body) = send(&app, Method::POST, r#"{"text":"x"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let Ok(text) = String::from_utf8(body) else {
        panic!("utf-8 body");
    };
    assert!(!text.contains("server closed the connection"));
    assert_eq!(db.open_count(), db.close_count());
}

#[tokio::test]
async fn concurrent_first_requests_share_one_schema() {
    let db = MemoryDatabase::new();
    let app = make_app(&db, LifecyclePolicy::Singleton);

    let (a, b) = tokio::join!(
        send(&app, Method::GET, ""),
        send(&app, Method::POST, r#"{"text":"race"}"#),
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::CREATED);
    assert_eq!(db.tables_created(), 1);
    assert_eq!(db.open_count(), 1);
}

#[tokio::test]
async fn serves_over_tcp() {
    let db = MemoryDatabase::new();
    let app = make_app(&db, LifecyclePolicy::Singleton);
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/messages");

    let Ok(posted) = client
        .post(&url)
        .json(&serde_json::json!({ "text": "over the wire" }))
        .send()
        .await
    else {
        panic!("post failed");
    };
    assert_eq!(posted.status(), reqwest::StatusCode::CREATED);

    let Ok(listed) = client.get(&url).send().await else {
        panic!("get failed");
    };
    assert_eq!(listed.status(), reqwest::StatusCode::OK);
    let Ok(messages) = listed.json::<Vec<Message>>().await else {
        panic!("invalid list body");
    };
    assert_eq!(messages.len(), 1);

    let Ok(health) = client.get(format!("http://{addr}/health")).send().await else {
        panic!("health failed");
    };
    let Ok(health) = health.json::<serde_json::Value>().await else {
        panic!("invalid health body");
    };
    assert_eq!(health["schema_ready"], true);
    assert_eq!(health["connection_policy"], "singleton");
}
