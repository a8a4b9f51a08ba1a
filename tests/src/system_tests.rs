use app_config::AppConfig;
use app_database::db_connect::initialize_db;
use app_middleware::TokenCodec;
use axum::{
    Router,
    body::Body,
    extract::Request,
    http::{Method, StatusCode, header},
};
use chrono::{Duration, Utc};
use micro_todo::{routes::create_routes, state::AppState};
use serde_json::{Value, json};
use std::io::Write;
use tower::ServiceExt;

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.security.password.argon2.memory = 1024;
    config.security.password.argon2.iterations = 1;
    config
}

// Helper function to create a test app instance backed by a fresh in-memory store
async fn setup_test_app(config: &AppConfig) -> Router {
    let db = initialize_db(&config.database).await.unwrap();
    let state = AppState::new(db, config).await.unwrap();
    create_routes(state, config)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={}&password={}", email, password)))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn access_token(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = login(app, email, password).await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_account_lifecycle() {
    let app = setup_test_app(&test_config()).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/users/",
        None,
        Some(json!({"username": "alice", "email": "a@x.com", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"id": 1, "username": "alice", "email": "a@x.com"}));

    let (status, body) = login(&app, "a@x.com", "pw").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    let alice = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        Method::PUT,
        "/users/1",
        Some(&alice),
        Some(json!({"username": "alice", "email": "alice@x.com", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": 1, "username": "alice", "email": "alice@x.com"}));

    call(
        &app,
        Method::POST,
        "/users/",
        None,
        Some(json!({"username": "bob", "email": "b@x.com", "password": "secret"})),
    )
    .await;
    let bob = access_token(&app, "b@x.com", "secret").await;

    let (status, body) = call(
        &app,
        Method::PUT,
        "/users/1",
        Some(&bob),
        Some(json!({"username": "bob", "email": "b@x.com", "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"detail": "Not enough permissions"}));

    // The old credentials follow the email change
    let (status, _) = login(&app, "a@x.com", "pw").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let alice = access_token(&app, "alice@x.com", "pw").await;

    let (status, body) = call(&app, Method::DELETE, "/users/1", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = call(&app, Method::GET, "/users/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"users": [{"id": 2, "username": "bob", "email": "b@x.com"}]})
    );
}

#[tokio::test]
async fn test_todo_lifecycle() {
    let app = setup_test_app(&test_config()).await;
    call(
        &app,
        Method::POST,
        "/users/",
        None,
        Some(json!({"username": "alice", "email": "a@x.com", "password": "pw"})),
    )
    .await;
    let token = access_token(&app, "a@x.com", "pw").await;

    let (status, created) = call(
        &app,
        Method::POST,
        "/todos/",
        Some(&token),
        Some(json!({"title": "Buy milk", "description": "2 litres", "state": "todo"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["state"], "todo");

    let (status, patched) = call(
        &app,
        Method::PATCH,
        "/todos/1",
        Some(&token),
        Some(json!({"state": "done"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["state"], "done");
    assert_eq!(patched["title"], "Buy milk");
    assert_eq!(patched["created_at"], created["created_at"]);

    let (_, listed) = call(&app, Method::GET, "/todos/?state=done", Some(&token), None).await;
    assert_eq!(listed["todos"].as_array().unwrap().len(), 1);
    assert_eq!(listed["todos"][0], patched);

    let (status, _) = call(&app, Method::DELETE, "/todos/1", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = call(&app, Method::GET, "/todos/", Some(&token), None).await;
    assert_eq!(listed, json!({"todos": []}));
}

#[tokio::test]
async fn test_token_expires_with_configured_lifetime() {
    let mut config = test_config();
    config.security.jwt.expiry_minutes = 5;
    let app = setup_test_app(&config).await;
    call(
        &app,
        Method::POST,
        "/users/",
        None,
        Some(json!({"username": "alice", "email": "a@x.com", "password": "pw"})),
    )
    .await;

    let codec = TokenCodec::new(&config.security.jwt).unwrap();
    let fresh = codec
        .encode_at("a@x.com", Utc::now() - Duration::minutes(4))
        .unwrap();
    let stale = codec
        .encode_at("a@x.com", Utc::now() - Duration::minutes(6))
        .unwrap();

    let (status, _) = call(&app, Method::POST, "/auth/refresh_token", Some(&fresh), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::POST, "/auth/refresh_token", Some(&stale), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"detail": "Invalid or expired token"}));
}

#[tokio::test]
async fn test_tokens_from_another_secret_are_rejected() {
    let config = test_config();
    let app = setup_test_app(&config).await;
    call(
        &app,
        Method::POST,
        "/users/",
        None,
        Some(json!({"username": "alice", "email": "a@x.com", "password": "pw"})),
    )
    .await;

    let mut foreign = config.security.jwt.clone();
    foreign.secret = "someone-elses-secret-key-entirely".to_string();
    let forged = TokenCodec::new(&foreign).unwrap().encode("a@x.com").unwrap();

    let (status, body) = call(&app, Method::GET, "/todos/", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"detail": "Could not validate credentials"}));
}

#[tokio::test]
async fn test_service_boots_from_config_file() {
    let mut config = test_config();
    config.database.namespace = "fileNs".to_string();
    config.security.jwt.algorithm = "HS512".to_string();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(&config).unwrap().as_bytes())
        .unwrap();

    let loaded = AppConfig::from_file(file.path()).unwrap();
    loaded.validate().unwrap();
    let app = setup_test_app(&loaded).await;

    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}
