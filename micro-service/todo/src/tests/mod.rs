use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use app_config::{AppConfig, Argon2Config};
use app_database::{Database, db_connect::initialize_memory_db};
use app_middleware::{CredentialHasher, TokenCodec};

use crate::{
    routes::create_routes,
    service::schema,
    state::AppState,
};

/// Default configuration with cheap password hashing
pub(crate) fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.security.password.argon2 = Argon2Config {
        memory: 1024,
        iterations: 1,
        parallelism: 1,
    };
    config
}

pub(crate) fn test_hasher() -> Arc<CredentialHasher> {
    Arc::new(CredentialHasher::new(&test_config().security.password.argon2).unwrap())
}

/// A fresh in-memory database with the service schema applied
pub(crate) async fn test_db() -> Arc<Database> {
    let db = initialize_memory_db("test_namespace", "test_db")
        .await
        .unwrap();
    schema::apply(&db).await.unwrap();
    db
}

async fn test_app() -> Router {
    let config = test_config();
    let state = AppState::new(test_db().await, &config).await.unwrap();
    create_routes(state, &config)
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn create_user(app: &Router, username: &str, email: &str, password: &str) -> Value {
    let response = send(
        app,
        json_request(
            "POST",
            "/users/",
            None,
            json!({"username": username, "email": email, "password": password}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn login(app: &Router, email: &str, password: &str) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri("/auth/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={}&password={}", email, password)))
        .unwrap();
    send(app, request).await
}

async fn token_for(app: &Router, email: &str, password: &str) -> String {
    let response = login(app, email, password).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn create_todo(app: &Router, token: &str, title: &str, description: &str, state: &str) {
    let response = send(
        app,
        json_request(
            "POST",
            "/todos/",
            Some(token),
            json!({"title": title, "description": description, "state": state}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;

    let response = send(&app, bare_request("GET", "/health", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_create_user_returns_public_view() {
    let app = test_app().await;

    let body = create_user(&app, "alice", "a@x.com", "pw").await;

    assert_eq!(body, json!({"id": 1, "username": "alice", "email": "a@x.com"}));
}

#[tokio::test]
async fn test_create_user_conflicts() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/users/",
            None,
            json!({"username": "alice", "email": "other@x.com", "password": "pw"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "Username already exists");

    let response = send(
        &app,
        json_request(
            "POST",
            "/users/",
            None,
            json!({"username": "alicia", "email": "a@x.com", "password": "pw"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "Email already exists");
}

#[tokio::test]
async fn test_create_user_validates_input() {
    let app = test_app().await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/users/",
            None,
            json!({"username": "alice", "email": "not-an-email", "password": "pw"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(
        &app,
        json_request("POST", "/users/", None, json!({"username": "alice"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(response).await["detail"].is_string());
}

#[tokio::test]
async fn test_read_users_and_user() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;
    create_user(&app, "bob", "b@x.com", "pw").await;

    let response = send(&app, bare_request("GET", "/users/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"users": [
            {"id": 1, "username": "alice", "email": "a@x.com"},
            {"id": 2, "username": "bob", "email": "b@x.com"}
        ]})
    );

    let response = send(&app, bare_request("GET", "/users/?skip=1&limit=1", None)).await;
    let users = body_json(response).await["users"].clone();
    assert_eq!(users, json!([{"id": 2, "username": "bob", "email": "b@x.com"}]));

    let response = send(&app, bare_request("GET", "/users/2", None)).await;
    assert_eq!(body_json(response).await["username"], "bob");

    let response = send(&app, bare_request("GET", "/users/666", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({"detail": "User not found!"}));
}

#[tokio::test]
async fn test_out_of_range_paging_is_a_client_error() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;
    let token = token_for(&app, "a@x.com", "pw").await;

    for (uri, token) in [
        ("/users/?limit=4294967296", None),
        ("/users/?skip=18446744073709551615", None),
        ("/todos/?offset=18446744073709551615", Some(token.as_str())),
        ("/todos/?limit=4294967296", Some(token.as_str())),
    ] {
        let response = send(&app, bare_request("GET", uri, token)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body_json(response).await["detail"].is_string(), "{}", uri);
    }

    // The largest accepted window still queries cleanly
    let response = send(&app, bare_request("GET", "/users/?limit=4294967295", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["users"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_login_issues_bearer_token() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;

    let response = login(&app, "a@x.com", "pw").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn test_login_failures_are_generic() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;

    for (email, password) in [("a@x.com", "wrong"), ("nobody@x.com", "pw")] {
        let response = login(&app, email, password).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"detail": "Incorrect email or password"})
        );
    }
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = test_app().await;

    for (method, uri) in [
        ("POST", "/auth/refresh_token"),
        ("GET", "/todos/"),
        ("DELETE", "/todos/1"),
        ("DELETE", "/users/1"),
    ] {
        let response = send(&app, bare_request(method, uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(
            body_json(response).await["detail"],
            "Could not validate credentials"
        );
    }

    let response = send(&app, bare_request("GET", "/todos/", Some("not-a-jwt"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;

    let codec = TokenCodec::new(&test_config().security.jwt).unwrap();
    let stale = codec
        .encode_at("a@x.com", Utc::now() - Duration::minutes(31))
        .unwrap();

    let response = send(&app, bare_request("POST", "/auth/refresh_token", Some(&stale))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"detail": "Invalid or expired token"})
    );
}

#[tokio::test]
async fn test_token_for_deleted_user_is_invalid() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;
    let token = token_for(&app, "a@x.com", "pw").await;

    let response = send(&app, bare_request("DELETE", "/users/1", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, bare_request("GET", "/todos/", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["detail"],
        "Could not validate credentials"
    );
}

#[tokio::test]
async fn test_refresh_token() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;
    let token = token_for(&app, "a@x.com", "pw").await;

    let response = send(&app, bare_request("POST", "/auth/refresh_token", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");

    let refreshed = body["access_token"].as_str().unwrap();
    let response = send(&app, bare_request("GET", "/todos/", Some(refreshed))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_and_delete_other_user_is_forbidden() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;
    create_user(&app, "bob", "b@x.com", "pw").await;
    let bob = token_for(&app, "b@x.com", "pw").await;

    let response = send(
        &app,
        json_request(
            "PUT",
            "/users/1",
            Some(&bob),
            json!({"username": "bob", "email": "bob@x.com", "password": "pw"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({"detail": "Not enough permissions"})
    );

    let response = send(&app, bare_request("DELETE", "/users/1", Some(&bob))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_user_conflicts_with_other_accounts() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;
    create_user(&app, "bob", "b@x.com", "pw").await;
    let alice = token_for(&app, "a@x.com", "pw").await;

    let response = send(
        &app,
        json_request(
            "PUT",
            "/users/1",
            Some(&alice),
            json!({"username": "bob", "email": "a@x.com", "password": "pw"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "Username already exists");
}

#[tokio::test]
async fn test_create_todo_response_shape() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;
    let token = token_for(&app, "a@x.com", "pw").await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/todos/",
            Some(&token),
            json!({"title": "Test todo", "description": "Test todo description", "state": "draft", "owner_id": 42}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["title"], "Test todo");
    assert_eq!(body["description"], "Test todo description");
    assert_eq!(body["state"], "draft");
    assert!(body["created_at"].is_string());
    assert!(body["updated_at"].is_string());
    assert!(body.get("owner_id").is_none());
}

#[tokio::test]
async fn test_create_todo_rejects_unknown_state() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;
    let token = token_for(&app, "a@x.com", "pw").await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/todos/",
            Some(&token),
            json!({"title": "t", "description": "d", "state": "test"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_list_todos_filters() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;
    let token = token_for(&app, "a@x.com", "pw").await;

    for _ in 0..5 {
        create_todo(&app, &token, "Test todo 1", "description", "draft").await;
    }
    create_todo(&app, &token, "Other", "test todo combined", "done").await;
    create_todo(&app, &token, "Test todo combined", "other", "done").await;
    create_todo(&app, &token, "Test todo combined", "test todo combined", "done").await;

    let count = |uri: &'static str| {
        let app = app.clone();
        let token = token.clone();
        async move {
            let response = send(&app, bare_request("GET", uri, Some(&token))).await;
            assert_eq!(response.status(), StatusCode::OK);
            body_json(response).await["todos"].as_array().unwrap().len()
        }
    };

    assert_eq!(count("/todos/").await, 8);
    assert_eq!(count("/todos/?title=Test%20todo%201").await, 5);
    assert_eq!(count("/todos/?description=combined").await, 2);
    assert_eq!(count("/todos/?state=draft").await, 5);
    assert_eq!(
        count("/todos/?title=Test%20todo%20combined&description=combined&state=done").await,
        1
    );
    assert_eq!(count("/todos/?offset=1&limit=2").await, 2);
    assert_eq!(count("/todos/?state=draft&offset=4").await, 1);
}

#[tokio::test]
async fn test_todos_are_private_to_owner() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;
    create_user(&app, "bob", "b@x.com", "pw").await;
    let alice = token_for(&app, "a@x.com", "pw").await;
    let bob = token_for(&app, "b@x.com", "pw").await;

    create_todo(&app, &alice, "alice's", "secret", "todo").await;

    let response = send(&app, bare_request("GET", "/todos/?title=alice", Some(&bob))).await;
    assert_eq!(body_json(response).await, json!({"todos": []}));

    let response = send(
        &app,
        json_request("PATCH", "/todos/1", Some(&bob), json!({"title": "mine now"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({"detail": "Task not found"}));

    let response = send(&app, bare_request("DELETE", "/todos/1", Some(&bob))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patch_todo() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;
    let token = token_for(&app, "a@x.com", "pw").await;
    create_todo(&app, &token, "Test todo", "description", "draft").await;

    let response = send(
        &app,
        json_request("PATCH", "/todos/1", Some(&token), json!({"title": "teste!"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["title"], "teste!");
    assert_eq!(body["description"], "description");
    assert_eq!(body["state"], "draft");

    let response = send(
        &app,
        json_request("PATCH", "/todos/10", Some(&token), json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({"detail": "Task not found"}));
}

#[tokio::test]
async fn test_delete_todo() {
    let app = test_app().await;
    create_user(&app, "alice", "a@x.com", "pw").await;
    let token = token_for(&app, "a@x.com", "pw").await;
    create_todo(&app, &token, "Test todo", "description", "draft").await;

    let response = send(&app, bare_request("DELETE", "/todos/1", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, bare_request("DELETE", "/todos/10", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({"detail": "Task not found"}));
}

#[tokio::test]
async fn test_security_headers_and_unknown_routes() {
    let app = test_app().await;

    let response = send(&app, bare_request("GET", "/nowhere", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(body_json(response).await, json!({"detail": "Not Found"}));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = test_config();
    config.server.body_limit = 64;
    let state = AppState::new(test_db().await, &config).await.unwrap();
    let app = create_routes(state, &config);

    let response = send(
        &app,
        json_request(
            "POST",
            "/users/",
            None,
            json!({"username": "a".repeat(100), "email": "a@x.com", "password": "pw"}),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body_json(response).await["detail"].is_string());
}
