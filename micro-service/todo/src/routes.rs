use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use axum::{
    Router, middleware,
    routing::{get, patch, post, put},
};

use app_config::{AppConfig, CorsConfig};
use app_error::middleware_handling::error_handling_middleware;
use app_middleware::api_middleware::{logging_middleware, security_headers_middleware};

use crate::{
    handlers::{
        auth::{login_for_access_token, refresh_access_token},
        health::health_check,
        todos::{create_todo, delete_todo, list_todos, patch_todo},
        users::{create_user, delete_user, read_user, read_users, update_user},
    },
    middleware::auth_middleware,
    state::AppState,
};

fn cors_layer(cors_config: &CorsConfig) -> CorsLayer {
    CorsLayer::new()
        // "*" allows any origin, otherwise use the exact list
        .allow_origin(if cors_config.allowed_origins.iter().any(|o| o == "*") {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(
                cors_config
                    .allowed_origins
                    .iter()
                    .filter_map(|origin| origin.parse().ok())
                    .collect::<Vec<_>>(),
            )
        })
        .allow_methods(
            cors_config
                .allowed_methods
                .iter()
                .filter_map(|method| method.parse().ok())
                .collect::<Vec<_>>(),
        )
        .allow_headers(
            cors_config
                .allowed_headers
                .iter()
                .filter_map(|header| header.parse().ok())
                .collect::<Vec<_>>(),
        )
}

pub fn create_routes(state: AppState, config: &AppConfig) -> Router {
    let bearer = || middleware::from_fn_with_state(state.clone(), auth_middleware);

    let app = Router::new()
        .route("/auth/token", post(login_for_access_token))
        .route(
            "/auth/refresh_token",
            post(refresh_access_token).route_layer(bearer()),
        )
        .route("/users/", post(create_user).get(read_users))
        .route(
            "/users/{user_id}",
            get(read_user).merge(put(update_user).delete(delete_user).route_layer(bearer())),
        )
        .route(
            "/todos/",
            post(create_todo).get(list_todos).route_layer(bearer()),
        )
        .route(
            "/todos/{todo_id}",
            patch(patch_todo).delete(delete_todo).route_layer(bearer()),
        )
        .route("/health", get(health_check))
        .with_state(state.clone());

    // Innermost first: framework failures produced here are reshaped by the
    // error middleware further out
    let app = app
        .layer(RequestBodyLimitLayer::new(config.server.body_limit))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(Duration::from_millis(
            config.server.timeouts.request,
        )))
        .layer(middleware::from_fn(error_handling_middleware));

    let app = app
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(security_headers_middleware));

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config.security.cors));

    app.layer(middleware_stack)
}
