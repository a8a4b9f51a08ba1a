use app_error::AppError;
use app_middleware::api_middleware::bearer_token;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::state::{AppState, CurrentUser};

/// Rejects requests without a valid bearer token and exposes the caller to
/// handlers as `Extension<CurrentUser>`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .map(str::to_owned)
        .ok_or_else(AppError::token_invalid)?;

    let user = state.auth.resolve_current_user(&token).await?;
    debug!("Authenticated user {} for {}", user.id, req.uri().path());

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
