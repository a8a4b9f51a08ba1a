use app_error::AppResult;
use app_models::{LoginForm, Token};
use axum::{Extension, Form, Json, extract::State};

use crate::state::{AppState, CurrentUser};

/// `POST /auth/token`, password grant with the email in `username`
pub async fn login_for_access_token(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Json<Token>> {
    let token = state.auth.login(&form.username, &form.password).await?;
    Ok(Json(token))
}

pub async fn refresh_access_token(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> AppResult<Json<Token>> {
    Ok(Json(state.auth.refresh(&user)?))
}
