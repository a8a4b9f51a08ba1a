use app_error::AppResult;
use app_models::{UserList, UserPublic, UserSchema, UsersQuery};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::state::{AppState, CurrentUser};

pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<UserSchema>,
) -> AppResult<(StatusCode, Json<UserPublic>)> {
    let user = state.users.create(input).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn read_users(
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
) -> AppResult<Json<UserList>> {
    let users = state.users.list(query.skip, query.limit).await?;
    Ok(Json(UserList {
        users: users.into_iter().map(UserPublic::from).collect(),
    }))
}

pub async fn read_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<UserPublic>> {
    Ok(Json(state.users.get(user_id).await?.into()))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Json(input): Json<UserSchema>,
) -> AppResult<Json<UserPublic>> {
    let user = state.users.update(user_id, current.id, input).await?;
    Ok(Json(user.into()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> AppResult<StatusCode> {
    state.users.delete(user_id, current.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
