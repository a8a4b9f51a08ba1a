use app_error::AppResult;
use app_models::{TodoFilter, TodoList, TodoPublic, TodoSchema, TodoUpdate};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::state::{AppState, CurrentUser};

pub async fn create_todo(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(input): Json<TodoSchema>,
) -> AppResult<(StatusCode, Json<TodoPublic>)> {
    let todo = state.todos.create(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(todo.into())))
}

pub async fn list_todos(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(filter): Query<TodoFilter>,
) -> AppResult<Json<TodoList>> {
    let todos = state.todos.list(user.id, &filter).await?;
    Ok(Json(TodoList {
        todos: todos.into_iter().map(TodoPublic::from).collect(),
    }))
}

pub async fn patch_todo(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(todo_id): Path<i64>,
    Json(changes): Json<TodoUpdate>,
) -> AppResult<Json<TodoPublic>> {
    let todo = state.todos.patch(todo_id, user.id, changes).await?;
    Ok(Json(todo.into()))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(todo_id): Path<i64>,
) -> AppResult<StatusCode> {
    state.todos.delete(todo_id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
