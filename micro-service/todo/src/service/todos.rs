use app_database::{Database, DbService, Filter, Page};
use app_error::{AppError, AppResult};
use app_models::{Todo, TodoFilter, TodoRecord, TodoSchema, TodoUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::TODOS_TABLE;

/// Owner-scoped todo persistence. A todo owned by someone else is reported
/// exactly like a missing one.
#[async_trait]
pub trait TodoStoreTrait: Send + Sync {
    async fn create(&self, owner_id: i64, input: TodoSchema) -> AppResult<Todo>;

    async fn list(&self, owner_id: i64, filter: &TodoFilter) -> AppResult<Vec<Todo>>;

    async fn patch(&self, id: i64, owner_id: i64, changes: TodoUpdate) -> AppResult<Todo>;

    async fn delete(&self, id: i64, owner_id: i64) -> AppResult<()>;
}

#[derive(Serialize)]
struct TodoPatch {
    #[serde(flatten)]
    changes: TodoUpdate,
    updated_at: DateTime<Utc>,
}

pub struct TodoStore {
    todos: DbService<Todo>,
}

impl TodoStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            todos: DbService::new(db, TODOS_TABLE),
        }
    }

    async fn find_owned(&self, id: i64, owner_id: i64) -> AppResult<Todo> {
        self.todos
            .get_record_by_id(id)
            .await?
            .filter(|todo| todo.owner_id == owner_id)
            .ok_or_else(AppError::todo_not_found)
    }
}

#[async_trait]
impl TodoStoreTrait for TodoStore {
    async fn create(&self, owner_id: i64, input: TodoSchema) -> AppResult<Todo> {
        let now = Utc::now();
        let record = TodoRecord {
            title: input.title,
            description: input.description,
            state: input.state,
            owner_id,
            created_at: now,
            updated_at: now,
        };

        let id = self.todos.next_id().await?;
        let todo = self.todos.create_record(id, record).await?;

        debug!("User {} created todo {}", owner_id, todo.id);
        Ok(todo)
    }

    async fn list(&self, owner_id: i64, filter: &TodoFilter) -> AppResult<Vec<Todo>> {
        let query = Filter::new()
            .eq("owner_id", owner_id)
            .contains_opt("title", filter.title.as_deref())
            .contains_opt("description", filter.description.as_deref())
            .eq_opt("state", filter.state);

        self.todos
            .find(query, Page::new(filter.offset, filter.limit))
            .await
    }

    async fn patch(&self, id: i64, owner_id: i64, changes: TodoUpdate) -> AppResult<Todo> {
        self.find_owned(id, owner_id).await?;

        let patch = TodoPatch {
            changes,
            updated_at: Utc::now(),
        };

        self.todos
            .merge_record(id, patch)
            .await?
            .ok_or_else(AppError::todo_not_found)
    }

    async fn delete(&self, id: i64, owner_id: i64) -> AppResult<()> {
        self.find_owned(id, owner_id).await?;
        self.todos.delete_record(id).await?;

        debug!("User {} deleted todo {}", owner_id, id);
        Ok(())
    }
}
