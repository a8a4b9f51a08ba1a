use app_database::{Database, DbService, Filter, Page};
use app_error::{AppError, AppResult};
use app_middleware::{CredentialHasher, validation};
use app_models::{User, UserRecord, UserSchema};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    TODOS_TABLE, USERS_TABLE,
    schema::{EMAIL_INDEX, USERNAME_INDEX},
};

/// Account persistence with uniqueness and self-service rules
#[async_trait]
pub trait UserStoreTrait: Send + Sync {
    /// Register a new account
    async fn create(&self, input: UserSchema) -> AppResult<User>;

    /// Accounts in insertion order
    async fn list(&self, offset: u32, limit: u32) -> AppResult<Vec<User>>;

    async fn get(&self, id: i64) -> AppResult<User>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Replace username, email and password of the caller's own account
    async fn update(&self, id: i64, caller_id: i64, input: UserSchema) -> AppResult<User>;

    /// Remove the caller's own account together with its todos
    async fn delete(&self, id: i64, caller_id: i64) -> AppResult<()>;
}

// Fields overwritten by a full update; `created_at` is kept
#[derive(Serialize)]
struct UserChanges {
    username: String,
    email: String,
    password: String,
}

/// Validated and trimmed registration/update input
struct AccountInput {
    username: String,
    email: String,
    password: String,
}

impl AccountInput {
    fn parse(input: UserSchema) -> AppResult<Self> {
        let account = Self {
            username: validation::sanitize_string(&input.username),
            email: validation::sanitize_string(&input.email),
            password: input.password,
        };

        validation::validate_username(&account.username)?;
        validation::validate_email(&account.email)?;
        validation::validate_password(&account.password)?;
        Ok(account)
    }
}

pub struct UserStore {
    users: DbService<User>,
    hasher: Arc<CredentialHasher>,
}

impl UserStore {
    pub fn new(db: Arc<Database>, hasher: Arc<CredentialHasher>) -> Self {
        Self {
            users: DbService::new(db, USERS_TABLE),
            hasher,
        }
    }

    // Username is checked before email; `exclude` skips the account being updated
    async fn ensure_available(
        &self,
        username: &str,
        email: &str,
        exclude: Option<i64>,
    ) -> AppResult<()> {
        let taken_by_other = |users: &[User]| users.iter().any(|user| Some(user.id) != exclude);

        let same_username = self.users.get_records_by_field("username", username).await?;
        if taken_by_other(&same_username) {
            return Err(AppError::username_exists());
        }

        let same_email = self.users.get_records_by_field("email", email).await?;
        if taken_by_other(&same_email) {
            return Err(AppError::email_exists());
        }

        Ok(())
    }
}

// A concurrent writer can slip past the pre-check; the unique index still
// rejects it and the violation is reported the same way
fn map_unique_violation(error: AppError) -> AppError {
    match error {
        AppError::ResourceExistsError(message) if message.contains(USERNAME_INDEX) => {
            warn!("Username uniqueness enforced by index");
            AppError::username_exists()
        }
        AppError::ResourceExistsError(message) if message.contains(EMAIL_INDEX) => {
            warn!("Email uniqueness enforced by index");
            AppError::email_exists()
        }
        other => other,
    }
}

#[async_trait]
impl UserStoreTrait for UserStore {
    async fn create(&self, input: UserSchema) -> AppResult<User> {
        let account = AccountInput::parse(input)?;
        self.ensure_available(&account.username, &account.email, None)
            .await?;

        let record = UserRecord {
            password: self.hasher.hash(&account.password)?,
            username: account.username,
            email: account.email,
            created_at: Utc::now(),
        };

        let id = self.users.next_id().await?;
        let user = self
            .users
            .create_record(id, record)
            .await
            .map_err(map_unique_violation)?;

        info!("Registered user {} ({})", user.id, user.username);
        Ok(user)
    }

    async fn list(&self, offset: u32, limit: u32) -> AppResult<Vec<User>> {
        self.users
            .find(Filter::new(), Page::new(Some(offset), Some(limit)))
            .await
    }

    async fn get(&self, id: i64) -> AppResult<User> {
        self.users
            .get_record_by_id(id)
            .await?
            .ok_or_else(AppError::user_not_found)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let users = self.users.get_records_by_field("email", email).await?;
        Ok(users.into_iter().next())
    }

    async fn update(&self, id: i64, caller_id: i64, input: UserSchema) -> AppResult<User> {
        if caller_id != id {
            warn!("User {} attempted to update user {}", caller_id, id);
            return Err(AppError::forbidden());
        }

        let account = AccountInput::parse(input)?;
        self.ensure_available(&account.username, &account.email, Some(id))
            .await?;

        let changes = UserChanges {
            password: self.hasher.hash(&account.password)?,
            username: account.username,
            email: account.email,
        };

        self.users
            .merge_record(id, changes)
            .await
            .map_err(map_unique_violation)?
            .ok_or_else(AppError::user_not_found)
    }

    async fn delete(&self, id: i64, caller_id: i64) -> AppResult<()> {
        if caller_id != id {
            warn!("User {} attempted to delete user {}", caller_id, id);
            return Err(AppError::forbidden());
        }

        self.users
            .delete_cascade(id, TODOS_TABLE, "owner_id")
            .await?;

        info!("Deleted user {}", id);
        Ok(())
    }
}
