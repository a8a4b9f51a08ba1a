use app_config::AppConfig;
use app_database::Database;
use app_error::AppResult;
use app_middleware::{CredentialHasher, TokenCodec};
use app_models::User;
use std::sync::Arc;

use crate::service::{
    AuthService, AuthServiceTrait, TodoStore, TodoStoreTrait, UserStore, UserStoreTrait, schema,
};

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: Arc<dyn AuthServiceTrait>,
    pub users: Arc<dyn UserStoreTrait>,
    pub todos: Arc<dyn TodoStoreTrait>,
}

impl AppState {
    /// Apply the schema and wire the services from configuration
    pub async fn new(db: Arc<Database>, config: &AppConfig) -> AppResult<Self> {
        schema::apply(&db).await?;

        let hasher = Arc::new(CredentialHasher::new(&config.security.password.argon2)?);
        let tokens = TokenCodec::new(&config.security.jwt)?;

        let users: Arc<dyn UserStoreTrait> =
            Arc::new(UserStore::new(Arc::clone(&db), Arc::clone(&hasher)));
        let todos: Arc<dyn TodoStoreTrait> = Arc::new(TodoStore::new(Arc::clone(&db)));
        let auth: Arc<dyn AuthServiceTrait> =
            Arc::new(AuthService::new(Arc::clone(&users), tokens, hasher));

        Ok(Self {
            db,
            auth,
            users,
            todos,
        })
    }
}

/// The caller resolved from the bearer token, stored in request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);
