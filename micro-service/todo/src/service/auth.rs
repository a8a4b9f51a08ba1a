use app_error::{AppError, AppResult};
use app_middleware::{CredentialHasher, TokenCodec};
use app_models::{Token, User};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::UserStoreTrait;

/// Trait defining the authentication service interface
#[async_trait]
pub trait AuthServiceTrait: Send + Sync {
    /// Exchange email and password for an access token
    async fn login(&self, email: &str, password: &str) -> AppResult<Token>;

    /// Resolve the account a bearer token was issued for
    async fn resolve_current_user(&self, token: &str) -> AppResult<User>;

    /// Issue a fresh token for an already authenticated caller
    fn refresh(&self, current_user: &User) -> AppResult<Token>;
}

pub struct AuthService {
    users: Arc<dyn UserStoreTrait>,
    tokens: TokenCodec,
    hasher: Arc<CredentialHasher>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStoreTrait>,
        tokens: TokenCodec,
        hasher: Arc<CredentialHasher>,
    ) -> Self {
        Self {
            users,
            tokens,
            hasher,
        }
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }
}

#[async_trait]
impl AuthServiceTrait for AuthService {
    async fn login(&self, email: &str, password: &str) -> AppResult<Token> {
        // Unknown email and wrong password produce the same error
        let Some(user) = self.users.find_by_email(email.trim()).await? else {
            self.hasher.verify_decoy(password);
            warn!("Login attempt for unknown account");
            return Err(AppError::invalid_credentials());
        };

        if !self.hasher.verify(password, &user.password)? {
            warn!("Login attempt with wrong password for user {}", user.id);
            return Err(AppError::invalid_credentials());
        }

        info!("User {} logged in", user.id);
        Ok(Token::bearer(self.tokens.encode(&user.email)?))
    }

    async fn resolve_current_user(&self, token: &str) -> AppResult<User> {
        let claims = self.tokens.decode(token)?;

        let subject = claims
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or_else(AppError::token_invalid)?;

        let user = self
            .users
            .find_by_email(&subject)
            .await?
            .ok_or_else(AppError::token_invalid)?;

        debug!("Resolved bearer token to user {}", user.id);
        Ok(user)
    }

    fn refresh(&self, current_user: &User) -> AppResult<Token> {
        debug!("Refreshing token for user {}", current_user.id);
        Ok(Token::bearer(self.tokens.encode(&current_user.email)?))
    }
}
