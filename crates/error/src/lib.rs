pub mod macros;
pub mod middleware_handling;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    ConfigError(anyhow::Error),
    DatabaseError(anyhow::Error),
    ServerError(anyhow::Error),
    ValidationError(String),
    NotFoundError(String),
    AuthorizationError(String),
    ResourceExistsError(String),
    InvalidCredentials,
    TokenExpired,
    TokenInvalid,
}

impl AppError {
    // Login failures never reveal whether the email exists
    pub fn invalid_credentials() -> Self {
        Self::InvalidCredentials
    }

    pub fn token_expired() -> Self {
        Self::TokenExpired
    }

    pub fn token_invalid() -> Self {
        Self::TokenInvalid
    }

    pub fn forbidden() -> Self {
        Self::AuthorizationError("Not enough permissions".to_string())
    }

    // Resource errors
    pub fn user_not_found() -> Self {
        Self::NotFoundError("User not found!".to_string())
    }

    pub fn todo_not_found() -> Self {
        Self::NotFoundError("Task not found".to_string())
    }

    pub fn username_exists() -> Self {
        Self::ResourceExistsError("Username already exists".to_string())
    }

    pub fn email_exists() -> Self {
        Self::ResourceExistsError("Email already exists".to_string())
    }

    // Validation errors
    pub fn validation(field: &str, message: &str) -> Self {
        Self::ValidationError(format!("Validation failed for '{}': {}", field, message))
    }

    pub fn database_operation_failed(operation: &str, resource: &str) -> Self {
        Self::DatabaseError(anyhow::anyhow!(
            "Database operation '{}' failed on resource '{}'",
            operation,
            resource
        ))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ResourceExistsError(_) | Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::AuthorizationError(_) => StatusCode::FORBIDDEN,
            Self::NotFoundError(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ConfigError(_) | Self::DatabaseError(_) | Self::ServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the client. Internal failures are collapsed into a
    /// generic message so nothing about the store or config leaks out.
    pub fn detail(&self) -> String {
        match self {
            Self::ValidationError(msg)
            | Self::NotFoundError(msg)
            | Self::AuthorizationError(msg)
            | Self::ResourceExistsError(msg) => msg.clone(),
            Self::InvalidCredentials => "Incorrect email or password".to_string(),
            Self::TokenExpired => "Invalid or expired token".to_string(),
            Self::TokenInvalid => "Could not validate credentials".to_string(),
            Self::ConfigError(_) | Self::DatabaseError(_) | Self::ServerError(_) => {
                "Internal server error".to_string()
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::DatabaseError(_) => "DB_ERROR",
            Self::ServerError(_) => "SERVER_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::NotFoundError(_) => "NOT_FOUND",
            Self::AuthorizationError(_) => "FORBIDDEN",
            Self::ResourceExistsError(_) => "RESOURCE_EXISTS",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenInvalid => "TOKEN_INVALID",
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::ServerError(error)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(e) => write!(f, "Configuration error: {:#}", e),
            Self::DatabaseError(e) => write!(f, "Database error: {:#}", e),
            Self::ServerError(e) => write!(f, "Server error: {:#}", e),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::NotFoundError(msg) => write!(f, "Not found: {}", msg),
            Self::AuthorizationError(msg) => write!(f, "Authorization error: {}", msg),
            Self::ResourceExistsError(msg) => write!(f, "Resource exists: {}", msg),
            Self::InvalidCredentials => write!(f, "Authentication error: invalid credentials"),
            Self::TokenExpired => write!(f, "Authentication error: token expired"),
            Self::TokenInvalid => write!(f, "Authentication error: token invalid"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.code();
        let detail = self.detail();

        if status.is_server_error() {
            tracing::error!(error_code = error_code, status_code = %status.as_u16(), error = %self, "request failed");
        } else {
            tracing::warn!(error_code = error_code, status_code = %status.as_u16(), %detail, "request rejected");
        }

        let mut response = (status, Json(ErrorResponse { detail })).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

pub type AppResult<T> = Result<T, AppError>;

// Extension trait to wrap foreign errors with a specific kind
pub trait AppErrorExt<T> {
    fn config_err(self) -> AppResult<T>;
    fn db_err(self) -> AppResult<T>;
    fn server_err(self) -> AppResult<T>;
}

impl<T, E> AppErrorExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn config_err(self) -> AppResult<T> {
        self.map_err(|e| AppError::ConfigError(e.into()))
    }

    fn db_err(self) -> AppResult<T> {
        self.map_err(|e| AppError::DatabaseError(e.into()))
    }

    fn server_err(self) -> AppResult<T> {
        self.map_err(|e| AppError::ServerError(e.into()))
    }
}
