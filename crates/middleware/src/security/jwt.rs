use app_config::JwtConfig;
use app_error::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Account email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiry as a unix timestamp
    pub exp: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("malformed token: {0}")]
    Malformed(String),
}

impl From<TokenError> for AppError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Expired => AppError::token_expired(),
            TokenError::Malformed(_) => AppError::token_invalid(),
        }
    }
}

/// Signs and checks HMAC access tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> AppResult<Self> {
        let algorithm = Algorithm::from_str(&config.algorithm).map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!(
                "Unknown JWT algorithm '{}'",
                config.algorithm
            ))
        })?;

        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT algorithm '{}' needs a key pair; only HMAC algorithms are supported",
                config.algorithm
            )));
        }

        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let secret = config.secret.as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm,
            validation,
            ttl: Duration::minutes(config.expiry_minutes as i64),
        })
    }

    pub fn encode(&self, subject: &str) -> AppResult<String> {
        self.encode_at(subject, Utc::now())
    }

    /// Sign a token as if it had been issued at `issued_at`
    pub fn encode_at(&self, subject: &str, issued_at: DateTime<Utc>) -> AppResult<String> {
        let claims = Claims {
            sub: Some(subject.to_string()),
            exp: (issued_at + self.ttl).timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key).map_err(|e| {
            AppError::ServerError(anyhow::anyhow!("Failed to generate token: {}", e))
        })
    }

    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => {
                        warn!("Token validation failed: {}", e);
                        TokenError::Malformed(e.to_string())
                    }
                }
            })?;

        debug!("Token validated, expires at {}", token_data.claims.exp);
        Ok(token_data.claims)
    }
}
