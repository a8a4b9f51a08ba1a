use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{debug, info, warn};

use app_error::{AppError, AppErrorExt, AppResult};

use crate::{CONFIG_PATH_ENV, SUPPORTED_JWT_ALGORITHMS};

/// Complete application configuration loaded from JSON file
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub database: SurrealDbConfig,
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SurrealDbConfig {
    pub endpoint: String,
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub database: String,
    pub pool: DbPoolConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DbPoolConfig {
    pub size: usize,
    /// Milliseconds to wait for a free handle
    pub connection_timeout: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit: usize,
    pub timeouts: ServerTimeouts,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerTimeouts {
    /// Milliseconds
    pub request: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SecurityConfig {
    pub jwt: JwtConfig,
    pub cors: CorsConfig,
    pub password: PasswordConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: String,
    pub expiry_minutes: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PasswordConfig {
    pub argon2: Argon2Config,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Argon2Config {
    /// KiB
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    pub sentry: SentryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SentryConfig {
    pub dsn: String,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!("Configuration loaded from file");
        Ok(config)
    }

    /// The configuration compiled into the binary
    pub fn embedded() -> Self {
        let config_content = include_str!("../res/app-config.json");

        match serde_json::from_str::<AppConfig>(config_content) {
            Ok(conf) => conf,
            Err(e) => {
                warn!(
                    "Failed to parse embedded config: {}. Using default configuration.",
                    e
                );
                Self::default()
            }
        }
    }

    /// Load configuration from `APP_CONFIG_PATH` or the embedded default
    pub fn load() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path).config_err()?,
            Err(_) => Self::embedded(),
        };
        info!("Loaded configuration for environment: {:?}", config.environment);

        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Validate the configuration, reporting every problem at once
    pub fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        let is_production = self.is_production();

        self.validate_database_config(&self.database, is_production, &mut errors);

        if self.server.host.trim().is_empty() {
            errors.push("Server host cannot be empty".to_string());
        }

        if self.server.port == 0 {
            errors.push("Server port cannot be 0".to_string());
        }

        let jwt = &self.security.jwt;
        if !SUPPORTED_JWT_ALGORITHMS.contains(&jwt.algorithm.as_str()) {
            errors.push(format!(
                "JWT algorithm '{}' is not supported, expected one of {}",
                jwt.algorithm,
                SUPPORTED_JWT_ALGORITHMS.join(", ")
            ));
        }

        if jwt.expiry_minutes == 0 {
            errors.push("JWT lifetime must be at least one minute".to_string());
        }

        if jwt.secret.is_empty() {
            errors.push("JWT secret cannot be empty".to_string());
        } else if is_production && (jwt.secret.len() < 32 || jwt.secret.starts_with("change-me")) {
            errors.push("JWT secret is not secure for production use".to_string());
        }

        let argon2 = &self.security.password.argon2;
        if argon2.iterations == 0 || argon2.parallelism == 0 {
            errors.push("Argon2 iterations and parallelism must be greater than 0".to_string());
        }

        if !errors.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Invalid configuration: {}",
                errors.join(", ")
            )));
        }
        Ok(())
    }

    fn validate_database_config(
        &self,
        db_config: &SurrealDbConfig,
        is_production: bool,
        errors: &mut Vec<String>,
    ) {
        if db_config.endpoint.trim().is_empty() {
            errors.push("Database endpoint cannot be empty".to_string());
        } else if is_production
            && !db_config.endpoint.starts_with("wss://")
            && !db_config.endpoint.contains("memory")
        {
            errors.push(
                "Database should use a secure 'wss://' connection in production".to_string(),
            );
        }

        if db_config.namespace.trim().is_empty() {
            errors.push("Database namespace cannot be empty".to_string());
        }

        if db_config.database.trim().is_empty() {
            errors.push("Database name cannot be empty".to_string());
        }

        if db_config.pool.size == 0 {
            errors.push("Database pool size must be greater than 0".to_string());
        }

        if is_production {
            if db_config.username == "root" {
                errors.push("Using default 'root' database username in production is insecure".to_string());
            }

            if db_config.password == "root" {
                errors.push("Using default 'root' database password in production is insecure".to_string());
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            database: SurrealDbConfig {
                endpoint: "memory".to_string(),
                username: "root".to_string(),
                password: "root".to_string(),
                namespace: "fastZero".to_string(),
                database: "todos".to_string(),
                pool: DbPoolConfig {
                    size: 10,
                    connection_timeout: 5000,
                },
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                body_limit: 1048576, // 1MB
                timeouts: ServerTimeouts { request: 30000 },
            },
            security: SecurityConfig {
                jwt: JwtConfig {
                    secret: "change-me-development-only-secret-key".to_string(),
                    algorithm: "HS256".to_string(),
                    expiry_minutes: 30,
                },
                cors: CorsConfig {
                    allowed_origins: vec!["*".to_string()],
                    allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                        .iter()
                        .map(|m| m.to_string())
                        .collect(),
                    allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
                },
                password: PasswordConfig {
                    argon2: Argon2Config {
                        memory: 19456,
                        iterations: 2,
                        parallelism: 1,
                    },
                },
            },
            monitoring: MonitoringConfig {
                sentry: SentryConfig {
                    dsn: "".to_string(),
                    sample_rate: 1.0,
                    traces_sample_rate: 0.2,
                },
                logging: LoggingConfig {
                    level: "info".to_string(),
                    format: "pretty".to_string(),
                },
            },
        }
    }
}
