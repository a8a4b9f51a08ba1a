//! Application configuration.
//!
//! Configuration lives in a single JSON document. `AppConfig::load` reads the
//! file named by `APP_CONFIG_PATH` when set and otherwise uses the copy
//! embedded at build time from `res/app-config.json`.

mod config_loader;
pub use config_loader::*;

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "APP_CONFIG_PATH";

/// HMAC algorithms accepted for token signing; the signing key is a shared secret
pub const SUPPORTED_JWT_ALGORITHMS: [&str; 3] = ["HS256", "HS384", "HS512"];

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
