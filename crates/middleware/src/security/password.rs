use app_config::Argon2Config;
use app_error::{AppError, AppResult};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::{debug, error};

/// Argon2id hashing with configured cost parameters.
///
/// The salt and parameters are embedded in the PHC output, so hashes made
/// with older settings still verify after the costs change.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    // Hash of an unguessable value made with the same costs as real hashes
    decoy_hash: String,
}

impl CredentialHasher {
    pub fn new(config: &Argon2Config) -> AppResult<Self> {
        let params = Params::new(config.memory, config.iterations, config.parallelism, None)
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid Argon2 parameters: {}", e))
            })?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let decoy_salt = SaltString::generate(&mut OsRng);
        let decoy_hash = argon2
            .hash_password(decoy_salt.as_str().as_bytes(), &decoy_salt)
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to prepare password hasher: {}", e))
            })?
            .to_string();

        Ok(Self { argon2, decoy_hash })
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        debug!("Hashing password");
        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                error!("Failed to hash password: {}", e);
                AppError::ServerError(anyhow::anyhow!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// `Ok(false)` on mismatch; a hash that cannot be parsed is an error
    pub fn verify(&self, password: &str, password_hash: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(password_hash).map_err(|e| {
            error!("Invalid password hash: {}", e);
            AppError::ServerError(anyhow::anyhow!("Invalid password hash: {}", e))
        })?;

        let is_valid = self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok();

        debug!("Password verification result: {}", is_valid);
        Ok(is_valid)
    }

    /// Spend the cost of one verification when there is no stored hash to
    /// check, so a missing account takes as long to reject as a wrong password
    pub fn verify_decoy(&self, password: &str) -> bool {
        self.verify(password, &self.decoy_hash).unwrap_or(false)
    }
}
