pub mod jwt;
pub mod password;

// Re-export key items for convenience
pub use jwt::{Claims, TokenCodec, TokenError};
pub use password::CredentialHasher;
