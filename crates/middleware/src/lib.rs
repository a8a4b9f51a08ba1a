pub mod api_middleware;
pub mod security;
pub mod validation;

pub use security::jwt::{Claims, TokenCodec, TokenError};
pub use security::password::CredentialHasher;
