pub mod user_account;

pub use user_account::{sanitize_string, validate_email, validate_password, validate_username};
