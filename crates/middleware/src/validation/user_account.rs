use app_error::{AppError, AppResult};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // local@domain.tld, case-insensitive
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"(?i)^[a-z0-9_+\-]+(\.[a-z0-9_+\-]+)*@[a-z0-9]+([\-.][a-z0-9]+)*\.[a-z]{2,}$"
    ).unwrap();
}

const MAX_FIELD_LENGTH: usize = 255;

/// Validates a username
pub fn validate_username(username: &str) -> AppResult<()> {
    if username.trim().is_empty() {
        return Err(AppError::validation("username", "Username cannot be empty"));
    }

    if username.chars().count() > MAX_FIELD_LENGTH {
        return Err(AppError::validation(
            "username",
            "Username cannot exceed 255 characters",
        ));
    }

    Ok(())
}

/// Validates an email address
pub fn validate_email(email: &str) -> AppResult<()> {
    if email.trim().is_empty() {
        return Err(AppError::validation("email", "Email cannot be empty"));
    }

    if email.len() > MAX_FIELD_LENGTH || !EMAIL_REGEX.is_match(email) {
        return Err(AppError::validation("email", "Invalid email format"));
    }

    Ok(())
}

/// Passwords only need to be present; strength policy is left to clients
pub fn validate_password(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::validation("password", "Password cannot be empty"));
    }

    Ok(())
}

/// Sanitizes a string input by trimming whitespace
pub fn sanitize_string(input: &str) -> String {
    input.trim().to_string()
}
