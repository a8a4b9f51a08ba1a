use app_database::Database;
use app_error::AppResult;

/// Tables and indexes the stores rely on. The UNIQUE indexes are the
/// authoritative guard for account identity; store pre-checks only make the
/// error friendlier.
pub const SCHEMA: &str = "
    DEFINE TABLE IF NOT EXISTS users SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS users_username_idx ON TABLE users FIELDS username UNIQUE;
    DEFINE INDEX IF NOT EXISTS users_email_idx ON TABLE users FIELDS email UNIQUE;

    DEFINE TABLE IF NOT EXISTS todos SCHEMALESS;
    DEFINE INDEX IF NOT EXISTS todos_owner_idx ON TABLE todos FIELDS owner_id;

    DEFINE TABLE IF NOT EXISTS sequences SCHEMALESS;
";

pub const USERNAME_INDEX: &str = "users_username_idx";
pub const EMAIL_INDEX: &str = "users_email_idx";

pub async fn apply(db: &Database) -> AppResult<()> {
    db.apply_schema(SCHEMA).await
}
