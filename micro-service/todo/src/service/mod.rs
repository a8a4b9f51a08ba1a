pub mod auth;
pub mod schema;
pub mod todos;
pub mod users;

pub use auth::{AuthService, AuthServiceTrait};
pub use todos::{TodoStore, TodoStoreTrait};
pub use users::{UserStore, UserStoreTrait};

pub const USERS_TABLE: &str = "users";
pub const TODOS_TABLE: &str = "todos";
