pub mod auth;
pub mod todo;
pub mod user;

pub use auth::{LoginForm, Token};
pub use todo::{Todo, TodoFilter, TodoList, TodoPublic, TodoRecord, TodoSchema, TodoState, TodoUpdate};
pub use user::{User, UserList, UserPublic, UserRecord, UserSchema, UsersQuery};
