//! HTTP request handlers.

pub mod fallback;
pub mod health;
pub mod todos;

pub use fallback::{method_not_allowed, route_not_found};
pub use health::health_check;
pub use todos::{create_todo, delete_todo, update_todo};
