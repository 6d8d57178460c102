mod api_key;
mod auth;
mod error_handler;

pub use api_key::api_key_middleware;
pub use auth::{auth_middleware, require_admin};
pub use error_handler::log_errors;
